use crate::prober::ProbeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PushError {
    #[error("SSH トンネルを起動できません ({ssh}): {source}")]
    TunnelSpawn {
        ssh: String,
        #[source]
        source: std::io::Error,
    },

    #[error("SSH トンネルがローカルポート {port} で確立されませんでした: {source}")]
    TunnelUnreachable {
        port: u16,
        #[source]
        source: ProbeError,
    },

    #[error("SSH トンネルが確立前に終了しました (ポート {port}, {status})")]
    TunnelExited { port: u16, status: String },

    #[error("SSH トンネル (pid {pid}) を停止できません: {source}")]
    TunnelStop {
        pid: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ローカルポート {port} は既に使用されています")]
    PortInUse { port: u16 },

    #[error("ローカルポートを確保できません: {0}")]
    PortAllocation(#[source] std::io::Error),

    #[error("タグ {tag} を作成できません ({image}): {message}")]
    TagCreate {
        image: String,
        tag: String,
        message: String,
    },

    #[error("{command} に失敗しました: {message}")]
    Engine { command: String, message: String },
}

impl PushError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            PushError::TunnelSpawn { .. } => format!(
                "{}\n\
                 \n\
                 ヒント:\n  • ssh コマンドがインストールされているか確認してください",
                self
            ),
            PushError::TunnelUnreachable { .. } | PushError::TunnelExited { .. } => format!(
                "{}\n\
                 \n\
                 ヒント:\n  • ssh で接続先にパスワードなしでログインできるか確認してください\n  • 転送先 (target) のレジストリが起動しているか確認してください",
                self
            ),
            PushError::PortInUse { port } => format!(
                "{}\n\
                 \n\
                 ヒント:\n  • ポート {} を使っているプロセスを停止してください\n  • macOS では AirPlay レシーバーが 5000 番を使うことがあります",
                self, port
            ),
            PushError::TunnelStop { .. } => format!(
                "{}\n\
                 \n\
                 SSH プロセスが残っている可能性があります。手動で終了してください。",
                self
            ),
            PushError::TagCreate { image, .. } => format!(
                "{}\n\
                 \n\
                 ヒント:\n  • イメージ {} がローカルに存在するか確認してください\n  • 先に tunnelship build を実行してください",
                self, image
            ),
            _ => format!("{}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, PushError>;
