use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error(
        "必須の設定 '{0}' がありません\n\nヒント:\n  • --{1} オプションで指定してください\n  • 設定ファイル (tunnelship.yaml) に {0}: <値> を追加してください"
    )]
    MissingKey(&'static str, &'static str),

    #[error("設定 '{key}' の値が不正です: {value} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("設定ファイルを読み込めません: {path}\n{source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
