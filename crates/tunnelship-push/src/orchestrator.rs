//! プッシュ処理の順序制御
//!
//! トンネル起動 → タグ作成 → プッシュ → タグ削除 → トンネル停止 の順に実行します。
//! トンネルが確立した後は、途中で失敗してもトンネルの停止を必ず1回だけ行います。

use crate::error::Result;
use crate::tagger::{DockerCli, ImageEngine, TagManager};
use crate::tunnel::{SshTunnelManager, TunnelManager};
use std::fmt;
use tunnelship_config::PushConfig;

/// プッシュ処理の段階
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PushStage {
    Idle,
    TunnelStarting,
    TunnelUp,
    Tagged,
    Pushed,
    TagRemoved,
    TunnelStopped,
    Done,
}

impl fmt::Display for PushStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PushStage::Idle => "idle",
            PushStage::TunnelStarting => "tunnel-starting",
            PushStage::TunnelUp => "tunnel-up",
            PushStage::Tagged => "tagged",
            PushStage::Pushed => "pushed",
            PushStage::TagRemoved => "tag-removed",
            PushStage::TunnelStopped => "tunnel-stopped",
            PushStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// 1回のプッシュの結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
    /// プッシュに使ったタグ
    pub tag: String,
    pub local_port: u16,
    /// `docker push` が成功したか
    pub pushed: bool,
    /// ローカルのタグを削除できたか
    pub tag_removed: bool,
    pub stage: PushStage,
}

pub struct PushOrchestrator<T, E> {
    tunnels: T,
    tags: TagManager<E>,
}

impl Default for PushOrchestrator<SshTunnelManager, DockerCli> {
    fn default() -> Self {
        Self::new(SshTunnelManager::new(), DockerCli::new())
    }
}

impl<T, E> PushOrchestrator<T, E>
where
    T: TunnelManager,
    E: ImageEngine,
{
    pub fn new(tunnels: T, engine: E) -> Self {
        Self {
            tunnels,
            tags: TagManager::new(engine),
        }
    }

    /// イメージをトンネル経由でプッシュ
    ///
    /// トンネルの起動・タグ作成・トンネル停止の失敗はエラーを返す。
    /// プッシュとタグ削除の失敗は [`PushReport`] に記録して処理を続ける。
    pub async fn run(&self, config: &PushConfig) -> Result<PushReport> {
        let mut stage = PushStage::Idle;
        advance(&mut stage, PushStage::TunnelStarting);

        let (handle, local_port) = self.tunnels.start(config).await?;
        advance(&mut stage, PushStage::TunnelUp);

        let sequence = self.push_through(config, local_port, &mut stage).await;
        let stopped = self.tunnels.stop(handle).await;

        match (sequence, stopped) {
            (Ok(mut report), Ok(())) => {
                advance(&mut stage, PushStage::TunnelStopped);
                advance(&mut stage, PushStage::Done);
                report.stage = stage;
                Ok(report)
            }
            (Ok(_), Err(stop_err)) => Err(stop_err),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(stop_err)) => {
                tracing::error!("Tunnel stop also failed: {}", stop_err);
                Err(e)
            }
        }
    }

    async fn push_through(
        &self,
        config: &PushConfig,
        local_port: u16,
        stage: &mut PushStage,
    ) -> Result<PushReport> {
        let tag = self.tags.create_tag(config, local_port).await?;
        advance(stage, PushStage::Tagged);

        let pushed = self.tags.push_tag(&tag).await;
        advance(stage, PushStage::Pushed);

        let tag_removed = self.tags.remove_tag(&tag).await;
        advance(stage, PushStage::TagRemoved);

        Ok(PushReport {
            tag,
            local_port,
            pushed,
            tag_removed,
            stage: *stage,
        })
    }
}

fn advance(stage: &mut PushStage, next: PushStage) {
    debug_assert!(next > *stage, "push stage went backwards: {} -> {}", stage, next);
    tracing::debug!("Push stage: {} -> {}", stage, next);
    *stage = next;
}
