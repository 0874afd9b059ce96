//! tunnelship のイメージプッシュ機能
//!
//! SSH トンネル経由でしか到達できないプライベートレジストリへ、
//! ローカルのイメージをプッシュします。
//!
//! - [`prober`]: ポートへの到達確認
//! - [`tunnel`]: `ssh -NTL` によるトンネルの起動・停止
//! - [`tagger`]: レジストリ用タグの作成・プッシュ・削除
//! - [`orchestrator`]: 上記を順に実行し、トンネルを必ず停止する

pub mod error;
pub mod orchestrator;
pub mod prober;
pub mod tagger;
pub mod tunnel;

pub use error::{PushError, Result};
pub use orchestrator::{PushOrchestrator, PushReport, PushStage};
pub use prober::{ProbeError, Protocol, wait_port};
pub use tagger::{DockerCli, ImageEngine, TagManager, qualified_tag};
pub use tunnel::{SshTunnelManager, Tunnel, TunnelManager};
