//! SSH トンネル管理
//!
//! `ssh -NTL <localPort>:<target> <destination>` をバックグラウンドで起動し、
//! ローカルポートに接続できることを確認してからハンドルを返します。

use crate::error::{PushError, Result};
use crate::prober::{Protocol, wait_port};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tunnelship_config::PushConfig;
use tunnelship_config::push::FIXED_LOCAL_PORT;

/// トンネル確立を待つ時間
pub const TUNNEL_REACH_TIMEOUT: Duration = Duration::from_secs(10);

/// トンネルの起動・停止
///
/// `start` が返したハンドルは `stop` に渡すまで呼び出し側が所有する。
#[async_trait]
pub trait TunnelManager: Send + Sync {
    type Handle: Send;

    /// トンネルを起動し、到達確認済みのローカルポートを返す
    async fn start(&self, config: &PushConfig) -> Result<(Self::Handle, u16)>;

    /// トンネルを停止
    async fn stop(&self, handle: Self::Handle) -> Result<()>;
}

/// 起動中の SSH トンネル
///
/// ドロップ時にもプロセスを終了させる。
#[derive(Debug)]
pub struct Tunnel {
    child: Child,
    local_port: u16,
    destination: String,
}

impl Tunnel {
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    fn pid(&self) -> String {
        self.child
            .id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

/// `ssh` コマンドによるトンネル
#[derive(Debug, Clone)]
pub struct SshTunnelManager {
    program: String,
    extra_args: Vec<String>,
    local_port: Option<u16>,
    reach_timeout: Duration,
}

impl Default for SshTunnelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SshTunnelManager {
    pub fn new() -> Self {
        Self {
            program: "ssh".to_string(),
            extra_args: Vec::new(),
            local_port: None,
            reach_timeout: TUNNEL_REACH_TIMEOUT,
        }
    }

    /// 使用する ssh の実行ファイル
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// `-NTL` の前に渡す追加引数（`-i key`, `-p 2222` など）
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// ローカルポートを明示的に指定
    pub fn local_port(mut self, port: u16) -> Self {
        self.local_port = Some(port);
        self
    }

    pub fn reach_timeout(mut self, timeout: Duration) -> Self {
        self.reach_timeout = timeout;
        self
    }

    /// 使用するローカルポートを決定
    ///
    /// 明示的な指定 > Docker for Mac の固定ポート > OS が割り当てる空きポート
    pub fn choose_local_port(&self, config: &PushConfig) -> Result<u16> {
        if let Some(port) = self.local_port {
            return Ok(port);
        }
        if config.deployer().uses_fixed_port() {
            return Ok(FIXED_LOCAL_PORT);
        }
        allocate_local_port()
    }
}

#[async_trait]
impl TunnelManager for SshTunnelManager {
    type Handle = Tunnel;

    async fn start(&self, config: &PushConfig) -> Result<(Tunnel, u16)> {
        let local_port = self.choose_local_port(config)?;
        if self.local_port.is_none() && config.deployer().uses_fixed_port() {
            // 固定ポートに別のサーバーがいると、ssh が bind できなくても到達確認が通ってしまう
            ensure_port_free(local_port).await?;
        }
        let forward = format!("{}:{}", local_port, config.target());

        tracing::debug!(
            "Running: {} {} -o ExitOnForwardFailure=yes -NTL {} {}",
            self.program,
            self.extra_args.join(" "),
            forward,
            config.ssh()
        );

        let mut child = Command::new(&self.program)
            .args(&self.extra_args)
            .arg("-o")
            .arg("ExitOnForwardFailure=yes")
            .arg("-NTL")
            .arg(&forward)
            .arg(config.ssh())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PushError::TunnelSpawn {
                ssh: config.ssh().to_string(),
                source,
            })?;

        let address = format!("localhost:{}", local_port);
        let confirmed = tokio::select! {
            probe = wait_port(Protocol::Tcp, &address, self.reach_timeout) => {
                probe.map_err(|source| PushError::TunnelUnreachable { port: local_port, source })
            }
            status = child.wait() => {
                let status = match status {
                    Ok(s) => s.to_string(),
                    Err(e) => e.to_string(),
                };
                Err(PushError::TunnelExited { port: local_port, status })
            }
        };

        if let Err(e) = confirmed {
            // 確立できなかったプロセスは残さない
            if let Err(kill_err) = child.kill().await {
                tracing::debug!("ssh process already gone: {}", kill_err);
            }
            return Err(e);
        }

        tracing::info!(
            "Tunnel up: localhost:{} -> {} via {}",
            local_port,
            config.target(),
            config.ssh()
        );

        Ok((
            Tunnel {
                child,
                local_port,
                destination: config.ssh().to_string(),
            },
            local_port,
        ))
    }

    async fn stop(&self, mut tunnel: Tunnel) -> Result<()> {
        let pid = tunnel.pid();

        match tunnel.child.try_wait() {
            Ok(Some(status)) => {
                tracing::warn!(
                    "Tunnel to {} had already exited ({})",
                    tunnel.destination,
                    status
                );
                return Ok(());
            }
            Ok(None) => {}
            Err(source) => return Err(PushError::TunnelStop { pid, source }),
        }

        tunnel
            .child
            .kill()
            .await
            .map_err(|source| PushError::TunnelStop { pid, source })?;

        tracing::info!(
            "Tunnel stopped: localhost:{} via {}",
            tunnel.local_port,
            tunnel.destination
        );
        Ok(())
    }
}

/// ローカルポートで既に何かが待ち受けていないことを確認
async fn ensure_port_free(port: u16) -> Result<()> {
    let attempt = tokio::time::timeout(
        Duration::from_millis(200),
        tokio::net::TcpStream::connect(("127.0.0.1", port)),
    )
    .await;

    match attempt {
        Ok(Ok(_)) => Err(PushError::PortInUse { port }),
        _ => Ok(()),
    }
}

/// OS に空きポートを割り当ててもらう
fn allocate_local_port() -> Result<u16> {
    let listener =
        std::net::TcpListener::bind(("127.0.0.1", 0)).map_err(PushError::PortAllocation)?;
    let port = listener
        .local_addr()
        .map_err(PushError::PortAllocation)?
        .port();
    Ok(port)
}
