//! ポート到達確認
//!
//! 一定間隔で TCP 接続を試み、期限内に接続できるかを確認します。

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep, timeout};

/// 接続試行の間隔
pub const PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// 期限直前の試行に与える最小の持ち時間
const MIN_ATTEMPT: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    #[default]
    Tcp,
    Tcp4,
    Tcp6,
}

impl Protocol {
    fn accepts(&self, addr: &SocketAddr) -> bool {
        match self {
            Protocol::Tcp => true,
            Protocol::Tcp4 => addr.is_ipv4(),
            Protocol::Tcp6 => addr.is_ipv6(),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Tcp4 => write!(f, "tcp4"),
            Protocol::Tcp6 => write!(f, "tcp6"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{protocol}://{address} に {waited:?} 以内に接続できませんでした (最後のエラー: {last_error})")]
    Timeout {
        protocol: Protocol,
        address: String,
        waited: Duration,
        last_error: String,
    },
}

/// `address` に接続できるようになるまで待機
///
/// 接続に成功した時点で `Ok(())` を返す。確認用の接続はすぐに閉じる。
/// `max_wait` を過ぎても接続できなければ、最後の接続エラーを含む
/// [`ProbeError::Timeout`] を返す。
pub async fn wait_port(
    protocol: Protocol,
    address: &str,
    max_wait: Duration,
) -> Result<(), ProbeError> {
    let started = Instant::now();
    let deadline = started + max_wait;

    loop {
        // 1回の試行は間隔を超えない
        let budget = deadline
            .saturating_duration_since(Instant::now())
            .clamp(MIN_ATTEMPT, PROBE_INTERVAL);

        let last_error = match timeout(budget, connect(protocol, address)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                tracing::debug!(
                    "{}://{} reachable after {:?}",
                    protocol,
                    address,
                    started.elapsed()
                );
                return Ok(());
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("接続試行が {:?} でタイムアウトしました", budget),
        };

        let now = Instant::now();
        if now >= deadline {
            return Err(ProbeError::Timeout {
                protocol,
                address: address.to_string(),
                waited: now - started,
                last_error,
            });
        }

        sleep(PROBE_INTERVAL.min(deadline - now)).await;
    }
}

async fn connect(protocol: Protocol, address: &str) -> std::io::Result<TcpStream> {
    if protocol == Protocol::Tcp {
        return TcpStream::connect(address).await;
    }

    let mut last_err = None;
    for addr in tokio::net::lookup_host(address).await? {
        if !protocol.accepts(&addr) {
            continue;
        }
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("{} に {} のアドレスがありません", address, protocol),
        )
    }))
}
