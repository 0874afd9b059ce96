//! プッシュ設定
//!
//! 設定マップから [`PushConfig`] を組み立てます。デフォルト値:
//! - `projectTag`: `latest`
//! - `port`: `5000`
//! - `target`: `localhost:<port>`
//! - `env`: `mac` の場合は Docker for Mac 用の修飾子を使う

use crate::error::{ConfigError, Result};
use crate::{ConfigMap, non_empty};
use std::fmt;

/// デフォルトのイメージタグ
pub const DEFAULT_PROJECT_TAG: &str = "latest";

/// デフォルトのレジストリポート
pub const DEFAULT_REGISTRY_PORT: &str = "5000";

/// Docker for Mac 環境で使う固定ローカルポート
pub const FIXED_LOCAL_PORT: u16 = 5000;

/// デプロイヤー修飾子
///
/// Docker Desktop for Mac は VM 内で動くため、ホスト側の localhost を
/// `docker.for.mac.localhost` として参照する必要がある。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Deployer {
    #[default]
    Standard,
    DockerForMac,
}

impl Deployer {
    /// `env` キーの値から解決
    pub fn from_env(env: Option<&str>) -> Result<Self> {
        match env {
            None => Ok(Deployer::Standard),
            Some("mac") => Ok(Deployer::DockerForMac),
            Some(other) => Err(ConfigError::InvalidValue {
                key: "env",
                value: other.to_string(),
                reason: "指定できる値は mac のみです".to_string(),
            }),
        }
    }

    /// タグの先頭に付ける修飾子
    pub fn qualifier(&self) -> &'static str {
        match self {
            Deployer::Standard => "",
            Deployer::DockerForMac => "docker.for.mac.",
        }
    }

    /// ローカルポートを固定する環境かどうか
    pub fn uses_fixed_port(&self) -> bool {
        matches!(self, Deployer::DockerForMac)
    }
}

impl fmt::Display for Deployer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deployer::Standard => write!(f, "standard"),
            Deployer::DockerForMac => write!(f, "docker-for-mac"),
        }
    }
}

/// 1回のプッシュに使う設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushConfig {
    project_name: String,
    project_tag: String,
    deployer: Deployer,
    target: String,
    ssh: String,
}

impl PushConfig {
    /// 設定マップから作成
    pub fn from_map(map: &ConfigMap) -> Result<Self> {
        let project_name = non_empty(map, "projectName")
            .ok_or(ConfigError::MissingKey("projectName", "project-name"))?
            .to_string();
        let project_tag = non_empty(map, "projectTag")
            .unwrap_or(DEFAULT_PROJECT_TAG)
            .to_string();

        let port = non_empty(map, "port").unwrap_or(DEFAULT_REGISTRY_PORT);
        parse_port(port).map_err(|reason| ConfigError::InvalidValue {
            key: "port",
            value: port.to_string(),
            reason,
        })?;

        let target = match non_empty(map, "target") {
            Some(t) => validate_target(t)?,
            None => format!("localhost:{}", port),
        };

        let deployer = Deployer::from_env(non_empty(map, "env"))?;
        let ssh = non_empty(map, "ssh")
            .ok_or(ConfigError::MissingKey("ssh", "ssh"))?
            .to_string();

        Ok(Self {
            project_name,
            project_tag,
            deployer,
            target,
            ssh,
        })
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn project_tag(&self) -> &str {
        &self.project_tag
    }

    pub fn deployer(&self) -> Deployer {
        self.deployer
    }

    /// トンネルの転送先 (host:port)
    pub fn target(&self) -> &str {
        &self.target
    }

    /// SSH の接続先 (user@host など)
    pub fn ssh(&self) -> &str {
        &self.ssh
    }

    /// ローカルに存在するプッシュ元イメージ
    pub fn source_image(&self) -> String {
        format!("{}:{}", self.project_name, self.project_tag)
    }
}

fn validate_target(target: &str) -> Result<String> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        key: "target",
        value: target.to_string(),
        reason: reason.to_string(),
    };

    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| invalid("host:port 形式で指定してください"))?;
    if host.is_empty() {
        return Err(invalid("ホスト名が空です"));
    }
    parse_port(port).map_err(|reason| invalid(&reason))?;

    Ok(target.to_string())
}

/// 1〜65535 のポート番号として解釈
fn parse_port(port: &str) -> std::result::Result<u16, String> {
    match port.parse::<u16>() {
        Ok(0) => Err("ポート番号 0 は使用できません".to_string()),
        Ok(p) => Ok(p),
        Err(e) => Err(format!("ポート番号が不正です: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> ConfigMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = PushConfig::from_map(&map(&[("projectName", "app"), ("ssh", "user@host")]))
            .unwrap();
        assert_eq!(config.project_tag(), "latest");
        assert_eq!(config.target(), "localhost:5000");
        assert_eq!(config.deployer(), Deployer::Standard);
        assert_eq!(config.source_image(), "app:latest");
    }

    #[test]
    fn test_port_drives_default_target() {
        let config = PushConfig::from_map(&map(&[
            ("projectName", "app"),
            ("port", "5443"),
            ("ssh", "user@host"),
        ]))
        .unwrap();
        assert_eq!(config.target(), "localhost:5443");
    }

    #[test]
    fn test_explicit_target_wins_over_port() {
        let config = PushConfig::from_map(&map(&[
            ("projectName", "app"),
            ("port", "5443"),
            ("target", "registry.internal:5000"),
            ("ssh", "user@host"),
        ]))
        .unwrap();
        assert_eq!(config.target(), "registry.internal:5000");
    }

    #[test]
    fn test_mac_env() {
        let config = PushConfig::from_map(&map(&[
            ("projectName", "app"),
            ("env", "mac"),
            ("ssh", "user@host"),
        ]))
        .unwrap();
        assert_eq!(config.deployer(), Deployer::DockerForMac);
        assert_eq!(config.deployer().qualifier(), "docker.for.mac.");
        assert!(config.deployer().uses_fixed_port());
        assert_eq!(config.target(), "localhost:5000");
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = PushConfig::from_map(&map(&[
            ("projectName", "app"),
            ("projectTag", ""),
            ("port", ""),
            ("env", ""),
            ("ssh", "user@host"),
        ]))
        .unwrap();
        assert_eq!(config.project_tag(), "latest");
        assert_eq!(config.target(), "localhost:5000");
        assert_eq!(config.deployer(), Deployer::Standard);
    }

    #[test]
    fn test_missing_ssh() {
        let result = PushConfig::from_map(&map(&[("projectName", "app")]));
        assert!(matches!(result, Err(ConfigError::MissingKey("ssh", _))));
    }

    #[test]
    fn test_missing_project_name() {
        let result = PushConfig::from_map(&map(&[("ssh", "user@host")]));
        assert!(matches!(
            result,
            Err(ConfigError::MissingKey("projectName", _))
        ));
    }

    #[test]
    fn test_invalid_port() {
        let result = PushConfig::from_map(&map(&[
            ("projectName", "app"),
            ("port", "http"),
            ("ssh", "user@host"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { key: "port", .. })
        ));
    }

    #[test]
    fn test_port_zero_rejected() {
        let result = PushConfig::from_map(&map(&[
            ("projectName", "app"),
            ("port", "0"),
            ("ssh", "user@host"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { key: "port", .. })
        ));
    }

    #[test]
    fn test_invalid_target() {
        for target in ["registry", ":5000", "registry:abc", "registry:0"] {
            let result = PushConfig::from_map(&map(&[
                ("projectName", "app"),
                ("target", target),
                ("ssh", "user@host"),
            ]));
            assert!(
                matches!(result, Err(ConfigError::InvalidValue { key: "target", .. })),
                "target {} should be rejected",
                target
            );
        }
    }

    #[test]
    fn test_unknown_env() {
        let result = Deployer::from_env(Some("windows"));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { key: "env", .. })
        ));
    }
}
