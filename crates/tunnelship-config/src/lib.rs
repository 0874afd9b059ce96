//! tunnelship の設定管理
//!
//! 設定は文字列キーと文字列値のマップとして受け取り、
//! 一度だけ [`PushConfig`] / [`BuildConfig`] に変換します。
//! 変換後の値は変更されません。

pub mod build;
pub mod error;
pub mod push;

pub use build::{BuildConfig, DockerfileKind};
pub use error::*;
pub use push::{Deployer, PushConfig};

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 設定マップ（キー → 値）
pub type ConfigMap = HashMap<String, String>;

/// 設定ファイルのパスを直接指定する環境変数
pub const CONFIG_PATH_ENV: &str = "TUNNELSHIP_CONFIG";

const CANDIDATES: [&str; 2] = ["tunnelship.yaml", ".tunnelship.yaml"];

/// tunnelship の設定ディレクトリ (~/.config/tunnelship)
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("tunnelship");

    Ok(config_dir)
}

/// 設定ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 TUNNELSHIP_CONFIG (直接パス指定)
/// 2. カレントディレクトリ: tunnelship.yaml, .tunnelship.yaml
/// 3. ~/.config/tunnelship/config.yaml (グローバル設定)
///
/// 設定ファイルは任意なので、見つからなければ `None` を返す
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        tracing::warn!(
            "{} points to a missing file: {}",
            CONFIG_PATH_ENV,
            path.display()
        );
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join("config.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

/// YAML の設定ファイルを読み込む
///
/// トップレベルはフラットなマップで、値はスカラー（文字列・数値・真偽値）のみ。
/// `port: 5000` のような数値も文字列として扱う。
pub fn load_config_file(path: &Path) -> Result<ConfigMap> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content).map_err(|e| match e {
        ConfigError::Parse { source, .. } => ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

fn parse_config(content: &str) -> Result<ConfigMap> {
    if content.trim().is_empty() {
        return Ok(ConfigMap::new());
    }

    let raw: HashMap<String, serde_yaml::Value> =
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;

    let mut map = ConfigMap::with_capacity(raw.len());
    for (key, value) in raw {
        let value = match value {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Null => continue,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "config file",
                    value: format!("{}: {:?}", key, other),
                    reason: "値は文字列・数値・真偽値のみ指定できます".to_string(),
                });
            }
        };
        map.insert(key, value);
    }

    Ok(map)
}

/// 設定ファイル（見つかれば）とコマンドラインの値をマージする
///
/// `overrides` の値が優先される。空文字列の上書きは無視する。
pub fn load_config_map(
    explicit: Option<&Path>,
    overrides: impl IntoIterator<Item = (String, String)>,
) -> Result<ConfigMap> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => find_config_file()?,
    };

    let mut map = match path {
        Some(path) => {
            tracing::debug!("Loading config file: {}", path.display());
            load_config_file(&path)?
        }
        None => ConfigMap::new(),
    };

    for (key, value) in overrides {
        if !value.is_empty() {
            map.insert(key, value);
        }
    }

    Ok(map)
}

/// 空文字列を未設定として扱って値を取り出す
pub(crate) fn non_empty<'a>(map: &'a ConfigMap, key: &str) -> Option<&'a str> {
    map.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    fn test_parse_config_scalars() {
        let map = parse_config("projectName: app\nport: 5001\nenv: mac\nfoo: true\n").unwrap();
        assert_eq!(map.get("projectName").unwrap(), "app");
        assert_eq!(map.get("port").unwrap(), "5001");
        assert_eq!(map.get("env").unwrap(), "mac");
        assert_eq!(map.get("foo").unwrap(), "true");
    }

    #[test]
    fn test_parse_config_empty() {
        assert!(parse_config("").unwrap().is_empty());
        assert!(parse_config("   \n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_config_rejects_nested() {
        let result = parse_config("ssh:\n  host: example\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_load_config_file_reports_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("broken.yaml");
        fs::write(&path, "projectName: [unclosed").unwrap();

        match load_config_file(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("Expected Parse error, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_find_config_file_env_var() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "projectName: app").unwrap();

        temp_env::with_var(CONFIG_PATH_ENV, Some(config_path.as_os_str()), || {
            let result = find_config_file().unwrap();
            assert_eq!(result, Some(config_path.clone()));
        });
    }

    #[test]
    #[serial]
    fn test_find_config_file_in_current_dir() {
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        fs::write(temp_dir.path().join(".tunnelship.yaml"), "projectName: hidden").unwrap();
        fs::write(temp_dir.path().join("tunnelship.yaml"), "projectName: visible").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();
        let result = temp_env::with_var_unset(CONFIG_PATH_ENV, find_config_file);
        std::env::set_current_dir(original_dir).unwrap();

        // tunnelship.yaml が優先される
        assert!(result.unwrap().unwrap().ends_with("tunnelship.yaml"));
    }

    #[test]
    #[serial]
    fn test_load_config_map_overrides_win() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("tunnelship.yaml");
        fs::write(&path, "projectName: from-file\nprojectTag: v1\n").unwrap();

        let map = load_config_map(
            Some(&path),
            vec![
                ("projectName".to_string(), "from-cli".to_string()),
                ("projectTag".to_string(), String::new()),
            ],
        )
        .unwrap();

        assert_eq!(map.get("projectName").unwrap(), "from-cli");
        // 空文字列は上書きしない
        assert_eq!(map.get("projectTag").unwrap(), "v1");
    }
}
