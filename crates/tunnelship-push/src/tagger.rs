//! レジストリ用タグの作成・プッシュ・削除
//!
//! コンテナエンジンは CLI (`docker tag` / `docker push` / `docker rmi`) で操作します。

use crate::error::{PushError, Result};
use async_trait::async_trait;
use colored::Colorize;
use std::process::Stdio;
use tokio::process::Command;
use tunnelship_config::PushConfig;

/// コンテナエンジンのイメージ操作
#[async_trait]
pub trait ImageEngine: Send + Sync {
    /// `source` に `target` という別名を付ける
    async fn tag(&self, source: &str, target: &str) -> Result<()>;

    /// タグをレジストリにプッシュ
    async fn push(&self, tag: &str) -> Result<()>;

    /// ローカルのタグを削除
    async fn remove(&self, tag: &str) -> Result<()>;
}

/// docker CLI
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_program("docker")
    }

    /// docker 互換の別コマンド (podman など) を使う
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// 出力を端末にそのまま流して実行
    async fn run_inherit(&self, args: &[&str]) -> Result<()> {
        let command = self.describe(args);
        tracing::debug!("Running: {}", command);

        let status = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| PushError::Engine {
                command: command.clone(),
                message: e.to_string(),
            })?;

        if !status.success() {
            return Err(PushError::Engine {
                command,
                message: status.to_string(),
            });
        }
        Ok(())
    }

    /// 出力を取り込んで実行
    async fn run_captured(&self, args: &[&str]) -> Result<String> {
        let command = self.describe(args);
        tracing::debug!("Running: {}", command);

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PushError::Engine {
                command: command.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PushError::Engine {
                command,
                message: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.program, args.join(" "))
    }
}

#[async_trait]
impl ImageEngine for DockerCli {
    async fn tag(&self, source: &str, target: &str) -> Result<()> {
        self.run_inherit(&["tag", source, target]).await
    }

    async fn push(&self, tag: &str) -> Result<()> {
        self.run_inherit(&["push", tag]).await
    }

    async fn remove(&self, tag: &str) -> Result<()> {
        self.run_captured(&["rmi", tag]).await.map(|_| ())
    }
}

/// トンネル経由のレジストリを指すタグ
///
/// `{deployer}localhost:{port}/{projectName}:{projectTag}`
pub fn qualified_tag(config: &PushConfig, local_port: u16) -> String {
    format!(
        "{}localhost:{}/{}:{}",
        config.deployer().qualifier(),
        local_port,
        config.project_name(),
        config.project_tag()
    )
}

/// タグの作成・プッシュ・削除
pub struct TagManager<E> {
    engine: E,
}

impl<E: ImageEngine> TagManager<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// ローカルイメージにレジストリ用のタグを付ける
    ///
    /// 元イメージが存在しない場合などは致命的エラー。
    pub async fn create_tag(&self, config: &PushConfig, local_port: u16) -> Result<String> {
        let source = config.source_image();
        let tag = qualified_tag(config, local_port);

        self.engine
            .tag(&source, &tag)
            .await
            .map_err(|e| PushError::TagCreate {
                image: source.clone(),
                tag: tag.clone(),
                message: e.to_string(),
            })?;

        tracing::debug!("Tagged {} as {}", source, tag);
        Ok(tag)
    }

    /// タグをプッシュ
    ///
    /// 失敗してもエラーにはせず、ログに残して `false` を返す。
    pub async fn push_tag(&self, tag: &str) -> bool {
        println!("  → {}", tag.cyan());

        match self.engine.push(tag).await {
            Ok(()) => {
                println!("  {} Pushed", "✓".green());
                true
            }
            Err(e) => {
                tracing::error!("Push of {} failed: {}", tag, e);
                println!("  {} Push failed: {}", "✗".red(), tag);
                false
            }
        }
    }

    /// ローカルのタグを削除
    ///
    /// 失敗してもエラーにはせず、手動での削除を促す警告を出して `false` を返す。
    pub async fn remove_tag(&self, tag: &str) -> bool {
        match self.engine.remove(tag).await {
            Ok(()) => {
                tracing::debug!("Removed local tag {}", tag);
                true
            }
            Err(e) => {
                tracing::warn!(
                    "Could not remove local tag {}: {}. Remove it manually: docker rmi {}",
                    tag,
                    e,
                    tag
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tunnelship_config::ConfigMap;

    fn config(pairs: &[(&str, &str)]) -> PushConfig {
        let mut map: ConfigMap = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        map.insert("ssh".to_string(), "user@host".to_string());
        PushConfig::from_map(&map).unwrap()
    }

    #[test]
    fn test_qualified_tag_standard() {
        let config = config(&[("projectName", "app")]);
        assert_eq!(qualified_tag(&config, 5000), "localhost:5000/app:latest");
    }

    #[test]
    fn test_qualified_tag_mac() {
        let config = config(&[("projectName", "app"), ("env", "mac")]);
        assert_eq!(
            qualified_tag(&config, 5000),
            "docker.for.mac.localhost:5000/app:latest"
        );
    }

    #[test]
    fn test_qualified_tag_ephemeral_port() {
        let config = config(&[("projectName", "api"), ("projectTag", "v1.2.0")]);
        assert_eq!(qualified_tag(&config, 49731), "localhost:49731/api:v1.2.0");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_docker_cli_failure_is_reported() {
        // `false` は常に失敗する
        let cli = DockerCli::with_program("false");
        let result = cli.remove("localhost:5000/app:latest").await;
        assert!(matches!(result, Err(PushError::Engine { .. })));

        let manager = TagManager::new(cli);
        let config = config(&[("projectName", "app")]);
        let result = manager.create_tag(&config, 5000).await;
        match result {
            Err(PushError::TagCreate { image, tag, .. }) => {
                assert_eq!(image, "app:latest");
                assert_eq!(tag, "localhost:5000/app:latest");
            }
            other => panic!("Expected TagCreate, got {:?}", other),
        }

        assert!(!manager.push_tag("localhost:5000/app:latest").await);
        assert!(!manager.remove_tag("localhost:5000/app:latest").await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_docker_cli_success() {
        // `true` は常に成功する
        let manager = TagManager::new(DockerCli::with_program("true"));
        let config = config(&[("projectName", "app")]);

        let tag = manager.create_tag(&config, 5000).await.unwrap();
        assert_eq!(tag, "localhost:5000/app:latest");
        assert!(manager.push_tag(&tag).await);
        assert!(manager.remove_tag(&tag).await);
    }

    #[tokio::test]
    async fn test_missing_engine_binary() {
        let cli = DockerCli::with_program("/nonexistent/tunnelship-docker");
        let result = cli.push("localhost:5000/app:latest").await;
        assert!(matches!(result, Err(PushError::Engine { .. })));
    }
}
