use crate::error::{BuildError, Result};
use crate::template::Dockerfile;
use colored::Colorize;
use std::process::Stdio;
use tokio::process::Command;
use tunnelship_config::BuildConfig;

/// `docker build` の実行
pub struct ImageBuilder {
    program: String,
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self::with_program("docker")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// イメージをビルド
    ///
    /// ビルドの出力はそのまま端末に流す。
    pub async fn build_image(&self, config: &BuildConfig, dockerfile: &Dockerfile) -> Result<()> {
        let image = config.image();
        tracing::info!("Building image: {}", image);
        tracing::debug!(
            "Running: {} build -t {} -f {} {}",
            self.program,
            image,
            dockerfile.path().display(),
            config.context.display()
        );

        let status = Command::new(&self.program)
            .arg("build")
            .arg("-t")
            .arg(&image)
            .arg("-f")
            .arg(dockerfile.path())
            .arg(&config.context)
            .stdin(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(BuildError::BuildFailed(format!("{} ({})", image, status)));
        }

        tracing::info!("Successfully built: {}", image);
        Ok(())
    }

    /// dangling イメージを削除
    ///
    /// 失敗しても警告のみ。削除した数を返す。
    pub async fn prune_dangling(&self) -> usize {
        let ids = match self
            .run_captured(&["images", "-f", "dangling=true", "-q"])
            .await
        {
            Ok(out) => parse_image_ids(&out),
            Err(e) => {
                tracing::warn!("Could not list dangling images: {}", e);
                return 0;
            }
        };

        if ids.is_empty() {
            return 0;
        }

        let mut args = vec!["rmi", "--force"];
        args.extend(ids.iter().map(String::as_str));
        match self.run_captured(&args).await {
            Ok(_) => {
                println!("  {} Removed {} dangling image(s)", "✓".green(), ids.len());
                ids.len()
            }
            Err(e) => {
                tracing::warn!("Could not remove dangling images: {}", e);
                0
            }
        }
    }

    /// イメージの存在確認
    pub async fn image_exists(&self, image: &str) -> Result<bool> {
        let status = Command::new(&self.program)
            .args(["image", "inspect", image])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        Ok(status.success())
    }

    async fn run_captured(&self, args: &[&str]) -> Result<String> {
        tracing::debug!("Running: {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuildError::BuildFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// `docker images -q` の出力からイメージ ID を取り出す（重複は除く）
fn parse_image_ids(output: &str) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_image_ids() {
        let ids = parse_image_ids("abc123\n\ndef456\nabc123\n  \n");
        assert_eq!(ids, vec!["abc123", "def456"]);
    }

    #[test]
    fn test_parse_image_ids_empty() {
        assert!(parse_image_ids("").is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_prune_with_failing_engine() {
        let builder = ImageBuilder::with_program("false");
        assert_eq!(builder.prune_dangling().await, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_build_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let map: tunnelship_config::ConfigMap = [
            ("projectName".to_string(), "app".to_string()),
            (
                "context".to_string(),
                temp_dir.path().to_str().unwrap().to_string(),
            ),
        ]
        .into();
        let config = BuildConfig::from_map(&map).unwrap();
        let dockerfile = Dockerfile::prepare(&config, false).unwrap();

        let result = ImageBuilder::with_program("false")
            .build_image(&config, &dockerfile)
            .await;
        assert!(matches!(result, Err(BuildError::BuildFailed(_))));
    }

    #[tokio::test]
    #[ignore] // Docker が必要なため、通常のテストではスキップ
    async fn test_build_html_image() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("index.html"), "<h1>ok</h1>").unwrap();
        let map: tunnelship_config::ConfigMap = [
            ("projectName".to_string(), "tunnelship-test".to_string()),
            ("kind".to_string(), "html".to_string()),
            (
                "context".to_string(),
                temp_dir.path().to_str().unwrap().to_string(),
            ),
        ]
        .into();
        let config = BuildConfig::from_map(&map).unwrap();
        let dockerfile = Dockerfile::prepare(&config, false).unwrap();

        let builder = ImageBuilder::new();
        builder.build_image(&config, &dockerfile).await.unwrap();
        assert!(builder.image_exists("tunnelship-test:latest").await.unwrap());
    }
}
