//! Dockerfile テンプレート
//!
//! Teraを使用して組み込みテンプレートから Dockerfile を生成します。

use crate::error::{BuildError, Result};
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tunnelship_config::{BuildConfig, DockerfileKind};

const GO_TEMPLATE: &str = include_str!("templates/go.Dockerfile.tera");
const HTML_TEMPLATE: &str = include_str!("templates/html.Dockerfile.tera");

/// 生成した Dockerfile を置くファイル名
pub const GENERATED_DOCKERFILE: &str = "Dockerfile.tunnelship";

pub struct DockerfileTemplate {
    tera: Tera,
}

impl DockerfileTemplate {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("go.Dockerfile", GO_TEMPLATE),
            ("html.Dockerfile", HTML_TEMPLATE),
        ])?;
        Ok(Self { tera })
    }

    /// 設定から Dockerfile の内容を生成
    pub fn render(&self, config: &BuildConfig) -> Result<String> {
        let mut context = Context::new();
        context.insert("base", &config.base);
        context.insert("os", &config.os);
        context.insert("path", &config.path);
        context.insert("add_on", &config.add_on);
        context.insert("run", &config.run);

        let name = match config.kind {
            DockerfileKind::Go => "go.Dockerfile",
            DockerfileKind::Html => "html.Dockerfile",
        };
        Ok(self.tera.render(name, &context)?)
    }
}

/// ビルドに使う Dockerfile
///
/// 生成したファイルはドロップ時に削除する。
#[derive(Debug)]
pub struct Dockerfile {
    path: PathBuf,
    generated: bool,
}

impl Dockerfile {
    /// Dockerfile を用意する
    ///
    /// コンテキストに `Dockerfile` があり `regenerate` でなければそれを使う。
    /// それ以外はテンプレートから `Dockerfile.tunnelship` を生成する。
    pub fn prepare(config: &BuildConfig, regenerate: bool) -> Result<Self> {
        if !config.context.is_dir() {
            return Err(BuildError::ContextNotFound(config.context.clone()));
        }

        let existing = config.context.join("Dockerfile");
        if existing.exists() && !regenerate {
            tracing::debug!("Using existing Dockerfile: {}", existing.display());
            return Ok(Self {
                path: existing,
                generated: false,
            });
        }

        let content = DockerfileTemplate::new()?.render(config)?;
        let path = config.context.join(GENERATED_DOCKERFILE);
        std::fs::write(&path, content)?;
        tracing::debug!("Generated Dockerfile: {}", path.display());

        Ok(Self {
            path,
            generated: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }
}

impl Drop for Dockerfile {
    fn drop(&mut self) {
        if self.generated {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!("Could not remove {}: {}", self.path.display(), e);
            }
        }
    }
}
