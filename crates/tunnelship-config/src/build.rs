//! ビルド設定

use crate::error::{ConfigError, Result};
use crate::push::DEFAULT_PROJECT_TAG;
use crate::{ConfigMap, non_empty};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_BASE_IMAGE: &str = "golang:1.22";
pub const DEFAULT_RUNTIME_IMAGE: &str = "debian:bookworm-slim";
pub const DEFAULT_BUILD_COMMAND: &str = "go build -o /app .";

/// 生成する Dockerfile の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DockerfileKind {
    /// マルチステージの Go アプリケーション
    #[default]
    Go,
    /// 静的 HTML を配信する軽量イメージ
    Html,
}

impl FromStr for DockerfileKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "go" => Ok(DockerfileKind::Go),
            "html" => Ok(DockerfileKind::Html),
            other => Err(ConfigError::InvalidValue {
                key: "kind",
                value: other.to_string(),
                reason: "go または html を指定してください".to_string(),
            }),
        }
    }
}

/// 1回のビルドに使う設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    pub project_name: String,
    pub project_tag: String,
    pub kind: DockerfileKind,
    /// ビルドステージのベースイメージ
    pub base: String,
    /// 実行ステージのイメージ
    pub os: String,
    /// ADD の後に挿入する Dockerfile 命令（ENV GOPATH=... や WORKDIR など）
    pub path: String,
    /// ビルド前に挿入する追加の Dockerfile 命令（パッケージのインストールなど）
    pub add_on: String,
    /// ビルドステージで実行するコマンド（成果物は /app に出力する）
    pub run: String,
    /// ビルドコンテキスト
    pub context: PathBuf,
}

impl BuildConfig {
    pub fn from_map(map: &ConfigMap) -> Result<Self> {
        let project_name = non_empty(map, "projectName")
            .ok_or(ConfigError::MissingKey("projectName", "project-name"))?
            .to_string();

        let kind = non_empty(map, "kind")
            .map(DockerfileKind::from_str)
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            project_name,
            project_tag: non_empty(map, "projectTag")
                .unwrap_or(DEFAULT_PROJECT_TAG)
                .to_string(),
            kind,
            base: non_empty(map, "base")
                .unwrap_or(DEFAULT_BASE_IMAGE)
                .to_string(),
            os: non_empty(map, "os")
                .unwrap_or(DEFAULT_RUNTIME_IMAGE)
                .to_string(),
            path: non_empty(map, "path").unwrap_or_default().to_string(),
            add_on: non_empty(map, "addOn").unwrap_or_default().to_string(),
            run: non_empty(map, "run")
                .unwrap_or(DEFAULT_BUILD_COMMAND)
                .to_string(),
            context: PathBuf::from(non_empty(map, "context").unwrap_or(".")),
        })
    }

    /// `name:tag` 形式のイメージ名
    pub fn image(&self) -> String {
        format!("{}:{}", self.project_name, self.project_tag)
    }
}
