//! tunnelship のイメージビルド機能
//!
//! 組み込みテンプレートからの Dockerfile 生成と、
//! docker CLI によるイメージのビルドを提供します。

pub mod builder;
pub mod error;
pub mod template;

pub use builder::ImageBuilder;
pub use error::{BuildError, Result};
pub use template::{Dockerfile, DockerfileTemplate, GENERATED_DOCKERFILE};
