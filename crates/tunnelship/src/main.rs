mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tunnelship")]
#[command(
    about = "Build container images and push them through an SSH tunnel",
    long_about = None
)]
struct Cli {
    /// 設定ファイル (YAML)。省略時は tunnelship.yaml などを探す
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// デバッグログを表示
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// イメージをSSHトンネル経由でレジストリにプッシュ
    Push {
        #[command(flatten)]
        project: ProjectArgs,
        #[command(flatten)]
        push: PushArgs,
    },
    /// Dockerイメージをビルド
    Build {
        #[command(flatten)]
        project: ProjectArgs,
        #[command(flatten)]
        build: BuildArgs,
        /// ビルド後にプッシュする
        #[arg(long)]
        push: bool,
        #[command(flatten)]
        push_args: PushArgs,
    },
    /// バージョン情報を表示
    Version,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ProjectArgs {
    /// プロジェクト名（イメージ名）
    #[arg(short = 'n', long)]
    pub project_name: Option<String>,
    /// イメージタグ（デフォルト: latest）
    #[arg(short = 't', long)]
    pub project_tag: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PushArgs {
    /// リモートレジストリのポート（target 未指定時に localhost:<port> を使う）
    #[arg(long)]
    pub port: Option<String>,
    /// トンネルの転送先 (host:port)
    #[arg(long, env = "TUNNELSHIP_TARGET")]
    pub target: Option<String>,
    /// 実行環境 (mac: Docker for Mac)
    #[arg(long)]
    pub env: Option<String>,
    /// SSH の接続先 (user@host)
    #[arg(long, env = "TUNNELSHIP_SSH")]
    pub ssh: Option<String>,
    /// docker コマンド
    #[arg(long, default_value = "docker")]
    pub docker: String,
    /// ssh コマンド
    #[arg(long, default_value = "ssh")]
    pub ssh_bin: String,
    /// ssh に渡す追加引数（複数指定可）
    #[arg(long = "ssh-arg", allow_hyphen_values = true)]
    pub ssh_args: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// ビルドコンテキスト
    #[arg(long)]
    pub context: Option<String>,
    /// Dockerfileの種類 (go, html)
    #[arg(long)]
    pub kind: Option<String>,
    /// ビルドステージのベースイメージ
    #[arg(long)]
    pub base: Option<String>,
    /// 実行ステージのイメージ
    #[arg(long)]
    pub os: Option<String>,
    /// ADD の後に挿入する Dockerfile 命令（ENV GOPATH=... など）
    #[arg(long)]
    pub path: Option<String>,
    /// ビルド前に挿入する追加の Dockerfile 命令
    #[arg(long)]
    pub add_on: Option<String>,
    /// ビルドステージで実行するコマンド
    #[arg(long)]
    pub run: Option<String>,
    /// 既存のDockerfileがあってもテンプレートから生成する
    #[arg(long)]
    pub regenerate: bool,
    /// dangling イメージの削除をスキップ
    #[arg(long)]
    pub no_prune: bool,
    /// Dockerfileを表示するだけでビルドしない
    #[arg(long)]
    pub dry_run: bool,
}

impl ProjectArgs {
    fn overrides(&self) -> Vec<(String, String)> {
        pairs([
            ("projectName", &self.project_name),
            ("projectTag", &self.project_tag),
        ])
    }
}

impl PushArgs {
    fn overrides(&self) -> Vec<(String, String)> {
        pairs([
            ("port", &self.port),
            ("target", &self.target),
            ("env", &self.env),
            ("ssh", &self.ssh),
        ])
    }
}

impl BuildArgs {
    fn overrides(&self) -> Vec<(String, String)> {
        pairs([
            ("context", &self.context),
            ("kind", &self.kind),
            ("base", &self.base),
            ("os", &self.os),
            ("path", &self.path),
            ("addOn", &self.add_on),
            ("run", &self.run),
        ])
    }
}

/// 指定されたフラグだけを設定キーに変換
fn pairs<const N: usize>(values: [(&str, &Option<String>); N]) -> Vec<(String, String)> {
    values
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| (key.to_string(), v.clone())))
        .collect()
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログはstderrに出力（stdoutは進捗表示とDockerfile出力に使う）
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Version => {
            println!("tunnelship {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Push { project, push } => {
            let overrides = project.overrides().into_iter().chain(push.overrides());
            let map = tunnelship_config::load_config_map(cli.config.as_deref(), overrides)?;
            commands::push::handle(&map, &push).await?;
        }
        Commands::Build {
            project,
            build,
            push,
            push_args,
        } => {
            let overrides = project
                .overrides()
                .into_iter()
                .chain(build.overrides())
                .chain(push_args.overrides());
            let map = tunnelship_config::load_config_map(cli.config.as_deref(), overrides)?;
            commands::build::handle(&map, &build, &push_args.docker).await?;

            if push && !build.dry_run {
                println!();
                commands::push::handle(&map, &push_args).await?;
            }
        }
    }

    Ok(())
}
