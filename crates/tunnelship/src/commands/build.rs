use crate::BuildArgs;
use colored::Colorize;
use tunnelship_build::{Dockerfile, DockerfileTemplate, ImageBuilder};
use tunnelship_config::{BuildConfig, ConfigMap};

pub async fn handle(map: &ConfigMap, args: &BuildArgs, docker: &str) -> anyhow::Result<()> {
    let config = BuildConfig::from_map(map)?;

    if args.dry_run {
        let content = DockerfileTemplate::new()?.render(&config)?;
        print!("{}", content);
        return Ok(());
    }

    println!("{}", "Dockerイメージをビルド中...".green());
    println!("イメージ: {}", config.image().cyan());
    println!("コンテキスト: {}", config.context.display().to_string().cyan());

    let dockerfile = Dockerfile::prepare(&config, args.regenerate)
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    if dockerfile.is_generated() {
        println!("Dockerfile: テンプレートから生成 ({:?})", config.kind);
    } else {
        println!(
            "Dockerfile: {}",
            dockerfile.path().display().to_string().cyan()
        );
    }
    println!();

    let builder = ImageBuilder::with_program(docker);
    builder
        .build_image(&config, &dockerfile)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    if !args.no_prune {
        builder.prune_dangling().await;
    }

    println!();
    println!("{}", "✓ BUILD SUCCESS".green().bold());
    println!("  イメージ: {}", config.image().cyan());
    Ok(())
}
