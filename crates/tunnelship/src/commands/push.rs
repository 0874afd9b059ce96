use crate::PushArgs;
use colored::Colorize;
use tunnelship_config::{ConfigMap, PushConfig};
use tunnelship_push::{DockerCli, PushOrchestrator, PushReport, SshTunnelManager};

pub async fn handle(map: &ConfigMap, args: &PushArgs) -> anyhow::Result<()> {
    let config = PushConfig::from_map(map)?;

    println!("{}", "イメージをプッシュ中...".green());
    println!("イメージ: {}", config.source_image().cyan());
    println!(
        "転送先: {} (via {})",
        config.target().cyan(),
        config.ssh().cyan()
    );
    println!();
    println!(
        "{}",
        "⚠ プッシュが終わるまでアプリケーションを終了しないでください".yellow()
    );

    let tunnels = SshTunnelManager::new()
        .program(&args.ssh_bin)
        .args(&args.ssh_args);
    let orchestrator = PushOrchestrator::new(tunnels, DockerCli::with_program(&args.docker));

    let report = orchestrator
        .run(&config)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    print_summary(&config, &report);
    Ok(())
}

fn print_summary(config: &PushConfig, report: &PushReport) {
    println!();
    if report.pushed {
        println!("{}", "✓ PUSH SUCCESS".green().bold());
    } else {
        println!(
            "{}",
            "⚠ プッシュに失敗しました。上のログを確認してください".yellow().bold()
        );
    }
    println!(
        "  イメージ {} を {} にプッシュ",
        config.source_image().cyan(),
        config.ssh().cyan()
    );
    println!("  タグ: {}", report.tag);

    if !report.tag_removed {
        println!(
            "  {} ローカルのタグが残っています: docker rmi {}",
            "⚠".yellow(),
            report.tag
        );
    }
}
