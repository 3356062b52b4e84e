mod cli;

use agrimedia::{
    config,
    engine::MediaEngine,
    monitoring::{HealthReport, ReportOptions},
};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Dispatch, EngineCommand, FetchRequest};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "agrimedia=trace,agrimedia_common=debug".to_string()
        } else {
            "agrimedia=debug,agrimedia_common=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.dispatch() {
        Dispatch::Validate(config_path) => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Dispatch::Version => {
            println!("agrimedia {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Dispatch::Engine(command) => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run(command, cli.config.as_deref()))
        }
    }
}

async fn run(command: EngineCommand, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let engine = MediaEngine::from_config(config);

    match command {
        EngineCommand::Health { json } => {
            let report = engine.monitoring().health();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_health(&report);
            }
        }
        EngineCommand::Metrics { window_mins } => {
            let snapshot = engine
                .metrics()
                .snapshot(chrono::Duration::minutes(window_mins));
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        EngineCommand::Report {
            format,
            window_mins,
        } => {
            let options = ReportOptions::default()
                .with_format(format)
                .with_window(chrono::Duration::minutes(window_mins));
            println!("{}", engine.monitoring().report(&options));
        }
        EngineCommand::ClearCache => {
            let removed = engine
                .service()
                .clear_cache()
                .context("Failed to clear cache")?;
            println!("Cleared {} cache entries", removed);
        }
        EngineCommand::Fetch(request) => {
            let service = engine.service();
            let images = match request {
                FetchRequest::Theme { name } => vec![service.get_theme_image(name.as_deref()).await],
                FetchRequest::Category { name, count } => {
                    service.get_category_images(&name, count).await
                }
                FetchRequest::Section { name } => vec![service.get_section_image(&name).await],
            };
            println!("{}", serde_json::to_string_pretty(&images)?);
        }
    }

    Ok(())
}

fn print_health(report: &HealthReport) {
    println!("Overall: {}", report.status);
    println!("Active alerts: {}", report.active_alerts);
    println!();
    for component in &report.components {
        println!(
            "  {:<12} {:<9} {}",
            component.name, component.status, component.message
        );
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            for (name, provider) in [
                ("unsplash", &config.providers.unsplash),
                ("pexels", &config.providers.pexels),
            ] {
                println!(
                    "  {}: {}",
                    name,
                    if provider.enabled { "enabled" } else { "disabled" }
                );
            }
            println!(
                "  Cache: {} (max {} entries, ttl {}s, {:?})",
                if config.cache.enabled { "enabled" } else { "disabled" },
                config.cache.max_size,
                config.cache.default_ttl_secs,
                config.cache.eviction_policy
            );
            println!("  Categories: {}", config.categories.len());
            println!("  Alert rules: {}", config.monitoring.rules.len());
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!(
                "  Cache: max {} entries, ttl {}s",
                config.cache.max_size, config.cache.default_ttl_secs
            );
        }
    }

    Ok(())
}
