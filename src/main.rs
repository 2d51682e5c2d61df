mod api;
mod cli;
mod config;
mod dataset;
mod pipeline;

use crate::cli::onboard::run_onboarding;
use crate::cli::{Cli, Commands, ConfigCommands};
use crate::config::Config;
use crate::dataset::Dataset;
use crate::pipeline::filter::Selection;
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            let _ = run_onboarding()?;
            Ok(())
        }
        Commands::Config { command } => handle_config_command(command),
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Serve => {
            let config = load_config()?;
            run_service(config).await
        }
        Commands::Dashboard => handle_dashboard(),
        Commands::Report { province, year } => handle_report(province, year),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            println!("Config saved: {key} = {value}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_status() -> Result<()> {
    let config = load_config()?;
    let dataset = Dataset::load(&config.dataset_path)?;

    println!("covidash status");
    println!("- dataset_path: {}", config.dataset_path.display());
    println!("- rows: {}", dataset.len());
    println!("- provinces: {}", dataset.provinces().len());
    println!("- islands: {}", dataset.islands().len());
    println!(
        "- date_range: {}",
        dataset
            .date_range()
            .map(|(first, last)| format!("{first} .. {last}"))
            .unwrap_or_else(|| "none".to_string())
    );
    println!("- report_dir: {}", config.report_dir.display());
    println!("- api_port: {}", config.api_port);

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_or_default_config()?;

    match Dataset::load(&config.dataset_path) {
        Ok(dataset) => {
            println!(
                "[OK] dataset loads: {} rows from {}",
                dataset.len(),
                config.dataset_path.display()
            );

            if dataset.is_empty() {
                println!("[WARN] dataset has no rows");
                issues.push("dataset empty".to_string());
            }

            let out_of_bounds = dataset.out_of_bounds_count();
            if out_of_bounds == 0 {
                println!("[OK] all coordinates inside the Indonesia bounding box");
            } else {
                println!("[WARN] {out_of_bounds} row(s) have coordinates outside Indonesia");
                issues.push("coordinates out of bounds".to_string());
            }

            let mismatches = dataset.active_mismatch_count();
            if mismatches == 0 {
                println!("[OK] active cases match cases - deaths - recovered on every row");
            } else {
                println!("[WARN] {mismatches} row(s) where active != cases - deaths - recovered");
                issues.push("active case mismatch".to_string());
            }
        }
        Err(error) => {
            println!("[WARN] dataset check failed: {error}");
            issues.push("dataset unreadable".to_string());
        }
    }

    if config.report_dir.exists() {
        println!("[OK] report dir exists: {}", config.report_dir.display());
    } else {
        println!("[WARN] report dir missing: {}", config.report_dir.display());
        issues.push("report dir missing".to_string());
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_dashboard() -> Result<()> {
    let config = load_config()?;
    ensure_dashboard_backend(&config)?;
    let url = format!("http://127.0.0.1:{}", config.api_port);

    #[cfg(target_os = "macos")]
    {
        Command::new("open")
            .arg(&url)
            .status()
            .context("Failed to open browser")?;
    }

    println!("Dashboard URL: {url}");
    Ok(())
}

fn handle_report(province: Option<String>, year: Option<String>) -> Result<()> {
    let config = load_config()?;
    let dataset = Dataset::load(&config.dataset_path)?;
    let selection = Selection::from_params(province.as_deref(), year.as_deref())?;

    let (summary, saved) = pipeline::generate_and_store_report(&config, &dataset, &selection)?;

    println!("Report generated: {} / {}", summary.province, summary.year);
    println!("- Matching rows: {}", summary.row_count);
    println!("- Markdown: {}", saved.markdown_path.display());
    println!("- JSON: {}", saved.json_path.display());

    Ok(())
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;
    let dataset = Dataset::load(&config.dataset_path)?;

    let shared_config = Arc::new(config);
    let shared_dataset = Arc::new(dataset);

    info!("covidash service started");

    tokio::select! {
        api_result = api::run_server(Arc::clone(&shared_config), Arc::clone(&shared_dataset)) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn load_or_default_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.ensure_bootstrap_files()?;
        config.save()?;
        Ok(config)
    })
}

fn load_config() -> Result<Config> {
    Config::load().context("Config file not found. Run `covidash onboard` first.")
}

fn ensure_dashboard_backend(config: &Config) -> Result<()> {
    if is_port_open(config.api_port) {
        return Ok(());
    }

    let current_exe =
        std::env::current_exe().context("Failed to resolve current executable path")?;
    let mut command = Command::new(current_exe);
    command
        .arg("serve")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .stdin(Stdio::null());

    command
        .spawn()
        .context("Failed to spawn dashboard backend process")?;
    thread::sleep(Duration::from_millis(900));

    if !is_port_open(config.api_port) {
        bail!("Failed to start dashboard server. Run `covidash serve` in another terminal.");
    }

    Ok(())
}

fn is_port_open(port: u16) -> bool {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpStream::connect_timeout(&addr, Duration::from_millis(250)).is_ok()
}
