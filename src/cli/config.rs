use crate::collector::build_collector;
use crate::config::generate::{
    generate_example_collector, generate_starter_config, DEFAULT_COLLECTORS_PATH,
};
use crate::config::parse::load_collector;
use crate::invoker::{Invoker, Outcome};
use crate::storage::{MemoryStore, Storer};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    if stdout {
        print!("{}", generate_starter_config(DEFAULT_COLLECTORS_PATH));
        return Ok(());
    }

    // Try to write to ~/.config/collectord/config.yml first
    let config_path = if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/collectord/config.yml");

        // Create parent directory if it doesn't exist
        if let Some(parent) = user_config.parent() {
            match fs::create_dir_all(parent) {
                Ok(_) => Some(user_config),
                Err(_) => {
                    eprintln!("Warning: Could not create directory {}", parent.display());
                    eprintln!("Falling back to /etc/collectord/config.yml");
                    None
                }
            }
        } else {
            None
        }
    } else {
        None
    };

    let config_path = config_path.unwrap_or_else(|| PathBuf::from("/etc/collectord/config.yml"));

    if config_path.exists() {
        eprintln!(
            "Error: Config file already exists at {}",
            config_path.display()
        );
        eprintln!("Remove it first or use --stdout to print the config");
        std::process::exit(1);
    }

    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let collectors_dir = config_dir.join("collectors.d");
    fs::create_dir_all(&collectors_dir)?;

    fs::write(
        &config_path,
        generate_starter_config(&collectors_dir.display().to_string()),
    )?;
    println!("Config file written to {}", config_path.display());

    let example = collectors_dir.join("example.yml");
    if !example.exists() {
        fs::write(&example, generate_example_collector())?;
        println!("Example collector written to {}", example.display());
    }
    Ok(())
}

pub fn validate(collector_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating collector file: {}", collector_path.display());

    match load_collector(collector_path) {
        Ok(collector) => {
            println!(
                "✓ Collector '{}' is valid ({} strategy, {} sink(s))",
                collector.name,
                collector.invocation.strategy,
                collector.sinks.len()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Collector validation failed:\n{}", e);
            std::process::exit(1);
        }
    }
}

/// Runs a single invocation of one collector against an in-memory state
/// store. A windowed collector therefore always collects the most recent
/// complete window.
pub async fn invoke(collector_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_collector(collector_path)?;
    let storer: Arc<dyn Storer> = Arc::new(MemoryStore::new());
    let collector = build_collector(&config, storer.clone())?;
    let mut invoker = Invoker::new(Box::new(collector));

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let result = invoker.invoke(&cancel).await;
    let closed = invoker.close().await;
    storer.close().await?;

    match result? {
        Outcome::Collected { records } => {
            eprintln!("✓ Collector '{}' delivered {} record(s)", config.name, records)
        }
        Outcome::NotDue => eprintln!("✓ Collector '{}' has no complete window yet", config.name),
        Outcome::Advanced { windows, records } => {
            for window in &windows {
                eprintln!("  window {}", window);
            }
            eprintln!(
                "✓ Collector '{}' delivered {} record(s) for {} window(s)",
                config.name,
                records,
                windows.len()
            );
        }
    }
    closed?;
    Ok(())
}
