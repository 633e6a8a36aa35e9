use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bootstrap::{Application, InitOptions, Release, initialize_application, wait_for_shutdown};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use comfy_table::presets::UTF8_FULL;
use managers::{ADMIN_S3_COMMAND, ListObjectsInput, S3AdminCommand};

/// The main entry point for the Launchpad application.
#[tokio::main]
async fn main() -> ExitCode {
    // Environment overrides may come from an optional .env file.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let options = InitOptions {
        config_folder: cli.config_folder.clone(),
        countdown: Duration::from_secs(cli.countdown_seconds),
    };

    let result = match cli.command {
        Commands::Run => handle_run(options).await,
        Commands::ListObjects(args) => handle_list_objects(options, args).await,
        Commands::ShowConfig => handle_show_config(&options.config_folder),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Starts the application's clients and managers, and tears them down in reverse.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Folder holding main.toml and the optional main-local.toml.
    #[arg(long, default_value = "config", global = true)]
    config_folder: PathBuf,

    /// Seconds to wait after the destructive-settings alerts before anything is touched.
    #[arg(long, default_value_t = 0, global = true)]
    countdown_seconds: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start everything and serve chat-bot commands until Ctrl+C.
    Run,
    /// List the objects of a bucket.
    ListObjects(ListObjectsArgs),
    /// Print the effective configuration with secrets masked.
    ShowConfig,
}

#[derive(Parser)]
struct ListObjectsArgs {
    /// Bucket to list. Defaults to `s3_manager.bucket`.
    #[arg(long)]
    bucket: Option<String>,

    /// Only list keys starting with this prefix.
    #[arg(long)]
    prefix: Option<String>,
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn start(options: InitOptions) -> anyhow::Result<(Application, Release)> {
    let (application, release) = initialize_application(options)
        .await
        .context("Application startup failed")?;
    Ok((application, release))
}

async fn handle_run(options: InitOptions) -> anyhow::Result<()> {
    let (application, release) = start(options).await?;

    let bot = &application.chat_bot_manager;
    let s3_command = S3AdminCommand::new(Arc::clone(&application.s3_manager), bot.context());
    bot.handle_admin(ADMIN_S3_COMMAND, Arc::new(s3_command)).await;

    if let Err(e) = application
        .stat_manager
        .add_simple("ApplicationStarted", "Application is running")
        .await
    {
        tracing::warn!(error = %e, "Could not record the start event");
    }

    tracing::info!(
        bot = %application.chat_bot_manager.bot().me().username.as_deref().unwrap_or_default(),
        "Application is running, press Ctrl+C to stop"
    );
    wait_for_shutdown().await;

    release.release_all().await;
    Ok(())
}

async fn handle_list_objects(options: InitOptions, args: ListObjectsArgs) -> anyhow::Result<()> {
    let (application, release) = start(options).await?;

    let input = ListObjectsInput {
        bucket: args.bucket,
        prefix: args.prefix,
        max_keys: None,
    };
    let listed = application.s3_manager.list_objects(input).await;

    // Release before reporting, whatever the listing returned.
    release.release_all().await;
    let objects = listed.context("Listing objects failed")?;

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["Key", "Size", "Last Modified", "Storage Class"]);
    for object in &objects {
        table.add_row(vec![
            object.key.clone(),
            object.size.to_string(),
            object
                .last_modified
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            object.storage_class.clone().unwrap_or_default(),
        ]);
    }

    println!("{table}");
    println!("{} object(s)", objects.len());
    Ok(())
}

fn handle_show_config(config_folder: &std::path::Path) -> anyhow::Result<()> {
    let config = configuration::load_config(config_folder)
        .with_context(|| format!("Cannot load configuration from {}", config_folder.display()))?;

    for alert in config.destructive_alerts() {
        println!("{}", bootstrap::alerts::red(alert));
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Key", "Value"]);
    for (key, value) in config.summary() {
        table.add_row(vec![key.to_string(), value]);
    }

    println!("{table}");
    Ok(())
}
