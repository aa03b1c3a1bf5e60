//! `idverify` - CLI for the identity verification client
//!
//! This binary signs an officer in and verifies face stills, either in one
//! shot from image files or through an interactive console.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::{self, Write};
use std::sync::Arc;

use clap::Parser;

use idverify::cli::console::{run_batch, run_shell};
use idverify::cli::output::{write_history, write_outcome};
use idverify::cli::{Cli, Command, ConfigCommand, ShellCommand, VerifyCommand};
use idverify::{init_logging, App, Camera, Config, ReqwestTransport, StillImageCamera};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Verify(cmd) => handle_verify(config, &cmd).await,
        Command::Shell(cmd) => handle_shell(config, &cmd).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

async fn handle_verify(config: Config, cmd: &VerifyCommand) -> anyhow::Result<()> {
    let Some(first) = cmd.images.first() else {
        anyhow::bail!("at least one --image is required");
    };
    let mut app = App::new(
        config,
        Arc::new(ReqwestTransport::new()),
        Box::new(StillImageCamera::from_path(first)),
    );
    let cameras = cmd.images.iter().map(|path| {
        let camera: Box<dyn Camera> = Box::new(StillImageCamera::from_path(path));
        (path.display().to_string(), camera)
    });
    let report = run_batch(&mut app, &cmd.officer_id, &cmd.password, cameras).await?;

    let mut out = io::stdout().lock();
    if cmd.json {
        let outcomes: Vec<_> = report
            .outcomes
            .iter()
            .map(|(image, outcome)| serde_json::json!({ "image": image, "result": outcome }))
            .collect();
        let body = serde_json::json!({
            "results": outcomes,
            "history": report.history.entries().collect::<Vec<_>>(),
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&body)?)?;
    } else {
        for (image, outcome) in &report.outcomes {
            writeln!(out, "[{image}]")?;
            write_outcome(&mut out, outcome)?;
            writeln!(out)?;
        }
        writeln!(out, "History")?;
        writeln!(out, "-------")?;
        write_history(&mut out, &report.history)?;
    }
    Ok(())
}

async fn handle_shell(config: Config, cmd: &ShellCommand) -> anyhow::Result<()> {
    let mut app = App::new(
        config,
        Arc::new(ReqwestTransport::new()),
        Box::new(StillImageCamera::from_path(&cmd.camera)),
    );
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut out = io::stdout();
    writeln!(out, "idverify console. Type 'help' for commands.")?;
    run_shell(&mut app, stdin, &mut out).await
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                let unset = "(not set)";
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Endpoints]");
                println!(
                    "  Login base URL:     {}",
                    config.endpoints.login_base_url.as_deref().unwrap_or(unset)
                );
                println!(
                    "  Verify URL:         {}",
                    config.endpoints.verify_url.as_deref().unwrap_or(unset)
                );
                println!("  Source bucket:      {}", config.endpoints.source_bucket);
                println!();
                println!("[Camera]");
                println!(
                    "  Resolution:         {}x{}",
                    config.camera.width, config.camera.height
                );
                println!();
                println!("[Preferences]");
                println!("  Auto capture:       {}", config.preferences.auto_capture);
                println!("  Sound:              {}", config.preferences.sound_enabled);
                println!("  High quality:       {}", config.preferences.high_quality);
                println!("  Notifications:      {}", config.preferences.notifications);
                println!();
                println!("[History]");
                println!(
                    "  Record failures:    {}",
                    config.history.record_failures
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
