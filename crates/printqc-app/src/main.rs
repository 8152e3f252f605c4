//! printqc application binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Initialize tracing
//! 3. Spawn the batch session
//! 4. Drive the console from stdin (or a script file) until /quit or EOF

mod cli;
mod console;

use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use printqc_batch::{BatchController, Session};
use printqc_core::config::PrintQcConfig;
use printqc_export::CsvExporter;

use crate::cli::CliArgs;
use crate::console::{Console, Flow};

/// Feed lines to the console until it asks to quit, input ends or Ctrl-C.
async fn drive<R, W>(console: &mut Console<W>, reader: R) -> Result<(), Box<dyn std::error::Error>>
where
    R: AsyncBufRead + Unpin,
    W: std::io::Write,
{
    let mut lines = reader.lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        };
        let Some(line) = line else { break };
        if console.handle_line(&line).await? == Flow::Quit {
            break;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = PrintQcConfig::load_or_default(&config_file);
    args.apply_overrides(&mut config);

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting printqc v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    // Batch session.
    let controller = BatchController::from_config(&config);
    tracing::info!(
        start_sequence = controller.next_sequence(),
        auto_print = config.batch.auto_print,
        "Batch session ready"
    );
    let (session, session_task) = Session::spawn(controller);

    let auto_print_delay = config
        .batch
        .auto_print
        .then(|| config.batch.auto_print_delay());
    let mut console = Console::new(
        session,
        CsvExporter::new(config.export.clone()),
        config.listener.clone(),
        auto_print_delay,
        std::io::stdout(),
    );

    // Console.
    match args.script {
        Some(ref path) => {
            let file = tokio::fs::File::open(path).await?;
            tracing::info!(path = %path.display(), "Running script");
            drive(&mut console, BufReader::new(file)).await?;
        }
        None => {
            println!("printqc ready. Type /help for commands.");
            drive(&mut console, BufReader::new(tokio::io::stdin())).await?;
        }
    }

    // Dropping the console releases the last session handle.
    console.finish().await?;
    let controller = session_task.await?;
    tracing::info!(
        batches = controller.ledger().len(),
        next_sequence = controller.next_sequence(),
        "printqc stopped"
    );

    Ok(())
}
