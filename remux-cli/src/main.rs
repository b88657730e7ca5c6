use std::process;

use aacts::cli::{Args, Commands};
use aacts::commands::{error_kind, exit_code, inspect_file, remux_file};
use anyhow::Result;
use clap::Parser;
use mimalloc::MiMalloc;
use pipeline_common::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = args.validate() {
        e.exit();
    }
    init_logging(args.verbose, args.quiet);

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal, cancelling");
        signal_token.cancel();
    });

    if let Err(e) = run(args, token).await {
        error!("Application error: {e:#}");
        eprintln!("Error [{}]: {e:#}", error_kind(&e));
        process::exit(exit_code(&e));
    }
}

async fn run(args: Args, token: CancellationToken) -> Result<()> {
    match args.command {
        Commands::Remux(remux_args) => {
            let summary = remux_file(&remux_args, token).await?;
            if !args.quiet {
                println!(
                    "{} frames, {} ADTS bytes -> {}, {} TS bytes -> {}",
                    summary.mux.frames,
                    summary.mux.es_bytes,
                    remux_args.aac_output().display(),
                    summary.mux.ts_bytes,
                    remux_args.ts_output().display(),
                );
            }
        }
        Commands::Inspect { input } => {
            let report = inspect_file(&input).await?;
            print!("{report}");
        }
    }
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(verbose)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
