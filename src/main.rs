use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use originhttpd::app::App;
use originhttpd::cli::CliArgs;
use originhttpd::config;
use originhttpd::response::{APP_NAME, APP_VERSION};

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.version {
        println!("{APP_NAME} {APP_VERSION}");
        return ExitCode::SUCCESS;
    }

    let Some(config_path) = args.config else {
        eprintln!("error: --config <FILE> is required (or pass --version)");
        return ExitCode::FAILURE;
    };

    let configs = match config::load(&config_path) {
        Ok(configs) => configs,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let app = Arc::new(App::new(configs));

    let signal_app = app.clone();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        println!("shutdown signal received, stopping server...");
        signal_app.shutdown();
    });

    let result = app.run().await;
    signal_task.abort();

    if let Err(e) = result {
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    println!("server shutdown complete");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
