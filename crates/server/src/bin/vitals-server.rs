//! Server binary entry point: parse flags, resolve config, install the
//! logger, then run the HTTP/gRPC listener task set until a shutdown
//! signal arrives.

use clap::Parser;
use vitals_core::config::{ServerCliArgs, ServerConfig};
use vitals_core::shutdown::Lifecycle;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let flags = ServerCliArgs::parse();
    let config = match ServerConfig::resolve(flags) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to resolve server configuration: {err}");
            std::process::exit(1);
        }
    };

    let lifecycle = Lifecycle::new();
    let run_handle = tokio::spawn(vitals_server::run(config, lifecycle.clone()));

    lifecycle.wait_for_signal().await;

    match run_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            eprintln!("server exited with error: {err}");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("server task panicked: {err}");
            std::process::exit(1);
        }
    }
}
