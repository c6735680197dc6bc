//! Agent binary entry point: parse flags, resolve config, install the
//! logger, then run the sampler/dispatcher task set until a shutdown
//! signal arrives.

use clap::Parser;
use vitals_core::config::{AgentCliArgs, AgentConfig};
use vitals_core::shutdown::Lifecycle;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let flags = AgentCliArgs::parse();
    let config = match AgentConfig::resolve(flags) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to resolve agent configuration: {err}");
            std::process::exit(1);
        }
    };

    let lifecycle = Lifecycle::new();
    let run_handle = tokio::spawn(vitals_agent::run(config, lifecycle.clone()));

    lifecycle.wait_for_signal().await;

    match run_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            eprintln!("agent exited with error: {err}");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("agent task panicked: {err}");
            std::process::exit(1);
        }
    }
}
