mod views;

use crate::views::{DEFAULT_ROUTE, Route};
use live_view_runtime::RuntimeConfig;
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

const ROUTE_VAR: &str = "LIVE_VIEW_ROUTE";

fn main() {
    // Stdout carries the protocol.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run() {
        eprintln!("view_host fatal error: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = RuntimeConfig::from_env();
    let path = std::env::var(ROUTE_VAR).unwrap_or_else(|_| DEFAULT_ROUTE.to_string());
    let route = Route::parse(&path).ok_or_else(|| format!("unknown route: {path}"))?;

    info!(sid = %config.sid, ?route, "serving view");
    live_view_runtime::run(&config, route.view())?;
    Ok(())
}
