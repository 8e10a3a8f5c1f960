mod application;
mod domain;
mod infrastructure;
mod interfaces;

use crate::infrastructure::bootstrap::{build_state, init_tracing, restore_database};
use crate::infrastructure::config::ConfigService;
use crate::interfaces::http::{add_log, start_server};
use std::path::Path;
use std::sync::{Arc, Mutex};

fn io_error(err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(err.to_string())
}

/// Starts the HTTP service. `testgen restore <backup.db>` restores the
/// database from a backup instead and exits.
pub async fn run() -> std::io::Result<()> {
    let config = ConfigService::load().map_err(io_error)?;
    init_tracing(&config.config().app.log_level);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let [command, backup] = args.as_slice() {
        if command == "restore" {
            return restore_database(&config, Path::new(backup)).map_err(io_error);
        }
    }

    let app = &config.config().app;
    tracing::info!(name = %app.name, version = %app.version, "Starting");
    let (host, port) = config.config().bind_address();

    let logs = Arc::new(Mutex::new(Vec::new()));
    let state = build_state(config, &logs).await.map_err(|err| {
        tracing::error!(error = %err, "Startup failed");
        io_error(err)
    })?;

    let server = start_server(Arc::new(state), logs.clone())?;
    add_log(
        &logs,
        "INFO",
        "System",
        &format!("Backend initialized and HTTP server started on {}:{}", host, port),
    );
    server.await
}
