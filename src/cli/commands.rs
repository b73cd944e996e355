//! CLI command implementations
//!
//! `start` boots in a fixed order: configuration, logging, stores,
//! transport, router. The HTTP listener only opens once the router is
//! `Running`, so no request can publish into a topic nobody consumes yet.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tracing::{error, info, warn};

use super::args::Command;
use super::errors::{CliError, CliResult};
use crate::auth::AuthValidator;
use crate::config::Config;
use crate::fanout::register_handlers;
use crate::feed_store::open_feed_store;
use crate::http_server::{AppState, HttpServer};
use crate::observability::init_logging;
use crate::post_store::open_post_store;
use crate::router::Router;
use crate::transport::open_transport;

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Start { config } => start(&config),
        Command::Check { config } => check(&config),
    }
}

/// Print the effective configuration with secrets redacted
pub fn check(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;

    let summary = json!({
        "mode": config.mode,
        "transport": config.messaging.transport_kind(config.mode),
        "http": config.http.socket_addr(),
        "application_url": config.http.public_url(),
        "allow_origin": config.http.allow_origin,
        "auth_enabled": config.auth.enable,
        "log": config.log,
        "overrides": config.overrides,
    });
    let rendered = serde_json::to_string_pretty(&summary)
        .map_err(|e| CliError::Config(crate::config::ConfigError::Parse(e.to_string())))?;
    println!("{}", rendered);
    Ok(())
}

/// Load configuration, start logging and serve until interrupted
pub fn start(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    init_logging(&config.log)?;

    for variable in &config.overrides {
        info!(variable = %variable, "Configuration overridden from environment");
    }

    let rt = tokio::runtime::Runtime::new().map_err(|e| CliError::Runtime(e.to_string()))?;
    rt.block_on(serve(config))
}

/// Open stores and transport, then register the fan-out handlers on a new
/// router. The router is returned unstarted inside the state.
pub async fn bootstrap(config: &Config) -> CliResult<AppState> {
    let feeds = open_feed_store(config.mode, &config.feeds_storage).await?;
    let posts = open_post_store(config.mode, &config.posts_storage).await?;
    let transport = open_transport(config.mode, &config.messaging).await?;

    let router = Arc::new(Router::new(transport));
    register_handlers(&router, Arc::clone(&feeds))?;

    Ok(AppState::new(
        router,
        feeds,
        posts,
        AuthValidator::new(&config.auth),
    ))
}

/// Start the router, then serve HTTP until ctrl-c
pub async fn serve(config: Config) -> CliResult<()> {
    let state = bootstrap(&config).await?;
    let router = Arc::clone(&state.router);

    if let Err(e) = router.start().await {
        error!(error = %e, "Router failed to start");
        return Err(e.into());
    }
    info!(
        mode = %config.mode,
        handlers = router.handler_count(),
        "Router running"
    );

    let watched = Arc::clone(&router);
    tokio::spawn(async move {
        let state = watched.stopped().await;
        info!(state = %state, "Router no longer consuming");
    });

    let server = HttpServer::new(config.http.clone(), state);
    let shutdown_router = Arc::clone(&router);
    let shutdown = async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => {
                warn!(error = %e, "Cannot listen for ctrl-c, serving until killed");
                std::future::pending::<()>().await;
            }
        }
        // Closing the transport also ends every live stream
        if let Err(e) = shutdown_router.shutdown().await {
            warn!(error = %e, "Router shutdown incomplete");
        }
    };

    server.start(shutdown).await?;
    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Mode, TransportKind};
    use crate::router::RouterState;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_check_valid_config() {
        let file = write_config(r#"{"mode": "inmemory"}"#);
        check(file.path()).unwrap();
    }

    #[test]
    fn test_check_rejects_wildcard_origin() {
        let file = write_config(r#"{"http": {"allow_origin": "*"}}"#);
        assert!(matches!(check(file.path()), Err(CliError::Config(_))));
    }

    #[test]
    fn test_check_missing_file() {
        let result = check(Path::new("/nonexistent/feedline.json"));
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[tokio::test]
    async fn test_bootstrap_registers_fanout_handlers() {
        let config = Config::default();
        assert_eq!(config.messaging.transport_kind(Mode::InMemory), TransportKind::Channel);

        let state = bootstrap(&config).await.unwrap();
        assert_eq!(state.router.handler_count(), 2);
        assert_eq!(state.router.state(), RouterState::Uninitialized);

        state.router.start().await.unwrap();
        assert_eq!(state.router.state(), RouterState::Running);
        state.router.shutdown().await.unwrap();
    }

    #[cfg(not(feature = "mysql"))]
    #[tokio::test]
    async fn test_bootstrap_fails_fast_without_backend() {
        let config = Config {
            mode: Mode::Persistent,
            ..Default::default()
        };
        assert!(matches!(
            bootstrap(&config).await,
            Err(CliError::FeedStore(_))
        ));
    }
}
