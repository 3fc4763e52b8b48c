//! Mock server wiring.
//!
//! Loads the route file, compiles the route table once and serves it with
//! request logging and panic recovery.

use crate::compiler::{MethodTable, RouteCompiler};
use crate::config::{RouteEntry, RouteFile, ServerSettings};
use crate::error::ConfigError;
use crate::latency::LatencyRegistry;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// A mock server with a compiled, immutable route table.
pub struct MockServer {
    router: Router,
    routes: usize,
}

impl MockServer {
    /// Compile entries with the standard methods and latency policies.
    pub fn new(entries: &[RouteEntry], verbose: bool) -> Result<Self, ConfigError> {
        let compiler = RouteCompiler::new(MethodTable::standard(), LatencyRegistry::with_defaults())
            .verbose(verbose);
        Self::with_compiler(&compiler, entries)
    }

    /// Compile entries with a caller-supplied compiler.
    pub fn with_compiler(compiler: &RouteCompiler, entries: &[RouteEntry]) -> Result<Self, ConfigError> {
        let dispatcher = compiler.compile(entries)?;
        let routes = dispatcher.len();

        let router = dispatcher
            .into_router()
            .layer(CatchPanicLayer::new())
            .layer(TraceLayer::new_for_http());

        Ok(Self { router, routes })
    }

    /// Load the route file named in `settings` and compile it.
    pub fn from_settings(settings: &ServerSettings) -> Result<Self, ConfigError> {
        info!(path = %settings.routes_file.display(), "Loading routes");
        let file = RouteFile::from_file(&settings.routes_file)?;
        Self::new(&file.routes, settings.verbose)
    }

    /// Number of registered `(method, path)` pairs.
    pub fn route_count(&self) -> usize {
        self.routes
    }

    /// The compiled router, for embedding or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until Ctrl+C.
    pub async fn run(self, listener: TcpListener) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        info!(address = %addr, routes = self.routes, "Mock server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Mock server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
    }
}
