//! Route table construction and request dispatch.
//!
//! Handlers are registered while routes compile; [`Dispatcher::into_router`]
//! then freezes the table into an [`axum::Router`], which does the matching
//! at request time. Nothing can be registered after that.

use crate::error::ConfigError;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use axum::Router;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Body returned when no route matches.
pub const NOT_FOUND_BODY: &str =
    r#"{"error":"not_found","message":"No matching route found"}"#;

/// Handlers for one path, keyed by method.
struct PathRoutes {
    path: String,
    handlers: HashMap<Method, MethodRouter>,
}

/// Mutable route table, used only during compilation.
#[derive(Default)]
pub struct Dispatcher {
    /// Paths in first-registration order
    paths: Vec<PathRoutes>,
    index: HashMap<String, usize>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `(method, path)`.
    ///
    /// A second registration for the same pair replaces the first. Returns
    /// `true` when that happened. A new path whose parameter names clash
    /// with an already registered path is rejected, since the router cannot
    /// hold both.
    pub fn register(
        &mut self,
        method: Method,
        path: &str,
        handler: MethodRouter,
    ) -> Result<bool, ConfigError> {
        let slot = match self.index.get(path) {
            Some(&slot) => slot,
            None => {
                if let Some(existing) = self.paths.iter().find(|p| params_conflict(&p.path, path)) {
                    return Err(ConfigError::InvalidPath {
                        method: method.to_string(),
                        path: path.to_string(),
                        reason: format!(
                            "parameter names conflict with already registered path {}",
                            existing.path
                        ),
                    });
                }
                self.paths.push(PathRoutes {
                    path: path.to_string(),
                    handlers: HashMap::new(),
                });
                self.index.insert(path.to_string(), self.paths.len() - 1);
                self.paths.len() - 1
            }
        };

        let replaced = self.paths[slot].handlers.insert(method.clone(), handler).is_some();
        if replaced {
            warn!(
                method = %method,
                path = %path,
                "Duplicate route, the later definition replaces the earlier one"
            );
        }
        Ok(replaced)
    }

    pub fn contains(&self, method: &Method, path: &str) -> bool {
        self.index
            .get(path)
            .is_some_and(|&slot| self.paths[slot].handlers.contains_key(method))
    }

    /// Number of registered `(method, path)` pairs.
    pub fn len(&self) -> usize {
        self.paths.iter().map(|p| p.handlers.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Freeze the table into a router.
    pub fn into_router(self) -> Router {
        let mut router = Router::new();
        for PathRoutes { path, handlers } in self.paths {
            let method_router = handlers
                .into_values()
                .fold(MethodRouter::new(), MethodRouter::merge);
            router = router.route(&path, method_router);
        }
        router.fallback(not_found)
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for routes in &self.paths {
            let mut methods: Vec<&str> = routes.handlers.keys().map(Method::as_str).collect();
            methods.sort_unstable();
            map.entry(&routes.path, &methods);
        }
        map.finish()
    }
}

/// Whether two distinct paths put different parameters at the same position
/// after an identical prefix.
fn params_conflict(a: &str, b: &str) -> bool {
    for (left, right) in a.split('/').zip(b.split('/')) {
        if left == right {
            continue;
        }
        return left.starts_with('{') && right.starts_with('{');
    }
    false
}

async fn not_found(method: Method, uri: axum::http::Uri) -> Response {
    warn!(method = %method, path = %uri.path(), "No matching route found");
    (
        StatusCode::NOT_FOUND,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        NOT_FOUND_BODY,
    )
        .into_response()
}
