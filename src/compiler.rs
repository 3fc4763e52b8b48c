//! Route compilation.
//!
//! Turns the declared route entries into handlers registered on a
//! [`Dispatcher`]. Each entry's method is looked up in a [`MethodTable`];
//! entries with unsupported methods are skipped. Latency payloads and response
//! content are validated here so that nothing can fail while serving.

use crate::config::RouteEntry;
use crate::dispatcher::Dispatcher;
use crate::emitter::BoundRoute;
use crate::error::ConfigError;
use crate::latency::LatencyRegistry;
use axum::http::Method;
use axum::response::Response;
use axum::routing::{self, MethodRouter};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds the method router serving one bound route.
pub type HandlerFactory = fn(Arc<BoundRoute>) -> MethodRouter;

/// Supported methods and the handler factory for each.
#[derive(Clone)]
pub struct MethodTable {
    factories: HashMap<&'static str, (Method, HandlerFactory)>,
}

impl MethodTable {
    /// DELETE, GET, PATCH, POST and PUT.
    pub fn standard() -> Self {
        let entries: [(&'static str, Method, HandlerFactory); 5] = [
            ("DELETE", Method::DELETE, new_delete_route),
            ("GET", Method::GET, new_get_route),
            ("PATCH", Method::PATCH, new_patch_route),
            ("POST", Method::POST, new_post_route),
            ("PUT", Method::PUT, new_put_route),
        ];

        let factories = entries
            .into_iter()
            .map(|(name, method, factory)| (name, (method, factory)))
            .collect();
        Self { factories }
    }

    /// Look up a method by its exact, case-sensitive name.
    pub fn get(&self, name: &str) -> Option<(&Method, HandlerFactory)> {
        self.factories
            .get(name)
            .map(|(method, factory)| (method, *factory))
    }

    pub fn supports(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Supported method names, sorted.
    pub fn methods(&self) -> Vec<&'static str> {
        let mut methods: Vec<&'static str> = self.factories.keys().copied().collect();
        methods.sort_unstable();
        methods
    }
}

impl Default for MethodTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.methods())
            .finish()
    }
}

async fn respond(route: Arc<BoundRoute>) -> Response {
    route.emit().await
}

fn new_delete_route(route: Arc<BoundRoute>) -> MethodRouter {
    routing::delete(move || respond(route.clone()))
}

fn new_get_route(route: Arc<BoundRoute>) -> MethodRouter {
    routing::get(move || respond(route.clone()))
}

fn new_patch_route(route: Arc<BoundRoute>) -> MethodRouter {
    routing::patch(move || respond(route.clone()))
}

fn new_post_route(route: Arc<BoundRoute>) -> MethodRouter {
    routing::post(move || respond(route.clone()))
}

fn new_put_route(route: Arc<BoundRoute>) -> MethodRouter {
    routing::put(move || respond(route.clone()))
}

/// A route entry after validation, ready to register.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    pub method: Method,
    /// Path in router syntax
    pub path: String,
    pub route: Arc<BoundRoute>,
    factory: HandlerFactory,
}

impl CompiledRoute {
    /// Build the handler and register it.
    ///
    /// Returns `true` when an earlier route with the same method and path was
    /// replaced.
    pub fn register(self, dispatcher: &mut Dispatcher) -> Result<bool, ConfigError> {
        let handler = (self.factory)(self.route);
        dispatcher.register(self.method, &self.path, handler)
    }
}

/// Compiles route entries using explicit method and latency registries.
#[derive(Debug, Clone)]
pub struct RouteCompiler {
    methods: MethodTable,
    latency: LatencyRegistry,
    verbose: bool,
}

impl Default for RouteCompiler {
    fn default() -> Self {
        Self::new(MethodTable::standard(), LatencyRegistry::with_defaults())
    }
}

impl RouteCompiler {
    pub fn new(methods: MethodTable, latency: LatencyRegistry) -> Self {
        Self {
            methods,
            latency,
            verbose: false,
        }
    }

    /// Log every entry's fields before it is compiled.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Compile one entry.
    ///
    /// Returns `Ok(None)` when the method is not supported.
    pub fn compile_entry(&self, entry: &RouteEntry) -> Result<Option<CompiledRoute>, ConfigError> {
        let Some((method, factory)) = self.methods.get(&entry.method) else {
            if self.verbose {
                info!(
                    method = %entry.method,
                    path = %entry.path,
                    "Skipping route with unsupported method"
                );
            }
            return Ok(None);
        };

        let path = normalize_path(entry)?;
        let latency = self.latency.resolve(entry)?;
        let route = BoundRoute::from_entry(entry, latency)?;

        Ok(Some(CompiledRoute {
            method: method.clone(),
            path,
            route: Arc::new(route),
            factory,
        }))
    }

    /// Compile all entries, in order, into a dispatcher.
    ///
    /// Stops at the first configuration error. Unsupported methods are
    /// skipped and do not count as errors.
    pub fn compile(&self, entries: &[RouteEntry]) -> Result<Dispatcher, ConfigError> {
        let mut dispatcher = Dispatcher::new();
        let mut skipped = 0usize;

        for entry in entries {
            if self.verbose {
                log_route(entry);
            }

            match self.compile_entry(entry)? {
                Some(compiled) => {
                    debug!(
                        method = %compiled.method,
                        path = %compiled.path,
                        latency = ?compiled.route.latency(),
                        "Registering route"
                    );
                    compiled.register(&mut dispatcher)?;
                }
                None => skipped += 1,
            }
        }

        info!(
            declared = entries.len(),
            registered = dispatcher.len(),
            skipped,
            "Route table compiled"
        );
        Ok(dispatcher)
    }
}

fn log_route(entry: &RouteEntry) {
    let body = entry
        .body
        .as_ref()
        .map(|b| b.to_string())
        .unwrap_or_default();
    let offset = entry
        .response_offset
        .as_ref()
        .map(|o| o.to_string())
        .unwrap_or_default();

    info!(
        path = %entry.path,
        method = %entry.method,
        body = %body,
        status_code = entry.status_code,
        header = ?entry.header,
        response_offset_mode = %entry.response_offset_mode,
        response_offset = %offset,
        "Route definition"
    );
}

/// Convert `:param` and `*rest` segments to `{param}` and `{*rest}`.
///
/// Segments already written as `{param}` or `{*rest}` are kept. Any other use
/// of braces is rejected, since the router would refuse the pattern.
fn normalize_path(entry: &RouteEntry) -> Result<String, ConfigError> {
    let Some(rest) = entry.path.strip_prefix('/') else {
        return Err(invalid_path(entry, "path must start with `/`"));
    };

    let segments: Vec<&str> = rest.split('/').collect();
    let last = segments.len() - 1;
    let mut normalized = String::with_capacity(entry.path.len() + 8);

    for (i, segment) in segments.iter().enumerate() {
        normalized.push('/');

        let (name, wildcard) = if let Some(name) = segment.strip_prefix(':') {
            (name, false)
        } else if let Some(name) = segment.strip_prefix('*') {
            (name, true)
        } else if segment.contains(['{', '}']) {
            let Some(inner) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
                return Err(invalid_path(entry, "unbalanced `{` or `}` in path"));
            };
            match inner.strip_prefix('*') {
                Some(name) => (name, true),
                None => (inner, false),
            }
        } else {
            normalized.push_str(segment);
            continue;
        };

        if name.is_empty() || name.contains(['{', '}', ':', '*']) {
            return Err(invalid_path(entry, "invalid parameter name"));
        }
        if wildcard && i != last {
            return Err(invalid_path(entry, "wildcard must be the last segment"));
        }

        normalized.push('{');
        if wildcard {
            normalized.push('*');
        }
        normalized.push_str(name);
        normalized.push('}');
    }

    Ok(normalized)
}

fn invalid_path(entry: &RouteEntry, reason: &str) -> ConfigError {
    ConfigError::InvalidPath {
        method: entry.method.clone(),
        path: entry.path.clone(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteFile;
    use crate::latency::LatencyOffset;
    use serde_json::json;

    fn compiler() -> RouteCompiler {
        RouteCompiler::new(MethodTable::standard(), LatencyRegistry::with_defaults())
    }

    fn path_of(path: &str) -> Result<String, ConfigError> {
        normalize_path(&RouteEntry::new("GET", path))
    }

    #[test]
    fn test_standard_methods() {
        let table = MethodTable::standard();
        assert_eq!(table.methods(), vec!["DELETE", "GET", "PATCH", "POST", "PUT"]);
        assert!(table.supports("PATCH"));
        assert!(!table.supports("get"));
        assert!(!table.supports("TRACE"));
        assert_eq!(table.get("PUT").map(|(m, _)| m.clone()), Some(Method::PUT));
    }

    #[test]
    fn test_unsupported_method_is_skipped() {
        let compiler = compiler();
        for method in ["TRACE", "FOO", "get", "HEAD", ""] {
            let entry = RouteEntry::new(method, "/x");
            assert!(compiler.compile_entry(&entry).unwrap().is_none(), "{method}");
        }
    }

    #[test]
    fn test_compile_skips_and_continues() {
        let routes = RouteFile::from_json(
            r#"[
                {"path": "/a", "method": "GET"},
                {"path": "/trace", "method": "TRACE"},
                {"path": "/b", "method": "DELETE"},
                {"path": "/foo", "method": "FOO"}
            ]"#,
        )
        .unwrap();

        let dispatcher = compiler().verbose(true).compile(&routes.routes).unwrap();
        assert_eq!(dispatcher.len(), 2);
        assert!(dispatcher.contains(&Method::GET, "/a"));
        assert!(dispatcher.contains(&Method::DELETE, "/b"));
        assert!(!dispatcher.contains(&Method::TRACE, "/trace"));
        assert!(!dispatcher.contains(&Method::GET, "/foo"));
    }

    #[test]
    fn test_shape_error_aborts_compilation() {
        let mut bad = RouteEntry::new("GET", "/bad");
        bad.response_offset_mode = "normal".to_string();
        bad.response_offset = Some(json!(100));

        let entries = vec![RouteEntry::new("GET", "/ok"), bad];
        let err = compiler().compile(&entries).err().unwrap();
        assert!(matches!(err, ConfigError::Shape(_)));
        assert!(err.to_string().contains("/bad"));
    }

    #[test]
    fn test_shape_error_ignored_for_unsupported_method() {
        let mut entry = RouteEntry::new("TRACE", "/bad");
        entry.response_offset_mode = "normal".to_string();
        entry.response_offset = Some(json!("soon"));
        assert!(compiler().compile_entry(&entry).unwrap().is_none());
    }

    #[test]
    fn test_compile_entry_binds_latency() {
        let mut entry = RouteEntry::new("POST", "/orders/:id");
        entry.response_offset_mode = "constant".to_string();
        entry.response_offset = Some(json!(250));

        let compiled = compiler().compile_entry(&entry).unwrap().unwrap();
        assert_eq!(compiled.method, Method::POST);
        assert_eq!(compiled.path, "/orders/{id}");
        assert_eq!(compiled.route.latency(), LatencyOffset::Constant { ms: 250.0 });
    }

    #[test]
    fn test_duplicate_routes_last_wins() {
        let mut first = RouteEntry::new("GET", "/users/:id");
        first.status_code = 200;
        let mut second = RouteEntry::new("GET", "/users/{id}");
        second.status_code = 404;

        let dispatcher = compiler().compile(&[first, second]).unwrap();
        assert_eq!(dispatcher.len(), 1);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(path_of("/").unwrap(), "/");
        assert_eq!(path_of("/ping").unwrap(), "/ping");
        assert_eq!(path_of("/users/:id").unwrap(), "/users/{id}");
        assert_eq!(
            path_of("/users/:id/posts/:post").unwrap(),
            "/users/{id}/posts/{post}"
        );
        assert_eq!(path_of("/files/*rest").unwrap(), "/files/{*rest}");
        assert_eq!(path_of("/users/{id}").unwrap(), "/users/{id}");
        assert_eq!(path_of("/trailing/").unwrap(), "/trailing/");
    }

    #[test]
    fn test_invalid_paths() {
        assert!(matches!(path_of("ping"), Err(ConfigError::InvalidPath { .. })));
        assert!(path_of("").is_err());
        assert!(path_of("/users/:").is_err());
        assert!(path_of("/files/*rest/more").is_err());
    }

    #[test]
    fn test_malformed_braces_rejected() {
        for path in ["/a/{id", "/a/id}", "/a/{}", "/a/{*}", "/a/x{id}", "/a/{*rest}/b", "/a/{{id}}"] {
            assert!(
                matches!(path_of(path), Err(ConfigError::InvalidPath { .. })),
                "{path}"
            );
        }
        assert_eq!(path_of("/a/{*rest}").unwrap(), "/a/{*rest}");

        let routes = RouteFile::from_json(r#"[{"path":"/a/{id","method":"GET"}]"#).unwrap();
        let err = compiler().compile(&routes.routes).err().unwrap();
        assert!(err.to_string().contains("/a/{id"));
    }

    #[test]
    fn test_conflicting_parameter_names_rejected() {
        let routes = RouteFile::from_json(
            r#"[
                {"path": "/u/:id", "method": "GET"},
                {"path": "/u/:uid", "method": "DELETE"}
            ]"#,
        )
        .unwrap();

        let err = compiler().compile(&routes.routes).err().unwrap();
        match err {
            ConfigError::InvalidPath { method, path, reason } => {
                assert_eq!(method, "DELETE");
                assert_eq!(path, "/u/{uid}");
                assert!(reason.contains("/u/{id}"));
            }
            other => panic!("expected InvalidPath, got {other}"),
        }
    }
}
