//! Loader registry: map route patterns to asynchronous view loaders.
//!
//! The hosting application registers one loader per route (or route family) at
//! startup. The registry is data, not a `match` statement, so the full table can
//! be inspected and tested. Three pattern styles are supported:
//!
//! | Pattern              | Example match                 | Captured params                  |
//! |----------------------|-------------------------------|----------------------------------|
//! | `/kyc-portal`        | `/kyc-portal`                 | *(none)*                         |
//! | `/admin/users/:id`   | `/admin/users/42`             | `id → "42"`                      |
//! | `/dashboard/*`       | `/dashboard/investor/wallet`  | `wildcard → "/investor/wallet"`  |
//!
//! Trailing slashes are normalized on both patterns and incoming paths.
//! Routes are matched in registration order; the first match wins.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::cache::Artifact;

mod pattern;

pub use pattern::{RouteParams, normalize_path};
use pattern::Pattern;

/// Errors a loader may report. They never escape a preload; the prefetcher
/// logs them and leaves the route uncached.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("network error: {0}")]
    Network(String),

    #[error("loader timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to parse view payload: {0}")]
    Parse(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Boxed future returned by every loader.
pub type LoadFuture = Pin<Box<dyn Future<Output = Result<Artifact, LoadError>> + Send>>;

/// Type-erased, shareable loader function.
pub type Loader = Arc<dyn Fn(RouteRequest) -> LoadFuture + Send + Sync + 'static>;

/// Conversion trait for async loader functions.
///
/// Any `Fn(RouteRequest) -> impl Future<Output = Result<Artifact, LoadError>> + Send`
/// that is also `Send + Sync + 'static` implements this automatically.
pub trait IntoLoader: Send + Sync + 'static {
    fn call(&self, request: RouteRequest) -> LoadFuture;
}

impl<T, F> IntoLoader for T
where
    T: Fn(RouteRequest) -> F + Send + Sync + 'static,
    F: Future<Output = Result<Artifact, LoadError>> + Send + 'static,
{
    fn call(&self, request: RouteRequest) -> LoadFuture {
        Box::pin((self)(request))
    }
}

/// What a loader receives: the concrete path being loaded and any captures.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    path: String,
    params: RouteParams,
}

impl RouteRequest {
    pub fn new(path: impl Into<String>, params: RouteParams) -> Self {
        Self {
            path: path.into(),
            params,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &RouteParams {
        &self.params
    }
}

struct Route {
    source: String,
    pattern: Pattern,
    loader: Loader,
}

/// Declarative route → loader table.
///
/// # Examples
///
/// ```
/// use navcache::{Artifact, LoaderRegistry, RouteRequest};
///
/// let registry = LoaderRegistry::new()
///     .route("/auth/signin", |_req| async { Ok(Artifact::from("signin")) })
///     .route("/admin/users/:id", |req: RouteRequest| async move {
///         let id = req.params().get("id").unwrap_or_default().to_owned();
///         Ok(Artifact::from(id))
///     });
///
/// assert!(registry.contains_route("/admin/users/7"));
/// assert!(!registry.contains_route("/unknown"));
/// ```
#[derive(Default)]
pub struct LoaderRegistry {
    routes: Vec<Route>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registers `loader` for `pattern` and returns the registry (builder form).
    #[must_use]
    pub fn route(mut self, pattern: &str, loader: impl IntoLoader) -> Self {
        self.register(pattern, loader);
        self
    }

    /// Registers `loader` for `pattern`.
    pub fn register(&mut self, pattern: &str, loader: impl IntoLoader) {
        let loader: Loader = Arc::new(move |request| loader.call(request));
        self.routes.push(Route {
            source: normalize_path(pattern).to_owned(),
            pattern: Pattern::parse(pattern),
            loader,
        });
    }

    /// Returns the loader future for `path`, or `None` when no pattern matches.
    ///
    /// The matching loader closure runs here; the future it returns is not
    /// polled until the caller awaits it.
    pub fn load(&self, path: &str) -> Option<LoadFuture> {
        let path = normalize_path(path);
        self.routes.iter().find_map(|route| {
            route
                .pattern
                .matches(path)
                .map(|params| (route.loader)(RouteRequest::new(path, params)))
        })
    }

    /// Returns `true` if some pattern matches `path`. No loader is invoked.
    pub fn contains_route(&self, path: &str) -> bool {
        let path = normalize_path(path);
        self.routes
            .iter()
            .any(|route| route.pattern.matches(path).is_some())
    }

    /// Registered pattern strings, in registration order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|route| route.source.as_str())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderRegistry")
            .field("patterns", &self.patterns().collect::<Vec<_>>())
            .finish()
    }
}
