//! # navcache
//!
//! Route prefetch cache for client-side navigation: a time-expiring store of
//! pre-loaded views, de-duplicated asynchronous loaders, and heuristics that
//! predict which route the user will open next.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use navcache::{Artifact, LoaderRegistry, PrefetchConfig, PrefetchRuntime, RouteRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = LoaderRegistry::new()
//!         .route("/kyc-portal", |_req| async { Ok(Artifact::from("<kyc/>")) })
//!         .route("/admin/users/:id", |req: RouteRequest| async move {
//!             Ok(Artifact::from(format!("<user {}/>", req.params().get("id").unwrap_or("?"))))
//!         });
//!
//!     let runtime = PrefetchRuntime::start(&PrefetchConfig::default(), registry)?;
//!     runtime.navigated("/nda").await;
//!
//!     match runtime.read("/kyc-portal") {
//!         Some(view) => println!("cached view: {} bytes", view.len()),
//!         None => println!("render live"),
//!     }
//!
//!     runtime.shutdown();
//!     Ok(())
//! }
//! ```

pub mod background;
pub mod cache;
pub mod config;
pub mod policy;
pub mod prefetch;
pub mod router;
pub mod runtime;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use cache::{Artifact, CacheStats, Origin, RouteCache};
pub use config::{ConfigError, PrefetchConfig};
pub use policy::{NetworkInfo, PolicyError, PredictionTable, PrefetchPolicy, Trigger};
pub use prefetch::{PreloadOutcome, Prefetcher};
pub use router::{LoadError, LoaderRegistry, RouteRequest};
pub use runtime::{PrefetchRuntime, RuntimeTimings};
