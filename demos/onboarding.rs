//! Walks an investor through the onboarding funnel with prefetching enabled.
//!
//! Run with `RUST_LOG=navcache=debug cargo run --example onboarding`.

use std::time::Duration;

use navcache::{
    Artifact, LoadError, LoaderRegistry, NetworkInfo, PrefetchConfig, PrefetchRuntime,
    RouteRequest,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("navcache=info")),
        )
        .with_target(false)
        .init();

    let registry = LoaderRegistry::new()
        .route("/payment", |_req: RouteRequest| async {
            // The payment view depends on a gateway that is down in this demo.
            Err(LoadError::Network("payment gateway unreachable".into()))
        })
        .route("/*", |req: RouteRequest| async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(Artifact::from(format!("<view route=\"{}\"/>", req.path())))
        });

    let config = PrefetchConfig::from_toml_str(
        r#"
        [policy]
        idle_delay_ms = 500

        [[predictions]]
        from = "/certificate"
        next = [{ route = "/dashboard/investor", weight = 1.0 }]
        "#,
    )?;
    let runtime = PrefetchRuntime::start(&config, registry)?;

    for route in ["/auth/signin", "/nda", "/kyc-portal", "/agreement", "/payment", "/certificate"] {
        let source = if runtime.read(route).is_some() { "cache" } else { "live" };
        println!("{route:<22} rendered from {source}");

        for (next, outcome) in runtime.navigated(route).await {
            println!("    prefetch {next:<24} {outcome:?}");
        }
    }

    runtime.hovered("/profile");
    tokio::time::sleep(Duration::from_millis(200)).await;
    runtime
        .network_changed(&NetworkInfo::new("4g", 12.0))
        .await;

    println!("cache stats: {}", serde_json::to_string(&runtime.prefetcher().stats())?);

    runtime.reset();
    runtime.shutdown();
    Ok(())
}
