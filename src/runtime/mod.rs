//! Prefetch runtime: the process-wide handle that wires cache, policy and timers.
//!
//! A [`PrefetchRuntime`] is built once at application start and cloned into
//! whatever needs it (navigation handlers, link components, the renderer).
//! It owns:
//!
//! - the shared [`Prefetcher`];
//! - the session's [`PrefetchPolicy`];
//! - a [`Scheduler`] running the periodic sweep, the idle timer and the
//!   hover debounce.
//!
//! Calling [`shutdown`](PrefetchRuntime::shutdown), or dropping the last
//! handle, cancels every timer. Scheduled tasks only hold weak references
//! back to the runtime, so they never keep it alive on their own.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, info};

use crate::background::Scheduler;
use crate::cache::Artifact;
use crate::config::{ConfigError, PrefetchConfig};
use crate::policy::{NetworkInfo, PrefetchPlan, PrefetchPolicy, Trigger};
use crate::prefetch::{PreloadOutcome, Prefetcher};
use crate::router::LoaderRegistry;

const SWEEP_TASK: &str = "sweep";
const IDLE_TASK: &str = "idle";
const INTENT_TASK: &str = "intent";
// One slot per touched target, so a later hover never replaces a touch.
const TOUCH_TASK_PREFIX: &str = "touch:";

/// Timer settings for a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeTimings {
    pub sweep_interval: Duration,
    pub idle_delay: Duration,
    pub intent_delay: Duration,
}

impl From<&PrefetchConfig> for RuntimeTimings {
    fn from(config: &PrefetchConfig) -> Self {
        Self {
            sweep_interval: config.cache.sweep_interval(),
            idle_delay: config.policy.idle_delay(),
            intent_delay: config.policy.intent_delay(),
        }
    }
}

impl Default for RuntimeTimings {
    fn default() -> Self {
        Self::from(&PrefetchConfig::default())
    }
}

struct RuntimeInner {
    prefetcher: Prefetcher,
    policy: Mutex<PrefetchPolicy>,
    scheduler: Scheduler,
    timings: RuntimeTimings,
}

/// Shared handle to the running prefetch machinery.
///
/// Must be created inside a tokio runtime; the sweep task starts immediately.
///
/// # Examples
///
/// ```
/// use navcache::{Artifact, LoaderRegistry, PrefetchConfig, PrefetchRuntime};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), navcache::ConfigError> {
/// let registry = LoaderRegistry::new()
///     .route("/*", |_req| async { Ok(Artifact::from("view")) });
/// let runtime = PrefetchRuntime::start(&PrefetchConfig::default(), registry)?;
///
/// runtime.navigated("/nda").await;
/// assert!(runtime.read("/kyc-portal").is_some());
///
/// runtime.shutdown();
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PrefetchRuntime {
    inner: Arc<RuntimeInner>,
}

impl PrefetchRuntime {
    /// Builds cache, policy and timers from `config` and starts the sweep task.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration or its prediction table is
    /// invalid.
    pub fn start(config: &PrefetchConfig, registry: LoaderRegistry) -> Result<Self, ConfigError> {
        config.validate()?;
        let prefetcher = Prefetcher::new(registry, config.build_cache());
        let policy = config.build_policy()?;
        Ok(Self::from_parts(prefetcher, policy, RuntimeTimings::from(config)))
    }

    /// Assembles a runtime from pre-built parts and starts the sweep task.
    pub fn from_parts(
        prefetcher: Prefetcher,
        policy: PrefetchPolicy,
        timings: RuntimeTimings,
    ) -> Self {
        let runtime = Self {
            inner: Arc::new(RuntimeInner {
                prefetcher,
                policy: Mutex::new(policy),
                scheduler: Scheduler::new(),
                timings,
            }),
        };

        let prefetcher = runtime.inner.prefetcher.clone();
        runtime
            .inner
            .scheduler
            .every(SWEEP_TASK, timings.sweep_interval, move || {
                prefetcher.sweep();
            });

        info!(
            sweep_interval = ?timings.sweep_interval,
            idle_delay = ?timings.idle_delay,
            loaders = runtime.inner.prefetcher.registry().len(),
            "prefetch runtime started"
        );
        runtime
    }

    /// The shared cache and loader handle.
    pub fn prefetcher(&self) -> &Prefetcher {
        &self.inner.prefetcher
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    pub fn timings(&self) -> RuntimeTimings {
        self.inner.timings
    }

    /// Reads a cached view for the renderer; `None` means render live.
    pub fn read(&self, route: &str) -> Option<Artifact> {
        self.inner.prefetcher.read(route)
    }

    /// Route recorded by the most recent [`navigated`](Self::navigated) call.
    pub fn current_route(&self) -> Option<String> {
        self.policy().current_route().map(str::to_owned)
    }

    /// Speculative preloads still allowed in this session.
    pub fn remaining_budget(&self) -> usize {
        self.policy().remaining()
    }

    /// Records a navigation, preloads the likely next routes and re-arms the
    /// idle timer.
    pub async fn navigated(&self, route: &str) -> Vec<(String, PreloadOutcome)> {
        let plan = {
            let prefetcher = &self.inner.prefetcher;
            self.policy()
                .navigate(route, |r| prefetcher.contains(r) || prefetcher.is_in_flight(r))
        };
        self.activity();
        self.execute(plan).await
    }

    /// Notes user activity; the idle pass fires after the idle delay unless
    /// more activity arrives first.
    pub fn activity(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner
            .scheduler
            .after(IDLE_TASK, self.inner.timings.idle_delay, async move {
                if let Some(runtime) = upgrade(&weak) {
                    runtime.idle().await;
                }
            });
    }

    /// Runs an idle prefetch pass immediately.
    pub async fn idle(&self) -> Vec<(String, PreloadOutcome)> {
        self.run_trigger(&Trigger::Idle).await
    }

    /// Pointer entered a link to `target`. The intent pass runs after the
    /// intent delay unless [`hover_ended`](Self::hover_ended) comes first.
    pub fn hovered(&self, target: &str) {
        let weak = Arc::downgrade(&self.inner);
        let target = target.to_owned();
        self.inner
            .scheduler
            .after(INTENT_TASK, self.inner.timings.intent_delay, async move {
                if let Some(runtime) = upgrade(&weak) {
                    runtime.intent(&target).await;
                }
            });
    }

    /// Pointer left the link before the debounce elapsed.
    pub fn hover_ended(&self) {
        self.inner.scheduler.cancel(INTENT_TASK);
    }

    /// Touch on a link to `target`: preloads without debounce.
    pub fn touched(&self, target: &str) {
        let weak = Arc::downgrade(&self.inner);
        let target = target.to_owned();
        let name = format!("{TOUCH_TASK_PREFIX}{target}");
        self.inner.scheduler.spawn(name, async move {
            if let Some(runtime) = upgrade(&weak) {
                runtime.intent(&target).await;
            }
        });
    }

    /// Runs an intent pass for `target` immediately.
    pub async fn intent(&self, target: &str) -> Vec<(String, PreloadOutcome)> {
        self.run_trigger(&Trigger::Intent {
            target: target.to_owned(),
        })
        .await
    }

    /// Feeds a network report; preloads when the connection has just become fast.
    pub async fn network_changed(&self, info: &NetworkInfo) -> Vec<(String, PreloadOutcome)> {
        let plan = {
            let prefetcher = &self.inner.prefetcher;
            self.policy()
                .network_changed(info, |r| prefetcher.contains(r) || prefetcher.is_in_flight(r))
        };
        self.execute(plan).await
    }

    /// Full application reset (e.g. logout): drops every cached view, cancels
    /// pending idle/intent timers and refills the session budget. The sweep
    /// keeps running.
    pub fn reset(&self) {
        self.inner.scheduler.cancel(IDLE_TASK);
        self.inner.scheduler.cancel(INTENT_TASK);
        self.inner.prefetcher.clear();
        self.policy().reset_session();
        debug!("prefetch session reset");
    }

    /// Cancels every scheduled task. Cache reads keep working afterwards.
    pub fn shutdown(&self) {
        self.inner.scheduler.shutdown();
        info!("prefetch runtime shut down");
    }

    async fn run_trigger(&self, trigger: &Trigger) -> Vec<(String, PreloadOutcome)> {
        let plan = {
            let prefetcher = &self.inner.prefetcher;
            self.policy()
                .plan(trigger, |r| prefetcher.contains(r) || prefetcher.is_in_flight(r))
        };
        self.execute(plan).await
    }

    async fn execute(&self, plan: PrefetchPlan) -> Vec<(String, PreloadOutcome)> {
        if plan.is_empty() {
            return Vec::new();
        }
        debug!(
            intent = plan.intent.len(),
            speculative = plan.speculative.len(),
            "issuing preloads"
        );
        self.inner.prefetcher.preload_batch(plan.routes()).await
    }

    fn policy(&self) -> MutexGuard<'_, PrefetchPolicy> {
        self.inner
            .policy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn upgrade(weak: &Weak<RuntimeInner>) -> Option<PrefetchRuntime> {
    weak.upgrade().map(|inner| PrefetchRuntime { inner })
}
