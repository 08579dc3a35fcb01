//! Heuristic prefetch policy: decide which routes to preload and when.
//!
//! The policy is pure bookkeeping: it tracks the current route, the session's
//! speculative-prefetch budget and the network state, and turns a [`Trigger`]
//! into a [`PrefetchPlan`]. Executing the plan is up to the caller (normally
//! [`PrefetchRuntime`](crate::runtime::PrefetchRuntime)).
//!
//! ## Budget
//!
//! Route-enter, idle and network-upgrade triggers are speculative and count
//! against `max_prefetches`. A hover or touch on a link is user intent: the
//! link's own target is always preloaded and never counted, while the
//! predictions issued alongside it are speculative like any other.

use thiserror::Error;
use tracing::{debug, trace};

use crate::router::normalize_path;

mod network;
mod table;

pub use network::{DEFAULT_FAST_DOWNLINK_MBPS, NetworkInfo, NetworkMonitor};
pub use table::{Prediction, PredictionRule, PredictionTable};

/// Default number of predicted routes preloaded per trigger.
pub const DEFAULT_TOP_N: usize = 3;

/// Default per-session cap on speculative preloads.
pub const DEFAULT_MAX_PREFETCHES: usize = 10;

/// Errors raised while building a prediction table.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("prediction {from} -> {to} has weight {weight}, expected a value in [0, 1]")]
    InvalidWeight { from: String, to: String, weight: f64 },

    #[error("invalid prediction table JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a prefetch pass is being considered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The user just navigated to the current route.
    RouteEnter,
    /// The user has been inactive for the idle delay.
    Idle,
    /// Hover or touch on a link pointing at `target`.
    Intent { target: String },
    /// The connection just became fast.
    NetworkUpgrade,
}

impl Trigger {
    pub fn is_speculative(&self) -> bool {
        !matches!(self, Trigger::Intent { .. })
    }
}

/// Routes a trigger decided to preload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchPlan {
    /// User-intent routes; exempt from the session cap.
    pub intent: Vec<String>,
    /// Predicted routes; already charged against the session cap.
    pub speculative: Vec<String>,
}

impl PrefetchPlan {
    pub fn is_empty(&self) -> bool {
        self.intent.is_empty() && self.speculative.is_empty()
    }

    pub fn len(&self) -> usize {
        self.intent.len() + self.speculative.len()
    }

    /// All routes in the plan, intent first.
    pub fn routes(&self) -> impl Iterator<Item = &str> {
        self.intent
            .iter()
            .chain(&self.speculative)
            .map(String::as_str)
    }
}

/// Navigation-prediction policy for one user session.
#[derive(Debug, Clone)]
pub struct PrefetchPolicy {
    table: PredictionTable,
    top_n: usize,
    max_prefetches: usize,
    issued: usize,
    current: Option<String>,
    network: NetworkMonitor,
}

impl PrefetchPolicy {
    /// Creates a policy over `table` with the default top-N and session cap.
    pub fn new(table: PredictionTable) -> Self {
        Self {
            table,
            top_n: DEFAULT_TOP_N,
            max_prefetches: DEFAULT_MAX_PREFETCHES,
            issued: 0,
            current: None,
            network: NetworkMonitor::default(),
        }
    }

    /// How many predictions to consider per trigger.
    #[must_use]
    pub fn top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// Cap on speculative preloads per session. Intent targets are exempt.
    #[must_use]
    pub fn max_prefetches(mut self, max_prefetches: usize) -> Self {
        self.max_prefetches = max_prefetches;
        self
    }

    /// Downlink above which a `4g` connection counts as fast.
    #[must_use]
    pub fn fast_downlink_mbps(mut self, threshold_mbps: f64) -> Self {
        self.network = NetworkMonitor::new(threshold_mbps);
        self
    }

    pub fn table(&self) -> &PredictionTable {
        &self.table
    }

    pub fn current_route(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Speculative preloads issued so far this session.
    pub fn issued(&self) -> usize {
        self.issued
    }

    /// Speculative preloads still allowed this session.
    pub fn remaining(&self) -> usize {
        self.max_prefetches.saturating_sub(self.issued)
    }

    /// Forgets the current route and refills the budget (e.g. on logout).
    pub fn reset_session(&mut self) {
        self.issued = 0;
        self.current = None;
    }

    /// Records a navigation and returns the route-enter plan.
    pub fn navigate(&mut self, route: &str, is_cached: impl Fn(&str) -> bool) -> PrefetchPlan {
        self.current = Some(normalize_path(route).to_owned());
        self.plan(&Trigger::RouteEnter, is_cached)
    }

    /// Records a network report and returns a plan if the connection just
    /// became fast, otherwise an empty plan.
    pub fn network_changed(
        &mut self,
        info: &NetworkInfo,
        is_cached: impl Fn(&str) -> bool,
    ) -> PrefetchPlan {
        if !self.network.observe(info) {
            return PrefetchPlan::default();
        }
        debug!(
            effective_type = %info.effective_type,
            downlink_mbps = info.downlink_mbps,
            "connection upgraded; prefetching"
        );
        self.plan(&Trigger::NetworkUpgrade, is_cached)
    }

    /// Turns `trigger` into a plan. `is_cached` reports routes that need no
    /// preload (already cached or loading); they are skipped without being
    /// charged to the budget.
    ///
    /// An unknown current route yields no predictions.
    pub fn plan(&mut self, trigger: &Trigger, is_cached: impl Fn(&str) -> bool) -> PrefetchPlan {
        let mut plan = PrefetchPlan::default();

        if let Trigger::Intent { target } = trigger {
            let target = normalize_path(target);
            if !is_cached(target) {
                plan.intent.push(target.to_owned());
            }
        }

        let Some(current) = self.current.as_deref() else {
            trace!(?trigger, "no current route; nothing to predict");
            return plan;
        };

        let budget = self.remaining();
        if budget == 0 {
            debug!(?trigger, issued = self.issued, "prefetch budget exhausted");
            return plan;
        }

        let speculative: Vec<String> = self
            .table
            .top(current, self.top_n)
            .into_iter()
            .filter(|route| *route != current)
            .filter(|route| !plan.intent.iter().any(|t| t == route))
            .filter(|route| !is_cached(*route))
            .take(budget)
            .map(str::to_owned)
            .collect();

        self.issued += speculative.len();
        plan.speculative = speculative;

        trace!(?trigger, route = %current, planned = plan.len(), "prefetch plan ready");
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never_cached(_: &str) -> bool {
        false
    }

    fn funnel() -> PrefetchPolicy {
        PrefetchPolicy::new(PredictionTable::onboarding_portal())
    }

    #[test]
    fn route_enter_plans_top_three() {
        let mut policy = funnel();
        let plan = policy.navigate("/auth/signin", never_cached);
        assert_eq!(
            plan.speculative,
            vec!["/dashboard", "/nda", "/auth/signup"]
        );
        assert!(plan.intent.is_empty());
        assert_eq!(policy.issued(), 3);
    }

    #[test]
    fn unknown_route_is_ignored() {
        let mut policy = funnel();
        let plan = policy.navigate("/legal/terms", never_cached);
        assert!(plan.is_empty());
        assert_eq!(policy.issued(), 0);
    }

    #[test]
    fn no_current_route_plans_nothing_speculative() {
        let mut policy = funnel();
        assert!(policy.plan(&Trigger::Idle, never_cached).is_empty());
    }

    #[test]
    fn cached_routes_are_skipped_without_charge() {
        let mut policy = funnel();
        let plan = policy.navigate("/kyc-portal", |route| route == "/agreement");
        assert_eq!(plan.speculative, vec!["/kyc-portal/documents", "/dashboard"]);
        assert_eq!(policy.issued(), 2);
    }

    #[test]
    fn session_cap_stops_speculation() {
        let mut policy = funnel().max_prefetches(4);
        assert_eq!(policy.navigate("/auth/signin", never_cached).len(), 3);
        let plan = policy.navigate("/admin", never_cached);
        assert_eq!(plan.speculative, vec!["/admin/users"]);
        assert_eq!(policy.remaining(), 0);
        assert!(policy.plan(&Trigger::Idle, never_cached).is_empty());
    }

    #[test]
    fn intent_target_is_exempt_from_cap() {
        let mut policy = funnel().max_prefetches(0);
        policy.navigate("/dashboard", never_cached);

        let plan = policy.plan(
            &Trigger::Intent {
                target: "/payment/".into(),
            },
            never_cached,
        );
        assert_eq!(plan.intent, vec!["/payment"]);
        assert!(plan.speculative.is_empty());
        assert_eq!(policy.issued(), 0);
    }

    #[test]
    fn intent_predictions_are_charged_and_deduplicated() {
        let mut policy = funnel().max_prefetches(10);
        policy.navigate("/dashboard", |_| true);
        assert_eq!(policy.issued(), 0);

        let plan = policy.plan(
            &Trigger::Intent {
                target: "/profile".into(),
            },
            never_cached,
        );
        assert_eq!(plan.intent, vec!["/profile"]);
        assert_eq!(plan.speculative, vec!["/notifications", "/kyc-portal"]);
        assert_eq!(policy.issued(), 2);
        assert_eq!(
            plan.routes().collect::<Vec<_>>(),
            vec!["/profile", "/notifications", "/kyc-portal"]
        );
    }

    #[test]
    fn cached_intent_target_is_dropped() {
        let mut policy = funnel();
        let plan = policy.plan(
            &Trigger::Intent {
                target: "/nda".into(),
            },
            |route| route == "/nda",
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn network_upgrade_triggers_once() {
        let mut policy = funnel();
        policy.navigate("/nda", |_| true);

        let plan = policy.network_changed(&NetworkInfo::new("4g", 12.0), never_cached);
        assert_eq!(plan.speculative, vec!["/kyc-portal", "/dashboard"]);

        let again = policy.network_changed(&NetworkInfo::new("4g", 15.0), never_cached);
        assert!(again.is_empty());
    }

    #[test]
    fn slow_network_does_not_trigger() {
        let mut policy = funnel().fast_downlink_mbps(20.0);
        policy.navigate("/nda", |_| true);
        assert!(
            policy
                .network_changed(&NetworkInfo::new("4g", 12.0), never_cached)
                .is_empty()
        );
    }

    #[test]
    fn reset_session_refills_budget() {
        let mut policy = funnel().max_prefetches(1);
        policy.navigate("/nda", never_cached);
        assert_eq!(policy.remaining(), 0);

        policy.reset_session();
        assert_eq!(policy.remaining(), 1);
        assert_eq!(policy.current_route(), None);
    }

    #[test]
    fn top_n_is_configurable() {
        let mut policy = funnel().top_n(1);
        let plan = policy.navigate("/admin", never_cached);
        assert_eq!(plan.speculative, vec!["/admin/users"]);
    }

    #[test]
    fn trigger_speculation_flag() {
        assert!(Trigger::Idle.is_speculative());
        assert!(Trigger::RouteEnter.is_speculative());
        assert!(Trigger::NetworkUpgrade.is_speculative());
        assert!(!Trigger::Intent { target: "/".into() }.is_speculative());
    }
}
