//! Network-quality tracking for bandwidth-aware prefetching.

use serde::{Deserialize, Serialize};

/// Default downlink (Mbps) above which a `4g` connection counts as fast.
pub const DEFAULT_FAST_DOWNLINK_MBPS: f64 = 1.5;

/// A connection quality report, as exposed by the browser's Network
/// Information API (`effectiveType`, `downlink`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub effective_type: String,
    pub downlink_mbps: f64,
}

impl NetworkInfo {
    pub fn new(effective_type: impl Into<String>, downlink_mbps: f64) -> Self {
        Self {
            effective_type: effective_type.into(),
            downlink_mbps,
        }
    }

    /// `4g` with downlink strictly above `threshold_mbps`.
    pub fn is_fast(&self, threshold_mbps: f64) -> bool {
        self.effective_type.eq_ignore_ascii_case("4g") && self.downlink_mbps > threshold_mbps
    }
}

/// Detects transitions into the high-bandwidth state.
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    threshold_mbps: f64,
    fast: bool,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_FAST_DOWNLINK_MBPS)
    }
}

impl NetworkMonitor {
    pub fn new(threshold_mbps: f64) -> Self {
        Self {
            threshold_mbps,
            fast: false,
        }
    }

    /// Records a report and returns `true` only when the connection has just
    /// become fast. Staying fast does not re-trigger.
    pub fn observe(&mut self, info: &NetworkInfo) -> bool {
        let fast = info.is_fast(self.threshold_mbps);
        let upgraded = fast && !self.fast;
        self.fast = fast;
        upgraded
    }

    pub fn is_fast(&self) -> bool {
        self.fast
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_requires_4g_and_downlink() {
        assert!(NetworkInfo::new("4g", 10.0).is_fast(1.5));
        assert!(NetworkInfo::new("4G", 1.6).is_fast(1.5));
        assert!(!NetworkInfo::new("4g", 1.5).is_fast(1.5));
        assert!(!NetworkInfo::new("3g", 50.0).is_fast(1.5));
    }

    #[test]
    fn monitor_fires_only_on_upgrade() {
        let mut monitor = NetworkMonitor::default();
        assert!(!monitor.observe(&NetworkInfo::new("3g", 0.7)));
        assert!(monitor.observe(&NetworkInfo::new("4g", 8.0)));
        assert!(!monitor.observe(&NetworkInfo::new("4g", 9.0)));
        assert!(monitor.is_fast());

        assert!(!monitor.observe(&NetworkInfo::new("slow-2g", 0.1)));
        assert!(monitor.observe(&NetworkInfo::new("4g", 4.0)));
    }
}
