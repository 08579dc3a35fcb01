//! Static "current route → likely next routes" table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::PolicyError;
use crate::router::normalize_path;

/// A likely next route and how likely it is, in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub route: String,
    pub weight: f64,
}

/// One row of the table as it appears in configuration files.
///
/// ```toml
/// [[predictions]]
/// from = "/nda"
/// next = [{ route = "/kyc-portal", weight = 0.95 }]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRule {
    pub from: String,
    #[serde(default)]
    pub next: Vec<Prediction>,
}

/// Ranked navigation predictions keyed by the current route.
///
/// # Examples
///
/// ```
/// use navcache::policy::PredictionTable;
///
/// let table = PredictionTable::new()
///     .predict("/nda", "/kyc-portal", 0.95)?
///     .predict("/nda", "/dashboard", 0.3)?;
///
/// assert_eq!(table.top("/nda", 1), vec!["/kyc-portal"]);
/// assert!(table.top("/unknown", 3).is_empty());
/// # Ok::<(), navcache::policy::PolicyError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionTable {
    rows: HashMap<String, Vec<Prediction>>,
}

impl PredictionTable {
    pub fn new() -> Self {
        Self {
            rows: HashMap::new(),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn predict(mut self, from: &str, to: &str, weight: f64) -> Result<Self, PolicyError> {
        self.insert(from, to, weight)?;
        Ok(self)
    }

    /// Adds a prediction. A repeated `from → to` pair replaces the old weight.
    ///
    /// # Errors
    ///
    /// [`PolicyError::InvalidWeight`] when `weight` is NaN or outside `[0, 1]`.
    pub fn insert(&mut self, from: &str, to: &str, weight: f64) -> Result<(), PolicyError> {
        if !(0.0..=1.0).contains(&weight) {
            return Err(PolicyError::InvalidWeight {
                from: from.to_owned(),
                to: to.to_owned(),
                weight,
            });
        }

        let to = normalize_path(to);
        let row = self.rows.entry(normalize_path(from).to_owned()).or_default();
        match row.iter_mut().find(|p| p.route == to) {
            Some(existing) => existing.weight = weight,
            None => row.push(Prediction {
                route: to.to_owned(),
                weight,
            }),
        }
        Ok(())
    }

    /// Builds a table from configuration rows, validating every weight.
    pub fn from_rules<I>(rules: I) -> Result<Self, PolicyError>
    where
        I: IntoIterator<Item = PredictionRule>,
    {
        let mut table = Self::new();
        for rule in rules {
            for prediction in rule.next {
                table.insert(&rule.from, &prediction.route, prediction.weight)?;
            }
        }
        Ok(table)
    }

    /// Parses a JSON array of [`PredictionRule`]s.
    pub fn from_json(json: &str) -> Result<Self, PolicyError> {
        let rules: Vec<PredictionRule> = serde_json::from_str(json)?;
        Self::from_rules(rules)
    }

    /// The `n` most likely next routes from `from`, by descending weight.
    /// Ties keep insertion order. Unknown routes yield an empty list.
    pub fn top(&self, from: &str, n: usize) -> Vec<&str> {
        let Some(row) = self.rows.get(normalize_path(from)) else {
            return Vec::new();
        };

        let mut ranked: Vec<&Prediction> = row.iter().collect();
        ranked.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        ranked
            .into_iter()
            .take(n)
            .map(|p| p.route.as_str())
            .collect()
    }

    pub fn contains(&self, from: &str) -> bool {
        self.rows.contains_key(normalize_path(from))
    }

    /// Number of source routes with at least one prediction.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The navigation funnel of the investor onboarding portal: sign-in and
    /// sign-up, NDA → KYC → agreement → payment → certificate, and the
    /// investor, admin and onboarding-officer dashboards.
    pub fn onboarding_portal() -> Self {
        const ROWS: &[(&str, &[(&str, f64)])] = &[
            ("/", &[("/auth/signin", 0.9), ("/auth/signup", 0.6)]),
            (
                "/auth/signin",
                &[
                    ("/dashboard", 0.85),
                    ("/nda", 0.7),
                    ("/auth/signup", 0.3),
                    ("/auth/forgot-password", 0.2),
                ],
            ),
            (
                "/auth/signup",
                &[
                    ("/auth/verify-email", 0.8),
                    ("/nda", 0.6),
                    ("/auth/signin", 0.4),
                ],
            ),
            ("/nda", &[("/kyc-portal", 0.95), ("/dashboard", 0.3)]),
            (
                "/kyc-portal",
                &[
                    ("/agreement", 0.9),
                    ("/kyc-portal/documents", 0.6),
                    ("/dashboard", 0.2),
                ],
            ),
            ("/agreement", &[("/payment", 0.9), ("/kyc-portal", 0.2)]),
            ("/payment", &[("/certificate", 0.9), ("/dashboard", 0.4)]),
            ("/certificate", &[("/dashboard", 0.9), ("/profile", 0.3)]),
            (
                "/dashboard",
                &[
                    ("/profile", 0.5),
                    ("/notifications", 0.4),
                    ("/kyc-portal", 0.3),
                ],
            ),
            (
                "/admin",
                &[
                    ("/admin/users", 0.8),
                    ("/admin/kyc-reviews", 0.7),
                    ("/admin/payments", 0.5),
                    ("/admin/settings", 0.2),
                ],
            ),
            (
                "/onboarding-officer",
                &[
                    ("/onboarding-officer/queue", 0.85),
                    ("/onboarding-officer/investors", 0.6),
                ],
            ),
        ];

        let mut rows = HashMap::with_capacity(ROWS.len());
        for (from, next) in ROWS {
            let predictions = next
                .iter()
                .map(|(route, weight)| Prediction {
                    route: (*route).to_owned(),
                    weight: *weight,
                })
                .collect();
            rows.insert((*from).to_owned(), predictions);
        }
        Self { rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_orders_by_descending_weight() {
        let table = PredictionTable::new()
            .predict("/dashboard", "/profile", 0.2)
            .unwrap()
            .predict("/dashboard", "/notifications", 0.9)
            .unwrap()
            .predict("/dashboard", "/kyc-portal", 0.5)
            .unwrap()
            .predict("/dashboard", "/settings", 0.1)
            .unwrap();

        assert_eq!(
            table.top("/dashboard", 3),
            vec!["/notifications", "/kyc-portal", "/profile"]
        );
    }

    #[test]
    fn ties_keep_insertion_order() {
        let table = PredictionTable::new()
            .predict("/", "/a", 0.5)
            .unwrap()
            .predict("/", "/b", 0.5)
            .unwrap();
        assert_eq!(table.top("/", 2), vec!["/a", "/b"]);
    }

    #[test]
    fn repeated_pair_replaces_weight() {
        let table = PredictionTable::new()
            .predict("/nda", "/kyc-portal", 0.1)
            .unwrap()
            .predict("/nda/", "/kyc-portal/", 0.9)
            .unwrap();
        assert_eq!(table.top("/nda", 5), vec!["/kyc-portal"]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn invalid_weights_rejected() {
        for weight in [-0.1, 1.01, f64::NAN, f64::INFINITY] {
            let err = PredictionTable::new()
                .predict("/a", "/b", weight)
                .unwrap_err();
            assert!(matches!(err, PolicyError::InvalidWeight { .. }));
        }
    }

    #[test]
    fn boundary_weights_accepted() {
        let table = PredictionTable::new()
            .predict("/a", "/b", 0.0)
            .unwrap()
            .predict("/a", "/c", 1.0)
            .unwrap();
        assert_eq!(table.top("/a", 2), vec!["/c", "/b"]);
    }

    #[test]
    fn unknown_route_yields_nothing() {
        let table = PredictionTable::onboarding_portal();
        assert!(table.top("/not-a-route", 3).is_empty());
        assert!(!table.contains("/not-a-route"));
    }

    #[test]
    fn onboarding_funnel_predicts_next_stage() {
        let table = PredictionTable::onboarding_portal();
        assert_eq!(table.top("/nda", 1), vec!["/kyc-portal"]);
        assert_eq!(table.top("/kyc-portal", 1), vec!["/agreement"]);
        assert_eq!(table.top("/agreement", 1), vec!["/payment"]);
        assert_eq!(table.top("/payment", 1), vec!["/certificate"]);
        assert_eq!(table.top("/admin", 3).len(), 3);
    }

    #[test]
    fn from_json_validates() {
        let table = PredictionTable::from_json(
            r#"[{"from": "/nda", "next": [{"route": "/kyc-portal", "weight": 0.95}]}]"#,
        )
        .unwrap();
        assert_eq!(table.top("/nda", 3), vec!["/kyc-portal"]);

        let err = PredictionTable::from_json(
            r#"[{"from": "/nda", "next": [{"route": "/kyc-portal", "weight": 3.0}]}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidWeight { .. }));

        let err = PredictionTable::from_json("not json").unwrap_err();
        assert!(matches!(err, PolicyError::Json(_)));
    }
}
