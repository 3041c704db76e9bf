//! Score Combiner: weighted sum of scalar metric values into a net score.

use crate::types::clamp_unit;
use std::collections::{BTreeMap, HashMap};

/// Default weight table over the canonical scalar fields. Sums to 1.0.
pub fn default_weights() -> BTreeMap<String, f64> {
    [
        ("ramp_up_time", 0.15),
        ("bus_factor", 0.10),
        ("license", 0.10),
        ("size_score", 0.10),
        ("dataset_and_code_score", 0.15),
        ("dataset_quality", 0.15),
        ("code_quality", 0.10),
        ("performance_claims", 0.15),
        ("reproducibility", 0.0),
        ("reviewedness", 0.0),
        ("tree_score", 0.0),
    ]
    .into_iter()
    .map(|(k, w)| (k.to_string(), w))
    .collect()
}

/// Linear combiner over a fixed weight table.
#[derive(Debug, Clone, PartialEq)]
pub struct Combiner {
    weights: BTreeMap<String, f64>,
    total: f64,
}

impl Combiner {
    /// Negative or non-finite weights are treated as zero.
    pub fn new(weights: BTreeMap<String, f64>) -> Self {
        let weights: BTreeMap<String, f64> = weights
            .into_iter()
            .map(|(k, w)| (k, if w.is_finite() && w > 0.0 { w } else { 0.0 }))
            .collect();
        let total = weights.values().sum();
        Self { weights, total }
    }

    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    pub fn weight(&self, field: &str) -> f64 {
        self.weights.get(field).copied().unwrap_or(0.0)
    }

    /// Sum of all weights (`W`).
    pub fn total_weight(&self) -> f64 {
        self.total
    }

    /// `(Σ w·x) / W`, clamped to `[0, 1]`. Missing fields contribute zero and
    /// every input is clamped first, so the `-1` sentinel counts as zero.
    pub fn combine(&self, scalars: &HashMap<String, f64>) -> f64 {
        if self.total <= 0.0 {
            return 0.0;
        }
        let sum: f64 = self
            .weights
            .iter()
            .map(|(field, w)| w * scalars.get(field).copied().map(clamp_unit).unwrap_or(0.0))
            .sum();
        clamp_unit(sum / self.total)
    }
}

impl Default for Combiner {
    fn default() -> Self {
        Self::new(default_weights())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalars(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let combiner = Combiner::default();
        assert!((combiner.total_weight() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input_is_zero() {
        assert_eq!(Combiner::default().combine(&HashMap::new()), 0.0);
    }

    #[test]
    fn test_all_ones_is_one() {
        let combiner = Combiner::default();
        let all: HashMap<String, f64> = combiner.weights().keys().map(|k| (k.clone(), 1.0)).collect();
        assert!((combiner.combine(&all) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_field_contribution() {
        let combiner = Combiner::default();
        let net = combiner.combine(&scalars(&[("license", 0.5)]));
        assert!((net - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_sentinel_counts_as_zero() {
        let weights = [("reviewedness".to_string(), 0.5), ("license".to_string(), 0.5)]
            .into_iter()
            .collect();
        let combiner = Combiner::new(weights);
        let net = combiner.combine(&scalars(&[("reviewedness", -1.0), ("license", 1.0)]));
        assert!((net - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_unweighted_fields_ignored() {
        let combiner = Combiner::default();
        let net = combiner.combine(&scalars(&[("not_a_metric", 1.0)]));
        assert_eq!(net, 0.0);
    }

    #[test]
    fn test_zero_total_weight() {
        let combiner = Combiner::new(BTreeMap::new());
        assert_eq!(combiner.combine(&scalars(&[("license", 1.0)])), 0.0);
    }

    #[test]
    fn test_negative_weight_ignored() {
        let weights = [("license".to_string(), -3.0), ("bus_factor".to_string(), 1.0)]
            .into_iter()
            .collect();
        let combiner = Combiner::new(weights);
        assert_eq!(combiner.weight("license"), 0.0);
        assert_eq!(combiner.combine(&scalars(&[("license", 1.0)])), 0.0);
    }
}
