//! Alert Engine
//!
//! Process-wide registry of threshold rules, keyed by symbol pair.
//!
//! Lock discipline: the pair map sits behind an `RwLock` that is only held
//! long enough to find or insert a pair's rule list; each rule list has its
//! own `Mutex`, so additions and evaluations for one pair are serialized
//! while other pairs proceed independently.
//!
//! Re-trigger policy: rules are level-triggered. A rule emits an event on
//! every evaluation in which its condition holds; there is no latch to reset.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::domain::alert::{AlertEvent, AlertRule, MetricSnapshot, NewAlertRule, PairKey};
use crate::domain::error::AnalyticsError;

type RuleList = Arc<Mutex<Vec<AlertRule>>>;

/// Outcome of evaluating a single rule
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    /// Condition held; an event was produced
    Triggered(AlertEvent),
    /// Condition did not hold, or the metric had no defined value
    Idle,
}

#[derive(Debug)]
pub struct AlertEngine {
    rules: RwLock<HashMap<PairKey, RuleList>>,
    next_id: AtomicU64,
}

impl Default for AlertEngine {
    fn default() -> Self {
        Self {
            rules: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

fn lock_rules(list: &RuleList) -> MutexGuard<'_, Vec<AlertRule>> {
    // A poisoned list still holds whole rules; keep serving it.
    list.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AlertEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule to its pair's rule set and return it with its id
    pub fn add_rule(&self, rule: NewAlertRule) -> Result<AlertRule, AnalyticsError> {
        if !rule.threshold.is_finite() {
            return Err(AnalyticsError::InvalidParameter(format!(
                "alert threshold must be finite, got {}",
                rule.threshold
            )));
        }
        let pair = PairKey::new(&rule.symbol_x, &rule.symbol_y);
        if pair.x_symbol.is_empty() || pair.y_symbol.is_empty() {
            return Err(AnalyticsError::InvalidParameter(
                "alert rule symbols cannot be empty".to_string(),
            ));
        }

        let list = self.rule_list_or_insert(&pair);
        let mut rules = lock_rules(&list);
        let stored = AlertRule {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            pair,
            metric: rule.metric,
            op: rule.op,
            threshold: rule.threshold,
        };
        rules.push(stored.clone());

        tracing::info!(
            rule_id = stored.id,
            pair = %stored.pair,
            metric = %stored.metric,
            op = %stored.op,
            threshold = stored.threshold,
            "Alert rule added"
        );
        Ok(stored)
    }

    /// Remove a rule by id; returns the removed rule if it existed
    pub fn remove_rule(&self, id: u64) -> Option<AlertRule> {
        let map = self.rules.read().unwrap_or_else(|p| p.into_inner());
        for list in map.values() {
            let mut rules = lock_rules(list);
            if let Some(pos) = rules.iter().position(|r| r.id == id) {
                let removed = rules.remove(pos);
                tracing::info!(rule_id = id, pair = %removed.pair, "Alert rule removed");
                return Some(removed);
            }
        }
        None
    }

    /// All rules, ordered by id
    pub fn list_rules(&self) -> Vec<AlertRule> {
        let map = self.rules.read().unwrap_or_else(|p| p.into_inner());
        let mut all: Vec<AlertRule> = map
            .values()
            .flat_map(|list| lock_rules(list).clone())
            .collect();
        all.sort_by_key(|r| r.id);
        all
    }

    /// Rules attached to one pair, in insertion order
    pub fn rules_for_pair(&self, pair: &PairKey) -> Vec<AlertRule> {
        match self.rule_list(pair) {
            Some(list) => lock_rules(&list).clone(),
            None => Vec::new(),
        }
    }

    /// Evaluate every rule of `pair` against the latest metric values
    pub fn evaluate(&self, pair: &PairKey, snapshot: &MetricSnapshot) -> Vec<AlertEvent> {
        let Some(list) = self.rule_list(pair) else {
            return Vec::new();
        };
        let rules = lock_rules(&list);

        let events: Vec<AlertEvent> = rules
            .iter()
            .filter_map(|rule| match Self::evaluate_rule(rule, snapshot) {
                RuleOutcome::Triggered(event) => Some(event),
                RuleOutcome::Idle => None,
            })
            .collect();

        if !events.is_empty() {
            tracing::info!(pair = %pair, triggered = events.len(), "Alert rules triggered");
        }
        events
    }

    /// Evaluate one rule in isolation
    pub fn evaluate_rule(rule: &AlertRule, snapshot: &MetricSnapshot) -> RuleOutcome {
        match snapshot.value(rule.metric) {
            Some((timestamp, value)) if rule.op.holds(value, rule.threshold) => {
                RuleOutcome::Triggered(AlertEvent {
                    rule_id: rule.id,
                    pair: rule.pair.clone(),
                    metric: rule.metric,
                    message: rule.message(value),
                    value,
                    timestamp,
                })
            }
            _ => RuleOutcome::Idle,
        }
    }

    fn rule_list(&self, pair: &PairKey) -> Option<RuleList> {
        let map = self.rules.read().unwrap_or_else(|p| p.into_inner());
        map.get(pair).cloned()
    }

    fn rule_list_or_insert(&self, pair: &PairKey) -> RuleList {
        if let Some(list) = self.rule_list(pair) {
            return list;
        }
        let mut map = self.rules.write().unwrap_or_else(|p| p.into_inner());
        map.entry(pair.clone()).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::alert::{AlertMetric, AlertOperator};
    use chrono::{TimeZone, Utc};
    use std::thread;

    fn zscore_rule(threshold: f64) -> NewAlertRule {
        NewAlertRule {
            symbol_x: "btcusdt".to_string(),
            symbol_y: "ethusdt".to_string(),
            metric: AlertMetric::Zscore,
            op: AlertOperator::GreaterThan,
            threshold,
        }
    }

    fn snapshot(z: f64, spread: f64) -> MetricSnapshot {
        let ts = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        MetricSnapshot {
            zscore: Some((ts, z)),
            spread: Some((ts, spread)),
        }
    }

    #[test]
    fn test_rule_fires_above_threshold() {
        let engine = AlertEngine::new();
        engine.add_rule(zscore_rule(2.0)).unwrap();
        let pair = PairKey::new("btcusdt", "ethusdt");

        let events = engine.evaluate(&pair, &snapshot(2.5, 0.0));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].value, 2.5);
        assert!(events[0].message.contains("zscore > 2"));

        let events = engine.evaluate(&pair, &snapshot(1.9, 0.0));
        assert!(events.is_empty());
    }

    #[test]
    fn test_rule_retriggers_on_every_qualifying_evaluation() {
        let engine = AlertEngine::new();
        engine.add_rule(zscore_rule(2.0)).unwrap();
        let pair = PairKey::new("btcusdt", "ethusdt");

        for _ in 0..3 {
            assert_eq!(engine.evaluate(&pair, &snapshot(3.0, 0.0)).len(), 1);
        }
    }

    #[test]
    fn test_rules_scoped_to_pair() {
        let engine = AlertEngine::new();
        engine.add_rule(zscore_rule(2.0)).unwrap();

        let other = PairKey::new("solusdt", "ethusdt");
        assert!(engine.evaluate(&other, &snapshot(5.0, 0.0)).is_empty());

        // Symbol case does not matter
        let upper = PairKey::new("BTCUSDT", "ETHUSDT");
        assert_eq!(engine.evaluate(&upper, &snapshot(5.0, 0.0)).len(), 1);
    }

    #[test]
    fn test_spread_rule_less_than() {
        let engine = AlertEngine::new();
        engine
            .add_rule(NewAlertRule {
                symbol_x: "btcusdt".into(),
                symbol_y: "ethusdt".into(),
                metric: AlertMetric::Spread,
                op: AlertOperator::LessThan,
                threshold: -10.0,
            })
            .unwrap();
        let pair = PairKey::new("btcusdt", "ethusdt");

        assert_eq!(engine.evaluate(&pair, &snapshot(0.0, -12.0)).len(), 1);
        assert!(engine.evaluate(&pair, &snapshot(0.0, -8.0)).is_empty());
    }

    #[test]
    fn test_missing_metric_value_is_idle() {
        let rule = AlertRule {
            id: 1,
            pair: PairKey::new("a", "b"),
            metric: AlertMetric::Zscore,
            op: AlertOperator::GreaterThan,
            threshold: 0.0,
        };
        let outcome = AlertEngine::evaluate_rule(&rule, &MetricSnapshot::default());
        assert_eq!(outcome, RuleOutcome::Idle);
    }

    #[test]
    fn test_ids_are_sequential_and_removable() {
        let engine = AlertEngine::new();
        let first = engine.add_rule(zscore_rule(2.0)).unwrap();
        let second = engine.add_rule(zscore_rule(3.0)).unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);

        assert_eq!(engine.remove_rule(1).map(|r| r.id), Some(1));
        assert!(engine.remove_rule(1).is_none());
        let remaining = engine.list_rules();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, 2);
    }

    #[test]
    fn test_rejects_non_finite_threshold() {
        let engine = AlertEngine::new();
        let result = engine.add_rule(zscore_rule(f64::NAN));
        assert!(matches!(result, Err(AnalyticsError::InvalidParameter(_))));
    }

    #[test]
    fn test_concurrent_additions_are_not_lost() {
        let engine = Arc::new(AlertEngine::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    for j in 0..25 {
                        engine.add_rule(zscore_rule((i * 25 + j) as f64)).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let rules = engine.list_rules();
        assert_eq!(rules.len(), 200);
        let pair = PairKey::new("btcusdt", "ethusdt");
        assert_eq!(engine.rules_for_pair(&pair).len(), 200);
        // ids are unique
        let mut ids: Vec<u64> = rules.iter().map(|r| r.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 200);
    }
}
