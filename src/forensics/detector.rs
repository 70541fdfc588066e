//! Rule registry and anomaly detection over a built document graph
//! Author: kartik4091
//!
//! Rules are independent and pure: each reads the immutable graph and
//! returns its own anomalies. Evaluation order (and whether the rayon pool
//! is used) never changes the result because the merged list is sorted
//! with [`Anomaly::report_order`].

use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::AnalysisConfig;
use crate::forensics::anomaly::{sort_anomalies, Anomaly, AnomalyKind};
use crate::forensics::rules;
use crate::structure::graph::DocumentGraph;

pub trait AnomalyRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Kinds this rule can emit
    fn kinds(&self) -> &'static [AnomalyKind];

    fn evaluate(&self, graph: &DocumentGraph) -> Vec<Anomaly>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DetectionStats {
    pub rules_evaluated: usize,
    pub rules_skipped: usize,
    pub anomalies_found: usize,
    pub duration_ms: u64,
}

pub struct AnomalyDetector {
    rules: Vec<Box<dyn AnomalyRule>>,
    disabled: Vec<AnomalyKind>,
    parallel: bool,
}

impl AnomalyDetector {
    /// Detector without any rules
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            disabled: Vec::new(),
            parallel: false,
        }
    }

    /// Detector with every built-in rule, tuned and filtered by `config`
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            rules: rules::default_rules(config),
            disabled: AnomalyKind::ALL
                .into_iter()
                .filter(|kind| !config.is_rule_enabled(*kind))
                .collect(),
            parallel: config.parallel_rules,
        }
    }

    pub fn with_rule(mut self, rule: Box<dyn AnomalyRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = Box<dyn AnomalyRule>>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_disabled(mut self, kinds: impl IntoIterator<Item = AnomalyKind>) -> Self {
        self.disabled.extend(kinds);
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    fn is_active(&self, rule: &dyn AnomalyRule) -> bool {
        rule.kinds().iter().any(|kind| !self.disabled.contains(kind))
    }

    pub fn detect(&self, graph: &DocumentGraph) -> Vec<Anomaly> {
        self.detect_with_stats(graph).0
    }

    #[instrument(skip_all, fields(rules = self.rules.len(), parallel = self.parallel))]
    pub fn detect_with_stats(&self, graph: &DocumentGraph) -> (Vec<Anomaly>, DetectionStats) {
        let started = Instant::now();
        let active: Vec<&dyn AnomalyRule> = self
            .rules
            .iter()
            .map(|rule| rule.as_ref())
            .filter(|rule| self.is_active(*rule))
            .collect();

        let run = |rule: &&dyn AnomalyRule| {
            let found = rule.evaluate(graph);
            debug!(rule = rule.name(), found = found.len(), "Rule evaluated");
            found
        };
        let batches: Vec<Vec<Anomaly>> = if self.parallel {
            active.par_iter().map(run).collect()
        } else {
            active.iter().map(run).collect()
        };

        let mut anomalies: Vec<Anomaly> = batches
            .into_iter()
            .flatten()
            .filter(|anomaly| !self.disabled.contains(&anomaly.kind))
            .collect();
        sort_anomalies(&mut anomalies);

        let stats = DetectionStats {
            rules_evaluated: active.len(),
            rules_skipped: self.rules.len() - active.len(),
            anomalies_found: anomalies.len(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            anomalies = stats.anomalies_found,
            rules = stats.rules_evaluated,
            "Anomaly detection complete"
        );
        (anomalies, stats)
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}
