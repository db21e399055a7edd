use opentelemetry::{metrics::Meter, KeyValue};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::instrument;

const RECONCILER_KEY: &str = "reconciler";
const OUTCOME_KEY: &str = "outcome";
const NAMESPACE_KEY: &str = "namespace";

#[derive(Debug, Clone)]
pub struct ControllerMetrics {
    shared: Arc<Mutex<MetricsState>>,
}

#[derive(Debug, Default)]
struct MetricsState {
    reconcile_counts: HashMap<(String, String), u64>,
    surged_autoscalers: HashMap<(String, String), bool>,
}

impl ControllerMetrics {
    #[instrument(skip(meter))]
    pub fn new(meter: Meter) -> Self {
        let shared = Arc::new(Mutex::new(MetricsState::default()));

        let reconcile_shared = Arc::clone(&shared);
        let _reconcile_gauge = meter
            .u64_observable_gauge("eviction_autoscaler_reconcile_total")
            .with_description("Reconcile outcomes per reconciler since process start")
            .with_callback(move |observer| {
                let state = reconcile_shared.lock().unwrap();
                for ((reconciler, outcome), count) in state.reconcile_counts.iter() {
                    observer.observe(
                        *count,
                        &[
                            KeyValue::new(RECONCILER_KEY, reconciler.clone()),
                            KeyValue::new(OUTCOME_KEY, outcome.clone()),
                        ],
                    );
                }
            })
            .init();

        let surged_shared = Arc::clone(&shared);
        let _surged_gauge = meter
            .u64_observable_gauge("eviction_autoscaler_surged_targets")
            .with_description("Number of targets currently surged above their recorded floor, by namespace")
            .with_callback(move |observer| {
                let state = surged_shared.lock().unwrap();
                for (namespace, count) in surged_counts_by_namespace(&state.surged_autoscalers) {
                    observer.observe(count, &[KeyValue::new(NAMESPACE_KEY, namespace)]);
                }
            })
            .init();

        ControllerMetrics { shared }
    }

    /// Records the outcome of a single reconcile pass. `outcome` is expected
    /// to be one of "ok" or "error".
    pub fn record_reconcile(&self, reconciler: &str, outcome: &str) {
        let mut state = self.shared.lock().unwrap();
        *state
            .reconcile_counts
            .entry((reconciler.to_string(), outcome.to_string()))
            .or_default() += 1;
    }

    /// Records whether a single AutoScaler is currently surged above its
    /// recorded floor. Called once per reconcile; the per-namespace gauge is
    /// derived from this set at scrape time.
    pub fn set_surged(&self, namespace: &str, name: &str, surged: bool) {
        let mut state = self.shared.lock().unwrap();
        state
            .surged_autoscalers
            .insert((namespace.to_string(), name.to_string()), surged);
    }
}

/// Counts currently-surged AutoScalers per namespace. A namespace with at
/// least one tracked AutoScaler always appears, even at zero, so a namespace
/// that fully descales doesn't vanish from the gauge.
fn surged_counts_by_namespace(surged: &HashMap<(String, String), bool>) -> HashMap<String, u64> {
    let mut counts = HashMap::new();
    for ((namespace, _name), is_surged) in surged.iter() {
        let count = counts.entry(namespace.clone()).or_insert(0u64);
        if *is_surged {
            *count += 1;
        }
    }
    counts
}

#[cfg(test)]
mod test {
    use super::surged_counts_by_namespace;
    use maplit::hashmap;

    #[test]
    fn counts_only_currently_surged_per_namespace() {
        let surged = hashmap! {
            ("team-a".to_string(), "web".to_string()) => true,
            ("team-a".to_string(), "api".to_string()) => false,
            ("team-b".to_string(), "worker".to_string()) => true,
        };

        let counts = surged_counts_by_namespace(&surged);

        assert_eq!(counts.get("team-a"), Some(&1));
        assert_eq!(counts.get("team-b"), Some(&1));
    }

    #[test]
    fn namespace_with_no_surged_targets_reports_zero() {
        let surged = hashmap! {
            ("team-a".to_string(), "web".to_string()) => false,
        };

        let counts = surged_counts_by_namespace(&surged);

        assert_eq!(counts.get("team-a"), Some(&0));
    }
}
