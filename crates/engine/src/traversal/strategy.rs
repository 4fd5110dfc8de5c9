//! Traversal strategies
//!
//! A strategy rewrites a traversal before it runs. The graph applies its
//! strategies in order on every `to_list`.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::graph_step::FactGraphStep;
use super::step::{HasKey, Step};
use super::Traversal;
use crate::config::GraphConfig;

/// A rewrite applied to every traversal before execution
pub trait TraversalStrategy: Send + Sync + fmt::Debug {
    /// Name, for logs
    fn name(&self) -> &'static str;

    /// Rewrite `traversal` in place
    fn apply(&self, traversal: &mut Traversal);
}

/// Fuses `has` filters into the start step they follow
///
/// Every `GraphStep` becomes a `FactGraphStep`. The `has` steps directly
/// after it move into it, skipping over barriers, until a step of another
/// kind or a `has` on the computed `~key`. Labels of a removed step go to the
/// step before it.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphStepStrategy;

fn fusable(step: &Step) -> bool {
    match step {
        Step::Barrier(_) => true,
        Step::Has(has) => has.containers.iter().all(|c| c.key != HasKey::Key),
        _ => false,
    }
}

impl TraversalStrategy for GraphStepStrategy {
    fn name(&self) -> &'static str {
        "GraphStepStrategy"
    }

    fn apply(&self, traversal: &mut Traversal) {
        let steps = &mut traversal.steps;
        let mut index = 0;
        while index < steps.len() {
            let Step::Graph(start) = &steps[index] else {
                index += 1;
                continue;
            };
            let mut fact = FactGraphStep::from(start.clone());
            let start_index = index;
            let mut cursor = index + 1;

            while cursor < steps.len() && fusable(&steps[cursor]) {
                if matches!(steps[cursor], Step::Barrier(_)) {
                    cursor += 1;
                    continue;
                }
                let Step::Has(has) = steps.remove(cursor) else {
                    break;
                };
                for container in has.containers {
                    if !fact.process_ids(&container) {
                        fact.add_container(container);
                    }
                }
                let previous = cursor - 1;
                if previous == start_index {
                    fact.labels.extend(has.labels);
                } else {
                    steps[previous].labels_mut().extend(has.labels);
                }
            }

            debug!(
                ids = fact.ids.len(),
                containers = fact.containers.len(),
                "fused graph step"
            );
            steps[start_index] = Step::FactGraph(fact);
            index = cursor;
        }
    }
}

/// Ordered set of strategies
#[derive(Clone, Default)]
pub struct TraversalStrategies {
    strategies: Vec<Arc<dyn TraversalStrategy>>,
}

impl fmt::Debug for TraversalStrategies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl TraversalStrategies {
    /// No strategies
    pub fn new() -> Self {
        Self::default()
    }

    /// Strategies a graph with `config` applies
    pub fn for_config(config: &GraphConfig) -> Self {
        let mut strategies = Self::new();
        if config.pushdown {
            strategies.add(Arc::new(GraphStepStrategy));
        }
        strategies
    }

    /// Append a strategy
    pub fn add(&mut self, strategy: Arc<dyn TraversalStrategy>) -> &mut Self {
        self.strategies.push(strategy);
        self
    }

    /// Apply all strategies in order
    pub fn apply(&self, traversal: &mut Traversal) {
        for strategy in &self.strategies {
            strategy.apply(traversal);
        }
    }

    /// Whether there is nothing to apply
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Strategy names, in order
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::traversal::predicate::P;
    use crate::traversal::step::{BarrierStep, HasContainer};
    use factgraph_core::ElementKind;
    use uuid::Uuid;

    fn labels(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn rewrite(mut traversal: Traversal) -> Traversal {
        GraphStepStrategy.apply(&mut traversal);
        traversal
    }

    fn fact(traversal: &Traversal, index: usize) -> &FactGraphStep {
        match &traversal.steps()[index] {
            Step::FactGraph(step) => step,
            other => panic!("expected a fused graph step, got {}", other.name()),
        }
    }

    #[test]
    fn test_fuses_has_steps_and_keeps_labels() {
        let t = rewrite(Traversal::v(&[]).has("name", "marko").as_("a"));
        assert_eq!(t.steps().len(), 1);
        let step = fact(&t, 0);
        assert_eq!(step.containers.len(), 1);
        assert_eq!(step.labels, labels(&["a"]));
    }

    #[test]
    fn test_labels_of_start_and_filter_merge() {
        let t = rewrite(
            Traversal::v(&[])
                .as_("a")
                .has("name", "marko")
                .as_("b")
                .has("age", P::gt(20i64))
                .as_("c"),
        );
        assert_eq!(t.steps().len(), 1);
        assert_eq!(fact(&t, 0).labels, labels(&["a", "b", "c"]));
    }

    #[test]
    fn test_fuses_past_barriers() {
        let t = rewrite(
            Traversal::v(&[])
                .has("name", "marko")
                .barrier()
                .as_("x")
                .has("age", P::gt(20i64))
                .as_("y"),
        );
        assert_eq!(t.steps().len(), 2);
        assert_eq!(fact(&t, 0).containers.len(), 2);
        assert_eq!(
            t.steps()[1],
            Step::Barrier(BarrierStep {
                labels: labels(&["x", "y"])
            })
        );
    }

    #[test]
    fn test_stops_at_other_steps() {
        let t = rewrite(
            Traversal::v(&[])
                .has_label("person")
                .out(&["knows"])
                .has("age", P::gt(30i64)),
        );
        assert_eq!(t.steps().len(), 3);
        assert_eq!(fact(&t, 0).containers.len(), 1);
        assert!(matches!(t.steps()[2], Step::Has(_)));
    }

    #[test]
    fn test_computed_key_is_not_fused() {
        let t = rewrite(Traversal::v(&[]).has_key("name").has_label("person"));
        assert_eq!(t.steps().len(), 3);
        assert!(fact(&t, 0).containers.is_empty());
    }

    #[test]
    fn test_id_filter_folds_into_empty_ids() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let t = rewrite(Traversal::v(&[]).has_id(&[a, b]).has_id(&[a]));
        let step = fact(&t, 0);
        assert_eq!(step.ids, vec![a, b]);
        // the second id filter still narrows the result
        assert_eq!(step.containers, vec![HasContainer::new(HasKey::Id, P::eq(a))]);

        let t = rewrite(Traversal::v(&[b]).has_id(&[a]));
        assert_eq!(fact(&t, 0).ids, vec![b]);
        assert_eq!(fact(&t, 0).containers.len(), 1);
    }

    #[test]
    fn test_every_start_step_is_rewritten() {
        let t = rewrite(
            Traversal::v(&[])
                .has_label("person")
                .mid(ElementKind::Edge, &[])
                .has_label("knows"),
        );
        assert_eq!(t.steps().len(), 2);
        assert_eq!(fact(&t, 1).kind, ElementKind::Edge);
        assert_eq!(fact(&t, 1).containers.len(), 1);
    }

    #[test]
    fn test_for_config() {
        let strategies = TraversalStrategies::for_config(&GraphConfig::default());
        assert_eq!(strategies.names(), vec!["GraphStepStrategy"]);
        let off = GraphConfig {
            pushdown: false,
            ..GraphConfig::default()
        };
        assert!(TraversalStrategies::for_config(&off).is_empty());
    }
}
