//! Start step with pushed-down filters
//!
//! `FactGraphStep` replaces a plain `GraphStep` once the pushdown strategy
//! has folded the following `has` filters into it. At execution it picks the
//! cheapest lookup the filters allow and tests the rest in memory:
//!
//! 1. ids present: resolve each id through the unique id attribute
//! 2. an exact label: query the label attribute for that value
//! 3. otherwise: scan every element of the kind

use std::collections::BTreeSet;
use std::sync::Arc;

use factgraph_core::{ElementIdentity, ElementKind, Result, Value};
use tracing::debug;
use uuid::Uuid;

use super::predicate::P;
use super::step::{GraphStep, HasContainer, HasKey};
use crate::element::{Edge, Element, Vertex};
use crate::helper;
use crate::transaction::Transaction;

/// How a `FactGraphStep` finds its candidates
#[derive(Debug, Clone, PartialEq)]
pub enum ScanPlan {
    /// Resolve these ids
    ByIds(Vec<Uuid>),
    /// Query the label attribute
    ByLabel(String),
    /// The filters contradict each other
    Empty,
    /// Every element of the kind
    FullScan,
}

/// Start step carrying ids and filters
#[derive(Debug, Clone, PartialEq)]
pub struct FactGraphStep {
    /// Vertices or edges
    pub kind: ElementKind,
    /// Ids to resolve; all elements when empty
    pub ids: Vec<Uuid>,
    /// Filters, all of which must hold
    pub containers: Vec<HasContainer>,
    /// Step labels (`as`)
    pub labels: BTreeSet<String>,
}

impl From<GraphStep> for FactGraphStep {
    fn from(step: GraphStep) -> Self {
        Self {
            kind: step.kind,
            ids: step.ids,
            containers: Vec::new(),
            labels: step.labels,
        }
    }
}

fn uuids(predicate: &P) -> Option<Vec<Uuid>> {
    match predicate {
        P::Eq(value) => value.as_uuid().map(|id| vec![id]),
        P::Within(values) if !values.is_empty() => values.iter().map(Value::as_uuid).collect(),
        _ => None,
    }
}

impl FactGraphStep {
    /// Fold an id filter into the id list
    ///
    /// Only an equality or membership on ids is folded, and only while the
    /// step has no ids yet; anything else stays a filter. Returns whether the
    /// container was consumed.
    pub fn process_ids(&mut self, container: &HasContainer) -> bool {
        if container.key != HasKey::Id || !self.ids.is_empty() {
            return false;
        }
        match uuids(&container.predicate) {
            Some(ids) => {
                self.ids = ids;
                true
            }
            None => false,
        }
    }

    /// Add a filter
    pub fn add_container(&mut self, container: HasContainer) {
        self.containers.push(container);
    }

    /// Lookup to run and the filters left to test afterwards
    pub fn plan(&self) -> (ScanPlan, Vec<HasContainer>) {
        if !self.ids.is_empty() {
            return (ScanPlan::ByIds(self.ids.clone()), self.containers.clone());
        }

        let labels: BTreeSet<&str> = self
            .containers
            .iter()
            .filter_map(HasContainer::exact_label)
            .collect();
        let mut labels = labels.into_iter();
        match (labels.next(), labels.next()) {
            (None, _) => (ScanPlan::FullScan, self.containers.clone()),
            (Some(_), Some(_)) => (ScanPlan::Empty, Vec::new()),
            (Some(label), None) => {
                let residual = self
                    .containers
                    .iter()
                    .filter(|c| c.exact_label().is_none())
                    .cloned()
                    .collect();
                (ScanPlan::ByLabel(label.to_string()), residual)
            }
        }
    }

    /// Run the lookup and the remaining filters in `tx`
    pub fn execute(&self, tx: &Transaction) -> Result<Vec<Element>> {
        let (plan, residual) = self.plan();
        debug!(
            kind = %self.kind,
            plan = ?plan,
            residual = residual.len(),
            "graph step"
        );

        let identities = self.candidates(tx, &plan)?;
        let mut elements = Vec::with_capacity(identities.len());
        for identity in identities {
            let element = match self.kind {
                ElementKind::Vertex => Element::from(Vertex::bind(identity, Arc::clone(tx.shared()))),
                ElementKind::Edge => Element::from(Edge::bind(identity, Arc::clone(tx.shared()))),
            };
            let mut keep = true;
            for container in &residual {
                if !container.test(&element)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                elements.push(element);
            }
        }
        Ok(elements)
    }

    fn candidates(&self, tx: &Transaction, plan: &ScanPlan) -> Result<Vec<Arc<ElementIdentity>>> {
        let kind = self.kind;
        match plan {
            ScanPlan::Empty => Ok(Vec::new()),
            ScanPlan::ByIds(ids) => tx.elements(kind, ids),
            ScanPlan::FullScan => tx.elements(kind, &[]),
            ScanPlan::ByLabel(label) => tx.shared().read(|ctx, db| {
                Ok(helper::scan_by_label(db, kind, label)?
                    .into_iter()
                    .filter_map(|id| db.entity(id))
                    .filter_map(|entity| helper::identity_of(ctx, &entity))
                    .collect())
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step() -> FactGraphStep {
        FactGraphStep::from(GraphStep {
            kind: ElementKind::Vertex,
            ids: Vec::new(),
            labels: BTreeSet::new(),
        })
    }

    #[test]
    fn test_process_ids_folds_only_into_empty_ids() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut s = step();
        assert!(s.process_ids(&HasContainer::new(HasKey::Id, P::within([a, b]))));
        assert_eq!(s.ids, vec![a, b]);
        assert!(!s.process_ids(&HasContainer::new(HasKey::Id, P::eq(a))));
        assert_eq!(s.ids, vec![a, b]);
    }

    #[test]
    fn test_process_ids_ignores_other_predicates() {
        let mut s = step();
        assert!(!s.process_ids(&HasContainer::new(HasKey::Id, P::Neq(Value::Uuid(Uuid::new_v4())))));
        assert!(!s.process_ids(&HasContainer::new(HasKey::Id, P::eq(7i64))));
        assert!(!s.process_ids(&HasContainer::new(HasKey::Label, P::eq("person"))));
        assert!(s.ids.is_empty());
    }

    #[test]
    fn test_plan_prefers_ids_then_label() {
        let mut s = step();
        assert_eq!(s.plan(), (ScanPlan::FullScan, Vec::new()));

        let label = HasContainer::new(HasKey::Label, P::eq("person"));
        let age = HasContainer::new(HasKey::Property("age".into()), P::gt(30i64));
        s.add_container(label.clone());
        s.add_container(age.clone());
        assert_eq!(s.plan(), (ScanPlan::ByLabel("person".into()), vec![age.clone()]));

        let id = Uuid::new_v4();
        s.ids = vec![id];
        assert_eq!(s.plan(), (ScanPlan::ByIds(vec![id]), vec![label, age]));
    }

    #[test]
    fn test_plan_conflicting_labels_is_empty() {
        let mut s = step();
        s.add_container(HasContainer::new(HasKey::Label, P::eq("person")));
        s.add_container(HasContainer::new(HasKey::Label, P::eq("software")));
        assert_eq!(s.plan().0, ScanPlan::Empty);

        // the same label twice is no contradiction
        let mut s = step();
        s.add_container(HasContainer::new(HasKey::Label, P::eq("person")));
        s.add_container(HasContainer::new(HasKey::Label, P::eq("person")));
        assert_eq!(s.plan(), (ScanPlan::ByLabel("person".into()), Vec::new()));
    }
}
