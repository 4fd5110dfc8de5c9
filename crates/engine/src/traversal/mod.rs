//! Traversals
//!
//! A `Traversal` is a linear list of steps that starts at `V` or `E` and
//! narrows, walks or deduplicates from there. Before it runs, the graph's
//! strategies rewrite it; with pushdown enabled the `has` filters after a
//! start step are folded into a `FactGraphStep` that asks the store for
//! exactly the candidates it needs.
//!
//! ```text
//! V().hasLabel("person").has("age", gt(30)).out("knows")
//!   => [FactGraphStep(vertex, ~label.eq(person), age.gt(30)), VertexStep(out, knows)]
//! ```

pub mod graph_step;
pub mod predicate;
pub mod step;
pub mod strategy;

use std::collections::{BTreeSet, HashSet};

use factgraph_core::{Direction, ElementKind, Error, Result};
use tracing::debug;
use uuid::Uuid;

use crate::element::Element;
use crate::transaction::Transaction;

pub use graph_step::{FactGraphStep, ScanPlan};
pub use predicate::P;
pub use step::{
    BarrierStep, EdgeVertexStep, GraphStep, HasContainer, HasKey, HasStep, Step, VertexStep,
};
pub use strategy::{GraphStepStrategy, TraversalStrategies, TraversalStrategy};

/// Ordered list of steps
#[derive(Debug, Clone, PartialEq)]
pub struct Traversal {
    steps: Vec<Step>,
}

impl Traversal {
    fn start(kind: ElementKind, ids: &[Uuid]) -> Self {
        Self {
            steps: vec![Step::Graph(GraphStep {
                kind,
                ids: ids.to_vec(),
                labels: BTreeSet::new(),
            })],
        }
    }

    /// Start at vertices; all of them when `ids` is empty
    pub fn v(ids: &[Uuid]) -> Self {
        Self::start(ElementKind::Vertex, ids)
    }

    /// Start at edges; all of them when `ids` is empty
    pub fn e(ids: &[Uuid]) -> Self {
        Self::start(ElementKind::Edge, ids)
    }

    fn push(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// A start step in the middle: every incoming element maps to the
    /// matching elements of `kind`
    pub fn mid(self, kind: ElementKind, ids: &[Uuid]) -> Self {
        self.push(Step::Graph(GraphStep {
            kind,
            ids: ids.to_vec(),
            labels: BTreeSet::new(),
        }))
    }

    /// Filter on `key`; a bare value means equality
    ///
    /// Conjunctions are split into one container per part.
    pub fn has_p(self, key: HasKey, predicate: impl Into<P>) -> Self {
        let containers = predicate
            .into()
            .conjuncts()
            .into_iter()
            .map(|p| HasContainer::new(key.clone(), p))
            .collect();
        self.push(Step::Has(HasStep {
            containers,
            labels: BTreeSet::new(),
        }))
    }

    /// Filter on a property
    pub fn has(self, name: &str, predicate: impl Into<P>) -> Self {
        self.has_p(HasKey::Property(name.to_string()), predicate)
    }

    /// Filter on the label
    pub fn has_label(self, label: &str) -> Self {
        self.has_p(HasKey::Label, label)
    }

    /// Filter on ids
    pub fn has_id(self, ids: &[Uuid]) -> Self {
        let predicate = match ids {
            [id] => P::eq(*id),
            _ => P::within(ids.iter().copied()),
        };
        self.has_p(HasKey::Id, predicate)
    }

    /// Keep elements that have a property named `name`
    pub fn has_key(self, name: &str) -> Self {
        self.has_p(HasKey::Key, name)
    }

    /// Barrier
    pub fn barrier(self) -> Self {
        self.push(Step::Barrier(BarrierStep::default()))
    }

    fn walk(self, direction: Direction, labels: &[&str], returns: ElementKind) -> Self {
        self.push(Step::Vertex(VertexStep {
            direction,
            edge_labels: labels.iter().map(|s| s.to_string()).collect(),
            returns,
            labels: BTreeSet::new(),
        }))
    }

    /// Adjacent vertices over outgoing edges
    pub fn out(self, labels: &[&str]) -> Self {
        self.walk(Direction::Out, labels, ElementKind::Vertex)
    }

    /// Adjacent vertices over incoming edges
    pub fn in_(self, labels: &[&str]) -> Self {
        self.walk(Direction::In, labels, ElementKind::Vertex)
    }

    /// Adjacent vertices either way
    pub fn both(self, labels: &[&str]) -> Self {
        self.walk(Direction::Both, labels, ElementKind::Vertex)
    }

    /// Outgoing edges
    pub fn out_e(self, labels: &[&str]) -> Self {
        self.walk(Direction::Out, labels, ElementKind::Edge)
    }

    /// Incoming edges
    pub fn in_e(self, labels: &[&str]) -> Self {
        self.walk(Direction::In, labels, ElementKind::Edge)
    }

    /// Incident edges either way
    pub fn both_e(self, labels: &[&str]) -> Self {
        self.walk(Direction::Both, labels, ElementKind::Edge)
    }

    fn edge_vertex(self, direction: Direction) -> Self {
        self.push(Step::EdgeVertex(EdgeVertexStep {
            direction,
            labels: BTreeSet::new(),
        }))
    }

    /// Tail vertex of each edge
    pub fn out_v(self) -> Self {
        self.edge_vertex(Direction::Out)
    }

    /// Head vertex of each edge
    pub fn in_v(self) -> Self {
        self.edge_vertex(Direction::In)
    }

    /// Both endpoints of each edge
    pub fn both_v(self) -> Self {
        self.edge_vertex(Direction::Both)
    }

    /// Drop elements already seen
    pub fn dedup(self) -> Self {
        self.push(Step::Dedup(BTreeSet::new()))
    }

    /// Pass everything through
    pub fn identity(self) -> Self {
        self.push(Step::Identity(BTreeSet::new()))
    }

    /// Label the last step
    pub fn as_(mut self, label: &str) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.labels_mut().insert(label.to_string());
        }
        self
    }

    /// Steps in order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Steps in order, for strategies
    pub fn steps_mut(&mut self) -> &mut Vec<Step> {
        &mut self.steps
    }

    /// Scan plan of the leading start step, once strategies have run
    pub fn start_plan(&self) -> Option<ScanPlan> {
        match self.steps.first()? {
            Step::FactGraph(step) => Some(step.plan().0),
            _ => None,
        }
    }

    /// Rewrite with the graph's strategies and run in `tx`
    ///
    /// # Errors
    ///
    /// An invariant violation if the traversal does not begin with a start
    /// step or walks from the wrong kind of element; store errors otherwise.
    pub fn to_list(mut self, tx: &Transaction) -> Result<Vec<Element>> {
        tx.graph().strategies().apply(&mut self);
        if !self.steps.first().map_or(false, Step::is_start) {
            return Err(Error::invariant("a traversal begins with V or E"));
        }
        debug!(
            txn_id = tx.txn_id(),
            steps = ?self.steps.iter().map(Step::name).collect::<Vec<_>>(),
            "running traversal"
        );

        let mut current: Vec<Element> = Vec::new();
        for (index, step) in self.steps.iter().enumerate() {
            current = match step {
                Step::Graph(start) => {
                    let found = FactGraphStep::from(start.clone()).execute(tx)?;
                    spread(index, &current, found)
                }
                Step::FactGraph(start) => spread(index, &current, start.execute(tx)?),
                Step::Has(has) => {
                    let mut kept = Vec::with_capacity(current.len());
                    'elements: for element in current {
                        for container in &has.containers {
                            if !container.test(&element)? {
                                continue 'elements;
                            }
                        }
                        kept.push(element);
                    }
                    kept
                }
                Step::Vertex(walk) => adjacent(&current, walk)?,
                Step::EdgeVertex(ends) => endpoints(&current, ends.direction)?,
                Step::Dedup(_) => {
                    let mut seen = HashSet::new();
                    current.retain(|element| seen.insert(element.id()));
                    current
                }
                Step::Barrier(_) | Step::Identity(_) => current,
            };
        }
        Ok(current)
    }
}

/// Output of a start step at `index`: the matches themselves at the head of
/// the traversal, once per incoming element further down
fn spread(index: usize, incoming: &[Element], found: Vec<Element>) -> Vec<Element> {
    if index == 0 {
        return found;
    }
    incoming.iter().flat_map(|_| found.iter().cloned()).collect()
}

fn adjacent(current: &[Element], walk: &VertexStep) -> Result<Vec<Element>> {
    let labels: Vec<&str> = walk.edge_labels.iter().map(String::as_str).collect();
    let mut next = Vec::new();
    for element in current {
        let vertex = element.as_vertex().ok_or_else(|| {
            Error::invariant(format!("adjacency step reached edge {}", element.id()))
        })?;
        match walk.returns {
            ElementKind::Vertex => next.extend(
                vertex
                    .vertices(walk.direction, &labels)?
                    .into_iter()
                    .map(Element::from),
            ),
            ElementKind::Edge => next.extend(
                vertex
                    .edges(walk.direction, &labels)?
                    .into_iter()
                    .map(Element::from),
            ),
        }
    }
    Ok(next)
}

fn endpoints(current: &[Element], direction: Direction) -> Result<Vec<Element>> {
    let mut next = Vec::new();
    for element in current {
        let edge = element.as_edge().ok_or_else(|| {
            Error::invariant(format!("endpoint step reached vertex {}", element.id()))
        })?;
        next.extend(edge.vertices(direction)?.into_iter().map(Element::from));
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::graph::Graph;
    use factgraph_core::Value;

    struct Modern {
        graph: Graph,
        marko: Uuid,
        vadas: Uuid,
        josh: Uuid,
        lop: Uuid,
    }

    fn modern(config: GraphConfig) -> Modern {
        let graph = Graph::open(config).unwrap();
        let tx = graph.tx();
        let person = |name: &str, age: i64| {
            tx.add_vertex(
                Some("person"),
                [("name", Value::from(name)), ("age", Value::from(age))],
            )
            .unwrap()
        };
        let marko = person("marko", 29);
        let vadas = person("vadas", 27);
        let josh = person("josh", 32);
        let lop = tx
            .add_vertex(Some("software"), [("name", Value::from("lop"))])
            .unwrap();
        marko
            .add_edge("knows", &vadas, [("weight", Value::from(0.5f64))])
            .unwrap();
        marko
            .add_edge("knows", &josh, [("weight", Value::from(1.0f64))])
            .unwrap();
        marko
            .add_edge("created", &lop, [("weight", Value::from(0.4f64))])
            .unwrap();
        josh.add_edge("created", &lop, [("weight", Value::from(0.4f64))])
            .unwrap();
        tx.commit().unwrap();
        Modern {
            marko: marko.id(),
            vadas: vadas.id(),
            josh: josh.id(),
            lop: lop.id(),
            graph,
        }
    }

    fn ids(elements: Vec<Element>) -> Vec<Uuid> {
        elements.into_iter().map(|e| e.id()).collect()
    }

    fn sorted(mut ids: Vec<Uuid>) -> Vec<Uuid> {
        ids.sort();
        ids
    }

    #[test]
    fn test_label_filter_uses_label_query() {
        let m = modern(GraphConfig::default());
        let mut t = Traversal::v(&[]).has_label("person");
        m.graph.strategies().apply(&mut t);
        assert_eq!(t.steps().len(), 1);
        assert_eq!(t.start_plan(), Some(ScanPlan::ByLabel("person".into())));

        let tx = m.graph.tx();
        let found = Traversal::v(&[]).has_label("person").to_list(&tx).unwrap();
        assert_eq!(sorted(ids(found)), sorted(vec![m.marko, m.vadas, m.josh]));
    }

    #[test]
    fn test_same_results_without_pushdown() {
        let on = modern(GraphConfig::default());
        let off = modern(GraphConfig {
            pushdown: false,
            ..GraphConfig::default()
        });
        let query = |graph: &Graph| {
            let tx = graph.tx();
            let found = Traversal::v(&[])
                .has_label("person")
                .has("age", P::gt(28i64))
                .out(&["created"])
                .dedup()
                .to_list(&tx)
                .unwrap();
            found
                .into_iter()
                .map(|e| e.value("name").unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(query(&on.graph), vec![Some(Value::from("lop"))]);
        assert_eq!(query(&on.graph), query(&off.graph));
    }

    #[test]
    fn test_conflicting_labels_yield_nothing() {
        let m = modern(GraphConfig::default());
        let tx = m.graph.tx();
        let found = Traversal::v(&[])
            .has_label("person")
            .has_label("software")
            .to_list(&tx)
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_ids_then_filters() {
        let m = modern(GraphConfig::default());
        let tx = m.graph.tx();
        let found = Traversal::v(&[])
            .has_id(&[m.marko, m.lop])
            .has_label("person")
            .to_list(&tx)
            .unwrap();
        assert_eq!(ids(found), vec![m.marko]);
    }

    #[test]
    fn test_edges_and_endpoints() {
        let m = modern(GraphConfig::default());
        let tx = m.graph.tx();
        let heads = Traversal::e(&[])
            .has_label("created")
            .in_v()
            .dedup()
            .to_list(&tx)
            .unwrap();
        assert_eq!(ids(heads), vec![m.lop]);

        let heavy = Traversal::v(&[m.marko])
            .out_e(&[])
            .has("weight", P::gt(0.45f64))
            .to_list(&tx)
            .unwrap();
        assert_eq!(heavy.len(), 2);
        assert!(heavy.iter().all(|e| e.label() == "knows"));
    }

    #[test]
    fn test_walk_from_edge_is_invariant_error() {
        let m = modern(GraphConfig::default());
        let tx = m.graph.tx();
        let err = Traversal::e(&[]).out(&[]).to_list(&tx).unwrap_err();
        assert!(matches!(err, Error::Invariant(_)));
    }

    #[test]
    fn test_sees_own_writes() {
        let m = modern(GraphConfig::default());
        let tx = m.graph.tx();
        let peter = tx
            .add_vertex(Some("person"), [("name", Value::from("peter"))])
            .unwrap();
        let found = Traversal::v(&[])
            .has("name", "peter")
            .to_list(&tx)
            .unwrap();
        assert_eq!(ids(found), vec![peter.id()]);

        let vadas = tx.vertex(m.vadas).unwrap().unwrap();
        vadas.remove().unwrap();
        let people = Traversal::v(&[]).has_label("person").to_list(&tx).unwrap();
        assert_eq!(people.len(), 3);
        assert!(!ids(people).contains(&m.vadas));
    }

    #[test]
    fn test_has_key_and_mid_traversal_start() {
        let m = modern(GraphConfig::default());
        let tx = m.graph.tx();
        let aged = Traversal::v(&[]).has_key("age").to_list(&tx).unwrap();
        assert_eq!(aged.len(), 3);

        let pairs = Traversal::v(&[m.marko, m.josh])
            .mid(ElementKind::Vertex, &[])
            .has_label("software")
            .to_list(&tx)
            .unwrap();
        assert_eq!(ids(pairs), vec![m.lop, m.lop]);
    }

    #[test]
    fn test_missing_start_step() {
        let m = modern(GraphConfig::default());
        let tx = m.graph.tx();
        let mut t = Traversal::v(&[]);
        t.steps_mut().remove(0);
        let t = t.identity();
        assert!(matches!(t.to_list(&tx), Err(Error::Invariant(_))));
    }
}
