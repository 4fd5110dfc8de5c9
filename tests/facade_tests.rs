//! Smoke tests for the `factgraph` facade
//!
//! Everything here goes through the re-exports of the top-level crate only.

use factgraph::{Direction, ElementState, Error, Graph, Traversal, Value, P};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn test_quick_start() {
    init_tracing();
    let graph = Graph::open_in_memory().unwrap();
    let tx = graph.tx();
    let marko = tx
        .add_vertex(Some("person"), [("name", Value::from("marko"))])
        .unwrap();
    let vadas = tx
        .add_vertex(Some("person"), [("name", Value::from("vadas"))])
        .unwrap();
    marko
        .add_edge("knows", &vadas, [("weight", Value::from(0.5f64))])
        .unwrap();
    assert_eq!(marko.state(), ElementState::PendingCreate);
    let report = tx.commit().unwrap();
    assert_eq!(report.resolved, 3);

    let reader = graph.tx();
    let known = reader
        .traversal()
        .v(&[])
        .then(|t| t.has("name", "marko").out(&["knows"]))
        .to_list()
        .unwrap();
    assert_eq!(known.len(), 1);
    assert_eq!(known[0].value("name").unwrap(), Some(Value::from("vadas")));

    let marko = reader.vertex(marko.id()).unwrap().unwrap();
    let edges = marko.edges(Direction::Out, &["knows"]).unwrap();
    assert_eq!(edges[0].value("weight").unwrap(), Some(Value::Double(0.5)));
}

#[test]
fn test_unbound_traversal_runs_in_any_transaction() {
    let graph = Graph::open_in_memory().unwrap();
    let traversal = Traversal::v(&[]).has("age", P::gt(30i64));

    let tx = graph.tx();
    tx.add_vertex(Some("person"), [("age", Value::from(32i64))])
        .unwrap();
    assert_eq!(traversal.clone().to_list(&tx).unwrap().len(), 1);
    tx.rollback();
    assert!(traversal.to_list(&tx).unwrap().is_empty());
}

#[test]
fn test_validation_errors_surface_immediately() {
    let graph = Graph::open_in_memory().unwrap();
    let tx = graph.tx();
    let err = tx
        .add_vertex(Some("person"), [("bad key", Value::from(1i64))])
        .unwrap_err();
    assert!(matches!(err, Error::IllegalPropertyKey(_)));
    assert!(err.is_validation());
}
