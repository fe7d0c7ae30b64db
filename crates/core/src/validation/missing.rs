//! Keys that nothing binds.

use crate::config::CompilerOptions;
use crate::diagnostics::DiagnosticReporter;
use crate::error::Result;
use crate::graph::{BindingGraph, EdgeView, Node};
use bindscope_api::{ComponentPath, Diagnostic, Key, RequestKind, Severity};
use indexmap::IndexSet;
use petgraph::stable_graph::NodeIndex;

pub const PLUGIN: &str = "bindscope/MissingBinding";

/// One error per entry point that depends on a missing key.
///
/// Graphs of modules or subcomponents validated on their own are skipped:
/// whatever installs them may well bind what is missing here.
pub fn validate_missing_bindings(graph: &BindingGraph, options: &CompilerOptions) -> Result<Vec<Diagnostic>> {
    let mut reporter = DiagnosticReporter::new(graph, options, PLUGIN);
    if graph.is_full_binding_graph() || graph.root_component().descriptor().is_subcomponent() {
        return Ok(Vec::new());
    }
    let missing: Vec<(NodeIndex, ComponentPath, Key)> = graph
        .missing_binding_nodes()
        .map(|(idx, path, key)| (idx, path.clone(), key.clone()))
        .collect();
    for (node, path, key) in missing {
        let entry_points = graph.entry_point_edges_depending_on(node);
        if entry_points.is_empty() {
            let incoming = graph.in_edges(node).into_iter().find(|e| e.request().is_some());
            let message = missing_message(graph, &key, incoming.as_ref())?;
            reporter.report_component(Severity::Error, &path, message);
            continue;
        }
        for entry_point in &entry_points {
            let trace = graph.shortest_path(entry_point.target, node)?;
            let incoming = match trace.as_slice() {
                [.., before, last] if *last == node => graph.dependency_edge_between(*before, node),
                _ => Some(*entry_point),
            };
            let message = missing_message(graph, &key, incoming.as_ref())?;
            reporter.report_from_entry_point(Severity::Error, entry_point, node, message)?;
        }
    }
    Ok(reporter.into_diagnostics())
}

fn missing_message(graph: &BindingGraph, key: &Key, incoming: Option<&EdgeView<'_>>) -> Result<String> {
    let hints = graph.missing_binding_hints(key);
    let produces = match incoming {
        Some(edge) => requested_in_production(graph, edge)?,
        None => false,
    };
    let mut message = format!("{} cannot be provided without ", key);
    if hints.implicitly_injectable {
        message.push_str("an @Inject constructor or ");
    }
    message.push_str("an @Provides-");
    if produces {
        message.push_str(" or @Produces-");
    }
    message.push_str("annotated method.");
    if hints.has_injection_sites {
        message.push_str(" This type supports members injection but cannot be implicitly provided.");
    }

    let mut elsewhere: IndexSet<String> = IndexSet::new();
    for (_, node) in graph.bindings(key) {
        elsewhere.insert(node.path.current().to_string());
    }
    for component in elsewhere {
        message.push_str(&format!("\nA binding with matching key exists in component: {}", component));
    }
    Ok(message)
}

/// Whether an `@Produces` method could have satisfied the request.
fn requested_in_production(graph: &BindingGraph, edge: &EdgeView<'_>) -> Result<bool> {
    Ok(match graph.node(edge.source)? {
        Node::Binding(binding) => binding.binding.is_production(),
        Node::Component { path, .. } => {
            let production = graph
                .component(path)
                .is_some_and(|c| c.descriptor().production);
            production
                && edge.request().is_some_and(|r| {
                    matches!(
                        r.kind,
                        RequestKind::Instance | RequestKind::Producer | RequestKind::Future
                    )
                })
        }
        Node::Missing { .. } => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::test_support::*;
    use bindscope_plugin::InMemoryRepository;
    use bindscope_plugin::testing::*;

    #[test]
    fn test_one_diagnostic_per_entry_point() {
        let repo = InMemoryRepository::new()
            .with(
                component("App")
                    .entry_point("cache", "Cache")
                    .entry_point("store", "Store")
                    .build(),
            )
            .and_then(|r| r.with(class("Cache").inject_constructor(&[("client", "HttpClient")]).build()))
            .and_then(|r| r.with(class("Store").inject_constructor(&[("client", "HttpClient")]).build()))
            .and_then(|r| r.with(interface("HttpClient").build()))
            .unwrap();
        let diagnostics = validate_missing_bindings(&graph(&repo, "App"), &defaults()).unwrap();
        assert_eq!(
            messages(&diagnostics),
            vec![
                "HttpClient cannot be provided without an @Provides-annotated method.\
                 \n    HttpClient is injected at\
                 \n        Cache(client)\
                 \n    Cache is provided at\
                 \n        App.cache()",
                "HttpClient cannot be provided without an @Provides-annotated method.\
                 \n    HttpClient is injected at\
                 \n        Store(client)\
                 \n    Store is provided at\
                 \n        App.store()",
            ]
        );
        assert!(diagnostics.iter().all(|d| d.severity == Severity::Error));
    }

    #[test]
    fn test_class_without_inject_constructor() {
        let repo = InMemoryRepository::new()
            .with(component("App").entry_point("cache", "Cache").build())
            .and_then(|r| r.with(class("Cache").inject_field("clock", "Clock").build()))
            .and_then(|r| r.with(class("Clock").inject_constructor(&[]).build()))
            .unwrap();
        let diagnostics = validate_missing_bindings(&graph(&repo, "App"), &defaults()).unwrap();
        assert_eq!(
            messages(&diagnostics),
            vec![
                "Cache cannot be provided without an @Inject constructor or an @Provides-annotated method. This type supports members injection but cannot be implicitly provided.\
                 \n    Cache is provided at\
                 \n        App.cache()"
            ]
        );
    }

    #[test]
    fn test_binding_in_child_is_mentioned() {
        let repo = InMemoryRepository::new()
            .with(
                component("App")
                    .entry_point("clock", "Clock")
                    .method(method("child", "Child").abstract_method())
                    .build(),
            )
            .and_then(|r| r.with(subcomponent("Child").install("ClockModule").entry_point("clock", "Clock").build()))
            .and_then(|r| r.with(module("ClockModule").provides("clock", "Clock", &[]).build()))
            .and_then(|r| r.with(interface("Clock").build()))
            .unwrap();
        let diagnostics = validate_missing_bindings(&graph(&repo, "App"), &defaults()).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0]
            .message
            .contains("\nA binding with matching key exists in component: Child"));
    }

    #[test]
    fn test_module_graphs_are_skipped() {
        let repo = InMemoryRepository::new()
            .with(module("NetModule").provides("client", "HttpClient", &[("dns", "Dns")]).build())
            .unwrap();
        let graph = crate::resolver::BindingGraphFactory::new(&repo)
            .create("NetModule", true)
            .unwrap();
        assert_eq!(graph.missing_binding_nodes().count(), 1);
        assert!(validate_missing_bindings(&graph, &defaults()).unwrap().is_empty());
    }
}
