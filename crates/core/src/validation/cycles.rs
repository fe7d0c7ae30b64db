//! Dependency cycles that no framework indirection can break.

use crate::config::CompilerOptions;
use crate::diagnostics::{DiagnosticReporter, format_request};
use crate::error::Result;
use crate::graph::{BindingGraph, EdgeView, Node};
use bindscope_api::{DependencyRequest, Diagnostic, RequestKind, Severity, TypeRef, frameworks};
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use petgraph::stable_graph::NodeIndex;
use std::collections::{HashMap, HashSet, VecDeque};

pub const PLUGIN: &str = "bindscope/DependencyCycle";

pub fn validate_dependency_cycles(graph: &BindingGraph, options: &CompilerOptions) -> Result<Vec<Diagnostic>> {
    let mut reporter = DiagnosticReporter::new(graph, options, PLUGIN);
    let edges = non_breaking_edges(graph)?;
    let mut subgraph: DiGraphMap<NodeIndex, ()> = DiGraphMap::new();
    for edge in &edges {
        subgraph.add_edge(edge.source, edge.target, ());
    }

    let mut component_of: HashMap<NodeIndex, usize> = HashMap::new();
    for (i, scc) in tarjan_scc(&subgraph).into_iter().enumerate() {
        let cyclic = scc.len() > 1 || scc.first().is_some_and(|&n| subgraph.contains_edge(n, n));
        if cyclic {
            component_of.extend(scc.into_iter().map(|n| (n, i)));
        }
    }
    if component_of.is_empty() {
        return Ok(Vec::new());
    }

    let mut visited: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
    for edge in &edges {
        let pair = (edge.source, edge.target);
        let same_component = matches!(
            (component_of.get(&edge.source), component_of.get(&edge.target)),
            (Some(a), Some(b)) if a == b
        );
        if !same_component || !visited.insert(pair) {
            continue;
        }
        let Some(cycle) = Cycle::closing(&subgraph, edge.source, edge.target) else {
            continue;
        };
        visited.extend(cycle.pairs());
        report_cycle(&mut reporter, &edges, &cycle)?;
    }
    Ok(reporter.into_diagnostics())
}

/// Dependency edges along which instantiation cannot be deferred, in edge order.
fn non_breaking_edges(graph: &BindingGraph) -> Result<Vec<EdgeView<'_>>> {
    let mut edges = Vec::new();
    for edge in graph.dependency_edges() {
        let Some(request) = edge.request() else {
            continue;
        };
        let optional_target = matches!(
            graph.node(edge.target)?,
            Node::Binding(b) if b.binding.is_optional()
        );
        if !breaks_cycle(request, optional_target) {
            edges.push(edge);
        }
    }
    Ok(edges)
}

fn breaks_cycle(request: &DependencyRequest, optional_target: bool) -> bool {
    // Multibinding contributions are always instantiated with their aggregate.
    if request.key.is_contribution() {
        return false;
    }
    if type_breaks_cycle(&request.key.ty, request.kind) {
        return true;
    }
    if optional_target && let Some(value) = request.key.ty.optional_value() {
        let (kind, inner) = RequestKind::extract(value);
        return type_breaks_cycle(&inner, kind);
    }
    false
}

fn type_breaks_cycle(ty: &TypeRef, kind: RequestKind) -> bool {
    if kind.defers_instantiation() {
        return true;
    }
    if kind != RequestKind::Instance {
        return false;
    }
    if ty.is(frameworks::MEMBERS_INJECTOR) {
        return true;
    }
    match ty.map_entry() {
        Some((_, value)) => RequestKind::extract(value).0.defers_instantiation(),
        None => false,
    }
}

/// Nodes of a cycle; each node depends on the next, and the last on the first.
struct Cycle {
    nodes: Vec<NodeIndex>,
}

impl Cycle {
    /// The shortest cycle through the edge `source -> target`, if any.
    fn closing(subgraph: &DiGraphMap<NodeIndex, ()>, source: NodeIndex, target: NodeIndex) -> Option<Self> {
        let nodes = shortest_path(subgraph, target, source);
        if nodes.is_empty() {
            None
        } else {
            Some(Self { nodes })
        }
    }

    fn pairs(&self) -> Vec<(NodeIndex, NodeIndex)> {
        let n = self.nodes.len();
        (0..n).map(|i| (self.nodes[i], self.nodes[(i + 1) % n])).collect()
    }

    fn contains(&self, node: NodeIndex) -> bool {
        self.nodes.contains(&node)
    }

    /// The same cycle, starting at `start`.
    fn shifted(&self, start: NodeIndex) -> Self {
        let offset = self.nodes.iter().position(|&n| n == start).unwrap_or(0);
        let mut nodes = self.nodes.clone();
        nodes.rotate_left(offset);
        Self { nodes }
    }
}

fn shortest_path(subgraph: &DiGraphMap<NodeIndex, ()>, from: NodeIndex, to: NodeIndex) -> Vec<NodeIndex> {
    if from == to {
        return if subgraph.contains_node(from) { vec![from] } else { Vec::new() };
    }
    let mut previous: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut queue = VecDeque::from([from]);
    let mut seen = HashSet::from([from]);
    while let Some(current) = queue.pop_front() {
        for next in subgraph.neighbors(current) {
            if !seen.insert(next) {
                continue;
            }
            previous.insert(next, current);
            if next == to {
                let mut path = vec![to];
                let mut cursor = to;
                while let Some(&p) = previous.get(&cursor) {
                    path.push(p);
                    cursor = p;
                }
                path.reverse();
                return path;
            }
            queue.push_back(next);
        }
    }
    Vec::new()
}

fn report_cycle(reporter: &mut DiagnosticReporter<'_>, edges: &[EdgeView<'_>], cycle: &Cycle) -> Result<()> {
    let graph = reporter.graph();
    let first = cycle.nodes[0];
    let owner = graph.node(first)?.component_path().clone();

    if graph.is_full_binding_graph() {
        reporter.report_component(Severity::Error, &owner, message(edges, cycle));
        return Ok(());
    }

    // Report at the request that leads into the cycle from the owning component.
    let entry = match graph.component_node(&owner) {
        Some(component) => graph.shortest_network_path(component, first)?,
        None => Vec::new(),
    };
    let cut = entry.iter().position(|&n| cycle.contains(n));
    let into_cycle = match cut {
        Some(i) if i > 0 => graph
            .dependency_edge_between(entry[i - 1], entry[i])
            .map(|edge| (edge, entry[i])),
        _ => None,
    };
    match into_cycle {
        Some((edge, start)) => {
            reporter.report_dependency(Severity::Error, &edge, message(edges, &cycle.shifted(start)))?;
        }
        None => reporter.report_component(Severity::Error, &owner, message(edges, cycle)),
    }
    Ok(())
}

fn message(edges: &[EdgeView<'_>], cycle: &Cycle) -> String {
    let mut message = String::from("Found a dependency cycle:");
    let requests: Vec<String> = cycle
        .pairs()
        .into_iter()
        .filter_map(|(source, target)| {
            edges
                .iter()
                .find(|e| e.source == source && e.target == target)
                .and_then(|e| e.request())
                .map(format_request)
        })
        .collect();
    for line in requests.iter().rev() {
        message.push_str(line);
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::test_support::*;
    use bindscope_plugin::InMemoryRepository;
    use bindscope_plugin::testing::*;

    fn cycle_repo(b_requests_a_as: &str) -> InMemoryRepository {
        InMemoryRepository::new()
            .with(component("App").entry_point("a", "A").build())
            .and_then(|r| r.with(class("A").inject_constructor(&[("b", "B")]).build()))
            .and_then(|r| r.with(class("B").inject_constructor(&[("a", b_requests_a_as)]).build()))
            .unwrap()
    }

    #[test]
    fn test_direct_cycle_is_reported_once() {
        let repo = cycle_repo("A");
        let diagnostics = validate_dependency_cycles(&graph(&repo, "App"), &defaults()).unwrap();
        assert_eq!(
            messages(&diagnostics),
            vec![
                "Found a dependency cycle:\
                 \n    A is injected at\
                 \n        B(a)\
                 \n    B is injected at\
                 \n        A(b)\
                 \n    A is provided at\
                 \n        App.a()"
            ]
        );
        assert_eq!(diagnostics[0].severity, Severity::Error);
    }

    #[test]
    fn test_provider_and_lazy_break_cycles() {
        for wrapped in ["javax.inject.Provider<A>", "dagger.Lazy<A>", "javax.inject.Provider<dagger.Lazy<A>>"] {
            let repo = cycle_repo(wrapped);
            let diagnostics = validate_dependency_cycles(&graph(&repo, "App"), &defaults()).unwrap();
            assert!(diagnostics.is_empty(), "{} should break the cycle", wrapped);
        }
    }

    #[test]
    fn test_self_cycle() {
        let repo = InMemoryRepository::new()
            .with(component("App").entry_point("a", "A").build())
            .and_then(|r| r.with(class("A").inject_constructor(&[("a", "A")]).build()))
            .unwrap();
        let diagnostics = validate_dependency_cycles(&graph(&repo, "App"), &defaults()).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.starts_with("Found a dependency cycle:\n    A is injected at\n        A(a)"));
    }

    #[test]
    fn test_cycle_through_binds_reported_at_entry() {
        let repo = InMemoryRepository::new()
            .with(component("App").install("AppModule").entry_point("service", "Service").build())
            .and_then(|r| r.with(module("AppModule").binds("service", "Service", "RealService").build()))
            .and_then(|r| r.with(interface("Service").build()))
            .and_then(|r| {
                r.with(
                    class("RealService")
                        .supertype("Service")
                        .inject_constructor(&[("service", "Service")])
                        .build(),
                )
            })
            .unwrap();
        let diagnostics = validate_dependency_cycles(&graph(&repo, "App"), &defaults()).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.ends_with("Service is provided at\n        App.service()"));
    }

    #[test]
    fn test_breaking_rules() {
        use bindscope_api::Key;
        let request = |ty: &str, kind| DependencyRequest::new(Key::new(TypeRef::parse(ty).unwrap()), kind);
        assert!(breaks_cycle(&request("A", RequestKind::Provider), false));
        assert!(breaks_cycle(&request("A", RequestKind::Producer), false));
        assert!(!breaks_cycle(&request("A", RequestKind::Instance), false));
        assert!(breaks_cycle(&request("java.util.Map<K, javax.inject.Provider<V>>", RequestKind::Instance), false));
        assert!(!breaks_cycle(&request("java.util.Map<K, V>", RequestKind::Instance), false));
        assert!(breaks_cycle(&request("dagger.MembersInjector<A>", RequestKind::Instance), false));
        assert!(breaks_cycle(&request("java.util.Optional<javax.inject.Provider<A>>", RequestKind::Instance), true));
        assert!(!breaks_cycle(&request("java.util.Optional<A>", RequestKind::Instance), true));
    }
}
