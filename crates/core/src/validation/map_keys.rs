//! Map multibindings whose contributions disagree on their keys.

use crate::config::CompilerOptions;
use crate::diagnostics::{DiagnosticReporter, INDENT, format_indented_list};
use crate::error::Result;
use crate::graph::{BindingGraph, Node};
use bindscope_api::{BindingKind, Diagnostic, MapKey, Severity, frameworks};
use indexmap::IndexMap;
use petgraph::stable_graph::NodeIndex;
use smol_str::SmolStr;
use std::collections::HashSet;

pub const PLUGIN: &str = "bindscope/MapKeys";

pub fn validate_map_keys(graph: &BindingGraph, options: &CompilerOptions) -> Result<Vec<Diagnostic>> {
    let mut reporter = DiagnosticReporter::new(graph, options, PLUGIN);
    // A child's map repeats every contribution inherited from its parent.
    let mut reported: HashSet<Vec<NodeIndex>> = HashSet::new();

    let maps: Vec<NodeIndex> = graph
        .binding_nodes()
        .filter(|(_, node)| matches!(node.binding.kind, BindingKind::MultiboundMap))
        .map(|(idx, _)| idx)
        .collect();
    for map in maps {
        let Node::Binding(map_node) = graph.node(map)? else {
            continue;
        };
        let mut contributions: Vec<(NodeIndex, &MapKey)> = Vec::new();
        for successor in graph.successors(map) {
            if let Node::Binding(node) = graph.node(successor)?
                && let Some(map_key) = node.binding.map_key()
            {
                contributions.push((successor, map_key));
            }
        }

        let mut by_key: IndexMap<&MapKey, Vec<NodeIndex>> = IndexMap::new();
        for &(node, map_key) in &contributions {
            by_key.entry(map_key).or_default().push(node);
        }
        for nodes in by_key.values() {
            if nodes.len() < 2 || !reported.insert(sorted(nodes)) {
                continue;
            }
            let message = format!(
                "The same map key is bound more than once for {}{}",
                map_node.binding.key,
                format_indented_list(&reporter.format_declarations(nodes)?, 1)
            );
            reporter.report_binding(Severity::Error, map, message)?;
        }

        let mut by_annotation: IndexMap<&SmolStr, Vec<NodeIndex>> = IndexMap::new();
        for &(node, map_key) in &contributions {
            by_annotation.entry(&map_key.annotation).or_default().push(node);
        }
        let all: Vec<NodeIndex> = contributions.iter().map(|(n, _)| *n).collect();
        if by_annotation.len() < 2 || !reported.insert(sorted(&all)) {
            continue;
        }
        let mut message = format!("{} uses more than one @MapKey annotation type", map_node.binding.key);
        for (annotation, nodes) in &by_annotation {
            message.push_str(&format!("\n{INDENT}@{}:", frameworks::simple_name(annotation)));
            message.push_str(&format_indented_list(&reporter.format_declarations(nodes)?, 2));
        }
        reporter.report_binding(Severity::Error, map, message)?;
    }
    Ok(reporter.into_diagnostics())
}

fn sorted(nodes: &[NodeIndex]) -> Vec<NodeIndex> {
    let mut nodes = nodes.to_vec();
    nodes.sort();
    nodes
}
