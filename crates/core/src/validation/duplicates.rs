//! Requests satisfied by more than one binding.

use crate::config::CompilerOptions;
use crate::diagnostics::{DiagnosticReporter, INDENT, format_indented_list};
use crate::error::Result;
use crate::graph::{BindingGraph, EdgeView, Node};
use bindscope_api::{BindingKind, ComponentPath, DependencyRequest, Diagnostic, Key, Severity};
use indexmap::IndexMap;
use petgraph::stable_graph::NodeIndex;

pub const PLUGIN: &str = "bindscope/DuplicateBindings";

pub fn validate_duplicate_bindings(graph: &BindingGraph, options: &CompilerOptions) -> Result<Vec<Diagnostic>> {
    let mut reporter = DiagnosticReporter::new(graph, options, PLUGIN);
    if graph.is_full_binding_graph() {
        report_by_owner(&mut reporter, graph)?;
        return Ok(reporter.into_diagnostics());
    }

    let mut by_request: IndexMap<(NodeIndex, &DependencyRequest), Vec<EdgeView<'_>>> = IndexMap::new();
    for edge in graph.dependency_edges() {
        if let Some(request) = edge.edge.as_dependency() {
            by_request.entry((edge.source, request)).or_default().push(edge);
        }
    }
    for ((_, request), edges) in &by_request {
        let targets: Vec<NodeIndex> = edges
            .iter()
            .map(|e| e.target)
            .filter(|&t| matches!(graph.node(t), Ok(Node::Binding(_))))
            .collect();
        if targets.len() < 2 {
            continue;
        }
        let message = duplicate_message(&reporter, &request.key, &targets)?;
        reporter.report_dependency(Severity::Error, &edges[0], message)?;
    }
    Ok(reporter.into_diagnostics())
}

/// Full binding graphs have no entry points to follow, so bindings are
/// grouped by the component that owns them instead.
fn report_by_owner(reporter: &mut DiagnosticReporter<'_>, graph: &BindingGraph) -> Result<()> {
    let mut by_owner: IndexMap<(&ComponentPath, &Key), Vec<NodeIndex>> = IndexMap::new();
    for (idx, node) in graph.binding_nodes() {
        let key = &node.binding.key;
        if key.is_contribution() {
            continue;
        }
        by_owner.entry((&node.path, key)).or_default().push(idx);
    }
    for ((path, key), nodes) in &by_owner {
        if nodes.len() < 2 {
            continue;
        }
        let message = duplicate_message(reporter, key, nodes)?;
        reporter.report_component(Severity::Error, path, message);
    }
    Ok(())
}

fn duplicate_message(reporter: &DiagnosticReporter<'_>, key: &Key, nodes: &[NodeIndex]) -> Result<String> {
    let graph = reporter.graph();
    let mut multibindings = Vec::new();
    let mut aggregate = None;
    for &node in nodes {
        if let Node::Binding(binding) = graph.node(node)?
            && binding.binding.is_multibinding()
        {
            multibindings.push(node);
            aggregate.get_or_insert(match binding.binding.kind {
                BindingKind::MultiboundMap => "Map",
                _ => "Set",
            });
        }
    }

    let Some(aggregate) = aggregate else {
        let declarations = reporter.format_declarations(nodes)?;
        return Ok(format!(
            "{} is bound multiple times:{}",
            key,
            format_indented_list(&declarations, 1)
        ));
    };

    let multibound = reporter.format_declarations(&multibindings)?;
    let unique: Vec<String> = reporter
        .format_declarations(nodes)?
        .into_iter()
        .filter(|d| !multibound.contains(d))
        .collect();
    Ok(format!(
        "{} has incompatible bindings or declarations:\n{INDENT}{} bindings and declarations:{}\n{INDENT}Unique bindings and declarations:{}",
        key,
        aggregate,
        format_indented_list(&multibound, 2),
        format_indented_list(&unique, 2),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::BindingGraphFactory;
    use crate::validation::test_support::*;
    use bindscope_plugin::InMemoryRepository;
    use bindscope_plugin::testing::*;

    #[test]
    fn test_same_key_in_two_modules() {
        let repo = InMemoryRepository::new()
            .with(
                component("App")
                    .install("NetModule")
                    .install("NetModule2")
                    .entry_point("cache", "Cache")
                    .build(),
            )
            .and_then(|r| r.with(module("NetModule").provides("client", "HttpClient", &[]).build()))
            .and_then(|r| r.with(module("NetModule2").provides("otherClient", "HttpClient", &[]).build()))
            .and_then(|r| r.with(class("Cache").inject_constructor(&[("client", "HttpClient")]).build()))
            .unwrap();
        let diagnostics = validate_duplicate_bindings(&graph(&repo, "App"), &defaults()).unwrap();
        assert_eq!(
            messages(&diagnostics),
            vec![
                "HttpClient is bound multiple times:\
                 \n    @Provides HttpClient NetModule.client()\
                 \n    @Provides HttpClient NetModule2.otherClient()\
                 \n    HttpClient is injected at\
                 \n        Cache(client)\
                 \n    Cache is provided at\
                 \n        App.cache()"
            ]
        );
    }

    #[test]
    fn test_set_contributions_are_not_duplicates() {
        let repo = InMemoryRepository::new()
            .with(
                component("App")
                    .install("AModule")
                    .install("BModule")
                    .entry_point("plugins", "java.util.Set<Plugin>")
                    .build(),
            )
            .and_then(|r| r.with(module("AModule").method(provides("a", "Plugin").annotated("IntoSet")).build()))
            .and_then(|r| r.with(module("BModule").method(provides("b", "Plugin").annotated("IntoSet")).build()))
            .unwrap();
        assert!(validate_duplicate_bindings(&graph(&repo, "App"), &defaults()).unwrap().is_empty());
    }

    #[test]
    fn test_unique_binding_of_a_multibound_set() {
        let repo = InMemoryRepository::new()
            .with(
                component("App")
                    .install("AModule")
                    .entry_point("plugins", "java.util.Set<Plugin>")
                    .build(),
            )
            .and_then(|r| {
                r.with(
                    module("AModule")
                        .method(provides("a", "Plugin").annotated("IntoSet"))
                        .provides("all", "java.util.Set<Plugin>", &[])
                        .build(),
                )
            })
            .unwrap();
        let diagnostics = validate_duplicate_bindings(&graph(&repo, "App"), &defaults()).unwrap();
        assert_eq!(diagnostics.len(), 1);
        let message = &diagnostics[0].message;
        assert!(message.starts_with(
            "java.util.Set<Plugin> has incompatible bindings or declarations:\
             \n    Set bindings and declarations:\
             \n        @Provides @IntoSet Plugin AModule.a()\
             \n    Unique bindings and declarations:\
             \n        @Provides java.util.Set<Plugin> AModule.all()"
        ));
    }

    #[test]
    fn test_full_binding_graph_groups_by_owner() {
        let repo = InMemoryRepository::new()
            .with(
                module("NetModule")
                    .provides("client", "HttpClient", &[])
                    .provides("other", "HttpClient", &[])
                    .build(),
            )
            .unwrap();
        let graph = BindingGraphFactory::new(&repo).create("NetModule", true).unwrap();
        let options = CompilerOptions {
            full_binding_graph_validation: crate::config::ValidationType::Error,
            ..CompilerOptions::default()
        };
        let diagnostics = validate_duplicate_bindings(&graph, &options).unwrap();
        assert_eq!(
            messages(&diagnostics),
            vec!["HttpClient is bound multiple times:\n    @Provides HttpClient NetModule.client()\n    @Provides HttpClient NetModule.other()"]
        );
    }
}
