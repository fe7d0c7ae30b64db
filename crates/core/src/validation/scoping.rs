//! Scoped bindings owned by a component that does not carry their scope.

use crate::config::CompilerOptions;
use crate::diagnostics::{DiagnosticReporter, INDENT, format_binding};
use crate::error::Result;
use crate::graph::BindingGraph;
use bindscope_api::{Binding, BindingKind, ComponentPath, Diagnostic, Scope, Severity};
use indexmap::IndexMap;

pub const PLUGIN: &str = "bindscope/IncompatiblyScopedBindings";

pub fn validate_binding_scopes(graph: &BindingGraph, options: &CompilerOptions) -> Result<Vec<Diagnostic>> {
    let mut reporter = DiagnosticReporter::new(graph, options, PLUGIN);
    let mut incompatible: IndexMap<&ComponentPath, Vec<&Binding>> = IndexMap::new();
    for (_, node) in graph.binding_nodes() {
        let Some(scope) = &node.binding.scope else {
            continue;
        };
        if scope.is_reusable() {
            continue;
        }
        let Some(owner) = graph.component(&node.path) else {
            continue;
        };
        let descriptor = owner.descriptor();
        if !descriptor.is_real_component() || has_scope(&descriptor.scopes, descriptor.production, scope) {
            continue;
        }
        let bindings = incompatible.entry(&node.path).or_default();
        if !bindings.contains(&node.binding.as_ref()) {
            bindings.push(&node.binding);
        }
    }

    for (path, bindings) in incompatible {
        let Some(component) = graph.component(path) else {
            continue;
        };
        let descriptor = component.descriptor();
        let mut message = descriptor.name.to_string();
        if descriptor.scopes.is_empty() {
            message.push_str(" (unscoped) may not reference scoped bindings:\n");
        } else {
            let scopes: Vec<String> = descriptor.scopes.iter().map(|s| s.to_string()).collect();
            message.push_str(&format!(
                " scoped with {} may not reference bindings with different scopes:\n",
                scopes.join(" ")
            ));
        }
        for binding in bindings {
            message.push_str(INDENT);
            message.push_str(&describe(binding));
            message.push('\n');
        }
        reporter.report_component(Severity::Error, path, message);
    }
    Ok(reporter.into_diagnostics())
}

fn has_scope(scopes: &[Scope], production: bool, scope: &Scope) -> bool {
    scopes.contains(scope) || (production && scope.is_production_scope())
}

fn describe(binding: &Binding) -> String {
    match (&binding.kind, &binding.scope) {
        (BindingKind::Injection { .. }, Some(scope)) => format!("{} class {}", scope, binding.key.ty),
        _ => format_binding(binding),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::test_support::*;
    use bindscope_plugin::InMemoryRepository;
    use bindscope_plugin::testing::*;

    #[test]
    fn test_unscoped_component_with_scoped_class() {
        let repo = InMemoryRepository::new()
            .with(component("App").entry_point("cache", "Cache").build())
            .and_then(|r| r.with(class("Cache").scoped("Singleton").inject_constructor(&[]).build()))
            .unwrap();
        let diagnostics = validate_binding_scopes(&graph(&repo, "App"), &defaults()).unwrap();
        assert_eq!(
            messages(&diagnostics),
            vec!["App (unscoped) may not reference scoped bindings:\n    @Singleton class Cache\n"]
        );
    }

    #[test]
    fn test_scoped_component_with_other_scope() {
        let repo = InMemoryRepository::new()
            .with(
                component("App")
                    .scoped("Singleton")
                    .install("SessionModule")
                    .entry_point("session", "Session")
                    .build(),
            )
            .and_then(|r| r.with(scope_annotation("SessionScope")))
            .and_then(|r| {
                r.with(
                    module("SessionModule")
                        .method(provides("session", "Session").annotated("SessionScope"))
                        .build(),
                )
            })
            .and_then(|r| r.with(interface("Session").build()))
            .unwrap();
        let diagnostics = validate_binding_scopes(&graph(&repo, "App"), &defaults()).unwrap();
        assert_eq!(
            messages(&diagnostics),
            vec![
                "App scoped with @Singleton may not reference bindings with different scopes:\
                 \n    @Provides @SessionScope Session SessionModule.session()\n"
            ]
        );
    }

    #[test]
    fn test_matching_and_reusable_scopes_are_fine() {
        let repo = InMemoryRepository::new()
            .with(
                component("App")
                    .scoped("Singleton")
                    .entry_point("cache", "Cache")
                    .entry_point("clock", "Clock")
                    .build(),
            )
            .and_then(|r| r.with(class("Cache").scoped("Singleton").inject_constructor(&[]).build()))
            .and_then(|r| r.with(class("Clock").scoped("Reusable").inject_constructor(&[]).build()))
            .unwrap();
        assert!(validate_binding_scopes(&graph(&repo, "App"), &defaults()).unwrap().is_empty());
    }
}
