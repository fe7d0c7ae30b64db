//! Scope rules across component dependencies and the subcomponent tree.

use crate::config::{CompilerOptions, ValidationType};
use crate::descriptor::DependencyComponent;
use crate::diagnostics::{DiagnosticReporter, INDENT};
use crate::error::Result;
use crate::graph::{BindingGraph, ComponentEntry};
use bindscope_api::{ComponentPath, Diagnostic, Scope, Severity};
use smol_str::SmolStr;
use std::collections::HashMap;

pub const PLUGIN: &str = "bindscope/ComponentHierarchy";

pub fn validate_component_hierarchy(graph: &BindingGraph, options: &CompilerOptions) -> Result<Vec<Diagnostic>> {
    let mut reporter = DiagnosticReporter::new(graph, options, PLUGIN);
    let root = graph.root_component();
    if root.descriptor().is_real_component() && !root.descriptor().is_subcomponent() {
        let dependencies = DependencyIndex::new(graph.dependency_components());
        let root_name = &root.descriptor().name;
        if let Some(severity) = options.scope_cycle_validation.diagnostic_kind() {
            let mut stack = Vec::new();
            dependencies.check_cycles(&mut reporter, severity, graph.root(), root_name, &mut stack);
        }
        dependencies.check_dependency_scopes(&mut reporter, options, graph.root(), root_name);
    }

    if let Some(severity) = options.scope_cycle_validation.diagnostic_kind() {
        for component in graph.components() {
            check_conflicting_scopes(&mut reporter, graph, severity, component);
        }
    }
    for component in graph.components() {
        check_factory_method_modules(&mut reporter, graph, component);
    }
    Ok(reporter.into_diagnostics())
}

struct DependencyIndex<'g> {
    by_name: HashMap<&'g str, &'g DependencyComponent>,
}

impl<'g> DependencyIndex<'g> {
    fn new(components: &'g [DependencyComponent]) -> Self {
        Self {
            by_name: components.iter().map(|c| (c.name.as_str(), c)).collect(),
        }
    }

    fn scopes(&self, name: &str) -> &'g [Scope] {
        self.by_name.get(name).copied().map(|c| c.scopes.as_slice()).unwrap_or_default()
    }

    fn scoped_dependencies(&self, name: &str) -> Vec<&'g SmolStr> {
        let Some(component) = self.by_name.get(name).copied() else {
            return Vec::new();
        };
        component
            .dependencies
            .iter()
            .filter(|d| !self.scopes(d).is_empty())
            .collect()
    }

    /// Lines for a component list, the most recently pushed first.
    fn format_list<'n>(&self, names: impl IntoIterator<Item = &'n SmolStr>) -> String {
        let mut out = String::new();
        for name in names {
            out.push_str(INDENT);
            for scope in self.scopes(name) {
                out.push_str(&format!("{} ", scope));
            }
            out.push_str(name);
            out.push('\n');
        }
        out
    }

    fn check_cycles(
        &self,
        reporter: &mut DiagnosticReporter<'_>,
        severity: Severity,
        root: &ComponentPath,
        dependency: &'g SmolStr,
        stack: &mut Vec<&'g SmolStr>,
    ) {
        if stack.contains(&dependency) {
            stack.push(dependency);
            let message = format!(
                "{} contains a cycle in its component dependencies:\n{}",
                root.current(),
                self.format_list(stack.iter().rev().copied())
            );
            stack.pop();
            reporter.report_component(severity, root, message);
            return;
        }
        stack.push(dependency);
        if let Some(component) = self.by_name.get(dependency.as_str()).copied() {
            for next in &component.dependencies {
                self.check_cycles(reporter, severity, root, next, stack);
            }
        }
        stack.pop();
    }

    fn check_dependency_scopes(
        &self,
        reporter: &mut DiagnosticReporter<'_>,
        options: &CompilerOptions,
        root: &ComponentPath,
        name: &'g SmolStr,
    ) {
        let scopes = self.scopes(name);
        let scoped = self.scoped_dependencies(name);
        if scopes.is_empty() {
            if !scoped.is_empty() {
                reporter.report_component(
                    Severity::Error,
                    root,
                    format!(
                        "{} (unscoped) cannot depend on scoped components:\n{}",
                        name,
                        self.format_list(scoped)
                    ),
                );
            }
            return;
        }

        let scope_cycle = options.scope_cycle_validation.diagnostic_kind();
        if let Some(severity) = scope_cycle
            && scopes.iter().any(Scope::is_singleton)
        {
            if !scoped.is_empty() {
                reporter.report_component(
                    severity,
                    root,
                    format!(
                        "This @Singleton component cannot depend on scoped components:\n{}",
                        self.format_list(scoped)
                    ),
                );
            }
        } else if scoped.len() > 1 {
            let mut message = String::new();
            for scope in scopes {
                message.push_str(&format!("{} ", scope));
            }
            message.push_str(&format!(
                "{} depends on more than one scoped component:\n{}",
                name,
                self.format_list(scoped)
            ));
            reporter.report_component(Severity::Error, root, message);
        } else if options.scope_cycle_validation != ValidationType::None {
            let mut scope_stack = Vec::new();
            let mut dependency_stack = Vec::new();
            self.check_scope_ordering(reporter, options, root, name, &mut scope_stack, &mut dependency_stack);
        }
    }

    /// Walks the chain of single scoped dependencies looking for a scope that
    /// reappears further down.
    fn check_scope_ordering(
        &self,
        reporter: &mut DiagnosticReporter<'_>,
        options: &CompilerOptions,
        root: &ComponentPath,
        dependency: &'g SmolStr,
        scope_stack: &mut Vec<&'g [Scope]>,
        dependency_stack: &mut Vec<&'g SmolStr>,
    ) {
        let scopes = self.scopes(dependency);
        let overlaps = scope_stack
            .iter()
            .any(|seen| seen.iter().any(|s| scopes.contains(s)));
        if overlaps {
            dependency_stack.push(dependency);
            if let Some(severity) = options.scope_cycle_validation.diagnostic_kind() {
                reporter.report_component(
                    severity,
                    root,
                    format!(
                        "{} depends on scoped components in a non-hierarchical scope ordering:\n{}",
                        root.current(),
                        self.format_list(dependency_stack.iter().rev().copied())
                    ),
                );
            }
            dependency_stack.pop();
            return;
        }
        let Some(component) = self.by_name.get(dependency.as_str()) else {
            return;
        };
        // Production components are not checked transitively.
        if !component.is_component || component.production {
            return;
        }
        let scoped = self.scoped_dependencies(dependency);
        if let [only] = scoped.as_slice() {
            scope_stack.push(scopes);
            dependency_stack.push(dependency);
            self.check_scope_ordering(reporter, options, root, *only, scope_stack, dependency_stack);
            dependency_stack.pop();
            scope_stack.pop();
        }
    }
}

/// A subcomponent may not reuse a scope of any of its ancestors.
fn check_conflicting_scopes(
    reporter: &mut DiagnosticReporter<'_>,
    graph: &BindingGraph,
    severity: Severity,
    component: &ComponentEntry,
) {
    let descriptor = component.descriptor();
    let subject_scopes: Vec<&Scope> = descriptor
        .scopes
        .iter()
        .filter(|s| !(descriptor.production && s.is_production_scope()))
        .collect();
    if subject_scopes.is_empty() {
        return;
    }
    let mut ancestors = Vec::new();
    let mut current = component.parent().cloned();
    while let Some(path) = current {
        let Some(ancestor) = graph.component(&path) else {
            break;
        };
        ancestors.push(ancestor);
        current = ancestor.parent().cloned();
    }
    ancestors.reverse();

    let mut message = format!("{} has conflicting scopes:", descriptor.name);
    let mut conflicts = 0;
    for ancestor in ancestors {
        for scope in &ancestor.descriptor().scopes {
            if subject_scopes.contains(&scope) {
                message.push_str(&format!(
                    "\n  {} also has {}",
                    ancestor.descriptor().name,
                    scope
                ));
                conflicts += 1;
            }
        }
    }
    if conflicts > 0 {
        reporter.report_component(severity, component.path(), message);
    }
}

/// Modules passed to a subcomponent factory method must not already be
/// installed by an ancestor.
fn check_factory_method_modules(
    reporter: &mut DiagnosticReporter<'_>,
    graph: &BindingGraph,
    component: &ComponentEntry,
) {
    let Some(method) = component.factory_method() else {
        return;
    };
    let mut lineage = Vec::new();
    let mut current = component.parent().cloned();
    while let Some(path) = current {
        let Some(ancestor) = graph.component(&path) else {
            break;
        };
        lineage.push(ancestor);
        current = ancestor.parent().cloned();
    }
    lineage.reverse();

    for parameter in &method.parameters {
        let owner = lineage
            .iter()
            .find(|a| a.descriptor().module(parameter.name()).is_some());
        if let Some(owner) = owner {
            reporter.report_subcomponent_factory_method(
                Severity::Error,
                &method.method,
                component.path(),
                format!(
                    "{} is present in {}. A subcomponent cannot use an instance of a module that differs from its parent.",
                    parameter.simple_name(),
                    bindscope_api::frameworks::simple_name(&owner.descriptor().name)
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::test_support::*;
    use bindscope_plugin::InMemoryRepository;
    use bindscope_plugin::testing::*;

    fn scoped_component(name: &str, scope: &str, dependencies: &[&str]) -> bindscope_plugin::TypeDeclaration {
        let mut builder = component(name);
        if !scope.is_empty() {
            builder = builder.scoped(scope);
        }
        for dependency in dependencies {
            builder = builder.depends_on(dependency);
        }
        builder.build()
    }

    fn repo(declarations: Vec<bindscope_plugin::TypeDeclaration>) -> InMemoryRepository {
        let mut repo = InMemoryRepository::new().with(scope_annotation("ActivityScope")).unwrap();
        repo = repo.with(scope_annotation("FragmentScope")).unwrap();
        for declaration in declarations {
            repo = repo.with(declaration).unwrap();
        }
        repo
    }

    #[test]
    fn test_non_hierarchical_scope_ordering() {
        let repo = repo(vec![
            scoped_component("ActivityComponent", "ActivityScope", &["AppComponent"]),
            scoped_component("AppComponent", "Singleton", &["ActivityComponent"]),
        ]);
        let diagnostics =
            validate_component_hierarchy(&graph(&repo, "ActivityComponent"), &defaults()).unwrap();
        assert_eq!(
            messages(&diagnostics),
            vec![
                "ActivityComponent contains a cycle in its component dependencies:\n    @ActivityScope ActivityComponent\n    @Singleton AppComponent\n    @ActivityScope ActivityComponent\n",
                "ActivityComponent depends on scoped components in a non-hierarchical scope ordering:\n    @ActivityScope ActivityComponent\n    @Singleton AppComponent\n    @ActivityScope ActivityComponent\n",
            ]
        );
    }

    #[test]
    fn test_hierarchical_dependencies_are_clean() {
        let repo = repo(vec![
            scoped_component("ActivityComponent", "ActivityScope", &["AppComponent"]),
            scoped_component("AppComponent", "Singleton", &[]),
        ]);
        let diagnostics =
            validate_component_hierarchy(&graph(&repo, "ActivityComponent"), &defaults()).unwrap();
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_scope_cycle_validation_none_disables_ordering_checks() {
        let repo = repo(vec![
            scoped_component("ActivityComponent", "ActivityScope", &["AppComponent"]),
            scoped_component("AppComponent", "Singleton", &["ActivityComponent"]),
        ]);
        let options = CompilerOptions {
            scope_cycle_validation: ValidationType::None,
            ..CompilerOptions::default()
        };
        let diagnostics =
            validate_component_hierarchy(&graph(&repo, "ActivityComponent"), &options).unwrap();
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_singleton_cannot_depend_on_scoped() {
        let repo = repo(vec![
            scoped_component("AppComponent", "Singleton", &["ActivityComponent"]),
            scoped_component("ActivityComponent", "ActivityScope", &[]),
        ]);
        let diagnostics = validate_component_hierarchy(&graph(&repo, "AppComponent"), &defaults()).unwrap();
        assert_eq!(
            messages(&diagnostics),
            vec!["This @Singleton component cannot depend on scoped components:\n    @ActivityScope ActivityComponent\n"]
        );
    }

    #[test]
    fn test_unscoped_and_multiple_scoped_dependencies() {
        let repo = repo(vec![
            scoped_component("Plain", "", &["ActivityComponent"]),
            scoped_component("Fragment", "FragmentScope", &["ActivityComponent", "AppComponent"]),
            scoped_component("ActivityComponent", "ActivityScope", &[]),
            scoped_component("AppComponent", "Singleton", &[]),
        ]);
        let plain = validate_component_hierarchy(&graph(&repo, "Plain"), &defaults()).unwrap();
        assert_eq!(
            messages(&plain),
            vec!["Plain (unscoped) cannot depend on scoped components:\n    @ActivityScope ActivityComponent\n"]
        );
        let fragment = validate_component_hierarchy(&graph(&repo, "Fragment"), &defaults()).unwrap();
        assert_eq!(fragment.len(), 1);
        assert!(fragment[0].message.starts_with("@FragmentScope Fragment depends on more than one scoped component:\n"));
        assert_eq!(fragment[0].severity, Severity::Error);
    }

    #[test]
    fn test_subcomponent_reusing_ancestor_scope() {
        let repo = repo(vec![
            component("App")
                .scoped("Singleton")
                .method(method("child", "Child").abstract_method())
                .build(),
            subcomponent("Child").scoped("Singleton").build(),
        ]);
        let diagnostics = validate_component_hierarchy(&graph(&repo, "App"), &defaults()).unwrap();
        assert_eq!(
            messages(&diagnostics),
            vec!["Child has conflicting scopes:\n  App also has @Singleton [App → Child]"]
        );
    }

    #[test]
    fn test_factory_method_module_already_installed() {
        let repo = repo(vec![
            component("App")
                .install("NetModule")
                .method(method("child", "Child").param("net", "NetModule").abstract_method())
                .build(),
            module("NetModule").build(),
            subcomponent("Child").install("NetModule").build(),
        ]);
        let diagnostics = validate_component_hierarchy(&graph(&repo, "App"), &defaults()).unwrap();
        assert_eq!(
            messages(&diagnostics),
            vec!["NetModule is present in App. A subcomponent cannot use an instance of a module that differs from its parent."]
        );
        assert_eq!(
            diagnostics[0].primary_element.as_ref().map(|e| e.to_string()),
            Some("App.child(NetModule)".to_string())
        );
    }
}
