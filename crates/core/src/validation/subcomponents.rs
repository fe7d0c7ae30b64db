//! Subcomponent factory methods that leave out modules the child cannot create.

use crate::config::CompilerOptions;
use crate::diagnostics::DiagnosticReporter;
use crate::error::Result;
use crate::graph::BindingGraph;
use bindscope_api::{Diagnostic, Severity};
use indexmap::IndexSet;
use smol_str::SmolStr;

pub const PLUGIN: &str = "bindscope/SubcomponentFactoryMethodMissingModule";

pub fn validate_subcomponent_factory_methods(
    graph: &BindingGraph,
    options: &CompilerOptions,
) -> Result<Vec<Diagnostic>> {
    let mut reporter = DiagnosticReporter::new(graph, options, PLUGIN);
    let root = graph.root_component().descriptor();
    if !root.is_real_component() || root.is_subcomponent() {
        return Ok(Vec::new());
    }

    for child in graph.components() {
        let Some(factory_method) = child.factory_method() else {
            continue;
        };
        let owned = &child.resolved.owned_modules;
        let mut missing: IndexSet<SmolStr> = IndexSet::new();
        for (_, node) in graph.binding_nodes() {
            if &node.path != child.path() || !node.binding.requires_module_instance() {
                continue;
            }
            let Some(module_name) = node.binding.contributing_module() else {
                continue;
            };
            let Some(module) = owned.iter().find(|m| &m.name == module_name) else {
                continue;
            };
            if factory_method.parameters.iter().any(|p| p.name() == module_name.as_str()) {
                continue;
            }
            if module.is_abstract || !module.has_visible_default_constructor {
                missing.insert(module_name.clone());
            }
        }
        if missing.is_empty() {
            continue;
        }
        let modules: Vec<&str> = missing.iter().map(|m| m.as_str()).collect();
        let message = format!(
            "{} requires modules which have no visible default constructors. \
             Add the following modules as parameters to this method: {}",
            child.descriptor().name,
            modules.join(", ")
        );
        reporter.report_subcomponent_factory_method(Severity::Error, &factory_method.method, child.path(), message);
    }
    Ok(reporter.into_diagnostics())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::test_support::*;
    use bindscope_api::ComponentPath;
    use bindscope_plugin::InMemoryRepository;
    use bindscope_plugin::testing::*;

    fn repo(factory_method: MethodBuilder, db_module_constructor: &[(&str, &str)]) -> InMemoryRepository {
        InMemoryRepository::new()
            .with(component("App").method(factory_method.abstract_method()).build())
            .and_then(|r| r.with(subcomponent("Child").install("DbModule").entry_point("db", "Db").build()))
            .and_then(|r| {
                r.with(
                    module("DbModule")
                        .constructor(db_module_constructor)
                        .provides("db", "Db", &[])
                        .build(),
                )
            })
            .and_then(|r| r.with(interface("Db").build()))
            .unwrap()
    }

    #[test]
    fn test_module_without_default_constructor_must_be_passed() {
        let repo = repo(method("child", "Child"), &[("url", "String")]);
        let diagnostics = validate_subcomponent_factory_methods(&graph(&repo, "App"), &defaults()).unwrap();
        assert_eq!(
            messages(&diagnostics),
            vec![
                "Child requires modules which have no visible default constructors. \
                 Add the following modules as parameters to this method: DbModule"
            ]
        );
        let diagnostic = &diagnostics[0];
        assert_eq!(diagnostic.component_path, ComponentPath::root("App"));
        assert_eq!(
            diagnostic.primary_element.as_ref().map(|e| e.to_string()).as_deref(),
            Some("App.child()")
        );
    }

    #[test]
    fn test_module_passed_as_parameter() {
        let repo = repo(method("child", "Child").param("db", "DbModule"), &[("url", "String")]);
        assert!(validate_subcomponent_factory_methods(&graph(&repo, "App"), &defaults()).unwrap().is_empty());
    }

    #[test]
    fn test_module_with_default_constructor() {
        let repo = repo(method("child", "Child"), &[]);
        assert!(validate_subcomponent_factory_methods(&graph(&repo, "App"), &defaults()).unwrap().is_empty());
    }
}
