//! Checks on installed modules and declarations that could not be read.

use crate::config::CompilerOptions;
use crate::diagnostics::DiagnosticReporter;
use crate::error::Result;
use crate::graph::BindingGraph;
use bindscope_api::{Diagnostic, Severity};
use std::collections::HashSet;

pub const PLUGIN: &str = "bindscope/Modules";
pub const MALFORMED_PLUGIN: &str = "bindscope/MalformedDeclaration";

/// Abstract modules with instance binding methods, and every malformed
/// declaration seen while building the graph.
pub fn validate_modules(graph: &BindingGraph, options: &CompilerOptions) -> Result<Vec<Diagnostic>> {
    let mut reporter = DiagnosticReporter::new(graph, options, PLUGIN);
    let mut seen = HashSet::new();
    for component in graph.components() {
        if !component.descriptor().is_real_component() {
            continue;
        }
        for module in &component.descriptor().modules {
            if !module.is_abstract
                || module.instance_binding_methods.is_empty()
                || !seen.insert(module.name.clone())
            {
                continue;
            }
            let methods = if module.producer {
                "@Provides or @Produces"
            } else {
                "@Provides"
            };
            reporter.report_component(
                Severity::Error,
                component.path(),
                format!(
                    "{} is abstract and has instance {} methods. Consider making the methods static or including a non-abstract subclass of the module instead.",
                    module.name, methods
                ),
            );
        }
    }
    let mut diagnostics = reporter.into_diagnostics();

    let mut reporter = DiagnosticReporter::new(graph, options, MALFORMED_PLUGIN);
    for malformed in graph.malformed() {
        reporter.report_at(Severity::Error, &malformed.element, graph.root(), malformed.message.clone());
    }
    diagnostics.extend(reporter.into_diagnostics());
    Ok(diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::test_support::*;
    use bindscope_plugin::InMemoryRepository;
    use bindscope_plugin::testing::*;

    #[test]
    fn test_abstract_module_with_instance_provides() {
        let repo = InMemoryRepository::new()
            .with(component("App").install("NetModule").entry_point("client", "HttpClient").build())
            .and_then(|r| {
                r.with(
                    module("NetModule")
                        .abstract_type()
                        .provides("client", "HttpClient", &[])
                        .build(),
                )
            })
            .unwrap();
        let diagnostics = validate_modules(&graph(&repo, "App"), &defaults()).unwrap();
        assert_eq!(
            messages(&diagnostics),
            vec!["NetModule is abstract and has instance @Provides methods. Consider making the methods static or including a non-abstract subclass of the module instead."]
        );
        assert_eq!(diagnostics[0].plugin, PLUGIN);
    }

    #[test]
    fn test_static_provides_in_abstract_module_is_fine() {
        let repo = InMemoryRepository::new()
            .with(component("App").install("NetModule").entry_point("client", "HttpClient").build())
            .and_then(|r| {
                r.with(
                    module("NetModule")
                        .abstract_type()
                        .method(provides("client", "HttpClient").static_method())
                        .build(),
                )
            })
            .unwrap();
        assert!(validate_modules(&graph(&repo, "App"), &defaults()).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_declarations_are_errors() {
        let repo = InMemoryRepository::new()
            .with(component("App").install("BadModule").build())
            .and_then(|r| {
                r.with(
                    module("BadModule")
                        .method(provides("both", "Foo").annotated("Binds"))
                        .build(),
                )
            })
            .unwrap();
        let diagnostics = validate_modules(&graph(&repo, "App"), &defaults()).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].plugin, MALFORMED_PLUGIN);
        assert!(diagnostics[0].message.contains("more than one of"));
        assert_eq!(
            diagnostics[0].primary_element.as_ref().map(|e| e.to_string()),
            Some("BadModule.both()".to_string())
        );
    }
}
