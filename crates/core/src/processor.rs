//! Round-based processing of root components and modules.
//!
//! Declarations may still be generated by a later round. A root whose graph
//! touches such a type is deferred and retried on the next round;
//! [`RoundProcessor::finish`] turns anything still deferred into errors.

use crate::config::CompilerOptions;
use crate::error::{BindscopeError, Result};
use crate::graph::BindingGraph;
use crate::resolver::BindingGraphFactory;
use crate::validation::{Validator, default_validators, validate};
use bindscope_api::{ComponentPath, Diagnostic, ElementRef, Severity};
use bindscope_plugin::{DeclarationRepository, Lookup, TypeKind};
use indexmap::IndexMap;
use smol_str::SmolStr;

pub const PLUGIN: &str = "bindscope/Processor";

/// The diagnostics found for one binding graph.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// Kept even when the graph is invalid.
    pub graph: BindingGraph,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn root(&self) -> &SmolStr {
        self.graph.root().current()
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Every component, subcomponent and module in `repo`, in declaration order.
pub fn roots(repo: &dyn DeclarationRepository) -> Vec<SmolStr> {
    repo.type_names()
        .into_iter()
        .filter(|name| {
            matches!(
                repo.type_declaration(name),
                Lookup::Found(decl) if matches!(
                    decl.kind,
                    TypeKind::Component(_) | TypeKind::Subcomponent(_) | TypeKind::Module(_)
                )
            )
        })
        .map(SmolStr::from)
        .collect()
}

pub struct RoundProcessor {
    options: CompilerOptions,
    validators: Vec<Validator>,
    /// Root -> the type it is waiting for.
    deferred: IndexMap<SmolStr, String>,
    round: usize,
}

impl RoundProcessor {
    pub fn new(options: CompilerOptions) -> Self {
        Self {
            options,
            validators: default_validators(),
            deferred: IndexMap::new(),
            round: 0,
        }
    }

    pub fn with_validators(mut self, validators: Vec<Validator>) -> Self {
        self.validators = validators;
        self
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn deferred(&self) -> impl Iterator<Item = (&SmolStr, &str)> {
        self.deferred.iter().map(|(root, ty)| (root, ty.as_str()))
    }

    /// Validates `roots` plus every root deferred by an earlier round.
    ///
    /// Memoized descriptors and resolutions live only for this call.
    pub fn process_round(
        &mut self,
        repo: &dyn DeclarationRepository,
        roots: &[SmolStr],
    ) -> Result<Vec<ValidationReport>> {
        self.round += 1;
        let mut pending: Vec<SmolStr> = self.deferred.drain(..).map(|(root, _)| root).collect();
        for root in roots {
            if !pending.contains(root) {
                pending.push(root.clone());
            }
        }

        let mut factory = BindingGraphFactory::new(repo);
        let mut reports = Vec::new();
        for root in pending {
            let modes = match self.modes(repo, &root) {
                Ok(modes) => modes,
                Err(BindscopeError::NotYetAvailable(ty)) => {
                    self.defer(root, ty);
                    continue;
                }
                Err(e) => return Err(e),
            };
            match self.process_root(&mut factory, &root, &modes) {
                Ok(found) => reports.extend(found),
                Err(BindscopeError::NotYetAvailable(ty)) => self.defer(root, ty),
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            "round {}: {} graphs validated, {} diagnostics, {} roots deferred",
            self.round,
            reports.len(),
            reports.iter().map(|r| r.diagnostics.len()).sum::<usize>(),
            self.deferred.len()
        );
        Ok(reports)
    }

    /// Errors for every root that never became processable.
    pub fn finish(self) -> Vec<Diagnostic> {
        self.deferred
            .into_iter()
            .map(|(root, ty)| Diagnostic {
                severity: Severity::Error,
                plugin: PLUGIN.into(),
                message: format!("{} could not be processed because {} was never generated", root, ty),
                primary_element: Some(ElementRef::of_type(root.clone())),
                component_path: ComponentPath::root(root),
            })
            .collect()
    }

    /// Which graphs to build for `root`: `false` for the reachable graph,
    /// `true` for the full binding graph.
    fn modes(&self, repo: &dyn DeclarationRepository, root: &str) -> Result<Vec<bool>> {
        let full = self.options.full_binding_graph_enabled();
        let decl = match repo.type_declaration(root) {
            Lookup::Found(decl) => decl,
            Lookup::NotYetGenerated => return Err(BindscopeError::NotYetAvailable(root.to_string())),
            Lookup::Missing => return Err(BindscopeError::UnknownType(root.to_string())),
        };
        Ok(match &decl.kind {
            TypeKind::Component(_) if full => vec![false, true],
            TypeKind::Component(_) => vec![false],
            TypeKind::Subcomponent(_) | TypeKind::Module(_) if full => vec![true],
            TypeKind::Subcomponent(_) | TypeKind::Module(_) => Vec::new(),
            _ => {
                tracing::warn!("{} is neither a component nor a module; skipping", root);
                Vec::new()
            }
        })
    }

    fn process_root(
        &self,
        factory: &mut BindingGraphFactory<'_>,
        root: &str,
        modes: &[bool],
    ) -> Result<Vec<ValidationReport>> {
        let mut reports = Vec::with_capacity(modes.len());
        for &full_binding_graph in modes {
            let graph = factory.create(root, full_binding_graph)?;
            let diagnostics = validate(&graph, &self.options, &self.validators)?;
            reports.push(ValidationReport { graph, diagnostics });
        }
        Ok(reports)
    }

    fn defer(&mut self, root: SmolStr, ty: String) {
        tracing::info!("deferring {} until {} is generated", root, ty);
        self.deferred.insert(root, ty);
    }
}
