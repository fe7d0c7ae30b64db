//! Binding resolution across a component hierarchy.
//!
//! Resolution starts at a component's entry points and walks every
//! dependency, choosing bindings for each key and deciding which component in
//! the hierarchy owns each binding. The result is a [`ResolvedHierarchy`],
//! which [`crate::graph`] turns into the queryable [`crate::BindingGraph`].

mod factory;

pub use factory::BindingGraphFactory;

use crate::binding::{Declaration, MalformedDeclaration, ModuleDescriptor, SubcomponentDeclaration};
use crate::descriptor::{ChildFactoryMethod, ComponentDescriptor, DependencyComponent};
use bindscope_api::{Binding, ComponentPath, Key};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;

/// A binding together with the component that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OwnedBinding {
    pub owner: ComponentPath,
    pub binding: Arc<Binding>,
}

/// Everything visible for one key from one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBindings {
    pub key: Key,
    /// The component that looked the key up.
    pub path: ComponentPath,
    pub bindings: Vec<OwnedBinding>,
    pub multibinding_declarations: Vec<Declaration>,
    pub optional_declarations: Vec<Declaration>,
    pub subcomponent_declarations: Vec<SubcomponentDeclaration>,
}

impl ResolvedBindings {
    pub(crate) fn empty(key: Key, path: ComponentPath) -> Self {
        Self {
            key,
            path,
            bindings: Vec::new(),
            multibinding_declarations: Vec::new(),
            optional_declarations: Vec::new(),
            subcomponent_declarations: Vec::new(),
        }
    }

    /// No binding was found: the key is missing here.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn bindings_owned_by<'s>(
        &'s self,
        path: &'s ComponentPath,
    ) -> impl Iterator<Item = &'s Arc<Binding>> + 's {
        self.bindings
            .iter()
            .filter(move |b| &b.owner == path)
            .map(|b| &b.binding)
    }

    pub fn owner_of(&self, binding: &Binding) -> Option<&ComponentPath> {
        self.bindings
            .iter()
            .find(|b| *b.binding == *binding)
            .map(|b| &b.owner)
    }

    pub fn contains(&self, binding: &Binding) -> bool {
        self.owner_of(binding).is_some()
    }
}

/// One component of a resolved hierarchy.
#[derive(Debug, Clone)]
pub struct ResolvedComponent {
    pub path: ComponentPath,
    pub parent: Option<ComponentPath>,
    pub descriptor: Arc<ComponentDescriptor>,
    /// Keys resolved in this component, including entries inherited unchanged
    /// from an ancestor.
    pub resolved: IndexMap<Key, Arc<ResolvedBindings>>,
    pub members_injection: IndexMap<Key, Arc<ResolvedBindings>>,
    /// Modules installed here and not by any ancestor.
    pub owned_modules: Vec<Arc<ModuleDescriptor>>,
    /// The parent's method that creates this component, if it has one.
    pub factory_method: Option<ChildFactoryMethod>,
}

/// What the repository says about a key nothing binds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MissingBindingHints {
    /// An `@Inject` constructor on the class would have satisfied the key.
    pub implicitly_injectable: bool,
    /// The type has `@Inject` fields or methods.
    pub has_injection_sites: bool,
}

/// Output of one resolution pass, root first, then children depth first.
#[derive(Debug, Clone)]
pub struct ResolvedHierarchy {
    pub components: Vec<ResolvedComponent>,
    pub dependency_components: Vec<DependencyComponent>,
    pub malformed: Vec<MalformedDeclaration>,
    pub missing_hints: HashMap<Key, MissingBindingHints>,
    pub full_binding_graph: bool,
}

impl ResolvedHierarchy {
    pub fn root(&self) -> Option<&ResolvedComponent> {
        self.components.first()
    }

    pub fn component(&self, path: &ComponentPath) -> Option<&ResolvedComponent> {
        self.components.iter().find(|c| &c.path == path)
    }
}

/// Implicit bindings shared by every component of a round.
///
/// Injection bindings depend only on the declaration of the injected class,
/// so they are computed once per key and reused across components and roots.
#[derive(Debug, Default)]
pub struct ResolverContext {
    injection: HashMap<Key, Option<Arc<Binding>>>,
    members_injection: HashMap<Key, Option<Arc<Binding>>>,
}

impl ResolverContext {
    pub fn clear(&mut self) {
        self.injection.clear();
        self.members_injection.clear();
    }

    pub fn len(&self) -> usize {
        self.injection.len() + self.members_injection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
