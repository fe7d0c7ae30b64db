use super::{
    MissingBindingHints, OwnedBinding, ResolvedBindings, ResolvedComponent, ResolvedHierarchy,
    ResolverContext,
};
use crate::binding::{BindingFactory, Declaration, MalformedDeclaration, SubcomponentDeclaration};
use crate::descriptor::{
    ChildFactoryMethod, ComponentDescriptor, ComponentDescriptorFactory, DependencyComponent,
};
use crate::error::{BindscopeError, Result};
use crate::graph::BindingGraph;
use bindscope_api::{
    Binding, BindingKind, ComponentPath, DependencyRequest, ElementRef, Key, RequestKind,
    frameworks,
};
use bindscope_plugin::DeclarationRepository;
use indexmap::{IndexMap, IndexSet};
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Builds binding graphs for root components.
///
/// Descriptors and implicit bindings are memoized until [`clear`](Self::clear)
/// is called, so several roots validated in one round share that work.
pub struct BindingGraphFactory<'a> {
    descriptors: ComponentDescriptorFactory<'a>,
    context: ResolverContext,
}

impl<'a> BindingGraphFactory<'a> {
    pub fn new(repo: &'a dyn DeclarationRepository) -> Self {
        Self {
            descriptors: ComponentDescriptorFactory::new(repo),
            context: ResolverContext::default(),
        }
    }

    pub fn descriptors(&mut self) -> &mut ComponentDescriptorFactory<'a> {
        &mut self.descriptors
    }

    pub fn context(&self) -> &ResolverContext {
        &self.context
    }

    /// Drops everything memoized during the current round.
    pub fn clear(&mut self) {
        self.descriptors.clear();
        self.context.clear();
    }

    /// Resolves `root` and builds its binding graph.
    ///
    /// With `full_binding_graph` every key bound by an installed module is
    /// resolved, not just the keys reachable from entry points.
    pub fn create(&mut self, root: &str, full_binding_graph: bool) -> Result<BindingGraph> {
        let hierarchy = self.resolve(root, full_binding_graph)?;
        BindingGraph::from_hierarchy(hierarchy)
    }

    pub fn resolve(&mut self, root: &str, full_binding_graph: bool) -> Result<ResolvedHierarchy> {
        let descriptor = self.descriptors.component(root)?;
        let dependency_components = if descriptor.is_real_component() {
            self.descriptors.dependency_components(root)?
        } else {
            Vec::new()
        };
        tracing::debug!(
            "resolving {} (full binding graph: {})",
            descriptor.name,
            full_binding_graph
        );

        let mut resolution = Resolution {
            descriptors: &mut self.descriptors,
            context: &mut self.context,
            resolvers: Vec::new(),
            malformed: Vec::new(),
            full_binding_graph,
        };
        let path = ComponentPath::root(descriptor.name.clone());
        resolution.resolve_component(None, path, descriptor, None)?;
        Ok(resolution.finish(dependency_components))
    }
}

/// Marker for the depends-on-local walk, which visits keys and bindings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LocalCheck {
    Key(Key),
    Binding(Arc<Binding>),
}

struct ComponentResolver {
    parent: Option<usize>,
    path: ComponentPath,
    descriptor: Arc<ComponentDescriptor>,
    factory_method: Option<ChildFactoryMethod>,
    /// Contributions stay under their own contribution keys here.
    explicit_bindings: IndexMap<Key, IndexSet<Arc<Binding>>>,
    /// Contributions indexed by the set or map they contribute to.
    explicit_multibindings: IndexMap<Key, IndexSet<Arc<Binding>>>,
    multibinding_declarations: IndexMap<Key, Vec<Declaration>>,
    /// Keyed by `T` for `@BindsOptionalOf T`.
    optional_declarations: IndexMap<Key, Vec<Declaration>>,
    subcomponent_declarations: IndexMap<Key, Vec<SubcomponentDeclaration>>,
    resolved: IndexMap<Key, Arc<ResolvedBindings>>,
    members_injection: IndexMap<Key, Arc<ResolvedBindings>>,
    cycle_stack: Vec<Key>,
    key_depends_on_local: HashMap<Key, bool>,
    binding_depends_on_local: HashMap<Arc<Binding>, bool>,
    subcomponents_to_resolve: VecDeque<SmolStr>,
}

impl ComponentResolver {
    fn new(
        parent: Option<usize>,
        path: ComponentPath,
        descriptor: Arc<ComponentDescriptor>,
        factory_method: Option<ChildFactoryMethod>,
    ) -> Self {
        let mut explicit_bindings: IndexMap<Key, IndexSet<Arc<Binding>>> = IndexMap::new();
        let mut explicit_multibindings: IndexMap<Key, IndexSet<Arc<Binding>>> = IndexMap::new();
        for binding in descriptor.explicit_bindings() {
            let binding = Arc::new(binding.clone());
            if binding.key.is_contribution() {
                explicit_multibindings
                    .entry(binding.key.without_contribution())
                    .or_default()
                    .insert(binding.clone());
            }
            explicit_bindings
                .entry(binding.key.clone())
                .or_default()
                .insert(binding);
        }

        let mut multibinding_declarations: IndexMap<Key, Vec<Declaration>> = IndexMap::new();
        let mut optional_declarations: IndexMap<Key, Vec<Declaration>> = IndexMap::new();
        let mut subcomponent_declarations: IndexMap<Key, Vec<SubcomponentDeclaration>> =
            IndexMap::new();
        for module in &descriptor.modules {
            for declaration in &module.multibinding_declarations {
                multibinding_declarations
                    .entry(declaration.key.clone())
                    .or_default()
                    .push(declaration.clone());
            }
            for declaration in &module.optional_declarations {
                optional_declarations
                    .entry(declaration.key.clone())
                    .or_default()
                    .push(declaration.clone());
            }
            for declaration in &module.subcomponent_declarations {
                subcomponent_declarations
                    .entry(declaration.key.clone())
                    .or_default()
                    .push(declaration.clone());
            }
        }

        let subcomponents_to_resolve = descriptor
            .child_factory_methods
            .iter()
            .map(|m| m.child.clone())
            .collect();

        Self {
            parent,
            path,
            descriptor,
            factory_method,
            explicit_bindings,
            explicit_multibindings,
            multibinding_declarations,
            optional_declarations,
            subcomponent_declarations,
            resolved: IndexMap::new(),
            members_injection: IndexMap::new(),
            cycle_stack: Vec::new(),
            key_depends_on_local: HashMap::new(),
            binding_depends_on_local: HashMap::new(),
            subcomponents_to_resolve,
        }
    }

    fn local_explicit_bindings(&self, key: &Key) -> impl Iterator<Item = &Arc<Binding>> {
        self.explicit_bindings.get(key).into_iter().flatten()
    }

    fn has_local_explicit_bindings(&self, key: &Key) -> bool {
        self.explicit_bindings.get(key).is_some_and(|b| !b.is_empty())
    }

    fn has_local_multibindings(&self, key: &Key) -> bool {
        self.explicit_multibindings
            .get(key)
            .is_some_and(|b| !b.is_empty())
    }

    fn contains_explicit(&self, binding: &Binding) -> bool {
        self.explicit_bindings
            .get(&binding.key)
            .is_some_and(|b| b.contains(binding))
            || self.subcomponent_declarations.contains_key(&binding.key)
    }
}

/// The request key followed by the plain `Map<K, V>` key for framework-valued maps.
fn keys_matching(key: &Key) -> Vec<Key> {
    let mut keys = vec![key.clone()];
    keys.extend(key.unwrapped_map_key());
    keys
}

/// `T` and how it is wrapped, for an `Optional<T>` key.
fn optional_underlying(key: &Key) -> Option<(Key, RequestKind)> {
    let value = key.ty.optional_value()?;
    let (kind, ty) = RequestKind::extract(value);
    Some((key.with_type(ty), kind))
}

/// One resolution pass over a root and its subcomponents.
struct Resolution<'r, 'a> {
    descriptors: &'r mut ComponentDescriptorFactory<'a>,
    context: &'r mut ResolverContext,
    resolvers: Vec<ComponentResolver>,
    malformed: Vec<MalformedDeclaration>,
    full_binding_graph: bool,
}

impl<'r, 'a> Resolution<'r, 'a> {
    fn bindings(&self) -> &BindingFactory<'a> {
        self.descriptors.bindings()
    }

    fn record_malformed(&mut self, declaration: MalformedDeclaration) {
        if !self.malformed.contains(&declaration) {
            self.malformed.push(declaration);
        }
    }

    /// Resolver indices from the root down to `idx`.
    fn lineage(&self, idx: usize) -> Vec<usize> {
        let mut lineage = vec![idx];
        let mut current = idx;
        while let Some(parent) = self.resolvers[current].parent {
            lineage.push(parent);
            current = parent;
        }
        lineage.reverse();
        lineage
    }

    fn resolve_component(
        &mut self,
        parent: Option<usize>,
        path: ComponentPath,
        descriptor: Arc<ComponentDescriptor>,
        factory_method: Option<ChildFactoryMethod>,
    ) -> Result<usize> {
        let idx = self.resolvers.len();
        for malformed in &descriptor.malformed {
            self.record_malformed(malformed.clone());
        }
        for module in &descriptor.modules {
            for malformed in &module.malformed {
                self.record_malformed(malformed.clone());
            }
        }
        self.resolvers.push(ComponentResolver::new(
            parent,
            path.clone(),
            descriptor.clone(),
            factory_method,
        ));

        for entry_point in &descriptor.entry_points {
            let request = &entry_point.request;
            if request.kind == RequestKind::MembersInjection {
                self.resolve_members_injection(idx, &request.key)?;
            } else {
                self.resolve(idx, &request.key)?;
            }
        }

        if self.full_binding_graph {
            let keys: Vec<Key> = descriptor
                .modules
                .iter()
                .flat_map(|m| m.binding_keys())
                .collect();
            for key in keys {
                self.resolve(idx, &key.without_contribution())?;
            }
        }

        let mut resolved_children: HashSet<SmolStr> = HashSet::new();
        while let Some(child) = self.resolvers[idx].subcomponents_to_resolve.pop_front() {
            if !resolved_children.insert(child.clone()) {
                continue;
            }
            if path.components().contains(&child) {
                let element = ElementRef::of_type(child.clone());
                let e = BindscopeError::malformed(
                    &element,
                    format!("{} cannot be installed in its own ancestor {}", child, path),
                );
                self.record_malformed(MalformedDeclaration::new(element, &e));
                continue;
            }
            let child_descriptor = match self.descriptors.component(&child) {
                Ok(descriptor) => descriptor,
                Err(e @ BindscopeError::UnknownType(_)) => {
                    let element = ElementRef::of_type(child.clone());
                    self.record_malformed(MalformedDeclaration::new(element, &e));
                    continue;
                }
                Err(e) => return Err(e),
            };
            let factory_method = descriptor
                .child_factory_method(&child)
                .filter(|m| !m.returns_creator)
                .cloned();
            tracing::debug!("resolving subcomponent {} of {}", child, path);
            self.resolve_component(Some(idx), path.child(child), child_descriptor, factory_method)?;
        }
        Ok(idx)
    }

    /// Resolves `key` in component `idx`, inheriting the ancestor's resolution
    /// when nothing local could change it.
    fn resolve(&mut self, idx: usize, key: &Key) -> Result<()> {
        let resolver = &self.resolvers[idx];
        if resolver.cycle_stack.contains(key) || resolver.resolved.contains_key(key) {
            return Ok(());
        }

        if let Some(parent) = resolver.parent
            && self.previously_resolved(parent, key).is_some()
        {
            self.resolve(parent, key)?;
            let mut seen = HashSet::new();
            if !self.key_depends_on_local(idx, key, &mut seen)?
                && !self.resolvers[idx].has_local_explicit_bindings(key)
                && let Some(inherited) = self.previously_resolved(parent, key)
            {
                self.resolvers[idx].resolved.insert(key.clone(), inherited);
                return Ok(());
            }
        }

        self.resolvers[idx].cycle_stack.push(key.clone());
        let result = self.look_up_and_resolve(idx, key);
        self.resolvers[idx].cycle_stack.pop();
        result
    }

    fn look_up_and_resolve(&mut self, idx: usize, key: &Key) -> Result<()> {
        let resolved = Arc::new(self.look_up_bindings(idx, key)?);
        self.resolvers[idx]
            .resolved
            .insert(key.clone(), resolved.clone());
        self.resolve_dependencies(idx, &resolved)
    }

    fn resolve_dependencies(&mut self, idx: usize, resolved: &ResolvedBindings) -> Result<()> {
        let path = self.resolvers[idx].path.clone();
        let dependencies: Vec<DependencyRequest> = resolved
            .bindings_owned_by(&path)
            .flat_map(|b| b.dependencies.iter().cloned())
            .collect();
        for dependency in dependencies {
            if dependency.kind == RequestKind::MembersInjection {
                self.resolve_members_injection(idx, &dependency.key)?;
            } else {
                self.resolve(idx, &dependency.key)?;
            }
        }
        Ok(())
    }

    /// Members injection is never inherited from a parent.
    fn resolve_members_injection(&mut self, idx: usize, key: &Key) -> Result<()> {
        if self.resolvers[idx].members_injection.contains_key(key) {
            return Ok(());
        }
        let path = self.resolvers[idx].path.clone();
        let mut resolved = ResolvedBindings::empty(key.clone(), path.clone());
        if let Some(binding) = self.members_injection_binding(key)? {
            resolved.bindings.push(OwnedBinding {
                owner: path,
                binding,
            });
        }
        let resolved = Arc::new(resolved);
        self.resolvers[idx]
            .members_injection
            .insert(key.clone(), resolved.clone());
        self.resolve_dependencies(idx, &resolved)
    }

    fn previously_resolved(&self, idx: usize, key: &Key) -> Option<Arc<ResolvedBindings>> {
        let mut current = Some(idx);
        while let Some(i) = current {
            if let Some(resolved) = self.resolvers[i].resolved.get(key) {
                return Some(resolved.clone());
            }
            current = self.resolvers[i].parent;
        }
        None
    }

    fn look_up_bindings(&mut self, idx: usize, key: &Key) -> Result<ResolvedBindings> {
        let lineage = self.lineage(idx);
        let matching = keys_matching(key);
        let optional = optional_underlying(key);

        let mut bindings: IndexSet<Arc<Binding>> = IndexSet::new();
        let mut contributions: IndexSet<Arc<Binding>> = IndexSet::new();
        let mut multibinding_declarations: Vec<Declaration> = Vec::new();
        let mut optional_declarations: Vec<Declaration> = Vec::new();
        let mut subcomponent_declarations: Vec<SubcomponentDeclaration> = Vec::new();
        for &r in &lineage {
            let resolver = &self.resolvers[r];
            bindings.extend(resolver.local_explicit_bindings(key).cloned());
            for k in &matching {
                if let Some(local) = resolver.explicit_multibindings.get(k) {
                    contributions.extend(local.iter().cloned());
                }
                for declaration in resolver.multibinding_declarations.get(k).into_iter().flatten() {
                    if !multibinding_declarations.contains(declaration) {
                        multibinding_declarations.push(declaration.clone());
                    }
                }
            }
            if let Some((underlying, _)) = &optional {
                for declaration in resolver.optional_declarations.get(underlying).into_iter().flatten() {
                    if !optional_declarations.contains(declaration) {
                        optional_declarations.push(declaration.clone());
                    }
                }
            }
            for declaration in resolver.subcomponent_declarations.get(key).into_iter().flatten() {
                if !subcomponent_declarations.contains(declaration) {
                    subcomponent_declarations.push(declaration.clone());
                }
            }
        }

        if !contributions.is_empty() || !multibinding_declarations.is_empty() {
            let contributions: Vec<Arc<Binding>> = contributions.into_iter().collect();
            bindings.insert(Arc::new(self.bindings().multibound_binding(key, &contributions)));
        }

        if let Some((underlying, kind)) = &optional
            && !optional_declarations.is_empty()
        {
            let present = !self.look_up_bindings(idx, underlying)?.is_empty();
            let request = present.then(|| DependencyRequest::new(underlying.clone(), *kind));
            bindings.insert(Arc::new(self.bindings().optional_binding(key, request)));
        }

        if let Some(declaration) = subcomponent_declarations.first() {
            let binding = Arc::new(
                self.bindings()
                    .subcomponent_creator_binding(key, &declaration.subcomponent),
            );
            let owner = self.owning_resolver(idx, &binding).unwrap_or(idx);
            self.resolvers[owner]
                .subcomponents_to_resolve
                .push_back(declaration.subcomponent.clone());
            bindings.insert(binding);
        }

        if key.qualifier.is_none()
            && let Some(target) = key.ty.unwrap_single(frameworks::MEMBERS_INJECTOR)
            && self.members_injection_binding(&Key::new(target.clone()))?.is_some()
        {
            bindings.insert(Arc::new(
                self.bindings().members_injector_binding(key, target),
            ));
        }

        if bindings.is_empty()
            && let Some(injection) = self.injection_binding(key)?
            && !self.incorrectly_scoped_in_partial_graph(idx, &injection)
        {
            bindings.insert(injection);
        }

        let mut resolved = ResolvedBindings::empty(key.clone(), self.resolvers[idx].path.clone());
        for binding in bindings {
            let owner = self.owning_component(idx, key, &binding)?;
            resolved.bindings.push(OwnedBinding { owner, binding });
        }
        resolved.multibinding_declarations = multibinding_declarations;
        resolved.optional_declarations = optional_declarations;
        resolved.subcomponent_declarations = subcomponent_declarations;
        Ok(resolved)
    }

    fn injection_binding(&mut self, key: &Key) -> Result<Option<Arc<Binding>>> {
        if let Some(cached) = self.context.injection.get(key) {
            return Ok(cached.clone());
        }
        let binding = match self.bindings().injection_binding(key) {
            Ok(binding) => binding.map(Arc::new),
            Err(e) if e.is_declaration_error() => {
                self.record_malformed(MalformedDeclaration::new(
                    ElementRef::of_type(key.ty.name()),
                    &e,
                ));
                None
            }
            Err(e) => return Err(e),
        };
        self.context.injection.insert(key.clone(), binding.clone());
        Ok(binding)
    }

    fn members_injection_binding(&mut self, key: &Key) -> Result<Option<Arc<Binding>>> {
        if let Some(cached) = self.context.members_injection.get(key) {
            return Ok(cached.clone());
        }
        let binding = match self.bindings().members_injection_binding(key) {
            Ok(binding) => binding.map(Arc::new),
            Err(e) if e.is_declaration_error() => {
                self.record_malformed(MalformedDeclaration::new(
                    ElementRef::of_type(key.ty.name()),
                    &e,
                ));
                None
            }
            Err(e) => return Err(e),
        };
        self.context
            .members_injection
            .insert(key.clone(), binding.clone());
        Ok(binding)
    }

    /// A scoped `@Inject` class seen while validating a subcomponent on its
    /// own belongs to some ancestor that is not part of this graph.
    fn incorrectly_scoped_in_partial_graph(&self, idx: usize, binding: &Binding) -> bool {
        let root = &self.resolvers[0].descriptor;
        let Some(scope) = &binding.scope else {
            return false;
        };
        if !root.is_subcomponent() || scope.is_reusable() {
            return false;
        }
        let owner = self.owning_resolver(idx, binding).unwrap_or(idx);
        !self.resolvers[owner].descriptor.scopes.contains(scope)
    }

    /// The component that should own `binding` when requested for `key` from `idx`.
    fn owning_component(
        &mut self,
        idx: usize,
        key: &Key,
        binding: &Arc<Binding>,
    ) -> Result<ComponentPath> {
        if let Some(owner) = self.owning_resolver(idx, binding)
            && owner != idx
        {
            let parent = self.resolvers[idx].parent.ok_or_else(|| {
                BindscopeError::Internal(format!(
                    "{} is owned by an ancestor of the root {}",
                    binding.key, self.resolvers[idx].path
                ))
            })?;
            self.resolve(parent, key)?;
            let mut seen = HashSet::new();
            if !self.binding_depends_on_local(idx, binding, &mut seen)? {
                let inherited = self.resolvers[parent]
                    .resolved
                    .get(key)
                    .and_then(|r| r.owner_of(binding).cloned());
                return Ok(inherited.unwrap_or_else(|| self.resolvers[owner].path.clone()));
            }
        }
        Ok(self.resolvers[idx].path.clone())
    }

    fn owning_resolver(&self, idx: usize, binding: &Binding) -> Option<usize> {
        let lineage = self.lineage(idx);
        let scope = binding.scope.as_ref();

        if scope.is_some_and(|s| s.is_production_scope()) || binding.is_production() {
            for &r in &lineage {
                let resolver = &self.resolvers[r];
                if matches!(binding.kind, BindingKind::Injection { .. })
                    && resolver.descriptor.production
                {
                    return Some(r);
                }
                if resolver.contains_explicit(binding) {
                    return Some(r);
                }
            }
        }

        if scope.is_some_and(|s| s.is_reusable()) {
            return lineage.iter().rev().copied().find(|&r| {
                self.resolvers[r]
                    .resolved
                    .get(&binding.key)
                    .is_some_and(|resolved| resolved.contains(binding))
            });
        }

        if let Some(r) = lineage
            .iter()
            .rev()
            .copied()
            .find(|&r| self.resolvers[r].contains_explicit(binding))
        {
            return Some(r);
        }

        let scope = scope?;
        lineage
            .iter()
            .rev()
            .copied()
            .find(|&r| self.resolvers[r].descriptor.scopes.contains(scope))
    }

    /// True when the bindings an ancestor resolved for `key` would see
    /// different contributions from component `idx`.
    fn key_depends_on_local(
        &mut self,
        idx: usize,
        key: &Key,
        seen: &mut HashSet<LocalCheck>,
    ) -> Result<bool> {
        if !seen.insert(LocalCheck::Key(key.clone())) {
            return Ok(false);
        }
        if let Some(&cached) = self.resolvers[idx].key_depends_on_local.get(key) {
            return Ok(cached);
        }
        let previous = self.previously_resolved(idx, key).ok_or_else(|| {
            BindscopeError::Internal(format!(
                "no previously resolved bindings in {} for {}",
                self.resolvers[idx].path, key
            ))
        })?;

        let mut depends = keys_matching(key)
            .iter()
            .any(|k| self.resolvers[idx].has_local_multibindings(k))
            || self.has_local_optional_contribution(idx, &previous);
        if !depends {
            for owned in &previous.bindings {
                if self.binding_depends_on_local(idx, &owned.binding, seen)? {
                    depends = true;
                    break;
                }
            }
        }
        self.resolvers[idx]
            .key_depends_on_local
            .insert(key.clone(), depends);
        Ok(depends)
    }

    /// Scoped bindings never see a subcomponent's contributions.
    fn binding_depends_on_local(
        &mut self,
        idx: usize,
        binding: &Arc<Binding>,
        seen: &mut HashSet<LocalCheck>,
    ) -> Result<bool> {
        if !seen.insert(LocalCheck::Binding(binding.clone())) {
            return Ok(false);
        }
        if let Some(&cached) = self.resolvers[idx].binding_depends_on_local.get(binding) {
            return Ok(cached);
        }
        let mut depends = false;
        let unscoped = binding.scope.as_ref().is_none_or(|s| s.is_reusable());
        if unscoped && !binding.is_production() {
            for dependency in &binding.dependencies {
                if dependency.kind == RequestKind::MembersInjection {
                    continue;
                }
                if self.key_depends_on_local(idx, &dependency.key, seen)? {
                    depends = true;
                    break;
                }
            }
        }
        self.resolvers[idx]
            .binding_depends_on_local
            .insert(binding.clone(), depends);
        Ok(depends)
    }

    fn has_local_optional_contribution(&self, idx: usize, resolved: &ResolvedBindings) -> bool {
        let Some((underlying, _)) = optional_underlying(&resolved.key) else {
            return false;
        };
        if resolved.bindings.iter().any(|b| b.binding.is_optional()) {
            return self.resolvers[idx].has_local_explicit_bindings(&underlying);
        }
        // An inherited `@Provides Optional<T>` conflicts with a local `@BindsOptionalOf T`.
        self.lineage(idx).iter().any(|&r| {
            self.resolvers[r]
                .optional_declarations
                .get(&underlying)
                .is_some_and(|d| !d.is_empty())
        })
    }

    fn finish(self, dependency_components: Vec<DependencyComponent>) -> ResolvedHierarchy {
        let mut missing_hints = HashMap::new();
        for resolver in &self.resolvers {
            let unresolved = resolver
                .resolved
                .iter()
                .chain(resolver.members_injection.iter())
                .filter(|(_, r)| r.is_empty());
            for (key, _) in unresolved {
                if missing_hints.contains_key(key) {
                    continue;
                }
                let hints = MissingBindingHints {
                    implicitly_injectable: self.bindings().is_valid_implicit_provision_key(key),
                    has_injection_sites: self.bindings().has_injection_sites(key),
                };
                missing_hints.insert(key.clone(), hints);
            }
        }

        let mut components = Vec::with_capacity(self.resolvers.len());
        for resolver in &self.resolvers {
            let mut inherited: HashSet<&str> = HashSet::new();
            let mut current = resolver.parent;
            while let Some(p) = current {
                inherited.extend(self.resolvers[p].descriptor.modules.iter().map(|m| m.name.as_str()));
                current = self.resolvers[p].parent;
            }
            let owned_modules = resolver
                .descriptor
                .modules
                .iter()
                .filter(|m| !inherited.contains(m.name.as_str()))
                .cloned()
                .collect();
            tracing::debug!(
                "resolved {} keys in {} ({} members injection)",
                resolver.resolved.len(),
                resolver.path,
                resolver.members_injection.len()
            );
            components.push(ResolvedComponent {
                path: resolver.path.clone(),
                parent: resolver.parent.map(|p| self.resolvers[p].path.clone()),
                descriptor: resolver.descriptor.clone(),
                resolved: resolver.resolved.clone(),
                members_injection: resolver.members_injection.clone(),
                owned_modules,
                factory_method: resolver.factory_method.clone(),
            });
        }
        ResolvedHierarchy {
            components,
            dependency_components,
            malformed: self.malformed,
            missing_hints,
            full_binding_graph: self.full_binding_graph,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindscope_api::TypeRef;
    use bindscope_plugin::InMemoryRepository;
    use bindscope_plugin::testing::*;

    fn key(ty: &str) -> Key {
        Key::new(TypeRef::parse(ty).unwrap())
    }

    fn owners(hierarchy: &ResolvedHierarchy, path: &ComponentPath, ty: &str) -> Vec<String> {
        hierarchy
            .component(path)
            .and_then(|c| c.resolved.get(&key(ty)))
            .map(|r| r.bindings.iter().map(|b| b.owner.to_string()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_resolves_entry_point_dependencies() {
        let repo = InMemoryRepository::new()
            .with(component("App").install("NetModule").entry_point("cache", "Cache").build())
            .and_then(|r| r.with(module("NetModule").provides("client", "HttpClient", &[]).build()))
            .and_then(|r| r.with(class("Cache").inject_constructor(&[("client", "HttpClient")]).build()))
            .unwrap();
        let mut factory = BindingGraphFactory::new(&repo);
        let hierarchy = factory.resolve("App", false).unwrap();
        let root = hierarchy.root().unwrap();
        let keys: Vec<_> = root.resolved.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["Cache", "HttpClient"]);
        assert!(hierarchy.malformed.is_empty(), "{:?}", hierarchy.malformed);
        assert_eq!(factory.context().len(), 1);
    }

    #[test]
    fn test_re_resolution_is_idempotent() {
        let repo = InMemoryRepository::new()
            .with(component("App").install("NetModule").entry_point("cache", "Cache").build())
            .and_then(|r| r.with(module("NetModule").provides("client", "HttpClient", &[]).build()))
            .and_then(|r| r.with(class("Cache").inject_constructor(&[("client", "HttpClient")]).build()))
            .unwrap();
        let mut factory = BindingGraphFactory::new(&repo);
        let first = factory.resolve("App", false).unwrap();
        let second = factory.resolve("App", false).unwrap();
        let path = ComponentPath::root("App");
        for ty in ["Cache", "HttpClient"] {
            let a = &first.component(&path).unwrap().resolved[&key(ty)];
            let b = &second.component(&path).unwrap().resolved[&key(ty)];
            assert_eq!(a, b);
            assert!(Arc::ptr_eq(&a.bindings[0].binding, &b.bindings[0].binding));
        }

        factory.clear();
        let fresh = factory.resolve("App", false).unwrap();
        assert_eq!(
            first.component(&path).unwrap().resolved[&key("Cache")],
            fresh.component(&path).unwrap().resolved[&key("Cache")]
        );
    }

    #[test]
    fn test_missing_key_resolves_empty() {
        let repo = InMemoryRepository::new()
            .with(component("App").entry_point("api", "Api").build())
            .and_then(|r| r.with(interface("Api").build()))
            .unwrap();
        let mut factory = BindingGraphFactory::new(&repo);
        let hierarchy = factory.resolve("App", false).unwrap();
        assert!(hierarchy.root().unwrap().resolved[&key("Api")].is_empty());
    }

    #[test]
    fn test_cycle_terminates() {
        let repo = InMemoryRepository::new()
            .with(component("App").entry_point("a", "A").build())
            .and_then(|r| r.with(class("A").inject_constructor(&[("b", "B")]).build()))
            .and_then(|r| r.with(class("B").inject_constructor(&[("a", "A")]).build()))
            .unwrap();
        let mut factory = BindingGraphFactory::new(&repo);
        let hierarchy = factory.resolve("App", false).unwrap();
        assert_eq!(hierarchy.root().unwrap().resolved.len(), 2);
    }

    #[test]
    fn test_scoped_injection_owned_by_matching_ancestor() {
        let repo = InMemoryRepository::new()
            .with(
                component("App")
                    .scoped("Singleton")
                    .method(method("child", "Child").abstract_method())
                    .build(),
            )
            .and_then(|r| r.with(subcomponent("Child").entry_point("db", "Database").build()))
            .and_then(|r| r.with(class("Database").scoped("Singleton").inject_constructor(&[]).build()))
            .unwrap();
        let mut factory = BindingGraphFactory::new(&repo);
        let hierarchy = factory.resolve("App", false).unwrap();
        let child = ComponentPath::root("App").child("Child");
        assert_eq!(owners(&hierarchy, &child, "Database"), vec!["App"]);
        let names: Vec<_> = hierarchy.components.iter().map(|c| c.path.to_string()).collect();
        assert_eq!(names, vec!["App", "App → Child"]);
    }

    #[test]
    fn test_unscoped_binding_sees_child_contributions() {
        let repo = InMemoryRepository::new()
            .with(
                component("App")
                    .install("ParentModule")
                    .entry_point("registry", "Registry")
                    .method(method("child", "Child").abstract_method())
                    .build(),
            )
            .and_then(|r| {
                r.with(
                    module("ParentModule")
                        .method(provides("core", "Plugin").annotated("IntoSet").static_method())
                        .build(),
                )
            })
            .and_then(|r| {
                r.with(
                    subcomponent("Child")
                        .install("ChildModule")
                        .entry_point("registry", "Registry")
                        .build(),
                )
            })
            .and_then(|r| {
                r.with(
                    module("ChildModule")
                        .method(provides("extra", "Plugin").annotated("IntoSet").static_method())
                        .build(),
                )
            })
            .and_then(|r| {
                r.with(class("Registry").inject_constructor(&[("plugins", "Set<Plugin>")]).build())
            })
            .unwrap();
        let mut factory = BindingGraphFactory::new(&repo);
        let hierarchy = factory.resolve("App", false).unwrap();
        let root = ComponentPath::root("App");
        let child = root.child("Child");
        assert_eq!(owners(&hierarchy, &root, "Registry"), vec!["App"]);
        assert_eq!(owners(&hierarchy, &child, "Registry"), vec!["App → Child"]);

        let set = &hierarchy.component(&child).unwrap().resolved[&key("java.util.Set<Plugin>")];
        assert_eq!(set.bindings.len(), 1);
        assert_eq!(set.bindings[0].binding.dependencies.len(), 2);
    }

    #[test]
    fn test_inherits_unchanged_resolution() {
        let repo = InMemoryRepository::new()
            .with(
                component("App")
                    .install("NetModule")
                    .entry_point("client", "HttpClient")
                    .method(method("child", "Child").abstract_method())
                    .build(),
            )
            .and_then(|r| r.with(module("NetModule").provides("client", "HttpClient", &[]).build()))
            .and_then(|r| r.with(subcomponent("Child").entry_point("client", "HttpClient").build()))
            .unwrap();
        let mut factory = BindingGraphFactory::new(&repo);
        let hierarchy = factory.resolve("App", false).unwrap();
        let root = hierarchy.component(&ComponentPath::root("App")).unwrap();
        let child = hierarchy
            .component(&ComponentPath::root("App").child("Child"))
            .unwrap();
        let k = key("HttpClient");
        assert!(Arc::ptr_eq(&root.resolved[&k], &child.resolved[&k]));
        assert_eq!(child.owned_modules.len(), 0);
        assert_eq!(root.owned_modules.len(), 1);
    }

    #[test]
    fn test_module_declared_subcomponent_is_resolved() {
        let repo = InMemoryRepository::new()
            .with(
                component("App")
                    .install("AppModule")
                    .entry_point("builder", "Child.Builder")
                    .build(),
            )
            .and_then(|r| r.with(module("AppModule").declares_subcomponent("Child").build()))
            .and_then(|r| r.with(subcomponent("Child").with_creator("Child.Builder").build()))
            .and_then(|r| r.with(creator("Child.Builder", "Child").build()))
            .unwrap();
        let mut factory = BindingGraphFactory::new(&repo);
        let hierarchy = factory.resolve("App", false).unwrap();
        assert_eq!(hierarchy.components.len(), 2);
        let builder = &hierarchy.root().unwrap().resolved[&key("Child.Builder")];
        assert!(matches!(
            builder.bindings[0].binding.kind,
            BindingKind::SubcomponentCreator { .. }
        ));
        assert_eq!(builder.subcomponent_declarations.len(), 1);
    }

    #[test]
    fn test_optional_bindings() {
        let repo = InMemoryRepository::new()
            .with(
                component("App")
                    .install("OptModule")
                    .entry_point("tracer", "Optional<Tracer>")
                    .entry_point("clock", "Optional<Provider<Clock>>")
                    .build(),
            )
            .and_then(|r| {
                r.with(
                    module("OptModule")
                        .method(method("tracer", "Tracer").annotated("BindsOptionalOf").abstract_method())
                        .method(method("clock", "Clock").annotated("BindsOptionalOf").abstract_method())
                        .provides("clockImpl", "Clock", &[])
                        .build(),
                )
            })
            .unwrap();
        let mut factory = BindingGraphFactory::new(&repo);
        let hierarchy = factory.resolve("App", false).unwrap();
        let root = hierarchy.root().unwrap();
        let tracer = &root.resolved[&key("java.util.Optional<Tracer>")];
        assert_eq!(tracer.bindings[0].binding.kind, BindingKind::OptionalAbsent);
        let clock = &root.resolved[&key("java.util.Optional<javax.inject.Provider<Clock>>")];
        let binding = &clock.bindings[0].binding;
        assert_eq!(binding.kind, BindingKind::OptionalPresent);
        assert_eq!(binding.dependencies[0].kind, RequestKind::Provider);
        assert!(root.resolved.contains_key(&key("Clock")));
    }

    #[test]
    fn test_full_binding_graph_resolves_unused_keys() {
        let repo = InMemoryRepository::new()
            .with(component("App").install("NetModule").build())
            .and_then(|r| r.with(module("NetModule").provides("client", "HttpClient", &[]).build()))
            .unwrap();
        let mut factory = BindingGraphFactory::new(&repo);
        assert!(factory.resolve("App", false).unwrap().root().unwrap().resolved.is_empty());
        let full = factory.resolve("App", true).unwrap();
        assert!(full.root().unwrap().resolved.contains_key(&key("HttpClient")));
        assert!(full.full_binding_graph);
    }

    #[test]
    fn test_not_yet_generated_propagates() {
        let mut repo = InMemoryRepository::new()
            .with(component("App").entry_point("gen", "Generated").build())
            .unwrap();
        repo.mark_pending("Generated");
        let mut factory = BindingGraphFactory::new(&repo);
        let err = factory.resolve("App", false).unwrap_err();
        assert!(matches!(err, BindscopeError::NotYetAvailable(name) if name == "Generated"));
    }
}
