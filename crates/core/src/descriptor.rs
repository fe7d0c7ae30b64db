//! Component descriptors: what a component installs, exposes and creates.

use crate::binding::{
    BindingFactory, MalformedDeclaration, ModuleDescriptor, canonical_type, method_element,
};
use crate::error::{BindscopeError, Result};
use bindscope_api::{
    Binding, DependencyRequest, ElementRef, Key, RequestKind, Scope, TypeRef, frameworks,
};
use bindscope_plugin::{
    ComponentAnnotation, DeclarationRepository, MethodDeclaration, TypeDeclaration, TypeKind,
    has_annotation,
};
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Component,
    Subcomponent,
    /// A module validated on its own as a pseudo-component.
    Module,
}

impl ComponentKind {
    pub fn is_real_component(self) -> bool {
        !matches!(self, ComponentKind::Module)
    }
}

/// A component method that requests a dependency from outside the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub method: ElementRef,
    pub request: DependencyRequest,
}

/// A component method that creates a subcomponent or its creator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildFactoryMethod {
    pub method: ElementRef,
    pub child: SmolStr,
    pub parameters: Vec<TypeRef>,
    /// `Child.Builder builder()` rather than `Child child(SomeModule module)`.
    pub returns_creator: bool,
}

#[derive(Debug, Clone)]
pub struct ComponentDescriptor {
    pub name: SmolStr,
    pub kind: ComponentKind,
    pub production: bool,
    pub scopes: Vec<Scope>,
    /// Installed modules and everything they include, in installation order.
    pub modules: Vec<Arc<ModuleDescriptor>>,
    pub dependencies: Vec<SmolStr>,
    pub creator: Option<SmolStr>,
    pub entry_points: Vec<EntryPoint>,
    pub child_factory_methods: Vec<ChildFactoryMethod>,
    pub children_from_modules: Vec<SmolStr>,
    /// Bindings contributed by the component itself rather than its modules.
    pub component_bindings: Vec<Binding>,
    pub malformed: Vec<MalformedDeclaration>,
}

impl ComponentDescriptor {
    pub fn element(&self) -> ElementRef {
        ElementRef::of_type(self.name.clone())
    }

    pub fn is_real_component(&self) -> bool {
        self.kind.is_real_component()
    }

    pub fn is_subcomponent(&self) -> bool {
        self.kind == ComponentKind::Subcomponent
    }

    pub fn child_factory_method(&self, child: &str) -> Option<&ChildFactoryMethod> {
        self.child_factory_methods.iter().find(|m| m.child == child)
    }

    pub fn module(&self, name: &str) -> Option<&Arc<ModuleDescriptor>> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Every explicit binding: the component's own followed by its modules'.
    pub fn explicit_bindings(&self) -> impl Iterator<Item = &Binding> {
        self.component_bindings
            .iter()
            .chain(self.modules.iter().flat_map(|m| m.bindings.iter()))
    }
}

/// The parts of a dependency component the hierarchy checks look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyComponent {
    pub name: SmolStr,
    pub scopes: Vec<Scope>,
    pub dependencies: Vec<SmolStr>,
    /// False for plain types used as component dependencies.
    pub is_component: bool,
    pub production: bool,
}

/// Builds descriptors, memoizing modules and components for one round.
pub struct ComponentDescriptorFactory<'a> {
    bindings: BindingFactory<'a>,
    modules: HashMap<SmolStr, Arc<ModuleDescriptor>>,
    components: HashMap<SmolStr, Arc<ComponentDescriptor>>,
}

impl<'a> ComponentDescriptorFactory<'a> {
    pub fn new(repo: &'a dyn DeclarationRepository) -> Self {
        Self {
            bindings: BindingFactory::new(repo),
            modules: HashMap::new(),
            components: HashMap::new(),
        }
    }

    pub fn bindings(&self) -> &BindingFactory<'a> {
        &self.bindings
    }

    pub fn clear(&mut self) {
        self.modules.clear();
        self.components.clear();
    }

    pub fn module(&mut self, name: &str) -> Result<Option<Arc<ModuleDescriptor>>> {
        if let Some(module) = self.modules.get(name) {
            return Ok(Some(module.clone()));
        }
        let Some(decl) = self.bindings.lookup(name)? else {
            return Ok(None);
        };
        if decl.module().is_none() {
            return Ok(None);
        }
        let module = Arc::new(ModuleDescriptor::create(&self.bindings, decl)?);
        self.modules.insert(SmolStr::from(name), module.clone());
        Ok(Some(module))
    }

    /// `roots` and every module they include, breadth first and without repeats.
    fn transitive_modules(
        &mut self,
        roots: &[String],
        element: &ElementRef,
        malformed: &mut Vec<MalformedDeclaration>,
    ) -> Result<Vec<Arc<ModuleDescriptor>>> {
        let mut seen = HashSet::new();
        let mut queue: VecDeque<String> = roots.iter().cloned().collect();
        let mut result = Vec::new();
        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }
            match self.module(&name)? {
                Some(module) => {
                    queue.extend(module.includes.iter().map(|i| i.to_string()));
                    result.push(module);
                }
                None => {
                    let e = BindscopeError::malformed(element, format!("{} is not a module", name));
                    malformed.push(MalformedDeclaration::new(element.clone(), &e));
                }
            }
        }
        Ok(result)
    }

    /// Descriptor for a component, a subcomponent, or a module standing in for one.
    pub fn component(&mut self, name: &str) -> Result<Arc<ComponentDescriptor>> {
        if let Some(component) = self.components.get(name) {
            return Ok(component.clone());
        }
        let decl = self
            .bindings
            .lookup(name)?
            .ok_or_else(|| BindscopeError::UnknownType(name.to_string()))?;
        let descriptor = match &decl.kind {
            TypeKind::Component(annotation) => {
                self.create_component(decl, annotation, ComponentKind::Component)?
            }
            TypeKind::Subcomponent(annotation) => {
                self.create_component(decl, annotation, ComponentKind::Subcomponent)?
            }
            TypeKind::Module(_) => self.create_module_component(decl)?,
            _ => return Err(BindscopeError::UnknownType(name.to_string())),
        };
        tracing::debug!(
            "described {} with {} modules and {} entry points",
            descriptor.name,
            descriptor.modules.len(),
            descriptor.entry_points.len()
        );
        let descriptor = Arc::new(descriptor);
        self.components
            .insert(SmolStr::from(name), descriptor.clone());
        Ok(descriptor)
    }

    fn create_component(
        &mut self,
        decl: &'a TypeDeclaration,
        annotation: &ComponentAnnotation,
        kind: ComponentKind,
    ) -> Result<ComponentDescriptor> {
        let element = ElementRef::of_type(decl.name.as_str());
        let mut malformed = Vec::new();
        let modules = self.transitive_modules(&annotation.modules, &element, &mut malformed)?;
        let children_from_modules: Vec<SmolStr> = modules
            .iter()
            .flat_map(|m| m.subcomponent_declarations.iter())
            .map(|d| d.subcomponent.clone())
            .fold(Vec::new(), |mut acc, child| {
                if !acc.contains(&child) {
                    acc.push(child);
                }
                acc
            });

        let mut scopes: Vec<Scope> = decl
            .annotations
            .iter()
            .filter(|a| self.bindings.repository().is_scope(&a.type_name))
            .map(|a| Scope::new(a.type_name.as_str()))
            .collect();
        if annotation.production && !scopes.iter().any(Scope::is_production_scope) {
            scopes.push(Scope::new(frameworks::PRODUCTION_SCOPE[0]));
        }

        let mut component_bindings = vec![self.bindings.component_binding(&decl.name)];
        let dependencies: Vec<SmolStr> = annotation
            .dependencies
            .iter()
            .map(|d| SmolStr::from(d.as_str()))
            .collect();
        for dependency in &annotation.dependencies {
            component_bindings.push(self.bindings.component_dependency_binding(dependency));
            let Some(dep_decl) = self.bindings.lookup(dependency)? else {
                let e = BindscopeError::malformed(
                    &element,
                    format!("{} is not a known component dependency", dependency),
                );
                malformed.push(MalformedDeclaration::new(element.clone(), &e));
                continue;
            };
            for method in dep_decl.methods.iter().filter(|m| is_contribution_method(m)) {
                match self.bindings.component_provision_binding(dependency, method) {
                    Ok(binding) => component_bindings.push(binding),
                    Err(e) if e.is_declaration_error() => malformed
                        .push(MalformedDeclaration::new(method_element(dependency, method), &e)),
                    Err(e) => return Err(e),
                }
            }
        }

        if let Some(creator) = &annotation.creator {
            self.read_creator(creator, &mut component_bindings, &mut malformed)?;
        }

        let mut entry_points = Vec::new();
        let mut child_factory_methods = Vec::new();
        for method in decl.methods.iter().filter(|m| m.is_abstract && !m.is_static) {
            let method_ref = method_element(&decl.name, method);
            match self.read_component_method(&decl.name, method, &method_ref, annotation.production) {
                Ok(ComponentMethod::EntryPoint(request)) => entry_points.push(EntryPoint {
                    method: method_ref,
                    request,
                }),
                Ok(ComponentMethod::ChildFactory(child, parameters)) => {
                    child_factory_methods.push(ChildFactoryMethod {
                        method: method_ref,
                        child,
                        parameters,
                        returns_creator: false,
                    })
                }
                Ok(ComponentMethod::ChildCreator(child, request)) => {
                    if !children_from_modules.contains(&child) {
                        component_bindings.push(
                            self.bindings
                                .subcomponent_creator_binding(&request.key, &child),
                        );
                    }
                    child_factory_methods.push(ChildFactoryMethod {
                        method: method_ref.clone(),
                        child,
                        parameters: Vec::new(),
                        returns_creator: true,
                    });
                    entry_points.push(EntryPoint {
                        method: method_ref,
                        request,
                    });
                }
                Err(e) if e.is_declaration_error() => {
                    malformed.push(MalformedDeclaration::new(method_ref, &e))
                }
                Err(e) => return Err(e),
            }
        }

        Ok(ComponentDescriptor {
            name: decl.name.as_str().into(),
            kind,
            production: annotation.production,
            scopes,
            modules,
            dependencies,
            creator: annotation.creator.as_deref().map(SmolStr::from),
            entry_points,
            child_factory_methods,
            children_from_modules,
            component_bindings,
            malformed,
        })
    }

    fn create_module_component(&mut self, decl: &'a TypeDeclaration) -> Result<ComponentDescriptor> {
        let element = ElementRef::of_type(decl.name.as_str());
        let mut malformed = Vec::new();
        let modules =
            self.transitive_modules(std::slice::from_ref(&decl.name), &element, &mut malformed)?;
        let children_from_modules = modules
            .iter()
            .flat_map(|m| m.subcomponent_declarations.iter())
            .map(|d| d.subcomponent.clone())
            .collect::<Vec<_>>();
        Ok(ComponentDescriptor {
            name: decl.name.as_str().into(),
            kind: ComponentKind::Module,
            production: decl.module().is_some_and(|m| m.producer),
            scopes: Vec::new(),
            modules,
            dependencies: Vec::new(),
            creator: None,
            entry_points: Vec::new(),
            child_factory_methods: Vec::new(),
            children_from_modules,
            component_bindings: Vec::new(),
            malformed,
        })
    }

    fn read_creator(
        &self,
        creator: &str,
        component_bindings: &mut Vec<Binding>,
        malformed: &mut Vec<MalformedDeclaration>,
    ) -> Result<()> {
        let Some(creator_decl) = self.bindings.lookup(creator)? else {
            return Ok(());
        };
        for method in &creator_decl.methods {
            let setter = has_annotation(&method.annotations, frameworks::BINDS_INSTANCE);
            for (index, param) in method.parameters.iter().enumerate() {
                if !setter && !has_annotation(&param.annotations, frameworks::BINDS_INSTANCE) {
                    continue;
                }
                match self.bindings.bound_instance_binding(creator, method, index) {
                    Ok(binding) => component_bindings.push(binding),
                    Err(e) if e.is_declaration_error() => malformed
                        .push(MalformedDeclaration::new(method_element(creator, method), &e)),
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }

    fn read_component_method(
        &self,
        component: &str,
        method: &MethodDeclaration,
        element: &ElementRef,
        production: bool,
    ) -> Result<ComponentMethod> {
        self.bindings.check_signature(element, method)?;
        let keys = self.bindings.keys();
        let qualified = keys.qualifier(&method.annotations, element)?.is_some();
        if let TypeRef::Declared { name, .. } = &method.return_type
            && !qualified
            && let Some(returned) = self.bindings.lookup(name)?
        {
            match &returned.kind {
                TypeKind::Subcomponent(_) => {
                    return Ok(ComponentMethod::ChildFactory(
                        returned.name.as_str().into(),
                        method.parameters.iter().map(|p| p.ty.clone()).collect(),
                    ));
                }
                TypeKind::Creator { component: child } if self.is_subcomponent(child)? => {
                    if !method.parameters.is_empty() {
                        return Err(BindscopeError::malformed(
                            element,
                            "subcomponent creator methods cannot have parameters",
                        ));
                    }
                    let request = keys.request(&method.return_type, &method.annotations, element.clone())?;
                    return Ok(ComponentMethod::ChildCreator(child.as_str().into(), request));
                }
                _ => {}
            }
        }

        match method.parameters.as_slice() {
            [] => {
                if method.return_type.is_void() {
                    return Err(BindscopeError::malformed(
                        element,
                        "component methods cannot be void",
                    ));
                }
                let request = keys.request(&method.return_type, &method.annotations, element.clone())?;
                if request.kind.is_production_only() && !production {
                    return Err(BindscopeError::malformed(
                        element,
                        format!("{} may only be requested from production components", request.kind),
                    ));
                }
                Ok(ComponentMethod::EntryPoint(request))
            }
            [param] => {
                if !method.return_type.is_void() && method.return_type != param.ty {
                    return Err(BindscopeError::malformed(
                        element,
                        "members injection methods must return void or the parameter type",
                    ));
                }
                let key = Key::new(canonical_type(&param.ty));
                Ok(ComponentMethod::EntryPoint(
                    DependencyRequest::new(key, RequestKind::MembersInjection).at(element.clone()),
                ))
            }
            _ => Err(BindscopeError::malformed(
                element,
                format!("component method of {} has too many parameters", component),
            )),
        }
    }

    fn is_subcomponent(&self, name: &str) -> Result<bool> {
        Ok(self
            .bindings
            .lookup(name)?
            .is_some_and(TypeDeclaration::is_subcomponent))
    }

    /// `name` and every component it transitively depends on, in discovery order.
    pub fn dependency_components(&self, name: &str) -> Result<Vec<DependencyComponent>> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([name.to_string()]);
        let mut result = Vec::new();
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let Some(decl) = self.bindings.lookup(&current)? else {
                continue;
            };
            let dependencies: Vec<SmolStr> = decl
                .component()
                .map(|c| c.dependencies.iter().map(|d| SmolStr::from(d.as_str())).collect())
                .unwrap_or_default();
            queue.extend(dependencies.iter().map(|d| d.to_string()));
            result.push(DependencyComponent {
                name: decl.name.as_str().into(),
                scopes: decl
                    .annotations
                    .iter()
                    .filter(|a| self.bindings.repository().is_scope(&a.type_name))
                    .map(|a| Scope::new(a.type_name.as_str()))
                    .collect(),
                dependencies,
                is_component: matches!(decl.kind, TypeKind::Component(_)),
                production: decl.component().is_some_and(|c| c.production),
            });
        }
        Ok(result)
    }
}

enum ComponentMethod {
    EntryPoint(DependencyRequest),
    ChildFactory(SmolStr, Vec<TypeRef>),
    ChildCreator(SmolStr, DependencyRequest),
}

/// No-arg, non-void methods of a dependency type provide bindings.
fn is_contribution_method(method: &MethodDeclaration) -> bool {
    method.parameters.is_empty() && !method.return_type.is_void() && !method.is_static
}
