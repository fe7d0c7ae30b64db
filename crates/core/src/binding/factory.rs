//! Turns declarations into [`Binding`] values.
//!
//! Every method here is a pure function of the repository state and its
//! arguments, so resolving the same declaration twice yields equal bindings.

use super::keys::{KeyFactory, canonical_type, check_resolved, is_nullable};
use crate::error::{BindscopeError, Result};
use bindscope_api::{
    Binding, BindingKind, DependencyRequest, ElementRef, Key, RequestKind, TypeRef, frameworks,
};
use bindscope_plugin::{
    DeclarationRepository, Lookup, MethodDeclaration, ParameterDeclaration, TypeDeclaration,
    TypeKind,
};
use smol_str::SmolStr;
use std::collections::HashMap;
use std::sync::Arc;

pub struct BindingFactory<'a> {
    repo: &'a dyn DeclarationRepository,
    keys: KeyFactory<'a>,
}

/// Element for a method, listing the simple names of its parameter types.
pub fn method_element(enclosing: &str, method: &MethodDeclaration) -> ElementRef {
    ElementRef::method(
        enclosing,
        method.name.as_str(),
        method
            .parameters
            .iter()
            .map(|p| SmolStr::from(p.ty.simple_name()))
            .collect(),
    )
}

impl<'a> BindingFactory<'a> {
    pub fn new(repo: &'a dyn DeclarationRepository) -> Self {
        Self {
            repo,
            keys: KeyFactory::new(repo),
        }
    }

    pub fn keys(&self) -> &KeyFactory<'a> {
        &self.keys
    }

    pub fn repository(&self) -> &'a dyn DeclarationRepository {
        self.repo
    }

    /// Looks up a type, turning "not generated yet" into a deferral error.
    pub fn lookup(&self, name: &str) -> Result<Option<&'a TypeDeclaration>> {
        match self.repo.type_declaration(name) {
            Lookup::Found(decl) => Ok(Some(decl)),
            Lookup::Missing => Ok(None),
            Lookup::NotYetGenerated => Err(BindscopeError::NotYetAvailable(name.to_string())),
        }
    }

    /// Requests for each parameter of a method (or constructor when `method` is `None`).
    pub fn parameter_requests(
        &self,
        enclosing: &str,
        method: Option<&str>,
        parameters: &[ParameterDeclaration],
        substitutions: &HashMap<SmolStr, TypeRef>,
    ) -> Result<Vec<DependencyRequest>> {
        let arity = parameters.len();
        parameters
            .iter()
            .enumerate()
            .map(|(index, param)| {
                let element = ElementRef::parameter(
                    enclosing,
                    method.map(SmolStr::from),
                    param.name.as_str(),
                    index,
                    arity,
                );
                self.keys
                    .request(&param.ty.substitute(substitutions), &param.annotations, element)
            })
            .collect()
    }

    // ---- Implicit bindings ----

    /// Resolves the class named by an unqualified key to its `@Inject` constructor.
    ///
    /// Returns `Ok(None)` when the key is not a valid implicit provision key or the
    /// class has no `@Inject` constructor.
    pub fn injection_binding(&self, key: &Key) -> Result<Option<Binding>> {
        let Some((decl, substitutions)) = self.injectable_class(key)? else {
            return Ok(None);
        };
        let mut inject_constructors = decl
            .constructors
            .iter()
            .filter(|c| bindscope_plugin::has_annotation(&c.annotations, frameworks::INJECT));
        let Some(constructor) = inject_constructors.next() else {
            return Ok(None);
        };
        let element = ElementRef::constructor(
            decl.name.as_str(),
            constructor
                .parameters
                .iter()
                .map(|p| SmolStr::from(p.ty.simple_name()))
                .collect(),
        );
        if inject_constructors.next().is_some() {
            return Err(BindscopeError::malformed(
                &element,
                "types may only contain one @Inject constructor",
            ));
        }
        if constructor.is_private {
            return Err(BindscopeError::malformed(
                &element,
                "@Inject constructors may not be private",
            ));
        }

        let mut dependencies =
            self.parameter_requests(&decl.name, None, &constructor.parameters, &substitutions)?;
        dependencies.extend(self.injection_site_requests(decl, &substitutions)?.1);

        let scope = self
            .keys
            .scope(&decl.annotations, &ElementRef::of_type(decl.name.as_str()))?;
        Ok(Some(
            Binding::new(
                Key::new(canonical_type(&key.ty)),
                BindingKind::Injection {
                    constructor: element,
                },
            )
            .with_dependencies(dependencies)
            .with_scope(scope),
        ))
    }

    /// `@Inject` fields and methods of `T` and its supertypes.
    pub fn members_injection_binding(&self, key: &Key) -> Result<Option<Binding>> {
        let TypeRef::Declared { name, args } = &key.ty else {
            return Ok(None);
        };
        let Some(decl) = self.lookup(name)? else {
            return Ok(None);
        };
        let substitutions = substitutions_for(decl, args);
        let (sites, dependencies) = self.injection_site_requests(decl, &substitutions)?;
        Ok(Some(
            Binding::new(
                key.clone(),
                BindingKind::MembersInjection {
                    injection_sites: sites,
                },
            )
            .with_dependencies(dependencies),
        ))
    }

    pub fn has_injection_sites(&self, key: &Key) -> bool {
        matches!(
            self.members_injection_binding(key),
            Ok(Some(Binding { kind: BindingKind::MembersInjection { ref injection_sites }, .. }))
                if !injection_sites.is_empty()
        )
    }

    /// Unqualified, concrete, fully parameterized class keys may be satisfied by
    /// an `@Inject` constructor.
    pub fn is_valid_implicit_provision_key(&self, key: &Key) -> bool {
        matches!(self.injectable_class(key), Ok(Some(_)))
    }

    fn injectable_class(
        &self,
        key: &Key,
    ) -> Result<Option<(&'a TypeDeclaration, HashMap<SmolStr, TypeRef>)>> {
        if key.qualifier.is_some() || key.is_contribution() {
            return Ok(None);
        }
        let TypeRef::Declared { name, args } = &key.ty else {
            return Ok(None);
        };
        if is_framework_type(&key.ty) {
            return Ok(None);
        }
        let Some(decl) = self.lookup(name)? else {
            return Ok(None);
        };
        if !matches!(decl.kind, TypeKind::Class) || decl.is_abstract {
            return Ok(None);
        }
        // Raw references to generic classes cannot be instantiated.
        if decl.type_parameters.len() != args.len() {
            return Ok(None);
        }
        Ok(Some((decl, substitutions_for(decl, args))))
    }

    fn injection_site_requests(
        &self,
        decl: &TypeDeclaration,
        substitutions: &HashMap<SmolStr, TypeRef>,
    ) -> Result<(Vec<ElementRef>, Vec<DependencyRequest>)> {
        let mut hierarchy: Vec<&TypeDeclaration> = Vec::new();
        for supertype in self.repo.supertypes(&decl.name).iter().rev() {
            if let Some(sup) = self.lookup(supertype.name())? {
                hierarchy.push(sup);
            }
        }
        hierarchy.push(decl);

        let mut sites = Vec::new();
        let mut requests = Vec::new();
        for ty in hierarchy {
            for field in &ty.fields {
                if !bindscope_plugin::has_annotation(&field.annotations, frameworks::INJECT) {
                    continue;
                }
                let element = ElementRef::field(ty.name.as_str(), field.name.as_str());
                sites.push(element.clone());
                requests.push(self.keys.request(
                    &field.ty.substitute(substitutions),
                    &field.annotations,
                    element,
                )?);
            }
            for method in &ty.methods {
                if !bindscope_plugin::has_annotation(&method.annotations, frameworks::INJECT) {
                    continue;
                }
                sites.push(method_element(&ty.name, method));
                requests.extend(self.parameter_requests(
                    &ty.name,
                    Some(&method.name),
                    &method.parameters,
                    substitutions,
                )?);
            }
        }
        Ok((sites, requests))
    }

    // ---- Component-level bindings ----

    pub fn component_binding(&self, component: &str) -> Binding {
        Binding::new(
            Key::new(TypeRef::declared(component)),
            BindingKind::ComponentInstance {
                component: component.into(),
            },
        )
    }

    pub fn component_dependency_binding(&self, dependency: &str) -> Binding {
        Binding::new(
            Key::new(TypeRef::declared(dependency)),
            BindingKind::ComponentDependency {
                dependency: dependency.into(),
            },
        )
    }

    /// A no-arg method of a component dependency, e.g. `AppComponent.clock()`.
    pub fn component_provision_binding(
        &self,
        dependency: &str,
        method: &MethodDeclaration,
    ) -> Result<Binding> {
        let element = method_element(dependency, method);
        let key = self.keys.key(&method.return_type, &method.annotations, &element)?;
        let nullable = !method.return_type.is_primitive() && is_nullable(&method.annotations);
        Ok(Binding::new(
            key,
            BindingKind::ComponentProvision {
                method: element,
                dependency: dependency.into(),
            },
        )
        .with_nullable(nullable))
    }

    /// A `@BindsInstance` parameter of a creator method.
    pub fn bound_instance_binding(
        &self,
        creator: &str,
        method: &MethodDeclaration,
        index: usize,
    ) -> Result<Binding> {
        let param = &method.parameters[index];
        let element = ElementRef::parameter(
            creator,
            Some(method.name.as_str().into()),
            param.name.as_str(),
            index,
            method.parameters.len(),
        );
        // Builder setters may carry the qualifier on the method instead of the parameter.
        let mut annotations = param.annotations.clone();
        annotations.extend(method.annotations.iter().cloned());
        let key = self.keys.key(&param.ty, &annotations, &element)?;
        let nullable = !param.ty.is_primitive() && is_nullable(&annotations);
        Ok(Binding::new(key, BindingKind::BoundInstance { element }).with_nullable(nullable))
    }

    pub fn subcomponent_creator_binding(&self, key: &Key, subcomponent: &str) -> Binding {
        Binding::new(
            key.clone(),
            BindingKind::SubcomponentCreator {
                subcomponent: subcomponent.into(),
            },
        )
    }

    // ---- Synthetic bindings ----

    /// The aggregate of `contributions` for a `Set` or `Map` request.
    ///
    /// For `Map<K, Provider<V>>` style requests each contribution is requested
    /// through the same framework wrapper.
    pub fn multibound_binding(&self, key: &Key, contributions: &[Arc<Binding>]) -> Binding {
        let (kind, request_kind) = match key.ty.map_entry() {
            Some((_, value)) => (BindingKind::MultiboundMap, RequestKind::extract(value).0),
            None => (BindingKind::MultiboundSet, RequestKind::Instance),
        };
        let dependencies = contributions
            .iter()
            .map(|c| DependencyRequest::new(c.key.clone(), request_kind))
            .collect();
        Binding::new(key.clone(), kind).with_dependencies(dependencies)
    }

    /// `Optional<T>` for a key with `@BindsOptionalOf` declarations.
    ///
    /// `underlying` is the request for `T` when something binds it.
    pub fn optional_binding(&self, key: &Key, underlying: Option<DependencyRequest>) -> Binding {
        match underlying {
            Some(request) => {
                Binding::new(key.clone(), BindingKind::OptionalPresent).with_dependencies(vec![request])
            }
            None => Binding::new(key.clone(), BindingKind::OptionalAbsent),
        }
    }

    pub fn members_injector_binding(&self, key: &Key, target: &TypeRef) -> Binding {
        Binding::new(key.clone(), BindingKind::MembersInjector).with_dependencies(vec![
            DependencyRequest::new(Key::new(target.clone()), RequestKind::MembersInjection),
        ])
    }

    /// Rejects unresolved types anywhere in a method signature.
    pub fn check_signature(&self, element: &ElementRef, method: &MethodDeclaration) -> Result<()> {
        check_resolved(&method.return_type, element)?;
        for param in &method.parameters {
            check_resolved(&param.ty, element)?;
        }
        Ok(())
    }
}

fn substitutions_for(decl: &TypeDeclaration, args: &[TypeRef]) -> HashMap<SmolStr, TypeRef> {
    decl.type_parameters
        .iter()
        .zip(args)
        .map(|(param, arg)| (SmolStr::from(param.as_str()), arg.clone()))
        .collect()
}

fn is_framework_type(ty: &TypeRef) -> bool {
    [
        frameworks::PROVIDER,
        frameworks::LAZY,
        frameworks::PRODUCER,
        frameworks::PRODUCED,
        frameworks::FUTURE,
        frameworks::MEMBERS_INJECTOR,
        frameworks::OPTIONAL,
        frameworks::SET,
        frameworks::MAP,
    ]
    .iter()
    .any(|names| ty.is(names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindscope_plugin::InMemoryRepository;
    use bindscope_plugin::testing::*;

    fn repo() -> InMemoryRepository {
        InMemoryRepository::new()
            .with(
                class("Cache")
                    .scoped("Singleton")
                    .inject_constructor(&[("client", "HttpClient"), ("clock", "Provider<Clock>")])
                    .build(),
            )
            .and_then(|r| r.with(class("Holder").type_parameter("T").inject_constructor(&[("value", "T")]).build()))
            .and_then(|r| r.with(interface("Api").build()))
            .and_then(|r| r.with(class("Plain").constructor(&[]).build()))
            .and_then(|r| {
                r.with(
                    class("Activity")
                        .supertype("BaseActivity")
                        .inject_field("presenter", "Presenter")
                        .build(),
                )
            })
            .and_then(|r| r.with(class("BaseActivity").inject_field("logger", "Logger").build()))
            .unwrap()
    }

    #[test]
    fn test_injection_binding() {
        let repo = repo();
        let factory = BindingFactory::new(&repo);
        let binding = factory
            .injection_binding(&Key::new(TypeRef::declared("Cache")))
            .unwrap()
            .unwrap();
        assert_eq!(binding.scope.as_ref().map(|s| s.to_string()).as_deref(), Some("@Singleton"));
        let kinds: Vec<_> = binding.dependencies.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![RequestKind::Instance, RequestKind::Provider]);
        assert_eq!(binding.dependencies[1].key, Key::new(TypeRef::declared("Clock")));
        assert_eq!(
            binding.dependencies[0].element.as_ref().map(|e| e.to_string()).as_deref(),
            Some("Cache(client, …)")
        );
    }

    #[test]
    fn test_injection_binding_is_idempotent() {
        let repo = repo();
        let factory = BindingFactory::new(&repo);
        let key = Key::new(TypeRef::declared("Cache"));
        assert_eq!(
            factory.injection_binding(&key).unwrap(),
            factory.injection_binding(&key).unwrap()
        );
    }

    #[test]
    fn test_generic_injection_binding_substitutes_arguments() {
        let repo = repo();
        let factory = BindingFactory::new(&repo);
        let binding = factory
            .injection_binding(&Key::new(TypeRef::parse("Holder<Foo>").unwrap()))
            .unwrap()
            .unwrap();
        assert_eq!(binding.dependencies[0].key, Key::new(TypeRef::declared("Foo")));
        // A raw reference is not injectable.
        assert!(factory
            .injection_binding(&Key::new(TypeRef::declared("Holder")))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_no_implicit_binding_for_interfaces_or_plain_classes() {
        let repo = repo();
        let factory = BindingFactory::new(&repo);
        assert!(!factory.is_valid_implicit_provision_key(&Key::new(TypeRef::declared("Api"))));
        assert!(factory.is_valid_implicit_provision_key(&Key::new(TypeRef::declared("Plain"))));
        assert!(factory
            .injection_binding(&Key::new(TypeRef::declared("Plain")))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_members_injection_includes_supertype_sites_first() {
        let repo = repo();
        let factory = BindingFactory::new(&repo);
        let key = Key::new(TypeRef::declared("Activity"));
        let binding = factory.members_injection_binding(&key).unwrap().unwrap();
        let keys: Vec<_> = binding.dependencies.iter().map(|d| d.key.to_string()).collect();
        assert_eq!(keys, vec!["Logger", "Presenter"]);
        assert!(factory.has_injection_sites(&key));
    }

    #[test]
    fn test_pending_type_defers() {
        let mut repo = repo();
        repo.mark_pending("Generated");
        let factory = BindingFactory::new(&repo);
        let err = factory
            .injection_binding(&Key::new(TypeRef::declared("Generated")))
            .unwrap_err();
        assert!(matches!(err, BindscopeError::NotYetAvailable(_)));
    }
}
