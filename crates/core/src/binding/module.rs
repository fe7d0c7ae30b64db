//! Bindings and declarations contributed by a single `@Module`.

use super::factory::{BindingFactory, method_element};
use super::keys::{canonical_type, is_nullable};
use crate::error::{BindscopeError, Result};
use bindscope_api::{
    Binding, BindingKind, ContributionId, ContributionType, ElementRef, Key, MapKey, RequestKind,
    Scope, TypeRef, frameworks,
};
use bindscope_plugin::{MethodDeclaration, TypeDeclaration, TypeKind, has_annotation};
use smol_str::SmolStr;
use std::collections::HashMap;

/// A declaration that shapes resolution without being a binding itself:
/// `@Multibinds` and `@BindsOptionalOf` methods.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Declaration {
    pub key: Key,
    pub element: ElementRef,
    pub module: SmolStr,
}

/// A subcomponent listed in `@Module(subcomponents = ...)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubcomponentDeclaration {
    /// Key of the subcomponent's creator.
    pub key: Key,
    pub subcomponent: SmolStr,
    pub module: SmolStr,
}

/// A declaration that was skipped because it is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedDeclaration {
    pub element: ElementRef,
    pub message: String,
}

impl MalformedDeclaration {
    pub fn new(element: ElementRef, error: &BindscopeError) -> Self {
        Self {
            element,
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    pub name: SmolStr,
    pub includes: Vec<SmolStr>,
    pub bindings: Vec<Binding>,
    pub multibinding_declarations: Vec<Declaration>,
    pub optional_declarations: Vec<Declaration>,
    pub subcomponent_declarations: Vec<SubcomponentDeclaration>,
    /// Non-static `@Provides`/`@Produces` methods.
    pub instance_binding_methods: Vec<ElementRef>,
    pub is_abstract: bool,
    pub has_visible_default_constructor: bool,
    pub producer: bool,
    pub malformed: Vec<MalformedDeclaration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MethodRole {
    Provides,
    Produces,
    Binds,
    Multibinds,
    BindsOptionalOf,
}

impl ModuleDescriptor {
    /// Reads every binding method of `decl`.
    ///
    /// Malformed methods are recorded in [`ModuleDescriptor::malformed`] and
    /// skipped; only a deferral or an internal error fails the whole module.
    pub fn create(factory: &BindingFactory<'_>, decl: &TypeDeclaration) -> Result<Self> {
        let TypeKind::Module(annotation) = &decl.kind else {
            return Err(BindscopeError::Internal(format!(
                "{} is not a module",
                decl.name
            )));
        };
        let name = SmolStr::from(decl.name.as_str());
        let mut module = ModuleDescriptor {
            name: name.clone(),
            includes: annotation.includes.iter().map(|i| i.as_str().into()).collect(),
            bindings: Vec::new(),
            multibinding_declarations: Vec::new(),
            optional_declarations: Vec::new(),
            subcomponent_declarations: Vec::new(),
            instance_binding_methods: Vec::new(),
            is_abstract: decl.is_abstract,
            has_visible_default_constructor: decl.has_visible_default_constructor(),
            producer: annotation.producer,
            malformed: Vec::new(),
        };

        for method in &decl.methods {
            let element = method_element(&decl.name, method);
            match module.read_method(factory, method, &element) {
                Ok(()) => {}
                Err(e) if e.is_declaration_error() => {
                    tracing::debug!("skipping malformed declaration {}: {}", element, e);
                    module.malformed.push(MalformedDeclaration::new(element, &e));
                }
                Err(e) => return Err(e),
            }
        }

        for child in &annotation.subcomponents {
            let element = ElementRef::of_type(decl.name.as_str());
            let Some(child_decl) = factory.lookup(child)? else {
                let e = BindscopeError::malformed(
                    &element,
                    format!("{} is not a known subcomponent", child),
                );
                module.malformed.push(MalformedDeclaration::new(element, &e));
                continue;
            };
            let creator = child_decl
                .component()
                .filter(|_| child_decl.is_subcomponent())
                .and_then(|c| c.creator.clone());
            match creator {
                Some(creator) => module.subcomponent_declarations.push(SubcomponentDeclaration {
                    key: Key::new(TypeRef::declared(creator)),
                    subcomponent: child.as_str().into(),
                    module: name.clone(),
                }),
                None => {
                    let e = BindscopeError::malformed(
                        &element,
                        format!(
                            "{} doesn't have a @Subcomponent.Builder or @Subcomponent.Factory, which is required when used with @Module.subcomponents",
                            child
                        ),
                    );
                    module.malformed.push(MalformedDeclaration::new(element, &e));
                }
            }
        }
        Ok(module)
    }

    fn read_method(
        &mut self,
        factory: &BindingFactory<'_>,
        method: &MethodDeclaration,
        element: &ElementRef,
    ) -> Result<()> {
        let roles: Vec<MethodRole> = [
            (frameworks::PROVIDES, MethodRole::Provides),
            (frameworks::PRODUCES, MethodRole::Produces),
            (frameworks::BINDS, MethodRole::Binds),
            (frameworks::MULTIBINDS, MethodRole::Multibinds),
            (frameworks::BINDS_OPTIONAL_OF, MethodRole::BindsOptionalOf),
        ]
        .into_iter()
        .filter(|(names, _)| has_annotation(&method.annotations, names))
        .map(|(_, role)| role)
        .collect();

        let role = match roles.as_slice() {
            [] => return Ok(()),
            [role] => *role,
            _ => {
                return Err(BindscopeError::malformed(
                    element,
                    "is annotated with more than one of (@Provides, @Produces, @Binds, @Multibinds, @BindsOptionalOf)",
                ));
            }
        };
        factory.check_signature(element, method)?;

        match role {
            MethodRole::Provides | MethodRole::Produces => {
                self.read_provision(factory, method, element, role == MethodRole::Produces)
            }
            MethodRole::Binds => self.read_delegate(factory, method, element),
            MethodRole::Multibinds => {
                require_abstract_without_parameters(method, element, "@Multibinds")?;
                let key = factory
                    .keys()
                    .key(&method.return_type, &method.annotations, element)?;
                if !key.is_multibinding_type() {
                    return Err(BindscopeError::malformed(
                        element,
                        "@Multibinds methods must return Map<K, V> or Set<T>",
                    ));
                }
                self.multibinding_declarations.push(Declaration {
                    key,
                    element: element.clone(),
                    module: self.name.clone(),
                });
                Ok(())
            }
            MethodRole::BindsOptionalOf => {
                require_abstract_without_parameters(method, element, "@BindsOptionalOf")?;
                if method.return_type.is_primitive() {
                    return Err(BindscopeError::malformed(
                        element,
                        "@BindsOptionalOf methods cannot return primitives",
                    ));
                }
                let key = factory
                    .keys()
                    .key(&method.return_type, &method.annotations, element)?;
                self.optional_declarations.push(Declaration {
                    key,
                    element: element.clone(),
                    module: self.name.clone(),
                });
                Ok(())
            }
        }
    }

    fn read_provision(
        &mut self,
        factory: &BindingFactory<'_>,
        method: &MethodDeclaration,
        element: &ElementRef,
        production: bool,
    ) -> Result<()> {
        let label = if production { "@Produces" } else { "@Provides" };
        if method.return_type.is_void() {
            return Err(BindscopeError::malformed(
                element,
                format!("{} methods must return a value (not void)", label),
            ));
        }
        if method.is_abstract {
            return Err(BindscopeError::malformed(
                element,
                format!("{} methods cannot be abstract", label),
            ));
        }
        if production && !self.producer {
            return Err(BindscopeError::malformed(
                element,
                "@Produces methods can only be present within a @ProducerModule",
            ));
        }

        let (contribution, map_key) = contribution_of(factory, method, element)?;
        // Producers may return a future of the produced value.
        let provided = if production {
            method
                .return_type
                .unwrap_single(frameworks::FUTURE)
                .cloned()
                .unwrap_or_else(|| method.return_type.clone())
        } else {
            method.return_type.clone()
        };
        let key = contribution_key(factory, &provided, method, element, contribution, map_key.as_ref(), &self.name)?;
        let dependencies = factory.parameter_requests(
            &self.name,
            Some(&method.name),
            &method.parameters,
            &HashMap::new(),
        )?;
        let scope: Option<Scope> = factory.keys().scope(&method.annotations, element)?;
        let requires_module_instance = !method.is_static;
        if requires_module_instance {
            self.instance_binding_methods.push(element.clone());
        }

        let kind = if production {
            BindingKind::Production {
                method: element.clone(),
                module: self.name.clone(),
                contribution,
                map_key,
                requires_module_instance,
            }
        } else {
            BindingKind::Provision {
                method: element.clone(),
                module: self.name.clone(),
                contribution,
                map_key,
                requires_module_instance,
            }
        };
        self.bindings.push(
            Binding::new(key, kind)
                .with_dependencies(dependencies)
                .with_scope(scope)
                .with_nullable(!provided.is_primitive() && is_nullable(&method.annotations)),
        );
        Ok(())
    }

    fn read_delegate(
        &mut self,
        factory: &BindingFactory<'_>,
        method: &MethodDeclaration,
        element: &ElementRef,
    ) -> Result<()> {
        if !method.is_abstract {
            return Err(BindscopeError::malformed(element, "@Binds methods must be abstract"));
        }
        let [param] = method.parameters.as_slice() else {
            return Err(BindscopeError::malformed(
                element,
                "@Binds methods must have exactly one parameter, whose type is assignable to the return type",
            ));
        };
        let (contribution, map_key) = contribution_of(factory, method, element)?;
        let bound = match contribution {
            ContributionType::ElementsIntoSet => method
                .return_type
                .set_element()
                .cloned()
                .unwrap_or_else(|| method.return_type.clone()),
            _ => method.return_type.clone(),
        };
        let source = match contribution {
            ContributionType::ElementsIntoSet => param.ty.set_element(),
            _ => Some(&param.ty),
        };
        // An undeclared source type has no supertypes to check against.
        if let Some(source) = source
            && source.name() != bound.name()
            && matches!(source, TypeRef::Declared { .. })
            && factory.lookup(source.name())?.is_none()
        {
            return Err(BindscopeError::TypeResolution {
                element: element.to_string(),
                ty: source.to_string(),
            });
        }
        let assignable = source.is_some_and(|source| factory.repository().is_assignable(source, &bound));
        if !assignable {
            return Err(BindscopeError::malformed(
                element,
                "@Binds methods' parameter type must be assignable to the return type",
            ));
        }

        let key = contribution_key(factory, &method.return_type, method, element, contribution, map_key.as_ref(), &self.name)?;
        let dependencies = factory.parameter_requests(
            &self.name,
            Some(&method.name),
            &method.parameters,
            &HashMap::new(),
        )?;
        if dependencies.iter().any(|d| d.kind != RequestKind::Instance) {
            return Err(BindscopeError::malformed(
                element,
                "@Binds methods may not bind framework types",
            ));
        }
        let scope = factory.keys().scope(&method.annotations, element)?;
        self.bindings.push(
            Binding::new(
                key,
                BindingKind::Delegate {
                    method: element.clone(),
                    module: self.name.clone(),
                    contribution,
                    map_key,
                },
            )
            .with_dependencies(dependencies)
            .with_scope(scope)
            .with_nullable(is_nullable(&method.annotations)),
        );
        Ok(())
    }

    /// Every key this module binds or declares, with contribution ids stripped.
    pub fn binding_keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self
            .bindings
            .iter()
            .map(|b| b.key.without_contribution())
            .collect();
        keys.extend(self.multibinding_declarations.iter().map(|d| d.key.clone()));
        keys.extend(self.optional_declarations.iter().map(|d| {
            d.key
                .with_type(TypeRef::generic(frameworks::OPTIONAL[0], vec![d.key.ty.clone()]))
        }));
        keys.extend(self.subcomponent_declarations.iter().map(|d| d.key.clone()));
        let mut seen = std::collections::HashSet::new();
        keys.retain(|k| seen.insert(k.clone()));
        keys
    }
}

fn require_abstract_without_parameters(
    method: &MethodDeclaration,
    element: &ElementRef,
    label: &str,
) -> Result<()> {
    if !method.is_abstract {
        return Err(BindscopeError::malformed(
            element,
            format!("{} methods must be abstract", label),
        ));
    }
    if !method.parameters.is_empty() {
        return Err(BindscopeError::malformed(
            element,
            format!("{} methods cannot have parameters", label),
        ));
    }
    Ok(())
}

fn contribution_of(
    factory: &BindingFactory<'_>,
    method: &MethodDeclaration,
    element: &ElementRef,
) -> Result<(ContributionType, Option<MapKey>)> {
    let mut kinds = Vec::new();
    if has_annotation(&method.annotations, frameworks::INTO_SET) {
        kinds.push(ContributionType::IntoSet);
    }
    if has_annotation(&method.annotations, frameworks::ELEMENTS_INTO_SET) {
        kinds.push(ContributionType::ElementsIntoSet);
    }
    if has_annotation(&method.annotations, frameworks::INTO_MAP) {
        kinds.push(ContributionType::IntoMap);
    }
    let contribution = match kinds.as_slice() {
        [] => ContributionType::Unique,
        [kind] => *kind,
        _ => {
            return Err(BindscopeError::malformed(
                element,
                "cannot have more than one multibinding annotation",
            ));
        }
    };

    let map_keys: Vec<MapKey> = method
        .annotations
        .iter()
        .filter(|a| factory.repository().is_map_key(&a.type_name))
        .map(|a| MapKey {
            annotation: a.type_name.as_str().into(),
            value: a.value.as_deref().unwrap_or_default().into(),
        })
        .collect();
    match (contribution, map_keys.len()) {
        (ContributionType::IntoMap, 0) => Err(BindscopeError::malformed(
            element,
            "@IntoMap methods must have a @MapKey annotation",
        )),
        (ContributionType::IntoMap, 1) => Ok((contribution, map_keys.into_iter().next())),
        (ContributionType::IntoMap, _) => Err(BindscopeError::malformed(
            element,
            "may not have more than one map key",
        )),
        (_, 0) => Ok((contribution, None)),
        (_, _) => Err(BindscopeError::malformed(
            element,
            "@MapKey annotations are only allowed on @IntoMap methods",
        )),
    }
}

/// Type of the key produced by a `@MapKey` annotation.
fn map_key_type(factory: &BindingFactory<'_>, map_key: &MapKey) -> Result<TypeRef> {
    let builtin = match frameworks::simple_name(&map_key.annotation) {
        "StringKey" => Some("String"),
        "IntKey" => Some("Integer"),
        "LongKey" => Some("Long"),
        "ClassKey" => Some("Class<?>"),
        _ => None,
    };
    if let Some(builtin) = builtin {
        return TypeRef::parse(builtin).map_err(|e| BindscopeError::Internal(e.to_string()));
    }
    // A custom map key unwraps to the type of its single `value()` member.
    Ok(factory
        .lookup(&map_key.annotation)?
        .and_then(|decl| decl.methods.first())
        .map(|m| m.return_type.clone())
        .unwrap_or_else(|| TypeRef::declared(map_key.annotation.clone())))
}

fn contribution_key(
    factory: &BindingFactory<'_>,
    provided: &TypeRef,
    method: &MethodDeclaration,
    element: &ElementRef,
    contribution: ContributionType,
    map_key: Option<&MapKey>,
    module: &SmolStr,
) -> Result<Key> {
    let key = factory.keys().key(provided, &method.annotations, element)?;
    let aggregate = match contribution {
        ContributionType::Unique => return Ok(key),
        ContributionType::IntoSet => TypeRef::generic(frameworks::SET[0], vec![key.ty.clone()]),
        ContributionType::ElementsIntoSet => {
            if key.ty.set_element().is_none() {
                return Err(BindscopeError::malformed(
                    element,
                    "@ElementsIntoSet methods must return a Set",
                ));
            }
            key.ty.clone()
        }
        ContributionType::IntoMap => {
            let Some(map_key) = map_key else {
                return Err(BindscopeError::Internal(format!(
                    "{} is @IntoMap without a map key",
                    element
                )));
            };
            TypeRef::generic(
                frameworks::MAP[0],
                vec![canonical_type(&map_key_type(factory, map_key)?), key.ty.clone()],
            )
        }
    };
    Ok(key.with_type(aggregate).with_contribution(ContributionId {
        module: module.clone(),
        method: method.name.as_str().into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindscope_plugin::InMemoryRepository;
    use bindscope_plugin::testing::*;

    fn create(repo: &InMemoryRepository, name: &str) -> ModuleDescriptor {
        let factory = BindingFactory::new(repo);
        let decl = factory.lookup(name).unwrap().unwrap();
        ModuleDescriptor::create(&factory, decl).unwrap()
    }

    #[test]
    fn test_reads_provides_and_binds() {
        let repo = InMemoryRepository::new()
            .with(
                module("NetModule")
                    .provides("httpClient", "HttpClient", &[("cache", "Provider<Cache>")])
                    .binds("api", "Api", "RealApi")
                    .build(),
            )
            .and_then(|r| r.with(class("RealApi").supertype("Api").build()))
            .unwrap();
        let module = create(&repo, "NetModule");
        assert!(module.malformed.is_empty(), "{:?}", module.malformed);
        assert_eq!(module.bindings.len(), 2);
        let provides = &module.bindings[0];
        assert!(provides.requires_module_instance());
        assert_eq!(provides.dependencies[0].kind, RequestKind::Provider);
        assert_eq!(module.instance_binding_methods.len(), 1);
        let binds = &module.bindings[1];
        assert!(matches!(binds.kind, BindingKind::Delegate { .. }));
        assert_eq!(binds.dependencies[0].key, Key::new(TypeRef::declared("RealApi")));
    }

    #[test]
    fn test_set_contributions_get_distinct_keys() {
        let repo = InMemoryRepository::new()
            .with(
                module("PluginModule")
                    .method(provides("first", "Plugin").annotated("IntoSet").static_method())
                    .method(provides("second", "Plugin").annotated("IntoSet").static_method())
                    .build(),
            )
            .unwrap();
        let module = create(&repo, "PluginModule");
        let [a, b] = module.bindings.as_slice() else {
            panic!("expected two bindings");
        };
        assert_ne!(a.key, b.key);
        assert_eq!(a.key.without_contribution(), b.key.without_contribution());
        assert_eq!(a.key.ty.to_string(), "java.util.Set<Plugin>");
        assert!(!a.requires_module_instance());
        assert_eq!(module.binding_keys().len(), 1);
    }

    #[test]
    fn test_map_contribution_key() {
        let repo = InMemoryRepository::new()
            .with(
                module("HandlerModule")
                    .method(
                        provides("home", "Handler")
                            .annotated("IntoMap")
                            .annotated_with("StringKey", "/"),
                    )
                    .build(),
            )
            .unwrap();
        let module = create(&repo, "HandlerModule");
        let binding = &module.bindings[0];
        assert_eq!(binding.key.ty.to_string(), "java.util.Map<String, Handler>");
        assert_eq!(binding.map_key().map(|k| k.value.as_str()), Some("/"));
    }

    #[test]
    fn test_malformed_methods_are_skipped() {
        let repo = InMemoryRepository::new()
            .with(
                module("BadModule")
                    .method(provides("nothing", "void"))
                    .method(provides("both", "Foo").annotated("Binds"))
                    .method(provides("missingKey", "Foo").annotated("IntoMap"))
                    .method(binds("notAssignable", "Api", "Unrelated"))
                    .provides("fine", "Foo", &[])
                    .build(),
            )
            .unwrap();
        let module = create(&repo, "BadModule");
        assert_eq!(module.malformed.len(), 4);
        assert_eq!(module.bindings.len(), 1);
    }

    #[test]
    fn test_binds_to_undeclared_type() {
        let mut repo = InMemoryRepository::new()
            .with(module("NetModule").binds("api", "Api", "RealApi").build())
            .unwrap();
        let module = create(&repo, "NetModule");
        assert!(module.bindings.is_empty());
        assert_eq!(module.malformed.len(), 1);
        assert!(
            module.malformed[0].message.ends_with("RealApi could not be resolved"),
            "{}",
            module.malformed[0].message
        );

        repo.mark_pending("RealApi");
        let factory = BindingFactory::new(&repo);
        let decl = factory.lookup("NetModule").unwrap().unwrap();
        assert!(matches!(
            ModuleDescriptor::create(&factory, decl),
            Err(BindscopeError::NotYetAvailable(name)) if name == "RealApi"
        ));
    }

    #[test]
    fn test_declarations() {
        let repo = InMemoryRepository::new()
            .with(
                module("DeclModule")
                    .method(method("plugins", "Set<Plugin>").annotated("Multibinds").abstract_method())
                    .method(method("tracer", "Tracer").annotated("BindsOptionalOf").abstract_method())
                    .declares_subcomponent("Child")
                    .build(),
            )
            .and_then(|r| r.with(subcomponent("Child").with_creator("Child.Builder").build()))
            .unwrap();
        let module = create(&repo, "DeclModule");
        assert_eq!(module.multibinding_declarations.len(), 1);
        assert_eq!(module.optional_declarations[0].key, Key::new(TypeRef::declared("Tracer")));
        assert_eq!(module.subcomponent_declarations[0].key, Key::new(TypeRef::declared("Child.Builder")));
        let keys: Vec<_> = module.binding_keys().iter().map(|k| k.to_string()).collect();
        assert!(keys.contains(&"java.util.Optional<Tracer>".to_string()));
    }
}
