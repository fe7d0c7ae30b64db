use super::element::ElementRef;
use super::key::Key;
use super::request::DependencyRequest;
use super::scope::Scope;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// How a declaration contributes to its key.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContributionType {
    Unique,
    IntoSet,
    ElementsIntoSet,
    IntoMap,
}

impl ContributionType {
    pub fn is_multibinding(self) -> bool {
        !matches!(self, ContributionType::Unique)
    }

    pub fn is_set(self) -> bool {
        matches!(self, ContributionType::IntoSet | ContributionType::ElementsIntoSet)
    }
}

/// The `@MapKey`-annotated annotation on an `@IntoMap` contribution.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
pub struct MapKey {
    #[schemars(with = "String")]
    pub annotation: SmolStr,
    #[schemars(with = "String")]
    pub value: SmolStr,
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "@{}({})",
            super::frameworks::simple_name(&self.annotation),
            self.value
        )
    }
}

/// The declaration-specific part of a [`Binding`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// An `@Inject` constructor.
    Injection { constructor: ElementRef },
    /// An `@Provides` method.
    Provision {
        method: ElementRef,
        module: SmolStr,
        contribution: ContributionType,
        map_key: Option<MapKey>,
        requires_module_instance: bool,
    },
    /// An `@Produces` method.
    Production {
        method: ElementRef,
        module: SmolStr,
        contribution: ContributionType,
        map_key: Option<MapKey>,
        requires_module_instance: bool,
    },
    /// An `@Binds` method; its single dependency is the bound implementation.
    Delegate {
        method: ElementRef,
        module: SmolStr,
        contribution: ContributionType,
        map_key: Option<MapKey>,
    },
    /// The union of every `Set<T>` contribution visible in a component.
    MultiboundSet,
    /// The union of every `Map<K, V>` contribution visible in a component.
    MultiboundMap,
    /// An instance passed to a component creator through `@BindsInstance`.
    BoundInstance { element: ElementRef },
    /// The component itself.
    ComponentInstance { component: SmolStr },
    /// A component dependency passed to the creator.
    ComponentDependency { dependency: SmolStr },
    /// A provision method of a component dependency.
    ComponentProvision { method: ElementRef, dependency: SmolStr },
    /// The builder or factory of a module-declared subcomponent.
    SubcomponentCreator { subcomponent: SmolStr },
    /// `Optional<T>` where `T` has a binding.
    OptionalPresent,
    /// `Optional<T>` where nothing binds `T`.
    OptionalAbsent,
    /// Field and method injection into an existing instance.
    MembersInjection { injection_sites: Vec<ElementRef> },
    /// `MembersInjector<T>`, delegating to the members injection of `T`.
    MembersInjector,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BindingKind::Injection { .. } => "@Inject constructor",
            BindingKind::Provision { .. } => "@Provides method",
            BindingKind::Production { .. } => "@Produces method",
            BindingKind::Delegate { .. } => "@Binds method",
            BindingKind::MultiboundSet => "multibound set",
            BindingKind::MultiboundMap => "multibound map",
            BindingKind::BoundInstance { .. } => "bound instance",
            BindingKind::ComponentInstance { .. } => "component instance",
            BindingKind::ComponentDependency { .. } => "component dependency",
            BindingKind::ComponentProvision { .. } => "component dependency method",
            BindingKind::SubcomponentCreator { .. } => "subcomponent creator",
            BindingKind::OptionalPresent | BindingKind::OptionalAbsent => "optional binding",
            BindingKind::MembersInjection { .. } => "members injection",
            BindingKind::MembersInjector => "members injector",
        };
        f.write_str(label)
    }
}

/// A resolved mechanism that supplies a value for a [`Key`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Binding {
    pub key: Key,
    pub kind: BindingKind,
    pub dependencies: Vec<DependencyRequest>,
    pub scope: Option<Scope>,
    pub nullable: bool,
}

impl Binding {
    pub fn new(key: Key, kind: BindingKind) -> Self {
        Self {
            key,
            kind,
            dependencies: Vec::new(),
            scope: None,
            nullable: false,
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<DependencyRequest>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_scope(mut self, scope: Option<Scope>) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// The source element that declared this binding, if it was declared at all.
    pub fn binding_element(&self) -> Option<&ElementRef> {
        match &self.kind {
            BindingKind::Injection { constructor } => Some(constructor),
            BindingKind::Provision { method, .. }
            | BindingKind::Production { method, .. }
            | BindingKind::Delegate { method, .. }
            | BindingKind::ComponentProvision { method, .. } => Some(method),
            BindingKind::BoundInstance { element } => Some(element),
            BindingKind::MultiboundSet
            | BindingKind::MultiboundMap
            | BindingKind::ComponentInstance { .. }
            | BindingKind::ComponentDependency { .. }
            | BindingKind::SubcomponentCreator { .. }
            | BindingKind::OptionalPresent
            | BindingKind::OptionalAbsent
            | BindingKind::MembersInjection { .. }
            | BindingKind::MembersInjector => None,
        }
    }

    pub fn contributing_module(&self) -> Option<&SmolStr> {
        match &self.kind {
            BindingKind::Provision { module, .. }
            | BindingKind::Production { module, .. }
            | BindingKind::Delegate { module, .. } => Some(module),
            _ => None,
        }
    }

    pub fn contribution_type(&self) -> ContributionType {
        match &self.kind {
            BindingKind::Provision { contribution, .. }
            | BindingKind::Production { contribution, .. }
            | BindingKind::Delegate { contribution, .. } => *contribution,
            _ => ContributionType::Unique,
        }
    }

    pub fn map_key(&self) -> Option<&MapKey> {
        match &self.kind {
            BindingKind::Provision { map_key, .. }
            | BindingKind::Production { map_key, .. }
            | BindingKind::Delegate { map_key, .. } => map_key.as_ref(),
            _ => None,
        }
    }

    pub fn requires_module_instance(&self) -> bool {
        match &self.kind {
            BindingKind::Provision {
                requires_module_instance,
                ..
            }
            | BindingKind::Production {
                requires_module_instance,
                ..
            } => *requires_module_instance,
            _ => false,
        }
    }

    pub fn is_multibinding(&self) -> bool {
        matches!(self.kind, BindingKind::MultiboundSet | BindingKind::MultiboundMap)
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.kind, BindingKind::OptionalPresent | BindingKind::OptionalAbsent)
    }

    pub fn is_production(&self) -> bool {
        matches!(self.kind, BindingKind::Production { .. })
            || self.dependencies.iter().any(|d| d.kind.is_production_only())
    }

    pub fn is_scoped(&self) -> bool {
        self.scope.is_some()
    }
}
