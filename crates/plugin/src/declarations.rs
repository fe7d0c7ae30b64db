//! Source-level declarations as supplied by a [`DeclarationRepository`].
//!
//! This mirrors what an annotation processor sees through its reflection
//! layer: types, their members and the annotations on each element. Nothing in
//! here is interpreted yet; the binding factory turns declarations into
//! bindings.
//!
//! [`DeclarationRepository`]: crate::DeclarationRepository

use bindscope_api::TypeRef;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, JsonSchema)]
pub struct Annotation {
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Annotation {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            value: None,
        }
    }

    pub fn with_value(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            value: Some(value.into()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct ParameterDeclaration {
    pub name: String,
    pub ty: TypeRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct MethodDeclaration {
    pub name: String,
    #[serde(default = "void_type")]
    pub return_type: TypeRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub is_static: bool,
}

fn void_type() -> TypeRef {
    TypeRef::Primitive("void".into())
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, JsonSchema)]
pub struct ConstructorDeclaration {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub is_private: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct FieldDeclaration {
    pub name: String,
    pub ty: TypeRef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
}

/// `@Module(includes = ..., subcomponents = ...)`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, JsonSchema)]
pub struct ModuleAnnotation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subcomponents: Vec<String>,
    /// `@ProducerModule`
    #[serde(default)]
    pub producer: bool,
}

/// `@Component`, `@Subcomponent` and their producer counterparts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, JsonSchema)]
pub struct ComponentAnnotation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<String>,
    /// Component dependencies; always empty on subcomponents.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Name of the nested `@Component.Builder` / `@Component.Factory` type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default)]
    pub production: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    Interface,
    /// An annotation type; its own annotations mark it as a qualifier, scope or map key.
    Annotation,
    Module(ModuleAnnotation),
    Component(ComponentAnnotation),
    Subcomponent(ComponentAnnotation),
    /// A builder or factory for `component`.
    Creator { component: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct TypeDeclaration {
    pub name: String,
    pub kind: TypeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supertypes: Vec<TypeRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constructors: Vec<ConstructorDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodDeclaration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDeclaration>,
    #[serde(default)]
    pub is_abstract: bool,
}

impl TypeDeclaration {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            annotations: Vec::new(),
            supertypes: Vec::new(),
            type_parameters: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            is_abstract: false,
        }
    }

    pub fn has_annotation(&self, candidates: &[&str]) -> bool {
        has_annotation(&self.annotations, candidates)
    }

    pub fn module(&self) -> Option<&ModuleAnnotation> {
        match &self.kind {
            TypeKind::Module(module) => Some(module),
            _ => None,
        }
    }

    /// The component annotation for both root components and subcomponents.
    pub fn component(&self) -> Option<&ComponentAnnotation> {
        match &self.kind {
            TypeKind::Component(component) | TypeKind::Subcomponent(component) => Some(component),
            _ => None,
        }
    }

    pub fn is_subcomponent(&self) -> bool {
        matches!(self.kind, TypeKind::Subcomponent(_))
    }

    /// A type without declared constructors gets an implicit visible no-arg one.
    pub fn has_visible_default_constructor(&self) -> bool {
        self.constructors.is_empty()
            || self
                .constructors
                .iter()
                .any(|c| c.parameters.is_empty() && !c.is_private)
    }
}

pub fn has_annotation(annotations: &[Annotation], candidates: &[&str]) -> bool {
    annotations
        .iter()
        .any(|a| candidates.contains(&a.type_name.as_str()))
}
