//! Fluent builders for declaration fixtures.
//!
//! Type strings use the [`TypeRef`] textual syntax. Every builder panics on a
//! malformed type string; these helpers exist for tests and hand-written
//! fixtures only.

use crate::declarations::{
    Annotation, ComponentAnnotation, ConstructorDeclaration, FieldDeclaration, MethodDeclaration,
    ModuleAnnotation, ParameterDeclaration, TypeDeclaration, TypeKind,
};
use bindscope_api::TypeRef;

fn ty(input: &str) -> TypeRef {
    match TypeRef::parse(input) {
        Ok(ty) => ty,
        Err(e) => panic!("invalid fixture type: {}", e),
    }
}

fn params(list: &[(&str, &str)]) -> Vec<ParameterDeclaration> {
    list.iter()
        .map(|(name, t)| ParameterDeclaration {
            name: name.to_string(),
            ty: ty(t),
            annotations: Vec::new(),
        })
        .collect()
}

pub struct TypeBuilder {
    decl: TypeDeclaration,
}

pub fn class(name: &str) -> TypeBuilder {
    TypeBuilder::new(name, TypeKind::Class)
}

pub fn interface(name: &str) -> TypeBuilder {
    TypeBuilder::new(name, TypeKind::Interface).abstract_type()
}

pub fn module(name: &str) -> TypeBuilder {
    TypeBuilder::new(name, TypeKind::Module(ModuleAnnotation::default()))
}

pub fn component(name: &str) -> TypeBuilder {
    TypeBuilder::new(name, TypeKind::Component(ComponentAnnotation::default())).abstract_type()
}

pub fn subcomponent(name: &str) -> TypeBuilder {
    TypeBuilder::new(name, TypeKind::Subcomponent(ComponentAnnotation::default())).abstract_type()
}

pub fn creator(name: &str, component: &str) -> TypeBuilder {
    TypeBuilder::new(
        name,
        TypeKind::Creator {
            component: component.to_string(),
        },
    )
    .abstract_type()
}

pub fn scope_annotation(name: &str) -> TypeDeclaration {
    TypeBuilder::new(name, TypeKind::Annotation)
        .annotated("javax.inject.Scope")
        .build()
}

pub fn qualifier_annotation(name: &str) -> TypeDeclaration {
    TypeBuilder::new(name, TypeKind::Annotation)
        .annotated("javax.inject.Qualifier")
        .build()
}

pub fn map_key_annotation(name: &str) -> TypeDeclaration {
    TypeBuilder::new(name, TypeKind::Annotation)
        .annotated("dagger.MapKey")
        .build()
}

impl TypeBuilder {
    pub fn new(name: &str, kind: TypeKind) -> Self {
        Self {
            decl: TypeDeclaration::new(name, kind),
        }
    }

    pub fn annotated(mut self, annotation: &str) -> Self {
        self.decl.annotations.push(Annotation::new(annotation));
        self
    }

    pub fn scoped(self, scope: &str) -> Self {
        self.annotated(scope)
    }

    pub fn supertype(mut self, supertype: &str) -> Self {
        self.decl.supertypes.push(ty(supertype));
        self
    }

    pub fn type_parameter(mut self, name: &str) -> Self {
        self.decl.type_parameters.push(name.to_string());
        self
    }

    pub fn abstract_type(mut self) -> Self {
        self.decl.is_abstract = true;
        self
    }

    /// Installs a module on a component, or includes it from a module.
    pub fn install(mut self, module: &str) -> Self {
        match &mut self.decl.kind {
            TypeKind::Component(c) | TypeKind::Subcomponent(c) => c.modules.push(module.to_string()),
            TypeKind::Module(m) => m.includes.push(module.to_string()),
            _ => panic!("{} cannot install modules", self.decl.name),
        }
        self
    }

    pub fn depends_on(mut self, dependency: &str) -> Self {
        match &mut self.decl.kind {
            TypeKind::Component(c) => c.dependencies.push(dependency.to_string()),
            _ => panic!("{} cannot declare component dependencies", self.decl.name),
        }
        self
    }

    /// `@Module(subcomponents = child)`
    pub fn declares_subcomponent(mut self, child: &str) -> Self {
        match &mut self.decl.kind {
            TypeKind::Module(m) => m.subcomponents.push(child.to_string()),
            _ => panic!("{} is not a module", self.decl.name),
        }
        self
    }

    pub fn with_creator(mut self, creator: &str) -> Self {
        match &mut self.decl.kind {
            TypeKind::Component(c) | TypeKind::Subcomponent(c) => {
                c.creator = Some(creator.to_string())
            }
            _ => panic!("{} is not a component", self.decl.name),
        }
        self
    }

    pub fn production(mut self) -> Self {
        match &mut self.decl.kind {
            TypeKind::Component(c) | TypeKind::Subcomponent(c) => c.production = true,
            TypeKind::Module(m) => m.producer = true,
            _ => panic!("{} cannot be a producer", self.decl.name),
        }
        self
    }

    pub fn constructor(mut self, parameters: &[(&str, &str)]) -> Self {
        self.decl.constructors.push(ConstructorDeclaration {
            parameters: params(parameters),
            annotations: Vec::new(),
            is_private: false,
        });
        self
    }

    pub fn inject_constructor(mut self, parameters: &[(&str, &str)]) -> Self {
        self.decl.constructors.push(ConstructorDeclaration {
            parameters: params(parameters),
            annotations: vec![Annotation::new("javax.inject.Inject")],
            is_private: false,
        });
        self
    }

    pub fn inject_field(mut self, name: &str, field_type: &str) -> Self {
        self.decl.fields.push(FieldDeclaration {
            name: name.to_string(),
            ty: ty(field_type),
            annotations: vec![Annotation::new("javax.inject.Inject")],
        });
        self
    }

    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.decl.methods.push(method.build());
        self
    }

    /// An instance `@Provides` method.
    pub fn provides(self, name: &str, return_type: &str, parameters: &[(&str, &str)]) -> Self {
        self.method(provides(name, return_type).params(parameters))
    }

    /// An abstract `@Binds` method.
    pub fn binds(self, name: &str, return_type: &str, implementation: &str) -> Self {
        self.method(binds(name, return_type, implementation))
    }

    /// An abstract, parameterless provision method on a component.
    pub fn entry_point(self, name: &str, return_type: &str) -> Self {
        self.method(method(name, return_type).abstract_method())
    }

    pub fn build(self) -> TypeDeclaration {
        self.decl
    }
}

pub struct MethodBuilder {
    method: MethodDeclaration,
}

pub fn method(name: &str, return_type: &str) -> MethodBuilder {
    MethodBuilder {
        method: MethodDeclaration {
            name: name.to_string(),
            return_type: ty(return_type),
            parameters: Vec::new(),
            annotations: Vec::new(),
            is_abstract: false,
            is_static: false,
        },
    }
}

pub fn provides(name: &str, return_type: &str) -> MethodBuilder {
    method(name, return_type).annotated("dagger.Provides")
}

pub fn binds(name: &str, return_type: &str, implementation: &str) -> MethodBuilder {
    method(name, return_type)
        .annotated("dagger.Binds")
        .param("impl", implementation)
        .abstract_method()
}

impl MethodBuilder {
    pub fn annotated(mut self, annotation: &str) -> Self {
        self.method.annotations.push(Annotation::new(annotation));
        self
    }

    pub fn annotated_with(mut self, annotation: &str, value: &str) -> Self {
        self.method
            .annotations
            .push(Annotation::with_value(annotation, value));
        self
    }

    pub fn param(mut self, name: &str, param_type: &str) -> Self {
        self.method.parameters.extend(params(&[(name, param_type)]));
        self
    }

    pub fn params(mut self, parameters: &[(&str, &str)]) -> Self {
        self.method.parameters.extend(params(parameters));
        self
    }

    /// Adds a parameter carrying the given annotations (qualifiers, `@Nullable`, `@BindsInstance`).
    pub fn param_annotated(mut self, name: &str, param_type: &str, annotations: &[&str]) -> Self {
        self.method.parameters.push(ParameterDeclaration {
            name: name.to_string(),
            ty: ty(param_type),
            annotations: annotations.iter().map(|a| Annotation::new(*a)).collect(),
        });
        self
    }

    pub fn static_method(mut self) -> Self {
        self.method.is_static = true;
        self
    }

    pub fn abstract_method(mut self) -> Self {
        self.method.is_abstract = true;
        self
    }

    pub fn build(self) -> MethodDeclaration {
        self.method
    }
}
