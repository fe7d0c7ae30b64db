//! Key construction rules shared by every kind of declaration.

use crate::error::{BindscopeError, Result};
use bindscope_api::{
    DependencyRequest, ElementRef, Key, Qualifier, RequestKind, Scope, TypeRef, frameworks,
};
use bindscope_plugin::{Annotation, DeclarationRepository};

const CANONICAL: &[&[&str]] = &[
    frameworks::PROVIDER,
    frameworks::LAZY,
    frameworks::PRODUCER,
    frameworks::PRODUCED,
    frameworks::FUTURE,
    frameworks::MEMBERS_INJECTOR,
    frameworks::OPTIONAL,
    frameworks::SET,
    frameworks::MAP,
];

/// Rewrites the short and `jakarta` spellings of framework types to one
/// canonical name so that `Set<Foo>` and `java.util.Set<Foo>` are the same key.
pub fn canonical_type(ty: &TypeRef) -> TypeRef {
    match ty {
        TypeRef::Declared { name, args } => {
            let name = CANONICAL
                .iter()
                .find(|spellings| {
                    spellings.contains(&name.as_str())
                        && (!name.contains('.') || name.starts_with("jakarta."))
                })
                .map(|spellings| spellings[0].into())
                .unwrap_or_else(|| name.clone());
            TypeRef::Declared {
                name,
                args: args.iter().map(canonical_type).collect(),
            }
        }
        other => other.clone(),
    }
}

pub struct KeyFactory<'a> {
    repo: &'a dyn DeclarationRepository,
}

impl<'a> KeyFactory<'a> {
    pub fn new(repo: &'a dyn DeclarationRepository) -> Self {
        Self { repo }
    }

    pub fn qualifier(
        &self,
        annotations: &[Annotation],
        element: &ElementRef,
    ) -> Result<Option<Qualifier>> {
        let mut qualifiers = annotations
            .iter()
            .filter(|a| self.repo.is_qualifier(&a.type_name));
        let first = qualifiers.next();
        if qualifiers.next().is_some() {
            return Err(BindscopeError::malformed(
                element,
                "may not use more than one @Qualifier",
            ));
        }
        Ok(first.map(|a| Qualifier {
            annotation: a.type_name.as_str().into(),
            value: a.value.as_deref().map(Into::into),
        }))
    }

    pub fn scope(&self, annotations: &[Annotation], element: &ElementRef) -> Result<Option<Scope>> {
        let mut scopes = annotations
            .iter()
            .filter(|a| self.repo.is_scope(&a.type_name));
        let first = scopes.next();
        if scopes.next().is_some() {
            return Err(BindscopeError::malformed(
                element,
                "may not use more than one @Scope",
            ));
        }
        Ok(first.map(|a| Scope::new(a.type_name.as_str())))
    }

    /// Builds a key for `ty` as written at `element`, rejecting unresolved types.
    pub fn key(&self, ty: &TypeRef, annotations: &[Annotation], element: &ElementRef) -> Result<Key> {
        check_resolved(ty, element)?;
        Ok(Key::qualified(
            canonical_type(ty),
            self.qualifier(annotations, element)?,
        ))
    }

    /// A dependency request for a parameter, field or entry point of type `ty`.
    pub fn request(
        &self,
        ty: &TypeRef,
        annotations: &[Annotation],
        element: ElementRef,
    ) -> Result<DependencyRequest> {
        check_resolved(ty, &element)?;
        let (kind, key_type) = RequestKind::extract(&canonical_type(ty));
        let key = Key::qualified(key_type, self.qualifier(annotations, &element)?);
        let nullable = kind == RequestKind::Instance
            && !ty.is_primitive()
            && is_nullable(annotations);
        Ok(DependencyRequest::new(key, kind)
            .nullable(nullable)
            .at(element))
    }
}

pub fn is_nullable(annotations: &[Annotation]) -> bool {
    annotations
        .iter()
        .any(|a| frameworks::is_nullable_annotation(&a.type_name))
}

pub fn check_resolved(ty: &TypeRef, element: &ElementRef) -> Result<()> {
    if ty.contains_error() {
        return Err(BindscopeError::TypeResolution {
            element: element.to_string(),
            ty: ty.to_string(),
        });
    }
    Ok(())
}
