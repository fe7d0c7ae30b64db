use crate::declarations::{TypeDeclaration, TypeKind};
use bindscope_api::{TypeRef, frameworks};
use std::collections::{HashSet, VecDeque};

const QUALIFIER_META: &[&str] = &["javax.inject.Qualifier", "jakarta.inject.Qualifier", "Qualifier"];
const SCOPE_META: &[&str] = &["javax.inject.Scope", "jakarta.inject.Scope", "Scope"];
const MAP_KEY_META: &[&str] = &["dagger.MapKey", "MapKey"];

const BUILTIN_QUALIFIERS: &[&str] = &["javax.inject.Named", "jakarta.inject.Named", "Named"];
const BUILTIN_MAP_KEYS: &[&str] = &[
    "dagger.multibindings.StringKey",
    "dagger.multibindings.IntKey",
    "dagger.multibindings.LongKey",
    "dagger.multibindings.ClassKey",
    "StringKey",
    "IntKey",
    "LongKey",
    "ClassKey",
];

/// Result of asking the repository for a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    Missing,
    /// The type will be generated by a later processing round.
    NotYetGenerated,
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// The reflection layer the binding engine reads declarations from.
///
/// Implementations only need to answer type lookups; annotation classification
/// and supertype walks have default implementations built on top of them.
pub trait DeclarationRepository {
    fn type_declaration(&self, name: &str) -> Lookup<&TypeDeclaration>;

    /// Every type known to the repository, in declaration order.
    fn type_names(&self) -> Vec<&str>;

    fn is_qualifier(&self, annotation: &str) -> bool {
        frameworks::is_one_of(annotation, BUILTIN_QUALIFIERS)
            || self.is_meta_annotated(annotation, QUALIFIER_META)
    }

    fn is_scope(&self, annotation: &str) -> bool {
        frameworks::is_one_of(annotation, frameworks::SINGLETON)
            || frameworks::is_one_of(annotation, frameworks::REUSABLE)
            || frameworks::is_one_of(annotation, frameworks::PRODUCTION_SCOPE)
            || self.is_meta_annotated(annotation, SCOPE_META)
    }

    fn is_map_key(&self, annotation: &str) -> bool {
        frameworks::is_one_of(annotation, BUILTIN_MAP_KEYS)
            || self.is_meta_annotated(annotation, MAP_KEY_META)
    }

    fn is_meta_annotated(&self, annotation: &str, meta: &[&str]) -> bool {
        match self.type_declaration(annotation) {
            Lookup::Found(decl) => {
                matches!(decl.kind, TypeKind::Annotation) && decl.has_annotation(meta)
            }
            _ => false,
        }
    }

    /// Transitive supertypes of `name`, breadth first, without duplicates.
    fn supertypes(&self, name: &str) -> Vec<TypeRef> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([name.to_string()]);
        let mut result = Vec::new();
        while let Some(current) = queue.pop_front() {
            let Lookup::Found(decl) = self.type_declaration(&current) else {
                continue;
            };
            for supertype in &decl.supertypes {
                if seen.insert(supertype.name().to_string()) {
                    queue.push_back(supertype.name().to_string());
                    result.push(supertype.clone());
                }
            }
        }
        result
    }

    /// Name-based assignability: same raw type, or `target` among the supertypes.
    fn is_assignable(&self, from: &TypeRef, target: &TypeRef) -> bool {
        if from == target || from.name() == target.name() {
            return true;
        }
        self.supertypes(from.name())
            .iter()
            .any(|s| s.name() == target.name())
    }
}
