use super::frameworks;
use super::types::TypeRef;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// A qualifier annotation value, e.g. `@Named("io")`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
pub struct Qualifier {
    #[schemars(with = "String")]
    pub annotation: SmolStr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub value: Option<SmolStr>,
}

impl Qualifier {
    pub fn new(annotation: impl Into<SmolStr>) -> Self {
        Self {
            annotation: annotation.into(),
            value: None,
        }
    }

    pub fn with_value(annotation: impl Into<SmolStr>, value: impl Into<SmolStr>) -> Self {
        Self {
            annotation: annotation.into(),
            value: Some(value.into()),
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "@{}(\"{}\")", self.annotation, value),
            None => write!(f, "@{}", self.annotation),
        }
    }
}

/// Discriminates individual multibinding contributions to the same aggregate.
///
/// Derived from the contributing module and method so that two `@IntoSet`
/// methods returning the same type never share a key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContributionId {
    pub module: SmolStr,
    pub method: SmolStr,
}

impl fmt::Display for ContributionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.module, self.method)
    }
}

/// Canonical identity of a requested or provided value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    pub ty: TypeRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<Qualifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contribution: Option<ContributionId>,
}

impl Key {
    pub fn new(ty: TypeRef) -> Self {
        Self {
            ty,
            qualifier: None,
            contribution: None,
        }
    }

    pub fn qualified(ty: TypeRef, qualifier: Option<Qualifier>) -> Self {
        Self {
            ty,
            qualifier,
            contribution: None,
        }
    }

    /// Same qualifier, different type.
    pub fn with_type(&self, ty: TypeRef) -> Self {
        Self {
            ty,
            qualifier: self.qualifier.clone(),
            contribution: None,
        }
    }

    pub fn with_contribution(mut self, id: ContributionId) -> Self {
        self.contribution = Some(id);
        self
    }

    pub fn without_contribution(&self) -> Self {
        Self {
            ty: self.ty.clone(),
            qualifier: self.qualifier.clone(),
            contribution: None,
        }
    }

    pub fn is_contribution(&self) -> bool {
        self.contribution.is_some()
    }

    pub fn is_multibinding_type(&self) -> bool {
        self.ty.set_element().is_some() || self.ty.map_entry().is_some()
    }

    /// For `Map<K, Provider<V>>` and friends, the key of the plain `Map<K, V>`.
    pub fn unwrapped_map_key(&self) -> Option<Key> {
        let (k, v) = self.ty.map_entry()?;
        let value = v
            .unwrap_single(frameworks::PROVIDER)
            .or_else(|| v.unwrap_single(frameworks::PRODUCER))
            .or_else(|| v.unwrap_single(frameworks::PRODUCED))?;
        Some(self.with_type(TypeRef::generic(
            self.ty.name(),
            vec![k.clone(), value.clone()],
        )))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{} {}", qualifier, self.ty),
            None => write!(f, "{}", self.ty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contribution_keys_do_not_collide() {
        let set = Key::new(TypeRef::parse("Set<Plugin>").unwrap());
        let a = set.clone().with_contribution(ContributionId {
            module: "AModule".into(),
            method: "plugin".into(),
        });
        let b = set.clone().with_contribution(ContributionId {
            module: "BModule".into(),
            method: "plugin".into(),
        });
        assert_ne!(a, b);
        assert_eq!(a.without_contribution(), set);
        assert_eq!(a.to_string(), "Set<Plugin>");
    }

    #[test]
    fn test_unwrapped_map_key() {
        let key = Key::qualified(
            TypeRef::parse("Map<String, Provider<Handler>>").unwrap(),
            Some(Qualifier::new("Web")),
        );
        let unwrapped = key.unwrapped_map_key().unwrap();
        assert_eq!(unwrapped.to_string(), "@Web Map<String, Handler>");
        assert!(Key::new(TypeRef::parse("Map<String, Handler>").unwrap())
            .unwrapped_map_key()
            .is_none());
    }
}
