use super::frameworks;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// A scope annotation such as `@Singleton` or `@ActivityScope`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
#[serde(transparent)]
pub struct Scope {
    #[schemars(with = "String")]
    pub annotation: SmolStr,
}

impl Scope {
    pub fn new(annotation: impl Into<SmolStr>) -> Self {
        Self {
            annotation: annotation.into(),
        }
    }

    /// `@Singleton` has the longest lifetime of all scopes.
    pub fn is_singleton(&self) -> bool {
        frameworks::is_one_of(&self.annotation, frameworks::SINGLETON)
    }

    /// `@Reusable` bindings may be cached anywhere and never conflict with a
    /// component's own scope.
    pub fn is_reusable(&self) -> bool {
        frameworks::is_one_of(&self.annotation, frameworks::REUSABLE)
    }

    pub fn is_production_scope(&self) -> bool {
        frameworks::is_one_of(&self.annotation, frameworks::PRODUCTION_SCOPE)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", frameworks::simple_name(&self.annotation))
    }
}
