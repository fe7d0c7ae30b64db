use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// The chain of components from the root down to the component a node lives in.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "Vec<SmolStr>", into = "Vec<SmolStr>")]
pub struct ComponentPath(Vec<SmolStr>);

impl ComponentPath {
    pub fn root(component: impl Into<SmolStr>) -> Self {
        Self(vec![component.into()])
    }

    pub fn from_components(components: Vec<SmolStr>) -> ApiResult<Self> {
        if components.is_empty() {
            return Err(ApiError::EmptyComponentPath);
        }
        Ok(Self(components))
    }

    pub fn child(&self, component: impl Into<SmolStr>) -> Self {
        let mut components = self.0.clone();
        components.push(component.into());
        Self(components)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.len() > 1 {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        } else {
            None
        }
    }

    pub fn current(&self) -> &SmolStr {
        // Never empty: every constructor checks.
        &self.0[self.0.len() - 1]
    }

    pub fn root_component(&self) -> &SmolStr {
        &self.0[0]
    }

    pub fn at_root(&self) -> bool {
        self.0.len() == 1
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn components(&self) -> &[SmolStr] {
        &self.0
    }

    /// True if `self` is `other` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, other: &ComponentPath) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }
}

impl fmt::Display for ComponentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" → "))
    }
}

impl TryFrom<Vec<SmolStr>> for ComponentPath {
    type Error = ApiError;

    fn try_from(value: Vec<SmolStr>) -> Result<Self, Self::Error> {
        Self::from_components(value)
    }
}

impl From<ComponentPath> for Vec<SmolStr> {
    fn from(path: ComponentPath) -> Self {
        path.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_navigation() {
        let root = ComponentPath::root("App");
        let child = root.child("Activity");
        assert!(root.at_root());
        assert_eq!(child.parent(), Some(root.clone()));
        assert_eq!(child.current(), "Activity");
        assert!(root.is_ancestor_or_self(&child));
        assert!(!child.is_ancestor_or_self(&root));
        assert_eq!(child.to_string(), "App → Activity");
    }

    #[test]
    fn test_empty_path_rejected() {
        assert!(ComponentPath::from_components(vec![]).is_err());
    }
}
