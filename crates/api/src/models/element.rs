use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::fmt;

/// Points back at the source element a binding, request or diagnostic came from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
pub struct ElementRef {
    /// The type declaring the element (or the type itself for [`ElementKind::Type`]).
    #[schemars(with = "String")]
    pub enclosing: SmolStr,
    #[schemars(with = "String")]
    pub name: SmolStr,
    pub kind: ElementKind,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ElementKind {
    Type,
    Field,
    Constructor {
        #[schemars(with = "Vec<String>")]
        params: Vec<SmolStr>,
    },
    Method {
        #[schemars(with = "Vec<String>")]
        params: Vec<SmolStr>,
    },
    /// A parameter of `method` (a constructor when `method` is `None`).
    Parameter {
        #[schemars(with = "Option<String>")]
        method: Option<SmolStr>,
        index: usize,
        arity: usize,
    },
}

impl ElementRef {
    pub fn of_type(name: impl Into<SmolStr>) -> Self {
        let name = name.into();
        Self {
            enclosing: name.clone(),
            name,
            kind: ElementKind::Type,
        }
    }

    pub fn method(enclosing: impl Into<SmolStr>, name: impl Into<SmolStr>, params: Vec<SmolStr>) -> Self {
        Self {
            enclosing: enclosing.into(),
            name: name.into(),
            kind: ElementKind::Method { params },
        }
    }

    pub fn constructor(enclosing: impl Into<SmolStr>, params: Vec<SmolStr>) -> Self {
        let enclosing = enclosing.into();
        Self {
            name: enclosing.clone(),
            enclosing,
            kind: ElementKind::Constructor { params },
        }
    }

    pub fn field(enclosing: impl Into<SmolStr>, name: impl Into<SmolStr>) -> Self {
        Self {
            enclosing: enclosing.into(),
            name: name.into(),
            kind: ElementKind::Field,
        }
    }

    pub fn parameter(
        enclosing: impl Into<SmolStr>,
        method: Option<SmolStr>,
        name: impl Into<SmolStr>,
        index: usize,
        arity: usize,
    ) -> Self {
        Self {
            enclosing: enclosing.into(),
            name: name.into(),
            kind: ElementKind::Parameter {
                method,
                index,
                arity,
            },
        }
    }

    /// Unqualified name used to order declarations in diagnostics.
    pub fn simple_name(&self) -> &str {
        super::frameworks::simple_name(&self.name)
    }

    pub fn enclosing_simple_name(&self) -> &str {
        super::frameworks::simple_name(&self.enclosing)
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ElementKind::Type => write!(f, "{}", self.enclosing),
            ElementKind::Field => write!(f, "{}.{}", self.enclosing, self.name),
            ElementKind::Constructor { params } => {
                write!(f, "{}({})", self.enclosing, params.join(", "))
            }
            ElementKind::Method { params } => {
                write!(f, "{}.{}({})", self.enclosing, self.name, params.join(", "))
            }
            ElementKind::Parameter {
                method,
                index,
                arity,
            } => {
                match method {
                    Some(method) => write!(f, "{}.{}(", self.enclosing, method)?,
                    None => write!(f, "{}(", self.enclosing)?,
                }
                if *index > 0 {
                    write!(f, "…, ")?;
                }
                write!(f, "{}", self.name)?;
                if index + 1 < *arity {
                    write!(f, ", …")?;
                }
                write!(f, ")")
            }
        }
    }
}
