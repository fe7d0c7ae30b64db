use super::frameworks;
use crate::error::{ApiError, ApiResult};
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

const PRIMITIVES: &[&str] = &[
    "boolean", "byte", "short", "int", "long", "char", "float", "double", "void",
];

/// A fully resolved type as handed out by the declaration repository.
///
/// The textual form is the familiar `name<arg, arg>` syntax. Primitive keywords
/// parse to [`TypeRef::Primitive`], and a leading `!` marks a type the
/// repository failed to resolve (`!com.example.Missing`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TypeRef {
    Primitive(SmolStr),
    Declared { name: SmolStr, args: Vec<TypeRef> },
    Error(SmolStr),
}

impl TypeRef {
    pub fn declared(name: impl Into<SmolStr>) -> Self {
        TypeRef::Declared {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<SmolStr>, args: Vec<TypeRef>) -> Self {
        TypeRef::Declared {
            name: name.into(),
            args,
        }
    }

    pub fn parse(input: &str) -> ApiResult<Self> {
        let mut parser = Parser {
            input,
            chars: input.char_indices().peekable(),
        };
        let ty = parser.parse_type()?;
        parser.skip_ws();
        if let Some(&(idx, c)) = parser.chars.peek() {
            return Err(parser.error(format!("unexpected `{}` at offset {}", c, idx)));
        }
        Ok(ty)
    }

    pub fn name(&self) -> &str {
        match self {
            TypeRef::Primitive(name) | TypeRef::Error(name) => name,
            TypeRef::Declared { name, .. } => name,
        }
    }

    pub fn simple_name(&self) -> &str {
        frameworks::simple_name(self.name())
    }

    pub fn args(&self) -> &[TypeRef] {
        match self {
            TypeRef::Declared { args, .. } => args,
            _ => &[],
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, TypeRef::Primitive(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Primitive(name) if name == "void")
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TypeRef::Error(_))
    }

    /// True if this type or any of its type arguments failed to resolve.
    pub fn contains_error(&self) -> bool {
        match self {
            TypeRef::Error(_) => true,
            TypeRef::Primitive(_) => false,
            TypeRef::Declared { args, .. } => args.iter().any(TypeRef::contains_error),
        }
    }

    /// True if the raw type is one of `candidates`.
    pub fn is(&self, candidates: &[&str]) -> bool {
        matches!(self, TypeRef::Declared { name, .. } if frameworks::is_one_of(name, candidates))
    }

    /// Returns the single type argument when this is `Wrapper<T>` for one of
    /// `candidates`.
    pub fn unwrap_single(&self, candidates: &[&str]) -> Option<&TypeRef> {
        match self {
            TypeRef::Declared { name, args }
                if args.len() == 1 && frameworks::is_one_of(name, candidates) =>
            {
                args.first()
            }
            _ => None,
        }
    }

    pub fn set_element(&self) -> Option<&TypeRef> {
        self.unwrap_single(frameworks::SET)
    }

    /// Key and value types of a `Map<K, V>`.
    pub fn map_entry(&self) -> Option<(&TypeRef, &TypeRef)> {
        match self {
            TypeRef::Declared { name, args }
                if args.len() == 2 && frameworks::is_one_of(name, frameworks::MAP) =>
            {
                Some((&args[0], &args[1]))
            }
            _ => None,
        }
    }

    pub fn optional_value(&self) -> Option<&TypeRef> {
        self.unwrap_single(frameworks::OPTIONAL)
    }

    /// Replaces every argument-less declared type named in `bindings` with its
    /// substitution. Used to instantiate generic `@Inject` classes.
    pub fn substitute(&self, bindings: &HashMap<SmolStr, TypeRef>) -> TypeRef {
        match self {
            TypeRef::Declared { name, args } if args.is_empty() => bindings
                .get(name)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeRef::Declared { name, args } => TypeRef::Declared {
                name: name.clone(),
                args: args.iter().map(|arg| arg.substitute(bindings)).collect(),
            },
            other => other.clone(),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Primitive(name) => write!(f, "{}", name),
            TypeRef::Error(name) => write!(f, "!{}", name),
            TypeRef::Declared { name, args } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for TypeRef {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeRef::parse(s)
    }
}

impl From<TypeRef> for String {
    fn from(ty: TypeRef) -> Self {
        ty.to_string()
    }
}

impl TryFrom<String> for TypeRef {
    type Error = ApiError;

    fn try_from(value: String) -> Result<Self, ApiError> {
        TypeRef::parse(&value)
    }
}

impl JsonSchema for TypeRef {
    fn schema_name() -> Cow<'static, str> {
        "TypeRef".into()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        String::json_schema(generator)
    }
}

struct Parser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl<'a> Parser<'a> {
    fn error(&self, reason: String) -> ApiError {
        ApiError::InvalidType {
            input: self.input.to_string(),
            reason,
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn parse_type(&mut self) -> ApiResult<TypeRef> {
        self.skip_ws();
        let is_error = matches!(self.chars.peek(), Some((_, '!')));
        if is_error {
            self.chars.next();
        }

        let name = self.parse_name()?;
        if is_error {
            return Ok(TypeRef::Error(name));
        }
        if PRIMITIVES.contains(&name.as_str()) {
            return Ok(TypeRef::Primitive(name));
        }

        self.skip_ws();
        let mut args = Vec::new();
        if matches!(self.chars.peek(), Some((_, '<'))) {
            self.chars.next();
            loop {
                args.push(self.parse_type()?);
                self.skip_ws();
                match self.chars.next() {
                    Some((_, ',')) => continue,
                    Some((_, '>')) => break,
                    Some((idx, c)) => {
                        return Err(self.error(format!("unexpected `{}` at offset {}", c, idx)));
                    }
                    None => return Err(self.error("unclosed `<`".to_string())),
                }
            }
        }
        Ok(TypeRef::Declared { name, args })
    }

    fn parse_name(&mut self) -> ApiResult<SmolStr> {
        let mut name = String::new();
        while let Some((_, c)) = self.chars.peek() {
            if c.is_alphanumeric() || matches!(c, '.' | '_' | '$' | '[' | ']' | '?') {
                name.push(*c);
                self.chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(self.error("expected a type name".to_string()));
        }
        Ok(SmolStr::from(name))
    }
}
