use super::element::ElementRef;
use super::frameworks;
use super::key::Key;
use super::types::TypeRef;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a dependency is consumed at its request site.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestKind {
    /// A bare `T`.
    Instance,
    /// `Provider<T>`
    Provider,
    /// `Lazy<T>`
    Lazy,
    /// `Provider<Lazy<T>>`
    ProviderOfLazy,
    /// `Producer<T>`
    Producer,
    /// `Produced<T>`
    Produced,
    /// `ListenableFuture<T>`, only from production entry points.
    Future,
    /// `void inject(T)` style members injection.
    MembersInjection,
}

impl RequestKind {
    /// Splits a requested type into the kind implied by its framework wrapper
    /// and the type the key is built from.
    pub fn extract(ty: &TypeRef) -> (RequestKind, TypeRef) {
        if let Some(inner) = ty.unwrap_single(frameworks::PROVIDER) {
            if let Some(lazy) = inner.unwrap_single(frameworks::LAZY) {
                return (RequestKind::ProviderOfLazy, lazy.clone());
            }
            return (RequestKind::Provider, inner.clone());
        }
        if let Some(inner) = ty.unwrap_single(frameworks::LAZY) {
            return (RequestKind::Lazy, inner.clone());
        }
        if let Some(inner) = ty.unwrap_single(frameworks::PRODUCER) {
            return (RequestKind::Producer, inner.clone());
        }
        if let Some(inner) = ty.unwrap_single(frameworks::PRODUCED) {
            return (RequestKind::Produced, inner.clone());
        }
        if let Some(inner) = ty.unwrap_single(frameworks::FUTURE) {
            return (RequestKind::Future, inner.clone());
        }
        (RequestKind::Instance, ty.clone())
    }

    /// Requests of these kinds hand out an indirection instead of a constructed
    /// instance, so a dependency cycle through them can be instantiated.
    pub fn defers_instantiation(self) -> bool {
        matches!(
            self,
            RequestKind::Provider | RequestKind::Lazy | RequestKind::ProviderOfLazy | RequestKind::Producer
        )
    }

    pub fn is_production_only(self) -> bool {
        matches!(
            self,
            RequestKind::Producer | RequestKind::Produced | RequestKind::Future
        )
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestKind::Instance => "INSTANCE",
            RequestKind::Provider => "PROVIDER",
            RequestKind::Lazy => "LAZY",
            RequestKind::ProviderOfLazy => "PROVIDER_OF_LAZY",
            RequestKind::Producer => "PRODUCER",
            RequestKind::Produced => "PRODUCED",
            RequestKind::Future => "FUTURE",
            RequestKind::MembersInjection => "MEMBERS_INJECTION",
        };
        f.write_str(name)
    }
}

/// One point where a dependency is consumed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyRequest {
    pub key: Key,
    pub kind: RequestKind,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<ElementRef>,
}

impl DependencyRequest {
    pub fn new(key: Key, kind: RequestKind) -> Self {
        Self {
            key,
            kind,
            nullable: false,
            element: None,
        }
    }

    pub fn at(mut self, element: ElementRef) -> Self {
        self.element = Some(element);
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}
