//! Declaration-to-binding translation.

pub mod factory;
pub mod keys;
pub mod module;

pub use factory::{BindingFactory, method_element};
pub use keys::{KeyFactory, canonical_type};
pub use module::{Declaration, MalformedDeclaration, ModuleDescriptor, SubcomponentDeclaration};
