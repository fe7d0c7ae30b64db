pub mod binding;
pub mod diagnostic;
pub mod element;
pub mod frameworks;
pub mod key;
pub mod path;
pub mod request;
pub mod scope;
pub mod types;

pub use binding::*;
pub use diagnostic::*;
pub use element::*;
pub use key::*;
pub use path::*;
pub use request::*;
pub use scope::*;
pub use types::*;
