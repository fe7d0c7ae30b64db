//! The declaration repository seam of bindscope.
//!
//! The binding engine never reads sources itself. Everything it knows about
//! types, members and annotations comes through [`DeclarationRepository`].

pub mod declarations;
pub mod error;
pub mod memory;
pub mod repository;
pub mod testing;

pub use declarations::*;
pub use error::{RepositoryError, Result};
pub use memory::{DeclarationFile, InMemoryRepository};
pub use repository::{DeclarationRepository, Lookup};
