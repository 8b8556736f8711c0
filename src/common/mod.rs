//! Miscellaneous common structs used throughout the library.

mod documents;
mod id;
mod kind;
mod value;

pub use documents::*;
pub use id::*;
pub use kind::*;
pub use value::*;
