pub mod repository;

mod album;
mod id_types;
mod photo;
pub use album::*;
pub use id_types::*;
pub use photo::*;

mod util;
