mod core;
mod index_admin;
mod ops;

pub use self::core::{Collection, Validator};
