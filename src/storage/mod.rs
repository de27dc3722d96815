pub mod atomic;
pub mod content;
pub mod error;
pub(crate) mod index;
pub mod store;
