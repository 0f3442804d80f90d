//! Domain canonicalization and reverse DNS.

pub mod canonicalizer;
pub mod resolver;

pub use canonicalizer::Canonicalizer;
pub use resolver::{NoopResolver, ReverseResolver, SystemResolver};
