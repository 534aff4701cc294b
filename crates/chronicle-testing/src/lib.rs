//! Test support for chronicle crates: isolated stores, payload fixtures
//! and chain assertions.

pub mod assertions;
pub mod fixtures;
pub mod world;

pub use assertions::assert_valid_chain;
pub use world::TestWorld;
