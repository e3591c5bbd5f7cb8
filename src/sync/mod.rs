//! Infrastructure sync: one full pass over the registry.
//!
//! Load the registry, merge community candidates, refresh every endpoint
//! through its category adapter, write the document back in one piece.

pub mod driver;
