//! Core traits defined in `chathub-core` and implemented by other crates.

pub mod relationship;

pub use relationship::RelationshipDirectory;
