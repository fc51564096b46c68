//! Repository implementations backed by PostgreSQL.

pub mod relationship;

pub use relationship::RelationshipRepository;
