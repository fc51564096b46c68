//! # chathub-database
//!
//! PostgreSQL connection management and the relationship directory
//! implementations the router consults before delivering a message.

pub mod connection;
pub mod memory;
pub mod provider;
pub mod repositories;

pub use connection::DatabasePool;
pub use memory::MemoryRelationshipDirectory;
pub use provider::RelationshipProvider;
