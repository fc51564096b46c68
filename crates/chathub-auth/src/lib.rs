//! # chathub-auth
//!
//! Credential handling for ChatHub. The hub never issues credentials to
//! end users; it validates the HS256 tokens minted by the auth service and
//! resolves them to a [`UserId`](chathub_core::types::UserId).
//!
//! ## Modules
//!
//! - `jwt`: claims, token validation, and token issuance for tooling

pub mod jwt;

pub use jwt::{Claims, JwtDecoder, JwtEncoder};
