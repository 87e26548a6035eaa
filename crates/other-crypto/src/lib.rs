//! OTHer credential store.
//!
//! Passwords are hashed with Argon2id (default cost parameters) into PHC
//! strings; only the hash is ever persisted.

pub mod password;

pub use password::{CredentialError, hash_password, verify_password};
