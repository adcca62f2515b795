//! Credential models, redacted secrets, and token introspection payloads.

pub mod credentials;
pub mod secret;
pub mod token_info;

pub use credentials::*;
pub use secret::*;
pub use token_info::*;
