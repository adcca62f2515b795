//! Provider descriptors: endpoint layout and API conventions.
//!
//! `descriptor` exposes validated metadata (`ProviderDescriptor`) covering the token,
//! token-info, resource, and batch endpoints plus the response-shape quirks the
//! normalizer, stream, and batch codec rely on.

pub mod descriptor;

pub use descriptor::*;
