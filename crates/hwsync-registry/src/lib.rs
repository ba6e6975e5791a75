//! hwsync Registry - Node Registry access
//!
//! The reconciliation engine reads nodes and writes state transitions and
//! ports only through [`NodeRegistry`]. Two backends:
//!
//! - [`HttpRegistry`]: an Ironic-compatible v1 REST API
//! - [`InMemoryRegistry`]: process-local maps for dry runs and tests

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod http;
pub mod memory;
pub mod traits;

pub use error::{RegistryError, RegistryResult};
pub use http::{HttpRegistry, HttpRegistryConfig};
pub use memory::{InMemoryRegistry, Transition};
pub use traits::NodeRegistry;
