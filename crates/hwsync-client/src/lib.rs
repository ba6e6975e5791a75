//! hwsync Client - Hardware Manager access
//!
//! Two layers:
//!
//! - [`HardwareClient`]: one logical request in, one completed HTTP exchange
//!   out. Owns the session token, status handling and the retry budget, and
//!   polls asynchronous tasks.
//! - [`HardwareGateway`]: hardware-domain operations (profile assignment,
//!   clone, removal, MAC derivation) exposed through [`HardwareOps`].

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod client;
pub mod clone;
pub mod config;
pub mod console;
pub mod error;
pub mod gateway;
pub mod session;

pub use client::HardwareClient;
pub use clone::build_clone_body;
pub use config::{ClientConfig, ServerErrorPolicy, RABBITMQ_CLIENTCERT_CONFLICT};
pub use console::{ConsoleEndpoint, ConsoleMacSource, IloConsole};
pub use error::{HardwareError, HardwareResult};
pub use gateway::{HardwareGateway, HardwareOps};
pub use session::{SessionCache, SessionToken};
