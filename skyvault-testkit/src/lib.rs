//! SkyVault Testkit
//!
//! In-process stand-ins for the collaborators a node talks to:
//! - [`LocalChain`]: a proof-of-work chain shared by a test group, reached
//!   through per-node [`LocalChainClient`]s
//! - [`MemoryHostNetwork`]: hosts held in memory with injectable faults
//!
//! Both implement the same capability traits the real transports do, so
//! nodes under test run unmodified.

pub mod chain;
pub mod fixtures;
pub mod network;

pub use chain::{LocalChain, LocalChainClient};
pub use fixtures::{cheap_terms, random_bytes};
pub use network::{HostFault, MemoryHost, MemoryHostNetwork};
