//! # numabase
//!
//! `numabase` exposes NUMA topology discovery and task/memory placement
//! control. It answers how many memory nodes and CPUs a machine has, which
//! CPUs belong to which node and how far apart the nodes are, and it lets a
//! caller pin a task's memory allocations and scheduling to chosen nodes or
//! CPUs.
//!
//! ## Features
//!
//! - Runtime binding of `libnuma` (no link-time dependency)
//! - Node and CPU id validation against the live topology
//! - Range-list parsing and formatting (`"0-3,8"`)
//! - Scoped bitmask handles released on every exit path
//! - In-memory provider for tests and machines without NUMA
//!
//! ## Example
//!
//! ```no_run
//! use numabase::Numa;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let numa = Numa::open()?;
//! if numa.available() {
//!     let topology = numa.topology();
//!     for node in topology.nodes() {
//!         println!("node {}: cpus {:?}", node, topology.node_to_cpus(node)?);
//!     }
//!
//!     numa.placement().bind("0")?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod bitmask;
pub mod error;
pub mod numa;
pub mod placement;
pub mod provider;
pub mod range;
pub mod topology;

pub use bitmask::Bitmask;
pub use error::{Error, IdKind, Result};
pub use numa::{Numa, NumaOptions};
pub use placement::Placement;
pub use provider::{MockProvider, NativeProvider, Pid, Provider};
pub use range::{format_list, parse_list, parse_range};
pub use topology::{NodeInfo, Topology};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
