//! Topology providers.
//!
//! A [`Provider`] is the boundary to the system's NUMA subsystem. The rest of
//! the crate never talks to the kernel directly; it validates its inputs and
//! then delegates to whichever provider it was handed. On Linux the native
//! provider is [`LibNuma`], which binds `libnuma` at runtime. [`MockProvider`]
//! implements the same contract in memory.

use crate::error::Result;

/// A process or task id as understood by the scheduler. `0` is the caller.
pub type Pid = i32;

/// Capabilities the topology facade and the placement controller need.
///
/// Identifiers are plain `usize` values; the provider translates them to the
/// native representation. Fallible methods translate native sentinels
/// (`-1`, null pointers) into [`Error`](crate::Error) values.
///
/// Masks are opaque handles with manual lifetime: each one returned by
/// [`allocate_cpumask`](Provider::allocate_cpumask),
/// [`parse_nodestring`](Provider::parse_nodestring) or
/// [`parse_cpustring`](Provider::parse_cpustring) must be handed back to
/// [`bitmask_free`](Provider::bitmask_free) exactly once. Use
/// [`Bitmask`](crate::Bitmask) rather than calling these directly.
pub trait Provider {
    /// Opaque bitmask handle owned by the provider.
    type Mask;

    /// Whether NUMA support is present on this machine.
    fn available(&self) -> bool;

    /// Highest node number available on the current system.
    fn max_node(&self) -> usize;

    /// Highest node number the kernel could ever report.
    fn max_possible_node(&self) -> usize;

    /// Size of the kernel's node mask.
    fn num_possible_nodes(&self) -> usize;

    /// Number of memory nodes in the system.
    fn num_configured_nodes(&self) -> usize;

    /// Number of CPUs in the system.
    fn num_configured_cpus(&self) -> usize;

    /// Number of CPUs the calling task may run on.
    fn num_task_cpus(&self) -> usize;

    /// Number of nodes the calling task may allocate memory on.
    fn num_task_nodes(&self) -> usize;

    /// Preferred allocation node of the calling task.
    fn preferred(&self) -> usize;

    /// Set the preferred allocation node of the calling task.
    fn set_preferred(&self, node: usize);

    /// Total memory of `node` in bytes, optionally storing free bytes in `free`.
    fn node_size(&self, node: usize, free: Option<&mut u64>) -> Result<u64>;

    /// Node the given CPU belongs to.
    fn node_of_cpu(&self, cpu: usize) -> Result<usize>;

    /// Topology distance between two nodes.
    fn distance(&self, node1: usize, node2: usize) -> Result<u32>;

    /// Allocate an empty mask sized for every possible CPU.
    fn allocate_cpumask(&self) -> Result<Self::Mask>;

    /// Parse a node list into a mask, or `None` if the provider rejects it.
    fn parse_nodestring(&self, spec: &str) -> Option<Self::Mask>;

    /// Parse a CPU list into a mask, or `None` if the provider rejects it.
    fn parse_cpustring(&self, spec: &str) -> Option<Self::Mask>;

    /// Test a single bit.
    fn bitmask_isbitset(&self, mask: &Self::Mask, bit: usize) -> bool;

    /// Set a single bit.
    fn bitmask_setbit(&self, mask: &mut Self::Mask, bit: usize);

    /// Release a mask.
    fn bitmask_free(&self, mask: Self::Mask);

    /// Bind memory allocation and scheduling of the calling task to `nodes`.
    fn bind(&self, nodes: &Self::Mask) -> Result<()>;

    /// Restrict memory allocation of the calling task to `nodes`.
    fn set_membind(&self, nodes: &Self::Mask) -> Result<()>;

    /// Run the calling task only on the CPUs of `node`.
    fn run_on_node(&self, node: usize) -> Result<()>;

    /// Allocate memory on the node of the executing CPU.
    fn set_localalloc(&self);

    /// Restrict task `pid` to the CPUs in `cpus`. `pid == 0` is the caller.
    fn sched_setaffinity(&self, pid: Pid, cpus: &Self::Mask) -> Result<()>;

    /// Store the allowed CPUs of task `pid` into `cpus`.
    fn sched_getaffinity(&self, pid: Pid, cpus: &mut Self::Mask) -> Result<()>;
}

pub mod mock;
pub use self::mock::MockProvider;

// Re-export platform-specific implementations
#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use self::linux::{LibNuma, NumaBitmask, RawMask};

// Provide a default implementation for unsupported platforms
#[cfg(not(target_os = "linux"))]
mod unsupported;
#[cfg(not(target_os = "linux"))]
pub use self::unsupported::{NoMask, Unsupported};

/// The provider backed by the operating system on this target.
#[cfg(target_os = "linux")]
pub type NativeProvider = LibNuma;

/// The provider backed by the operating system on this target.
#[cfg(not(target_os = "linux"))]
pub type NativeProvider = Unsupported;

/// Default shared object name of the native library.
pub const DEFAULT_LIBRARY: &str = "libnuma.so.1";
