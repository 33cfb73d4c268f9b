//! Task and memory placement.
//!
//! Every operation validates its arguments before touching a bitmask. Masks
//! are held in [`Bitmask`] guards, so they are released whether the provider
//! call succeeds or fails.

use crate::bitmask::Bitmask;
use crate::error::{Error, Result};
use crate::provider::{Pid, Provider};
use crate::range;
use crate::topology::Topology;

/// Placement control over a provider.
pub struct Placement<'a, P: Provider> {
    topology: Topology<'a, P>,
}

impl<'a, P: Provider> Clone for Placement<'a, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, P: Provider> Copy for Placement<'a, P> {}

impl<'a, P: Provider> Placement<'a, P> {
    /// Placement control validating ids against `topology`.
    pub fn new(topology: Topology<'a, P>) -> Placement<'a, P> {
        Placement { topology }
    }

    #[inline]
    fn provider(&self) -> &'a P {
        self.topology.provider()
    }

    /// Make `node` the preferred allocation node of the calling task.
    pub fn set_preferred(&self, node: usize) -> Result<()> {
        self.topology.check_node(node)?;
        log::debug!("preferring node {}", node);
        self.provider().set_preferred(node);
        Ok(())
    }

    /// Bind memory allocation and scheduling of the calling task and its
    /// future children to the nodes in `nodes`, e.g. `"0-1,3"`.
    pub fn bind(&self, nodes: &str) -> Result<()> {
        let mask = Bitmask::parse_nodes(self.provider(), nodes)?;
        log::debug!("binding to nodes {}", nodes);
        self.provider().bind(mask.as_raw())
    }

    /// Restrict memory allocation of the calling task to the nodes in
    /// `nodes`. Scheduling is left alone.
    pub fn set_membind(&self, nodes: &str) -> Result<()> {
        let mask = Bitmask::parse_nodes(self.provider(), nodes)?;
        log::debug!("binding memory to nodes {}", nodes);
        self.provider().set_membind(mask.as_raw())
    }

    /// Run the calling task only on the CPUs of `node`.
    pub fn run_on_node(&self, node: usize) -> Result<()> {
        self.topology.check_node(node)?;
        log::debug!("running on node {}", node);
        self.provider().run_on_node(node)
    }

    /// Allocate from whichever node the executing CPU is on.
    pub fn set_localalloc(&self) {
        log::debug!("using local allocation");
        self.provider().set_localalloc();
    }

    /// Restrict task `pid` to the CPUs in `cpus`, e.g. `"0-3,8"`.
    pub fn sched_cpus_setaffinity(&self, pid: Pid, cpus: &str) -> Result<()> {
        let mask = Bitmask::parse_cpus(self.provider(), cpus)?;
        log::debug!("setting affinity of {} to cpus {}", pid, cpus);
        self.provider().sched_setaffinity(pid, mask.as_raw())
    }

    /// Restrict task `pid` to every CPU of the nodes in `nodes`.
    ///
    /// Fails with [`Error::InvalidNodeSpec`] if the nodes have no CPUs.
    pub fn sched_nodes_setaffinity(&self, pid: Pid, nodes: &str) -> Result<()> {
        let node_mask = Bitmask::parse_nodes(self.provider(), nodes)?;
        let mut cpu_mask = Bitmask::allocate_cpus(self.provider())?;

        let mut selected = 0;
        for cpu in 0..self.topology.num_configured_cpus() {
            if let Ok(node) = self.topology.node_of_cpu(cpu) {
                if node_mask.is_set(node) {
                    cpu_mask.set(cpu);
                    selected += 1;
                }
            }
        }
        if selected == 0 {
            return Err(Error::InvalidNodeSpec(nodes.to_string()));
        }

        log::debug!("setting affinity of {} to nodes {} ({} cpus)", pid, nodes, selected);
        self.provider().sched_setaffinity(pid, cpu_mask.as_raw())
    }

    /// CPUs task `pid` may run on, ascending.
    pub fn sched_getaffinity(&self, pid: Pid) -> Result<Vec<usize>> {
        let mut mask = Bitmask::allocate_cpus(self.provider())?;
        self.provider().sched_getaffinity(pid, mask.as_raw_mut())?;
        Ok(mask.ones(self.topology.num_configured_cpus()))
    }

    /// Restrict task `pid` to an explicit set of CPUs.
    ///
    /// Every id is checked against the live CPU count before any mask is
    /// built.
    pub fn set_cpu_affinity(&self, pid: Pid, cpus: &[usize]) -> Result<()> {
        if cpus.is_empty() {
            return Err(Error::InvalidCpuSpec(String::new()));
        }
        for cpu in cpus {
            self.topology.check_cpu(*cpu)?;
        }
        self.sched_cpus_setaffinity(pid, &range::format_list(cpus))
    }
}
