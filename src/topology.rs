//! Read-only topology queries.
//!
//! [`Topology`] validates node and CPU ids against the live topology before
//! delegating to the provider. Nothing is cached: `max_node()` is asked again
//! for every check.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::range;

/// Kernel listing of CPUs isolated from the general scheduler.
pub const ISOLATED_CPUS_PATH: &str = "/sys/devices/system/cpu/isolated";

/// Point-in-time description of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// Node id.
    pub id: usize,

    /// CPUs on this node, ascending.
    pub cpus: Vec<usize>,

    /// Total memory in bytes.
    pub size: u64,

    /// Free memory in bytes.
    pub free_size: u64,

    /// Distance to every node, indexed by node id.
    pub distances: Vec<u32>,
}

/// Topology queries over a provider.
pub struct Topology<'a, P: Provider> {
    provider: &'a P,
    isolated_path: &'a Path,
}

impl<'a, P: Provider> Clone for Topology<'a, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, P: Provider> Copy for Topology<'a, P> {}

impl<'a, P: Provider> Topology<'a, P> {
    /// Queries over `provider`, reading isolated CPUs from the kernel.
    pub fn new(provider: &'a P) -> Topology<'a, P> {
        Topology::with_isolated_path(provider, Path::new(ISOLATED_CPUS_PATH))
    }

    /// Queries over `provider`, reading isolated CPUs from `path`.
    pub fn with_isolated_path(provider: &'a P, path: &'a Path) -> Topology<'a, P> {
        Topology { provider, isolated_path: path }
    }

    /// The provider behind these queries.
    #[inline]
    pub fn provider(&self) -> &'a P {
        self.provider
    }

    /// Whether NUMA support is present.
    ///
    /// Every other query is meaningless when this returns `false`.
    #[inline]
    pub fn available(&self) -> bool {
        self.provider.available()
    }

    /// Highest node number available on this system.
    #[inline]
    pub fn max_node(&self) -> usize {
        self.provider.max_node()
    }

    /// Highest node number the kernel could report.
    #[inline]
    pub fn max_possible_node(&self) -> usize {
        self.provider.max_possible_node()
    }

    /// Size of the kernel's node mask.
    #[inline]
    pub fn num_possible_nodes(&self) -> usize {
        self.provider.num_possible_nodes()
    }

    /// Number of memory nodes.
    #[inline]
    pub fn num_configured_nodes(&self) -> usize {
        self.provider.num_configured_nodes()
    }

    /// Number of CPUs.
    #[inline]
    pub fn num_configured_cpus(&self) -> usize {
        self.provider.num_configured_cpus()
    }

    /// Number of CPUs the calling task may use.
    #[inline]
    pub fn num_task_cpus(&self) -> usize {
        self.provider.num_task_cpus()
    }

    /// Number of nodes the calling task may allocate on.
    #[inline]
    pub fn num_task_nodes(&self) -> usize {
        self.provider.num_task_nodes()
    }

    /// Preferred allocation node of the calling task.
    #[inline]
    pub fn preferred(&self) -> usize {
        self.provider.preferred()
    }

    /// All node ids, `0..=max_node()`.
    pub fn nodes(&self) -> Vec<usize> {
        (0..=self.max_node()).collect()
    }

    /// Fail with [`Error::OutOfRange`] unless `node` is in `0..=max_node()`.
    pub fn check_node(&self, node: usize) -> Result<()> {
        let max = self.max_node();
        if node > max {
            return Err(Error::node_out_of_range(node, max));
        }
        Ok(())
    }

    /// Fail with [`Error::OutOfRange`] unless `cpu` is below `num_configured_cpus()`.
    pub fn check_cpu(&self, cpu: usize) -> Result<()> {
        let cpus = self.num_configured_cpus();
        if cpu >= cpus {
            return Err(Error::cpu_out_of_range(cpu, cpus.saturating_sub(1)));
        }
        Ok(())
    }

    /// Total memory of `node` in bytes.
    pub fn node_size(&self, node: usize) -> Result<u64> {
        self.check_node(node)?;
        self.provider.node_size(node, None)
    }

    /// Free memory of `node` in bytes.
    pub fn node_free_size(&self, node: usize) -> Result<u64> {
        self.check_node(node)?;
        let mut free = 0;
        self.provider.node_size(node, Some(&mut free))?;
        Ok(free)
    }

    /// Node `cpu` belongs to.
    ///
    /// The id is not checked here; an unknown CPU is reported by the provider.
    #[inline]
    pub fn node_of_cpu(&self, cpu: usize) -> Result<usize> {
        self.provider.node_of_cpu(cpu)
    }

    /// CPUs on `node`, ascending.
    pub fn node_to_cpus(&self, node: usize) -> Result<Vec<usize>> {
        self.check_node(node)?;
        let cpus = (0..self.num_configured_cpus())
            .filter(|cpu| matches!(self.provider.node_of_cpu(*cpu), Ok(owner) if owner == node))
            .collect();
        Ok(cpus)
    }

    /// Distance between two nodes (10 is local on most systems).
    pub fn distance(&self, node1: usize, node2: usize) -> Result<u32> {
        self.check_node(node1)?;
        self.check_node(node2)?;
        self.provider.distance(node1, node2)
    }

    /// CPUs isolated from the general scheduler.
    ///
    /// A missing or empty listing means no CPU is isolated.
    pub fn isolated_cpus(&self) -> Result<Vec<usize>> {
        let text = match fs::read_to_string(self.isolated_path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("{} not present", self.isolated_path.display());
                return Ok(Vec::new());
            }
            Err(err) => return Err(Error::Io(err)),
        };
        range::parse_list(text.trim())
    }

    /// Describe `node`.
    pub fn node_info(&self, node: usize) -> Result<NodeInfo> {
        self.check_node(node)?;
        let mut free_size = 0;
        let size = self.provider.node_size(node, Some(&mut free_size))?;
        let distances = self
            .nodes()
            .into_iter()
            .map(|other| self.provider.distance(node, other))
            .collect::<Result<Vec<_>>>()?;

        Ok(NodeInfo {
            id: node,
            cpus: self.node_to_cpus(node)?,
            size,
            free_size,
            distances,
        })
    }

    /// Describe every node that reports memory.
    ///
    /// Ids inside `0..=max_node()` without memory information (offline or
    /// memoryless nodes) are left out.
    pub fn snapshot(&self) -> Result<Vec<NodeInfo>> {
        let mut nodes = Vec::new();
        for node in self.nodes() {
            match self.node_info(node) {
                Ok(info) => nodes.push(info),
                Err(Error::Provider { op, source }) => {
                    log::debug!("skipping node {}: {} failed: {}", node, op, source);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(nodes)
    }
}
