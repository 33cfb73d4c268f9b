//! Provider for platforms without a NUMA backend.
//!
//! [`Unsupported::load`] always fails, so a value of this type never exists;
//! the trait methods below are statically unreachable.

use crate::error::{Error, Result};
use crate::provider::{Pid, Provider};

#[derive(Debug)]
enum Never {}

/// Uninhabited native provider for non-Linux targets.
#[derive(Debug)]
pub struct Unsupported {
    never: Never,
}

/// Mask type of [`Unsupported`]; also uninhabited.
#[derive(Debug)]
pub struct NoMask {
    never: Never,
}

impl Unsupported {
    /// Always fails with [`Error::Unavailable`].
    pub fn load(library: &str) -> Result<Unsupported> {
        Err(Error::Unavailable(format!(
            "{} is not supported on {}",
            library,
            std::env::consts::OS
        )))
    }
}

impl Provider for Unsupported {
    type Mask = NoMask;

    fn available(&self) -> bool {
        match self.never {}
    }

    fn max_node(&self) -> usize {
        match self.never {}
    }

    fn max_possible_node(&self) -> usize {
        match self.never {}
    }

    fn num_possible_nodes(&self) -> usize {
        match self.never {}
    }

    fn num_configured_nodes(&self) -> usize {
        match self.never {}
    }

    fn num_configured_cpus(&self) -> usize {
        match self.never {}
    }

    fn num_task_cpus(&self) -> usize {
        match self.never {}
    }

    fn num_task_nodes(&self) -> usize {
        match self.never {}
    }

    fn preferred(&self) -> usize {
        match self.never {}
    }

    fn set_preferred(&self, _node: usize) {
        match self.never {}
    }

    fn node_size(&self, _node: usize, _free: Option<&mut u64>) -> Result<u64> {
        match self.never {}
    }

    fn node_of_cpu(&self, _cpu: usize) -> Result<usize> {
        match self.never {}
    }

    fn distance(&self, _node1: usize, _node2: usize) -> Result<u32> {
        match self.never {}
    }

    fn allocate_cpumask(&self) -> Result<NoMask> {
        match self.never {}
    }

    fn parse_nodestring(&self, _spec: &str) -> Option<NoMask> {
        match self.never {}
    }

    fn parse_cpustring(&self, _spec: &str) -> Option<NoMask> {
        match self.never {}
    }

    fn bitmask_isbitset(&self, mask: &NoMask, _bit: usize) -> bool {
        match mask.never {}
    }

    fn bitmask_setbit(&self, mask: &mut NoMask, _bit: usize) {
        match mask.never {}
    }

    fn bitmask_free(&self, mask: NoMask) {
        match mask.never {}
    }

    fn bind(&self, nodes: &NoMask) -> Result<()> {
        match nodes.never {}
    }

    fn set_membind(&self, nodes: &NoMask) -> Result<()> {
        match nodes.never {}
    }

    fn run_on_node(&self, _node: usize) -> Result<()> {
        match self.never {}
    }

    fn set_localalloc(&self) {
        match self.never {}
    }

    fn sched_setaffinity(&self, _pid: Pid, cpus: &NoMask) -> Result<()> {
        match cpus.never {}
    }

    fn sched_getaffinity(&self, _pid: Pid, cpus: &mut NoMask) -> Result<()> {
        match cpus.never {}
    }
}
