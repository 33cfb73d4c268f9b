//! In-memory provider.
//!
//! [`MockProvider`] models a machine of `nodes` memory nodes with a fixed
//! number of CPUs each. It implements the whole [`Provider`] contract,
//! remembers every placement change it is asked to make, counts bitmask
//! allocations and releases, and can be told to fail affinity or bind calls.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::provider::{Pid, Provider};
use crate::range;

/// Default total memory per node.
pub const DEFAULT_NODE_SIZE: u64 = 4 << 30;

/// Default free memory per node.
pub const DEFAULT_NODE_FREE: u64 = 3 << 30;

/// Distance from a node to itself.
pub const LOCAL_DISTANCE: u32 = 10;

/// Distance between two different nodes unless overridden.
pub const REMOTE_DISTANCE: u32 = 20;

/// Bitmask handle of [`MockProvider`].
#[derive(Debug)]
pub struct MockMask {
    bits: Vec<bool>,
}

impl MockMask {
    fn ones(&self) -> Vec<usize> {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, set)| **set)
            .map(|(bit, _)| bit)
            .collect()
    }
}

#[derive(Debug, Default)]
struct MockState {
    preferred: usize,
    bound: Option<Vec<usize>>,
    membind: Option<Vec<usize>>,
    local_alloc: bool,
    running_on: Option<usize>,
    affinity: HashMap<Pid, Vec<usize>>,
    calls: Vec<&'static str>,
}

/// A provider backed by an in-memory topology.
#[derive(Debug)]
pub struct MockProvider {
    available: bool,
    nodes: usize,
    possible_nodes: usize,
    cpu_nodes: Vec<usize>,
    node_size: Vec<u64>,
    node_free: Vec<u64>,
    distances: Vec<Vec<u32>>,
    affinity_error: Option<i32>,
    bind_error: Option<i32>,
    state: Mutex<MockState>,
    allocated: AtomicUsize,
    released: AtomicUsize,
}

impl MockProvider {
    /// A machine with `nodes` nodes of `cpus_per_node` CPUs each.
    ///
    /// CPUs are numbered node by node: node 0 owns CPUs
    /// `0..cpus_per_node`, node 1 the next block, and so on.
    pub fn new(nodes: usize, cpus_per_node: usize) -> MockProvider {
        let nodes = nodes.max(1);
        let cpu_nodes = (0..nodes * cpus_per_node).map(|cpu| cpu / cpus_per_node.max(1)).collect();
        MockProvider::with_cpu_nodes(nodes, cpu_nodes)
    }

    /// A machine with `nodes` nodes where CPU `c` lives on `cpu_nodes[c]`.
    pub fn with_cpu_nodes(nodes: usize, cpu_nodes: Vec<usize>) -> MockProvider {
        let nodes = nodes.max(1);
        let distances = (0..nodes)
            .map(|a| {
                (0..nodes)
                    .map(|b| if a == b { LOCAL_DISTANCE } else { REMOTE_DISTANCE })
                    .collect()
            })
            .collect();

        MockProvider {
            available: true,
            nodes,
            possible_nodes: nodes.max(64),
            cpu_nodes,
            node_size: vec![DEFAULT_NODE_SIZE; nodes],
            node_free: vec![DEFAULT_NODE_FREE; nodes],
            distances,
            affinity_error: None,
            bind_error: None,
            state: Mutex::new(MockState::default()),
            allocated: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    /// Report NUMA support as absent.
    pub fn unavailable(mut self) -> MockProvider {
        self.available = false;
        self
    }

    /// Override total and free memory of `node`.
    pub fn node_memory(mut self, node: usize, size: u64, free: u64) -> MockProvider {
        if node < self.nodes {
            self.node_size[node] = size;
            self.node_free[node] = free;
        }
        self
    }

    /// Override the distance between `a` and `b` in both directions.
    pub fn distance_between(mut self, a: usize, b: usize, distance: u32) -> MockProvider {
        if a < self.nodes && b < self.nodes {
            self.distances[a][b] = distance;
            self.distances[b][a] = distance;
        }
        self
    }

    /// Make every affinity get/set fail with the OS error `errno`.
    pub fn fail_affinity(mut self, errno: i32) -> MockProvider {
        self.affinity_error = Some(errno);
        self
    }

    /// Make `bind` and `set_membind` fail with the OS error `errno`.
    pub fn fail_bind(mut self, errno: i32) -> MockProvider {
        self.bind_error = Some(errno);
        self
    }

    /// Number of bitmasks handed out so far.
    pub fn allocations(&self) -> usize {
        self.allocated.load(Ordering::SeqCst)
    }

    /// Number of bitmasks released so far.
    pub fn releases(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Bitmasks allocated but not yet released.
    pub fn outstanding(&self) -> usize {
        self.allocations().saturating_sub(self.releases())
    }

    /// Names of the provider operations invoked, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    /// Whether `op` was invoked since the last [`clear_calls`](Self::clear_calls).
    pub fn was_called(&self, op: &str) -> bool {
        self.state().calls.iter().any(|call| *call == op)
    }

    /// Forget the recorded operation names.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Nodes the caller was bound to with `bind`.
    pub fn bound_nodes(&self) -> Option<Vec<usize>> {
        self.state().bound.clone()
    }

    /// Nodes memory allocation is restricted to.
    pub fn membind_nodes(&self) -> Option<Vec<usize>> {
        self.state().membind.clone()
    }

    /// Whether local allocation was requested.
    pub fn local_alloc(&self) -> bool {
        self.state().local_alloc
    }

    /// Node passed to the last successful `run_on_node`.
    pub fn running_on(&self) -> Option<usize> {
        self.state().running_on
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, op: &'static str) -> MutexGuard<'_, MockState> {
        let mut state = self.state();
        state.calls.push(op);
        state
    }

    fn num_cpus(&self) -> usize {
        self.cpu_nodes.len()
    }

    fn all_cpus(&self) -> Vec<usize> {
        (0..self.num_cpus()).collect()
    }

    fn cpus_of(&self, nodes: &[usize]) -> Vec<usize> {
        (0..self.num_cpus()).filter(|cpu| nodes.contains(&self.cpu_nodes[*cpu])).collect()
    }

    fn new_mask(&self, width: usize, ones: &[usize]) -> MockMask {
        let mut bits = vec![false; width];
        for id in ones {
            bits[*id] = true;
        }
        self.allocated.fetch_add(1, Ordering::SeqCst);
        MockMask { bits }
    }

    fn parse(&self, spec: &str, width: usize) -> Option<MockMask> {
        let ids = if spec.trim() == "all" {
            (0..width).collect()
        } else {
            range::parse_list(spec).ok()?
        };
        if ids.is_empty() || ids.iter().any(|id| *id >= width) {
            return None;
        }
        Some(self.new_mask(width, &ids))
    }

    fn invalid(op: &'static str, what: &str) -> Error {
        Error::Provider { op, source: io::Error::new(io::ErrorKind::InvalidInput, what.to_string()) }
    }

    fn os_error(op: &'static str, errno: i32) -> Error {
        Error::Provider { op, source: io::Error::from_raw_os_error(errno) }
    }
}

impl Provider for MockProvider {
    type Mask = MockMask;

    fn available(&self) -> bool {
        self.record("available");
        self.available
    }

    fn max_node(&self) -> usize {
        self.record("max_node");
        self.nodes - 1
    }

    fn max_possible_node(&self) -> usize {
        self.record("max_possible_node");
        self.possible_nodes - 1
    }

    fn num_possible_nodes(&self) -> usize {
        self.record("num_possible_nodes");
        self.possible_nodes
    }

    fn num_configured_nodes(&self) -> usize {
        self.record("num_configured_nodes");
        self.nodes
    }

    fn num_configured_cpus(&self) -> usize {
        self.record("num_configured_cpus");
        self.num_cpus()
    }

    fn num_task_cpus(&self) -> usize {
        let state = self.record("num_task_cpus");
        state.affinity.get(&0).map_or(self.num_cpus(), Vec::len)
    }

    fn num_task_nodes(&self) -> usize {
        let state = self.record("num_task_nodes");
        state.membind.as_ref().map_or(self.nodes, Vec::len)
    }

    fn preferred(&self) -> usize {
        self.record("preferred").preferred
    }

    fn set_preferred(&self, node: usize) {
        let mut state = self.record("set_preferred");
        state.preferred = node;
        state.local_alloc = false;
    }

    fn node_size(&self, node: usize, free: Option<&mut u64>) -> Result<u64> {
        self.record("node_size");
        if node >= self.nodes {
            return Err(MockProvider::invalid("node_size", "no such node"));
        }
        if let Some(slot) = free {
            *slot = self.node_free[node];
        }
        Ok(self.node_size[node])
    }

    fn node_of_cpu(&self, cpu: usize) -> Result<usize> {
        self.record("node_of_cpu");
        self.cpu_nodes
            .get(cpu)
            .copied()
            .ok_or_else(|| MockProvider::invalid("node_of_cpu", "no such cpu"))
    }

    fn distance(&self, node1: usize, node2: usize) -> Result<u32> {
        self.record("distance");
        self.distances
            .get(node1)
            .and_then(|row| row.get(node2))
            .copied()
            .ok_or_else(|| MockProvider::invalid("distance", "no such node"))
    }

    fn allocate_cpumask(&self) -> Result<MockMask> {
        self.record("allocate_cpumask");
        Ok(self.new_mask(self.num_cpus(), &[]))
    }

    fn parse_nodestring(&self, spec: &str) -> Option<MockMask> {
        self.record("parse_nodestring");
        self.parse(spec, self.nodes)
    }

    fn parse_cpustring(&self, spec: &str) -> Option<MockMask> {
        self.record("parse_cpustring");
        self.parse(spec, self.num_cpus())
    }

    fn bitmask_isbitset(&self, mask: &MockMask, bit: usize) -> bool {
        mask.bits.get(bit).copied().unwrap_or(false)
    }

    fn bitmask_setbit(&self, mask: &mut MockMask, bit: usize) {
        if let Some(slot) = mask.bits.get_mut(bit) {
            *slot = true;
        }
    }

    fn bitmask_free(&self, _mask: MockMask) {
        self.record("bitmask_free");
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn bind(&self, nodes: &MockMask) -> Result<()> {
        let mut state = self.record("bind");
        if let Some(errno) = self.bind_error {
            return Err(MockProvider::os_error("bind", errno));
        }
        let nodes = nodes.ones();
        state.affinity.insert(0, self.cpus_of(&nodes));
        state.membind = Some(nodes.clone());
        state.bound = Some(nodes);
        Ok(())
    }

    fn set_membind(&self, nodes: &MockMask) -> Result<()> {
        let mut state = self.record("set_membind");
        if let Some(errno) = self.bind_error {
            return Err(MockProvider::os_error("set_membind", errno));
        }
        state.membind = Some(nodes.ones());
        Ok(())
    }

    fn run_on_node(&self, node: usize) -> Result<()> {
        let mut state = self.record("run_on_node");
        if node >= self.nodes {
            return Err(MockProvider::invalid("run_on_node", "no such node"));
        }
        state.affinity.insert(0, self.cpus_of(&[node]));
        state.running_on = Some(node);
        Ok(())
    }

    fn set_localalloc(&self) {
        self.record("set_localalloc").local_alloc = true;
    }

    fn sched_setaffinity(&self, pid: Pid, cpus: &MockMask) -> Result<()> {
        let mut state = self.record("sched_setaffinity");
        if let Some(errno) = self.affinity_error {
            return Err(MockProvider::os_error("sched_setaffinity", errno));
        }
        if pid < 0 {
            return Err(MockProvider::invalid("sched_setaffinity", "no such task"));
        }
        let cpus = cpus.ones();
        if cpus.is_empty() {
            return Err(MockProvider::invalid("sched_setaffinity", "empty cpu set"));
        }
        state.affinity.insert(pid, cpus);
        Ok(())
    }

    fn sched_getaffinity(&self, pid: Pid, cpus: &mut MockMask) -> Result<()> {
        let state = self.record("sched_getaffinity");
        if let Some(errno) = self.affinity_error {
            return Err(MockProvider::os_error("sched_getaffinity", errno));
        }
        if pid < 0 {
            return Err(MockProvider::invalid("sched_getaffinity", "no such task"));
        }
        let allowed = state.affinity.get(&pid).cloned().unwrap_or_else(|| self.all_cpus());
        for cpu in allowed {
            self.bitmask_setbit(cpus, cpu);
        }
        Ok(())
    }
}
