//! Checks against the machine's own libnuma.
//!
//! Every test returns early when libnuma is missing or reports no NUMA
//! support, and multi-node checks are skipped on single-node machines.

use numabase::{Error, NativeProvider, Numa, NumaOptions};

fn open() -> Option<Numa<NativeProvider>> {
    let _ = env_logger::builder().is_test(true).try_init();
    match Numa::open() {
        Ok(numa) if numa.available() => Some(numa),
        Ok(_) => {
            println!("NUMA not available, skipping");
            None
        }
        Err(err) => {
            println!("{}, skipping", err);
            None
        }
    }
}

#[test]
fn missing_library_is_unavailable() {
    let result = NumaOptions::new().library("libnuma-does-not-exist.so.0").open();
    assert!(matches!(result, Err(Error::Unavailable(_))));
}

#[test]
fn counts_are_consistent() {
    let Some(numa) = open() else { return };
    let topology = numa.topology();

    assert!(topology.max_possible_node() >= topology.max_node());
    assert!(topology.num_configured_nodes() >= 1);
    assert!(topology.num_configured_cpus() >= 1);
    assert!(topology.num_task_cpus() >= 1);
    assert!(topology.num_task_nodes() >= 1);
    println!("NUMA max node: {}", topology.max_node());
    println!("NUMA num configured cpus: {}", topology.num_configured_cpus());
}

#[test]
fn node_zero_has_memory() {
    let Some(numa) = open() else { return };
    let topology = numa.topology();

    let size = topology.node_size(0).unwrap();
    let free = topology.node_free_size(0).unwrap();
    assert!(size > 0);
    assert!(size >= free);
    assert!(matches!(topology.node_size(topology.max_node() + 1), Err(Error::OutOfRange { .. })));
}

#[test]
fn cpu_zero_lives_on_a_known_node() {
    let Some(numa) = open() else { return };
    let topology = numa.topology();

    let node = topology.node_of_cpu(0).unwrap();
    assert!(node <= topology.max_node());
    assert!(topology.node_to_cpus(node).unwrap().contains(&0));
}

#[test]
fn local_distance_is_reflexive() {
    let Some(numa) = open() else { return };
    let topology = numa.topology();
    let node = topology.node_of_cpu(0).unwrap();

    assert_eq!(topology.distance(node, node).unwrap(), 10);
}

#[test]
fn isolated_cpus_parse() {
    let Some(numa) = open() else { return };
    let cpus = numa.topology().isolated_cpus().unwrap();
    let configured = numa.topology().num_configured_cpus();
    assert!(cpus.iter().all(|cpu| *cpu < configured));
}

#[test]
fn affinity_round_trip_in_child_thread() {
    let Some(numa) = open() else { return };

    // A fresh thread keeps the change away from the test harness threads.
    std::thread::scope(|scope| {
        scope
            .spawn(|| {
                let placement = numa.placement();
                let affinity = placement.sched_getaffinity(0).unwrap();
                assert!(!affinity.is_empty());
                if affinity.len() < 2 {
                    println!("Need more than one cpu to test get/set affinity");
                    return;
                }
                let last = *affinity.last().unwrap();
                placement.sched_cpus_setaffinity(0, &last.to_string()).unwrap();
                assert_eq!(placement.sched_getaffinity(0).unwrap(), vec![last]);
            })
            .join()
            .unwrap();
    });
}

#[test]
fn invalid_specs_are_rejected_by_libnuma() {
    let Some(numa) = open() else { return };
    let past_end = numa.topology().max_possible_node() + 1;
    assert!(matches!(
        numa.placement().set_membind(&past_end.to_string()),
        Err(Error::InvalidNodeSpec(_))
    ));
    assert!(matches!(
        numa.placement().sched_cpus_setaffinity(0, "not-a-cpu"),
        Err(Error::InvalidCpuSpec(_))
    ));
}
