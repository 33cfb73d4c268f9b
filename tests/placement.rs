use numabase::{Error, IdKind, MockProvider, Numa};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn machine() -> Numa<MockProvider> {
    init();
    Numa::with_provider(MockProvider::new(2, 4))
}

fn assert_balanced(numa: &Numa<MockProvider>) {
    let provider = numa.provider();
    assert_eq!(
        provider.allocations(),
        provider.releases(),
        "bitmask leak: {} allocated, {} released",
        provider.allocations(),
        provider.releases()
    );
}

#[test]
fn set_preferred_changes_preferred_node() {
    let numa = machine();
    numa.placement().set_preferred(1).unwrap();
    assert_eq!(numa.topology().preferred(), 1);
}

#[test]
fn set_preferred_rejects_unknown_node() {
    let numa = machine();
    numa.provider().clear_calls();
    match numa.placement().set_preferred(2) {
        Err(Error::OutOfRange { kind: IdKind::Node, id: 2, max: 1 }) => {}
        other => panic!("expected OutOfRange, got {:?}", other),
    }
    assert!(!numa.provider().was_called("set_preferred"));
    assert_eq!(numa.topology().preferred(), 0);
}

#[test]
fn bind_restricts_memory_and_scheduling() {
    let numa = machine();
    numa.placement().bind("1").unwrap();

    assert_eq!(numa.provider().bound_nodes(), Some(vec![1]));
    assert_eq!(numa.provider().membind_nodes(), Some(vec![1]));
    assert_eq!(numa.placement().sched_getaffinity(0).unwrap(), vec![4, 5, 6, 7]);
    assert_balanced(&numa);
}

#[test]
fn bind_rejects_bad_specs() {
    let numa = machine();
    for spec in ["", "7", "x", "1-0", "0-18446744073709551615"] {
        match numa.placement().bind(spec) {
            Err(Error::InvalidNodeSpec(text)) => assert_eq!(text, spec),
            other => panic!("{:?}: expected InvalidNodeSpec, got {:?}", spec, other),
        }
    }
    assert!(!numa.provider().was_called("bind"));
    assert_eq!(numa.provider().allocations(), 0);
}

#[test]
fn bind_failure_still_releases_mask() {
    init();
    let numa = Numa::with_provider(MockProvider::new(2, 2).fail_bind(libc::EPERM));

    match numa.placement().bind("0-1") {
        Err(Error::Provider { op: "bind", source }) => {
            assert_eq!(source.raw_os_error(), Some(libc::EPERM));
        }
        other => panic!("expected provider failure, got {:?}", other),
    }
    assert!(numa.placement().set_membind("0").is_err());
    assert_eq!(numa.provider().allocations(), 2);
    assert_balanced(&numa);
}

#[test]
fn set_membind_leaves_scheduling_alone() {
    let numa = machine();
    numa.placement().set_membind("0").unwrap();

    assert_eq!(numa.provider().membind_nodes(), Some(vec![0]));
    assert_eq!(numa.provider().bound_nodes(), None);
    assert_eq!(numa.topology().num_task_nodes(), 1);
    assert_eq!(numa.placement().sched_getaffinity(0).unwrap().len(), 8);
    assert_balanced(&numa);
}

#[test]
fn run_on_node_moves_the_task() {
    let numa = machine();
    numa.placement().run_on_node(1).unwrap();

    assert_eq!(numa.provider().running_on(), Some(1));
    assert_eq!(numa.placement().sched_getaffinity(0).unwrap(), vec![4, 5, 6, 7]);
}

#[test]
fn run_on_node_rejects_unknown_node() {
    let numa = machine();
    assert!(matches!(numa.placement().run_on_node(5), Err(Error::OutOfRange { .. })));
    assert!(!numa.provider().was_called("run_on_node"));
}

#[test]
fn set_localalloc_is_recorded() {
    let numa = machine();
    numa.placement().set_localalloc();
    assert!(numa.provider().local_alloc());
}

#[test]
fn single_cpu_affinity_round_trips() {
    let numa = machine();
    let placement = numa.placement();

    let all = placement.sched_getaffinity(0).unwrap();
    assert!(all.len() > 1);

    let last = *all.last().unwrap();
    placement.sched_cpus_setaffinity(0, &last.to_string()).unwrap();
    assert_eq!(placement.sched_getaffinity(0).unwrap(), vec![last]);
    assert_eq!(numa.topology().num_task_cpus(), 1);
    assert_balanced(&numa);
}

#[test]
fn affinity_for_other_task() {
    let numa = machine();
    let placement = numa.placement();

    placement.sched_cpus_setaffinity(4242, "0-1,6").unwrap();
    assert_eq!(placement.sched_getaffinity(4242).unwrap(), vec![0, 1, 6]);
    assert_eq!(placement.sched_getaffinity(0).unwrap().len(), 8);
    assert_balanced(&numa);
}

#[test]
fn invalid_cpu_spec_is_rejected() {
    let numa = machine();
    for spec in ["", "8", "a-b", "3-1"] {
        assert!(
            matches!(numa.placement().sched_cpus_setaffinity(0, spec), Err(Error::InvalidCpuSpec(_))),
            "{:?} accepted",
            spec
        );
    }
    assert!(!numa.provider().was_called("sched_setaffinity"));
    assert_balanced(&numa);
}

#[test]
fn huge_ranges_are_rejected_not_expanded() {
    let numa = machine();
    let placement = numa.placement();
    let huge = "0-18446744073709551615";

    assert!(matches!(placement.set_membind(huge), Err(Error::InvalidNodeSpec(_))));
    assert!(matches!(placement.sched_cpus_setaffinity(0, huge), Err(Error::InvalidCpuSpec(_))));
    assert!(matches!(placement.sched_nodes_setaffinity(0, huge), Err(Error::InvalidNodeSpec(_))));
    assert_eq!(numa.provider().allocations(), 0);
}

#[test]
fn nodes_affinity_expands_to_node_cpus() {
    let numa = machine();
    let placement = numa.placement();

    placement.sched_nodes_setaffinity(0, "1").unwrap();
    assert_eq!(placement.sched_getaffinity(0).unwrap(), vec![4, 5, 6, 7]);

    placement.sched_nodes_setaffinity(0, "0-1").unwrap();
    assert_eq!(placement.sched_getaffinity(0).unwrap(), (0..8).collect::<Vec<_>>());
    assert_balanced(&numa);
}

#[test]
fn nodes_affinity_without_cpus_is_rejected() {
    init();
    // node 1 has memory but no cpus
    let numa = Numa::with_provider(MockProvider::with_cpu_nodes(2, vec![0, 0]));

    assert!(matches!(
        numa.placement().sched_nodes_setaffinity(0, "1"),
        Err(Error::InvalidNodeSpec(_))
    ));
    assert!(!numa.provider().was_called("sched_setaffinity"));
    assert_eq!(numa.provider().allocations(), 2);
    assert_balanced(&numa);
}

#[test]
fn permission_errors_propagate_and_release() {
    init();
    let numa = Numa::with_provider(MockProvider::new(2, 4).fail_affinity(libc::EPERM));
    let placement = numa.placement();

    for result in [
        placement.sched_cpus_setaffinity(1, "0"),
        placement.sched_nodes_setaffinity(1, "0"),
        placement.sched_getaffinity(1).map(|_| ()),
    ] {
        match result {
            Err(Error::Provider { source, .. }) => assert_eq!(source.raw_os_error(), Some(libc::EPERM)),
            other => panic!("expected provider failure, got {:?}", other),
        }
    }
    // one mask for cpus, two for nodes, one for get
    assert_eq!(numa.provider().allocations(), 4);
    assert_balanced(&numa);
}

#[test]
fn set_cpu_affinity_validates_before_allocating() {
    let numa = machine();
    let placement = numa.placement();

    match placement.set_cpu_affinity(0, &[1, 8]) {
        Err(Error::OutOfRange { kind: IdKind::Cpu, id: 8, max: 7 }) => {}
        other => panic!("expected OutOfRange, got {:?}", other),
    }
    assert!(matches!(placement.set_cpu_affinity(0, &[]), Err(Error::InvalidCpuSpec(_))));
    assert_eq!(numa.provider().allocations(), 0);

    placement.set_cpu_affinity(0, &[3, 1, 2, 7]).unwrap();
    assert_eq!(placement.sched_getaffinity(0).unwrap(), vec![1, 2, 3, 7]);
    assert_balanced(&numa);
}

#[test]
fn concurrent_callers_do_not_share_masks() {
    let numa = Numa::with_provider(MockProvider::new(2, 4));

    std::thread::scope(|scope| {
        for worker in 0..4 {
            let numa = &numa;
            scope.spawn(move || {
                for _ in 0..50 {
                    let cpu = worker % 8;
                    numa.placement().sched_cpus_setaffinity(100 + worker as i32, &cpu.to_string()).unwrap();
                    assert_eq!(numa.placement().sched_getaffinity(100 + worker as i32).unwrap(), vec![cpu]);
                }
            });
        }
    });

    assert_eq!(numa.provider().allocations(), 400);
    assert_balanced(&numa);
}
