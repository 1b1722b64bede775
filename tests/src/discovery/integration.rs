use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use sweepr_common::config::ScanConfig;
use sweepr_common::network::ports::PortRange;
use sweepr_common::network::range::NetworkRange;
use sweepr_common::result::ScanResult;
use sweepr_core::network::sender::probe;
use sweepr_core::{
    Phase, ProbeOutcome, ProbeSender, ProbeTask, ProgressSink, ScanError, ScanEvent, Scanner,
    WorkerPool,
};
use tokio_util::sync::CancellationToken;

use crate::utils::ScriptedNetwork;

fn addr(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(192, 0, 2, last)
}

fn scan_config(workers: usize) -> ScanConfig {
    ScanConfig {
        workers,
        timeout: Duration::from_millis(200),
        ..ScanConfig::default()
    }
}

fn scanner(network: Arc<ScriptedNetwork>, workers: usize) -> Scanner {
    Scanner::new(network, &scan_config(workers)).expect("valid config")
}

#[tokio::test]
async fn small_network_end_to_end() {
    let network = Arc::new(
        ScriptedNetwork::new()
            .host(addr(1))
            .open(addr(1), &[80])
            .closed(addr(1), &[22]),
    );
    let range: NetworkRange = "192.0.2.0/30".parse().unwrap();
    let ports: PortRange = "22,80,443".parse().unwrap();

    let result: ScanResult = scanner(network.clone(), 4).run(&range, &ports).await.unwrap();

    let expected = ScanResult::from(BTreeMap::from([(addr(1), BTreeSet::from([80]))]));
    assert_eq!(result, expected);

    // .1 and .2 swept, then three SYNs to .1 only
    let probes = network.probes();
    assert_eq!(probes.len(), 5);
    assert!(probes
        .iter()
        .filter(|task| matches!(task, ProbeTask::Syn { .. }))
        .all(|task| task.target() == addr(1)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slash_24_is_swept_once_per_host() {
    let network = Arc::new(
        ScriptedNetwork::new()
            .host(addr(10))
            .host(addr(20))
            .host(addr(254))
            .open(addr(10), &[22, 443])
            .open(addr(254), &[8080])
            .latency(Duration::from_millis(1)),
    );
    let range: NetworkRange = "192.0.2.0/24".parse().unwrap();
    let ports: PortRange = "1-1023,8080".parse().unwrap();

    let result = scanner(network.clone(), 8).run(&range, &ports).await.unwrap();

    let echoes: Vec<Ipv4Addr> = network
        .probes()
        .iter()
        .filter(|task| matches!(task, ProbeTask::Echo { .. }))
        .map(ProbeTask::target)
        .collect();
    assert_eq!(echoes.len(), 254);
    assert_eq!(echoes.iter().collect::<HashSet<_>>().len(), 254);
    assert!(network.peak_in_flight() <= 8);

    assert_eq!(
        result.hosts().copied().collect::<Vec<_>>(),
        vec![addr(10), addr(20), addr(254)]
    );
    for (host, open) in result.iter() {
        assert!(range.contains(*host));
        assert!(open.iter().all(|port| ports.contains(*port)));
    }
    assert_eq!(result.open_ports(&addr(10)), Some(&BTreeSet::from([22, 443])));
    assert_eq!(result.open_ports(&addr(20)), Some(&BTreeSet::new()));
    assert_eq!(result.open_ports(&addr(254)), Some(&BTreeSet::from([8080])));
}

#[tokio::test]
async fn silent_network_gives_empty_map() {
    let network = Arc::new(ScriptedNetwork::new());
    let range: NetworkRange = "192.0.2.0/28".parse().unwrap();

    let result = scanner(network.clone(), 4)
        .run(&range, &PortRange::default())
        .await
        .unwrap();

    assert!(result.is_empty());
    assert!(network
        .probes()
        .iter()
        .all(|task| matches!(task, ProbeTask::Echo { .. })));
}

#[tokio::test]
async fn static_network_scans_identically_twice() {
    let network = Arc::new(
        ScriptedNetwork::new()
            .host(addr(3))
            .host(addr(9))
            .open(addr(3), &[21, 25])
            .open(addr(9), &[110]),
    );
    let range = NetworkRange::from_parts("192.0.2.0", Some("255.255.255.240")).unwrap();
    let ports = PortRange::interval(1, 512).unwrap();
    let engine = scanner(network, 5);

    let first = engine.run(&range, &ports).await.unwrap();
    let second = engine.run(&range, &ports).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.open_port_count(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn silent_probes_time_out_in_parallel() {
    let timeout = Duration::from_millis(50);
    let network = Arc::new(ScriptedNetwork::new().host(addr(1)).waits_out_silence());
    let cfg = ScanConfig {
        workers: 4,
        timeout,
        ..ScanConfig::default()
    };
    let engine = Scanner::new(network.clone(), &cfg).unwrap();
    let range: NetworkRange = "192.0.2.0/28".parse().unwrap();
    let ports = PortRange::interval(1, 8).unwrap();

    let started = Instant::now();
    let result = engine.run(&range, &ports).await.unwrap();
    let elapsed = started.elapsed();

    // 13 silent echoes and 8 silent SYNs: ceil(13 / 4) + ceil(8 / 4) timeouts
    // back to back, where one probe at a time would need 21
    assert_eq!(result.open_ports(&addr(1)), Some(&BTreeSet::new()));
    assert!(elapsed >= timeout * 6, "finished too early: {elapsed:?}");
    assert!(elapsed < timeout * 12, "timeouts were not overlapped: {elapsed:?}");
    assert!(network.peak_in_flight() <= 4);
}

#[tokio::test]
async fn panicking_probe_is_treated_as_silence() {
    let network = Arc::new(
        ScriptedNetwork::new()
            .host(addr(1))
            .host(addr(2))
            .open(addr(1), &[80])
            .panics_on(ProbeTask::Echo { target: addr(2) })
            .panics_on(ProbeTask::Syn { target: addr(1), port: 80 }),
    );
    let range: NetworkRange = "192.0.2.0/30".parse().unwrap();
    let ports: PortRange = "80,81".parse().unwrap();

    let result = scanner(network, 2).run(&range, &ports).await.unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result.open_ports(&addr(1)), Some(&BTreeSet::new()));
}

#[tokio::test]
async fn interrupt_during_port_phase_keeps_finished_hosts() {
    let cancel = CancellationToken::new();
    let network = Arc::new(
        ScriptedNetwork::new()
            .host(addr(1))
            .host(addr(2))
            .open(addr(1), &[7])
            // two echoes, then the tenth SYN to .1
            .cancel_after(12, cancel.clone()),
    );
    let range: NetworkRange = "192.0.2.0/30".parse().unwrap();
    let engine = scanner(network.clone(), 1).with_cancellation(cancel);

    let err = engine.run(&range, &PortRange::default()).await.unwrap_err();

    let partial = match err {
        ScanError::Cancelled { partial } => partial,
        other => panic!("expected a cancelled scan, got {other}"),
    };
    assert_eq!(partial.open_ports(&addr(1)), Some(&BTreeSet::from([7])));
    assert!(!partial.contains_host(&addr(2)));
    assert!(network.probes().len() < 2 + PortRange::default().len());
}

#[tokio::test]
async fn progress_events_follow_both_phases() {
    let network = Arc::new(
        ScriptedNetwork::new()
            .host(addr(2))
            .open(addr(2), &[443]),
    );
    let (sink, mut events) = ProgressSink::channel(256);
    let range: NetworkRange = "192.0.2.0/29".parse().unwrap();
    let ports: PortRange = "443,444".parse().unwrap();

    let engine = scanner(network, 3).with_progress(sink);
    engine.run(&range, &ports).await.unwrap();
    drop(engine);

    let mut seen = Vec::new();
    while let Some(event) = events.recv().await {
        seen.push(event);
    }

    assert_eq!(
        seen.first(),
        Some(&ScanEvent::PhaseStarted { phase: Phase::Sweep, total: 6 })
    );
    assert!(seen.contains(&ScanEvent::HostAlive(addr(2))));
    assert!(seen.contains(&ScanEvent::PhaseStarted { phase: Phase::Ports(addr(2)), total: 2 }));
    assert!(seen.contains(&ScanEvent::PortOpen(addr(2), 443)));
    assert_eq!(
        seen.last(),
        Some(&ScanEvent::PhaseFinished { phase: Phase::Ports(addr(2)), found: 1 })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ten_thousand_probes_on_four_workers() {
    let target = addr(77);
    let network = Arc::new(ScriptedNetwork::new().host(target).open(target, &[1, 5000, 10000]));
    let sender: Arc<dyn ProbeSender> = network.clone();
    let pool = WorkerPool::new(4);

    let tasks = (1..=10_000u16).map(move |port| ProbeTask::Syn { target, port });
    let mut outcomes: Vec<ProbeOutcome> = Vec::new();
    let summary = pool
        .run_all(
            tasks,
            move |task| {
                let sender = sender.clone();
                async move { probe(sender.as_ref(), task, Duration::from_millis(50)).await }
            },
            |outcome| outcomes.push(outcome),
        )
        .await;

    assert_eq!(summary.submitted, 10_000);
    assert_eq!(summary.completed, 10_000);
    assert!(!summary.cancelled);
    assert_eq!(outcomes.len(), 10_000);

    let distinct: HashSet<ProbeOutcome> = outcomes.iter().copied().collect();
    assert_eq!(distinct.len(), 10_000);
    assert_eq!(
        outcomes
            .iter()
            .filter(|outcome| matches!(outcome, ProbeOutcome::Open(..)))
            .count(),
        3
    );
    assert!(network.peak_in_flight() <= 4);
}

/// Needs CAP_NET_RAW: `cargo test -- --ignored` as root.
#[tokio::test]
#[ignore]
async fn sweep_loopback_with_raw_sockets() {
    let transport = sweepr_core::RawTransport::open().expect("raw sockets");
    let engine = Scanner::new(Arc::new(transport), &scan_config(2)).unwrap();
    let range: NetworkRange = "127.0.0.1".parse().unwrap();

    let live = engine.sweep(&range).await;

    assert_eq!(live, BTreeSet::from([Ipv4Addr::LOCALHOST]));
}
