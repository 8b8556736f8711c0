//! End to end scenarios over a simulated multi-replica network.
//!
//! Run with: cargo test --test reflectors

use std::time::{Duration, Instant};

use refdht::{
    CrawlerBuilder, Document, Family, Id, MrefdConfig, PeerEntry, Peers, Query, QueryError,
    RecordKind, ReflectorConfig, SigningKey, Testnet, Value, Version, Where,
};

const TIMEOUT: Duration = Duration::from_secs(10);

fn signer(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

fn peers(timestamp: i64, sequence: u32, list: &[(&str, &str)]) -> Document {
    Document::Peers(Peers {
        timestamp,
        sequence,
        list: list
            .iter()
            .map(|(callsign, modules)| PeerEntry::new(callsign, modules, timestamp - 60))
            .collect(),
    })
}

fn value(signer: &SigningKey, document: &Document) -> Value {
    document.to_value(signer, Family::Mrefd).unwrap()
}

#[test]
fn newest_revision_wins_across_replicas() {
    let signer = signer(1);
    let key = Id::hash("M17-AAA");

    let mut testnet = Testnet::new(4);
    testnet.put(0, key, value(&signer, &peers(100, 0, &[("M17-OLD", "A")])));
    testnet.put(1, key, value(&signer, &peers(100, 1, &[("M17-BBB", "A")])));
    testnet.put(2, key, value(&signer, &peers(100, 2, &[("M17-CCC", "A")])));
    testnet.put(3, key, value(&signer, &peers(99, 7, &[("M17-DDD", "A")])));

    for _ in 0..10 {
        let snapshot = Query::begin(&testnet, "m17-aaa", Where::kind(RecordKind::Peers))
            .unwrap()
            .wait(TIMEOUT)
            .unwrap();

        assert_eq!(snapshot.peers.version(), Version::new(100, 2));
        assert_eq!(snapshot.peers.get().unwrap().list[0].callsign, "M17-CCC");
        assert!(snapshot.config.is_empty());
    }
}

#[test]
fn forged_revision_is_ignored() {
    let signer = signer(2);
    let key = Id::hash("M17-AAA");

    let honest = value(&signer, &peers(100, 0, &[("M17-BBB", "A")]));
    let newer = value(&signer, &peers(200, 0, &[("M17-EVIL", "A")]));
    let forged = Value::new_signed_unchecked(
        *newer.owner(),
        *honest.signature(),
        newer.id(),
        newer.user_type(),
        newer.data(),
    );

    let mut testnet = Testnet::new(2);
    testnet.put_all(key, honest);
    testnet.put(1, key, forged);

    let query = Query::begin(&testnet, "M17-AAA", Where::any()).unwrap();
    let reconciler = query.reconciler().clone();
    let snapshot = query.wait(TIMEOUT).unwrap();

    assert_eq!(snapshot.peers.timestamp(), 100);
    assert_eq!(reconciler.stats().signature_invalid, 1);
    assert_eq!(reconciler.stats().accepted, 1);
}

#[test]
fn failed_get_keeps_partial_state() {
    let signer = signer(3);
    let key = Id::hash("M17-AAA");

    let mut testnet = Testnet::new(2);
    testnet.publish(
        &signer,
        "M17-AAA",
        &Document::Config(ReflectorConfig::Mrefd(MrefdConfig {
            timestamp: 100,
            callsign: "M17-AAA".into(),
            modules: "AC".into(),
            ..Default::default()
        })),
    )
    .unwrap();
    testnet.fail(key);

    let error = Query::begin(&testnet, "M17-AAA", Where::any())
        .unwrap()
        .wait(TIMEOUT)
        .unwrap_err();

    assert!(matches!(error, QueryError::Failed { .. }));
    assert_eq!(error.partial().config.timestamp(), 100);
}

#[test]
fn crawl_mesh() {
    let mut testnet = Testnet::new(3).with_max_delay(Duration::from_millis(5));

    let callsigns: Vec<String> = (0..40).map(|i| format!("M17-{:03}", i)).collect();

    for (i, callsign) in callsigns.iter().enumerate() {
        let list: Vec<(&str, &str)> = [1, 7, 13]
            .iter()
            .map(|step| (callsigns[(i + step) % callsigns.len()].as_str(), "AC"))
            .chain([("M17-ISL", "B")])
            .collect();

        testnet
            .publish(&signer(i as u8), callsign, &peers(100, 0, &list))
            .unwrap();
    }

    let start = Instant::now();
    let serial = CrawlerBuilder::new()
        .workers(1)
        .crawl(&testnet, "M17-000", 'c')
        .unwrap();
    let serial_time = start.elapsed();

    let start = Instant::now();
    let pooled = CrawlerBuilder::new()
        .workers(16)
        .crawl(&testnet, "M17-000", 'c')
        .unwrap();
    let pooled_time = start.elapsed();

    println!("serial crawl: {:?}, pooled crawl: {:?}", serial_time, pooled_time);

    assert_eq!(serial, pooled);
    assert_eq!(serial.len(), 40);
    assert!(!serial.contains("M17-ISL"));
    assert!(serial.iter().all(|(_, neighbors)| neighbors.len() == 3));

    for callsign in callsigns.iter() {
        assert_eq!(testnet.gets_for(&Id::hash(callsign)), 2);
    }
}
