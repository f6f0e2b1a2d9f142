use crate::payload::{merge, PayloadAccumulator, PayloadNode};
use crate::value_store::ValueStore;
use doppler_common::types::{Sample, Scalar};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

fn sample(seq: u64, timestamp: i64, name: &str, value: Option<Scalar>) -> Sample {
    Sample {
        seq,
        timestamp,
        name: name.to_string(),
        value,
    }
}

#[test]
fn dedupe_store_only_records_changes() {
    let store = ValueStore::deduping();
    store.collect_at(1, "os.version", Some("1.0".into()), false);
    store.collect_at(2, "os.version", Some("1.0".into()), false);
    assert_eq!(store.len(), 1);

    store.collect_at(3, "os.version", Some("1.1".into()), false);
    assert_eq!(store.len(), 2);

    let names: Vec<Option<Scalar>> = store.get_all().into_iter().map(|s| s.value).collect();
    assert_eq!(names, vec![Some("1.0".into()), Some("1.1".into())]);
}

#[test]
fn dedupe_store_counts_value_changes_per_name() {
    let store = ValueStore::deduping();
    let values = [1, 1, 2, 2, 2, 1, 3, 3];
    for (ts, v) in values.iter().enumerate() {
        store.collect_at(ts as i64, "x", Some(Scalar::from(*v)), false);
        store.collect_at(ts as i64, "y", Some(Scalar::from(7)), false);
    }
    let xs = store.get_all().into_iter().filter(|s| s.name == "x").count();
    let ys = store.get_all().into_iter().filter(|s| s.name == "y").count();
    // 1, 2, 1, 3
    assert_eq!(xs, 4);
    assert_eq!(ys, 1);
}

#[test]
fn forced_collection_bypasses_dedupe() {
    let store = ValueStore::deduping();
    store.collect_at(1, "system.memory.total", Some(Scalar::Int(2048)), false);
    store.collect_at(2, "system.memory.total", Some(Scalar::Int(2048)), true);
    assert_eq!(store.len(), 2);
}

#[test]
fn dedupe_treats_null_as_a_value() {
    let store = ValueStore::deduping();
    store.collect_at(1, "redis.version", None, false);
    store.collect_at(2, "redis.version", None, false);
    store.collect_at(3, "redis.version", Some("7.2".into()), false);
    assert_eq!(store.len(), 2);
}

#[test]
fn appending_store_keeps_every_sample() {
    let store = ValueStore::appending();
    store.collect_at(1, "cpu.idle", Some(Scalar::Int(95)), false);
    store.collect_at(1, "cpu.idle", Some(Scalar::Int(95)), false);
    store.register_at(2, "agent.started");
    assert_eq!(store.len(), 3);
    assert_eq!(store.get_all()[2].value, None);
}

#[test]
fn get_completed_respects_cutoff() {
    let store = ValueStore::appending();
    for ts in [98, 99, 100, 101, 100] {
        store.collect_at(ts, "load.1", Some(Scalar::Int(ts)), false);
    }
    let completed = store.get_completed(100);
    assert!(completed.iter().all(|s| s.timestamp < 100));
    assert_eq!(completed.len(), 2);

    // Insertion order, not timestamp order.
    let all: Vec<i64> = store.get_completed(102).iter().map(|s| s.timestamp).collect();
    assert_eq!(all, vec![98, 99, 100, 101, 100]);
}

#[test]
fn get_completed_is_repeatable_until_removed() {
    let store = ValueStore::appending();
    store.collect_at(10, "a", Some(Scalar::Int(1)), false);
    store.collect_at(11, "b", Some(Scalar::Int(2)), false);

    let first = store.get_completed(20);
    let second = store.get_completed(20);
    assert_eq!(first, second);
    assert_eq!(store.len(), 2);

    assert_eq!(store.remove(&first), 2);
    assert!(store.get_completed(20).is_empty());
}

#[test]
fn remove_matches_sequence_not_value() {
    let store = ValueStore::appending();
    store.collect_at(10, "cpu.idle", Some(Scalar::Int(95)), false);
    let drained = store.get_completed(11);

    // Same tuple collected again between drain and removal.
    store.collect_at(10, "cpu.idle", Some(Scalar::Int(95)), false);
    assert_eq!(store.remove(&drained), 1);

    let left = store.get_all();
    assert_eq!(left.len(), 1);
    assert_ne!(left[0].seq, drained[0].seq);
}

#[test]
fn remove_tolerates_missing_samples() {
    let store = ValueStore::appending();
    store.collect_at(1, "a", Some(Scalar::Int(1)), false);
    store.collect_at(2, "b", Some(Scalar::Int(2)), false);
    let drained = store.get_completed(3);

    assert_eq!(store.remove(&drained[..1]), 1);
    // Second removal of the same batch only removes what is still there.
    assert_eq!(store.remove(&drained), 1);
    assert!(store.is_empty());
    assert_eq!(store.remove(&[sample(999, 1, "ghost", None)]), 0);
}

#[test]
fn bounded_store_drops_oldest() {
    let store = ValueStore::appending().with_max_samples(3);
    for ts in 0..5 {
        store.collect_at(ts, "n", Some(Scalar::Int(ts)), false);
    }
    let kept: Vec<i64> = store.get_all().iter().map(|s| s.timestamp).collect();
    assert_eq!(kept, vec![2, 3, 4]);
    assert_eq!(store.dropped(), 2);
}

#[test]
fn concurrent_writers_are_all_recorded() {
    let store = Arc::new(ValueStore::appending());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..250 {
                    store.collect_at(i, &format!("w{t}"), Some(Scalar::Int(i)), false);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    let all = store.get_all();
    assert_eq!(all.len(), 2000);
    let mut seqs: Vec<u64> = all.iter().map(|s| s.seq).collect();
    seqs.sort_unstable();
    seqs.dedup();
    assert_eq!(seqs.len(), 2000);
}

#[test]
fn merge_scalars_builds_values_by_timestamp() {
    let mut acc = PayloadAccumulator::new();
    acc.merge_scalars(&[
        sample(0, 100, "cpu.idle", Some(Scalar::Int(95))),
        sample(1, 105, "cpu.idle", Some(Scalar::Int(90))),
        sample(2, 100, "cpu.user", Some(Scalar::Float(2.5))),
    ]);
    assert_eq!(
        serde_json::to_value(&acc).unwrap(),
        json!({
            "cpu.idle": {"values": {"100": 95, "105": 90}},
            "cpu.user": {"values": {"100": 2.5}},
        })
    );
}

#[test]
fn merge_events_appends_timestamps() {
    let mut acc = PayloadAccumulator::new();
    acc.merge_events(&[sample(0, 100, "agent.started", None)]);
    acc.merge_events(&[
        sample(1, 90, "agent.started", None),
        sample(2, 120, "agent.stopped", None),
    ]);
    assert_eq!(
        serde_json::to_value(&acc).unwrap(),
        json!({
            "agent.started": {"values": [100, 90]},
            "agent.stopped": {"values": [120]},
        })
    );
}

#[test]
fn merging_nothing_leaves_payload_unchanged() {
    let mut acc = PayloadAccumulator::new();
    acc.merge_descriptor("system.cpu.idle", "CPU Idle", Some("%"));
    acc.merge_scalars(&[sample(0, 1, "system.cpu.idle", Some(Scalar::Int(1)))]);
    let before = serde_json::to_string(&acc).unwrap();

    acc.merge_scalars(&[]);
    acc.merge_events(&[]);
    assert_eq!(serde_json::to_string(&acc).unwrap(), before);
}

#[test]
fn merge_order_does_not_change_result() {
    let a = sample(0, 1, "a", Some(Scalar::Int(1)));
    let b = sample(1, 1, "b", Some(Scalar::Int(2)));
    let c = sample(2, 2, "c", Some(Scalar::Int(3)));

    let mut batched = PayloadAccumulator::new();
    batched.merge_scalars(&[a.clone(), b.clone()]);
    batched.merge_scalars(&[c.clone()]);

    let mut single = PayloadAccumulator::new();
    single.merge_scalars(&[a]);
    single.merge_scalars(&[b]);
    single.merge_scalars(&[c]);

    assert_eq!(
        serde_json::to_value(&batched).unwrap(),
        serde_json::to_value(&single).unwrap()
    );
}

#[test]
fn redrained_samples_are_not_merged_twice() {
    let mut acc = PayloadAccumulator::new();
    let drained = vec![sample(4, 50, "agent.started", None)];
    assert_eq!(acc.merge_events(&drained), 1);
    assert_eq!(acc.merge_events(&drained), 0);
    assert_eq!(
        serde_json::to_value(&acc).unwrap(),
        json!({"agent.started": {"values": [50]}})
    );

    acc.clear();
    assert!(acc.is_empty());
    assert_eq!(acc.merge_events(&drained), 1);
}

#[test]
fn descriptor_seed_keeps_values_alongside() {
    let mut acc = PayloadAccumulator::new();
    acc.merge_descriptor("system.memory.free", "Free Memory", Some("MiB"));
    acc.merge_scalars(&[sample(0, 7, "system.memory.free", Some(Scalar::Int(512)))]);
    assert_eq!(
        serde_json::to_value(&acc).unwrap(),
        json!({
            "system.memory.free": {
                "title": "Free Memory",
                "unit": "MiB",
                "values": {"7": 512}
            }
        })
    );
}

#[test]
fn merge_replaces_mismatched_leaf_kinds() {
    let mut existing = PayloadNode::Scalar(Some(Scalar::Int(1)));
    merge(&mut existing, PayloadNode::SeriesOfTimestamps(vec![3]));
    assert_eq!(existing, PayloadNode::SeriesOfTimestamps(vec![3]));

    let mut series = PayloadNode::SeriesByTimestamp(BTreeMap::from([(1, Some(Scalar::Int(1)))]));
    merge(
        &mut series,
        PayloadNode::SeriesByTimestamp(BTreeMap::from([(1, Some(Scalar::Int(5))), (2, None)])),
    );
    assert_eq!(
        series,
        PayloadNode::SeriesByTimestamp(BTreeMap::from([(1, Some(Scalar::Int(5))), (2, None)]))
    );
}

#[test]
fn prune_before_drops_old_points() {
    let mut acc = PayloadAccumulator::new();
    acc.merge_scalars(&[
        sample(0, 10, "m", Some(Scalar::Int(1))),
        sample(1, 20, "m", Some(Scalar::Int(2))),
    ]);
    acc.merge_events(&[sample(2, 5, "e", None), sample(3, 25, "e", None)]);
    assert_eq!(acc.point_count(), 4);

    assert_eq!(acc.prune_before(15), 2);
    assert_eq!(
        serde_json::to_value(&acc).unwrap(),
        json!({
            "m": {"values": {"20": 2}},
            "e": {"values": [25]},
        })
    );
}

#[test]
fn truncate_oldest_keeps_newest_points() {
    let mut acc = PayloadAccumulator::new();
    acc.merge_scalars(&[
        sample(1, 100, "cpu.idle", Some(Scalar::Int(90))),
        sample(2, 110, "cpu.idle", Some(Scalar::Int(91))),
        sample(3, 105, "load.1", Some(Scalar::Float(0.5))),
        sample(4, 120, "load.1", Some(Scalar::Float(0.7))),
    ]);

    assert_eq!(acc.truncate_oldest(2), 2);
    assert_eq!(acc.point_count(), 2);
    assert_eq!(
        serde_json::to_value(&acc).unwrap(),
        json!({
            "cpu.idle": {"values": {"110": 91}},
            "load.1": {"values": {"120": 0.7}},
        })
    );
    assert_eq!(acc.truncate_oldest(2), 0);
}

#[test]
fn truncate_oldest_splits_equal_timestamps() {
    let mut acc = PayloadAccumulator::new();
    acc.merge_events(&[
        sample(1, 100, "deploy", None),
        sample(2, 100, "deploy", None),
        sample(3, 100, "restart", None),
    ]);

    assert_eq!(acc.truncate_oldest(1), 2);
    assert_eq!(acc.point_count(), 1);
}

#[test]
fn retain_merged_forgets_evicted_samples() {
    let mut acc = PayloadAccumulator::new();
    let first = [
        sample(1, 100, "cpu.idle", Some(Scalar::Int(90))),
        sample(2, 110, "cpu.idle", Some(Scalar::Int(91))),
    ];
    acc.merge_scalars(&first);
    assert_eq!(acc.merged_len(), 2);

    // seq 1 was evicted from the store before the next drain.
    let second = [first[1].clone(), sample(3, 120, "cpu.idle", Some(Scalar::Int(92)))];
    assert_eq!(acc.merge_scalars(&second), 1);
    acc.retain_merged(&second);
    assert_eq!(acc.merged_len(), 2);
    assert_eq!(acc.point_count(), 3);
}
