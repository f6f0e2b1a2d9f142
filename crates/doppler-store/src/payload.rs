use doppler_common::types::{Sample, Scalar, Timestamp};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};

/// Key under which a metric's time series lives.
pub const VALUES_KEY: &str = "values";

/// A node of the outbound payload tree.
///
/// Each variant has its own merge rule, see [`merge`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PayloadNode {
    Scalar(Option<Scalar>),
    /// `timestamp -> value`, used for metrics and states.
    SeriesByTimestamp(BTreeMap<Timestamp, Option<Scalar>>),
    /// Times at which an event fired, in collection order.
    SeriesOfTimestamps(Vec<Timestamp>),
    Nested(BTreeMap<String, PayloadNode>),
}

impl PayloadNode {
    /// Drop every series point older than `cutoff`. Returns how many were dropped.
    pub fn prune_before(&mut self, cutoff: Timestamp) -> usize {
        match self {
            PayloadNode::Scalar(_) => 0,
            PayloadNode::SeriesByTimestamp(series) => {
                let before = series.len();
                series.retain(|ts, _| *ts >= cutoff);
                before - series.len()
            }
            PayloadNode::SeriesOfTimestamps(times) => {
                let before = times.len();
                times.retain(|ts| *ts >= cutoff);
                before - times.len()
            }
            PayloadNode::Nested(children) => children
                .values_mut()
                .map(|child| child.prune_before(cutoff))
                .sum(),
        }
    }

    /// Drop up to `budget` series points stamped exactly `timestamp`.
    fn drop_at(&mut self, timestamp: Timestamp, budget: &mut usize) -> usize {
        match self {
            PayloadNode::Scalar(_) => 0,
            PayloadNode::SeriesByTimestamp(series) => {
                if *budget > 0 && series.remove(&timestamp).is_some() {
                    *budget -= 1;
                    1
                } else {
                    0
                }
            }
            PayloadNode::SeriesOfTimestamps(times) => {
                let mut dropped = 0;
                times.retain(|ts| {
                    if *ts == timestamp && *budget > 0 {
                        *budget -= 1;
                        dropped += 1;
                        false
                    } else {
                        true
                    }
                });
                dropped
            }
            PayloadNode::Nested(children) => children
                .values_mut()
                .map(|child| child.drop_at(timestamp, budget))
                .sum(),
        }
    }

    fn collect_timestamps(&self, out: &mut Vec<Timestamp>) {
        match self {
            PayloadNode::Scalar(_) => {}
            PayloadNode::SeriesByTimestamp(series) => out.extend(series.keys().copied()),
            PayloadNode::SeriesOfTimestamps(times) => out.extend(times.iter().copied()),
            PayloadNode::Nested(children) => {
                for child in children.values() {
                    child.collect_timestamps(out);
                }
            }
        }
    }

    /// Number of series points below this node.
    pub fn point_count(&self) -> usize {
        match self {
            PayloadNode::Scalar(_) => 0,
            PayloadNode::SeriesByTimestamp(series) => series.len(),
            PayloadNode::SeriesOfTimestamps(times) => times.len(),
            PayloadNode::Nested(children) => children.values().map(PayloadNode::point_count).sum(),
        }
    }
}

/// Merge `incoming` into `existing`.
///
/// - two nested mappings merge key by key, recursively;
/// - two timestamp-keyed series are unioned, incoming wins on equal timestamps;
/// - two timestamp lists are concatenated, existing entries first;
/// - any other combination replaces `existing` with `incoming`.
pub fn merge(existing: &mut PayloadNode, incoming: PayloadNode) {
    match (existing, incoming) {
        (PayloadNode::Nested(current), PayloadNode::Nested(next)) => {
            for (key, node) in next {
                match current.get_mut(&key) {
                    Some(slot) => merge(slot, node),
                    None => {
                        current.insert(key, node);
                    }
                }
            }
        }
        (PayloadNode::SeriesByTimestamp(current), PayloadNode::SeriesByTimestamp(next)) => {
            current.extend(next);
        }
        (PayloadNode::SeriesOfTimestamps(current), PayloadNode::SeriesOfTimestamps(next)) => {
            current.extend(next);
        }
        (slot, node) => *slot = node,
    }
}

/// Long-lived payload section for one category, keyed by metric name.
///
/// Survives failed transmissions and is only cleared once a payload has been
/// acknowledged. Sequence numbers of merged samples are remembered until then
/// so a sample drained again after a failed send is not merged twice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PayloadAccumulator {
    root: BTreeMap<String, PayloadNode>,
    merged: HashSet<u64>,
}

impl PayloadAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold metric or state samples in as `{name: {"values": {ts: value}}}`.
    /// Returns the number of samples that were not already merged.
    pub fn merge_scalars(&mut self, samples: &[Sample]) -> usize {
        let mut grouped: BTreeMap<String, BTreeMap<Timestamp, Option<Scalar>>> = BTreeMap::new();
        let mut fresh = 0;
        for sample in samples {
            if !self.merged.insert(sample.seq) {
                continue;
            }
            grouped
                .entry(sample.name.clone())
                .or_default()
                .insert(sample.timestamp, sample.value.clone());
            fresh += 1;
        }
        for (name, series) in grouped {
            self.merge_values(name, PayloadNode::SeriesByTimestamp(series));
        }
        fresh
    }

    /// Fold event samples in as `{name: {"values": [ts, ...]}}`.
    /// Returns the number of samples that were not already merged.
    pub fn merge_events(&mut self, samples: &[Sample]) -> usize {
        let mut grouped: BTreeMap<String, Vec<Timestamp>> = BTreeMap::new();
        let mut fresh = 0;
        for sample in samples {
            if !self.merged.insert(sample.seq) {
                continue;
            }
            grouped
                .entry(sample.name.clone())
                .or_default()
                .push(sample.timestamp);
            fresh += 1;
        }
        for (name, times) in grouped {
            self.merge_values(name, PayloadNode::SeriesOfTimestamps(times));
        }
        fresh
    }

    /// Seed the static description of `name` so it shows up before any sample.
    pub fn merge_descriptor(&mut self, name: &str, title: &str, unit: Option<&str>) {
        let mut fields = BTreeMap::new();
        fields.insert("title".to_string(), PayloadNode::Scalar(Some(title.into())));
        if let Some(unit) = unit {
            fields.insert("unit".to_string(), PayloadNode::Scalar(Some(unit.into())));
        }
        self.merge_node(name.to_string(), PayloadNode::Nested(fields));
    }

    fn merge_values(&mut self, name: String, values: PayloadNode) {
        let mut fields = BTreeMap::new();
        fields.insert(VALUES_KEY.to_string(), values);
        self.merge_node(name, PayloadNode::Nested(fields));
    }

    fn merge_node(&mut self, name: String, incoming: PayloadNode) {
        match self.root.get_mut(&name) {
            Some(existing) => merge(existing, incoming),
            None => {
                self.root.insert(name, incoming);
            }
        }
    }

    /// Drop series points older than `cutoff`. Returns how many were dropped.
    pub fn prune_before(&mut self, cutoff: Timestamp) -> usize {
        self.root
            .values_mut()
            .map(|node| node.prune_before(cutoff))
            .sum()
    }

    /// Drop the oldest series points until at most `max_points` remain.
    /// Returns how many were dropped.
    pub fn truncate_oldest(&mut self, max_points: usize) -> usize {
        let total = self.point_count();
        if total <= max_points {
            return 0;
        }
        let excess = total - max_points;

        let mut timestamps = Vec::with_capacity(total);
        for node in self.root.values() {
            node.collect_timestamps(&mut timestamps);
        }
        timestamps.sort_unstable();
        let cutoff = timestamps[excess - 1];
        let older = timestamps.iter().take_while(|ts| **ts < cutoff).count();

        let mut at_cutoff = excess - older;
        let mut dropped = self.prune_before(cutoff);
        for node in self.root.values_mut() {
            dropped += node.drop_at(cutoff, &mut at_cutoff);
        }
        dropped
    }

    /// Forget merged sequence numbers that are not among `drained`.
    ///
    /// A sample missing from a fresh drain has left its store and can never
    /// be drained again, so remembering it only costs memory.
    pub fn retain_merged(&mut self, drained: &[Sample]) {
        let live: HashSet<u64> = drained.iter().map(|sample| sample.seq).collect();
        self.merged.retain(|seq| live.contains(seq));
    }

    /// Sequence numbers merged since the last [`clear`](Self::clear).
    pub fn merged_len(&self) -> usize {
        self.merged.len()
    }

    pub fn get(&self, name: &str) -> Option<&PayloadNode> {
        self.root.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.root.keys().map(String::as_str)
    }

    pub fn point_count(&self) -> usize {
        self.root.values().map(PayloadNode::point_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn clear(&mut self) {
        self.root.clear();
        self.merged.clear();
    }
}

impl Serialize for PayloadAccumulator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}
