//! Bounded per-sensor sample buffers.
//!
//! Each sensor id owns a [`SensorChannel`], a FIFO ring that evicts its oldest
//! sample once capacity is reached. Channels are created lazily by
//! [`ChannelSet::push`] and handed to subscribers as an immutable
//! [`TelemetrySnapshot`].

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use sensorlink_types::Sample;

/// Default number of samples kept per channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 60;

/// Rolling buffer of samples for one sensor id.
#[derive(Debug, Clone)]
pub struct SensorChannel {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SensorChannel {
    /// Create an empty channel. A capacity of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest ones beyond capacity.
    pub fn push(&mut self, sample: Sample) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Number of buffered samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the channel holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The most recent sample.
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    fn to_vec(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }
}

/// All channels of one client, keyed by sensor id.
#[derive(Debug, Clone)]
pub struct ChannelSet {
    channels: BTreeMap<String, SensorChannel>,
    capacity: usize,
}

impl ChannelSet {
    /// Create an empty set whose channels hold `capacity` samples each.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Append a sample to the channel for `sensor_id`, creating it if needed.
    pub fn push(&mut self, sensor_id: &str, sample: Sample) {
        let capacity = self.capacity;
        self.channels
            .entry(sensor_id.to_string())
            .or_insert_with(|| SensorChannel::new(capacity))
            .push(sample);
    }

    /// Look up a channel.
    pub fn get(&self, sensor_id: &str) -> Option<&SensorChannel> {
        self.channels.get(sensor_id)
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no channel exists yet.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Drop every channel.
    pub fn clear(&mut self) {
        self.channels.clear();
    }

    /// Copy the current contents into a snapshot.
    pub fn snapshot(&self, device_id: &str) -> TelemetrySnapshot {
        TelemetrySnapshot {
            device_id: device_id.to_string(),
            channels: self
                .channels
                .iter()
                .map(|(id, ch)| (id.clone(), ch.to_vec()))
                .collect(),
        }
    }
}

/// Immutable view of every channel at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Device the samples belong to, as configured on the client.
    pub device_id: String,
    /// Channel id to samples, oldest first.
    pub channels: BTreeMap<String, Vec<Sample>>,
}

impl TelemetrySnapshot {
    /// Samples of one channel.
    pub fn get(&self, channel_id: &str) -> Option<&[Sample]> {
        self.channels.get(channel_id).map(Vec::as_slice)
    }

    /// Most recent sample of one channel.
    pub fn latest(&self, channel_id: &str) -> Option<&Sample> {
        self.channels.get(channel_id).and_then(|s| s.last())
    }

    /// Channel ids in sorted order.
    pub fn channel_ids(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// Whether the snapshot holds no samples at all.
    pub fn is_empty(&self) -> bool {
        self.channels.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use time::OffsetDateTime;

    fn sample(n: f64) -> Sample {
        let mut fields = BTreeMap::new();
        fields.insert("n".to_string(), n);
        Sample::new(OffsetDateTime::UNIX_EPOCH, fields)
    }

    #[test]
    fn test_channel_evicts_oldest() {
        let mut channel = SensorChannel::new(3);
        for n in 1..=5 {
            channel.push(sample(n as f64));
        }

        let values: Vec<f64> = channel.iter().filter_map(|s| s.get("n")).collect();
        assert_eq!(values, vec![3.0, 4.0, 5.0]);
        assert_eq!(channel.latest().and_then(|s| s.get("n")), Some(5.0));
    }

    #[test]
    fn test_zero_capacity_is_one() {
        let mut channel = SensorChannel::new(0);
        channel.push(sample(1.0));
        channel.push(sample(2.0));
        assert_eq!(channel.capacity(), 1);
        assert_eq!(channel.len(), 1);
    }

    #[test]
    fn test_channel_set_creates_lazily() {
        let mut set = ChannelSet::new(2);
        assert!(set.is_empty());
        assert!(set.get("dht22").is_none());

        set.push("dht22", sample(1.0));
        set.push("pzem004t", sample(2.0));
        assert_eq!(set.len(), 2);

        let snapshot = set.snapshot("esp32-a");
        assert_eq!(snapshot.device_id, "esp32-a");
        assert_eq!(
            snapshot.channel_ids().collect::<Vec<_>>(),
            vec!["dht22", "pzem004t"]
        );
        assert_eq!(snapshot.latest("pzem004t").and_then(|s| s.get("n")), Some(2.0));

        set.clear();
        assert!(set.is_empty());
        // The earlier snapshot is unaffected.
        assert_eq!(snapshot.get("dht22").map(<[Sample]>::len), Some(1));
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = TelemetrySnapshot::default();
        assert!(snapshot.is_empty());
        assert!(snapshot.latest("x").is_none());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use time::OffsetDateTime;

    proptest! {
        /// A channel never exceeds capacity and keeps the newest samples in order.
        #[test]
        fn channel_keeps_most_recent(capacity in 1usize..16, count in 0usize..64) {
            let mut channel = SensorChannel::new(capacity);
            for i in 0..count {
                let mut fields = BTreeMap::new();
                fields.insert("i".to_string(), i as f64);
                channel.push(Sample::new(OffsetDateTime::UNIX_EPOCH, fields));
            }

            prop_assert!(channel.len() <= capacity);
            prop_assert_eq!(channel.len(), count.min(capacity));

            let kept: Vec<f64> = channel.iter().filter_map(|s| s.get("i")).collect();
            let expected: Vec<f64> = (count.saturating_sub(capacity)..count).map(|i| i as f64).collect();
            prop_assert_eq!(kept, expected);
        }
    }
}
