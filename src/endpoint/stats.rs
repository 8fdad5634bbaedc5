use super::Config;
use crate::buffer::SequenceBuffer;
use crate::sequence;

// Smoothed values within this distance of a new sample snap to it
const SNAP_EPSILON: f64 = 0.00001;

/// Running totals of endpoint events. Counters never decrease.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packets_acked: u64,
    pub packets_stale: u64,
    pub packets_invalid: u64,
    pub packets_too_large_to_send: u64,
    pub packets_too_large_to_receive: u64,
    pub fragments_sent: u64,
    pub fragments_received: u64,
    pub fragments_invalid: u64,
}

#[derive(Clone, Debug, Default)]
pub struct SentPacket {
    pub time: f64,
    pub acked: bool,
    pub packet_bytes: usize,
}

#[derive(Clone, Debug, Default)]
pub struct ReceivedPacket {
    pub time: f64,
    pub packet_bytes: usize,
}

trait Sample {
    fn time(&self) -> f64;
    fn packet_bytes(&self) -> usize;
}

impl Sample for SentPacket {
    fn time(&self) -> f64 {
        self.time
    }

    fn packet_bytes(&self) -> usize {
        self.packet_bytes
    }
}

impl Sample for ReceivedPacket {
    fn time(&self) -> f64 {
        self.time
    }

    fn packet_bytes(&self) -> usize {
        self.packet_bytes
    }
}

/// Exponentially smoothed link statistics.
#[derive(Clone, Debug, Default)]
pub struct Statistics {
    /// Round trip time, in milliseconds.
    pub rtt: f64,
    /// Percentage of sent packets which went unacknowledged.
    pub packet_loss: f64,
    pub sent_bandwidth_kbps: f64,
    pub received_bandwidth_kbps: f64,
    pub acked_bandwidth_kbps: f64,
}

impl Statistics {
    pub fn update_rtt(&mut self, rtt_ms: f64, config: &Config) {
        self.rtt = smooth_rtt(self.rtt, rtt_ms, config.rtt_smoothing_factor);
    }

    pub fn update(
        &mut self,
        sent_packets: &SequenceBuffer<SentPacket>,
        received_packets: &SequenceBuffer<ReceivedPacket>,
        config: &Config,
    ) {
        if let Some(packet_loss) = packet_loss_sample(sent_packets) {
            self.packet_loss = smooth(
                self.packet_loss,
                packet_loss,
                config.packet_loss_smoothing_factor,
            );
        }

        let factor = config.bandwidth_smoothing_factor;

        if let Some(kbps) = bandwidth_sample(sample_window(sent_packets)) {
            self.sent_bandwidth_kbps = smooth(self.sent_bandwidth_kbps, kbps, factor);
        }

        if let Some(kbps) = bandwidth_sample(sample_window(received_packets)) {
            self.received_bandwidth_kbps = smooth(self.received_bandwidth_kbps, kbps, factor);
        }

        if let Some(kbps) = bandwidth_sample(sample_window(sent_packets).filter(|p| p.acked)) {
            self.acked_bandwidth_kbps = smooth(self.acked_bandwidth_kbps, kbps, factor);
        }
    }
}

pub fn smooth(current: f64, sample: f64, factor: f64) -> f64 {
    if (current - sample).abs() > SNAP_EPSILON {
        current + (sample - current) * factor
    } else {
        sample
    }
}

pub fn smooth_rtt(current: f64, sample: f64, factor: f64) -> f64 {
    if (current == 0.0 && sample > 0.0) || (current - sample).abs() < SNAP_EPSILON {
        sample
    } else {
        current + (sample - current) * factor
    }
}

// The oldest half of the window: packets which have had the most time to be acked
fn sample_window<T>(buffer: &SequenceBuffer<T>) -> impl Iterator<Item = &T> {
    let capacity = buffer.capacity();
    let base = sequence::increment(buffer.sequence(), -(capacity as i32));

    (0..capacity / 2).filter_map(move |i| buffer.find(sequence::increment(base, i as i32)))
}

fn packet_loss_sample(sent_packets: &SequenceBuffer<SentPacket>) -> Option<f64> {
    let num_samples = sent_packets.capacity() / 2;

    if num_samples == 0 {
        return None;
    }

    let num_dropped = sample_window(sent_packets).filter(|p| !p.acked).count();

    Some(num_dropped as f64 / num_samples as f64 * 100.0)
}

fn bandwidth_sample<'a, T, I>(samples: I) -> Option<f64>
where
    T: Sample + 'a,
    I: Iterator<Item = &'a T>,
{
    let mut bytes = 0;
    let mut start_time = f64::MAX;
    let mut finish_time = f64::MIN;

    for sample in samples {
        bytes += sample.packet_bytes();
        start_time = start_time.min(sample.time());
        finish_time = finish_time.max(sample.time());
    }

    if finish_time > start_time {
        Some(bytes as f64 / (finish_time - start_time) * 8.0 / 1000.0)
    } else {
        None
    }
}
