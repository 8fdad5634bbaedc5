use crate::error::ConfigError;
use crate::frame::{FRAGMENT_HEADER_SIZE, PACKET_HEADER_SIZE_MAX};

const MAX_PACKET_SIZE_DEFAULT: usize = 16 * 1024;
const FRAGMENT_SIZE_DEFAULT: usize = 1024;
const MAX_FRAGMENTS_LIMIT: usize = 256;
const BUFFER_SIZE_LIMIT: usize = 65536;

/// Configuration for an [`Endpoint`](super::Endpoint) object.
///
/// Fixed for the lifetime of the endpoint.
#[derive(Clone, Debug)]
pub struct Config {
    /// Name attached to log events from this endpoint.
    pub name: String,

    /// Passed back to every [`HostContext`](super::HostContext) callback.
    pub index: usize,

    /// Largest payload which may be sent or received, in bytes.
    ///
    /// Default value: 16,384
    pub max_packet_size: usize,

    /// Payloads larger than this are split into fragments.
    ///
    /// Default value: 1,024
    pub fragment_above: usize,

    /// Maximum number of fragments a payload may be split into.
    ///
    /// Valid range: 1 - 256 \
    /// Default value: 16
    pub max_fragments: usize,

    /// Payload bytes carried by every fragment except the last.
    ///
    /// Default value: 1,024
    pub fragment_size: usize,

    /// Maximum number of acks reported between calls to `clear_acks`.
    ///
    /// Default value: 256
    pub ack_buffer_size: usize,

    /// Default value: 256
    pub sent_packets_buffer_size: usize,

    /// Default value: 256
    pub received_packets_buffer_size: usize,

    /// Maximum number of packets reassembled at once.
    ///
    /// Default value: 64
    pub fragment_reassembly_buffer_size: usize,

    /// Default value: 0.0025
    pub rtt_smoothing_factor: f64,

    /// Default value: 0.1
    pub packet_loss_smoothing_factor: f64,

    /// Default value: 0.1
    pub bandwidth_smoothing_factor: f64,

    /// Per-packet overhead of the underlying transport, counted toward bandwidth estimates.
    ///
    /// Default value: 28 (IPv4 + UDP)
    pub packet_header_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "endpoint".into(),
            index: 0,
            max_packet_size: MAX_PACKET_SIZE_DEFAULT,
            fragment_above: FRAGMENT_SIZE_DEFAULT,
            max_fragments: 16,
            fragment_size: FRAGMENT_SIZE_DEFAULT,
            ack_buffer_size: 256,
            sent_packets_buffer_size: 256,
            received_packets_buffer_size: 256,
            fragment_reassembly_buffer_size: 64,
            rtt_smoothing_factor: 0.0025,
            packet_loss_smoothing_factor: 0.1,
            bandwidth_smoothing_factor: 0.1,
            packet_header_size: 28,
        }
    }
}

impl Config {
    /// Number of fragments needed to carry a payload of `size` bytes.
    pub fn fragment_count(&self, size: usize) -> usize {
        (size + self.fragment_size - 1) / self.fragment_size
    }

    /// Largest datagram produced when sending a packet whole.
    pub fn packet_buffer_size(&self) -> usize {
        PACKET_HEADER_SIZE_MAX + self.fragment_above.min(self.max_packet_size)
    }

    /// Largest datagram produced when sending one fragment.
    pub fn fragment_buffer_size(&self) -> usize {
        FRAGMENT_HEADER_SIZE + PACKET_HEADER_SIZE_MAX + self.fragment_size
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_packet_size == 0 {
            return Err(ConfigError::MaxPacketSize);
        }

        if self.fragment_size == 0 {
            return Err(ConfigError::FragmentSize);
        }

        if self.max_fragments == 0 || self.max_fragments > MAX_FRAGMENTS_LIMIT {
            return Err(ConfigError::MaxFragments(self.max_fragments));
        }

        let buffer_sizes = [
            ("ack_buffer_size", self.ack_buffer_size),
            ("sent_packets_buffer_size", self.sent_packets_buffer_size),
            ("received_packets_buffer_size", self.received_packets_buffer_size),
            (
                "fragment_reassembly_buffer_size",
                self.fragment_reassembly_buffer_size,
            ),
        ];

        for (name, value) in buffer_sizes {
            if value == 0 || value > BUFFER_SIZE_LIMIT {
                return Err(ConfigError::BufferSize { name, value });
            }
        }

        let factors = [
            ("rtt_smoothing_factor", self.rtt_smoothing_factor),
            (
                "packet_loss_smoothing_factor",
                self.packet_loss_smoothing_factor,
            ),
            ("bandwidth_smoothing_factor", self.bandwidth_smoothing_factor),
        ];

        for (name, value) in factors {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::SmoothingFactor { name, value });
            }
        }

        if self.max_packet_size > self.fragment_above {
            let required = self.fragment_count(self.max_packet_size);

            if required > self.max_fragments {
                return Err(ConfigError::FragmentCapacity {
                    max_packet_size: self.max_packet_size,
                    required,
                    max_fragments: self.max_fragments,
                });
            }
        }

        // Anything sent must be accepted by a peer with the same configuration
        let datagram_sizes = [
            ("packet", self.packet_buffer_size()),
            ("fragment", self.fragment_buffer_size()),
        ];

        for (kind, size) in datagram_sizes {
            if size > self.max_packet_size {
                return Err(ConfigError::DatagramSize {
                    kind,
                    size,
                    max_packet_size: self.max_packet_size,
                });
            }
        }

        Ok(())
    }
}
