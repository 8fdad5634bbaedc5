use tracing::{debug, trace, warn};

use super::buffer::{BufferAllocator, BufferPool, SequenceBuffer};
use super::error::ConfigError;
use super::frame;
use super::frame::serial::{Serial, Writer};
use super::frame::{FragmentHeader, PacketHeader};
use super::sequence;

mod config;
mod reassembly;
mod stats;

pub use config::Config;
pub use stats::Counters;

use reassembly::{CompletedPacket, Reassembler, Rejected};
use stats::{ReceivedPacket, SentPacket, Statistics};

/// Callbacks through which an endpoint talks to its host.
///
/// A context is passed to every call which may produce a callback, and callbacks are always
/// invoked before that call returns. Implementations may call back into other endpoints, e.g. to
/// deliver a transmitted packet immediately.
pub trait HostContext {
    // Called to send a packet, or one fragment of a packet, to the remote endpoint. The bytes are
    // only valid for the duration of the call.
    fn transmit_packet(&mut self, index: usize, sequence: u16, packet_bytes: &[u8]);

    // Called with the payload of each packet received. Returning false rejects the packet, in
    // which case it will not be acked.
    fn process_packet(&mut self, index: usize, sequence: u16, packet_bytes: &[u8]) -> bool;
}

/// One end of a connection: stamps outgoing packets with sequence numbers and acks, splits
/// large packets into fragments, reassembles incoming fragments, and reports which sent packets
/// the remote endpoint has received.
pub struct Endpoint<A = BufferPool> {
    config: Config,
    allocator: A,

    time: f64,
    stats: Statistics,
    counters: Counters,

    // Sender state
    sequence: u16,
    sent_packets: SequenceBuffer<SentPacket>,
    acks: Vec<u16>,

    // Receiver state
    received_packets: SequenceBuffer<ReceivedPacket>,
    reassembly: Reassembler,
}

impl Endpoint {
    pub fn new(config: Config, time: f64) -> Result<Self, ConfigError> {
        Self::with_allocator(config, time, BufferPool::new())
    }
}

impl<A> Endpoint<A>
where
    A: BufferAllocator,
{
    pub fn with_allocator(config: Config, time: f64, allocator: A) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            allocator,
            time,
            stats: Statistics::default(),
            counters: Counters::default(),
            sequence: 0,
            sent_packets: SequenceBuffer::new(config.sent_packets_buffer_size),
            acks: Vec::with_capacity(config.ack_buffer_size),
            received_packets: SequenceBuffer::new(config.received_packets_buffer_size),
            reassembly: Reassembler::new(config.fragment_reassembly_buffer_size),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Sequence number which will be assigned to the next packet sent.
    pub fn next_packet_sequence(&self) -> u16 {
        self.sequence
    }

    pub fn send_packet<C>(&mut self, packet_bytes: &[u8], ctx: &mut C)
    where
        C: HostContext,
    {
        let packet_size = packet_bytes.len();

        if packet_size > self.config.max_packet_size {
            warn!(
                endpoint = %self.config.name,
                size = packet_size,
                max = self.config.max_packet_size,
                "packet too large to send"
            );
            self.counters.packets_too_large_to_send += 1;
            return;
        }

        let sequence = self.sequence;
        self.sequence = sequence::increment(self.sequence, 1);

        let (ack, ack_bits) = self.received_packets.generate_ack_bits();

        if let Some(sent_packet) = self.sent_packets.insert(sequence) {
            sent_packet.time = self.time;
            sent_packet.acked = false;
            sent_packet.packet_bytes = self.config.packet_header_size + packet_size;
        }

        let header = PacketHeader {
            sequence,
            ack,
            ack_bits,
        };

        if packet_size <= self.config.fragment_above {
            trace!(endpoint = %self.config.name, sequence, size = packet_size, "sending packet");

            let mut buffer = self
                .allocator
                .acquire(self.config.packet_buffer_size());

            let mut wr = Writer::new(&mut buffer);
            header.encode(&mut wr);
            wr.write_slice(packet_bytes);
            let size = wr.bytes_written();

            ctx.transmit_packet(self.config.index, sequence, &buffer[..size]);

            self.allocator.release(buffer);
        } else {
            let num_fragments = self.config.fragment_count(packet_size);

            debug_assert!(num_fragments >= 1 && num_fragments <= self.config.max_fragments);

            trace!(
                endpoint = %self.config.name,
                sequence,
                size = packet_size,
                num_fragments,
                "sending packet as fragments"
            );

            let mut buffer = self
                .allocator
                .acquire(self.config.fragment_buffer_size());

            for (fragment_id, fragment_bytes) in
                packet_bytes.chunks(self.config.fragment_size).enumerate()
            {
                let fragment_header = FragmentHeader {
                    sequence,
                    fragment_id: fragment_id as u8,
                    num_fragments,
                };

                let mut wr = Writer::new(&mut buffer);
                fragment_header.encode(&mut wr);
                if fragment_id == 0 {
                    header.encode(&mut wr);
                }
                wr.write_slice(fragment_bytes);
                let size = wr.bytes_written();

                ctx.transmit_packet(self.config.index, sequence, &buffer[..size]);

                self.counters.fragments_sent += 1;
            }

            self.allocator.release(buffer);
        }

        self.counters.packets_sent += 1;
    }

    pub fn receive_packet<C>(&mut self, packet_bytes: &[u8], ctx: &mut C)
    where
        C: HostContext,
    {
        if packet_bytes.len() > self.config.max_packet_size {
            warn!(
                endpoint = %self.config.name,
                size = packet_bytes.len(),
                max = self.config.max_packet_size,
                "packet too large to receive"
            );
            self.counters.packets_too_large_to_receive += 1;
            return;
        }

        if frame::is_fragment(packet_bytes) {
            self.receive_fragment(packet_bytes, ctx);
        } else {
            self.receive_regular_packet(packet_bytes, ctx);
        }
    }

    fn receive_regular_packet<C>(&mut self, packet_bytes: &[u8], ctx: &mut C)
    where
        C: HostContext,
    {
        self.counters.packets_received += 1;

        let (header, header_size) = match PacketHeader::read(packet_bytes) {
            Ok(read) => read,
            Err(err) => {
                warn!(endpoint = %self.config.name, error = %err, "ignoring invalid packet");
                self.counters.packets_invalid += 1;
                return;
            }
        };

        let sequence = header.sequence;

        if !self.received_packets.test_insert(sequence) {
            debug!(endpoint = %self.config.name, sequence, "ignoring stale packet");
            self.counters.packets_stale += 1;
            return;
        }

        let payload = &packet_bytes[header_size..];

        if !ctx.process_packet(self.config.index, sequence, payload) {
            debug!(endpoint = %self.config.name, sequence, "packet rejected by host");
            return;
        }

        if let Some(received_packet) = self.received_packets.insert(sequence) {
            received_packet.time = self.time;
            received_packet.packet_bytes = self.config.packet_header_size + packet_bytes.len();
        }

        self.reassembly.advance(sequence, &mut self.allocator);

        self.process_acks(header.ack, header.ack_bits);
    }

    fn process_acks(&mut self, ack: u16, ack_bits: u32) {
        for i in 0..32 {
            if ack_bits & (1 << i) == 0 {
                continue;
            }

            if self.acks.len() >= self.config.ack_buffer_size {
                // Ack list full, remaining acks are lost until the host clears it
                break;
            }

            let ack_sequence = sequence::increment(ack, -i);

            if let Some(sent_packet) = self.sent_packets.find_mut(ack_sequence) {
                if !sent_packet.acked {
                    sent_packet.acked = true;

                    self.acks.push(ack_sequence);
                    self.counters.packets_acked += 1;

                    let rtt_ms = (self.time - sent_packet.time) * 1000.0;

                    self.stats.update_rtt(rtt_ms, &self.config);

                    trace!(
                        endpoint = %self.config.name,
                        sequence = ack_sequence,
                        rtt_ms,
                        "packet acked"
                    );
                }
            }
        }
    }

    fn receive_fragment<C>(&mut self, packet_bytes: &[u8], ctx: &mut C)
    where
        C: HostContext,
    {
        let fragment = match reassembly::read_fragment(packet_bytes, &self.config) {
            Ok(fragment) => fragment,
            Err(err) => {
                warn!(endpoint = %self.config.name, error = %err, "ignoring invalid fragment");
                self.counters.fragments_invalid += 1;
                return;
            }
        };

        let sequence = fragment.header.sequence;
        let fragment_id = fragment.header.fragment_id;
        let num_fragments = fragment.header.num_fragments;

        match self
            .reassembly
            .receive(&fragment, &mut self.allocator, &self.config)
        {
            Ok(progress) => {
                if progress.created {
                    self.received_packets.advance(sequence);
                }

                trace!(
                    endpoint = %self.config.name,
                    sequence,
                    fragment_id,
                    num_fragments,
                    "received fragment"
                );

                if let Some(packet) = progress.completed {
                    self.receive_reassembled_packet(packet, ctx);
                }

                self.counters.fragments_received += 1;
            }
            Err(Rejected::Duplicate) => {
                debug!(
                    endpoint = %self.config.name,
                    sequence,
                    fragment_id,
                    "ignoring fragment, already received"
                );
            }
            Err(Rejected::Stale) => {
                warn!(
                    endpoint = %self.config.name,
                    sequence,
                    fragment_id,
                    "ignoring fragment, reassembly window has moved past it"
                );
                self.counters.fragments_invalid += 1;
            }
            Err(Rejected::CountMismatch { expected, received }) => {
                warn!(
                    endpoint = %self.config.name,
                    sequence,
                    expected,
                    received,
                    "ignoring fragment, fragment count mismatch"
                );
                self.counters.fragments_invalid += 1;
            }
        }
    }

    // The reassembled packet goes straight to the regular packet path; it is never a fragment.
    fn receive_reassembled_packet<C>(&mut self, packet: CompletedPacket, ctx: &mut C)
    where
        C: HostContext,
    {
        if packet.payload_size() > self.config.max_packet_size {
            warn!(
                endpoint = %self.config.name,
                sequence = packet.sequence(),
                size = packet.payload_size(),
                max = self.config.max_packet_size,
                "reassembled packet too large to receive"
            );
            self.counters.packets_too_large_to_receive += 1;
        } else {
            debug!(
                endpoint = %self.config.name,
                sequence = packet.sequence(),
                size = packet.payload_size(),
                "reassembled packet"
            );
            self.receive_regular_packet(packet.bytes(), ctx);
        }

        self.allocator.release(packet.into_buffer());
    }

    /// Sequence numbers of sent packets acked since the last call to `clear_acks`.
    pub fn acks(&self) -> &[u16] {
        &self.acks
    }

    pub fn clear_acks(&mut self) {
        self.acks.clear();
    }

    /// Forgets all sent and received packets and in-flight reassemblies. Statistics and counters
    /// are kept.
    pub fn reset(&mut self) {
        self.acks.clear();
        self.sequence = 0;

        self.sent_packets.reset();
        self.received_packets.reset();
        self.reassembly.reset(&mut self.allocator);
    }

    /// Advances the endpoint clock to `time` (in seconds) and recomputes packet loss and
    /// bandwidth estimates.
    pub fn update(&mut self, time: f64) {
        self.time = time;

        self.stats
            .update(&self.sent_packets, &self.received_packets, &self.config);
    }

    /// Smoothed round trip time, in milliseconds.
    pub fn rtt(&self) -> f64 {
        self.stats.rtt
    }

    /// Smoothed percentage of sent packets which were not acked.
    pub fn packet_loss(&self) -> f64 {
        self.stats.packet_loss
    }

    /// Smoothed sent, received and acked bandwidth, in kilobits per second.
    pub fn bandwidth(&self) -> (f64, f64, f64) {
        (
            self.stats.sent_bandwidth_kbps,
            self.stats.received_bandwidth_kbps,
            self.stats.acked_bandwidth_kbps,
        )
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }
}
