/*

Reliable is a packet acknowledgement layer for unreliable datagram transports. It does not own a
socket, a clock, or a thread. Instead, the host passes packets in and out through an endpoint, and
advances the endpoint's notion of time explicitly.

# Packets and acks

Every packet sent is assigned a 16-bit sequence number, wrapping from 65535 back to 0. Sequence
numbers are compared along the shorter arc of the circle, so 0 is newer than 65535 and 32768 is
newer than 0, but 32769 is older than 0.

Every packet carries the most recent sequence number received from the remote endpoint (the ack),
and 32 bits of history: bit i is set if packet ack - i was received. A packet is therefore
acknowledged up to 33 times, and only the loss of that many packets in a row causes an ack to be
missed. The receiver does not resend anything; it merely reports which sent packets are known to
have arrived, and leaves any resend policy to the host.

Packets rejected by the host's process callback are not recorded as received, and so are never
acked.

# Header encoding

The regular packet header is between 3 and 9 bytes:

  prefix    u8    bit 0 clear, bits 1-4 set for each ack bits byte present, bit 5 set if the
                  ack is encoded as a one-byte delta
  sequence  u16
  ack       u8 (sequence - ack) or u16
  ack bits  0-4 bytes, omitted bytes are all ones

All multi-byte values are little-endian. Under low loss, most ack bits bytes are 0xFF and are
omitted.

# Fragmentation

Packets larger than the fragmentation threshold are split into fragments of a fixed size, the last
of which may be shorter. Each fragment is sent as a separate datagram with a 5-byte header:

  prefix         u8    always 1
  sequence       u16
  fragment id    u8
  fragments - 1  u8

Fragment 0 additionally carries the regular header of the original packet. The receiver stores
fragments into a single buffer sized for the whole packet, with the regular header right-aligned in
front of the payload, so that once the last fragment arrives the reassembled packet is a contiguous
regular packet and can be passed through the normal receive path.

In-flight reassemblies are kept in a sequence buffer. Receiving a regular packet advances the
reassembly window, dropping any reassembly too old to complete.

# Statistics

RTT is sampled whenever a packet is acked and smoothed with an exponentially weighted moving
average. Packet loss and bandwidth are sampled over the older half of the sent and received
windows, which have had the most time to be acked, and smoothed likewise.

*/

mod buffer;
mod endpoint;
mod error;

pub mod frame;
pub mod sequence;

pub use buffer::BufferAllocator;
pub use buffer::BufferPool;
pub use buffer::SequenceBuffer;

pub use endpoint::Config;
pub use endpoint::Counters;
pub use endpoint::Endpoint;
pub use endpoint::HostContext;

pub use error::ConfigError;
pub use error::FrameError;
pub use error::HeaderStep;
