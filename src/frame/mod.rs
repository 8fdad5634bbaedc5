pub mod serial;

/// Largest possible encoding of a [`PacketHeader`].
pub const PACKET_HEADER_SIZE_MAX: usize = 9;
/// Smallest possible encoding of a [`PacketHeader`].
pub const PACKET_HEADER_SIZE_MIN: usize = 3;
/// Size of a [`FragmentHeader`] on the wire.
pub const FRAGMENT_HEADER_SIZE: usize = 5;

// Bit 0 of the first byte distinguishes fragments from regular packets
const FRAGMENT_BIT: u8 = 0x01;

/// Returns true if the packet is a fragment of a larger packet, judging by its first byte.
pub fn is_fragment(packet_bytes: &[u8]) -> bool {
    packet_bytes
        .first()
        .map_or(false, |&prefix| prefix & FRAGMENT_BIT != 0)
}

/// Header carried by every regular packet.
///
/// `ack` is the most recent sequence number received from the remote endpoint, and bit `i` of
/// `ack_bits` is set if `ack - i` was also received.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PacketHeader {
    pub sequence: u16,
    pub ack: u16,
    pub ack_bits: u32,
}

/// Header carried by each fragment of a packet too large to send whole.
///
/// Fragment 0 is followed by the full [`PacketHeader`] of the original packet.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FragmentHeader {
    pub sequence: u16,
    pub fragment_id: u8,
    // Within 1..=256
    pub num_fragments: usize,
}
