use thiserror::Error;

/// Endpoint configuration rejected at construction.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("max_packet_size must be nonzero")]
    MaxPacketSize,

    #[error("fragment_size must be nonzero")]
    FragmentSize,

    #[error("max_fragments must be within 1..=256 (got {0})")]
    MaxFragments(usize),

    #[error("{name} must be within 1..=65536 (got {value})")]
    BufferSize { name: &'static str, value: usize },

    #[error("{name} must be within [0, 1] (got {value})")]
    SmoothingFactor { name: &'static str, value: f64 },

    #[error(
        "a packet of max_packet_size ({max_packet_size}) bytes needs {required} fragments, \
         but max_fragments is {max_fragments}"
    )]
    FragmentCapacity {
        max_packet_size: usize,
        required: usize,
        max_fragments: usize,
    },

    #[error("a {kind} datagram may be {size} bytes, exceeding max_packet_size ({max_packet_size})")]
    DatagramSize {
        kind: &'static str,
        size: usize,
        max_packet_size: usize,
    },
}

/// Reason a packet or fragment header could not be decoded.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("buffer too small for packet header ({0})")]
    TooShort(HeaderStep),

    #[error("prefix byte does not indicate a regular packet")]
    NotRegular,

    #[error("prefix byte does not indicate a fragment")]
    NotFragment,

    #[error("fragment count {count} exceeds maximum {max}")]
    TooManyFragments { count: usize, max: usize },

    #[error("fragment id {id} out of range of fragment count {count}")]
    FragmentIdOutOfRange { id: u8, count: usize },

    #[error("embedded packet header sequence {header} does not match fragment sequence {fragment}")]
    SequenceMismatch { header: u16, fragment: u16 },

    #[error("fragment payload of {len} bytes exceeds fragment size {max}")]
    FragmentTooLarge { len: usize, max: usize },

    #[error("non-final fragment payload of {len} bytes is not fragment size {expected}")]
    FragmentSizeMismatch { len: usize, expected: usize },
}

/// The part of a header being read when the buffer ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStep {
    Prefix,
    AckDelta,
    Ack,
    AckBits,
    Fragment,
}

impl std::fmt::Display for HeaderStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Prefix => "prefix and sequence",
            Self::AckDelta => "ack delta",
            Self::Ack => "ack",
            Self::AckBits => "ack bits",
            Self::Fragment => "fragment header",
        };
        f.write_str(name)
    }
}
