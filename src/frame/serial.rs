use super::*;

use crate::error::{FrameError, HeaderStep};

// Prefix bit set when the ack can be sent as a single byte delta from the sequence
const ACK_DELTA_BIT: u8 = 1 << 5;
// Prefix bits 1..=4 are set when the corresponding byte of ack_bits is not 0xFF
const ACK_BITS_SHIFT: u32 = 1;

const FRAGMENT_PREFIX: u8 = 0x01;

pub struct Reader<'a> {
    buffer: &'a [u8],
    bytes_read: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.bytes_read
    }

    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.buffer.get(self.bytes_read..self.bytes_read + N)?;
        self.bytes_read += N;
        bytes.try_into().ok()
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|b| b[0])
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        self.take::<2>().map(u16::from_le_bytes)
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        self.take::<4>().map(u32::from_le_bytes)
    }
}

pub struct Writer<'a> {
    buffer: &'a mut [u8],
    bytes_written: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buffer,
            bytes_written: 0,
        }
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_slice(&[value]);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_slice(&value.to_le_bytes());
    }

    pub fn write_slice(&mut self, bytes: &[u8]) {
        let end = self.bytes_written + bytes.len();
        self.buffer[self.bytes_written..end].copy_from_slice(bytes);
        self.bytes_written = end;
    }
}

pub trait Serial: Sized {
    /// Decodes an object from the front of `buffer`, returning it and the number of bytes read.
    fn read(buffer: &[u8]) -> Result<(Self, usize), FrameError>;

    /// Encodes an object to the front of `buffer`, returning the number of bytes written, or
    /// `None` if `buffer` is too small.
    fn write(buffer: &mut [u8], obj: &Self) -> Option<usize>;
}

impl PacketHeader {
    fn ack_delta(&self) -> Option<u8> {
        u8::try_from(self.sequence.wrapping_sub(self.ack)).ok()
    }

    fn prefix_byte(&self) -> u8 {
        let mut prefix = 0;

        for i in 0..4 {
            if (self.ack_bits >> (8 * i)) & 0xFF != 0xFF {
                prefix |= 1 << (i + ACK_BITS_SHIFT);
            }
        }

        if self.ack_delta().is_some() {
            prefix |= ACK_DELTA_BIT;
        }

        prefix
    }

    /// Appends this header to `wr`, which must have room for [`Self::encoded_size`] bytes.
    pub fn encode(&self, wr: &mut Writer) {
        let prefix = self.prefix_byte();

        wr.write_u8(prefix);
        wr.write_u16(self.sequence);

        match self.ack_delta() {
            Some(delta) => wr.write_u8(delta),
            None => wr.write_u16(self.ack),
        }

        for i in 0..4 {
            if prefix & (1 << (i + ACK_BITS_SHIFT)) != 0 {
                wr.write_u8((self.ack_bits >> (8 * i)) as u8);
            }
        }
    }

    /// Number of bytes this header occupies on the wire.
    pub fn encoded_size(&self) -> usize {
        let prefix = self.prefix_byte();
        let ack_size = if prefix & ACK_DELTA_BIT != 0 { 1 } else { 2 };
        let ack_bits_size = explicit_ack_bytes(prefix);

        1 + 2 + ack_size + ack_bits_size
    }
}

fn explicit_ack_bytes(prefix: u8) -> usize {
    (0..4)
        .filter(|i| prefix & (1 << (i + ACK_BITS_SHIFT)) != 0)
        .count()
}

impl Serial for PacketHeader {
    fn read(buffer: &[u8]) -> Result<(Self, usize), FrameError> {
        let rd = &mut Reader::new(buffer);

        if rd.remaining() < PACKET_HEADER_SIZE_MIN {
            return Err(FrameError::TooShort(HeaderStep::Prefix));
        }

        let prefix = rd.read_u8().ok_or(FrameError::TooShort(HeaderStep::Prefix))?;

        if prefix & FRAGMENT_BIT != 0 {
            return Err(FrameError::NotRegular);
        }

        let sequence = rd.read_u16().ok_or(FrameError::TooShort(HeaderStep::Prefix))?;

        let ack = if prefix & ACK_DELTA_BIT != 0 {
            let delta = rd.read_u8().ok_or(FrameError::TooShort(HeaderStep::AckDelta))?;
            sequence.wrapping_sub(u16::from(delta))
        } else {
            rd.read_u16().ok_or(FrameError::TooShort(HeaderStep::Ack))?
        };

        if rd.remaining() < explicit_ack_bytes(prefix) {
            return Err(FrameError::TooShort(HeaderStep::AckBits));
        }

        let mut ack_bits = 0xFFFF_FFFF_u32;

        for i in 0..4 {
            if prefix & (1 << (i + ACK_BITS_SHIFT)) != 0 {
                let byte = rd.read_u8().ok_or(FrameError::TooShort(HeaderStep::AckBits))?;
                ack_bits &= !(0xFF << (8 * i));
                ack_bits |= u32::from(byte) << (8 * i);
            }
        }

        let header = Self {
            sequence,
            ack,
            ack_bits,
        };

        Ok((header, rd.bytes_read()))
    }

    fn write(buffer: &mut [u8], obj: &Self) -> Option<usize> {
        if buffer.len() < obj.encoded_size() {
            return None;
        }

        let mut wr = Writer::new(buffer);

        obj.encode(&mut wr);

        debug_assert_eq!(wr.bytes_written(), obj.encoded_size());

        Some(wr.bytes_written())
    }
}

impl Serial for FragmentHeader {
    fn read(buffer: &[u8]) -> Result<(Self, usize), FrameError> {
        let rd = &mut Reader::new(buffer);

        if rd.remaining() < FRAGMENT_HEADER_SIZE {
            return Err(FrameError::TooShort(HeaderStep::Fragment));
        }

        let too_short = FrameError::TooShort(HeaderStep::Fragment);

        if rd.read_u8().ok_or(too_short)? != FRAGMENT_PREFIX {
            return Err(FrameError::NotFragment);
        }

        let sequence = rd.read_u16().ok_or(too_short)?;
        let fragment_id = rd.read_u8().ok_or(too_short)?;
        let num_fragments = usize::from(rd.read_u8().ok_or(too_short)?) + 1;

        debug_assert_eq!(rd.bytes_read(), FRAGMENT_HEADER_SIZE);

        let header = Self {
            sequence,
            fragment_id,
            num_fragments,
        };

        Ok((header, rd.bytes_read()))
    }

    fn write(buffer: &mut [u8], obj: &Self) -> Option<usize> {
        if buffer.len() < FRAGMENT_HEADER_SIZE {
            return None;
        }

        let mut wr = Writer::new(buffer);

        obj.encode(&mut wr);

        Some(wr.bytes_written())
    }
}

impl FragmentHeader {
    /// Appends this header to `wr`, which must have room for [`FRAGMENT_HEADER_SIZE`] bytes.
    pub fn encode(&self, wr: &mut Writer) {
        debug_assert!(self.num_fragments >= 1 && self.num_fragments <= 256);

        wr.write_u8(FRAGMENT_PREFIX);
        wr.write_u16(self.sequence);
        wr.write_u8(self.fragment_id);
        wr.write_u8((self.num_fragments - 1) as u8);
    }
}
