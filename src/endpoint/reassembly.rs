use std::ops::Range;

use super::Config;
use crate::buffer::{BufferAllocator, SequenceBuffer};
use crate::error::FrameError;
use crate::frame::serial::{Serial, Writer};
use crate::frame::{FragmentHeader, PacketHeader, PACKET_HEADER_SIZE_MAX};

/// A decoded fragment, borrowing its payload from the received datagram.
#[derive(Clone, Debug, PartialEq)]
pub struct FragmentRef<'a> {
    pub header: FragmentHeader,
    // Present on fragment 0 only
    pub packet_header: Option<PacketHeader>,
    pub data: &'a [u8],
}

/// Decodes and validates a fragment against the endpoint's fragmentation limits.
pub fn read_fragment<'a>(
    packet_bytes: &'a [u8],
    config: &Config,
) -> Result<FragmentRef<'a>, FrameError> {
    let (header, header_size) = FragmentHeader::read(packet_bytes)?;

    if header.num_fragments > config.max_fragments {
        return Err(FrameError::TooManyFragments {
            count: header.num_fragments,
            max: config.max_fragments,
        });
    }

    if usize::from(header.fragment_id) >= header.num_fragments {
        return Err(FrameError::FragmentIdOutOfRange {
            id: header.fragment_id,
            count: header.num_fragments,
        });
    }

    let mut data = &packet_bytes[header_size..];
    let mut packet_header = None;

    if header.fragment_id == 0 {
        let (embedded, embedded_size) = PacketHeader::read(data)?;

        if embedded.sequence != header.sequence {
            return Err(FrameError::SequenceMismatch {
                header: embedded.sequence,
                fragment: header.sequence,
            });
        }

        data = &data[embedded_size..];
        packet_header = Some(embedded);
    }

    if data.len() > config.fragment_size {
        return Err(FrameError::FragmentTooLarge {
            len: data.len(),
            max: config.fragment_size,
        });
    }

    let is_last = usize::from(header.fragment_id) == header.num_fragments - 1;

    if !is_last && data.len() != config.fragment_size {
        return Err(FrameError::FragmentSizeMismatch {
            len: data.len(),
            expected: config.fragment_size,
        });
    }

    Ok(FragmentRef {
        header,
        packet_header,
        data,
    })
}

#[derive(Default)]
pub struct ReassemblyEntry {
    sequence: u16,
    num_fragments_received: usize,
    num_fragments_total: usize,
    fragment_received: [u64; 4],
    // The original packet header is stored right-aligned before PACKET_HEADER_SIZE_MAX, and the
    // payload of fragment i starts at PACKET_HEADER_SIZE_MAX + i * fragment_size
    packet_data: Option<Box<[u8]>>,
    packet_header_bytes: usize,
    packet_bytes: usize,
}

impl ReassemblyEntry {
    fn begin(&mut self, sequence: u16, num_fragments: usize, packet_data: Box<[u8]>) {
        self.sequence = sequence;
        self.num_fragments_received = 0;
        self.num_fragments_total = num_fragments;
        self.fragment_received = [0; 4];
        self.packet_data = Some(packet_data);
        self.packet_header_bytes = 0;
        self.packet_bytes = 0;
    }

    fn is_received(&self, fragment_id: u8) -> bool {
        let id = usize::from(fragment_id);
        self.fragment_received[id / 64] & (1 << (id % 64)) != 0
    }

    fn mark_received(&mut self, fragment_id: u8) {
        let id = usize::from(fragment_id);
        self.fragment_received[id / 64] |= 1 << (id % 64);
        self.num_fragments_received += 1;
    }

    fn is_complete(&self) -> bool {
        self.num_fragments_received == self.num_fragments_total
    }

    fn store(&mut self, fragment: &FragmentRef, fragment_size: usize) {
        debug_assert_eq!(fragment.header.sequence, self.sequence);

        let Some(packet_data) = self.packet_data.as_mut() else {
            return;
        };

        if let Some(packet_header) = &fragment.packet_header {
            let header_size = packet_header.encoded_size();
            let header_start = PACKET_HEADER_SIZE_MAX - header_size;

            let mut wr = Writer::new(&mut packet_data[header_start..PACKET_HEADER_SIZE_MAX]);
            packet_header.encode(&mut wr);

            self.packet_header_bytes = header_size;
        }

        let fragment_id = usize::from(fragment.header.fragment_id);

        if fragment_id == self.num_fragments_total - 1 {
            let whole_fragments = self.num_fragments_total - 1;
            self.packet_bytes = whole_fragments * fragment_size + fragment.data.len();
        }

        let offset = PACKET_HEADER_SIZE_MAX + fragment_id * fragment_size;
        packet_data[offset..offset + fragment.data.len()].copy_from_slice(fragment.data);
    }

    /// Takes ownership of the reassembly buffer, if any.
    fn release(&mut self) -> Option<Box<[u8]>> {
        self.packet_data.take()
    }
}

/// A fully reassembled packet: header immediately followed by payload.
#[derive(Debug)]
pub struct CompletedPacket {
    sequence: u16,
    buffer: Box<[u8]>,
    range: Range<usize>,
}

impl CompletedPacket {
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer[self.range.clone()]
    }

    pub fn payload_size(&self) -> usize {
        self.range.end - PACKET_HEADER_SIZE_MAX
    }

    pub fn into_buffer(self) -> Box<[u8]> {
        self.buffer
    }
}

#[derive(Debug)]
pub struct Progress {
    /// A new reassembly entry was created for this fragment's sequence.
    pub created: bool,
    pub completed: Option<CompletedPacket>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Rejected {
    /// Sequence too old for the reassembly window.
    Stale,
    /// Fragment disagrees with earlier fragments about the fragment count.
    CountMismatch { expected: usize, received: usize },
    Duplicate,
}

pub struct Reassembler {
    entries: SequenceBuffer<ReassemblyEntry>,
}

fn release_into<A: BufferAllocator>(allocator: &mut A) -> impl FnMut(&mut ReassemblyEntry) + '_ {
    move |entry| {
        if let Some(buffer) = entry.release() {
            allocator.release(buffer);
        }
    }
}

impl Reassembler {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: SequenceBuffer::new(capacity),
        }
    }

    #[cfg(test)]
    pub fn contains(&self, sequence: u16) -> bool {
        self.entries.exists(sequence)
    }

    /// Moves the window forward to `sequence`, dropping any reassembly swept over.
    pub fn advance<A: BufferAllocator>(&mut self, sequence: u16, allocator: &mut A) {
        self.entries.advance_with_evict(sequence, release_into(allocator));
    }

    pub fn reset<A: BufferAllocator>(&mut self, allocator: &mut A) {
        self.entries.reset_with_evict(release_into(allocator));
    }

    pub fn receive<A: BufferAllocator>(
        &mut self,
        fragment: &FragmentRef,
        allocator: &mut A,
        config: &Config,
    ) -> Result<Progress, Rejected> {
        let sequence = fragment.header.sequence;
        let num_fragments = fragment.header.num_fragments;

        let created = !self.entries.exists(sequence);

        if created {
            let entry = self
                .entries
                .insert_with_evict(sequence, release_into(allocator))
                .ok_or(Rejected::Stale)?;

            // An older sequence may have been inserted over a live slot
            if let Some(stale_data) = entry.release() {
                allocator.release(stale_data);
            }

            let packet_size = PACKET_HEADER_SIZE_MAX + num_fragments * config.fragment_size;
            let packet_data = allocator.acquire(packet_size);
            entry.begin(sequence, num_fragments, packet_data);
        }

        let entry = self.entries.find_mut(sequence).ok_or(Rejected::Stale)?;

        if entry.num_fragments_total != num_fragments {
            return Err(Rejected::CountMismatch {
                expected: entry.num_fragments_total,
                received: num_fragments,
            });
        }

        if entry.is_received(fragment.header.fragment_id) {
            return Err(Rejected::Duplicate);
        }

        entry.mark_received(fragment.header.fragment_id);
        entry.store(fragment, config.fragment_size);

        let completed = if entry.is_complete() {
            let start = PACKET_HEADER_SIZE_MAX - entry.packet_header_bytes;
            let end = PACKET_HEADER_SIZE_MAX + entry.packet_bytes;

            let buffer = entry.release();
            self.entries.remove(sequence);

            buffer.map(|buffer| CompletedPacket {
                sequence,
                buffer,
                range: start..end,
            })
        } else {
            None
        };

        Ok(Progress { created, completed })
    }
}
