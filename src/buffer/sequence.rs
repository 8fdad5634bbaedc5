use crate::sequence;

// Marks an empty slot; no 16-bit sequence number can take this value
const EMPTY: u32 = 0xFFFF_FFFF;

/// Fixed-capacity circular store of entries keyed by 16-bit sequence number.
///
/// Slot `s % capacity` holds the entry for sequence `s` when tagged with `s`, otherwise it is
/// considered empty. Entries are default-constructed once and reused; clearing a slot only
/// removes its tag unless an eviction hook is supplied.
pub struct SequenceBuffer<T> {
    // One past the most recent sequence number inserted
    sequence: u16,
    entry_sequence: Box<[u32]>,
    entries: Box<[T]>,
}

impl<T: Default> SequenceBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "sequence buffer capacity must be nonzero");
        assert!(capacity <= 65536, "sequence buffer capacity exceeds sequence space");

        Self {
            sequence: 0,
            entry_sequence: vec![EMPTY; capacity].into_boxed_slice(),
            entries: (0..capacity).map(|_| T::default()).collect(),
        }
    }
}

impl<T> SequenceBuffer<T> {
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// One past the most recent sequence number inserted.
    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    fn index(&self, sequence: u16) -> usize {
        usize::from(sequence) % self.entries.len()
    }

    // Oldest sequence number that may still be inserted
    fn window_start(&self) -> u16 {
        sequence::increment(self.sequence, -(self.entries.len() as i32))
    }

    /// Clears every slot and rewinds the window to zero.
    pub fn reset(&mut self) {
        self.sequence = 0;
        self.entry_sequence.fill(EMPTY);
    }

    /// Clears every slot, passing each occupied entry to `on_evict` first.
    pub fn reset_with_evict<F>(&mut self, mut on_evict: F)
    where
        F: FnMut(&mut T),
    {
        for (tag, entry) in self.entry_sequence.iter().zip(self.entries.iter_mut()) {
            if *tag != EMPTY {
                on_evict(entry);
            }
        }

        self.reset();
    }

    /// Returns false if inserting `sequence` would be rejected as stale.
    pub fn test_insert(&self, sequence: u16) -> bool {
        !sequence::less_than(sequence, self.window_start())
    }

    /// Tags the slot for `sequence` and returns its entry, or `None` if `sequence` is stale.
    ///
    /// Inserting a sequence number newer than any seen before advances the window and clears every
    /// slot swept over by the advance.
    pub fn insert(&mut self, sequence: u16) -> Option<&mut T> {
        self.insert_with_evict(sequence, |_| ())
    }

    pub fn insert_with_evict<F>(&mut self, sequence: u16, on_evict: F) -> Option<&mut T>
    where
        F: FnMut(&mut T),
    {
        if sequence::less_than(sequence, self.window_start()) {
            return None;
        }

        self.advance_with_evict(sequence, on_evict);

        let index = self.index(sequence);
        self.entry_sequence[index] = u32::from(sequence);
        Some(&mut self.entries[index])
    }

    /// Moves the window forward so that `sequence` is the newest, without tagging its slot.
    pub fn advance(&mut self, sequence: u16) {
        self.advance_with_evict(sequence, |_| ())
    }

    pub fn advance_with_evict<F>(&mut self, sequence: u16, on_evict: F)
    where
        F: FnMut(&mut T),
    {
        let next = sequence::increment(sequence, 1);

        if sequence::greater_than(next, self.sequence) {
            self.remove_entries(self.sequence, sequence, on_evict);
            self.sequence = next;
        }
    }

    // Clears all slots for sequences in [start, finish], wrapping if finish < start
    fn remove_entries<F>(&mut self, start: u16, finish: u16, mut on_evict: F)
    where
        F: FnMut(&mut T),
    {
        let start = u32::from(start);
        let mut finish = u32::from(finish);

        if finish < start {
            finish += 65536;
        }

        let capacity = self.entries.len();

        if ((finish - start) as usize) < capacity {
            for s in start..=finish {
                let index = (s & 0xFFFF) as usize % capacity;
                self.evict_slot(index, &mut on_evict);
            }
        } else {
            for index in 0..capacity {
                self.evict_slot(index, &mut on_evict);
            }
        }
    }

    fn evict_slot<F>(&mut self, index: usize, on_evict: &mut F)
    where
        F: FnMut(&mut T),
    {
        if self.entry_sequence[index] != EMPTY {
            on_evict(&mut self.entries[index]);
            self.entry_sequence[index] = EMPTY;
        }
    }

    /// Clears the slot for `sequence`, if it holds that sequence.
    pub fn remove(&mut self, sequence: u16) {
        self.remove_with_evict(sequence, |_| ())
    }

    pub fn remove_with_evict<F>(&mut self, sequence: u16, mut on_evict: F)
    where
        F: FnMut(&mut T),
    {
        let index = self.index(sequence);

        if self.entry_sequence[index] == u32::from(sequence) {
            self.evict_slot(index, &mut on_evict);
        }
    }

    pub fn exists(&self, sequence: u16) -> bool {
        self.entry_sequence[self.index(sequence)] == u32::from(sequence)
    }

    pub fn find(&self, sequence: u16) -> Option<&T> {
        let index = self.index(sequence);

        if self.entry_sequence[index] == u32::from(sequence) {
            Some(&self.entries[index])
        } else {
            None
        }
    }

    pub fn find_mut(&mut self, sequence: u16) -> Option<&mut T> {
        let index = self.index(sequence);

        if self.entry_sequence[index] == u32::from(sequence) {
            Some(&mut self.entries[index])
        } else {
            None
        }
    }

    /// Returns the most recent sequence number, and a bitfield in which bit `i` is set if
    /// `ack - i` is present.
    pub fn generate_ack_bits(&self) -> (u16, u32) {
        let ack = sequence::increment(self.sequence, -1);
        let mut ack_bits = 0;

        for i in 0..32 {
            if self.exists(sequence::increment(ack, -i)) {
                ack_bits |= 1 << i;
            }
        }

        (ack, ack_bits)
    }
}
