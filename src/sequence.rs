// Sequence numbers are 16 bits and wrap quickly. Two sequence numbers are compared along the
// shorter arc between them: if they are within half the sequence space of one another, the
// numerically larger one is newer; otherwise the numerically smaller one has wrapped and is newer.

const HALF_RANGE: u16 = 32768;

/// Returns true if `s1` is more recent than `s2`.
#[inline]
pub fn greater_than(s1: u16, s2: u16) -> bool {
    (s1 > s2 && s1.wrapping_sub(s2) <= HALF_RANGE) || (s1 < s2 && s2.wrapping_sub(s1) > HALF_RANGE)
}

/// Returns true if `s1` is older than `s2`.
#[inline]
pub fn less_than(s1: u16, s2: u16) -> bool {
    greater_than(s2, s1)
}

/// Adds `delta` to `n` modulo 2^16. Negative deltas step backward.
#[inline]
pub fn increment(n: u16, delta: i32) -> u16 {
    (i32::from(n).wrapping_add(delta) & 0xFFFF) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_near() {
        assert!(greater_than(1, 0));
        assert!(less_than(0, 1));
        assert!(!greater_than(0, 0));
        assert!(!less_than(0, 0));
        assert!(greater_than(200, 100));
    }

    #[test]
    fn ordering_wrap() {
        assert!(greater_than(0, 65535));
        assert!(greater_than(2, 65534));
        assert!(less_than(65535, 0));
        assert!(less_than(65000, 10));
    }

    #[test]
    fn ordering_half_range() {
        // Exactly half the space apart: the larger value wins
        assert!(greater_than(32768, 0));
        assert!(!greater_than(0, 32768));

        assert!(greater_than(0, 32769));
        assert!(less_than(32769, 0));
    }

    #[test]
    fn trichotomy_sweep() {
        for a in (0..=u16::MAX).step_by(97) {
            for b in (0..=u16::MAX).step_by(89) {
                let count = [less_than(a, b), greater_than(a, b), a == b]
                    .iter()
                    .filter(|&&x| x)
                    .count();
                assert_eq!(count, 1, "a = {a}, b = {b}");
            }
        }
    }

    #[test]
    fn increment_wraps() {
        assert_eq!(increment(0, 1), 1);
        assert_eq!(increment(65535, 1), 0);
        assert_eq!(increment(0, -1), 65535);
        assert_eq!(increment(10, -256), 65290);
        assert_eq!(increment(100, 65536), 100);
    }
}
