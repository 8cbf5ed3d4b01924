use std::fmt;

/// A simple type for integer coordinate ranges
///
/// All ranges follow the alignment coordinate convention used in pair records: 1-indexed,
/// fully closed, [start,end]
///
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct IntRange {
    pub start: i64,
    pub end: i64,
}

impl IntRange {
    pub fn from_pair(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn size(&self) -> i64 {
        self.end - self.start + 1
    }

    /// Return true if pos is inside the range, including either endpoint
    ///
    pub fn contains_pos(&self, pos: i64) -> bool {
        pos >= self.start && pos <= self.end
    }

    /// Widen the range by `flank` on each side
    ///
    pub fn expand_by(&self, flank: i64) -> Self {
        Self {
            start: self.start - flank,
            end: self.end + flank,
        }
    }
}

impl fmt::Debug for IntRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}-{}]", self.start, self.end)
    }
}

/// Test whether two closed ranges share any position
///
/// Adjacent ranges such as [1,100] and [101,200] do not overlap, [1,101] and [101,200] do.
///
pub fn range_overlap(r1: &IntRange, r2: &IntRange) -> bool {
    r1.start <= r2.end && r2.start <= r1.end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_overlap() {
        let r1 = IntRange::from_pair(1, 100);
        let r2 = IntRange::from_pair(101, 200);
        let r3 = IntRange::from_pair(1, 101);
        assert!(!range_overlap(&r1, &r2));
        assert!(!range_overlap(&r2, &r1));
        assert!(range_overlap(&r3, &r2));
        assert!(range_overlap(&r2, &r3));

        let r4 = IntRange::from_pair(201, 301);
        let r5 = IntRange::from_pair(102, 300);
        assert!(range_overlap(&r4, &r5));
        assert!(range_overlap(&r5, &r4));

        // Containment
        let r6 = IntRange::from_pair(150, 160);
        assert!(range_overlap(&r2, &r6));
        assert!(range_overlap(&r6, &r2));
    }

    #[test]
    fn test_contains_pos() {
        let r = IntRange::from_pair(10, 20);
        assert!(r.contains_pos(10));
        assert!(r.contains_pos(20));
        assert!(!r.contains_pos(9));
        assert!(!r.contains_pos(21));
        assert_eq!(r.size(), 11);
    }

    #[test]
    fn test_expand_by() {
        let r = IntRange::from_pair(5, 20);
        assert_eq!(r.expand_by(5), IntRange::from_pair(0, 25));
        assert_eq!(r.expand_by(5).size(), r.size() + 10);
    }
}
