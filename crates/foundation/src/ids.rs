/// Monotonic sequence number.
///
/// Ordering follows issue order, which is what last-write-wins compares.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SeqNo(u64);

impl SeqNo {
    pub const ZERO: SeqNo = SeqNo(0);

    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Issues strictly increasing [`SeqNo`]s, starting at 1.
#[derive(Debug, Default, Clone)]
pub struct Sequence {
    last: u64,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> SeqNo {
        self.last += 1;
        SeqNo(self.last)
    }

    /// The most recently issued number, or [`SeqNo::ZERO`] if none yet.
    pub fn last(&self) -> SeqNo {
        SeqNo(self.last)
    }
}
