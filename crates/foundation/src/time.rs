/// Session-relative time in seconds.
///
/// Deadlines are computed and compared in this timebase so the popup settle
/// logic can be driven by a real clock or stepped by hand in tests.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd, Default)]
pub struct Time(pub f64);

impl Time {
    pub const ZERO: Time = Time(0.0);

    pub fn after(self, seconds: f64) -> Time {
        Time(self.0 + seconds.max(0.0))
    }

    /// Seconds from `earlier` to `self`, clamped at zero.
    pub fn elapsed_since(self, earlier: Time) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }
}
