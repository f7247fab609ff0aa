use std::{fmt::Display, ops::Deref, time::Duration};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0 as i32)
    }
}

impl Percentage {
    /// Value in `0.0..=1.0`, what gauges expect.
    pub fn ratio(&self) -> f64 {
        (self.0 / 100.).min(1.)
    }
}

impl Deref for Percentage {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// How much of `whole` has been used up. Capped at 100%, an empty `whole` counts as done.
pub fn progress(value: Duration, whole: Duration) -> Percentage {
    if whole.is_zero() {
        return Percentage(100.);
    }
    Percentage((value.as_secs_f64() / whole.as_secs_f64() * 100.).min(100.))
}
