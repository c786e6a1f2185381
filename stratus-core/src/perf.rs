//! Affine cost functions.
//!
//! Every protocol models its estimated send time over a range of message
//! lengths as an affine function `c + m * x`: a fixed overhead in seconds
//! plus a per-byte cost. The threshold builder works entirely in terms of
//! these functions - evaluating them, and intersecting pairs to find the
//! message length where one protocol overtakes another.

/// An affine function `f(x) = c + m * x` over message length.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinearFunc {
    /// Fixed cost in seconds.
    pub c: f64,

    /// Per-byte cost in seconds.
    pub m: f64,
}

impl LinearFunc {
    /// The zero function.
    pub const ZERO: Self = Self { c: 0.0, m: 0.0 };

    /// Create a function from its fixed and per-byte costs.
    #[must_use]
    pub const fn new(c: f64, m: f64) -> Self {
        Self { c, m }
    }

    /// Model a link with the given wire latency (seconds) and bandwidth
    /// (bytes per second).
    #[must_use]
    pub fn from_latency_bw(latency: f64, bandwidth: f64) -> Self {
        Self {
            c: latency,
            m: 1.0 / bandwidth,
        }
    }

    /// Evaluate the function at `x`.
    #[must_use]
    pub fn apply(&self, x: f64) -> f64 {
        self.c + self.m * x
    }

    /// Find the point where `self` and `other` evaluate equally.
    ///
    /// Returns `None` for parallel lines, or when the solution is not a
    /// finite value.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<f64> {
        let dm = self.m - other.m;
        if dm == 0.0 {
            return None;
        }
        let x = (other.c - self.c) / dm;
        x.is_finite().then_some(x)
    }
}
