// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! GPU timestamp ticks and timebase conversion.
//!
//! Backends report fill timings as a pair of raw [`Timestamp`]s written on
//! the GPU timeline. The raw values are device ticks; [`Timebase`] carries
//! the rational ticks-to-nanoseconds factor (Vulkan's `timestampPeriod`,
//! Metal's GPU clock, etc.) so the estimator can work in seconds.
//!
//! All conversions go through `u128` intermediates to avoid overflow.

use core::fmt;

/// A raw GPU timestamp in device ticks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Returns the raw tick value.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Returns the span from `earlier` to `self`, or an empty span if
    /// `earlier` is later than `self` (which some drivers report for
    /// wrapped or reordered queries).
    #[inline]
    #[must_use]
    pub const fn saturating_span_since(self, earlier: Self) -> Ticks {
        Ticks(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// A span of GPU time in device ticks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(pub u64);

impl Ticks {
    /// An empty span.
    pub const ZERO: Self = Self(0);

    /// Returns the raw tick count.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Converts this span to nanoseconds.
    #[inline]
    #[must_use]
    pub const fn to_nanos(self, timebase: Timebase) -> u64 {
        timebase.ticks_to_nanos(self.0)
    }

    /// Converts this span to (fractional) seconds.
    #[inline]
    #[must_use]
    pub fn to_seconds(self, timebase: Timebase) -> f64 {
        self.0 as f64 * timebase.numer as f64 / timebase.denom as f64 * 1e-9
    }
}

impl fmt::Debug for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ticks({})", self.0)
    }
}

/// Rational conversion factor from GPU ticks to nanoseconds.
///
/// `nanoseconds = ticks * numer / denom`
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timebase {
    /// Numerator of the ticks-to-nanoseconds ratio.
    pub numer: u32,
    /// Denominator of the ticks-to-nanoseconds ratio.
    pub denom: u32,
}

impl Timebase {
    /// A timebase where ticks are already nanoseconds (1:1).
    pub const NANOS: Self = Self { numer: 1, denom: 1 };

    /// Creates a new timebase with the given numerator and denominator.
    ///
    /// # Panics
    ///
    /// Panics if `denom` is zero.
    #[inline]
    #[must_use]
    pub const fn new(numer: u32, denom: u32) -> Self {
        assert!(denom != 0, "timebase denominator must not be zero");
        Self { numer, denom }
    }

    /// Approximates a fractional tick period (nanoseconds per tick, as
    /// reported by `VkPhysicalDeviceLimits::timestampPeriod`) with a
    /// rational timebase of millinanosecond precision.
    #[must_use]
    pub fn from_period_nanos(period: f32) -> Self {
        if !(period.is_finite() && period > 0.0) {
            return Self::NANOS;
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "period is positive and finite; realistic periods are far below u32::MAX / 1000"
        )]
        let numer = libm::round(f64::from(period) * 1000.0) as u32;
        Self::new(numer.max(1), 1000)
    }

    /// Converts a tick count to nanoseconds.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "u128 intermediate avoids overflow; truncation back to u64 is intentional"
    )]
    pub const fn ticks_to_nanos(self, ticks: u64) -> u64 {
        let wide = ticks as u128 * self.numer as u128 / self.denom as u128;
        wide as u64
    }

    /// Converts nanoseconds to a tick count.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "u128 intermediate avoids overflow; truncation back to u64 is intentional"
    )]
    pub const fn nanos_to_ticks(self, nanos: u64) -> u64 {
        let wide = nanos as u128 * self.denom as u128 / self.numer as u128;
        wide as u64
    }
}

impl Default for Timebase {
    fn default() -> Self {
        Self::NANOS
    }
}

impl fmt::Debug for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timebase({}/{})", self.numer, self.denom)
    }
}
