// Copyright 2026 the Interlace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rolling effort estimator.
//!
//! The [`EffortEstimator`] keeps a ring of recent `(seconds, work)`
//! measurements and answers two questions:
//!
//! - *How much work fits in `T` seconds?* ([`predict_work`]) — an ordinary
//!   least-squares line of effort against time, capped by a pessimistic
//!   ceiling derived from the most recent sample and clamped to a sane
//!   range. This is what the scheduler uses every frame.
//! - *How long will `W` units take?* ([`predict_time`]) — a second model of
//!   throughput against `ln(effort)`, which captures per-fill overhead that
//!   makes small fills relatively slower. [`predict_work_log`] inverts it
//!   through the lower branch of the Lambert W function.
//!
//! Degenerate histories never divide by zero: a singular regression reports
//! [`Regression::ZERO`].
//!
//! [`predict_work`]: EffortEstimator::predict_work
//! [`predict_time`]: EffortEstimator::predict_time
//! [`predict_work_log`]: EffortEstimator::predict_work_log

use alloc::vec::Vec;

/// Estimator tuning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EstimatorConfig {
    /// Ring capacity in samples.
    pub capacity: usize,
    /// Multiplier on the last observed rate for the pessimistic ceiling.
    pub tolerance: f64,
    /// Lower clamp for [`EffortEstimator::predict_work`].
    pub min_work: u64,
    /// Upper clamp for [`EffortEstimator::predict_work`].
    pub max_work: u64,
}

impl EstimatorConfig {
    /// 100 samples, 2x tolerance, `[1000, 100_000_000]` work.
    pub const DEFAULT: Self = Self {
        capacity: 100,
        tolerance: 2.0,
        min_work: 1_000,
        max_work: 100_000_000,
    };
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One measured fill.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffortSample {
    /// GPU time in seconds.
    pub seconds: f64,
    /// Normalized work units.
    pub work: u64,
    /// Difficulty weight; 1.0 for ordinary fills.
    pub weight: f64,
}

impl EffortSample {
    /// `work * weight`.
    #[must_use]
    pub fn effort(&self) -> f64 {
        self.work as f64 * self.weight
    }

    /// Effort per second.
    #[must_use]
    pub fn rate(&self) -> f64 {
        self.effort() / self.seconds
    }
}

/// A fitted line `y = intercept + slope * x`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Regression {
    /// Value at `x = 0`.
    pub intercept: f64,
    /// Change in `y` per unit `x`.
    pub slope: f64,
}

impl Regression {
    /// The "no prediction" model.
    pub const ZERO: Self = Self {
        intercept: 0.0,
        slope: 0.0,
    };

    /// Least-squares fit of `points`.
    ///
    /// Returns `None` for fewer than two points or when every `x` is
    /// (numerically) the same.
    #[must_use]
    pub fn fit<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
        I::IntoIter: Clone,
    {
        let points = points.into_iter();
        let mut n = 0_usize;
        let (mut sum_x, mut sum_y) = (0.0, 0.0);
        for (x, y) in points.clone() {
            n += 1;
            sum_x += x;
            sum_y += y;
        }
        if n < 2 {
            return None;
        }
        let nf = n as f64;
        let (mean_x, mean_y) = (sum_x / nf, sum_y / nf);
        let (mut sxx, mut sxy) = (0.0, 0.0);
        for (x, y) in points {
            let dx = x - mean_x;
            sxx += dx * dx;
            sxy += dx * (y - mean_y);
        }
        if !(sxx > f64::EPSILON * nf * mean_x * mean_x) {
            return None;
        }
        let slope = sxy / sxx;
        let fit = Self {
            intercept: mean_y - slope * mean_x,
            slope,
        };
        (fit.intercept.is_finite() && fit.slope.is_finite()).then_some(fit)
    }

    /// Evaluates the line at `x`.
    #[must_use]
    pub fn eval(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Lower branch `W₋₁` of the Lambert W function, defined on `[-1/e, 0)`.
///
/// Returns `None` outside the domain.
#[must_use]
pub fn lambert_wm1(z: f64) -> Option<f64> {
    const INV_E: f64 = 0.367_879_441_171_442_33;
    if !(z < 0.0) || z < -INV_E - 1e-15 {
        return None;
    }
    let branch_distance = 1.0 + core::f64::consts::E * z;
    if branch_distance <= 1e-15 {
        return Some(-1.0);
    }

    let mut w = if z < -0.25 {
        // Series about the branch point.
        let p = -libm::sqrt(2.0 * branch_distance);
        -1.0 + p - p * p / 3.0 + 11.0 / 72.0 * p * p * p
    } else {
        let l1 = libm::log(-z);
        let l2 = libm::log(-l1);
        l1 - l2 + l2 / l1
    };

    // Halley iteration.
    for _ in 0..64 {
        let ew = libm::exp(w);
        let f = w * ew - z;
        let wp1 = w + 1.0;
        if wp1 == 0.0 {
            break;
        }
        let step = f / (ew * wp1 - (w + 2.0) * f / (2.0 * wp1));
        w -= step;
        if step.abs() <= 1e-14 * (1.0 + w.abs()) {
            break;
        }
    }
    w.is_finite().then_some(w)
}

/// Rolling regression over recent fill measurements.
#[derive(Clone, Debug)]
pub struct EffortEstimator {
    config: EstimatorConfig,
    samples: Vec<EffortSample>,
    /// Next slot to overwrite once the ring is full.
    cursor: usize,
}

impl EffortEstimator {
    /// Creates an empty estimator.
    #[must_use]
    pub fn new(config: EstimatorConfig) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            config: EstimatorConfig { capacity, ..config },
            samples: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Number of samples held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if no samples are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Held samples, in ring order.
    pub fn samples(&self) -> impl Iterator<Item = &EffortSample> + Clone {
        self.samples.iter()
    }

    /// The most recently pushed sample.
    #[must_use]
    pub fn last(&self) -> Option<&EffortSample> {
        if self.samples.len() < self.config.capacity {
            self.samples.last()
        } else {
            let newest = (self.cursor + self.config.capacity - 1) % self.config.capacity;
            self.samples.get(newest)
        }
    }

    /// Records a measurement, overwriting the oldest once full.
    ///
    /// Samples with non-positive or non-finite time or weight, or zero work,
    /// carry no rate information and are ignored; returns whether the sample
    /// was kept.
    pub fn push(&mut self, seconds: f64, work: u64, weight: f64) -> bool {
        let valid = seconds.is_finite() && seconds > 0.0 && work > 0 && weight.is_finite() && weight > 0.0;
        if !valid {
            return false;
        }
        let sample = EffortSample {
            seconds,
            work,
            weight,
        };
        if self.samples.len() < self.config.capacity {
            self.samples.push(sample);
        } else {
            self.samples[self.cursor] = sample;
            self.cursor = (self.cursor + 1) % self.config.capacity;
        }
        true
    }

    /// Drops all history.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.cursor = 0;
    }

    /// Effort against time; [`Regression::ZERO`] when singular.
    #[must_use]
    pub fn linear_model(&self) -> Regression {
        self.fit_linear().unwrap_or(Regression::ZERO)
    }

    /// Rate against `ln(effort)`; [`Regression::ZERO`] when singular.
    #[must_use]
    pub fn log_model(&self) -> Regression {
        self.fit_log().unwrap_or(Regression::ZERO)
    }

    fn fit_linear(&self) -> Option<Regression> {
        Regression::fit(self.samples.iter().map(|s| (s.seconds, s.effort())))
    }

    fn fit_log(&self) -> Option<Regression> {
        Regression::fit(self.samples.iter().map(|s| (libm::log(s.effort()), s.rate())))
    }

    /// Unclamped work estimate for `seconds`, before the range clamp.
    ///
    /// The linear model is capped by `last_rate * seconds * tolerance`. A
    /// negative slope is treated as flat (mean effort). If the fit is
    /// singular but history exists, the mean throughput of the history
    /// stands in for the line.
    #[must_use]
    pub fn raw_work(&self, seconds: f64) -> f64 {
        let t = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        let Some(last) = self.last() else {
            return self.config.min_work as f64;
        };
        let ceiling = last.rate() * t * self.config.tolerance;
        let model = match self.fit_linear() {
            Some(line) if line.slope >= 0.0 => line.eval(t),
            Some(_) => self.mean_effort(),
            None => self.mean_rate() * t,
        };
        model.min(ceiling).max(0.0)
    }

    /// Work that fits in `seconds`, clamped to
    /// `[min_work, max_work]`.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "value is clamped to the u64 work range first"
    )]
    pub fn predict_work(&self, seconds: f64) -> u64 {
        let raw = self.raw_work(seconds);
        let (lo, hi) = (self.config.min_work, self.config.max_work.max(self.config.min_work));
        if raw.is_nan() {
            return lo;
        }
        libm::round(raw.clamp(lo as f64, hi as f64)) as u64
    }

    /// Seconds `work` is expected to take under the log model, or 0 when
    /// there is no usable model.
    #[must_use]
    pub fn predict_time(&self, work: u64) -> f64 {
        let Some(model) = self.fit_log() else {
            return 0.0;
        };
        if work == 0 {
            return 0.0;
        }
        let w = work as f64;
        let rate = model.eval(libm::log(w));
        if rate > 0.0 { w / rate } else { 0.0 }
    }

    /// Inverse of [`predict_time`](Self::predict_time): work that takes
    /// `seconds` under the log model, or 0 when there is no usable model or
    /// no solution.
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "result is checked against the u64 range"
    )]
    pub fn predict_work_log(&self, seconds: f64) -> u64 {
        let Some(Regression {
            intercept: a,
            slope: b,
        }) = self.fit_log()
        else {
            return 0;
        };
        if !(seconds.is_finite() && seconds > 0.0) {
            return 0;
        }
        let work = if b.abs() <= 1e-9 * a.abs() {
            a * seconds
        } else {
            let z = -libm::exp(-a / b) / (b * seconds);
            match lambert_wm1(z) {
                Some(w) => -b * seconds * w,
                None => return 0,
            }
        };
        if work.is_finite() && work > 0.0 && work < 1.8e19 {
            libm::round(work) as u64
        } else {
            0
        }
    }

    fn mean_effort(&self) -> f64 {
        let total: f64 = self.samples.iter().map(EffortSample::effort).sum();
        total / self.samples.len() as f64
    }

    fn mean_rate(&self) -> f64 {
        let effort: f64 = self.samples.iter().map(EffortSample::effort).sum();
        let seconds: f64 = self.samples.iter().map(|s| s.seconds).sum();
        if seconds > 0.0 { effort / seconds } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> EffortEstimator {
        EffortEstimator::new(EstimatorConfig::DEFAULT)
    }

    #[test]
    fn empty_history_predicts_clamp_minimum() {
        let e = estimator();
        assert_eq!(e.predict_work(0.02), 1_000);
        assert_eq!(e.predict_work(10.0), 1_000);
        assert_eq!(e.linear_model(), Regression::ZERO);
        assert_eq!(e.predict_time(50_000), 0.0);
        assert_eq!(e.predict_work_log(0.02), 0);
    }

    #[test]
    fn single_sample_regression_is_singular() {
        let mut e = estimator();
        assert!(e.push(0.02, 50_000, 1.0));
        assert_eq!(e.linear_model(), Regression::ZERO);
        assert_eq!(e.log_model(), Regression::ZERO);
    }

    #[test]
    fn identical_samples_predict_their_own_work() {
        let mut e = estimator();
        for _ in 0..10 {
            e.push(0.02, 50_000, 1.0);
        }
        let w = e.predict_work(0.02);
        assert!((25_000..=100_000).contains(&w), "got {w}");
        assert_eq!(w, 50_000);
    }

    #[test]
    fn zero_time_predicts_at_most_minimum() {
        let mut e = estimator();
        for i in 1..=20_u64 {
            e.push(0.001 * i as f64, 40_000 * i + 3_000, 1.0);
        }
        assert!(e.predict_work(0.0) <= 1_000);
    }

    #[test]
    fn ceiling_caps_optimistic_line() {
        let mut e = estimator();
        // Fast history, then one slow sample.
        for i in 1..=10_u64 {
            e.push(0.001 * i as f64, 1_000_000 * i, 1.0);
        }
        e.push(0.01, 100_000, 1.0);
        // Ceiling: 1e7/s * 0.02 * 2 = 400_000.
        assert_eq!(e.predict_work(0.02), 400_000);
    }

    #[test]
    fn predict_work_is_monotone() {
        let histories: [&[(f64, u64)]; 3] = [
            &[(0.01, 30_000), (0.02, 50_000), (0.015, 45_000), (0.03, 70_000)],
            // Anti-correlated noise: fitted slope is negative.
            &[(0.01, 90_000), (0.02, 40_000), (0.03, 20_000)],
            &[(0.05, 10_000), (0.05, 10_000)],
        ];
        for history in histories {
            let mut e = estimator();
            for &(t, w) in history {
                e.push(t, w, 1.0);
            }
            let mut prev = 0;
            for step in 0..200 {
                let t = f64::from(step) * 0.001;
                let w = e.predict_work(t);
                assert!(w >= prev, "{history:?}: {w} < {prev} at {t}");
                prev = w;
            }
        }
    }

    #[test]
    fn ring_overwrites_oldest() {
        let mut e = EffortEstimator::new(EstimatorConfig {
            capacity: 3,
            ..EstimatorConfig::DEFAULT
        });
        for i in 1..=5_u64 {
            e.push(0.01, i * 1_000, 1.0);
        }
        assert_eq!(e.len(), 3);
        let mut works: Vec<u64> = e.samples().map(|s| s.work).collect();
        works.sort_unstable();
        assert_eq!(works, [3_000, 4_000, 5_000]);
        assert_eq!(e.last().map(|s| s.work), Some(5_000));
    }

    #[test]
    fn invalid_samples_are_ignored() {
        let mut e = estimator();
        assert!(!e.push(0.0, 1_000, 1.0));
        assert!(!e.push(-1.0, 1_000, 1.0));
        assert!(!e.push(f64::NAN, 1_000, 1.0));
        assert!(!e.push(0.01, 0, 1.0));
        assert!(!e.push(0.01, 1_000, 0.0));
        assert!(e.is_empty());
    }

    #[test]
    fn reset_clears_history() {
        let mut e = estimator();
        e.push(0.02, 50_000, 1.0);
        e.reset();
        assert!(e.is_empty());
        assert!(e.last().is_none());
        assert_eq!(e.predict_work(0.02), 1_000);
    }

    #[test]
    fn weight_scales_effort() {
        let s = EffortSample {
            seconds: 0.5,
            work: 1_000,
            weight: 2.0,
        };
        assert_eq!(s.effort(), 2_000.0);
        assert_eq!(s.rate(), 4_000.0);
    }

    #[test]
    fn time_round_trip_at_constant_throughput() {
        let rate = 2_500_000.0;
        let mut e = estimator();
        for &work in &[10_000_u64, 40_000, 80_000, 120_000, 200_000] {
            e.push(work as f64 / rate, work, 1.0);
        }
        for &t in &[0.005, 0.02, 0.04] {
            let w = e.predict_work(t);
            let back = e.predict_time(w);
            assert!((back - t).abs() < 1e-6, "T={t}: W={w}, back={back}");
        }
    }

    #[test]
    fn log_model_inverts_through_lambert() {
        let (a, b) = (2.0e6, 1.0e5);
        let mut e = estimator();
        for &work in &[10_000_u64, 50_000, 100_000, 500_000, 1_000_000] {
            let rate = a + b * libm::log(work as f64);
            e.push(work as f64 / rate, work, 1.0);
        }
        let model = e.log_model();
        assert!((model.intercept - a).abs() < 1.0, "{model:?}");
        assert!((model.slope - b).abs() < 1e-3, "{model:?}");

        let target = 200_000_u64;
        let t = e.predict_time(target);
        let w = e.predict_work_log(t);
        assert!(w.abs_diff(target) <= 2, "expected ~{target}, got {w}");
    }

    #[test]
    fn flat_log_model_is_linear() {
        let rate = 1.0e6;
        let mut e = estimator();
        for &work in &[1_000_u64, 10_000, 100_000] {
            e.push(work as f64 / rate, work, 1.0);
        }
        let w = e.predict_work_log(0.01);
        assert!(w.abs_diff(10_000) <= 1, "got {w}");
    }

    #[test]
    fn lambert_branch_values() {
        let w = lambert_wm1(-0.1).unwrap();
        assert!((w - -3.577_152_063_957_297).abs() < 1e-10, "got {w}");
        assert_eq!(lambert_wm1(-libm::exp(-1.0)), Some(-1.0));
        for &z in &[-0.367, -0.3, -0.2, -0.05, -1e-3, -1e-8] {
            let w = lambert_wm1(z).unwrap();
            assert!(w <= -1.0, "z={z}: {w}");
            let back = w * libm::exp(w);
            assert!((back - z).abs() < 1e-12 * (1.0 + z.abs()) + 1e-15, "z={z}: {back}");
        }
    }

    #[test]
    fn lambert_outside_domain() {
        assert_eq!(lambert_wm1(0.0), None);
        assert_eq!(lambert_wm1(0.5), None);
        assert_eq!(lambert_wm1(-0.5), None);
        assert_eq!(lambert_wm1(f64::NAN), None);
    }
}
