//! Fixed-width binning of `(x, y, y_error)` samples with inverse-variance
//! weighting.
//!
//! Samples are sorted by `x` and swept left to right with a single cursor.
//! Bin `i` is centred on `t0 + dt/2 + i*dt` and owns every not-yet-consumed
//! sample with `x < centre + dt/2`, so a sample sitting exactly on an upper
//! edge lands in the following bin. Bins that receive nothing are skipped.

use tracing::debug;

use crate::error::{Error, Result};

/// One measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub y_error: f64,
}

impl Sample {
    pub fn new(x: f64, y: f64, y_error: f64) -> Self {
        Self { x, y, y_error }
    }
}

/// Weighted mean of one non-empty bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinnedResult {
    /// Bin centre.
    pub t: f64,
    pub y: f64,
    /// Standard error of the weighted mean, `(sum w)^-1/2`.
    pub y_err: f64,
    /// Number of samples that fell into the bin.
    pub samples: usize,
}

/// Bin geometry plus the empty-result policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binner {
    bin_width: f64,
    first_bin_start: Option<f64>,
    require_bins: bool,
}

impl Binner {
    /// `bin_width` must be finite and strictly positive. Without
    /// `first_bin_start` the first bin opens at the smallest sample `x`.
    pub fn new(bin_width: f64, first_bin_start: Option<f64>) -> Result<Self> {
        if !bin_width.is_finite() || bin_width <= 0.0 {
            return Err(Error::invalid(format!(
                "bin width must be a positive finite number, got {bin_width}"
            )));
        }
        if let Some(start) = first_bin_start
            && !start.is_finite()
        {
            return Err(Error::invalid(format!(
                "first bin start must be a finite number, got {start}"
            )));
        }
        Ok(Self {
            bin_width,
            first_bin_start,
            require_bins: false,
        })
    }

    /// When set, producing no bins at all is reported as [`Error::EmptyInput`]
    /// instead of an empty result.
    pub fn require_bins(mut self, require: bool) -> Self {
        self.require_bins = require;
        self
    }

    pub fn bin_width(&self) -> f64 {
        self.bin_width
    }

    pub fn first_bin_start(&self) -> Option<f64> {
        self.first_bin_start
    }

    /// Sort `samples` and reduce them to one weighted mean per non-empty bin.
    /// Centres of the returned records are strictly increasing.
    pub fn bin(&self, mut samples: Vec<Sample>) -> Result<Vec<BinnedResult>> {
        if samples.is_empty() {
            return self.empty_result();
        }
        if let Some(bad) = samples.iter().find(|s| !s.x.is_finite()) {
            return Err(Error::invalid(format!(
                "sample x must be finite, got {}",
                bad.x
            )));
        }
        if let Some(bad) = samples.iter().find(|s| !s.y.is_finite()) {
            return Err(Error::invalid(format!(
                "sample y must be finite, got {} at x = {}",
                bad.y, bad.x
            )));
        }

        // sort_by is stable, ties keep arrival order
        samples.sort_by(|a, b| a.x.total_cmp(&b.x));

        let half = self.bin_width / 2.0;
        let t0 = self.first_bin_start.unwrap_or(samples[0].x);
        let last_centre = samples[samples.len() - 1].x + half;

        let mut results = Vec::new();
        let mut cursor = 0;
        let mut index = 0u64;
        let mut skipped = 0u64;

        while cursor < samples.len() {
            let centre = self.centre(t0, index);
            if centre > last_centre {
                break;
            }
            let upper = centre + half;
            let taken = samples[cursor..]
                .iter()
                .take_while(|s| s.x < upper)
                .count();
            if taken == 0 {
                // jump to one bin short of the next sample's bin, the edge
                // comparison above settles the rest
                let estimate = ((samples[cursor].x - t0) / self.bin_width).floor() - 1.0;
                let next = if estimate > (index + 1) as f64 {
                    estimate as u64
                } else {
                    index + 1
                };
                skipped += next - index;
                index = next;
                continue;
            }
            results.push(weighted_mean(centre, &samples[cursor..cursor + taken])?);
            cursor += taken;
            index += 1;
        }

        if cursor < samples.len() {
            debug!(
                "{} samples lie beyond the last bin starting at {}",
                samples.len() - cursor,
                t0
            );
        }
        debug!(
            "binned {} samples into {} bins ({} empty bins skipped, width {})",
            cursor,
            results.len(),
            skipped,
            self.bin_width
        );

        if results.is_empty() {
            return self.empty_result();
        }
        Ok(results)
    }

    /// Centre of bin `index`, computed rather than accumulated so rounding
    /// does not drift across long runs.
    fn centre(&self, t0: f64, index: u64) -> f64 {
        t0 + self.bin_width / 2.0 + index as f64 * self.bin_width
    }

    fn empty_result(&self) -> Result<Vec<BinnedResult>> {
        if self.require_bins {
            Err(Error::EmptyInput)
        } else {
            Ok(Vec::new())
        }
    }
}

/// Convenience wrapper around [`Binner`].
pub fn bin(
    samples: Vec<Sample>,
    bin_width: f64,
    first_bin_start: Option<f64>,
) -> Result<Vec<BinnedResult>> {
    Binner::new(bin_width, first_bin_start)?.bin(samples)
}

fn weighted_mean(t: f64, members: &[Sample]) -> Result<BinnedResult> {
    let mut sum_w = 0.0;
    let mut sum_yw = 0.0;
    for s in members {
        if s.y_error == 0.0 || !s.y_error.is_finite() {
            return Err(Error::DegenerateWeight {
                x: s.x,
                y_error: s.y_error,
            });
        }
        let w = s.y_error.powi(-2);
        sum_w += w;
        sum_yw += s.y * w;
    }
    Ok(BinnedResult {
        t,
        y: sum_yw / sum_w,
        y_err: sum_w.powf(-0.5),
        samples: members.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn samples(raw: &[(f64, f64, f64)]) -> Vec<Sample> {
        raw.iter().map(|&(x, y, e)| Sample::new(x, y, e)).collect()
    }

    #[test]
    fn test_two_bins_weighted() {
        let data = samples(&[(0.0, 10.0, 1.0), (1.0, 12.0, 1.0), (2.4, 9.0, 2.0)]);
        let out = bin(data, 2.0, Some(0.0)).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].t, 1.0);
        assert_relative_eq!(out[0].y, 11.0);
        assert_relative_eq!(out[0].y_err, 0.5f64.sqrt());
        assert_eq!(out[0].samples, 2);
        assert_eq!(out[1].t, 3.0);
        assert_relative_eq!(out[1].y, 9.0);
        assert_relative_eq!(out[1].y_err, 2.0);
        assert_eq!(out[1].samples, 1);
    }

    #[test]
    fn test_unsorted_input() {
        let data = samples(&[(2.4, 9.0, 2.0), (1.0, 12.0, 1.0), (0.0, 10.0, 1.0)]);
        let out = bin(data, 2.0, Some(0.0)).unwrap();
        assert_eq!(out.iter().map(|b| b.t).collect::<Vec<_>>(), vec![1.0, 3.0]);
        assert_relative_eq!(out[0].y, 11.0);
    }

    #[test]
    fn test_upper_edge_goes_to_next_bin() {
        let data = samples(&[(0.0, 1.0, 1.0), (2.0, 5.0, 1.0)]);
        let out = bin(data, 2.0, Some(0.0)).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].t, 1.0);
        assert_eq!(out[0].samples, 1);
        assert_eq!(out[0].y, 1.0);
        assert_eq!(out[1].t, 3.0);
        assert_eq!(out[1].y, 5.0);
    }

    #[test]
    fn test_default_start_is_min_x() {
        let data = samples(&[(5.0, 1.0, 1.0), (5.5, 3.0, 1.0), (6.2, 4.0, 1.0)]);
        let out = bin(data, 1.0, None).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].t, 5.5);
        assert_relative_eq!(out[0].y, 2.0);
        assert_eq!(out[1].t, 6.5);
    }

    #[test]
    fn test_max_sample_on_lower_edge_is_covered() {
        // 4.0 is exactly the lower edge of the bin centred on 5
        let data = samples(&[(0.0, 1.0, 1.0), (4.0, 2.0, 1.0)]);
        let out = bin(data, 2.0, None).unwrap();
        assert_eq!(out.last().map(|b| b.t), Some(5.0));
        assert_eq!(out.iter().map(|b| b.samples).sum::<usize>(), 2);
    }

    #[test]
    fn test_empty_bins_are_skipped() {
        let data = samples(&[(0.1, 1.0, 1.0), (7.3, 2.0, 1.0), (7.9, 4.0, 1.0)]);
        let out = bin(data, 1.0, Some(0.0)).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].t, 0.5);
        assert_eq!(out[1].t, 7.5);
        assert_relative_eq!(out[1].y, 3.0);
    }

    #[test]
    fn test_centres_step_by_width() {
        let data: Vec<Sample> = (0..200)
            .map(|i| Sample::new(i as f64 * 0.37, (i % 7) as f64, 0.5 + (i % 3) as f64))
            .collect();
        let width = 1.5;
        let out = bin(data, width, Some(-0.25)).unwrap();

        for pair in out.windows(2) {
            assert!(pair[1].t > pair[0].t);
            let steps = (pair[1].t - pair[0].t) / width;
            assert_relative_eq!(steps, steps.round(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_every_sample_counted_once() {
        let data: Vec<Sample> = (0..97)
            .map(|i| Sample::new(((i * 31) % 97) as f64 / 3.0, i as f64, 1.0))
            .collect();
        let out = bin(data, 0.7, None).unwrap();
        assert_eq!(out.iter().map(|b| b.samples).sum::<usize>(), 97);
    }

    #[test]
    fn test_equal_errors_give_arithmetic_mean() {
        let data = samples(&[(0.1, 3.0, 0.4), (0.2, 8.0, 0.4), (0.3, -2.0, 0.4), (0.4, 7.0, 0.4)]);
        let out = bin(data, 1.0, Some(0.0)).unwrap();
        assert_eq!(out.len(), 1);
        assert_relative_eq!(out[0].y, 4.0, epsilon = 1e-12);
        assert_relative_eq!(out[0].y_err, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_heavier_weight_dominates() {
        let data = samples(&[(0.0, 0.0, 1.0), (0.5, 10.0, 0.5)]);
        let out = bin(data, 1.0, Some(0.0)).unwrap();
        // weights 1 and 4
        assert_relative_eq!(out[0].y, 8.0);
        assert_relative_eq!(out[0].y_err, 0.2f64.sqrt());
    }

    #[test]
    fn test_samples_before_start_join_first_bin() {
        let data = samples(&[(-3.0, 2.0, 1.0), (0.5, 4.0, 1.0)]);
        let out = bin(data, 1.0, Some(0.0)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].t, 0.5);
        assert_eq!(out[0].samples, 2);
    }

    #[test]
    fn test_start_after_data_gives_no_bins() {
        let data = samples(&[(0.0, 1.0, 1.0)]);
        assert!(bin(data.clone(), 1.0, Some(10.0)).unwrap().is_empty());
        let strict = Binner::new(1.0, Some(10.0)).unwrap().require_bins(true);
        assert!(matches!(strict.bin(data), Err(Error::EmptyInput)));
    }

    #[test]
    fn test_empty_input() {
        assert!(bin(Vec::new(), 1.0, None).unwrap().is_empty());
        let strict = Binner::new(1.0, None).unwrap().require_bins(true);
        assert!(matches!(strict.bin(Vec::new()), Err(Error::EmptyInput)));
    }

    #[test]
    fn test_invalid_geometry() {
        for width in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                Binner::new(width, None),
                Err(Error::InvalidArgument(_))
            ));
        }
        assert!(matches!(
            Binner::new(1.0, Some(f64::NAN)),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            Binner::new(1.0, Some(f64::NEG_INFINITY)),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_non_finite_x_rejected() {
        let data = samples(&[(0.0, 1.0, 1.0), (f64::NAN, 1.0, 1.0)]);
        assert!(matches!(bin(data, 1.0, None), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_zero_error_is_degenerate() {
        let data = samples(&[(0.0, 1.0, 1.0), (0.5, 2.0, 0.0)]);
        match bin(data, 1.0, Some(0.0)) {
            Err(Error::DegenerateWeight { x, y_error }) => {
                assert_eq!(x, 0.5);
                assert_eq!(y_error, 0.0);
            }
            other => panic!("expected DegenerateWeight, got {other:?}"),
        }
    }

    #[test]
    fn test_non_finite_y_rejected() {
        for y in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let data = samples(&[(0.0, y, 1.0), (0.5, 2.0, 1.0)]);
            assert!(matches!(
                bin(data, 1.0, Some(0.0)),
                Err(Error::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_non_finite_error_is_degenerate() {
        for e in [f64::INFINITY, f64::NAN] {
            let data = samples(&[(0.0, 1.0, 1.0), (0.5, 2.0, e)]);
            assert!(matches!(
                bin(data, 1.0, Some(0.0)),
                Err(Error::DegenerateWeight { x, .. }) if x == 0.5
            ));
        }
    }

    #[test]
    fn test_wide_span_with_narrow_bins() {
        // a billion bins between the two samples
        let data = samples(&[(0.0, 1.0, 1.0), (1e6 + 2e-4, 3.0, 1.0)]);
        let out = bin(data, 1e-3, None).unwrap();
        assert_eq!(out.len(), 2);
        assert_relative_eq!(out[0].t, 5e-4);
        assert_abs_diff_eq!(out[1].t, 1e6 + 5e-4, epsilon = 1e-6);
        assert_eq!(out[1].y, 3.0);
    }

    #[test]
    fn test_start_far_below_data() {
        let data = samples(&[(1e9, 2.0, 1.0), (1e9 + 0.4, 4.0, 1.0), (1e9 + 3.0, 5.0, 1.0)]);
        let out = bin(data, 1.0, Some(0.0)).unwrap();
        assert_eq!(out.len(), 2);
        assert_relative_eq!(out[0].t, 1e9 + 0.5);
        assert_relative_eq!(out[0].y, 3.0);
        assert_relative_eq!(out[1].t, 1e9 + 3.5);
    }

    #[test]
    fn test_skipping_keeps_edge_rule() {
        // 2.0 and 6.0 sit exactly on upper edges of the bins before them
        let data = samples(&[(0.0, 1.0, 1.0), (2.0, 2.0, 1.0), (6.0, 3.0, 1.0)]);
        let out = bin(data, 1.0, Some(0.0)).unwrap();
        let centres: Vec<f64> = out.iter().map(|b| b.t).collect();
        assert_eq!(centres, vec![0.5, 2.5, 6.5]);
    }

    #[test]
    fn test_negative_error_uses_magnitude() {
        let data = samples(&[(0.0, 1.0, -1.0), (0.5, 3.0, 1.0)]);
        let out = bin(data, 1.0, Some(0.0)).unwrap();
        assert_relative_eq!(out[0].y, 2.0);
    }
}
