//! Rescaling and range sampling for plot inputs.

use itertools::{Itertools, MinMaxResult};

use crate::error::{Error, Result};

/// Options for [`resize`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeOptions {
    pub out_min: f64,
    pub out_max: f64,
    /// Scale `log10(v)` instead of `v`.
    pub log: bool,
    /// Reference range replacing the min/max of the input. Must hold exactly
    /// two values; their order does not matter.
    pub source_range: Option<Vec<f64>>,
}

impl Default for ResizeOptions {
    fn default() -> Self {
        Self {
            out_min: 10.0,
            out_max: 100.0,
            log: false,
            source_range: None,
        }
    }
}

/// Options for [`sample_fit_range`].
#[derive(Debug, Clone, PartialEq)]
pub struct FitRangeOptions {
    /// Sample `log10(v)`. The returned points stay in log space.
    pub log: bool,
    /// Fraction of the data span added on both sides.
    pub pad_fraction: f64,
    pub count: usize,
}

impl Default for FitRangeOptions {
    fn default() -> Self {
        Self {
            log: false,
            pad_fraction: 0.05,
            count: 1000,
        }
    }
}

/// Map `values` linearly (or logarithmically) onto `[out_min, out_max]`,
/// typically to turn a data column into scatter marker sizes.
pub fn resize(values: &[f64], options: &ResizeOptions) -> Result<Vec<f64>> {
    ensure_finite(values, "values")?;

    let (r1, r2) = match &options.source_range {
        Some(range) => {
            let [a, b] = range.as_slice() else {
                return Err(Error::invalid("source_range must be a pair of values"));
            };
            ensure_finite(range, "source_range")?;
            (a.min(*b), a.max(*b))
        }
        None => min_max(values.iter().copied())?,
    };

    let transform = axis_transform(options.log);
    if options.log {
        ensure_positive(values, "values")?;
        ensure_positive(&[r1, r2], "source_range")?;
    }

    let (lo, hi) = (transform(r1), transform(r2));
    if lo == hi {
        return Err(Error::DegenerateRange { min: r1, max: r2 });
    }
    let scale = (options.out_max - options.out_min) / (hi - lo);

    Ok(values
        .iter()
        .map(|&v| options.out_min + (transform(v) - lo) * scale)
        .collect())
}

/// Evenly spaced points covering the span of `values` padded by
/// `pad_fraction` on each side, for evaluating a fitted model.
pub fn sample_fit_range(values: &[f64], options: &FitRangeOptions) -> Result<Vec<f64>> {
    ensure_finite(values, "values")?;
    if !options.pad_fraction.is_finite() {
        return Err(Error::invalid(format!(
            "pad fraction must be finite, got {}",
            options.pad_fraction
        )));
    }
    if options.log {
        ensure_positive(values, "values")?;
    }

    let transform = axis_transform(options.log);
    let (x1, x2) = min_max(values.iter().map(|&v| transform(v)))?;
    let pad = options.pad_fraction * (x2 - x1);
    Ok(linspace(x1 - pad, x2 + pad, options.count))
}

/// `count` evenly spaced points from `start` to `stop`, both included.
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            (0..count)
                .map(|i| {
                    if i == count - 1 {
                        stop
                    } else {
                        start + i as f64 * step
                    }
                })
                .collect()
        }
    }
}

fn axis_transform(log: bool) -> fn(f64) -> f64 {
    fn identity(v: f64) -> f64 {
        v
    }
    if log { f64::log10 } else { identity }
}

fn min_max(values: impl Iterator<Item = f64>) -> Result<(f64, f64)> {
    match values.minmax() {
        MinMaxResult::NoElements => Err(Error::EmptyInput),
        MinMaxResult::OneElement(v) => Ok((v, v)),
        MinMaxResult::MinMax(lo, hi) => Ok((lo, hi)),
    }
}

fn ensure_finite(values: &[f64], what: &str) -> Result<()> {
    match values.iter().find(|v| !v.is_finite()) {
        Some(v) => Err(Error::invalid(format!("{what} must be finite, got {v}"))),
        None => Ok(()),
    }
}

fn ensure_positive(values: &[f64], what: &str) -> Result<()> {
    match values.iter().find(|&&v| v <= 0.0) {
        Some(v) => Err(Error::invalid(format!(
            "{what} must be positive on a log scale, got {v}"
        ))),
        None => Ok(()),
    }
}
