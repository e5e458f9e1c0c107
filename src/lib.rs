//! Preparing scientific time series for plotting: fixed-width
//! inverse-variance binning of `(x, y, y_error)` samples, marker size
//! rescaling, fit-range sampling and discrete colour palettes.

pub mod binning;
pub mod error;
pub mod io;
pub mod palette;
pub mod scale;

pub use binning::{BinnedResult, Binner, Sample, bin};
pub use error::{Error, Result};
pub use io::{BinSink, OutputFormat, ParquetSink, SampleFile, TextSink, read_samples};
pub use palette::{Colormap, ColormapName, Rgba};
pub use scale::{FitRangeOptions, ResizeOptions, resize, sample_fit_range};
