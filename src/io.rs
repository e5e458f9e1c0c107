//! Reading three-column sample files and writing binned results.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use flate2::bufread::GzDecoder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use strum_macros::{Display, EnumIter, EnumString};
use tracing::{debug, info};
use zip::ZipArchive;
use zstd::stream::read::Decoder as ZstdDecoder;

use crate::binning::{BinnedResult, Sample};
use crate::error::{Error, Result};

/// Iterator over the samples of a whitespace-delimited text source.
///
/// Blank lines and lines starting with `#` are skipped; every other line must
/// hold exactly three numbers `x y y_error`.
pub struct Samples<R> {
    reader: R,
    line: usize,
}

impl<R: BufRead> Samples<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line: 0 }
    }
}

impl<R: BufRead> Iterator for Samples<R> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.reader.read_until(b'\n', &mut buf) {
                Ok(0) => return None, // EOF
                Ok(_) => {
                    self.line += 1;
                    let parsed = std::str::from_utf8(&buf)
                        .map_err(|e| Error::Parse {
                            line: self.line,
                            message: format!("line is not valid UTF-8: {e}"),
                        })
                        .and_then(|text| parse_line(text, self.line));
                    match parsed {
                        Ok(Some(sample)) => return Some(Ok(sample)),
                        Ok(None) => continue,
                        Err(e) => return Some(Err(e)),
                    }
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

/// Parse one line of the sample format. Returns `None` for blank and
/// comment lines.
pub fn parse_line(line: &str, line_no: usize) -> Result<Option<Sample>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 3 {
        return Err(Error::Parse {
            line: line_no,
            message: format!("expected 3 columns, found {}", tokens.len()),
        });
    }

    let mut values = [0.0; 3];
    for (value, token) in values.iter_mut().zip(&tokens) {
        *value = token.parse::<f64>().map_err(|e| Error::Parse {
            line: line_no,
            message: format!("invalid number '{token}': {e}"),
        })?;
        if !value.is_finite() {
            return Err(Error::Parse {
                line: line_no,
                message: format!("non-finite value '{token}'"),
            });
        }
    }
    let [x, y, y_error] = values;
    Ok(Some(Sample::new(x, y, y_error)))
}

/// Read every sample from `reader`.
pub fn read_samples<R: BufRead>(reader: R) -> Result<Vec<Sample>> {
    Samples::new(reader).collect()
}

/// A sample file on disk, optionally gzip, zstd or zip compressed.
#[derive(Debug)]
pub struct SampleFile {
    file_path: PathBuf,
}

impl SampleFile {
    pub fn new(file_path: impl Into<PathBuf>) -> Result<Self> {
        let path = file_path.into();
        // Verify file exists
        File::open(&path)?;

        Ok(Self { file_path: path })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    fn create_reader(&self) -> Result<Box<dyn BufRead>> {
        let file = File::open(&self.file_path)?;
        let compression = Compression::from_path(&self.file_path);
        debug!("reading {} ({:?})", self.file_path.display(), compression);

        let reader: Box<dyn BufRead> = match compression {
            Compression::None => Box::new(BufReader::new(file)),
            Compression::Gzip => {
                let decoder = GzDecoder::new(BufReader::new(file));
                Box::new(BufReader::new(decoder))
            }
            Compression::Zstd => {
                let decoder = ZstdDecoder::new(file).map_err(invalid_data)?;
                Box::new(BufReader::new(decoder))
            }
            Compression::Zip => Box::new(Cursor::new(first_zip_entry(file)?)),
        };
        Ok(reader)
    }

    /// Stream the samples of the file.
    pub fn iter(&self) -> Result<Samples<Box<dyn BufRead>>> {
        Ok(Samples::new(self.create_reader()?))
    }

    /// Read the whole file.
    pub fn load(&self) -> Result<Vec<Sample>> {
        let samples = self.iter()?.collect::<Result<Vec<_>>>()?;
        info!(
            "loaded {} samples from {}",
            samples.len(),
            self.file_path.display()
        );
        Ok(samples)
    }
}

/// Compression of a sample file, guessed from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Gzip,
    Zstd,
    Zip,
}

impl Compression {
    fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "gz" | "gzip" => Self::Gzip,
            "zst" | "zstd" => Self::Zstd,
            "zip" => Self::Zip,
            _ => Self::None,
        }
    }
}

fn invalid_data<E>(e: E) -> std::io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    std::io::Error::new(std::io::ErrorKind::InvalidData, e)
}

/// Samples are read from the first entry of an archive only.
fn first_zip_entry(file: File) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(file).map_err(invalid_data)?;
    if archive.len() == 0 {
        return Err(invalid_data("ZIP archive is empty").into());
    }
    let mut entry = archive.by_index(0).map_err(invalid_data)?;
    let mut contents = Vec::new();
    std::io::copy(&mut entry, &mut contents)?;
    Ok(contents)
}

/// Destination for binned results.
pub trait BinSink {
    fn write_bins(&mut self, bins: &[BinnedResult]) -> Result<()>;
}

/// Writes one `T y y_err` line per bin.
pub struct TextSink<W: Write> {
    writer: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> BinSink for TextSink<W> {
    fn write_bins(&mut self, bins: &[BinnedResult]) -> Result<()> {
        for b in bins {
            writeln!(self.writer, "{} {} {}", b.t, b.y, b.y_err)?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes bins to a Parquet file with columns `t`, `y`, `y_err` and
/// `samples`, one row group per chunk.
pub struct ParquetSink {
    file_path: PathBuf,
    chunk_size: usize,
}

impl ParquetSink {
    pub fn new(file_path: impl Into<PathBuf>, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::invalid("chunk size must be at least 1"));
        }
        Ok(Self {
            file_path: file_path.into(),
            chunk_size,
        })
    }

    fn schema() -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("t", DataType::Float64, false),
            Field::new("y", DataType::Float64, false),
            Field::new("y_err", DataType::Float64, false),
            Field::new("samples", DataType::UInt64, false),
        ]))
    }
}

impl BinSink for ParquetSink {
    fn write_bins(&mut self, bins: &[BinnedResult]) -> Result<()> {
        let schema = Self::schema();
        let file = File::create(&self.file_path)?;
        let props = WriterProperties::builder().build();
        let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

        for chunk in bins.chunks(self.chunk_size) {
            let arrays: Vec<ArrayRef> = vec![
                Arc::new(Float64Array::from_iter_values(chunk.iter().map(|b| b.t))),
                Arc::new(Float64Array::from_iter_values(chunk.iter().map(|b| b.y))),
                Arc::new(Float64Array::from_iter_values(chunk.iter().map(|b| b.y_err))),
                Arc::new(UInt64Array::from_iter_values(
                    chunk.iter().map(|b| b.samples as u64),
                )),
            ];
            let batch = RecordBatch::try_new(schema.clone(), arrays)?;
            writer.write(&batch)?;
        }
        writer.close()?;
        info!(
            "wrote {} bins to {}",
            bins.len(),
            self.file_path.display()
        );
        Ok(())
    }
}

/// On-disk format for binned output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, EnumString, Display)]
#[strum(serialize_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Parquet,
}

/// Open a sink writing `format` to `path`.
pub fn create_sink(
    format: OutputFormat,
    path: impl Into<PathBuf>,
    chunk_size: usize,
) -> Result<Box<dyn BinSink>> {
    let path = path.into();
    match format {
        OutputFormat::Text => {
            let file = File::create(&path)?;
            Ok(Box::new(TextSink::new(BufWriter::new(file))))
        }
        OutputFormat::Parquet => Ok(Box::new(ParquetSink::new(path, chunk_size)?)),
    }
}

/// Write `bins` to `path` in the text format.
pub fn save_text(path: impl AsRef<Path>, bins: &[BinnedResult]) -> Result<()> {
    let file = File::create(path)?;
    TextSink::new(BufWriter::new(file)).write_bins(bins)
}
