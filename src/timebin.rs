use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use itertools::Itertools;
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

use timebin::io::create_sink;
use timebin::palette;
use timebin::{BinSink, Binner, FitRangeOptions, OutputFormat, ResizeOptions, SampleFile};

fn values_arg() -> Arg {
    Arg::new("values")
        .value_name("VALUE")
        .help("Input values")
        .num_args(1..)
        .required(true)
        .allow_negative_numbers(true)
        .value_parser(clap::value_parser!(f64))
}

fn log_arg() -> Arg {
    Arg::new("log")
        .long("log")
        .help("Work on log10 of the values")
        .action(ArgAction::SetTrue)
}

fn cli() -> Command {
    Command::new("timebin")
        .version("0.1.0")
        .about("Bins, rescales and colours scientific time series for plotting")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("bin")
                .about("Bins a three-column (x y y_error) file with inverse-variance weights")
                .arg(
                    Arg::new("input")
                        .short('i')
                        .long("input")
                        .value_name("INPUT_FILE")
                        .help("Input sample file (.gz, .zst and .zip are decompressed)")
                        .required(true),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("OUTPUT_FILE")
                        .help("Output file for the binned data")
                        .required(true),
                )
                .arg(
                    Arg::new("width")
                        .short('w')
                        .long("width")
                        .value_name("DT")
                        .help("Bin width")
                        .value_parser(clap::value_parser!(f64))
                        .required(true),
                )
                .arg(
                    Arg::new("start")
                        .long("start")
                        .value_name("T0")
                        .help("Left edge of the first bin (default: smallest x)")
                        .allow_negative_numbers(true)
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    Arg::new("require_bins")
                        .long("require-bins")
                        .help("Fail when no bin receives any sample")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .value_name("FORMAT")
                        .help("Output format")
                        .value_parser(["text", "parquet"])
                        .default_value("text"),
                )
                .arg(
                    Arg::new("chunk_size")
                        .long("chunk-size")
                        .value_name("SIZE")
                        .help("Rows per Parquet row group (default: 1000)")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("1000"),
                ),
        )
        .subcommand(
            Command::new("resize")
                .about("Rescales values onto a marker size range")
                .arg(values_arg())
                .arg(
                    Arg::new("min")
                        .long("min")
                        .help("Smallest output value")
                        .allow_negative_numbers(true)
                        .value_parser(clap::value_parser!(f64))
                        .default_value("10"),
                )
                .arg(
                    Arg::new("max")
                        .long("max")
                        .help("Largest output value")
                        .allow_negative_numbers(true)
                        .value_parser(clap::value_parser!(f64))
                        .default_value("100"),
                )
                .arg(log_arg())
                .arg(
                    Arg::new("range")
                        .long("range")
                        .value_name("BOUND")
                        .help("Source range replacing the min/max of the values")
                        .num_args(1..)
                        .allow_negative_numbers(true)
                        .value_parser(clap::value_parser!(f64)),
                ),
        )
        .subcommand(
            Command::new("xfit")
                .about("Samples the padded span of the values evenly")
                .arg(values_arg())
                .arg(log_arg())
                .arg(
                    Arg::new("pad")
                        .long("pad")
                        .help("Fraction of the span added on each side")
                        .value_parser(clap::value_parser!(f64))
                        .default_value("0.05"),
                )
                .arg(
                    Arg::new("count")
                        .long("count")
                        .help("Number of points")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("1000"),
                ),
        )
        .subcommand(
            Command::new("palette")
                .about("Prints COUNT RGBA colours sampled from a colour map")
                .arg(
                    Arg::new("count")
                        .value_name("COUNT")
                        .required(true)
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("colormap")
                        .long("colormap")
                        .value_name("NAME")
                        .default_value("gist_rainbow"),
                ),
        )
}

fn values(matches: &ArgMatches) -> Vec<f64> {
    matches
        .get_many::<f64>("values")
        .map(|v| v.copied().collect())
        .unwrap_or_default()
}

fn run_bin(matches: &ArgMatches) -> Result<usize> {
    let input_path = matches.get_one::<String>("input").context("missing input")?;
    let output_path = matches.get_one::<String>("output").context("missing output")?;
    let width = *matches.get_one::<f64>("width").context("missing width")?;
    let start = matches.get_one::<f64>("start").copied();
    let chunk_size = *matches.get_one::<usize>("chunk_size").context("missing chunk size")?;
    let format: OutputFormat = matches
        .get_one::<String>("format")
        .context("missing format")?
        .parse()?;

    if !Path::new(input_path).exists() {
        anyhow::bail!("Input file does not exist: {}", input_path);
    }

    let binner = Binner::new(width, start)?.require_bins(matches.get_flag("require_bins"));
    let samples = SampleFile::new(input_path)
        .and_then(|file| file.load())
        .with_context(|| format!("Failed to read sample file: {}", input_path))?;

    let bins = binner
        .bin(samples)
        .with_context(|| format!("Failed to bin {}", input_path))?;

    let mut sink = create_sink(format, output_path, chunk_size)?;
    sink.write_bins(&bins)
        .with_context(|| format!("Failed to write {}", output_path))?;

    info!("wrote {} bins to {} ({})", bins.len(), output_path, format);
    Ok(bins.len())
}

fn run_resize(matches: &ArgMatches) -> Result<Vec<f64>> {
    let options = ResizeOptions {
        out_min: *matches.get_one::<f64>("min").context("missing min")?,
        out_max: *matches.get_one::<f64>("max").context("missing max")?,
        log: matches.get_flag("log"),
        source_range: matches
            .get_many::<f64>("range")
            .map(|v| v.copied().collect()),
    };
    Ok(timebin::resize(&values(matches), &options)?)
}

fn run_xfit(matches: &ArgMatches) -> Result<Vec<f64>> {
    let options = FitRangeOptions {
        log: matches.get_flag("log"),
        pad_fraction: *matches.get_one::<f64>("pad").context("missing pad")?,
        count: *matches.get_one::<usize>("count").context("missing count")?,
    };
    Ok(timebin::sample_fit_range(&values(matches), &options)?)
}

fn run_palette(matches: &ArgMatches) -> Result<Vec<String>> {
    let count = *matches.get_one::<usize>("count").context("missing count")?;
    let name = matches.get_one::<String>("colormap").context("missing colormap")?;
    let colours = palette::generate(count, name)?;
    Ok(colours
        .iter()
        .map(|c| [c.r, c.g, c.b, c.a].iter().map(|v| format!("{v:.6}")).join(" "))
        .collect())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("bin", m)) => {
            run_bin(m)?;
        }
        Some(("resize", m)) => run_resize(m)?.iter().for_each(|v| println!("{v}")),
        Some(("xfit", m)) => run_xfit(m)?.iter().for_each(|v| println!("{v}")),
        Some(("palette", m)) => run_palette(m)?.iter().for_each(|line| println!("{line}")),
        _ => anyhow::bail!("unknown subcommand"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn subcommand(args: &[&str]) -> ArgMatches {
        let matches = cli().try_get_matches_from(args).unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        sub.clone()
    }

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_bin_file() {
        let mut input = NamedTempFile::new().unwrap();
        writeln!(input, "0 10 1").unwrap();
        writeln!(input, "1 12 1").unwrap();
        writeln!(input, "2.4 9 2").unwrap();
        input.flush().unwrap();
        let output = NamedTempFile::new().unwrap();

        let m = subcommand(&[
            "timebin",
            "bin",
            "-i",
            input.path().to_str().unwrap(),
            "-o",
            output.path().to_str().unwrap(),
            "--width",
            "2",
            "--start",
            "0",
        ]);
        assert_eq!(run_bin(&m).unwrap(), 2);

        let written = std::fs::read_to_string(output.path()).unwrap();
        assert_eq!(written.lines().count(), 2);
        assert_eq!(written.lines().nth(1), Some("3 9 2"));
    }

    #[test]
    fn test_bin_missing_input() {
        let m = subcommand(&[
            "timebin", "bin", "-i", "/no/such/file.txt", "-o", "out.txt", "-w", "1",
        ]);
        assert!(run_bin(&m).is_err());
    }

    #[test]
    fn test_bin_rejects_zero_width() {
        let input = NamedTempFile::new().unwrap();
        let m = subcommand(&[
            "timebin",
            "bin",
            "-i",
            input.path().to_str().unwrap(),
            "-o",
            "unused.txt",
            "-w",
            "0",
        ]);
        let err = run_bin(&m).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<timebin::Error>(),
            Some(timebin::Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_resize_command() {
        let m = subcommand(&["timebin", "resize", "1", "2", "3", "--min", "0", "--max", "1"]);
        assert_eq!(run_resize(&m).unwrap(), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_resize_single_range_value() {
        let m = subcommand(&["timebin", "resize", "1", "2", "--range", "5"]);
        let err = run_resize(&m).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<timebin::Error>(),
            Some(timebin::Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_xfit_command() {
        let m = subcommand(&["timebin", "xfit", "0", "10", "--pad", "0.1", "--count", "5"]);
        let out = run_xfit(&m).unwrap();
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], -1.0);
        assert_eq!(out[4], 11.0);
    }

    #[test]
    fn test_palette_command() {
        let m = subcommand(&["timebin", "palette", "3", "--colormap", "greys"]);
        let lines = run_palette(&m).unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.split(' ').count() == 4));

        let m = subcommand(&["timebin", "palette", "1"]);
        assert!(run_palette(&m).is_err());
    }
}
