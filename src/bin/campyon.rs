//! Command-line front end for viewing and manipulating columned data files.

use campyon::output::{write_histograms, write_stats};
use campyon::{
    Config, DisplayMode, OutputTarget, PlotData, PlotStyle, PrettyViewer, RowPipeline, RowWriter,
    execute, logging,
};
use clap::{ArgAction, Parser};
use std::fs::File;
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::PathBuf;
use std::process;

/// View, filter and summarize columned data files (CSV, TSV and the like).
///
/// Column specification: a comma separated list of column numbers or, with
/// -1, column names. Numbers start at 1; negative numbers count from the
/// end, so -1 is the last column. Ranges use a colon: 3:6 equals 3,4,5,6
/// and 3:-1 selects the third up to the last column.
#[derive(Parser)]
#[command(name = "campyon")]
struct Cli {
    /// Input files
    files: Vec<PathBuf>,

    /// Single input file
    #[arg(short = 'f', value_name = "FILE")]
    file: Option<PathBuf>,

    /// Columns to keep; all others are deleted
    #[arg(short = 'k', value_name = "COLUMNS")]
    keep: Option<String>,

    /// Columns to delete; all others are kept
    #[arg(short = 'd', value_name = "COLUMNS")]
    delete: Option<String>,

    /// Encoding of the input files
    #[arg(short = 'e', value_name = "ENCODING", default_value = "utf-8")]
    encoding: String,

    /// Field delimiter (guessed from the first line by default)
    #[arg(short = 'D', value_name = "DELIMITER")]
    delimiter: Option<String>,

    /// Use tab as delimiter
    #[arg(short = 'T', conflicts_with = "delimiter")]
    tab: bool,

    /// Write output to a file instead of stdout (aggregates all inputs)
    #[arg(short = 'o', value_name = "FILE", conflicts_with_all = ["in_place", "copysuffix"])]
    output: Option<PathBuf>,

    /// Overwrite each input file with its output
    #[arg(short = 'i', conflicts_with = "copysuffix")]
    in_place: bool,

    /// Write <input>.<SUFFIX> next to each input file
    #[arg(long, value_name = "SUFFIX")]
    copysuffix: Option<String>,

    /// Select rows, e.g. "c(1) > 3 and r('^x', 'NAME')" or "#1 > 3"
    #[arg(short = 's', value_name = "EXPRESSION")]
    select: Option<String>,

    /// Compute column sums and averages
    #[arg(short = 'S')]
    stats: bool,

    /// Compute histograms on the specified columns
    #[arg(short = 'H', value_name = "COLUMNS")]
    histogram: Option<String>,

    /// Logarithm base for histogram entropy (0 for natural log)
    #[arg(long, value_name = "BASE", default_value_t = 2.0)]
    entropy_base: f64,

    /// Ignore comment lines starting with this marker
    #[arg(short = 'C', value_name = "MARKER")]
    comment: Option<String>,

    /// Number lines
    #[arg(short = 'n')]
    number_lines: bool,

    /// Number fields
    #[arg(short = 'N')]
    number_fields: bool,

    /// Highlight columns
    #[arg(short = 'M', value_name = "COLUMNS")]
    highlight: Option<String>,

    /// First line is a header with column names
    #[arg(short = '1')]
    header: bool,

    /// Sort by columns, ascending
    #[arg(short = 'A', value_name = "COLUMNS", conflicts_with = "sort_desc")]
    sort_asc: Option<String>,

    /// Sort by columns, descending
    #[arg(short = 'Z', value_name = "COLUMNS")]
    sort_desc: Option<String>,

    /// Plot as a function of this column (use with -y)
    #[arg(short = 'x', value_name = "COLUMN", requires = "y")]
    x: Option<String>,

    /// Plot these columns (use with -x)
    #[arg(short = 'y', value_name = "COLUMNS", requires = "x")]
    y: Option<String>,

    /// Pretty view: align columns with spaces
    #[arg(short = 'v', conflicts_with = "interactive")]
    pretty: bool,

    /// Hand the result to the interactive viewer
    #[arg(long)]
    interactive: bool,

    /// Insert an extra empty line after each line
    #[arg(long)]
    nl: bool,

    /// Draw a grid on plots
    #[arg(long)]
    plotgrid: bool,

    /// Logarithmic x scale
    #[arg(long)]
    plotxlog: bool,

    /// Logarithmic y scale
    #[arg(long)]
    plotylog: bool,

    /// Comma separated per-series plot formats, e.g. "r.-,g.-"
    #[arg(long, value_name = "FORMATS", conflicts_with_all = ["lineplot", "scatterplot"])]
    plotconf: Option<String>,

    /// Write plot data to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    plotfile: Option<PathBuf>,

    /// Plot title
    #[arg(long, value_name = "TITLE")]
    plottitle: Option<String>,

    /// Line plot defaults
    #[arg(long, conflicts_with = "scatterplot")]
    lineplot: bool,

    /// Scatter plot defaults
    #[arg(long)]
    scatterplot: bool,

    /// More diagnostics on stderr (-V info, -VV debug)
    #[arg(short = 'V', long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn into_config(self) -> Config {
        let mut inputs = self.files;
        if let Some(file) = self.file {
            inputs.insert(0, file);
        }

        let output = if self.in_place {
            OutputTarget::InPlace
        } else if let Some(suffix) = self.copysuffix {
            OutputTarget::CopySuffix(suffix)
        } else if let Some(path) = self.output {
            OutputTarget::File(path)
        } else {
            OutputTarget::Stdout
        };

        let display = if self.interactive {
            DisplayMode::Interactive
        } else if self.pretty {
            DisplayMode::Pretty
        } else {
            DisplayMode::Raw
        };

        let mut plot = PlotStyle {
            grid: self.plotgrid,
            x_log: self.plotxlog,
            y_log: self.plotylog,
            title: self.plottitle,
            file: self.plotfile,
            ..PlotStyle::default()
        };
        if let Some(formats) = &self.plotconf {
            plot.formats = formats.split(',').map(str::to_string).collect();
        } else if self.lineplot {
            plot.formats = PlotStyle::line_preset();
        } else if self.scatterplot {
            plot.formats = PlotStyle::scatter_preset();
        }

        let sort_descending = self.sort_desc.is_some();
        Config {
            inputs,
            encoding: self.encoding,
            delimiter: if self.tab {
                Some("\t".to_string())
            } else {
                self.delimiter
            },
            comment: self.comment,
            header: self.header,
            keep: self.keep,
            delete: self.delete,
            highlight: self.highlight,
            histogram: self.histogram,
            sort: self.sort_desc.or(self.sort_asc),
            sort_descending,
            select: self.select,
            stats: self.stats,
            number_lines: self.number_lines,
            number_fields: self.number_fields,
            extra_newline: self.nl,
            color: output == OutputTarget::Stdout && io::stdout().is_terminal(),
            output,
            plot_x: self.x,
            plot_y: self.y,
            plot,
            display,
            entropy_base: self.entropy_base,
        }
    }
}

/// Statistics, histograms and plot data, all kept off stdout.
fn report(config: &Config, pipeline: &RowPipeline) -> io::Result<()> {
    let mut err = io::stderr().lock();
    if config.stats {
        write_stats(&mut err, &pipeline.stats().summary(pipeline.header()))?;
    }
    if config.histogram.is_some() {
        write_histograms(&mut err, pipeline.stats(), pipeline.header(), config.entropy_base)?;
    }

    if config.plotting() {
        let plot = PlotData::new(pipeline.plot(), pipeline.header(), &config.plot);
        match &config.plot.file {
            Some(path) => {
                let mut out = BufWriter::new(File::create(path)?);
                plot.write_table(&mut out)?;
                out.flush()?;
            }
            None => plot.write_table(&mut err)?,
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = cli.into_config();
    if config.inputs.is_empty() {
        eprintln!("Error: no input files given (see --help)");
        process::exit(2);
    }

    let mut viewer = PrettyViewer::new(RowWriter::new(
        io::stdout(),
        config.number_lines,
        config.extra_newline,
        config.color,
    ));

    match execute(&config, &mut viewer) {
        Ok(pipeline) => {
            if let Err(e) = report(&config, &pipeline) {
                eprintln!("Error writing report: {e}");
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(e.exit_code());
        }
    }
}
