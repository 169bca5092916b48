//! Row-processing pipeline.
//!
//! [`RowPipeline`] drives raw text lines through delimiter detection,
//! field-count locking, selection, statistics and projection. Rows are
//! produced lazily by [`Rows`]: each call to `next` pulls input lines until
//! one yields output. When the configuration needs the whole dataset
//! (sorting, aligned or interactive display) projected rows go to the
//! [`BufferedMaterializer`] instead and nothing is yielded for them.
//!
//! ```
//! use campyon::{Config, OutputRow, RowPipeline};
//!
//! let config = Config {
//!     select: Some("c(2) > 1".to_string()),
//!     ..Config::default()
//! };
//! let mut pipeline = RowPipeline::new(&config).unwrap();
//! let input = ["a,1", "b,2", "c,3"];
//! let lines: Vec<String> = pipeline
//!     .process("input.csv", input)
//!     .map(|row| row.unwrap().render(",", false))
//!     .collect();
//!
//! assert_eq!(lines, vec!["b,2", "c,3"]);
//! assert_eq!(pipeline.rows_out(), 2);
//! ```

use tracing::{info, warn};

use crate::buffer::BufferedMaterializer;
use crate::columns::{ColumnSpec, Header, resolve_index};
use crate::config::Config;
use crate::error::{CampyonError, Result};
use crate::project::{ColumnProjector, PlotSeries, ProjectedField};
use crate::select::RowSelector;
use crate::stats::StatsAccumulator;

/// Delimiters tried in order when none is configured.
pub const DELIMITER_CANDIDATES: [&str; 5] = ["\t", ";", ":", ",", " "];

/// Guess the delimiter of a data line. A line containing none of the
/// candidates is a single-column line and gets a tab.
pub fn detect_delimiter(line: &str) -> &'static str {
    DELIMITER_CANDIDATES
        .iter()
        .find(|d| line.contains(*d))
        .copied()
        .unwrap_or("\t")
}

/// Split a line into fields. Line terminators and surrounding whitespace
/// are stripped first, except whitespace that is itself the delimiter.
pub fn split_line<'a>(line: &'a str, delimiter: &str) -> Vec<&'a str> {
    line.trim_end_matches(['\r', '\n'])
        .trim_matches(|c: char| c.is_whitespace() && !delimiter.contains(c))
        .split(delimiter)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    DelimiterDetected,
    FieldCountLocked,
    Streaming,
    Buffering,
    Drained,
}

/// Shape of the dataset being processed, fixed by its first data line.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub delimiter: String,
    pub field_count: usize,
    pub header: Option<Header>,
}

/// One line of pipeline output.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputRow {
    /// A blank or comment line, passed through untouched.
    Passthrough { text: String, row_number: usize },
    Header {
        fields: Vec<ProjectedField>,
        row_number: usize,
    },
    Data {
        fields: Vec<ProjectedField>,
        row_number: usize,
    },
}

impl OutputRow {
    pub fn row_number(&self) -> usize {
        match self {
            OutputRow::Passthrough { row_number, .. }
            | OutputRow::Header { row_number, .. }
            | OutputRow::Data { row_number, .. } => *row_number,
        }
    }

    /// Projected fields; empty for pass-through lines.
    pub fn fields(&self) -> &[ProjectedField] {
        match self {
            OutputRow::Passthrough { .. } => &[],
            OutputRow::Header { fields, .. } | OutputRow::Data { fields, .. } => fields,
        }
    }

    /// The display line, optionally with terminal styling.
    pub fn render(&self, delimiter: &str, styled: bool) -> String {
        match self {
            OutputRow::Passthrough { text, .. } => text.clone(),
            OutputRow::Header { fields, .. } | OutputRow::Data { fields, .. } => {
                crate::buffer::join_fields(fields, delimiter, styled)
            }
        }
    }
}

#[derive(Debug)]
pub struct RowPipeline {
    config: Config,
    state: PipelineState,
    buffering: bool,
    dataset: Option<Dataset>,
    selector: Option<RowSelector>,
    projector: ColumnProjector,
    stats: StatsAccumulator,
    plot: PlotSeries,
    buffer: BufferedMaterializer,
    header_pending: bool,
    file_line: usize,
    rows_in: usize,
    rows_out: usize,
}

impl RowPipeline {
    /// Build a pipeline for `config`. The select expression is parsed here
    /// so syntax errors surface before any input is read.
    pub fn new(config: &Config) -> Result<Self> {
        let selector = config
            .select
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(RowSelector::parse)
            .transpose()?;
        Ok(Self {
            config: config.clone(),
            state: PipelineState::Uninitialized,
            buffering: config.requires_buffering(),
            dataset: None,
            selector,
            projector: ColumnProjector::default(),
            stats: StatsAccumulator::new(config.stats, Vec::new()),
            plot: PlotSeries::default(),
            buffer: BufferedMaterializer::new(Vec::new(), config.sort_descending),
            header_pending: false,
            file_line: 0,
            rows_in: 0,
            rows_out: 0,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn header(&self) -> Option<&Header> {
        self.dataset.as_ref().and_then(|d| d.header.as_ref())
    }

    /// The active delimiter, once known.
    pub fn delimiter(&self) -> Option<&str> {
        self.dataset.as_ref().map(|d| d.delimiter.as_str())
    }

    pub fn projector(&self) -> &ColumnProjector {
        &self.projector
    }

    pub fn stats(&self) -> &StatsAccumulator {
        &self.stats
    }

    pub fn plot(&self) -> &PlotSeries {
        &self.plot
    }

    pub fn buffer(&self) -> &BufferedMaterializer {
        &self.buffer
    }

    /// Drop buffered rows after they have been written.
    pub fn clear_buffer(&mut self) {
        self.buffer.clear();
    }

    /// Input lines read since the last reset, blank and comment lines included.
    pub fn rows_in(&self) -> usize {
        self.rows_in
    }

    /// Output rows produced since the last reset.
    pub fn rows_out(&self) -> usize {
        self.rows_out
    }

    fn is_skippable(&self, line: &str) -> bool {
        line.trim().is_empty()
            || self
                .config
                .comment
                .as_deref()
                .is_some_and(|marker| line.starts_with(marker))
    }

    /// Initialize from the first data line of `text`, if there is one.
    /// Returns whether the dataset is initialized afterwards.
    pub fn initialize_from(&mut self, text: &str) -> Result<bool> {
        if self.dataset.is_none()
            && let Some(line) = text.lines().find(|l| !self.is_skippable(l))
        {
            self.initialize(line)?;
        }
        Ok(self.dataset.is_some())
    }

    /// Lock delimiter, field count and header from a dataset's first data
    /// line, then resolve every column specification against it.
    pub fn initialize(&mut self, line: &str) -> Result<()> {
        let delimiter = match &self.config.delimiter {
            Some(d) => d.clone(),
            None => {
                let guessed = detect_delimiter(line);
                info!(delimiter = ?guessed, "guessed delimiter");
                guessed.to_string()
            }
        };
        self.state = PipelineState::DelimiterDetected;

        let fields = split_line(line, &delimiter);
        let field_count = fields.len();
        let header = self.config.header.then(|| Header::from_fields(&fields));
        info!(fields = field_count, "locked field count");
        self.state = PipelineState::FieldCountLocked;

        self.bind(field_count, header.as_ref())?;
        self.dataset = Some(Dataset {
            delimiter,
            field_count,
            header,
        });
        self.state = if self.buffering {
            PipelineState::Buffering
        } else {
            PipelineState::Streaming
        };
        Ok(())
    }

    fn bind(&mut self, field_count: usize, header: Option<&Header>) -> Result<()> {
        let spec = |text: &Option<String>| ColumnSpec::resolve(text.as_deref(), field_count, header);
        let keep = spec(&self.config.keep)?;
        let delete = spec(&self.config.delete)?;
        let highlight = spec(&self.config.highlight)?;
        let histogram = spec(&self.config.histogram)?;
        let sort = spec(&self.config.sort)?;
        let plot_x = self
            .config
            .plot_x
            .as_deref()
            .map(|x| resolve_index(x, field_count, header))
            .transpose()?;
        let plot_y = spec(&self.config.plot_y)?;

        if !keep.is_empty() {
            info!(columns = ?keep.indices(), "keeping columns");
        }
        if !delete.is_empty() {
            info!(columns = ?delete.indices(), "deleting columns");
        }

        if let Some(selector) = self.selector.as_mut() {
            selector.bind(field_count, header)?;
        }
        self.projector = ColumnProjector::new(keep, delete, highlight, self.config.number_fields);
        for &column in sort.indices() {
            if !self.projector.keeps(column) {
                warn!(column, "sort column is not in the output and sorts as missing");
            }
        }
        self.stats.set_histogram_columns(histogram.indices().to_vec());
        self.plot.set_columns(plot_x, plot_y.indices().to_vec());
        self.buffer.set_sort_columns(sort.indices().to_vec());
        Ok(())
    }

    /// Forget the current dataset so the next data line initializes a new
    /// one. Row counters and buffered rows are dropped; statistics keep
    /// accumulating across datasets.
    pub fn reset(&mut self) {
        self.dataset = None;
        self.state = PipelineState::Uninitialized;
        self.buffer.clear();
        self.header_pending = false;
        self.file_line = 0;
        self.rows_in = 0;
        self.rows_out = 0;
    }

    /// Lazily process the lines of one input file.
    pub fn process<I>(&mut self, file: &str, lines: I) -> Rows<'_, I::IntoIter>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.header_pending = self.config.header;
        self.file_line = 0;
        if self.dataset.is_some() {
            self.state = if self.buffering {
                PipelineState::Buffering
            } else {
                PipelineState::Streaming
            };
        }
        Rows {
            pipeline: self,
            file: file.to_string(),
            lines: lines.into_iter(),
            done: false,
        }
    }

    /// Process a single input line.
    pub fn process_line(&mut self, file: &str, line: &str) -> Result<Option<OutputRow>> {
        self.rows_in += 1;
        self.file_line += 1;

        if self.is_skippable(line) {
            self.rows_out += 1;
            if self.buffering {
                return Ok(None);
            }
            return Ok(Some(OutputRow::Passthrough {
                text: line.trim_end_matches(['\r', '\n']).to_string(),
                row_number: self.rows_out,
            }));
        }

        if self.dataset.is_none() {
            self.initialize(line)?;
        }
        let Some(dataset) = self.dataset.as_ref() else {
            return Ok(None);
        };

        let fields = split_line(line, &dataset.delimiter);
        if fields.len() != dataset.field_count {
            return Err(CampyonError::FieldCountMismatch {
                file: file.to_string(),
                line: self.file_line,
                expected: dataset.field_count,
                found: fields.len(),
            });
        }

        if self.header_pending {
            self.header_pending = false;
            self.rows_out += 1;
            let names: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
            let projected = self.projector.project_header(&names);
            if self.buffering {
                if self.buffer.header().is_none() {
                    self.buffer.set_header(projected);
                }
                return Ok(None);
            }
            return Ok(Some(OutputRow::Header {
                fields: projected,
                row_number: self.rows_out,
            }));
        }

        if let Some(selector) = &self.selector
            && !selector.should_keep(&fields, self.file_line)?
        {
            return Ok(None);
        }
        self.rows_out += 1;

        if self.stats.is_active() {
            self.stats.observe(&fields);
        }
        if self.plot.is_active() {
            self.plot.record(&fields)?;
        }

        let projected = self.projector.project(&fields);
        if self.buffering {
            self.buffer.add(projected, self.rows_out);
            return Ok(None);
        }
        Ok(Some(OutputRow::Data {
            fields: projected,
            row_number: self.rows_out,
        }))
    }

    fn finish_file(&mut self, file: &str) {
        info!(file, "Read {} lines, outputted {}", self.rows_in, self.rows_out);
        self.state = PipelineState::Drained;
    }
}

/// Lazy output of [`RowPipeline::process`]. Stops after the first error.
pub struct Rows<'p, I> {
    pipeline: &'p mut RowPipeline,
    file: String,
    lines: I,
    done: bool,
}

impl<I> Iterator for Rows<'_, I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = Result<OutputRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let Some(line) = self.lines.next() else {
                self.done = true;
                self.pipeline.finish_file(&self.file);
                return None;
            };
            match self.pipeline.process_line(&self.file, line.as_ref()) {
                Ok(Some(row)) => return Some(Ok(row)),
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn pipeline(config: Config) -> RowPipeline {
        RowPipeline::new(&config).unwrap()
    }

    fn run(p: &mut RowPipeline, input: &[&str]) -> Result<Vec<OutputRow>> {
        p.process("test.tsv", input.iter().copied()).collect()
    }

    fn lines(rows: &[OutputRow], delimiter: &str) -> Vec<String> {
        rows.iter().map(|r| r.render(delimiter, false)).collect()
    }

    #[test]
    fn test_detect_delimiter_priority() {
        assert_eq!(detect_delimiter("a\tb\tc"), "\t");
        assert_eq!(detect_delimiter("a;b,c"), ";");
        assert_eq!(detect_delimiter("a:b,c"), ":");
        assert_eq!(detect_delimiter("a,b c"), ",");
        assert_eq!(detect_delimiter("a b"), " ");
        assert_eq!(detect_delimiter("abc"), "\t");
    }

    #[test]
    fn test_split_keeps_empty_tab_fields() {
        assert_eq!(split_line("a\t\tc\n", "\t"), vec!["a", "", "c"]);
        assert_eq!(split_line("  a,b  \r\n", ","), vec!["a", "b"]);
        assert_eq!(split_line("a\tb\t\n", "\t"), vec!["a", "b", ""]);
    }

    #[test]
    fn test_tab_inference_locks_three_fields() {
        let mut p = pipeline(Config::default());
        assert_eq!(p.state(), PipelineState::Uninitialized);
        let rows = run(&mut p, &["a\tb\tc"]).unwrap();
        let dataset = p.dataset().unwrap();
        assert_eq!(dataset.delimiter, "\t");
        assert_eq!(dataset.field_count, 3);
        assert_eq!(rows.len(), 1);
        assert_eq!(p.state(), PipelineState::Drained);
    }

    #[test]
    fn test_field_count_mismatch() {
        let mut p = pipeline(Config::default());
        match run(&mut p, &["a\tb\tc", "", "d\te"]) {
            Err(CampyonError::FieldCountMismatch {
                file,
                line,
                expected,
                found,
            }) => {
                assert_eq!(file, "test.tsv");
                assert_eq!(line, 3);
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("Expected FieldCountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_rows_stop_after_error() {
        let mut p = pipeline(Config::default());
        let mut rows = p.process("x", ["a,b", "c", "d,e"]);
        assert!(rows.next().unwrap().is_ok());
        assert!(rows.next().unwrap().is_err());
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_blank_and_comment_lines_pass_through() {
        let mut p = pipeline(Config {
            comment: Some("#".to_string()),
            select: Some("c(1) != 'drop'".to_string()),
            ..Config::default()
        });
        let rows = run(&mut p, &["# note", "a,1", "", "drop,2", "b,3"]).unwrap();
        assert_eq!(lines(&rows, ","), vec!["# note", "a,1", "", "b,3"]);
        let numbers: Vec<usize> = rows.iter().map(OutputRow::row_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(p.rows_in(), 5);
        assert_eq!(p.rows_out(), 4);
    }

    #[test]
    fn test_header_is_not_selected_or_counted() {
        let mut p = pipeline(Config {
            header: true,
            stats: true,
            select: Some("c('N') > 1".to_string()),
            ..Config::default()
        });
        let rows = run(&mut p, &["NAME;N", "a;1", "b;2"]).unwrap();
        assert!(matches!(rows[0], OutputRow::Header { row_number: 1, .. }));
        assert_eq!(lines(&rows, ";"), vec!["NAME;N", "b;2"]);
        assert_eq!(p.header().unwrap().name(2), Some("N"));
        assert_eq!(p.stats().rows(), 1);
        assert_eq!(p.stats().sum(2), Some(&Value::Int(2)));
    }

    #[test]
    fn test_named_columns_resolve_against_header() {
        let mut p = pipeline(Config {
            header: true,
            keep: Some("B".to_string()),
            ..Config::default()
        });
        let rows = run(&mut p, &["A,B,C", "1,2,3"]).unwrap();
        assert_eq!(lines(&rows, ","), vec!["B", "2"]);
    }

    #[test]
    fn test_out_of_range_spec_is_configuration_error() {
        let mut p = pipeline(Config {
            keep: Some("5".to_string()),
            ..Config::default()
        });
        let err = run(&mut p, &["a,b"]).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_buffered_mode_yields_nothing_until_replay() {
        let mut p = pipeline(Config {
            header: true,
            sort: Some("2".to_string()),
            sort_descending: true,
            ..Config::default()
        });
        let rows = run(&mut p, &["K,V", "", "a,1", "b,3", "c,2"]).unwrap();
        assert!(rows.is_empty());
        assert!(p.is_buffering());
        let replayed: Vec<(String, usize)> = p
            .buffer()
            .replay()
            .map(|r| (r.line(","), r.row_number))
            .collect();
        assert_eq!(
            replayed,
            vec![
                ("K,V".to_string(), 0),
                ("b,3".to_string(), 4),
                ("c,2".to_string(), 5),
                ("a,1".to_string(), 3),
            ]
        );
    }

    #[test]
    fn test_shared_initialization_across_files() {
        let mut p = pipeline(Config::default());
        run(&mut p, &["a;b"]).unwrap();
        // The second file keeps the first file's delimiter.
        let rows: Vec<OutputRow> = p
            .process("second", ["c;d"])
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows[0].fields().len(), 2);
        assert_eq!(rows[0].row_number(), 2);
        assert!(p.process("third", ["e,f,g"]).next().unwrap().is_err());
    }

    #[test]
    fn test_reset_reinitializes() {
        let mut p = pipeline(Config::default());
        run(&mut p, &["a;b"]).unwrap();
        p.reset();
        assert_eq!(p.state(), PipelineState::Uninitialized);
        let rows = run(&mut p, &["e,f,g"]).unwrap();
        assert_eq!(p.delimiter(), Some(","));
        assert_eq!(rows[0].row_number(), 1);
    }

    #[test]
    fn test_initialize_from_skips_comments() {
        let mut p = pipeline(Config {
            comment: Some("%".to_string()),
            header: true,
            ..Config::default()
        });
        assert!(p.initialize_from("% comment\n\nX:Y\n1:2\n").unwrap());
        assert_eq!(p.delimiter(), Some(":"));
        assert_eq!(p.header().unwrap().names(), &["X".to_string(), "Y".to_string()]);
        assert_eq!(p.state(), PipelineState::Streaming);
    }

    #[test]
    fn test_plot_values_collected() {
        let mut p = pipeline(Config {
            plot_x: Some("1".to_string()),
            plot_y: Some("2".to_string()),
            ..Config::default()
        });
        run(&mut p, &["1,10", "2,20"]).unwrap();
        assert_eq!(p.plot().ys(2), &[10.0, 20.0]);

        let mut bad = pipeline(Config {
            plot_x: Some("1".to_string()),
            plot_y: Some("2".to_string()),
            ..Config::default()
        });
        assert!(matches!(
            run(&mut bad, &["1,x"]),
            Err(CampyonError::NonNumericPlotValue { .. })
        ));
    }

    #[test]
    fn test_invalid_select_fails_at_construction() {
        let config = Config {
            select: Some("c(1) ==".to_string()),
            ..Config::default()
        };
        assert!(RowPipeline::new(&config).is_err());
    }
}
