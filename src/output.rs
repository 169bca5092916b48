//! Output collaborators: the row writer, the aligned view, the statistics
//! and histogram reports, plot series and the interactive viewer seam.

use std::io::{self, Write};

use crate::buffer::{BufferedMaterializer, ReplayRow};
use crate::columns::{ColumnSpec, Header};
use crate::config::PlotStyle;
use crate::pipeline::OutputRow;
use crate::project::{PlotSeries, ProjectedField};
use crate::stats::{ColumnSummary, StatsAccumulator};
use crate::style;
use crate::value::format_float;

/// Writes display lines, optionally prefixed with their row number and
/// followed by an extra blank line.
pub struct RowWriter<W: Write> {
    out: W,
    number_lines: bool,
    extra_newline: bool,
    styled: bool,
}

impl<W: Write> RowWriter<W> {
    pub fn new(out: W, number_lines: bool, extra_newline: bool, styled: bool) -> Self {
        Self {
            out,
            number_lines,
            extra_newline,
            styled,
        }
    }

    pub fn write_line(&mut self, line: &str, row_number: usize, delimiter: &str) -> io::Result<()> {
        if self.number_lines {
            let number = row_number.to_string();
            if self.styled {
                write!(self.out, "{}{delimiter}", style::green(&number))?;
            } else {
                write!(self.out, "{number}{delimiter}")?;
            }
        }
        writeln!(self.out, "{line}")?;
        if self.extra_newline {
            writeln!(self.out)?;
        }
        Ok(())
    }

    pub fn write_row(&mut self, row: &OutputRow, delimiter: &str) -> io::Result<()> {
        let line = row.render(delimiter, self.styled);
        self.write_line(&line, row.row_number(), delimiter)
    }

    /// Replay buffered rows as delimited lines. Highlighting only applies
    /// to streamed rows.
    pub fn write_buffered(&mut self, buffer: &BufferedMaterializer, delimiter: &str) -> io::Result<()> {
        for row in buffer.replay() {
            self.write_line(&row.line(delimiter), row.row_number, delimiter)?;
        }
        Ok(())
    }

    /// Replay buffered rows with every column padded to a common width.
    pub fn write_pretty(&mut self, buffer: &BufferedMaterializer, delimiter: &str) -> io::Result<()> {
        let rows: Vec<ReplayRow<'_>> = buffer.replay().collect();
        for (line, row_number) in pretty_lines(&rows) {
            self.write_line(&line, row_number, delimiter)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Column width margin of the aligned view.
const PRETTY_MARGIN: usize = 2;

/// Align replayed rows on their plain text.
pub fn pretty_lines(rows: &[ReplayRow<'_>]) -> Vec<(String, usize)> {
    let mut widths: Vec<usize> = Vec::new();
    for row in rows {
        for (i, field) in row.fields.iter().enumerate() {
            let width = field.text().chars().count() + PRETTY_MARGIN;
            match widths.get_mut(i) {
                Some(w) => *w = (*w).max(width),
                None => widths.push(width),
            }
        }
    }

    rows.iter()
        .map(|row| {
            let last = row.fields.len().saturating_sub(1);
            let line: String = row
                .fields
                .iter()
                .enumerate()
                .map(|(i, field)| pad_field(field, if i == last { 0 } else { widths[i] }))
                .collect();
            (line, row.row_number)
        })
        .collect()
}

fn pad_field(field: &ProjectedField, width: usize) -> String {
    let text = field.text();
    let padding = width.saturating_sub(text.chars().count());
    format!("{text}{}", " ".repeat(padding))
}

/// Sum/average table, one line per column still eligible for statistics.
pub fn write_stats(out: &mut impl Write, summary: &[ColumnSummary]) -> io::Result<()> {
    writeln!(out, "COLUMN\tSUM\tAVERAGE")?;
    for column in summary {
        writeln!(
            out,
            "{}\t{}\t{}",
            column.name,
            column.sum,
            format_float(column.average)
        )?;
    }
    Ok(())
}

/// Frequency report for every histogram column.
pub fn write_histograms(
    out: &mut impl Write,
    stats: &StatsAccumulator,
    header: Option<&Header>,
    entropy_base: f64,
) -> io::Result<()> {
    for (column, table) in stats.tables() {
        let label = match header.and_then(|h| h.name(column)) {
            Some(name) => format!("#{column} ({name})"),
            None => format!("#{column}"),
        };
        writeln!(
            out,
            "Histogram for column {label}\ttypes={}\ttokens={}\tttr={}\tentropy={}",
            table.types(),
            table.tokens(),
            format_float(table.ttr()),
            format_float(table.entropy(entropy_base)),
        )?;
        writeln!(out, "{}", "-".repeat(60))?;
        for (rank, entry) in table.histogram().iter().enumerate() {
            writeln!(
                out,
                "{})\t{}\t{}\t{}%",
                rank + 1,
                entry.value,
                entry.count,
                format_float((entry.frequency * 10000.0).round() / 100.0),
            )?;
        }
    }
    Ok(())
}

/// Everything a plotting backend needs: the series, axis labels and style.
#[derive(Debug, Clone)]
pub struct PlotData<'a> {
    pub series: &'a PlotSeries,
    pub x_label: String,
    /// `(column, label)` per y series.
    pub y_labels: Vec<(usize, String)>,
    pub style: &'a PlotStyle,
}

impl<'a> PlotData<'a> {
    pub fn new(series: &'a PlotSeries, header: Option<&Header>, style: &'a PlotStyle) -> Self {
        let label = |column: usize| {
            header
                .and_then(|h| h.name(column))
                .map(str::to_string)
                .unwrap_or_else(|| format!("column {column}"))
        };
        Self {
            series,
            x_label: series.x_column().map(label).unwrap_or_default(),
            y_labels: series.y_columns().iter().map(|&c| (c, label(c))).collect(),
            style,
        }
    }

    /// Format string of the `i`-th y series, cycling through the style's list.
    pub fn format_for(&self, i: usize) -> &str {
        match self.style.formats.len() {
            0 => "",
            n => &self.style.formats[i % n],
        }
    }

    /// Dump the series as a tab-separated table, preceded by `#` lines
    /// describing the requested style.
    pub fn write_table(&self, out: &mut impl Write) -> io::Result<()> {
        if let Some(title) = &self.style.title {
            writeln!(out, "# title: {title}")?;
        }
        let formats: Vec<&str> = (0..self.y_labels.len()).map(|i| self.format_for(i)).collect();
        writeln!(
            out,
            "# grid={} xlog={} ylog={} kind={} formats={}",
            self.style.grid,
            self.style.x_log,
            self.style.y_log,
            if self.series.numeric_x() { "xy" } else { "bar" },
            formats.join(",")
        )?;

        let mut head = vec![self.x_label.clone()];
        head.extend(self.y_labels.iter().map(|(_, l)| l.clone()));
        writeln!(out, "{}", head.join("\t"))?;

        for (i, x) in self.series.xs().iter().enumerate() {
            let mut line = vec![x.to_string()];
            for (column, _) in &self.y_labels {
                let y = self.series.ys(*column).get(i).copied();
                line.push(y.map(format_float).unwrap_or_default());
            }
            writeln!(out, "{}", line.join("\t"))?;
        }
        Ok(())
    }
}

/// What an interactive viewer is handed: the buffered rows in replay
/// order, the header and the highlighted columns.
pub struct ViewData<'a> {
    pub header: Option<&'a [ProjectedField]>,
    pub rows: Vec<ReplayRow<'a>>,
    pub highlight: &'a ColumnSpec,
    pub delimiter: &'a str,
}

impl<'a> ViewData<'a> {
    pub fn new(buffer: &'a BufferedMaterializer, highlight: &'a ColumnSpec, delimiter: &'a str) -> Self {
        Self {
            header: buffer.header(),
            rows: buffer.replay().filter(|r| !r.is_header()).collect(),
            highlight,
            delimiter,
        }
    }
}

/// Read-only consumer of a fully buffered result.
pub trait Viewer {
    fn show(&mut self, view: &ViewData<'_>) -> io::Result<()>;
}

/// Viewer that prints the aligned view to a stream.
pub struct PrettyViewer<W: Write> {
    writer: RowWriter<W>,
}

impl<W: Write> PrettyViewer<W> {
    pub fn new(writer: RowWriter<W>) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write> Viewer for PrettyViewer<W> {
    fn show(&mut self, view: &ViewData<'_>) -> io::Result<()> {
        let header = view.header.map(|fields| ReplayRow {
            fields,
            row_number: 0,
        });
        let rows: Vec<ReplayRow<'_>> = header.into_iter().chain(view.rows.iter().copied()).collect();
        for (line, row_number) in pretty_lines(&rows) {
            self.writer.write_line(&line, row_number, view.delimiter)?;
        }
        self.writer.flush()
    }
}
