//! Column projection.
//!
//! [`ColumnProjector`] turns a row's raw fields into the typed fields that
//! are written out: it drops deleted columns, coerces values, and marks
//! fields for numbering and highlighting. Styling itself happens only when
//! a field is rendered for a terminal, so highlighting never changes a
//! field's value or type.

use std::collections::BTreeMap;

use tracing::warn;

use crate::columns::ColumnSpec;
use crate::error::{CampyonError, Result};
use crate::style;
use crate::value::Value;

/// One output field.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedField {
    /// 1-based source column.
    pub column: usize,
    pub value: Value,
    /// Rendered as `column=value`; the value is never coerced.
    pub numbered: bool,
    pub highlighted: bool,
}

impl ProjectedField {
    /// Unstyled text, as written to files and used for alignment.
    pub fn text(&self) -> String {
        if self.numbered {
            format!("{}={}", self.column, self.value)
        } else {
            self.value.to_string()
        }
    }

    /// Text with terminal styling applied.
    pub fn styled(&self) -> String {
        let mut text = self.value.to_string();
        if self.highlighted {
            text = style::highlight(&text);
        }
        if self.numbered {
            text = format!("{}={}", style::magenta(&self.column.to_string()), text);
        }
        text
    }
}

#[derive(Debug, Clone, Default)]
pub struct ColumnProjector {
    keep: ColumnSpec,
    delete: ColumnSpec,
    highlight: ColumnSpec,
    number_fields: bool,
}

impl ColumnProjector {
    pub fn new(keep: ColumnSpec, delete: ColumnSpec, highlight: ColumnSpec, number_fields: bool) -> Self {
        for column in keep.indices().iter().filter(|c| delete.contains(**c)) {
            warn!(column, "column is both kept and deleted; keeping it");
        }
        Self {
            keep,
            delete,
            highlight,
            number_fields,
        }
    }

    /// Whether `column` appears in the output.
    pub fn keeps(&self, column: usize) -> bool {
        if self.keep.contains(column) {
            true
        } else if self.delete.contains(column) {
            false
        } else {
            self.keep.is_empty()
        }
    }

    pub fn highlights(&self, column: usize) -> bool {
        self.highlight.contains(column)
    }

    pub fn highlight(&self) -> &ColumnSpec {
        &self.highlight
    }

    /// Project one row's fields, in original column order.
    pub fn project(&self, fields: &[&str]) -> Vec<ProjectedField> {
        fields
            .iter()
            .enumerate()
            .map(|(i, raw)| (i + 1, raw))
            .filter(|(column, _)| self.keeps(*column))
            .map(|(column, raw)| ProjectedField {
                column,
                value: if self.number_fields {
                    Value::Str(raw.to_string())
                } else {
                    Value::coerce(raw)
                },
                numbered: self.number_fields,
                highlighted: self.highlights(column),
            })
            .collect()
    }

    /// Project header names; header fields are never coerced.
    pub fn project_header(&self, names: &[String]) -> Vec<ProjectedField> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| (i + 1, name))
            .filter(|(column, _)| self.keeps(*column))
            .map(|(column, name)| ProjectedField {
                column,
                value: Value::Str(name.clone()),
                numbered: self.number_fields,
                highlighted: self.highlights(column),
            })
            .collect()
    }
}

/// Axis data collected for the plotting collaborator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlotSeries {
    x_column: Option<usize>,
    y_columns: Vec<usize>,
    xs: Vec<Value>,
    ys: BTreeMap<usize, Vec<f64>>,
}

impl PlotSeries {
    pub fn new(x_column: Option<usize>, y_columns: Vec<usize>) -> Self {
        Self {
            x_column,
            y_columns,
            ..Self::default()
        }
    }

    /// Set the axis columns after a dataset reinitialization, keeping the
    /// values collected so far.
    pub fn set_columns(&mut self, x_column: Option<usize>, y_columns: Vec<usize>) {
        self.x_column = x_column;
        self.y_columns = y_columns;
    }

    pub fn is_active(&self) -> bool {
        self.x_column.is_some() || !self.y_columns.is_empty()
    }

    /// Append one data row's axis values. Every y column must be numeric.
    pub fn record(&mut self, fields: &[&str]) -> Result<()> {
        for &column in &self.y_columns {
            let raw = fields.get(column - 1).copied().unwrap_or_default();
            let Some(y) = Value::coerce(raw).as_f64() else {
                return Err(CampyonError::NonNumericPlotValue {
                    column,
                    value: raw.to_string(),
                });
            };
            self.ys.entry(column).or_default().push(y);
        }
        if let Some(x) = self.x_column
            && let Some(raw) = fields.get(x - 1)
        {
            self.xs.push(Value::coerce(raw));
        }
        Ok(())
    }

    pub fn x_column(&self) -> Option<usize> {
        self.x_column
    }

    pub fn y_columns(&self) -> &[usize] {
        &self.y_columns
    }

    pub fn xs(&self) -> &[Value] {
        &self.xs
    }

    pub fn ys(&self, column: usize) -> &[f64] {
        self.ys.get(&column).map(Vec::as_slice).unwrap_or_default()
    }

    /// True when every x value is numeric, so a line/scatter plot applies;
    /// otherwise the x values are category labels for a bar chart.
    pub fn numeric_x(&self) -> bool {
        self.xs.iter().all(Value::is_numeric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(indices: &[usize]) -> ColumnSpec {
        ColumnSpec::from_indices(indices.to_vec())
    }

    fn texts(fields: &[ProjectedField]) -> Vec<String> {
        fields.iter().map(ProjectedField::text).collect()
    }

    #[test]
    fn test_empty_sets_keep_everything() {
        let p = ColumnProjector::default();
        let out = p.project(&["a", "2", "3.5"]);
        assert_eq!(texts(&out), vec!["a", "2", "3.5"]);
        assert_eq!(out[1].value, Value::Int(2));
        assert_eq!(out[2].value, Value::Float(3.5));
    }

    #[test]
    fn test_keep_flips_default() {
        let p = ColumnProjector::new(spec(&[3, 1]), spec(&[]), spec(&[]), false);
        let out = p.project(&["a", "b", "c", "d"]);
        // Original column order, not spec order.
        assert_eq!(texts(&out), vec!["a", "c"]);
    }

    #[test]
    fn test_delete() {
        let p = ColumnProjector::new(spec(&[]), spec(&[2]), spec(&[]), false);
        assert_eq!(texts(&p.project(&["a", "b", "c"])), vec!["a", "c"]);
    }

    #[test]
    fn test_keep_wins_over_delete() {
        let p = ColumnProjector::new(spec(&[2]), spec(&[2, 3]), spec(&[]), false);
        assert_eq!(texts(&p.project(&["a", "b", "c"])), vec!["b"]);
    }

    #[test]
    fn test_numbering_skips_coercion() {
        let p = ColumnProjector::new(spec(&[]), spec(&[]), spec(&[]), true);
        let out = p.project(&["7", "x"]);
        assert_eq!(out[0].value, Value::Str("7".to_string()));
        assert_eq!(texts(&out), vec!["1=7", "2=x"]);
    }

    #[test]
    fn test_highlight_is_display_only() {
        let p = ColumnProjector::new(spec(&[]), spec(&[]), spec(&[1]), false);
        let out = p.project(&["42", "b"]);
        assert_eq!(out[0].value, Value::Int(42));
        assert_eq!(out[0].text(), "42");
        assert_eq!(out[0].styled(), style::highlight("42"));
        assert_eq!(out[1].styled(), "b");
    }

    #[test]
    fn test_plot_series() {
        let mut plot = PlotSeries::new(Some(1), vec![2, 3]);
        plot.record(&["a", "1", "2.5"]).unwrap();
        plot.record(&["b", "3", "4"]).unwrap();
        assert_eq!(plot.xs(), &[Value::from("a"), Value::from("b")]);
        assert_eq!(plot.ys(2), &[1.0, 3.0]);
        assert_eq!(plot.ys(3), &[2.5, 4.0]);
        assert!(!plot.numeric_x());
    }

    #[test]
    fn test_plot_rejects_non_numeric_y() {
        let mut plot = PlotSeries::new(Some(1), vec![2]);
        match plot.record(&["1", "oops"]) {
            Err(CampyonError::NonNumericPlotValue { column, value }) => {
                assert_eq!(column, 2);
                assert_eq!(value, "oops");
            }
            other => panic!("Expected NonNumericPlotValue, got {other:?}"),
        }
    }
}
