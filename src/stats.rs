//! Running column statistics.
//!
//! [`StatsAccumulator`] sees every surviving data row once. It keeps a
//! running sum per column for as long as the column has only produced
//! numeric values, and a [`FrequencyTable`] per histogram column.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::columns::Header;
use crate::value::Value;

/// Value counts for one column, remembering first-seen order.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    positions: HashMap<String, usize>,
    entries: Vec<(String, u64)>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, value: &str) {
        match self.positions.get(value) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                self.positions.insert(value.to_string(), self.entries.len());
                self.entries.push((value.to_string(), 1));
            }
        }
    }

    pub fn count(&self, value: &str) -> u64 {
        self.positions
            .get(value)
            .map(|&i| self.entries[i].1)
            .unwrap_or(0)
    }

    /// Number of distinct values.
    pub fn types(&self) -> usize {
        self.entries.len()
    }

    /// Total number of observed values.
    pub fn tokens(&self) -> u64 {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    /// Type/token ratio; zero for an empty table.
    pub fn ttr(&self) -> f64 {
        match self.tokens() {
            0 => 0.0,
            tokens => self.types() as f64 / tokens as f64,
        }
    }

    /// Shannon entropy of the value distribution. A base of zero selects
    /// the natural logarithm.
    pub fn entropy(&self, base: f64) -> f64 {
        let tokens = self.tokens() as f64;
        if tokens == 0.0 {
            return 0.0;
        }
        self.entries
            .iter()
            .map(|(_, count)| {
                let p = *count as f64 / tokens;
                let log = if base == 0.0 { p.ln() } else { p.log(base) };
                -p * log
            })
            .sum()
    }

    /// Values by descending count; ties keep first-seen order.
    pub fn histogram(&self) -> Vec<HistogramEntry> {
        let tokens = self.tokens() as f64;
        let mut sorted: Vec<&(String, u64)> = self.entries.iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        sorted
            .into_iter()
            .map(|(value, count)| HistogramEntry {
                value: value.clone(),
                count: *count,
                frequency: *count as f64 / tokens,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramEntry {
    pub value: String,
    pub count: u64,
    /// Share of all tokens in `[0, 1]`.
    pub frequency: f64,
}

/// One line of the statistics summary.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub column: usize,
    /// Header name, or the column number when there is no header.
    pub name: String,
    pub sum: Value,
    pub average: f64,
}

#[derive(Debug, Clone, Default)]
pub struct StatsAccumulator {
    track_sums: bool,
    histogram_columns: Vec<usize>,
    sums: BTreeMap<usize, Value>,
    excluded: BTreeSet<usize>,
    tables: BTreeMap<usize, FrequencyTable>,
    rows: u64,
}

impl StatsAccumulator {
    /// `track_sums` enables per-column sums; `histogram_columns` lists the
    /// 1-based columns to count values for.
    pub fn new(track_sums: bool, histogram_columns: Vec<usize>) -> Self {
        Self {
            track_sums,
            histogram_columns,
            ..Self::default()
        }
    }

    /// Forget everything seen so far, keeping the configuration.
    pub fn reset(&mut self) {
        self.sums.clear();
        self.excluded.clear();
        self.tables.clear();
        self.rows = 0;
    }

    pub fn set_histogram_columns(&mut self, columns: Vec<usize>) {
        self.histogram_columns = columns;
    }

    pub fn is_active(&self) -> bool {
        self.track_sums || !self.histogram_columns.is_empty()
    }

    /// Account for one surviving data row.
    pub fn observe(&mut self, fields: &[&str]) {
        self.rows += 1;

        for &column in &self.histogram_columns {
            if let Some(value) = fields.get(column - 1) {
                self.tables.entry(column).or_default().observe(value);
            }
        }

        if !self.track_sums {
            return;
        }
        for (i, raw) in fields.iter().enumerate() {
            let column = i + 1;
            if self.excluded.contains(&column) {
                continue;
            }
            let next = Value::parse_stat(raw).and_then(|x| match self.sums.get(&column) {
                Some(sum) => sum.checked_add(&x),
                None => Some(x),
            });
            match next {
                Some(sum) => {
                    self.sums.insert(column, sum);
                }
                None => {
                    debug!(column, value = *raw, "column excluded from statistics");
                    self.sums.remove(&column);
                    self.excluded.insert(column);
                }
            }
        }
    }

    /// Number of rows observed.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn is_excluded(&self, column: usize) -> bool {
        self.excluded.contains(&column)
    }

    pub fn sum(&self, column: usize) -> Option<&Value> {
        self.sums.get(&column)
    }

    /// Sums and averages of every column that stayed numeric.
    pub fn summary(&self, header: Option<&Header>) -> Vec<ColumnSummary> {
        self.sums
            .iter()
            .map(|(&column, sum)| ColumnSummary {
                column,
                name: header
                    .and_then(|h| h.name(column))
                    .map(str::to_string)
                    .unwrap_or_else(|| column.to_string()),
                sum: sum.clone(),
                average: match self.rows {
                    0 => 0.0,
                    rows => sum.as_f64().unwrap_or_default() / rows as f64,
                },
            })
            .collect()
    }

    pub fn table(&self, column: usize) -> Option<&FrequencyTable> {
        self.tables.get(&column)
    }

    /// Frequency tables in column order.
    pub fn tables(&self) -> impl Iterator<Item = (usize, &FrequencyTable)> {
        self.tables.iter().map(|(&c, t)| (c, t))
    }

    pub fn histogram(&self, column: usize) -> Vec<HistogramEntry> {
        self.table(column)
            .map(FrequencyTable::histogram)
            .unwrap_or_default()
    }
}
