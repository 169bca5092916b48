//! In-memory row buffer for operations that need the whole dataset
//! (sorting, aligned output, interactive viewing).

use std::cmp::Ordering;

use crate::project::ProjectedField;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct BufferedRow {
    pub fields: Vec<ProjectedField>,
    pub row_number: usize,
}

/// A row produced by [`BufferedMaterializer::replay`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayRow<'a> {
    pub fields: &'a [ProjectedField],
    /// Output row number; `0` for the header.
    pub row_number: usize,
}

impl ReplayRow<'_> {
    pub fn is_header(&self) -> bool {
        self.row_number == 0
    }

    /// Unstyled fields joined by `delimiter`.
    pub fn line(&self, delimiter: &str) -> String {
        join_fields(self.fields, delimiter, false)
    }
}

pub fn join_fields(fields: &[ProjectedField], delimiter: &str, styled: bool) -> String {
    fields
        .iter()
        .map(|f| if styled { f.styled() } else { f.text() })
        .collect::<Vec<_>>()
        .join(delimiter)
}

#[derive(Debug, Clone, Default)]
pub struct BufferedMaterializer {
    header: Option<Vec<ProjectedField>>,
    rows: Vec<BufferedRow>,
    sort_columns: Vec<usize>,
    descending: bool,
}

impl BufferedMaterializer {
    /// `sort_columns` are 1-based source columns; empty keeps input order.
    pub fn new(sort_columns: Vec<usize>, descending: bool) -> Self {
        Self {
            sort_columns,
            descending,
            ..Self::default()
        }
    }

    pub fn set_sort_columns(&mut self, sort_columns: Vec<usize>) {
        self.sort_columns = sort_columns;
    }

    pub fn set_header(&mut self, fields: Vec<ProjectedField>) {
        self.header = Some(fields);
    }

    pub fn header(&self) -> Option<&[ProjectedField]> {
        self.header.as_deref()
    }

    pub fn add(&mut self, fields: Vec<ProjectedField>, row_number: usize) {
        self.rows.push(BufferedRow { fields, row_number });
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Drop all buffered rows and the header.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.header = None;
    }

    /// Rows in insertion order.
    pub fn rows(&self) -> &[BufferedRow] {
        &self.rows
    }

    /// Header first (row number 0), then the data rows, sorted when sort
    /// columns are configured. Insertion order is left untouched, so
    /// replaying again yields the same sequence.
    pub fn replay(&self) -> impl Iterator<Item = ReplayRow<'_>> {
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        if !self.sort_columns.is_empty() {
            let keys: Vec<Vec<Option<&Value>>> =
                self.rows.iter().map(|r| self.sort_key(r)).collect();
            order.sort_by(|&a, &b| {
                let ord = compare_keys(&keys[a], &keys[b]);
                if self.descending { ord.reverse() } else { ord }
            });
        }

        let header = self.header.as_deref().map(|fields| ReplayRow {
            fields,
            row_number: 0,
        });
        header.into_iter().chain(order.into_iter().map(move |i| {
            let row = &self.rows[i];
            ReplayRow {
                fields: &row.fields,
                row_number: row.row_number,
            }
        }))
    }

    fn sort_key<'a>(&self, row: &'a BufferedRow) -> Vec<Option<&'a Value>> {
        self.sort_columns
            .iter()
            .map(|c| row.fields.iter().find(|f| f.column == *c).map(|f| &f.value))
            .collect()
    }
}

/// Element-wise comparison; a missing element sorts first.
fn compare_keys(a: &[Option<&Value>], b: &[Option<&Value>]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ord = match (x, y) {
            (Some(x), Some(y)) => x.sort_cmp(y),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
