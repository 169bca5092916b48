//! Column references and specifications.
//!
//! Column specification syntax:
//! ```text
//! 3          third column (1-based)
//! -1         last column, -2 the one before it
//! NAME       column named NAME in the header line
//! 3:6        columns 3, 4, 5 and 6
//! 3:-1       third column up to the last
//! ID,2:4,-1  comma separated combination of the above
//! ```
//!
//! Specifications are resolved once per dataset, after the field count is
//! locked. An index outside `[1, field_count]` is a configuration error.

use crate::error::{CampyonError, Result};

/// Column names taken from the first data line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Header {
    names: Vec<String>,
}

impl Header {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn from_fields(fields: &[&str]) -> Self {
        Self::new(fields.iter().map(|f| f.to_string()).collect())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Name of the 1-based column `index`.
    pub fn name(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.names.get(i))
            .map(String::as_str)
    }

    /// 1-based index of the first column named exactly `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name).map(|i| i + 1)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Resolve a single column token to a 1-based index.
pub fn resolve_index(token: &str, field_count: usize, header: Option<&Header>) -> Result<usize> {
    let token = token.trim();
    if token.is_empty() {
        return Err(CampyonError::InvalidConfiguration(
            "empty column reference".to_string(),
        ));
    }

    let index: i64 = if let Some(digits) = token.strip_prefix('-')
        && is_digits(digits)
    {
        let n = parse_index(digits);
        field_count as i64 - n + 1
    } else if is_digits(token) {
        parse_index(token)
    } else {
        let found = header.and_then(|h| h.index_of(token));
        return match found {
            Some(i) => check_range(i as i64, field_count),
            None => Err(CampyonError::UnknownColumnName {
                name: token.to_string(),
            }),
        };
    };

    check_range(index, field_count)
}

/// Resolve a comma separated specification, expanding `low:high` ranges.
pub fn resolve_spec(text: &str, field_count: usize, header: Option<&Header>) -> Result<Vec<usize>> {
    let mut indices = Vec::new();
    for token in text.split(',') {
        if let Some((low, high)) = token.split_once(':') {
            let low = resolve_index(low, field_count, header)?;
            let high = resolve_index(high, field_count, header)?;
            indices.extend(low..=high);
        } else {
            indices.push(resolve_index(token, field_count, header)?);
        }
    }
    Ok(indices)
}

/// A resolved column specification.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnSpec {
    indices: Vec<usize>,
}

impl ColumnSpec {
    /// Resolve `text`; `None` or blank text gives an empty spec.
    pub fn resolve(text: Option<&str>, field_count: usize, header: Option<&Header>) -> Result<Self> {
        match text.map(str::trim) {
            Some(t) if !t.is_empty() => Ok(Self {
                indices: resolve_spec(t, field_count, header)?,
            }),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Digit strings too long for i64 are certainly out of range.
fn parse_index(digits: &str) -> i64 {
    digits.parse().unwrap_or(i64::MAX)
}

fn check_range(index: i64, field_count: usize) -> Result<usize> {
    if index < 1 || index > field_count as i64 {
        return Err(CampyonError::ColumnOutOfRange { index, field_count });
    }
    Ok(index as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn header() -> Header {
        Header::from_fields(&["ID", "NAME", "SCORE", "RANK"])
    }

    #[test]
    fn test_positive_and_negative_indices() {
        assert_eq!(resolve_index("1", 4, None).unwrap(), 1);
        assert_eq!(resolve_index("4", 4, None).unwrap(), 4);
        assert_eq!(resolve_index("-1", 4, None).unwrap(), 4);
        assert_eq!(resolve_index("-4", 4, None).unwrap(), 1);
    }

    #[test]
    fn test_out_of_range() {
        for token in ["0", "5", "-5", "99999999999999999999999"] {
            match resolve_index(token, 4, None) {
                Err(CampyonError::ColumnOutOfRange { field_count, .. }) => {
                    assert_eq!(field_count, 4)
                }
                other => panic!("Expected ColumnOutOfRange for {token}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_named_columns() {
        let h = header();
        assert_eq!(resolve_index("SCORE", 4, Some(&h)).unwrap(), 3);
        match resolve_index("MISSING", 4, Some(&h)) {
            Err(CampyonError::UnknownColumnName { name }) => assert_eq!(name, "MISSING"),
            other => panic!("Expected UnknownColumnName, got {other:?}"),
        }
        // Without header mode names never resolve.
        assert!(matches!(
            resolve_index("SCORE", 4, None),
            Err(CampyonError::UnknownColumnName { .. })
        ));
    }

    #[test]
    fn test_spec_with_ranges() {
        assert_eq!(resolve_spec("3:-1", 5, None).unwrap(), vec![3, 4, 5]);
        assert_eq!(resolve_spec("1,3:4", 5, None).unwrap(), vec![1, 3, 4]);
        assert_eq!(
            resolve_spec("ID, NAME:SCORE", 4, Some(&header())).unwrap(),
            vec![1, 2, 3]
        );
        assert!(resolve_spec("4:3", 5, None).unwrap().is_empty());
    }

    #[test]
    fn test_spec_range_bound_out_of_range() {
        assert!(matches!(
            resolve_spec("2:6", 5, None),
            Err(CampyonError::ColumnOutOfRange { index: 6, .. })
        ));
    }

    #[test]
    fn test_column_spec_blank() {
        let spec = ColumnSpec::resolve(Some("  "), 3, None).unwrap();
        assert!(spec.is_empty());
        let spec = ColumnSpec::resolve(Some("2"), 3, None).unwrap();
        assert!(spec.contains(2));
        assert!(!spec.contains(1));
    }

    #[test]
    fn test_header_lookup() {
        let h = header();
        assert_eq!(h.name(2), Some("NAME"));
        assert_eq!(h.name(0), None);
        assert_eq!(h.name(5), None);
        assert_eq!(h.len(), 4);
    }

    proptest! {
        #[test]
        fn prop_resolved_indices_in_range(n in 1usize..50, a in -60i64..60, b in -60i64..60) {
            let spec = format!("{a},{a}:{b}");
            match resolve_spec(&spec, n, None) {
                Ok(indices) => {
                    prop_assert!(indices.iter().all(|&i| i >= 1 && i <= n));
                }
                Err(CampyonError::ColumnOutOfRange { index, .. }) => {
                    prop_assert!(index < 1 || index > n as i64);
                }
                Err(e) => prop_assert!(false, "unexpected error {e}"),
            }
        }

        #[test]
        fn prop_negative_mirrors_positive(n in 1usize..100, k in 1usize..100) {
            prop_assume!(k <= n);
            let neg = resolve_index(&format!("-{k}"), n, None).unwrap();
            prop_assert_eq!(neg, n - k + 1);
        }
    }
}
