//! Run configuration.
//!
//! [`Config`] is the finalized set of options for one invocation. Column
//! specifications are kept as raw text here and resolved by the pipeline
//! once a dataset's field count and header are known.

use std::path::PathBuf;

use encoding_rs::Encoding;

use crate::error::{CampyonError, Result};

/// Where processed rows go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputTarget {
    #[default]
    Stdout,
    /// One file aggregating all inputs.
    File(PathBuf),
    /// Replace each input file with its processed version.
    InPlace,
    /// Write `<input>.<suffix>` next to each input file.
    CopySuffix(String),
}

impl OutputTarget {
    /// In-place and suffixed copies treat every input as its own dataset.
    pub fn per_input(&self) -> bool {
        matches!(self, OutputTarget::InPlace | OutputTarget::CopySuffix(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    /// Rows as delimited lines.
    #[default]
    Raw,
    /// Columns padded to a common width.
    Pretty,
    /// Rows handed to an interactive viewer.
    Interactive,
}

/// Options forwarded to the plotting collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotStyle {
    pub grid: bool,
    pub x_log: bool,
    pub y_log: bool,
    /// Per-series format strings (colour, marker, line), cycled.
    pub formats: Vec<String>,
    pub title: Option<String>,
    pub file: Option<PathBuf>,
}

impl PlotStyle {
    fn formats_from(codes: &[&str]) -> Vec<String> {
        codes.iter().map(|s| s.to_string()).collect()
    }

    /// Lines without point markers.
    pub fn line_preset() -> Vec<String> {
        Self::formats_from(&["r-", "g-", "b-", "y-", "m-", "c-"])
    }

    /// Point markers without lines.
    pub fn scatter_preset() -> Vec<String> {
        Self::formats_from(&["ro ", "go ", "bo ", "yo ", "mo ", "co "])
    }
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            grid: false,
            x_log: false,
            y_log: false,
            formats: Self::formats_from(&["r.-", "g.-", "b.-", "y.-", "m.-", "c.-"]),
            title: None,
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub inputs: Vec<PathBuf>,
    /// Encoding label understood by `encoding_rs` (e.g. `utf-8`, `latin1`).
    pub encoding: String,
    /// Field delimiter; guessed from the first data line when unset.
    pub delimiter: Option<String>,
    /// Lines starting with this marker are comments.
    pub comment: Option<String>,
    /// The first data line holds column names.
    pub header: bool,
    pub keep: Option<String>,
    pub delete: Option<String>,
    pub highlight: Option<String>,
    pub histogram: Option<String>,
    pub sort: Option<String>,
    pub sort_descending: bool,
    pub select: Option<String>,
    pub stats: bool,
    pub number_lines: bool,
    pub number_fields: bool,
    /// Blank line after every output line.
    pub extra_newline: bool,
    /// Style stdout output with ANSI colours.
    pub color: bool,
    pub output: OutputTarget,
    pub plot_x: Option<String>,
    pub plot_y: Option<String>,
    pub plot: PlotStyle,
    pub display: DisplayMode,
    /// Logarithm base for histogram entropy; `0` selects the natural log.
    pub entropy_base: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            encoding: "utf-8".to_string(),
            delimiter: None,
            comment: None,
            header: false,
            keep: None,
            delete: None,
            highlight: None,
            histogram: None,
            sort: None,
            sort_descending: false,
            select: None,
            stats: false,
            number_lines: false,
            number_fields: false,
            extra_newline: false,
            color: false,
            output: OutputTarget::Stdout,
            plot_x: None,
            plot_y: None,
            plot: PlotStyle::default(),
            display: DisplayMode::Raw,
            entropy_base: 2.0,
        }
    }
}

impl Config {
    /// Sorting and aligned or interactive display need every row first.
    pub fn requires_buffering(&self) -> bool {
        self.sort.is_some() || self.display != DisplayMode::Raw
    }

    pub fn plotting(&self) -> bool {
        self.plot_x.is_some() && self.plot_y.is_some()
    }

    /// The decoder for [`Config::encoding`].
    pub fn encoding(&self) -> Result<&'static Encoding> {
        Encoding::for_label(self.encoding.trim().as_bytes())
            .ok_or_else(|| CampyonError::UnknownEncoding(self.encoding.clone()))
    }

    /// Checks everything that can be checked before reading any row.
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(CampyonError::InvalidConfiguration(
                "no input files given".to_string(),
            ));
        }
        if let Some(missing) = self.inputs.iter().find(|p| !p.exists()) {
            return Err(CampyonError::MissingInput {
                path: missing.clone(),
            });
        }
        self.encoding()?;
        if self.delimiter.as_deref() == Some("") {
            return Err(CampyonError::InvalidConfiguration(
                "delimiter must not be empty".to_string(),
            ));
        }
        if self.comment.as_deref() == Some("") {
            return Err(CampyonError::InvalidConfiguration(
                "comment marker must not be empty".to_string(),
            ));
        }
        if self.plot_x.is_some() != self.plot_y.is_some() {
            return Err(CampyonError::InvalidConfiguration(
                "plotting needs both an x column and y columns".to_string(),
            ));
        }
        if self.output == OutputTarget::CopySuffix(String::new()) {
            return Err(CampyonError::InvalidConfiguration(
                "copy suffix must not be empty".to_string(),
            ));
        }
        if let OutputTarget::File(path) = &self.output
            && self.inputs.iter().any(|i| i == path)
        {
            return Err(CampyonError::InvalidConfiguration(format!(
                "output file {} is also an input; use in-place mode instead",
                path.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn with_input() -> (NamedTempFile, Config) {
        let file = NamedTempFile::new().unwrap();
        let config = Config {
            inputs: vec![file.path().to_path_buf()],
            ..Config::default()
        };
        (file, config)
    }

    #[test]
    fn test_buffering_decision() {
        let mut config = Config::default();
        assert!(!config.requires_buffering());
        config.sort = Some("1".to_string());
        assert!(config.requires_buffering());
        config.sort = None;
        config.display = DisplayMode::Pretty;
        assert!(config.requires_buffering());
        config.display = DisplayMode::Interactive;
        assert!(config.requires_buffering());
    }

    #[test]
    fn test_validate_ok() {
        let (_file, config) = with_input();
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_missing_input() {
        let config = Config {
            inputs: vec![PathBuf::from("/definitely/not/here.tsv")],
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CampyonError::MissingInput { .. })
        ));
        assert!(matches!(
            Config::default().validate(),
            Err(CampyonError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_encoding() {
        let (_file, mut config) = with_input();
        config.encoding = "latin1".to_string();
        config.validate().unwrap();
        config.encoding = "klingon-8".to_string();
        assert!(matches!(
            config.validate(),
            Err(CampyonError::UnknownEncoding(_))
        ));
    }

    #[test]
    fn test_validate_plot_pairing() {
        let (_file, mut config) = with_input();
        config.plot_x = Some("1".to_string());
        assert!(config.validate().is_err());
        config.plot_y = Some("2".to_string());
        config.validate().unwrap();
        assert!(config.plotting());
    }

    #[test]
    fn test_output_equal_to_input_rejected() {
        let (file, mut config) = with_input();
        config.output = OutputTarget::File(file.path().to_path_buf());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_per_input_targets() {
        assert!(OutputTarget::InPlace.per_input());
        assert!(OutputTarget::CopySuffix("out".to_string()).per_input());
        assert!(!OutputTarget::Stdout.per_input());
    }
}
