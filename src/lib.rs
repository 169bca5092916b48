//! # campyon
//!
//! Streaming filter, projection and statistics for columned text data
//! (CSV, TSV and similar).
//!
//! ## Overview
//!
//! Each input line flows through one [`RowPipeline`]:
//! - **Detection**: the delimiter and field count are fixed by the first
//!   data line; an optional header names the columns
//! - **Selection**: a small expression language decides which rows survive
//! - **Statistics**: running column sums and value histograms
//! - **Projection**: keep, delete, highlight and number columns
//!
//! Rows stream straight through unless sorting or an aligned view needs
//! the whole dataset, in which case they are buffered and replayed.
//!
//! ## Example
//!
//! ```
//! use campyon::{Config, RowPipeline};
//!
//! let config = Config {
//!     header: true,
//!     select: Some("c('dept') == 'SALES' and c('salary') > 55000".to_string()),
//!     keep: Some("name".to_string()),
//!     ..Config::default()
//! };
//!
//! let input = [
//!     "name\tdept\tsalary",
//!     "SMITH\tSALES\t50000",
//!     "JONES\tENGINEER\t75000",
//!     "DOE\tSALES\t60000",
//! ];
//!
//! let mut pipeline = RowPipeline::new(&config).unwrap();
//! let lines: Vec<String> = pipeline
//!     .process("staff.tsv", input)
//!     .map(|row| row.unwrap().render("\t", false))
//!     .collect();
//!
//! assert_eq!(lines, vec!["name", "DOE"]);
//! ```

pub mod buffer;
pub mod columns;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod predicate;
pub mod project;
pub mod select;
pub mod stats;
pub mod style;
pub mod value;

pub use buffer::{BufferedMaterializer, BufferedRow, ReplayRow};
pub use columns::{ColumnSpec, Header, resolve_index, resolve_spec};
pub use config::{Config, DisplayMode, OutputTarget, PlotStyle};
pub use error::{CampyonError, Result};
pub use executor::{execute, read_input};
pub use output::{PlotData, PrettyViewer, RowWriter, ViewData, Viewer};
pub use pipeline::{OutputRow, PipelineState, RowPipeline, detect_delimiter};
pub use project::{ColumnProjector, PlotSeries, ProjectedField};
pub use select::RowSelector;
pub use stats::{ColumnSummary, FrequencyTable, HistogramEntry, StatsAccumulator};
pub use value::Value;
