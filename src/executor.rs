//! Run driver.
//!
//! Feeds every input file through one [`RowPipeline`] and writes the
//! results to the configured target. Inputs share one dataset
//! initialization unless each file gets its own output (in-place or
//! suffixed copies), in which case the pipeline is reset per file.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::config::{Config, DisplayMode, OutputTarget};
use crate::error::{CampyonError, Result};
use crate::output::{RowWriter, ViewData, Viewer};
use crate::pipeline::RowPipeline;

/// Read a whole input file and decode it.
pub fn read_input(path: &Path, encoding: &'static Encoding) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => CampyonError::MissingInput {
            path: path.to_path_buf(),
        },
        _ => e.into(),
    })?;
    let (text, actual, had_errors) = encoding.decode(&bytes);
    if had_errors {
        warn!(
            file = %path.display(),
            encoding = actual.name(),
            "malformed input bytes replaced"
        );
    }
    Ok(text.into_owned())
}

/// `<path>.<suffix>`
pub fn suffixed_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Run `config` to completion. The returned pipeline holds the statistics
/// and plot series for the caller's reports.
pub fn execute(config: &Config, viewer: &mut dyn Viewer) -> Result<RowPipeline> {
    config.validate()?;
    let encoding = config.encoding()?;
    let mut pipeline = RowPipeline::new(config)?;

    match &config.output {
        OutputTarget::Stdout => {
            let out = BufWriter::new(io::stdout().lock());
            let mut writer = RowWriter::new(out, config.number_lines, config.extra_newline, config.color);
            execute_shared(config, encoding, &mut pipeline, &mut writer, viewer)?;
        }
        OutputTarget::File(path) => {
            let out = BufWriter::new(File::create(path)?);
            let mut writer = RowWriter::new(out, config.number_lines, config.extra_newline, false);
            execute_shared(config, encoding, &mut pipeline, &mut writer, viewer)?;
        }
        OutputTarget::InPlace => {
            for path in &config.inputs {
                let dir = match path.parent() {
                    Some(p) if !p.as_os_str().is_empty() => p,
                    _ => Path::new("."),
                };
                let tmp = NamedTempFile::new_in(dir)?;
                let mut writer = RowWriter::new(
                    BufWriter::new(tmp),
                    config.number_lines,
                    config.extra_newline,
                    false,
                );
                execute_own(config, encoding, &mut pipeline, &mut writer, viewer, path)?;
                let tmp = writer.into_inner().into_inner().map_err(|e| e.into_error())?;
                tmp.persist(path).map_err(|e| e.error)?;
                info!(file = %path.display(), "rewritten in place");
            }
        }
        OutputTarget::CopySuffix(suffix) => {
            for path in &config.inputs {
                let target = suffixed_path(path, suffix);
                let out = BufWriter::new(File::create(&target)?);
                let mut writer = RowWriter::new(out, config.number_lines, config.extra_newline, false);
                execute_own(config, encoding, &mut pipeline, &mut writer, viewer, path)?;
                info!(file = %target.display(), "written");
            }
        }
    }
    Ok(pipeline)
}

/// All inputs form one dataset written to one stream.
fn execute_shared<W: Write>(
    config: &Config,
    encoding: &'static Encoding,
    pipeline: &mut RowPipeline,
    writer: &mut RowWriter<W>,
    viewer: &mut dyn Viewer,
) -> Result<()> {
    for path in &config.inputs {
        let text = read_input(path, encoding)?;
        stream_file(pipeline, writer, path, &text)?;
    }
    if pipeline.is_buffering() {
        emit_buffered(config, pipeline, writer, viewer)?;
    }
    writer.flush()?;
    Ok(())
}

/// One input forms its own dataset.
fn execute_own<W: Write>(
    config: &Config,
    encoding: &'static Encoding,
    pipeline: &mut RowPipeline,
    writer: &mut RowWriter<W>,
    viewer: &mut dyn Viewer,
    path: &Path,
) -> Result<()> {
    pipeline.reset();
    let text = read_input(path, encoding)?;
    stream_file(pipeline, writer, path, &text)?;
    if pipeline.is_buffering() {
        emit_buffered(config, pipeline, writer, viewer)?;
        pipeline.clear_buffer();
    }
    writer.flush()?;
    Ok(())
}

fn stream_file<W: Write>(
    pipeline: &mut RowPipeline,
    writer: &mut RowWriter<W>,
    path: &Path,
    text: &str,
) -> Result<()> {
    // Column specs resolve here, before any row of this file is processed.
    pipeline.initialize_from(text)?;
    let delimiter = pipeline.delimiter().unwrap_or("\t").to_string();
    let name = path.display().to_string();
    for row in pipeline.process(&name, text.lines()) {
        writer.write_row(&row?, &delimiter)?;
    }
    Ok(())
}

fn emit_buffered<W: Write>(
    config: &Config,
    pipeline: &RowPipeline,
    writer: &mut RowWriter<W>,
    viewer: &mut dyn Viewer,
) -> Result<()> {
    let delimiter = pipeline.delimiter().unwrap_or("\t");
    match config.display {
        DisplayMode::Raw => writer.write_buffered(pipeline.buffer(), delimiter)?,
        DisplayMode::Pretty => writer.write_pretty(pipeline.buffer(), delimiter)?,
        DisplayMode::Interactive => {
            let view = ViewData::new(pipeline.buffer(), pipeline.projector().highlight(), delimiter);
            viewer.show(&view)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct NullViewer {
        shown: usize,
    }

    impl Viewer for NullViewer {
        fn show(&mut self, view: &ViewData<'_>) -> io::Result<()> {
            self.shown += view.rows.len();
            Ok(())
        }
    }

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_suffixed_path() {
        assert_eq!(
            suffixed_path(Path::new("data/x.tsv"), "out"),
            PathBuf::from("data/x.tsv.out")
        );
    }

    #[test]
    fn test_read_input_decodes_latin1() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "l1.txt", b"caf\xe9,1\n");
        let encoding = Encoding::for_label(b"latin1").unwrap();
        assert_eq!(read_input(&path, encoding).unwrap(), "caf\u{e9},1\n");
    }

    #[test]
    fn test_read_input_missing() {
        let err = read_input(Path::new("/no/such/file"), encoding_rs::UTF_8).unwrap_err();
        assert!(matches!(err, CampyonError::MissingInput { .. }));
    }

    #[test]
    fn test_file_output() {
        let dir = TempDir::new().unwrap();
        let input = write_file(&dir, "in.csv", b"a,1\nb,2\n");
        let output = dir.path().join("out.csv");
        let config = Config {
            inputs: vec![input],
            output: OutputTarget::File(output.clone()),
            delete: Some("1".to_string()),
            ..Config::default()
        };
        let mut viewer = NullViewer { shown: 0 };
        let pipeline = execute(&config, &mut viewer).unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "1\n2\n");
        assert_eq!(pipeline.rows_in(), 2);
    }

    #[test]
    fn test_interactive_goes_to_viewer() {
        let dir = TempDir::new().unwrap();
        let input = write_file(&dir, "in.csv", b"a,1\nb,2\nc,3\n");
        let output = dir.path().join("out.csv");
        let config = Config {
            inputs: vec![input],
            output: OutputTarget::File(output.clone()),
            display: DisplayMode::Interactive,
            ..Config::default()
        };
        let mut viewer = NullViewer { shown: 0 };
        execute(&config, &mut viewer).unwrap();
        assert_eq!(viewer.shown, 3);
        assert_eq!(fs::read_to_string(&output).unwrap(), "");
    }
}
