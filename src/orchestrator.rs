//! End-to-end tracing of one script
//!
//! Reads the script (or an unsaved buffer for it), extracts the breakpoint
//! lines, and only when there are any materializes the buffer and runs a
//! debug session. The session is disposed and the temporary file removed on
//! every exit path.

use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::extract::{self, ExtractionResult, Matcher, Selection, Source};
use crate::session::{DebugSession, RunOutcome};
use crate::trace::ExecutionTrace;

/// The script as the child will load it
enum Materialized {
    File(PathBuf),
    /// Buffer written next to the script so relative requires still resolve
    Buffer(NamedTempFile),
}

impl Materialized {
    fn new(script: &Path, buffer: Option<&str>) -> Result<Self> {
        let Some(buffer) = buffer else {
            return Ok(Self::File(script.to_path_buf()));
        };

        let dir = match script.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let suffix = script
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_else(|| ".js".to_string());

        let file = tempfile::Builder::new()
            .prefix(".linetrace-")
            .suffix(&suffix)
            .tempfile_in(&dir)
            .map_err(|e| Error::script_read(script, format!("cannot write buffer copy: {}", e)))?;
        std::fs::write(file.path(), buffer)?;
        tracing::debug!(path = %file.path().display(), "Buffer materialized");
        Ok(Self::Buffer(file))
    }

    fn path(&self) -> &Path {
        match self {
            Self::File(path) => path,
            Self::Buffer(file) => file.path(),
        }
    }
}

/// Composes extraction and the debug session
pub struct Orchestrator {
    config: Config,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Trace every test whose title satisfies `test`
    pub async fn run_by_pattern(
        &self,
        script: &Path,
        buffer: Option<&str>,
        func: &Matcher,
        test: &Matcher,
    ) -> Result<ExecutionTrace> {
        self.run(script, buffer, func, &Selection::Matching(test.clone()))
            .await
    }

    /// Trace the test enclosing `line`
    pub async fn run_by_line(
        &self,
        script: &Path,
        buffer: Option<&str>,
        func: &Matcher,
        line: usize,
    ) -> Result<ExecutionTrace> {
        self.run(script, buffer, func, &Selection::Line(line)).await
    }

    /// Static extraction only; no child is started
    pub fn extract(
        &self,
        script: &Path,
        buffer: Option<&str>,
        func: &Matcher,
        selection: &Selection,
    ) -> Result<ExtractionResult> {
        self.guard(script)?;
        let source = read_source(script, buffer)?;
        Ok(extract::extract(&source, func, selection))
    }

    #[tracing::instrument(skip(self, buffer, func), fields(script = %script.display(), selection = %selection))]
    pub async fn run(
        &self,
        script: &Path,
        buffer: Option<&str>,
        func: &Matcher,
        selection: &Selection,
    ) -> Result<ExecutionTrace> {
        self.guard(script)?;
        let source = read_source(script, buffer)?;
        let extraction = extract::extract(&source, func, selection);
        if extraction.is_empty() {
            tracing::info!("Selection matches no test lines");
            return Ok(ExecutionTrace::empty());
        }
        let criterion = extraction
            .criterion
            .clone()
            .ok_or_else(|| Error::Internal("extraction produced lines without a criterion".to_string()))?;
        let lines = extraction.lines();
        let tests = extraction.tests.clone();
        tracing::info!(lines = lines.len(), tests = tests.len(), "Tracing");

        let materialized = Materialized::new(script, buffer)?;
        let outcome = {
            let mut session = DebugSession::new(
                self.config.clone(),
                materialized.path(),
                extraction,
                source.function_signatures(),
            )?;
            let outcome = drive(&mut session, &criterion, &lines).await;
            session.dispose();
            outcome
        };
        drop(materialized);

        let outcome = outcome?;
        Ok(ExecutionTrace::assemble(outcome.frames, tests, outcome.reports))
    }

    fn guard(&self, script: &Path) -> Result<()> {
        if self.config.is_reserved(script) {
            return Err(Error::SelfInstrumentation(script.display().to_string()));
        }
        Ok(())
    }
}

async fn drive(session: &mut DebugSession, criterion: &Matcher, lines: &[usize]) -> Result<RunOutcome> {
    session.start(criterion).await?;
    session.set_breakpoints(lines).await?;
    session.run().await
}

fn read_source(script: &Path, buffer: Option<&str>) -> Result<Source> {
    match buffer {
        Some(text) => Source::parse(text),
        None => Source::from_file(script),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "describe('a', function () {\n  it('a.1', function () {\n    let x = 1;\n  });\n});\n";

    /// Orchestrator that fails loudly if it ever tries to start a child
    fn offline() -> Orchestrator {
        let mut config = Config::default();
        config.node.path = PathBuf::from("/definitely/not/node");
        Orchestrator::new(config)
    }

    fn entries(dir: &Path) -> Vec<PathBuf> {
        let mut entries: Vec<_> = std::fs::read_dir(dir).unwrap().map(|e| e.unwrap().path()).collect();
        entries.sort();
        entries
    }

    #[tokio::test]
    async fn test_no_match_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("sample.spec.js");
        std::fs::write(&script, SAMPLE).unwrap();
        let before = entries(dir.path());

        let trace = offline()
            .run_by_pattern(&script, Some(SAMPLE), &Matcher::exact("it"), &Matcher::exact("nothing"))
            .await
            .unwrap();

        assert!(trace.is_empty());
        assert_eq!(entries(dir.path()), before);
    }

    #[tokio::test]
    async fn test_line_outside_tests_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("sample.spec.js");
        std::fs::write(&script, SAMPLE).unwrap();

        let trace = offline()
            .run_by_line(&script, None, &Matcher::exact("it"), 5)
            .await
            .unwrap();
        assert!(trace.is_empty());
    }

    #[tokio::test]
    async fn test_temp_file_removed_after_failed_session() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("sample.spec.js");
        std::fs::write(&script, SAMPLE).unwrap();
        let before = entries(dir.path());

        let err = offline()
            .run_by_pattern(&script, Some(SAMPLE), &Matcher::exact("it"), &Matcher::exact("a.1"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NodeNotFound(_)));
        assert_eq!(entries(dir.path()), before);
    }

    #[tokio::test]
    async fn test_reserved_script_is_rejected_before_reading() {
        let err = offline()
            .run_by_pattern(
                Path::new("/nowhere/linetrace.selftest.js"),
                None,
                &Matcher::exact("it"),
                &Matcher::exact("a.1"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SelfInstrumentation(_)));
    }

    #[tokio::test]
    async fn test_unparsable_buffer_is_an_input_error() {
        let err = offline()
            .run_by_pattern(
                Path::new("/nowhere/sample.spec.js"),
                Some("it('a', function () {\n"),
                &Matcher::exact("it"),
                &Matcher::exact("a"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ScriptParse { .. }));
    }

    #[test]
    fn test_extract_only() {
        let result = offline()
            .extract(
                Path::new("/nowhere/sample.spec.js"),
                Some(SAMPLE),
                &Matcher::exact("it"),
                &Selection::Line(3),
            )
            .unwrap();
        assert_eq!(result.owner_of(3), Some(2));
        assert_eq!(result.criterion, Some(Matcher::exact("a.1")));
    }

    #[test]
    fn test_missing_file() {
        let err = offline()
            .extract(
                Path::new("/nowhere/sample.spec.js"),
                None,
                &Matcher::exact("it"),
                &Selection::Line(3),
            )
            .unwrap_err();
        assert!(matches!(err, Error::ScriptRead { .. }));
    }
}
