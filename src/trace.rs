//! The result of a traced run

use serde::Serialize;

use crate::extract::TestDescriptor;
use crate::report::TestReport;
use crate::session::FrameLog;

/// A selected test with its outcome, if the framework reported one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TracedTest {
    pub title: String,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<TestReport>,
}

/// Frames by line plus the tests that produced them
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTrace {
    pub frames: FrameLog,
    pub tests: Vec<TracedTest>,
    /// Reports whose title matches no selected test (hooks, tests outside
    /// the selection that the grep still ran)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmatched_reports: Vec<TestReport>,
}

impl ExecutionTrace {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge reports into descriptors by exact title
    ///
    /// A report is attached to every descriptor sharing its title. When a
    /// title was reported more than once the last report wins.
    pub fn assemble(frames: FrameLog, tests: Vec<TestDescriptor>, reports: Vec<TestReport>) -> Self {
        let mut traced: Vec<TracedTest> = tests
            .into_iter()
            .map(|test| TracedTest {
                title: test.title,
                line: test.line,
                report: None,
            })
            .collect();

        let mut unmatched_reports = Vec::new();
        for report in reports {
            let mut matched = false;
            for test in traced.iter_mut().filter(|t| t.title == report.title) {
                test.report = Some(report.clone());
                matched = true;
            }
            if !matched {
                unmatched_reports.push(report);
            }
        }

        Self {
            frames,
            tests: traced,
            unmatched_reports,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && self.tests.is_empty() && self.unmatched_reports.is_empty()
    }

    pub fn test(&self, title: &str) -> Option<&TracedTest> {
        self.tests.iter().find(|t| t.title == title)
    }
}
