pub mod analyzer;
pub mod cleaning;
pub mod coverage;
pub mod export;
pub mod labeler;
pub mod report;
pub mod results;
pub mod sources;
pub mod verify;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use analyzer::{AnalyzeOptions, AnalyzeOutcome, Analyzer, PendingOpinion, ResultSink, RunCounts};
pub use cleaning::{CleanStats, Cleaner};
pub use coverage::{coverage, Coverage};
pub use labeler::{LabelError, Labeler, LlmLabeler};
pub use report::{Filter, Report};
pub use results::{FileSink, ProgressStatus};
pub use verify::{verify, VerifyReport};
