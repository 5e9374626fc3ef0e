pub mod orchestrator;
pub mod report;

pub use orchestrator::{
    analyze_from_source, fetch_many, fetch_pair, AnalyticsOrchestrator, AnalyticsRequest,
    OrchestratorError, OrchestratorSettings,
};
pub use report::{AnalyticsReport, ErrorReport, ReportSection};
