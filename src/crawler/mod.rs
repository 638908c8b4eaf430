pub mod controller;
pub mod ledger;
pub mod runner;
pub mod scheduler;
pub mod task;
pub mod validator;

// Re-export common types
pub use controller::CrawlerController;
pub use ledger::{UrlPolicy, VisitLedger};
pub use runner::Runner;
pub use scheduler::LinkClassifier;
pub use task::{CrawlReport, CrawlRequest, CrawlStatus, CrawlTask, PageFailure, PageRecord};
pub use validator::{validate, ValidatedRequest};
