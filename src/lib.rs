pub mod analyze;
pub mod capture;
pub mod crawl;
pub mod error;
pub mod report;
pub mod run;
pub mod sink;

pub use error::Error;
