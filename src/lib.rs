pub mod parser;
pub mod report;
pub mod runner;
pub mod utils;

// Re-export common items
pub use parser::load_catalog;
pub use report::generate_report;
pub use runner::run_tests;
