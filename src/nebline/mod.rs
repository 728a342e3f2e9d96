pub mod config;
pub mod insights;
pub mod json_recovery;
pub mod project;
pub mod registry;
pub mod router;
pub mod types;
