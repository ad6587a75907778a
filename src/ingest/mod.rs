//! Bulk data ingestion: question banks and participant credentials.

pub mod participants;
pub mod questions;

pub use participants::{BulkRegistrationReport, RegisterOutcome, Registrar, RegistrationStatus};
pub use questions::{QuestionIngest, QuestionIngestReport, QuestionSources};
