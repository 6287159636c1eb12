//! Browser monitor for the patient intake platform.
//!
//! Watches the third-party booking site through Chrome DevTools, ties form
//! submissions to the EMR ids that appear in its network traffic and reports
//! patients and their status changes to the intake API.

pub mod browser;
pub mod client;
pub mod config;
pub mod correlator;
pub mod events;
pub mod extract;
pub mod normalize;
pub mod runner;

pub use client::{ApiClient, ClientError, IntakeApi, PatientPayload};
pub use config::MonitorConfig;
pub use correlator::Correlator;
pub use events::{BrowserEvent, MatchKind, MonitorEvent, PendingSubmission};
pub use runner::{run, Monitor};
