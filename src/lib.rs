//! Edge Support Agent
//!
//! Turns a free-text customer query into a grounded answer about an
//! e-commerce order while independently auditing its own output quality:
//! - Classifies intent deterministically (no model in the loop)
//! - Verifies collected sales tax against a static county rate table
//! - Composes a context-grounded prompt for the generative service
//! - Scores the generated answer (faithfulness / adherence / groundedness /
//!   completeness) with attributed order fields
//! - Assembles an ordered execution trace for fire-and-forget telemetry
//!
//! PIPELINE:
//! CLASSIFY → LOOKUP → VERIFY TAX → COMPOSE → GENERATE → EVALUATE → TRACE

pub mod agent;
pub mod api;
pub mod classifier;
pub mod error;
pub mod evaluator;
pub mod gates;
pub mod gemini;
pub mod models;
pub mod prompt;
pub mod store;
pub mod tax;
pub mod telemetry;
pub mod trace;

pub use error::Result;

// Re-export common types
pub use classifier::{extract_order_id, IntentClassifier};
pub use models::*;
