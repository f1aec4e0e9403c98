//! Low-stock and demand-surge alerting.

mod evaluator;
mod model;
pub mod rules;

pub use evaluator::{AlertEvaluator, DEFAULT_ACTIVE_ALERTS_LIMIT};
pub use model::{Alert, AlertDraft, AlertKind, Severity};
