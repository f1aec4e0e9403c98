//! Infrastructure layer: storage, forecasting and alerting services, notification
//! channels, config.
//!
//! Services are generic over [`store::RecordStore`] so the same code runs against
//! Postgres in production and the in-memory store in tests and demos.

pub mod ai;
pub mod alerts;
pub mod config;
pub mod error;
pub mod forecast;
pub mod notify;
pub mod projections;
pub mod seed;
pub mod store;

pub use ai::{ForecastRefreshRunner, ForecastRefreshRunnerHandle};
pub use alerts::{Alert, AlertEvaluator, AlertKind, Severity};
pub use config::{AppConfig, ConfigError};
pub use error::{ServiceError, ServiceResult};
pub use forecast::{ForecastService, RefreshSummary};
pub use notify::{Notification, NotificationDispatcher};
pub use projections::{ChartAggregator, ChartEntry};
pub use store::{InMemoryRecordStore, PostgresRecordStore, RecordStore, StoreError};
