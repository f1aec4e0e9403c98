//! SmartStock service wiring: one store, one set of services, one refresh runner.

pub mod app;
