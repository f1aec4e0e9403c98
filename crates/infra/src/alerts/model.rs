use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use smartstock_core::{AlertId, ProductId};
use smartstock_inventory::Product;

/// Which rule raised an alert. At most one unresolved alert exists per
/// `(product, kind)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowStock,
    DemandSurge,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::LowStock => "low_stock",
            AlertKind::DemandSurge => "demand_surge",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low_stock" => Some(AlertKind::LowStock),
            "demand_surge" => Some(AlertKind::DemandSurge),
            _ => None,
        }
    }
}

impl core::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Severity::Info),
            "warning" => Some(Severity::Warning),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule's verdict before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertDraft {
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
}

/// A persisted alert.
///
/// Created only by the evaluator; the only mutation is `resolved: false → true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub product_id: ProductId,
    pub product_name: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
}

impl Alert {
    pub fn open(product: &Product, draft: AlertDraft, at: DateTime<Utc>) -> Self {
        Self {
            id: AlertId::new(),
            product_id: product.id,
            product_name: product.name.clone(),
            kind: draft.kind,
            severity: draft.severity,
            message: draft.message,
            created_at: at,
            resolved: false,
        }
    }
}
