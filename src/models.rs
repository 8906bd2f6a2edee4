//! Core data models for the edge support agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Intent =================
//

/// Customer-query intent. Classification is total: every query resolves
/// to exactly one variant (defaulting to GeneralFaq).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    OrderStatus,
    OrderReturn,
    OrderItems,
    ShippingEstimate,
    TaxInquiry,
    GeneralFaq,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::OrderStatus => "order_status",
            Intent::OrderReturn => "order_return",
            Intent::OrderItems => "order_items",
            Intent::ShippingEstimate => "shipping_estimate",
            Intent::TaxInquiry => "tax_inquiry",
            Intent::GeneralFaq => "general_faq",
            Intent::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//
// ================= Order =================
//

/// Tri-state tax-verification flag stored on the order record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaxVerifiedFlag {
    Unverified,
    Verified,
    Discrepancy,
}

impl TaxVerifiedFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxVerifiedFlag::Unverified => "unverified",
            TaxVerifiedFlag::Verified => "verified",
            TaxVerifiedFlag::Discrepancy => "discrepancy",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    pub sku: String,
}

/// Order record owned by the external datastore; read-only to the core.
///
/// Invariant: subtotal and tax_collected are non-negative monetary
/// amounts with 2-decimal precision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub customer_name: String,
    pub state: String,
    pub county: String,
    pub status: String,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub estimated_delivery: Option<String>,
    pub items: Vec<LineItem>,
    pub return_eligible: bool,
    pub subtotal: f64,
    pub tax_rate: f64,
    pub tax_collected: f64,
    pub tax_verified: TaxVerifiedFlag,
    pub created_at: DateTime<Utc>,
}

//
// ================= Tax Verification =================
//

/// Categorical judgment of an order's tax correctness.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaxVerdict {
    Correct,
    Discrepancy,
    NotApplicable,
    UnknownCounty,
}

impl TaxVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxVerdict::Correct => "correct",
            TaxVerdict::Discrepancy => "discrepancy",
            TaxVerdict::NotApplicable => "not_applicable",
            TaxVerdict::UnknownCounty => "unknown_county",
        }
    }
}

impl fmt::Display for TaxVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of verifying one order's collected tax against the rate table.
/// Created once per order per request; never persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxCheck {
    pub applicable: bool,
    pub expected_rate: f64,
    pub expected_tax: f64,
    pub collected_tax: f64,
    pub discrepancy: f64,
    pub discrepancy_pct: f64,
    pub verdict: TaxVerdict,
    pub county_rate_used: Option<f64>,
}

//
// ================= Evaluation =================
//

/// Quantitative response-quality scores, each in [0.0, 1.0].
///
/// The four scores are deliberately independent: each captures a distinct
/// failure mode (fabrication, scope drift, unsupported claims, truncation).
/// They are never blended into one number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub faithfulness: f64,
    pub context_adherence: f64,
    pub groundedness: f64,
    pub completeness: f64,
    /// Ordered, de-duplicated order-field names detected in the response.
    pub attributed_fields: Vec<String>,
}

//
// ================= Pipeline Result =================
//

/// Complete per-request output handed to the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportResponse {
    pub query: String,
    pub intent: Intent,
    pub order_id: Option<String>,
    pub order_found: bool,
    pub response: String,
    pub tax_check: Option<TaxCheck>,
    pub trace: crate::trace::Trace,
}
