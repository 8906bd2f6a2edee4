//! Tax verification engine
//!
//! Rules-based verification of the sales tax collected on an order against
//! a static county rate table. Deterministic enforcement; the verifier is
//! total, so unknown inputs degrade to an explicit verdict instead of
//! erroring and downstream consumers can key off `verdict` exhaustively.

use crate::models::{Order, TaxCheck, TaxVerdict};
use lazy_static::lazy_static;
use std::collections::HashMap;
use tracing::debug;

/// The only state this storefront collects sales tax for.
pub const TAXABLE_STATE: &str = "NC";

/// Statewide base rate; county increments stack on top of it.
pub const STATE_BASE_RATE: f64 = 0.0475;

/// One-cent tolerance absorbs floating rounding on both sides.
const DISCREPANCY_TOLERANCE: f64 = 0.01;

lazy_static! {
    /// County → incremental rate on top of the state base rate.
    /// Immutable configuration loaded once at process start; keys are
    /// normalized (lowercase, whitespace stripped).
    static ref COUNTY_RATES: HashMap<&'static str, f64> = {
        let mut m = HashMap::new();
        m.insert("wake", 0.0250);
        m.insert("durham", 0.0275);
        m.insert("orange", 0.0275);
        m.insert("mecklenburg", 0.0250);
        m.insert("cumberland", 0.0250);
        m.insert("alamance", 0.0250);
        m.insert("guilford", 0.0225);
        m.insert("forsyth", 0.0225);
        m.insert("buncombe", 0.0225);
        m.insert("newhanover", 0.0225);
        m
    };
}

/// Round to the cent with standard half-up rounding. A small nudge toward
/// the boundary absorbs binary-representation noise so that amounts like
/// 15.95625 land on 15.96 rather than falling a hair short.
pub fn round2(value: f64) -> f64 {
    let cents = value * 100.0;
    let nudged = cents + 1e-7_f64.copysign(cents);
    nudged.round() / 100.0
}

fn normalize_state(state: &str) -> String {
    state.trim().to_uppercase()
}

fn normalize_county(county: &str) -> String {
    county
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<String>()
}

/// Tax verification engine
pub struct TaxVerificationEngine;

impl TaxVerificationEngine {
    /// Verify the tax collected on an order. Total over any order record.
    ///
    /// Three failure-safe branches: non-taxable region, unknown county,
    /// known county.
    pub fn verify(order: &Order) -> TaxCheck {
        let state = normalize_state(&order.state);
        let collected = order.tax_collected;

        if state != TAXABLE_STATE {
            // Tax collected where none should be is itself a discrepancy;
            // the discrepancy carries the full collected amount (sign and
            // magnitude convention relied on by trace consumers).
            let (verdict, discrepancy) = if collected > 0.0 {
                (TaxVerdict::Discrepancy, collected)
            } else {
                (TaxVerdict::NotApplicable, 0.0)
            };

            debug!(
                order_id = %order.order_id,
                state = %state,
                verdict = %verdict,
                "tax check: non-taxable region"
            );

            return TaxCheck {
                applicable: false,
                expected_rate: 0.0,
                expected_tax: 0.0,
                collected_tax: collected,
                discrepancy,
                discrepancy_pct: 0.0,
                verdict,
                county_rate_used: None,
            };
        }

        let county = normalize_county(&order.county);

        let Some(&county_rate) = COUNTY_RATES.get(county.as_str()) else {
            // Unresolved pending manual review: discrepancy is explicitly
            // not computed, not merely zero-valued.
            debug!(
                order_id = %order.order_id,
                county = %county,
                "tax check: county not in rate table"
            );

            return TaxCheck {
                applicable: true,
                expected_rate: 0.0,
                expected_tax: 0.0,
                collected_tax: collected,
                discrepancy: 0.0,
                discrepancy_pct: 0.0,
                verdict: TaxVerdict::UnknownCounty,
                county_rate_used: None,
            };
        };

        let total_rate = STATE_BASE_RATE + county_rate;
        let expected_tax = round2(order.subtotal * total_rate);
        let discrepancy = round2(collected - expected_tax);
        let discrepancy_pct = if expected_tax > 0.0 {
            round2(discrepancy.abs() / expected_tax * 100.0)
        } else {
            0.0
        };

        let verdict = if discrepancy.abs() < DISCREPANCY_TOLERANCE {
            TaxVerdict::Correct
        } else {
            TaxVerdict::Discrepancy
        };

        debug!(
            order_id = %order.order_id,
            expected_tax = expected_tax,
            collected_tax = collected,
            verdict = %verdict,
            "tax check complete"
        );

        TaxCheck {
            applicable: true,
            expected_rate: total_rate,
            expected_tax,
            collected_tax: collected,
            discrepancy,
            discrepancy_pct,
            verdict,
            county_rate_used: Some(county_rate),
        }
    }
}
