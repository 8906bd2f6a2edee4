//! Prompt compositor
//!
//! Builds the instruction text handed to the generative service. Pure
//! string construction, no external calls. The anti-hallucination contract
//! is structural: the model is told to answer only from the context block,
//! and the compositor never fabricates data outside it.

use crate::models::{Intent, Order, TaxCheck, TaxVerdict};
use std::fmt::Write;

/// System prompt sent alongside every composed instruction.
pub const SYSTEM_PROMPT: &str = "You are a customer support agent for an outdoor gear storefront.\n\
\n\
Guidelines:\n\
- Answer only from the ORDER CONTEXT block when one is provided\n\
- Never invent tracking numbers, dates, or amounts\n\
- Be concise, courteous, and concrete\n\
- If information is missing from the context, say so and ask for it";

/// Final instruction line, selected by intent. Fixed table; the exhaustive
/// match means a new intent variant fails to compile until routed here.
fn instruction_for(intent: Intent) -> &'static str {
    match intent {
        Intent::OrderStatus => {
            "Answer the customer's question about the current status of this order."
        }
        Intent::OrderReturn => {
            "Answer the customer's return question using the return-eligibility information above."
        }
        Intent::OrderItems => {
            "Answer the customer's question about the items in this order using the item list above."
        }
        Intent::ShippingEstimate => {
            "Answer the customer's delivery question using the carrier, tracking, and estimated delivery above."
        }
        Intent::TaxInquiry => {
            "Answer the customer's tax question using the tax verification notes above. Be transparent about any discrepancy."
        }
        Intent::GeneralFaq => {
            "Answer the customer's general question. If it is about a specific order, ask for the order number."
        }
        Intent::Unknown => {
            "Answer as helpfully as possible and ask a clarifying question if the request is unclear."
        }
    }
}

/// Tax annotation block, selected by verdict. Five distinct templates.
fn tax_annotation(tax: &TaxCheck) -> String {
    match tax.verdict {
        TaxVerdict::NotApplicable => {
            "TAX VERIFICATION: No sales tax applies to this order's shipping region, and none was collected."
                .to_string()
        }
        TaxVerdict::Discrepancy if !tax.applicable => format!(
            "TAX VERIFICATION: No sales tax applies to this order's shipping region, but ${:.2} was collected. \
             This amount should be refunded to the customer.",
            tax.collected_tax
        ),
        TaxVerdict::Discrepancy => {
            let direction = if tax.discrepancy > 0.0 {
                "overcharged"
            } else {
                "undercharged"
            };
            format!(
                "TAX VERIFICATION: Expected tax ${:.2} at a combined rate of {:.2}%, but ${:.2} was collected. \
                 The customer was {} by ${:.2} ({:.2}%).",
                tax.expected_tax,
                tax.expected_rate * 100.0,
                tax.collected_tax,
                direction,
                tax.discrepancy.abs(),
                tax.discrepancy_pct
            )
        }
        TaxVerdict::Correct => format!(
            "TAX VERIFICATION: The collected tax of ${:.2} matches the expected amount at a combined rate of {:.2}%.",
            tax.collected_tax,
            tax.expected_rate * 100.0
        ),
        TaxVerdict::UnknownCounty => {
            "TAX VERIFICATION: The order's county is not in the rate table, so the tax could not be verified. \
             Tell the customer the tax amount is under manual review."
                .to_string()
        }
    }
}

/// Prompt compositor
pub struct PromptCompositor;

impl PromptCompositor {
    /// Compose the user-facing instruction text for the generative service.
    pub fn compose(
        intent: Intent,
        query: &str,
        order: Option<&Order>,
        tax: Option<&TaxCheck>,
    ) -> String {
        let Some(order) = order else {
            return Self::compose_no_order(query);
        };

        let mut out = String::new();

        out.push_str("ORDER CONTEXT (answer only from this block):\n");
        let _ = writeln!(out, "- Order ID: {}", order.order_id);
        let _ = writeln!(out, "- Customer: {}", order.customer_name);
        let _ = writeln!(out, "- Region: {}, {} County", order.state, order.county);
        let _ = writeln!(out, "- Status: {}", order.status);
        let _ = writeln!(
            out,
            "- Carrier: {}",
            order.carrier.as_deref().unwrap_or("not assigned")
        );
        let _ = writeln!(
            out,
            "- Tracking: {}",
            order.tracking_number.as_deref().unwrap_or("not available")
        );
        let _ = writeln!(
            out,
            "- Estimated delivery: {}",
            order.estimated_delivery.as_deref().unwrap_or("not available")
        );

        // An empty or unparseable item list renders as an empty
        // itemization; composition never aborts on it.
        out.push_str("- Items:\n");
        for item in &order.items {
            let _ = writeln!(out, "    * {} x{} (SKU {})", item.name, item.quantity, item.sku);
        }

        if order.return_eligible {
            out.push_str("- This order is eligible for return.\n");
        } else {
            out.push_str("- This order is not eligible for return.\n");
        }

        let _ = writeln!(out, "- Subtotal: ${:.2}", order.subtotal);
        let _ = writeln!(out, "- Tax collected: ${:.2}", order.tax_collected);
        let _ = writeln!(out, "- Placed on: {}", order.created_at.format("%Y-%m-%d"));

        if let Some(tax) = tax {
            out.push('\n');
            out.push_str(&tax_annotation(tax));
            out.push('\n');
        }

        let _ = writeln!(out, "\nCUSTOMER QUERY: {}", query);
        out.push_str(instruction_for(intent));

        out
    }

    fn compose_no_order(query: &str) -> String {
        match crate::classifier::extract_order_id(query) {
            Some(order_id) => format!(
                "The customer referenced order {} but no matching order exists.\n\
                 \n\
                 CUSTOMER QUERY: {}\n\
                 Tell the customer the order number could not be found and ask them to \
                 double-check it against their confirmation email.",
                order_id, query
            ),
            None => format!(
                "No order was referenced in this query.\n\
                 \n\
                 CUSTOMER QUERY: {}\n\
                 Answer as a general storefront question. If the request is about a \
                 specific order, ask the customer for their order number.",
                query
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LineItem, TaxVerifiedFlag};
    use crate::tax::TaxVerificationEngine;
    use chrono::Utc;

    fn sample_order() -> Order {
        Order {
            order_id: "CERT-123456".to_string(),
            customer_name: "Jordan Li".to_string(),
            state: "NC".to_string(),
            county: "Wake".to_string(),
            status: "shipped".to_string(),
            tracking_number: Some("9400111899560001".to_string()),
            carrier: Some("USPS".to_string()),
            estimated_delivery: Some("2026-09-01".to_string()),
            items: vec![LineItem {
                name: "Trail Stove".to_string(),
                quantity: 1,
                sku: "STV-220".to_string(),
            }],
            return_eligible: true,
            subtotal: 189.99,
            tax_rate: 0.0725,
            tax_collected: 13.77,
            tax_verified: TaxVerifiedFlag::Unverified,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_order_context_block() {
        let order = sample_order();
        let tax = TaxVerificationEngine::verify(&order);
        let prompt = PromptCompositor::compose(
            Intent::OrderStatus,
            "where is my order",
            Some(&order),
            Some(&tax),
        );

        assert!(prompt.contains("ORDER CONTEXT"));
        assert!(prompt.contains("CERT-123456"));
        assert!(prompt.contains("Jordan Li"));
        assert!(prompt.contains("Trail Stove x1 (SKU STV-220)"));
        assert!(prompt.contains("eligible for return"));
        assert!(prompt.contains("$189.99"));
        assert!(prompt.contains("matches the expected amount"));
        assert!(prompt.contains("current status"));
    }

    #[test]
    fn test_discrepancy_annotation_direction() {
        let mut order = sample_order();
        order.county = "Durham".to_string();
        order.subtotal = 212.75;
        order.tax_collected = 13.83;
        let tax = TaxVerificationEngine::verify(&order);
        let prompt =
            PromptCompositor::compose(Intent::TaxInquiry, "was my tax right", Some(&order), Some(&tax));

        assert!(prompt.contains("undercharged"));
        assert!(prompt.contains("$15.96"));
    }

    #[test]
    fn test_non_taxable_but_charged_annotation() {
        let mut order = sample_order();
        order.state = "CA".to_string();
        order.tax_collected = 11.53;
        let tax = TaxVerificationEngine::verify(&order);
        let prompt =
            PromptCompositor::compose(Intent::TaxInquiry, "why was I taxed", Some(&order), Some(&tax));

        assert!(prompt.contains("should be refunded"));
        assert!(prompt.contains("$11.53"));
    }

    #[test]
    fn test_order_not_found_branch() {
        let prompt = PromptCompositor::compose(
            Intent::OrderStatus,
            "where is CERT-999999",
            None,
            None,
        );
        assert!(prompt.contains("CERT-999999"));
        assert!(prompt.contains("could not be found"));
    }

    #[test]
    fn test_general_help_branch() {
        let prompt =
            PromptCompositor::compose(Intent::GeneralFaq, "do you ship internationally", None, None);
        assert!(prompt.contains("No order was referenced"));
        assert!(prompt.contains("ask the customer for their order number"));
    }

    #[test]
    fn test_empty_item_list_never_errors() {
        let mut order = sample_order();
        order.items = vec![];
        let tax = TaxVerificationEngine::verify(&order);
        let prompt =
            PromptCompositor::compose(Intent::OrderItems, "what did I buy", Some(&order), Some(&tax));
        assert!(prompt.contains("- Items:"));
    }
}
