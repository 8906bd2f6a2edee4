//! Intent Classifier
//!
//! Maps a free-text customer query to exactly one support intent.
//! Total function: every input resolves, defaulting to GeneralFaq.
//!
//! Precedence is first-match-wins and the order of checks is load-bearing:
//! tax vocabulary is evaluated before order-id detection, so a tax question
//! that also contains an order id still classifies as TaxInquiry.

use crate::models::Intent;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Matches tax / taxes / taxed on word boundaries, so "taxi" or
    /// "syntax" never trip the tax branch. The multi-word phrases
    /// (tax rate, tax amount, tax charge, sales tax) all contain a
    /// standalone "tax" token and are covered by the same pattern.
    static ref TAX_RE: Regex = Regex::new(r"(?i)\btax(?:es|ed)?\b").unwrap();

    /// Order identifier: literal CERT- prefix plus exactly six digits.
    static ref ORDER_ID_RE: Regex = Regex::new(r"(?i)\bCERT-\d{6}\b").unwrap();
}

/// Static keyword lists — zero allocation
const RETURN_KEYWORDS: &[&str] = &["return", "refund", "rma", "exchange"];

const ITEM_KEYWORDS: &[&str] = &["item", "product", "contents", "kit", "gear"];

const SHIPPING_KEYWORDS: &[&str] = &["delivery", "arrival", "eta", "ship", "transit"];

/// Extract the first order identifier from a query, normalized to
/// uppercase. Idempotent and side-effect-free; reused by the classifier,
/// the pipeline and the API layer.
pub fn extract_order_id(query: &str) -> Option<String> {
    ORDER_ID_RE
        .find(query)
        .map(|m| m.as_str().to_uppercase())
}

/// Intent classifier
pub struct IntentClassifier;

impl IntentClassifier {
    /// Classify a customer query into a support intent.
    pub fn classify(query: &str) -> Intent {
        let lowered = query.to_lowercase();

        // 1. Tax vocabulary wins over everything, including order ids.
        if TAX_RE.is_match(query) {
            return Intent::TaxInquiry;
        }

        // 2. Order id present: sub-classify by vocabulary.
        if ORDER_ID_RE.is_match(query) {
            if contains_any(&lowered, RETURN_KEYWORDS) {
                return Intent::OrderReturn;
            }
            if contains_any(&lowered, ITEM_KEYWORDS) {
                return Intent::OrderItems;
            }
            if contains_any(&lowered, SHIPPING_KEYWORDS) {
                return Intent::ShippingEstimate;
            }
            return Intent::OrderStatus;
        }

        // 3. / 4. Vocabulary-only fallbacks without an order id.
        if contains_any(&lowered, RETURN_KEYWORDS) {
            return Intent::OrderReturn;
        }
        if contains_any(&lowered, SHIPPING_KEYWORDS) {
            return Intent::ShippingEstimate;
        }

        // 5. Default.
        Intent::GeneralFaq
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_precedence_over_order_id() {
        // Tax vocabulary outranks the order-id branch.
        let intent = IntentClassifier::classify(
            "Where is my CERT-123456 package, did you charge me the right tax?",
        );
        assert_eq!(intent, Intent::TaxInquiry);
    }

    #[test]
    fn test_tax_variants() {
        for q in [
            "why was I taxed so much",
            "what taxes apply here",
            "is the sales tax correct on CERT-000001",
            "explain the tax rate you used",
        ] {
            assert_eq!(IntentClassifier::classify(q), Intent::TaxInquiry);
        }
    }

    #[test]
    fn test_taxi_does_not_trip_tax_branch() {
        assert_eq!(
            IntentClassifier::classify("the taxi driver lost my package"),
            Intent::GeneralFaq
        );
    }

    #[test]
    fn test_order_id_subclassification() {
        let cases = vec![
            ("I want to return CERT-123456", Intent::OrderReturn),
            ("refund for cert-123456 please", Intent::OrderReturn),
            ("what items are in CERT-555123", Intent::OrderItems),
            ("what gear came with CERT-555123", Intent::OrderItems),
            ("when is delivery for CERT-987654", Intent::ShippingEstimate),
            ("CERT-987654 eta?", Intent::ShippingEstimate),
            ("status of CERT-111222", Intent::OrderStatus),
            ("CERT-111222", Intent::OrderStatus),
        ];

        for (query, expected) in cases {
            assert_eq!(IntentClassifier::classify(query), expected, "{}", query);
        }
    }

    #[test]
    fn test_vocabulary_without_order_id() {
        assert_eq!(
            IntentClassifier::classify("how do I start a return"),
            Intent::OrderReturn
        );
        assert_eq!(
            IntentClassifier::classify("how long does shipping take"),
            Intent::ShippingEstimate
        );
        assert_eq!(
            IntentClassifier::classify("do you sell gift cards"),
            Intent::GeneralFaq
        );
    }

    #[test]
    fn test_classification_is_total_and_idempotent() {
        for q in ["", "   ", "!!!", "hello", "CERT-12345", "cert-1234567890"] {
            let first = IntentClassifier::classify(q);
            let second = IntentClassifier::classify(q);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_extract_order_id() {
        assert_eq!(
            extract_order_id("where is cert-123456 right now"),
            Some("CERT-123456".to_string())
        );
        assert_eq!(extract_order_id("no id here"), None);
        assert_eq!(extract_order_id("CERT-12345"), None);

        // Idempotent: extracting from the extracted id yields itself.
        let id = extract_order_id("check CERT-654321 please").unwrap();
        assert_eq!(extract_order_id(&id), Some(id.clone()));
    }

    #[test]
    fn test_extract_order_id_first_match() {
        assert_eq!(
            extract_order_id("CERT-111111 and CERT-222222"),
            Some("CERT-111111".to_string())
        );
    }
}
