//! Execution trace assembly
//!
//! One ChainStep per pipeline stage, collected into an ordered Trace for
//! the telemetry sink. The assembler is consumed by finalization, so a
//! trace can never grow after it has been handed off.

use crate::models::{EvalMetrics, Intent, TaxCheck, TaxVerdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

//
// ================= Chain Steps =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Retriever,
    Llm,
    Evaluator,
}

impl StepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepType::Retriever => "retriever",
            StepType::Llm => "llm",
            StepType::Evaluator => "evaluator",
        }
    }
}

/// One timed stage of the reasoning pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainStep {
    pub step_id: Uuid,
    pub step_type: StepType,
    pub input: String,
    pub output: String,
    pub latency_ms: u64,
    pub token_estimate: u32,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Rough token count: four characters per token, rounded up.
pub fn estimate_tokens(char_count: usize) -> u32 {
    char_count.div_ceil(4) as u32
}

//
// ================= Trace =================
//

/// Ordered execution record for one request. Finalized once; never
/// mutated after being handed to the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub chain_id: Uuid,
    /// Coarse, date-bucketed run identifier.
    pub run_id: String,
    pub query: String,
    pub intent: Intent,
    pub order_id: Option<String>,
    pub order_found: bool,
    pub tax_verdict: Option<TaxVerdict>,
    pub tax_discrepancy: Option<f64>,
    pub steps: Vec<ChainStep>,
    pub total_latency_ms: u64,
    pub eval: Option<EvalMetrics>,
    pub created_at: DateTime<Utc>,
}

/// Flattened wire shape accepted by the telemetry sink: string fields,
/// numeric fields, one indexed correlation key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatTrace {
    pub correlation_key: String,
    pub string_fields: BTreeMap<String, String>,
    pub numeric_fields: BTreeMap<String, f64>,
}

impl Trace {
    pub fn flatten(&self) -> FlatTrace {
        let mut string_fields = BTreeMap::new();
        let mut numeric_fields = BTreeMap::new();

        string_fields.insert("run_id".to_string(), self.run_id.clone());
        string_fields.insert("query".to_string(), self.query.clone());
        string_fields.insert("intent".to_string(), self.intent.to_string());
        string_fields.insert(
            "order_id".to_string(),
            self.order_id.clone().unwrap_or_default(),
        );
        string_fields.insert("order_found".to_string(), self.order_found.to_string());
        if let Some(verdict) = self.tax_verdict {
            string_fields.insert("tax_verdict".to_string(), verdict.to_string());
        }

        numeric_fields.insert("total_latency_ms".to_string(), self.total_latency_ms as f64);
        numeric_fields.insert("step_count".to_string(), self.steps.len() as f64);
        if let Some(discrepancy) = self.tax_discrepancy {
            numeric_fields.insert("tax_discrepancy".to_string(), discrepancy);
        }
        if let Some(eval) = &self.eval {
            numeric_fields.insert("faithfulness".to_string(), eval.faithfulness);
            numeric_fields.insert("context_adherence".to_string(), eval.context_adherence);
            numeric_fields.insert("groundedness".to_string(), eval.groundedness);
            numeric_fields.insert("completeness".to_string(), eval.completeness);
            numeric_fields.insert(
                "attributed_field_count".to_string(),
                eval.attributed_fields.len() as f64,
            );
        }

        FlatTrace {
            correlation_key: self.chain_id.to_string(),
            string_fields,
            numeric_fields,
        }
    }
}

//
// ================= Assembler =================
//

/// Incremental trace builder for one request. `finalize` consumes the
/// assembler, which is what makes the finished trace immutable by
/// construction.
pub struct TraceAssembler {
    chain_id: Uuid,
    query: String,
    steps: Vec<ChainStep>,
    started_at: DateTime<Utc>,
}

impl TraceAssembler {
    pub fn new(query: &str) -> Self {
        Self {
            chain_id: Uuid::new_v4(),
            query: query.to_string(),
            steps: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn chain_id(&self) -> Uuid {
        self.chain_id
    }

    /// Record one pipeline stage.
    pub fn record_step(
        &mut self,
        step_type: StepType,
        input: &str,
        output: &str,
        latency_ms: u64,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) {
        self.steps.push(ChainStep {
            step_id: Uuid::new_v4(),
            step_type,
            input: input.to_string(),
            output: output.to_string(),
            latency_ms,
            token_estimate: estimate_tokens(input.chars().count() + output.chars().count()),
            metadata,
        });
    }

    /// Aggregate into the final record. Pure aggregation: no step may be
    /// added afterwards.
    pub fn finalize(
        self,
        intent: Intent,
        order_id: Option<String>,
        order_found: bool,
        tax: Option<&TaxCheck>,
        eval: Option<EvalMetrics>,
        total_latency_ms: u64,
    ) -> Trace {
        Trace {
            chain_id: self.chain_id,
            run_id: format!("support-agent-{}", self.started_at.format("%Y-%m-%d")),
            query: self.query,
            intent,
            order_id,
            order_found,
            tax_verdict: tax.map(|t| t.verdict),
            tax_discrepancy: tax.map(|t| t.discrepancy),
            steps: self.steps,
            total_latency_ms,
            eval,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(0), 0);
        assert_eq!(estimate_tokens(1), 1);
        assert_eq!(estimate_tokens(4), 1);
        assert_eq!(estimate_tokens(5), 2);
        assert_eq!(estimate_tokens(400), 100);
    }

    #[test]
    fn test_token_estimate_counts_characters_not_bytes() {
        let mut assembler = TraceAssembler::new("hola");
        // "café" is 4 characters (5 bytes): one token, not two.
        assembler.record_step(StepType::Llm, "café", "", 1, serde_json::Map::new());
        let trace = assembler.finalize(Intent::GeneralFaq, None, false, None, None, 1);
        assert_eq!(trace.steps[0].token_estimate, 1);
    }

    #[test]
    fn test_assembler_preserves_step_order() {
        let mut assembler = TraceAssembler::new("where is CERT-123456");
        assembler.record_step(
            StepType::Retriever,
            "CERT-123456",
            "order found",
            3,
            serde_json::Map::new(),
        );
        assembler.record_step(StepType::Llm, "prompt", "answer", 120, serde_json::Map::new());
        assembler.record_step(
            StepType::Evaluator,
            "answer",
            "{\"faithfulness\":0.95}",
            1,
            serde_json::Map::new(),
        );

        let trace = assembler.finalize(
            Intent::OrderStatus,
            Some("CERT-123456".to_string()),
            true,
            None,
            None,
            130,
        );

        let kinds: Vec<StepType> = trace.steps.iter().map(|s| s.step_type).collect();
        assert_eq!(kinds, vec![StepType::Retriever, StepType::Llm, StepType::Evaluator]);
        assert!(trace.run_id.starts_with("support-agent-"));
        assert_eq!(trace.total_latency_ms, 130);
    }

    #[test]
    fn test_flatten_carries_eval_and_correlation_key() {
        let assembler = TraceAssembler::new("any tax due?");
        let chain_id = assembler.chain_id();
        let trace = assembler.finalize(
            Intent::TaxInquiry,
            None,
            false,
            None,
            Some(EvalMetrics {
                faithfulness: 0.9,
                context_adherence: 1.0,
                groundedness: 0.5,
                completeness: 0.8,
                attributed_fields: vec![],
            }),
            42,
        );

        let flat = trace.flatten();
        assert_eq!(flat.correlation_key, chain_id.to_string());
        assert_eq!(flat.string_fields.get("intent").unwrap(), "tax_inquiry");
        assert_eq!(*flat.numeric_fields.get("faithfulness").unwrap(), 0.9);
        assert_eq!(*flat.numeric_fields.get("total_latency_ms").unwrap(), 42.0);
    }
}
