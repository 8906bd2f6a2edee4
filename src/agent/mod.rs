//! Support agent pipeline
//!
//! Strictly sequential per request:
//! CLASSIFY → LOOKUP → VERIFY TAX → COMPOSE → GENERATE → EVALUATE → TRACE
//!
//! Each stage consumes the prior stage's output, so there is no internal
//! parallelism. The two external calls (order lookup, generative service)
//! are awaited inline; trace emission and tax-flag persistence are the
//! only detached side effects and never block the response path.

use crate::classifier::{extract_order_id, IntentClassifier};
use crate::evaluator::ResponseEvaluator;
use crate::gemini::{GenerativeService, APOLOGY_RESPONSE};
use crate::models::{SupportResponse, TaxCheck, TaxVerdict, TaxVerifiedFlag};
use crate::prompt::{PromptCompositor, SYSTEM_PROMPT};
use crate::store::OrderStore;
use crate::tax::TaxVerificationEngine;
use crate::telemetry::{emit_detached, TelemetrySink};
use crate::trace::{StepType, TraceAssembler};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Pipeline coordinator wiring the deterministic core to its collaborators.
pub struct SupportAgent {
    order_store: Arc<dyn OrderStore>,
    llm: Arc<dyn GenerativeService>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl SupportAgent {
    pub fn new(
        order_store: Arc<dyn OrderStore>,
        llm: Arc<dyn GenerativeService>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            order_store,
            llm,
            telemetry,
        }
    }

    /// Run one query through the full pipeline. Infallible once the
    /// transport gates have passed: every stage has a defined branch for
    /// absent orders and failed collaborators.
    pub async fn handle(&self, query: &str) -> SupportResponse {
        let start = Instant::now();
        let mut assembler = TraceAssembler::new(query);

        // === CLASSIFY ===
        let intent = IntentClassifier::classify(query);
        let order_id = extract_order_id(query);

        info!(
            intent = %intent,
            order_id = ?order_id,
            "support query received"
        );

        // === LOOKUP + VERIFY TAX (retriever step) ===
        let retrieval_start = Instant::now();
        let order = match &order_id {
            Some(id) => self.order_store.lookup(id).await,
            None => None,
        };
        let tax_check: Option<TaxCheck> =
            order.as_ref().map(TaxVerificationEngine::verify);

        let mut retriever_meta = serde_json::Map::new();
        retriever_meta.insert("order_found".to_string(), json!(order.is_some()));
        if let Some(tax) = &tax_check {
            retriever_meta.insert("tax_verdict".to_string(), json!(tax.verdict.as_str()));
        }
        assembler.record_step(
            StepType::Retriever,
            order_id.as_deref().unwrap_or(""),
            &order
                .as_ref()
                .map(|o| format!("order {} ({})", o.order_id, o.status))
                .unwrap_or_else(|| "not found".to_string()),
            retrieval_start.elapsed().as_millis() as u64,
            retriever_meta,
        );

        // === COMPOSE + GENERATE (llm step) ===
        let prompt =
            PromptCompositor::compose(intent, query, order.as_ref(), tax_check.as_ref());

        let llm_start = Instant::now();
        let response_text = match self.llm.complete(SYSTEM_PROMPT, &prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "generative service failed, returning apology");
                APOLOGY_RESPONSE.to_string()
            }
        };
        assembler.record_step(
            StepType::Llm,
            &prompt,
            &response_text,
            llm_start.elapsed().as_millis() as u64,
            serde_json::Map::new(),
        );

        // === EVALUATE (evaluator step) ===
        let eval_start = Instant::now();
        let eval = ResponseEvaluator::evaluate(
            intent,
            order.as_ref(),
            &response_text,
            tax_check.as_ref(),
        );
        assembler.record_step(
            StepType::Evaluator,
            &response_text,
            &serde_json::to_string(&eval).unwrap_or_default(),
            eval_start.elapsed().as_millis() as u64,
            serde_json::Map::new(),
        );

        // === TRACE ===
        let trace = assembler.finalize(
            intent,
            order_id.clone(),
            order.is_some(),
            tax_check.as_ref(),
            Some(eval),
            start.elapsed().as_millis() as u64,
        );

        emit_detached(self.telemetry.clone(), trace.flatten());
        self.persist_tax_flag_detached(&order_id, tax_check.as_ref());

        SupportResponse {
            query: query.to_string(),
            intent,
            order_id,
            order_found: order.is_some(),
            response: response_text,
            tax_check,
            trace,
        }
    }

    /// Best-effort write-back of the tax verdict onto the order record.
    /// Unknown counties stay unverified pending manual review.
    fn persist_tax_flag_detached(&self, order_id: &Option<String>, tax: Option<&TaxCheck>) {
        let (Some(order_id), Some(tax)) = (order_id, tax) else {
            return;
        };

        let flag = match tax.verdict {
            TaxVerdict::Correct | TaxVerdict::NotApplicable => TaxVerifiedFlag::Verified,
            TaxVerdict::Discrepancy => TaxVerifiedFlag::Discrepancy,
            TaxVerdict::UnknownCounty => return,
        };

        let store = self.order_store.clone();
        let order_id = order_id.clone();
        tokio::spawn(async move {
            if let Err(e) = store.mark_tax_verified(&order_id, flag).await {
                warn!(order_id = %order_id, error = %e, "tax flag persistence failed (ignored)");
            }
        });
    }
}
