//! One-shot CLI runner: pushes a single query through the full pipeline
//! and prints the response plus the evaluation scores. Useful for demoing
//! the deterministic core without standing up the HTTP server.

use std::sync::Arc;
use support_agent_edge::{
    agent::SupportAgent,
    gemini::{GeminiClient, GenerativeService, MockGenerativeService},
    store::InMemoryOrderStore,
    telemetry::LogTelemetrySink,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    dotenv::dotenv().ok();

    let query = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    let query = if query.trim().is_empty() {
        "What's the status of CERT-123456, and did you charge the right tax?".to_string()
    } else {
        query
    };

    let llm: Arc<dyn GenerativeService> = match std::env::var("GEMINI_API_KEY") {
        Ok(key) if !key.is_empty() => Arc::new(GeminiClient::new(key)),
        _ => {
            eprintln!("GEMINI_API_KEY not set, using canned offline response");
            Arc::new(MockGenerativeService::new(
                "Your order shipped and the collected tax matches the expected amount.",
            ))
        }
    };

    let agent = SupportAgent::new(
        Arc::new(InMemoryOrderStore::seeded()),
        llm,
        Arc::new(LogTelemetrySink),
    );

    let result = agent.handle(&query).await;

    println!("query:       {}", result.query);
    println!("intent:      {}", result.intent);
    println!("order_id:    {}", result.order_id.as_deref().unwrap_or("-"));
    println!("order_found: {}", result.order_found);
    if let Some(tax) = &result.tax_check {
        println!(
            "tax:         {} (expected {:.2}, collected {:.2}, discrepancy {:.2})",
            tax.verdict, tax.expected_tax, tax.collected_tax, tax.discrepancy
        );
    }
    println!();
    println!("{}", result.response);
    println!();
    if let Some(eval) = &result.trace.eval {
        println!(
            "eval: faithfulness={:.2} adherence={:.2} groundedness={:.2} completeness={:.2}",
            eval.faithfulness, eval.context_adherence, eval.groundedness, eval.completeness
        );
        println!("attributed fields: {:?}", eval.attributed_fields);
    }
    println!(
        "trace: chain {} with {} steps in {} ms",
        result.trace.chain_id,
        result.trace.steps.len(),
        result.trace.total_latency_ms
    );

    Ok(())
}
