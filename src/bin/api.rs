use std::sync::Arc;
use support_agent_edge::{
    agent::SupportAgent,
    api::start_server,
    gates::RateLimiter,
    gemini::GeminiClient,
    store::build_order_store,
    telemetry::build_telemetry_sink,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    dotenv::dotenv().ok();

    let gemini_api_key = std::env::var("GEMINI_API_KEY").unwrap_or_else(|_| {
        eprintln!("GEMINI_API_KEY not set; generative calls will fail over to the apology response");
        String::new()
    });

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("Edge Support Agent - API server");
    info!("Port: {}", api_port);

    let order_store = build_order_store().await;
    let telemetry = build_telemetry_sink();
    let llm = Arc::new(GeminiClient::new(gemini_api_key));
    let rate_limiter = Arc::new(RateLimiter::from_env());

    let agent = Arc::new(SupportAgent::new(order_store, llm, telemetry));

    info!("Pipeline initialized, starting server");

    start_server(agent, rate_limiter, api_port).await?;

    Ok(())
}
