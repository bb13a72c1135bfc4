use anyhow::Result;
use counsel_calls::{Config, NatsSignaling, SignalingChannel};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/counsel-calls".to_string());
    let cfg = Config::load(&config_path)?;
    let user_id = std::env::args()
        .nth(2)
        .unwrap_or_else(|| "counselor".to_string());

    info!("{} v0.1.0", cfg.service.name);
    info!(
        "Reconnect policy: every {}ms, max {} attempts",
        cfg.reconnect.interval_ms, cfg.reconnect.max_attempts
    );
    info!(
        "Suggestions every {}s, confidence threshold {:.2}",
        cfg.suggestions.period_secs, cfg.suggestions.confidence_threshold
    );
    match &cfg.analyze.endpoint {
        Some(endpoint) => info!("Remote analysis service at {}", endpoint),
        None => info!("Remote analysis disabled, using local heuristics"),
    }

    // Signaling monitor: subscribe as the given user and log every
    // envelope addressed to it. A full call endpoint additionally needs
    // a platform media stack plugged into the connector trait.
    let signaling = NatsSignaling::connect(&cfg.signaling.nats_url, user_id.clone()).await?;
    let mut inbox = signaling.subscribe().await?;
    info!("Receiving signaling envelopes for {}", user_id);

    while let Some(envelope) = inbox.recv().await {
        info!(
            "{} envelope for call {} from {}",
            envelope.kind(),
            envelope.call_id,
            envelope.from_user_id
        );
    }

    Ok(())
}
