/// Entry point for the container-watch host agent.
///
/// Logging is configured through `RUST_LOG` and defaults to `info`.
///
/// # Examples
///
/// ```bash
/// HOST_ID=worker-1 DISCORD_WEBHOOK_URL=https://discord.com/api/webhooks/... cargo run
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    container_watch::run().await
}
