use std::time::Duration;

use reqwest::Client;

use super::{Error, Message, Result};

/// Destination for alert digests.
pub trait AlertSink: Send + Sync + 'static {
    fn send(&self, message: &Message) -> impl Future<Output = Result<()>> + Send;
}

/// Posts digests to a Discord-compatible webhook.
#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    client: Client,
    url: String,
}

impl DiscordWebhook {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::Transport)?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl AlertSink for DiscordWebhook {
    async fn send(&self, message: &Message) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::alert::{PendingAlerts, build_digest};

    fn message() -> Message {
        let pending = PendingAlerts {
            alerts: vec!["Heartbeat failure: connection refused".to_owned()],
            dropped: 0,
        };
        build_digest("host-1", &pending).remove(0).message
    }

    #[tokio::test]
    async fn test_send_posts_embed() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhook"))
            .and(body_partial_json(serde_json::json!({
                "embeds": [{"title": "Worker Alerts: host-1"}]
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let sink = DiscordWebhook::new(
            format!("{}/webhook", mock_server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();
        sink.send(&message()).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_digest_is_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&mock_server)
            .await;

        let sink = DiscordWebhook::new(mock_server.uri(), Duration::from_secs(5)).unwrap();
        match sink.send(&message()).await {
            Err(Error::Status { status, body }) => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
