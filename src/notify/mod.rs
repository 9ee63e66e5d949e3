use async_trait::async_trait;

/// Fire-and-forget message sink for fatal and error conditions
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str);
}

/// Posts messages to a webhook; delivery failures are logged and dropped
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str) {
        let payload = serde_json::json!({ "message": message });
        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!(status = %response.status(), "notification rejected");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "failed to deliver notification");
            }
        }
    }
}

/// Discards every message; stands in when no webhook is configured
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_webhook_posts_message_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_body(Matcher::Json(serde_json::json!({
                "message": "Fatal error occurred. Stopping bot."
            })))
            .with_status(200)
            .create_async()
            .await;

        let notifier = WebhookNotifier::new(format!("{}/hook", server.url()));
        notifier.notify("Fatal error occurred. Stopping bot.").await;
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_webhook_swallows_delivery_failure() {
        // nothing is listening on this port
        let notifier = WebhookNotifier::new("http://127.0.0.1:1/hook");
        notifier.notify("still fine").await;
    }
}
