pub mod dto;
pub mod message;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::FcmConfig;
use crate::error::AppError;

pub use message::PushMessage;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SendSummary {
    pub success: usize,
    pub failure: usize,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_to_one(&self, token: &str, message: &PushMessage) -> Result<(), AppError>;

    /// One send per token; failures are counted, not propagated.
    async fn send_to_many(&self, tokens: &[String], message: &PushMessage) -> SendSummary {
        let mut summary = SendSummary::default();
        for token in tokens {
            match self.send_to_one(token, message).await {
                Ok(()) => summary.success += 1,
                Err(e) => {
                    warn!("push to {} failed: {}", mask_token(token), e);
                    summary.failure += 1;
                }
            }
        }
        info!(
            "multicast done: {} sent, {} failed",
            summary.success, summary.failure
        );
        summary
    }
}

/// Firebase Cloud Messaging HTTP v1 client.
pub struct FcmNotifier {
    client: Client,
    config: FcmConfig,
    endpoint: String,
}

impl FcmNotifier {
    pub fn new(config: FcmConfig) -> Result<Self, AppError> {
        let endpoint = format!(
            "https://fcm.googleapis.com/v1/projects/{}/messages:send",
            config.project_id
        );
        Self::with_endpoint(config, endpoint)
    }

    pub fn with_endpoint(config: FcmConfig, endpoint: String) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            config,
            endpoint,
        })
    }
}

pub fn build_request<'a>(token: &'a str, message: &'a PushMessage) -> dto::SendRequest<'a> {
    dto::SendRequest {
        message: dto::Message {
            token,
            notification: dto::Notification {
                title: &message.title,
                body: &message.body,
            },
            data: &message.data,
            android: dto::AndroidConfig {
                priority: "high",
                notification: dto::AndroidNotification {
                    sound: "default",
                    channel_id: "schedule_changes",
                },
            },
            webpush: dto::WebpushConfig {
                notification: dto::WebpushNotification {
                    icon: "/icon-192.png",
                    badge: "/badge-72.png",
                },
            },
        },
    }
}

#[async_trait]
impl Notifier for FcmNotifier {
    async fn send_to_one(&self, token: &str, message: &PushMessage) -> Result<(), AppError> {
        let request_body = build_request(token, message);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.config.access_token)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Notification(format!("FCM error {}: {}", status, body)));
        }

        // A 2xx means FCM accepted the message, whatever the body looks like.
        match response.json::<dto::SendResponse>().await {
            Ok(sent) => info!("push sent to {}: {}", mask_token(token), sent.name),
            Err(e) => warn!("push to {} accepted, unreadable reply: {}", mask_token(token), e),
        }
        Ok(())
    }
}

/// Used when no push provider is configured: logs and reports success.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send_to_one(&self, token: &str, message: &PushMessage) -> Result<(), AppError> {
        info!("(noop) push to {}: {} / {}", mask_token(token), message.title, message.body);
        Ok(())
    }
}

fn mask_token(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    format!("{}…", prefix)
}
