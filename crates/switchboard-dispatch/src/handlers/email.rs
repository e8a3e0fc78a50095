// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Email delivery handler.
//!
//! Submits via SMTP with STARTTLS (port 587 by default). The recipient
//! address comes from the user's config bag; subject and body from the
//! payload. Transient SMTP responses are retryable, permanent rejections
//! are not.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::AsyncSmtpTransport;
use lettre::{AsyncTransport, Message, Tokio1Executor};
use switchboard_config::model::SmtpConfig;
use switchboard_core::{
    AttemptOutcome, DeliveryPayload, EffectiveConfig, IntegrationHandler, IntegrationKind,
    SwitchboardError,
};
use tracing::debug;

const DEFAULT_SUBJECT: &str = "Your assistant has replied";

/// Handler for the email integration kind.
pub struct EmailHandler {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from_address: String,
    reply_to: Option<String>,
}

impl EmailHandler {
    pub fn new(config: &SmtpConfig) -> Result<Self, SwitchboardError> {
        let transport = match &config.host {
            Some(host) => {
                let mut builder =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                        .map_err(|e| SwitchboardError::Delivery {
                            message: format!("invalid SMTP relay {host}: {e}"),
                            source: Some(Box::new(e)),
                        })?
                        .port(config.port);
                if let (Some(username), Some(password)) = (&config.username, &config.password) {
                    builder =
                        builder.credentials(Credentials::new(username.clone(), password.clone()));
                }
                Some(builder.build())
            }
            None => None,
        };

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
            reply_to: config.reply_to.clone(),
        })
    }
}

#[async_trait]
impl IntegrationHandler for EmailHandler {
    fn kind(&self) -> IntegrationKind {
        IntegrationKind::Email
    }

    async fn deliver(
        &self,
        config: &EffectiveConfig,
        payload: &DeliveryPayload,
        _attempt: u32,
    ) -> Result<AttemptOutcome, SwitchboardError> {
        let Some(transport) = &self.transport else {
            return Ok(AttemptOutcome::failed("SMTP not configured", false));
        };

        let Some(address) = config.config.get("address").and_then(|v| v.as_str()) else {
            return Ok(AttemptOutcome::failed("no email address configured for user", false));
        };

        let subject = payload.subject.clone().unwrap_or_else(|| DEFAULT_SUBJECT.to_string());

        let mut builder = Message::builder()
            .from(match self.from_address.parse() {
                Ok(mailbox) => mailbox,
                Err(e) => {
                    return Ok(AttemptOutcome::failed(
                        format!("invalid from address: {e}"),
                        false,
                    ))
                }
            })
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);
        if let Some(reply_to) = &self.reply_to {
            if let Ok(mailbox) = reply_to.parse() {
                builder = builder.reply_to(mailbox);
            }
        }
        let message = match address.parse() {
            Ok(mailbox) => builder.to(mailbox).body(payload.body.clone()),
            Err(e) => {
                return Ok(AttemptOutcome::failed(
                    format!("invalid recipient address: {e}"),
                    false,
                ))
            }
        };
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                return Ok(AttemptOutcome::failed(format!("message build failed: {e}"), false))
            }
        };

        match transport.send(message).await {
            Ok(response) => {
                debug!(
                    to = address,
                    code = response.code().to_string().as_str(),
                    "email submitted"
                );
                Ok(AttemptOutcome::success())
            }
            Err(e) => {
                // lettre distinguishes transient (4yz) from permanent (5yz)
                // SMTP responses; connection-level errors are transient.
                let retryable = e.is_transient() || !e.is_permanent();
                Ok(AttemptOutcome::failed(format!("SMTP submission failed: {e}"), retryable))
            }
        }
    }

    async fn health_check(&self) -> bool {
        match &self.transport {
            Some(transport) => transport.test_connection().await.unwrap_or(false),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};
    use switchboard_core::DeliveryOutcome;

    fn payload() -> DeliveryPayload {
        DeliveryPayload {
            request_id: "req-1".into(),
            session_id: "sess-1".into(),
            user_id: "alice".into(),
            agent_id: None,
            subject: Some("Laptop refresh".into()),
            body: "Your refresh is booked.".into(),
            metadata: Map::new(),
        }
    }

    fn config(address: Option<&str>) -> EffectiveConfig {
        let mut bag = Map::new();
        if let Some(address) = address {
            bag.insert("address".into(), json!(address));
        }
        EffectiveConfig {
            user_id: "alice".into(),
            kind: IntegrationKind::Email,
            enabled: true,
            config: bag,
            priority: 0,
            retry_count: 3,
            retry_delay_seconds: 30,
            user_override: true,
        }
    }

    #[tokio::test]
    async fn unconfigured_smtp_is_terminal() {
        let handler = EmailHandler::new(&SmtpConfig::default()).unwrap();
        let outcome = handler
            .deliver(&config(Some("alice@example.com")), &payload(), 1)
            .await
            .unwrap();
        assert_eq!(outcome.outcome, DeliveryOutcome::Failed);
        assert!(!outcome.retryable);
        assert!(!handler.health_check().await);
    }

    #[tokio::test]
    async fn missing_recipient_is_terminal() {
        let smtp = SmtpConfig {
            host: Some("smtp.example.com".into()),
            ..SmtpConfig::default()
        };
        let handler = EmailHandler::new(&smtp).unwrap();
        let outcome = handler.deliver(&config(None), &payload(), 1).await.unwrap();
        assert_eq!(outcome.outcome, DeliveryOutcome::Failed);
        assert!(!outcome.retryable);
    }

    #[tokio::test]
    async fn invalid_recipient_is_terminal() {
        let smtp = SmtpConfig {
            host: Some("smtp.example.com".into()),
            ..SmtpConfig::default()
        };
        let handler = EmailHandler::new(&smtp).unwrap();
        let outcome = handler
            .deliver(&config(Some("not an address")), &payload(), 1)
            .await
            .unwrap();
        assert_eq!(outcome.outcome, DeliveryOutcome::Failed);
        assert!(!outcome.retryable);
    }
}
