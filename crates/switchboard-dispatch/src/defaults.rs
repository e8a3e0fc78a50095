// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! System default seeding.
//!
//! At boot the dispatcher writes one default row per integration kind from
//! configuration. An explicit `enabled` in config wins; otherwise the kind
//! auto-enables only when its prerequisite is present (chat needs a bot
//! token, email an SMTP host). Webhook and test never auto-enable: the
//! first has no meaningful system-wide destination, the second is opt-in
//! tooling.

use switchboard_config::model::{BackoffShape, IntegrationDefaultEntry};
use switchboard_config::SwitchboardConfig;
use switchboard_core::{IntegrationKind, SwitchboardError};
use switchboard_store::queries::integrations::{self, DEFAULT_USER};
use switchboard_store::Database;
use tracing::info;

/// Writes the per-kind system default rows.
pub async fn seed_defaults(
    db: &Database,
    config: &SwitchboardConfig,
) -> Result<(), SwitchboardError> {
    for kind in IntegrationKind::ALL {
        let entry = entry_for(config, kind);
        let enabled = entry.enabled.unwrap_or_else(|| auto_enable(config, kind));
        let bag = default_bag(entry);

        integrations::upsert_config(
            db,
            DEFAULT_USER,
            kind,
            enabled,
            &bag,
            entry.priority,
            entry.retry_count,
            entry.retry_delay_seconds,
        )
        .await?;

        info!(kind = %kind, enabled, priority = entry.priority, "integration default seeded");
    }
    Ok(())
}

fn entry_for(config: &SwitchboardConfig, kind: IntegrationKind) -> &IntegrationDefaultEntry {
    match kind {
        IntegrationKind::Chat => &config.integration_defaults.chat,
        IntegrationKind::Email => &config.integration_defaults.email,
        IntegrationKind::Webhook => &config.integration_defaults.webhook,
        IntegrationKind::Test => &config.integration_defaults.test,
    }
}

/// The auto-enable predicate: a kind defaults on only when it can actually
/// deliver.
fn auto_enable(config: &SwitchboardConfig, kind: IntegrationKind) -> bool {
    match kind {
        IntegrationKind::Chat => config.chat.bot_token.is_some(),
        IntegrationKind::Email => config.smtp.host.is_some(),
        IntegrationKind::Webhook | IntegrationKind::Test => false,
    }
}

fn default_bag(entry: &IntegrationDefaultEntry) -> String {
    match entry.backoff {
        BackoffShape::Exponential => r#"{"backoff":"exponential"}"#.to_string(),
        BackoffShape::Linear => "{}".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_config::load_config_from_str;
    use tempfile::tempdir;

    #[tokio::test]
    async fn chat_auto_enables_with_bot_token() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let config = load_config_from_str("[chat]\nbot_token = \"xoxb-1\"\n").unwrap();
        seed_defaults(&db, &config).await.unwrap();

        let chat = integrations::effective_config(&db, "anyone", IntegrationKind::Chat)
            .await
            .unwrap()
            .unwrap();
        assert!(chat.enabled);
        assert!(!chat.user_override);

        let email = integrations::effective_config(&db, "anyone", IntegrationKind::Email)
            .await
            .unwrap()
            .unwrap();
        assert!(!email.enabled);
    }

    #[tokio::test]
    async fn explicit_enabled_overrides_the_predicate() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let config =
            load_config_from_str("[integration_defaults.test]\nenabled = true\n").unwrap();
        seed_defaults(&db, &config).await.unwrap();

        let test = integrations::effective_config(&db, "anyone", IntegrationKind::Test)
            .await
            .unwrap()
            .unwrap();
        assert!(test.enabled);
    }

    #[tokio::test]
    async fn exponential_backoff_lands_in_the_config_bag() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let config = load_config_from_str(
            "[integration_defaults.webhook]\nenabled = true\nbackoff = \"exponential\"\n",
        )
        .unwrap();
        seed_defaults(&db, &config).await.unwrap();

        let webhook = integrations::effective_config(&db, "anyone", IntegrationKind::Webhook)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            webhook.config.get("backoff").and_then(|v| v.as_str()),
            Some("exponential")
        );
    }
}
