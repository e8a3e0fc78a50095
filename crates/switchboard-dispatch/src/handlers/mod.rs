// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration handlers, one per kind of the closed union.
//!
//! `build_handlers` registers every [`IntegrationKind`]; the exhaustive
//! match means a new kind without a handler fails to compile instead of
//! being silently dropped at dispatch time.

pub mod chat;
pub mod email;
pub mod test;
pub mod webhook;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use switchboard_config::SwitchboardConfig;
use switchboard_core::{IntegrationHandler, IntegrationKind, SwitchboardError};

pub use chat::ChatHandler;
pub use email::EmailHandler;
pub use test::TestHandler;
pub use webhook::WebhookHandler;

/// Builds the kind -> handler table from configuration.
pub fn build_handlers(
    config: &SwitchboardConfig,
) -> Result<HashMap<IntegrationKind, Arc<dyn IntegrationHandler>>, SwitchboardError> {
    let timeout = Duration::from_secs(config.dispatch.delivery_timeout_seconds);
    let mut handlers: HashMap<IntegrationKind, Arc<dyn IntegrationHandler>> = HashMap::new();

    for kind in IntegrationKind::ALL {
        let handler: Arc<dyn IntegrationHandler> = match kind {
            IntegrationKind::Chat => Arc::new(ChatHandler::new(
                config.chat.api_base_url.clone(),
                config.chat.bot_token.clone(),
                timeout,
            )?),
            IntegrationKind::Email => Arc::new(EmailHandler::new(&config.smtp)?),
            IntegrationKind::Webhook => Arc::new(WebhookHandler::new(timeout)?),
            IntegrationKind::Test => Arc::new(TestHandler),
        };
        handlers.insert(kind, handler);
    }

    Ok(handlers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_config::load_config_from_str;

    #[test]
    fn every_kind_gets_a_handler() {
        let config = load_config_from_str("").unwrap();
        let handlers = build_handlers(&config).unwrap();
        assert_eq!(handlers.len(), IntegrationKind::ALL.len());
        for kind in IntegrationKind::ALL {
            assert_eq!(handlers.get(&kind).unwrap().kind(), kind);
        }
    }
}
