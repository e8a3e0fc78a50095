// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Communication substrate for the Switchboard services.
//!
//! Two strategies implement the [`Transport`] contract from
//! `switchboard-core`: broker-backed pub/sub and direct HTTP. The strategy
//! is selected once from configuration at process boot; everything else in
//! the system is transport-agnostic.

pub mod broker;
pub mod direct;
pub mod poll;

use std::sync::Arc;
use std::time::Duration;

use switchboard_config::SwitchboardConfig;
use switchboard_core::{SwitchboardError, Transport, TransportMode};
use switchboard_store::Database;

pub use broker::{decode_binary, BrokerTransport};
pub use direct::DirectTransport;

/// Builds the configured transport strategy for a service.
///
/// `source` is the publishing identity used on broker envelopes (router,
/// worker, or dispatcher).
pub fn build_transport(
    config: &SwitchboardConfig,
    db: Database,
    source: &'static str,
) -> Result<Arc<dyn Transport>, SwitchboardError> {
    let poll_interval = Duration::from_millis(config.transport.poll_interval_ms);
    match config.transport.mode {
        TransportMode::Broker => {
            let broker_url = config
                .transport
                .broker_url
                .clone()
                .ok_or_else(|| {
                    SwitchboardError::Config("transport.broker_url is required".into())
                })?;
            let transport =
                BrokerTransport::new(broker_url, db, poll_interval)?.with_source(source);
            Ok(Arc::new(transport))
        }
        TransportMode::DirectHttp => {
            let request_timeout =
                Duration::from_secs(config.limits.runtime_deadline_seconds + 10);
            let transport = DirectTransport::new(
                config.transport.worker_url.clone(),
                config.transport.dispatcher_url.clone(),
                db,
                poll_interval,
                request_timeout,
            )?;
            Ok(Arc::new(transport))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_config::load_config_from_str;
    use tempfile::tempdir;

    #[tokio::test]
    async fn factory_honours_configured_mode() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();

        let direct = load_config_from_str("").unwrap();
        let transport = build_transport(
            &direct,
            db.clone(),
            switchboard_core::envelope::sources::ROUTER,
        )
        .unwrap();
        assert_eq!(transport.mode(), TransportMode::DirectHttp);

        let brokered = load_config_from_str(
            "[transport]\nmode = \"broker\"\nbroker_url = \"http://broker:8088\"\n",
        )
        .unwrap();
        let transport = build_transport(
            &brokered,
            db,
            switchboard_core::envelope::sources::WORKER,
        )
        .unwrap();
        assert_eq!(transport.mode(), TransportMode::Broker);
    }

    #[tokio::test]
    async fn broker_mode_without_url_is_a_config_error() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let mut config = load_config_from_str("").unwrap();
        config.transport.mode = TransportMode::Broker;
        let result = build_transport(
            &config,
            db,
            switchboard_core::envelope::sources::ROUTER,
        );
        assert!(matches!(result, Err(SwitchboardError::Config(_))));
    }
}
