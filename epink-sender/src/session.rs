//! One panel update from config to broker.
//!
//! Builds the envelope and the publisher from [`SenderConfig`], runs the
//! [`Pipeline`] once and releases the broker connection afterwards, also
//! when delivery failed.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use epink_core::envelope::KEY_LENGTH;
use epink_core::{
    AesGcmEnvelope, Canvas, ChunkTransport, Delivery, EpinkError, MemoryPublisher, MqttPublisher,
    Pipeline, Publisher,
};

use crate::config::SenderConfig;

/// Outcome of [`SenderSession::run`].
#[derive(Debug)]
pub struct SessionReport {
    pub delivery: Delivery,
    /// Populated in dry-run mode: every record that would have gone out.
    pub captured: Option<Arc<MemoryPublisher>>,
}

// ── SenderSession ────────────────────────────────────────────────

pub struct SenderSession {
    config: SenderConfig,
    dry_run: bool,
}

impl SenderSession {
    pub fn new(config: SenderConfig) -> Self {
        Self {
            config,
            dry_run: false,
        }
    }

    /// Publish into memory instead of contacting the broker.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// Key from `key_hex` if set, otherwise from the passphrase.
    pub fn envelope(&self) -> Result<AesGcmEnvelope, EpinkError> {
        let env = &self.config.envelope;
        if !env.key_hex.is_empty() {
            let key = hex::decode(env.key_hex.trim())
                .map_err(|e| EpinkError::Envelope(format!("key_hex: {e}")))?;
            return AesGcmEnvelope::new(&key);
        }
        if !env.passphrase.is_empty() {
            return Ok(AesGcmEnvelope::from_passphrase(&env.passphrase));
        }
        Err(EpinkError::Envelope(format!(
            "no key configured: set [envelope] key_hex ({} hex chars) or passphrase",
            KEY_LENGTH * 2
        )))
    }

    /// Encode `canvas` and deliver it.
    pub async fn run(&self, canvas: &Canvas) -> Result<SessionReport, EpinkError> {
        if self.dry_run {
            let sink = Arc::new(MemoryPublisher::new());
            let delivery = self
                .deliver_with(Arc::clone(&sink), canvas, Duration::ZERO)
                .await?;
            info!(records = sink.len(), "dry run complete");
            return Ok(SessionReport {
                delivery,
                captured: Some(sink),
            });
        }

        let opts = self.config.broker_options();
        let publisher = MqttPublisher::connect(&opts).await?;
        let delivery = self
            .deliver_with(publisher, canvas, self.config.pace())
            .await?;
        Ok(SessionReport {
            delivery,
            captured: None,
        })
    }

    async fn deliver_with<P: Publisher>(
        &self,
        publisher: P,
        canvas: &Canvas,
        pace: Duration,
    ) -> Result<Delivery, EpinkError> {
        let transport = ChunkTransport::new(publisher)
            .with_topic(self.config.broker.topic.clone())
            .with_policy(self.config.chunk_policy())
            .with_pace(pace)
            .with_transmission_ids(self.config.transport.tag_transmissions);

        let pipeline = Pipeline::new(
            self.config.pixel_format()?,
            &self.config.to_pipeline_config(),
            self.envelope()?,
            transport,
        )?;

        let result = pipeline.deliver(canvas).await;
        if let Err(e) = pipeline.close().await {
            warn!("closing publisher: {e}");
        }
        result
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use epink_core::{ChunkAssembler, ChunkRecord, Rgb, SecureEnvelope};

    fn small_config() -> SenderConfig {
        let mut cfg = SenderConfig::default();
        cfg.panel.width = 40;
        cfg.panel.height = 10;
        cfg.envelope.passphrase = "ward 2F".into();
        cfg
    }

    #[test]
    fn hex_key_preferred_over_passphrase() {
        let mut cfg = small_config();
        cfg.envelope.key_hex = "11".repeat(32);
        let session = SenderSession::new(cfg);
        let sealed = session.envelope().unwrap().encrypt(b"x").unwrap();

        let direct = AesGcmEnvelope::new(&[0x11; 32]).unwrap();
        assert_eq!(direct.decrypt(&sealed).unwrap(), b"x");
    }

    #[test]
    fn bad_or_missing_key_rejected() {
        let mut cfg = small_config();
        cfg.envelope.key_hex = "abcd".into();
        assert!(matches!(
            SenderSession::new(cfg.clone()).envelope(),
            Err(EpinkError::InvalidKeyLength { got: 2, .. })
        ));

        cfg.envelope.key_hex = "zz".into();
        assert!(SenderSession::new(cfg.clone()).envelope().is_err());

        cfg.envelope.key_hex.clear();
        cfg.envelope.passphrase.clear();
        assert!(SenderSession::new(cfg).envelope().is_err());
    }

    #[tokio::test]
    async fn dry_run_captures_every_record() {
        let session = SenderSession::new(small_config()).dry_run(true);
        let canvas = Canvas::filled(40, 10, Rgb::WHITE);
        let report = session.run(&canvas).await.unwrap();
        let sink = report.captured.unwrap();
        assert_eq!(sink.len(), 50);

        let mut assembler = ChunkAssembler::new();
        for (topic, payload) in sink.messages() {
            assert_eq!(topic, "ACET/image/payload");
            assembler.accept(&ChunkRecord::from_json(&payload).unwrap()).unwrap();
        }
        let blob = assembler.assemble().unwrap();
        assert_eq!(blob.len(), report.delivery.blob_len);
    }

    #[tokio::test]
    async fn canvas_must_match_panel() {
        let session = SenderSession::new(small_config()).dry_run(true);
        let err = session
            .run(&Canvas::filled(800, 480, Rgb::WHITE))
            .await
            .unwrap_err();
        assert!(matches!(err, EpinkError::DimensionMismatch { .. }));
    }
}
