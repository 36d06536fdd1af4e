//! MQTT broker session.
//!
//! One [`MqttPublisher`] is one broker connection, reused for every
//! chunk of a transmission. The rumqttc event loop is driven inline:
//! each publish waits until the broker confirms it at the configured QoS
//! (or, for QoS 0, until the packet has left the socket), so a dead
//! broker surfaces at the chunk that hit it.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::EpinkError;
use crate::transport::Publisher;

/// Requests buffered between the client handle and the event loop.
const REQUEST_CAPACITY: usize = 16;

// ── BrokerOptions ────────────────────────────────────────────────

/// Connection parameters for [`MqttPublisher::connect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerOptions {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    /// 0, 1 or 2.
    pub qos: u8,
    /// Deadline for CONNACK and for each publish confirmation.
    pub timeout: Duration,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: "epink-sender".into(),
            keep_alive: Duration::from_secs(300),
            qos: 1,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Map a numeric QoS to rumqttc's enum, saturating at exactly-once.
pub fn qos_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

// ── MqttPublisher ────────────────────────────────────────────────

/// [`Publisher`] backed by a single MQTT connection.
pub struct MqttPublisher {
    client: AsyncClient,
    events: Mutex<EventLoop>,
    qos: QoS,
    timeout: Duration,
}

impl MqttPublisher {
    /// Connect and wait for the broker's CONNACK.
    pub async fn connect(opts: &BrokerOptions) -> Result<Self, EpinkError> {
        let mut mqtt = MqttOptions::new(opts.client_id.clone(), opts.host.clone(), opts.port);
        mqtt.set_keep_alive(opts.keep_alive);
        mqtt.set_clean_session(true);

        let (client, mut events) = AsyncClient::new(mqtt, REQUEST_CAPACITY);

        let handshake = async {
            loop {
                match events.poll().await? {
                    Event::Incoming(Packet::ConnAck(ack)) => {
                        return if ack.code == ConnectReturnCode::Success {
                            Ok::<(), EpinkError>(())
                        } else {
                            Err(EpinkError::TransportUnavailable(format!(
                                "broker refused connection: {:?}",
                                ack.code
                            )))
                        };
                    }
                    other => debug!(?other, "mqtt event before connack"),
                }
            }
        };
        tokio::time::timeout(opts.timeout, handshake)
            .await
            .map_err(|_| {
                EpinkError::TransportUnavailable(format!(
                    "no connack from {}:{} within {:?}",
                    opts.host, opts.port, opts.timeout
                ))
            })??;

        info!(host = %opts.host, port = opts.port, "connected to broker");
        Ok(Self {
            client,
            events: Mutex::new(events),
            qos: qos_level(opts.qos),
            timeout: opts.timeout,
        })
    }

    /// Poll until `done` accepts an event, bounded by the publish timeout.
    async fn drive<F>(&self, what: &str, mut done: F) -> Result<(), EpinkError>
    where
        F: FnMut(&Event) -> bool + Send,
    {
        let mut events = self.events.lock().await;
        let wait = async {
            loop {
                let event = events.poll().await?;
                if done(&event) {
                    return Ok::<(), EpinkError>(());
                }
            }
        };
        tokio::time::timeout(self.timeout, wait).await.map_err(|_| {
            EpinkError::TransportUnavailable(format!("{what} not confirmed within {:?}", self.timeout))
        })?
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), EpinkError> {
        self.client
            .publish(topic, self.qos, false, payload.to_vec())
            .await?;

        let qos = self.qos;
        self.drive("publish", move |event| match (qos, event) {
            (QoS::AtMostOnce, Event::Outgoing(Outgoing::Publish(_))) => true,
            (QoS::AtLeastOnce, Event::Incoming(Packet::PubAck(_))) => true,
            (QoS::ExactlyOnce, Event::Incoming(Packet::PubComp(_))) => true,
            _ => false,
        })
        .await
    }

    async fn close(&self) -> Result<(), EpinkError> {
        self.client.disconnect().await?;
        let result = self
            .drive("disconnect", |event| {
                matches!(event, Event::Outgoing(Outgoing::Disconnect))
            })
            .await;
        if let Err(e) = &result {
            warn!("disconnect was not clean: {e}");
        }
        result
    }
}

// ── Tests ────────────────────────────────────────────────────────
