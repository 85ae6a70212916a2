//! MQTT transport adapter.
//!
//! Implements [`TransportPort`] over the ESP-IDF MQTT client.  The client's
//! event callback runs on the MQTT task: it only flips the connected flag
//! and queues received messages, which the main loop drains through
//! [`TransportPort::poll_inbound`].
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`.
//! - **all other targets**: an in-memory broker that records publishes and
//!   lets tests inject inbound messages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::app::ports::{InboundMessage, SessionParams, TransportPort};
use crate::error::CommsError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::mqtt::client::{
    EspMqttClient, EventPayload, LwtConfiguration, MqttClientConfiguration, QoS,
};

/// Inbound messages held between loop passes.  Oldest are dropped first.
pub const INBOUND_QUEUE_DEPTH: usize = 8;

/// How long `connect` waits for the broker's CONNACK.
#[cfg(target_os = "espidf")]
const CONNECT_TIMEOUT_MS: u32 = 5_000;
#[cfg(target_os = "espidf")]
const CONNECT_POLL_MS: u32 = 50;

type InboundQueue = Arc<Mutex<heapless::Deque<InboundMessage, INBOUND_QUEUE_DEPTH>>>;

fn enqueue(queue: &InboundQueue, msg: InboundMessage) {
    if let Ok(mut q) = queue.lock() {
        if q.is_full() {
            let _ = q.pop_front();
            warn!("MQTT: inbound queue full, dropped oldest");
        }
        let _ = q.push_back(msg);
    }
}

// ───────────────────────────────────────────────────────────────
// Simulated broker
// ───────────────────────────────────────────────────────────────

/// One publish seen by the simulated broker.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimPublish {
    pub topic: String,
    pub payload: String,
    pub retained: bool,
}

#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct SimBroker {
    /// Refuse every connect attempt.
    pub refuse: bool,
    pub published: Vec<SimPublish>,
    pub subscriptions: Vec<String>,
    /// Will registered by the last successful connect.
    pub will: Option<SimPublish>,
    pub connects: u32,
}

// ───────────────────────────────────────────────────────────────
// MQTT adapter
// ───────────────────────────────────────────────────────────────

pub struct MqttAdapter {
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimBroker,
    connected: Arc<AtomicBool>,
    inbound: InboundQueue,
}

impl Default for MqttAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MqttAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(not(target_os = "espidf"))]
            sim: SimBroker::default(),
            connected: Arc::new(AtomicBool::new(false)),
            inbound: Arc::new(Mutex::new(heapless::Deque::new())),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim(&self) -> &SimBroker {
        &self.sim
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_mut(&mut self) -> &mut SimBroker {
        &mut self.sim
    }

    /// Deliver `payload` on `topic` as if the broker had sent it.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_inject(&self, topic: &str, payload: &[u8]) {
        enqueue(
            &self.inbound,
            InboundMessage {
                topic: topic.into(),
                payload: payload.to_vec(),
            },
        );
    }

    /// Simulate the broker dropping the session.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_session(&self) {
        self.connected.store(false, Ordering::Release);
    }

    // ── Platform: session ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self, params: &SessionParams<'_>) -> Result<(), CommsError> {
        use esp_idf_svc::hal::delay::FreeRtos;

        let url = format!("mqtt://{}:{}", params.server, params.port);
        let config = MqttClientConfiguration {
            client_id: Some(params.client_id),
            lwt: Some(LwtConfiguration {
                topic: params.will_topic,
                payload: params.will_payload.as_bytes(),
                qos: QoS::AtMostOnce,
                retain: params.will_retained,
            }),
            ..Default::default()
        };

        let connected = Arc::clone(&self.connected);
        let inbound = Arc::clone(&self.inbound);
        let client = EspMqttClient::new_cb(&url, &config, move |event| match event.payload() {
            EventPayload::Connected(_) => connected.store(true, Ordering::Release),
            EventPayload::Disconnected => connected.store(false, Ordering::Release),
            EventPayload::Received {
                topic: Some(topic),
                data,
                ..
            } => enqueue(
                &inbound,
                InboundMessage {
                    topic: topic.into(),
                    payload: data.to_vec(),
                },
            ),
            _ => {}
        })
        .map_err(|e| {
            warn!("MQTT: client creation failed: {:?}", e);
            CommsError::MqttConnectFailed
        })?;
        self.client = Some(client);

        let mut waited = 0;
        while !self.connected.load(Ordering::Acquire) {
            if waited >= CONNECT_TIMEOUT_MS {
                self.client = None;
                return Err(CommsError::MqttConnectFailed);
            }
            FreeRtos::delay_ms(CONNECT_POLL_MS);
            waited += CONNECT_POLL_MS;
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self, params: &SessionParams<'_>) -> Result<(), CommsError> {
        if self.sim.refuse {
            return Err(CommsError::MqttConnectFailed);
        }
        self.sim.connects += 1;
        self.sim.will = Some(SimPublish {
            topic: params.will_topic.into(),
            payload: params.will_payload.into(),
            retained: params.will_retained,
        });
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        // Dropping the client stops the MQTT task.
        self.client = None;
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim.subscriptions.clear();
    }

    // ── Platform: traffic ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retained: bool,
    ) -> Result<(), CommsError> {
        let client = self.client.as_mut().ok_or(CommsError::NotConnected)?;
        client
            .publish(topic, QoS::AtMostOnce, retained, payload)
            .map(|_| ())
            .map_err(|_| CommsError::MqttPublishFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retained: bool,
    ) -> Result<(), CommsError> {
        self.sim.published.push(SimPublish {
            topic: topic.into(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            retained,
        });
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        let client = self.client.as_mut().ok_or(CommsError::NotConnected)?;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .map(|_| ())
            .map_err(|_| CommsError::MqttSubscribeFailed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        self.sim.subscriptions.push(topic.into());
        Ok(())
    }
}

impl TransportPort for MqttAdapter {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn connect(&mut self, params: &SessionParams<'_>) -> Result<(), CommsError> {
        if self.is_connected() {
            self.disconnect();
        }
        self.platform_connect(params)?;
        info!(
            "MQTT: connected to {}:{} as '{}'",
            params.server, params.port, params.client_id
        );
        Ok(())
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        self.connected.store(false, Ordering::Release);
        if let Ok(mut q) = self.inbound.lock() {
            q.clear();
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> Result<(), CommsError> {
        if !self.is_connected() {
            return Err(CommsError::NotConnected);
        }
        self.platform_publish(topic, payload, retained)
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError> {
        if !self.is_connected() {
            return Err(CommsError::NotConnected);
        }
        self.platform_subscribe(topic)
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        self.inbound.lock().ok()?.pop_front()
    }
}
