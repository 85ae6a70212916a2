//! Connection-gated publish/subscribe facade.
//!
//! [`EventPublisher`] owns the MQTT transport and the topic table.  Every
//! outbound message goes through [`publish`](EventPublisher::publish), which
//! silently drops the message while no session is up.  Sessions are opened
//! lazily by the supervisor in its steady state.
//!
//! ```text
//!  <customer>/<project>/<topic>/STATE            online / offline (LWT)
//!                              /HEARTBEAT        HeartbeatRecord
//!                              /PIR<n>           on / off
//!                              /DI<n>            not_pressed / pressed / long_pressed
//!                              /thermometers/<A> 21.50
//!                              /log              LogRecord
//!                              /cmnd             ← inbound commands
//! ```

use log::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::error::{CommandError, CommsError};

use super::commands::NodeCommand;
use super::events::{HeartbeatRecord, LogCategory, LogRecord};
use super::ports::{SessionParams, TransportPort};

pub const STATE_ONLINE: &str = "online";
pub const STATE_OFFLINE: &str = "offline";

// ───────────────────────────────────────────────────────────────
// Topic table
// ───────────────────────────────────────────────────────────────

/// Fully qualified topics for one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub prefix: String,
    pub state: String,
    pub heartbeat: String,
    pub log: String,
    pub command: String,
}

impl Topics {
    pub fn new(config: &DeviceConfig) -> Self {
        let prefix = config.topic_prefix();
        Self {
            state: format!("{prefix}/STATE"),
            heartbeat: format!("{prefix}/HEARTBEAT"),
            log: format!("{prefix}/log"),
            command: format!("{prefix}/cmnd"),
            prefix,
        }
    }

    pub fn motion(&self, index: usize) -> String {
        format!("{}/PIR{}", self.prefix, index)
    }

    pub fn digital_input(&self, index: usize) -> String {
        format!("{}/DI{}", self.prefix, index)
    }

    pub fn thermometer(&self, name: &str) -> String {
        format!("{}/thermometers/{}", self.prefix, name)
    }
}

// ───────────────────────────────────────────────────────────────
// EventPublisher
// ───────────────────────────────────────────────────────────────

pub struct EventPublisher<T: TransportPort> {
    transport: T,
    topics: Topics,
    server: String,
    port: u16,
    client_id: String,
    node: u32,
    session: bool,
    sessions_opened: u32,
}

impl<T: TransportPort> EventPublisher<T> {
    /// `client_id` doubles as the access-point SSID; `node` is the chip id
    /// stamped on every log record.
    pub fn new(transport: T, config: &DeviceConfig, client_id: String, node: u32) -> Self {
        Self {
            transport,
            topics: Topics::new(config),
            server: config.mqtt_server.clone(),
            port: config.mqtt_port,
            client_id,
            node,
            session: false,
            sessions_opened: 0,
        }
    }

    // ── Session ───────────────────────────────────────────────

    /// A session is established and the transport still reports connected.
    pub fn has_session(&self) -> bool {
        self.session && self.transport.is_connected()
    }

    /// Open a session if none is up.  Returns `Ok(true)` when a new session
    /// was established by this call.
    ///
    /// A new session registers `offline` as the retained last will on
    /// `STATE`, subscribes to the command topic, announces `online`
    /// (retained) and logs the node address.
    pub fn ensure_session(&mut self, address: &str) -> Result<bool, CommsError> {
        if self.has_session() {
            return Ok(false);
        }
        if self.session {
            warn!("publisher: session to {} lost", self.server);
            self.session = false;
        }

        let params = SessionParams {
            server: &self.server,
            port: self.port,
            client_id: &self.client_id,
            will_topic: &self.topics.state,
            will_payload: STATE_OFFLINE,
            will_retained: true,
        };
        self.transport.connect(&params)?;

        if let Err(e) = self.subscribe_commands() {
            self.transport.disconnect();
            return Err(e);
        }

        self.session = true;
        self.sessions_opened = self.sessions_opened.wrapping_add(1);
        info!(
            "publisher: session {} open on {}:{} as {}",
            self.sessions_opened, self.server, self.port, self.client_id
        );

        let state_topic = self.topics.state.clone();
        self.publish(&state_topic, STATE_ONLINE.as_bytes(), true);
        self.log_event(LogCategory::Conn, 1, "Node online", address);
        Ok(true)
    }

    /// Subscribe to the command topic.  Called once per session.
    pub fn subscribe_commands(&mut self) -> Result<(), CommsError> {
        self.transport.subscribe(&self.topics.command)?;
        debug!("publisher: subscribed {}", self.topics.command);
        Ok(())
    }

    /// Close the session; the next `ensure_session` opens a fresh one.
    pub fn drop_session(&mut self) {
        if self.session || self.transport.is_connected() {
            self.transport.disconnect();
            info!("publisher: session closed");
        }
        self.session = false;
    }

    /// Switch to a new broker / topic configuration.  The running session
    /// is dropped.
    pub fn retarget(&mut self, config: &DeviceConfig, client_id: String) {
        self.drop_session();
        self.topics = Topics::new(config);
        self.server = config.mqtt_server.clone();
        self.port = config.mqtt_port;
        self.client_id = client_id;
    }

    // ── Outbound ──────────────────────────────────────────────

    /// Forward one message to the transport.  Without a session the
    /// message is dropped and `false` returned; transport errors are logged
    /// and absorbed.
    pub fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> bool {
        if !self.has_session() {
            debug!("publisher: no session, dropped {}", topic);
            return false;
        }
        match self.transport.publish(topic, payload, retained) {
            Ok(()) => true,
            Err(e) => {
                warn!("publisher: {} on {}", e, topic);
                false
            }
        }
    }

    /// Publish a remote log record on `.../log`.
    pub fn log_event(&mut self, category: LogCategory, id: u16, title: &str, data: &str) -> bool {
        info!("[{:?}] {} {}", category, title, data);
        let record = LogRecord::new(self.node, category, id, title, data);
        match serde_json::to_vec(&record) {
            Ok(json) => {
                let topic = self.topics.log.clone();
                self.publish(&topic, &json, false)
            }
            Err(_) => {
                warn!("publisher: log record not serialisable");
                false
            }
        }
    }

    pub fn heartbeat(&mut self, record: &HeartbeatRecord) -> bool {
        match serde_json::to_vec(record) {
            Ok(json) => {
                let topic = self.topics.heartbeat.clone();
                self.publish(&topic, &json, false)
            }
            Err(_) => {
                warn!("publisher: heartbeat not serialisable");
                false
            }
        }
    }

    // ── Inbound ───────────────────────────────────────────────

    /// Next message on the command topic, parsed.  Messages on other topics
    /// are discarded.
    pub fn poll_command(&mut self) -> Option<Result<NodeCommand, CommandError>> {
        while let Some(msg) = self.transport.poll_inbound() {
            if msg.topic == self.topics.command {
                return Some(NodeCommand::parse(&msg.payload));
            }
            debug!("publisher: ignoring message on {}", msg.topic);
        }
        None
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn sessions_opened(&self) -> u32 {
        self.sessions_opened
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
