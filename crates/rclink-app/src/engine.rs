//! Control engine: turns input messages into session commands
//!
//! Movement keys and the horn are momentary: pressing sets them `true` once
//! (auto-repeat presses are ignored) and releasing sets them `false`. Every
//! other control flips on press and ignores release.

use std::collections::HashSet;

use serde::Serialize;
use tokio::sync::broadcast;

use rclink_channel::{connect_with, ReceiverStats, Session, SessionEvent};
use rclink_core::prelude::*;
use rclink_core::{CommandKey, Severity, Telemetry, TelemetryKey, Value};

use crate::config::Settings;
use crate::message::Message;

/// What processing a message did
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A command table carrying `key = value` was transmitted
    Sent { key: CommandKey, value: Value },

    /// Nothing needed to be sent
    Unchanged,

    /// Current dashboard, in reply to [`Message::Status`]
    Status(Dashboard),

    /// The session was closed
    Closed { stats: Option<ReceiverStats> },
}

/// Snapshot of what a driver display shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub telemetry: Telemetry,
    pub distance_severity: Severity,
    pub speed_severity: Severity,
    /// Toggle controls the vehicle reports as on
    pub active: Vec<CommandKey>,
}

/// Owns a session and applies the control rules to it.
pub struct Engine {
    session: Session,
    settings: Settings,
    /// Momentary controls currently held down
    held: HashSet<CommandKey>,
}

impl Engine {
    pub fn new(session: Session, settings: Settings) -> Self {
        Self {
            session,
            settings,
            held: HashSet::new(),
        }
    }

    /// Connect and authenticate using `settings`.
    ///
    /// `credential` overrides the one in the config file. The session is not
    /// receiving yet; call [`Engine::start`].
    pub async fn connect(settings: Settings, credential: Option<&str>) -> Result<Self> {
        let options = settings.connect_options(credential).ok_or_else(|| {
            Error::config("no credential given (use --credential, RCLINK_CREDENTIAL or config)")
        })?;

        let session = connect_with(options).await?;
        Ok(Self::new(session, settings))
    }

    /// Subscribe to session events, then start the receiver.
    ///
    /// The returned receiver sees every event, including telemetry that came
    /// with the handshake and a hang-up right after it.
    pub fn start(&mut self) -> Result<broadcast::Receiver<SessionEvent>> {
        let events = self.session.subscribe();
        self.session.start()?;
        Ok(events)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_held(&self, key: CommandKey) -> bool {
        self.held.contains(&key)
    }

    pub async fn process_message(&mut self, message: Message) -> Result<Outcome> {
        match message {
            Message::Press(key) if key.is_momentary() => {
                if !self.held.insert(key) {
                    return Ok(Outcome::Unchanged);
                }
                self.send(key, Value::Bool(true)).await
            }
            Message::Press(key) | Message::Toggle(key) => {
                let next = self.session.toggle(key).await?;
                Ok(Outcome::Sent {
                    key,
                    value: Value::Bool(next),
                })
            }
            Message::Release(key) => {
                if !self.held.remove(&key) {
                    return Ok(Outcome::Unchanged);
                }
                self.send(key, Value::Bool(false)).await
            }
            Message::Set(key, value) => {
                if key.is_momentary() {
                    if value.is_truthy() {
                        self.held.insert(key);
                    } else {
                        self.held.remove(&key);
                    }
                }
                self.send(key, value).await
            }
            Message::Status => Ok(Outcome::Status(self.dashboard().await)),
            Message::Quit => Ok(Outcome::Closed {
                stats: self.shutdown().await,
            }),
        }
    }

    async fn send(&self, key: CommandKey, value: Value) -> Result<Outcome> {
        self.session.set(key, value).await?;
        Ok(Outcome::Sent { key, value })
    }

    /// Telemetry and active toggles from one consistent read.
    pub async fn dashboard(&self) -> Dashboard {
        let toggles: Vec<CommandKey> = CommandKey::ALL
            .iter()
            .copied()
            .filter(|key| !key.is_momentary())
            .collect();

        let mut names: Vec<&str> = TelemetryKey::ALL.iter().map(|key| key.as_str()).collect();
        names.extend(toggles.iter().map(|key| key.as_str()));

        let values = self.session.get_many(&names).await;
        let telemetry = Telemetry::from_values(values[0], values[1], values[2]);
        let active = toggles
            .into_iter()
            .zip(values.into_iter().skip(TelemetryKey::ALL.len()))
            .filter(|(_, value)| value.is_truthy())
            .map(|(key, _)| key)
            .collect();

        Dashboard {
            distance_severity: telemetry.distance_severity(),
            speed_severity: telemetry.speed_severity(),
            telemetry,
            active,
        }
    }

    /// Stop the vehicle and close the session.
    ///
    /// Held momentary controls are released and, if configured, autonomous
    /// modes are switched off, in a single transmission. Safe to call twice.
    pub async fn shutdown(&mut self) -> Option<ReceiverStats> {
        if self.session.is_deactivated() {
            return None;
        }

        let mut entries: Vec<(CommandKey, Value)> = self
            .held
            .drain()
            .map(|key| (key, Value::Bool(false)))
            .collect();
        if self.settings.controls.disengage_on_exit {
            entries.extend(CommandKey::AUTONOMY.iter().map(|key| (*key, Value::Bool(false))));
        }

        if !entries.is_empty() {
            if let Err(e) = self.session.set_many(entries).await {
                warn!("Failed to stop the vehicle before closing: {}", e);
            }
        }

        self.session.deactivate().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rclink_channel::test_utils::{session_pair, FakePeer};
    use rclink_channel::SessionOptions;
    use std::time::Duration;

    fn unstarted_engine(settings: Settings) -> (Engine, FakePeer) {
        let (session, peer) = session_pair(SessionOptions {
            shutdown_timeout: Duration::from_millis(200),
            ..Default::default()
        });
        (Engine::new(session, settings), peer)
    }

    fn engine_pair(settings: Settings) -> (Engine, FakePeer) {
        let (mut engine, peer) = unstarted_engine(settings);
        engine.start().unwrap();
        (engine, peer)
    }

    #[tokio::test]
    async fn test_start_sees_greeting_telemetry() {
        let (mut engine, mut peer) = unstarted_engine(Settings::default());

        // Telemetry already waiting when the receiver starts
        peer.telemetry.send(r#"{"speed":4}"#).await;
        let mut events = engine.start().unwrap();
        peer.telemetry.expect_ack().await;

        let event = events.recv().await.unwrap();
        assert!(matches!(event, SessionEvent::DataReceived { sequence: 1, .. }));
        assert!(matches!(engine.start(), Err(Error::AlreadyStarted)));
    }

    #[tokio::test]
    async fn test_momentary_press_ignores_repeat() {
        let (mut engine, mut peer) = engine_pair(Settings::default());

        let first = engine
            .process_message(Message::Press(CommandKey::Forward))
            .await
            .unwrap();
        assert_eq!(
            first,
            Outcome::Sent {
                key: CommandKey::Forward,
                value: Value::Bool(true)
            }
        );
        assert!(engine.is_held(CommandKey::Forward));

        let repeat = engine
            .process_message(Message::Press(CommandKey::Forward))
            .await
            .unwrap();
        assert_eq!(repeat, Outcome::Unchanged);

        engine
            .process_message(Message::Release(CommandKey::Forward))
            .await
            .unwrap();

        let pressed = peer.commands.next_table().await.unwrap();
        let released = peer.commands.next_table().await.unwrap();
        assert_eq!(pressed["forward"], Value::Bool(true));
        assert_eq!(released["forward"], Value::Bool(false));
    }

    #[tokio::test]
    async fn test_release_without_press_is_ignored() {
        let (mut engine, _peer) = engine_pair(Settings::default());
        let outcome = engine
            .process_message(Message::Release(CommandKey::Horn))
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
    }

    #[tokio::test]
    async fn test_toggle_control_flips_on_press() {
        let (mut engine, mut peer) = engine_pair(Settings::default());

        let on = engine
            .process_message(Message::Press(CommandKey::Lights))
            .await
            .unwrap();
        let release = engine
            .process_message(Message::Release(CommandKey::Lights))
            .await
            .unwrap();
        let off = engine
            .process_message(Message::Press(CommandKey::Lights))
            .await
            .unwrap();

        assert_eq!(
            on,
            Outcome::Sent {
                key: CommandKey::Lights,
                value: Value::Bool(true)
            }
        );
        assert_eq!(release, Outcome::Unchanged);
        assert_eq!(
            off,
            Outcome::Sent {
                key: CommandKey::Lights,
                value: Value::Bool(false)
            }
        );
        assert_eq!(peer.commands.next_table().await.unwrap()["lights"], Value::Bool(true));
        assert_eq!(peer.commands.next_table().await.unwrap()["lights"], Value::Bool(false));
    }

    #[tokio::test]
    async fn test_dashboard_reads_reported_state() {
        let (mut engine, mut peer) = unstarted_engine(Settings::default());
        let mut events = engine.start().unwrap();

        peer.telemetry
            .send(r#"{"distance":8,"speed":22.5,"line":true,"line_following":true}"#)
            .await;
        peer.telemetry.expect_ack().await;
        events.recv().await.unwrap();

        let dashboard = engine.dashboard().await;
        assert_eq!(dashboard.telemetry.distance, 8.0);
        assert!(dashboard.telemetry.line);
        assert_eq!(dashboard.distance_severity, Severity::Critical);
        assert_eq!(dashboard.speed_severity, Severity::Warning);
        assert_eq!(dashboard.active, vec![CommandKey::LineFollowing]);
    }

    #[tokio::test]
    async fn test_quit_stops_vehicle_and_closes() {
        let (mut engine, mut peer) = engine_pair(Settings::default());

        engine
            .process_message(Message::Press(CommandKey::Backward))
            .await
            .unwrap();
        engine
            .process_message(Message::Press(CommandKey::KeepContained))
            .await
            .unwrap();

        let vehicle = tokio::spawn(async move {
            let tables = peer.commands.wait_closed().await;
            drop(peer.telemetry);
            tables
        });

        let outcome = engine.process_message(Message::Quit).await.unwrap();
        assert!(matches!(outcome, Outcome::Closed { stats: Some(_) }));
        assert!(!engine.is_held(CommandKey::Backward));

        let tables = vehicle.await.unwrap();
        let last = tables.last().unwrap();
        assert_eq!(tables.len(), 3);
        assert_eq!(last["backward"], Value::Bool(false));
        assert_eq!(last["keep_contained"], Value::Bool(false));
        assert_eq!(last["distance_keeping"], Value::Bool(false));

        // Already closed
        assert!(engine.shutdown().await.is_none());
        assert!(matches!(
            engine.process_message(Message::Press(CommandKey::Horn)).await,
            Err(Error::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn test_quit_keeps_autonomy_when_configured() {
        let mut settings = Settings::default();
        settings.controls.disengage_on_exit = false;
        let (mut engine, mut peer) = engine_pair(settings);

        engine
            .process_message(Message::Set(CommandKey::LineFollowing, Value::Bool(true)))
            .await
            .unwrap();

        let vehicle = tokio::spawn(async move {
            let tables = peer.commands.wait_closed().await;
            drop(peer.telemetry);
            tables
        });
        engine.process_message(Message::Quit).await.unwrap();

        let tables = vehicle.await.unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0]["line_following"], Value::Bool(true));
    }

    #[tokio::test]
    async fn test_connect_without_credential_fails() {
        let result = Engine::connect(Settings::default(), None).await;
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
