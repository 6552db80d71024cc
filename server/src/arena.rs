//! Session lifecycle for the relay server
//!
//! The arena composes the registry, spawn placement, fan-out and collision
//! resolution into the transitions a connection goes through:
//! - `open`: place, register and greet a new session
//! - `announce` / `reannounce`: tell peers about each other
//! - `handle_frame`: apply and relay a client's state report
//! - `collide`: one collision scan on the session's behalf
//! - `close`: tell everyone the session left and forget it
//!
//! The arena never owns a connection. Each connection task calls into it and
//! is the only caller for its own session, which serializes a session's
//! handlers relative to each other.

use crate::broadcast::{send_all, send_one};
use crate::config::ServerConfig;
use crate::game::{fallback_spawn, find_spawn, resolve_collision, Encounter, Spawn};
use crate::names::NameGenerator;
use crate::registry::{Registry, Session, Vitals};
use bytes::Bytes;
use log::{debug, info, warn};
use shared::{encode, Field, MessageKind, PeerInfo, Position, ProtocolError, StateUpdate};
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct Arena {
    registry: Registry,
    config: ServerConfig,
    names: Box<dyn NameGenerator>,
}

impl Arena {
    pub fn new(config: ServerConfig, names: Box<dyn NameGenerator>) -> Self {
        Self {
            registry: Registry::new(),
            config,
            names,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Creates and registers a session for a freshly accepted connection
    ///
    /// The new session is sent its own InitSelf before it becomes visible to
    /// anyone else.
    pub async fn open(&self, outbound: mpsc::Sender<Bytes>) -> Arc<Session> {
        let session = self
            .registry
            .admit(|anchors, id| {
                let mut rng = rand::thread_rng();
                let spawn = find_spawn(anchors, self.config.spawn_radius, &mut rng);
                let position = self.resolve_spawn(spawn);
                let info = PeerInfo {
                    id,
                    name: self.names.generate(),
                    vitality: self.config.initial_vitality,
                    x: position.x,
                    y: position.y,
                };

                let session = Session::new(
                    id,
                    info.name.clone(),
                    Vitals::spawned(position, info.vitality),
                    outbound,
                );
                let init = Bytes::from(info.encode_as(MessageKind::InitSelf));
                if let Err(e) = session.enqueue(init) {
                    warn!("Failed to greet session {}: {}", id, e);
                }
                Arc::new(session)
            })
            .await;

        let position = session.vitals().await.position();
        info!(
            "Session {} connected as {:?} at ({:.1}, {:.1}), {} online",
            session.id,
            session.name,
            position.x,
            position.y,
            self.registry.len().await
        );
        session
    }

    fn resolve_spawn(&self, spawn: Spawn) -> Position {
        match spawn {
            Spawn::Placed(position) => position,
            Spawn::Blocked { anchor } => {
                let position = fallback_spawn(anchor, self.config.spawn_radius);
                warn!(
                    "No free spawn around ({:.1}, {:.1}), using ({:.1}, {:.1})",
                    anchor.x, anchor.y, position.x, position.y
                );
                position
            }
        }
    }

    /// Delayed first announcement: catches the session up on every existing
    /// peer, then introduces it to all of them.
    pub async fn announce(&self, session: &Arc<Session>) {
        for other in self.registry.all().await {
            if other.id == session.id || other.is_terminated() {
                continue;
            }
            let frame = Bytes::from(other.info().await.encode_as(MessageKind::PeerState));
            if let Err(e) = send_one(session, frame).await {
                debug!("Catch-up for session {} dropped: {}", session.id, e);
            }
        }
        self.broadcast_presence(session).await;
    }

    /// Heartbeat announcement while the session is alive with vitality left
    pub async fn reannounce(&self, session: &Arc<Session>) {
        if session.vitals().await.is_active() {
            self.broadcast_presence(session).await;
        }
    }

    async fn broadcast_presence(&self, session: &Arc<Session>) {
        let frame = Bytes::from(session.info().await.encode_as(MessageKind::PeerState));
        send_all(&self.registry, frame, Some(session.id)).await;
    }

    /// Handles one inbound binary frame from `session`
    ///
    /// Only StateUpdate frames are acted on. The frame is relayed to every
    /// other session exactly as received, unless the report leaves the
    /// session without vitality, in which case it is eliminated instead.
    pub async fn handle_frame(
        &self,
        session: &Arc<Session>,
        frame: Bytes,
    ) -> Result<(), ProtocolError> {
        if session.is_terminated() {
            return Ok(());
        }

        let header = shared::decode(&frame)?;
        if header.kind() != Some(MessageKind::StateUpdate) {
            debug!(
                "Ignoring message kind {} from session {}",
                header.kind, session.id
            );
            return Ok(());
        }

        let update = StateUpdate::decode(&frame)?;
        let vitals = session.apply_state(&update).await;
        if vitals.vitality <= 0.0 {
            self.eliminate(session).await;
        } else {
            send_all(&self.registry, frame, Some(session.id)).await;
        }
        Ok(())
    }

    /// Forces `session` closed; its connection task runs the close transition
    pub async fn eliminate(&self, session: &Session) -> bool {
        let eliminated = session.eliminate().await;
        if eliminated {
            debug!("Session {} eliminated", session.id);
        }
        eliminated
    }

    /// One collision scan on behalf of `session`
    pub async fn collide(&self, session: &Arc<Session>) -> Option<Encounter> {
        resolve_collision(&self.registry, session).await
    }

    /// Final transition of a connection, whether the client left or was
    /// eliminated
    pub async fn close(&self, session: &Arc<Session>) {
        session.mark_closed().await;
        if self.registry.get(session.id).await.is_none() {
            return;
        }

        let frame = Bytes::from(encode(MessageKind::PeerLeft, &[Field::Id(session.id)]));
        send_all(&self.registry, frame, Some(session.id)).await;
        self.registry.remove(session.id).await;

        info!(
            "Session {} disconnected: {:?}, {} online",
            session.id,
            session.name,
            self.registry.len().await
        );
    }
}
