//! Live session roster for the relay server
//!
//! This module holds the server-side record of every connected participant:
//! - Session identity (id, display name) and last reported state
//! - The outbound queue feeding the session's connection task
//! - The elimination signal used to force a connection closed
//!
//! The registry is the only structure shared between connection tasks. Scans
//! are linear over an insertion-ordered list, which is fine for the expected
//! population of a single arena.

use bytes::Bytes;
use shared::{PeerInfo, Position, StateUpdate};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, Notify, RwLock};

/// Frames a session may have queued before further frames are dropped
pub const OUTBOUND_CAPACITY: usize = 64;

/// Mutable per-session state read by scans from other sessions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vitals {
    pub vitality: f32,
    pub x: f32,
    pub y: f32,
    pub alive: bool,
}

impl Vitals {
    pub fn spawned(position: Position, vitality: f32) -> Self {
        Self {
            vitality,
            x: position.x,
            y: position.y,
            alive: true,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// Whether the session's periodic timers should still act
    pub fn is_active(&self) -> bool {
        self.alive && self.vitality > 0.0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("session is not alive")]
    NotAlive,
    #[error("connection is closed")]
    Closed,
    #[error("outbound queue is full")]
    Full,
}

/// Represents one connected participant
///
/// The connection handle itself stays with the connection task; the session
/// only keeps the sending end of its outbound queue and a kill switch.
#[derive(Debug)]
pub struct Session {
    /// Unique, never reused identifier
    pub id: u32,
    /// Human-readable name assigned at connect time
    pub name: String,
    vitals: Mutex<Vitals>,
    outbound: mpsc::Sender<Bytes>,
    terminated: AtomicBool,
    kill: Notify,
}

impl Session {
    pub fn new(
        id: u32,
        name: String,
        vitals: Vitals,
        outbound: mpsc::Sender<Bytes>,
    ) -> Self {
        Self {
            id,
            name,
            vitals: Mutex::new(vitals),
            outbound,
            terminated: AtomicBool::new(false),
            kill: Notify::new(),
        }
    }

    pub async fn vitals(&self) -> Vitals {
        *self.vitals.lock().await
    }

    pub async fn info(&self) -> PeerInfo {
        let vitals = self.vitals().await;
        PeerInfo {
            id: self.id,
            name: self.name.clone(),
            vitality: vitals.vitality,
            x: vitals.x,
            y: vitals.y,
        }
    }

    /// Overwrites position and vitality with a client report
    ///
    /// A report revives the alive flag unless the session is already being
    /// torn down.
    pub async fn apply_state(&self, update: &StateUpdate) -> Vitals {
        let mut vitals = self.vitals.lock().await;
        vitals.alive = !self.is_terminated();
        vitals.vitality = update.vitality;
        vitals.x = update.x;
        vitals.y = update.y;
        *vitals
    }

    /// Queues a frame for the connection task if the session is alive
    ///
    /// Frames for sessions that are no longer alive, whose connection task
    /// has stopped draining the queue, or whose queue is full are refused.
    pub async fn deliver(&self, frame: Bytes) -> Result<(), DeliveryError> {
        if !self.vitals.lock().await.alive {
            return Err(DeliveryError::NotAlive);
        }
        self.enqueue(frame)
    }

    /// Queues a frame without waiting, regardless of the alive flag
    pub fn enqueue(&self, frame: Bytes) -> Result<(), DeliveryError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Marks the session for forced closure and wakes its connection task
    ///
    /// Returns false if the session was already eliminated or closing, so
    /// concurrent eliminators cannot both claim the same loser.
    pub async fn eliminate(&self) -> bool {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.vitals.lock().await.alive = false;
        self.kill.notify_one();
        true
    }

    /// Marks the session closed without signalling the connection task
    pub async fn mark_closed(&self) {
        self.terminated.store(true, Ordering::Release);
        self.vitals.lock().await.alive = false;
    }

    /// Resolves once [`Session::eliminate`] has been called
    pub async fn killed(&self) {
        self.kill.notified().await;
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}

/// Manages all connected sessions and id allocation
///
/// Ids start from 1 and increment for each new connection; they are never
/// handed out twice by the same registry.
#[derive(Debug)]
pub struct Registry {
    sessions: RwLock<Vec<Arc<Session>>>,
    next_id: AtomicU32,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(Vec::new()),
            next_id: AtomicU32::new(1),
        }
    }

    fn next_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers a new session built by `build`
    ///
    /// `build` receives the positions of every registered session and the
    /// id allocated for the newcomer. The registry stays write-locked from
    /// the position scan until the new session is pushed, so concurrent
    /// admissions always see each other.
    pub async fn admit<F>(&self, build: F) -> Arc<Session>
    where
        F: FnOnce(&[Position], u32) -> Arc<Session>,
    {
        let mut sessions = self.sessions.write().await;
        let mut anchors = Vec::with_capacity(sessions.len());
        for existing in sessions.iter() {
            anchors.push(existing.vitals().await.position());
        }

        let session = build(&anchors, self.next_id());
        sessions.push(Arc::clone(&session));
        session
    }

    /// Removes the session with `id`
    ///
    /// Returns false if it was already gone; other sessions are untouched
    /// either way.
    pub async fn remove(&self, id: u32) -> bool {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|session| session.id != id);
        sessions.len() != before
    }

    /// Snapshot of the live sessions in insertion order
    pub async fn all(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.clone()
    }

    pub async fn get(&self, id: u32) -> Option<Arc<Session>> {
        self.sessions
            .read()
            .await
            .iter()
            .find(|session| session.id == id)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
