//! Fan-out of pre-encoded frames to connected sessions

use crate::registry::{DeliveryError, Registry, Session};
use bytes::Bytes;
use log::warn;

/// Delivers `frame` to a single session
///
/// Frames for sessions that are not alive are dropped; the caller decides
/// whether any other failure is worth reporting.
pub async fn send_one(session: &Session, frame: Bytes) -> Result<(), DeliveryError> {
    session.deliver(frame).await
}

/// Delivers `frame` to every registered session except `exclude`
///
/// A failed delivery is logged and skipped; the remaining recipients still
/// get the frame. Returns the number of sessions the frame was queued for.
pub async fn send_all(registry: &Registry, frame: Bytes, exclude: Option<u32>) -> usize {
    let mut delivered = 0;
    for session in registry.all().await {
        if Some(session.id) == exclude {
            continue;
        }
        match send_one(&session, frame.clone()).await {
            Ok(()) => delivered += 1,
            Err(DeliveryError::NotAlive) => {}
            Err(e) => warn!("Failed to send to session {}: {}", session.id, e),
        }
    }
    delivered
}
