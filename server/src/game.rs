//! Spawn placement and collision resolution

use crate::broadcast::send_one;
use crate::registry::{Registry, Session};
use bytes::Bytes;
use log::debug;
use rand::Rng;
use shared::{collide, encode, Field, MessageKind, Position, SPAWN_ATTEMPTS};
use std::f32::consts::TAU;
use std::sync::Arc;

/// Outcome of spawn placement
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Spawn {
    Placed(Position),
    /// Every attempt around `anchor` overlapped it
    Blocked { anchor: Position },
}

/// Chooses a starting point for a new session
///
/// The first session spawns at the origin. Later sessions are placed
/// `radius` units from a randomly chosen existing session, in a random
/// direction, retrying up to [`SPAWN_ATTEMPTS`] times while the candidate
/// overlaps that anchor.
pub fn find_spawn<R: Rng>(anchors: &[Position], radius: f32, rng: &mut R) -> Spawn {
    if anchors.is_empty() {
        return Spawn::Placed(Position::ORIGIN);
    }

    let anchor = anchors[rng.gen_range(0..anchors.len())];
    for _ in 0..SPAWN_ATTEMPTS {
        let direction = rng.gen_range(0.0..TAU);
        let candidate = Position::new(
            anchor.x + direction.cos() * radius,
            anchor.y + direction.sin() * radius,
        );
        if !collide(candidate, anchor) {
            return Spawn::Placed(candidate);
        }
    }
    Spawn::Blocked { anchor }
}

/// Position used when placement is blocked: `radius` units along +x from the
/// anchor, without an overlap check.
pub fn fallback_spawn(anchor: Position, radius: f32) -> Position {
    Position::new(anchor.x + radius, anchor.y)
}

/// A resolved collision between two sessions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Encounter {
    pub winner: u32,
    pub loser: u32,
    pub loser_vitality: f32,
}

/// Runs one collision scan on behalf of `session`
///
/// Only the first overlapping session in registry order is considered. The
/// side with strictly higher vitality wins, ties go to the other session.
/// The loser is eliminated and the winner receives a PeerEaten frame with
/// the loser's vitality.
pub async fn resolve_collision(registry: &Registry, session: &Arc<Session>) -> Option<Encounter> {
    let own = session.vitals().await;
    if !own.is_active() || session.is_terminated() {
        return None;
    }

    for other in registry.all().await {
        if other.id == session.id || other.is_terminated() {
            continue;
        }
        let theirs = other.vitals().await;
        if !collide(own.position(), theirs.position()) {
            continue;
        }

        let (winner, loser, loser_vitality) = if own.vitality > theirs.vitality {
            (session, &other, theirs.vitality)
        } else {
            (&other, session, own.vitality)
        };

        // Another scan may have claimed the loser first.
        if !loser.eliminate().await {
            return None;
        }

        let frame = Bytes::from(encode(
            MessageKind::PeerEaten,
            &[Field::Number(loser_vitality)],
        ));
        if let Err(e) = send_one(winner, frame).await {
            debug!("PeerEaten for session {} dropped: {}", winner.id, e);
        }
        debug!(
            "Session {} ate session {} (vitality {})",
            winner.id, loser.id, loser_vitality
        );

        return Some(Encounter {
            winner: winner.id,
            loser: loser.id,
            loser_vitality,
        });
    }
    None
}
