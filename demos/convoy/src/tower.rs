//! Towers shoot the nearest living creep in range

use crate::creep::Roster;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;
use weft_core::{now, Behaviour, Continuation, Event, Readiness, Signal, Timestamp};

#[derive(Debug, Clone, Copy)]
pub struct TowerSpec {
    pub position: [f32; 2],
    pub range: f32,
    pub damage: f32,
    /// Nanoseconds between shots
    pub cooldown: u64,
}

/// Output is the timestamp of the last shot
pub fn tower(
    name: &str,
    spec: TowerSpec,
    roster: Roster,
    ceasefire: Arc<AtomicBool>,
) -> Behaviour<Timestamp> {
    Behaviour::builder(name, Signal::new(0))
        .readiness(Readiness::Always)
        .step(move |step| {
            if ceasefire.load(Ordering::Acquire) {
                return Ok(Continuation::Terminate);
            }
            let current = now();
            if current.saturating_sub(step.current()) < spec.cooldown {
                return Ok(Continuation::Continue);
            }

            let [tx, ty] = spec.position;
            let target = roster
                .read()
                .iter()
                .filter(|c| c.is_alive())
                .map(|c| {
                    let [x, y] = c.position.read();
                    ((x - tx).powi(2) + (y - ty).powi(2), c.clone())
                })
                .filter(|(d2, _)| *d2 <= spec.range * spec.range)
                .min_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(_, c)| c);

            if let Some(creep) = target {
                trace!(tower = step.name(), creep = %creep.id, "fire");
                step.emit(creep.stream.as_ref(), Event::damage(step.id(), spec.damage));
                step.write_at(current, current);
            }
            Ok(Continuation::Continue)
        })
}
