//! Creeps and the factory that spawns them
//!
//! A creep is three behaviours sharing one private stream:
//! - `waypoint` steers: velocity from position and the route
//! - `move` integrates: position from velocity
//! - `health` applies damage and announces death

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};
use weft_core::{
    now, Behaviour, Continuation, Event, EventKind, NodeId, Payload, Readiness, Signal,
    SignalReader, Sink, Source, SpawnParams, Stream,
};

/// What the rest of the world can see of a creep
#[derive(Clone)]
pub struct CreepView {
    pub id: NodeId,
    pub position: SignalReader<[f32; 2]>,
    pub health: SignalReader<f32>,
    /// Damage and death for this creep go here
    pub stream: Arc<Stream>,
}

impl CreepView {
    pub fn is_alive(&self) -> bool {
        self.health.read() > 0.0
    }
}

pub type Roster = Arc<RwLock<Vec<CreepView>>>;

/// Drop a dead creep's view so its stream and sinks can be freed
pub fn forget(roster: &Roster, id: NodeId) -> bool {
    let mut creeps = roster.write();
    let before = creeps.len();
    creeps.retain(|c| c.id != id);
    creeps.len() < before
}

#[derive(Debug, Clone, Copy)]
pub struct CreepStats {
    pub speed: f32,
    pub hit_points: f32,
}

/// Streams a creep reports to
#[derive(Clone)]
pub struct Wiring {
    /// Receives `NodeCreated` (the scheduler)
    pub spawner: Arc<Stream>,
    /// Receives targeted deaths (the driver)
    pub controller: Arc<dyn Sink>,
    /// Receives drawable-set membership changes
    pub render: Arc<Stream>,
}

fn has_died(events: &[Event]) -> bool {
    events.iter().any(|e| e.kind() == EventKind::Death)
}

/// Build the three behaviours of one creep and announce them
pub fn spawn_creep(params: &SpawnParams, stats: CreepStats, wiring: &Wiring, roster: &Roster) {
    let id = NodeId::next();
    let stream = Arc::new(Stream::with_id(id));

    let position = Signal::new(params.position);
    let velocity = Signal::new([0.0f32, 0.0]);
    let health = Signal::new(stats.hit_points);

    let route = params.waypoints.clone();
    let pos_in = position.reader();
    let mut leg = 0usize;
    let waypoint = Behaviour::builder("waypoint", velocity)
        .depends_on(position.reader())
        .readiness(Readiness::StalenessOrEvents)
        .step(move |step| {
            if has_died(step.events()) {
                return Ok(Continuation::Terminate);
            }
            let [x, y] = pos_in.read();
            while let Some(&[tx, ty]) = route.get(leg) {
                let (dx, dy) = (tx - x, ty - y);
                let dist = (dx * dx + dy * dy).sqrt();
                if dist > 1.0 {
                    step.write([dx / dist * stats.speed, dy / dist * stats.speed]);
                    return Ok(Continuation::Continue);
                }
                leg += 1;
            }
            step.write([0.0, 0.0]);
            Ok(Continuation::Continue)
        });

    let vel_in = waypoint.reader();
    let movement = Behaviour::builder("move", position)
        .depends_on(waypoint.reader())
        .readiness(Readiness::StalenessOrEvents)
        .step(move |step| {
            if has_died(step.events()) {
                return Ok(Continuation::Terminate);
            }
            let stamped = vel_in.snapshot();
            let current = now();
            let dt = current.saturating_sub(step.timestamp()) as f32 / 1e9;
            let [x, y] = step.current();
            let [vx, vy] = stamped.value;
            step.write_at([x + vx * dt, y + vy * dt], current);
            Ok(Continuation::Continue)
        });

    let creep_stream = Arc::clone(&stream);
    let controller = Arc::clone(&wiring.controller);
    let render = Arc::clone(&wiring.render);
    let vitals = Behaviour::builder("health", health)
        .id(id)
        .readiness(Readiness::PendingEvents)
        .step(move |step| {
            let mut hp = step.current();
            for event in step.take_events() {
                match event.payload() {
                    Payload::Damage(amount) => hp -= amount,
                    Payload::Death => return Ok(Continuation::Terminate),
                    _ => {}
                }
            }
            if hp <= 0.0 {
                step.write(0.0);
                step.announce_death(creep_stream.as_ref());
                step.emit(
                    controller.as_ref(),
                    Event::targeted(step.id(), Payload::Death),
                );
                step.emit(
                    render.as_ref(),
                    Event::broadcast(step.id(), Payload::RemoveDrawable(step.id())),
                );
                return Ok(Continuation::Terminate);
            }
            step.write(hp);
            Ok(Continuation::Continue)
        });

    stream.add_sink(waypoint.mailbox_sink());
    stream.add_sink(movement.mailbox_sink());
    stream.add_sink(vitals.mailbox_sink());

    roster.write().push(CreepView {
        id,
        position: movement.reader(),
        health: vitals.reader(),
        stream,
    });

    wiring
        .render
        .publish(Event::broadcast(id, Payload::AddDrawable(id)));
    for task in [
        Box::new(waypoint) as weft_core::TaskBox,
        Box::new(movement),
        Box::new(vitals),
    ] {
        wiring.spawner.publish(Event::node_created(id, task));
    }
    debug!(creep = %id, "creep spawned");
}

/// A behaviour that turns `SpawnRequest` events into creeps
pub fn factory(stats: CreepStats, wiring: Wiring, roster: Roster) -> Behaviour<u32> {
    Behaviour::builder("creep-factory", Signal::new(0u32))
        .readiness(Readiness::PendingEvents)
        .step(move |step| {
            let mut spawned = step.current();
            for event in step.take_events() {
                match event.payload() {
                    Payload::SpawnRequest(params) => {
                        spawn_creep(params, stats, &wiring, &roster);
                        spawned += 1;
                    }
                    Payload::ForgetAll => {
                        info!(spawned, "factory shutting down");
                        return Ok(Continuation::Terminate);
                    }
                    _ => {}
                }
            }
            step.write(spawned);
            Ok(Continuation::Continue)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::{Mailbox, Task};

    fn wiring(controller: &Mailbox, render: &Mailbox) -> (Wiring, Arc<Stream>) {
        let spawner = Arc::new(Stream::new());
        let render_stream = Arc::new(Stream::new());
        render_stream.add_sink(Arc::new(render.sink()));
        let wiring = Wiring {
            spawner: Arc::clone(&spawner),
            controller: Arc::new(controller.sink()),
            render: render_stream,
        };
        (wiring, spawner)
    }

    #[test]
    fn test_forget_prunes_dead_creep() {
        let controller = Mailbox::new();
        let render = Mailbox::new();
        let (wiring, _spawner) = wiring(&controller, &render);
        let roster: Roster = Arc::new(RwLock::new(Vec::new()));
        let stats = CreepStats {
            speed: 1.0,
            hit_points: 5.0,
        };

        spawn_creep(&SpawnParams::new([0.0, 0.0]), stats, &wiring, &roster);
        spawn_creep(&SpawnParams::new([5.0, 0.0]), stats, &wiring, &roster);
        let doomed = roster.read()[0].id;

        assert!(forget(&roster, doomed));
        assert!(!forget(&roster, doomed));
        let remaining: Vec<NodeId> = roster.read().iter().map(|c| c.id).collect();
        assert_eq!(remaining.len(), 1);
        assert!(!remaining.contains(&doomed));
    }

    #[test]
    fn test_lethal_damage_reports_death_to_controller() {
        let mut controller = Mailbox::new();
        let render = Mailbox::new();
        let (wiring, spawner) = wiring(&controller, &render);
        let mut created = Mailbox::new();
        spawner.add_sink(Arc::new(created.sink()));
        let roster: Roster = Arc::new(RwLock::new(Vec::new()));
        let stats = CreepStats {
            speed: 1.0,
            hit_points: 5.0,
        };

        spawn_creep(&SpawnParams::new([0.0, 0.0]), stats, &wiring, &roster);
        let view = roster.read()[0].clone();
        let mut health = created
            .drain()
            .into_iter()
            .filter_map(|e| match e.payload() {
                Payload::NodeCreated(spawned) => spawned.take().ok(),
                _ => None,
            })
            .find(|t| t.name() == "health")
            .unwrap();

        view.stream.publish(Event::damage(NodeId::EXTERNAL, 10.0));
        assert!(health.is_ready());
        assert_eq!(health.run().unwrap(), Continuation::Terminate);
        assert!(!view.is_alive());

        let deaths = controller.drain();
        assert_eq!(deaths.len(), 1);
        assert!(forget(&roster, deaths[0].source()));
        assert!(roster.read().is_empty());
    }
}
