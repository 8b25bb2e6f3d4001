//! Convoy Example
//!
//! A column of creeps walks a route past two towers. Every creep is three
//! behaviours; the towers, the factory and the creeps all run on the weft
//! scheduler while the main thread acts as the driver: it requests spawns,
//! tracks the drawable set, counts deaths and takes one synchronized
//! "render" snapshot per tick.
//!
//! Usage: `convoy [scheduler.ron]`. Set `RUST_LOG=debug` for more output.

mod creep;
mod tower;

use creep::{CreepStats, Roster, Wiring};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::TowerSpec;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use weft_core::{
    Behaviour, Continuation, Event, Mailbox, NodeId, Payload, Readiness, Signal, Sink, Source,
    SpawnParams, Stream,
};
use weft_hub::{GenerationLatch, Latched, Scheduler, SchedulerConfig};
use weft_journal::{ExportFormat, Exporter, JournalConfig, JournalMode, StatsJournal};

const CREEPS: usize = 12;
const TICK: Duration = Duration::from_millis(10);
const TIME_LIMIT: Duration = Duration::from_secs(5);

fn load_config() -> Result<SchedulerConfig, Box<dyn std::error::Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let content = std::fs::read_to_string(&path)?;
            Ok(SchedulerConfig::from_ron_str(&content)?)
        }
        None => Ok(SchedulerConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    let journal = Arc::new(StatsJournal::new(JournalConfig::new(JournalMode::Sample)));
    let scheduler = Arc::new(Scheduler::with_telemetry(journal.clone()));

    journal.start_session("convoy", Some(config.worker_count()));
    journal.set_scheduling_mode(config.mode());
    scheduler.start(config.clone())?;
    info!(mode = %config.mode(), workers = config.worker_count(), "=== Convoy ===");

    // Wiring: created nodes go to the scheduler; deaths and drawables to the driver
    let spawner = Arc::new(Stream::new());
    spawner.add_sink(scheduler.as_sink());

    let mut deaths = Mailbox::new();
    let mut drawables_inbox = Mailbox::new();
    let render = Arc::new(Stream::new());
    render.add_sink(Arc::new(drawables_inbox.sink()));

    let roster: Roster = Arc::new(RwLock::new(Vec::new()));
    let wiring = Wiring {
        spawner: Arc::clone(&spawner),
        controller: Arc::new(deaths.sink()),
        render: Arc::clone(&render),
    };

    let stats = CreepStats {
        speed: 40.0,
        hit_points: 30.0,
    };
    let factory = creep::factory(stats, wiring, Arc::clone(&roster));
    let factory_inbox = factory.mailbox_sink();
    spawner.publish(Event::node_created(NodeId::EXTERNAL, Box::new(factory)));

    let ceasefire = Arc::new(AtomicBool::new(false));
    for (name, position) in [("tower-west", [60.0, 20.0]), ("tower-east", [140.0, -20.0])] {
        let spec = TowerSpec {
            position,
            range: 45.0,
            damage: 4.0,
            cooldown: 15_000_000,
        };
        let t = tower::tower(name, spec, Arc::clone(&roster), Arc::clone(&ceasefire));
        spawner.publish(Event::node_created(NodeId::EXTERNAL, Box::new(t)));
    }

    // Drive
    let latch = Arc::new(GenerationLatch::new(0));
    let frame: Arc<Mutex<Vec<[f32; 2]>>> = Arc::new(Mutex::new(Vec::new()));
    let mut drawables: HashSet<NodeId> = HashSet::new();
    let mut dead = 0usize;
    let mut requested = 0usize;
    let mut tick = 0u64;
    let started = Instant::now();

    while started.elapsed() < TIME_LIMIT && dead < CREEPS {
        tick += 1;

        if requested < CREEPS && tick % 5 == 1 {
            let params = SpawnParams::new([0.0, 0.0])
                .with_waypoint([100.0, 0.0])
                .with_waypoint([200.0, 0.0]);
            factory_inbox.handle_event(Event::targeted(
                NodeId::EXTERNAL,
                Payload::SpawnRequest(params),
            ));
            requested += 1;
        }

        for event in drawables_inbox.drain() {
            match event.payload() {
                Payload::AddDrawable(id) => {
                    drawables.insert(*id);
                }
                Payload::RemoveDrawable(id) => {
                    drawables.remove(id);
                }
                _ => {}
            }
        }
        for death in deaths.drain() {
            creep::forget(&roster, death.source());
            dead += 1;
        }

        latch.reset(1);
        let snapshot = render_task(Arc::clone(&roster), Arc::clone(&frame));
        scheduler.submit(Latched::boxed(Box::new(snapshot), Arc::clone(&latch)))?;
        if !latch.wait(Duration::from_secs(1)) {
            warn!(tick, "render snapshot missed its deadline");
        }

        if tick % 50 == 0 {
            info!(
                tick,
                alive = frame.lock().len(),
                drawables = drawables.len(),
                dead,
                "progress"
            );
        }
        std::thread::sleep(TICK);
    }

    ceasefire.store(true, Ordering::Release);
    factory_inbox.handle_event(Event::broadcast(NodeId::EXTERNAL, Payload::ForgetAll));
    for creep in roster.read().iter().filter(|c| c.is_alive()) {
        creep.stream.publish(Event::death(NodeId::EXTERNAL));
    }
    if !scheduler.wait_idle(Duration::from_secs(2)) {
        warn!("scheduler still busy at shutdown");
    }
    info!(stats = %scheduler.stats(), "final scheduler state");
    scheduler.stop();

    let report = journal.finish_session()?;
    println!("\nCreeps killed: {}/{} in {} ticks\n", dead, CREEPS, tick);
    println!("{}", Exporter::new(&report).export(ExportFormat::Text)?);

    Ok(())
}

/// One-shot task that copies every living creep's position into `frame`
fn render_task(roster: Roster, frame: Arc<Mutex<Vec<[f32; 2]>>>) -> Behaviour<usize> {
    Behaviour::builder("render", Signal::new(0usize))
        .readiness(Readiness::Always)
        .step(move |step| {
            let positions: Vec<[f32; 2]> = roster
                .read()
                .iter()
                .filter(|c| c.is_alive())
                .map(|c| c.position.read())
                .collect();
            step.write(positions.len());
            *frame.lock() = positions;
            Ok(Continuation::Terminate)
        })
}
