//! Scheduler - the public face of the worker pool
//!
//! A `Scheduler` is either stopped or running one session. `start` builds a
//! fresh session and spawns its workers; `stop` signals them, joins them and
//! throws the session away. Work can only be submitted while running.
//!
//! The scheduler is also a [`Sink`]: wire it to a stream and every
//! `NodeCreated` event published there submits the carried node.

use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::mode::SchedulingMode;
use crate::session::Session;
use crate::stats::SchedulerStats;
use crate::worker;
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};
use weft_core::{Event, NoopTelemetry, Payload, Sink, TaskBox, TelemetrySink};

struct Running {
    session: Arc<Session>,
    threads: Vec<JoinHandle<()>>,
}

/// Multi-worker executor for recurring tasks
pub struct Scheduler {
    state: RwLock<Option<Running>>,
    telemetry: Arc<dyn TelemetrySink>,
}

impl Scheduler {
    /// Create a stopped scheduler that discards telemetry
    pub fn new() -> Self {
        Self::with_telemetry(Arc::new(NoopTelemetry))
    }

    /// Create a stopped scheduler reporting to `telemetry`
    pub fn with_telemetry(telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            state: RwLock::new(None),
            telemetry,
        }
    }

    /// Start a new session
    ///
    /// Fails with `AlreadyRunning` if a session is active.
    pub fn start(&self, config: SchedulerConfig) -> Result<()> {
        let mut state = self.state.write();
        if state.is_some() {
            return Err(Error::AlreadyRunning);
        }

        let session = Arc::new(Session::new(&config, Arc::clone(&self.telemetry)));
        let mut threads = Vec::with_capacity(session.workers().len());
        for handle in session.workers() {
            let index = handle.index();
            let spawned = thread::Builder::new()
                .name(format!("weft-worker-{index}"))
                .spawn({
                    let session = Arc::clone(&session);
                    let handle = Arc::clone(handle);
                    move || worker::run(session, handle)
                });
            match spawned {
                Ok(join) => threads.push(join),
                Err(source) => {
                    warn!(index, error = %source, "worker spawn failed; rolling back start");
                    shut_down(Running { session, threads });
                    return Err(Error::WorkerSpawn { index, source });
                }
            }
        }

        info!(mode = %config.mode(), workers = config.worker_count(), "scheduler started");
        *state = Some(Running { session, threads });
        Ok(())
    }

    /// Start with just a mode and worker count
    pub fn start_with(&self, mode: SchedulingMode, worker_count: usize) -> Result<()> {
        self.start(SchedulerConfig::new(mode, worker_count))
    }

    /// Stop the running session; a no-op when already stopped
    ///
    /// Blocks until every worker has exited. Queued and in-flight
    /// continuations are discarded.
    pub fn stop(&self) {
        let running = self.state.write().take();
        match running {
            Some(running) => {
                shut_down(running);
                info!("scheduler stopped");
            }
            None => trace!("stop on a stopped scheduler"),
        }
    }

    /// Submit a task for execution
    ///
    /// Fails with `NotRunning` when stopped; the task is dropped.
    pub fn submit(&self, task: TaskBox) -> Result<()> {
        let state = self.state.read();
        match state.as_ref() {
            Some(running) => {
                running.session.submit(task);
                Ok(())
            }
            None => {
                debug!(task = %task.id(), name = task.name(), "submit while stopped; dropping task");
                Err(Error::NotRunning)
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.read().is_some()
    }

    /// Mode of the running session
    pub fn mode(&self) -> Option<SchedulingMode> {
        self.state.read().as_ref().map(|r| r.session.mode())
    }

    /// Worker count of the running session, zero when stopped
    pub fn worker_count(&self) -> usize {
        self.state
            .read()
            .as_ref()
            .map_or(0, |r| r.session.workers().len())
    }

    /// Whether the ready queue holds work or any dispatched task is unfinished
    ///
    /// Tasks parked in the waiting set do not count: a set of permanently
    /// stale tasks would otherwise keep the scheduler busy forever.
    pub fn is_busy(&self) -> bool {
        self.state
            .read()
            .as_ref()
            .is_some_and(|r| r.session.is_busy())
    }

    /// Wait until `is_busy` turns false; false on timeout
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.is_busy() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_micros(50));
        }
    }

    /// This scheduler as a stream sink that registers created nodes
    pub fn as_sink(self: &Arc<Self>) -> Arc<dyn Sink> {
        Arc::clone(self) as Arc<dyn Sink>
    }

    pub fn stats(&self) -> SchedulerStats {
        self.state
            .read()
            .as_ref()
            .map(|r| r.session.stats())
            .unwrap_or_default()
    }
}

fn shut_down(running: Running) {
    let Running { session, threads } = running;
    session.begin_shutdown();
    for join in threads {
        let name = join.thread().name().unwrap_or("weft-worker").to_string();
        if join.join().is_err() {
            warn!(worker = %name, "worker thread panicked");
        }
    }
    session.discard();
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Sink for Scheduler {
    fn handle_event(&self, event: Event) {
        let Payload::NodeCreated(spawned) = event.payload() else {
            trace!(kind = ?event.kind(), "scheduler ignores event");
            return;
        };
        match spawned.take() {
            Ok(task) => {
                if let Err(err) = self.submit(task) {
                    warn!(node = %spawned.id(), error = %err, "could not schedule created node");
                }
            }
            Err(err) => debug!(node = %spawned.id(), error = %err, "created node already claimed"),
        }
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::max_workers;
    use crate::latch::{GenerationLatch, Latched};
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use weft_core::{
        Behaviour, Continuation, NodeId, Readiness, Signal, Source, Stream, Task,
    };

    const DEADLINE: Duration = Duration::from_secs(10);

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + DEADLINE;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        cond()
    }

    /// Runs `limit` generations, counting each
    fn counting(name: &str, runs: &Arc<AtomicUsize>, limit: usize) -> TaskBox {
        let runs = Arc::clone(runs);
        Box::new(
            Behaviour::builder(name, Signal::new(0usize))
                .readiness(Readiness::Always)
                .step(move |_| {
                    let n = runs.fetch_add(1, Ordering::SeqCst) + 1;
                    Ok((n < limit).into())
                }),
        )
    }

    /// Never ready under the staleness rule
    fn stale_forever() -> TaskBox {
        let upstream = Signal::with_timestamp(0u8, 1);
        Box::new(
            Behaviour::builder("stale", Signal::with_timestamp(0u8, u64::MAX))
                .depends_on(upstream.reader())
                .step(|_| Ok(Continuation::Continue)),
        )
    }

    #[test]
    fn test_lifecycle() {
        let scheduler = Scheduler::new();
        assert!(!scheduler.is_running());
        assert!(matches!(
            scheduler.submit(stale_forever()),
            Err(Error::NotRunning)
        ));

        scheduler.start_with(SchedulingMode::Unordered, 1).unwrap();
        assert!(scheduler.is_running());
        assert_eq!(scheduler.mode(), Some(SchedulingMode::Unordered));
        assert_eq!(scheduler.worker_count(), 1);
        assert!(matches!(
            scheduler.start_with(SchedulingMode::Unordered, 1),
            Err(Error::AlreadyRunning)
        ));

        scheduler.stop();
        assert!(!scheduler.is_running());
        scheduler.stop();
        assert_eq!(scheduler.stats(), SchedulerStats::default());
    }

    #[test]
    fn test_continuation_runs_each_generation_once() {
        let scheduler = Scheduler::new();
        scheduler.start_with(SchedulingMode::Unordered, 2).unwrap();

        let runs = Arc::new(AtomicUsize::new(0));
        scheduler.submit(counting("five", &runs, 5)).unwrap();

        assert!(wait_for(|| runs.load(Ordering::SeqCst) == 5));
        assert!(scheduler.wait_idle(DEADLINE));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(runs.load(Ordering::SeqCst), 5);
        assert_eq!(scheduler.stats().executed, 5);
        scheduler.stop();
    }

    #[test]
    fn test_restart_starts_clean() {
        let scheduler = Scheduler::new();
        scheduler
            .start_with(SchedulingMode::OrderedPrecompute, 2)
            .unwrap();
        scheduler.submit(stale_forever()).unwrap();
        assert_eq!(scheduler.stats().waiting, 1);
        assert_eq!(scheduler.stats().waited, 1);
        assert!(!scheduler.is_busy());
        scheduler.stop();

        scheduler.start_with(SchedulingMode::OrderedRetry, 2).unwrap();
        let stats = scheduler.stats();
        assert_eq!(stats.ready, 0);
        assert_eq!(stats.waiting, 0);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.submitted, 0);
        assert_eq!(stats.waited, 0);
        scheduler.stop();
    }

    #[test]
    fn test_unordered_ignores_readiness() {
        let scheduler = Scheduler::new();
        scheduler.start_with(SchedulingMode::Unordered, 1).unwrap();

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let upstream = Signal::with_timestamp(0u8, 1);
        let task = Behaviour::builder("stale", Signal::with_timestamp(0u8, u64::MAX))
            .depends_on(upstream.reader())
            .step(move |_| {
                flag.store(true, Ordering::SeqCst);
                Ok(Continuation::Terminate)
            });
        assert!(!task.is_ready());
        scheduler.submit(Box::new(task)).unwrap();

        assert!(wait_for(|| ran.load(Ordering::SeqCst)));
        scheduler.stop();
    }

    /// Consumer submitted while its producer is behind; the producer's first
    /// run makes it ready. Returns the scheduler for stats inspection.
    fn producer_consumer(mode: SchedulingMode) -> (Scheduler, Arc<AtomicBool>) {
        let scheduler = Scheduler::new();
        scheduler.start_with(mode, 2).unwrap();

        let mut produced = Signal::with_timestamp(0i64, 1);
        let consumed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&consumed);
        let consumer = Behaviour::builder("consumer", Signal::with_timestamp(0i64, 1_000_000))
            .depends_on(produced.reader())
            .step(move |_| {
                flag.store(true, Ordering::SeqCst);
                Ok(Continuation::Terminate)
            });
        assert!(!consumer.is_ready());
        scheduler.submit(Box::new(consumer)).unwrap();

        let producer = Behaviour::builder("producer", Signal::new(()))
            .readiness(Readiness::Always)
            .step(move |_| {
                produced.write_at(1, 1_000_000);
                Ok(Continuation::Terminate)
            });
        scheduler.submit(Box::new(producer)).unwrap();
        (scheduler, consumed)
    }

    #[test]
    fn test_precompute_promotes_after_producer_runs() {
        let (scheduler, consumed) = producer_consumer(SchedulingMode::OrderedPrecompute);
        assert!(wait_for(|| consumed.load(Ordering::SeqCst)));
        assert!(wait_for(|| scheduler.stats().executed == 2));
        let stats = scheduler.stats();
        assert_eq!(stats.waited, 1);
        assert_eq!(stats.waiting, 0);
        scheduler.stop();
    }

    #[test]
    fn test_retry_requeues_until_ready() {
        let (scheduler, consumed) = producer_consumer(SchedulingMode::OrderedRetry);
        assert!(wait_for(|| consumed.load(Ordering::SeqCst)));
        let stats = scheduler.stats();
        assert!(stats.retried >= 1);
        assert_eq!(stats.waited, 0);
        scheduler.stop();
    }

    #[test]
    fn test_faults_are_isolated() {
        let scheduler = Scheduler::new();
        scheduler.start_with(SchedulingMode::Unordered, 2).unwrap();

        let panics = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let p = Arc::clone(&panics);
        let e = Arc::clone(&errors);
        scheduler
            .submit(Box::new(
                Behaviour::builder("panicker", Signal::new(0u8)).step(move |_| {
                    p.fetch_add(1, Ordering::SeqCst);
                    panic!("boom");
                }),
            ))
            .unwrap();
        scheduler
            .submit(Box::new(
                Behaviour::builder("failer", Signal::new(0u8)).step(move |step| {
                    e.fetch_add(1, Ordering::SeqCst);
                    Err(weft_core::Error::fault(step.name(), "bad input"))
                }),
            ))
            .unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        scheduler.submit(counting("survivor", &runs, 20)).unwrap();

        assert!(wait_for(|| runs.load(Ordering::SeqCst) == 20));
        assert!(wait_for(|| scheduler.stats().faulted == 2));
        assert!(scheduler.wait_idle(DEADLINE));
        assert_eq!(panics.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_running());
        scheduler.stop();
    }

    /// Records whether the scheduler ever looked idle while checking us
    struct BusyWitness {
        id: NodeId,
        scheduler: std::sync::Weak<Scheduler>,
        checks: Arc<AtomicUsize>,
        looked_idle: Arc<AtomicBool>,
    }

    impl Task for BusyWitness {
        fn id(&self) -> NodeId {
            self.id
        }

        fn name(&self) -> &str {
            "busy-witness"
        }

        fn is_ready(&self) -> bool {
            if let Some(scheduler) = self.scheduler.upgrade() {
                if !scheduler.is_busy() {
                    self.looked_idle.store(true, Ordering::SeqCst);
                }
            }
            self.checks.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn run(&mut self) -> weft_core::Result<Continuation> {
            Ok(Continuation::Terminate)
        }
    }

    #[test]
    fn test_dequeued_task_keeps_scheduler_busy() {
        let scheduler = Arc::new(Scheduler::new());
        scheduler.start_with(SchedulingMode::OrderedRetry, 1).unwrap();

        let checks = Arc::new(AtomicUsize::new(0));
        let looked_idle = Arc::new(AtomicBool::new(false));
        scheduler
            .submit(Box::new(BusyWitness {
                id: NodeId::next(),
                scheduler: Arc::downgrade(&scheduler),
                checks: Arc::clone(&checks),
                looked_idle: Arc::clone(&looked_idle),
            }))
            .unwrap();

        assert!(wait_for(|| scheduler.stats().executed == 1));
        assert!(scheduler.wait_idle(DEADLINE));
        assert!(checks.load(Ordering::SeqCst) >= 1);
        assert!(!looked_idle.load(Ordering::SeqCst));
        scheduler.stop();
    }

    struct Rendezvous {
        id: NodeId,
        arrived: Arc<AtomicUsize>,
        active: Arc<AtomicUsize>,
        max_active: Arc<AtomicUsize>,
        threads: Arc<Mutex<HashSet<String>>>,
        running: AtomicBool,
        expected: usize,
    }

    impl Task for Rendezvous {
        fn id(&self) -> NodeId {
            self.id
        }

        fn name(&self) -> &str {
            "rendezvous"
        }

        fn is_ready(&self) -> bool {
            true
        }

        fn run(&mut self) -> weft_core::Result<Continuation> {
            assert!(!self.running.swap(true, Ordering::SeqCst));
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now_active, Ordering::SeqCst);
            if let Some(name) = thread::current().name() {
                self.threads.lock().insert(name.to_string());
            }

            self.arrived.fetch_add(1, Ordering::SeqCst);
            let deadline = Instant::now() + Duration::from_secs(5);
            while self.arrived.load(Ordering::SeqCst) < self.expected && Instant::now() < deadline {
                std::hint::spin_loop();
            }

            self.active.fetch_sub(1, Ordering::SeqCst);
            self.running.store(false, Ordering::SeqCst);
            Ok(Continuation::Terminate)
        }
    }

    #[test]
    fn test_idle_workers_pick_up_handoffs() {
        let workers = max_workers().min(4);
        let scheduler = Scheduler::new();
        scheduler
            .start(SchedulerConfig::new(SchedulingMode::Unordered, workers))
            .unwrap();
        assert!(wait_for(|| scheduler.stats().idle_workers + 1 == workers));

        let arrived = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let threads = Arc::new(Mutex::new(HashSet::new()));
        for _ in 0..workers * 2 {
            scheduler
                .submit(Box::new(Rendezvous {
                    id: NodeId::next(),
                    arrived: Arc::clone(&arrived),
                    active: Arc::clone(&active),
                    max_active: Arc::clone(&max_active),
                    threads: Arc::clone(&threads),
                    running: AtomicBool::new(false),
                    expected: workers,
                }))
                .unwrap();
        }

        assert!(wait_for(|| arrived.load(Ordering::SeqCst) == workers * 2));
        assert!(scheduler.wait_idle(DEADLINE));
        assert_eq!(max_active.load(Ordering::SeqCst), workers);
        assert_eq!(threads.lock().len(), workers);
        scheduler.stop();
    }

    #[test]
    fn test_last_worker_never_idles() {
        let scheduler = Scheduler::new();
        scheduler.start_with(SchedulingMode::Unordered, 1).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(scheduler.stats().idle_workers, 0);
        scheduler.stop();
    }

    #[test]
    fn test_node_created_event_submits() {
        let scheduler = Arc::new(Scheduler::new());
        scheduler.start_with(SchedulingMode::Unordered, 1).unwrap();

        let stream = Stream::new();
        stream.add_sink(scheduler.as_sink());
        let runs = Arc::new(AtomicUsize::new(0));
        let task = counting("spawned", &runs, 1);
        stream.publish(Event::node_created(NodeId::EXTERNAL, task));
        stream.publish(Event::death(NodeId::EXTERNAL));

        assert!(wait_for(|| runs.load(Ordering::SeqCst) == 1));
        assert_eq!(scheduler.stats().submitted, 1);
        scheduler.stop();
    }

    #[test]
    fn test_latch_marks_generation_end() {
        let scheduler = Scheduler::new();
        scheduler.start_with(SchedulingMode::Unordered, 2).unwrap();

        let latch = Arc::new(GenerationLatch::new(0));
        let runs = Arc::new(AtomicUsize::new(0));
        for generation in 1..=3 {
            latch.reset(4);
            for i in 0..4 {
                let task = counting(&format!("g{generation}-{i}"), &runs, 1);
                scheduler
                    .submit(Latched::boxed(task, Arc::clone(&latch)))
                    .unwrap();
            }
            assert!(latch.wait(DEADLINE));
            assert_eq!(runs.load(Ordering::SeqCst), generation * 4);
        }
        scheduler.stop();
    }
}
