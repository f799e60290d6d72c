// ============================================================================
// PREVIEW SCHEDULER — debounced, single-flight background preview runs
// ============================================================================
//
// States (derived, see `SchedulerState`):
//   Idle ──change──▶ PendingDebounce ──tick, quiet > debounce, slot free──▶ Running
//   Running ──done──▶ Idle, or PendingDebounce when a change arrived mid-run
//
// Changes overwrite a single pending snapshot (newest wins, nothing queues).
// A run is never cancelled. Results travel back over an mpsc channel and are
// published only when their run id is newer than anything published before
// and not older than the last `invalidate()`.
// ============================================================================

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use image::{DynamicImage, RgbImage};

use crate::config::DEBOUNCE;
use crate::error::EditorError;
use crate::pipeline::{self, Params};

// ============================================================================
// BUSY SLOT
// ============================================================================

/// One-job-at-a-time slot shared by loading, preview and export.
/// A request that finds the slot taken is dropped, not queued.
#[derive(Clone, Debug, Default)]
pub struct TaskSlot {
    busy: Arc<AtomicBool>,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot. The returned guard frees it on drop.
    pub fn try_acquire(&self) -> Option<SlotGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotGuard { busy: Arc::clone(&self.busy) })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
pub struct SlotGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

// ============================================================================
// JOB RUNNERS
// ============================================================================

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Called from a worker after it has delivered its result (egui repaint hook).
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Where background jobs execute.
pub trait JobRunner: Send + Sync {
    fn spawn(&self, job: Job);
}

/// Production runner: the global rayon pool.
#[derive(Clone, Copy, Debug, Default)]
pub struct RayonRunner;

impl JobRunner for RayonRunner {
    fn spawn(&self, job: Job) {
        rayon::spawn(job);
    }
}

/// Runs the job on the calling thread before `spawn` returns (CLI, tests).
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineRunner;

impl JobRunner for InlineRunner {
    fn spawn(&self, job: Job) {
        job();
    }
}

/// Run `f`, turning a panic into a `Processing` error so it never escapes the job.
pub fn run_guarded<T>(
    what: &str,
    f: impl FnOnce() -> Result<T, EditorError>,
) -> Result<T, EditorError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(panic_info) => {
            let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic payload".to_string()
            };
            crate::log_err!("{} job panicked: {}", what, msg);
            Err(EditorError::Processing(format!("{} failed unexpectedly: {}", what, msg)))
        }
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    PendingDebounce,
    Running,
}

/// Result of one preview run, delivered to the UI thread.
#[derive(Debug)]
pub struct PreviewOutcome {
    pub run_id: u64,
    pub params: Params,
    pub result: Result<RgbImage, EditorError>,
    pub elapsed: Duration,
}

pub struct PreviewScheduler {
    debounce: Duration,
    /// Latest snapshot not yet handed to a run.
    pending: Option<Params>,
    last_change: Option<Instant>,
    in_flight: Option<u64>,
    next_run_id: u64,
    last_published: u64,
    /// Runs with a lower id belong to a replaced source image.
    discard_before: u64,
    runs_started: u64,
    sender: mpsc::Sender<PreviewOutcome>,
    receiver: mpsc::Receiver<PreviewOutcome>,
    waker: Option<Waker>,
}

impl Default for PreviewScheduler {
    fn default() -> Self {
        Self::new(DEBOUNCE)
    }
}

impl PreviewScheduler {
    pub fn new(debounce: Duration) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            debounce,
            pending: None,
            last_change: None,
            in_flight: None,
            next_run_id: 0,
            last_published: 0,
            discard_before: 0,
            runs_started: 0,
            sender,
            receiver,
            waker: None,
        }
    }

    pub fn set_waker(&mut self, waker: Waker) {
        self.waker = Some(waker);
    }

    pub fn state(&self) -> SchedulerState {
        if self.in_flight.is_some() {
            SchedulerState::Running
        } else if self.pending.is_some() {
            SchedulerState::PendingDebounce
        } else {
            SchedulerState::Idle
        }
    }

    /// Total runs launched since creation.
    pub fn runs_started(&self) -> u64 {
        self.runs_started
    }

    /// Record a control change. Overwrites any snapshot still waiting.
    pub fn notify_change(&mut self, params: Params, now: Instant) {
        self.pending = Some(params);
        self.last_change = Some(now);
    }

    /// Drop results of every run launched so far (new source image).
    pub fn invalidate(&mut self) {
        self.discard_before = self.next_run_id + 1;
    }

    fn is_due(&self, now: Instant) -> bool {
        if self.pending.is_none() || self.in_flight.is_some() {
            return false;
        }
        match self.last_change {
            Some(t) => now.saturating_duration_since(t) > self.debounce,
            None => true,
        }
    }

    /// Periodic check. Launches one run when the debounce window has passed,
    /// nothing is running and the busy slot is free. Returns the new run id.
    ///
    /// With no source image a due snapshot is dropped: the next load issues a
    /// fresh change. A taken slot leaves the snapshot pending for a later tick.
    pub fn tick(
        &mut self,
        now: Instant,
        source: Option<&Arc<DynamicImage>>,
        slot: &TaskSlot,
        runner: &dyn JobRunner,
    ) -> Option<u64> {
        if !self.is_due(now) {
            return None;
        }
        let Some(source) = source else {
            self.pending = None;
            return None;
        };
        let guard = slot.try_acquire()?;
        let params = self.pending.take()?;

        self.next_run_id += 1;
        let run_id = self.next_run_id;
        self.in_flight = Some(run_id);
        self.runs_started += 1;

        let source = Arc::clone(source);
        let sender = self.sender.clone();
        let waker = self.waker.clone();
        runner.spawn(Box::new(move || {
            let start = Instant::now();
            let result = run_guarded("Preview", || pipeline::process(Some(&source), &params));
            drop(guard);
            let _ = sender.send(PreviewOutcome {
                run_id,
                params,
                result,
                elapsed: start.elapsed(),
            });
            if let Some(wake) = waker {
                wake();
            }
        }));
        Some(run_id)
    }

    /// Drain finished runs without blocking. Returns the newest publishable
    /// outcome, if any.
    pub fn poll(&mut self) -> Option<PreviewOutcome> {
        let mut latest = None;
        while let Ok(outcome) = self.receiver.try_recv() {
            if let Some(o) = self.accept(outcome) {
                latest = Some(o);
            }
        }
        latest
    }

    /// Block up to `timeout` for the in-flight run, then drain like [`poll`].
    ///
    /// [`poll`]: PreviewScheduler::poll
    pub fn wait(&mut self, timeout: Duration) -> Option<PreviewOutcome> {
        let first = self
            .receiver
            .recv_timeout(timeout)
            .ok()
            .and_then(|o| self.accept(o));
        self.poll().or(first)
    }

    fn accept(&mut self, outcome: PreviewOutcome) -> Option<PreviewOutcome> {
        if self.in_flight == Some(outcome.run_id) {
            self.in_flight = None;
        }
        if outcome.run_id < self.discard_before || outcome.run_id <= self.last_published {
            crate::log_info!("Discarding stale preview run #{}", outcome.run_id);
            return None;
        }
        self.last_published = outcome.run_id;
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::Palette;
    use image::Rgb;
    use std::sync::Mutex;

    /// Holds jobs until the test releases them, in any order.
    #[derive(Default)]
    struct ManualRunner {
        jobs: Mutex<Vec<Job>>,
    }

    impl ManualRunner {
        fn run_next(&self) {
            let job = self.jobs.lock().unwrap().remove(0);
            job();
        }

        fn queued(&self) -> usize {
            self.jobs.lock().unwrap().len()
        }
    }

    impl JobRunner for ManualRunner {
        fn spawn(&self, job: Job) {
            self.jobs.lock().unwrap().push(job);
        }
    }

    fn source() -> Arc<DynamicImage> {
        Arc::new(DynamicImage::ImageRgb8(RgbImage::from_fn(24, 16, |x, y| {
            Rgb([(x * 10) as u8, (y * 15) as u8, 128])
        })))
    }

    fn params(pixel_size: u32) -> Params {
        Params { pixel_size, ..Params::default() }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn rapid_changes_collapse_into_one_run_with_latest_snapshot() {
        let mut sched = PreviewScheduler::new(ms(300));
        let slot = TaskSlot::new();
        let src = source();
        let t0 = Instant::now();

        sched.notify_change(params(4), t0);
        sched.notify_change(params(8), t0 + ms(50));
        assert_eq!(sched.state(), SchedulerState::PendingDebounce);

        // 100 ms polling until well past the window
        let mut launched = Vec::new();
        for step in 1..=10 {
            if let Some(id) = sched.tick(t0 + ms(100 * step), Some(&src), &slot, &InlineRunner) {
                launched.push(id);
            }
        }
        assert_eq!(launched.len(), 1);
        assert_eq!(sched.runs_started(), 1);

        let outcome = sched.poll().expect("run finished");
        assert_eq!(outcome.params, params(8));
        assert!(outcome.result.is_ok());
        assert_eq!(sched.state(), SchedulerState::Idle);
    }

    #[test]
    fn window_must_be_exceeded_not_just_reached() {
        let mut sched = PreviewScheduler::new(ms(300));
        let slot = TaskSlot::new();
        let src = source();
        let t0 = Instant::now();
        sched.notify_change(params(4), t0);
        assert!(sched.tick(t0 + ms(300), Some(&src), &slot, &InlineRunner).is_none());
        assert!(sched.tick(t0 + ms(301), Some(&src), &slot, &InlineRunner).is_some());
    }

    #[test]
    fn change_during_run_triggers_exactly_one_follow_up() {
        let mut sched = PreviewScheduler::new(ms(300));
        let slot = TaskSlot::new();
        let runner = ManualRunner::default();
        let src = source();
        let t0 = Instant::now();

        sched.notify_change(params(4), t0);
        assert_eq!(sched.tick(t0 + ms(400), Some(&src), &slot, &runner), Some(1));
        assert_eq!(sched.state(), SchedulerState::Running);

        sched.notify_change(params(6), t0 + ms(450));
        sched.notify_change(params(12), t0 + ms(480));
        assert_eq!(sched.state(), SchedulerState::Running);
        // still running: no second launch even though the window passed
        assert!(sched.tick(t0 + ms(900), Some(&src), &slot, &runner).is_none());
        assert_eq!(runner.queued(), 1);

        runner.run_next();
        let first = sched.poll().expect("first run published");
        assert_eq!(first.params, params(4));
        assert_eq!(sched.state(), SchedulerState::PendingDebounce);

        assert_eq!(sched.tick(t0 + ms(1000), Some(&src), &slot, &runner), Some(2));
        runner.run_next();
        let second = sched.poll().expect("second run published");
        assert_eq!(second.params, params(12));

        for step in 11..20 {
            assert!(sched.tick(t0 + ms(100 * step), Some(&src), &slot, &runner).is_none());
        }
        assert_eq!(sched.runs_started(), 2);
        assert_eq!(sched.state(), SchedulerState::Idle);
    }

    #[test]
    fn busy_slot_defers_the_run() {
        let mut sched = PreviewScheduler::new(ms(300));
        let slot = TaskSlot::new();
        let src = source();
        let t0 = Instant::now();
        sched.notify_change(params(4), t0);

        let export = slot.try_acquire().unwrap();
        assert!(sched.tick(t0 + ms(400), Some(&src), &slot, &InlineRunner).is_none());
        assert_eq!(sched.state(), SchedulerState::PendingDebounce);

        drop(export);
        assert!(sched.tick(t0 + ms(500), Some(&src), &slot, &InlineRunner).is_some());
        assert!(!slot.is_busy());
    }

    #[test]
    fn no_source_drops_the_snapshot() {
        let mut sched = PreviewScheduler::new(ms(300));
        let slot = TaskSlot::new();
        let t0 = Instant::now();
        sched.notify_change(params(4), t0);
        assert!(sched.tick(t0 + ms(400), None, &slot, &InlineRunner).is_none());
        assert_eq!(sched.state(), SchedulerState::Idle);
        assert_eq!(sched.runs_started(), 0);
    }

    #[test]
    fn out_of_order_completion_never_overwrites_newer_result() {
        let mut sched = PreviewScheduler::new(ms(300));
        let img = || Ok(RgbImage::new(1, 1));
        let send = |s: &PreviewScheduler, run_id| {
            s.sender
                .send(PreviewOutcome { run_id, params: params(run_id as u32), result: img(), elapsed: Duration::ZERO })
                .unwrap();
        };
        // run 2 finishes first, run 1 straggles in afterwards
        send(&sched, 2);
        assert_eq!(sched.poll().unwrap().run_id, 2);
        send(&sched, 1);
        assert!(sched.poll().is_none());
        // both land in the same drain: only the newest survives
        send(&sched, 4);
        send(&sched, 3);
        assert_eq!(sched.poll().unwrap().run_id, 4);
    }

    #[test]
    fn invalidate_discards_in_flight_run() {
        let mut sched = PreviewScheduler::new(ms(300));
        let slot = TaskSlot::new();
        let runner = ManualRunner::default();
        let src = source();
        let t0 = Instant::now();

        sched.notify_change(params(4), t0);
        sched.tick(t0 + ms(400), Some(&src), &slot, &runner).unwrap();
        sched.invalidate();
        runner.run_next();
        assert!(sched.poll().is_none());
        assert_eq!(sched.state(), SchedulerState::Idle);
    }

    #[test]
    fn worker_holds_slot_until_done() {
        let mut sched = PreviewScheduler::new(ms(300));
        let slot = TaskSlot::new();
        let runner = ManualRunner::default();
        let src = source();
        let t0 = Instant::now();
        sched.notify_change(Params { palette: Palette::Neon, ..Params::default() }, t0);
        sched.tick(t0 + ms(400), Some(&src), &slot, &runner).unwrap();
        assert!(slot.is_busy());
        runner.run_next();
        assert!(!slot.is_busy());
    }

    #[test]
    fn rayon_runner_delivers_and_wakes() {
        let mut sched = PreviewScheduler::new(ms(0));
        let woken = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&woken);
        sched.set_waker(Arc::new(move || flag.store(true, Ordering::SeqCst)));
        let slot = TaskSlot::new();
        let src = source();
        let t0 = Instant::now();
        sched.notify_change(params(4), t0);
        sched.tick(t0 + ms(1), Some(&src), &slot, &RayonRunner).unwrap();
        let outcome = sched.wait(Duration::from_secs(10)).expect("rayon job finished");
        assert_eq!(outcome.run_id, 1);
        // the waker fires just after the send
        let deadline = Instant::now() + Duration::from_secs(10);
        while !woken.load(Ordering::SeqCst) && Instant::now() < deadline {
            std::thread::yield_now();
        }
        assert!(woken.load(Ordering::SeqCst));
    }

    #[test]
    fn panics_become_processing_errors() {
        let result: Result<(), EditorError> = run_guarded("Test", || panic!("boom"));
        match result {
            Err(EditorError::Processing(msg)) => assert!(msg.contains("boom")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn slot_is_exclusive() {
        let slot = TaskSlot::new();
        let guard = slot.try_acquire().unwrap();
        assert!(slot.try_acquire().is_none());
        drop(guard);
        assert!(slot.try_acquire().is_some());
    }
}
