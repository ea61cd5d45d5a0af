//! Background population of a trajectory with concurrent partial reads.
//!
//! The loader thread is the only writer. A step becomes visible to readers
//! when `ntime_avail` moves past it, and is immutable from then on.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use traj_store::{
    LoaderConfig, Snapshot, Species, StepAccess, TimeWindow, TrajError, TrajResult, Trajectory,
};

use crate::events::{duration_ms, LoadEmitter, LoadEvent};
use crate::frame_log::FrameLog;
use crate::source::{SourceHeader, SourceReader};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum LoadState {
    Idle = 0,
    Loading = 1,
    Complete = 2,
    Failed = 3,
    Cancelled = 4,
}

impl LoadState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LoadState::Loading,
            2 => LoadState::Complete,
            3 => LoadState::Failed,
            4 => LoadState::Cancelled,
            _ => LoadState::Idle,
        }
    }

    pub fn is_settled(self) -> bool {
        matches!(
            self,
            LoadState::Complete | LoadState::Failed | LoadState::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LoadState::Idle => "idle",
            LoadState::Loading => "loading",
            LoadState::Complete => "complete",
            LoadState::Failed => "failed",
            LoadState::Cancelled => "cancelled",
        }
    }
}

struct Shared {
    header: SourceHeader,
    frames: FrameLog,
    state: AtomicU8,
    cancel: AtomicBool,
    failure: OnceLock<String>,
    error: Mutex<Option<TrajError>>,
    wake_lock: Mutex<()>,
    wake: Condvar,
    poll: Duration,
}

impl Shared {
    fn state(&self) -> LoadState {
        LoadState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn settle(&self, state: LoadState) {
        self.state.store(state as u8, Ordering::Release);
        self.wake.notify_all();
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read-only view of a loading trajectory. Cheap to clone and share across
/// reader threads.
#[derive(Clone)]
pub struct LiveTrajectory {
    shared: Arc<Shared>,
}

impl LiveTrajectory {
    pub fn species(&self) -> &Species {
        &self.shared.header.species
    }

    pub fn natom(&self) -> usize {
        self.shared.header.species.natom()
    }

    pub fn is_periodic(&self) -> bool {
        self.shared.header.periodic
    }

    /// Total step count announced by the source, if any.
    pub fn ntime_hint(&self) -> Option<usize> {
        self.shared.header.ntime_hint
    }

    /// Number of committed steps. Never decreases.
    pub fn ntime_avail(&self) -> usize {
        self.shared.frames.len()
    }

    pub fn state(&self) -> LoadState {
        self.shared.state()
    }

    pub fn snapshot(&self, t: usize) -> TrajResult<&Snapshot> {
        self.shared.frames.get(t).ok_or_else(|| {
            TrajError::OutOfRange(format!(
                "time step {t} not loaded ({} available)",
                self.ntime_avail()
            ))
        })
    }

    pub fn xcart(&self, t: usize) -> TrajResult<&[[f64; 3]]> {
        Ok(self.snapshot(t)?.xcart())
    }

    pub fn xred(&self, t: usize) -> TrajResult<&[[f64; 3]]> {
        Ok(self.snapshot(t)?.xred())
    }

    pub fn rprimd(&self, t: usize) -> TrajResult<&[[f64; 3]; 3]> {
        Ok(self.snapshot(t)?.rprimd())
    }

    pub fn time(&self, t: usize) -> TrajResult<f64> {
        Ok(self.snapshot(t)?.time())
    }

    pub fn etotal(&self, t: usize) -> TrajResult<f64> {
        self.snapshot(t)?
            .etotal()
            .ok_or_else(|| TrajError::Unsupported(format!("no total energy at step {t}")))
    }

    /// Window check against the steps committed so far.
    pub fn check_times(&self, tbegin: usize, tend: usize) -> TrajResult<TimeWindow> {
        StepAccess::check_times(self, tbegin, tend)
    }

    /// Block until step `t` is committed or the loader settles without it.
    pub fn wait_time(&self, t: usize) -> TrajResult<()> {
        let shared = &self.shared;
        let mut guard = lock(&shared.wake_lock);
        loop {
            let state = shared.state();
            if self.ntime_avail() > t {
                return Ok(());
            }
            match state {
                LoadState::Complete => {
                    return Err(TrajError::OutOfRange(format!(
                        "time step {t} beyond the {} loaded steps",
                        self.ntime_avail()
                    )))
                }
                LoadState::Failed => {
                    let message = shared
                        .failure
                        .get()
                        .cloned()
                        .unwrap_or_else(|| "loader failed".into());
                    return Err(TrajError::ParseFailure(message));
                }
                LoadState::Cancelled => return Err(TrajError::Cancelled),
                LoadState::Idle | LoadState::Loading => {}
            }
            guard = match shared.wake.wait_timeout(guard, shared.poll) {
                Ok((g, _)) => g,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Owned copy of every committed step.
    pub fn to_trajectory(&self) -> TrajResult<Trajectory> {
        let n = self.ntime_avail();
        let header = &self.shared.header;
        let mut traj = Trajectory::new(header.species.clone(), header.periodic);
        for t in 0..n {
            traj.push(self.snapshot(t)?.clone())?;
        }
        Ok(traj)
    }
}

/// Analyses see the committed prefix; `ntime` grows while loading.
impl StepAccess for LiveTrajectory {
    fn species(&self) -> &Species {
        &self.shared.header.species
    }

    fn is_periodic(&self) -> bool {
        self.shared.header.periodic
    }

    fn ntime(&self) -> usize {
        self.shared.frames.len()
    }

    fn snapshot(&self, t: usize) -> TrajResult<&Snapshot> {
        LiveTrajectory::snapshot(self, t)
    }
}

/// Owner side of a background load.
pub struct LoadHandle {
    live: LiveTrajectory,
    worker: Option<JoinHandle<()>>,
}

impl LoadHandle {
    pub fn live(&self) -> LiveTrajectory {
        self.live.clone()
    }

    pub fn state(&self) -> LoadState {
        self.live.state()
    }

    pub fn ntime_avail(&self) -> usize {
        self.live.ntime_avail()
    }

    pub fn wait_time(&self, t: usize) -> TrajResult<()> {
        self.live.wait_time(t)
    }

    /// Ask the loader to stop before its next commit.
    pub fn cancel(&self) {
        self.live.shared.cancel.store(true, Ordering::Release);
    }

    /// Join the loader thread and report how it ended.
    pub fn wait_settled(&mut self) -> LoadState {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("loader thread panicked");
                let shared = &self.live.shared;
                let _ = shared.failure.set("loader thread panicked".into());
                shared.settle(LoadState::Failed);
            }
        }
        self.state()
    }

    /// The error that stopped the loader, handed out once.
    pub fn take_error(&self) -> Option<TrajError> {
        lock(&self.live.shared.error).take()
    }

    /// Wait for the loader to settle and copy out whatever was committed.
    pub fn finish(mut self) -> TrajResult<Trajectory> {
        self.wait_settled();
        self.live.to_trajectory()
    }
}

impl Drop for LoadHandle {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.cancel();
            self.wait_settled();
        }
    }
}

pub struct Loader {
    source: Box<dyn SourceReader + Send>,
    options: LoaderConfig,
    emitter: LoadEmitter,
}

impl Loader {
    pub fn new(source: Box<dyn SourceReader + Send>, options: &LoaderConfig) -> Self {
        Self {
            source,
            options: options.clone(),
            emitter: LoadEmitter::new(options.emit_progress),
        }
    }

    /// Loader with default options and progress events off.
    pub fn quiet(source: Box<dyn SourceReader + Send>) -> Self {
        Self::new(source, &LoaderConfig::default())
    }

    /// Always [`LoadState::Idle`]: nothing is read before [`start`](Self::start).
    pub fn state(&self) -> LoadState {
        LoadState::Idle
    }

    /// Spawn the loader thread.
    pub fn start(self) -> TrajResult<LoadHandle> {
        let header = self.source.header().clone();
        let shared = Arc::new(Shared {
            header,
            frames: FrameLog::new(),
            state: AtomicU8::new(LoadState::Loading as u8),
            cancel: AtomicBool::new(false),
            failure: OnceLock::new(),
            error: Mutex::new(None),
            wake_lock: Mutex::new(()),
            wake: Condvar::new(),
            poll: Duration::from_millis(self.options.poll_interval_ms()),
        });
        let worker_shared = Arc::clone(&shared);
        let progress_every = self.options.progress_every();
        let emitter = self.emitter;
        let source = self.source;
        let worker = thread::Builder::new()
            .name("traj-loader".into())
            .spawn(move || run(source, &worker_shared, emitter, progress_every))?;
        Ok(LoadHandle {
            live: LiveTrajectory { shared },
            worker: Some(worker),
        })
    }
}

fn run(
    mut source: Box<dyn SourceReader + Send>,
    shared: &Shared,
    emitter: LoadEmitter,
    progress_every: usize,
) {
    let started = Instant::now();
    let natom = shared.header.species.natom();
    let hint = shared.header.ntime_hint;
    let label = source.describe();
    info!("loading {label}: {natom} atoms, {hint:?} steps announced");
    emitter.emit(&LoadEvent::LoadStarted {
        source: label.clone(),
        natom,
        ntime_hint: hint,
    });

    // A panicking source must still settle the state, or readers parked in
    // `wait_time` would never wake.
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        read_loop(source.as_mut(), shared, &emitter, progress_every, started)
    }))
    .unwrap_or_else(|payload| {
        Err(TrajError::ParseFailure(format!(
            "source panicked: {}",
            panic_message(payload.as_ref())
        )))
    });

    let avail = shared.frames.len();
    let elapsed_ms = duration_ms(started.elapsed());
    match outcome {
        Ok(()) => {
            info!("loaded {avail} steps from {label} in {elapsed_ms} ms");
            emitter.emit(&LoadEvent::LoadComplete {
                ntime: avail,
                elapsed_ms,
            });
            shared.settle(LoadState::Complete);
        }
        Err(TrajError::Cancelled) => {
            debug!("loading {label} cancelled after {avail} steps");
            emitter.emit(&LoadEvent::LoadCancelled {
                ntime_avail: avail,
                elapsed_ms,
            });
            shared.settle(LoadState::Cancelled);
        }
        Err(err) => {
            warn!("loading {label} failed after {avail} steps: {err}");
            emitter.emit(&LoadEvent::LoadFailed {
                ntime_avail: avail,
                code: err.code().into(),
                message: err.to_string(),
                elapsed_ms,
            });
            let _ = shared.failure.set(err.to_string());
            *lock(&shared.error) = Some(err);
            shared.settle(LoadState::Failed);
        }
    }
}

fn read_loop(
    source: &mut (dyn SourceReader + Send),
    shared: &Shared,
    emitter: &LoadEmitter,
    progress_every: usize,
    started: Instant,
) -> TrajResult<()> {
    let natom = shared.header.species.natom();
    let hint = shared.header.ntime_hint;
    loop {
        if shared.cancel.load(Ordering::Acquire) {
            return Err(TrajError::Cancelled);
        }
        let Some(snapshot) = source.next_snapshot()? else {
            return Ok(());
        };
        snapshot.validate(natom)?;
        // The in-flight snapshot is dropped whole if cancellation arrived
        // while it was being read.
        if shared.cancel.load(Ordering::Acquire) {
            return Err(TrajError::Cancelled);
        }
        let avail = shared.frames.push(snapshot)?;
        shared.wake.notify_all();
        if avail % progress_every == 0 {
            emitter.emit(&LoadEvent::progress(avail, hint, started.elapsed()));
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
