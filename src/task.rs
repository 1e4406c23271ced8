//! Task definition — caller-owned, no-alloc task records
//!
//! A task is a periodic or event-driven unit of cooperative work. The
//! application owns the `Task` storage (usually a `static`); the scheduler
//! only keeps a reference to it in its table.
//!
//! Fields shared between the tick interrupt and the super-loop follow a
//! single-writer-per-context protocol:
//!
//! | field          | tick interrupt       | super-loop                      |
//! |----------------|----------------------|---------------------------------|
//! | `tick_counter` | decrement (load/store) | reset on dispatch (store)     |
//! | `semaphore`    | -                    | set / clear                     |
//! | `halted`       | -                    | set / clear                     |
//! | `reload_ticks` | -                    | written on register/set_interval |
//! | `registered`   | -                    | set once                        |
//!
//! The interrupt cannot be preempted by the super-loop, so its load/store
//! pair on `tick_counter` is never interleaved with the reset. Only plain
//! loads and stores are used, which keeps the crate usable on cores
//! without compare-and-swap.
//!
//! Author: Moroya Sakamoto

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use critical_section::Mutex;

/// Callback capability of a task
///
/// `init` runs exactly once, at registration, before the period is armed.
/// `run` runs on every dispatch, to completion, on the super-loop.
pub trait TaskBody: Sync {
    /// One-time initialization (default: nothing)
    fn init(&self) {}

    /// Task work
    fn run(&self);
}

/// Single callback invoked with a fixed parameter
///
/// ```
/// use core::sync::atomic::{AtomicU32, Ordering};
/// use tickloop::{TaskBody, WithParam};
///
/// fn bump(counter: &AtomicU32) {
///     counter.fetch_add(1, Ordering::Relaxed);
/// }
///
/// static BLINK: WithParam<AtomicU32> = WithParam::new(bump, AtomicU32::new(0));
/// BLINK.run();
/// assert_eq!(BLINK.param().load(Ordering::Relaxed), 1);
/// ```
pub struct WithParam<P> {
    run: fn(&P),
    param: P,
}

impl<P> WithParam<P> {
    /// Bind `run` to `param`
    pub const fn new(run: fn(&P), param: P) -> Self {
        Self { run, param }
    }

    /// The parameter handed to every run
    pub fn param(&self) -> &P {
        &self.param
    }
}

impl<P: Sync> TaskBody for WithParam<P> {
    fn run(&self) {
        (self.run)(&self.param)
    }
}

/// Parameterless `init` / `run` pair
pub struct InitRun {
    init: Option<fn()>,
    run: fn(),
}

impl InitRun {
    /// Two-phase task: `init` once at registration, then `run` per dispatch
    pub const fn new(init: fn(), run: fn()) -> Self {
        Self { init: Some(init), run }
    }

    /// Task without an initialization phase
    pub const fn run_only(run: fn()) -> Self {
        Self { init: None, run }
    }
}

impl TaskBody for InitRun {
    fn init(&self) {
        if let Some(init) = self.init {
            init();
        }
    }

    fn run(&self) {
        (self.run)()
    }
}

/// Registration parameters of a task
#[derive(Clone, Copy)]
pub struct TaskConfig<'a> {
    /// Callbacks; `None` is rejected by `register`
    pub body: Option<&'a dyn TaskBody>,
    /// Period in milliseconds
    ///
    /// Converted to ticks with integer division. A period shorter than
    /// one tick becomes 0 ticks: the task is eligible on every pass.
    pub time_ms: u16,
}

impl<'a> TaskConfig<'a> {
    /// Config running `body` every `time_ms` milliseconds
    pub const fn new(body: &'a dyn TaskBody, time_ms: u16) -> Self {
        Self {
            body: Some(body),
            time_ms,
        }
    }
}

/// Stable handle to a registered task (its slot index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub(crate) usize);

impl TaskHandle {
    /// Slot index, equal to the registration order
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Task record
pub struct Task<'a> {
    /// One-shot "run now" request
    semaphore: AtomicBool,
    /// Periodic execution suspended
    halted: AtomicBool,
    /// Set once by `register`, never cleared
    registered: AtomicBool,
    /// Period in ticks
    reload_ticks: AtomicU16,
    /// Ticks left until the next periodic run
    tick_counter: AtomicU16,
    /// Dispatches so far (wrapping)
    run_count: AtomicU32,
    /// Callbacks, installed at registration
    body: Mutex<Cell<Option<&'a dyn TaskBody>>>,
}

impl<'a> Task<'a> {
    /// Unregistered task
    pub const fn new() -> Self {
        Self {
            semaphore: AtomicBool::new(false),
            halted: AtomicBool::new(false),
            registered: AtomicBool::new(false),
            reload_ticks: AtomicU16::new(0),
            tick_counter: AtomicU16::new(0),
            run_count: AtomicU32::new(0),
            body: Mutex::new(Cell::new(None)),
        }
    }

    /// Has this task been registered?
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// Is periodic execution halted?
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Relaxed)
    }

    /// Is a semaphore-triggered run pending?
    pub fn semaphore_pending(&self) -> bool {
        self.semaphore.load(Ordering::Relaxed)
    }

    /// Period in ticks
    pub fn reload_ticks(&self) -> u16 {
        self.reload_ticks.load(Ordering::Relaxed)
    }

    /// Ticks left until the next periodic run
    pub fn tick_counter(&self) -> u16 {
        self.tick_counter.load(Ordering::Relaxed)
    }

    /// Number of dispatches so far
    pub fn run_count(&self) -> u32 {
        self.run_count.load(Ordering::Relaxed)
    }

    pub(crate) fn body(&self) -> Option<&'a dyn TaskBody> {
        critical_section::with(|cs| self.body.borrow(cs).get())
    }

    pub(crate) fn install(&self, body: &'a dyn TaskBody) {
        critical_section::with(|cs| self.body.borrow(cs).set(Some(body)));
    }

    pub(crate) fn mark_registered(&self) {
        self.registered.store(true, Ordering::Release);
    }

    /// Set the period and restart the countdown from it
    pub(crate) fn arm(&self, reload_ticks: u16) {
        self.reload_ticks.store(reload_ticks, Ordering::Relaxed);
        self.tick_counter.store(reload_ticks, Ordering::Relaxed);
    }

    pub(crate) fn set_semaphore(&self) {
        self.semaphore.store(true, Ordering::Relaxed);
    }

    pub(crate) fn halt(&self) {
        self.halted.store(true, Ordering::Relaxed);
    }

    pub(crate) fn restart(&self) {
        self.halted.store(false, Ordering::Relaxed);
        self.tick_counter.store(self.reload_ticks(), Ordering::Relaxed);
    }

    /// One tick elapsed. Interrupt context only; saturates at 0.
    pub(crate) fn count_down(&self) {
        let ticks = self.tick_counter.load(Ordering::Relaxed);
        if ticks > 0 {
            self.tick_counter.store(ticks - 1, Ordering::Relaxed);
        }
    }

    /// Semaphore first (overrides halt), then halt, then the countdown
    pub(crate) fn is_ready(&self) -> bool {
        if self.semaphore.load(Ordering::Relaxed) {
            return true;
        }
        if self.halted.load(Ordering::Relaxed) {
            return false;
        }
        self.tick_counter.load(Ordering::Relaxed) == 0
    }

    /// Clear the semaphore and rearm the period ahead of a run
    pub(crate) fn begin_run(&self) {
        self.semaphore.store(false, Ordering::Relaxed);
        self.tick_counter.store(self.reload_ticks(), Ordering::Relaxed);
        let runs = self.run_count.load(Ordering::Relaxed);
        self.run_count.store(runs.wrapping_add(1), Ordering::Relaxed);
    }
}

impl Default for Task<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static INIT_CALLS: AtomicU32 = AtomicU32::new(0);
    static RUN_CALLS: AtomicU32 = AtomicU32::new(0);

    fn count_init() {
        INIT_CALLS.fetch_add(1, Ordering::Relaxed);
    }

    fn count_run() {
        RUN_CALLS.fetch_add(1, Ordering::Relaxed);
    }

    fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn test_new_task() {
        let task = Task::new();
        assert!(!task.is_registered());
        assert!(!task.is_halted());
        assert!(!task.semaphore_pending());
        assert_eq!(task.reload_ticks(), 0);
        assert_eq!(task.run_count(), 0);
        assert!(task.body().is_none());
    }

    #[test]
    fn test_with_param_passes_param() {
        let body = WithParam::new(bump, AtomicU32::new(5));
        body.init();
        body.run();
        body.run();
        assert_eq!(body.param().load(Ordering::Relaxed), 7);
    }

    #[test]
    fn test_init_run_pair() {
        let body = InitRun::new(count_init, count_run);
        body.init();
        body.run();
        body.run();
        assert_eq!(INIT_CALLS.load(Ordering::Relaxed), 1);
        assert_eq!(RUN_CALLS.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_count_down_saturates() {
        let task = Task::new();
        task.arm(2);
        task.count_down();
        task.count_down();
        task.count_down();
        assert_eq!(task.tick_counter(), 0);
        assert_eq!(task.reload_ticks(), 2);
    }

    #[test]
    fn test_readiness_order() {
        let task = Task::new();
        task.arm(3);
        assert!(!task.is_ready());

        task.set_semaphore();
        task.halt();
        assert!(task.is_ready());

        task.begin_run();
        assert!(!task.semaphore_pending());
        assert_eq!(task.tick_counter(), 3);

        for _ in 0..3 {
            task.count_down();
        }
        assert!(!task.is_ready()); // halted
    }

    #[test]
    fn test_restart_rearms() {
        let task = Task::new();
        task.arm(4);
        task.count_down();
        task.halt();
        task.restart();
        assert!(!task.is_halted());
        assert_eq!(task.tick_counter(), 4);
    }

    #[test]
    fn test_install_body() {
        let body = InitRun::run_only(count_run);
        let task = Task::new();
        task.install(&body);
        assert!(task.body().is_some());
    }
}
