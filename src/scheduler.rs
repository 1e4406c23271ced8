//! Cooperative super-loop scheduler
//!
//! The tick interrupt counts every task down (`advance_tick`); the
//! application's main loop calls `process`, which runs each due task to
//! completion in registration order. No preemption, no priorities.
//!
//! Readiness of a task, checked in this order:
//! 1. semaphore set → run (even if halted or mid-period)
//! 2. halted → skip
//! 3. tick counter at zero → run
//!
//! Author: Moroya Sakamoto

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use critical_section::Mutex;
use log::{debug, info, trace, warn};

use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::task::{Task, TaskConfig, TaskHandle};
use crate::timer::{self, TickHandler, TickSource};

/// One entry of the caller-allocated task table
///
/// ```
/// use tickloop::TaskSlot;
///
/// static TABLE: [TaskSlot<'static>; 8] = [TaskSlot::EMPTY; 8];
/// ```
pub struct TaskSlot<'a>(Mutex<Cell<Option<&'a Task<'a>>>>);

impl<'a> TaskSlot<'a> {
    /// Unoccupied slot
    #[allow(clippy::declare_interior_mutable_const)]
    pub const EMPTY: Self = Self::new();

    /// Unoccupied slot
    pub const fn new() -> Self {
        Self(Mutex::new(Cell::new(None)))
    }

    /// Table of `N` unoccupied slots
    pub fn table<const N: usize>() -> [Self; N] {
        core::array::from_fn(|_| Self::new())
    }

    /// Occupied?
    pub fn is_occupied(&self) -> bool {
        self.get().is_some()
    }

    fn get(&self) -> Option<&'a Task<'a>> {
        critical_section::with(|cs| self.0.borrow(cs).get())
    }

    fn set(&self, task: Option<&'a Task<'a>>) {
        critical_section::with(|cs| self.0.borrow(cs).set(task));
    }
}

impl Default for TaskSlot<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Tick-driven cooperative scheduler
///
/// Lifecycle: `new` → `init` (exactly once) → `process` forever.
/// Every operation takes `&self`, so one instance can sit in a `static`
/// shared by the tick interrupt and the main loop.
pub struct Scheduler<'a> {
    /// Ticks since `init`
    ticks: Mutex<Cell<u64>>,
    /// Caller-allocated task table
    table: Mutex<Cell<&'a [TaskSlot<'a>]>>,
    /// Occupied prefix of the table (main loop only)
    registered_task_count: AtomicUsize,
    /// Fixed after `init`
    millisec_per_tick: AtomicU32,
    initialized: AtomicBool,
}

impl<'a> Scheduler<'a> {
    /// Uninitialized scheduler with no table
    pub const fn new() -> Self {
        Self {
            ticks: Mutex::new(Cell::new(0)),
            table: Mutex::new(Cell::new(&[])),
            registered_task_count: AtomicUsize::new(0),
            millisec_per_tick: AtomicU32::new(0),
            initialized: AtomicBool::new(false),
        }
    }

    /// Take ownership of the task table and bind the tick source
    ///
    /// All table slots are cleared, the tick count and the registered
    /// task count restart from 0. On failure no scheduler state changes.
    /// Must be called exactly once.
    pub fn init<S>(&'a self, config: SchedulerConfig<'a>, source: &mut S) -> Result<()>
    where
        S: TickSource<'a> + ?Sized,
    {
        if config.millisec_per_tick == 0 {
            warn!("init rejected: {}", Error::InvalidConfig);
            return Err(Error::InvalidConfig);
        }
        if config.task_table.is_empty() {
            warn!("init rejected: {}", Error::EmptyTaskTable);
            return Err(Error::EmptyTaskTable);
        }

        timer::bind(source, config.channel, config.millisec_per_tick, self)?;

        critical_section::with(|cs| {
            for slot in config.task_table {
                slot.0.borrow(cs).set(None);
            }
            self.table.borrow(cs).set(config.task_table);
            self.ticks.borrow(cs).set(0);
        });
        self.registered_task_count.store(0, Ordering::Relaxed);
        self.millisec_per_tick
            .store(config.millisec_per_tick, Ordering::Relaxed);
        self.initialized.store(true, Ordering::Release);

        info!(
            "scheduler initialized: {} slots, {} ms/tick",
            config.task_table.len(),
            config.millisec_per_tick
        );
        Ok(())
    }

    /// Register `task` in the next free slot
    ///
    /// The task's `init` callback runs before its period is armed.
    /// Registration is permanent and fixes the dispatch order.
    pub fn register(&self, task: &'a Task<'a>, config: TaskConfig<'a>) -> Result<TaskHandle> {
        let Some(body) = config.body else {
            warn!("register rejected: {}", Error::MissingCallback);
            return Err(Error::MissingCallback);
        };
        if !self.is_initialized() {
            warn!("register rejected: {}", Error::NotInitialized);
            return Err(Error::NotInitialized);
        }
        if task.is_registered() {
            warn!("register rejected: {}", Error::AlreadyRegistered);
            return Err(Error::AlreadyRegistered);
        }
        let table = self.table();
        let idx = self.registered_task_count();
        if idx >= table.len() {
            warn!("register rejected: {} ({} slots)", Error::TableFull, table.len());
            return Err(Error::TableFull);
        }

        task.install(body);
        task.mark_registered();
        table[idx].set(Some(task));
        self.registered_task_count.store(idx + 1, Ordering::Relaxed);

        // Registered before `init` runs, so `init` cannot register it again.
        body.init();

        let reload_ticks = self.reload_ticks_for(config.time_ms);
        task.arm(reload_ticks);

        info!(
            "task #{} registered: {} ms = {} ticks",
            idx, config.time_ms, reload_ticks
        );
        Ok(TaskHandle(idx))
    }

    /// Request a run on the next `process` pass, regardless of timing
    pub fn set_semaphore(&self, task: &Task<'_>) {
        task.set_semaphore();
    }

    /// Suspend periodic runs; semaphore runs still happen
    pub fn halt(&self, task: &Task<'_>) {
        task.halt();
    }

    /// Resume periodic runs, one full period from now
    pub fn restart(&self, task: &Task<'_>) {
        task.restart();
    }

    /// Change the period; the countdown restarts from the new period
    pub fn set_interval(&self, task: &Task<'_>, time_ms: u16) {
        if !self.is_initialized() {
            warn!("set_interval ignored: {}", Error::NotInitialized);
            return;
        }
        let reload_ticks = self.reload_ticks_for(time_ms);
        task.arm(reload_ticks);
        debug!("interval set: {} ms = {} ticks", time_ms, reload_ticks);
    }

    /// One tick elapsed (tick interrupt only)
    ///
    /// Scans the whole table, not just the registered prefix, so the
    /// cost per tick is constant. Empty slots are skipped.
    pub fn advance_tick(&self) {
        critical_section::with(|cs| {
            for slot in self.table.borrow(cs).get() {
                if let Some(task) = slot.0.borrow(cs).get() {
                    task.count_down();
                }
            }
            let ticks = self.ticks.borrow(cs);
            ticks.set(ticks.get().wrapping_add(1));
        });
    }

    /// Run every due task once, in registration order
    ///
    /// Returns the number of tasks dispatched. A task that missed several
    /// periods still runs only once per pass.
    pub fn process(&self) -> usize {
        if !self.is_initialized() {
            return 0;
        }

        let table = self.table();
        let count = self.registered_task_count();
        let mut dispatched = 0;

        for (idx, slot) in table[..count].iter().enumerate() {
            let Some(task) = slot.get() else { continue };
            let Some(body) = task.body() else { continue };
            if !task.is_ready() {
                continue;
            }

            task.begin_run();
            trace!("dispatch task #{}", idx);
            body.run();
            dispatched += 1;
        }

        dispatched
    }

    /// Super-loop: `process` forever
    pub fn run_forever(&self) -> ! {
        loop {
            self.process();
        }
    }

    /// Ticks since `init`
    pub fn get_tick_count(&self) -> u64 {
        critical_section::with(|cs| self.ticks.borrow(cs).get())
    }

    /// Milliseconds since `init`
    pub fn get_time_ms(&self) -> u64 {
        self.get_tick_count()
            .wrapping_mul(u64::from(self.millisec_per_tick()))
    }

    /// Milliseconds elapsed since `from` (a value of `get_time_ms`)
    pub fn get_time_lapse_ms(&self, from: u64) -> u64 {
        self.get_time_ms().wrapping_sub(from)
    }

    /// Busy-wait for at least `duration` milliseconds
    ///
    /// Blocks the main loop: no task runs while waiting. Never call from
    /// the tick interrupt. Returns at once if the scheduler is not
    /// initialized, since time would never advance.
    pub fn delay_ms(&self, duration: u64) {
        if !self.is_initialized() {
            return;
        }
        let start = self.get_time_ms();
        while self.get_time_lapse_ms(start) < duration {
            core::hint::spin_loop();
        }
    }

    /// Has `init` succeeded?
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Table capacity (0 before `init`)
    pub fn capacity(&self) -> usize {
        self.table().len()
    }

    /// Number of registered tasks
    pub fn registered_task_count(&self) -> usize {
        self.registered_task_count.load(Ordering::Relaxed)
    }

    /// Tick period in milliseconds (0 before `init`)
    pub fn millisec_per_tick(&self) -> u32 {
        self.millisec_per_tick.load(Ordering::Relaxed)
    }

    /// Task registered under `handle`
    pub fn task(&self, handle: TaskHandle) -> Option<&'a Task<'a>> {
        if handle.0 >= self.registered_task_count() {
            return None;
        }
        self.table().get(handle.0).and_then(TaskSlot::get)
    }

    fn table(&self) -> &'a [TaskSlot<'a>] {
        critical_section::with(|cs| self.table.borrow(cs).get())
    }

    /// Integer division: a sub-tick period becomes 0 (every pass)
    fn reload_ticks_for(&self, time_ms: u16) -> u16 {
        let millisec_per_tick = self.millisec_per_tick();
        let ticks = u32::from(time_ms) / millisec_per_tick;
        if ticks == 0 && time_ms > 0 {
            debug!(
                "sub-tick period: {} ms < {} ms/tick, task runs every pass",
                time_ms, millisec_per_tick
            );
        }
        // ticks <= time_ms since millisec_per_tick >= 1
        ticks as u16
    }
}

impl TickHandler for Scheduler<'_> {
    fn on_tick(&self) {
        self.advance_tick();
    }
}

impl Default for Scheduler<'_> {
    fn default() -> Self {
        Self::new()
    }
}
