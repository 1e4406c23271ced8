//! tickloop — cooperative super-loop scheduler
//!
//! Runs a fixed set of periodic callbacks from a single main loop on
//! targets without an RTOS. A hardware timer interrupt only advances the
//! tick; the main loop dispatches due tasks:
//! - Caller-owned task records and task table (no heap, no allocation)
//! - Run-to-completion dispatch in registration order, no preemption
//! - One-shot semaphores and halt/restart of periodic tasks
//! - Lock-free single-writer protocol between tick interrupt and main loop
//!
//! ```
//! use core::sync::atomic::{AtomicU32, Ordering};
//! use tickloop::{Scheduler, SchedulerConfig, SoftwareTickSource, Task, TaskConfig, TaskSlot, WithParam};
//!
//! fn blink(count: &AtomicU32) {
//!     count.fetch_add(1, Ordering::Relaxed);
//! }
//!
//! let led = WithParam::new(blink, AtomicU32::new(0));
//! let task = Task::new();
//! let table: [TaskSlot; 4] = TaskSlot::table();
//! let scheduler = Scheduler::new();
//! let mut tick = SoftwareTickSource::new();
//!
//! scheduler.init(SchedulerConfig::new(&table).with_millisec_per_tick(10), &mut tick)?;
//! scheduler.register(&task, TaskConfig::new(&led, 100))?;
//!
//! tick.fire_n(10);
//! assert_eq!(scheduler.process(), 1);
//! assert_eq!(led.param().load(Ordering::Relaxed), 1);
//! # Ok::<(), tickloop::Error>(())
//! ```
//!
//! Author: Moroya Sakamoto

#![no_std]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod config;
pub mod error;
pub mod scheduler;
pub mod task;
pub mod timer;

pub use config::SchedulerConfig;
pub use error::{Error, Result, TickSourceError};
pub use scheduler::{Scheduler, TaskSlot};
pub use task::{InitRun, Task, TaskBody, TaskConfig, TaskHandle, WithParam};
pub use timer::{SoftwareTickSource, TickHandler, TickSource, TimerChannel};
