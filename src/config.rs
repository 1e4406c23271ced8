//! Scheduler configuration
//!
//! Author: Moroya Sakamoto

use crate::scheduler::TaskSlot;
use crate::timer::TimerChannel;

/// Default tick period in milliseconds
pub const DEFAULT_MILLISEC_PER_TICK: u32 = 1;

/// Default hardware timer channel
pub const DEFAULT_TIMER_CHANNEL: TimerChannel = TimerChannel(0);

/// Initialization parameters of a `Scheduler`
///
/// The task table is caller-allocated; its length is the scheduler's
/// capacity and never changes.
#[derive(Clone, Copy)]
pub struct SchedulerConfig<'a> {
    /// Backing storage of the task table
    pub task_table: &'a [TaskSlot<'a>],
    /// Timer channel driving the tick
    pub channel: TimerChannel,
    /// Duration of one tick in milliseconds (must be non-zero)
    pub millisec_per_tick: u32,
}

impl<'a> SchedulerConfig<'a> {
    /// Config over `task_table` with default channel and tick period
    pub const fn new(task_table: &'a [TaskSlot<'a>]) -> Self {
        Self {
            task_table,
            channel: DEFAULT_TIMER_CHANNEL,
            millisec_per_tick: DEFAULT_MILLISEC_PER_TICK,
        }
    }

    /// Drive the tick from `channel`
    pub const fn with_channel(self, channel: TimerChannel) -> Self {
        Self { channel, ..self }
    }

    /// Tick period in milliseconds
    pub const fn with_millisec_per_tick(self, millisec_per_tick: u32) -> Self {
        Self {
            millisec_per_tick,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let table: [TaskSlot; 3] = TaskSlot::table();
        let config = SchedulerConfig::new(&table);
        assert_eq!(config.task_table.len(), 3);
        assert_eq!(config.channel, DEFAULT_TIMER_CHANNEL);
        assert_eq!(config.millisec_per_tick, DEFAULT_MILLISEC_PER_TICK);
    }

    #[test]
    fn test_builder() {
        let table: [TaskSlot; 1] = TaskSlot::table();
        let config = SchedulerConfig::new(&table)
            .with_channel(TimerChannel(3))
            .with_millisec_per_tick(10);
        assert_eq!(config.channel, TimerChannel(3));
        assert_eq!(config.millisec_per_tick, 10);
    }
}
