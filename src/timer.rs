//! Tick source binding — hardware-abstract periodic interrupt
//!
//! The scheduler never touches timer registers itself. It hands a
//! `TickHandler` to a `TickSource`, which arranges for `on_tick` to be
//! called every `period_ms` from interrupt context.
//!
//! On real hardware this wraps SysTick (feature `cortex-m`) or a vendor
//! timer. For testing, `SoftwareTickSource` fires ticks on demand.
//!
//! Author: Moroya Sakamoto

use log::{debug, warn};

use crate::error::TickSourceError;

/// Hardware timer channel identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerChannel(pub u8);

/// Receiver of periodic ticks
///
/// `on_tick` runs in interrupt context: it must be short and must not block.
pub trait TickHandler: Sync {
    /// One period elapsed
    fn on_tick(&self);
}

/// Periodic interrupt capability
pub trait TickSource<'a> {
    /// Fire `handler` every `period_ms` on `channel`
    fn configure(
        &mut self,
        channel: TimerChannel,
        period_ms: u32,
        handler: &'a dyn TickHandler,
    ) -> Result<(), TickSourceError>;
}

/// Bind `handler` to `source`
///
/// Hardware failures are surfaced to the caller, never retried.
pub fn bind<'a, S>(
    source: &mut S,
    channel: TimerChannel,
    period_ms: u32,
    handler: &'a dyn TickHandler,
) -> Result<(), TickSourceError>
where
    S: TickSource<'a> + ?Sized,
{
    debug!("binding tick source: channel {} period {} ms", channel.0, period_ms);
    if period_ms == 0 {
        warn!("tick source rejected: zero period");
        return Err(TickSourceError::InvalidPeriod);
    }
    source.configure(channel, period_ms, handler).map_err(|err| {
        warn!("tick source rejected: {}", err);
        err
    })
}

/// Software tick source
///
/// Ticks are produced by calling `fire`, which runs the bound handler
/// synchronously in the caller's context.
pub struct SoftwareTickSource<'a> {
    handler: Option<&'a dyn TickHandler>,
    channel: TimerChannel,
    period_ms: u32,
    channels: u8,
    failure: Option<TickSourceError>,
}

impl<'a> SoftwareTickSource<'a> {
    /// Number of channels of a default software source
    pub const DEFAULT_CHANNELS: u8 = 4;

    /// Unbound source with `DEFAULT_CHANNELS` channels
    pub const fn new() -> Self {
        Self {
            handler: None,
            channel: TimerChannel(0),
            period_ms: 0,
            channels: Self::DEFAULT_CHANNELS,
            failure: None,
        }
    }

    /// Source with `channels` channels
    pub const fn with_channels(channels: u8) -> Self {
        Self {
            channels,
            ..Self::new()
        }
    }

    /// Source whose configuration always fails with `err`
    pub const fn failing(err: TickSourceError) -> Self {
        Self {
            failure: Some(err),
            ..Self::new()
        }
    }

    /// Is a handler bound?
    pub fn is_bound(&self) -> bool {
        self.handler.is_some()
    }

    /// Configured channel
    pub fn channel(&self) -> TimerChannel {
        self.channel
    }

    /// Configured period (0 while unbound)
    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    /// Deliver one tick
    pub fn fire(&self) {
        if let Some(handler) = self.handler {
            handler.on_tick();
        }
    }

    /// Deliver `n` ticks
    pub fn fire_n(&self, n: u32) {
        for _ in 0..n {
            self.fire();
        }
    }
}

impl<'a> TickSource<'a> for SoftwareTickSource<'a> {
    fn configure(
        &mut self,
        channel: TimerChannel,
        period_ms: u32,
        handler: &'a dyn TickHandler,
    ) -> Result<(), TickSourceError> {
        if let Some(err) = self.failure {
            return Err(err);
        }
        if channel.0 >= self.channels {
            return Err(TickSourceError::UnsupportedChannel);
        }
        self.handler = Some(handler);
        self.channel = channel;
        self.period_ms = period_ms;
        Ok(())
    }
}

impl Default for SoftwareTickSource<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// SysTick-driven tick source (ARM Cortex-M)
///
/// SysTick has a single channel (0). The application forwards its
/// `SysTick` exception to [`systick_tick`]:
///
/// ```ignore
/// #[exception]
/// fn SysTick() {
///     tickloop::timer::systick_tick();
/// }
/// ```
///
/// A `critical-section` implementation (e.g. `cortex-m`'s
/// `critical-section-single-core`) must be linked by the application.
#[cfg(feature = "cortex-m")]
pub use self::systick::{systick_tick, SysTickSource};

#[cfg(feature = "cortex-m")]
mod systick {
    use core::cell::Cell;

    use cortex_m::peripheral::syst::SystClkSource;
    use cortex_m::peripheral::SYST;
    use critical_section::Mutex;

    use super::{TickHandler, TickSource, TimerChannel};
    use crate::error::TickSourceError;

    /// SysTick reload register is 24 bits wide
    const SYST_MAX_RELOAD: u64 = 0x00FF_FFFF;

    static HANDLER: Mutex<Cell<Option<&'static dyn TickHandler>>> = Mutex::new(Cell::new(None));

    /// SysTick tick source
    pub struct SysTickSource {
        syst: SYST,
        core_clock_hz: u32,
    }

    impl SysTickSource {
        /// Take ownership of SYST, clocked from the core at `core_clock_hz`
        pub fn new(syst: SYST, core_clock_hz: u32) -> Self {
            Self { syst, core_clock_hz }
        }
    }

    impl TickSource<'static> for SysTickSource {
        fn configure(
            &mut self,
            channel: TimerChannel,
            period_ms: u32,
            handler: &'static dyn TickHandler,
        ) -> Result<(), TickSourceError> {
            if channel != TimerChannel(0) {
                return Err(TickSourceError::UnsupportedChannel);
            }
            let cycles = u64::from(self.core_clock_hz) / 1000 * u64::from(period_ms);
            if cycles == 0 || cycles - 1 > SYST_MAX_RELOAD {
                return Err(TickSourceError::InvalidPeriod);
            }

            critical_section::with(|cs| HANDLER.borrow(cs).set(Some(handler)));

            self.syst.disable_counter();
            self.syst.set_clock_source(SystClkSource::Core);
            self.syst.set_reload((cycles - 1) as u32);
            self.syst.clear_current();
            self.syst.enable_interrupt();
            self.syst.enable_counter();
            Ok(())
        }
    }

    /// Forward one SysTick exception to the bound handler
    pub fn systick_tick() {
        let handler = critical_section::with(|cs| HANDLER.borrow(cs).get());
        if let Some(handler) = handler {
            handler.on_tick();
        }
    }
}
