use crate::engine::ProcessEngine;
use crate::error::Result;
use crate::types::Instant;
use anyhow::anyhow;
use tracing::debug;

/// Monotonic view of the engine's virtual clock for one run.
///
/// Every read is checked against the previous one, and advances only ever
/// move forward.
pub struct VirtualClock<'e> {
    engine: &'e dyn ProcessEngine,
    last: Option<Instant>,
}

impl<'e> VirtualClock<'e> {
    pub fn new(engine: &'e dyn ProcessEngine) -> Self {
        Self { engine, last: None }
    }

    pub fn now(&mut self) -> Result<Instant> {
        let now = self.engine.current_time()?;
        if let Some(last) = self.last {
            if now < last {
                return Err(anyhow!("virtual clock moved backwards from {last} to {now}").into());
            }
        }
        self.last = Some(now);
        Ok(now)
    }

    /// Move the clock to `at` if that is later than now. Returns whether the
    /// clock moved.
    pub fn advance_to(&mut self, at: Instant) -> Result<bool> {
        let now = self.now()?;
        if at <= now {
            return Ok(false);
        }
        self.engine.set_current_time(at)?;
        debug!(from = %now, to = %at, "virtual clock advanced");
        self.last = Some(at);
        Ok(true)
    }
}
