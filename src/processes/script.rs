//! Scripted sequential processes.
//!
//! A [`Script`] runs one step per tick and finishes after the last one, which
//! makes it the usual way to write a stimulus driver. A [`Repeat`] runs the
//! same body every tick and never finishes.

use crate::error::SimResult;
use crate::executor::ProcessIo;
use crate::process::{Resume, Sequential};

type Step = Box<dyn FnMut(&mut ProcessIo<'_>) -> SimResult<()> + Send>;

/// Runs one step per tick, in order, then finishes.
///
/// ```rust
/// use tickwire::prelude::*;
///
/// let flag = BusShape::new("Flag").signal("on", SignalType::Bool).build()?;
/// let mut net = NetworkBuilder::new();
/// let out = net.create_bus(&flag, Some("out"))?;
/// let script = Script::new()
///     .then(move |io| io.write(out, "on", true))
///     .then(move |io| io.write(out, "on", false));
/// assert_eq!(script.len(), 2);
/// net.sequential("stim", script).output(out).driver().register()?;
/// # Ok::<(), tickwire::SimError>(())
/// ```
#[derive(Default)]
pub struct Script {
    steps: Vec<Step>,
    next: usize,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step run on the following tick.
    pub fn then<F>(mut self, step: F) -> Self
    where
        F: FnMut(&mut ProcessIo<'_>) -> SimResult<()> + Send + 'static,
    {
        self.steps.push(Box::new(step));
        self
    }

    /// Appends a tick where the script does nothing.
    pub fn idle(self) -> Self {
        self.then(|_| Ok(()))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps not yet run.
    pub fn remaining(&self) -> usize {
        self.steps.len() - self.next
    }
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Script")
            .field("steps", &self.steps.len())
            .field("next", &self.next)
            .finish()
    }
}

impl Sequential for Script {
    fn init(&mut self) {
        self.next = 0;
    }

    fn resume(&mut self, io: &mut ProcessIo<'_>) -> SimResult<Resume> {
        if let Some(step) = self.steps.get_mut(self.next) {
            step(io)?;
            self.next += 1;
        }
        Ok(if self.next >= self.steps.len() {
            Resume::Finished
        } else {
            Resume::Yield
        })
    }
}

/// Runs the same body every tick, forever.
pub struct Repeat<F> {
    body: F,
}

impl<F> Repeat<F>
where
    F: FnMut(&mut ProcessIo<'_>) -> SimResult<()> + Send,
{
    pub fn new(body: F) -> Self {
        Self { body }
    }
}

impl<F> Sequential for Repeat<F>
where
    F: FnMut(&mut ProcessIo<'_>) -> SimResult<()> + Send,
{
    fn resume(&mut self, io: &mut ProcessIo<'_>) -> SimResult<Resume> {
        (self.body)(io)?;
        Ok(Resume::Yield)
    }
}
