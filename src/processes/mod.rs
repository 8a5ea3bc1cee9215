//! Built-in process implementations.
//!
//! These processes can be used directly or as references for implementing
//! custom ones.
//!
//! # Available Processes
//!
//! ## Combinational
//! - [`Passthrough`] - Copies signals from one bus to another; a register when
//!   the output bus is clocked
//!
//! ## Sequential
//! - [`DelayLine`] - Delays one signal by a fixed number of ticks
//! - [`Script`] - Runs one step per tick, then finishes (a driver)
//! - [`Repeat`] - Runs the same body every tick, forever

pub mod delay;
pub mod passthrough;
pub mod script;

pub use delay::DelayLine;
pub use passthrough::Passthrough;
pub use script::{Repeat, Script};
