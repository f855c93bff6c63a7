//! # Bode Sweep Library
//!
//! Closed-loop frequency-response measurement. For each point of a
//! frequency plan the orchestrator stimulates the device under test, waits
//! for it to settle, keeps the oscilloscope's vertical scale inside its
//! measurable window and records amplitude and phase.
//!
//! ## Components
//!
//! 1. **FrequencyPlan** - ordered stimulus frequencies, linear or logarithmic
//! 2. **AutoRangeEngine** - bounded Sample → Evaluate → Settled state machine per channel
//! 3. **SweepOrchestrator** - one strictly sequential pass over the plan
//! 4. **Clock / CancelToken** - the only suspension points, cancellable between steps
//!
//! ## Failure model
//!
//! Every failure aborts the remaining plan. The points committed before the
//! failure are returned alongside it in a [`SweepReport`].

pub mod autorange;
pub mod error;
pub mod orchestrator;
pub mod pacing;
pub mod plan;

pub use crate::autorange::{AutoRangeEngine, ChannelRangeState, RangeVerdict, Settled};
pub use crate::error::{ExhaustReason, SweepError};
pub use crate::orchestrator::{SweepOrchestrator, SweepReport, SweepStatus};
pub use crate::pacing::{CancelToken, Clock, SystemClock, VirtualClock};
pub use crate::plan::FrequencyPlan;
