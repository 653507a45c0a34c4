//! Reconnection policy.
//!
//! This module groups the knobs that control **whether** a dropped connection
//! is recovered automatically and **how long** to wait between attempts.
//!
//! ## Contents
//! - [`ReconnectPolicy`] — exponential backoff schedule plus attempt budget
//!
//! ## Quick wiring
//! ```text
//! ContainerConfig { reconnect: ReconnectPolicy, .. }
//!      └─► core::actor::ContainerActor uses:
//!           - budget_left(attempts) to decide whether a close schedules a retry
//!           - delay_for(attempt) to arm the reconnect timer
//! ```
//!
//! ## Defaults
//! - `first = 5s`, `factor = 2.0`, `cap = 300s`, `max_attempts = 10`.

mod reconnect;

pub use reconnect::ReconnectPolicy;
