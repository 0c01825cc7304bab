//! Queue intake: drain a queue into a fragment collection
//!
//! The drainer polls until one of three exits fires: an empty receive with
//! all depth counters at zero, a streak of empty receives while the
//! (approximate, possibly lagging) counters stay nonzero, or an optional
//! total poll bound. Each captured message is deleted; a message that cannot
//! be parsed or deleted is left for the queue to redeliver.

mod drain;
mod fragment;

pub use drain::{DrainReport, DrainStats, QueueDrainer};
pub use fragment::{fragment_from_message, ORDER_ATTRIBUTE, WORD_ATTRIBUTE};
