//! Keeps the [`Registry`](crate::registry::Registry) in step with the
//! runtime's container lifecycle events.

mod backoff;
mod listener;

pub use backoff::Backoff;
pub use listener::{Listener, process_event};
