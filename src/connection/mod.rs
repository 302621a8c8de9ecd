//! Connection handler (spec §4.F): classifies a socket at upgrade time and
//! runs its per-connection read loop.

pub mod dispatch;

pub use dispatch::{run_agent, run_subscriber, ConnectionContext};
