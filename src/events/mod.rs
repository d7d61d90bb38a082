//! C2: fan-out event bus with per-channel subscriber buffers, heartbeat,
//! and "initial state" replay on connect.

mod bus;

pub use bus::{EventBus, EventReceiver};
