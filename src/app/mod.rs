//! Application boundary: ports and outbound events.
//!
//! Nothing in here performs I/O. Drivers and adapters plug into the engine
//! through the **port traits** in [`ports`]; the engine reports what it did
//! through the events in [`events`].

pub mod events;
pub mod ports;
