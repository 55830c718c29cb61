//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter           | Implements   | Connects to                 |
//! |-------------------|--------------|-----------------------------|
//! | `log_sink`        | EventSink    | `log` facade                |
//! | `callback_fanout` | GattCallback | several driver callbacks    |

pub mod callback_fanout;
pub mod log_sink;
