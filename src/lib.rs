//! An embedded file-service server speaking the compact MFS binary protocol.
//!
//! The crate root only wires modules together; see [`server`] for the
//! accept/serve loop, [`codec`] for the wire format, and [`registry`] for how
//! files are registered with read/write handlers.

pub mod buffers;
pub mod client;
pub mod codec;
pub mod dispatch;
pub mod logger;
pub mod logging;
pub mod registry;
pub mod server;
pub mod transport;
