pub mod config;
pub mod handler;
pub mod options;
pub mod packet;
pub mod pool;
pub mod server;

pub use config::Config;
pub use handler::LeaseHandler;
pub use options::{DhcpOption, MessageType};
pub use packet::DhcpPacket;
pub use pool::{AllocationPool, MacAddr, PoolError};

use std::sync::Arc;
use tokio::sync::Mutex;

/// The handler (and the pool it owns) is shared across per-datagram tasks.
/// All pool access goes through this lock so the free-entry scan and the
/// mark-allocated step are one indivisible operation.
pub type SharedHandler = Arc<Mutex<LeaseHandler>>;
