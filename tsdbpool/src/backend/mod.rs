//! Connections to the metrics backend.

pub mod connector;
pub mod disconnect_reason;
pub mod endpoint;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod tweaks;

pub use connector::{Connector, TcpConnector};
pub use disconnect_reason::DisconnectReason;
pub use endpoint::{Endpoint, EndpointOptions};
pub use error::Error;
pub use pool::{Address, Lease, Pool, PoolConfig};
pub use protocol::{put_message, Metric};
pub use tweaks::tweak;
