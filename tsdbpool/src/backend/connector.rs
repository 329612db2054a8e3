//! Opening new backend connections.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info};

use tsdbpool_config::Tcp;

use super::pool::Address;
use super::{tweak, Endpoint, EndpointOptions, Error};

/// Creates connections for the pool.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new connection to the backend.
    async fn open(&self, addr: &Address) -> Result<Endpoint, Error>;
}

/// Plain TCP connections with configured socket options.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    tcp: Tcp,
    options: EndpointOptions,
}

impl TcpConnector {
    pub fn new(tcp: Tcp, options: EndpointOptions) -> Self {
        Self { tcp, options }
    }

    /// Create from the pool configuration.
    pub fn from_config(config: &tsdbpool_config::Config) -> Self {
        Self::new(config.tcp.clone(), EndpointOptions::new(config))
    }

    async fn connect(&self, addr: &Address) -> Result<TcpStream, Error> {
        let socket_addr = addr.addr().await?;
        let socket = match socket_addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        tweak(&socket, &self.tcp)?;

        let stream = socket.connect(socket_addr).await?;
        // Lines are batched in the write buffer already.
        stream.set_nodelay(true)?;

        Ok(stream)
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn open(&self, addr: &Address) -> Result<Endpoint, Error> {
        debug!("=> {}", addr);

        let stream = timeout(self.tcp.connect_timeout(), self.connect(addr))
            .await
            .map_err(|_| Error::ConnectTimeout(addr.clone()))??;

        info!("new connection [{}]", addr);

        Ok(Endpoint::new(stream, addr.clone(), &self.options))
    }
}
