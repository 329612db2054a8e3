use std::io::Result;

use socket2::SockRef;
use tokio::net::TcpSocket;
use tracing::debug;

use tsdbpool_config::Tcp;

/// Apply socket options before the connection is established,
/// so buffer sizes are taken into account during the handshake.
pub fn tweak(socket: &TcpSocket, config: &Tcp) -> Result<()> {
    debug!("TCP settings: {}", config);

    let sock_ref = SockRef::from(socket);
    sock_ref.set_keepalive(config.keepalive())?;

    if let Some(size) = config.send_buffer_size() {
        sock_ref.set_send_buffer_size(size)?;
    }

    if let Some(size) = config.recv_buffer_size() {
        sock_ref.set_recv_buffer_size(size)?;
    }

    Ok(())
}
