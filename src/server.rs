//! UDP serve loop. One task per inbound datagram; the shared handler lock
//! is the only synchronization point.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, warn};

use crate::SharedHandler;
use crate::packet::{BOOT_REQUEST, DhcpPacket};

const CLIENT_PORT: u16 = 68;

pub async fn run(listen: SocketAddr, handler: SharedHandler) -> Result<()> {
    // Raw socket so SO_BROADCAST can be set before binding.
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .context("failed to create UDP socket")?;
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket
        .bind(&listen.into())
        .with_context(|| format!("failed to bind {listen}"))?;
    socket.set_nonblocking(true)?;
    let socket = Arc::new(tokio::net::UdpSocket::from_std(socket.into())?);

    info!("DHCP server listening on {listen}");

    let mut buf = [0u8; 1500];

    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(error) => {
                warn!("recv error: {error}");
                continue;
            }
        };

        let packet = match DhcpPacket::parse(&buf[..len]) {
            Ok(packet) => packet,
            Err(error) => {
                debug!("invalid DHCP packet from {peer}: {error}");
                continue;
            }
        };

        if packet.op != BOOT_REQUEST {
            continue;
        }

        let handler = handler.clone();
        let socket = socket.clone();
        tokio::spawn(async move {
            let reply = handler.lock().await.handle(&packet);

            if let Some(reply) = reply {
                let dest = reply_destination(&packet, peer);
                if let Err(error) = socket.send_to(&reply.to_bytes(), dest).await {
                    // Allocation state is not rolled back; the client will
                    // re-run the transaction, which is idempotent.
                    warn!("failed to send reply to {dest}: {error}");
                }
            }
        });
    }
}

/// Replies go back to the originating peer. Clients that have no address
/// yet (source 0.0.0.0) or that asked for broadcast get the reply on
/// 255.255.255.255:68.
fn reply_destination(request: &DhcpPacket, peer: SocketAddr) -> SocketAddr {
    if request.is_broadcast() || peer.ip().is_unspecified() {
        SocketAddr::new(Ipv4Addr::BROADCAST.into(), CLIENT_PORT)
    } else {
        peer
    }
}
