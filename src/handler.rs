//! Per-message-type DHCP protocol handling.
//!
//! Stateless between messages: there is no pending-offer bookkeeping, every
//! packet is answered against the pool's current allocation state. Returning
//! `None` drops the message with no reply; the client retries the whole
//! transaction.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use tracing::{debug, info, warn};

use crate::options::{DhcpOption, MessageType};
use crate::packet::DhcpPacket;
use crate::pool::{AllocationPool, MacAddr};

/// Protocol responder for one subnet. Network parameters are fixed at
/// construction; the owned pool is the only mutable state.
pub struct LeaseHandler {
    subnet: Ipv4Net,
    gateway: Ipv4Addr,
    dns: Ipv4Addr,
    server_ip: Ipv4Addr,
    pool: AllocationPool,
}

impl LeaseHandler {
    pub fn new(
        subnet: Ipv4Net,
        gateway: Ipv4Addr,
        dns: Ipv4Addr,
        server_ip: Ipv4Addr,
        pool: AllocationPool,
    ) -> Self {
        Self {
            subnet,
            gateway,
            dns,
            server_ip,
            pool,
        }
    }

    pub fn pool(&self) -> &AllocationPool {
        &self.pool
    }

    /// Dispatch one inbound packet, producing the reply to send (if any).
    pub fn handle(&mut self, packet: &DhcpPacket) -> Option<DhcpPacket> {
        let Some(kind) = packet.msg_type() else {
            debug!("packet without a valid message type, ignoring");
            return None;
        };

        match kind {
            MessageType::Discover => self.offer(packet),
            MessageType::Request => self.acknowledge(packet),
            MessageType::Release => self.release(packet),
            other => {
                debug!("ignoring {other}");
                None
            }
        }
    }

    /// DISCOVER → OFFER. Pool exhaustion is logged and the message dropped;
    /// the client will retry or time out.
    fn offer(&mut self, packet: &DhcpPacket) -> Option<DhcpPacket> {
        let mac = Self::client_mac(packet)?;
        info!("DHCPDISCOVER from {mac}");

        let address = match self.pool.allocate(mac) {
            Ok(address) => address,
            Err(error) => {
                warn!("cannot offer a lease to {mac}: {error}");
                return None;
            }
        };

        info!("DHCPOFFER {address} to {mac}");

        let mut reply = packet.reply_to(MessageType::Offer, self.server_ip);
        reply.yiaddr = address;
        reply.options.push(DhcpOption::router(self.gateway));
        reply.options.push(DhcpOption::dns_server(self.dns));
        Some(reply)
    }

    /// REQUEST → ACK. The claimed address is confirmed as-is, without
    /// checking it against what was offered.
    fn acknowledge(&self, packet: &DhcpPacket) -> Option<DhcpPacket> {
        let mac = Self::client_mac(packet)?;

        let Some(claimed) = Self::claimed_ip(packet) else {
            warn!("DHCPREQUEST from {mac} without a client IP, dropping");
            return None;
        };

        if !self.subnet.contains(&claimed) {
            warn!("DHCPREQUEST from {mac} claims {claimed}, outside {}", self.subnet);
        }

        info!("DHCPACK {claimed} to {mac}");

        let mut reply = packet.reply_to(MessageType::Ack, self.server_ip);
        reply.ciaddr = claimed;
        Some(reply)
    }

    /// RELEASE → ACK, after the address goes back to the free set. A failed
    /// release is logged and the message dropped.
    fn release(&mut self, packet: &DhcpPacket) -> Option<DhcpPacket> {
        let mac = Self::client_mac(packet)?;

        let Some(address) = Self::claimed_ip(packet) else {
            warn!("DHCPRELEASE from {mac} without a client IP, dropping");
            return None;
        };

        if let Err(error) = self.pool.release(address) {
            warn!("release of {address} from {mac} failed: {error}");
            return None;
        }

        info!("DHCPRELEASE {address} from {mac}");

        let mut reply = packet.reply_to(MessageType::Ack, self.server_ip);
        reply.ciaddr = address;
        Some(reply)
    }

    fn client_mac(packet: &DhcpPacket) -> Option<MacAddr> {
        let mac = packet.hw_addr();
        if mac.is_none() {
            warn!("packet without a usable client hardware address, dropping");
        }
        mac
    }

    /// The address the client claims to hold: ciaddr, or the requested-IP
    /// option for clients that leave ciaddr zeroed.
    fn claimed_ip(packet: &DhcpPacket) -> Option<Ipv4Addr> {
        if packet.ciaddr != Ipv4Addr::UNSPECIFIED {
            Some(packet.ciaddr)
        } else {
            packet.requested_ip()
        }
    }
}
