//! DHCPv4 packet parser/serializer (RFC 2131 fixed header + options)

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::options::{self, DhcpOption, MessageType, OPT_MSG_TYPE, OPT_REQUESTED_IP};
use crate::pool::MacAddr;

pub const MAGIC_COOKIE: [u8; 4] = [0x63, 0x82, 0x53, 0x63];

pub const BOOT_REQUEST: u8 = 1;
pub const BOOT_REPLY: u8 = 2;

/// Fixed header is 236 bytes, followed by the 4-byte magic cookie.
const MIN_PACKET_LEN: usize = 240;

/// Clients expect at least this much on the wire.
const MIN_REPLY_LEN: usize = 300;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("packet too short: {0} bytes (minimum {MIN_PACKET_LEN})")]
    TooShort(usize),
    #[error("invalid magic cookie")]
    InvalidMagic,
}

#[derive(Debug, Clone)]
pub struct DhcpPacket {
    pub op: u8,
    pub htype: u8,
    pub hlen: u8,
    pub hops: u8,
    pub xid: u32,
    pub secs: u16,
    pub flags: u16,
    pub ciaddr: Ipv4Addr,
    pub yiaddr: Ipv4Addr,
    pub siaddr: Ipv4Addr,
    pub giaddr: Ipv4Addr,
    pub chaddr: [u8; 16],
    pub sname: [u8; 64],
    pub file: [u8; 128],
    pub options: Vec<DhcpOption>,
}

impl DhcpPacket {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() < MIN_PACKET_LEN {
            return Err(ParseError::TooShort(data.len()));
        }
        if data[236..240] != MAGIC_COOKIE {
            return Err(ParseError::InvalidMagic);
        }

        let mut chaddr = [0u8; 16];
        chaddr.copy_from_slice(&data[28..44]);
        let mut sname = [0u8; 64];
        sname.copy_from_slice(&data[44..108]);
        let mut file = [0u8; 128];
        file.copy_from_slice(&data[108..236]);

        Ok(Self {
            op: data[0],
            htype: data[1],
            hlen: data[2],
            hops: data[3],
            xid: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
            secs: u16::from_be_bytes([data[8], data[9]]),
            flags: u16::from_be_bytes([data[10], data[11]]),
            ciaddr: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
            yiaddr: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
            siaddr: Ipv4Addr::new(data[20], data[21], data[22], data[23]),
            giaddr: Ipv4Addr::new(data[24], data[25], data[26], data[27]),
            chaddr,
            sname,
            file,
            options: options::parse_options(&data[MIN_PACKET_LEN..]),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(576);

        buf.push(self.op);
        buf.push(self.htype);
        buf.push(self.hlen);
        buf.push(self.hops);
        buf.extend_from_slice(&self.xid.to_be_bytes());
        buf.extend_from_slice(&self.secs.to_be_bytes());
        buf.extend_from_slice(&self.flags.to_be_bytes());
        buf.extend_from_slice(&self.ciaddr.octets());
        buf.extend_from_slice(&self.yiaddr.octets());
        buf.extend_from_slice(&self.siaddr.octets());
        buf.extend_from_slice(&self.giaddr.octets());
        buf.extend_from_slice(&self.chaddr);
        buf.extend_from_slice(&self.sname);
        buf.extend_from_slice(&self.file);
        buf.extend_from_slice(&MAGIC_COOKIE);
        buf.extend_from_slice(&options::encode_options(&self.options));

        buf.resize(buf.len().max(MIN_REPLY_LEN), 0);
        buf
    }

    /// Client hardware address, only when it is a plausible Ethernet MAC.
    pub fn hw_addr(&self) -> Option<MacAddr> {
        if self.htype != 1 || self.hlen != 6 {
            return None;
        }
        let mut octets = [0u8; 6];
        octets.copy_from_slice(&self.chaddr[..6]);
        let mac = MacAddr::new(octets);
        (!mac.is_zero()).then_some(mac)
    }

    pub fn get_option(&self, code: u8) -> Option<&DhcpOption> {
        self.options.iter().find(|o| o.code == code)
    }

    pub fn msg_type(&self) -> Option<MessageType> {
        MessageType::from_u8(self.get_option(OPT_MSG_TYPE)?.as_u8()?)
    }

    pub fn requested_ip(&self) -> Option<Ipv4Addr> {
        self.get_option(OPT_REQUESTED_IP)?.as_ipv4()
    }

    pub fn is_broadcast(&self) -> bool {
        self.flags & 0x8000 != 0
    }

    /// Reply skeleton for this request: a BOOTREPLY echoing the transaction
    /// ID, hardware address, flags and giaddr, stamped with the message type
    /// and server identifier. The caller fills in yiaddr/ciaddr and any
    /// further options.
    pub fn reply_to(&self, kind: MessageType, server_ip: Ipv4Addr) -> DhcpPacket {
        DhcpPacket {
            op: BOOT_REPLY,
            htype: self.htype,
            hlen: self.hlen,
            hops: 0,
            xid: self.xid,
            secs: 0,
            flags: self.flags,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: server_ip,
            giaddr: self.giaddr,
            chaddr: self.chaddr,
            sname: [0u8; 64],
            file: [0u8; 128],
            options: vec![
                DhcpOption::message_type(kind),
                DhcpOption::server_id(server_ip),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OPT_SERVER_ID;

    fn make_discover() -> Vec<u8> {
        let mut pkt = vec![0u8; 300];
        pkt[0] = BOOT_REQUEST;
        pkt[1] = 1; // Ethernet
        pkt[2] = 6; // MAC length
        pkt[4..8].copy_from_slice(&0x12345678u32.to_be_bytes());
        pkt[28..34].copy_from_slice(&[0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]);
        pkt[236..240].copy_from_slice(&MAGIC_COOKIE);
        pkt[240] = OPT_MSG_TYPE;
        pkt[241] = 1;
        pkt[242] = MessageType::Discover as u8;
        pkt[243] = 255; // END
        pkt
    }

    #[test]
    fn test_parse_discover() {
        let pkt = DhcpPacket::parse(&make_discover()).unwrap();
        assert_eq!(pkt.op, BOOT_REQUEST);
        assert_eq!(pkt.xid, 0x12345678);
        assert_eq!(pkt.msg_type(), Some(MessageType::Discover));
        assert_eq!(
            pkt.hw_addr(),
            Some(MacAddr::new([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01]))
        );
    }

    #[test]
    fn test_parse_rejects_short_packet() {
        assert!(matches!(
            DhcpPacket::parse(&[0u8; 100]),
            Err(ParseError::TooShort(100))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_cookie() {
        let mut data = make_discover();
        data[236] = 0;
        assert!(matches!(
            DhcpPacket::parse(&data),
            Err(ParseError::InvalidMagic)
        ));
    }

    #[test]
    fn test_roundtrip() {
        let pkt = DhcpPacket::parse(&make_discover()).unwrap();
        let again = DhcpPacket::parse(&pkt.to_bytes()).unwrap();
        assert_eq!(again.xid, pkt.xid);
        assert_eq!(again.hw_addr(), pkt.hw_addr());
        assert_eq!(again.msg_type(), pkt.msg_type());
    }

    #[test]
    fn test_reply_echoes_request_fields() {
        let request = DhcpPacket::parse(&make_discover()).unwrap();
        let server_ip = Ipv4Addr::new(10, 0, 0, 254);
        let reply = request.reply_to(MessageType::Offer, server_ip);

        assert_eq!(reply.op, BOOT_REPLY);
        assert_eq!(reply.xid, request.xid);
        assert_eq!(reply.chaddr, request.chaddr);
        assert_eq!(reply.siaddr, server_ip);
        assert_eq!(reply.msg_type(), Some(MessageType::Offer));
        assert_eq!(
            reply.get_option(OPT_SERVER_ID).and_then(|o| o.as_ipv4()),
            Some(server_ip)
        );
    }

    #[test]
    fn test_reply_pads_to_minimum_length() {
        let request = DhcpPacket::parse(&make_discover()).unwrap();
        let reply = request.reply_to(MessageType::Ack, Ipv4Addr::new(10, 0, 0, 254));
        assert!(reply.to_bytes().len() >= 300);
    }

    #[test]
    fn test_hw_addr_rejects_non_ethernet() {
        let mut data = make_discover();
        data[2] = 16; // bogus hlen
        let pkt = DhcpPacket::parse(&data).unwrap();
        assert_eq!(pkt.hw_addr(), None);
    }
}
