use std::fmt;
use std::net::Ipv4Addr;

/// DHCP option codes (RFC 2132), limited to what this server reads or writes.
pub const OPT_ROUTER: u8 = 3;
pub const OPT_DNS_SERVER: u8 = 6;
pub const OPT_REQUESTED_IP: u8 = 50;
pub const OPT_MSG_TYPE: u8 = 53;
pub const OPT_SERVER_ID: u8 = 54;
pub const OPT_END: u8 = 255;
pub const OPT_PAD: u8 = 0;

/// DHCP message types (RFC 2131 §3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Discover = 1,
    Offer = 2,
    Request = 3,
    Decline = 4,
    Ack = 5,
    Nak = 6,
    Release = 7,
    Inform = 8,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Discover),
            2 => Some(Self::Offer),
            3 => Some(Self::Request),
            4 => Some(Self::Decline),
            5 => Some(Self::Ack),
            6 => Some(Self::Nak),
            7 => Some(Self::Release),
            8 => Some(Self::Inform),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Discover => "DHCPDISCOVER",
            Self::Offer => "DHCPOFFER",
            Self::Request => "DHCPREQUEST",
            Self::Decline => "DHCPDECLINE",
            Self::Ack => "DHCPACK",
            Self::Nak => "DHCPNAK",
            Self::Release => "DHCPRELEASE",
            Self::Inform => "DHCPINFORM",
        };
        f.write_str(name)
    }
}

/// A single TLV option
#[derive(Debug, Clone)]
pub struct DhcpOption {
    pub code: u8,
    pub data: Vec<u8>,
}

impl DhcpOption {
    pub fn new(code: u8, data: Vec<u8>) -> Self {
        Self { code, data }
    }

    pub fn message_type(kind: MessageType) -> Self {
        Self::new(OPT_MSG_TYPE, vec![kind as u8])
    }

    pub fn server_id(ip: Ipv4Addr) -> Self {
        Self::new(OPT_SERVER_ID, ip.octets().to_vec())
    }

    pub fn router(ip: Ipv4Addr) -> Self {
        Self::new(OPT_ROUTER, ip.octets().to_vec())
    }

    pub fn dns_server(ip: Ipv4Addr) -> Self {
        Self::new(OPT_DNS_SERVER, ip.octets().to_vec())
    }

    pub fn as_ipv4(&self) -> Option<Ipv4Addr> {
        let octets: [u8; 4] = self.data.as_slice().try_into().ok()?;
        Some(Ipv4Addr::from(octets))
    }

    pub fn as_u8(&self) -> Option<u8> {
        self.data.first().copied()
    }
}

/// Walk the option bytes that follow the magic cookie. Truncated or
/// malformed trailing options end the walk rather than failing the packet.
pub fn parse_options(data: &[u8]) -> Vec<DhcpOption> {
    let mut options = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let code = data[i];
        if code == OPT_END {
            break;
        }
        if code == OPT_PAD {
            i += 1;
            continue;
        }

        i += 1;
        if i >= data.len() {
            break;
        }

        let len = data[i] as usize;
        i += 1;

        if i + len > data.len() {
            break;
        }

        options.push(DhcpOption::new(code, data[i..i + len].to_vec()));
        i += len;
    }

    options
}

/// Encode options back to bytes, terminated with OPT_END.
pub fn encode_options(options: &[DhcpOption]) -> Vec<u8> {
    let mut buf = Vec::new();
    for opt in options {
        buf.push(opt.code);
        buf.push(opt.data.len() as u8);
        buf.extend_from_slice(&opt.data);
    }
    buf.push(OPT_END);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_pad_and_stops_at_end() {
        let data = [
            OPT_PAD,
            OPT_MSG_TYPE,
            1,
            1,
            OPT_PAD,
            OPT_SERVER_ID,
            4,
            10,
            0,
            0,
            1,
            OPT_END,
            OPT_ROUTER, // after END, must be ignored
            4,
            1,
            2,
            3,
            4,
        ];
        let options = parse_options(&data);
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].code, OPT_MSG_TYPE);
        assert_eq!(options[0].as_u8(), Some(1));
        assert_eq!(options[1].as_ipv4(), Some(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn test_parse_truncated_option() {
        // length claims 4 bytes but only 2 remain
        let data = [OPT_REQUESTED_IP, 4, 10, 0];
        assert!(parse_options(&data).is_empty());
    }

    #[test]
    fn test_encode_roundtrip() {
        let options = vec![
            DhcpOption::message_type(MessageType::Offer),
            DhcpOption::router(Ipv4Addr::new(192, 168, 1, 1)),
        ];
        let encoded = encode_options(&options);
        assert_eq!(*encoded.last().unwrap(), OPT_END);
        let parsed = parse_options(&encoded);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].as_u8(), Some(MessageType::Offer as u8));
        assert_eq!(parsed[1].as_ipv4(), Some(Ipv4Addr::new(192, 168, 1, 1)));
    }

    #[test]
    fn test_message_type_from_u8() {
        assert_eq!(MessageType::from_u8(1), Some(MessageType::Discover));
        assert_eq!(MessageType::from_u8(7), Some(MessageType::Release));
        assert_eq!(MessageType::from_u8(0), None);
        assert_eq!(MessageType::from_u8(99), None);
    }
}
