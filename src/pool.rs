//! IPv4 address pool keyed by client hardware address.

use std::fmt;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use thiserror::Error;
use tracing::debug;

/// Ethernet hardware address, the stable client identity for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 6]
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("no free address left in the pool")]
    Exhausted,
    #[error("address {0} is not part of the pool")]
    AddressNotFound(Ipv4Addr),
}

/// One allocatable address. The owner doubles as the allocated flag:
/// an entry is leased iff `owner` is set.
#[derive(Debug, Clone, Copy)]
struct PoolEntry {
    address: Ipv4Addr,
    owner: Option<MacAddr>,
}

/// The fixed universe of allocatable addresses for one CIDR range.
///
/// Built once at startup and mutated in place by allocate/release for the
/// process lifetime. Holds no lock itself; callers serialize access (see
/// [`crate::SharedHandler`]).
pub struct AllocationPool {
    entries: Vec<PoolEntry>,
}

impl AllocationPool {
    /// Enumerate every address after the configured base address of `net`
    /// and before its broadcast address, in ascending order. The base is the
    /// address as written in the CIDR, so `192.168.1.64/25` pools `.65`
    /// through `.126` rather than the whole `/25`. A /31 or /32 yields an
    /// empty pool.
    pub fn from_cidr(net: Ipv4Net) -> Self {
        let broadcast = net.broadcast();
        let mut entries = Vec::new();
        let mut cursor = successor(net.addr());
        while let Some(address) = cursor {
            if address >= broadcast {
                break;
            }
            entries.push(PoolEntry {
                address,
                owner: None,
            });
            cursor = successor(address);
        }
        debug!("pool for {} holds {} addresses", net, entries.len());
        Self { entries }
    }

    /// Assign an address to `owner`.
    ///
    /// A client that already holds a lease gets the same address back
    /// without consuming another slot, so a re-sent DISCOVER cannot leak
    /// addresses. Otherwise the first free entry in pool order is taken.
    pub fn allocate(&mut self, owner: MacAddr) -> Result<Ipv4Addr, PoolError> {
        if let Some(entry) = self.entries.iter().find(|e| e.owner == Some(owner)) {
            return Ok(entry.address);
        }

        match self.entries.iter_mut().find(|e| e.owner.is_none()) {
            Some(entry) => {
                entry.owner = Some(owner);
                Ok(entry.address)
            }
            None => Err(PoolError::Exhausted),
        }
    }

    /// Return `address` to the free set, immediately eligible for reuse.
    /// Releasing an entry that is already free is a no-op; an address
    /// outside the pool's range is reported.
    pub fn release(&mut self, address: Ipv4Addr) -> Result<(), PoolError> {
        match self.entries.iter_mut().find(|e| e.address == address) {
            Some(entry) => {
                entry.owner = None;
                Ok(())
            }
            None => Err(PoolError::AddressNotFound(address)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn free_count(&self) -> usize {
        self.entries.iter().filter(|e| e.owner.is_none()).count()
    }

    /// All pool addresses in allocation order, leased or not.
    pub fn addresses(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.entries.iter().map(|e| e.address)
    }
}

/// Next IPv4 address, carrying overflow across all four octets.
/// Returns `None` past 255.255.255.255.
fn successor(ip: Ipv4Addr) -> Option<Ipv4Addr> {
    let mut octets = ip.octets();
    for byte in octets.iter_mut().rev() {
        let (value, carry) = byte.overflowing_add(1);
        *byte = value;
        if !carry {
            return Some(Ipv4Addr::from(octets));
        }
    }
    None
}
