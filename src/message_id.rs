//!
//! This module defines `MessageId`, the identity a broker assigns to a stored message.
//!
//! A message is named by the address of the broker that stored it plus the commit-log offset
//! it was written at. Besides the readable `host:port@offset` form, brokers hand out the same
//! identity as an uppercase hex string; see [`MessageId::to_hex`].
//!
use crate::error::ClientError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

// ip(4) + port(4) + offset(8)
const IPV4_ID_LEN: usize = 16;

// ip(16) + port(4) + offset(8)
const IPV6_ID_LEN: usize = 28;

/// Identity of a stored message: broker store address plus offset.
///
/// Each `MessageId` owns its address. Cloning duplicates it and [`MessageId::take`] moves it
/// out, leaving the source without an address.
///
/// # Examples
///
/// ```
/// use rocketmq_client_core::message_id::MessageId;
///
/// let addr = "192.0.2.1:10911".parse().unwrap();
/// let id = MessageId::new(Some(addr), 42);
/// let mut copy = id.clone();
/// copy.set_offset(43);
/// assert_eq!(id.offset(), 42);
/// assert_eq!(copy.address(), id.address());
/// ```
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct MessageId {
    // Address of the broker node that stored the message. `None` until resolved.
    #[serde(default)]
    address: Option<SocketAddr>,

    // Logical position within the broker's commit log
    #[serde(default)]
    offset: i64,
}

impl MessageId {
    pub fn new(address: Option<SocketAddr>, offset: i64) -> Self {
        Self { address, offset }
    }

    /// Build an identity from the `host:port` string a broker reports as its store address.
    ///
    /// # Errors
    /// Raise ClientError::BadAddress if `addr` is not a valid socket address.
    pub fn from_store_addr(addr: &str, offset: i64) -> Result<Self, ClientError> {
        let address = addr
            .parse::<SocketAddr>()
            .map_err(|_e| ClientError::BadAddress(addr.to_string()))?;
        Ok(Self::new(Some(address), offset))
    }

    pub fn address(&self) -> Option<&SocketAddr> {
        self.address.as_ref()
    }

    pub fn set_address(&mut self, address: Option<SocketAddr>) {
        self.address = address;
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn set_offset(&mut self, offset: i64) {
        self.offset = offset;
    }

    /// Move the identity out, leaving `self` without an address.
    ///
    /// The offset is carried over to the returned value; the source keeps its offset as well.
    pub fn take(&mut self) -> Self {
        Self {
            address: self.address.take(),
            offset: self.offset,
        }
    }

    /// Binary form of the identity: `ip | port (i32) | offset (i64)`, big endian.
    ///
    /// # Errors
    /// Raise ClientError::InvalidMessageId if the identity has no address yet.
    pub fn encode(&self) -> Result<Bytes, ClientError> {
        let address = self
            .address
            .ok_or_else(|| ClientError::InvalidMessageId(format!("{} has no address", self)))?;

        let mut buf = match address.ip() {
            IpAddr::V4(ip) => {
                let mut buf = BytesMut::with_capacity(IPV4_ID_LEN);
                buf.put_slice(&ip.octets());
                buf
            }
            IpAddr::V6(ip) => {
                let mut buf = BytesMut::with_capacity(IPV6_ID_LEN);
                buf.put_slice(&ip.octets());
                buf
            }
        };
        buf.put_i32(i32::from(address.port()));
        buf.put_i64(self.offset);
        Ok(buf.freeze())
    }

    /// Parse the binary form produced by [`MessageId::encode`].
    pub fn decode(mut src: &[u8]) -> Result<Self, ClientError> {
        let ip = match src.len() {
            IPV4_ID_LEN => {
                let mut octets = [0u8; 4];
                src.copy_to_slice(&mut octets);
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            IPV6_ID_LEN => {
                let mut octets = [0u8; 16];
                src.copy_to_slice(&mut octets);
                IpAddr::V6(Ipv6Addr::from(octets))
            }
            len => {
                return Err(ClientError::InvalidMessageId(format!(
                    "unexpected length {}",
                    len
                )))
            }
        };

        let port = src.get_i32();
        let port = u16::try_from(port)
            .map_err(|_e| ClientError::InvalidMessageId(format!("port {} out of range", port)))?;
        let offset = src.get_i64();
        Ok(Self::new(Some(SocketAddr::new(ip, port)), offset))
    }

    /// Uppercase hex rendition of [`MessageId::encode`], as brokers report message ids.
    pub fn to_hex(&self) -> Result<String, ClientError> {
        let bytes = self.encode()?;
        Ok(bytes.iter().map(|b| format!("{:02X}", b)).collect())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.address {
            Some(address) => write!(f, "{}@{}", address, self.offset),
            None => write!(f, "<unset>@{}", self.offset),
        }
    }
}

impl FromStr for MessageId {
    type Err = ClientError;

    /// Parse the hex form returned by [`MessageId::to_hex`]. Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() % 2 != 0 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ClientError::InvalidMessageId(s.to_owned()));
        }

        let bytes = (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .map_err(|_e| ClientError::InvalidMessageId(s.to_owned()))?;

        MessageId::decode(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_default() {
        let id = MessageId::default();
        assert_eq!(id.address(), None);
        assert_eq!(id.offset(), 0);
    }

    #[test]
    fn test_copy_then_mutate_offset() {
        let id = MessageId::new(Some(addr("192.0.2.1:10911")), 42);
        let mut copy = id.clone();
        assert_eq!(copy, id);

        copy.set_offset(43);
        assert_eq!(id.address(), Some(&addr("192.0.2.1:10911")));
        assert_eq!(id.offset(), 42);
        assert_eq!(copy.address(), Some(&addr("192.0.2.1:10911")));
        assert_eq!(copy.offset(), 43);
        assert_ne!(copy, id);
    }

    #[test]
    fn test_copy_owns_address() {
        let id = MessageId::new(Some(addr("192.0.2.1:10911")), 7);
        let mut copy = id.clone();
        copy.set_address(Some(addr("198.51.100.9:10911")));
        assert_eq!(id.address(), Some(&addr("192.0.2.1:10911")));
        assert_eq!(copy.address(), Some(&addr("198.51.100.9:10911")));
    }

    #[test]
    fn test_take_resets_source() {
        let mut id = MessageId::new(Some(addr("192.0.2.1:10911")), 42);
        let original = id.clone();
        let moved = id.take();
        assert_eq!(moved, original);
        assert_eq!(id.address(), None);
        assert_eq!(id.offset(), 42);
    }

    #[test]
    fn test_clone_from_replaces_address() {
        let source = MessageId::new(Some(addr("[2001:db8::1]:10911")), 100);
        let mut target = MessageId::new(Some(addr("192.0.2.1:10911")), 1);
        target.clone_from(&source);
        assert_eq!(target, source);
    }

    #[test]
    fn test_set_own_address() {
        let mut id = MessageId::new(Some(addr("192.0.2.1:10911")), 42);
        let current = id.address().copied();
        id.set_address(current);
        assert_eq!(id.address(), Some(&addr("192.0.2.1:10911")));
        assert_eq!(id.offset(), 42);
    }

    #[test]
    fn test_from_store_addr() -> Result<(), ClientError> {
        let id = MessageId::from_store_addr("192.0.2.1:10911", 42)?;
        assert_eq!(id, MessageId::new(Some(addr("192.0.2.1:10911")), 42));

        let result = MessageId::from_store_addr("4.4.4.4.3:80", 42);
        assert!(matches!(result, Err(ClientError::BadAddress(_))));
        Ok(())
    }

    #[test]
    fn test_display() {
        let id = MessageId::new(Some(addr("192.0.2.1:10911")), 42);
        assert_eq!(id.to_string(), "192.0.2.1:10911@42");

        let id = MessageId::new(Some(addr("[2001:db8::1]:10911")), 5);
        assert_eq!(id.to_string(), "[2001:db8::1]:10911@5");

        assert_eq!(MessageId::new(None, 3).to_string(), "<unset>@3");
    }

    #[test]
    fn test_to_hex_ipv4() -> Result<(), Box<dyn std::error::Error>> {
        let id = MessageId::new(Some(addr("192.0.2.1:10911")), 42);
        let hex = id.to_hex()?;
        assert_eq!(hex, "C000020100002A9F000000000000002A");

        let parsed: MessageId = hex.parse()?;
        assert_eq!(parsed, id);
        Ok(())
    }

    #[test]
    fn test_to_hex_ipv6() -> Result<(), Box<dyn std::error::Error>> {
        let id = MessageId::new(Some(addr("[2001:db8::1]:10911")), i64::MAX);
        let hex = id.to_hex()?;
        assert_eq!(hex.len(), IPV6_ID_LEN * 2);

        let parsed: MessageId = hex.to_lowercase().parse()?;
        assert_eq!(parsed, id);
        Ok(())
    }

    #[test]
    fn test_encode_without_address() {
        let id = MessageId::new(None, 42);
        assert!(matches!(id.encode(), Err(ClientError::InvalidMessageId(_))));
        assert!(id.to_hex().is_err());
    }

    #[test]
    fn test_parse_invalid() {
        for s in [
            "",
            "C0000201",
            "C000020100002A9F000000000000002",
            "ZZ00020100002A9F000000000000002A",
            "+F00020100002A9F000000000000002A",
            // port 0x0001_0000 does not fit in u16
            "C000020100010000000000000000002A",
        ] {
            assert!(
                matches!(s.parse::<MessageId>(), Err(ClientError::InvalidMessageId(_))),
                "{} should be rejected",
                s
            );
        }
    }

    #[test]
    fn test_serialization() -> Result<(), Box<dyn std::error::Error>> {
        let id = MessageId::new(Some(addr("192.0.2.1:10911")), 42);
        let json = serde_json::to_string(&id)?;
        assert_eq!(json, r#"{"address":"192.0.2.1:10911","offset":42}"#);

        let id2: MessageId = serde_json::from_str(&json)?;
        assert_eq!(id, id2);

        let unset: MessageId = serde_json::from_str("{}")?;
        assert_eq!(unset, MessageId::default());
        Ok(())
    }
}
