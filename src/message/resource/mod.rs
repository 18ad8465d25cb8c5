pub mod a;
pub mod aaaa;
pub mod opaque;
pub mod ptr;
pub mod srv;
pub mod txt;

use std::collections::HashMap;
use std::fmt;

pub use a::AResource;
pub use aaaa::AaaaResource;
pub use opaque::OpaqueResource;
pub use ptr::PtrResource;
pub use srv::SrvResource;
pub use txt::TxtResource;

use super::name::Name;
use super::packer::*;
use super::{DnsClass, DnsType};
use crate::error::{Error, Result};

// A Resource is a DNS resource record.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub header: ResourceHeader,
    pub body: RData,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resource{{Header: {}, Body: {}}}", self.header, self.body)
    }
}

impl Resource {
    /// Whether the record's class carries the mDNS cache-flush bit.
    pub fn cache_flush(&self) -> bool {
        self.header.class.cache_flush()
    }

    // pack appends the wire format of the Resource to msg.
    pub(crate) fn pack(
        &self,
        msg: Vec<u8>,
        compression: &mut Option<HashMap<String, usize>>,
        compression_off: usize,
    ) -> Result<Vec<u8>> {
        let mut header = self.header.clone();
        if let Some(typ) = self.body.real_type() {
            header.typ = typ;
        }
        let (mut msg, len_off) = header.pack(msg, compression, compression_off)?;
        let pre_len = msg.len();
        msg = match &self.body {
            RData::A(b) => b.pack(msg),
            RData::Aaaa(b) => b.pack(msg),
            RData::Ptr(b) => b.pack(msg, compression, compression_off)?,
            RData::Srv(b) => b.pack(msg, compression, compression_off)?,
            RData::Txt(b) => b.pack(msg)?,
            RData::Opaque(b) => b.pack(msg),
        };
        header.fix_len(&mut msg, len_off, pre_len)?;
        Ok(msg)
    }

    // unpack parses one resource record starting at off.
    //
    // Parsing is tolerant: an RDLENGTH that overruns the buffer, an unknown
    // type, or a body that fails to parse degrades the record to an opaque
    // body under the parsed header, and the caller keeps going.
    pub(crate) fn unpack(msg: &[u8], off: usize) -> Result<(Self, usize)> {
        let mut header = ResourceHeader::default();
        let off = header.unpack(msg, off)?;
        let length = header.length as usize;

        if off + length > msg.len() {
            // Bogus RDLENGTH, perhaps truncated or malicious. Keep the bare
            // header with whatever bytes remain.
            let (body, end) = OpaqueResource::unpack(msg, off, length);
            return Ok((
                Resource {
                    header,
                    body: RData::Opaque(body),
                },
                end,
            ));
        }

        let end = off + length;
        let parsed = match header.typ {
            DnsType::A => AResource::unpack(msg, off, length).map(|(b, o)| (RData::A(b), o)),
            DnsType::Aaaa => {
                AaaaResource::unpack(msg, off, length).map(|(b, o)| (RData::Aaaa(b), o))
            }
            DnsType::Ptr => PtrResource::unpack(msg, off, length).map(|(b, o)| (RData::Ptr(b), o)),
            DnsType::Srv => SrvResource::unpack(msg, off, length).map(|(b, o)| (RData::Srv(b), o)),
            DnsType::Txt => TxtResource::unpack(msg, off, length).map(|(b, o)| (RData::Txt(b), o)),
            _ => {
                let (b, o) = OpaqueResource::unpack(msg, off, length);
                Ok((RData::Opaque(b), o))
            }
        };

        let body = match parsed {
            // A body that stops short of RDLENGTH is as suspect as one that
            // fails outright.
            Ok((body, new_off)) if new_off == end => body,
            _ => RData::Opaque(OpaqueResource::unpack(msg, off, length).0),
        };

        Ok((Resource { header, body }, end))
    }
}

// Header shared by every resource record variant.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct ResourceHeader {
    /// Owner name the record pertains to.
    pub name: Name,

    /// Record type. Set from the body while packing.
    pub typ: DnsType,

    /// Record class; the top bit is the mDNS cache-flush bit on records and
    /// the unicast-response bit on questions.
    pub class: DnsClass,

    /// Remaining lifetime in seconds. Zero withdraws the record.
    pub ttl: u32,

    /// RDATA length. Set while packing.
    pub length: u16,
}

impl fmt::Display for ResourceHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ResourceHeader{{Name: {}, Type: {}, Class: {}, TTL: {}, Length: {}}}",
            self.name, self.typ, self.class, self.ttl, self.length,
        )
    }
}

impl ResourceHeader {
    // pack appends the wire format of the header to msg and returns the
    // offset of the Length field for fix_len.
    pub(crate) fn pack(
        &self,
        mut msg: Vec<u8>,
        compression: &mut Option<HashMap<String, usize>>,
        compression_off: usize,
    ) -> Result<(Vec<u8>, usize)> {
        msg = self.name.pack(msg, compression, compression_off)?;
        msg = self.typ.pack(msg);
        msg = self.class.pack(msg);
        msg = pack_uint32(msg, self.ttl);
        let len_off = msg.len();
        msg = pack_uint16(msg, self.length);
        Ok((msg, len_off))
    }

    pub(crate) fn unpack(&mut self, msg: &[u8], off: usize) -> Result<usize> {
        let mut new_off = off;
        new_off = self.name.unpack(msg, new_off)?;
        new_off = self.typ.unpack(msg, new_off)?;
        new_off = self.class.unpack(msg, new_off)?;
        let (ttl, new_off) = unpack_uint32(msg, new_off)?;
        self.ttl = ttl;
        let (l, new_off) = unpack_uint16(msg, new_off)?;
        self.length = l;
        Ok(new_off)
    }

    // fix_len patches the packed Length field once the body size is known.
    pub(crate) fn fix_len(&mut self, msg: &mut [u8], len_off: usize, pre_len: usize) -> Result<()> {
        if msg.len() < pre_len || msg.len() > pre_len + u16::MAX as usize {
            return Err(Error::ErrResTooLong);
        }

        let con_len = msg.len() - pre_len;
        msg[len_off] = ((con_len >> 8) & 0xff) as u8;
        msg[len_off + 1] = (con_len & 0xff) as u8;
        self.length = con_len as u16;

        Ok(())
    }
}

// RData is the type-discriminated payload of a resource record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    A(AResource),
    Aaaa(AaaaResource),
    Ptr(PtrResource),
    Srv(SrvResource),
    Txt(TxtResource),
    Opaque(OpaqueResource),
}

impl Default for RData {
    fn default() -> Self {
        RData::Opaque(OpaqueResource::default())
    }
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RData::A(b) => b.fmt(f),
            RData::Aaaa(b) => b.fmt(f),
            RData::Ptr(b) => b.fmt(f),
            RData::Srv(b) => b.fmt(f),
            RData::Txt(b) => b.fmt(f),
            RData::Opaque(b) => b.fmt(f),
        }
    }
}

impl RData {
    // real_type returns the wire type of the body, used to fill in the
    // header Type field. Opaque bodies keep the header's parsed type.
    pub(crate) fn real_type(&self) -> Option<DnsType> {
        match self {
            RData::A(_) => Some(DnsType::A),
            RData::Aaaa(_) => Some(DnsType::Aaaa),
            RData::Ptr(_) => Some(DnsType::Ptr),
            RData::Srv(_) => Some(DnsType::Srv),
            RData::Txt(_) => Some(DnsType::Txt),
            RData::Opaque(_) => None,
        }
    }
}
