//! DNS wire codec, RFC 1035 as constrained by RFC 6762.
//!
//! A [`Message`] is a header plus question, answer, authority and
//! additional sections. Record bodies are the tagged [`RData`] variants;
//! anything unknown or unparsable degrades to [`RData::Opaque`] under its
//! parsed header rather than failing the whole packet.

#[cfg(test)]
mod message_test;

pub(crate) mod header;
pub(crate) mod name;
mod packer;
pub(crate) mod question;
pub(crate) mod resource;

use std::collections::HashMap;
use std::fmt;

use packer::*;

pub use header::Header;
pub use name::Name;
pub use question::Question;
pub use resource::{
    AResource, AaaaResource, OpaqueResource, PtrResource, RData, Resource, ResourceHeader,
    SrvResource, TxtResource,
};

use crate::error::{Error, Result};

// A DnsType is a type of DNS request and response.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DnsType {
    A = 1,
    Ptr = 12,
    Txt = 16,
    Aaaa = 28,
    Srv = 33,

    /// Question-only wildcard matching every type.
    Any = 255,

    #[default]
    Unsupported = 0,
}

impl From<u16> for DnsType {
    fn from(v: u16) -> Self {
        match v {
            1 => DnsType::A,
            12 => DnsType::Ptr,
            16 => DnsType::Txt,
            28 => DnsType::Aaaa,
            33 => DnsType::Srv,
            255 => DnsType::Any,
            _ => DnsType::Unsupported,
        }
    }
}

impl fmt::Display for DnsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            DnsType::A => "A",
            DnsType::Ptr => "PTR",
            DnsType::Txt => "TXT",
            DnsType::Aaaa => "AAAA",
            DnsType::Srv => "SRV",
            DnsType::Any => "ANY",
            DnsType::Unsupported => "Unsupported",
        };
        write!(f, "{s}")
    }
}

impl DnsType {
    pub(crate) fn pack(&self, msg: Vec<u8>) -> Vec<u8> {
        pack_uint16(msg, *self as u16)
    }

    pub(crate) fn unpack(&mut self, msg: &[u8], off: usize) -> Result<usize> {
        let (t, o) = unpack_uint16(msg, off)?;
        *self = DnsType::from(t);
        Ok(o)
    }

    /// Whether a record of type `other` satisfies a question for `self`.
    pub fn matches(&self, other: DnsType) -> bool {
        *self == DnsType::Any || *self == other
    }
}

/// The Internet class (IN), used by virtually all mDNS traffic.
pub const CLASS_INET: DnsClass = DnsClass(1);

/// Top bit of the class field: cache-flush on records, unicast-response on
/// questions (RFC 6762 §10.2 / §5.4).
pub const CLASS_CACHE_FLUSH: u16 = 0x8000;

// A DnsClass is a type of network.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub struct DnsClass(pub u16);

impl fmt::Display for DnsClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.base() {
            1 => write!(f, "ClassINET"),
            255 => write!(f, "ClassANY"),
            other => write!(f, "{other}"),
        }?;
        if self.cache_flush() {
            write!(f, "|FLUSH")?;
        }
        Ok(())
    }
}

impl DnsClass {
    /// The class with the mDNS top bit masked off.
    pub fn base(&self) -> u16 {
        self.0 & !CLASS_CACHE_FLUSH
    }

    /// Whether the top bit is set.
    pub fn cache_flush(&self) -> bool {
        self.0 & CLASS_CACHE_FLUSH != 0
    }

    pub(crate) fn pack(&self, msg: Vec<u8>) -> Vec<u8> {
        pack_uint16(msg, self.0)
    }

    pub(crate) fn unpack(&mut self, msg: &[u8], off: usize) -> Result<usize> {
        let (c, o) = unpack_uint16(msg, off)?;
        *self = DnsClass(c);
        Ok(o)
    }
}

// Internal constants.

// PACK_STARTING_CAP is the default initial buffer size allocated during
// packing. Most mDNS messages fit well within it.
const PACK_STARTING_CAP: usize = 512;

// UINT16LEN is the length (in bytes) of a uint16.
const UINT16LEN: usize = 2;

// UINT32LEN is the length (in bytes) of a uint32.
const UINT32LEN: usize = 4;

pub(crate) const HEADER_BIT_QR: u16 = 1 << 15; // query/response (response=1)
pub(crate) const HEADER_BIT_AA: u16 = 1 << 10; // authoritative
pub(crate) const HEADER_BIT_TC: u16 = 1 << 9; // truncated
pub(crate) const HEADER_BIT_RD: u16 = 1 << 8; // recursion desired
pub(crate) const HEADER_BIT_RA: u16 = 1 << 7; // recursion available
pub(crate) const RCODE_MASK: u16 = 0xf;

// Message is a representation of a DNS message.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<Resource>,
    pub authorities: Vec<Resource>,
    pub additionals: Vec<Resource>,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |rs: &[Resource]| -> String {
            rs.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", ")
        };
        write!(
            f,
            "Message{{Header: {}, Questions: [{}], Answers: [{}], Authorities: [{}], Additionals: [{}]}}",
            self.header,
            self.questions
                .iter()
                .map(|q| q.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            list(&self.answers),
            list(&self.authorities),
            list(&self.additionals),
        )
    }
}

impl Message {
    // unpack parses a full Message.
    //
    // Only an unreadable 12-byte header is an error. A corrupt record
    // degrades to an opaque body; a truncated section keeps what parsed so
    // far.
    pub fn unpack(&mut self, msg: &[u8]) -> Result<()> {
        let mut h = header::HeaderInternal::default();
        let mut off = h.unpack(msg, 0)?;
        self.header = h.header();

        for _ in 0..h.questions {
            let Ok((q, new_off)) = Question::unpack(msg, off) else {
                return Ok(());
            };
            off = new_off;
            self.questions.push(q);
        }
        for (count, section) in [
            (h.answers, &mut self.answers),
            (h.authorities, &mut self.authorities),
            (h.additionals, &mut self.additionals),
        ] {
            for _ in 0..count {
                let Ok((r, new_off)) = Resource::unpack(msg, off) else {
                    return Ok(());
                };
                off = new_off;
                section.push(r);
            }
        }
        Ok(())
    }

    // pack packs a full Message.
    pub fn pack(&self) -> Result<Vec<u8>> {
        self.append_pack(Vec::with_capacity(PACK_STARTING_CAP))
    }

    // append_pack is like pack but appends the full Message to b and
    // returns the extended buffer.
    pub(crate) fn append_pack(&self, b: Vec<u8>) -> Result<Vec<u8>> {
        if self.questions.len() > u16::MAX as usize {
            return Err(Error::ErrTooManyQuestions);
        }
        if self.answers.len() > u16::MAX as usize {
            return Err(Error::ErrTooManyAnswers);
        }
        if self.authorities.len() > u16::MAX as usize {
            return Err(Error::ErrTooManyAuthorities);
        }
        if self.additionals.len() > u16::MAX as usize {
            return Err(Error::ErrTooManyAdditionals);
        }

        let (id, bits) = self.header.pack();
        let h = header::HeaderInternal {
            id,
            bits,
            questions: self.questions.len() as u16,
            answers: self.answers.len() as u16,
            authorities: self.authorities.len() as u16,
            additionals: self.additionals.len() as u16,
        };

        let compression_off = b.len();
        let mut msg = h.pack(b);

        // RFC 1035 allows compression for packing and requires unpacking
        // implementations to support it, so it is unconditionally on.
        let mut compression = Some(HashMap::new());

        for question in &self.questions {
            msg = question.pack(msg, &mut compression, compression_off)?;
        }
        for answer in &self.answers {
            msg = answer.pack(msg, &mut compression, compression_off)?;
        }
        for authority in &self.authorities {
            msg = authority.pack(msg, &mut compression, compression_off)?;
        }
        for additional in &self.additionals {
            msg = additional.pack(msg, &mut compression, compression_off)?;
        }

        Ok(msg)
    }

    /// Answer records under `name` whose parsed type matches `typ`.
    /// Opaque degradations never match a concrete type.
    pub fn answers_matching(&self, name: &str, typ: DnsType) -> Vec<&Resource> {
        let want = name.to_lowercase();
        self.answers
            .iter()
            .filter(|rr| {
                rr.body.real_type().is_some_and(|t| typ.matches(t))
                    && rr.header.name.data.to_lowercase() == want
            })
            .collect()
    }
}
