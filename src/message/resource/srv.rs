use std::collections::HashMap;
use std::fmt;

use super::super::name::Name;
use super::super::packer::*;
use crate::error::Result;

// An SrvResource is an SRV resource record body.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct SrvResource {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: Name,
}

impl fmt::Display for SrvResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SrvResource{{Priority: {}, Weight: {}, Port: {}, Target: {}}}",
            self.priority, self.weight, self.port, self.target
        )
    }
}

impl SrvResource {
    pub(crate) fn pack(
        &self,
        mut msg: Vec<u8>,
        _compression: &mut Option<HashMap<String, usize>>,
        compression_off: usize,
    ) -> Result<Vec<u8>> {
        msg = pack_uint16(msg, self.priority);
        msg = pack_uint16(msg, self.weight);
        msg = pack_uint16(msg, self.port);
        // The SRV target is packed without compression, per RFC 2782.
        self.target.pack(msg, &mut None, compression_off)
    }

    pub(crate) fn unpack(msg: &[u8], off: usize, _length: usize) -> Result<(Self, usize)> {
        let (priority, off) = unpack_uint16(msg, off)?;
        let (weight, off) = unpack_uint16(msg, off)?;
        let (port, off) = unpack_uint16(msg, off)?;
        let mut target = Name::default();
        let off = target.unpack(msg, off)?;
        Ok((
            SrvResource {
                priority,
                weight,
                port,
                target,
            },
            off,
        ))
    }
}
