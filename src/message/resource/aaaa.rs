use std::fmt;
use std::net::Ipv6Addr;

use super::super::packer::*;
use crate::error::{Error, Result};

// An AaaaResource is an AAAA resource record body.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct AaaaResource {
    pub aaaa: [u8; 16],
}

impl fmt::Display for AaaaResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AaaaResource{{AAAA: {}}}", self.ip())
    }
}

impl AaaaResource {
    pub fn ip(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.aaaa)
    }

    pub(crate) fn pack(&self, msg: Vec<u8>) -> Vec<u8> {
        pack_bytes(msg, &self.aaaa)
    }

    pub(crate) fn unpack(msg: &[u8], off: usize, _length: usize) -> Result<(Self, usize)> {
        if off + 16 > msg.len() {
            return Err(Error::ErrResourceLen);
        }
        let mut aaaa = [0u8; 16];
        aaaa.copy_from_slice(&msg[off..off + 16]);
        Ok((AaaaResource { aaaa }, off + 16))
    }
}
