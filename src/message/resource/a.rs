use std::fmt;
use std::net::Ipv4Addr;

use super::super::packer::*;
use crate::error::{Error, Result};

// An AResource is an A resource record body.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct AResource {
    pub a: [u8; 4],
}

impl fmt::Display for AResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AResource{{A: {}}}", self.ip())
    }
}

impl AResource {
    pub fn ip(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.a)
    }

    pub(crate) fn pack(&self, msg: Vec<u8>) -> Vec<u8> {
        pack_bytes(msg, &self.a)
    }

    pub(crate) fn unpack(msg: &[u8], off: usize, _length: usize) -> Result<(Self, usize)> {
        if off + 4 > msg.len() {
            return Err(Error::ErrResourceLen);
        }
        let mut a = [0u8; 4];
        a.copy_from_slice(&msg[off..off + 4]);
        Ok((AResource { a }, off + 4))
    }
}
