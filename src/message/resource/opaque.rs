use std::fmt;

use super::super::packer::*;

// An OpaqueResource carries the raw bytes of a record whose type is
// unknown or whose body could not be parsed.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct OpaqueResource {
    pub data: Vec<u8>,
}

impl fmt::Display for OpaqueResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueResource{{Data: {} bytes}}", self.data.len())
    }
}

impl OpaqueResource {
    pub(crate) fn pack(&self, msg: Vec<u8>) -> Vec<u8> {
        pack_bytes(msg, &self.data)
    }

    pub(crate) fn unpack(msg: &[u8], off: usize, length: usize) -> (Self, usize) {
        // Take whatever is actually there, up to the declared length.
        let end = (off + length).min(msg.len());
        (
            OpaqueResource {
                data: msg[off.min(end)..end].to_vec(),
            },
            end,
        )
    }
}
