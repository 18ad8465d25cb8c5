use std::collections::HashMap;
use std::fmt;

use super::super::name::Name;
use crate::error::Result;

// A PtrResource is a PTR resource record body.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PtrResource {
    pub ptr: Name,
}

impl fmt::Display for PtrResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PtrResource{{PTR: {}}}", self.ptr)
    }
}

impl PtrResource {
    pub(crate) fn pack(
        &self,
        msg: Vec<u8>,
        compression: &mut Option<HashMap<String, usize>>,
        compression_off: usize,
    ) -> Result<Vec<u8>> {
        self.ptr.pack(msg, compression, compression_off)
    }

    pub(crate) fn unpack(msg: &[u8], off: usize, _length: usize) -> Result<(Self, usize)> {
        let mut ptr = Name::default();
        let off = ptr.unpack(msg, off)?;
        Ok((PtrResource { ptr }, off))
    }
}
