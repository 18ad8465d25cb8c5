use std::fmt;

use super::super::packer::*;
use crate::error::Result;

// A TxtResource is a TXT resource record body: an ordered list of
// character strings.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct TxtResource {
    pub txt: Vec<String>,
}

impl fmt::Display for TxtResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxtResource{{Txt: {:?}}}", self.txt)
    }
}

impl TxtResource {
    pub(crate) fn pack(&self, mut msg: Vec<u8>) -> Result<Vec<u8>> {
        for s in &self.txt {
            msg = pack_str(msg, s)?;
        }
        Ok(msg)
    }

    pub(crate) fn unpack(msg: &[u8], mut off: usize, length: usize) -> Result<(Self, usize)> {
        let mut txt = vec![];
        let mut n = 0;
        while n < length {
            let (s, new_off) = unpack_str(msg, off)?;
            n += new_off - off;
            off = new_off;
            txt.push(s);
        }
        Ok((TxtResource { txt }, off))
    }
}
