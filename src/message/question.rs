use std::collections::HashMap;
use std::fmt;

use super::name::Name;
use super::{DnsClass, DnsType};
use crate::error::Result;

// A Question is a DNS query.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct Question {
    pub name: Name,
    pub typ: DnsType,
    pub class: DnsClass,
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Question{{Name: {}, Type: {}, Class: {}}}",
            self.name, self.typ, self.class
        )
    }
}

impl Question {
    // pack appends the wire format of the Question to msg.
    pub(crate) fn pack(
        &self,
        mut msg: Vec<u8>,
        compression: &mut Option<HashMap<String, usize>>,
        compression_off: usize,
    ) -> Result<Vec<u8>> {
        msg = self.name.pack(msg, compression, compression_off)?;
        msg = self.typ.pack(msg);
        Ok(self.class.pack(msg))
    }

    pub(crate) fn unpack(msg: &[u8], off: usize) -> Result<(Self, usize)> {
        let mut name = Name::default();
        let off = name.unpack(msg, off)?;
        let mut typ = DnsType::default();
        let off = typ.unpack(msg, off)?;
        let mut class = DnsClass::default();
        let off = class.unpack(msg, off)?;
        Ok((Question { name, typ, class }, off))
    }
}
