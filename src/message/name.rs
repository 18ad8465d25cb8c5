use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

// Largest encoded name, per RFC 1035.
const NAME_LEN: usize = 255;

// A Name is a non-encoded, dot-terminated domain name.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Name {
    pub data: String,
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data)
    }
}

impl Name {
    /// Builds a name, appending the terminating dot when absent.
    pub fn new(data: &str) -> Result<Self> {
        if data.len() > NAME_LEN {
            return Err(Error::ErrNameTooLong);
        }
        let data = if data.ends_with('.') {
            data.to_owned()
        } else {
            format!("{data}.")
        };
        Ok(Name { data })
    }

    // pack appends the wire format of the name to msg.
    //
    // When compression is Some, domain suffixes seen before are replaced
    // with compression pointers; newly packed suffixes are recorded with
    // their offsets relative to compression_off.
    pub(crate) fn pack(
        &self,
        mut msg: Vec<u8>,
        compression: &mut Option<HashMap<String, usize>>,
        compression_off: usize,
    ) -> Result<Vec<u8>> {
        let data = self.data.as_bytes();

        if data.is_empty() || data[data.len() - 1] != b'.' {
            return Err(Error::ErrNameTooLong);
        }
        if self.data == "." {
            msg.push(0);
            return Ok(msg);
        }

        // Emit sequence of counted strings, chopping at dots.
        let mut begin = 0;
        for i in 0..data.len() {
            if data[i] != b'.' {
                continue;
            }
            if i - begin >= 64 {
                // A segment may be up to 63 octets.
                return Err(Error::ErrSegTooLong);
            }
            if i == begin {
                return Err(Error::ErrZeroSegLen);
            }

            if let Some(compression) = compression {
                let suffix = &self.data[begin..];
                if let Some(&ptr) = compression.get(suffix) {
                    // Pointers are two bytes with the top two bits set.
                    msg = super::packer::pack_uint16(msg, ptr as u16 | 0xc000);
                    return Ok(msg);
                }
                // Miss. Add the suffix to the compression table if its
                // offset can be stored in a pointer.
                let off = msg.len() - compression_off;
                if off <= 0x3fff {
                    compression.insert(suffix.to_owned(), off);
                }
            }

            msg.push((i - begin) as u8);
            msg.extend_from_slice(&data[begin..i]);
            begin = i + 1;
        }

        msg.push(0);
        Ok(msg)
    }

    // unpack parses a wire-format name starting at off, following
    // compression pointers.
    pub(crate) fn unpack(&mut self, msg: &[u8], off: usize) -> Result<usize> {
        // curr_off is the current working offset, new_off the offset where
        // parsing should resume: the first byte after the first pointer.
        let mut curr_off = off;
        let mut new_off = off;
        let mut ptr = 0;
        let mut name = String::with_capacity(NAME_LEN);

        loop {
            if curr_off >= msg.len() {
                return Err(Error::ErrBaseLen);
            }
            let c = msg[curr_off];
            match c & 0xc0 {
                0x00 => {
                    // String segment.
                    if c == 0x00 {
                        // A zero length signals the end of the name.
                        break;
                    }
                    let end = curr_off + 1 + c as usize;
                    if end > msg.len() {
                        return Err(Error::ErrCalcLen);
                    }
                    name.push_str(&String::from_utf8_lossy(&msg[curr_off + 1..end]));
                    name.push('.');
                    curr_off = end;
                }
                0xc0 => {
                    // Pointer.
                    if curr_off + 1 >= msg.len() {
                        return Err(Error::ErrInvalidPtr);
                    }
                    let c1 = msg[curr_off + 1];
                    if ptr == 0 {
                        new_off = curr_off + 2;
                    }
                    ptr += 1;
                    if ptr > 10 {
                        return Err(Error::ErrTooManyPtr);
                    }
                    curr_off = ((c ^ 0xc0) as usize) << 8 | c1 as usize;
                }
                _ => {
                    // The top two bits, 0x80 and 0x40, are reserved.
                    return Err(Error::ErrReserved);
                }
            }
        }

        if name.is_empty() {
            name.push('.');
        }
        if name.len() > NAME_LEN {
            return Err(Error::ErrCalcLen);
        }
        self.data = name;
        if ptr == 0 {
            new_off = curr_off + 1;
        }
        Ok(new_off)
    }
}
