use crate::error::{FontError, Result};
use crate::stream::FontReader;

/// CFF INDEX: a packed array of byte blobs. Offsets are 1-based relative
/// to the byte preceding the payload; CFF2 widens the count to u32.
#[derive(Debug, Clone, Default)]
pub struct Index {
    items: Vec<Vec<u8>>,
}

impl Index {
    pub fn parse(reader: &mut FontReader, long_count: bool) -> Result<Self> {
        let count = if long_count {
            reader.read_u32()? as usize
        } else {
            reader.read_u16()? as usize
        };
        if count == 0 {
            return Ok(Index::default());
        }

        let off_size = reader.read_u8()?;
        if !(1..=4).contains(&off_size) {
            return Err(FontError::Parse(format!(
                "invalid INDEX offset size {}",
                off_size
            )));
        }

        let mut offsets = Vec::with_capacity(count + 1);
        for _ in 0..=count {
            offsets.push(read_offset(reader, off_size)?);
        }
        if offsets[0] != 1 {
            return Err(FontError::Parse("INDEX offsets must start at 1".into()));
        }

        let payload_base = reader.position() - 1;
        let mut items = Vec::with_capacity(count);
        for window in offsets.windows(2) {
            let (start, end) = (window[0], window[1]);
            if end < start {
                return Err(FontError::Parse("INDEX offsets not increasing".into()));
            }
            reader.set_position(payload_base + start)?;
            items.push(reader.read_bytes(end - start)?);
        }
        reader.set_position(payload_base + offsets[count])?;

        Ok(Index { items })
    }

    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.items.get(index).map(|item| item.as_slice())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_items(items: Vec<Vec<u8>>) -> Self {
        Index { items }
    }

    /// Subroutine index bias, by entry count.
    pub fn bias(&self) -> i32 {
        if self.items.len() < 1240 {
            107
        } else if self.items.len() < 33900 {
            1131
        } else {
            32768
        }
    }
}

fn read_offset(reader: &mut FontReader, off_size: u8) -> Result<usize> {
    let value = match off_size {
        1 => reader.read_u8()? as u32,
        2 => reader.read_u16()? as u32,
        3 => reader.read_u24()?,
        _ => reader.read_u32()?,
    };
    Ok(value as usize)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::stream::FontWriter;

    /// Serialize items as an INDEX with one-byte offsets.
    pub(crate) fn index_bytes(items: &[&[u8]], long_count: bool) -> Vec<u8> {
        let mut w = FontWriter::new();
        if long_count {
            w.write_u32(items.len() as u32);
        } else {
            w.write_u16(items.len() as u16);
        }
        if items.is_empty() {
            return w.into_inner();
        }
        w.write_u8(1);
        let mut offset = 1u8;
        w.write_u8(offset);
        for item in items {
            offset += item.len() as u8;
            w.write_u8(offset);
        }
        for item in items {
            w.write_bytes(item);
        }
        w.into_inner()
    }

    #[test]
    fn items_are_contiguous() {
        let bytes = index_bytes(&[b"ab".as_slice(), b"", b"cde"], false);
        let mut r = FontReader::new(bytes);
        let index = Index::parse(&mut r, false).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.get(0), Some(b"ab".as_slice()));
        assert_eq!(index.get(1), Some(b"".as_slice()));
        assert_eq!(index.get(2), Some(b"cde".as_slice()));
        assert_eq!(index.get(3), None);
        // The reader lands just past the payload.
        assert!(r.is_empty());
    }

    #[test]
    fn empty_index_is_two_bytes() {
        let mut r = FontReader::new(vec![0, 0, 0xAA]);
        let index = Index::parse(&mut r, false).unwrap();
        assert!(index.is_empty());
        assert_eq!(r.position(), 2);
    }

    #[test]
    fn long_count_index() {
        let bytes = index_bytes(&[b"xyz".as_slice()], true);
        let mut r = FontReader::new(bytes);
        let index = Index::parse(&mut r, true).unwrap();
        assert_eq!(index.get(0), Some(b"xyz".as_slice()));
    }

    #[test]
    fn wide_offsets() {
        let mut w = FontWriter::new();
        w.write_u16(1);
        w.write_u8(3); // offSize 3
        w.write_u8(0);
        w.write_u16(1);
        w.write_u8(0);
        w.write_u16(3);
        w.write_bytes(b"hi");
        let mut r = FontReader::new(w.into_inner());
        let index = Index::parse(&mut r, false).unwrap();
        assert_eq!(index.get(0), Some(b"hi".as_slice()));
    }

    #[test]
    fn decreasing_offsets_rejected() {
        let data = vec![0, 1, 1, 1, 0]; // offsets [1, 0]
        let mut r = FontReader::new(data);
        assert!(Index::parse(&mut r, false).is_err());
    }

    #[test]
    fn bias_thresholds() {
        let small = Index {
            items: vec![Vec::new(); 3],
        };
        let medium = Index {
            items: vec![Vec::new(); 1240],
        };
        assert_eq!(small.bias(), 107);
        assert_eq!(medium.bias(), 1131);
    }
}
