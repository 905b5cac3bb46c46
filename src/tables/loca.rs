use crate::error::{FontError, Result};
use crate::stream::FontReader;

/// LOCA table - Index to location. Short offsets are stored halved.
#[derive(Debug, Clone)]
pub enum LocaTable {
    Short(Vec<u16>),
    Long(Vec<u32>),
}

impl LocaTable {
    pub fn from_reader(reader: &mut FontReader, num_glyphs: u16, is_long: bool) -> Result<Self> {
        let count = num_glyphs as usize + 1;
        if is_long {
            let mut offsets = Vec::with_capacity(count);
            for _ in 0..count {
                offsets.push(reader.read_u32()?);
            }
            Ok(LocaTable::Long(offsets))
        } else {
            let mut offsets = Vec::with_capacity(count);
            for _ in 0..count {
                offsets.push(reader.read_u16()?);
            }
            Ok(LocaTable::Short(offsets))
        }
    }

    pub fn offset(&self, index: usize) -> Result<u32> {
        match self {
            LocaTable::Short(offsets) => offsets
                .get(index)
                .map(|&o| o as u32 * 2)
                .ok_or(FontError::Parse(format!("loca index {} out of range", index))),
            LocaTable::Long(offsets) => offsets
                .get(index)
                .copied()
                .ok_or(FontError::Parse(format!("loca index {} out of range", index))),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            LocaTable::Short(offsets) => offsets.len(),
            LocaTable::Long(offsets) => offsets.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_offsets_are_doubled() {
        let mut r = FontReader::new(vec![0x00, 0x00, 0x00, 0x10, 0x00, 0x10]);
        let loca = LocaTable::from_reader(&mut r, 2, false).unwrap();
        assert_eq!(loca.offset(0).unwrap(), 0);
        assert_eq!(loca.offset(1).unwrap(), 32);
        assert_eq!(loca.offset(2).unwrap(), 32); // empty glyph 1
        assert!(loca.offset(3).is_err());
    }

    #[test]
    fn long_offsets_pass_through() {
        let mut r = FontReader::new(vec![0, 0, 0, 0, 0, 0, 0, 48]);
        let loca = LocaTable::from_reader(&mut r, 1, true).unwrap();
        assert_eq!(loca.offset(1).unwrap(), 48);
    }
}
