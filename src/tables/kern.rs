use std::collections::BTreeMap;

use crate::error::Result;
use crate::stream::FontReader;
use crate::tables::FontTable;

/// Kern table - legacy kerning. Only horizontal format-0 subtables are
/// honored; everything else is skipped over.
#[derive(Debug, Clone)]
pub struct KernTable {
    pub pairs: BTreeMap<u16, BTreeMap<u16, i16>>,
}

const COVERAGE_HORIZONTAL: u16 = 0x0001;

impl FontTable for KernTable {
    fn from_reader(reader: &mut FontReader, _length: u32) -> Result<Self> {
        let _version = reader.read_u16()?;
        let num_tables = reader.read_u16()?;

        let mut pairs: BTreeMap<u16, BTreeMap<u16, i16>> = BTreeMap::new();
        for _ in 0..num_tables {
            let subtable_start = reader.position();
            let _subtable_version = reader.read_u16()?;
            let subtable_length = reader.read_u16()? as usize;
            let coverage = reader.read_u16()?;
            let format = coverage >> 8;

            if format == 0 && coverage & COVERAGE_HORIZONTAL != 0 {
                let num_pairs = reader.read_u16()?;
                let _search_range = reader.read_u16()?;
                let _entry_selector = reader.read_u16()?;
                let _range_shift = reader.read_u16()?;
                for _ in 0..num_pairs {
                    let left = reader.read_u16()?;
                    let right = reader.read_u16()?;
                    let value = reader.read_i16()?;
                    if value != 0 {
                        pairs.entry(left).or_default().entry(right).or_insert(value);
                    }
                }
            }

            // Subtable lengths are authoritative; step over whatever the
            // format walk did not consume.
            let next = subtable_start + subtable_length.max(6);
            if reader.set_position(next).is_err() {
                break;
            }
        }

        Ok(KernTable { pairs })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::stream::FontWriter;

    pub(crate) fn kern_bytes(pairs: &[(u16, u16, i16)]) -> Vec<u8> {
        let mut w = FontWriter::new();
        w.write_u16(0);
        w.write_u16(1); // one subtable
        w.write_u16(0); // subtable version
        w.write_u16(14 + 6 * pairs.len() as u16);
        w.write_u16(0x0001); // horizontal, format 0
        w.write_u16(pairs.len() as u16);
        w.write_u16(0);
        w.write_u16(0);
        w.write_u16(0);
        for &(left, right, value) in pairs {
            w.write_u16(left);
            w.write_u16(right);
            w.write_i16(value);
        }
        w.into_inner()
    }

    #[test]
    fn format0_pairs() {
        let bytes = kern_bytes(&[(4, 5, -60), (4, 6, 0), (9, 2, 35)]);
        let mut r = FontReader::new(bytes);
        let kern = KernTable::from_reader(&mut r, 0).unwrap();
        assert_eq!(kern.pairs[&4][&5], -60);
        assert_eq!(kern.pairs[&9][&2], 35);
        // Zero adjustments are omitted.
        assert!(!kern.pairs[&4].contains_key(&6));
    }

    #[test]
    fn vertical_subtable_skipped() {
        let mut w = FontWriter::new();
        w.write_u16(0);
        w.write_u16(2);
        // Vertical format-0 subtable, skipped by length.
        w.write_u16(0);
        w.write_u16(20);
        w.write_u16(0x0000);
        w.write_u16(1);
        w.write_u16(0);
        w.write_u16(0);
        w.write_u16(0);
        w.write_u16(1);
        w.write_u16(2);
        w.write_i16(-999);
        // Horizontal subtable that must still be found.
        w.write_u16(0);
        w.write_u16(20);
        w.write_u16(0x0001);
        w.write_u16(1);
        w.write_u16(0);
        w.write_u16(0);
        w.write_u16(0);
        w.write_u16(7);
        w.write_u16(8);
        w.write_i16(-40);

        let mut r = FontReader::new(w.into_inner());
        let kern = KernTable::from_reader(&mut r, 0).unwrap();
        assert_eq!(kern.pairs.len(), 1);
        assert_eq!(kern.pairs[&7][&8], -40);
    }
}
