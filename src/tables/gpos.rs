use std::collections::BTreeMap;

use log::debug;

use crate::error::{FontError, Result};
use crate::stream::FontReader;
use crate::tables::FontTable;

/// GPOS table - glyph positioning, reduced to the PairPos x-advance
/// adjustments this pipeline consumes as kerning.
#[derive(Debug, Clone)]
pub struct GposTable {
    pub pairs: BTreeMap<u16, BTreeMap<u16, i16>>,
}

const PAIR_POS: u16 = 2;
const EXTENSION: u16 = 9;
const X_ADVANCE_BIT: usize = 2;

impl FontTable for GposTable {
    fn from_reader(reader: &mut FontReader, _length: u32) -> Result<Self> {
        let _major = reader.read_u16()?;
        let _minor = reader.read_u16()?;
        let _script_list_offset = reader.read_u16()?;
        let _feature_list_offset = reader.read_u16()?;
        let lookup_list_offset = reader.read_u16()? as usize;

        reader.set_position(lookup_list_offset)?;
        let lookup_count = reader.read_u16()?;
        let mut lookup_offsets = Vec::with_capacity(lookup_count as usize);
        for _ in 0..lookup_count {
            lookup_offsets.push(reader.read_u16()?);
        }

        let mut pairs = BTreeMap::new();
        for offset in lookup_offsets {
            let lookup_base = lookup_list_offset + offset as usize;
            if let Err(err) = parse_lookup(reader, lookup_base, &mut pairs) {
                // Broken lookups lose their pairs, never the parse.
                debug!("skipping broken GPOS lookup: {}", err);
            }
        }

        Ok(GposTable { pairs })
    }
}

fn parse_lookup(
    reader: &mut FontReader,
    base: usize,
    pairs: &mut BTreeMap<u16, BTreeMap<u16, i16>>,
) -> Result<()> {
    reader.set_position(base)?;
    let lookup_type = reader.read_u16()?;
    let _lookup_flag = reader.read_u16()?;
    let subtable_count = reader.read_u16()?;
    let mut offsets = Vec::with_capacity(subtable_count as usize);
    for _ in 0..subtable_count {
        offsets.push(reader.read_u16()?);
    }

    for offset in offsets {
        let (actual_type, subtable_base) =
            resolve_extension(reader, lookup_type, base + offset as usize)?;
        if actual_type != PAIR_POS {
            continue;
        }
        if let Err(err) = parse_pair_pos(reader, subtable_base, pairs) {
            debug!("skipping broken PairPos subtable: {}", err);
        }
    }
    Ok(())
}

/// Extension lookups (type 9) indirect to the real subtable.
fn resolve_extension(
    reader: &mut FontReader,
    lookup_type: u16,
    base: usize,
) -> Result<(u16, usize)> {
    if lookup_type != EXTENSION {
        return Ok((lookup_type, base));
    }
    reader.set_position(base)?;
    let format = reader.read_u16()?;
    if format != 1 {
        return Err(FontError::Parse(format!(
            "unknown extension subtable format {}",
            format
        )));
    }
    let extension_type = reader.read_u16()?;
    let extension_offset = reader.read_u32()? as usize;
    Ok((extension_type, base + extension_offset))
}

fn parse_pair_pos(
    reader: &mut FontReader,
    base: usize,
    pairs: &mut BTreeMap<u16, BTreeMap<u16, i16>>,
) -> Result<()> {
    reader.set_position(base)?;
    let format = reader.read_u16()?;
    match format {
        1 => parse_pair_pos_format1(reader, base, pairs),
        2 => parse_pair_pos_format2(reader, base, pairs),
        _ => Ok(()), // not kerning data
    }
}

/// Format 1: per-glyph PairSets behind a Coverage of first glyphs.
fn parse_pair_pos_format1(
    reader: &mut FontReader,
    base: usize,
    pairs: &mut BTreeMap<u16, BTreeMap<u16, i16>>,
) -> Result<()> {
    let coverage_offset = reader.read_u16()? as usize;
    let value_format1 = reader.read_u16()?;
    let value_format2 = reader.read_u16()?;
    let pair_set_count = reader.read_u16()?;
    let mut pair_set_offsets = Vec::with_capacity(pair_set_count as usize);
    for _ in 0..pair_set_count {
        pair_set_offsets.push(reader.read_u16()?);
    }

    let coverage = parse_coverage(reader, base + coverage_offset)?;

    for (index, offset) in pair_set_offsets.iter().enumerate() {
        let Some(&first) = coverage.get(index) else {
            break;
        };
        reader.set_position(base + *offset as usize)?;
        let pair_count = reader.read_u16()?;
        for _ in 0..pair_count {
            let second = reader.read_u16()?;
            let x_advance = read_value_record(reader, value_format1)?;
            read_value_record(reader, value_format2)?;
            if x_advance != 0 {
                pairs.entry(first).or_default().entry(second).or_insert(x_advance);
            }
        }
    }
    Ok(())
}

/// Format 2: class matrix. Every covered first glyph takes its ClassDef1
/// class (0 when absent); second glyphs are the ones ClassDef2 lists.
fn parse_pair_pos_format2(
    reader: &mut FontReader,
    base: usize,
    pairs: &mut BTreeMap<u16, BTreeMap<u16, i16>>,
) -> Result<()> {
    let coverage_offset = reader.read_u16()? as usize;
    let value_format1 = reader.read_u16()?;
    let value_format2 = reader.read_u16()?;
    let class_def1_offset = reader.read_u16()? as usize;
    let class_def2_offset = reader.read_u16()? as usize;
    let class1_count = reader.read_u16()? as usize;
    let class2_count = reader.read_u16()? as usize;

    // The matrix follows the header directly; read it before chasing the
    // coverage and class definition offsets.
    let mut matrix = vec![vec![0i16; class2_count]; class1_count];
    for row in matrix.iter_mut() {
        for cell in row.iter_mut() {
            *cell = read_value_record(reader, value_format1)?;
            read_value_record(reader, value_format2)?;
        }
    }

    let coverage = parse_coverage(reader, base + coverage_offset)?;
    let class_def1 = parse_class_def(reader, base + class_def1_offset)?;
    let class_def2 = parse_class_def(reader, base + class_def2_offset)?;

    for &first in &coverage {
        let c1 = class_def1.get(&first).copied().unwrap_or(0) as usize;
        let Some(row) = matrix.get(c1) else {
            continue;
        };
        for (&second, &c2) in &class_def2 {
            let value = row.get(c2 as usize).copied().unwrap_or(0);
            if value != 0 {
                pairs.entry(first).or_default().entry(second).or_insert(value);
            }
        }
    }
    Ok(())
}

/// ValueRecord: one i16 per set bit, in field order; only xAdvance is kept.
fn read_value_record(reader: &mut FontReader, value_format: u16) -> Result<i16> {
    let mut x_advance = 0;
    for bit in 0..8 {
        if value_format & (1 << bit) != 0 {
            let value = reader.read_i16()?;
            if bit == X_ADVANCE_BIT {
                x_advance = value;
            }
        }
    }
    Ok(x_advance)
}

/// Coverage: ordered list of covered glyph ids.
fn parse_coverage(reader: &mut FontReader, base: usize) -> Result<Vec<u16>> {
    reader.set_position(base)?;
    let format = reader.read_u16()?;
    let mut glyphs = Vec::new();
    match format {
        1 => {
            let count = reader.read_u16()?;
            for _ in 0..count {
                glyphs.push(reader.read_u16()?);
            }
        }
        2 => {
            let range_count = reader.read_u16()?;
            for _ in 0..range_count {
                let start = reader.read_u16()?;
                let end = reader.read_u16()?;
                let _start_coverage_index = reader.read_u16()?;
                if end < start {
                    continue;
                }
                for glyph in start..=end {
                    glyphs.push(glyph);
                }
            }
        }
        other => {
            return Err(FontError::Parse(format!("unknown coverage format {}", other)));
        }
    }
    Ok(glyphs)
}

/// ClassDef: glyph id → class, for the glyphs the table lists.
fn parse_class_def(reader: &mut FontReader, base: usize) -> Result<BTreeMap<u16, u16>> {
    reader.set_position(base)?;
    let format = reader.read_u16()?;
    let mut classes = BTreeMap::new();
    match format {
        1 => {
            let start_glyph = reader.read_u16()?;
            let glyph_count = reader.read_u16()?;
            for i in 0..glyph_count {
                let class = reader.read_u16()?;
                classes.insert(start_glyph + i, class);
            }
        }
        2 => {
            let range_count = reader.read_u16()?;
            for _ in 0..range_count {
                let start = reader.read_u16()?;
                let end = reader.read_u16()?;
                let class = reader.read_u16()?;
                if end < start {
                    continue;
                }
                for glyph in start..=end {
                    classes.insert(glyph, class);
                }
            }
        }
        other => {
            return Err(FontError::Parse(format!("unknown class def format {}", other)));
        }
    }
    Ok(classes)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::stream::FontWriter;

    /// Wrap one positioning subtable into a full GPOS table. `wrap_extension`
    /// places it behind a type-9 extension lookup.
    pub(crate) fn gpos_bytes(lookup_type: u16, subtable: &[u8], wrap_extension: bool) -> Vec<u8> {
        let mut w = FontWriter::new();
        w.write_u16(1);
        w.write_u16(0);
        w.write_u16(0); // scriptList, unused here
        w.write_u16(0); // featureList, unused here
        w.write_u16(10); // lookupList

        // LookupList with a single lookup.
        w.write_u16(1);
        w.write_u16(4);

        if wrap_extension {
            w.write_u16(EXTENSION);
            w.write_u16(0);
            w.write_u16(1);
            w.write_u16(8);
            // Extension subtable at lookup offset 8.
            w.write_u16(1);
            w.write_u16(lookup_type);
            w.write_u32(8);
            w.write_bytes(subtable);
        } else {
            w.write_u16(lookup_type);
            w.write_u16(0);
            w.write_u16(1);
            w.write_u16(8);
            w.write_bytes(subtable);
        }
        w.into_inner()
    }

    /// PairPos format 2 with Coverage {a}, ClassDef1 {a→1}, ClassDef2
    /// {v→1} and the matrix [[0,0],[0,value]].
    pub(crate) fn class_kerning_subtable(a: u16, v: u16, value: i16) -> Vec<u8> {
        let mut w = FontWriter::new();
        w.write_u16(2); // posFormat
        w.write_u16(24); // coverage offset
        w.write_u16(0x0004); // valueFormat1: xAdvance only
        w.write_u16(0x0000); // valueFormat2
        w.write_u16(30); // classDef1 offset
        w.write_u16(38); // classDef2 offset
        w.write_u16(2); // class1Count
        w.write_u16(2); // class2Count
        for cell in [0, 0, 0, value] {
            w.write_i16(cell);
        }
        // Coverage format 1: [A]
        w.write_u16(1);
        w.write_u16(1);
        w.write_u16(a);
        // ClassDef1 format 1: A -> 1
        w.write_u16(1);
        w.write_u16(a);
        w.write_u16(1);
        w.write_u16(1);
        // ClassDef2 format 1: V -> 1
        w.write_u16(1);
        w.write_u16(v);
        w.write_u16(1);
        w.write_u16(1);
        w.into_inner()
    }

    fn pair_pos_format1(first: u16, second: u16, value: i16) -> Vec<u8> {
        let mut w = FontWriter::new();
        w.write_u16(1); // posFormat
        w.write_u16(12); // coverage offset
        w.write_u16(0x0004);
        w.write_u16(0x0000);
        w.write_u16(1); // pairSetCount
        w.write_u16(18); // pairSet offset
        // Coverage format 1
        w.write_u16(1);
        w.write_u16(1);
        w.write_u16(first);
        // PairSet
        w.write_u16(1);
        w.write_u16(second);
        w.write_i16(value);
        w.into_inner()
    }

    #[test]
    fn pair_pos_format1_x_advance() {
        let bytes = gpos_bytes(PAIR_POS, &pair_pos_format1(11, 12, -50), false);
        let gpos = GposTable::from_reader(&mut FontReader::new(bytes), 0).unwrap();
        assert_eq!(gpos.pairs[&11][&12], -50);
    }

    #[test]
    fn class_matrix_kerning() {
        let bytes = gpos_bytes(PAIR_POS, &class_kerning_subtable(1, 2, -80), false);
        let gpos = GposTable::from_reader(&mut FontReader::new(bytes), 0).unwrap();
        assert_eq!(gpos.pairs[&1][&2], -80);
        assert_eq!(gpos.pairs.len(), 1);
        assert_eq!(gpos.pairs[&1].len(), 1);
    }

    #[test]
    fn extension_lookup_unwraps() {
        let bytes = gpos_bytes(PAIR_POS, &class_kerning_subtable(1, 2, -80), true);
        let gpos = GposTable::from_reader(&mut FontReader::new(bytes), 0).unwrap();
        assert_eq!(gpos.pairs[&1][&2], -80);
    }

    #[test]
    fn value_record_sizing() {
        // xPlacement + xAdvance: two i16 fields, xAdvance second.
        let mut w = FontWriter::new();
        w.write_i16(7);
        w.write_i16(-33);
        let mut r = FontReader::new(w.into_inner());
        assert_eq!(read_value_record(&mut r, 0x0005).unwrap(), -33);
        assert!(r.is_empty());
    }

    #[test]
    fn coverage_ranges_expand() {
        let mut w = FontWriter::new();
        w.write_u16(2);
        w.write_u16(1);
        w.write_u16(5);
        w.write_u16(7);
        w.write_u16(0);
        let mut r = FontReader::new(w.into_inner());
        assert_eq!(parse_coverage(&mut r, 0).unwrap(), vec![5, 6, 7]);
    }

    #[test]
    fn broken_subtable_is_skipped() {
        // Coverage offset points past the end of the data.
        let mut sub = class_kerning_subtable(1, 2, -80);
        sub[2] = 0xFF;
        sub[3] = 0xFF;
        let bytes = gpos_bytes(PAIR_POS, &sub, false);
        let gpos = GposTable::from_reader(&mut FontReader::new(bytes), 0).unwrap();
        assert!(gpos.pairs.is_empty());
    }

    #[test]
    fn non_pair_lookups_ignored() {
        // A single-position lookup (type 1) contributes nothing.
        let bytes = gpos_bytes(1, &[0, 0, 0, 0], false);
        let gpos = GposTable::from_reader(&mut FontReader::new(bytes), 0).unwrap();
        assert!(gpos.pairs.is_empty());
    }
}
