use std::collections::BTreeMap;

use crate::error::{FontError, Result};
use crate::stream::FontReader;
use crate::tables::FontTable;

/// CMAP table - Character to glyph mapping, flattened into a full
/// codepoint → glyph-id map. Codepoints mapping to glyph 0 are dropped.
#[derive(Debug, Clone)]
pub struct CmapTable {
    pub mappings: BTreeMap<u32, u16>,
}

impl CmapTable {
    pub fn glyph_id(&self, codepoint: u32) -> Option<u16> {
        self.mappings.get(&codepoint).copied()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

/// Subtable preference: (3,10) > (0,4) > (3,1) > (0,{0,1,3}).
fn subtable_score(platform_id: u16, encoding_id: u16) -> Option<u8> {
    match (platform_id, encoding_id) {
        (3, 10) => Some(4),
        (0, 4) => Some(3),
        (3, 1) => Some(2),
        (0, 0) | (0, 1) | (0, 3) => Some(1),
        _ => None,
    }
}

impl FontTable for CmapTable {
    fn from_reader(reader: &mut FontReader, _length: u32) -> Result<Self> {
        let _version = reader.read_u16()?;
        let num_tables = reader.read_u16()?;

        let mut records = Vec::with_capacity(num_tables as usize);
        for _ in 0..num_tables {
            records.push((
                reader.read_u16()?, // platform
                reader.read_u16()?, // encoding
                reader.read_u32()?, // offset from table start
            ));
        }

        let mut best: Option<(u8, usize)> = None;
        for (i, &(platform_id, encoding_id, _)) in records.iter().enumerate() {
            if let Some(score) = subtable_score(platform_id, encoding_id) {
                // Ties break on the first subtable encountered.
                if best.is_none_or(|(s, _)| score > s) {
                    best = Some((score, i));
                }
            }
        }
        let chosen = match best {
            Some((_, i)) => i,
            None if !records.is_empty() => 0,
            None => return Ok(CmapTable {
                mappings: BTreeMap::new(),
            }),
        };

        reader.set_position(records[chosen].2 as usize)?;
        let format = reader.read_u16()?;
        let mappings = match format {
            0 => parse_format0(reader)?,
            4 => parse_format4(reader)?,
            6 => parse_format6(reader)?,
            12 => parse_format12(reader)?,
            other => return Err(FontError::UnsupportedCmap(other)),
        };

        Ok(CmapTable { mappings })
    }
}

fn parse_format0(reader: &mut FontReader) -> Result<BTreeMap<u32, u16>> {
    let _length = reader.read_u16()?;
    let _language = reader.read_u16()?;
    let glyph_ids = reader.read_bytes(256)?;

    let mut mappings = BTreeMap::new();
    for (code, &gid) in glyph_ids.iter().enumerate() {
        if gid != 0 {
            mappings.insert(code as u32, gid as u16);
        }
    }
    Ok(mappings)
}

fn parse_format4(reader: &mut FontReader) -> Result<BTreeMap<u32, u16>> {
    let _length = reader.read_u16()?;
    let _language = reader.read_u16()?;
    let seg_count = (reader.read_u16()? / 2) as usize;
    let _search_range = reader.read_u16()?;
    let _entry_selector = reader.read_u16()?;
    let _range_shift = reader.read_u16()?;

    let mut end_codes = Vec::with_capacity(seg_count);
    for _ in 0..seg_count {
        end_codes.push(reader.read_u16()?);
    }
    let _reserved_pad = reader.read_u16()?;
    let mut start_codes = Vec::with_capacity(seg_count);
    for _ in 0..seg_count {
        start_codes.push(reader.read_u16()?);
    }
    let mut deltas = Vec::with_capacity(seg_count);
    for _ in 0..seg_count {
        deltas.push(reader.read_i16()?);
    }
    // Glyph-id reads below are relative to the idRangeOffset array itself.
    let range_offset_pos = reader.position();
    let mut range_offsets = Vec::with_capacity(seg_count);
    for _ in 0..seg_count {
        range_offsets.push(reader.read_u16()?);
    }

    let mut mappings = BTreeMap::new();
    for i in 0..seg_count {
        let start = start_codes[i];
        let end = end_codes[i];
        if start == 0xFFFF {
            break;
        }
        if end < start {
            continue;
        }
        for code in start..=end {
            let gid = if range_offsets[i] == 0 {
                code.wrapping_add(deltas[i] as u16)
            } else {
                let pos = range_offset_pos
                    + 2 * i
                    + range_offsets[i] as usize
                    + 2 * (code - start) as usize;
                if reader.set_position(pos).is_err() {
                    continue;
                }
                match reader.read_u16() {
                    Ok(0) | Err(_) => continue,
                    Ok(gid) => gid.wrapping_add(deltas[i] as u16),
                }
            };
            if gid != 0 {
                mappings.entry(code as u32).or_insert(gid);
            }
        }
    }
    Ok(mappings)
}

fn parse_format6(reader: &mut FontReader) -> Result<BTreeMap<u32, u16>> {
    let _length = reader.read_u16()?;
    let _language = reader.read_u16()?;
    let first_code = reader.read_u16()? as u32;
    let entry_count = reader.read_u16()?;

    let mut mappings = BTreeMap::new();
    for i in 0..entry_count as u32 {
        let gid = reader.read_u16()?;
        if gid != 0 {
            mappings.insert(first_code + i, gid);
        }
    }
    Ok(mappings)
}

fn parse_format12(reader: &mut FontReader) -> Result<BTreeMap<u32, u16>> {
    let _reserved = reader.read_u16()?;
    let _length = reader.read_u32()?;
    let _language = reader.read_u32()?;
    let num_groups = reader.read_u32()? as usize;
    if num_groups > reader.remaining() / 12 {
        return Err(FontError::Parse("cmap format 12 group count too large".into()));
    }

    let mut mappings = BTreeMap::new();
    for _ in 0..num_groups {
        let start_char = reader.read_u32()?;
        let end_char = reader.read_u32()?;
        let start_glyph = reader.read_u32()?;
        if end_char < start_char {
            continue;
        }
        for code in start_char..=end_char {
            let gid = (start_glyph + (code - start_char)) as u16;
            if gid != 0 {
                mappings.insert(code, gid);
            }
        }
    }
    Ok(mappings)
}
