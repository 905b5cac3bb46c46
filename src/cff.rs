pub mod charstring;
pub mod dict;
pub mod index;

use crate::error::{FontError, Result};
use crate::stream::FontReader;
use dict::{Dict, op};
use index::Index;

/// Parsed CFF or CFF2 font program. Non-CID fonts carry exactly one FD
/// entry and no FDSelect.
#[derive(Debug, Clone)]
pub struct CffFont {
    pub char_strings: Index,
    pub global_subrs: Index,
    pub local_subrs: Vec<Option<Index>>,
    pub fd_select: Option<Vec<u8>>,
    pub default_width_x: Vec<f64>,
    pub nominal_width_x: Vec<f64>,
    pub is_cid: bool,
    pub is_cff2: bool,
    pub num_regions: u16,
}

impl CffFont {
    /// Parse a CFF (version 1) table.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = FontReader::from_slice(data);
        let major = reader.read_u8()?;
        let _minor = reader.read_u8()?;
        let hdr_size = reader.read_u8()?;
        let _off_size = reader.read_u8()?;
        if major != 1 {
            return Err(FontError::UnsupportedFormat(format!(
                "CFF major version {}",
                major
            )));
        }

        reader.set_position(hdr_size as usize)?;
        let _names = Index::parse(&mut reader, false)?;
        let top_dicts = Index::parse(&mut reader, false)?;
        let _strings = Index::parse(&mut reader, false)?;
        let global_subrs = Index::parse(&mut reader, false)?;

        // The Top DICT is the single blob of its INDEX.
        let top = Dict::parse(
            top_dicts
                .get(0)
                .ok_or_else(|| FontError::Parse("CFF top DICT index is empty".into()))?,
        )?;

        let cs_offset = top
            .number(op::CHAR_STRINGS)
            .ok_or_else(|| FontError::Parse("CFF top DICT lacks a CharStrings entry".into()))?
            as usize;
        reader.set_position(cs_offset)?;
        let char_strings = Index::parse(&mut reader, false)?;
        let num_glyphs = char_strings.len();

        let is_cid = top.contains(op::ROS);
        let mut default_width_x = Vec::new();
        let mut nominal_width_x = Vec::new();
        let mut local_subrs = Vec::new();
        let mut fd_select = None;

        if is_cid {
            let fd_array_offset = top
                .number(op::FD_ARRAY)
                .ok_or_else(|| FontError::Parse("CID font lacks an FDArray".into()))?
                as usize;
            reader.set_position(fd_array_offset)?;
            let fd_dicts = Index::parse(&mut reader, false)?;
            for i in 0..fd_dicts.len() {
                let fd = Dict::parse(fd_dicts.get(i).unwrap_or_default())?;
                let (dw, nw, subrs) = read_private(&mut reader, &fd, false)?;
                default_width_x.push(dw);
                nominal_width_x.push(nw);
                local_subrs.push(subrs);
            }
            if let Some(offset) = top.number(op::FD_SELECT) {
                fd_select = Some(parse_fd_select(&mut reader, offset as usize, num_glyphs)?);
            }
        } else {
            let (dw, nw, subrs) = read_private(&mut reader, &top, false)?;
            default_width_x.push(dw);
            nominal_width_x.push(nw);
            local_subrs.push(subrs);
        }

        if local_subrs.is_empty() {
            default_width_x.push(0.0);
            nominal_width_x.push(0.0);
            local_subrs.push(None);
        }

        Ok(CffFont {
            char_strings,
            global_subrs,
            local_subrs,
            fd_select,
            default_width_x,
            nominal_width_x,
            is_cid,
            is_cff2: false,
            num_regions: 0,
        })
    }

    /// Parse a CFF2 table: inline Top DICT, u32 INDEX counts, no widths in
    /// charstrings, optional ItemVariationStore for `blend`.
    pub fn parse_cff2(data: &[u8]) -> Result<Self> {
        let mut reader = FontReader::from_slice(data);
        let major = reader.read_u8()?;
        let _minor = reader.read_u8()?;
        let hdr_size = reader.read_u8()?;
        let top_dict_length = reader.read_u16()? as usize;
        if major != 2 {
            return Err(FontError::UnsupportedFormat(format!(
                "CFF2 major version {}",
                major
            )));
        }

        reader.set_position(hdr_size as usize)?;
        let top_data = reader.read_bytes(top_dict_length)?;
        let top = Dict::parse(&top_data)?;

        // Global subrs start right after the Top DICT.
        let global_subrs = Index::parse(&mut reader, true)?;

        let cs_offset = top
            .number(op::CHAR_STRINGS)
            .ok_or_else(|| FontError::Parse("CFF2 top DICT lacks a CharStrings entry".into()))?
            as usize;
        reader.set_position(cs_offset)?;
        let char_strings = Index::parse(&mut reader, true)?;
        let num_glyphs = char_strings.len();

        let num_regions = match top.number(op::VSTORE) {
            Some(offset) => read_region_count(&mut reader, offset as usize)?,
            None => 0,
        };

        let mut default_width_x = Vec::new();
        let mut nominal_width_x = Vec::new();
        let mut local_subrs = Vec::new();
        if let Some(fd_array_offset) = top.number(op::FD_ARRAY) {
            reader.set_position(fd_array_offset as usize)?;
            let fd_dicts = Index::parse(&mut reader, true)?;
            for i in 0..fd_dicts.len() {
                let fd = Dict::parse(fd_dicts.get(i).unwrap_or_default())?;
                let (_, _, subrs) = read_private(&mut reader, &fd, true)?;
                // CFF2 charstrings carry no widths.
                default_width_x.push(0.0);
                nominal_width_x.push(0.0);
                local_subrs.push(subrs);
            }
        }
        if local_subrs.is_empty() {
            default_width_x.push(0.0);
            nominal_width_x.push(0.0);
            local_subrs.push(None);
        }

        let fd_select = match top.number(op::FD_SELECT) {
            Some(offset) => Some(parse_fd_select(&mut reader, offset as usize, num_glyphs)?),
            None => None,
        };

        Ok(CffFont {
            char_strings,
            global_subrs,
            local_subrs,
            fd_select,
            default_width_x,
            nominal_width_x,
            is_cid: false,
            is_cff2: true,
            num_regions,
        })
    }

    pub fn num_glyphs(&self) -> u16 {
        self.char_strings.len() as u16
    }

    /// FD index for a glyph; non-CID fonts always map to FD 0.
    pub fn fd_index(&self, glyph_id: u16) -> usize {
        let fd = self
            .fd_select
            .as_ref()
            .and_then(|map| map.get(glyph_id as usize))
            .copied()
            .unwrap_or(0) as usize;
        if fd < self.local_subrs.len() { fd } else { 0 }
    }
}

/// Read the Private DICT named by `dict` and its local subrs, if any.
fn read_private(
    reader: &mut FontReader,
    dict: &Dict,
    long_subrs: bool,
) -> Result<(f64, f64, Option<Index>)> {
    let Some(entry) = dict.array(op::PRIVATE) else {
        return Ok((0.0, 0.0, None));
    };
    if entry.len() < 2 {
        return Err(FontError::Parse("malformed Private DICT entry".into()));
    }
    let size = entry[0] as usize;
    let offset = entry[1] as usize;

    reader.set_position(offset)?;
    let private_data = reader.read_bytes(size)?;
    let private = Dict::parse(&private_data)?;

    let default_width = private.number(op::DEFAULT_WIDTH_X).unwrap_or(0.0);
    let nominal_width = private.number(op::NOMINAL_WIDTH_X).unwrap_or(0.0);

    // The Subrs offset is relative to the Private DICT start.
    let subrs = match private.number(op::SUBRS) {
        Some(relative) => {
            reader.set_position(offset + relative as usize)?;
            Some(Index::parse(reader, long_subrs)?)
        }
        None => None,
    };

    Ok((default_width, nominal_width, subrs))
}

fn parse_fd_select(reader: &mut FontReader, offset: usize, num_glyphs: usize) -> Result<Vec<u8>> {
    reader.set_position(offset)?;
    match reader.read_u8()? {
        0 => Ok(reader.read_bytes(num_glyphs)?),
        3 => {
            let n_ranges = reader.read_u16()? as usize;
            let mut map = vec![0u8; num_glyphs];
            let mut first = reader.read_u16()? as usize;
            for _ in 0..n_ranges {
                let fd = reader.read_u8()?;
                let next = reader.read_u16()? as usize;
                for gid in first..next.min(num_glyphs) {
                    map[gid] = fd;
                }
                first = next;
            }
            Ok(map)
        }
        format => Err(FontError::Parse(format!(
            "unsupported FDSelect format {}",
            format
        ))),
    }
}

/// The ItemVariationStore region count feeds `blend` operand sizing.
fn read_region_count(reader: &mut FontReader, offset: usize) -> Result<u16> {
    reader.set_position(offset)?;
    let _length = reader.read_u16()?;
    let ivs_start = reader.position();
    let _format = reader.read_u16()?;
    let region_list_offset = reader.read_u32()? as usize;
    let _ivd_count = reader.read_u16()?;
    reader.set_position(ivs_start + region_list_offset)?;
    let _axis_count = reader.read_u16()?;
    let region_count = reader.read_u16()?;
    Ok(region_count)
}
