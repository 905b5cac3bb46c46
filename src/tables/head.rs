use crate::error::{FontError, Result};
use crate::stream::FontReader;
use crate::tables::FontTable;

/// HEAD table - Font header
#[derive(Debug, Clone)]
pub struct HeadTable {
    pub flags: u16,
    pub units_per_em: u16,
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
    pub mac_style: u16,
    pub index_to_loc_format: i16,
}

impl HeadTable {
    pub const MAGIC_NUMBER: u32 = 0x5F0F3CF5;

    pub fn is_long_loca_format(&self) -> bool {
        self.index_to_loc_format == 1
    }
}

impl FontTable for HeadTable {
    fn from_reader(reader: &mut FontReader, _length: u32) -> Result<Self> {
        let _version = reader.read_fixed()?;
        let _font_revision = reader.read_fixed()?;
        let _checksum_adjustment = reader.read_u32()?;
        let magic_number = reader.read_u32()?;

        if magic_number != Self::MAGIC_NUMBER {
            return Err(FontError::Parse(format!(
                "Invalid magic number in head table: expected {:#x}, got {:#x}",
                Self::MAGIC_NUMBER,
                magic_number
            )));
        }

        let flags = reader.read_u16()?;
        let units_per_em = reader.read_u16()?;
        let _created = reader.read_u64()?;
        let _modified = reader.read_u64()?;
        let x_min = reader.read_i16()?;
        let y_min = reader.read_i16()?;
        let x_max = reader.read_i16()?;
        let y_max = reader.read_i16()?;
        let mac_style = reader.read_u16()?;
        let _lowest_rec_ppem = reader.read_u16()?;
        let _font_direction_hint = reader.read_i16()?;
        let index_to_loc_format = reader.read_i16()?;

        Ok(HeadTable {
            flags,
            units_per_em,
            x_min,
            y_min,
            x_max,
            y_max,
            mac_style,
            index_to_loc_format,
        })
    }
}
