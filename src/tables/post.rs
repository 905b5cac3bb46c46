use crate::error::Result;
use crate::stream::FontReader;
use crate::tables::FontTable;

/// POST table - PostScript information. Supplies underline metrics; the
/// glyph-name data of format 2.0 is not read.
#[derive(Debug, Clone)]
pub struct PostTable {
    pub italic_angle: f32,
    pub underline_position: i16,
    pub underline_thickness: i16,
    pub is_fixed_pitch: bool,
}

impl PostTable {
    /// Fallback metrics when the table is absent.
    pub fn default_underline(units_per_em: u16) -> (i16, i16) {
        let upem = units_per_em as f32;
        ((-0.1 * upem) as i16, (0.05 * upem) as i16)
    }
}

impl FontTable for PostTable {
    fn from_reader(reader: &mut FontReader, _length: u32) -> Result<Self> {
        let _format = reader.read_fixed()?;
        let italic_angle = reader.read_fixed()?;
        let underline_position = reader.read_i16()?;
        let underline_thickness = reader.read_i16()?;
        let is_fixed_pitch = reader.read_u32()? != 0;

        Ok(PostTable {
            italic_angle,
            underline_position,
            underline_thickness,
            is_fixed_pitch,
        })
    }
}
