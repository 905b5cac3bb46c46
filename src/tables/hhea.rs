use crate::error::Result;
use crate::stream::FontReader;
use crate::tables::FontTable;

/// HHEA table - Horizontal header
#[derive(Debug, Clone)]
pub struct HheaTable {
    pub ascent: i16,
    pub descent: i16,
    pub line_gap: i16,
    pub advance_width_max: u16,
    pub number_of_h_metrics: u16,
}

impl HheaTable {
    pub fn line_height(&self) -> i32 {
        self.ascent as i32 - self.descent as i32 + self.line_gap as i32
    }
}

impl FontTable for HheaTable {
    fn from_reader(reader: &mut FontReader, _length: u32) -> Result<Self> {
        let _version = reader.read_fixed()?;
        let ascent = reader.read_i16()?;
        let descent = reader.read_i16()?;
        let line_gap = reader.read_i16()?;
        let advance_width_max = reader.read_u16()?;
        let _min_left_side_bearing = reader.read_i16()?;
        let _min_right_side_bearing = reader.read_i16()?;
        let _x_max_extent = reader.read_i16()?;
        // caret slope, caret offset, four reserved words, metric format
        for _ in 0..8 {
            let _ = reader.read_i16()?;
        }
        let number_of_h_metrics = reader.read_u16()?;

        Ok(HheaTable {
            ascent,
            descent,
            line_gap,
            advance_width_max,
            number_of_h_metrics,
        })
    }
}
