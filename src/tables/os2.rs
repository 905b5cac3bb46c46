use crate::error::Result;
use crate::stream::FontReader;
use crate::tables::FontTable;

/// OS/2 table - OS/2 and Windows metrics. Read up through usWinDescent;
/// the version-dependent tail is ignored.
#[derive(Debug, Clone)]
pub struct Os2Table {
    pub version: u16,
    pub us_weight_class: u16,
    pub us_width_class: u16,
    pub fs_selection: u16,
    pub s_typo_ascender: i16,
    pub s_typo_descender: i16,
    pub s_typo_line_gap: i16,
    pub us_win_ascent: u16,
    pub us_win_descent: u16,
}

impl Os2Table {
    pub fn is_bold(&self) -> bool {
        self.fs_selection & 0x20 != 0 || self.us_weight_class >= 700
    }

    pub fn is_italic(&self) -> bool {
        self.fs_selection & 0x01 != 0
    }
}

impl FontTable for Os2Table {
    fn from_reader(reader: &mut FontReader, _length: u32) -> Result<Self> {
        let version = reader.read_u16()?;
        let _x_avg_char_width = reader.read_i16()?;
        let us_weight_class = reader.read_u16()?;
        let us_width_class = reader.read_u16()?;
        let _fs_type = reader.read_u16()?;
        // subscript/superscript/strikeout metrics and family class
        for _ in 0..11 {
            let _ = reader.read_i16()?;
        }
        let _panose = reader.read_bytes(10)?;
        for _ in 0..4 {
            let _ = reader.read_u32()?; // ulUnicodeRange1-4
        }
        let _ach_vend_id = reader.read_tag()?;
        let fs_selection = reader.read_u16()?;
        let _us_first_char_index = reader.read_u16()?;
        let _us_last_char_index = reader.read_u16()?;
        let s_typo_ascender = reader.read_i16()?;
        let s_typo_descender = reader.read_i16()?;
        let s_typo_line_gap = reader.read_i16()?;
        let us_win_ascent = reader.read_u16()?;
        let us_win_descent = reader.read_u16()?;

        Ok(Os2Table {
            version,
            us_weight_class,
            us_width_class,
            fs_selection,
            s_typo_ascender,
            s_typo_descender,
            s_typo_line_gap,
            us_win_ascent,
            us_win_descent,
        })
    }
}
