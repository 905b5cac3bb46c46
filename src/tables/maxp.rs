use crate::error::Result;
use crate::stream::FontReader;
use crate::tables::FontTable;

/// MAXP table - Maximum profile. Only the glyph count matters to this
/// pipeline; the version 1.0 tail is skipped.
#[derive(Debug, Clone)]
pub struct MaxpTable {
    pub version: u32,
    pub num_glyphs: u16,
}

impl FontTable for MaxpTable {
    fn from_reader(reader: &mut FontReader, _length: u32) -> Result<Self> {
        let version = reader.read_u32()?;
        let num_glyphs = reader.read_u16()?;
        Ok(MaxpTable {
            version,
            num_glyphs,
        })
    }
}
