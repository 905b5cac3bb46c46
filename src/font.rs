use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::cff::CffFont;
use crate::error::{FontError, Result};
use crate::stream::FontReader;
use crate::tables::cmap::CmapTable;
use crate::tables::glyf::GlyfTable;
use crate::tables::gpos::GposTable;
use crate::tables::head::HeadTable;
use crate::tables::hhea::HheaTable;
use crate::tables::hmtx::HmtxTable;
use crate::tables::kern::KernTable;
use crate::tables::loca::LocaTable;
use crate::tables::maxp::MaxpTable;
use crate::tables::name::NameTable;
use crate::tables::os2::Os2Table;
use crate::tables::post::PostTable;
use crate::tables::{FontTable, TableRecord};
use crate::woff::unwrap_container;

/// An SFNT font: the table directory plus the (possibly WOFF-unwrapped)
/// underlying buffer. Tables parse on demand.
#[derive(Debug, Clone)]
pub struct Font {
    pub sfnt_version: u32,
    pub num_tables: u16,
    pub search_range: u16,
    pub entry_selector: u16,
    pub range_shift: u16,
    pub table_records: Vec<TableRecord>,
    pub data: Vec<u8>,
}

impl Font {
    const SFNT_TRUETYPE: u32 = 0x00010000;
    const SFNT_OPENTYPE: u32 = 0x4F54544F; // 'OTTO'
    const SFNT_APPLE_TRUE: u32 = 0x74727565; // 'true'

    /// Load a font from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Self::from_data(data)
    }

    /// Load a font from raw bytes. WOFF containers are unwrapped first.
    pub fn from_data(data: Vec<u8>) -> Result<Self> {
        let data = unwrap_container(data)?;
        if data.len() < 12 {
            return Err(FontError::InputTooSmall(data.len()));
        }

        let mut reader = FontReader::new(data);
        let sfnt_version = reader.read_u32()?;
        if sfnt_version != Self::SFNT_TRUETYPE
            && sfnt_version != Self::SFNT_OPENTYPE
            && sfnt_version != Self::SFNT_APPLE_TRUE
        {
            return Err(FontError::UnsupportedFormat(format!(
                "unknown sfnt version {:#010x}",
                sfnt_version
            )));
        }

        let num_tables = reader.read_u16()?;
        let search_range = reader.read_u16()?;
        let entry_selector = reader.read_u16()?;
        let range_shift = reader.read_u16()?;

        let mut table_records = Vec::with_capacity(num_tables as usize);
        for _ in 0..num_tables {
            table_records.push(TableRecord::from_reader(&mut reader)?);
        }

        Ok(Font {
            sfnt_version,
            num_tables,
            search_range,
            entry_selector,
            range_shift,
            table_records,
            data: reader.into_inner(),
        })
    }

    pub fn get_table_record(&self, tag: &[u8; 4]) -> Option<&TableRecord> {
        self.table_records.iter().find(|r| r.table_tag == *tag)
    }

    pub fn has_table(&self, tag: &[u8; 4]) -> bool {
        self.get_table_record(tag).is_some()
    }

    /// Raw table bytes, bounds-checked against the buffer.
    pub fn get_table_data(&self, tag: &[u8; 4]) -> Option<&[u8]> {
        let record = self.get_table_record(tag)?;
        let start = record.offset as usize;
        let end = start.checked_add(record.length as usize)?;
        self.data.get(start..end)
    }

    fn table_reader(&self, tag: &[u8; 4], name: &'static str) -> Result<(FontReader, u32)> {
        let record = self
            .get_table_record(tag)
            .ok_or(FontError::MissingTable(name))?;
        let start = record.offset as usize;
        let end = start
            .checked_add(record.length as usize)
            .ok_or(FontError::InputTooSmall(self.data.len()))?;
        if end > self.data.len() {
            return Err(FontError::InputTooSmall(self.data.len()));
        }
        Ok((
            FontReader::from_slice(&self.data[start..end]),
            record.length,
        ))
    }

    pub fn head_table(&self) -> Result<HeadTable> {
        let (mut reader, length) = self.table_reader(b"head", "head")?;
        HeadTable::from_reader(&mut reader, length)
    }

    pub fn maxp_table(&self) -> Result<MaxpTable> {
        let (mut reader, length) = self.table_reader(b"maxp", "maxp")?;
        MaxpTable::from_reader(&mut reader, length)
    }

    pub fn hhea_table(&self) -> Result<HheaTable> {
        let (mut reader, length) = self.table_reader(b"hhea", "hhea")?;
        HheaTable::from_reader(&mut reader, length)
    }

    pub fn hmtx_table(&self) -> Result<HmtxTable> {
        let hhea = self.hhea_table()?;
        let maxp = self.maxp_table()?;
        let (mut reader, _) = self.table_reader(b"hmtx", "hmtx")?;
        HmtxTable::from_reader(&mut reader, maxp.num_glyphs, hhea.number_of_h_metrics)
    }

    pub fn cmap_table(&self) -> Result<CmapTable> {
        let (mut reader, length) = self.table_reader(b"cmap", "cmap")?;
        CmapTable::from_reader(&mut reader, length)
    }

    pub fn name_table(&self) -> Result<NameTable> {
        let (mut reader, length) = self.table_reader(b"name", "name")?;
        NameTable::from_reader(&mut reader, length)
    }

    pub fn os2_table(&self) -> Result<Os2Table> {
        let (mut reader, length) = self.table_reader(b"OS/2", "OS/2")?;
        Os2Table::from_reader(&mut reader, length)
    }

    pub fn post_table(&self) -> Result<PostTable> {
        let (mut reader, length) = self.table_reader(b"post", "post")?;
        PostTable::from_reader(&mut reader, length)
    }

    pub fn loca_table(&self) -> Result<LocaTable> {
        let head = self.head_table()?;
        let maxp = self.maxp_table()?;
        let (mut reader, _) = self.table_reader(b"loca", "loca")?;
        LocaTable::from_reader(&mut reader, maxp.num_glyphs, head.is_long_loca_format())
    }

    pub fn glyf_table(&self) -> Result<GlyfTable> {
        let loca = self.loca_table()?;
        let maxp = self.maxp_table()?;
        let (mut reader, _) = self.table_reader(b"glyf", "glyf")?;
        GlyfTable::from_reader(&mut reader, &loca, maxp.num_glyphs)
    }

    pub fn gpos_table(&self) -> Result<GposTable> {
        let (mut reader, length) = self.table_reader(b"GPOS", "GPOS")?;
        GposTable::from_reader(&mut reader, length)
    }

    pub fn kern_table(&self) -> Result<KernTable> {
        let (mut reader, length) = self.table_reader(b"kern", "kern")?;
        KernTable::from_reader(&mut reader, length)
    }

    /// The CFF or CFF2 font program of an OpenType font.
    pub fn cff_font(&self) -> Result<CffFont> {
        if let Some(data) = self.get_table_data(b"CFF ") {
            CffFont::parse(data)
        } else if let Some(data) = self.get_table_data(b"CFF2") {
            CffFont::parse_cff2(data)
        } else {
            Err(FontError::UnsupportedFormat(
                "font has neither glyf nor CFF/CFF2 outlines".to_string(),
            ))
        }
    }

    /// Which outline source this font carries.
    pub fn outline_format(&self) -> Option<&'static str> {
        if self.has_table(b"glyf") && self.has_table(b"loca") {
            Some("TrueType")
        } else if self.has_table(b"CFF ") {
            Some("CFF/OTF")
        } else if self.has_table(b"CFF2") {
            Some("CFF2/OTF")
        } else {
            None
        }
    }

    /// Get font family name
    pub fn family_name(&self) -> Result<String> {
        let name = self.name_table()?;
        Ok(name.family_name().unwrap_or_else(|| "Unknown".to_string()))
    }

    /// Get number of glyphs
    pub fn num_glyphs(&self) -> Result<u16> {
        let maxp = self.maxp_table()?;
        Ok(maxp.num_glyphs)
    }

    /// Get units per em
    pub fn units_per_em(&self) -> Result<u16> {
        let head = self.head_table()?;
        Ok(head.units_per_em)
    }

    /// Check if font is bold
    pub fn is_bold(&self) -> Result<bool> {
        let os2 = self.os2_table()?;
        Ok(os2.is_bold())
    }

    /// Check if font is italic
    pub fn is_italic(&self) -> Result<bool> {
        let os2 = self.os2_table()?;
        Ok(os2.is_italic())
    }

    /// List all tables
    pub fn list_tables(&self) -> Vec<String> {
        self.table_records
            .iter()
            .map(|r| r.tag_to_string())
            .collect()
    }
}
