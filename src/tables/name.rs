use crate::error::Result;
use crate::stream::FontReader;
use crate::tables::FontTable;

/// NAME table - Naming table
#[derive(Debug, Clone)]
pub struct NameTable {
    pub records: Vec<NameRecord>,
}

#[derive(Debug, Clone)]
pub struct NameRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub language_id: u16,
    pub name_id: u16,
    pub data: Vec<u8>,
}

impl NameRecord {
    pub const COPYRIGHT_NOTICE: u16 = 0;
    pub const FONT_FAMILY_NAME: u16 = 1;
    pub const FONT_SUBFAMILY_NAME: u16 = 2;
    pub const FULL_FONT_NAME: u16 = 4;
    pub const VERSION_STRING: u16 = 5;
    pub const POSTSCRIPT_NAME: u16 = 6;
    pub const DESIGNER: u16 = 9;

    fn decode(&self) -> String {
        // Windows and Unicode platform strings are UTF-16BE; everything
        // else is treated as single-byte text.
        if self.platform_id == 3 || self.platform_id == 0 {
            let units: Vec<u16> = self
                .data
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        } else {
            self.data.iter().map(|&b| b as char).collect()
        }
    }
}

impl NameTable {
    /// Decoded string for a name id: platform 3 preferred, else the first
    /// record carrying the id.
    pub fn string(&self, name_id: u16) -> Option<String> {
        let record = self
            .records
            .iter()
            .find(|r| r.name_id == name_id && r.platform_id == 3)
            .or_else(|| self.records.iter().find(|r| r.name_id == name_id))?;
        Some(record.decode())
    }

    pub fn family_name(&self) -> Option<String> {
        self.string(NameRecord::FONT_FAMILY_NAME)
    }

    pub fn postscript_name(&self) -> Option<String> {
        self.string(NameRecord::POSTSCRIPT_NAME)
    }
}

impl FontTable for NameTable {
    fn from_reader(reader: &mut FontReader, _length: u32) -> Result<Self> {
        let _format = reader.read_u16()?;
        let count = reader.read_u16()?;
        let string_offset = reader.read_u16()? as usize;

        let mut headers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            headers.push((
                reader.read_u16()?, // platform
                reader.read_u16()?, // encoding
                reader.read_u16()?, // language
                reader.read_u16()?, // name id
                reader.read_u16()?, // length
                reader.read_u16()?, // offset
            ));
        }

        let mut records = Vec::with_capacity(count as usize);
        for (platform_id, encoding_id, language_id, name_id, length, offset) in headers {
            let start = string_offset + offset as usize;
            if reader.set_position(start).is_err() {
                continue; // record points outside the table
            }
            let data = match reader.read_bytes(length as usize) {
                Ok(data) => data,
                Err(_) => continue,
            };
            records.push(NameRecord {
                platform_id,
                encoding_id,
                language_id,
                name_id,
                data,
            });
        }

        Ok(NameTable { records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::FontWriter;

    pub(crate) fn name_bytes(entries: &[(u16, u16, &str)]) -> Vec<u8> {
        // entries: (platform, name_id, text)
        let mut storage = FontWriter::new();
        let mut headers = Vec::new();
        for (platform, name_id, text) in entries {
            let offset = storage.position() as u16;
            if *platform == 3 || *platform == 0 {
                for unit in text.encode_utf16() {
                    storage.write_u16(unit);
                }
            } else {
                storage.write_bytes(text.as_bytes());
            }
            let length = storage.position() as u16 - offset;
            headers.push((*platform, *name_id, length, offset));
        }

        let mut w = FontWriter::new();
        w.write_u16(0);
        w.write_u16(entries.len() as u16);
        w.write_u16(6 + 12 * entries.len() as u16);
        for (platform, name_id, length, offset) in headers {
            w.write_u16(platform);
            w.write_u16(if platform == 3 { 1 } else { 0 });
            w.write_u16(if platform == 3 { 0x409 } else { 0 });
            w.write_u16(name_id);
            w.write_u16(length);
            w.write_u16(offset);
        }
        w.write_bytes(storage.as_slice());
        w.into_inner()
    }

    #[test]
    fn prefers_windows_strings() {
        let bytes = name_bytes(&[
            (1, NameRecord::FONT_FAMILY_NAME, "Mac Family"),
            (3, NameRecord::FONT_FAMILY_NAME, "Win Family"),
        ]);
        let mut r = FontReader::new(bytes);
        let name = NameTable::from_reader(&mut r, 0).unwrap();
        assert_eq!(name.family_name().unwrap(), "Win Family");
    }

    #[test]
    fn falls_back_to_first_record() {
        let bytes = name_bytes(&[(1, NameRecord::POSTSCRIPT_NAME, "Plain-Roman")]);
        let mut r = FontReader::new(bytes);
        let name = NameTable::from_reader(&mut r, 0).unwrap();
        assert_eq!(name.postscript_name().unwrap(), "Plain-Roman");
        assert!(name.string(NameRecord::DESIGNER).is_none());
    }
}
