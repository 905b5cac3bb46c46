use crate::error::{FontError, Result};
use crate::inflate::inflate;
use crate::stream::{FontReader, FontWriter};

pub const WOFF_MAGIC: u32 = 0x774F4646; // "wOFF"
pub const WOFF2_MAGIC: u32 = 0x774F4632; // "wOF2"

// Hostile containers can declare absurd sizes; cap reconstruction at 1 GiB.
const MAX_SFNT_SIZE: usize = 1 << 30;

/// WOFF table directory entry
#[derive(Debug, Clone)]
struct WoffTableEntry {
    tag: [u8; 4],
    offset: u32,
    comp_length: u32,
    orig_length: u32,
    orig_checksum: u32,
}

/// Dispatch on the leading magic: WOFF containers are unwrapped into a
/// fresh SFNT buffer, WOFF2 is rejected, anything else passes through
/// unchanged.
pub fn unwrap_container(data: Vec<u8>) -> Result<Vec<u8>> {
    if data.len() < 4 {
        return Err(FontError::InputTooSmall(data.len()));
    }
    let magic = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
    match magic {
        WOFF_MAGIC => unwrap_woff(&data),
        WOFF2_MAGIC => Err(FontError::UnsupportedFormat(
            "WOFF2 requires Brotli".to_string(),
        )),
        _ => Ok(data),
    }
}

fn unwrap_woff(data: &[u8]) -> Result<Vec<u8>> {
    let mut reader = FontReader::from_slice(data);

    let _signature = reader.read_u32()?;
    let flavor = reader.read_u32()?;
    let _length = reader.read_u32()?;
    let num_tables = reader.read_u16()?;
    let _reserved = reader.read_u16()?;
    let total_sfnt_size = reader.read_u32()? as usize;
    let _major_version = reader.read_u16()?;
    let _minor_version = reader.read_u16()?;
    let _meta_offset = reader.read_u32()?;
    let _meta_length = reader.read_u32()?;
    let _meta_orig_length = reader.read_u32()?;
    let _private_offset = reader.read_u32()?;
    let _private_length = reader.read_u32()?;

    if total_sfnt_size > MAX_SFNT_SIZE {
        return Err(FontError::CorruptContainer(format!(
            "declared sfnt size {} is implausible",
            total_sfnt_size
        )));
    }

    let mut entries = Vec::with_capacity(num_tables as usize);
    for _ in 0..num_tables {
        entries.push(WoffTableEntry {
            tag: reader.read_tag()?,
            offset: reader.read_u32()?,
            comp_length: reader.read_u32()?,
            orig_length: reader.read_u32()?,
            orig_checksum: reader.read_u32()?,
        });
    }

    let mut writer = FontWriter::with_capacity(total_sfnt_size);

    // SFNT header: the flavor is the original sfnt version.
    writer.write_u32(flavor);
    writer.write_u16(num_tables);
    let (search_range, entry_selector, range_shift) = search_params(num_tables);
    writer.write_u16(search_range);
    writer.write_u16(entry_selector);
    writer.write_u16(range_shift);

    // Directory entries point at a 4-byte-aligned running data offset.
    let mut data_offset = 12u32 + 16 * num_tables as u32;
    for entry in &entries {
        writer.write_tag(&entry.tag);
        writer.write_u32(entry.orig_checksum);
        writer.write_u32(data_offset);
        writer.write_u32(entry.orig_length);
        data_offset = (data_offset + entry.orig_length + 3) & !3;
    }

    for entry in &entries {
        let payload = table_payload(data, entry, total_sfnt_size)?;
        writer.write_bytes(&payload);
        writer.write_padding(4);
    }

    if writer.position() > total_sfnt_size {
        return Err(FontError::CorruptContainer(
            "reconstructed sfnt exceeds declared size".to_string(),
        ));
    }
    writer.pad_to(total_sfnt_size);
    Ok(writer.into_inner())
}

fn table_payload(data: &[u8], entry: &WoffTableEntry, sfnt_size: usize) -> Result<Vec<u8>> {
    let orig_length = entry.orig_length as usize;
    if orig_length > sfnt_size {
        return Err(FontError::CorruptContainer(format!(
            "table {} larger than declared sfnt size",
            String::from_utf8_lossy(&entry.tag)
        )));
    }

    let start = entry.offset as usize;
    let comp_length = entry.comp_length as usize;
    let end = start
        .checked_add(comp_length)
        .ok_or_else(|| FontError::CorruptContainer("table offset overflow".to_string()))?;
    if end > data.len() {
        return Err(FontError::CorruptContainer(format!(
            "table {} extends past end of container",
            String::from_utf8_lossy(&entry.tag)
        )));
    }

    if comp_length < orig_length {
        // zlib stream: 2-byte header, then a raw deflate stream.
        if comp_length < 2 {
            return Err(FontError::CorruptContainer(
                "compressed table too short for zlib header".to_string(),
            ));
        }
        inflate(&data[start + 2..end], orig_length)
    } else {
        let end = start
            .checked_add(orig_length)
            .ok_or_else(|| FontError::CorruptContainer("table offset overflow".to_string()))?;
        if end > data.len() {
            return Err(FontError::CorruptContainer(format!(
                "table {} extends past end of container",
                String::from_utf8_lossy(&entry.tag)
            )));
        }
        Ok(data[start..end].to_vec())
    }
}

/// searchRange/entrySelector/rangeShift for a table count.
fn search_params(num_tables: u16) -> (u16, u16, u16) {
    if num_tables == 0 {
        return (0, 0, 0);
    }
    let count = num_tables as u32;
    let mut max_pow2 = 1u32;
    let mut entry_selector = 0u16;
    while max_pow2 * 2 <= count {
        max_pow2 *= 2;
        entry_selector += 1;
    }
    let search_range = max_pow2 * 16;
    let range_shift = count * 16 - search_range;
    (search_range as u16, entry_selector, range_shift as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inflate::tests::{BitWriter, fixed_lit_code};

    fn build_woff(tables: &[([u8; 4], Vec<u8>, u32)]) -> Vec<u8> {
        // tables: (tag, stored payload bytes, origLength)
        let mut w = FontWriter::new();
        let dir_end = 44 + 20 * tables.len() as u32;
        let mut sfnt_size = 12 + 16 * tables.len() as u32;
        for (_, _, orig) in tables {
            sfnt_size = (sfnt_size + orig + 3) & !3;
        }

        w.write_u32(WOFF_MAGIC);
        w.write_u32(0x00010000); // flavor
        w.write_u32(0); // length, unused here
        w.write_u16(tables.len() as u16);
        w.write_u16(0);
        w.write_u32(sfnt_size);
        w.write_u16(1);
        w.write_u16(0);
        for _ in 0..5 {
            w.write_u32(0); // meta/private fields
        }

        let mut offset = dir_end;
        for (tag, stored, orig) in tables {
            w.write_tag(tag);
            w.write_u32(offset);
            w.write_u32(stored.len() as u32);
            w.write_u32(*orig);
            w.write_u32(0);
            offset += stored.len() as u32;
        }
        for (_, stored, _) in tables {
            w.write_bytes(stored);
        }
        w.into_inner()
    }

    #[test]
    fn too_small_input() {
        assert!(matches!(
            unwrap_container(vec![0x77]),
            Err(FontError::InputTooSmall(1))
        ));
    }

    #[test]
    fn woff2_rejected() {
        let data = WOFF2_MAGIC.to_be_bytes().to_vec();
        assert!(matches!(
            unwrap_container(data),
            Err(FontError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn plain_sfnt_passes_through() {
        let data = vec![0x00, 0x01, 0x00, 0x00, 0xAA];
        assert_eq!(unwrap_container(data.clone()).unwrap(), data);
    }

    #[test]
    fn uncompressed_table_is_copied() {
        let payload = b"PAYLOAD!".to_vec();
        let woff = build_woff(&[(*b"test", payload.clone(), 8)]);
        let sfnt = unwrap_container(woff).unwrap();

        let mut r = FontReader::new(sfnt);
        assert_eq!(r.read_u32().unwrap(), 0x00010000);
        assert_eq!(r.read_u16().unwrap(), 1);
        assert_eq!(r.read_u16().unwrap(), 16); // searchRange
        assert_eq!(r.read_u16().unwrap(), 0); // entrySelector
        assert_eq!(r.read_u16().unwrap(), 0); // rangeShift
        assert_eq!(&r.read_tag().unwrap(), b"test");
        let _checksum = r.read_u32().unwrap();
        let offset = r.read_u32().unwrap() as usize;
        let length = r.read_u32().unwrap() as usize;
        assert_eq!((offset, length), (28, 8));
        r.set_position(offset).unwrap();
        assert_eq!(r.read_bytes(length).unwrap(), payload);
    }

    #[test]
    fn compressed_table_is_inflated() {
        // 'a' followed by a length-35 distance-1 copy: 36 bytes from a
        // 7-byte stream, so compLength < origLength holds.
        let payload = vec![b'a'; 36];
        let mut w = BitWriter::new();
        w.write_bits(1, 1);
        w.write_bits(1, 2);
        let (code, len) = fixed_lit_code(b'a' as u16);
        w.write_code(code, len);
        let (code, len) = fixed_lit_code(273); // length base 35
        w.write_code(code, len);
        w.write_bits(0, 3); // length extra
        w.write_code(0, 5); // distance 1
        let (code, len) = fixed_lit_code(256);
        w.write_code(code, len);

        let mut stored = vec![0x78, 0x9C]; // zlib header, skipped
        stored.extend(&w.bytes);
        assert!(stored.len() < payload.len());
        let woff = build_woff(&[(*b"name", stored, payload.len() as u32)]);
        let sfnt = unwrap_container(woff).unwrap();

        let mut r = FontReader::new(sfnt);
        r.set_position(12 + 8).unwrap();
        let offset = r.read_u32().unwrap() as usize;
        let length = r.read_u32().unwrap() as usize;
        r.set_position(offset).unwrap();
        assert_eq!(r.read_bytes(length).unwrap(), payload);
    }

    #[test]
    fn truncated_table_is_corrupt() {
        let mut woff = build_woff(&[(*b"test", b"12345678".to_vec(), 8)]);
        woff.truncate(woff.len() - 4);
        assert!(matches!(
            unwrap_container(woff),
            Err(FontError::CorruptContainer(_))
        ));
    }

    #[test]
    fn search_params_match_power_of_two() {
        assert_eq!(search_params(1), (16, 0, 0));
        assert_eq!(search_params(9), (128, 3, 16));
        assert_eq!(search_params(16), (256, 4, 0));
    }
}
