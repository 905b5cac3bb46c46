use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::cff::CffFont;
use crate::cff::charstring::execute_charstring;
use crate::error::{FontError, Result};
use crate::font::Font;
use crate::outline::{cff_commands, truetype_commands};
use crate::tables::glyf::{GlyfTable, OutlineResolver};
use crate::tables::name::NameRecord;
use crate::tables::post::PostTable;

/// Options recognized by the parse entry point.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Restrict the output to these characters. `None` emits every mapped
    /// codepoint.
    pub characters: Option<Vec<char>>,
    /// With no character list the full mapped set is emitted either way;
    /// the flag is kept for call-site compatibility.
    pub restrict_char_set: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            characters: None,
            restrict_char_set: true,
        }
    }
}

/// One output glyph: advance width and outline commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlyphRecord {
    pub ha: i32,
    pub o: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(rename = "xMin")]
    pub x_min: i32,
    #[serde(rename = "yMin")]
    pub y_min: i32,
    #[serde(rename = "xMax")]
    pub x_max: i32,
    #[serde(rename = "yMax")]
    pub y_max: i32,
}

/// Provenance strings lifted from the name table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontInfo {
    pub format: String,
    #[serde(rename = "fontFamily", skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(rename = "fontSubfamily", skip_serializing_if = "Option::is_none")]
    pub font_subfamily: Option<String>,
    #[serde(rename = "fullName", skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(rename = "postScriptName", skip_serializing_if = "Option::is_none")]
    pub postscript_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    #[serde(rename = "convertedGlyphs")]
    pub converted_glyphs: u32,
    #[serde(rename = "errorGlyphs")]
    pub error_glyphs: u32,
    #[serde(rename = "totalMapped")]
    pub total_mapped: u32,
    #[serde(rename = "type")]
    pub format: String,
}

/// The language-neutral typeface record. Key names are normative for
/// downstream consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypefaceRecord {
    pub glyphs: BTreeMap<String, GlyphRecord>,
    #[serde(rename = "familyName")]
    pub family_name: String,
    pub ascender: i32,
    pub descender: i32,
    #[serde(rename = "underlinePosition")]
    pub underline_position: i32,
    #[serde(rename = "underlineThickness")]
    pub underline_thickness: i32,
    #[serde(rename = "boundingBox")]
    pub bounding_box: BoundingBox,
    pub resolution: i32,
    pub kerning: BTreeMap<String, BTreeMap<String, i32>>,
    pub original_font_information: FontInfo,
    #[serde(rename = "_meta")]
    pub meta: RecordMeta,
}

impl TypefaceRecord {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| FontError::Parse(e.to_string()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| FontError::Parse(e.to_string()))
    }
}

/// Convert a font binary into a typeface record.
pub fn parse_typeface(data: Vec<u8>, options: &ParseOptions) -> Result<TypefaceRecord> {
    let font = Font::from_data(data)?;
    build_record(&font, options)
}

enum OutlineSource<'a> {
    TrueType(OutlineResolver<'a>),
    Cff(Box<CffFont>),
}

fn build_record(font: &Font, options: &ParseOptions) -> Result<TypefaceRecord> {
    let head = font.head_table()?;
    let hhea = font.hhea_table()?;
    let hmtx = font.hmtx_table()?;
    let cmap = font.cmap_table()?;
    let name = font.name_table().ok();
    let post = font.post_table().ok();

    let format = font.outline_format().ok_or_else(|| {
        FontError::UnsupportedFormat("font has neither glyf nor CFF/CFF2 outlines".to_string())
    })?;

    let glyf_storage: GlyfTable;
    let mut source = match format {
        "TrueType" => {
            glyf_storage = font.glyf_table()?;
            OutlineSource::TrueType(OutlineResolver::new(&glyf_storage))
        }
        _ => OutlineSource::Cff(Box::new(font.cff_font()?)),
    };

    // Reverse map glyph id -> codepoint; iteration order makes the lowest
    // codepoint win for multiply-mapped glyphs.
    let mut reverse: BTreeMap<u16, u32> = BTreeMap::new();
    for (&codepoint, &glyph_id) in &cmap.mappings {
        reverse.entry(glyph_id).or_insert(codepoint);
    }

    let glyph_kerning = extract_kerning(font);

    let requested: Vec<u32> = match &options.characters {
        Some(chars) => chars.iter().map(|&c| c as u32).collect(),
        None => cmap.mappings.keys().copied().collect(),
    };

    let mut glyphs = BTreeMap::new();
    let mut converted_glyphs = 0u32;
    let mut error_glyphs = 0u32;
    for codepoint in requested {
        let Some(glyph_id) = cmap.glyph_id(codepoint) else {
            continue;
        };
        let Some(character) = char::from_u32(codepoint) else {
            continue;
        };
        let ha = hmtx.advance_width(glyph_id) as i32;

        let commands = match &mut source {
            OutlineSource::TrueType(resolver) => resolver
                .outline(glyph_id)
                .map(|outline| truetype_commands(&outline.contours)),
            OutlineSource::Cff(cff) => {
                execute_charstring(cff, glyph_id).map(|path| cff_commands(&path.commands))
            }
        };

        let o = match commands {
            Ok(o) => {
                converted_glyphs += 1;
                o
            }
            Err(err) => {
                // Glyph-level failures keep the entry with empty commands.
                warn!("glyph {} (U+{:04X}): {}", glyph_id, codepoint, err);
                error_glyphs += 1;
                String::new()
            }
        };
        glyphs.insert(character.to_string(), GlyphRecord { ha, o });
    }

    // Project glyph-pair kerning onto codepoint pairs; entries whose
    // characters did not make it into the output are dropped.
    let mut kerning: BTreeMap<String, BTreeMap<String, i32>> = BTreeMap::new();
    for (first_glyph, seconds) in &glyph_kerning {
        let Some(first) = char_key(&reverse, *first_glyph) else {
            continue;
        };
        if !glyphs.contains_key(&first) {
            continue;
        }
        for (second_glyph, &value) in seconds {
            let Some(second) = char_key(&reverse, *second_glyph) else {
                continue;
            };
            if !glyphs.contains_key(&second) {
                continue;
            }
            kerning
                .entry(first.clone())
                .or_default()
                .insert(second, value as i32);
        }
    }
    kerning.retain(|_, seconds| !seconds.is_empty());

    let (underline_position, underline_thickness) = match &post {
        Some(post) => (post.underline_position, post.underline_thickness),
        None => PostTable::default_underline(head.units_per_em),
    };

    let family_name = name
        .as_ref()
        .and_then(|n| n.family_name())
        .unwrap_or_else(|| "Unknown".to_string());

    let original_font_information = FontInfo {
        format: format.to_string(),
        font_family: name.as_ref().and_then(|n| n.string(NameRecord::FONT_FAMILY_NAME)),
        font_subfamily: name
            .as_ref()
            .and_then(|n| n.string(NameRecord::FONT_SUBFAMILY_NAME)),
        full_name: name.as_ref().and_then(|n| n.string(NameRecord::FULL_FONT_NAME)),
        postscript_name: name.as_ref().and_then(|n| n.postscript_name()),
        version: name.as_ref().and_then(|n| n.string(NameRecord::VERSION_STRING)),
        copyright: name
            .as_ref()
            .and_then(|n| n.string(NameRecord::COPYRIGHT_NOTICE)),
        designer: name.as_ref().and_then(|n| n.string(NameRecord::DESIGNER)),
    };

    Ok(TypefaceRecord {
        glyphs,
        family_name,
        ascender: hhea.ascent as i32,
        descender: hhea.descent as i32,
        underline_position: underline_position as i32,
        underline_thickness: underline_thickness as i32,
        bounding_box: BoundingBox {
            x_min: head.x_min as i32,
            y_min: head.y_min as i32,
            x_max: head.x_max as i32,
            y_max: head.y_max as i32,
        },
        resolution: head.units_per_em as i32,
        kerning,
        original_font_information,
        meta: RecordMeta {
            converted_glyphs,
            error_glyphs,
            total_mapped: cmap.len() as u32,
            format: format.to_string(),
        },
    })
}

fn char_key(reverse: &BTreeMap<u16, u32>, glyph_id: u16) -> Option<String> {
    let codepoint = reverse.get(&glyph_id)?;
    char::from_u32(*codepoint).map(|c| c.to_string())
}

/// GPOS wins whenever it yields pairs; the legacy kern table is the
/// fallback. Kerning failures drop kerning, never the parse.
fn extract_kerning(font: &Font) -> BTreeMap<u16, BTreeMap<u16, i16>> {
    if font.has_table(b"GPOS") {
        if let Ok(gpos) = font.gpos_table() {
            if !gpos.pairs.is_empty() {
                return gpos.pairs;
            }
        }
    }
    if font.has_table(b"kern") {
        if let Ok(kern) = font.kern_table() {
            return kern.pairs;
        }
    }
    BTreeMap::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = ParseOptions::default();
        assert!(options.characters.is_none());
        assert!(options.restrict_char_set);
    }

    #[test]
    fn record_json_round_trip() {
        let mut glyphs = BTreeMap::new();
        glyphs.insert(
            "A".to_string(),
            GlyphRecord {
                ha: 600,
                o: "m 0 0 l 10 0".to_string(),
            },
        );
        let record = TypefaceRecord {
            glyphs,
            family_name: "Test".to_string(),
            ascender: 800,
            descender: -200,
            underline_position: -100,
            underline_thickness: 50,
            bounding_box: BoundingBox {
                x_min: 0,
                y_min: -200,
                x_max: 1000,
                y_max: 800,
            },
            resolution: 1000,
            kerning: BTreeMap::new(),
            original_font_information: FontInfo {
                format: "TrueType".to_string(),
                ..FontInfo::default()
            },
            meta: RecordMeta {
                converted_glyphs: 1,
                error_glyphs: 0,
                total_mapped: 1,
                format: "TrueType".to_string(),
            },
        };

        let json = record.to_json().unwrap();
        assert!(json.contains("\"familyName\""));
        assert!(json.contains("\"underlinePosition\""));
        assert!(json.contains("\"_meta\""));
        assert!(json.contains("\"convertedGlyphs\""));
        let back = TypefaceRecord::from_json(&json).unwrap();
        assert_eq!(back, record);
    }
}
