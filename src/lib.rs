// typeface-rs: A Rust library for converting font binaries into typeface records

mod cff;
mod error;
mod font;
mod inflate;
mod outline;
mod shape;
mod stream;
mod tables;
mod typeface;
mod woff;

pub use cff::CffFont;
pub use cff::charstring::{GlyphPath, PathCommand, execute_charstring};
pub use error::{FontError, Result};
pub use font::Font;
pub use shape::{CharShape, ContourSet, ShapeOptions, build_text_shapes};
pub use stream::{FontReader, FontWriter};
pub use tables::{
    FontTable, TableRecord,
    cmap::CmapTable,
    glyf::{Contour, GlyfTable, GlyphOutline, GlyphPoint, OutlineResolver},
    gpos::GposTable,
    head::HeadTable,
    hhea::HheaTable,
    hmtx::HmtxTable,
    kern::KernTable,
    loca::LocaTable,
    maxp::MaxpTable,
    name::{NameRecord, NameTable},
    os2::Os2Table,
    post::PostTable,
};
pub use typeface::{
    BoundingBox, FontInfo, GlyphRecord, ParseOptions, RecordMeta, TypefaceRecord, parse_typeface,
};
pub use woff::unwrap_container;
