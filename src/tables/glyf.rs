use std::collections::{HashMap, HashSet};

use log::warn;

use crate::error::{FontError, Result};
use crate::stream::FontReader;
use crate::tables::loca::LocaTable;

/// A single outline point in font units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphPoint {
    pub x: i16,
    pub y: i16,
    pub on_curve: bool,
}

pub type Contour = Vec<GlyphPoint>;

/// A fully resolved TrueType outline: composite components flattened,
/// transforms applied.
#[derive(Debug, Clone)]
pub struct GlyphOutline {
    pub contours: Vec<Contour>,
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
}

/// GLYF table - Glyph data
#[derive(Debug, Clone)]
pub struct GlyfTable {
    glyphs: Vec<RawGlyph>,
}

#[derive(Debug, Clone)]
struct RawGlyph {
    x_min: i16,
    y_min: i16,
    x_max: i16,
    y_max: i16,
    shape: GlyphShape,
}

#[derive(Debug, Clone)]
enum GlyphShape {
    Empty,
    Simple(Vec<Contour>),
    Composite(Vec<GlyphComponent>),
}

/// One component reference of a composite glyph.
#[derive(Debug, Clone, Copy)]
pub struct GlyphComponent {
    pub glyph_index: u16,
    pub dx: f32,
    pub dy: f32,
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    /// Args were point indices for anchor matching (flag 0x02 clear).
    pub anchored: bool,
}

impl GlyphComponent {
    fn transform(&self, p: GlyphPoint) -> GlyphPoint {
        let x = p.x as f32;
        let y = p.y as f32;
        GlyphPoint {
            x: (self.a * x + self.c * y + self.dx).round() as i16,
            y: (self.b * x + self.d * y + self.dy).round() as i16,
            on_curve: p.on_curve,
        }
    }
}

const ARGS_ARE_WORDS: u16 = 0x0001;
const ARGS_ARE_XY: u16 = 0x0002;
const REPEAT_FLAG: u8 = 0x08;
const HAVE_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const HAVE_XY_SCALE: u16 = 0x0040;
const HAVE_2X2: u16 = 0x0080;

impl GlyfTable {
    pub fn from_reader(reader: &mut FontReader, loca: &LocaTable, num_glyphs: u16) -> Result<Self> {
        let mut glyphs = Vec::with_capacity(num_glyphs as usize);

        for gid in 0..num_glyphs {
            let offset = loca.offset(gid as usize)?;
            let next_offset = loca.offset(gid as usize + 1)?;

            if offset == next_offset {
                glyphs.push(RawGlyph {
                    x_min: 0,
                    y_min: 0,
                    x_max: 0,
                    y_max: 0,
                    shape: GlyphShape::Empty,
                });
                continue;
            }

            reader.set_position(offset as usize)?;
            let number_of_contours = reader.read_i16()?;
            let x_min = reader.read_i16()?;
            let y_min = reader.read_i16()?;
            let x_max = reader.read_i16()?;
            let y_max = reader.read_i16()?;

            let shape = if number_of_contours > 0 {
                GlyphShape::Simple(read_simple(reader, number_of_contours as usize)?)
            } else if number_of_contours < 0 {
                GlyphShape::Composite(read_components(reader)?)
            } else {
                GlyphShape::Empty
            };

            glyphs.push(RawGlyph {
                x_min,
                y_min,
                x_max,
                y_max,
                shape,
            });
        }

        Ok(GlyfTable { glyphs })
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

fn read_simple(reader: &mut FontReader, num_contours: usize) -> Result<Vec<Contour>> {
    let mut end_points = Vec::with_capacity(num_contours);
    for _ in 0..num_contours {
        end_points.push(reader.read_u16()?);
    }

    // Hinting instructions are skipped, never executed.
    let instruction_length = reader.read_u16()?;
    reader.skip(instruction_length as usize)?;

    let num_points = match end_points.last() {
        Some(&last) => last as usize + 1,
        None => 0,
    };

    let mut flags = Vec::with_capacity(num_points);
    while flags.len() < num_points {
        let flag = reader.read_u8()?;
        flags.push(flag);
        if flag & REPEAT_FLAG != 0 {
            let repeat = reader.read_u8()? as usize;
            for _ in 0..repeat {
                flags.push(flag);
            }
        }
    }
    flags.truncate(num_points);

    let mut xs = Vec::with_capacity(num_points);
    let mut x = 0i16;
    for &flag in &flags {
        if flag & 0x02 != 0 {
            let val = reader.read_u8()? as i16;
            x = x.wrapping_add(if flag & 0x10 != 0 { val } else { -val });
        } else if flag & 0x10 == 0 {
            x = x.wrapping_add(reader.read_i16()?);
        }
        xs.push(x);
    }

    let mut ys = Vec::with_capacity(num_points);
    let mut y = 0i16;
    for &flag in &flags {
        if flag & 0x04 != 0 {
            let val = reader.read_u8()? as i16;
            y = y.wrapping_add(if flag & 0x20 != 0 { val } else { -val });
        } else if flag & 0x20 == 0 {
            y = y.wrapping_add(reader.read_i16()?);
        }
        ys.push(y);
    }

    // Split into contours at the endpoint indices.
    let mut contours = Vec::with_capacity(num_contours);
    let mut start = 0usize;
    for &end in &end_points {
        let end = end as usize;
        if end + 1 < start || end >= num_points {
            return Err(FontError::Parse("glyf contour endpoints not increasing".into()));
        }
        let mut contour = Vec::with_capacity(end + 1 - start);
        for i in start..=end {
            contour.push(GlyphPoint {
                x: xs[i],
                y: ys[i],
                on_curve: flags[i] & 0x01 != 0,
            });
        }
        contours.push(contour);
        start = end + 1;
    }

    Ok(contours)
}

fn read_components(reader: &mut FontReader) -> Result<Vec<GlyphComponent>> {
    let mut components = Vec::new();

    loop {
        let flags = reader.read_u16()?;
        let glyph_index = reader.read_u16()?;

        let (arg1, arg2) = if flags & ARGS_ARE_WORDS != 0 {
            (reader.read_i16()?, reader.read_i16()?)
        } else {
            (reader.read_i8()? as i16, reader.read_i8()? as i16)
        };

        let (mut a, mut b, mut c, mut d) = (1.0f32, 0.0f32, 0.0f32, 1.0f32);
        if flags & HAVE_SCALE != 0 {
            let scale = reader.read_f2dot14()?;
            a = scale;
            d = scale;
        } else if flags & HAVE_XY_SCALE != 0 {
            a = reader.read_f2dot14()?;
            d = reader.read_f2dot14()?;
        } else if flags & HAVE_2X2 != 0 {
            a = reader.read_f2dot14()?;
            b = reader.read_f2dot14()?;
            c = reader.read_f2dot14()?;
            d = reader.read_f2dot14()?;
        }

        let anchored = flags & ARGS_ARE_XY == 0;
        let (dx, dy) = if anchored {
            (0.0, 0.0)
        } else {
            (arg1 as f32, arg2 as f32)
        };

        components.push(GlyphComponent {
            glyph_index,
            dx,
            dy,
            a,
            b,
            c,
            d,
            anchored,
        });

        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }

    Ok(components)
}

/// Resolves glyph outlines, flattening composites. Resolved component
/// contours are memoized since accent composites reuse base glyphs heavily;
/// in-progress marking turns reference cycles into errors.
pub struct OutlineResolver<'a> {
    glyf: &'a GlyfTable,
    cache: HashMap<u16, Vec<Contour>>,
    in_progress: HashSet<u16>,
}

impl<'a> OutlineResolver<'a> {
    pub fn new(glyf: &'a GlyfTable) -> Self {
        Self {
            glyf,
            cache: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    pub fn outline(&mut self, glyph_id: u16) -> Result<GlyphOutline> {
        let raw = self
            .glyf
            .glyphs
            .get(glyph_id as usize)
            .ok_or_else(|| FontError::Parse(format!("glyph {} out of range", glyph_id)))?;
        let (x_min, y_min, x_max, y_max) = (raw.x_min, raw.y_min, raw.x_max, raw.y_max);
        let contours = self.resolve(glyph_id)?;
        Ok(GlyphOutline {
            contours,
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    fn resolve(&mut self, glyph_id: u16) -> Result<Vec<Contour>> {
        if let Some(cached) = self.cache.get(&glyph_id) {
            return Ok(cached.clone());
        }
        if !self.in_progress.insert(glyph_id) {
            return Err(FontError::CompositeCycle(glyph_id));
        }

        let result = self.resolve_uncached(glyph_id);
        self.in_progress.remove(&glyph_id);

        let contours = result?;
        self.cache.insert(glyph_id, contours.clone());
        Ok(contours)
    }

    fn resolve_uncached(&mut self, glyph_id: u16) -> Result<Vec<Contour>> {
        let shape = self
            .glyf
            .glyphs
            .get(glyph_id as usize)
            .map(|raw| raw.shape.clone())
            .ok_or_else(|| FontError::Parse(format!("component glyph {} out of range", glyph_id)))?;

        match shape {
            GlyphShape::Empty => Ok(Vec::new()),
            GlyphShape::Simple(contours) => Ok(contours),
            GlyphShape::Composite(components) => {
                let mut all = Vec::new();
                for component in &components {
                    if component.anchored {
                        warn!(
                            "glyph {}: anchor-match component args approximated as zero offset",
                            glyph_id
                        );
                    }
                    let base = self.resolve(component.glyph_index)?;
                    for contour in &base {
                        all.push(contour.iter().map(|&p| component.transform(p)).collect());
                    }
                }
                Ok(all)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::stream::FontWriter;

    /// Simple one-contour glyph from on/off-curve points.
    pub(crate) fn simple_glyph_bytes(points: &[(i16, i16, bool)]) -> Vec<u8> {
        let mut w = FontWriter::new();
        w.write_i16(1); // one contour
        let xs: Vec<i16> = points.iter().map(|p| p.0).collect();
        let ys: Vec<i16> = points.iter().map(|p| p.1).collect();
        w.write_i16(*xs.iter().min().unwrap());
        w.write_i16(*ys.iter().min().unwrap());
        w.write_i16(*xs.iter().max().unwrap());
        w.write_i16(*ys.iter().max().unwrap());
        w.write_u16(points.len() as u16 - 1);
        w.write_u16(0); // no instructions
        for &(_, _, on_curve) in points {
            w.write_u8(if on_curve { 0x01 } else { 0x00 });
        }
        let mut prev = 0i16;
        for &x in &xs {
            w.write_i16(x - prev);
            prev = x;
        }
        prev = 0;
        for &y in &ys {
            w.write_i16(y - prev);
            prev = y;
        }
        w.into_inner()
    }

    fn table_for(glyph_blobs: &[Vec<u8>]) -> GlyfTable {
        let mut data = FontWriter::new();
        let mut offsets = vec![0u32];
        for blob in glyph_blobs {
            data.write_bytes(blob);
            data.write_padding(4);
            offsets.push(data.position() as u32);
        }
        let loca = LocaTable::Long(offsets);
        let mut reader = FontReader::new(data.into_inner());
        GlyfTable::from_reader(&mut reader, &loca, glyph_blobs.len() as u16).unwrap()
    }

    fn composite_bytes(entries: &[(u16, i16, i16, bool)]) -> Vec<u8> {
        // entries: (glyph_index, dx, dy, more)
        let mut w = FontWriter::new();
        w.write_i16(-1);
        for _ in 0..4 {
            w.write_i16(0);
        }
        for &(glyph_index, dx, dy, more) in entries {
            let mut flags = ARGS_ARE_WORDS | ARGS_ARE_XY;
            if more {
                flags |= MORE_COMPONENTS;
            }
            w.write_u16(flags);
            w.write_u16(glyph_index);
            w.write_i16(dx);
            w.write_i16(dy);
        }
        w.into_inner()
    }

    pub(crate) const SQUARE: [(i16, i16, bool); 4] = [
        (0, 0, true),
        (1000, 0, true),
        (1000, 1000, true),
        (0, 1000, true),
    ];

    #[test]
    fn simple_glyph_points_round_trip() {
        let table = table_for(&[simple_glyph_bytes(&SQUARE)]);
        let mut resolver = OutlineResolver::new(&table);
        let outline = resolver.outline(0).unwrap();
        assert_eq!(outline.contours.len(), 1);
        let pts: Vec<(i16, i16, bool)> = outline.contours[0]
            .iter()
            .map(|p| (p.x, p.y, p.on_curve))
            .collect();
        assert_eq!(pts, SQUARE);
        assert_eq!((outline.x_min, outline.y_max), (0, 1000));
    }

    #[test]
    fn repeat_flag_coordinates() {
        // Two points sharing one repeated flag byte.
        let mut w = FontWriter::new();
        w.write_i16(1);
        for _ in 0..4 {
            w.write_i16(0);
        }
        w.write_u16(1); // endpoint -> 2 points
        w.write_u16(0);
        w.write_u8(0x01 | REPEAT_FLAG);
        w.write_u8(1); // repeat once
        w.write_i16(10);
        w.write_i16(5);
        w.write_i16(20);
        w.write_i16(7);
        let table = table_for(&[w.into_inner()]);
        let mut resolver = OutlineResolver::new(&table);
        let outline = resolver.outline(0).unwrap();
        let pts: Vec<(i16, i16)> = outline.contours[0].iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(pts, vec![(10, 20), (15, 27)]);
    }

    #[test]
    fn composite_translation_equivalence() {
        let base = simple_glyph_bytes(&SQUARE);
        let composite = composite_bytes(&[(0, 50, -25, false)]);
        let table = table_for(&[base, composite]);
        let mut resolver = OutlineResolver::new(&table);

        let direct = resolver.outline(0).unwrap();
        let shifted = resolver.outline(1).unwrap();
        assert_eq!(direct.contours.len(), shifted.contours.len());
        for (a, b) in direct.contours[0].iter().zip(&shifted.contours[0]) {
            assert_eq!((a.x + 50, a.y - 25, a.on_curve), (b.x, b.y, b.on_curve));
        }
    }

    #[test]
    fn composite_cycle_detected() {
        // Glyphs 0 and 1 reference each other.
        let table = table_for(&[
            composite_bytes(&[(1, 0, 0, false)]),
            composite_bytes(&[(0, 0, 0, false)]),
        ]);
        let mut resolver = OutlineResolver::new(&table);
        assert!(matches!(
            resolver.outline(0),
            Err(FontError::CompositeCycle(_))
        ));
        // The resolver stays usable for other glyphs afterwards.
        assert!(matches!(
            resolver.outline(1),
            Err(FontError::CompositeCycle(_))
        ));
    }

    #[test]
    fn nested_composite_with_transform() {
        let base = simple_glyph_bytes(&[(100, 0, true), (200, 50, true)]);
        // Scale-by-half component via HAVE_SCALE.
        let mut w = FontWriter::new();
        w.write_i16(-1);
        for _ in 0..4 {
            w.write_i16(0);
        }
        w.write_u16(ARGS_ARE_WORDS | ARGS_ARE_XY | HAVE_SCALE);
        w.write_u16(0);
        w.write_i16(10);
        w.write_i16(10);
        w.write_i16(0x2000); // 0.5 in F2Dot14
        let table = table_for(&[base, w.into_inner()]);
        let mut resolver = OutlineResolver::new(&table);
        let outline = resolver.outline(1).unwrap();
        let pts: Vec<(i16, i16)> = outline.contours[0].iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(pts, vec![(60, 10), (110, 35)]);
    }
}
