use crate::typeface::TypefaceRecord;

pub type Point2 = (f64, f64);

/// Options for the shape builder.
#[derive(Debug, Clone)]
pub struct ShapeOptions {
    /// Sample steps per quadratic/cubic curve.
    pub curve_segments: u32,
    /// Invert the outer/hole classification.
    pub reverse_winding: bool,
}

impl Default for ShapeOptions {
    fn default() -> Self {
        Self {
            curve_segments: 12,
            reverse_winding: false,
        }
    }
}

/// One closed outer contour with the holes punched into it.
#[derive(Debug, Clone)]
pub struct ContourSet {
    pub outline: Vec<Point2>,
    pub holes: Vec<Vec<Point2>>,
}

/// Tessellated contours for one character, placed at its pen offset.
#[derive(Debug, Clone)]
pub struct CharShape {
    pub character: char,
    pub offset_x: f64,
    pub advance: f64,
    pub contours: Vec<ContourSet>,
}

/// Tessellate a text string against a typeface record. Characters without
/// an output glyph are skipped; advances include kerning to the following
/// character.
pub fn build_text_shapes(
    record: &TypefaceRecord,
    text: &str,
    options: &ShapeOptions,
) -> Vec<CharShape> {
    let characters: Vec<char> = text.chars().collect();
    let mut shapes = Vec::new();
    let mut pen = 0.0f64;

    for (i, &character) in characters.iter().enumerate() {
        let key = character.to_string();
        let Some(glyph) = record.glyphs.get(&key) else {
            continue;
        };

        let mut subpaths = tessellate(&glyph.o, options.curve_segments);
        for subpath in &mut subpaths {
            for point in subpath.iter_mut() {
                point.0 += pen;
            }
        }
        let contours = assign_holes(subpaths, options.reverse_winding);

        let mut advance = glyph.ha as f64;
        if let Some(next) = characters.get(i + 1) {
            if let Some(adjust) = record
                .kerning
                .get(&key)
                .and_then(|seconds| seconds.get(&next.to_string()))
            {
                advance += *adjust as f64;
            }
        }

        shapes.push(CharShape {
            character,
            offset_x: pen,
            advance,
            contours,
        });
        pen += advance;
    }

    shapes
}

/// Sample a command string into polygonal subpaths.
fn tessellate(commands: &str, curve_segments: u32) -> Vec<Vec<Point2>> {
    fn next_number(tokens: &mut std::str::SplitWhitespace) -> Option<f64> {
        tokens.next().and_then(|t| t.parse().ok())
    }

    let segments = curve_segments.max(1);
    let mut tokens = commands.split_whitespace();
    let mut subpaths = Vec::new();
    let mut current: Vec<Point2> = Vec::new();
    let mut pen: Point2 = (0.0, 0.0);

    while let Some(token) = tokens.next() {
        match token {
            "m" => {
                if !current.is_empty() {
                    subpaths.push(std::mem::take(&mut current));
                }
                let (Some(x), Some(y)) = (next_number(&mut tokens), next_number(&mut tokens))
                else {
                    break;
                };
                pen = (x, y);
                current.push(pen);
            }
            "l" => {
                let (Some(x), Some(y)) = (next_number(&mut tokens), next_number(&mut tokens))
                else {
                    break;
                };
                pen = (x, y);
                current.push(pen);
            }
            "q" => {
                let (Some(cx), Some(cy), Some(x), Some(y)) = (
                    next_number(&mut tokens),
                    next_number(&mut tokens),
                    next_number(&mut tokens),
                    next_number(&mut tokens),
                ) else {
                    break;
                };
                for step in 1..=segments {
                    let t = step as f64 / segments as f64;
                    current.push(quadratic_point(pen, (cx, cy), (x, y), t));
                }
                pen = (x, y);
            }
            "b" => {
                let (Some(c1x), Some(c1y), Some(c2x), Some(c2y), Some(x), Some(y)) = (
                    next_number(&mut tokens),
                    next_number(&mut tokens),
                    next_number(&mut tokens),
                    next_number(&mut tokens),
                    next_number(&mut tokens),
                    next_number(&mut tokens),
                ) else {
                    break;
                };
                for step in 1..=segments {
                    let t = step as f64 / segments as f64;
                    current.push(cubic_point(pen, (c1x, c1y), (c2x, c2y), (x, y), t));
                }
                pen = (x, y);
            }
            _ => {}
        }
    }
    if !current.is_empty() {
        subpaths.push(current);
    }
    subpaths
}

fn lerp(a: Point2, b: Point2, t: f64) -> Point2 {
    (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t)
}

/// De Casteljau evaluation of a quadratic.
fn quadratic_point(p0: Point2, control: Point2, p1: Point2, t: f64) -> Point2 {
    let a = lerp(p0, control, t);
    let b = lerp(control, p1, t);
    lerp(a, b, t)
}

/// De Casteljau evaluation of a cubic.
fn cubic_point(p0: Point2, c1: Point2, c2: Point2, p1: Point2, t: f64) -> Point2 {
    let a = lerp(p0, c1, t);
    let b = lerp(c1, c2, t);
    let c = lerp(c2, p1, t);
    let ab = lerp(a, b, t);
    let bc = lerp(b, c, t);
    lerp(ab, bc, t)
}

/// Shoelace signed area; positive for counter-clockwise rings.
fn signed_area(path: &[Point2]) -> f64 {
    let mut sum = 0.0;
    for i in 0..path.len() {
        let (x0, y0) = path[i];
        let (x1, y1) = path[(i + 1) % path.len()];
        sum += x0 * y1 - x1 * y0;
    }
    sum / 2.0
}

/// Crossing-number point-in-polygon test.
fn contains_point(polygon: &[Point2], point: Point2) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];
        if (yi > point.1) != (yj > point.1)
            && point.0 < (xj - xi) * (point.1 - yi) / (yj - yi) + xi
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Classify subpaths as outers or holes by the winding of the
/// largest-area subpath, then nest each hole inside the smallest outer
/// containing its first sampled point.
fn assign_holes(subpaths: Vec<Vec<Point2>>, reverse_winding: bool) -> Vec<ContourSet> {
    let areas: Vec<f64> = subpaths.iter().map(|p| signed_area(p)).collect();
    let Some(dominant) = areas
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
        .map(|(i, _)| i)
    else {
        return Vec::new();
    };

    let mut outer_positive = areas[dominant] >= 0.0;
    if reverse_winding {
        outer_positive = !outer_positive;
    }

    let mut sets: Vec<(f64, ContourSet)> = Vec::new();
    let mut holes: Vec<Vec<Point2>> = Vec::new();
    for (path, area) in subpaths.into_iter().zip(&areas) {
        if (*area >= 0.0) == outer_positive {
            sets.push((
                area.abs(),
                ContourSet {
                    outline: path,
                    holes: Vec::new(),
                },
            ));
        } else {
            holes.push(path);
        }
    }

    for hole in holes {
        let Some(&probe) = hole.first() else {
            continue;
        };
        let owner = sets
            .iter_mut()
            .filter(|(_, set)| contains_point(&set.outline, probe))
            .min_by(|a, b| a.0.total_cmp(&b.0));
        if let Some((_, set)) = owner {
            set.holes.push(hole);
        }
        // A hole outside every outer is dropped.
    }

    sets.into_iter().map(|(_, set)| set).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typeface::{BoundingBox, FontInfo, GlyphRecord, RecordMeta};
    use std::collections::BTreeMap;

    fn record_with(glyphs: &[(&str, i32, &str)], kerning: &[(&str, &str, i32)]) -> TypefaceRecord {
        let mut glyph_map = BTreeMap::new();
        for &(ch, ha, o) in glyphs {
            glyph_map.insert(
                ch.to_string(),
                GlyphRecord {
                    ha,
                    o: o.to_string(),
                },
            );
        }
        let mut kern_map: BTreeMap<String, BTreeMap<String, i32>> = BTreeMap::new();
        for &(a, b, v) in kerning {
            kern_map
                .entry(a.to_string())
                .or_default()
                .insert(b.to_string(), v);
        }
        TypefaceRecord {
            glyphs: glyph_map,
            family_name: "Fixture".to_string(),
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
            kerning: kern_map,
            original_font_information: FontInfo::default(),
            meta: RecordMeta {
                converted_glyphs: glyphs.len() as u32,
                error_glyphs: 0,
                total_mapped: glyphs.len() as u32,
                format: "TrueType".to_string(),
            },
        }
    }

    const SQUARE_WITH_HOLE: &str =
        "m 0 0 l 100 0 l 100 100 l 0 100 m 25 25 l 25 75 l 75 75 l 75 25";

    #[test]
    fn hole_nests_inside_outer() {
        let record = record_with(&[("O", 120, SQUARE_WITH_HOLE)], &[]);
        let shapes = build_text_shapes(&record, "O", &ShapeOptions::default());
        assert_eq!(shapes.len(), 1);
        assert_eq!(shapes[0].contours.len(), 1);
        let set = &shapes[0].contours[0];
        assert_eq!(set.outline.len(), 4);
        assert_eq!(set.holes.len(), 1);
        assert_eq!(set.holes[0][0], (25.0, 25.0));
    }

    #[test]
    fn reverse_winding_flips_classification() {
        let record = record_with(&[("O", 120, SQUARE_WITH_HOLE)], &[]);
        let options = ShapeOptions {
            reverse_winding: true,
            ..ShapeOptions::default()
        };
        let shapes = build_text_shapes(&record, "O", &options);
        // The inner square is now the outer; the big ring has no owner.
        assert_eq!(shapes[0].contours.len(), 1);
        assert_eq!(shapes[0].contours[0].outline[0], (25.0, 25.0));
        assert!(shapes[0].contours[0].holes.is_empty());
    }

    #[test]
    fn curves_are_sampled() {
        let record = record_with(&[("n", 100, "m 0 0 q 50 100 100 0")], &[]);
        let options = ShapeOptions {
            curve_segments: 4,
            ..ShapeOptions::default()
        };
        let shapes = build_text_shapes(&record, "n", &options);
        let outline = &shapes[0].contours[0].outline;
        // Start point plus four samples.
        assert_eq!(outline.len(), 5);
        assert_eq!(outline[0], (0.0, 0.0));
        // De Casteljau midpoint of the quadratic.
        assert_eq!(outline[2], (50.0, 50.0));
        assert_eq!(outline[4], (100.0, 0.0));
    }

    #[test]
    fn advances_include_kerning() {
        let square = "m 0 0 l 10 0 l 10 10 l 0 10";
        let record = record_with(
            &[("A", 600, square), ("V", 650, square)],
            &[("A", "V", -80)],
        );
        let shapes = build_text_shapes(&record, "AV", &ShapeOptions::default());
        assert_eq!(shapes[0].advance, 520.0);
        assert_eq!(shapes[1].offset_x, 520.0);
        assert_eq!(shapes[1].advance, 650.0);
        // The second character's points carry the pen offset.
        assert_eq!(shapes[1].contours[0].outline[0], (520.0, 0.0));
    }

    #[test]
    fn missing_characters_are_skipped() {
        let record = record_with(&[("A", 600, "m 0 0 l 10 0 l 10 10")], &[]);
        let shapes = build_text_shapes(&record, "AZA", &ShapeOptions::default());
        assert_eq!(shapes.len(), 2);
        assert_eq!(shapes[1].offset_x, 600.0);
    }
}
