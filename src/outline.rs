use crate::cff::charstring::PathCommand;
use crate::tables::glyf::{Contour, GlyphPoint};

/// Lower TrueType contours into the `m`/`l`/`q` command string.
pub fn truetype_commands(contours: &[Contour]) -> String {
    let mut tokens = Vec::new();
    for contour in contours {
        lower_contour(contour, &mut tokens);
    }
    tokens.join(" ")
}

fn midpoint(a: GlyphPoint, b: GlyphPoint) -> (i32, i32) {
    (
        ((a.x as i32 + b.x as i32) as f64 / 2.0).round() as i32,
        ((a.y as i32 + b.y as i32) as f64 / 2.0).round() as i32,
    )
}

/// Ring traversal over one contour. The start point is the first on-curve
/// point, or the implied midpoint of the last and first points when every
/// point is off-curve; either way the ring closes back onto it.
fn lower_contour(points: &[GlyphPoint], tokens: &mut Vec<String>) {
    let n = points.len();
    if n == 0 {
        return;
    }

    let first_on = points.iter().position(|p| p.on_curve);
    let (start, mut remaining) = match first_on {
        Some(f) => {
            let p = points[f];
            tokens.push(format!("m {} {}", p.x, p.y));
            (f + 1, n as i32 - 1)
        }
        None => {
            let (mx, my) = midpoint(points[n - 1], points[0]);
            tokens.push(format!("m {} {}", mx, my));
            (0, n as i32)
        }
    };

    let mut i = start;
    while remaining > 0 {
        let p = points[i % n];
        if p.on_curve {
            tokens.push(format!("l {} {}", p.x, p.y));
            i += 1;
            remaining -= 1;
        } else {
            let next = points[(i + 1) % n];
            if next.on_curve {
                tokens.push(format!("q {} {} {} {}", p.x, p.y, next.x, next.y));
                i += 2;
                remaining -= 2;
            } else {
                let (mx, my) = midpoint(p, next);
                tokens.push(format!("q {} {} {} {}", p.x, p.y, mx, my));
                i += 1;
                remaining -= 1;
            }
        }
    }
}

/// Lower an interpreted CFF path into the `m`/`l`/`b` command string.
/// Closing is implicit in the grammar, so `Close` emits nothing.
pub fn cff_commands(commands: &[PathCommand]) -> String {
    let mut tokens = Vec::new();
    for command in commands {
        match *command {
            PathCommand::Move(x, y) => {
                tokens.push(format!("m {} {}", fmt_coord(x), fmt_coord(y)));
            }
            PathCommand::Line(x, y) => {
                tokens.push(format!("l {} {}", fmt_coord(x), fmt_coord(y)));
            }
            PathCommand::Cubic(c1x, c1y, c2x, c2y, x, y) => {
                tokens.push(format!(
                    "b {} {} {} {} {} {}",
                    fmt_coord(c1x),
                    fmt_coord(c1y),
                    fmt_coord(c2x),
                    fmt_coord(c2y),
                    fmt_coord(x),
                    fmt_coord(y)
                ));
            }
            PathCommand::Close => {}
        }
    }
    tokens.join(" ")
}

/// Integral coordinates print as integers; anything else keeps full
/// precision.
fn fmt_coord(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 9.0e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}
