use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;

use crate::cff::CffFont;
use crate::cff::index::Index;
use crate::error::{FontError, Result};

// Type 2 limits, Adobe Technical Note #5177 Appendix B.
const STACK_LIMIT: usize = 513;
const CALL_STACK_LIMIT: usize = 10;
const TRANSIENT_SLOTS: usize = 32;

static PUT_GET_SEEN: AtomicBool = AtomicBool::new(false);

/// Absolute-coordinate path command emitted by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    Move(f64, f64),
    Line(f64, f64),
    Cubic(f64, f64, f64, f64, f64, f64),
    Close,
}

/// The interpreted outline of one glyph.
#[derive(Debug, Clone)]
pub struct GlyphPath {
    pub commands: Vec<PathCommand>,
    pub width: f64,
}

/// Run the CharString of `glyph_id` through the Type 2 VM.
pub fn execute_charstring(font: &CffFont, glyph_id: u16) -> Result<GlyphPath> {
    let code = font
        .char_strings
        .get(glyph_id as usize)
        .ok_or_else(|| FontError::Parse(format!("no charstring for glyph {}", glyph_id)))?;
    let fd = font.fd_index(glyph_id);

    let mut interp = Interpreter {
        stack: Vec::new(),
        x: 0.0,
        y: 0.0,
        commands: Vec::new(),
        n_stems: 0,
        width: None,
        // CFF2 charstrings carry no width prefix at all.
        have_width: font.is_cff2,
        open: false,
        transient: [0.0; TRANSIENT_SLOTS],
        global_subrs: &font.global_subrs,
        local_subrs: font.local_subrs.get(fd).and_then(|s| s.as_ref()),
        default_width_x: font.default_width_x.get(fd).copied().unwrap_or(0.0),
        nominal_width_x: font.nominal_width_x.get(fd).copied().unwrap_or(0.0),
        is_cff2: font.is_cff2,
        num_regions: font.num_regions,
    };
    interp.run(code)?;

    let width = interp.width.unwrap_or(interp.default_width_x);
    Ok(GlyphPath {
        commands: interp.commands,
        width,
    })
}

struct Interpreter<'a> {
    // One operand stack shared across all subroutine calls.
    stack: Vec<f64>,
    x: f64,
    y: f64,
    commands: Vec<PathCommand>,
    n_stems: usize,
    width: Option<f64>,
    have_width: bool,
    open: bool,
    transient: [f64; TRANSIENT_SLOTS],
    global_subrs: &'a Index,
    local_subrs: Option<&'a Index>,
    default_width_x: f64,
    nominal_width_x: f64,
    is_cff2: bool,
    num_regions: u16,
}

impl<'a> Interpreter<'a> {
    fn run(&mut self, code: &'a [u8]) -> Result<()> {
        let mut data = code;
        let mut ip = 0usize;
        let mut call_stack: Vec<(&'a [u8], usize)> = Vec::new();

        loop {
            if ip >= data.len() {
                // Implicit return at the end of a subroutine; halt at the
                // end of the outermost charstring.
                match call_stack.pop() {
                    Some(frame) => (data, ip) = frame,
                    None => break,
                }
                continue;
            }

            let b0 = data[ip];
            ip += 1;
            match b0 {
                28 => {
                    let bytes = operand_bytes(data, ip, 2)?;
                    self.push(i16::from_be_bytes([bytes[0], bytes[1]]) as f64)?;
                    ip += 2;
                }
                32..=246 => self.push(b0 as f64 - 139.0)?,
                247..=250 => {
                    let b1 = *data.get(ip).ok_or_else(truncated)?;
                    self.push((b0 as i32 - 247) as f64 * 256.0 + b1 as f64 + 108.0)?;
                    ip += 1;
                }
                251..=254 => {
                    let b1 = *data.get(ip).ok_or_else(truncated)?;
                    self.push(-(b0 as i32 - 251) as f64 * 256.0 - b1 as f64 - 108.0)?;
                    ip += 1;
                }
                255 => {
                    let bytes = operand_bytes(data, ip, 4)?;
                    let fixed = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                    self.push(fixed as f64 / 65536.0)?;
                    ip += 4;
                }

                1 | 3 | 18 | 23 => self.stems(), // hstem vstem hstemhm vstemhm
                19 | 20 => {
                    // hintmask / cntrmask: residual pairs are implicit
                    // vstems, then the mask bytes follow in the stream.
                    self.stems();
                    ip += self.n_stems.div_ceil(8);
                }

                21 => {
                    // rmoveto
                    self.take_width(2);
                    let (dx, dy) = self.top2();
                    self.move_to(dx, dy);
                    self.stack.clear();
                }
                22 => {
                    // hmoveto
                    self.take_width(1);
                    let dx = self.top1();
                    self.move_to(dx, 0.0);
                    self.stack.clear();
                }
                4 => {
                    // vmoveto
                    self.take_width(1);
                    let dy = self.top1();
                    self.move_to(0.0, dy);
                    self.stack.clear();
                }

                5 => {
                    // rlineto
                    let operands = std::mem::take(&mut self.stack);
                    for pair in operands.chunks_exact(2) {
                        self.line_to(pair[0], pair[1]);
                    }
                }
                6 | 7 => {
                    // hlineto / vlineto: axes alternate
                    let operands = std::mem::take(&mut self.stack);
                    let mut horizontal = b0 == 6;
                    for &delta in &operands {
                        if horizontal {
                            self.line_to(delta, 0.0);
                        } else {
                            self.line_to(0.0, delta);
                        }
                        horizontal = !horizontal;
                    }
                }

                8 => {
                    // rrcurveto
                    let operands = std::mem::take(&mut self.stack);
                    for c in operands.chunks_exact(6) {
                        self.curve_to(c[0], c[1], c[2], c[3], c[4], c[5]);
                    }
                }
                24 => {
                    // rcurveline: curves, then one line
                    let operands = std::mem::take(&mut self.stack);
                    let curve_end = operands.len().saturating_sub(2);
                    let mut i = 0;
                    while i + 6 <= curve_end {
                        self.curve_to(
                            operands[i],
                            operands[i + 1],
                            operands[i + 2],
                            operands[i + 3],
                            operands[i + 4],
                            operands[i + 5],
                        );
                        i += 6;
                    }
                    if i + 2 <= operands.len() {
                        self.line_to(operands[i], operands[i + 1]);
                    }
                }
                25 => {
                    // rlinecurve: lines, then one curve
                    let operands = std::mem::take(&mut self.stack);
                    let line_end = operands.len().saturating_sub(6);
                    let mut i = 0;
                    while i + 2 <= line_end {
                        self.line_to(operands[i], operands[i + 1]);
                        i += 2;
                    }
                    if i + 6 <= operands.len() {
                        self.curve_to(
                            operands[i],
                            operands[i + 1],
                            operands[i + 2],
                            operands[i + 3],
                            operands[i + 4],
                            operands[i + 5],
                        );
                    }
                }
                26 => {
                    // vvcurveto: dx1? {dya dxb dyb dyc}+
                    let operands = std::mem::take(&mut self.stack);
                    let mut i = 0;
                    let mut dx1 = 0.0;
                    if operands.len() % 4 != 0 && !operands.is_empty() {
                        dx1 = operands[0];
                        i = 1;
                    }
                    while i + 4 <= operands.len() {
                        self.curve_to(dx1, operands[i], operands[i + 1], operands[i + 2], 0.0, operands[i + 3]);
                        dx1 = 0.0;
                        i += 4;
                    }
                }
                27 => {
                    // hhcurveto: dy1? {dxa dxb dyb dxc}+
                    let operands = std::mem::take(&mut self.stack);
                    let mut i = 0;
                    let mut dy1 = 0.0;
                    if operands.len() % 4 != 0 && !operands.is_empty() {
                        dy1 = operands[0];
                        i = 1;
                    }
                    while i + 4 <= operands.len() {
                        self.curve_to(operands[i], dy1, operands[i + 1], operands[i + 2], operands[i + 3], 0.0);
                        dy1 = 0.0;
                        i += 4;
                    }
                }
                30 | 31 => self.alternating_curves(b0 == 31),

                10 => {
                    // callsubr
                    let subrs = self
                        .local_subrs
                        .ok_or_else(|| FontError::Parse("callsubr without local subrs".into()))?;
                    let target = self.subr_target(subrs)?;
                    if call_stack.len() >= CALL_STACK_LIMIT {
                        return Err(FontError::CharStringOverflow);
                    }
                    call_stack.push((data, ip));
                    data = target;
                    ip = 0;
                }
                29 => {
                    // callgsubr
                    let target = self.subr_target(self.global_subrs)?;
                    if call_stack.len() >= CALL_STACK_LIMIT {
                        return Err(FontError::CharStringOverflow);
                    }
                    call_stack.push((data, ip));
                    data = target;
                    ip = 0;
                }
                11 => {
                    // return
                    match call_stack.pop() {
                        Some(frame) => (data, ip) = frame,
                        None => break,
                    }
                }
                14 => {
                    // endchar
                    self.take_width(0);
                    if self.open {
                        self.commands.push(PathCommand::Close);
                        self.open = false;
                    }
                    break;
                }

                15 if self.is_cff2 => {
                    // vsindex: selects ItemVariationData; the default
                    // instance ignores it.
                    let _ = self.pop();
                }
                16 if self.is_cff2 => self.blend(),

                12 => {
                    let b1 = *data.get(ip).ok_or_else(truncated)?;
                    ip += 1;
                    self.escape_op(b1)?;
                }

                _ => {
                    // Unknown or reserved operator: drop operands, continue.
                    self.stack.clear();
                }
            }
        }

        Ok(())
    }

    fn escape_op(&mut self, b1: u8) -> Result<()> {
        match b1 {
            35 => self.flex(),
            34 => self.hflex(),
            36 => self.hflex1(),
            37 => self.flex1(),

            3 => {
                // and
                let (b, a) = (self.pop(), self.pop());
                self.push(if a != 0.0 && b != 0.0 { 1.0 } else { 0.0 })?;
            }
            4 => {
                // or
                let (b, a) = (self.pop(), self.pop());
                self.push(if a != 0.0 || b != 0.0 { 1.0 } else { 0.0 })?;
            }
            5 => {
                // not
                let a = self.pop();
                self.push(if a == 0.0 { 1.0 } else { 0.0 })?;
            }
            9 => {
                let a = self.pop();
                self.push(a.abs())?;
            }
            10 => {
                let (b, a) = (self.pop(), self.pop());
                self.push(a + b)?;
            }
            11 => {
                let (b, a) = (self.pop(), self.pop());
                self.push(a - b)?;
            }
            12 => {
                let (b, a) = (self.pop(), self.pop());
                self.push(if b == 0.0 { 0.0 } else { a / b })?;
            }
            14 => {
                let a = self.pop();
                self.push(-a)?;
            }
            15 => {
                // eq
                let (b, a) = (self.pop(), self.pop());
                self.push(if a == b { 1.0 } else { 0.0 })?;
            }
            18 => {
                let _ = self.pop(); // drop
            }
            20 => {
                // put
                self.warn_transient();
                let index = self.pop() as i64;
                let value = self.pop();
                if (0..TRANSIENT_SLOTS as i64).contains(&index) {
                    self.transient[index as usize] = value;
                }
            }
            21 => {
                // get
                self.warn_transient();
                let index = self.pop() as i64;
                let value = if (0..TRANSIENT_SLOTS as i64).contains(&index) {
                    self.transient[index as usize]
                } else {
                    0.0
                };
                self.push(value)?;
            }
            23 => self.push(1.0)?, // random: deterministic for reproducibility
            24 => {
                let (b, a) = (self.pop(), self.pop());
                self.push(a * b)?;
            }
            26 => {
                let a = self.pop();
                self.push(a.abs().sqrt())?;
            }
            27 => {
                // dup
                let a = self.pop();
                self.push(a)?;
                self.push(a)?;
            }
            28 => {
                // exch
                let (b, a) = (self.pop(), self.pop());
                self.push(b)?;
                self.push(a)?;
            }
            29 => {
                // index
                let n = self.pop() as i64;
                let value = if n < 0 {
                    self.stack.last().copied().unwrap_or(0.0)
                } else {
                    let len = self.stack.len() as i64;
                    if n < len {
                        self.stack[(len - 1 - n) as usize]
                    } else {
                        0.0
                    }
                };
                self.push(value)?;
            }
            30 => {
                // roll
                let j = self.pop() as i64;
                let n = self.pop() as i64;
                let len = self.stack.len() as i64;
                if n > 0 && n <= len {
                    let start = (len - n) as usize;
                    let shift = j.rem_euclid(n) as usize;
                    self.stack[start..].rotate_right(shift);
                }
            }
            _ => self.stack.clear(),
        }
        Ok(())
    }

    fn push(&mut self, value: f64) -> Result<()> {
        if self.stack.len() >= STACK_LIMIT {
            return Err(FontError::CharStringOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    /// Arithmetic underflow yields 0 rather than aborting the glyph.
    fn pop(&mut self) -> f64 {
        self.stack.pop().unwrap_or(0.0)
    }

    fn top1(&self) -> f64 {
        self.stack.last().copied().unwrap_or(0.0)
    }

    fn top2(&self) -> (f64, f64) {
        let len = self.stack.len();
        if len >= 2 {
            (self.stack[len - 2], self.stack[len - 1])
        } else {
            (0.0, 0.0)
        }
    }

    /// Consume the width prefix at the first stem/move/endchar operator
    /// carrying an extra bottom operand. CFF1 only.
    fn take_width(&mut self, nargs: usize) {
        if !self.have_width {
            self.have_width = true;
            if self.stack.len() > nargs {
                let extra = self.stack.remove(0);
                self.width = Some(self.nominal_width_x + extra);
            }
        }
    }

    fn stems(&mut self) {
        if !self.have_width {
            self.have_width = true;
            if self.stack.len() % 2 == 1 && !self.stack.is_empty() {
                let extra = self.stack.remove(0);
                self.width = Some(self.nominal_width_x + extra);
            }
        }
        self.n_stems += self.stack.len() / 2;
        self.stack.clear();
    }

    fn move_to(&mut self, dx: f64, dy: f64) {
        if self.open {
            self.commands.push(PathCommand::Close);
        }
        self.x += dx;
        self.y += dy;
        self.commands.push(PathCommand::Move(self.x, self.y));
        self.open = true;
    }

    fn line_to(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
        self.commands.push(PathCommand::Line(self.x, self.y));
    }

    /// Relative cubic: each control point chains off the previous one.
    fn curve_to(&mut self, dx1: f64, dy1: f64, dx2: f64, dy2: f64, dx3: f64, dy3: f64) {
        let c1x = self.x + dx1;
        let c1y = self.y + dy1;
        let c2x = c1x + dx2;
        let c2y = c1y + dy2;
        self.x = c2x + dx3;
        self.y = c2y + dy3;
        self.commands
            .push(PathCommand::Cubic(c1x, c1y, c2x, c2y, self.x, self.y));
    }

    /// vhcurveto / hvcurveto: phase flips per curve; an operand count of
    /// 4k+1 leaves one trailing scalar for the last curve's free axis.
    fn alternating_curves(&mut self, start_horizontal: bool) {
        let operands = std::mem::take(&mut self.stack);
        let n = operands.len();
        let mut horizontal = start_horizontal;
        let mut i = 0;
        while n - i >= 4 {
            let last = n - i == 5;
            let (c1x, c1y);
            if horizontal {
                c1x = self.x + operands[i];
                c1y = self.y;
            } else {
                c1x = self.x;
                c1y = self.y + operands[i];
            }
            let c2x = c1x + operands[i + 1];
            let c2y = c1y + operands[i + 2];
            if horizontal {
                self.y = c2y + operands[i + 3];
                self.x = c2x + if last { operands[i + 4] } else { 0.0 };
            } else {
                self.x = c2x + operands[i + 3];
                self.y = c2y + if last { operands[i + 4] } else { 0.0 };
            }
            self.commands
                .push(PathCommand::Cubic(c1x, c1y, c2x, c2y, self.x, self.y));
            horizontal = !horizontal;
            i += 4;
        }
    }

    /// flex: two cubics, final operand is the flex depth (ignored).
    fn flex(&mut self) {
        let s = std::mem::take(&mut self.stack);
        if s.len() < 13 {
            return;
        }
        self.curve_to(s[0], s[1], s[2], s[3], s[4], s[5]);
        self.curve_to(s[6], s[7], s[8], s[9], s[10], s[11]);
    }

    /// hflex: both endpoints share the starting y, joins stay flat.
    fn hflex(&mut self) {
        let s = std::mem::take(&mut self.stack);
        if s.len() < 7 {
            return;
        }
        let y0 = self.y;
        self.curve_to(s[0], 0.0, s[1], s[2], s[3], 0.0);
        let dy5 = y0 - self.y;
        self.curve_to(s[4], 0.0, s[5], dy5, s[6], 0.0);
    }

    /// hflex1: starts and ends on the same y.
    fn hflex1(&mut self) {
        let s = std::mem::take(&mut self.stack);
        if s.len() < 9 {
            return;
        }
        let y0 = self.y;
        self.curve_to(s[0], s[1], s[2], s[3], s[4], 0.0);
        let c1x = self.x + s[5];
        let c1y = self.y;
        let c2x = c1x + s[6];
        let c2y = c1y + s[7];
        self.x = c2x + s[8];
        self.y = y0;
        self.commands
            .push(PathCommand::Cubic(c1x, c1y, c2x, c2y, self.x, self.y));
    }

    /// flex1: the final free axis follows the dominant accumulated delta.
    fn flex1(&mut self) {
        let s = std::mem::take(&mut self.stack);
        if s.len() < 11 {
            return;
        }
        let (x0, y0) = (self.x, self.y);
        let dx: f64 = s[0] + s[2] + s[4] + s[6] + s[8];
        let dy: f64 = s[1] + s[3] + s[5] + s[7] + s[9];
        self.curve_to(s[0], s[1], s[2], s[3], s[4], s[5]);
        let c1x = self.x + s[6];
        let c1y = self.y + s[7];
        let c2x = c1x + s[8];
        let c2y = c1y + s[9];
        if dx.abs() > dy.abs() {
            self.x = c2x + s[10];
            self.y = y0;
        } else {
            self.x = x0;
            self.y = c2y + s[10];
        }
        self.commands
            .push(PathCommand::Cubic(c1x, c1y, c2x, c2y, self.x, self.y));
    }

    /// blend: pop the count, drop the per-region deltas, keep the base
    /// operands (default instance).
    fn blend(&mut self) {
        let count = self.pop();
        if count < 0.0 {
            return;
        }
        let drop = count as usize * self.num_regions as usize;
        if drop > self.stack.len() {
            self.stack.clear();
        } else {
            let keep = self.stack.len() - drop;
            self.stack.truncate(keep);
        }
    }

    fn subr_target(&mut self, subrs: &'a Index) -> Result<&'a [u8]> {
        let index = self.pop() as i64 + subrs.bias() as i64;
        if index < 0 {
            return Err(FontError::Parse("subroutine index out of range".into()));
        }
        subrs
            .get(index as usize)
            .ok_or_else(|| FontError::Parse("subroutine index out of range".into()))
    }

    fn warn_transient(&self) {
        if !PUT_GET_SEEN.swap(true, Ordering::Relaxed) {
            warn!("charstring uses the transient array (put/get); rarely seen in real fonts");
        }
    }
}

fn operand_bytes(data: &[u8], ip: usize, n: usize) -> Result<&[u8]> {
    data.get(ip..ip + n).ok_or_else(truncated)
}

fn truncated() -> FontError {
    FontError::Parse("truncated charstring".into())
}
