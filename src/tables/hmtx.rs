use crate::error::Result;
use crate::stream::FontReader;

/// HMTX table - Horizontal metrics
#[derive(Debug, Clone)]
pub struct HmtxTable {
    pub h_metrics: Vec<LongHorMetric>,
    pub left_side_bearings: Vec<i16>,
}

#[derive(Debug, Clone)]
pub struct LongHorMetric {
    pub advance_width: u16,
    pub lsb: i16,
}

impl HmtxTable {
    pub fn from_reader(
        reader: &mut FontReader,
        num_glyphs: u16,
        num_h_metrics: u16,
    ) -> Result<Self> {
        let mut h_metrics = Vec::with_capacity(num_h_metrics as usize);
        for _ in 0..num_h_metrics {
            h_metrics.push(LongHorMetric {
                advance_width: reader.read_u16()?,
                lsb: reader.read_i16()?,
            });
        }

        let num_lsb = num_glyphs.saturating_sub(num_h_metrics) as usize;
        let mut left_side_bearings = Vec::with_capacity(num_lsb);
        for _ in 0..num_lsb {
            left_side_bearings.push(reader.read_i16()?);
        }

        Ok(HmtxTable {
            h_metrics,
            left_side_bearings,
        })
    }

    /// The last advance width replicates for glyphs past numberOfHMetrics.
    pub fn advance_width(&self, glyph_id: u16) -> u16 {
        match self.h_metrics.get(glyph_id as usize) {
            Some(metric) => metric.advance_width,
            None => self.h_metrics.last().map_or(0, |m| m.advance_width),
        }
    }

    pub fn lsb(&self, glyph_id: u16) -> i16 {
        let index = glyph_id as usize;
        if index < self.h_metrics.len() {
            self.h_metrics[index].lsb
        } else {
            self.left_side_bearings
                .get(index - self.h_metrics.len())
                .copied()
                .unwrap_or(0)
        }
    }
}
