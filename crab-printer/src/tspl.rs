//! TSPL command builder for label printers
//!
//! TSPL is line-oriented ASCII with CRLF terminators; only the `BITMAP`
//! payload is binary.

use crate::raster::MonoBitmap;

/// TSPL command builder
#[derive(Debug, Default)]
pub struct TsplBuilder {
    buf: Vec<u8>,
}

impl TsplBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn cmd(&mut self, line: &str) -> &mut Self {
        self.buf.extend_from_slice(line.as_bytes());
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    /// Label stock size
    pub fn size_mm(&mut self, width: f32, height: f32) -> &mut Self {
        self.cmd(&format!("SIZE {} mm,{} mm", fmt_mm(width), fmt_mm(height)))
    }

    /// Gap between labels
    pub fn gap_mm(&mut self, gap: f32) -> &mut Self {
        self.cmd(&format!("GAP {} mm,0 mm", fmt_mm(gap)))
    }

    pub fn direction(&mut self, dir: u8) -> &mut Self {
        self.cmd(&format!("DIRECTION {}", dir))
    }

    /// Clear the image buffer
    pub fn cls(&mut self) -> &mut Self {
        self.cmd("CLS")
    }

    /// Place a bitmap at (x, y) dots, overwrite mode
    pub fn bitmap(&mut self, x: u32, y: u32, bitmap: &MonoBitmap) -> &mut Self {
        let header = format!(
            "BITMAP {},{},{},{},0,",
            x,
            y,
            bitmap.row_bytes(),
            bitmap.height()
        );
        self.buf.extend_from_slice(header.as_bytes());
        // TSPL prints 0 bits
        self.buf.extend_from_slice(&bitmap.inverted());
        self.buf.extend_from_slice(b"\r\n");
        self
    }

    /// Print `sets` copies of the buffer
    pub fn print(&mut self, sets: u32) -> &mut Self {
        self.cmd(&format!("PRINT {},1", sets.max(1)))
    }

    /// Built-in self test page
    pub fn self_test(&mut self) -> &mut Self {
        self.cmd("SELFTEST")
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

fn fmt_mm(v: f32) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{:.1}", v)
    }
}

/// Dots across `mm` at `dpi`
pub fn mm_to_dots(mm: f32, dpi: u32) -> u32 {
    ((mm / 25.4) * dpi as f32).round().max(0.0) as u32
}

/// Full job for one label image: size, gap, clear, bitmap, print
pub fn label_job(width_mm: f32, height_mm: f32, gap_mm: f32, bitmap: &MonoBitmap) -> Vec<u8> {
    let mut b = TsplBuilder::new();
    b.size_mm(width_mm, height_mm)
        .gap_mm(gap_mm)
        .direction(1)
        .cls()
        .bitmap(0, 0, bitmap)
        .print(1);
    b.build()
}
