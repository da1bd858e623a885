//! ESC/POS command builder
//!
//! Fluent builder for bill printers. Text is accumulated as UTF-8 next to
//! raw command bytes and transcoded once in [`EscPosBuilder::build`].

use crate::encoding::TextEncoding;
use crate::raster::MonoBitmap;

/// Bill paper class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    Mm58,
    #[default]
    Mm80,
}

impl PaperSize {
    /// Printable dots across the head (203 dpi heads)
    pub fn dots(self) -> u32 {
        match self {
            PaperSize::Mm58 => 384,
            PaperSize::Mm80 => 576,
        }
    }

    /// Font A columns
    pub fn columns(self) -> usize {
        match self {
            PaperSize::Mm58 => 32,
            PaperSize::Mm80 => 48,
        }
    }
}

/// ESC/POS command builder
pub struct EscPosBuilder {
    buf: Vec<u8>,
    width: usize,
    encoding: TextEncoding,
}

impl EscPosBuilder {
    /// Create a builder for the given column count; emits `ESC @`
    pub fn new(width: usize, encoding: TextEncoding) -> Self {
        let mut buf = Vec::with_capacity(1024);
        buf.extend_from_slice(&[0x1B, 0x40]);
        Self {
            buf,
            width,
            encoding,
        }
    }

    /// Builder sized for a paper class
    pub fn for_paper(paper: PaperSize, encoding: TextEncoding) -> Self {
        Self::new(paper.columns(), encoding)
    }

    /// Configured width in columns
    pub fn width(&self) -> usize {
        self.width
    }

    // === Text ===

    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    /// Print and feed n lines (ESC d n)
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x64, lines]);
        self
    }

    pub fn center(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x01]);
        self
    }

    pub fn left(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x00]);
        self
    }

    pub fn bold(&mut self, on: bool) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, on as u8]);
        self
    }

    pub fn double_size(&mut self, on: bool) -> &mut Self {
        let n = if on { 0x11 } else { 0x00 };
        self.buf.extend_from_slice(&[0x1D, 0x21, n]);
        self
    }

    /// A full-width row of `ch`
    pub fn separator(&mut self, ch: char) -> &mut Self {
        let row: String = std::iter::repeat_n(ch, self.width).collect();
        self.line(&row)
    }

    /// Left text and right text on one row, padded between
    pub fn line_lr(&mut self, left: &str, right: &str) -> &mut Self {
        let used = self.encoding.display_width(left) + self.encoding.display_width(right);
        if used >= self.width {
            self.text(left).text(" ").line(right)
        } else {
            let gap = " ".repeat(self.width - used);
            self.text(left).text(&gap).line(right)
        }
    }

    // === Graphics ===

    /// Raster bit image (GS v 0), centred
    ///
    /// Tall images are split into bands of at most 255 rows, which older
    /// firmware requires.
    pub fn raster(&mut self, bitmap: &MonoBitmap) -> &mut Self {
        const BAND: u32 = 255;

        let row_bytes = bitmap.row_bytes();
        self.center();
        let mut y = 0;
        while y < bitmap.height() {
            let rows = BAND.min(bitmap.height() - y);
            self.buf.extend_from_slice(&[0x1D, 0x76, 0x30, 0x00]);
            self.buf.push((row_bytes & 0xFF) as u8);
            self.buf.push((row_bytes >> 8) as u8);
            self.buf.push((rows & 0xFF) as u8);
            self.buf.push((rows >> 8) as u8);
            let start = (y * row_bytes) as usize;
            let end = start + (rows * row_bytes) as usize;
            self.buf.extend_from_slice(&bitmap.data()[start..end]);
            y += rows;
        }
        self.left();
        self
    }

    // === Paper ===

    /// Feed n lines then full cut (GS V 66 n)
    pub fn cut_feed(&mut self, lines: u8) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x56, 0x42, lines]);
        self
    }

    /// Raw bytes
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Finish, transcoding text into the configured code page
    pub fn build(self) -> Vec<u8> {
        self.encoding.encode(&self.buf)
    }

    /// Finish without transcoding
    pub fn build_raw(self) -> Vec<u8> {
        self.buf
    }
}

/// Short ticket used by the explicit "test printer" action
pub fn test_page(paper: PaperSize, encoding: TextEncoding, title: &str) -> Vec<u8> {
    let mut b = EscPosBuilder::for_paper(paper, encoding);
    b.center()
        .double_size(true)
        .line(title)
        .double_size(false)
        .left()
        .separator('-')
        .line_lr("Paper", &format!("{}", paper.columns()))
        .separator('-')
        .cut_feed(3);
    b.build()
}
