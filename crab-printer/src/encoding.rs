//! Text encoding for thermal printers
//!
//! Bill printers ship with a fixed code page. Chinese models expect GBK,
//! European models usually run Windows-1252, and a few newer ones accept
//! UTF-8 directly. ESC/POS control bytes are always ASCII, so only the
//! non-ASCII runs of a buffer are transcoded.

use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Code page used for text sent to a bill printer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    /// Send text as-is
    Utf8,
    /// GBK (FS & + FS C 1 selects Chinese mode)
    #[default]
    Gbk,
    /// Windows-1252 / Latin-1
    Latin1,
}

impl TextEncoding {
    fn codec(self) -> Option<&'static encoding_rs::Encoding> {
        match self {
            TextEncoding::Utf8 => None,
            TextEncoding::Gbk => Some(encoding_rs::GBK),
            TextEncoding::Latin1 => Some(encoding_rs::WINDOWS_1252),
        }
    }

    /// Printed column width of a string under this encoding
    ///
    /// GBK double-byte glyphs occupy two columns, everything else one.
    pub fn display_width(self, s: &str) -> usize {
        match self {
            TextEncoding::Gbk => encoding_rs::GBK.encode(s).0.len(),
            _ => s.chars().count(),
        }
    }

    /// Bytes that switch the printer into this code page
    fn preamble(self) -> &'static [u8] {
        match self {
            // FS & + FS C 1
            TextEncoding::Gbk => &[0x1C, 0x26, 0x1C, 0x43, 0x01],
            // ESC t 16 (WPC1252)
            TextEncoding::Latin1 => &[0x1B, 0x74, 0x10],
            TextEncoding::Utf8 => &[],
        }
    }

    /// Encode a mixed buffer of ESC/POS commands and UTF-8 text
    ///
    /// ASCII bytes (0x00-0x7F) pass through untouched so command sequences
    /// survive. After every `ESC @` the code page preamble is re-sent, since
    /// initialisation resets it.
    #[instrument(skip(bytes), fields(len = bytes.len()))]
    pub fn encode(self, bytes: &[u8]) -> Vec<u8> {
        let Some(codec) = self.codec() else {
            return bytes.to_vec();
        };

        let mut out = Vec::with_capacity(bytes.len() + 8);
        out.extend_from_slice(self.preamble());

        let mut pending: Vec<u8> = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            if b < 0x80 {
                flush_text(codec, &mut pending, &mut out);
                out.push(b);
                if b == 0x1B && bytes.get(i + 1) == Some(&0x40) {
                    out.push(0x40);
                    out.extend_from_slice(self.preamble());
                    i += 2;
                    continue;
                }
            } else {
                pending.push(b);
            }
            i += 1;
        }
        flush_text(codec, &mut pending, &mut out);
        out
    }
}

fn flush_text(codec: &'static encoding_rs::Encoding, pending: &mut Vec<u8>, out: &mut Vec<u8>) {
    if pending.is_empty() {
        return;
    }
    let text = String::from_utf8_lossy(pending);
    let (encoded, _, _) = codec.encode(&text);
    out.extend_from_slice(&encoded);
    pending.clear();
}
