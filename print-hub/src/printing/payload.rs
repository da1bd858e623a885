//! Turns a captured image into printer-language bytes

use super::renderer::RenderedImage;
use crate::models::{PrintJob, PrinterRole};
use crab_printer::{EscPosBuilder, MonoBitmap, tspl};

/// Lines fed before the cut so the last row clears the cutter
const BILL_CUT_FEED: u8 = 4;

/// Encode `image` for the job's printer
///
/// Bills become an ESC/POS raster scaled to the paper's dot width. Labels
/// become a TSPL job scaled to the label width at the configured DPI.
pub fn encode_job(job: &PrintJob, image: &RenderedImage) -> Vec<u8> {
    let cfg = &job.printer_config;
    match job.role {
        PrinterRole::Bill => {
            let bitmap = MonoBitmap::from_image(image.image(), Some(cfg.paper_size.dots()));
            let mut b = EscPosBuilder::for_paper(cfg.paper_size, cfg.text_encoding);
            b.raster(&bitmap).cut_feed(BILL_CUT_FEED);
            b.build_raw()
        }
        PrinterRole::Label => {
            let bitmap = MonoBitmap::from_image(image.image(), Some(cfg.label_dots()));
            tspl::label_job(
                cfg.label_width_mm,
                cfg.label_height_mm,
                cfg.label_gap_mm,
                &bitmap,
            )
        }
    }
}
