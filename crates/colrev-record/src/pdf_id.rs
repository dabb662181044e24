//! PDF fingerprints (`cpid2:`)
//!
//! The first page is rendered in device gray at 200 dpi, scaled to 32x32
//! and reduced to a 1024-bit average hash. Identical files always produce
//! identical ids; pages that look alike produce ids that differ in few bits.

use crate::error::{RecordError, Result};
use crate::pdf_render::render_first_page;
use image::imageops::{self, FilterType};
use image::GrayImage;
use lopdf::Document;
use std::path::Path;
use tracing::error;

/// Prefix of PDF ids produced by this crate
pub const CPID_PREFIX: &str = "cpid2:";

const HASH_SIZE: u32 = 32;

/// Fingerprint of the PDF at `path`
///
/// # Errors
/// - [`RecordError::Io`] if the file cannot be read
/// - [`RecordError::InvalidPdf`] for empty or unparsable files
/// - [`RecordError::PdfHashError`] when the first page yields no usable hash
pub fn colrev_pdf_id(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| RecordError::io_error(path, e))?;
    colrev_pdf_id_from_bytes(&bytes, path)
}

/// Fingerprint of in-memory PDF bytes; `path` is used for error reporting
///
/// # Errors
/// See [`colrev_pdf_id`].
pub fn colrev_pdf_id_from_bytes(bytes: &[u8], path: &Path) -> Result<String> {
    let invalid = || RecordError::InvalidPdf {
        path: path.to_path_buf(),
    };
    let hash_error = || RecordError::PdfHashError {
        path: path.to_path_buf(),
    };

    if bytes.is_empty() {
        error!(path = %path.display(), "PDF with size 0");
        return Err(invalid());
    }
    let doc = Document::load_mem(bytes).map_err(|_| invalid())?;
    let page = render_first_page(&doc).ok_or_else(hash_error)?;

    let hash = average_hash(&page).ok_or_else(|| {
        error!(path = %path.display(), "blank first page");
        hash_error()
    })?;
    Ok(format!("{CPID_PREFIX}{hash}"))
}

/// 1024-bit average hash as 256 hex chars; `None` for empty or uniform pages
fn average_hash(page: &GrayImage) -> Option<String> {
    if page.width() == 0 || page.height() == 0 {
        return None;
    }
    let small = imageops::resize(page, HASH_SIZE, HASH_SIZE, FilterType::Lanczos3);
    let pixels: Vec<u8> = small.pixels().map(|p| p.0[0]).collect();
    let mean = pixels.iter().map(|&p| u32::from(p)).sum::<u32>() as f64 / pixels.len() as f64;

    let mut bits = vec![0u8; pixels.len() / 8];
    for (i, &p) in pixels.iter().enumerate() {
        if f64::from(p) > mean {
            bits[i / 8] |= 0x80 >> (i % 8);
        }
    }
    if bits.iter().all(|&b| b == 0) {
        return None;
    }
    Some(hex::encode(bits))
}
