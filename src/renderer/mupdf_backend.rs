//! MuPDF-backed [`PdfRasterizer`]

use std::io::Write;

use image::RgbaImage;
use mupdf::{Colorspace, Document, Matrix, Pixmap};
use tempfile::NamedTempFile;

use super::native::{PdfPages, PdfRasterizer, WorkerFault};

pub struct MupdfRasterizer;

impl PdfRasterizer for MupdfRasterizer {
    fn open(&self, pdf: &[u8]) -> Result<Box<dyn PdfPages>, WorkerFault> {
        let mut file = tempfile::Builder::new()
            .prefix("inkdeck-")
            .suffix(".pdf")
            .tempfile()?;
        file.write_all(pdf)?;
        file.flush()?;

        let path = file.path().to_string_lossy().into_owned();
        let doc = Document::open(path.as_str())?;
        let page_count = usize::try_from(doc.page_count()?).unwrap_or(0);
        Ok(Box::new(MupdfPages {
            doc,
            page_count,
            _file: file,
        }))
    }
}

struct MupdfPages {
    doc: Document,
    page_count: usize,
    /// Backing file; removed when the pages are dropped
    _file: NamedTempFile,
}

impl PdfPages for MupdfPages {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn render_page(&mut self, index: usize, scale: f32) -> Result<RgbaImage, WorkerFault> {
        if index >= self.page_count {
            return Err(WorkerFault::PageOutOfRange {
                page: index,
                count: self.page_count,
            });
        }
        let page = self.doc.load_page(index as i32)?;
        let matrix = Matrix::new_scale(scale, scale);
        let pixmap = page.to_pixmap(&matrix, &Colorspace::device_rgb(), false, false)?;
        pixmap_to_rgba(&pixmap)
    }
}

fn pixmap_to_rgba(pixmap: &Pixmap) -> Result<RgbaImage, WorkerFault> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(WorkerFault::generic(format!(
            "Unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    if samples.len() < stride.saturating_mul(height) || row_bytes > stride {
        return Err(WorkerFault::generic("Pixmap buffer size mismatch"));
    }

    let mut out = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        let row = &samples[y * stride..y * stride + row_bytes];
        for px in row.chunks_exact(n) {
            out.extend_from_slice(&px[..3]);
            out.push(if n > 3 { px[3] } else { 255 });
        }
    }

    RgbaImage::from_raw(width as u32, height as u32, out)
        .ok_or_else(|| WorkerFault::generic("Pixmap conversion produced a short buffer"))
}
