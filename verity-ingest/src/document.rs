//! Document sources: PDFs (via lopdf) and single raster images.
//!
//! A source answers three questions per page: how much selectable text it
//! has, how many embedded raster images it carries, and what the page looks
//! like as pixels. PDF pages are rendered from their largest embedded image;
//! vector-only pages have nothing to rasterize and report a render error.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::error::IngestError;

/// One rendered page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    /// Zero-based page index within the document.
    pub index: usize,
    pub pixels: RgbImage,
    /// True once the skew corrector has rotated this page.
    pub deskewed: bool,
}

impl PageImage {
    pub fn new(index: usize, pixels: RgbImage) -> Self {
        Self {
            index,
            pixels,
            deskewed: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Lossless PNG encoding, for OCR and vision collaborators.
    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut buf = Cursor::new(Vec::new());
        self.pixels.write_to(&mut buf, ImageFormat::Png)?;
        Ok(buf.into_inner())
    }
}

/// What the pipeline needs from an opened document.
pub trait DocumentSource {
    fn page_count(&self) -> usize;

    /// Selectable text of one page (empty for scans).
    fn page_text(&self, page: usize) -> Result<String, IngestError>;

    /// Number of embedded raster images on one page.
    fn page_image_count(&self, page: usize) -> Result<usize, IngestError>;

    fn render_page(&self, page: usize) -> Result<PageImage, IngestError>;

    /// Render every page, failing on the first page that cannot be rendered.
    fn render_pages(&self) -> Result<Vec<PageImage>, IngestError> {
        (0..self.page_count()).map(|i| self.render_page(i)).collect()
    }
}

/// Open raw bytes as a PDF or a raster image.
pub fn open_document(bytes: &[u8]) -> Result<Box<dyn DocumentSource>, IngestError> {
    if bytes.is_empty() {
        return Err(IngestError::unreadable("empty input"));
    }
    if bytes.starts_with(b"%PDF") {
        return Ok(Box::new(PdfDocument::from_bytes(bytes)?));
    }
    if image::guess_format(bytes).is_ok() {
        return Ok(Box::new(RasterDocument::from_bytes(bytes)?));
    }
    Err(IngestError::unreadable("neither a PDF nor a supported image format"))
}

/// A PDF parsed with lopdf.
pub struct PdfDocument {
    doc: Document,
    /// Page object ids in page order.
    page_ids: Vec<ObjectId>,
    /// 1-based page numbers, as lopdf's text extraction expects.
    page_numbers: Vec<u32>,
}

impl PdfDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IngestError> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| IngestError::unreadable(format!("pdf parse error: {e}")))?;
        let (page_numbers, page_ids) = doc.get_pages().into_iter().unzip();
        Ok(Self {
            doc,
            page_ids,
            page_numbers,
        })
    }

    fn page_dict(&self, page: usize) -> Result<&Dictionary, IngestError> {
        let id = self
            .page_ids
            .get(page)
            .ok_or_else(|| IngestError::unreadable(format!("page {page} out of range")))?;
        self.doc
            .get_dictionary(*id)
            .map_err(|e| IngestError::unreadable(format!("page {page}: {e}")))
    }

    fn resolve<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).ok(),
            other => Some(other),
        }
    }

    fn resolve_dict<'a>(&'a self, obj: &'a Object) -> Option<&'a Dictionary> {
        match self.resolve(obj)? {
            Object::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Page resources, inherited from the page tree when the page has none.
    fn resources<'a>(&'a self, page: &'a Dictionary) -> Option<&'a Dictionary> {
        let mut node = page;
        for _ in 0..32 {
            if let Some(res) = node.get(b"Resources").ok().and_then(|r| self.resolve_dict(r)) {
                return Some(res);
            }
            node = node.get(b"Parent").ok().and_then(|p| self.resolve_dict(p))?;
        }
        None
    }

    fn image_streams(&self, page: usize) -> Result<Vec<&Stream>, IngestError> {
        let dict = self.page_dict(page)?;
        let Some(xobjects) = self
            .resources(dict)
            .and_then(|res| res.get(b"XObject").ok())
            .and_then(|x| self.resolve_dict(x))
        else {
            return Ok(Vec::new());
        };

        let images = xobjects
            .iter()
            .filter_map(|(_, obj)| match self.resolve(obj)? {
                Object::Stream(s) => Some(s),
                _ => None,
            })
            .filter(|s| {
                s.dict
                    .get(b"Subtype")
                    .ok()
                    .and_then(|st| self.resolve(st))
                    .is_some_and(|st| matches!(st, Object::Name(n) if n == b"Image"))
            })
            .collect();
        Ok(images)
    }

    fn dict_u32(&self, dict: &Dictionary, key: &[u8]) -> Option<u32> {
        match self.resolve(dict.get(key).ok()?)? {
            Object::Integer(i) => u32::try_from(*i).ok(),
            Object::Real(f) if *f >= 0.0 => Some(*f as u32),
            _ => None,
        }
    }

    fn decode_image(&self, page: usize, stream: &Stream) -> Result<RgbImage, IngestError> {
        let filters = stream_filters(&stream.dict);
        if filters.first().is_some_and(|f| f == b"DCTDecode") {
            return image::load_from_memory(&stream.content)
                .map(|img| img.to_rgb8())
                .map_err(|e| IngestError::render(page, format!("jpeg decode: {e}")));
        }
        if let Some(other) = filters
            .iter()
            .find(|f| f.as_slice() != b"FlateDecode")
        {
            return Err(IngestError::render(
                page,
                format!("unsupported image filter {}", String::from_utf8_lossy(other)),
            ));
        }

        let width = self.dict_u32(&stream.dict, b"Width").unwrap_or(0);
        let height = self.dict_u32(&stream.dict, b"Height").unwrap_or(0);
        let bits = self.dict_u32(&stream.dict, b"BitsPerComponent").unwrap_or(8);
        let pixels = width as usize * height as usize;
        if pixels == 0 || bits != 8 {
            return Err(IngestError::render(
                page,
                format!("unsupported raw image {width}x{height} at {bits} bits"),
            ));
        }

        let data = if filters.is_empty() {
            stream.content.clone()
        } else {
            stream
                .decompressed_content()
                .map_err(|e| IngestError::render(page, format!("inflate: {e}")))?
        };

        let decoded = match data.len() / pixels {
            3 => RgbImage::from_raw(width, height, data[..pixels * 3].to_vec()),
            1 => GrayImage::from_raw(width, height, data[..pixels].to_vec())
                .map(|g| DynamicImage::ImageLuma8(g).to_rgb8()),
            _ => None,
        };
        decoded.ok_or_else(|| {
            IngestError::render(page, format!("{} bytes do not fit {width}x{height}", data.len()))
        })
    }
}

impl DocumentSource for PdfDocument {
    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn page_text(&self, page: usize) -> Result<String, IngestError> {
        let number = self
            .page_numbers
            .get(page)
            .ok_or_else(|| IngestError::unreadable(format!("page {page} out of range")))?;
        self.doc
            .extract_text(&[*number])
            .map_err(|e| IngestError::unreadable(format!("text layer of page {page}: {e}")))
    }

    fn page_image_count(&self, page: usize) -> Result<usize, IngestError> {
        Ok(self.image_streams(page)?.len())
    }

    fn render_page(&self, page: usize) -> Result<PageImage, IngestError> {
        let images = self.image_streams(page)?;
        let largest = images
            .into_iter()
            .max_by_key(|s| {
                let w = self.dict_u32(&s.dict, b"Width").unwrap_or(0) as u64;
                let h = self.dict_u32(&s.dict, b"Height").unwrap_or(0) as u64;
                w * h
            })
            .ok_or_else(|| IngestError::render(page, "no embedded raster image"))?;
        let pixels = self.decode_image(page, largest)?;
        debug!(page, width = pixels.width(), height = pixels.height(), "rendered pdf page");
        Ok(PageImage::new(page, pixels))
    }
}

fn stream_filters(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![n.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| match o {
                Object::Name(n) => Some(n.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// A PNG/JPEG/TIFF scan: one page, no text layer, one image.
pub struct RasterDocument {
    pixels: RgbImage,
}

impl RasterDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IngestError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| IngestError::unreadable(format!("image decode error: {e}")))?;
        Ok(Self::from_image(img.to_rgb8()))
    }

    pub fn from_image(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    fn check(&self, page: usize) -> Result<(), IngestError> {
        if page == 0 {
            Ok(())
        } else {
            Err(IngestError::unreadable(format!("page {page} out of range")))
        }
    }
}

impl DocumentSource for RasterDocument {
    fn page_count(&self) -> usize {
        1
    }

    fn page_text(&self, page: usize) -> Result<String, IngestError> {
        self.check(page).map(|_| String::new())
    }

    fn page_image_count(&self, page: usize) -> Result<usize, IngestError> {
        self.check(page).map(|_| 1)
    }

    fn render_page(&self, page: usize) -> Result<PageImage, IngestError> {
        self.check(page)?;
        Ok(PageImage::new(0, self.pixels.clone()))
    }
}
