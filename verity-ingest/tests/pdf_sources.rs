use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use verity_ingest::{
    open_document, DocumentClassifier, DocumentKind, ExtractionRouter, ExtractionSource,
    IngestError, OcrEngine, PageImage, RawPayload, SkewCorrector,
};

/// Assemble a PDF from page dictionaries; `pages_resources` is set on the
/// page tree node so pages without their own resources inherit it.
fn assemble(doc: &mut Document, pages: Vec<Dictionary>, pages_resources: Option<Dictionary>) -> Vec<u8> {
    let pages_id = doc.new_object_id();
    let kids: Vec<Object> = pages
        .into_iter()
        .map(|mut page| {
            page.set("Type", Object::Name(b"Page".to_vec()));
            page.set("Parent", Object::Reference(pages_id));
            page.set(
                "MediaBox",
                vec![0.into(), 0.into(), 612.into(), 792.into()],
            );
            Object::Reference(doc.add_object(page))
        })
        .collect();

    let mut pages_dict = dictionary! {
        "Type" => Object::Name(b"Pages".to_vec()),
        "Count" => Object::Integer(kids.len() as i64),
        "Kids" => kids,
    };
    if let Some(res) = pages_resources {
        pages_dict.set("Resources", res);
    }
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => Object::Name(b"Catalog".to_vec()),
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

fn font(doc: &mut Document) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => Object::Name(b"Font".to_vec()),
        "Subtype" => Object::Name(b"Type1".to_vec()),
        "BaseFont" => Object::Name(b"Helvetica".to_vec()),
    })
}

fn text_page(doc: &mut Document, font_id: ObjectId, lines: &[&str]) -> Dictionary {
    let mut content = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        let y = 700 - 14 * i as i64;
        content.extend_from_slice(format!("BT /F1 10 Tf 40 {y} Td ({line}) Tj ET\n").as_bytes());
    }
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
    dictionary! {
        "Contents" => Object::Reference(content_id),
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => Object::Reference(font_id) },
        },
    }
}

fn gray_image(doc: &mut Document, width: i64, height: i64) -> ObjectId {
    let pixels = vec![200u8; (width * height) as usize];
    let mut stream = Stream::new(
        dictionary! {
            "Type" => Object::Name(b"XObject".to_vec()),
            "Subtype" => Object::Name(b"Image".to_vec()),
            "Width" => Object::Integer(width),
            "Height" => Object::Integer(height),
            "ColorSpace" => Object::Name(b"DeviceGray".to_vec()),
            "BitsPerComponent" => Object::Integer(8),
        },
        pixels,
    );
    stream.allows_compression = false;
    doc.add_object(Object::Stream(stream))
}

fn jpeg_image(doc: &mut Document, width: u32, height: u32) -> ObjectId {
    let img = RgbImage::from_pixel(width, height, Rgb([230, 230, 230]));
    let mut jpeg = Cursor::new(Vec::new());
    img.write_to(&mut jpeg, ImageFormat::Jpeg).unwrap();
    let jpeg = jpeg.into_inner();
    let mut stream = Stream::new(
        dictionary! {
            "Type" => Object::Name(b"XObject".to_vec()),
            "Subtype" => Object::Name(b"Image".to_vec()),
            "Width" => Object::Integer(width as i64),
            "Height" => Object::Integer(height as i64),
            "ColorSpace" => Object::Name(b"DeviceRGB".to_vec()),
            "BitsPerComponent" => Object::Integer(8),
            "Filter" => Object::Name(b"DCTDecode".to_vec()),
        },
        jpeg,
    );
    stream.allows_compression = false;
    doc.add_object(Object::Stream(stream))
}

fn image_page(doc: &mut Document, image_id: ObjectId) -> Dictionary {
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        b"q 612 0 0 792 0 0 cm /Im1 Do Q".to_vec(),
    ));
    dictionary! {
        "Contents" => Object::Reference(content_id),
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im1" => Object::Reference(image_id) },
        },
    }
}

fn scanned_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let page_dicts = (0..pages)
        .map(|_| {
            let img = jpeg_image(&mut doc, 200, 300);
            image_page(&mut doc, img)
        })
        .collect();
    assemble(&mut doc, page_dicts, None)
}

fn digital_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let f = font(&mut doc);
    let page = text_page(
        &mut doc,
        f,
        &[
            "Date,Description,Debit,Credit,Balance",
            "01-01-2025,Opening Balance,,,2649.13",
            "02-01-2025,ATM withdrawal,50.00,,2599.13",
        ],
    );
    assemble(&mut doc, vec![page], None)
}

struct FixedOcr;

impl OcrEngine for FixedOcr {
    fn name(&self) -> &str {
        "fixed"
    }

    fn extract_text(&self, pages: &[PageImage]) -> anyhow::Result<String> {
        Ok(pages
            .iter()
            .map(|p| format!("page {} {}x{}", p.index, p.width(), p.height()))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

fn router() -> ExtractionRouter {
    ExtractionRouter::with_ocr(
        DocumentClassifier::default(),
        Box::new(FixedOcr),
        SkewCorrector::default(),
    )
}

#[test]
fn test_scanned_pdf_is_image_based_and_renders() {
    let doc = open_document(&scanned_pdf(2)).unwrap();
    assert_eq!(doc.page_count(), 2);

    let class = DocumentClassifier::default().classify(doc.as_ref()).unwrap();
    assert_eq!(class.kind, DocumentKind::ImageBased);
    assert_eq!(class.images, 2);

    let page = doc.render_page(1).unwrap();
    assert_eq!((page.width(), page.height()), (200, 300));
    assert_eq!(page.index, 1);
}

#[test]
fn test_scanned_pdf_routes_to_ocr() {
    let doc = open_document(&scanned_pdf(2)).unwrap();
    let (_, raw) = router().route(doc.as_ref()).unwrap();
    assert_eq!(raw.source, ExtractionSource::Ocr);
    assert_eq!(
        raw.payload,
        RawPayload::Text("page 0 200x300\npage 1 200x300".into())
    );
}

#[test]
fn test_digital_pdf_is_text_based() {
    let doc = open_document(&digital_pdf()).unwrap();
    let class = DocumentClassifier::default().classify(doc.as_ref()).unwrap();
    assert_eq!(class.kind, DocumentKind::TextBased);
    assert_eq!(class.images, 0);
    assert!(class.text_chars >= 50, "{} chars", class.text_chars);

    let raw = router().extract(doc.as_ref()).unwrap();
    assert_eq!(raw.source, ExtractionSource::TextLayer);
    match raw.payload {
        RawPayload::Text(t) => assert!(t.contains("Opening Balance"), "{t:?}"),
        other => panic!("unexpected payload {other:?}"),
    }
}

#[test]
fn test_raw_gray_image_with_inherited_resources() {
    let mut doc = Document::with_version("1.5");
    let img = gray_image(&mut doc, 4, 3);
    let content_id = doc.add_object(Stream::new(dictionary! {}, b"q 4 0 0 3 0 0 cm /Im1 Do Q".to_vec()));
    let page = dictionary! { "Contents" => Object::Reference(content_id) };
    let shared = dictionary! {
        "XObject" => dictionary! { "Im1" => Object::Reference(img) },
    };
    let bytes = assemble(&mut doc, vec![page], Some(shared));

    let source = open_document(&bytes).unwrap();
    assert_eq!(source.page_image_count(0).unwrap(), 1);
    let page = source.render_page(0).unwrap();
    assert_eq!((page.width(), page.height()), (4, 3));
    assert_eq!(page.pixels.get_pixel(0, 0), &Rgb([200, 200, 200]));
}

#[test]
fn test_page_without_images_cannot_render() {
    let doc = open_document(&digital_pdf()).unwrap();
    assert!(matches!(doc.render_page(0), Err(IngestError::Render { page: 0, .. })));
}
