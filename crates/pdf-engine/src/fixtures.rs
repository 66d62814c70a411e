//! Generated PDF documents for tests.

use crate::PageSize;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// Build a PDF with one page per entry in `sizes`.
///
/// Each page's content stream fills a small square whose x offset is the
/// page index, so copied pages can be told apart.
pub fn pdf_with_pages(sizes: &[PageSize]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(sizes.len());

    for (index, size) in sizes.iter().enumerate() {
        let content = Content {
            operations: vec![
                Operation::new("re", vec![(index as i64).into(), 0.into(), 1.into(), 1.into()]),
                Operation::new("f", vec![]),
            ],
        };
        let encoded = content.encode().expect("fixture content should encode");
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                Object::Real(size.width_pt),
                Object::Real(size.height_pt),
            ],
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => sizes.len() as i64,
        "Resources" => dictionary! {},
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture document should serialize");
    bytes
}

/// Single US Letter page.
pub fn letter_pdf() -> Vec<u8> {
    pdf_with_pages(&[crate::DEFAULT_PAGE_SIZE])
}
