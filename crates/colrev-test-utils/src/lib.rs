//! Testing utilities for the CoLRev workspace
//!
//! Record fixtures for the end-to-end scenarios and a minimal PDF writer.

#![allow(missing_docs)]

use colrev_record::{fields, values, EntryType, FieldProvenance, Record, RecordsDict};
use colrev_state::RecordState;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;

pub const WEBSTER_TITLE: &str =
    "Analyzing the past to prepare for the future: Writing a literature review";

/// Prepared article with provenance pointing at `origin`
pub fn prepared_article(id: &str, origin: &str, author: &str, title: &str, year: &str) -> Record {
    let mut record = Record::new(id, EntryType::Article)
        .with_field(fields::TITLE, title)
        .with_field(fields::AUTHOR, author)
        .with_field(fields::YEAR, year)
        .with_field(fields::JOURNAL, "MIS Quarterly")
        .with_field(fields::VOLUME, "26")
        .with_field(fields::NUMBER, "2")
        .with_origin(origin)
        .with_status(RecordState::MdPrepared);
    record.add_provenance_all(origin);
    record
}

/// Curated main record and a crossref duplicate with a differently cased author
pub fn scenario_curated_merge() -> (Record, Record) {
    let main = Record::new("001", EntryType::Article)
        .with_md_prov(values::CURATED, FieldProvenance::new("www.github.com/curated/misq"))
        .with_origin("md_curated.bib/001")
        .with_field(fields::AUTHOR, "RAI, ARUN")
        .with_field(fields::YEAR, "2020")
        .with_field(fields::TITLE, "Editorial")
        .with_field(fields::VOLUME, "45")
        .with_field(fields::NUMBER, "1")
        .with_status(RecordState::MdPrepared);
    let incoming = Record::new("002", EntryType::Article)
        .with_origin("md_crossref.bib/001")
        .with_field(fields::AUTHOR, "Rai, Arun")
        .with_field(fields::YEAR, "2020")
        .with_field(fields::TITLE, "Editorial")
        .with_field(fields::VOLUME, "45")
        .with_field(fields::NUMBER, "1")
        .with_status(RecordState::MdPrepared);
    (main, incoming)
}

/// Forthcoming main record (volume/number acknowledged missing) and the published version
pub fn scenario_forthcoming() -> (Record, Record) {
    let mut main = prepared_article(
        "Rai2022",
        "crossref.bib/000001",
        "Rai, Arun",
        "Next-generation digital platforms",
        values::FORTHCOMING,
    );
    main.remove_field_not_missing(fields::VOLUME, Some("s"));
    main.remove_field_not_missing(fields::NUMBER, Some("s"));

    let incoming = Record::new("000001", EntryType::Article)
        .with_field(fields::TITLE, "Next-generation digital platforms")
        .with_field(fields::AUTHOR, "Rai, Arun")
        .with_field(fields::YEAR, "2022")
        .with_field(fields::JOURNAL, "MIS Quarterly")
        .with_field(fields::VOLUME, "12")
        .with_field(fields::NUMBER, "2")
        .with_field(fields::DOI, "10.25300/MISQ/2022/12345");
    (main, incoming)
}

/// Two duplicates with the same `colrev_id` and partially overlapping fields
pub fn scenario_duplicates() -> (Record, Record) {
    let mut first = prepared_article(
        "Webster2002",
        "crossref.bib/000001",
        "Webster, Jane and Watson, Richard T.",
        WEBSTER_TITLE,
        "2002",
    );
    first.update_field(fields::PAGES, "13-23", "crossref.bib/000001");
    first.update_field(fields::URL, "http://misq.org/webster/", "crossref.bib/000001");

    let mut second = prepared_article(
        "Webster2002a",
        "dblp.bib/000004",
        "WEBSTER, JANE and WATSON, RICHARD T.",
        WEBSTER_TITLE,
        "2002",
    );
    second.update_field(fields::PAGES, "13--23", "dblp.bib/000004");
    second.update_field(fields::URL, "https://misq.org/webster", "dblp.bib/000004");
    second.update_field(fields::DOI, "10.2307/4132319", "dblp.bib/000004");
    (first, second)
}

/// Records keyed by id, in the given order
pub fn records_dict(records: impl IntoIterator<Item = Record>) -> RecordsDict {
    records.into_iter().map(|r| (r.id.clone(), r)).collect()
}

/// Write a PDF with one line of text per page
pub fn write_pdf(path: &Path, pages: &[&str]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 18.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }
    finish(doc, pages_id, kids, resources_id, [595, 842], path);
}

/// Grayscale image placed on a page by name
pub struct GrayXObject<'a> {
    pub name: &'a str,
    pub width: u32,
    pub height: u32,
    /// Row-major 8-bit samples
    pub pixels: &'a [u8],
    pub compressed: bool,
}

/// Write a one-page 200x200pt PDF drawing `content` with `images` as
/// XObject resources
pub fn write_image_pdf(path: &Path, content: &str, images: &[GrayXObject<'_>]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut xobjects = lopdf::Dictionary::new();
    for image in images {
        let mut stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => image.width,
                "Height" => image.height,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            image.pixels.to_vec(),
        );
        if image.compressed {
            stream.compress().unwrap();
        }
        xobjects.set(image.name, doc.add_object(stream));
    }
    let resources_id = doc.add_object(dictionary! { "XObject" => xobjects });

    let content_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    finish(doc, pages_id, vec![page_id.into()], resources_id, [200, 200], path);
}

fn finish(
    mut doc: Document,
    pages_id: lopdf::ObjectId,
    kids: Vec<Object>,
    resources_id: lopdf::ObjectId,
    [width, height]: [i64; 2],
    path: &Path,
) {
    let count = i64::try_from(kids.len()).unwrap();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}
