//! Tests for object streams (PDF 1.5+), parsed directly and through a full
//! file whose cross-reference stream points into them.

use pdf_forge::filters::{FlateFilter, StreamFilter};
use pdf_forge::object::{Dictionary, Object, ObjectRef};
use pdf_forge::objstm::parse_object_stream;
use pdf_forge::{Document, OpenMode, OpenOptions, ParserOptions};

fn object_stream(pairs: &str, body: &str, n: i64, compress: bool) -> Object {
    let mut data = pairs.as_bytes().to_vec();
    let first = data.len() as i64;
    data.extend_from_slice(body.as_bytes());

    let mut dict = Dictionary::new();
    dict.insert("Type".to_string(), Object::name("ObjStm"));
    dict.insert("N".to_string(), Object::Integer(n));
    dict.insert("First".to_string(), Object::Integer(first));
    if compress {
        data = FlateFilter::new().encode(&data).unwrap();
        dict.insert("Filter".to_string(), Object::name("FlateDecode"));
    }
    Object::stream(dict, data)
}

/// A PDF 1.5 file: catalog and page tree as plain objects, the page and the
/// info dictionary inside a Flate object stream, indexed by an
/// uncompressed xref stream with `/W [1 4 2]`.
fn build_pdf_with_object_stream() -> Vec<u8> {
    let mut out = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::new();

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
    offsets.push(out.len());
    out.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [4 0 R] /Count 1 >>\nendobj\n");

    let pairs = "4 0 5 56 ";
    let body = "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >> << /Title (Packed) >>";
    let Object::Stream { dict, data } = object_stream(pairs, body, 2, true) else {
        unreachable!()
    };
    offsets.push(out.len());
    out.extend_from_slice(b"3 0 obj\n<< ");
    for (key, value) in &dict {
        let value = match value {
            Object::Name(n) => format!("/{}", n),
            Object::Integer(i) => i.to_string(),
            other => panic!("unexpected {:?}", other),
        };
        out.extend_from_slice(format!("/{} {} ", key, value).as_bytes());
    }
    out.extend_from_slice(b">>\nstream\n");
    out.extend_from_slice(&data);
    out.extend_from_slice(b"\nendstream\nendobj\n");

    let xref_offset = out.len();
    let mut records: Vec<u8> = Vec::new();
    let mut push = |kind: u8, field2: u32, field3: u16| {
        records.push(kind);
        records.extend_from_slice(&field2.to_be_bytes());
        records.extend_from_slice(&field3.to_be_bytes());
    };
    push(0, 0, 65535);
    push(1, offsets[0] as u32, 0);
    push(1, offsets[1] as u32, 0);
    push(1, offsets[2] as u32, 0);
    push(2, 3, 0);
    push(2, 3, 1);
    push(1, xref_offset as u32, 0);

    out.extend_from_slice(
        format!(
            "6 0 obj\n<< /Type /XRef /W [1 4 2] /Size 7 /Root 1 0 R /Info 5 0 R /Length {} >>\nstream\n",
            records.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&records);
    out.extend_from_slice(b"\nendstream\nendobj\n");
    out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    out
}

// ============================================================================
// Direct parsing
// ============================================================================

#[test]
fn test_parse_flate_object_stream() {
    let stream = object_stream("10 0 11 3 12 9 ", "42 /Test [1 2 3]", 3, true);
    let objstm = parse_object_stream(&stream, &ParserOptions::default()).unwrap();

    assert_eq!(objstm.len(), 3);
    assert_eq!(objstm.get(10).and_then(|o| o.as_integer()), Some(42));
    assert_eq!(objstm.get(11).and_then(|o| o.as_name()), Some("Test"));
    assert_eq!(objstm.get(12).and_then(|o| o.as_array()).map(|a| a.len()), Some(3));
    assert_eq!(objstm.get_indexed(1, 11).and_then(|o| o.as_name()), Some("Test"));
    assert!(objstm.get_indexed(1, 12).is_none());
}

#[test]
fn test_wrong_type_is_rejected() {
    let mut stream = object_stream("1 0 ", "null", 1, false);
    if let Object::Stream { dict, .. } = &mut stream {
        dict.insert("Type".to_string(), Object::name("XRef"));
    }
    assert!(parse_object_stream(&stream, &ParserOptions::default()).is_err());
}

#[test]
fn test_first_beyond_data_is_rejected() {
    let mut stream = object_stream("1 0 ", "null", 1, false);
    if let Object::Stream { dict, .. } = &mut stream {
        dict.insert("First".to_string(), Object::Integer(500));
    }
    assert!(parse_object_stream(&stream, &ParserOptions::default()).is_err());
}

// ============================================================================
// Through the reader
// ============================================================================

#[test]
fn test_compressed_entries_resolve_and_container_is_dropped() {
    let data = build_pdf_with_object_stream();
    let doc = Document::from_bytes_with_options(
        &data,
        OpenOptions::default().with_mode(OpenMode::ReadOnly),
    )
    .unwrap();

    assert_eq!(doc.version(), (1, 5));
    let page = doc.get(ObjectRef::new(4, 0)).unwrap();
    assert_eq!(page.dict_type(), Some("Page"));
    assert_eq!(doc.info().and_then(|i| i.get("Title")), Some(&Object::string("Packed")));

    // Neither the object stream nor the xref stream survive loading.
    assert!(doc.get(ObjectRef::new(3, 0)).is_none());
    assert!(doc.get(ObjectRef::new(6, 0)).is_none());
    assert_eq!(doc.pages().unwrap(), vec![ObjectRef::new(4, 0)]);
}

#[test]
fn test_object_stream_file_rewrites_as_classic() {
    let data = build_pdf_with_object_stream();
    let mut doc = Document::from_bytes(&data).unwrap();
    let saved = doc.to_bytes().unwrap();

    let text = String::from_utf8_lossy(&saved);
    assert!(!text.contains("/ObjStm"));
    assert!(!text.contains("/XRef"));
    assert!(text.contains("\nxref\n"));

    let reread = Document::from_bytes(&saved).unwrap();
    assert_eq!(reread.pages().unwrap().len(), 1);
    assert_eq!(reread.info().and_then(|i| i.get("Title")), Some(&Object::string("Packed")));
}
