//! DOCX packages to Markdown, through the public API.

mod common;

use common::{document_xml, docx, resume_docx};
use jobsmith::convert::{ConversionError, docx_to_html, docx_to_markdown};

#[test]
fn test_resume_to_markdown() {
    let markdown = docx_to_markdown(&resume_docx()).unwrap();
    assert_eq!(
        markdown,
        "# Jane Doe\n\n\
         Backend engineer with **8 years** of Rust.\n\n\
         ## Experience\n\n\
         - Built a payments ledger\n\
         - Led a team of four"
    );
}

#[test]
fn test_hyperlinks_resolve_through_relationships() {
    let body = r#"<w:p><w:r><w:t xml:space="preserve">Code: </w:t></w:r><w:hyperlink r:id="rId7"><w:r><w:t>github.com/jane</w:t></w:r></w:hyperlink></w:p>"#;
    let rels = r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://github.com/jane" TargetMode="External"/></Relationships>"#;
    let bytes = docx(&[
        ("word/document.xml", &document_xml(body)),
        ("word/_rels/document.xml.rels", rels),
    ]);

    assert_eq!(
        docx_to_markdown(&bytes).unwrap(),
        "Code: [github.com/jane](https://github.com/jane)"
    );
}

#[test]
fn test_ordered_list_and_table() {
    let body = concat!(
        r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="4"/></w:numPr></w:pPr><w:r><w:t>Design</w:t></w:r></w:p>"#,
        r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="4"/></w:numPr></w:pPr><w:r><w:t>Ship</w:t></w:r></w:p>"#,
        r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>Skill</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Years</w:t></w:r></w:p></w:tc></w:tr>"#,
        r#"<w:tr><w:tc><w:p><w:r><w:t>Rust</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>8</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
    );
    let numbering = r#"<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:abstractNum w:abstractNumId="3"><w:lvl w:ilvl="0"><w:numFmt w:val="decimal"/></w:lvl></w:abstractNum><w:num w:numId="4"><w:abstractNumId w:val="3"/></w:num></w:numbering>"#;
    let bytes = docx(&[
        ("word/document.xml", &document_xml(body)),
        ("word/numbering.xml", numbering),
    ]);

    assert_eq!(
        docx_to_markdown(&bytes).unwrap(),
        "1. Design\n2. Ship\n\n| Skill | Years |\n| --- | --- |\n| Rust | 8 |"
    );
}

#[test]
fn test_html_is_semantic() {
    let html = docx_to_html(&resume_docx()).unwrap();
    assert!(html.starts_with("<h1>Jane Doe</h1>"));
    assert!(html.contains("<ul><li>Built a payments ledger</li><li>Led a team of four</li></ul>"));
}

#[test]
fn test_rejects_non_docx_input() {
    assert!(matches!(
        docx_to_markdown(b"PK but not really"),
        Err(ConversionError::Package(_))
    ));

    let no_document = docx(&[("word/styles.xml", "<w:styles/>")]);
    assert!(matches!(
        docx_to_markdown(&no_document),
        Err(ConversionError::MissingPart("word/document.xml"))
    ));

    let blank = docx(&[("word/document.xml", &document_xml("<w:p></w:p>"))]);
    assert!(matches!(docx_to_markdown(&blank), Err(ConversionError::Empty)));
}

#[test]
fn test_malformed_xml_is_reported() {
    let broken = docx(&[("word/document.xml", "<w:document><w:body><w:p></w:body>")]);
    match docx_to_markdown(&broken) {
        Err(ConversionError::Xml { part, .. }) => assert_eq!(part, "word/document.xml"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_huge_list_level_stays_bounded() {
    let body = concat!(
        r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="50000000"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>Deep</w:t></w:r></w:p>"#,
        r#"<w:p><w:r><w:t>After</w:t></w:r></w:p>"#,
    );
    let bytes = docx(&[("word/document.xml", &document_xml(body))]);

    let html = docx_to_html(&bytes).unwrap();
    assert_eq!(html.matches("<ul>").count(), 9);
    assert!(html.len() < 1024);

    let markdown = docx_to_markdown(&bytes).unwrap();
    assert!(markdown.contains("Deep"));
    assert!(markdown.ends_with("\n\nAfter"));
}
