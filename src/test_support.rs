//! In-memory fixtures shared by the unit tests

use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Build a ZIP archive in memory. Names ending in `/` become directories.
pub fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions<'_, ()> =
        FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, data) in files {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
            continue;
        }
        zip.start_file(*name, options).unwrap();
        zip.write_all(data).unwrap();
    }

    zip.finish().unwrap().into_inner()
}

/// Minimal single-organization SCORM 1.2 manifest
pub const SIMPLE_MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest identifier="course-1" version="1.0"
    xmlns="http://www.imsproject.org/xsd/imscp_rootv1p1p2"
    xmlns:adlcp="http://www.adlnet.org/xsd/adlcp_rootv1p2">
  <metadata>
    <schema>ADL SCORM</schema>
    <schemaversion>1.2</schemaversion>
  </metadata>
  <organizations default="ORG-1">
    <organization identifier="ORG-1">
      <title>Intro to Rust</title>
      <item identifier="MOD-1">
        <title>Getting Started</title>
        <item identifier="LES-1" identifierref="RES-1">
          <title>Installing</title>
        </item>
        <item identifier="LES-2" identifierref="RES-2">
          <title>Hello World</title>
        </item>
      </item>
      <item identifier="MOD-2" identifierref="RES-3">
        <title>Ownership</title>
      </item>
    </organization>
  </organizations>
  <resources>
    <resource identifier="RES-1" type="webcontent" adlcp:scormtype="sco" href="content/install.html">
      <file href="content/install.html"/>
    </resource>
    <resource identifier="RES-2" type="webcontent" adlcp:scormtype="sco" href="content/hello.html">
      <file href="content/hello.html"/>
      <file href="content/hello.css"/>
    </resource>
    <resource identifier="RES-3" type="webcontent" adlcp:scormtype="asset" href="content/ownership.pdf">
      <file href="content/ownership.pdf"/>
    </resource>
  </resources>
</manifest>
"#;

const WORD_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Wrap body XML in a `word/document.xml` part
pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{}"><w:body>{}<w:sectPr/></w:body></w:document>"#,
        WORD_NS, body
    )
}

/// One paragraph; `style` is a style ID, `None` means the default style
pub fn paragraph(style: Option<&str>, text: &str) -> String {
    let props = style
        .map(|s| format!(r#"<w:pPr><w:pStyle w:val="{}"/></w:pPr>"#, s))
        .unwrap_or_default();
    format!(r#"<w:p>{}<w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, props, text)
}

/// Styles part mapping the IDs used in tests to Word's display names
pub const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:style w:type="paragraph" w:styleId="Normal"><w:name w:val="Normal"/></w:style>
  <w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style>
  <w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/></w:style>
  <w:style w:type="paragraph" w:styleId="Title"><w:name w:val="Title"/></w:style>
  <w:style w:type="paragraph" w:styleId="ListBullet"><w:name w:val="List Bullet"/></w:style>
  <w:style w:type="paragraph" w:styleId="Quote"><w:name w:val="Quote"/></w:style>
  <w:style w:type="paragraph" w:styleId="FancyCallout"><w:name w:val="Fancy Callout"/></w:style>
</w:styles>
"#;

pub const CORE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties"
    xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/">
  <dc:title>Lab Guide</dc:title>
  <dc:creator>Course Team</dc:creator>
  <dcterms:created>2024-03-01T10:00:00Z</dcterms:created>
</cp:coreProperties>
"#;

/// Build a DOCX package with styles and core properties around `body`
pub fn build_docx(body: &str) -> Vec<u8> {
    let document = document_xml(body);
    build_zip(&[
        ("[Content_Types].xml", b"<Types/>"),
        ("word/document.xml", document.as_bytes()),
        ("word/styles.xml", STYLES_XML.as_bytes()),
        ("docProps/core.xml", CORE_XML.as_bytes()),
    ])
}
