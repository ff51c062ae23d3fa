// OOXML serialization of a DocumentModel into a .docx zip package.

use crate::error::Result;
use crate::model::{
    Block, DocumentModel, Inline, ListKind, ListMarker, Paragraph, ParagraphKind, Run, Table,
};
use crate::style::Alignment;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

const NS_CT: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const NS_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_TYPE_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// US Letter with one inch margins, in twips.
const TEXT_WIDTH: usize = 12240 - 2 * 1440;

const MAX_LIST_LEVEL: u32 = 8;

fn xml_escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // not representable in XML 1.0
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            _ => out.push(ch),
        }
    }
    out
}

fn run_xml(run: &Run) -> String {
    let f = &run.format;
    let mut out = String::new();
    out.push_str("<w:r>");
    if !f.is_plain() {
        out.push_str("<w:rPr>");
        if f.bold {
            out.push_str("<w:b/>");
        }
        if f.italic {
            out.push_str("<w:i/>");
        }
        if let Some(color) = f.color {
            out.push_str(&format!("<w:color w:val=\"{}\"/>", color.to_hex()));
        }
        if let Some(size) = f.size {
            let half_points = (size * 2.0).round().clamp(2.0, 3276.0) as u32;
            out.push_str(&format!(
                "<w:sz w:val=\"{half_points}\"/><w:szCs w:val=\"{half_points}\"/>"
            ));
        }
        if f.underline {
            out.push_str("<w:u w:val=\"single\"/>");
        }
        out.push_str("</w:rPr>");
    }
    out.push_str("<w:t xml:space=\"preserve\">");
    out.push_str(&xml_escape_text(&run.text));
    out.push_str("</w:t></w:r>");
    out
}

fn jc_value(alignment: Alignment) -> Option<&'static str> {
    match alignment {
        Alignment::Left => None,
        Alignment::Center => Some("center"),
        Alignment::Right => Some("right"),
        Alignment::Justify => Some("both"),
    }
}

fn paragraph_xml(p: &Paragraph) -> String {
    let mut out = String::new();
    out.push_str("<w:p>");

    let jc = jc_value(p.alignment);
    if p.kind != ParagraphKind::Normal || jc.is_some() {
        out.push_str("<w:pPr>");
        match p.kind {
            ParagraphKind::Normal => {}
            ParagraphKind::Heading(level) => {
                out.push_str(&format!("<w:pStyle w:val=\"Heading{level}\"/>"))
            }
            ParagraphKind::ListItem(ListMarker { kind, num_id, level }) => {
                let style = match kind {
                    ListKind::Bullet => "ListBullet",
                    ListKind::Numbered => "ListNumber",
                };
                out.push_str(&format!("<w:pStyle w:val=\"{style}\"/>"));
                out.push_str("<w:numPr>");
                out.push_str(&format!("<w:ilvl w:val=\"{}\"/>", level.min(MAX_LIST_LEVEL)));
                out.push_str(&format!("<w:numId w:val=\"{num_id}\"/>"));
                out.push_str("</w:numPr>");
            }
        }
        if let Some(jc) = jc {
            out.push_str(&format!("<w:jc w:val=\"{jc}\"/>"));
        }
        out.push_str("</w:pPr>");
    }

    for inline in &p.inlines {
        match inline {
            Inline::Break => out.push_str("<w:r><w:br/></w:r>"),
            Inline::Run(run) => match &run.link {
                Some(link) => {
                    out.push_str(&format!(
                        "<w:hyperlink r:id=\"{}\" w:history=\"1\">",
                        link.rel_id
                    ));
                    out.push_str(&run_xml(run));
                    out.push_str("</w:hyperlink>");
                }
                None => out.push_str(&run_xml(run)),
            },
        }
    }

    out.push_str("</w:p>");
    out
}

fn table_xml(t: &Table) -> String {
    let col_width = TEXT_WIDTH / t.columns.max(1);
    let mut out = String::new();
    out.push_str("<w:tbl>");
    out.push_str("<w:tblPr>");
    out.push_str("<w:tblStyle w:val=\"TableGrid\"/>");
    out.push_str("<w:tblW w:w=\"0\" w:type=\"auto\"/>");
    out.push_str("<w:tblLook w:val=\"04A0\" w:firstRow=\"1\" w:lastRow=\"0\" w:firstColumn=\"1\" w:lastColumn=\"0\" w:noHBand=\"0\" w:noVBand=\"1\"/>");
    out.push_str("</w:tblPr>");

    out.push_str("<w:tblGrid>");
    for _ in 0..t.columns {
        out.push_str(&format!("<w:gridCol w:w=\"{col_width}\"/>"));
    }
    out.push_str("</w:tblGrid>");

    for row in &t.rows {
        out.push_str("<w:tr>");
        for cell in &row.cells {
            out.push_str("<w:tc>");
            out.push_str(&format!(
                "<w:tcPr><w:tcW w:w=\"{col_width}\" w:type=\"dxa\"/></w:tcPr>"
            ));
            out.push_str(&paragraph_xml(&cell.paragraph));
            out.push_str("</w:tc>");
        }
        out.push_str("</w:tr>");
    }

    out.push_str("</w:tbl>");
    out
}

pub fn document_xml(model: &DocumentModel) -> String {
    let mut body = String::new();
    for b in &model.blocks {
        match b {
            Block::Paragraph(p) => body.push_str(&paragraph_xml(p)),
            Block::Table(t) => body.push_str(&table_xml(t)),
        }
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"
 xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    {body}
    <w:sectPr>
      <w:pgSz w:w="12240" w:h="15840"/>
      <w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="708" w:footer="708" w:gutter="0"/>
      <w:cols w:space="708"/>
      <w:docGrid w:linePitch="360"/>
    </w:sectPr>
  </w:body>
</w:document>"#
    )
}

const WML_CT: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml";

fn content_types_xml(has_numbering: bool) -> String {
    let mut parts = vec![
        ("/word/document.xml", "document.main"),
        ("/word/styles.xml", "styles"),
    ];
    if has_numbering {
        parts.push(("/word/numbering.xml", "numbering"));
    }
    let overrides: String = parts
        .iter()
        .map(|(name, kind)| {
            format!("  <Override PartName=\"{name}\" ContentType=\"{WML_CT}.{kind}+xml\"/>\n")
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="{NS_CT}">
  <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
  <Default Extension="xml" ContentType="application/xml"/>
{overrides}</Types>"#
    )
}

fn rels_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{NS_RELS}">
  <Relationship Id="rId1" Type="{REL_TYPE_BASE}/officeDocument" Target="word/document.xml"/>
</Relationships>"#
    )
}

pub fn document_rels_xml(model: &DocumentModel) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    out.push_str(&format!(r#"<Relationships xmlns="{NS_RELS}">"#));
    out.push('\n');
    out.push_str(&format!(
        r#"  <Relationship Id="rId1" Type="{REL_TYPE_BASE}/styles" Target="styles.xml"/>"#
    ));
    out.push('\n');
    if !model.numbering.is_empty() {
        out.push_str(&format!(
            r#"  <Relationship Id="rId2" Type="{REL_TYPE_BASE}/numbering" Target="numbering.xml"/>"#
        ));
        out.push('\n');
    }
    for rel in &model.relationships {
        out.push_str(&format!(
            r#"  <Relationship Id="{id}" Type="{REL_TYPE_BASE}/hyperlink" Target="{target}" TargetMode="External"/>"#,
            id = rel.id,
            target = xml_escape_text(&rel.target),
        ));
        out.push('\n');
    }
    out.push_str("</Relationships>");
    out
}

fn heading_style_xml(level: u8) -> String {
    let (size, before) = match level {
        1 => (32, 360),
        2 => (28, 240),
        3 => (26, 240),
        4 => (24, 200),
        _ => (22, 200),
    };
    format!(
        r#"  <w:style w:type="paragraph" w:styleId="Heading{level}">
    <w:name w:val="heading {level}"/>
    <w:basedOn w:val="Normal"/>
    <w:next w:val="Normal"/>
    <w:uiPriority w:val="9"/>
    <w:qFormat/>
    <w:pPr>
      <w:keepNext/>
      <w:spacing w:before="{before}" w:after="120"/>
      <w:outlineLvl w:val="{outline}"/>
    </w:pPr>
    <w:rPr>
      <w:b/>
      <w:sz w:val="{size}"/>
    </w:rPr>
  </w:style>
"#,
        outline = level - 1,
    )
}

fn styles_xml() -> String {
    let mut out = String::new();
    out.push_str(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:docDefaults>
    <w:rPrDefault><w:rPr><w:sz w:val="22"/><w:szCs w:val="22"/></w:rPr></w:rPrDefault>
    <w:pPrDefault><w:pPr><w:spacing w:after="160" w:line="259" w:lineRule="auto"/></w:pPr></w:pPrDefault>
  </w:docDefaults>
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal">
    <w:name w:val="Normal"/>
    <w:qFormat/>
  </w:style>
"#,
    );
    for level in 1..=6 {
        out.push_str(&heading_style_xml(level));
    }
    out.push_str(
        r#"  <w:style w:type="paragraph" w:styleId="ListBullet">
    <w:name w:val="List Bullet"/>
    <w:basedOn w:val="Normal"/>
    <w:uiPriority w:val="99"/>
    <w:pPr><w:contextualSpacing/></w:pPr>
  </w:style>
  <w:style w:type="paragraph" w:styleId="ListNumber">
    <w:name w:val="List Number"/>
    <w:basedOn w:val="Normal"/>
    <w:uiPriority w:val="99"/>
    <w:pPr><w:contextualSpacing/></w:pPr>
  </w:style>
  <w:style w:type="table" w:default="1" w:styleId="TableNormal">
    <w:name w:val="Normal Table"/>
    <w:uiPriority w:val="99"/>
    <w:tblPr>
      <w:tblInd w:w="0" w:type="dxa"/>
      <w:tblCellMar>
        <w:top w:w="0" w:type="dxa"/>
        <w:left w:w="108" w:type="dxa"/>
        <w:bottom w:w="0" w:type="dxa"/>
        <w:right w:w="108" w:type="dxa"/>
      </w:tblCellMar>
    </w:tblPr>
  </w:style>
  <w:style w:type="table" w:styleId="TableGrid">
    <w:name w:val="Table Grid"/>
    <w:basedOn w:val="TableNormal"/>
    <w:uiPriority w:val="39"/>
    <w:pPr><w:spacing w:after="0" w:line="240" w:lineRule="auto"/></w:pPr>
    <w:tblPr>
      <w:tblBorders>
        <w:top w:val="single" w:sz="4" w:space="0" w:color="auto"/>
        <w:left w:val="single" w:sz="4" w:space="0" w:color="auto"/>
        <w:bottom w:val="single" w:sz="4" w:space="0" w:color="auto"/>
        <w:right w:val="single" w:sz="4" w:space="0" w:color="auto"/>
        <w:insideH w:val="single" w:sz="4" w:space="0" w:color="auto"/>
        <w:insideV w:val="single" w:sz="4" w:space="0" w:color="auto"/>
      </w:tblBorders>
    </w:tblPr>
  </w:style>
</w:styles>"#,
    );
    out
}

fn abstract_num_xml(id: u32, kind: ListKind) -> String {
    let mut out = String::new();
    out.push_str(&format!("  <w:abstractNum w:abstractNumId=\"{id}\">\n"));
    out.push_str("    <w:multiLevelType w:val=\"hybridMultilevel\"/>\n");
    for ilvl in 0..=MAX_LIST_LEVEL {
        let (fmt, text) = match kind {
            ListKind::Bullet => ("bullet", "•".to_string()),
            ListKind::Numbered => ("decimal", format!("%{}.", ilvl + 1)),
        };
        let indent = 720 * (ilvl + 1);
        out.push_str(&format!(
            "    <w:lvl w:ilvl=\"{ilvl}\"><w:start w:val=\"1\"/><w:numFmt w:val=\"{fmt}\"/><w:lvlText w:val=\"{text}\"/><w:lvlJc w:val=\"left\"/><w:pPr><w:ind w:left=\"{indent}\" w:hanging=\"360\"/></w:pPr></w:lvl>\n"
        ));
    }
    out.push_str("  </w:abstractNum>\n");
    out
}

fn numbering_xml(model: &DocumentModel) -> String {
    let mut out = String::new();
    out.push_str(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:numbering xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
"#,
    );
    out.push_str(&abstract_num_xml(1, ListKind::Bullet));
    out.push_str(&abstract_num_xml(2, ListKind::Numbered));
    for n in &model.numbering {
        match n.kind {
            ListKind::Bullet => out.push_str(&format!(
                "  <w:num w:numId=\"{}\"><w:abstractNumId w:val=\"1\"/></w:num>\n",
                n.num_id
            )),
            ListKind::Numbered => {
                out.push_str(&format!(
                    "  <w:num w:numId=\"{}\"><w:abstractNumId w:val=\"2\"/>",
                    n.num_id
                ));
                for ilvl in 0..=MAX_LIST_LEVEL {
                    out.push_str(&format!(
                        "<w:lvlOverride w:ilvl=\"{ilvl}\"><w:startOverride w:val=\"1\"/></w:lvlOverride>"
                    ));
                }
                out.push_str("</w:num>\n");
            }
        }
    }
    out.push_str("</w:numbering>");
    out
}

/// Writes the complete package. Nothing time-dependent is embedded, so equal
/// models produce equal bytes.
pub fn write_package(model: &DocumentModel) -> Result<Vec<u8>> {
    let has_numbering = !model.numbering.is_empty();
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    zip.start_file("[Content_Types].xml", opts)?;
    zip.write_all(content_types_xml(has_numbering).as_bytes())?;

    zip.start_file("_rels/.rels", opts)?;
    zip.write_all(rels_xml().as_bytes())?;

    zip.start_file("word/document.xml", opts)?;
    zip.write_all(document_xml(model).as_bytes())?;

    zip.start_file("word/styles.xml", opts)?;
    zip.write_all(styles_xml().as_bytes())?;

    if has_numbering {
        zip.start_file("word/numbering.xml", opts)?;
        zip.write_all(numbering_xml(model).as_bytes())?;
    }

    zip.start_file("word/_rels/document.xml.rels", opts)?;
    zip.write_all(document_rels_xml(model).as_bytes())?;

    Ok(zip.finish()?.into_inner())
}
