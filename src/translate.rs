//! HTML element tree to document model translation.
//!
//! Every element is classified once into an [`ElementKind`] and handled by the
//! matching method of [`Translator`]. Block constructs (paragraphs, headings,
//! list items, tables) are always appended at the top level of the document;
//! inline content attaches to the current parent [`Container`], when there is
//! one.
//!
//! Styles are inherited by copy: an element's effective [`StyleMap`] is its
//! parent's map overlaid with its own `style` attribute.
//!
//! Recursion follows the element tree, whose depth [`crate::dom`] already
//! bounds by [`crate::dom::MAX_DEPTH`].

use crate::dom::{collapse_ws, ParsedDocument, ParsedElement, ParsedNode};
use crate::docx::{Container, DocumentBuilder};
use crate::error::Result;
use crate::format::{format_run, Emphasis};
use crate::hyperlink::emit_hyperlink;
use crate::model::{ListKind, ListMarker, Run};
use crate::style::{parse_style, Alignment, StyleMap};

const MAX_LIST_LEVEL: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    Paragraph,
    Heading(u8),
    List(ListKind),
    ListItem,
    Table,
    Anchor,
    LineBreak,
    Emphasis(Emphasis),
    /// Produces nothing: scripts, metadata, media.
    Ignored,
    Other,
}

impl ElementKind {
    fn of(tag: &str) -> Self {
        match tag {
            "p" => Self::Paragraph,
            "h1" => Self::Heading(1),
            "h2" => Self::Heading(2),
            "h3" => Self::Heading(3),
            "h4" => Self::Heading(4),
            "h5" => Self::Heading(5),
            "h6" => Self::Heading(6),
            "ul" => Self::List(ListKind::Bullet),
            "ol" => Self::List(ListKind::Numbered),
            "li" => Self::ListItem,
            "table" => Self::Table,
            "a" => Self::Anchor,
            "br" => Self::LineBreak,
            "b" | "strong" => Self::Emphasis(Emphasis {
                bold: true,
                ..Emphasis::default()
            }),
            "i" | "em" => Self::Emphasis(Emphasis {
                italic: true,
                ..Emphasis::default()
            }),
            "u" => Self::Emphasis(Emphasis {
                underline: true,
                ..Emphasis::default()
            }),
            "script" | "style" | "noscript" | "template" | "head" | "title" | "img" | "svg"
            | "math" => Self::Ignored,
            _ => Self::Other,
        }
    }
}

/// Inherited formatting state, copied into each child.
#[derive(Debug, Clone, Default)]
struct Scope {
    style: StyleMap,
    emphasis: Emphasis,
}

impl Scope {
    fn enter(&self, el: &ParsedElement) -> Scope {
        Scope {
            style: self.style.overlay(&parse_style(el.attr("style"))),
            emphasis: self.emphasis,
        }
    }

    fn alignment(&self) -> Alignment {
        Alignment::from_style(&self.style)
    }

    fn run(&self, text: &str) -> Result<Run> {
        Ok(Run::new(text, format_run(&self.style, self.emphasis)?))
    }
}

/// Translates the body of `doc` into a fresh builder, ready to finalize.
pub fn translate(doc: &ParsedDocument) -> Result<DocumentBuilder> {
    let mut builder = DocumentBuilder::new();
    Translator::new(&mut builder).children(doc.body(), None, &Scope::default())?;
    Ok(builder)
}

struct Translator<'d> {
    doc: &'d mut DocumentBuilder,
    list_depth: u32,
}

impl<'d> Translator<'d> {
    fn new(doc: &'d mut DocumentBuilder) -> Self {
        Self { doc, list_depth: 0 }
    }

    fn children(
        &mut self,
        el: &ParsedElement,
        parent: Option<Container>,
        scope: &Scope,
    ) -> Result<()> {
        for child in el.children() {
            match child {
                ParsedNode::Element(e) => self.element(e, parent, scope)?,
                ParsedNode::Text(t) => self.text(t, parent, scope)?,
            }
        }
        Ok(())
    }

    fn element(
        &mut self,
        el: &ParsedElement,
        parent: Option<Container>,
        inherited: &Scope,
    ) -> Result<()> {
        let scope = inherited.enter(el);
        match ElementKind::of(el.tag()) {
            ElementKind::Paragraph => {
                let p = self.doc.add_paragraph(scope.alignment());
                self.children(el, Some(p), &scope)
            }
            ElementKind::Heading(level) => self.heading(el, level, &scope),
            ElementKind::List(kind) => self.list(el, kind, &scope),
            ElementKind::ListItem => self.inline_container(el, parent, &scope),
            ElementKind::Table => self.table(el, &scope),
            ElementKind::Anchor => {
                match parent {
                    Some(p) => {
                        let text = collapse_ws(&el.text());
                        emit_hyperlink(self.doc, p, text.trim(), el.attr("href"));
                    }
                    None => log::debug!("top-level link {:?} dropped", el.attr("href")),
                }
                Ok(())
            }
            ElementKind::LineBreak => {
                if let Some(p) = parent {
                    self.doc.push_break(p);
                }
                Ok(())
            }
            ElementKind::Emphasis(extra) => {
                let scope = Scope {
                    emphasis: scope.emphasis.union(extra),
                    ..scope
                };
                self.inline_container(el, parent, &scope)
            }
            ElementKind::Ignored => Ok(()),
            ElementKind::Other => self.inline_container(el, parent, &scope),
        }
    }

    /// Spans, divs, emphasis and stray list items. Inside a container their
    /// content flows into it. At the top level, consecutive inline children
    /// share one paragraph, opened at the first visible text, while block
    /// children still append at the top level.
    fn inline_container(
        &mut self,
        el: &ParsedElement,
        parent: Option<Container>,
        scope: &Scope,
    ) -> Result<()> {
        if parent.is_some() {
            return self.children(el, parent, scope);
        }
        let mut open: Option<Container> = None;
        for child in el.children() {
            match child {
                ParsedNode::Element(e) if is_block(e) => {
                    open = None;
                    self.element(e, None, scope)?;
                }
                node => {
                    if open.is_none() {
                        if !has_visible_text(node) {
                            continue;
                        }
                        open = Some(self.doc.add_paragraph(scope.alignment()));
                    }
                    match node {
                        ParsedNode::Element(e) => self.element(e, open, scope)?,
                        ParsedNode::Text(t) => self.text(t, open, scope)?,
                    }
                }
            }
        }
        Ok(())
    }

    /// Bare text: a run on the parent, or its own paragraph at the top level.
    fn text(&mut self, raw: &str, parent: Option<Container>, scope: &Scope) -> Result<()> {
        let text = collapse_ws(raw);
        if text.trim().is_empty() {
            if let Some(p) = parent {
                if !text.is_empty() {
                    self.doc.push_space(p);
                }
            }
            return Ok(());
        }
        match parent {
            Some(p) => {
                let text = if self.doc.is_empty(p) {
                    text.trim_start()
                } else {
                    text.as_str()
                };
                let run = scope.run(text)?;
                self.doc.push_run(p, run);
            }
            None => {
                let run = scope.run(text.trim())?;
                let p = self.doc.add_paragraph(scope.alignment());
                self.doc.push_run(p, run);
            }
        }
        Ok(())
    }

    fn heading(&mut self, el: &ParsedElement, level: u8, scope: &Scope) -> Result<()> {
        let text = collapse_ws(&el.text());
        let text = text.trim();
        let run = if text.is_empty() {
            None
        } else {
            Some(scope.run(text)?)
        };
        let h = self.doc.add_heading(level, scope.alignment());
        if let Some(run) = run {
            self.doc.push_run(h, run);
        }
        Ok(())
    }

    fn list(&mut self, el: &ParsedElement, kind: ListKind, scope: &Scope) -> Result<()> {
        let num_id = self.doc.begin_list(kind);
        let marker = ListMarker {
            kind,
            num_id,
            level: self.list_depth.min(MAX_LIST_LEVEL),
        };
        self.list_depth += 1;
        let result = self.list_items(el, marker, scope);
        self.list_depth -= 1;
        result
    }

    fn list_items(&mut self, el: &ParsedElement, marker: ListMarker, scope: &Scope) -> Result<()> {
        for li in el.child_elements().filter(|c| c.tag() == "li") {
            let li_scope = scope.enter(li);
            let item = self.doc.add_list_item(marker, li_scope.alignment());
            self.children(li, Some(item), &li_scope)?;
        }
        Ok(())
    }

    fn table(&mut self, el: &ParsedElement, scope: &Scope) -> Result<()> {
        let mut rows = Vec::new();
        collect_rows(el, &mut rows);
        let Some(first) = rows.first() else {
            log::debug!("table without rows dropped");
            return Ok(());
        };
        let columns = cells_of(first).count();
        if columns == 0 {
            log::debug!("table whose first row has no cells dropped");
            return Ok(());
        }

        let table = self.doc.add_table(columns);
        for tr in rows {
            let row_scope = scope.enter(tr);
            let Some(row) = self.doc.add_table_row(table) else {
                return Ok(());
            };
            for (col, cell) in cells_of(tr).take(columns).enumerate() {
                let cell_scope = row_scope.enter(cell);
                let target = Container::Cell { table, row, col };
                self.doc.set_alignment(target, cell_scope.alignment());
                let text = collapse_ws(&cell.text());
                let text = text.trim();
                if !text.is_empty() {
                    let run = cell_scope.run(text)?;
                    self.doc.push_run(target, run);
                }
            }
        }
        Ok(())
    }
}

/// Whether `el` produces top-level blocks of its own.
fn is_block(el: &ParsedElement) -> bool {
    match ElementKind::of(el.tag()) {
        ElementKind::Paragraph
        | ElementKind::Heading(_)
        | ElementKind::List(_)
        | ElementKind::ListItem
        | ElementKind::Table => true,
        ElementKind::Emphasis(_) | ElementKind::Other => el.child_elements().any(is_block),
        ElementKind::Anchor | ElementKind::LineBreak | ElementKind::Ignored => false,
    }
}

fn has_visible_text(node: &ParsedNode) -> bool {
    match node {
        ParsedNode::Text(t) => !t.trim().is_empty(),
        ParsedNode::Element(e) => {
            ElementKind::of(e.tag()) != ElementKind::Ignored && !e.text().trim().is_empty()
        }
    }
}

/// `tr` descendants in document order, not descending into nested tables.
fn collect_rows<'a>(el: &'a ParsedElement, out: &mut Vec<&'a ParsedElement>) {
    for c in el.child_elements() {
        match c.tag() {
            "tr" => out.push(c),
            "table" => {}
            _ => collect_rows(c, out),
        }
    }
}

fn cells_of(tr: &ParsedElement) -> impl Iterator<Item = &ParsedElement> {
    tr.child_elements()
        .filter(|c| matches!(c.tag(), "th" | "td"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;
    use crate::format::{Rgb, RunFormat};
    use crate::hyperlink::LINK_COLOR;
    use crate::model::{Block, DocumentModel, Inline, ParagraphKind};

    fn model(html: &str) -> DocumentModel {
        translate(&ParsedDocument::parse(html)).unwrap().into_model()
    }

    fn texts(m: &DocumentModel) -> Vec<String> {
        m.paragraphs().map(|p| p.text()).collect()
    }

    #[test]
    fn block_order_mirrors_source_order() {
        let m = model(
            "<h1>Title</h1><p>one</p><table><tr><td>c</td></tr></table><h2>Sub</h2><p>two</p>",
        );
        assert_eq!(m.blocks.len(), 5);
        assert!(matches!(&m.blocks[0], Block::Paragraph(p) if p.kind == ParagraphKind::Heading(1)));
        assert_eq!(m.blocks[1].as_paragraph().unwrap().text(), "one");
        assert!(m.blocks[2].as_table().is_some());
        assert!(matches!(&m.blocks[3], Block::Paragraph(p) if p.kind == ParagraphKind::Heading(2)));
        assert_eq!(m.blocks[4].as_paragraph().unwrap().text(), "two");
    }

    #[test]
    fn bold_paragraph_yields_one_bold_run() {
        let m = model(r#"<p style="font-weight:bold">Hello</p>"#);
        let p = m.blocks[0].as_paragraph().unwrap();
        let runs: Vec<_> = p.runs().collect();
        assert_eq!(runs.len(), 1);
        assert_eq!(
            runs[0].format,
            RunFormat {
                bold: true,
                ..RunFormat::default()
            }
        );
    }

    #[test]
    fn bold_heading_yields_one_bold_run() {
        let m = model(r#"<h3 style="font-weight: bold">Head</h3>"#);
        let p = m.blocks[0].as_paragraph().unwrap();
        assert_eq!(p.kind, ParagraphKind::Heading(3));
        let runs: Vec<_> = p.runs().collect();
        assert_eq!(runs.len(), 1);
        assert!(runs[0].format.bold);
        assert!(!runs[0].format.italic);
    }

    #[test]
    fn color_is_parsed() {
        let m = model(r#"<p style="color:#FF0000">red</p>"#);
        let run = m.blocks[0].as_paragraph().unwrap().runs().next().unwrap();
        assert_eq!(run.format.color, Some(Rgb(255, 0, 0)));
    }

    #[test]
    fn malformed_color_fails_the_conversion() {
        let err = translate(&ParsedDocument::parse(r#"<p style="color:red-ish">x</p>"#)).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidColorFormat(_)));
    }

    #[test]
    fn malformed_font_size_fails_the_conversion() {
        let err = translate(&ParsedDocument::parse(r#"<h1 style="font-size: huge">x</h1>"#)).unwrap_err();
        assert!(matches!(err, ConvertError::InvalidFontSize(_)));
    }

    #[test]
    fn alignment_applies_to_blocks() {
        let m = model(r#"<p style="text-align: right">r</p><h2 style="text-align:center">c</h2><p style="text-align:upside">d</p>"#);
        let aligns: Vec<_> = m.paragraphs().map(|p| p.alignment).collect();
        assert_eq!(aligns, vec![Alignment::Right, Alignment::Center, Alignment::Left]);
    }

    #[test]
    fn unordered_list_yields_bullet_paragraphs() {
        let m = model("<ul><li>A</li><li>B</li></ul>");
        assert_eq!(m.blocks.len(), 2);
        assert_eq!(texts(&m), vec!["A", "B"]);
        for p in m.paragraphs() {
            assert!(matches!(
                p.kind,
                ParagraphKind::ListItem(ListMarker {
                    kind: ListKind::Bullet,
                    level: 0,
                    ..
                })
            ));
        }
    }

    #[test]
    fn ordered_lists_restart_numbering() {
        let m = model("<ol><li>1</li></ol><ol><li>again</li></ol>");
        let ids: Vec<u32> = m
            .paragraphs()
            .map(|p| match p.kind {
                ParagraphKind::ListItem(marker) => {
                    assert_eq!(marker.kind, ListKind::Numbered);
                    marker.num_id
                }
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn nested_list_follows_its_item_one_level_deeper() {
        let m = model("<ul><li>outer<ol><li>inner</li></ol></li><li>last</li></ul>");
        assert_eq!(texts(&m), vec!["outer", "inner", "last"]);
        let levels: Vec<u32> = m
            .paragraphs()
            .filter_map(|p| match p.kind {
                ParagraphKind::ListItem(marker) => Some(marker.level),
                _ => None,
            })
            .collect();
        assert_eq!(levels, vec![0, 1, 0]);
    }

    #[test]
    fn only_direct_li_children_become_items() {
        let m = model("<ul><li>A</li><div>stray</div></ul>");
        assert_eq!(texts(&m), vec!["A"]);
    }

    #[test]
    fn table_shape_and_cell_order() {
        let m = model("<table><tr><th>X</th><th>Y</th></tr><tr><td>1</td><td>2</td></tr></table>");
        let t = m.blocks[0].as_table().unwrap();
        assert_eq!(t.columns, 2);
        assert_eq!(t.rows.len(), 2);
        let cells: Vec<String> = t
            .rows
            .iter()
            .flat_map(|r| r.cells.iter().map(|c| c.paragraph.text()))
            .collect();
        assert_eq!(cells, vec!["X", "Y", "1", "2"]);
    }

    #[test]
    fn table_without_rows_is_dropped() {
        assert!(model("<table></table>").blocks.is_empty());
        assert!(model("<table><caption>none</caption></table>").blocks.is_empty());
    }

    #[test]
    fn extra_cells_are_dropped_and_short_rows_padded() {
        let m = model("<table><tr><td>a</td><td>b</td></tr><tr><td>1</td><td>2</td><td>3</td></tr><tr><td>z</td></tr></table>");
        let t = m.blocks[0].as_table().unwrap();
        assert!(t.rows.iter().all(|r| r.cells.len() == 2));
        assert_eq!(t.rows[1].cells[1].paragraph.text(), "2");
        assert_eq!(t.rows[2].cells[1].paragraph.text(), "");
    }

    #[test]
    fn cell_style_applies_to_cell_run() {
        let m = model(r#"<table><tr><td style="font-style: italic; text-align: center">x</td><td>y</td></tr></table>"#);
        let t = m.blocks[0].as_table().unwrap();
        let cell = &t.rows[0].cells[0].paragraph;
        assert_eq!(cell.alignment, Alignment::Center);
        assert!(cell.runs().next().unwrap().format.italic);
        assert!(!t.rows[0].cells[1].paragraph.runs().next().unwrap().format.italic);
    }

    #[test]
    fn link_in_paragraph_becomes_hyperlink() {
        let m = model(r#"<p>see <a href="https://x.test">text</a></p>"#);
        let p = m.blocks[0].as_paragraph().unwrap();
        let runs: Vec<_> = p.runs().collect();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].text, "text");
        assert_eq!(runs[1].link.as_ref().unwrap().target, "https://x.test");
        assert_eq!(runs[1].format.color, Some(LINK_COLOR));
        assert_eq!(m.relationships.len(), 1);
    }

    #[test]
    fn top_level_link_is_dropped() {
        let m = model(r#"<a href="https://x.test">text</a><p>after</p>"#);
        assert_eq!(m.blocks.len(), 1);
        assert_eq!(texts(&m), vec!["after"]);
        assert!(m.relationships.is_empty());
    }

    #[test]
    fn link_inside_list_item() {
        let m = model(r#"<ol><li><a href="https://x.test/a">a</a></li></ol>"#);
        let run = m.paragraphs().next().unwrap().runs().next().unwrap();
        assert_eq!(run.link.as_ref().unwrap().target, "https://x.test/a");
    }

    #[test]
    fn line_break_needs_a_parent() {
        let m = model("<p>a<br>b</p><br>");
        assert_eq!(m.blocks.len(), 1);
        let p = m.blocks[0].as_paragraph().unwrap();
        assert!(matches!(p.inlines[1], Inline::Break));
        assert_eq!(p.text(), "a\nb");
    }

    #[test]
    fn unknown_leaf_at_top_level_gets_its_own_paragraph() {
        let m = model("<span>loose</span><div>also</div>");
        assert_eq!(texts(&m), vec!["loose", "also"]);
    }

    #[test]
    fn top_level_inline_content_stays_in_one_paragraph() {
        let m = model("<div>Hello <b>world</b>!</div>");
        assert_eq!(m.blocks.len(), 1);
        assert_eq!(texts(&m), vec!["Hello world!"]);
        let p = m.blocks[0].as_paragraph().unwrap();
        assert!(p.runs().any(|r| r.text == "world" && r.format.bold));
    }

    #[test]
    fn link_inside_top_level_div_is_kept() {
        let m = model(r#"<div style="text-align:center">go <a href="https://x.test">there</a></div>"#);
        assert_eq!(m.blocks.len(), 1);
        let p = m.blocks[0].as_paragraph().unwrap();
        assert_eq!(p.alignment, Alignment::Center);
        assert_eq!(p.text(), "go there");
        assert_eq!(m.relationships.len(), 1);
    }

    #[test]
    fn blocks_split_inline_runs_of_a_container() {
        let m = model("<div>intro <i>x</i><p>para</p>tail <br> end<script>s</script></div>");
        assert_eq!(texts(&m), vec!["intro x", "para", "tail \n end"]);
    }

    #[test]
    fn whitespace_only_container_adds_nothing() {
        let m = model("<div>  <span> </span>\n</div><p>x</p>");
        assert_eq!(texts(&m), vec!["x"]);
    }

    #[test]
    fn stray_list_item_acts_like_a_container() {
        let m = model("<li>a <b>b</b></li>");
        assert_eq!(texts(&m), vec!["a b"]);
    }

    #[test]
    fn deep_nesting_translates_on_a_small_stack() {
        let html = format!("{}deep", "<span>".repeat(5000));
        let m = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || model(&html))
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(texts(&m), vec!["deep"]);
    }

    #[test]
    fn unknown_container_is_transparent() {
        let m = model("<div><p>one</p><section><p>two</p></section></div>");
        assert_eq!(texts(&m), vec!["one", "two"]);
    }

    #[test]
    fn emphasis_tags_style_their_runs() {
        let m = model("<p>plain <b>bold</b> <em>it</em> <u>under</u></p>");
        let p = m.blocks[0].as_paragraph().unwrap();
        let runs: Vec<_> = p.runs().collect();
        assert_eq!(runs[0].text, "plain ");
        assert!(runs[0].format.is_plain());
        assert!(runs[1].format.bold);
        assert!(runs.iter().any(|r| r.text.trim() == "it" && r.format.italic));
        assert!(runs.iter().any(|r| r.text.trim() == "under" && r.format.underline));
        assert_eq!(p.text(), "plain bold it under");
    }

    #[test]
    fn child_runs_inherit_parent_style_by_copy() {
        let m = model(r#"<p style="color:#00FF00"><span style="font-size:20pt">big</span> rest</p>"#);
        let p = m.blocks[0].as_paragraph().unwrap();
        let runs: Vec<_> = p.runs().collect();
        assert_eq!(runs[0].format.size, Some(20.0));
        assert_eq!(runs[0].format.color, Some(Rgb(0, 255, 0)));
        assert_eq!(runs[1].format.size, None);
        assert_eq!(runs[1].format.color, Some(Rgb(0, 255, 0)));
    }

    #[test]
    fn empty_heading_has_no_run() {
        let m = model("<h4>   </h4>");
        let p = m.blocks[0].as_paragraph().unwrap();
        assert_eq!(p.kind, ParagraphKind::Heading(4));
        assert!(p.inlines.is_empty());
    }

    #[test]
    fn scripts_and_images_produce_nothing() {
        let m = model("<script>var x = 1;</script><img src=\"a.png\"><style>p{}</style><p>ok</p>");
        assert_eq!(texts(&m), vec!["ok"]);
    }

    #[test]
    fn translation_is_idempotent() {
        let html = r#"<h1>T</h1><p style="color:#123456">a <a href="https://x.test">l</a></p><ul><li>x</li></ul>"#;
        assert_eq!(model(html), model(html));
    }
}
