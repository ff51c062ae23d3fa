// In-memory word-processing document built by the translator.

use crate::format::RunFormat;
use crate::style::Alignment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Bullet,
    Numbered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListMarker {
    pub kind: ListKind,
    /// Numbering instance (`w:numId`).
    pub num_id: u32,
    /// Nesting level (`w:ilvl`), 0..=8.
    pub level: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphKind {
    Normal,
    /// Level 1..=6.
    Heading(u8),
    ListItem(ListMarker),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperlink {
    pub rel_id: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub text: String,
    pub format: RunFormat,
    pub link: Option<Hyperlink>,
}

impl Run {
    pub fn new(text: impl Into<String>, format: RunFormat) -> Self {
        Self {
            text: text.into(),
            format,
            link: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Run(Run),
    Break,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub kind: ParagraphKind,
    pub alignment: Alignment,
    pub inlines: Vec<Inline>,
}

impl Paragraph {
    pub fn new(kind: ParagraphKind, alignment: Alignment) -> Self {
        Self {
            kind,
            alignment,
            inlines: Vec::new(),
        }
    }

    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.inlines.iter().filter_map(|i| match i {
            Inline::Run(r) => Some(r),
            Inline::Break => None,
        })
    }

    /// Text of all runs; breaks read as newlines.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for inline in &self.inlines {
            match inline {
                Inline::Run(r) => out.push_str(&r.text),
                Inline::Break => out.push('\n'),
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableCell {
    pub paragraph: Paragraph,
}

impl Default for TableCell {
    fn default() -> Self {
        Self {
            paragraph: Paragraph::new(ParagraphKind::Normal, Alignment::Left),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: usize,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

impl Block {
    pub fn as_paragraph(&self) -> Option<&Paragraph> {
        match self {
            Block::Paragraph(p) => Some(p),
            Block::Table(_) => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Block::Table(t) => Some(t),
            Block::Paragraph(_) => None,
        }
    }
}

/// External target registered in `word/_rels/document.xml.rels`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberingInstance {
    pub num_id: u32,
    pub kind: ListKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentModel {
    pub blocks: Vec<Block>,
    pub relationships: Vec<Relationship>,
    pub numbering: Vec<NumberingInstance>,
}

impl DocumentModel {
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.blocks.iter().filter_map(Block::as_paragraph)
    }

    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.blocks.iter().filter_map(Block::as_table)
    }
}
