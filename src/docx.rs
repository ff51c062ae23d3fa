//! Document assembly.
//!
//! [`DocumentBuilder`] owns the [`DocumentModel`] of one conversion. The
//! translator appends blocks through it and addresses inline targets with
//! [`Container`] handles; [`DocumentBuilder::finalize`] consumes the builder
//! and writes the OOXML package, so a model is serialized at most once.

use crate::error::Result;
use crate::format::RunFormat;
use crate::model::{
    Block, DocumentModel, Inline, ListKind, ListMarker, NumberingInstance, Paragraph,
    ParagraphKind, Relationship, Run, Table, TableCell, TableRow,
};
use crate::package;
use crate::style::Alignment;

/// Where inline content attaches: a top-level paragraph or one table cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Paragraph(usize),
    Cell { table: usize, row: usize, col: usize },
}

/// Shared by every bullet list; ordered lists get their own instance so each
/// one restarts at 1.
const BULLET_NUM_ID: u32 = 1;

/// Hyperlink relationship ids start after the styles (rId1) and numbering
/// (rId2) parts.
const FIRST_LINK_REL: u32 = 3;

#[derive(Debug)]
pub struct DocumentBuilder {
    model: DocumentModel,
    next_rel: u32,
    next_num: u32,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            model: DocumentModel::default(),
            next_rel: FIRST_LINK_REL,
            next_num: BULLET_NUM_ID + 1,
        }
    }

    pub fn model(&self) -> &DocumentModel {
        &self.model
    }

    pub fn into_model(self) -> DocumentModel {
        self.model
    }

    pub fn add_paragraph(&mut self, alignment: Alignment) -> Container {
        self.push_paragraph(Paragraph::new(ParagraphKind::Normal, alignment))
    }

    pub fn add_heading(&mut self, level: u8, alignment: Alignment) -> Container {
        let level = level.clamp(1, 6);
        self.push_paragraph(Paragraph::new(ParagraphKind::Heading(level), alignment))
    }

    pub fn add_list_item(&mut self, marker: ListMarker, alignment: Alignment) -> Container {
        self.push_paragraph(Paragraph::new(ParagraphKind::ListItem(marker), alignment))
    }

    /// Returns the numbering instance for a new list of `kind`.
    pub fn begin_list(&mut self, kind: ListKind) -> u32 {
        let num_id = match kind {
            ListKind::Bullet => BULLET_NUM_ID,
            ListKind::Numbered => {
                let id = self.next_num;
                self.next_num += 1;
                id
            }
        };
        if !self.model.numbering.iter().any(|n| n.num_id == num_id) {
            self.model.numbering.push(NumberingInstance { num_id, kind });
        }
        num_id
    }

    /// Appends an empty table and returns its block index.
    pub fn add_table(&mut self, columns: usize) -> usize {
        self.model.blocks.push(Block::Table(Table {
            columns,
            rows: Vec::new(),
        }));
        self.model.blocks.len() - 1
    }

    /// Appends a row of empty cells and returns its index, or `None` when
    /// `table` does not name a table block.
    pub fn add_table_row(&mut self, table: usize) -> Option<usize> {
        let Some(Block::Table(t)) = self.model.blocks.get_mut(table) else {
            return None;
        };
        t.rows.push(TableRow {
            cells: vec![TableCell::default(); t.columns],
        });
        Some(t.rows.len() - 1)
    }

    pub fn push_run(&mut self, container: Container, run: Run) {
        match self.paragraph_mut(container) {
            Some(p) => p.inlines.push(Inline::Run(run)),
            None => log::debug!("run for missing container {container:?} dropped"),
        }
    }

    /// Separates the next inline from what `container` already holds. A
    /// leading or doubled space is never produced.
    pub fn push_space(&mut self, container: Container) {
        let Some(p) = self.paragraph_mut(container) else {
            return;
        };
        match p.inlines.last_mut() {
            Some(Inline::Run(run)) if run.text.ends_with(' ') => {}
            Some(Inline::Run(run)) if run.link.is_none() => run.text.push(' '),
            Some(Inline::Run(_)) => p
                .inlines
                .push(Inline::Run(Run::new(" ", RunFormat::default()))),
            Some(Inline::Break) | None => {}
        }
    }

    pub fn push_break(&mut self, container: Container) {
        if let Some(p) = self.paragraph_mut(container) {
            p.inlines.push(Inline::Break);
        }
    }

    pub fn set_alignment(&mut self, container: Container, alignment: Alignment) {
        if let Some(p) = self.paragraph_mut(container) {
            p.alignment = alignment;
        }
    }

    /// True when nothing has been attached to `container` yet.
    pub fn is_empty(&self, container: Container) -> bool {
        self.paragraph(container)
            .map_or(true, |p| p.inlines.is_empty())
    }

    /// Registers an external hyperlink target and returns its fresh
    /// relationship id. Repeated targets get distinct ids.
    pub fn add_hyperlink_relationship(&mut self, target: &str) -> String {
        let id = format!("rId{}", self.next_rel);
        self.next_rel += 1;
        self.model.relationships.push(Relationship {
            id: id.clone(),
            target: target.to_string(),
        });
        id
    }

    /// Serializes the finished document into DOCX bytes.
    pub fn finalize(self) -> Result<Vec<u8>> {
        log::debug!(
            "finalizing document: {} blocks, {} relationships",
            self.model.blocks.len(),
            self.model.relationships.len()
        );
        package::write_package(&self.model)
    }

    fn push_paragraph(&mut self, p: Paragraph) -> Container {
        self.model.blocks.push(Block::Paragraph(p));
        Container::Paragraph(self.model.blocks.len() - 1)
    }

    fn paragraph(&self, container: Container) -> Option<&Paragraph> {
        match container {
            Container::Paragraph(i) => self.model.blocks.get(i)?.as_paragraph(),
            Container::Cell { table, row, col } => {
                let t = self.model.blocks.get(table)?.as_table()?;
                Some(&t.rows.get(row)?.cells.get(col)?.paragraph)
            }
        }
    }

    fn paragraph_mut(&mut self, container: Container) -> Option<&mut Paragraph> {
        match container {
            Container::Paragraph(i) => match self.model.blocks.get_mut(i)? {
                Block::Paragraph(p) => Some(p),
                Block::Table(_) => None,
            },
            Container::Cell { table, row, col } => match self.model.blocks.get_mut(table)? {
                Block::Table(t) => Some(&mut t.rows.get_mut(row)?.cells.get_mut(col)?.paragraph),
                Block::Paragraph(_) => None,
            },
        }
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
