//! Pipeline status reader.
//!
//! A series sheet is a grid of cells: row 0 is reserved, row 1 holds the header labels and
//! every following row is one chapter, with the chapter id in column 0. Status queries scan
//! the chapter rows in source order and stop at the first row that is not published yet,
//! the blocking chapter. Later rows are never inspected by those queries, so a source where
//! an earlier chapter is unpublished after a later one is reported as-is.

use crate::model::{ChapterRow, Role, SeriesSheet, Stage};

pub const HEADER_ROW: usize = 1;
pub const FIRST_CHAPTER_ROW: usize = 2;

const CHECK_MARKS: [&str; 5] = ["✅", "✔", "✔️", "☑", "☑️"];
const TRUTHY: [&str; 5] = ["true", "yes", "x", "si", "sí"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SheetError {
    #[error("sheet has no header row")]
    MissingHeader,

    #[error("header row has no {0:?} column")]
    MissingColumn(&'static str),
}

/// Lowercases and collapses runs of whitespace.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn is_checked(cell: &str) -> bool {
    let cell = cell.trim();
    if CHECK_MARKS.contains(&cell) {
        return true;
    }
    let lowered = cell.to_lowercase();
    TRUTHY.contains(&lowered.as_str())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    raw: usize,
    translation: Option<usize>,
    clean: Option<usize>,
    typeset: Option<usize>,
    published: usize,
    translator: Option<usize>,
    cleaner: Option<usize>,
    typer: Option<usize>,
}

impl Columns {
    fn detect(header: &[String]) -> Result<Self, SheetError> {
        let labels: Vec<String> = header.iter().map(|c| normalize_label(c)).collect();
        let exact = |wanted: &str| labels.iter().position(|l| l == wanted);
        let loose = |needle: &str| labels.iter().position(|l| l.contains(needle));

        let raw = exact(Stage::Raw.header_label())
            .or_else(|| loose("raw"))
            .ok_or(SheetError::MissingColumn(Stage::Raw.header_label()))?;
        let published = exact(Stage::Published.header_label())
            .or_else(|| loose("publish"))
            .or_else(|| loose("temple"))
            .ok_or(SheetError::MissingColumn(Stage::Published.header_label()))?;

        Ok(Self {
            raw,
            translation: exact(Stage::Translation.header_label()),
            clean: exact(Stage::Clean.header_label()),
            typeset: exact(Stage::Type.header_label()),
            published,
            translator: exact(Role::Translator.header_label()),
            cleaner: exact(Role::Cleaner.header_label()),
            typer: exact(Role::Typer.header_label()),
        })
    }

    fn stage(&self, stage: Stage) -> Option<usize> {
        match stage {
            Stage::Raw => Some(self.raw),
            Stage::Translation => self.translation,
            Stage::Clean => self.clean,
            Stage::Type => self.typeset,
            Stage::Published => Some(self.published),
        }
    }

    fn role(&self, role: Role) -> Option<usize> {
        match role {
            Role::Translator => self.translator,
            Role::Cleaner => self.cleaner,
            Role::Typer => self.typer,
        }
    }

    fn chapter(&self, cells: &[String]) -> Option<ChapterRow> {
        let id = cells.first().map(|c| c.trim()).unwrap_or_default();
        if id.is_empty() {
            return None;
        }

        let cell = |idx: Option<usize>| idx.and_then(|i| cells.get(i)).map(String::as_str);
        let mut row = ChapterRow::new(id);
        for stage in Stage::ALL {
            row.flags
                .set(stage, cell(self.stage(stage)).is_some_and(is_checked));
        }
        let assigned = |role: Role| {
            cell(self.role(role))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
        };
        row.translator = assigned(Role::Translator);
        row.cleaner = assigned(Role::Cleaner);
        row.typer = assigned(Role::Typer);
        Some(row)
    }
}

impl SeriesSheet {
    /// Builds the chapter view of a raw grid.
    ///
    /// Short rows read missing cells as unset. Rows without a chapter id are not provisioned
    /// yet and are dropped.
    pub fn parse(name: impl Into<String>, grid: &[Vec<String>]) -> Result<Self, SheetError> {
        let header = grid.get(HEADER_ROW).ok_or(SheetError::MissingHeader)?;
        let columns = Columns::detect(header)?;

        let rows = grid
            .iter()
            .skip(FIRST_CHAPTER_ROW)
            .filter_map(|cells| columns.chapter(cells))
            .collect();

        Ok(Self {
            name: name.into(),
            rows,
        })
    }

    /// First chapter, in row order, whose published flag is not set.
    pub fn next_blocking_chapter(&self) -> Option<&ChapterRow> {
        self.rows.iter().find(|row| !row.flags.published)
    }

    /// Blocking chapter id when that chapter has no RAW yet.
    pub fn raw_gap(&self) -> Option<&str> {
        self.next_blocking_chapter()
            .filter(|row| !row.flags.raw)
            .map(|row| row.id.as_str())
    }

    /// Roles without an assignee on the blocking chapter, in [`Role::ALL`] order.
    pub fn assignment_gaps(&self) -> Vec<Role> {
        let Some(row) = self.next_blocking_chapter() else {
            return Vec::new();
        };
        Role::ALL
            .into_iter()
            .filter(|role| row.assignee(*role).is_none())
            .collect()
    }

    /// First row with every stage done except publication.
    pub fn first_ready_chapter(&self) -> Option<&ChapterRow> {
        self.rows.iter().find(|row| row.flags.is_ready_to_publish())
    }

    /// `false` when some row after the blocking chapter is already published.
    pub fn is_publication_monotonic(&self) -> bool {
        let Some(blocking) = self.rows.iter().position(|row| !row.flags.published) else {
            return true;
        };
        !self.rows[blocking..].iter().any(|row| row.flags.published)
    }
}
