use std::fmt;

use serde::{Deserialize, Serialize};

/// Pipeline stage with a binary completion flag, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Raw,
    Translation,
    Clean,
    Type,
    Published,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Raw,
        Stage::Translation,
        Stage::Clean,
        Stage::Type,
        Stage::Published,
    ];

    /// Header label in the tabular source (already normalized).
    pub fn header_label(self) -> &'static str {
        match self {
            Stage::Raw => "raw uploaded",
            Stage::Translation => "translation done",
            Stage::Clean => "clean done",
            Stage::Type => "type done",
            Stage::Published => "published",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Raw => "RAW",
            Stage::Translation => "translation",
            Stage::Clean => "clean",
            Stage::Type => "type",
            Stage::Published => "published",
        };
        f.write_str(name)
    }
}

/// Assignable role. `ALL` is the fixed order assignment gaps are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Translator,
    Cleaner,
    Typer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Translator, Role::Cleaner, Role::Typer];

    pub fn header_label(self) -> &'static str {
        match self {
            Role::Translator => "translator",
            Role::Cleaner => "cleaner",
            Role::Typer => "typer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header_label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFlags {
    pub raw: bool,
    pub translation: bool,
    pub clean: bool,
    pub typeset: bool,
    pub published: bool,
}

impl StageFlags {
    pub fn get(&self, stage: Stage) -> bool {
        match stage {
            Stage::Raw => self.raw,
            Stage::Translation => self.translation,
            Stage::Clean => self.clean,
            Stage::Type => self.typeset,
            Stage::Published => self.published,
        }
    }

    pub fn set(&mut self, stage: Stage, done: bool) {
        match stage {
            Stage::Raw => self.raw = done,
            Stage::Translation => self.translation = done,
            Stage::Clean => self.clean = done,
            Stage::Type => self.typeset = done,
            Stage::Published => self.published = done,
        }
    }

    /// Every stage upstream of publication is complete.
    pub fn is_staged(&self) -> bool {
        self.raw && self.translation && self.clean && self.typeset
    }

    pub fn is_ready_to_publish(&self) -> bool {
        self.is_staged() && !self.published
    }

    /// Stages that are not complete yet, in pipeline order.
    pub fn pending(&self) -> Vec<Stage> {
        Stage::ALL
            .into_iter()
            .filter(|stage| !self.get(*stage))
            .collect()
    }
}

/// One chapter row of a series sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterRow {
    pub id: String,
    pub flags: StageFlags,
    pub translator: Option<String>,
    pub cleaner: Option<String>,
    pub typer: Option<String>,
}

impl ChapterRow {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn assignee(&self, role: Role) -> Option<&str> {
        let value = match role {
            Role::Translator => self.translator.as_deref(),
            Role::Cleaner => self.cleaner.as_deref(),
            Role::Typer => self.typer.as_deref(),
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }
}

/// Live view of one series: chapter rows in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSheet {
    pub name: String,
    pub rows: Vec<ChapterRow>,
}
