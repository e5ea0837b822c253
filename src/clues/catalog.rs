use serde::{Deserialize, Serialize};

use crate::clues::distributor::distribute;

/// Number of clues in the built-in catalog.
const BUILTIN_CLUE_COUNT: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clue {
    pub id: String,
    pub label: String,
    pub image_url: String,
}

/// Fixed, ordered clue list shared by every session.
#[derive(Debug, Clone, PartialEq)]
pub struct ClueCatalog {
    clues: Vec<Clue>,
}

impl Default for ClueCatalog {
    fn default() -> Self {
        let clues = (1..=BUILTIN_CLUE_COUNT)
            .map(|n| Clue {
                id: format!("clue-{:02}", n),
                label: format!("단서 {}", n),
                image_url: format!("/assets/clues/clue-{:02}.png", n),
            })
            .collect();
        Self { clues }
    }
}

impl ClueCatalog {
    /// Uses `clues` in the given order; an empty list falls back to the built-in catalog.
    pub fn new(clues: Vec<Clue>) -> Self {
        if clues.is_empty() {
            return Self::default();
        }
        Self { clues }
    }

    pub fn all(&self) -> &[Clue] {
        &self.clues
    }

    pub fn len(&self) -> usize {
        self.clues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clues.is_empty()
    }

    /// Clues shown to `team_number`. `view_all` bypasses the split.
    pub fn for_team(&self, team_count: u32, team_number: u32, view_all: bool) -> &[Clue] {
        if view_all {
            return &self.clues;
        }
        distribute(&self.clues, team_count, team_number)
    }
}
