//! Resolution of free-form user text against the catalog.
//!
//! Strategies run in a fixed precedence order: episode number, exact title,
//! guest name, category. The first strategy that reaches a decision wins;
//! anything else falls through to the guidance fallback. Keeping the order
//! in one slice makes the precedence auditable and testable in isolation.

use crate::database::{Database, Episode, CATEGORY_INTERVISTA};
use anyhow::Result;
use serde::Serialize;

/// Outcome of resolving one user query. Resolution is a pure function of
/// the input text and the current catalog; logging the query is the
/// caller's job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Resolution {
    /// Exactly one episode matched.
    Single(Episode),
    /// Several episodes matched; the user picks one by label.
    Disambiguation(Disambiguation),
    /// The INTERVISTA category was selected: it spans many guests, so the
    /// chat layer re-enters guest selection instead of listing episodes.
    GuestSelection,
    /// Nothing matched; [`not_found_guidance`] renders the valid numeric
    /// range for the user.
    NotFound { max_episode_id: i64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Disambiguation {
    pub choices: Vec<Choice>,
}

/// One selectable entry of a disambiguation set. The label is what the
/// chat layer renders ("Parte 2", or an episode title); the id/part pair
/// is what it sends back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Choice {
    pub label: String,
    pub episode_id: i64,
    pub part: i64,
}

/// Fallback text shown when no strategy matched.
pub fn not_found_guidance(max_episode_id: i64) -> String {
    format!(
        "Non ho trovato quello che cerchi.\n\n\
         Seleziona una scelta dal menù, scrivi il nome di un ospite, \
         o un numero da 0 a {}.",
        max_episode_id
    )
}

type Strategy = fn(&Database, &str) -> Result<Option<Resolution>>;

const STRATEGIES: [Strategy; 4] = [by_episode_number, by_exact_title, by_guest_name, by_category];

pub fn resolve(db: &Database, input: &str) -> Result<Resolution> {
    let query = input.trim();

    for strategy in STRATEGIES {
        if let Some(resolution) = strategy(db, query)? {
            return Ok(resolution);
        }
    }

    Ok(Resolution::NotFound {
        max_episode_id: db.max_episode_id()?,
    })
}

/// Strategy 1: an all-digits query is an episode id. This deliberately
/// outranks guest names, so a guest who happens to be named like a number
/// can never shadow an episode id.
fn by_episode_number(db: &Database, query: &str) -> Result<Option<Resolution>> {
    if query.is_empty() || !query.chars().all(|c| c.is_ascii_digit()) {
        return Ok(None);
    }

    let episode_id: i64 = match query.parse() {
        Ok(id) => id,
        // All digits but too large for any episode id
        Err(_) => {
            return Ok(Some(Resolution::NotFound {
                max_episode_id: db.max_episode_id()?,
            }))
        }
    };

    let mut parts = db.episodes_by_id(episode_id)?;
    match parts.len() {
        0 => Ok(Some(Resolution::NotFound {
            max_episode_id: db.max_episode_id()?,
        })),
        1 => Ok(Some(Resolution::Single(parts.remove(0)))),
        _ => Ok(Some(Resolution::Disambiguation(Disambiguation {
            choices: parts
                .iter()
                .map(|ep| Choice {
                    label: format!("Parte {}", ep.part),
                    episode_id: ep.episode_id,
                    part: ep.part,
                })
                .collect(),
        }))),
    }
}

/// Strategy 2: exact, case-sensitive title match.
fn by_exact_title(db: &Database, query: &str) -> Result<Option<Resolution>> {
    Ok(db.episode_by_title(query)?.map(Resolution::Single))
}

/// Strategy 3: case-insensitive guest match. The query must name a known
/// guest (the sentinel is not one); otherwise the next strategy gets its
/// turn.
fn by_guest_name(db: &Database, query: &str) -> Result<Option<Resolution>> {
    let known = db
        .guests()?
        .iter()
        .any(|guest| guest.eq_ignore_ascii_case(query));
    if !known {
        return Ok(None);
    }

    let mut episodes = db.episodes_by_guest(query)?;
    match episodes.len() {
        0 => Ok(None),
        1 => Ok(Some(Resolution::Single(episodes.remove(0)))),
        _ => Ok(Some(Resolution::Disambiguation(Disambiguation {
            choices: title_choices(&episodes),
        }))),
    }
}

/// Strategy 4: exact category match. INTERVISTA spans many guests and
/// re-enters guest selection instead of listing episodes.
fn by_category(db: &Database, query: &str) -> Result<Option<Resolution>> {
    if !db.categories()?.iter().any(|c| c == query) {
        return Ok(None);
    }

    if query == CATEGORY_INTERVISTA {
        return Ok(Some(Resolution::GuestSelection));
    }

    let mut episodes = db.episodes_by_category(query)?;
    match episodes.len() {
        0 => Ok(Some(Resolution::NotFound {
            max_episode_id: db.max_episode_id()?,
        })),
        1 => Ok(Some(Resolution::Single(episodes.remove(0)))),
        _ => Ok(Some(Resolution::Disambiguation(Disambiguation {
            choices: title_choices(&episodes),
        }))),
    }
}

fn title_choices(episodes: &[Episode]) -> Vec<Choice> {
    episodes
        .iter()
        .map(|ep| Choice {
            label: ep.title.clone(),
            episode_id: ep.episode_id,
            part: ep.part,
        })
        .collect()
}
