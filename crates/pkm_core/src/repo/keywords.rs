//! Keyword reconciliation for note writes.
//!
//! # Responsibility
//! - Turn a desired list of keyword names into existing-or-new keyword rows.
//! - Replace a note's keyword links with exactly that set.
//!
//! # Invariants
//! - Names are trimmed; blank names are dropped; duplicates collapse.
//! - At most one keyword row exists per `(user_id, name)`.
//! - Replacing links never deletes keyword rows; unreferenced keywords stay.

use crate::model::note::{Keyword, KeywordId, NoteId};
use crate::repo::{RepoError, RepoResult};
use log::debug;
use rusqlite::{params, Connection};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Normalizes one keyword name. Returns `None` for blank input.
pub fn normalize_keyword(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Trims, drops blanks and deduplicates keyword names (exact match).
pub fn normalize_keyword_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut unique = BTreeSet::new();
    for name in names {
        if let Some(value) = normalize_keyword(name.as_ref()) {
            unique.insert(value);
        }
    }
    unique.into_iter().collect()
}

/// Replaces every keyword link of `note_id` with the normalized `names`.
///
/// Returns the number of links written.
pub(crate) fn replace_note_keywords(
    conn: &Connection,
    note_id: NoteId,
    owner: &str,
    names: &[String],
) -> RepoResult<usize> {
    let normalized = normalize_keyword_names(names);
    let note_id_text = note_id.to_string();

    conn.execute(
        "DELETE FROM note_keywords WHERE note_id = ?1;",
        [note_id_text.as_str()],
    )?;

    for name in &normalized {
        let keyword_id = resolve_keyword(conn, owner, name)?;
        conn.execute(
            "INSERT INTO note_keywords (note_id, keyword_id) VALUES (?1, ?2);",
            params![note_id_text.as_str(), keyword_id.to_string()],
        )?;
    }

    debug!(
        "event=keywords_reconcile module=repo status=ok requested={} linked={}",
        names.len(),
        normalized.len()
    );
    Ok(normalized.len())
}

/// Looks up the keyword for `(owner, name)`, creating it when absent.
fn resolve_keyword(conn: &Connection, owner: &str, name: &str) -> RepoResult<KeywordId> {
    let inserted = conn.execute(
        "INSERT INTO keywords (id, user_id, name)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (user_id, name) DO NOTHING;",
        params![Uuid::new_v4().to_string(), owner, name],
    )?;
    if inserted > 0 {
        debug!("event=keyword_create module=repo status=ok");
    }

    let id_text: String = conn.query_row(
        "SELECT id FROM keywords WHERE user_id = ?1 AND name = ?2;",
        params![owner, name],
        |row| row.get(0),
    )?;
    parse_uuid(&id_text, "keywords.id")
}

/// Loads the keyword set linked to one note, sorted by name.
pub(crate) fn load_keywords_for_note(conn: &Connection, note_id: &str) -> RepoResult<Vec<Keyword>> {
    let mut stmt = conn.prepare(
        "SELECT k.id, k.user_id, k.name, k.created_at
         FROM note_keywords nk
         INNER JOIN keywords k ON k.id = nk.keyword_id
         WHERE nk.note_id = ?1
         ORDER BY k.name ASC;",
    )?;
    let mut rows = stmt.query([note_id])?;
    let mut keywords = Vec::new();
    while let Some(row) = rows.next()? {
        let id_text: String = row.get("id")?;
        keywords.push(Keyword {
            id: parse_uuid(&id_text, "keywords.id")?,
            user_id: row.get("user_id")?,
            name: row.get("name")?,
            created_at: row.get("created_at")?,
        });
    }
    Ok(keywords)
}

pub(crate) fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}
