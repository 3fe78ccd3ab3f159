//! Note repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide owner-scoped CRUD and search over `notes`.
//! - Validate project/source ownership before accepting references.
//! - Delegate keyword set replacement to [`crate::repo::keywords`].
//!
//! # Invariants
//! - Every statement filters on `user_id`; foreign rows read as absent.
//! - List/search order is `updated_at DESC, id ASC`.
//! - Text search compares full-Unicode lowercase forms; the query is literal.
//! - Each write is wrapped in a savepoint so failures leave no partial rows.

use crate::db::CASEFOLD_FN;
use crate::model::note::{
    Note, NoteCreate, NoteId, NoteMetadata, NoteUpdate, ProjectId, ProjectSummary, SourceSummary,
};
use crate::model::page::{Page, LIST_DEFAULT_LIMIT, SEARCH_DEFAULT_LIMIT};
use crate::repo::keywords::{
    load_keywords_for_note, normalize_keyword, normalize_keyword_names, parse_uuid,
    replace_note_keywords,
};
use crate::repo::{ReferenceKind, RepoError, RepoResult};
use log::{debug, warn};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const NOTE_SELECT_SQL: &str = "SELECT
    n.id,
    n.user_id,
    n.title,
    n.content,
    n.type,
    n.note_metadata,
    n.created_at,
    n.updated_at,
    p.id AS project_id,
    p.name AS project_name,
    s.id AS source_id,
    s.title AS source_title,
    s.url AS source_url
FROM notes n
LEFT JOIN projects p ON p.id = n.project_id
LEFT JOIN sources s ON s.id = n.source_id";

const NOTE_ORDER_SQL: &str = " ORDER BY n.updated_at DESC, n.id ASC";

/// Current time in epoch milliseconds, evaluated by SQLite.
const NOW_MS_SQL: &str = "CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER)";

/// Repository interface for owner-scoped note operations.
///
/// List and search operations take a [`Page`]. A zero `limit` selects the
/// operation default ([`LIST_DEFAULT_LIMIT`] for listing,
/// [`SEARCH_DEFAULT_LIMIT`] for searches). Limits above
/// [`PAGE_LIMIT_MAX`](crate::model::page::PAGE_LIMIT_MAX) are clamped to it.
pub trait NoteRepository {
    /// Gets one note owned by `owner`.
    fn get_by_id(&self, note_id: NoteId, owner: &str) -> RepoResult<Option<Note>>;
    /// Lists the owner's notes, most recently updated first.
    fn list_by_owner(&self, owner: &str, page: Page) -> RepoResult<Vec<Note>>;
    /// Creates a note, resolving keyword names into the owner's keywords.
    fn create(&self, note_in: &NoteCreate, owner: &str) -> RepoResult<Note>;
    /// Applies a partial update. Returns `None` when no owned note matches.
    fn update(&self, note_id: NoteId, note_in: &NoteUpdate, owner: &str)
        -> RepoResult<Option<Note>>;
    /// Deletes a note and its keyword links. Returns `false` when absent.
    fn delete(&self, note_id: NoteId, owner: &str) -> RepoResult<bool>;
    /// Case-insensitive substring match on title or content.
    ///
    /// Case folding covers all of Unicode, not just ASCII.
    fn search_by_text(&self, owner: &str, query: &str, page: Page) -> RepoResult<Vec<Note>>;
    /// Notes filed under one project.
    fn search_by_project(
        &self,
        project_id: ProjectId,
        owner: &str,
        page: Page,
    ) -> RepoResult<Vec<Note>>;
    /// Notes tagged with `keyword_name`, optionally within one project.
    fn search_by_keyword_name(
        &self,
        keyword_name: &str,
        project_id: Option<ProjectId>,
        owner: &str,
        page: Page,
    ) -> RepoResult<Vec<Note>>;
    /// Notes tagged with any of `keyword_names`, optionally within one project.
    fn search_by_keyword_names(
        &self,
        keyword_names: &[String],
        project_id: Option<ProjectId>,
        owner: &str,
        page: Page,
    ) -> RepoResult<Vec<Note>>;
}

/// SQLite-backed note repository bound to one connection.
///
/// The repository never begins or ends transactions itself; it runs inside
/// whatever transaction the owning session has open.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Binds a repository to a migrated connection.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn fetch(&self, note_id: NoteId, owner: &str) -> RepoResult<Option<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE n.id = ?1
               AND n.user_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![note_id.to_string(), owner])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(self.parse_note_row(row)?));
        }
        Ok(None)
    }

    fn query_notes(
        &self,
        filter_sql: &str,
        mut bind_values: Vec<Value>,
        page: Page,
        default_limit: u32,
    ) -> RepoResult<Vec<Note>> {
        let sql = format!("{NOTE_SELECT_SQL} WHERE {filter_sql}{NOTE_ORDER_SQL} LIMIT ? OFFSET ?");
        bind_values.push(Value::Integer(i64::from(
            page.effective_limit(default_limit),
        )));
        bind_values.push(Value::Integer(i64::from(page.offset)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(self.parse_note_row(row)?);
        }
        Ok(notes)
    }

    fn parse_note_row(&self, row: &Row<'_>) -> RepoResult<Note> {
        let id_text: String = row.get("id")?;
        let id = parse_uuid(&id_text, "notes.id")?;

        let metadata = match row.get::<_, Option<String>>("note_metadata")? {
            Some(raw) => Some(serde_json::from_str::<NoteMetadata>(&raw)?),
            None => None,
        };

        let project = match row.get::<_, Option<String>>("project_id")? {
            Some(project_id) => Some(ProjectSummary {
                id: parse_uuid(&project_id, "projects.id")?,
                name: row.get("project_name")?,
            }),
            None => None,
        };

        let source = match row.get::<_, Option<String>>("source_id")? {
            Some(source_id) => Some(SourceSummary {
                id: parse_uuid(&source_id, "sources.id")?,
                title: row.get("source_title")?,
                url: row.get("source_url")?,
            }),
            None => None,
        };

        Ok(Note {
            id,
            user_id: row.get("user_id")?,
            title: row.get("title")?,
            content: row.get("content")?,
            note_type: row.get("type")?,
            metadata,
            project,
            source,
            keywords: load_keywords_for_note(self.conn, &id_text)?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn read_back(&self, note_id: NoteId, owner: &str) -> RepoResult<Note> {
        self.fetch(note_id, owner)?.ok_or_else(|| {
            RepoError::InvalidData(format!("note {note_id} missing in read-back after write"))
        })
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn get_by_id(&self, note_id: NoteId, owner: &str) -> RepoResult<Option<Note>> {
        self.fetch(note_id, owner)
    }

    fn list_by_owner(&self, owner: &str, page: Page) -> RepoResult<Vec<Note>> {
        self.query_notes(
            "n.user_id = ?",
            vec![Value::Text(owner.to_string())],
            page,
            LIST_DEFAULT_LIMIT,
        )
    }

    fn create(&self, note_in: &NoteCreate, owner: &str) -> RepoResult<Note> {
        with_savepoint(self.conn, || {
            if let Some(project_id) = note_in.project_id {
                ensure_reference_owned(self.conn, ReferenceKind::Project, project_id, owner)?;
            }
            if let Some(source_id) = note_in.source_id {
                ensure_reference_owned(self.conn, ReferenceKind::Source, source_id, owner)?;
            }

            let note_id = Uuid::new_v4();
            self.conn.execute(
                "INSERT INTO notes (
                    id,
                    user_id,
                    project_id,
                    source_id,
                    title,
                    content,
                    type,
                    note_metadata
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
                params![
                    note_id.to_string(),
                    owner,
                    note_in.project_id.map(|id| id.to_string()),
                    note_in.source_id.map(|id| id.to_string()),
                    note_in.title.as_str(),
                    note_in.content.as_str(),
                    note_in.note_type.as_deref(),
                    encode_metadata(note_in.metadata.as_ref())?,
                ],
            )?;

            if let Some(names) = note_in.keywords.as_ref() {
                replace_note_keywords(self.conn, note_id, owner, names)?;
            }

            debug!("event=note_create module=repo status=ok note_id={note_id}");
            self.read_back(note_id, owner)
        })
    }

    fn update(
        &self,
        note_id: NoteId,
        note_in: &NoteUpdate,
        owner: &str,
    ) -> RepoResult<Option<Note>> {
        with_savepoint(self.conn, || {
            if !note_exists(self.conn, note_id, owner)? {
                return Ok(None);
            }

            if let Some(Some(project_id)) = note_in.project_id {
                ensure_reference_owned(self.conn, ReferenceKind::Project, project_id, owner)?;
            }
            if let Some(Some(source_id)) = note_in.source_id {
                ensure_reference_owned(self.conn, ReferenceKind::Source, source_id, owner)?;
            }

            if !note_in.touches_columns() && note_in.keywords.is_none() {
                return self.fetch(note_id, owner);
            }

            let mut assignments: Vec<String> = Vec::new();
            let mut bind_values: Vec<Value> = Vec::new();
            if let Some(title) = note_in.title.as_ref() {
                assignments.push("title = ?".to_string());
                bind_values.push(Value::Text(title.clone()));
            }
            if let Some(content) = note_in.content.as_ref() {
                assignments.push("content = ?".to_string());
                bind_values.push(Value::Text(content.clone()));
            }
            if let Some(note_type) = note_in.note_type.as_ref() {
                assignments.push("type = ?".to_string());
                bind_values.push(optional_text(note_type.clone()));
            }
            if let Some(metadata) = note_in.metadata.as_ref() {
                assignments.push("note_metadata = ?".to_string());
                bind_values.push(optional_text(encode_metadata(metadata.as_ref())?));
            }
            if let Some(project_id) = note_in.project_id {
                assignments.push("project_id = ?".to_string());
                bind_values.push(optional_text(project_id.map(|id| id.to_string())));
            }
            if let Some(source_id) = note_in.source_id {
                assignments.push("source_id = ?".to_string());
                bind_values.push(optional_text(source_id.map(|id| id.to_string())));
            }
            assignments.push(format!("updated_at = {NOW_MS_SQL}"));
            bind_values.push(Value::Text(note_id.to_string()));
            bind_values.push(Value::Text(owner.to_string()));

            self.conn.execute(
                &format!(
                    "UPDATE notes SET {} WHERE id = ? AND user_id = ?;",
                    assignments.join(", ")
                ),
                params_from_iter(bind_values),
            )?;

            if let Some(names) = note_in.keywords.as_ref() {
                replace_note_keywords(self.conn, note_id, owner, names)?;
            }

            debug!("event=note_update module=repo status=ok note_id={note_id}");
            self.read_back(note_id, owner).map(Some)
        })
    }

    fn delete(&self, note_id: NoteId, owner: &str) -> RepoResult<bool> {
        with_savepoint(self.conn, || {
            let changed = self.conn.execute(
                "DELETE FROM notes WHERE id = ?1 AND user_id = ?2;",
                params![note_id.to_string(), owner],
            )?;
            debug!(
                "event=note_delete module=repo status=ok note_id={note_id} deleted={}",
                changed > 0
            );
            Ok(changed > 0)
        })
    }

    fn search_by_text(&self, owner: &str, query: &str, page: Page) -> RepoResult<Vec<Note>> {
        let needle = query.to_lowercase();
        self.query_notes(
            &format!(
                "n.user_id = ?
                 AND (instr({CASEFOLD_FN}(n.title), ?) > 0
                      OR instr({CASEFOLD_FN}(n.content), ?) > 0)"
            ),
            vec![
                Value::Text(owner.to_string()),
                Value::Text(needle.clone()),
                Value::Text(needle),
            ],
            page,
            SEARCH_DEFAULT_LIMIT,
        )
    }

    fn search_by_project(
        &self,
        project_id: ProjectId,
        owner: &str,
        page: Page,
    ) -> RepoResult<Vec<Note>> {
        self.query_notes(
            "n.user_id = ? AND n.project_id = ?",
            vec![
                Value::Text(owner.to_string()),
                Value::Text(project_id.to_string()),
            ],
            page,
            SEARCH_DEFAULT_LIMIT,
        )
    }

    fn search_by_keyword_name(
        &self,
        keyword_name: &str,
        project_id: Option<ProjectId>,
        owner: &str,
        page: Page,
    ) -> RepoResult<Vec<Note>> {
        match normalize_keyword(keyword_name) {
            Some(name) => self.search_by_keyword_names(&[name], project_id, owner, page),
            None => Ok(Vec::new()),
        }
    }

    fn search_by_keyword_names(
        &self,
        keyword_names: &[String],
        project_id: Option<ProjectId>,
        owner: &str,
        page: Page,
    ) -> RepoResult<Vec<Note>> {
        let names = normalize_keyword_names(keyword_names);
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; names.len()].join(", ");
        let mut filter_sql = format!(
            "n.user_id = ?
             AND EXISTS (
                SELECT 1
                FROM note_keywords nk
                INNER JOIN keywords k ON k.id = nk.keyword_id
                WHERE nk.note_id = n.id
                  AND k.user_id = n.user_id
                  AND k.name IN ({placeholders})
             )"
        );
        let mut bind_values = vec![Value::Text(owner.to_string())];
        bind_values.extend(names.into_iter().map(Value::Text));

        if let Some(project_id) = project_id {
            filter_sql.push_str(" AND n.project_id = ?");
            bind_values.push(Value::Text(project_id.to_string()));
        }

        self.query_notes(&filter_sql, bind_values, page, SEARCH_DEFAULT_LIMIT)
    }
}

/// Runs `work` inside a named savepoint, undoing its writes on failure.
fn with_savepoint<T>(conn: &Connection, work: impl FnOnce() -> RepoResult<T>) -> RepoResult<T> {
    conn.execute_batch("SAVEPOINT note_write;")?;
    match work() {
        Ok(value) => {
            conn.execute_batch("RELEASE note_write;")?;
            Ok(value)
        }
        Err(err) => {
            if let Err(undo_err) =
                conn.execute_batch("ROLLBACK TO note_write; RELEASE note_write;")
            {
                warn!("event=note_write_undo module=repo status=error error={undo_err}");
            }
            Err(err)
        }
    }
}

fn ensure_reference_owned(
    conn: &Connection,
    kind: ReferenceKind,
    id: Uuid,
    owner: &str,
) -> RepoResult<()> {
    let exists: i64 = conn.query_row(
        &format!(
            "SELECT EXISTS(
                SELECT 1
                FROM {}
                WHERE id = ?1
                  AND user_id = ?2
            );",
            kind.table()
        ),
        params![id.to_string(), owner],
        |row| row.get(0),
    )?;
    if exists == 1 {
        return Ok(());
    }

    warn!(
        "event=note_reference_check module=repo status=rejected table={} id={id}",
        kind.table()
    );
    Err(RepoError::InvalidReference { kind, id })
}

fn note_exists(conn: &Connection, note_id: NoteId, owner: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM notes
            WHERE id = ?1
              AND user_id = ?2
        );",
        params![note_id.to_string(), owner],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn encode_metadata(metadata: Option<&NoteMetadata>) -> RepoResult<Option<String>> {
    metadata
        .map(serde_json::to_string)
        .transpose()
        .map_err(RepoError::from)
}

fn optional_text(value: Option<String>) -> Value {
    value.map_or(Value::Null, Value::Text)
}
