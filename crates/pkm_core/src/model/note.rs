//! Note, keyword and reference records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type NoteId = Uuid;
pub type KeywordId = Uuid;
pub type ProjectId = Uuid;
pub type SourceId = Uuid;

/// Free-form structured metadata attached to a note.
pub type NoteMetadata = serde_json::Map<String, serde_json::Value>;

/// Keyword shared by all notes of one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: KeywordId,
    pub user_id: String,
    pub name: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

/// Project referenced by a note, resolved on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub name: String,
}

/// Source referenced by a note, resolved on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub id: SourceId,
    pub title: Option<String>,
    pub url: Option<String>,
}

/// Read model returned by every note repository operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Owning user. Immutable after creation.
    pub user_id: String,
    pub title: String,
    pub content: String,
    /// Serialized as `type` to match the storage column.
    #[serde(rename = "type")]
    pub note_type: Option<String>,
    pub metadata: Option<NoteMetadata>,
    pub project: Option<ProjectSummary>,
    pub source: Option<SourceSummary>,
    /// Keyword set, sorted by name.
    pub keywords: Vec<Keyword>,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Note {
    pub fn project_id(&self) -> Option<ProjectId> {
        self.project.as_ref().map(|project| project.id)
    }

    pub fn source_id(&self) -> Option<SourceId> {
        self.source.as_ref().map(|source| source.id)
    }

    /// Keyword names in stored (name) order.
    pub fn keyword_names(&self) -> Vec<&str> {
        self.keywords
            .iter()
            .map(|keyword| keyword.name.as_str())
            .collect()
    }
}

/// Payload for creating a note.
///
/// Field values are expected to be validated by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteCreate {
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub note_type: Option<String>,
    pub metadata: Option<NoteMetadata>,
    pub project_id: Option<ProjectId>,
    pub source_id: Option<SourceId>,
    /// Keyword names; `None` creates the note without keywords.
    pub keywords: Option<Vec<String>>,
}

impl NoteCreate {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn note_type(mut self, note_type: impl Into<String>) -> Self {
        self.note_type = Some(note_type.into());
        self
    }

    pub fn metadata(mut self, metadata: NoteMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn source(mut self, source_id: SourceId) -> Self {
        self.source_id = Some(source_id);
        self
    }

    pub fn keywords<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

/// Partial update payload.
///
/// `None` leaves a field untouched. For nullable fields `Some(None)` clears
/// the stored value. `keywords: Some(..)` replaces the whole keyword set,
/// including with an empty list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub note_type: Option<Option<String>>,
    pub metadata: Option<Option<NoteMetadata>>,
    pub project_id: Option<Option<ProjectId>>,
    pub source_id: Option<Option<SourceId>>,
    pub keywords: Option<Vec<String>>,
}

impl NoteUpdate {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn note_type(mut self, note_type: Option<String>) -> Self {
        self.note_type = Some(note_type);
        self
    }

    pub fn metadata(mut self, metadata: Option<NoteMetadata>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn project(mut self, project_id: Option<ProjectId>) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn source(mut self, source_id: Option<SourceId>) -> Self {
        self.source_id = Some(source_id);
        self
    }

    pub fn keywords<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Returns whether any note column (not the keyword set) is touched.
    pub fn touches_columns(&self) -> bool {
        self.title.is_some()
            || self.content.is_some()
            || self.note_type.is_some()
            || self.metadata.is_some()
            || self.project_id.is_some()
            || self.source_id.is_some()
    }
}
