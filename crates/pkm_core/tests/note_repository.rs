mod common;

use common::{count_rows, seed_project, seed_source, seed_users, set_updated_at, ALICE, BOB};
use pkm_core::db::open_db_in_memory;
use pkm_core::{
    NoteCreate, NoteMetadata, NoteRepository, NoteUpdate, Page, ReferenceKind, RepoError,
    SqliteNoteRepository,
};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn seeded_conn() -> Connection {
    let conn = open_db_in_memory().unwrap();
    seed_users(&conn);
    conn
}

fn metadata(value: serde_json::Value) -> NoteMetadata {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("metadata must be an object, got {other}"),
    }
}

#[test]
fn create_then_get_round_trips_fields_and_keywords() {
    let conn = seeded_conn();
    let project_id = seed_project(&conn, ALICE, "Reading");
    let source_id = seed_source(&conn, ALICE, "Rust Book", "https://doc.rust-lang.org/book/");
    let repo = SqliteNoteRepository::new(&conn);

    let created = repo
        .create(
            &NoteCreate::new("T", "C")
                .note_type("summary")
                .metadata(metadata(json!({"chapter": 4})))
                .project(project_id)
                .source(source_id)
                .keywords(["b", "a"]),
            ALICE,
        )
        .unwrap();

    let fetched = repo.get_by_id(created.id, ALICE).unwrap().unwrap();
    assert_eq!(fetched, created);
    assert_eq!(fetched.title, "T");
    assert_eq!(fetched.content, "C");
    assert_eq!(fetched.user_id, ALICE);
    assert_eq!(fetched.note_type.as_deref(), Some("summary"));
    assert_eq!(fetched.metadata, Some(metadata(json!({"chapter": 4}))));
    assert_eq!(fetched.project_id(), Some(project_id));
    assert_eq!(fetched.project.as_ref().unwrap().name, "Reading");
    assert_eq!(fetched.source_id(), Some(source_id));
    assert_eq!(
        fetched.source.as_ref().unwrap().url.as_deref(),
        Some("https://doc.rust-lang.org/book/")
    );
    assert_eq!(fetched.keyword_names(), vec!["a", "b"]);
    assert!(fetched.created_at > 0);
    assert_eq!(fetched.created_at, fetched.updated_at);
}

#[test]
fn create_without_optional_fields_has_no_references_or_keywords() {
    let conn = seeded_conn();
    let repo = SqliteNoteRepository::new(&conn);

    let created = repo.create(&NoteCreate::new("bare", ""), ALICE).unwrap();

    assert!(created.project.is_none());
    assert!(created.source.is_none());
    assert!(created.metadata.is_none());
    assert!(created.note_type.is_none());
    assert!(created.keywords.is_empty());
}

#[test]
fn keywords_are_trimmed_deduplicated_and_shared_per_owner() {
    let conn = seeded_conn();
    let repo = SqliteNoteRepository::new(&conn);

    let first = repo
        .create(
            &NoteCreate::new("first", "body").keywords([" rust", "db", "rust ", "  ", ""]),
            ALICE,
        )
        .unwrap();
    assert_eq!(first.keyword_names(), vec!["db", "rust"]);
    assert_eq!(count_rows(&conn, "keywords"), 2);

    let second = repo
        .create(&NoteCreate::new("second", "body").keywords(["rust"]), ALICE)
        .unwrap();
    assert_eq!(count_rows(&conn, "keywords"), 2);
    let shared = first
        .keywords
        .iter()
        .find(|keyword| keyword.name == "rust")
        .unwrap();
    assert_eq!(second.keywords[0].id, shared.id);

    let other_owner = repo
        .create(&NoteCreate::new("bob's", "body").keywords(["rust"]), BOB)
        .unwrap();
    assert_ne!(other_owner.keywords[0].id, shared.id);
    assert_eq!(other_owner.keywords[0].user_id, BOB);
    assert_eq!(count_rows(&conn, "keywords"), 3);
}

#[test]
fn keyword_names_are_case_sensitive() {
    let conn = seeded_conn();
    let repo = SqliteNoteRepository::new(&conn);

    let note = repo
        .create(&NoteCreate::new("case", "body").keywords(["Rust", "rust"]), ALICE)
        .unwrap();

    assert_eq!(note.keyword_names(), vec!["Rust", "rust"]);
}

#[test]
fn update_with_empty_keywords_clears_links_but_keeps_keyword_rows() {
    let conn = seeded_conn();
    let repo = SqliteNoteRepository::new(&conn);
    let note = repo
        .create(&NoteCreate::new("tagged", "body").keywords(["a", "b"]), ALICE)
        .unwrap();

    let updated = repo
        .update(note.id, &NoteUpdate::default().keywords(Vec::<String>::new()), ALICE)
        .unwrap()
        .unwrap();

    assert!(updated.keywords.is_empty());
    assert_eq!(count_rows(&conn, "note_keywords"), 0);
    assert_eq!(count_rows(&conn, "keywords"), 2);
}

#[test]
fn update_replaces_keyword_set_and_omitting_it_keeps_prior_set() {
    let conn = seeded_conn();
    let repo = SqliteNoteRepository::new(&conn);
    let note = repo
        .create(&NoteCreate::new("tagged", "body").keywords(["a", "b"]), ALICE)
        .unwrap();

    let replaced = repo
        .update(note.id, &NoteUpdate::default().keywords(["b", "c"]), ALICE)
        .unwrap()
        .unwrap();
    assert_eq!(replaced.keyword_names(), vec!["b", "c"]);

    let retitled = repo
        .update(note.id, &NoteUpdate::default().title("renamed"), ALICE)
        .unwrap()
        .unwrap();
    assert_eq!(retitled.title, "renamed");
    assert_eq!(retitled.content, "body");
    assert_eq!(retitled.keyword_names(), vec!["b", "c"]);
}

#[test]
fn update_clears_nullable_fields_and_refreshes_updated_at() {
    let conn = seeded_conn();
    let project_id = seed_project(&conn, ALICE, "Inbox");
    let source_id = seed_source(&conn, ALICE, "Paper", "https://example.org/paper");
    let repo = SqliteNoteRepository::new(&conn);
    let note = repo
        .create(
            &NoteCreate::new("full", "body")
                .note_type("quote")
                .metadata(metadata(json!({"page": 12})))
                .project(project_id)
                .source(source_id),
            ALICE,
        )
        .unwrap();
    set_updated_at(&conn, note.id, 1);

    let cleared = repo
        .update(
            note.id,
            &NoteUpdate::default()
                .note_type(None)
                .metadata(None)
                .project(None)
                .source(None),
            ALICE,
        )
        .unwrap()
        .unwrap();

    assert!(cleared.note_type.is_none());
    assert!(cleared.metadata.is_none());
    assert!(cleared.project.is_none());
    assert!(cleared.source.is_none());
    assert!(cleared.updated_at > 1);
    assert_eq!(cleared.created_at, note.created_at);
}

#[test]
fn empty_update_returns_note_unchanged() {
    let conn = seeded_conn();
    let repo = SqliteNoteRepository::new(&conn);
    let note = repo.create(&NoteCreate::new("still", "same"), ALICE).unwrap();
    set_updated_at(&conn, note.id, 1);

    let unchanged = repo
        .update(note.id, &NoteUpdate::default(), ALICE)
        .unwrap()
        .unwrap();

    assert_eq!(unchanged.title, "still");
    assert_eq!(unchanged.updated_at, 1);
}

#[test]
fn update_of_missing_or_foreign_note_returns_none() {
    let conn = seeded_conn();
    let repo = SqliteNoteRepository::new(&conn);
    let note = repo.create(&NoteCreate::new("mine", "body"), ALICE).unwrap();

    assert!(repo
        .update(Uuid::new_v4(), &NoteUpdate::default().title("x"), ALICE)
        .unwrap()
        .is_none());
    assert!(repo
        .update(note.id, &NoteUpdate::default().title("stolen"), BOB)
        .unwrap()
        .is_none());
    assert_eq!(repo.get_by_id(note.id, ALICE).unwrap().unwrap().title, "mine");
}

#[test]
fn notes_of_other_owners_read_as_absent() {
    let conn = seeded_conn();
    let repo = SqliteNoteRepository::new(&conn);
    let note = repo
        .create(&NoteCreate::new("private", "secret").keywords(["k"]), ALICE)
        .unwrap();

    assert!(repo.get_by_id(note.id, BOB).unwrap().is_none());
    assert!(repo.list_by_owner(BOB, Page::default()).unwrap().is_empty());
    assert!(repo
        .search_by_text(BOB, "secret", Page::default())
        .unwrap()
        .is_empty());
    assert!(repo
        .search_by_keyword_name("k", None, BOB, Page::default())
        .unwrap()
        .is_empty());
    assert!(!repo.delete(note.id, BOB).unwrap());
    assert!(repo.get_by_id(note.id, ALICE).unwrap().is_some());
}

#[test]
fn create_with_foreign_project_or_source_is_rejected_without_partial_writes() {
    let conn = seeded_conn();
    let bobs_project = seed_project(&conn, BOB, "Bob's");
    let bobs_source = seed_source(&conn, BOB, "Bob's source", "https://example.org/bob");
    let repo = SqliteNoteRepository::new(&conn);

    let err = repo
        .create(
            &NoteCreate::new("nope", "body")
                .project(bobs_project)
                .keywords(["leak"]),
            ALICE,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidReference { kind: ReferenceKind::Project, id } if id == bobs_project
    ));

    let err = repo
        .create(&NoteCreate::new("nope", "body").source(bobs_source), ALICE)
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidReference { kind: ReferenceKind::Source, id } if id == bobs_source
    ));

    let err = repo
        .create(&NoteCreate::new("nope", "body").project(Uuid::new_v4()), ALICE)
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidReference { .. }));

    assert_eq!(count_rows(&conn, "notes"), 0);
    assert_eq!(count_rows(&conn, "keywords"), 0);
    assert_eq!(count_rows(&conn, "note_keywords"), 0);
}

#[test]
fn update_with_foreign_reference_leaves_note_unchanged() {
    let conn = seeded_conn();
    let own_project = seed_project(&conn, ALICE, "Mine");
    let bobs_source = seed_source(&conn, BOB, "Bob's source", "https://example.org/bob");
    let repo = SqliteNoteRepository::new(&conn);
    let note = repo
        .create(
            &NoteCreate::new("before", "body")
                .project(own_project)
                .keywords(["kept"]),
            ALICE,
        )
        .unwrap();

    let err = repo
        .update(
            note.id,
            &NoteUpdate::default()
                .title("after")
                .source(Some(bobs_source))
                .keywords(["new"]),
            ALICE,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::InvalidReference {
            kind: ReferenceKind::Source,
            ..
        }
    ));

    let current = repo.get_by_id(note.id, ALICE).unwrap().unwrap();
    assert_eq!(current, note);
    assert_eq!(count_rows(&conn, "keywords"), 1);
}

#[test]
fn delete_removes_note_and_links_but_not_keywords() {
    let conn = seeded_conn();
    let repo = SqliteNoteRepository::new(&conn);
    let note = repo
        .create(&NoteCreate::new("doomed", "body").keywords(["orphan"]), ALICE)
        .unwrap();

    assert!(repo.delete(note.id, ALICE).unwrap());
    assert!(!repo.delete(note.id, ALICE).unwrap());
    assert!(repo.get_by_id(note.id, ALICE).unwrap().is_none());
    assert_eq!(count_rows(&conn, "note_keywords"), 0);
    assert_eq!(count_rows(&conn, "keywords"), 1);
}

#[test]
fn list_orders_by_updated_at_desc_and_paginates() {
    let conn = seeded_conn();
    let repo = SqliteNoteRepository::new(&conn);
    let mut ids = Vec::new();
    for (index, title) in ["oldest", "middle", "newest"].into_iter().enumerate() {
        let note = repo.create(&NoteCreate::new(title, "body"), ALICE).unwrap();
        set_updated_at(&conn, note.id, 1_000 * (index as i64 + 1));
        ids.push(note.id);
    }

    let listed = repo.list_by_owner(ALICE, Page::default()).unwrap();
    let titles: Vec<&str> = listed.iter().map(|note| note.title.as_str()).collect();
    assert_eq!(titles, vec!["newest", "middle", "oldest"]);

    let second_page = repo.list_by_owner(ALICE, Page::new(1, 1)).unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].id, ids[1]);

    assert!(repo.list_by_owner(ALICE, Page::new(3, 10)).unwrap().is_empty());
}

#[test]
fn equal_timestamps_fall_back_to_id_order() {
    let conn = seeded_conn();
    let repo = SqliteNoteRepository::new(&conn);
    let mut ids = Vec::new();
    for title in ["a", "b", "c"] {
        let note = repo.create(&NoteCreate::new(title, "body"), ALICE).unwrap();
        set_updated_at(&conn, note.id, 5_000);
        ids.push(note.id.to_string());
    }
    ids.sort();

    let listed: Vec<String> = repo
        .list_by_owner(ALICE, Page::default())
        .unwrap()
        .into_iter()
        .map(|note| note.id.to_string())
        .collect();
    assert_eq!(listed, ids);
}

#[test]
fn search_by_text_is_case_insensitive_and_treats_wildcards_literally() {
    let conn = seeded_conn();
    let repo = SqliteNoteRepository::new(&conn);
    let discount = repo
        .create(&NoteCreate::new("Sale", "everything 100% off"), ALICE)
        .unwrap();
    repo.create(&NoteCreate::new("Thousand", "1000 items"), ALICE)
        .unwrap();
    let borrow = repo
        .create(&NoteCreate::new("Borrow Checker", "lifetimes"), ALICE)
        .unwrap();

    let by_title = repo
        .search_by_text(ALICE, "borrow", Page::default())
        .unwrap();
    assert_eq!(by_title.len(), 1);
    assert_eq!(by_title[0].id, borrow.id);

    let by_content = repo.search_by_text(ALICE, "0% O", Page::default()).unwrap();
    assert_eq!(by_content.len(), 1);
    assert_eq!(by_content[0].id, discount.id);

    assert!(repo
        .search_by_text(ALICE, "_", Page::default())
        .unwrap()
        .is_empty());
}

#[test]
fn search_by_text_folds_accented_letters() {
    let conn = seeded_conn();
    let repo = SqliteNoteRepository::new(&conn);
    let song = repo
        .create(&NoteCreate::new("Canción de invierno", "letra"), ALICE)
        .unwrap();
    let tree = repo
        .create(&NoteCreate::new("Botánica", "Árbol frutal"), ALICE)
        .unwrap();

    let upper = repo
        .search_by_text(ALICE, "CANCIÓN", Page::default())
        .unwrap();
    assert_eq!(upper.len(), 1);
    assert_eq!(upper[0].id, song.id);

    let lower = repo.search_by_text(ALICE, "árbol", Page::default()).unwrap();
    assert_eq!(lower.len(), 1);
    assert_eq!(lower[0].id, tree.id);

    assert!(repo
        .search_by_text(ALICE, "arbol", Page::default())
        .unwrap()
        .is_empty());
}

#[test]
fn search_by_project_returns_only_that_projects_notes() {
    let conn = seeded_conn();
    let work = seed_project(&conn, ALICE, "Work");
    let home = seed_project(&conn, ALICE, "Home");
    let repo = SqliteNoteRepository::new(&conn);
    let filed = repo
        .create(&NoteCreate::new("standup", "notes").project(work), ALICE)
        .unwrap();
    repo.create(&NoteCreate::new("groceries", "milk").project(home), ALICE)
        .unwrap();
    repo.create(&NoteCreate::new("loose", "no project"), ALICE)
        .unwrap();

    let found = repo.search_by_project(work, ALICE, Page::default()).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, filed.id);
    assert!(repo
        .search_by_project(work, BOB, Page::default())
        .unwrap()
        .is_empty());
}

#[test]
fn search_by_keywords_matches_any_name_and_filters_by_project() {
    let conn = seeded_conn();
    let project = seed_project(&conn, ALICE, "Lang");
    let repo = SqliteNoteRepository::new(&conn);
    let rust = repo
        .create(
            &NoteCreate::new("rust", "body")
                .project(project)
                .keywords(["rust", "systems"]),
            ALICE,
        )
        .unwrap();
    let go = repo
        .create(&NoteCreate::new("go", "body").keywords(["go", "systems"]), ALICE)
        .unwrap();
    repo.create(&NoteCreate::new("misc", "body").keywords(["misc"]), ALICE)
        .unwrap();

    let single = repo
        .search_by_keyword_name("  rust ", None, ALICE, Page::default())
        .unwrap();
    assert_eq!(single.len(), 1);
    assert_eq!(single[0].id, rust.id);

    let any_of = repo
        .search_by_keyword_names(
            &["rust".to_string(), "go".to_string()],
            None,
            ALICE,
            Page::default(),
        )
        .unwrap();
    let mut found: Vec<Uuid> = any_of.iter().map(|note| note.id).collect();
    found.sort();
    let mut expected = vec![rust.id, go.id];
    expected.sort();
    assert_eq!(found, expected);

    let in_project = repo
        .search_by_keyword_names(&["systems".to_string()], Some(project), ALICE, Page::default())
        .unwrap();
    assert_eq!(in_project.len(), 1);
    assert_eq!(in_project[0].id, rust.id);
}

#[test]
fn blank_keyword_searches_return_empty_results() {
    let conn = seeded_conn();
    let repo = SqliteNoteRepository::new(&conn);
    repo.create(&NoteCreate::new("tagged", "body").keywords(["a"]), ALICE)
        .unwrap();

    assert!(repo
        .search_by_keyword_name("   ", None, ALICE, Page::default())
        .unwrap()
        .is_empty());
    assert!(repo
        .search_by_keyword_names(&[], None, ALICE, Page::default())
        .unwrap()
        .is_empty());
    assert!(repo
        .search_by_keyword_names(&[" ".to_string()], None, ALICE, Page::default())
        .unwrap()
        .is_empty());
}

#[test]
fn search_uses_default_limit_when_zero() {
    let conn = seeded_conn();
    let repo = SqliteNoteRepository::new(&conn);
    for index in 0..25 {
        repo.create(&NoteCreate::new(format!("match {index}"), "body"), ALICE)
            .unwrap();
    }

    let results = repo
        .search_by_text(ALICE, "match", Page::new(0, 0))
        .unwrap();
    assert_eq!(results.len(), 20);
    assert_eq!(repo.list_by_owner(ALICE, Page::new(0, 0)).unwrap().len(), 25);
}
