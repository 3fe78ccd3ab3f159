#![allow(dead_code)]

use rusqlite::{params, Connection};
use uuid::Uuid;

pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";

/// Inserts the two test users every note test relies on.
pub fn seed_users(conn: &Connection) {
    for user_id in [ALICE, BOB] {
        conn.execute(
            "INSERT INTO user_profiles (user_id, name) VALUES (?1, ?1);",
            params![user_id],
        )
        .unwrap();
    }
}

pub fn seed_project(conn: &Connection, owner: &str, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO projects (id, user_id, name) VALUES (?1, ?2, ?3);",
        params![id.to_string(), owner, name],
    )
    .unwrap();
    id
}

pub fn seed_source(conn: &Connection, owner: &str, title: &str, url: &str) -> Uuid {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO sources (id, user_id, type, title, url) VALUES (?1, ?2, 'web', ?3, ?4);",
        params![id.to_string(), owner, title, url],
    )
    .unwrap();
    id
}

pub fn set_updated_at(conn: &Connection, note_id: Uuid, updated_at: i64) {
    conn.execute(
        "UPDATE notes SET updated_at = ?1 WHERE id = ?2;",
        params![updated_at, note_id.to_string()],
    )
    .unwrap();
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
