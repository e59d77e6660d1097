// Shared fixture for the in-crate tests: a small on-disk store plus helpers
// that build reference stores with a raw connection and compare
// serializations byte for byte.

use crate::database::Database;
use rusqlite::{Connection, DatabaseName};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub(crate) const DEFAULT_STATEMENTS: &[&str] = &[
    "CREATE TABLE kv (key TEXT PRIMARY KEY, value TEXT)",
    "CREATE TABLE npcs (entity INT PRIMARY KEY, name TEXT, job TEXT, time REAL)",
    "CREATE TABLE quests (npc INT, quest INT, completed BOOLEAN)",
    "INSERT INTO kv VALUES ('foo', 'bar')",
    "INSERT INTO kv VALUES ('spam', NULL)",
    "INSERT INTO npcs VALUES (1, 'Alex', 'Armorer', 4.321)",
    "INSERT INTO npcs VALUES (2, 'Bob', 'Banker', NULL)",
    "INSERT INTO quests VALUES (1, 42, 0)",
    "INSERT INTO quests VALUES (1, 43, NULL)",
    "INSERT INTO quests VALUES (2, 43, 1)",
];

pub(crate) struct Fixture {
    pub db: Database,
    pub db_path: PathBuf,
    comparison_path: PathBuf,
    starting_serialization: Vec<u8>,
    _tmp: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("test.db");
        let comparison_path = tmp.path().join("test2.db");

        let conn = reconstruct(&db_path, &[]);
        let starting_serialization = serialize(&conn);
        drop(conn);

        let db = Database::default();
        db.open(&db_path).unwrap();

        Fixture {
            db,
            db_path,
            comparison_path,
            starting_serialization,
            _tmp: tmp,
        }
    }

    /// Build a fresh comparison store from the default statements followed
    /// by `extra`, and return its serialization.
    pub fn reconstruct_with(&self, extra: &[&str]) -> Vec<u8> {
        serialize(&reconstruct(&self.comparison_path, extra))
    }

    /// Assert the fixture store's file serializes to exactly `expected`.
    pub fn verify_serialization(&self, expected: &[u8]) {
        let conn = Connection::open(&self.db_path).unwrap();
        let actual = serialize(&conn);
        assert!(
            expected == actual.as_slice(),
            "store serialization differs from the expected one"
        );
    }

    pub fn verify_no_changes(&self) {
        self.verify_serialization(&self.starting_serialization);
    }
}

fn reconstruct(path: &Path, extra: &[&str]) -> Connection {
    if path.exists() {
        std::fs::remove_file(path).unwrap();
    }
    let conn = Connection::open(path).unwrap();
    for statement in DEFAULT_STATEMENTS.iter().chain(extra) {
        conn.execute_batch(statement).unwrap();
    }
    conn
}

fn serialize(conn: &Connection) -> Vec<u8> {
    conn.serialize(DatabaseName::Main).unwrap().to_vec()
}
