use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use rusqlite::Connection;

use crate::emit::{OutputRow, RecordSink, RowKind};

pub const DB_PATH: &str = "data/refdex.sqlite";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS runs (
            run_id          TEXT PRIMARY KEY,
            pages           INTEGER NOT NULL,
            articles        INTEGER NOT NULL,
            redirects       INTEGER NOT NULL,
            disambiguations INTEGER NOT NULL,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS records (
            id             INTEGER PRIMARY KEY,
            run_id         TEXT NOT NULL REFERENCES runs(run_id),
            title          TEXT NOT NULL,
            kind           TEXT NOT NULL CHECK(kind IN ('A','R','D')),
            alias          TEXT NOT NULL DEFAULT '',
            categories     TEXT NOT NULL DEFAULT '',
            related        TEXT NOT NULL DEFAULT '',
            links          TEXT NOT NULL DEFAULT '',
            disambiguation TEXT NOT NULL DEFAULT '',
            image          TEXT NOT NULL DEFAULT '',
            abstract       TEXT NOT NULL DEFAULT '',
            source_url     TEXT NOT NULL DEFAULT ''
        );
        CREATE INDEX IF NOT EXISTS idx_records_title ON records(title);
        CREATE INDEX IF NOT EXISTS idx_records_kind ON records(kind);
        ",
    )?;
    Ok(())
}

impl FromSql for RowKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let code = value.as_str()?;
        RowKind::from_code(code).ok_or(FromSqlError::InvalidType)
    }
}

// ── Runs ──

pub struct RunRow {
    pub run_id: String,
    pub pages: usize,
    pub articles: usize,
    pub redirects: usize,
    pub disambiguations: usize,
    pub created_at: String,
}

pub fn insert_run(conn: &Connection, run: &RunRow) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO runs (run_id, pages, articles, redirects, disambiguations, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            run.run_id, run.pages, run.articles, run.redirects, run.disambiguations, run.created_at,
        ],
    )?;
    Ok(())
}

// ── Records ──

/// Sink that replaces the stored records with one run's rows, inside a
/// single transaction committed by `finish`.
pub struct SqliteSink<'c> {
    conn: &'c Connection,
    run_id: String,
    rows: usize,
}

impl<'c> SqliteSink<'c> {
    /// The run row must already exist.
    pub fn begin(conn: &'c Connection, run_id: &str) -> Result<Self> {
        conn.execute_batch("BEGIN TRANSACTION; DELETE FROM records;")?;
        Ok(SqliteSink {
            conn,
            run_id: run_id.to_string(),
            rows: 0,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
}

impl RecordSink for SqliteSink<'_> {
    fn write_row(&mut self, row: &OutputRow) -> Result<()> {
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO records
             (run_id, title, kind, alias, categories, related, links, disambiguation, image, abstract, source_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;
        stmt.execute(rusqlite::params![
            self.run_id, row.title, row.kind.code(), row.alias, row.categories, row.related,
            row.links, row.disambiguation, row.image, row.abstract_text, row.source_url,
        ])?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }
}

pub fn lookup(conn: &Connection, title: &str) -> Result<Vec<OutputRow>> {
    let mut stmt = conn.prepare(
        "SELECT title, kind, alias, categories, related, links, disambiguation, image, abstract, source_url
         FROM records WHERE title = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map([title], |row| {
            Ok(OutputRow {
                title: row.get(0)?,
                kind: row.get(1)?,
                alias: row.get(2)?,
                categories: row.get(3)?,
                related: row.get(4)?,
                links: row.get(5)?,
                disambiguation: row.get(6)?,
                image: row.get(7)?,
                abstract_text: row.get(8)?,
                source_url: row.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub runs: usize,
    pub last_run: Option<String>,
    pub articles: usize,
    pub redirects: usize,
    pub disambiguations: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let runs: usize = conn.query_row("SELECT COUNT(*) FROM runs", [], |r| r.get(0))?;
    let last_run: Option<String> = conn.query_row(
        "SELECT MAX(created_at) FROM runs",
        [],
        |r| r.get(0),
    )?;
    let count = |kind: &str| -> Result<usize> {
        Ok(conn.query_row("SELECT COUNT(*) FROM records WHERE kind = ?1", [kind], |r| r.get(0))?)
    };
    Ok(Stats {
        runs,
        last_run,
        articles: count("A")?,
        redirects: count("R")?,
        disambiguations: count("D")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::Redirect;

    fn open() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = connect(&dir.path().join("nested/refdex.sqlite")).unwrap();
        init_schema(&conn).unwrap();
        (dir, conn)
    }

    fn run(conn: &Connection, id: &str) {
        insert_run(
            conn,
            &RunRow {
                run_id: id.into(),
                pages: 1,
                articles: 0,
                redirects: 1,
                disambiguations: 0,
                created_at: "2026-01-01T00:00:00Z".into(),
            },
        )
        .unwrap();
    }

    fn redirect(alias: &str, target: &str) -> OutputRow {
        OutputRow::redirect(&Redirect {
            alias: alias.into(),
            target: target.into(),
        })
    }

    #[test]
    fn store_and_lookup() {
        let (_dir, conn) = open();
        run(&conn, "run-1");
        let mut sink = SqliteSink::begin(&conn, "run-1").unwrap();
        sink.write_row(&redirect("Baz", "Bar")).unwrap();
        sink.finish().unwrap();
        assert_eq!(sink.rows(), 1);

        let rows = lookup(&conn, "Baz").unwrap();
        assert_eq!(rows, vec![redirect("Baz", "Bar")]);
        assert!(lookup(&conn, "Nope").unwrap().is_empty());
    }

    #[test]
    fn new_run_replaces_records() {
        let (_dir, conn) = open();
        run(&conn, "run-1");
        let mut sink = SqliteSink::begin(&conn, "run-1").unwrap();
        sink.write_row(&redirect("Old", "Bar")).unwrap();
        sink.finish().unwrap();

        run(&conn, "run-2");
        let mut sink = SqliteSink::begin(&conn, "run-2").unwrap();
        sink.write_row(&redirect("New", "Bar")).unwrap();
        sink.finish().unwrap();

        assert!(lookup(&conn, "Old").unwrap().is_empty());
        let stats = get_stats(&conn).unwrap();
        assert_eq!(stats.runs, 2);
        assert_eq!(stats.redirects, 1);
        assert_eq!(stats.articles, 0);
        assert_eq!(stats.last_run.as_deref(), Some("2026-01-01T00:00:00Z"));
    }
}
