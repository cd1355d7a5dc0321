use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};

const SHOW_COLUMNS: &str = "id, api_id, name, summary, image_medium, image_original, genres, schedule_time, schedule_days, is_favorite, rating";
const EPISODE_COLUMNS: &str = "id, api_id, show_api_id, name, season, number, summary, image_medium, image_original, rating";

/// Stored form of a show. `id` is `None` until the row has been written.
#[derive(Debug, Clone, PartialEq)]
pub struct ShowRow {
    pub id: Option<i64>,
    pub api_id: i64,
    pub name: String,
    pub summary: String,
    pub image_medium: String,
    pub image_original: String,
    pub genres: Vec<String>,
    pub schedule_time: String,
    pub schedule_days: Vec<String>,
    pub is_favorite: bool,
    pub rating: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeRow {
    pub id: Option<i64>,
    pub api_id: i64,
    pub show_api_id: i64,
    pub name: String,
    pub season: i64,
    pub number: i64,
    pub summary: Option<String>,
    pub image_medium: Option<String>,
    pub image_original: Option<String>,
    pub rating: f32,
}

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS shows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                api_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                summary TEXT NOT NULL,
                image_medium TEXT NOT NULL,
                image_original TEXT NOT NULL,
                genres TEXT NOT NULL,
                schedule_time TEXT NOT NULL,
                schedule_days TEXT NOT NULL,
                is_favorite INTEGER NOT NULL DEFAULT 0,
                rating REAL NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_shows_api_id ON shows(api_id);
            CREATE TABLE IF NOT EXISTS episodes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                api_id INTEGER NOT NULL,
                show_api_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                season INTEGER NOT NULL,
                number INTEGER NOT NULL,
                summary TEXT,
                image_medium TEXT,
                image_original TEXT,
                rating REAL NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_episodes_show ON episodes(show_api_id);
            "#,
        )?;
        Ok(())
    }

    /// Inserts the rows, replacing any row that carries the same `id`.
    pub fn insert_shows(&self, shows: &[ShowRow]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        write_shows(&tx, shows)?;
        tx.commit()?;
        Ok(())
    }

    /// Swaps the whole show table for `shows` in one transaction. Favorite
    /// flags of the old rows are carried over by `api_id`. Returns how many
    /// rows were removed.
    pub fn replace_shows(&self, shows: &[ShowRow]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let favorites = favorite_api_ids(&tx)?;
        let removed = tx.execute("DELETE FROM shows", [])?;
        let rows = shows
            .iter()
            .map(|show| ShowRow {
                is_favorite: show.is_favorite || favorites.contains(&show.api_id),
                ..show.clone()
            })
            .collect::<Vec<_>>();
        write_shows(&tx, &rows)?;
        tx.commit()?;
        Ok(removed)
    }

    pub fn list_shows(&self) -> Result<Vec<ShowRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {SHOW_COLUMNS} FROM shows ORDER BY id"))?;
        let rows = stmt.query_map([], show_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn shows_by_name(&self, query: &str) -> Result<Vec<ShowRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SHOW_COLUMNS} FROM shows WHERE name LIKE '%' || ?1 || '%' ORDER BY id"
        ))?;
        let rows = stmt
            .query_map(params![query], show_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn show_by_id(&self, id: i64) -> Result<Option<ShowRow>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {SHOW_COLUMNS} FROM shows WHERE id = ?1"),
                params![id],
                show_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Swaps every episode of one show for `episodes` in one transaction.
    pub fn replace_episodes_for_show(
        &self,
        show_api_id: i64,
        episodes: &[EpisodeRow],
    ) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM episodes WHERE show_api_id = ?1",
            params![show_api_id],
        )?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO episodes ({EPISODE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
            ))?;
            for episode in episodes {
                stmt.execute(params![
                    episode.id,
                    episode.api_id,
                    show_api_id,
                    episode.name,
                    episode.season,
                    episode.number,
                    episode.summary,
                    episode.image_medium,
                    episode.image_original,
                    f64::from(episode.rating),
                ])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    pub fn episodes_for_show(&self, show_api_id: i64) -> Result<Vec<EpisodeRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {EPISODE_COLUMNS} FROM episodes WHERE show_api_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![show_api_id], episode_from_row)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn episode_by_id(&self, id: i64) -> Result<Option<EpisodeRow>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {EPISODE_COLUMNS} FROM episodes WHERE id = ?1"),
                params![id],
                episode_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn clear_episodes(&self) -> Result<usize> {
        Ok(self.conn()?.execute("DELETE FROM episodes", [])?)
    }
}

fn write_shows(tx: &Transaction<'_>, shows: &[ShowRow]) -> Result<()> {
    let mut stmt = tx.prepare(&format!(
        "INSERT OR REPLACE INTO shows ({SHOW_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
    ))?;
    for show in shows {
        stmt.execute(params![
            show.id,
            show.api_id,
            show.name,
            show.summary,
            show.image_medium,
            show.image_original,
            serde_json::to_string(&show.genres)?,
            show.schedule_time,
            serde_json::to_string(&show.schedule_days)?,
            show.is_favorite,
            f64::from(show.rating),
        ])?;
    }
    Ok(())
}

fn favorite_api_ids(tx: &Transaction<'_>) -> Result<HashSet<i64>> {
    let mut stmt = tx.prepare("SELECT api_id FROM shows WHERE is_favorite = 1")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    Ok(ids)
}

fn json_list_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

fn show_from_row(row: &Row<'_>) -> rusqlite::Result<ShowRow> {
    Ok(ShowRow {
        id: row.get(0)?,
        api_id: row.get(1)?,
        name: row.get(2)?,
        summary: row.get(3)?,
        image_medium: row.get(4)?,
        image_original: row.get(5)?,
        genres: json_list_column(row, 6)?,
        schedule_time: row.get(7)?,
        schedule_days: json_list_column(row, 8)?,
        is_favorite: row.get(9)?,
        rating: row.get::<_, f64>(10)? as f32,
    })
}

fn episode_from_row(row: &Row<'_>) -> rusqlite::Result<EpisodeRow> {
    Ok(EpisodeRow {
        id: row.get(0)?,
        api_id: row.get(1)?,
        show_api_id: row.get(2)?,
        name: row.get(3)?,
        season: row.get(4)?,
        number: row.get(5)?,
        summary: row.get(6)?,
        image_medium: row.get(7)?,
        image_original: row.get(8)?,
        rating: row.get::<_, f64>(9)? as f32,
    })
}
