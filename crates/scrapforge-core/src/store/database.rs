//! SQLite-backed repository.
//!
//! One connection per store. Multi-write operations (session finalization
//! with settlement, vote recording, vote removal) run inside sqlite
//! transactions, so a crash cannot settle points against an unfolded
//! pause interval or half-record a vote. The partial unique index over
//! open sessions is what serializes concurrent `start` calls for the
//! same owner.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::ledger::{LeaderboardEntry, NewTransaction, PointTransaction, TransactionStatus};
use crate::scrap::{NewScrap, Scrap};
use crate::session::{Session, SessionStatus};
use crate::voting::{Vote, VoteOutcome};

use super::data_dir;

// === Helper Functions ===

fn bad_status(column: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        format!("unrecognized status '{value}'").into(),
    )
}

// Unknown status text fails the row mapping; defaulting would silently
// promote corrupt rows into the open/pending states.
fn parse_session_status(column: usize, status_str: &str) -> Result<SessionStatus, rusqlite::Error> {
    match status_str {
        "active" => Ok(SessionStatus::Active),
        "paused" => Ok(SessionStatus::Paused),
        "completed" => Ok(SessionStatus::Completed),
        "cancelled" => Ok(SessionStatus::Cancelled),
        other => Err(bad_status(column, other)),
    }
}

fn parse_transaction_status(
    column: usize,
    status_str: &str,
) -> Result<TransactionStatus, rusqlite::Error> {
    match status_str {
        "pending" => Ok(TransactionStatus::Pending),
        "approved" => Ok(TransactionStatus::Approved),
        "rejected" => Ok(TransactionStatus::Rejected),
        "deleted" => Ok(TransactionStatus::Deleted),
        other => Err(bad_status(column, other)),
    }
}

/// Parse datetime from RFC3339 string with fallback to current time.
fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn row_to_session(row: &rusqlite::Row) -> Result<Session, rusqlite::Error> {
    Ok(Session {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        status: parse_session_status(2, &row.get::<_, String>(2)?)?,
        started_at: parse_datetime_fallback(&row.get::<_, String>(3)?),
        last_paused_at: row
            .get::<_, Option<String>>(4)?
            .map(|s| parse_datetime_fallback(&s)),
        total_paused_secs: row.get(5)?,
        completed_at: row
            .get::<_, Option<String>>(6)?
            .map(|s| parse_datetime_fallback(&s)),
        points_per_hour: row.get(7)?,
    })
}

fn row_to_scrap(row: &rusqlite::Row) -> Result<Scrap, rusqlite::Error> {
    let urls_json: String = row.get(4)?;
    Ok(Scrap {
        id: row.get(0)?,
        session_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        attachment_urls: serde_json::from_str(&urls_json).unwrap_or_default(),
        base_points: row.get(5)?,
        total_points: row.get(6)?,
        created_at: parse_datetime_fallback(&row.get::<_, String>(7)?),
    })
}

fn row_to_vote(row: &rusqlite::Row) -> Result<Vote, rusqlite::Error> {
    Ok(Vote {
        id: row.get(0)?,
        voter_id: row.get(1)?,
        scrap_id: row.get(2)?,
        other_scrap_id: row.get(3)?,
        points_awarded: row.get(4)?,
        created_at: parse_datetime_fallback(&row.get::<_, String>(5)?),
        voter_tx_id: row.get(6)?,
        creator_tx_id: row.get(7)?,
    })
}

fn row_to_transaction(row: &rusqlite::Row) -> Result<PointTransaction, rusqlite::Error> {
    Ok(PointTransaction {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        reason: row.get(3)?,
        author_id: row.get(4)?,
        created_at: parse_datetime_fallback(&row.get::<_, String>(5)?),
        status: parse_transaction_status(6, &row.get::<_, String>(6)?)?,
        reviewer_id: row.get(7)?,
        reviewed_at: row
            .get::<_, Option<String>>(8)?
            .map(|s| parse_datetime_fallback(&s)),
        rejection_reason: row.get(9)?,
    })
}

const SESSION_COLS: &str =
    "id, owner_id, status, started_at, last_paused_at, total_paused_secs, completed_at, points_per_hour";
const SCRAP_COLS: &str =
    "id, session_id, title, description, attachment_urls, base_points, total_points, created_at";
const VOTE_COLS: &str =
    "id, voter_id, scrap_id, other_scrap_id, points_awarded, created_at, voter_tx_id, creator_tx_id";
const TX_COLS: &str =
    "id, user_id, amount, reason, author_id, created_at, status, reviewer_id, reviewed_at, rejection_reason";

/// SQLite repository for the engine's records.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the store at `data_dir()/scrapforge.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let path = data_dir()?.join("scrapforge.db");
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    /// Open an in-memory store (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self, rusqlite::Error> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id          TEXT NOT NULL,
                status            TEXT NOT NULL,
                started_at        TEXT NOT NULL,
                last_paused_at    TEXT,
                total_paused_secs INTEGER NOT NULL DEFAULT 0,
                completed_at      TEXT,
                points_per_hour   INTEGER NOT NULL
            );

            -- One open (active or paused) session per owner; concurrent
            -- starts race against this index, not against a read.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_open_owner
                ON sessions(owner_id) WHERE status IN ('active', 'paused');

            CREATE TABLE IF NOT EXISTS scraps (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id      INTEGER NOT NULL REFERENCES sessions(id),
                title           TEXT NOT NULL,
                description     TEXT NOT NULL DEFAULT '',
                attachment_urls TEXT NOT NULL DEFAULT '[]',
                base_points     INTEGER NOT NULL,
                total_points    INTEGER NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_scraps_session ON scraps(session_id);

            CREATE TABLE IF NOT EXISTS votes (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                voter_id       TEXT NOT NULL,
                scrap_id       INTEGER NOT NULL REFERENCES scraps(id),
                other_scrap_id INTEGER NOT NULL,
                points_awarded INTEGER NOT NULL,
                created_at     TEXT NOT NULL,
                voter_tx_id    INTEGER,
                creator_tx_id  INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_votes_voter_created ON votes(voter_id, created_at);

            CREATE TABLE IF NOT EXISTS point_transactions (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id          TEXT NOT NULL,
                amount           INTEGER NOT NULL,
                reason           TEXT NOT NULL,
                author_id        TEXT NOT NULL,
                created_at       TEXT NOT NULL,
                status           TEXT NOT NULL DEFAULT 'pending',
                reviewer_id      TEXT,
                reviewed_at      TEXT,
                rejection_reason TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_tx_user_status ON point_transactions(user_id, status);
            CREATE INDEX IF NOT EXISTS idx_tx_status ON point_transactions(status);",
        )?;
        Ok(())
    }

    /// Whether `e` is a constraint violation, e.g. a second open session
    /// racing past the existence check into the partial unique index.
    pub fn is_unique_violation(e: &rusqlite::Error) -> bool {
        matches!(
            e,
            rusqlite::Error::SqliteFailure(f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }

    // === Sessions ===

    pub fn insert_session(
        &self,
        owner_id: &str,
        started_at: DateTime<Utc>,
        points_per_hour: i64,
    ) -> Result<Session, rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO sessions (owner_id, status, started_at, total_paused_secs, points_per_hour)
             VALUES (?1, 'active', ?2, 0, ?3)",
            params![owner_id, format_datetime(started_at), points_per_hour],
        )?;
        self.session_required(self.conn.last_insert_rowid())
    }

    pub fn session(&self, id: i64) -> Result<Option<Session>, rusqlite::Error> {
        self.conn
            .query_row(
                &format!("SELECT {SESSION_COLS} FROM sessions WHERE id = ?1"),
                params![id],
                row_to_session,
            )
            .optional()
    }

    /// The owner's active or paused session, if any. The unique index
    /// guarantees at most one exists.
    pub fn find_open_session(&self, owner_id: &str) -> Result<Option<Session>, rusqlite::Error> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {SESSION_COLS} FROM sessions
                     WHERE owner_id = ?1 AND status IN ('active', 'paused')"
                ),
                params![owner_id],
                row_to_session,
            )
            .optional()
    }

    pub fn set_paused(&self, id: i64, at: DateTime<Utc>) -> Result<Session, rusqlite::Error> {
        self.conn.execute(
            "UPDATE sessions SET status = 'paused', last_paused_at = ?2 WHERE id = ?1",
            params![id, format_datetime(at)],
        )?;
        self.session_required(id)
    }

    pub fn set_resumed(
        &self,
        id: i64,
        total_paused_secs: i64,
    ) -> Result<Session, rusqlite::Error> {
        self.conn.execute(
            "UPDATE sessions
             SET status = 'active', last_paused_at = NULL, total_paused_secs = ?2
             WHERE id = ?1",
            params![id, total_paused_secs],
        )?;
        self.session_required(id)
    }

    /// Finalize a session into a terminal status and, when completion
    /// settled points, append the ledger entry in the same transaction.
    ///
    /// The update only matches a still-open row, so two callers racing
    /// to finalize the same session cannot both settle: the loser sees
    /// `Ok(None)` and nothing is written.
    pub fn finalize_session(
        &self,
        id: i64,
        status: SessionStatus,
        total_paused_secs: i64,
        completed_at: DateTime<Utc>,
        settlement: Option<&NewTransaction>,
    ) -> Result<Option<(Session, Option<PointTransaction>)>, rusqlite::Error> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = self.conn.execute(
            "UPDATE sessions
             SET status = ?2, last_paused_at = NULL, total_paused_secs = ?3, completed_at = ?4
             WHERE id = ?1 AND status IN ('active', 'paused')",
            params![
                id,
                status.as_str(),
                total_paused_secs,
                format_datetime(completed_at)
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        let settled = match settlement {
            Some(entry) => Some(self.insert_transaction(entry, completed_at)?),
            None => None,
        };
        tx.commit()?;
        Ok(Some((self.session_required(id)?, settled)))
    }

    fn session_required(&self, id: i64) -> Result<Session, rusqlite::Error> {
        self.session(id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    // === Scraps ===

    pub fn insert_scrap(
        &self,
        scrap: &NewScrap,
        base_points: i64,
        created_at: DateTime<Utc>,
    ) -> Result<Scrap, rusqlite::Error> {
        let urls_json =
            serde_json::to_string(&scrap.attachment_urls).unwrap_or_else(|_| "[]".to_string());
        self.conn.execute(
            "INSERT INTO scraps (session_id, title, description, attachment_urls,
                                 base_points, total_points, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6)",
            params![
                scrap.session_id,
                scrap.title,
                scrap.description,
                urls_json,
                base_points,
                format_datetime(created_at)
            ],
        )?;
        self.scrap_required(self.conn.last_insert_rowid())
    }

    pub fn scrap(&self, id: i64) -> Result<Option<Scrap>, rusqlite::Error> {
        self.conn
            .query_row(
                &format!("SELECT {SCRAP_COLS} FROM scraps WHERE id = ?1"),
                params![id],
                row_to_scrap,
            )
            .optional()
    }

    pub fn scraps_by_session(&self, session_id: i64) -> Result<Vec<Scrap>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SCRAP_COLS} FROM scraps WHERE session_id = ?1 ORDER BY created_at"
        ))?;
        let rows = stmt.query_map(params![session_id], row_to_scrap)?;
        rows.collect()
    }

    /// Two distinct random scraps whose producing sessions are not owned
    /// by `voter_id`. Self-voting is excluded here, by construction.
    pub fn random_scrap_pair(
        &self,
        voter_id: &str,
    ) -> Result<Option<(Scrap, Scrap)>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT s.id, s.session_id, s.title, s.description, s.attachment_urls,
                    s.base_points, s.total_points, s.created_at
             FROM scraps s
             JOIN sessions ss ON ss.id = s.session_id
             WHERE ss.owner_id != ?1
             ORDER BY RANDOM()
             LIMIT 2",
        )?;
        let scraps: Vec<Scrap> = stmt
            .query_map(params![voter_id], row_to_scrap)?
            .collect::<Result<_, _>>()?;
        let mut it = scraps.into_iter();
        Ok(match (it.next(), it.next()) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        })
    }

    fn scrap_required(&self, id: i64) -> Result<Scrap, rusqlite::Error> {
        self.scrap(id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
    }

    // === Votes ===

    /// Record a vote with its settlement entries, the scrap's bonus bump,
    /// and the transaction links, atomically.
    #[allow(clippy::too_many_arguments)]
    pub fn record_vote(
        &self,
        voter_id: &str,
        scrap_id: i64,
        other_scrap_id: i64,
        creator_points: i64,
        created_at: DateTime<Utc>,
        voter_entry: &NewTransaction,
        creator_entry: Option<&NewTransaction>,
    ) -> Result<VoteOutcome, rusqlite::Error> {
        let tx = self.conn.unchecked_transaction()?;
        let voter_tx = self.insert_transaction(voter_entry, created_at)?;
        let creator_tx = match creator_entry {
            Some(entry) => Some(self.insert_transaction(entry, created_at)?),
            None => None,
        };
        if creator_points > 0 {
            self.conn.execute(
                "UPDATE scraps SET total_points = total_points + ?2 WHERE id = ?1",
                params![scrap_id, creator_points],
            )?;
        }
        self.conn.execute(
            "INSERT INTO votes (voter_id, scrap_id, other_scrap_id, points_awarded,
                                created_at, voter_tx_id, creator_tx_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                voter_id,
                scrap_id,
                other_scrap_id,
                creator_points,
                format_datetime(created_at),
                voter_tx.id,
                creator_tx.as_ref().map(|t| t.id)
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tx.commit()?;
        let vote = self
            .vote(id)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        Ok(VoteOutcome {
            vote,
            voter_tx,
            creator_tx,
        })
    }

    pub fn vote(&self, id: i64) -> Result<Option<Vote>, rusqlite::Error> {
        self.conn
            .query_row(
                &format!("SELECT {VOTE_COLS} FROM votes WHERE id = ?1"),
                params![id],
                row_to_vote,
            )
            .optional()
    }

    pub fn count_votes_since(
        &self,
        voter_id: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, rusqlite::Error> {
        self.conn.query_row(
            "SELECT COUNT(*) FROM votes WHERE voter_id = ?1 AND created_at >= ?2",
            params![voter_id, format_datetime(since)],
            |row| row.get(0),
        )
    }

    pub fn oldest_vote_since(
        &self,
        voter_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
        let oldest: Option<String> = self.conn.query_row(
            "SELECT MIN(created_at) FROM votes WHERE voter_id = ?1 AND created_at >= ?2",
            params![voter_id, format_datetime(since)],
            |row| row.get(0),
        )?;
        Ok(oldest.map(|s| parse_datetime_fallback(&s)))
    }

    /// Remove a vote row, rolling its creator bonus back off the scrap
    /// (clamped so the total never drops below base), atomically.
    pub fn remove_vote(&self, vote: &Vote) -> Result<(), rusqlite::Error> {
        let tx = self.conn.unchecked_transaction()?;
        if vote.points_awarded > 0 {
            self.conn.execute(
                "UPDATE scraps
                 SET total_points = MAX(base_points, total_points - ?2)
                 WHERE id = ?1",
                params![vote.scrap_id, vote.points_awarded],
            )?;
        }
        self.conn
            .execute("DELETE FROM votes WHERE id = ?1", params![vote.id])?;
        tx.commit()?;
        Ok(())
    }

    // === Point transactions ===

    pub fn insert_transaction(
        &self,
        entry: &NewTransaction,
        created_at: DateTime<Utc>,
    ) -> Result<PointTransaction, rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO point_transactions (user_id, amount, reason, author_id, created_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.user_id,
                entry.amount,
                entry.reason,
                entry.author_id,
                format_datetime(created_at),
                entry.status.as_str()
            ],
        )?;
        self.transaction_required(self.conn.last_insert_rowid())
    }

    pub fn transaction(&self, id: i64) -> Result<Option<PointTransaction>, rusqlite::Error> {
        self.conn
            .query_row(
                &format!("SELECT {TX_COLS} FROM point_transactions WHERE id = ?1"),
                params![id],
                row_to_transaction,
            )
            .optional()
    }

    pub fn apply_review(
        &self,
        id: i64,
        status: TransactionStatus,
        reviewer_id: &str,
        reviewed_at: DateTime<Utc>,
        rejection_reason: Option<&str>,
    ) -> Result<PointTransaction, rusqlite::Error> {
        self.conn.execute(
            "UPDATE point_transactions
             SET status = ?2, reviewer_id = ?3, reviewed_at = ?4, rejection_reason = ?5
             WHERE id = ?1",
            params![
                id,
                status.as_str(),
                reviewer_id,
                format_datetime(reviewed_at),
                rejection_reason
            ],
        )?;
        self.transaction_required(id)
    }

    /// Aggregate balance over non-rejected, non-deleted entries. Always
    /// computed live; no cached running total exists to drift.
    pub fn balance(&self, user_id: &str) -> Result<i64, rusqlite::Error> {
        self.conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM point_transactions
             WHERE user_id = ?1 AND status NOT IN ('rejected', 'deleted')",
            params![user_id],
            |row| row.get(0),
        )
    }

    pub fn pending_transactions(&self) -> Result<Vec<PointTransaction>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TX_COLS} FROM point_transactions
             WHERE status = 'pending' ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map([], row_to_transaction)?;
        rows.collect()
    }

    pub fn transactions_by_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<PointTransaction>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TX_COLS} FROM point_transactions
             WHERE user_id = ?1 ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![user_id], row_to_transaction)?;
        rows.collect()
    }

    pub fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, SUM(amount) AS balance FROM point_transactions
             WHERE status NOT IN ('rejected', 'deleted')
             GROUP BY user_id
             ORDER BY balance DESC, user_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(LeaderboardEntry {
                user_id: row.get(0)?,
                balance: row.get(1)?,
            })
        })?;
        rows.collect()
    }

    fn transaction_required(&self, id: i64) -> Result<PointTransaction, rusqlite::Error> {
        self.transaction(id)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn session_round_trip() {
        let store = Store::open_memory().unwrap();
        let session = store.insert_session("ada", t(1_000), 100).unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.total_paused_secs, 0);
        assert!(session.last_paused_at.is_none());

        let paused = store.set_paused(session.id, t(1_600)).unwrap();
        assert_eq!(paused.status, SessionStatus::Paused);
        assert_eq!(paused.last_paused_at, Some(t(1_600)));

        let resumed = store.set_resumed(session.id, 300).unwrap();
        assert_eq!(resumed.status, SessionStatus::Active);
        assert_eq!(resumed.total_paused_secs, 300);
        assert!(resumed.last_paused_at.is_none());
    }

    #[test]
    fn open_session_index_rejects_second_row() {
        let store = Store::open_memory().unwrap();
        store.insert_session("ada", t(0), 100).unwrap();
        let err = store.insert_session("ada", t(10), 100).unwrap_err();
        assert!(Store::is_unique_violation(&err));
        // A terminal session frees the slot.
        let open = store.find_open_session("ada").unwrap().unwrap();
        store
            .finalize_session(open.id, SessionStatus::Cancelled, 0, t(20), None)
            .unwrap()
            .unwrap();
        store.insert_session("ada", t(30), 100).unwrap();
    }

    #[test]
    fn finalize_with_settlement_is_atomic_pair() {
        let store = Store::open_memory().unwrap();
        let session = store.insert_session("ada", t(0), 100).unwrap();
        let entry = NewTransaction::approved("ada", 15, "session", "ada");
        let (done, settled) = store
            .finalize_session(session.id, SessionStatus::Completed, 300, t(5_700), Some(&entry))
            .unwrap()
            .unwrap();
        assert_eq!(done.status, SessionStatus::Completed);
        assert_eq!(done.completed_at, Some(t(5_700)));
        assert_eq!(settled.unwrap().amount, 15);
        assert_eq!(store.balance("ada").unwrap(), 15);
    }

    #[test]
    fn finalize_matches_only_open_sessions() {
        let store = Store::open_memory().unwrap();
        let session = store.insert_session("ada", t(0), 100).unwrap();
        let entry = NewTransaction::approved("ada", 15, "session", "ada");
        store
            .finalize_session(session.id, SessionStatus::Completed, 0, t(3_600), Some(&entry))
            .unwrap()
            .unwrap();
        assert_eq!(store.balance("ada").unwrap(), 15);

        // A second finalization of the same row (two processes racing to
        // complete) matches nothing and must not settle again.
        let second = store
            .finalize_session(session.id, SessionStatus::Completed, 0, t(3_700), Some(&entry))
            .unwrap();
        assert!(second.is_none());
        assert_eq!(store.balance("ada").unwrap(), 15);
        let kept = store.session(session.id).unwrap().unwrap();
        assert_eq!(kept.completed_at, Some(t(3_600)));
    }

    #[test]
    fn unknown_status_text_fails_row_mapping() {
        let store = Store::open_memory().unwrap();
        let session = store.insert_session("ada", t(0), 100).unwrap();
        store
            .conn()
            .execute(
                "UPDATE sessions SET status = 'limbo' WHERE id = ?1",
                params![session.id],
            )
            .unwrap();
        assert!(store.session(session.id).unwrap_err().to_string().contains("limbo"));

        let entry = NewTransaction::approved("ada", 5, "award", "grace");
        let tx = store.insert_transaction(&entry, t(10)).unwrap();
        store
            .conn()
            .execute(
                "UPDATE point_transactions SET status = 'limbo' WHERE id = ?1",
                params![tx.id],
            )
            .unwrap();
        assert!(store.transaction(tx.id).is_err());
    }

    #[test]
    fn attachment_urls_round_trip_as_json() {
        let store = Store::open_memory().unwrap();
        let session = store.insert_session("ada", t(0), 100).unwrap();
        let scrap = store
            .insert_scrap(
                &NewScrap {
                    session_id: session.id,
                    title: "demo".into(),
                    description: "desc".into(),
                    attachment_urls: vec!["a://1".into(), "a://2".into()],
                },
                40,
                t(100),
            )
            .unwrap();
        let loaded = store.scrap(scrap.id).unwrap().unwrap();
        assert_eq!(loaded.attachment_urls, vec!["a://1", "a://2"]);
        assert_eq!(loaded.base_points, 40);
        assert_eq!(loaded.total_points, 40);
    }

    #[test]
    fn remove_vote_clamps_bonus_at_base() {
        let store = Store::open_memory().unwrap();
        let session = store.insert_session("ada", t(0), 100).unwrap();
        let scrap = store
            .insert_scrap(
                &NewScrap {
                    session_id: session.id,
                    title: "demo".into(),
                    description: String::new(),
                    attachment_urls: Vec::new(),
                },
                10,
                t(100),
            )
            .unwrap();
        let voter_entry = NewTransaction::approved("eve", 1, "vote", "eve");
        let outcome = store
            .record_vote("eve", scrap.id, scrap.id + 1, 3, t(200), &voter_entry, None)
            .unwrap();
        assert_eq!(store.scrap(scrap.id).unwrap().unwrap().total_points, 13);

        // Claims more than the bonus ever added; clamp holds the floor.
        let mut vote = outcome.vote;
        vote.points_awarded = 99;
        store.remove_vote(&vote).unwrap();
        assert_eq!(store.scrap(scrap.id).unwrap().unwrap().total_points, 10);
        assert!(store.vote(vote.id).unwrap().is_none());
    }

    #[test]
    fn vote_window_queries() {
        let store = Store::open_memory().unwrap();
        let session = store.insert_session("ada", t(0), 100).unwrap();
        let scrap = store
            .insert_scrap(
                &NewScrap {
                    session_id: session.id,
                    title: "demo".into(),
                    description: String::new(),
                    attachment_urls: Vec::new(),
                },
                0,
                t(0),
            )
            .unwrap();
        let entry = NewTransaction::approved("eve", 1, "vote", "eve");
        for at in [1_000, 2_000, 3_000] {
            store
                .record_vote("eve", scrap.id, scrap.id, 0, t(at), &entry, None)
                .unwrap();
        }
        assert_eq!(store.count_votes_since("eve", t(1_500)).unwrap(), 2);
        assert_eq!(
            store.oldest_vote_since("eve", t(1_500)).unwrap(),
            Some(t(2_000))
        );
        assert_eq!(store.count_votes_since("bob", t(0)).unwrap(), 0);
        assert!(store.oldest_vote_since("eve", t(9_000)).unwrap().is_none());
    }
}
