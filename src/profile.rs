use crate::app_dirs::AppDirs;
use crate::rewards::{CLAIM_THRESHOLD, SIGNUP_GEMS};
use crate::session::{CompletionSummary, ErrorRecord, SessionMode};
use chrono::{DateTime, Local};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    uid INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    grade INTEGER NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    gems INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS admins (
    email TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS login_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uid INTEGER NOT NULL REFERENCES users(uid),
    timestamp TEXT NOT NULL,
    user_type TEXT NOT NULL,
    device_info TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS test_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    uid INTEGER NOT NULL REFERENCES users(uid),
    subject TEXT NOT NULL,
    grade INTEGER NOT NULL,
    set_id INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    total_questions INTEGER NOT NULL,
    correct_answers INTEGER NOT NULL,
    errors INTEGER NOT NULL,
    error_details TEXT NOT NULL,
    time_taken_secs INTEGER NOT NULL,
    gems_earned INTEGER NOT NULL,
    mode TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_login_history_uid ON login_history(uid);
CREATE INDEX IF NOT EXISTS idx_test_logs_uid ON test_logs(uid);
"#;

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("database error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("failed to prepare database location: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode error details: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no profile found for user {0}")]
    UnknownUser(i64),
    #[error("email already in use: {0}")]
    EmailInUse(String),
    #[error("at least {} gems are needed to claim a reward (balance {balance})", CLAIM_THRESHOLD)]
    BelowThreshold { balance: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub uid: i64,
    pub name: String,
    pub grade: u32,
    pub email: String,
    pub gems: i64,
    pub created_at: DateTime<Local>,
}

/// A profile together with its stored password hash.
#[derive(Debug, Clone)]
pub struct Account {
    pub profile: Profile,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub grade: u32,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum UserType {
    Student,
    Admin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginEvent {
    pub uid: i64,
    pub timestamp: DateTime<Local>,
    pub user_type: String,
    pub device_info: String,
}

/// What the caller hands over when an attempt finishes.
#[derive(Debug, Clone)]
pub struct CompletionRecord {
    pub subject: String,
    pub grade: u32,
    pub set_id: usize,
    pub summary: CompletionSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttemptLog {
    pub id: i64,
    pub uid: i64,
    pub subject: String,
    pub grade: u32,
    pub set_id: usize,
    pub timestamp: DateTime<Local>,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub errors: usize,
    pub error_details: Vec<ErrorRecord>,
    pub time_taken_secs: u64,
    pub gems_earned: u32,
    pub mode: SessionMode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StudentOverview {
    pub profile: Profile,
    pub test_count: usize,
    pub login_count: usize,
}

/// Accounts, gem balances and the append-only activity logs.
///
/// Balance changes are applied as read-modify-write on the stored value so a
/// reward claim and a gem award landing together never lose either write.
pub trait ProfileStore {
    fn create_user(&self, user: &NewUser) -> Result<Profile, ProfileError>;
    fn profile(&self, uid: i64) -> Result<Profile, ProfileError>;
    fn find_by_email(&self, email: &str) -> Result<Option<Account>, ProfileError>;
    fn record_login(
        &self,
        uid: i64,
        user_type: UserType,
        device_info: &str,
    ) -> Result<(), ProfileError>;
    /// Appends the attempt log and credits its gems; returns the new balance.
    fn record_completion(&self, uid: i64, record: &CompletionRecord) -> Result<i64, ProfileError>;
    fn adjust_balance(&self, uid: i64, delta: i64) -> Result<i64, ProfileError>;
    /// Resets the balance to zero if it has reached the claim threshold.
    fn claim_reward(&self, uid: i64) -> Result<(), ProfileError>;
    fn is_admin(&self, email: &str) -> Result<bool, ProfileError>;
    fn grant_admin(&self, email: &str) -> Result<(), ProfileError>;
    /// Every non-admin account with its activity counts.
    fn students(&self) -> Result<Vec<StudentOverview>, ProfileError>;
    fn login_history(&self, uid: i64) -> Result<Vec<LoginEvent>, ProfileError>;
    fn login_events(&self) -> Result<Vec<LoginEvent>, ProfileError>;
    fn test_logs(&self, uid: i64) -> Result<Vec<AttemptLog>, ProfileError>;
}

#[derive(Debug)]
pub struct SqliteProfileStore {
    conn: Connection,
}

fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Local>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Local))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        uid: row.get(0)?,
        name: row.get(1)?,
        grade: row.get(2)?,
        email: row.get(3)?,
        gems: row.get(4)?,
        created_at: parse_timestamp(5, row.get(5)?)?,
    })
}

fn login_from_row(row: &Row<'_>) -> rusqlite::Result<LoginEvent> {
    Ok(LoginEvent {
        uid: row.get(0)?,
        timestamp: parse_timestamp(1, row.get(1)?)?,
        user_type: row.get(2)?,
        device_info: row.get(3)?,
    })
}

fn text_conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}

fn attempt_from_row(row: &Row<'_>) -> rusqlite::Result<AttemptLog> {
    let details: String = row.get(9)?;
    let mode: String = row.get(12)?;

    Ok(AttemptLog {
        id: row.get(0)?,
        uid: row.get(1)?,
        subject: row.get(2)?,
        grade: row.get(3)?,
        set_id: row.get::<_, i64>(4)? as usize,
        timestamp: parse_timestamp(5, row.get(5)?)?,
        total_questions: row.get::<_, i64>(6)? as usize,
        correct_answers: row.get::<_, i64>(7)? as usize,
        errors: row.get::<_, i64>(8)? as usize,
        error_details: serde_json::from_str(&details)
            .map_err(|e| text_conversion_error(9, e.to_string()))?,
        time_taken_secs: row.get::<_, i64>(10)? as u64,
        gems_earned: row.get(11)?,
        mode: mode.parse().map_err(|e| text_conversion_error(12, e))?,
    })
}

const PROFILE_COLUMNS: &str = "uid, name, grade, email, gems, created_at";

impl SqliteProfileStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ProfileError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened profile database");
        Self::with_connection(conn)
    }

    /// Opens the database under the per-user state directory.
    pub fn open_default() -> Result<Self, ProfileError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("spellathon.db"));
        Self::open(path)
    }

    pub fn open_in_memory() -> Result<Self, ProfileError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, ProfileError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn balance(&self, uid: i64) -> Result<i64, ProfileError> {
        self.conn
            .query_row("SELECT gems FROM users WHERE uid = ?1", [uid], |row| row.get(0))
            .optional()?
            .ok_or(ProfileError::UnknownUser(uid))
    }
}

impl ProfileStore for SqliteProfileStore {
    fn create_user(&self, user: &NewUser) -> Result<Profile, ProfileError> {
        let created_at = Local::now();
        let inserted = self.conn.execute(
            r#"
            INSERT INTO users (name, grade, email, password_hash, gems, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                user.name,
                user.grade,
                user.email,
                user.password_hash,
                SIGNUP_GEMS,
                created_at.to_rfc3339(),
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(ProfileError::EmailInUse(user.email.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        let uid = self.conn.last_insert_rowid();
        info!(uid, grade = user.grade, "profile created");
        self.profile(uid)
    }

    fn profile(&self, uid: i64) -> Result<Profile, ProfileError> {
        self.conn
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM users WHERE uid = ?1"),
                [uid],
                profile_from_row,
            )
            .optional()?
            .ok_or(ProfileError::UnknownUser(uid))
    }

    fn find_by_email(&self, email: &str) -> Result<Option<Account>, ProfileError> {
        let account = self
            .conn
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS}, password_hash FROM users WHERE email = ?1"),
                [email],
                |row| {
                    Ok(Account {
                        profile: profile_from_row(row)?,
                        password_hash: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(account)
    }

    fn record_login(
        &self,
        uid: i64,
        user_type: UserType,
        device_info: &str,
    ) -> Result<(), ProfileError> {
        self.conn.execute(
            "INSERT INTO login_history (uid, timestamp, user_type, device_info) VALUES (?1, ?2, ?3, ?4)",
            params![uid, Local::now().to_rfc3339(), user_type.to_string(), device_info],
        )?;
        debug!(uid, %user_type, "login recorded");
        Ok(())
    }

    fn record_completion(&self, uid: i64, record: &CompletionRecord) -> Result<i64, ProfileError> {
        let summary = &record.summary;
        let details = serde_json::to_string(&summary.error_details)?;

        let tx = self.conn.unchecked_transaction()?;
        let updated = tx.execute(
            "UPDATE users SET gems = gems + ?1 WHERE uid = ?2",
            params![summary.gems_earned, uid],
        )?;
        if updated == 0 {
            return Err(ProfileError::UnknownUser(uid));
        }

        tx.execute(
            r#"
            INSERT INTO test_logs
            (uid, subject, grade, set_id, timestamp, total_questions, correct_answers,
             errors, error_details, time_taken_secs, gems_earned, mode)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                uid,
                record.subject,
                record.grade,
                record.set_id as i64,
                Local::now().to_rfc3339(),
                summary.total_questions as i64,
                summary.correct_answers as i64,
                summary.error_count as i64,
                details,
                summary.time_taken_secs as i64,
                summary.gems_earned,
                summary.mode.to_string(),
            ],
        )?;

        let balance: i64 =
            tx.query_row("SELECT gems FROM users WHERE uid = ?1", [uid], |row| row.get(0))?;
        tx.commit()?;

        info!(
            uid,
            subject = %record.subject,
            set_id = record.set_id,
            mode = %summary.mode,
            correct = summary.correct_answers,
            total = summary.total_questions,
            gems = summary.gems_earned,
            balance,
            "attempt recorded"
        );
        Ok(balance)
    }

    fn adjust_balance(&self, uid: i64, delta: i64) -> Result<i64, ProfileError> {
        let tx = self.conn.unchecked_transaction()?;
        let updated = tx.execute(
            "UPDATE users SET gems = MAX(gems + ?1, 0) WHERE uid = ?2",
            params![delta, uid],
        )?;
        if updated == 0 {
            return Err(ProfileError::UnknownUser(uid));
        }
        let balance: i64 =
            tx.query_row("SELECT gems FROM users WHERE uid = ?1", [uid], |row| row.get(0))?;
        tx.commit()?;
        Ok(balance)
    }

    fn claim_reward(&self, uid: i64) -> Result<(), ProfileError> {
        let claimed = self.conn.execute(
            "UPDATE users SET gems = 0 WHERE uid = ?1 AND gems >= ?2",
            params![uid, CLAIM_THRESHOLD],
        )?;
        if claimed == 1 {
            info!(uid, "reward claimed");
            return Ok(());
        }
        let balance = self.balance(uid)?;
        Err(ProfileError::BelowThreshold { balance })
    }

    fn is_admin(&self, email: &str) -> Result<bool, ProfileError> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM admins WHERE email = ?1", [email], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn grant_admin(&self, email: &str) -> Result<(), ProfileError> {
        self.conn
            .execute("INSERT OR IGNORE INTO admins (email) VALUES (?1)", [email])?;
        info!(email, "admin granted");
        Ok(())
    }

    fn students(&self) -> Result<Vec<StudentOverview>, ProfileError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT u.uid, u.name, u.grade, u.email, u.gems, u.created_at,
                   (SELECT COUNT(*) FROM test_logs t WHERE t.uid = u.uid),
                   (SELECT COUNT(*) FROM login_history l WHERE l.uid = u.uid)
            FROM users u
            WHERE u.email NOT IN (SELECT email FROM admins)
            ORDER BY u.name, u.uid
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(StudentOverview {
                profile: profile_from_row(row)?,
                test_count: row.get::<_, i64>(6)? as usize,
                login_count: row.get::<_, i64>(7)? as usize,
            })
        })?;

        let mut students = Vec::new();
        for row in rows {
            students.push(row?);
        }
        Ok(students)
    }

    fn login_history(&self, uid: i64) -> Result<Vec<LoginEvent>, ProfileError> {
        let mut stmt = self.conn.prepare(
            "SELECT uid, timestamp, user_type, device_info FROM login_history WHERE uid = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([uid], login_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn login_events(&self) -> Result<Vec<LoginEvent>, ProfileError> {
        let mut stmt = self
            .conn
            .prepare("SELECT uid, timestamp, user_type, device_info FROM login_history ORDER BY id")?;
        let rows = stmt.query_map([], login_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn test_logs(&self, uid: i64) -> Result<Vec<AttemptLog>, ProfileError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, uid, subject, grade, set_id, timestamp, total_questions, correct_answers,
                   errors, error_details, time_taken_secs, gems_earned, mode
            FROM test_logs
            WHERE uid = ?1
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([uid], attempt_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}
