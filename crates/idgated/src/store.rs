use std::path::Path;
use thiserror::Error;
use tokio_rusqlite::Connection;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] tokio_rusqlite::Error),
    #[error("rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("image encryption failed")]
    EncryptionFailed,
    #[error("image decryption failed — key mismatch or corrupted data")]
    DecryptionFailed,
    #[error("invalid image blob size: {0} bytes")]
    InvalidBlob(usize),
    #[error("unknown role: {0}")]
    UnknownRole(String),
    #[error("unknown verification status: {0}")]
    UnknownStatus(String),
    #[error("verification record not found: {0}")]
    RecordNotFound(String),
    #[error("verification {id} is already {status} — terminal statuses cannot change")]
    TerminalStatus { id: String, status: String },
    #[error("encryption key I/O error: {0}")]
    KeyIo(#[source] std::io::Error),
}

/// Account role; gates which HTTP operations are permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Guest,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Guest => "guest",
        }
    }

    fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "guest" => Ok(Role::Guest),
            other => Err(StoreError::UnknownRole(other.to_string())),
        }
    }
}

/// Lifecycle of one verification attempt.
///
/// `Pending` is the only non-terminal status: a record moves to `Approved`
/// or `Rejected` exactly once, automatically from the collaborator response
/// or manually by an administrator, and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "pending" => Ok(VerificationStatus::Pending),
            "approved" => Ok(VerificationStatus::Approved),
            "rejected" => Ok(VerificationStatus::Rejected),
            other => Err(StoreError::UnknownStatus(other.to_string())),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, VerificationStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub status: String,
    pub created_at: String,
}

/// One persisted verification attempt (image bytes fetched separately).
#[derive(Debug, Clone, Serialize)]
pub struct VerificationRecord {
    pub id: String,
    pub account_id: String,
    pub pin_number: String,
    pub status: VerificationStatus,
    pub response_body: String,
    pub created_at: String,
}

/// A verification record joined with its submitter's identity.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationDetail {
    #[serde(flatten)]
    pub record: VerificationRecord,
    pub submitted_by: String,
}

/// SQLite-backed storage for accounts and verification attempts.
///
/// Stored selfie bytes are encrypted with AES-256-GCM before persisting and
/// decrypted on retrieval. A per-installation 32-byte key is generated at
/// first use and stored at `{db_dir}/.key` (mode 0600).
#[derive(Clone)]
pub struct Store {
    conn: Connection,
    enc_key: [u8; 32],
}

impl Store {
    /// Open (or create) the database at the given path and run migrations.
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let enc_key = if db_path == Path::new(":memory:") {
            // In-memory DB (tests): fixed all-zeros key
            [0u8; 32]
        } else {
            let key_path = db_path
                .parent()
                .unwrap_or(Path::new("/var/lib/idgate"))
                .join(".key");
            load_or_generate_key(&key_path)?
        };

        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA foreign_keys = ON;
                 CREATE TABLE IF NOT EXISTS accounts (
                     id TEXT PRIMARY KEY,
                     username TEXT NOT NULL UNIQUE,
                     token TEXT NOT NULL UNIQUE,
                     role TEXT NOT NULL DEFAULT 'user',
                     status TEXT NOT NULL DEFAULT 'active',
                     created_at TEXT NOT NULL
                 );
                 CREATE TABLE IF NOT EXISTS verifications (
                     id TEXT PRIMARY KEY,
                     account_id TEXT NOT NULL REFERENCES accounts(id),
                     pin_number TEXT NOT NULL,
                     image BLOB NOT NULL,
                     status TEXT NOT NULL DEFAULT 'pending',
                     response_body TEXT NOT NULL DEFAULT '',
                     created_at TEXT NOT NULL
                 );
                 CREATE INDEX IF NOT EXISTS idx_verifications_account
                     ON verifications(account_id);",
            )?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, enc_key })
    }

    /// Create an account and mint its bearer token.
    pub async fn create_account(
        &self,
        username: &str,
        role: Role,
    ) -> Result<(Account, String), StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let token = uuid::Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().to_rfc3339();

        let account = Account {
            id: id.clone(),
            username: username.to_string(),
            role,
            status: "active".to_string(),
            created_at: created_at.clone(),
        };

        let username = username.to_string();
        let token_clone = token.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO accounts (id, username, token, role, status, created_at)
                     VALUES (?1, ?2, ?3, ?4, 'active', ?5)",
                    rusqlite::params![id, username, token_clone, role.as_str(), created_at],
                )?;
                Ok(())
            })
            .await?;

        Ok((account, token))
    }

    /// Resolve a bearer token to its account, if any.
    pub async fn account_by_token(&self, token: &str) -> Result<Option<Account>, StoreError> {
        let token = token.to_string();
        let row: Option<(String, String, String, String, String)> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, username, role, status, created_at
                     FROM accounts WHERE token = ?1",
                )?;
                let mut rows = stmt.query_map([&token], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })?;
                Ok(rows.next().transpose()?)
            })
            .await?;

        match row {
            None => Ok(None),
            Some((id, username, role, status, created_at)) => Ok(Some(Account {
                id,
                username,
                role: Role::parse(&role)?,
                status,
                created_at,
            })),
        }
    }

    /// Persist one verification attempt. Returns the generated record id.
    ///
    /// Exactly one row is created per submission attempt; callers record the
    /// attempt whether or not the external call succeeded.
    pub async fn insert_verification(
        &self,
        account_id: &str,
        pin_number: &str,
        image: &[u8],
        status: VerificationStatus,
        response_body: &str,
    ) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().to_rfc3339();

        // Encrypt before entering the SQLite closure
        let blob = self.encrypt_image(image)?;

        let id_clone = id.clone();
        let account_id = account_id.to_string();
        let pin_number = pin_number.to_string();
        let response_body = response_body.to_string();

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO verifications
                         (id, account_id, pin_number, image, status, response_body, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![
                        id_clone,
                        account_id,
                        pin_number,
                        blob,
                        status.as_str(),
                        response_body,
                        created_at
                    ],
                )?;
                Ok(())
            })
            .await?;

        Ok(id)
    }

    /// All verification attempts submitted by one account, newest first.
    pub async fn list_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<VerificationRecord>, StoreError> {
        let account_id = account_id.to_string();
        let rows: Vec<(String, String, String, String, String, String)> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, account_id, pin_number, status, response_body, created_at
                     FROM verifications WHERE account_id = ?1 ORDER BY created_at DESC",
                )?;
                let rows = stmt.query_map([&account_id], row_to_tuple)?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;

        rows.into_iter().map(tuple_to_record).collect()
    }

    /// Full record set with submitter identity, newest first. Admin surface.
    pub async fn list_all(&self) -> Result<Vec<VerificationDetail>, StoreError> {
        let rows: Vec<(String, String, String, String, String, String, String)> = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT v.id, v.account_id, v.pin_number, v.status, v.response_body,
                            v.created_at, a.username
                     FROM verifications v JOIN accounts a ON a.id = v.account_id
                     ORDER BY v.created_at DESC",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;

        rows.into_iter()
            .map(|(id, account_id, pin, status, body, created_at, username)| {
                Ok(VerificationDetail {
                    record: tuple_to_record((id, account_id, pin, status, body, created_at))?,
                    submitted_by: username,
                })
            })
            .collect()
    }

    /// One record with submitter identity and the decrypted image bytes.
    pub async fn get_detail(
        &self,
        record_id: &str,
    ) -> Result<Option<(VerificationDetail, Vec<u8>)>, StoreError> {
        let record_id = record_id.to_string();
        let row: Option<(String, String, String, String, String, String, String, Vec<u8>)> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT v.id, v.account_id, v.pin_number, v.status, v.response_body,
                            v.created_at, a.username, v.image
                     FROM verifications v JOIN accounts a ON a.id = v.account_id
                     WHERE v.id = ?1",
                )?;
                let mut rows = stmt.query_map([&record_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, Vec<u8>>(7)?,
                    ))
                })?;
                Ok(rows.next().transpose()?)
            })
            .await?;

        match row {
            None => Ok(None),
            Some((id, account_id, pin, status, body, created_at, username, blob)) => {
                let image = self.decrypt_image(&blob)?;
                Ok(Some((
                    VerificationDetail {
                        record: tuple_to_record((id, account_id, pin, status, body, created_at))?,
                        submitted_by: username,
                    },
                    image,
                )))
            }
        }
    }

    /// Manual administrative status override.
    ///
    /// Only `pending` records may transition; the update statement is
    /// conditional on the current status so the terminal invariant holds
    /// even under concurrent overrides.
    pub async fn update_status(
        &self,
        record_id: &str,
        status: VerificationStatus,
        note: &str,
    ) -> Result<(), StoreError> {
        let id = record_id.to_string();
        let note = note.to_string();
        let affected = self
            .conn
            .call(move |conn| {
                let affected = conn.execute(
                    "UPDATE verifications SET status = ?1, response_body = ?2
                     WHERE id = ?3 AND status = 'pending'",
                    rusqlite::params![status.as_str(), note, id],
                )?;
                Ok(affected)
            })
            .await?;

        if affected > 0 {
            return Ok(());
        }

        // Distinguish "missing" from "already terminal"
        let id = record_id.to_string();
        let current: Option<String> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT status FROM verifications WHERE id = ?1")?;
                let mut rows = stmt.query_map([&id], |row| row.get::<_, String>(0))?;
                Ok(rows.next().transpose()?)
            })
            .await?;

        match current {
            None => Err(StoreError::RecordNotFound(record_id.to_string())),
            Some(status) => Err(StoreError::TerminalStatus {
                id: record_id.to_string(),
                status,
            }),
        }
    }

    /// Count persisted verification attempts.
    pub async fn count_all(&self) -> Result<u64, StoreError> {
        self.conn
            .call(|conn| {
                let count: u64 =
                    conn.query_row("SELECT COUNT(*) FROM verifications", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .map_err(StoreError::from)
    }

    // ── Encryption helpers ────────────────────────────────────────────────────

    /// Encrypt image bytes with AES-256-GCM.
    ///
    /// Output: 12-byte random nonce || ciphertext || 16-byte GCM tag.
    fn encrypt_image(&self, image: &[u8]) -> Result<Vec<u8>, StoreError> {
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let key = Key::<Aes256Gcm>::from_slice(&self.enc_key);
        let cipher = Aes256Gcm::new(key);

        let ciphertext = cipher
            .encrypt(nonce, image)
            .map_err(|_| StoreError::EncryptionFailed)?;

        let mut blob = Vec::with_capacity(12 + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt an image blob (12-byte nonce + ciphertext + 16-byte GCM tag).
    fn decrypt_image(&self, blob: &[u8]) -> Result<Vec<u8>, StoreError> {
        const NONCE_LEN: usize = 12;

        if blob.len() <= NONCE_LEN {
            return Err(StoreError::InvalidBlob(blob.len()));
        }

        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let key = Key::<Aes256Gcm>::from_slice(&self.enc_key);
        let cipher = Aes256Gcm::new(key);

        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| StoreError::DecryptionFailed)
    }
}

// ── Row mapping helpers ───────────────────────────────────────────────────────

type RecordTuple = (String, String, String, String, String, String);

fn row_to_tuple(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordTuple> {
    Ok((
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, String>(3)?,
        row.get::<_, String>(4)?,
        row.get::<_, String>(5)?,
    ))
}

fn tuple_to_record(t: RecordTuple) -> Result<VerificationRecord, StoreError> {
    let (id, account_id, pin_number, status, response_body, created_at) = t;
    Ok(VerificationRecord {
        id,
        account_id,
        pin_number,
        status: VerificationStatus::parse(&status)?,
        response_body,
        created_at,
    })
}

// ── Key management ────────────────────────────────────────────────────────────

/// Load the encryption key from disk, or generate and persist a new one.
/// Written with mode 0600 (owner-readable only).
fn load_or_generate_key(key_path: &Path) -> Result<[u8; 32], StoreError> {
    if key_path.exists() {
        let bytes = std::fs::read(key_path).map_err(StoreError::KeyIo)?;
        if bytes.len() != 32 {
            return Err(StoreError::KeyIo(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "encryption key file has wrong length ({} bytes, expected 32)",
                    bytes.len()
                ),
            )));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        tracing::debug!(path = %key_path.display(), "loaded encryption key");
        Ok(key)
    } else {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);

        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut f = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(key_path)
            .map_err(StoreError::KeyIo)?;
        f.write_all(&key).map_err(StoreError::KeyIo)?;

        tracing::info!(path = %key_path.display(), "generated new AES-256 encryption key");
        Ok(key)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
