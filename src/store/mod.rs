// SPDX-License-Identifier: MIT

//! Durable per-user storage on the local filesystem.
//!
//! One directory per sanitized user id under `<data_dir>/users/`, holding
//! independent JSON documents:
//! - `profile.json`: free-text profile
//! - `conversation.json`: persisted conversation log
//! - `attributes.json`: personality attribute selection
//! - `billing.json`: billing customer id
//!
//! Reads are defensive: a missing or corrupt document degrades to a default
//! value and is logged, never propagated to the caller. Writes go through a
//! temp-file rename so a crash cannot leave a half-written record.

use crate::error::AppError;
use crate::models::attributes::AttributeCatalog;
use crate::models::{BillingCustomer, ConversationTurn, UserProfile};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const PROFILE_FILE: &str = "profile.json";
const CONVERSATION_FILE: &str = "conversation.json";
const ATTRIBUTES_FILE: &str = "attributes.json";
const BILLING_FILE: &str = "billing.json";

/// Persisted conversation document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ConversationDoc {
    conversation: Vec<ConversationTurn>,
}

/// Persisted attribute-selection document.
#[derive(Debug, Default, Serialize, Deserialize)]
struct AttributesDoc {
    attributes: Vec<String>,
}

/// File-backed user directory store.
#[derive(Debug, Clone)]
pub struct UserStore {
    users_dir: PathBuf,
}

impl UserStore {
    /// Create a store rooted at `<data_dir>/users`, creating the root if
    /// needed.
    pub fn new(data_dir: &Path) -> Result<Self, AppError> {
        let users_dir = data_dir.join("users");
        std::fs::create_dir_all(&users_dir)
            .map_err(|e| AppError::Storage(format!("create {}: {}", users_dir.display(), e)))?;
        Ok(Self { users_dir })
    }

    /// Idempotently materialize the record directory for a user.
    pub fn ensure(&self, user_id: &str) -> Result<(), AppError> {
        let dir = self.user_dir(user_id)?;
        std::fs::create_dir_all(&dir)
            .map_err(|e| AppError::Storage(format!("create {}: {}", dir.display(), e)))?;
        Ok(())
    }

    // ─── Conversation log ────────────────────────────────────────

    /// Load a user's persisted conversation log.
    ///
    /// Missing record yields an empty log. A corrupt record is logged, reset
    /// to empty on disk, and an empty log returned.
    pub fn load_conversation(&self, user_id: &str) -> Result<Vec<ConversationTurn>, AppError> {
        let path = self.user_dir(user_id)?.join(CONVERSATION_FILE);
        let doc: ConversationDoc = self.read_or_reset(&path)?;
        Ok(doc.conversation)
    }

    /// Append one turn and flush the full log.
    ///
    /// This is a read-modify-write of the whole record; callers must not
    /// assume partial writes are visible.
    pub fn append_and_persist(
        &self,
        user_id: &str,
        turn: ConversationTurn,
    ) -> Result<(), AppError> {
        self.ensure(user_id)?;
        let path = self.user_dir(user_id)?.join(CONVERSATION_FILE);
        let mut doc: ConversationDoc = self.read_or_reset(&path)?;
        doc.conversation.push(turn);
        write_json(&path, &doc)
    }

    /// Replace the persisted log wholesale (used when reconciling a session
    /// log at authentication time).
    pub fn save_conversation(
        &self,
        user_id: &str,
        conversation: &[ConversationTurn],
    ) -> Result<(), AppError> {
        self.ensure(user_id)?;
        let path = self.user_dir(user_id)?.join(CONVERSATION_FILE);
        write_json(
            &path,
            &ConversationDoc {
                conversation: conversation.to_vec(),
            },
        )
    }

    // ─── Attribute selection ─────────────────────────────────────

    /// Load a user's attribute selection.
    ///
    /// First read for an unseen user materializes and persists the default
    /// starter set; repeated calls return the same set without rewriting it.
    pub fn load_attributes(&self, user_id: &str) -> Result<Vec<String>, AppError> {
        let path = self.user_dir(user_id)?.join(ATTRIBUTES_FILE);
        if !path.exists() {
            let defaults = AttributeCatalog::default_selection();
            self.save_attributes(user_id, &defaults)?;
            tracing::info!(user_id, "Materialized default attribute selection");
            return Ok(defaults);
        }
        let doc: AttributesDoc = self.read_or_reset(&path)?;
        Ok(doc.attributes)
    }

    /// Persist a user's attribute selection.
    pub fn save_attributes(&self, user_id: &str, attributes: &[String]) -> Result<(), AppError> {
        self.ensure(user_id)?;
        let path = self.user_dir(user_id)?.join(ATTRIBUTES_FILE);
        write_json(
            &path,
            &AttributesDoc {
                attributes: attributes.to_vec(),
            },
        )
    }

    // ─── Profile ─────────────────────────────────────────────────

    /// Load the free-text profile; absent means "no profile".
    pub fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        let path = self.user_dir(user_id)?.join(PROFILE_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let profile: UserProfile = self.read_or_reset(&path)?;
        Ok(Some(profile))
    }

    /// Persist the free-text profile.
    pub fn save_profile(&self, user_id: &str, profile: &UserProfile) -> Result<(), AppError> {
        self.ensure(user_id)?;
        let path = self.user_dir(user_id)?.join(PROFILE_FILE);
        write_json(&path, profile)
    }

    // ─── Billing customer ────────────────────────────────────────

    /// Load the stored billing customer id, if one was created.
    pub fn load_billing_customer(&self, user_id: &str) -> Result<Option<BillingCustomer>, AppError> {
        let path = self.user_dir(user_id)?.join(BILLING_FILE);
        if !path.exists() {
            return Ok(None);
        }
        // Billing ids are not recoverable from a default, so corruption here
        // surfaces as "no customer yet" and a fresh create.
        match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(customer) => Ok(Some(customer)),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Corrupt billing record");
                    Ok(None)
                }
            },
            Err(e) => Err(AppError::Storage(format!("read {}: {}", path.display(), e))),
        }
    }

    /// Persist the billing customer id (one per user).
    pub fn save_billing_customer(
        &self,
        user_id: &str,
        customer: &BillingCustomer,
    ) -> Result<(), AppError> {
        self.ensure(user_id)?;
        let path = self.user_dir(user_id)?.join(BILLING_FILE);
        write_json(&path, customer)
    }

    // ─── Retention sweep ─────────────────────────────────────────

    /// Remove user records untouched for longer than `retention`, then their
    /// now-empty directories. Users in `active_users` are never removed,
    /// regardless of file age.
    pub fn sweep(&self, retention: Duration, active_users: &[String]) -> Result<usize, AppError> {
        let mut removed = 0;
        let entries = std::fs::read_dir(&self.users_dir)
            .map_err(|e| AppError::Storage(format!("read {}: {}", self.users_dir.display(), e)))?;

        let now = SystemTime::now();
        for entry in entries.flatten() {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let user_id = entry.file_name().to_string_lossy().to_string();
            if active_users.contains(&user_id) {
                continue;
            }
            if dir_is_stale(&dir, now, retention) {
                match std::fs::remove_dir_all(&dir) {
                    Ok(()) => {
                        tracing::info!(user_id, "Removed stale user record");
                        removed += 1;
                    }
                    Err(e) => {
                        tracing::warn!(user_id, error = %e, "Failed to remove stale user record")
                    }
                }
            }
        }
        Ok(removed)
    }

    // ─── Internals ───────────────────────────────────────────────

    fn user_dir(&self, user_id: &str) -> Result<PathBuf, AppError> {
        sanitize_user_id(user_id)?;
        Ok(self.users_dir.join(user_id))
    }

    /// Read a JSON document, degrading to the default on a missing file and
    /// resetting the file on a corrupt one.
    fn read_or_reset<T: DeserializeOwned + Default + Serialize>(
        &self,
        path: &Path,
    ) -> Result<T, AppError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(doc) => Ok(doc),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Corrupt record, resetting to default");
                    let doc = T::default();
                    write_json(path, &doc)?;
                    Ok(doc)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(AppError::Storage(format!("read {}: {}", path.display(), e))),
        }
    }
}

/// Reject user ids that could escape the per-user directory.
///
/// Twitter handles are alphanumeric plus underscore; anything else (path
/// separators in particular) is rejected before any path construction.
pub fn sanitize_user_id(user_id: &str) -> Result<(), AppError> {
    if user_id.is_empty()
        || !user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AppError::BadRequest(format!(
            "invalid user id: {:?}",
            user_id
        )));
    }
    Ok(())
}

/// Write JSON via a temp file and rename, so readers never see a torn write.
fn write_json<T: Serialize>(path: &Path, doc: &T) -> Result<(), AppError> {
    let raw = serde_json::to_string_pretty(doc)
        .map_err(|e| AppError::Storage(format!("serialize {}: {}", path.display(), e)))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, raw)
        .map_err(|e| AppError::Storage(format!("write {}: {}", tmp.display(), e)))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| AppError::Storage(format!("rename {}: {}", path.display(), e)))?;
    Ok(())
}

fn dir_is_stale(dir: &Path, now: SystemTime, retention: Duration) -> bool {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };
    for entry in entries.flatten() {
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|mtime| now.duration_since(mtime).ok());
        match age {
            Some(age) if age >= retention => continue,
            // Recent file, unreadable metadata, or clock skew: keep the record
            _ => return false,
        }
    }
    // All files stale, or the directory is empty
    true
}
