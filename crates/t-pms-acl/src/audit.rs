//! ---
//! pms_section: "02-access-control"
//! pms_subsection: "module"
//! pms_type: "source"
//! pms_scope: "code"
//! pms_description: "Membership model, ACL services, and permission gate."
//! pms_version: "v0.0.0-prealpha"
//! pms_owner: "tbd"
//! ---
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Membership audit entry. Entries form a hash chain so truncation or
/// edits of the underlying file are detectable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    /// When the mutation was recorded.
    pub timestamp: DateTime<Utc>,
    /// User id of the actor performing the mutation.
    pub actor: String,
    /// Event type (e.g. `workspace.member.invite`, `project.member.remove`).
    pub action: String,
    /// Additional context serialized as JSON (resource id, target, role).
    pub metadata: serde_json::Value,
    /// SHA-256 over the entry contents and the previous hash.
    pub hash: String,
    /// Hash of the previous entry, or the zero string for the first one.
    pub previous_hash: String,
}

impl AuditEntry {
    fn compute_hash(
        timestamp: DateTime<Utc>,
        actor: &str,
        action: &str,
        metadata: &serde_json::Value,
        previous_hash: &str,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true).as_bytes());
        hasher.update(actor.as_bytes());
        hasher.update(action.as_bytes());
        hasher.update(metadata.to_string().as_bytes());
        hasher.update(previous_hash.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Append-only membership audit log backed by a newline-delimited JSON file.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    last_hash: String,
}

/// Clonable handle letting several services append to one chain. Appends
/// must be serialized or the chain would fork, hence the mutex.
pub type SharedAuditLog = Arc<Mutex<AuditLog>>;

impl AuditLog {
    /// Open an audit log, replaying existing entries to find the head hash.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut log = Self {
            path: path.clone(),
            last_hash: "0".repeat(64),
        };
        if path.exists() {
            for line in BufReader::new(fs::File::open(&path)?).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let entry: AuditEntry = serde_json::from_str(&line)?;
                log.last_hash = entry.hash;
            }
        }
        Ok(log)
    }

    /// Wrap the log in a shared handle for use by multiple services.
    pub fn into_shared(self) -> SharedAuditLog {
        Arc::new(Mutex::new(self))
    }

    /// Append a membership event to the log.
    pub fn append(
        &mut self,
        actor: &str,
        action: &str,
        metadata: serde_json::Value,
    ) -> Result<AuditEntry> {
        let timestamp = Utc::now();
        let hash = AuditEntry::compute_hash(timestamp, actor, action, &metadata, &self.last_hash);
        let entry = AuditEntry {
            timestamp,
            actor: actor.to_owned(),
            action: action.to_owned(),
            metadata,
            hash: hash.clone(),
            previous_hash: self.last_hash.clone(),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("unable to open audit log {}", self.path.display()))?;
        file.write_all(serde_json::to_string(&entry)?.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        self.last_hash = hash;
        Ok(entry)
    }

    /// Verify the hash chain over the whole file.
    pub fn verify(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(true);
        }
        let mut previous = "0".repeat(64);
        for line in BufReader::new(fs::File::open(&self.path)?).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: AuditEntry = serde_json::from_str(&line)?;
            let expected = AuditEntry::compute_hash(
                entry.timestamp,
                &entry.actor,
                &entry.action,
                &entry.metadata,
                &previous,
            );
            if expected != entry.hash || entry.previous_hash != previous {
                return Ok(false);
            }
            previous = entry.hash;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn chain_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("membership.audit");
        let mut log = AuditLog::open(&path).unwrap();
        log.append(
            "user-1",
            "workspace.member.invite",
            serde_json::json!({"workspace": "ws-1", "target": "user-2", "role": "MEMBER"}),
        )
        .unwrap();

        let mut reopened = AuditLog::open(&path).unwrap();
        reopened
            .append(
                "user-1",
                "workspace.member.remove",
                serde_json::json!({"workspace": "ws-1", "target": "user-2"}),
            )
            .unwrap();
        assert!(reopened.verify().unwrap());
    }

    #[test]
    fn edited_entry_breaks_the_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("membership.audit");
        let mut log = AuditLog::open(&path).unwrap();
        log.append("user-1", "project.member.invite", serde_json::json!({"role": "MEMBER"}))
            .unwrap();
        log.append("user-1", "project.member.update_role", serde_json::json!({"role": "ADMIN"}))
            .unwrap();
        assert!(log.verify().unwrap());

        let raw = fs::read_to_string(&path).unwrap();
        let tampered = raw.replace("ADMIN", "OWNER");
        assert_ne!(raw, tampered);
        fs::write(&path, tampered).unwrap();
        assert!(!AuditLog::open(&path).unwrap().verify().unwrap());
    }
}
