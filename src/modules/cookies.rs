use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;

pub const CONTINUE_CODE: &str = "continueCode";

/// Durable key/value store. Writes never fail from the caller's point of view.
pub trait CookieStore: Send + Sync {
    fn put(&self, key: &str, value: &str);
    fn get(&self, key: &str) -> Option<String>;
}

/// Cookie jar persisted as a JSON object, rewritten on every `put`.
pub struct FileCookieStore {
    path: PathBuf,
    cookies: Mutex<BTreeMap<String, String>>,
}

impl FileCookieStore {
    pub fn open(path: &Path) -> Result<Self> {
        let cookies = if path.exists() {
            let content = fs::read_to_string(path)?;
            if content.trim().is_empty() { BTreeMap::new() } else { serde_json::from_str(&content)? }
        } else {
            BTreeMap::new()
        };
        Ok(Self { path: path.to_path_buf(), cookies: Mutex::new(cookies) })
    }

    fn save(&self, cookies: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_string_pretty(cookies)?;
        if let Some(parent) = self.path.parent() { fs::create_dir_all(parent)?; }
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl CookieStore for FileCookieStore {
    fn put(&self, key: &str, value: &str) {
        let mut cookies = self.cookies.lock();
        cookies.insert(key.to_string(), value.to_string());
        match self.save(&cookies) {
            Ok(()) => debug!(key, path = ?self.path, "Cookie stored"),
            Err(e) => warn!(key, error = %e, "Failed to persist cookie"),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.cookies.lock().get(key).cloned()
    }
}
