//! File-backed session cookies.
//!
//! A `CookieFile` is the scoped backing location: it is created when a client
//! asks for cookie persistence and removed when it is dropped. A `CookieJar`
//! is the handle stored in the option bag; it keeps cookies in memory and
//! writes the persistent ones back to the file after every response.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cookie_store::CookieStore;
use parking_lot::Mutex;
use url::Url;
use uuid::Uuid;

use crate::error::ClientError;

const FILE_PREFIX: &str = "curl-cookie-";

/// Uniquely named jar file owned by exactly one client.
#[derive(Debug)]
pub struct CookieFile {
    path: PathBuf,
}

impl CookieFile {
    /// Create an empty `curl-cookie-<uuid>` file inside `dir`.
    pub fn create(dir: &Path) -> Result<Self, ClientError> {
        let path = dir.join(format!("{FILE_PREFIX}{}", Uuid::new_v4()));
        OpenOptions::new().write(true).create_new(true).open(&path)?;
        tracing::debug!(path = %path.display(), "created cookie jar file");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CookieFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "removed cookie jar file"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to remove cookie jar file")
            }
        }
    }
}

/// Shared handle to an in-memory cookie store bound to a jar file.
///
/// Clones share the same store. Two handles compare equal only when they
/// share it.
#[derive(Clone)]
pub struct CookieJar {
    store: Arc<Mutex<CookieStore>>,
    path: Arc<PathBuf>,
}

impl CookieJar {
    /// Open a jar over `path`, loading any cookies persisted there. A missing
    /// or empty file yields an empty jar.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ClientError> {
        let path = path.into();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };
        let store = if contents.trim().is_empty() {
            CookieStore::default()
        } else {
            cookie_store::serde::json::load(contents.as_bytes())
                .map_err(|e| ClientError::Cookies(e.to_string()))?
        };
        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of unexpired cookies currently held.
    pub fn len(&self) -> usize {
        self.store.lock().iter_unexpired().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Cookie` header value for a request to `url`, if any cookie matches.
    pub fn request_header(&self, url: &Url) -> Option<String> {
        let store = self.store.lock();
        let pairs: Vec<String> = store
            .get_request_values(url)
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    /// Record `Set-Cookie` values received from `url`, then persist the jar.
    /// Malformed cookies are skipped.
    pub fn store_response<'a>(
        &self,
        set_cookies: impl IntoIterator<Item = &'a str>,
        url: &Url,
    ) -> Result<(), ClientError> {
        let mut changed = false;
        {
            let mut store = self.store.lock();
            for raw in set_cookies {
                match store.parse(raw, url) {
                    Ok(_) => changed = true,
                    Err(err) => tracing::debug!(cookie = raw, error = %err, "ignored cookie"),
                }
            }
        }
        if changed {
            self.save()?;
        }
        Ok(())
    }

    /// Write persistent, unexpired cookies to the jar file. Session cookies
    /// stay in memory only.
    pub fn save(&self) -> Result<(), ClientError> {
        let store = self.store.lock();
        let mut writer = BufWriter::new(File::create(self.path.as_path())?);
        cookie_store::serde::json::save(&*store, &mut writer)
            .map_err(|e| ClientError::Cookies(e.to_string()))?;
        writer.flush()?;
        Ok(())
    }
}

impl PartialEq for CookieJar {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.store, &other.store)
    }
}

impl std::fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieJar")
            .field("path", &self.path)
            .field("cookies", &self.len())
            .finish()
    }
}
