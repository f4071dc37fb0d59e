//! Cookie jars
//!
//! A jar stores named cookies scoped by domain and path, each with an
//! absolute expiry. The error store only ever touches one cookie, but the
//! file jar is a general store so other tools can share it.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Cookie jar errors
#[derive(Debug, thiserror::Error)]
pub enum JarError {
    /// Reading or writing the backing file failed
    #[error("cookie jar I/O: {0}")]
    Io(#[from] std::io::Error),
    /// The backing file does not hold a valid jar
    #[error("malformed cookie jar: {0}")]
    Format(#[from] serde_json::Error),
}

/// Identity of a cookie: name plus its domain/path scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CookieScope {
    pub name: String,
    pub domain: String,
    pub path: String,
}

impl CookieScope {
    pub fn new(name: impl Into<String>, domain: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            path: path.into(),
        }
    }
}

/// A stored cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    #[serde(flatten)]
    pub scope: CookieScope,
    pub value: String,
    /// Absolute expiry in epoch milliseconds
    pub expires_at: i64,
}

impl Cookie {
    const fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at <= now_ms
    }
}

/// Storage for cookies
pub trait CookieJar: Send + Sync {
    /// Value of an unexpired cookie
    fn get(&self, scope: &CookieScope, now_ms: i64) -> Result<Option<String>, JarError>;

    /// Insert or replace a cookie
    fn set(&self, cookie: Cookie) -> Result<(), JarError>;

    /// Delete a cookie; deleting a missing cookie is not an error
    fn remove(&self, scope: &CookieScope) -> Result<(), JarError>;
}

/// Process-local jar
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<HashMap<CookieScope, Cookie>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a raw value, bypassing any encoding; used to simulate
    /// foreign or corrupted writers
    pub fn set_raw(&self, scope: CookieScope, value: impl Into<String>, expires_at: i64) {
        let cookie = Cookie {
            scope: scope.clone(),
            value: value.into(),
            expires_at,
        };
        lock(&self.cookies).insert(scope, cookie);
    }

    /// Raw value regardless of expiry
    pub fn raw(&self, scope: &CookieScope) -> Option<String> {
        lock(&self.cookies).get(scope).map(|c| c.value.clone())
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, scope: &CookieScope, now_ms: i64) -> Result<Option<String>, JarError> {
        Ok(lock(&self.cookies)
            .get(scope)
            .filter(|c| !c.is_expired(now_ms))
            .map(|c| c.value.clone()))
    }

    fn set(&self, cookie: Cookie) -> Result<(), JarError> {
        lock(&self.cookies).insert(cookie.scope.clone(), cookie);
        Ok(())
    }

    fn remove(&self, scope: &CookieScope) -> Result<(), JarError> {
        lock(&self.cookies).remove(scope);
        Ok(())
    }
}

/// On-disk representation of a file jar
#[derive(Debug, Default, Serialize, Deserialize)]
struct JarFile {
    #[serde(default)]
    cookies: Vec<Cookie>,
}

/// Jar persisted as a JSON file
///
/// Every operation re-reads the file so several processes sharing the jar
/// observe each other's writes; the last writer wins. Writes go to a fresh
/// temporary file in the same directory and are renamed into place, so a
/// reader never sees a partially written jar.
#[derive(Debug)]
pub struct FileCookieJar {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCookieJar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<JarFile, JarError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(JarFile::default()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(JarFile::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Read for modification; a corrupted jar is replaced rather than
    /// blocking every future write. The flag reports such a reset.
    fn read_for_update(&self) -> Result<(JarFile, bool), JarError> {
        match self.read() {
            Ok(jar) => Ok((jar, false)),
            Err(JarError::Format(e)) => {
                tracing::warn!(path = %self.path.display(), error = %e, "resetting malformed cookie jar");
                Ok((JarFile::default(), true))
            }
            Err(e) => Err(e),
        }
    }

    fn write(&self, jar: &JarFile) -> Result<(), JarError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&serde_json::to_vec_pretty(jar)?)?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        Ok(())
    }
}

impl CookieJar for FileCookieJar {
    fn get(&self, scope: &CookieScope, now_ms: i64) -> Result<Option<String>, JarError> {
        Ok(self
            .read()?
            .cookies
            .into_iter()
            .find(|c| &c.scope == scope && !c.is_expired(now_ms))
            .map(|c| c.value))
    }

    fn set(&self, cookie: Cookie) -> Result<(), JarError> {
        let _guard = lock(&self.write_lock);
        let (mut jar, _) = self.read_for_update()?;

        jar.cookies.retain(|c| c.scope != cookie.scope);
        jar.cookies.push(cookie);

        self.write(&jar)
    }

    fn remove(&self, scope: &CookieScope) -> Result<(), JarError> {
        let _guard = lock(&self.write_lock);
        let (mut jar, reset) = self.read_for_update()?;

        let before = jar.cookies.len();
        jar.cookies.retain(|c| &c.scope != scope);
        if jar.cookies.len() == before && !reset {
            return Ok(());
        }

        self.write(&jar)
    }
}

/// Lock a mutex, recovering from poisoning since the guarded data stays valid
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
