//! Isolation domains: temp storage plus loaded programs, reused for a
//! bounded number of executions.
//!
//! A domain owns one temp directory holding copied references and compiled
//! artifacts. The [`DomainPool`] hands out [`DomainLease`]s on the current
//! domain and retires it after `max_reuses` leases. Each lease holds the
//! domain alive, so a retired domain's directory is deleted only when its
//! last in-flight execution finishes, on every exit path.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use uuid::Uuid;

use lumen_check::Program;

use crate::compiler::{artifact_path, Fingerprint};
use crate::error::SandboxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DomainId(pub Uuid);

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reference as copied into a domain.
#[derive(Debug, Clone)]
pub struct ReferenceCopy {
    pub path: PathBuf,
    pub text: String,
}

/// Tuning for [`DomainPool`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Executions a domain serves before it is retired.
    pub max_reuses: usize,
    /// Parent directory for domain temp directories; the system temp
    /// directory when `None`.
    pub root: Option<PathBuf>,
}

impl Default for DomainConfig {
    fn default() -> Self {
        DomainConfig {
            max_reuses: 25,
            root: None,
        }
    }
}

/// One isolation boundary.
#[derive(Debug)]
pub struct IsolationDomain {
    id: DomainId,
    dir: TempDir,
    uses: AtomicUsize,
    programs: DashMap<Fingerprint, Arc<Program>>,
}

impl IsolationDomain {
    fn create(config: &DomainConfig) -> Result<Self, SandboxError> {
        let id = DomainId(Uuid::new_v4());
        let prefix = format!("lumen-{id}-");
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match &config.root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        tracing::debug!(domain = %id, path = %dir.path().display(), "isolation domain created");
        Ok(IsolationDomain {
            id,
            dir,
            uses: AtomicUsize::new(0),
            programs: DashMap::new(),
        })
    }

    pub fn id(&self) -> DomainId {
        self.id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Executions leased from this domain so far.
    pub fn uses(&self) -> usize {
        self.uses.load(Ordering::SeqCst)
    }

    /// Copies reference `index` into the domain directory and returns the
    /// text that was copied.
    ///
    /// Every call copies afresh, so an edited reference is never served
    /// from an earlier copy. Copies live under `references/<index>/`, which
    /// keeps references that share a file name apart. The copy is staged
    /// and then renamed into place, so a concurrent evaluation on the same
    /// domain never reads a half-written file.
    pub fn copy_reference(&self, index: usize, path: &Path) -> Result<ReferenceCopy, SandboxError> {
        let file_name = path.file_name().ok_or_else(|| SandboxError::Reference {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file path"),
        })?;
        let dir = self.dir.path().join("references").join(index.to_string());
        let target = dir.join(file_name);
        let copy = || -> std::io::Result<String> {
            let text = std::fs::read_to_string(path)?;
            std::fs::create_dir_all(&dir)?;
            let mut staged = tempfile::NamedTempFile::new_in(&dir)?;
            staged.write_all(text.as_bytes())?;
            staged.persist(&target).map_err(|error| error.error)?;
            Ok(text)
        };
        let text = copy().map_err(|source| SandboxError::Reference {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(ReferenceCopy { path: target, text })
    }

    pub fn artifact_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        artifact_path(self.dir.path(), fingerprint)
    }

    pub fn cached(&self, fingerprint: &Fingerprint) -> Option<Arc<Program>> {
        self.programs
            .get(fingerprint)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn cache(&self, fingerprint: Fingerprint, program: Arc<Program>) {
        self.programs.insert(fingerprint, program);
    }
}

impl Drop for IsolationDomain {
    fn drop(&mut self) {
        tracing::debug!(domain = %self.id, uses = self.uses(), "isolation domain torn down");
    }
}

/// A claim on a domain for one execution.
#[derive(Debug, Clone)]
pub struct DomainLease {
    domain: Arc<IsolationDomain>,
}

impl std::ops::Deref for DomainLease {
    type Target = IsolationDomain;

    fn deref(&self) -> &IsolationDomain {
        &self.domain
    }
}

/// Hands out leases on the current domain, replacing it once worn out.
#[derive(Debug)]
pub struct DomainPool {
    config: DomainConfig,
    current: Mutex<Option<Arc<IsolationDomain>>>,
}

impl DomainPool {
    pub fn new(config: DomainConfig) -> Self {
        DomainPool {
            config,
            current: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &DomainConfig {
        &self.config
    }

    /// Leases the current domain, creating a fresh one if there is none or
    /// the current one has served `max_reuses` executions.
    pub fn lease(&self) -> Result<DomainLease, SandboxError> {
        let mut current = self.current.lock();
        let worn = current
            .as_ref()
            .is_some_and(|domain| domain.uses() >= self.config.max_reuses.max(1));
        if worn {
            if let Some(old) = current.take() {
                tracing::debug!(domain = %old.id(), "isolation domain retired");
            }
        }
        let domain = match current.as_ref() {
            Some(domain) => Arc::clone(domain),
            None => {
                let domain = Arc::new(IsolationDomain::create(&self.config)?);
                *current = Some(Arc::clone(&domain));
                domain
            }
        };
        domain.uses.fetch_add(1, Ordering::SeqCst);
        Ok(DomainLease { domain })
    }

    /// Drops the pool's handle on the current domain. Its directory goes
    /// away once every outstanding lease is released.
    pub fn retire(&self) {
        if let Some(old) = self.current.lock().take() {
            tracing::debug!(domain = %old.id(), "isolation domain retired");
        }
    }

    /// The domain the next lease would use, if one is live.
    pub fn current(&self) -> Option<DomainId> {
        self.current.lock().as_ref().map(|domain| domain.id())
    }
}
