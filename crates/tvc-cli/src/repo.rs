//! On-disk repository layout.
//!
//! ```text
//! <root>/.tvc/
//!   config.toml   repository settings
//!   roots.json    object ids of the Working, Staged and Head roots
//!   objects/      file object store
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{debug, info};
use tvc_root::{RootIds, RootValue, Roots};
use tvc_stage::{PatternIgnoreFilter, Stager};
use tvc_store::{FileObjectStore, ObjectStore};
use tvc_types::Collation;

use crate::config::RepoConfig;

pub const TVC_DIR: &str = ".tvc";
const OBJECTS_DIR: &str = "objects";
const ROOTS_FILE: &str = "roots.json";
const CONFIG_FILE: &str = "config.toml";

pub struct Repo {
    dir: PathBuf,
    store: Arc<dyn ObjectStore>,
    config: RepoConfig,
}

impl Repo {
    /// Create a repository under `path` with three empty roots.
    pub fn init(path: &Path, collation: Option<Collation>) -> anyhow::Result<Self> {
        let dir = path.join(TVC_DIR);
        if dir.exists() {
            bail!("repository already exists at {}", dir.display());
        }
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        let mut config = RepoConfig::default();
        if let Some(collation) = collation {
            config.database.default_collation = collation;
        }
        config.save(&dir.join(CONFIG_FILE))?;

        let repo = Self::from_dir(dir, config)?;
        let empty = RootValue::with_collation(repo.config.database.default_collation);
        repo.save_roots(&Roots::new(empty.clone(), empty.clone(), empty))?;
        info!(path = %repo.dir.display(), "initialized repository");
        Ok(repo)
    }

    /// Open the repository rooted at `path`.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let dir = path.join(TVC_DIR);
        if !dir.is_dir() {
            bail!("not a tvc repository: {}", path.display());
        }
        let config = RepoConfig::load(&dir.join(CONFIG_FILE))?;
        Self::from_dir(dir, config)
    }

    fn from_dir(dir: PathBuf, config: RepoConfig) -> anyhow::Result<Self> {
        let store = FileObjectStore::open(dir.join(OBJECTS_DIR))?;
        Ok(Self {
            dir,
            store: Arc::new(store),
            config,
        })
    }

    /// Loaded repository settings.
    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// Shared handle to the object store.
    pub fn store(&self) -> Arc<dyn ObjectStore> {
        Arc::clone(&self.store)
    }

    /// Staging engine honoring the configured ignore rules.
    pub fn stager(&self) -> Stager {
        let ignore = PatternIgnoreFilter::with_patterns(self.config.ignore.clone());
        Stager::new(Arc::new(ignore), Arc::new(tvc_diff::RootDiffer))
    }

    /// Load the roots `roots.json` points at.
    pub fn load_roots(&self) -> anyhow::Result<Roots> {
        let path = self.dir.join(ROOTS_FILE);
        let raw = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let ids: RootIds = serde_json::from_slice(&raw)
            .with_context(|| format!("parsing {}", path.display()))?;
        Ok(ids.load(self.store())?)
    }

    /// Persist `roots` and point `roots.json` at them. The file is replaced
    /// with a rename, so readers see either the old or the new ids.
    pub fn save_roots(&self, roots: &Roots) -> anyhow::Result<RootIds> {
        let ids = roots.store(self.store.as_ref())?;
        let json = serde_json::to_vec_pretty(&ids)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.dir.join(ROOTS_FILE)).map_err(|e| e.error)?;

        debug!(
            working = %ids.working.short_hex(),
            staged = %ids.staged.short_hex(),
            head = %ids.head.short_hex(),
            "roots saved"
        );
        Ok(ids)
    }
}
