//! Repository orchestration
//!
//! A repository is a local tree plus a control area (`.dsync/`) holding the
//! configuration, the cache manifest (last synced state), the append-only
//! manifest history, and the lock marker. This module wires the scanner,
//! planner, executor, and validator into the operations the CLI consumes.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use dsync_fs::{SyncPath, io};

use crate::backend::Backend;
use crate::chain::{ValidationReport, validate_chain};
use crate::config::RepoConfig;
use crate::manifest::Manifest;
use crate::plan::{SyncPlan, plan};
use crate::scan::{ScanOptions, scan};
use crate::txn::{ExecuteOptions, Transaction, TransactionResult};
use crate::{Error, Result};

/// Name of the control directory under the repository root
pub const CONTROL_DIR: &str = ".dsync";

const CONFIG_FILE: &str = "config.toml";
const CACHE_FILE: &str = "cache.json";
const HISTORY_DIR: &str = "history";

/// What one sync invocation did
#[derive(Debug)]
pub struct SyncOutcome {
    /// The computed plan
    pub plan: SyncPlan,
    /// The committed transaction, or None when the plan was empty
    pub result: Option<TransactionResult>,
}

/// A local tree bound to its control area and configuration
#[derive(Debug)]
pub struct Repository {
    root: PathBuf,
    config: RepoConfig,
}

impl Repository {
    /// Initialize a new repository: create the control area and write the
    /// configuration.
    ///
    /// # Errors
    ///
    /// Fails if a configuration already exists at the root.
    pub fn init(root: impl Into<PathBuf>, config: RepoConfig) -> Result<Self> {
        let root = root.into();
        let config_path = root.join(CONTROL_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Err(Error::Backend {
                backend: "repository".to_string(),
                message: format!("already initialized at {}", config_path.display()),
            });
        }
        fs::create_dir_all(root.join(CONTROL_DIR).join(HISTORY_DIR))?;
        io::write_atomic(&config_path, config.to_toml()?.as_bytes())?;
        Ok(Self { root, config })
    }

    /// Open an existing repository.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigMissing`] when the control area has no
    /// configuration.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config_path = root.join(CONTROL_DIR).join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(Error::ConfigMissing { path: config_path });
        }
        let config = RepoConfig::parse(&io::read_text(&config_path)?)?;
        Ok(Self { root, config })
    }

    /// The repository root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The parsed configuration.
    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    /// Override the configured path-normalization behavior for this process.
    pub fn set_normalize_paths(&mut self, normalize: bool) {
        self.config.normalize_paths = normalize;
    }

    /// The control directory.
    pub fn control_dir(&self) -> PathBuf {
        self.root.join(CONTROL_DIR)
    }

    /// Scanner options derived from the configuration.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            normalize_paths: self.config.normalize_paths,
            compute_hashes: self.config.compute_hashes,
            included_subtrees: self
                .config
                .data_dirs
                .iter()
                .map(SyncPath::new)
                .collect::<BTreeSet<_>>(),
        }
    }

    /// Scan the local tree into a manifest.
    pub fn scan_local(&self) -> Result<Manifest> {
        scan(&self.root, &self.scan_options())
    }

    /// Load the cache manifest, or an empty manifest before the first sync.
    pub fn load_cache(&self) -> Result<Manifest> {
        let path = self.control_dir().join(CACHE_FILE);
        if !path.exists() {
            return Ok(Manifest::new());
        }
        Manifest::from_json(&io::read_text(&path)?)
    }

    /// Persist the cache manifest. Called only after a committed transaction.
    pub fn save_cache(&self, manifest: &Manifest) -> Result<()> {
        let path = self.control_dir().join(CACHE_FILE);
        io::write_atomic(&path, manifest.to_json()?.as_bytes())?;
        Ok(())
    }

    /// Append a committed manifest to the history ledger.
    pub fn append_history(&self, manifest: &Manifest) -> Result<()> {
        let meta = manifest.metadata().ok_or_else(|| Error::ManifestParse {
            message: "cannot append a manifest without chain metadata".to_string(),
        })?;
        let path = self
            .control_dir()
            .join(HISTORY_DIR)
            .join(format!("{}.json", meta.snapshot_id));
        io::write_atomic(&path, manifest.to_json()?.as_bytes())?;
        Ok(())
    }

    /// Load the full persisted history, in file order.
    pub fn load_history(&self) -> Result<Vec<Manifest>> {
        let dir = self.control_dir().join(HISTORY_DIR);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        names.sort();

        let mut manifests = Vec::with_capacity(names.len());
        for path in names {
            manifests.push(Manifest::from_json(&io::read_text(&path)?)?);
        }
        Ok(manifests)
    }

    /// Compute the current plan without executing anything.
    pub fn status(&self, backend: &Backend) -> Result<SyncPlan> {
        let local = self.scan_local()?;
        let cache = self.load_cache()?;
        let remote = backend.read_manifest()?.unwrap_or_default();
        Ok(plan(&local, &cache, &remote))
    }

    /// Scan, plan, and execute one sync transaction.
    ///
    /// An empty plan commits nothing and produces no new snapshot. On
    /// success the new cache manifest is persisted and appended to history.
    pub fn sync(&self, backend: &Backend, options: &ExecuteOptions) -> Result<SyncOutcome> {
        let local = self.scan_local()?;
        let cache = self.load_cache()?;
        let remote = backend.read_manifest()?.unwrap_or_default();

        let sync_plan = plan(&local, &cache, &remote);
        if sync_plan.is_empty() {
            tracing::debug!("plan is empty; nothing to sync");
            return Ok(SyncOutcome {
                plan: sync_plan,
                result: None,
            });
        }

        let control_dir = self.control_dir();
        let txn = Transaction::new(
            &sync_plan,
            backend,
            &self.root,
            &control_dir,
            &local,
            &cache,
            &remote,
        );
        let result = txn.execute(options)?;

        self.save_cache(&result.new_cache)?;
        self.append_history(&result.new_cache)?;

        Ok(SyncOutcome {
            plan: sync_plan,
            result: Some(result),
        })
    }

    /// Validate the persisted snapshot chain.
    pub fn validate(&self) -> Result<ValidationReport> {
        let history = self.load_history()?;
        Ok(validate_chain(&history))
    }
}
