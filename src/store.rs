//! Repository: ties the catalog, object store, delta engine and reconciler
//! together behind the four user-facing operations.

use crate::catalog::Catalog;
use crate::checkout::{CheckoutReport, Reconciler};
use crate::config::RepositoryConfig;
use crate::delta::{compute_delta, Resolver};
use crate::error::{Result, StoreError};
use crate::fs::FileSystem;
use crate::ignore::IgnoreRules;
use crate::objects::ObjectStore;
use crate::types::{DeltaRecord, DeltaSet, FileChange, SaveId, SaveRecord, SaveSummary};
use crate::worktree;
use chrono::Utc;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// A snapshot repository over one working tree.
///
/// Provides a unified interface for:
/// - Saving the tracked files under a new save id
/// - Listing saves in creation order
/// - Checking out any save while leaving ignored files alone
/// - Reading a single file as of any save
pub struct Repository {
    fs: Arc<dyn FileSystem>,

    /// Repository configuration.
    config: RepositoryConfig,

    /// Save history.
    catalog: Catalog,

    /// Blobs and delta sets.
    objects: ObjectStore,
}

impl Repository {
    /// Create the metadata area and an empty catalog.
    pub fn init(fs: Arc<dyn FileSystem>, config: RepositoryConfig) -> Result<Self> {
        let metadata_dir = Path::new(&config.metadata_dir);
        if fs.exists(metadata_dir) {
            return Err(StoreError::AlreadyInitialized);
        }

        let objects_dir = config.objects_dir();
        fs.create_dir_all(&objects_dir)
            .map_err(|e| StoreError::io(&objects_dir, e))?;

        let catalog = Catalog::new(config.catalog_path());
        catalog.persist(fs.as_ref())?;

        tracing::info!(dir = %config.metadata_dir, "initialized repository");
        Ok(Self::assemble(fs, config, catalog))
    }

    /// Open an existing repository.
    pub fn open(fs: Arc<dyn FileSystem>, config: RepositoryConfig) -> Result<Self> {
        if !fs.exists(Path::new(&config.metadata_dir)) {
            return Err(StoreError::NotInitialized);
        }

        let catalog = Catalog::load(fs.as_ref(), config.catalog_path())?;
        Ok(Self::assemble(fs, config, catalog))
    }

    fn assemble(fs: Arc<dyn FileSystem>, config: RepositoryConfig, catalog: Catalog) -> Self {
        let objects = ObjectStore::new(fs.clone(), config.objects_dir(), config.cache_size);
        Self {
            fs,
            config,
            catalog,
            objects,
        }
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.catalog, &self.objects)
    }

    // --- Saving ---

    /// Snapshot every trackable file under a new save.
    pub fn save(&mut self, label: &str) -> Result<SaveId> {
        let rules = IgnoreRules::load(
            self.fs.as_ref(),
            Path::new(&self.config.ignore_file),
        )?;
        let files = worktree::trackable_files(
            self.fs.as_ref(),
            &self.config.metadata_dir,
            &self.config.ignore_file,
            &rules,
        )?;
        if files.is_empty() {
            return Err(StoreError::NoFilesToSave);
        }

        let base = self.catalog.latest().cloned();
        let now = Utc::now();
        let created_at = match &base {
            Some(latest) if latest.created_at > now => latest.created_at,
            _ => now,
        };

        let id = self.catalog.next_id(label, created_at, &files);
        if self.catalog.find(&id).is_ok() {
            return Err(StoreError::InvalidOperation(format!(
                "save id {} already exists",
                id
            )));
        }

        let deltas = self.write_deltas(&id, &files, base.as_ref())?;
        let set = DeltaSet {
            save_id: id.clone(),
            deltas,
        };
        self.objects.put_delta_set(&set, self.config.compression)?;

        self.catalog.append(SaveRecord {
            id: id.clone(),
            label: label.to_string(),
            created_at,
            files,
            base_id: base.map(|b| b.id),
        })?;
        self.catalog.persist(self.fs.as_ref())?;

        tracing::info!(save = %id, label, files = set.deltas.len(), "saved state");
        Ok(id)
    }

    /// Compute per-file deltas against `base`, writing full blobs for new
    /// files and for files whose delta chain has reached the limit.
    fn write_deltas(
        &self,
        id: &SaveId,
        files: &[String],
        base: Option<&SaveRecord>,
    ) -> Result<Vec<DeltaRecord>> {
        let resolver = self.resolver();
        let compression = self.config.compression;
        let max_chain = self.config.max_chain_length;
        let mut deltas = Vec::with_capacity(files.len());
        let base_files: HashSet<&str> = base
            .map(|b| b.files.iter().map(String::as_str).collect())
            .unwrap_or_default();

        for file in files {
            let current = self
                .fs
                .read(Path::new(file))
                .map_err(|e| StoreError::io(file, e))?;

            match base {
                Some(base) if base_files.contains(file.as_str()) => {
                    let previous = resolver.resolve(file, &base.id)?;
                    let delta = compute_delta(Some(&previous), Some(&current), file, Some(&base.id))?;

                    if max_chain > 0
                        && delta.has_patch()
                        && resolver.chain_length(file, &base.id) >= max_chain
                    {
                        tracing::debug!(save = %id, path = %file, "delta chain at limit, storing full blob");
                        self.objects.put_blob(id, file, &current, compression)?;
                    }
                    deltas.push(delta);
                }
                _ => {
                    deltas.push(compute_delta(None, Some(&current), file, None)?);
                    self.objects.put_blob(id, file, &current, compression)?;
                }
            }
        }

        if let Some(base) = base {
            let kept: HashSet<&str> = files.iter().map(String::as_str).collect();
            for file in base.files.iter().filter(|f| !kept.contains(f.as_str())) {
                let previous = resolver.resolve(file, &base.id)?;
                deltas.push(compute_delta(Some(&previous), None, file, Some(&base.id))?);
                tracing::debug!(save = %id, path = %file, "recorded deletion");
            }
        }

        Ok(deltas)
    }

    // --- Reading ---

    /// All saves, oldest first.
    pub fn list_saves(&self) -> Vec<SaveSummary> {
        self.catalog.all().iter().map(SaveSummary::from).collect()
    }

    /// Content of `path` as of `save_id`.
    pub fn read_file(&self, path: &str, save_id: &SaveId) -> Result<Vec<u8>> {
        let save = self.catalog.find(save_id)?;
        if !save.contains(path) {
            return Err(StoreError::FileNotInSave {
                save_id: save_id.clone(),
                path: path.to_string(),
            });
        }
        self.resolver().resolve(path, save_id)
    }

    /// What a save recorded for each file, deletions included.
    pub fn changes(&self, save_id: &SaveId) -> Result<Vec<FileChange>> {
        let save = self.catalog.find(save_id)?;
        let set = self.objects.get_delta_set(&save.id)?;
        Ok(set.deltas.iter().map(FileChange::from).collect())
    }

    /// Delta hops needed to read `path` at `save_id`.
    pub fn resolution_depth(&self, path: &str, save_id: &SaveId) -> Result<usize> {
        let save = self.catalog.find(save_id)?;
        Ok(self.resolver().chain_length(path, &save.id))
    }

    // --- Checkout ---

    /// Converge the working tree onto `save_id`.
    pub fn checkout(&self, save_id: &SaveId) -> Result<CheckoutReport> {
        let target = self.catalog.find(save_id)?;
        Reconciler::new(self.fs.as_ref(), self.resolver(), &self.config).checkout(target)
    }

    /// Check out the most recent save.
    pub fn checkout_latest(&self) -> Result<CheckoutReport> {
        let latest = self
            .catalog
            .latest()
            .ok_or_else(|| StoreError::InvalidOperation("no saves to check out".into()))?;
        self.checkout(&latest.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFileSystem;
    use crate::types::ChangeKind;

    fn repo() -> (Arc<MemoryFileSystem>, Repository) {
        let fs = Arc::new(MemoryFileSystem::new());
        let repo = Repository::init(fs.clone(), RepositoryConfig::default()).unwrap();
        (fs, repo)
    }

    #[test]
    fn test_init_twice() {
        let (fs, _repo) = repo();
        let result = Repository::init(fs, RepositoryConfig::default());
        assert!(matches!(result, Err(StoreError::AlreadyInitialized)));
    }

    #[test]
    fn test_open_uninitialized() {
        let fs = Arc::new(MemoryFileSystem::new());
        let result = Repository::open(fs, RepositoryConfig::default());
        assert!(matches!(result, Err(StoreError::NotInitialized)));
    }

    #[test]
    fn test_save_empty_tree() {
        let (_fs, mut repo) = repo();
        assert!(matches!(repo.save("nothing"), Err(StoreError::NoFilesToSave)));
        assert!(repo.list_saves().is_empty());
    }

    #[test]
    fn test_save_links_to_previous() {
        let (fs, mut repo) = repo();
        fs.insert("a.txt", "v1");
        let id1 = repo.save("s1").unwrap();
        fs.insert("a.txt", "v2");
        let id2 = repo.save("s2").unwrap();

        let saves = repo.list_saves();
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[0].id, id1);
        assert_eq!(saves[0].base_id, None);
        assert_eq!(saves[1].id, id2);
        assert_eq!(saves[1].base_id, Some(id1.clone()));
        assert!(saves[1].created_at >= saves[0].created_at);
        assert_eq!(id1.as_str().len(), 12);
    }

    #[test]
    fn test_catalog_survives_reopen() {
        let (fs, mut repo) = repo();
        fs.insert("a.txt", "v1");
        let id = repo.save("s1").unwrap();

        let reopened = Repository::open(fs, RepositoryConfig::default()).unwrap();
        assert_eq!(reopened.list_saves()[0].id, id);
        assert_eq!(reopened.read_file("a.txt", &id).unwrap(), b"v1");
    }

    #[test]
    fn test_read_file_at_each_save() {
        let (fs, mut repo) = repo();
        fs.insert("a.txt", "line\n");
        let id1 = repo.save("s1").unwrap();
        fs.insert("a.txt", "line\nmore\n");
        let id2 = repo.save("s2").unwrap();

        assert_eq!(repo.read_file("a.txt", &id1).unwrap(), b"line\n");
        assert_eq!(repo.read_file("a.txt", &id2).unwrap(), b"line\nmore\n");
        assert!(matches!(
            repo.read_file("b.txt", &id2),
            Err(StoreError::FileNotInSave { .. })
        ));
    }

    #[test]
    fn test_changes_include_deletions() {
        let (fs, mut repo) = repo();
        fs.insert("keep.txt", "same");
        fs.insert("edit.txt", "old\n");
        fs.insert("drop.txt", "bye");
        repo.save("s1").unwrap();

        fs.insert("edit.txt", "new\n");
        fs.remove_file(Path::new("drop.txt")).unwrap();
        fs.insert("add.txt", "hello");
        let id2 = repo.save("s2").unwrap();

        let mut changes: Vec<(String, ChangeKind)> = repo
            .changes(&id2)
            .unwrap()
            .into_iter()
            .map(|c| (c.path, c.kind))
            .collect();
        changes.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(
            changes,
            vec![
                ("add.txt".to_string(), ChangeKind::Added),
                ("drop.txt".to_string(), ChangeKind::Deleted),
                ("edit.txt".to_string(), ChangeKind::Modified),
                ("keep.txt".to_string(), ChangeKind::Unchanged),
            ]
        );
        assert!(!repo.catalog().find(&id2).unwrap().contains("drop.txt"));
    }

    #[test]
    fn test_checkout_latest_without_saves() {
        let (_fs, repo) = repo();
        assert!(matches!(
            repo.checkout_latest(),
            Err(StoreError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_unknown_save() {
        let (_fs, repo) = repo();
        let id = SaveId::from("000000000000");
        assert!(repo.checkout(&id).unwrap_err().is_not_found());
        assert!(repo.changes(&id).unwrap_err().is_not_found());
        assert!(repo.resolution_depth("a", &id).unwrap_err().is_not_found());
    }
}
