//! Converging the working tree onto a save.

use crate::config::RepositoryConfig;
use crate::delta::Resolver;
use crate::error::{Result, StoreError};
use crate::fs::{FileSystem, WalkControl};
use crate::ignore::{is_metadata_path, IgnoreRules};
use crate::types::{SaveId, SaveRecord};
use crate::worktree;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io;
use std::path::Path;

/// What a checkout will do, decided before anything is deleted or written.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CheckoutPlan {
    /// Tracked files absent from the target manifest.
    pub delete: Vec<String>,

    /// Target manifest entries to materialize.
    pub write: Vec<String>,

    /// Ignored files and their content before the checkout.
    pub preserved: BTreeMap<String, Vec<u8>>,
}

/// Outcome of a checkout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutReport {
    pub save_id: SaveId,
    pub written: usize,
    pub deleted: usize,
    /// Directories removed because the deletions left them empty.
    pub removed_dirs: usize,
    pub preserved: usize,
    pub ignore_file_restored: bool,
}

/// Applies a save's manifest to the working tree.
///
/// Ignored files are never deleted and always end with the content they had
/// before the checkout. The ignore file is the exception: when the target
/// save contains it, it is restored first and its rules govern the rest.
pub struct Reconciler<'a> {
    fs: &'a dyn FileSystem,
    resolver: Resolver<'a>,
    metadata_dir: &'a str,
    ignore_file: &'a str,
}

impl<'a> Reconciler<'a> {
    pub fn new(fs: &'a dyn FileSystem, resolver: Resolver<'a>, config: &'a RepositoryConfig) -> Self {
        Self {
            fs,
            resolver,
            metadata_dir: &config.metadata_dir,
            ignore_file: &config.ignore_file,
        }
    }

    /// Check out `target`.
    ///
    /// A failure part way leaves the tree partially converged; running the
    /// checkout again completes it.
    pub fn checkout(&self, target: &SaveRecord) -> Result<CheckoutReport> {
        let current = worktree::all_files(self.fs, self.metadata_dir)?;

        let ignore_file_restored = target.contains(self.ignore_file);
        if ignore_file_restored {
            let content = self.resolver.resolve(self.ignore_file, &target.id)?;
            self.write_file(self.ignore_file, &content)?;
            tracing::debug!(save = %target.id, "restored ignore file");
        }

        let rules = IgnoreRules::load(self.fs, Path::new(self.ignore_file))?;
        let plan = self.plan(&current, target, &rules)?;
        let mut report = self.apply(target, &plan)?;
        report.ignore_file_restored = ignore_file_restored;

        tracing::info!(
            save = %target.id,
            written = report.written,
            deleted = report.deleted,
            preserved = report.preserved,
            "checkout complete"
        );
        Ok(report)
    }

    /// Decide deletions and writes and capture ignored files.
    ///
    /// Reads only; nothing in the tree changes.
    pub fn plan(
        &self,
        current: &[String],
        target: &SaveRecord,
        rules: &IgnoreRules,
    ) -> Result<CheckoutPlan> {
        let manifest: HashSet<&str> = target.files.iter().map(String::as_str).collect();
        let mut plan = CheckoutPlan::default();

        for path in current {
            if self.is_special(path) {
                continue;
            }
            if rules.is_ignored(path) {
                match self.fs.read(Path::new(path)) {
                    Ok(content) => {
                        plan.preserved.insert(path.clone(), content);
                    }
                    Err(e) => {
                        // Never deleted or written below, so it stays as is.
                        tracing::warn!(path = %path, error = %e, "could not read ignored file");
                    }
                }
            } else if !manifest.contains(path.as_str()) {
                plan.delete.push(path.clone());
            }
        }

        plan.write = target
            .files
            .iter()
            .filter(|path| !self.is_special(path) && !rules.is_ignored(path))
            .cloned()
            .collect();

        Ok(plan)
    }

    fn apply(&self, target: &SaveRecord, plan: &CheckoutPlan) -> Result<CheckoutReport> {
        for path in &plan.delete {
            match self.fs.remove_file(Path::new(path)) {
                Ok(()) => tracing::debug!(path = %path, "deleted"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(path, e)),
            }
        }
        let removed_dirs = self.prune_empty_dirs(&plan.delete)?;

        for path in &plan.write {
            let content = self.resolver.resolve(path, &target.id)?;
            self.write_file(path, &content)?;
            tracing::debug!(path = %path, bytes = content.len(), "restored");
        }

        for (path, content) in &plan.preserved {
            self.write_file(path, content)?;
        }

        Ok(CheckoutReport {
            save_id: target.id.clone(),
            written: plan.write.len(),
            deleted: plan.delete.len(),
            removed_dirs,
            preserved: plan.preserved.len(),
            ignore_file_restored: false,
        })
    }

    /// Remove directories the deletions left empty, deepest first, so a file
    /// can take the place of a former directory.
    fn prune_empty_dirs(&self, deleted: &[String]) -> Result<usize> {
        let mut parents: BTreeSet<&str> = BTreeSet::new();
        for path in deleted {
            let mut current = path.as_str();
            while let Some((parent, _)) = current.rsplit_once('/') {
                parents.insert(parent);
                current = parent;
            }
        }

        let mut dirs: Vec<&str> = parents
            .into_iter()
            .filter(|dir| !is_metadata_path(dir, self.metadata_dir))
            .collect();
        dirs.sort_by_key(|dir| Reverse(dir.matches('/').count()));

        let mut removed = 0;
        for dir in dirs {
            if !self.is_empty_dir(dir)? {
                continue;
            }
            match self.fs.remove_dir(Path::new(dir)) {
                Ok(()) => {
                    removed += 1;
                    tracing::debug!(dir, "removed empty directory");
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(dir, e)),
            }
        }
        Ok(removed)
    }

    fn is_empty_dir(&self, dir: &str) -> Result<bool> {
        let mut empty = true;
        let walked = self.fs.walk(Path::new(dir), &mut |_, _| {
            empty = false;
            WalkControl::SkipSubtree
        });
        match walked {
            Ok(()) => Ok(empty),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(dir, e)),
        }
    }

    /// The metadata area and the ignore file are handled separately.
    fn is_special(&self, path: &str) -> bool {
        path == self.ignore_file || is_metadata_path(path, self.metadata_dir)
    }

    fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        let path = Path::new(path);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.fs
                .create_dir_all(parent)
                .map_err(|e| StoreError::io(parent, e))?;
        }
        self.fs
            .write(path, content)
            .map_err(|e| StoreError::io(path, e))
    }
}
