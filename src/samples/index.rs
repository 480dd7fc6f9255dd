// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! The sample library index: every playable file under the sample root, grouped by category.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

/// File extensions that are indexed, compared case-insensitively.
const SAMPLE_EXTENSIONS: [&str; 3] = ["wav", "aif", "mp3"];

/// The canonical drum categories. Folder names matching one of these, ignoring case, are
/// grouped under the canonical spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrumCategory {
    Kick,
    Snare,
    Hihat,
    Clap,
    Tom,
    Cymbal,
    Percussion,
    Fx,
    Bell,
    Ride,
    Other,
}

impl DrumCategory {
    pub const ALL: [DrumCategory; 11] = [
        DrumCategory::Kick,
        DrumCategory::Snare,
        DrumCategory::Hihat,
        DrumCategory::Clap,
        DrumCategory::Tom,
        DrumCategory::Cymbal,
        DrumCategory::Percussion,
        DrumCategory::Fx,
        DrumCategory::Bell,
        DrumCategory::Ride,
        DrumCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DrumCategory::Kick => "Kick",
            DrumCategory::Snare => "Snare",
            DrumCategory::Hihat => "Hihat",
            DrumCategory::Clap => "Clap",
            DrumCategory::Tom => "Tom",
            DrumCategory::Cymbal => "Cymbal",
            DrumCategory::Percussion => "Percussion",
            DrumCategory::Fx => "FX",
            DrumCategory::Bell => "Bell",
            DrumCategory::Ride => "Ride",
            DrumCategory::Other => "Other",
        }
    }

    /// Matches a folder name against the canonical categories, ignoring case.
    pub fn from_folder(name: &str) -> Option<DrumCategory> {
        DrumCategory::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(name))
    }
}

/// Returns the category name files in the given folder are grouped under.
pub fn canonical_category(folder: &str) -> String {
    match DrumCategory::from_folder(folder) {
        Some(category) => category.as_str().to_string(),
        None => folder.to_string(),
    }
}

/// A single playable file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleFile {
    /// The file name without its extension.
    pub display_name: String,
    pub path: PathBuf,
    /// The canonical category the file was grouped under.
    pub category: String,
}

/// An immutable snapshot of the sample library. Rebuilt wholesale, never edited in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleIndex {
    categories: BTreeMap<String, Vec<SampleFile>>,
}

impl SampleIndex {
    /// Scans the tree under root. Directory entries are visited in file name order so the
    /// order of files within a category is reproducible. An unreadable root gives an empty
    /// index; unreadable subdirectories are skipped. Symlinked directories are followed once,
    /// a link back into an already visited directory is ignored.
    pub fn scan(root: &Path) -> SampleIndex {
        let mut index = SampleIndex::default();
        if let Err(e) = fs::read_dir(root) {
            warn!(root = ?root, err = %e, "Unable to read sample root, using an empty index");
            return index;
        }

        index.scan_dir(root, &mut HashSet::new());
        info!(
            root = ?root,
            samples = index.len(),
            categories = index.categories.len(),
            "Indexed samples"
        );
        index
    }

    fn scan_dir(&mut self, dir: &Path, visited: &mut HashSet<PathBuf>) {
        match fs::canonicalize(dir) {
            Ok(canonical) if visited.insert(canonical.clone()) => {}
            Ok(_) => {
                debug!(dir = ?dir, "Skipping directory that was already scanned");
                return;
            }
            Err(e) => {
                debug!(dir = ?dir, err = %e, "Skipping unresolvable directory");
                return;
            }
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = ?dir, err = %e, "Skipping unreadable directory");
                return;
            }
        };

        let mut entries: Vec<fs::DirEntry> = entries.filter_map(Result::ok).collect();
        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let Ok(mut file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_symlink() {
                // Resolve the link target. Dangling links are skipped.
                match fs::metadata(&path) {
                    Ok(metadata) => file_type = metadata.file_type(),
                    Err(_) => continue,
                }
            }
            if file_type.is_dir() {
                self.scan_dir(&path, visited);
                continue;
            }
            if !file_type.is_file() || !is_sample_file(&path) {
                continue;
            }

            let folder = dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let category = canonical_category(&folder);
            let display_name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();

            self.categories
                .entry(category.clone())
                .or_default()
                .push(SampleFile {
                    display_name,
                    path,
                    category,
                });
        }
    }

    /// Finds the files for a category key. An exact match on the canonical name wins,
    /// otherwise the first category (in sorted order) whose name contains the key,
    /// ignoring case.
    pub fn lookup(&self, key: &str) -> Option<&[SampleFile]> {
        if let Some(files) = self.categories.get(key) {
            return Some(files);
        }

        let key = key.to_lowercase();
        self.categories
            .iter()
            .find(|(category, _)| category.to_lowercase().contains(&key))
            .map(|(_, files)| files.as_slice())
    }

    /// Returns the files of exactly the given category.
    pub fn get(&self, category: &str) -> Option<&[SampleFile]> {
        self.categories.get(category).map(|files| files.as_slice())
    }

    /// Iterates over the category names in sorted order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(|category| category.as_str())
    }

    /// Total number of indexed files.
    pub fn len(&self) -> usize {
        self.categories.values().map(|files| files.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

fn is_sample_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SAMPLE_EXTENSIONS
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
        })
}

/// Owns the sample root and caches the last scan.
pub struct SampleIndexer {
    root: PathBuf,
    cache: Option<Arc<SampleIndex>>,
}

impl SampleIndexer {
    pub fn new(root: PathBuf) -> SampleIndexer {
        SampleIndexer { root, cache: None }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the cached index, scanning the root the first time.
    pub fn index(&mut self) -> Arc<SampleIndex> {
        if let Some(index) = &self.cache {
            return index.clone();
        }
        let index = Arc::new(SampleIndex::scan(&self.root));
        self.cache = Some(index.clone());
        index
    }

    /// Replaces the cached index with one scanned elsewhere.
    pub fn install(&mut self, index: Arc<SampleIndex>) {
        self.cache = Some(index);
    }

    /// Drops the cached index so the next call to index scans again.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Scans the root again.
    pub fn rescan(&mut self) -> Arc<SampleIndex> {
        self.invalidate();
        self.index()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn touch_file(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_scan_groups_by_canonical_category() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch_file(&root.join("HiHat/closed.wav"));
        touch_file(&root.join("hihat/open.WAV"));
        touch_file(&root.join("Kick/b.aif"));
        touch_file(&root.join("Kick/a.mp3"));
        touch_file(&root.join("Kick/notes.txt"));
        touch_file(&root.join("Vox/shout.wav"));

        let index = SampleIndex::scan(root);
        assert_eq!(index.len(), 5);
        assert_eq!(
            index.categories().collect::<Vec<_>>(),
            vec!["Hihat", "Kick", "Vox"]
        );

        let kicks = index.get("Kick").unwrap();
        assert_eq!(kicks[0].display_name, "a");
        assert_eq!(kicks[1].display_name, "b");
        assert_eq!(kicks[0].category, "Kick");

        let hats = index.get("Hihat").unwrap();
        assert_eq!(hats.len(), 2);
        assert_eq!(hats[0].display_name, "closed");
    }

    #[test]
    fn test_scan_nested_uses_parent_folder() {
        let dir = tempfile::tempdir().unwrap();
        touch_file(&dir.path().join("Acoustic/Snare/rim.wav"));

        let index = SampleIndex::scan(dir.path());
        assert_eq!(index.get("Snare").unwrap()[0].display_name, "rim");
        assert!(index.get("Acoustic").is_none());
    }

    #[test]
    fn test_scan_missing_root_is_empty() {
        let index = SampleIndex::scan(Path::new("/nonexistent/padkit/samples"));
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_ignores_directory_loops() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch_file(&root.join("Kick/a.wav"));
        symlink(root, root.join("Kick/loop")).unwrap();
        symlink(root, root.join("Kick/loop2")).unwrap();
        symlink(root.join("Kick"), root.join("Kick/self")).unwrap();

        let index = SampleIndex::scan(root);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("Kick").unwrap()[0].display_name, "a");
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_follows_linked_folders() {
        use std::os::unix::fs::symlink;

        let library = tempfile::tempdir().unwrap();
        touch_file(&library.path().join("snares/crack.wav"));
        touch_file(&library.path().join("one.wav"));

        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Clap")).unwrap();
        symlink(library.path().join("snares"), dir.path().join("Snare")).unwrap();
        symlink(library.path().join("one.wav"), dir.path().join("Clap/one.wav")).unwrap();
        symlink(library.path().join("missing.wav"), dir.path().join("Clap/gone.wav")).unwrap();

        let index = SampleIndex::scan(dir.path());
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("Snare").unwrap()[0].display_name, "crack");
        assert_eq!(index.get("Clap").unwrap()[0].display_name, "one");
    }

    #[test]
    fn test_lookup() {
        let dir = tempfile::tempdir().unwrap();
        touch_file(&dir.path().join("Ride/ride.wav"));
        touch_file(&dir.path().join("Tom Toms/low.wav"));
        touch_file(&dir.path().join("Deep Toms/deep.wav"));

        let index = SampleIndex::scan(dir.path());
        assert_eq!(index.lookup("Ride").unwrap()[0].display_name, "ride");
        // Substring matches go through the categories in sorted order.
        assert_eq!(index.lookup("Tom").unwrap()[0].display_name, "deep");
        assert_eq!(index.lookup("ride").unwrap()[0].display_name, "ride");
        assert!(index.lookup("Bell").is_none());
    }

    #[test]
    fn test_indexer_cache() {
        let dir = tempfile::tempdir().unwrap();
        touch_file(&dir.path().join("Clap/one.wav"));

        let mut indexer = SampleIndexer::new(dir.path().to_path_buf());
        let first = indexer.index();
        assert_eq!(first.len(), 1);

        touch_file(&dir.path().join("Clap/two.wav"));
        assert_eq!(indexer.index().len(), 1);
        assert!(Arc::ptr_eq(&first, &indexer.index()));

        assert_eq!(indexer.rescan().len(), 2);
        // The old snapshot is untouched.
        assert_eq!(first.len(), 1);

        indexer.install(first.clone());
        assert!(Arc::ptr_eq(&first, &indexer.index()));
    }
}
