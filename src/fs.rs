//! Directory listing and stat access used by the queue builder.
//!
//! The builder only needs names, file types, sizes and modification times,
//! so it reads the filesystem through [`MediaFs`]. [`LocalFs`] talks to the
//! real disk, [`MemoryFs`] holds a snapshot in memory.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: OsString,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub modified: SystemTime,
}

pub trait MediaFs: Send + Sync {
    /// Files and directories directly inside `dir`, sorted by name.
    /// Other entry types (symlinks, sockets, ...) are left out.
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>>;

    /// Size and modification time of a file. `Ok(None)` when nothing exists
    /// at `path`.
    fn stat(&self, path: &Path) -> io::Result<Option<FileStat>>;
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl MediaFs for LocalFs {
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|err| {
                let kind = err.io_error().map(|e| e.kind()).unwrap_or(io::ErrorKind::Other);
                io::Error::new(
                    kind,
                    format!("Error reading directory {}: {}", dir.display(), err),
                )
            })?;

            let file_type = entry.file_type();
            let kind = if file_type.is_dir() {
                EntryKind::Dir
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                continue;
            };
            entries.push(DirEntry {
                name: entry.file_name().to_os_string(),
                kind,
            });
        }
        Ok(entries)
    }

    fn stat(&self, path: &Path) -> io::Result<Option<FileStat>> {
        match std::fs::metadata(path) {
            Ok(metadata) if !metadata.is_file() => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is not a regular file", path.display()),
            )),
            Ok(metadata) => Ok(Some(FileStat {
                size: metadata.len(),
                modified: metadata.modified()?,
            })),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(FileStat),
    /// A file whose metadata cannot be read.
    Unreadable,
    /// A directory that shows up in its parent but cannot be listed.
    Unlistable,
}

/// An in-memory tree. Parent directories are created implicitly.
#[derive(Debug, Default, Clone)]
pub struct MemoryFs {
    nodes: BTreeMap<PathBuf, Node>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir(&mut self, path: impl AsRef<Path>) -> &mut Self {
        let path = normalize(path.as_ref());
        self.add_parents(&path);
        self.nodes.insert(path, Node::Dir);
        self
    }

    pub fn add_file(&mut self, path: impl AsRef<Path>, size: u64, modified: SystemTime) -> &mut Self {
        self.insert_file(path.as_ref(), Node::File(FileStat { size, modified }))
    }

    /// A file that shows up in listings but fails to stat.
    pub fn add_unreadable_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.insert_file(path.as_ref(), Node::Unreadable)
    }

    /// A directory that fails to list, like one without read permission.
    pub fn add_unlistable_dir(&mut self, path: impl AsRef<Path>) -> &mut Self {
        let path = normalize(path.as_ref());
        self.add_parents(&path);
        self.nodes.insert(path, Node::Unlistable);
        self
    }

    /// Copy a file entry to `dest`, the way a successful copy would leave it.
    pub fn copy_file(&mut self, source: impl AsRef<Path>, dest: impl AsRef<Path>) -> io::Result<()> {
        let stat = self
            .stat(source.as_ref())?
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))?;
        self.add_file(dest, stat.size, stat.modified);
        Ok(())
    }

    fn insert_file(&mut self, path: &Path, node: Node) -> &mut Self {
        let path = normalize(path);
        self.add_parents(&path);
        self.nodes.insert(path, node);
        self
    }

    fn add_parents(&mut self, path: &Path) {
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            self.nodes.entry(ancestor.to_path_buf()).or_insert(Node::Dir);
        }
    }
}

impl MediaFs for MemoryFs {
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        let dir = normalize(dir);
        match self.nodes.get(&dir) {
            Some(Node::Dir) => {}
            Some(Node::Unlistable) => {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    format!("Permission denied listing {}", dir.display()),
                ))
            }
            Some(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{} is not a directory", dir.display()),
                ))
            }
            None => {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} does not exist", dir.display()),
                ))
            }
        }

        let mut entries: Vec<DirEntry> = self
            .nodes
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir.as_path()))
            .filter_map(|(path, node)| {
                let name = path.file_name()?.to_os_string();
                let kind = match node {
                    Node::Dir | Node::Unlistable => EntryKind::Dir,
                    Node::File(_) | Node::Unreadable => EntryKind::File,
                };
                Some(DirEntry { name, kind })
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn stat(&self, path: &Path) -> io::Result<Option<FileStat>> {
        match self.nodes.get(&normalize(path)) {
            Some(Node::File(stat)) => Ok(Some(*stat)),
            Some(Node::Dir) | Some(Node::Unlistable) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is a directory", path.display()),
            )),
            Some(Node::Unreadable) => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("Permission denied reading {}", path.display()),
            )),
            None => Ok(None),
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
