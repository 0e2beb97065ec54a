use crate::error::Error;
use std::collections::BTreeSet;
use std::path::Path;

pub const DEFAULT_PRIMARY_EXTENSIONS: &[&str] = &[
    "crw", "cr2", "cr3", "jpg", "jpeg", "nef", "arw", "dng", "orf", "rw2", "heic", "avi", "mov",
    "mp4", "m4v", "mts", "3gp",
];

pub const DEFAULT_SIDECAR_EXTENSIONS: &[&str] = &["thm", "xmp"];

/// Role of a file, decided by its extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Gets its own date-derived destination.
    Primary,
    /// Only ever copied next to a primary file with the same stem.
    Sidecar,
    Ignored,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    primary: BTreeSet<String>,
    sidecar: BTreeSet<String>,
}

impl Classifier {
    /// Build a classifier from two extension tables. Extensions are matched
    /// case-insensitively and may be given with or without a leading dot.
    pub fn new<P, S>(primary: P, sidecar: S) -> Result<Self, Error>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let primary = normalize_table(primary)?;
        let sidecar = normalize_table(sidecar)?;

        if primary.is_empty() {
            return Err(Error::Config(
                "primary extension table is empty".to_string(),
            ));
        }

        let overlap: Vec<&str> = primary.intersection(&sidecar).map(|s| s.as_str()).collect();
        if !overlap.is_empty() {
            return Err(Error::Config(format!(
                "extensions listed as both primary and sidecar: {}",
                overlap.join(", ")
            )));
        }

        Ok(Self { primary, sidecar })
    }

    pub fn classify(&self, extension: &str) -> MediaKind {
        let ext = extension.to_lowercase();
        if self.primary.contains(&ext) {
            MediaKind::Primary
        } else if self.sidecar.contains(&ext) {
            MediaKind::Sidecar
        } else {
            MediaKind::Ignored
        }
    }

    /// Files without an extension are always `Ignored`.
    pub fn classify_path(&self, path: &Path) -> MediaKind {
        match extension_of(path) {
            Some(ext) => self.classify(&ext),
            None => MediaKind::Ignored,
        }
    }

    /// Sidecar extensions in sorted order, lowercased.
    pub fn sidecar_extensions(&self) -> impl Iterator<Item = &str> {
        self.sidecar.iter().map(|s| s.as_str())
    }

    pub fn primary_extensions(&self) -> impl Iterator<Item = &str> {
        self.primary.iter().map(|s| s.as_str())
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            primary: DEFAULT_PRIMARY_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            sidecar: DEFAULT_SIDECAR_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Case-folded extension of `path`, without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .filter(|ext| !ext.is_empty())
}

fn normalize_table<I>(exts: I) -> Result<BTreeSet<String>, Error>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut table = BTreeSet::new();
    for ext in exts {
        let normalized = ext.as_ref().trim().trim_start_matches('.').to_lowercase();
        if normalized.is_empty() {
            return Err(Error::Config(format!(
                "invalid extension '{}' in extension table",
                ext.as_ref()
            )));
        }
        table.insert(normalized);
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_is_case_insensitive() {
        let classifier = Classifier::default();
        let kinds: Vec<MediaKind> = ["IMG_0001.JPG", "img_0002.jpg", "img_0003.jpg", "Img_0004.JpG"]
            .iter()
            .map(|name| classifier.classify_path(Path::new(name)))
            .collect();
        assert!(kinds.iter().all(|k| *k == MediaKind::Primary));
    }

    #[test]
    fn test_classify_roles() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify("mov"), MediaKind::Primary);
        assert_eq!(classifier.classify("CR2"), MediaKind::Primary);
        assert_eq!(classifier.classify("THM"), MediaKind::Sidecar);
        assert_eq!(classifier.classify("txt"), MediaKind::Ignored);
    }

    #[test]
    fn test_no_extension_is_ignored() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify_path(Path::new("README")), MediaKind::Ignored);
        assert_eq!(classifier.classify_path(Path::new("trailing.")), MediaKind::Ignored);
        assert_eq!(classifier.classify_path(Path::new(".hidden")), MediaKind::Ignored);
    }

    #[test]
    fn test_custom_tables_are_normalized() {
        let classifier = Classifier::new([".PNG", "tif"], ["Xmp"]).unwrap();
        assert_eq!(classifier.classify("png"), MediaKind::Primary);
        assert_eq!(classifier.classify("TIF"), MediaKind::Primary);
        assert_eq!(classifier.classify("xmp"), MediaKind::Sidecar);
        assert_eq!(classifier.classify("jpg"), MediaKind::Ignored);
    }

    #[test]
    fn test_overlapping_tables_rejected() {
        let err = Classifier::new(["jpg", "mov"], ["THM", "JPG"]).unwrap_err();
        match err {
            Error::Config(msg) => assert!(msg.contains("jpg"), "unexpected message: {}", msg),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_tables_rejected() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            Classifier::new(empty, ["thm"]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Classifier::new(["jpg", "."], ["thm"]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_sidecar_table_may_be_empty() {
        let empty: [&str; 0] = [];
        let classifier = Classifier::new(["jpg"], empty).unwrap();
        assert_eq!(classifier.sidecar_extensions().count(), 0);
        assert_eq!(classifier.classify("thm"), MediaKind::Ignored);
    }
}
