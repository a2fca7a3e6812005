/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Turning a path into an ordered list of sources
//!
//! A path is either a single file with a registered extension, or a directory
//! whose immediate children with registered extensions are the sources.
//! Directory contents are sorted by their path string so the same directory
//! always stacks in the same order.
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, trace};

use crate::errors::StackErrors;
use crate::registry::CodecRegistry;

/// One loadable unit, a file path
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct SourceLocator {
    path: PathBuf
}

impl SourceLocator {
    pub fn new<P: Into<PathBuf>>(path: P) -> SourceLocator {
        SourceLocator { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole source into memory
    ///
    /// The file is opened and closed within this call
    pub fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }
}

impl Display for SourceLocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl From<&Path> for SourceLocator {
    fn from(value: &Path) -> Self {
        SourceLocator::new(value)
    }
}

/// Decides what a path stands for
#[derive(Clone, Debug)]
pub struct SourceEnumerator {
    registry: Arc<CodecRegistry>
}

impl SourceEnumerator {
    pub fn new(registry: Arc<CodecRegistry>) -> SourceEnumerator {
        SourceEnumerator { registry }
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    /// Enumerate the sources a single path denotes
    ///
    /// - A file with a registered extension is its own single source, it
    ///   is not opened here so a missing file only fails once it's decoded.
    /// - A directory yields its recognized immediate children, sorted by path.
    ///   Other files in it are skipped.
    ///
    /// # Errors
    /// - [`StackErrors::UnsupportedFormat`] if the path isn't recognized
    /// - [`StackErrors::EmptyDirectory`] if a directory has no recognized files
    /// - [`StackErrors::IoErrors`] if a directory cannot be listed
    ///
    /// The first two are declines, see [`StackErrors::is_decline`]
    pub fn enumerate<P: AsRef<Path>>(&self, path: P) -> Result<Vec<SourceLocator>, StackErrors> {
        let path = path.as_ref();

        if path.is_dir() {
            return self.enumerate_directory(path);
        }
        if self.registry.is_supported(path) {
            trace!("{:?} is a single source", path);
            return Ok(vec![SourceLocator::new(path)]);
        }
        debug!("Declining {:?}, extension not registered", path);
        Err(StackErrors::UnsupportedFormat(path.to_path_buf()))
    }

    /// Enumerate the sources of a list of paths
    ///
    /// A single path behaves like [`enumerate`](Self::enumerate). Several paths
    /// are taken as files to stack in the order given, each must have a registered
    /// extension.
    pub fn enumerate_paths<P: AsRef<Path>>(
        &self, paths: &[P]
    ) -> Result<Vec<SourceLocator>, StackErrors> {
        match paths {
            [] => Err(StackErrors::UnsupportedFormat(PathBuf::new())),
            [single] => self.enumerate(single),
            many => {
                let mut sources = Vec::with_capacity(many.len());

                for path in many {
                    let path = path.as_ref();

                    if path.is_dir() || !self.registry.is_supported(path) {
                        debug!("Declining list, {:?} is not a supported file", path);
                        return Err(StackErrors::UnsupportedFormat(path.to_path_buf()));
                    }
                    sources.push(SourceLocator::new(path));
                }
                Ok(sources)
            }
        }
    }

    fn enumerate_directory(&self, directory: &Path) -> Result<Vec<SourceLocator>, StackErrors> {
        let mut sources = vec![];
        let mut skipped = 0_usize;

        for entry in std::fs::read_dir(directory)? {
            let path = entry?.path();

            if !path.is_file() {
                continue;
            }
            if self.registry.is_supported(&path) {
                sources.push(SourceLocator::new(path));
            } else {
                skipped += 1;
            }
        }
        trace!("Skipped {} unrecognized files in {:?}", skipped, directory);

        if sources.is_empty() {
            debug!("Declining {:?}, no recognized files", directory);
            return Err(StackErrors::EmptyDirectory(directory.to_path_buf()));
        }
        sources.sort_by(|a, b| {
            a.path
                .to_string_lossy()
                .cmp(&b.path.to_string_lossy())
        });
        debug!("Found {} sources in {:?}", sources.len(), directory);

        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use crate::enumerate::{SourceEnumerator, SourceLocator};
    use crate::errors::StackErrors;
    use crate::registry::CodecRegistry;

    fn enumerator() -> SourceEnumerator {
        SourceEnumerator::new(Arc::new(CodecRegistry::new()))
    }

    fn names(sources: &[SourceLocator]) -> Vec<String> {
        sources
            .iter()
            .map(|x| x.path().file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_directory_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.jls", "a.jls", "c.jls"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let sources = enumerator().enumerate(dir.path()).unwrap();
        assert_eq!(names(&sources), vec!["a.jls", "b.jls", "c.jls"]);
    }

    #[test]
    fn test_directory_skips_unrecognized_and_nested() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.txt"), b"").unwrap();
        fs::write(dir.path().join("IMG.JXL"), b"").unwrap();
        fs::write(dir.path().join("data.npy"), b"").unwrap();
        fs::create_dir(dir.path().join("nested.npy")).unwrap();
        fs::write(dir.path().join("nested.npy").join("inner.npy"), b"").unwrap();

        let sources = enumerator().enumerate(dir.path()).unwrap();
        assert_eq!(names(&sources), vec!["IMG.JXL", "data.npy"]);
    }

    #[test]
    fn test_unsupported_inputs_decline() {
        let err = enumerator().enumerate("notes.txt").unwrap_err();
        assert!(err.is_decline());
        assert!(matches!(err, StackErrors::UnsupportedFormat(_)));

        let dir = tempfile::tempdir().unwrap();
        let err = enumerator().enumerate(dir.path()).unwrap_err();
        assert!(err.is_decline());
        assert!(matches!(err, StackErrors::EmptyDirectory(_)));

        fs::write(dir.path().join("notes.txt"), b"").unwrap();
        assert!(enumerator().enumerate(dir.path()).unwrap_err().is_decline());
    }

    #[test]
    fn test_single_file_is_not_opened() {
        let sources = enumerator().enumerate("/does/not/exist/frame.Jxl").unwrap();
        assert_eq!(sources, vec![SourceLocator::new("/does/not/exist/frame.Jxl")]);
    }

    #[test]
    fn test_path_lists_keep_their_order() {
        let paths = [Path::new("z.npy"), Path::new("a.jls")];
        let sources = enumerator().enumerate_paths(&paths).unwrap();
        assert_eq!(names(&sources), vec!["z.npy", "a.jls"]);

        let paths = [Path::new("z.npy"), Path::new("a.png")];
        assert!(enumerator().enumerate_paths(&paths).unwrap_err().is_decline());

        let empty: [&Path; 0] = [];
        assert!(enumerator().enumerate_paths(&empty).unwrap_err().is_decline());
    }
}
