/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Extension to codec configuration
//!
//! Nothing in the crate keeps a global list of formats, the loader and the writer
//! are handed a [`CodecRegistry`] when they are built and only ever consult that.
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::Arc;

use crate::array::ElementType;
use crate::codecs::{CodecTrait, ImageFormat};

/// One registered format
#[derive(Clone)]
pub struct FormatEntry {
    extension:   String,
    format:      ImageFormat,
    codec:       Arc<dyn CodecTrait>,
    write_types: Vec<ElementType>
}

impl FormatEntry {
    /// Create a new entry
    ///
    /// # Arguments
    /// - extension: File extension without the dot, matched ignoring ASCII case
    /// - codec: The codec files with this extension are decoded and encoded with
    /// - write_types: Element types the writer may hand to the codec as is,
    ///   anything else is down-cast to `uint8` first
    pub fn new(
        extension: &str, codec: Arc<dyn CodecTrait>, write_types: &[ElementType]
    ) -> FormatEntry {
        FormatEntry {
            extension: extension.trim_start_matches('.').to_ascii_lowercase(),
            format: codec.format(),
            codec,
            write_types: write_types.to_vec()
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub const fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn codec(&self) -> &Arc<dyn CodecTrait> {
        &self.codec
    }

    /// Whether arrays of this type are written without conversion
    pub fn accepts(&self, element_type: ElementType) -> bool {
        self.write_types.contains(&element_type)
    }
}

impl Debug for FormatEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatEntry")
            .field("extension", &self.extension)
            .field("format", &self.format)
            .field("codec", &self.codec.name())
            .field("write_types", &self.write_types)
            .finish()
    }
}

/// Runtime codec registry
///
/// Maps file extensions to codecs, and names the snapshot format that
/// unrecognized write destinations fall back to.
#[derive(Clone, Debug)]
pub struct CodecRegistry {
    entries:  Vec<FormatEntry>,
    snapshot: String
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistry {
    /// The default set: `npy`, `jls` and `jxl`
    ///
    /// Snapshots accept every element type, the two image formats only `uint8`.
    pub fn new() -> CodecRegistry {
        CodecRegistry::empty()
            .with_entry(FormatEntry::new(
                ImageFormat::NPY.default_extension(),
                ImageFormat::NPY.codec(),
                &ElementType::ALL
            ))
            .with_entry(FormatEntry::new(
                ImageFormat::JPEG_LS.default_extension(),
                ImageFormat::JPEG_LS.codec(),
                &[ElementType::U8]
            ))
            .with_entry(FormatEntry::new(
                ImageFormat::JPEG_XL.default_extension(),
                ImageFormat::JPEG_XL.codec(),
                &[ElementType::U8]
            ))
    }

    /// A registry that recognizes nothing but still knows
    /// the `npy` extension is the snapshot format
    ///
    /// The snapshot extension must be registered before writing
    /// to an unrecognized destination.
    pub fn empty() -> CodecRegistry {
        CodecRegistry {
            entries:  vec![],
            snapshot: ImageFormat::NPY.default_extension().to_string()
        }
    }

    /// Add an entry, replacing any entry with the same extension
    pub fn with_entry(mut self, entry: FormatEntry) -> Self {
        self.entries.retain(|x| x.extension != entry.extension);
        self.entries.push(entry);
        self
    }

    /// Stop recognizing an extension
    pub fn without_extension(mut self, extension: &str) -> Self {
        self.entries
            .retain(|x| !x.extension.eq_ignore_ascii_case(extension));
        self
    }

    /// Set which registered extension unrecognized destinations are written as
    pub fn with_snapshot_extension(mut self, extension: &str) -> Self {
        self.snapshot = extension.trim_start_matches('.').to_ascii_lowercase();
        self
    }

    /// Find the entry for an extension, ignoring ASCII case
    pub fn lookup(&self, extension: &str) -> Option<&FormatEntry> {
        self.entries
            .iter()
            .find(|x| x.extension.eq_ignore_ascii_case(extension))
    }

    /// Find the entry for the extension of a path
    pub fn lookup_path(&self, path: &Path) -> Option<&FormatEntry> {
        let extension = path.extension()?.to_str()?;
        self.lookup(extension)
    }

    /// Whether the path carries a registered extension
    pub fn is_supported(&self, path: &Path) -> bool {
        self.lookup_path(path).is_some()
    }

    /// The extension of the snapshot format
    pub fn snapshot_extension(&self) -> &str {
        &self.snapshot
    }

    /// The entry of the snapshot format, if registered
    pub fn snapshot(&self) -> Option<&FormatEntry> {
        self.lookup(&self.snapshot)
    }

    /// All registered extensions, in registration order
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|x| x.extension.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use crate::array::ElementType;
    use crate::codecs::ImageFormat;
    use crate::registry::{CodecRegistry, FormatEntry};

    #[test]
    fn test_default_registry() {
        let registry = CodecRegistry::new();
        let extensions: Vec<&str> = registry.extensions().collect();
        assert_eq!(extensions, vec!["npy", "jls", "jxl"]);

        assert_eq!(registry.snapshot().unwrap().format(), ImageFormat::NPY);
        assert!(registry.lookup("jls").unwrap().accepts(ElementType::U8));
        assert!(!registry.lookup("jxl").unwrap().accepts(ElementType::F64));
        assert!(registry.lookup("npy").unwrap().accepts(ElementType::F64));
    }

    #[test]
    fn test_lookup_ignores_case() {
        let registry = CodecRegistry::new();
        assert!(registry.is_supported(Path::new("/data/IMAGE.JXL")));
        assert!(registry.is_supported(Path::new("a.Npy")));
        assert!(!registry.is_supported(Path::new("notes.txt")));
        assert!(!registry.is_supported(Path::new("no_extension")));
    }

    #[test]
    fn test_entries_replace_and_remove() {
        let registry = CodecRegistry::new()
            .with_entry(FormatEntry::new(
                ".JXL",
                ImageFormat::NPY.codec(),
                &[ElementType::U16]
            ))
            .without_extension("jls");

        assert_eq!(registry.extensions().count(), 2);
        let entry = registry.lookup("jxl").unwrap();
        assert_eq!(entry.format(), ImageFormat::NPY);
        assert!(entry.accepts(ElementType::U16));
        assert!(registry.lookup("jls").is_none());
    }
}
