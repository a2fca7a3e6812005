/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The loader a host application talks to
//!
//! A host first asks whether paths are handled at all with
//! [`ImageReader::probe`], then reads them into layers with
//! [`ImageReader::read`].
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use log::debug;

use crate::enumerate::{SourceEnumerator, SourceLocator};
use crate::errors::StackErrors;
use crate::lazy::{registry_decoder, DecodeFn};
use crate::options::LoadOptions;
use crate::registry::CodecRegistry;
use crate::stack::{stack, ImageData};

/// Free form key value information attached to a layer
///
/// Readers produce it empty and the writer ignores it
pub type LayerMetadata = BTreeMap<String, String>;

/// What a layer represents to the host
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub enum LayerKind {
    #[default]
    Image,
    Labels,
    /// Any other kind the host knows of
    Other(String)
}

/// Array data together with what the host needs to display it
#[derive(Debug)]
pub struct Layer {
    pub data:     ImageData,
    pub metadata: LayerMetadata,
    pub kind:     LayerKind
}

impl Layer {
    pub fn new<D: Into<ImageData>>(data: D, kind: LayerKind) -> Layer {
        Layer {
            data: data.into(),
            metadata: LayerMetadata::new(),
            kind
        }
    }

    /// An image layer with no metadata
    pub fn image<D: Into<ImageData>>(data: D) -> Layer {
        Layer::new(data, LayerKind::Image)
    }
}

/// Reads paths into image layers
#[derive(Clone)]
pub struct ImageReader {
    enumerator: SourceEnumerator,
    decode:     DecodeFn,
    options:    LoadOptions
}

impl ImageReader {
    /// Create a reader with default options
    pub fn new(registry: Arc<CodecRegistry>) -> ImageReader {
        ImageReader::new_with_options(registry, LoadOptions::default())
    }

    pub fn new_with_options(registry: Arc<CodecRegistry>, options: LoadOptions) -> ImageReader {
        ImageReader {
            decode: registry_decoder(registry.clone()),
            enumerator: SourceEnumerator::new(registry),
            options
        }
    }

    pub const fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn registry(&self) -> &CodecRegistry {
        self.enumerator.registry()
    }

    /// Find out whether `paths` can be read
    ///
    /// Returns `None` when the paths aren't something this reader handles,
    /// otherwise the sources [`read`](Self::read) would load.
    ///
    /// # Errors
    /// Only failures that aren't declines, such as an unreadable directory
    pub fn probe<P: AsRef<Path>>(
        &self, paths: &[P]
    ) -> Result<Option<Vec<SourceLocator>>, StackErrors> {
        match self.enumerator.enumerate_paths(paths) {
            Ok(sources) => Ok(Some(sources)),
            Err(err) if err.is_decline() => {
                debug!("Reader declines: {:?}", err);
                Ok(None)
            }
            Err(err) => Err(err)
        }
    }

    /// Read `paths` into a single image layer
    ///
    /// One source is decoded right away, several are stacked lazily,
    /// see [`stack`](crate::stack::stack).
    ///
    /// # Errors
    /// Declines are errors here, along with everything
    /// [`read_sources`](Self::read_sources) can return
    pub fn read<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<Layer>, StackErrors> {
        let sources = self.enumerator.enumerate_paths(paths)?;
        self.read_sources(sources)
    }

    /// Read already enumerated sources into a single image layer
    ///
    /// # Errors
    /// - More sources than [`LoadOptions::max_sources`]
    /// - The first source failing to decode
    pub fn read_sources(&self, sources: Vec<SourceLocator>) -> Result<Vec<Layer>, StackErrors> {
        if sources.len() > self.options.max_sources() {
            return Err(StackErrors::Generic(format!(
                "Too many sources, {} found but at most {} are allowed",
                sources.len(),
                self.options.max_sources()
            )));
        }
        let data = stack(sources, self.decode.clone(), self.options)?;

        Ok(vec![Layer::image(data)])
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Arc;

    use crate::array::NdArray;
    use crate::codecs::npy::encode_npy;
    use crate::errors::StackErrors;
    use crate::options::LoadOptions;
    use crate::reader::{ImageReader, LayerKind};
    use crate::registry::CodecRegistry;

    fn reader() -> ImageReader {
        ImageReader::new(Arc::new(CodecRegistry::new()))
    }

    fn write_frames(dir: &std::path::Path, count: usize) {
        for i in 0..count {
            let array = NdArray::from_vec(vec![2, 3], vec![i as u8; 6]).unwrap();
            fs::write(dir.join(format!("frame_{i}.npy")), encode_npy(&array)).unwrap();
        }
    }

    #[test]
    fn test_probe_declines_quietly() {
        let dir = tempfile::tempdir().unwrap();
        assert!(reader().probe(&[dir.path()]).unwrap().is_none());
        assert!(reader().probe(&["picture.png"]).unwrap().is_none());
    }

    #[test]
    fn test_probe_lists_sources() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 2);

        let sources = reader().probe(&[dir.path()]).unwrap().unwrap();
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn test_read_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 3);

        let layers = reader().read(&[dir.path()]).unwrap();
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].kind, LayerKind::Image);
        assert!(layers[0].metadata.is_empty());
        assert_eq!(layers[0].data.shape(), vec![3, 2, 3]);

        let computed = layers[0].data.compute().unwrap();
        assert_eq!(&computed.to_vec::<u8>().unwrap()[..7], &[0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_read_empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = reader().read(&[dir.path()]).unwrap_err();
        assert!(matches!(err, StackErrors::EmptyDirectory(_)));
    }

    #[test]
    fn test_source_limit() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 3);

        let reader = ImageReader::new_with_options(
            Arc::new(CodecRegistry::new()),
            LoadOptions::default().set_max_sources(2)
        );
        assert!(matches!(
            reader.read(&[dir.path()]).unwrap_err(),
            StackErrors::Generic(_)
        ));
    }
}
