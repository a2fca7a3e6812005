/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Writing arrays and layers to files
//!
//! The codec is picked from the destination's extension. Formats that only
//! take some element types get other arrays down-cast to `uint8` first,
//! see [`NdArray::to_u8`]. Destinations with an unrecognized extension are
//! written in the snapshot format.
//!
//! Several layers written to `dir/name.ext` end up in
//! `dir/name_layer_0.ext`, `dir/name_layer_1.ext` and so on.
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{trace, warn};

use crate::array::NdArray;
use crate::errors::StackErrors;
use crate::reader::Layer;
use crate::registry::{CodecRegistry, FormatEntry};
use crate::stack::ImageData;

/// Writes arrays with the codecs of a registry
#[derive(Clone, Debug)]
pub struct FormatWriter {
    registry: Arc<CodecRegistry>
}

impl FormatWriter {
    pub fn new(registry: Arc<CodecRegistry>) -> FormatWriter {
        FormatWriter { registry }
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    /// Write data to `path`, stacks are materialized first
    ///
    /// Returns the paths written, which is `path` itself.
    ///
    /// # Errors
    /// - [`StackErrors::MissingDestination`] if the parent directory doesn't exist
    /// - [`StackErrors::UnsupportedFormat`] if the extension isn't recognized
    ///   and the snapshot format isn't registered
    /// - Materialization, encoding and I/O failures
    pub fn write<P: AsRef<Path>>(
        &self, path: P, data: &ImageData
    ) -> Result<Vec<PathBuf>, StackErrors> {
        let path = path.as_ref();
        check_destination(path)?;

        let entry = self.entry_for(path)?;
        let array = data.compute()?;
        save(path, entry, &array)?;

        Ok(vec![path.to_path_buf()])
    }

    /// Write an in-memory array to `path`, see [`write`](Self::write)
    pub fn write_array<P: AsRef<Path>>(
        &self, path: P, array: &NdArray
    ) -> Result<Vec<PathBuf>, StackErrors> {
        let path = path.as_ref();
        check_destination(path)?;

        save(path, self.entry_for(path)?, array)?;

        Ok(vec![path.to_path_buf()])
    }

    /// Write every layer, returning the paths written in layer order
    ///
    /// A single layer with a registered extension goes to `path` as is.
    /// Otherwise layer `i` goes to `<stem>_layer_<i>.<ext>` next to `path`,
    /// where `ext` is the extension of `path` if it's recognized and the
    /// snapshot extension if not.
    ///
    /// Layer metadata and kinds are not written.
    pub fn write_multiple<P: AsRef<Path>>(
        &self, path: P, layers: &[Layer]
    ) -> Result<Vec<PathBuf>, StackErrors> {
        let path = path.as_ref();

        // a single layer keeps its path only if the extension is registered
        if let [layer] = layers {
            if self.registry.is_supported(path) {
                return self.write(path, &layer.data);
            }
        }
        check_destination(path)?;

        let mut written = Vec::with_capacity(layers.len());

        for (index, layer) in layers.iter().enumerate() {
            let (destination, entry) = self.layer_destination(path, index)?;
            let array = layer.data.compute()?;

            save(&destination, entry, &array)?;
            written.push(destination);
        }
        Ok(written)
    }

    fn entry_for(&self, path: &Path) -> Result<&FormatEntry, StackErrors> {
        match self.registry.lookup_path(path) {
            Some(entry) => Ok(entry),
            None => self.snapshot_entry(path)
        }
    }

    fn snapshot_entry(&self, path: &Path) -> Result<&FormatEntry, StackErrors> {
        trace!("No codec for {:?}, writing a snapshot", path);
        self.registry
            .snapshot()
            .ok_or_else(|| StackErrors::UnsupportedFormat(path.to_path_buf()))
    }

    fn layer_destination(
        &self, path: &Path, index: usize
    ) -> Result<(PathBuf, &FormatEntry), StackErrors> {
        let stem = path
            .file_stem()
            .map(|x| x.to_string_lossy().into_owned())
            .unwrap_or_default();

        let requested = path.extension().and_then(|x| x.to_str());

        let (extension, entry) =
            match requested.and_then(|ext| self.registry.lookup(ext).map(|entry| (ext, entry))) {
                Some((extension, entry)) => (extension.to_string(), entry),
                None => (
                    self.registry.snapshot_extension().to_string(),
                    self.snapshot_entry(path)?
                )
            };
        let name = format!("{stem}_layer_{index}.{extension}");

        Ok((path.with_file_name(name), entry))
    }
}

/// Files are created but directories never are
fn check_destination(path: &Path) -> Result<(), StackErrors> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(StackErrors::MissingDestination(parent.to_path_buf()));
        }
    }
    Ok(())
}

fn save(path: &Path, entry: &FormatEntry, array: &NdArray) -> Result<(), StackErrors> {
    let converted;

    let array = if entry.accepts(array.element_type()) {
        array
    } else {
        warn!(
            "{} does not store {} arrays, {:?} will be written as uint8",
            entry.codec().name(),
            array.element_type(),
            path
        );
        converted = array.to_u8();
        &converted
    };
    trace!("Encoding {} array to {:?}", array.descriptor(), path);

    let encoded = entry
        .codec()
        .encode(array)
        .map_err(|cause| StackErrors::EncodeErrors {
            path: path.to_path_buf(),
            cause
        })?;

    let mut file = BufWriter::new(
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?
    );
    file.write_all(&encoded)?;
    file.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use crate::array::{ElementType, NdArray};
    use crate::codecs::npy::{decode_npy, encode_npy};
    use crate::codecs::{CodecTrait, ImageFormat};
    use crate::errors::{CodecErrors, StackErrors};
    use crate::reader::{Layer, LayerKind};
    use crate::registry::{CodecRegistry, FormatEntry};
    use crate::writer::FormatWriter;

    /// Stores `uint8` arrays as snapshots under a JPEG-LS name
    struct ByteCodec;

    impl CodecTrait for ByteCodec {
        fn name(&self) -> &'static str {
            "bytes"
        }

        fn format(&self) -> ImageFormat {
            ImageFormat::JPEG_LS
        }

        fn decode(&self, data: &[u8]) -> Result<NdArray, CodecErrors> {
            decode_npy(data)
        }

        fn encode(&self, array: &NdArray) -> Result<Vec<u8>, CodecErrors> {
            if array.element_type() != ElementType::U8 {
                return Err(CodecErrors::UnsupportedType(
                    array.element_type(),
                    self.supported_types()
                ));
            }
            Ok(encode_npy(array))
        }

        fn supported_types(&self) -> &'static [ElementType] {
            &[ElementType::U8]
        }
    }

    fn writer() -> FormatWriter {
        let registry = CodecRegistry::new().with_entry(FormatEntry::new(
            "jls",
            Arc::new(ByteCodec),
            &[ElementType::U8]
        ));
        FormatWriter::new(Arc::new(registry))
    }

    fn layers(count: usize) -> Vec<Layer> {
        (0..count)
            .map(|i| {
                let array = NdArray::from_vec(vec![2], vec![i as f32 + 0.5, 300.0]).unwrap();
                Layer::new(array, LayerKind::Image)
            })
            .collect()
    }

    fn read_back(path: &Path) -> NdArray {
        decode_npy(&fs::read(path).unwrap()).unwrap()
    }

    #[test]
    fn test_layers_get_indexed_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jls");

        let written = writer().write_multiple(&path, &layers(3)).unwrap();
        let expected: Vec<PathBuf> = (0..3)
            .map(|i| dir.path().join(format!("out_layer_{i}.jls")))
            .collect();
        assert_eq!(written, expected);

        for (i, path) in written.iter().enumerate() {
            let array = read_back(path);
            assert_eq!(array.element_type(), ElementType::U8);
            assert_eq!(array.to_vec::<u8>().unwrap(), vec![i as u8, 255]);
        }
    }

    #[test]
    fn test_single_layer_keeps_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jls");

        let written = writer().write_multiple(&path, &layers(1)).unwrap();
        assert_eq!(written, vec![path.clone()]);
        assert!(path.is_file());
    }

    #[test]
    fn test_single_unrecognized_layer_is_redirected() {
        let dir = tempfile::tempdir().unwrap();

        let written = writer()
            .write_multiple(dir.path().join("out.tiff"), &layers(1))
            .unwrap();
        assert_eq!(written, vec![dir.path().join("out_layer_0.npy")]);
        assert!(!dir.path().join("out.tiff").exists());

        let written = writer()
            .write_multiple(dir.path().join("out"), &layers(1))
            .unwrap();
        assert_eq!(written, vec![dir.path().join("out_layer_0.npy")]);
        assert_eq!(read_back(&written[0]).element_type(), ElementType::F32);
    }

    #[test]
    fn test_layers_without_extension_are_snapshots() {
        let dir = tempfile::tempdir().unwrap();

        let written = writer()
            .write_multiple(dir.path().join("out"), &layers(2))
            .unwrap();
        assert_eq!(
            written,
            vec![
                dir.path().join("out_layer_0.npy"),
                dir.path().join("out_layer_1.npy")
            ]
        );
        // snapshots take every type, nothing is converted
        assert_eq!(read_back(&written[1]).element_type(), ElementType::F32);

        let written = writer()
            .write_multiple(dir.path().join("out.tiff"), &layers(2))
            .unwrap();
        assert_eq!(written[0], dir.path().join("out_layer_0.npy"));
    }

    #[test]
    fn test_unrecognized_single_destination_is_written_literally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.tiff");
        let array = NdArray::from_vec(vec![2, 2], vec![1.5_f64, -2.0, 3.0, 4.0]).unwrap();

        let written = writer().write_array(&path, &array).unwrap();

        assert_eq!(written, vec![path.clone()]);
        assert_eq!(read_back(&path), array);
    }

    #[test]
    fn test_missing_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("out.jls");

        let err = writer().write_multiple(&path, &layers(2)).unwrap_err();
        assert!(matches!(err, StackErrors::MissingDestination(_)));
        assert!(!dir.path().join("absent").exists());
    }

    #[test]
    fn test_empty_layer_list_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let written = writer()
            .write_multiple(dir.path().join("out.jls"), &[])
            .unwrap();
        assert!(written.is_empty());
    }

    #[test]
    fn test_no_snapshot_format_registered() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FormatWriter::new(Arc::new(CodecRegistry::empty()));
        let array = NdArray::zeros(vec![2], ElementType::U8).unwrap();

        let err = writer
            .write_array(dir.path().join("out.bin"), &array)
            .unwrap_err();
        assert!(matches!(err, StackErrors::UnsupportedFormat(_)));
    }

    #[test]
    #[cfg(feature = "jpeg-xl")]
    fn test_float_to_jxl_is_down_cast() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("float.jxl");
        let array = NdArray::from_vec(vec![2, 2], vec![0.5_f64, 1.9, 300.0, -4.0]).unwrap();

        let writer = FormatWriter::new(Arc::new(CodecRegistry::new()));
        writer.write_array(&path, &array).unwrap();

        let decoded = ImageFormat::JPEG_XL
            .codec()
            .decode(&fs::read(&path).unwrap())
            .unwrap();
        assert_eq!(decoded.shape(), &[2, 2]);
        assert_eq!(decoded.to_vec::<u8>().unwrap(), vec![0, 1, 255, 0]);
    }
}
