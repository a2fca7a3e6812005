/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Entry point for all codecs the library can delegate to
//!
//! Each codec turns bytes into an [`NdArray`] and back, and nothing more,
//! the rest of the crate only talks to codecs through [`CodecTrait`].
//!
//! The snapshot (`.npy`) codec is always present, the image codecs can be enabled
//! and disabled via features.
//!
//!| Feature  | Decoder     | Encoder     |
//!|----------|-------------|-------------|
//!| -        | npy         | npy         |
//!| jpeg-ls  | [charls]    | [charls]    |
//!| jpeg-xl  | [jxl-oxide] | zune-jpegxl |
//!
//! A format whose feature is disabled is still recognized, but its codec returns
//! [`CodecErrors::CodecNotIncluded`] for every call.
//!
//! [charls]: https://crates.io/crates/charls
//! [jxl-oxide]: https://crates.io/crates/jxl-oxide
use std::sync::Arc;

use crate::array::{ElementType, NdArray};
use crate::errors::CodecErrors;

pub mod jpeg_ls;
pub mod jpeg_xl;
pub mod npy;

/// All supported formats
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
#[allow(non_camel_case_types)]
#[non_exhaustive]
pub enum ImageFormat {
    /// Raw array snapshot in NumPy's `.npy` layout
    NPY,
    /// Lossless JPEG-LS
    JPEG_LS,
    /// JPEG XL
    JPEG_XL
}

impl ImageFormat {
    /// The extension files of this format are written with
    pub const fn default_extension(self) -> &'static str {
        match self {
            ImageFormat::NPY => "npy",
            ImageFormat::JPEG_LS => "jls",
            ImageFormat::JPEG_XL => "jxl"
        }
    }

    /// Whether the codec for this format was compiled in
    pub const fn is_included(self) -> bool {
        match self {
            ImageFormat::NPY => true,
            ImageFormat::JPEG_LS => cfg!(feature = "jpeg-ls"),
            ImageFormat::JPEG_XL => cfg!(feature = "jpeg-xl")
        }
    }

    /// Find the format whose default extension is `extension`,
    /// ignoring ASCII case
    pub fn from_extension(extension: &str) -> Option<ImageFormat> {
        [ImageFormat::NPY, ImageFormat::JPEG_LS, ImageFormat::JPEG_XL]
            .into_iter()
            .find(|format| format.default_extension().eq_ignore_ascii_case(extension))
    }

    /// The built in codec for this format
    ///
    /// If the codec's feature isn't enabled, this returns a codec that
    /// fails every call with [`CodecErrors::CodecNotIncluded`]
    pub fn codec(self) -> Arc<dyn CodecTrait> {
        match self {
            ImageFormat::NPY => Arc::new(npy::NpyCodec::new()),
            ImageFormat::JPEG_LS => {
                #[cfg(feature = "jpeg-ls")]
                {
                    Arc::new(jpeg_ls::JpegLsCodec::new())
                }
                #[cfg(not(feature = "jpeg-ls"))]
                {
                    Arc::new(MissingCodec(self))
                }
            }
            ImageFormat::JPEG_XL => {
                #[cfg(feature = "jpeg-xl")]
                {
                    Arc::new(jpeg_xl::JxlCodec::new())
                }
                #[cfg(not(feature = "jpeg-xl"))]
                {
                    Arc::new(MissingCodec(self))
                }
            }
        }
    }
}

/// The codec gateway
///
/// Implementations must be pure with respect to their input, the same bytes
/// always decode to the same array, since the lazy loader may call `decode`
/// again after a failure and from any thread.
pub trait CodecTrait: Send + Sync {
    /// Name of the codec, used in logs
    fn name(&self) -> &'static str;

    fn format(&self) -> ImageFormat;

    /// Decode a complete encoded buffer into an array
    fn decode(&self, data: &[u8]) -> Result<NdArray, CodecErrors>;

    /// Encode an array into a complete encoded buffer
    fn encode(&self, array: &NdArray) -> Result<Vec<u8>, CodecErrors>;

    /// Element types `encode` accepts
    fn supported_types(&self) -> &'static [ElementType];
}

/// Stand in for a codec whose feature is disabled
#[allow(dead_code)]
struct MissingCodec(ImageFormat);

impl CodecTrait for MissingCodec {
    fn name(&self) -> &'static str {
        "missing-codec"
    }

    fn format(&self) -> ImageFormat {
        self.0
    }

    fn decode(&self, _: &[u8]) -> Result<NdArray, CodecErrors> {
        Err(CodecErrors::CodecNotIncluded(self.0))
    }

    fn encode(&self, _: &NdArray) -> Result<Vec<u8>, CodecErrors> {
        Err(CodecErrors::CodecNotIncluded(self.0))
    }

    fn supported_types(&self) -> &'static [ElementType] {
        &[]
    }
}

/// Work out the channel layout of an image shaped array
///
/// `(H, W)` is one component, `(H, W, C)` is `C` interleaved components.
/// Returns `(width, height, components)`
pub(crate) fn image_layout(shape: &[usize]) -> Result<(usize, usize, usize), CodecErrors> {
    match *shape {
        [height, width] => Ok((width, height, 1)),
        [height, width, components] => Ok((width, height, components)),
        _ => Err(CodecErrors::UnsupportedShape(shape.to_vec()))
    }
}

/// The inverse of [`image_layout`]
pub(crate) fn image_shape(width: usize, height: usize, components: usize) -> Vec<usize> {
    if components == 1 {
        vec![height, width]
    } else {
        vec![height, width, components]
    }
}

#[cfg(test)]
mod tests {
    use crate::codecs::{image_layout, image_shape, ImageFormat};

    #[test]
    fn test_extension_lookup_ignores_case() {
        assert_eq!(ImageFormat::from_extension("JXL"), Some(ImageFormat::JPEG_XL));
        assert_eq!(ImageFormat::from_extension("Npy"), Some(ImageFormat::NPY));
        assert_eq!(ImageFormat::from_extension("png"), None);
    }

    #[test]
    fn test_image_layout() {
        assert_eq!(image_layout(&[4, 5]).unwrap(), (5, 4, 1));
        assert_eq!(image_layout(&[4, 5, 3]).unwrap(), (5, 4, 3));
        assert!(image_layout(&[4]).is_err());
        assert_eq!(image_shape(5, 4, 1), vec![4, 5]);
        assert_eq!(image_shape(5, 4, 3), vec![4, 5, 3]);
    }

    #[test]
    fn test_snapshot_codec_is_always_included() {
        assert!(ImageFormat::NPY.is_included());
        assert_eq!(ImageFormat::NPY.codec().format(), ImageFormat::NPY);
    }
}
