/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Errors possible during loading, stacking and writing
use std::fmt::{Debug, Display, Formatter};
use std::path::PathBuf;

use crate::array::{ArrayDescriptor, ElementType};
use crate::codecs::ImageFormat;
use crate::enumerate::SourceLocator;

/// Errors raised when constructing or combining arrays
pub enum ArrayErrors {
    /// Buffer length disagrees with shape and element type.
    /// (expected, found)
    LengthMismatch(usize, usize),
    /// The shape describes more bytes than a `usize` can count
    TooLarge(Vec<usize>),
    /// Typed access with the wrong type (requested, stored)
    DifferentType(ElementType, ElementType),
    /// Arrays that were expected to agree don't (expected, found)
    DescriptorMismatch(ArrayDescriptor, ArrayDescriptor),
    /// Stacking zero arrays
    EmptyStack
}

impl Debug for ArrayErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrayErrors::LengthMismatch(expected, found) => {
                writeln!(
                    f,
                    "Array buffer has {found} bytes but its shape needs {expected}"
                )
            }
            ArrayErrors::TooLarge(shape) => {
                writeln!(f, "Array of shape {shape:?} is too large to be addressed")
            }
            ArrayErrors::DifferentType(requested, stored) => {
                writeln!(
                    f,
                    "Requested elements as {requested} but the array stores {stored}"
                )
            }
            ArrayErrors::DescriptorMismatch(expected, found) => {
                writeln!(f, "Expected an array of {expected} but found {found}")
            }
            ArrayErrors::EmptyStack => writeln!(f, "Cannot stack zero arrays")
        }
    }
}

/// Errors from a codec while decoding or encoding
pub enum CodecErrors {
    /// The format is known but its codec wasn't compiled in
    CodecNotIncluded(ImageFormat),
    /// Malformed or truncated input
    InvalidData(String),
    /// The codec cannot store this element type (found, supported)
    UnsupportedType(ElementType, &'static [ElementType]),
    /// The codec cannot store an array of this shape
    UnsupportedShape(Vec<usize>),
    ArrayErrors(ArrayErrors),
    IoErrors(std::io::Error),
    /// Error coming from an underlying codec library
    Backend(String)
}

impl Debug for CodecErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecErrors::CodecNotIncluded(format) => {
                writeln!(
                    f,
                    "The codec for {format:?} is not included, enable its feature to use it"
                )
            }
            CodecErrors::InvalidData(reason) => writeln!(f, "Invalid data: {reason}"),
            CodecErrors::UnsupportedType(found, supported) => {
                writeln!(
                    f,
                    "Element type {found} is not supported, supported types are {supported:?}"
                )
            }
            CodecErrors::UnsupportedShape(shape) => {
                writeln!(f, "Arrays of shape {shape:?} are not supported")
            }
            CodecErrors::ArrayErrors(err) => writeln!(f, "{err:?}"),
            CodecErrors::IoErrors(err) => writeln!(f, "I/O error: {err}"),
            CodecErrors::Backend(reason) => writeln!(f, "{reason}")
        }
    }
}

impl From<std::io::Error> for CodecErrors {
    fn from(value: std::io::Error) -> Self {
        CodecErrors::IoErrors(value)
    }
}

impl From<ArrayErrors> for CodecErrors {
    fn from(value: ArrayErrors) -> Self {
        CodecErrors::ArrayErrors(value)
    }
}

/// All errors the crate can return
///
/// [`UnsupportedFormat`](Self::UnsupportedFormat) and
/// [`EmptyDirectory`](Self::EmptyDirectory) are not failures as much as a
/// polite decline, see [`is_decline`](Self::is_decline).
pub enum StackErrors {
    /// The path isn't something any registered codec understands
    UnsupportedFormat(PathBuf),
    /// A directory with no recognized files in it
    EmptyDirectory(PathBuf),
    /// A source failed to decode when it was materialized
    DecodeErrors {
        locator: SourceLocator,
        cause:   CodecErrors
    },
    /// A source decoded fine but disagrees with the first source of its batch
    ShapeMismatch {
        locator:  SourceLocator,
        expected: ArrayDescriptor,
        actual:   ArrayDescriptor
    },
    /// The parent directory of a write destination doesn't exist
    MissingDestination(PathBuf),
    /// A codec refused to encode an array
    EncodeErrors {
        path:  PathBuf,
        cause: CodecErrors
    },
    ArrayErrors(ArrayErrors),
    IoErrors(std::io::Error),
    Generic(String)
}

impl StackErrors {
    /// Whether this is a "not mine to handle" signal rather than a failure
    ///
    /// Callers use it to move on to another handler instead of reporting an error.
    pub const fn is_decline(&self) -> bool {
        matches!(
            self,
            StackErrors::UnsupportedFormat(_) | StackErrors::EmptyDirectory(_)
        )
    }
}

impl Debug for StackErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StackErrors::UnsupportedFormat(path) => {
                writeln!(f, "Unsupported format for {path:?}")
            }
            StackErrors::EmptyDirectory(path) => {
                writeln!(f, "No supported files found in directory {path:?}")
            }
            StackErrors::DecodeErrors { locator, cause } => {
                writeln!(f, "Could not decode {locator}: {cause:?}")
            }
            StackErrors::ShapeMismatch {
                locator,
                expected,
                actual
            } => {
                writeln!(
                    f,
                    "{locator} does not match the first file of the batch, expected {expected} but found {actual}"
                )
            }
            StackErrors::MissingDestination(path) => {
                writeln!(f, "Destination directory {path:?} does not exist")
            }
            StackErrors::EncodeErrors { path, cause } => {
                writeln!(f, "Could not encode {path:?}: {cause:?}")
            }
            StackErrors::ArrayErrors(err) => writeln!(f, "{err:?}"),
            StackErrors::IoErrors(err) => writeln!(f, "I/O error: {err}"),
            StackErrors::Generic(reason) => writeln!(f, "{reason}")
        }
    }
}

impl From<std::io::Error> for StackErrors {
    fn from(value: std::io::Error) -> Self {
        StackErrors::IoErrors(value)
    }
}

impl From<ArrayErrors> for StackErrors {
    fn from(value: ArrayErrors) -> Self {
        StackErrors::ArrayErrors(value)
    }
}

impl From<String> for StackErrors {
    fn from(value: String) -> Self {
        StackErrors::Generic(value)
    }
}

macro_rules! display_from_debug {
    ($($name:ty),*) => {
        $(
            impl Display for $name {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{:?}", self)
                }
            }
        )*
    };
}

display_from_debug!(ArrayErrors, CodecErrors, StackErrors);

impl std::error::Error for ArrayErrors {}

impl std::error::Error for CodecErrors {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CodecErrors::IoErrors(err) => Some(err),
            CodecErrors::ArrayErrors(err) => Some(err),
            _ => None
        }
    }
}

impl std::error::Error for StackErrors {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StackErrors::DecodeErrors { cause, .. } | StackErrors::EncodeErrors { cause, .. } => {
                Some(cause)
            }
            StackErrors::ArrayErrors(err) => Some(err),
            StackErrors::IoErrors(err) => Some(err),
            _ => None
        }
    }
}
