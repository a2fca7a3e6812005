/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! zune-stack
//!
//! Read files and directories of images into arrays, and write arrays back.
//!
//! A directory of equally shaped images loads as one array whose leading axis
//! indexes the files in path order. Only the first file is decoded up front,
//! the rest are decoded when their part of the array is asked for.
//!
//! Supported formats
//!
//!| Format          | Extension | Feature  | Writes                              |
//!|-----------------|-----------|----------|-------------------------------------|
//!| NumPy snapshot  | `npy`     | -        | every element type                  |
//!| JPEG-LS         | `jls`     | jpeg-ls  | `uint8`, other types are down-cast  |
//!| JPEG-XL         | `jxl`     | jpeg-xl  | `uint8`, other types are down-cast  |
//!
//! The `threads` feature (on by default) materializes stacks in parallel.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use zune_stack::registry::CodecRegistry;
//! use zune_stack::reader::ImageReader;
//! use zune_stack::writer::FormatWriter;
//!
//! let registry = Arc::new(CodecRegistry::new());
//!
//! let reader = ImageReader::new(registry.clone());
//! // None means the reader doesn't handle this path
//! if reader.probe(&["frames/"]).unwrap().is_some() {
//!     let layers = reader.read(&["frames/"]).unwrap();
//!     println!("Loaded {:?}", layers[0].data.shape());
//!
//!     let writer = FormatWriter::new(registry);
//!     let written = writer.write_multiple("out.jxl", &layers).unwrap();
//!     println!("Wrote {:?}", written);
//! }
//! ```
//!
//! The library logs through the [`log`] facade and never installs a logger.
#![warn(clippy::correctness, clippy::perf)]
#![allow(clippy::module_name_repetitions, clippy::doc_markdown)]

pub mod array;
pub mod codecs;
pub mod enumerate;
pub mod errors;
pub mod lazy;
pub mod options;
pub mod reader;
pub mod registry;
pub mod stack;
pub mod writer;

pub use crate::array::{ArrayDescriptor, ElementType, NdArray};
pub use crate::errors::StackErrors;
pub use crate::reader::{ImageReader, Layer, LayerKind};
pub use crate::registry::CodecRegistry;
pub use crate::stack::ImageData;
pub use crate::writer::FormatWriter;
