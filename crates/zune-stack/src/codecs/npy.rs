/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Array snapshots in NumPy's `.npy` layout
//!
//! This is the format every array can be written to, whatever its shape or
//! element type, and the fallback whenever a destination isn't recognized.
//!
//! A file is laid out as
//!
//! | bytes      | contents                                        |
//! |------------|-------------------------------------------------|
//! | 6          | magic `\x93NUMPY`                               |
//! | 2          | major and minor version                         |
//! | 2 or 4     | little endian header length (4 for version 2+)  |
//! | header     | a python dict literal with `descr`, `fortran_order` and `shape` |
//! | rest       | raw element data                                |
//!
//! The decoder understands versions 1.0, 2.0 and 3.0, either byte order and
//! Fortran ordered data. The encoder always writes little endian, C ordered
//! version 1.0 files, switching to 2.0 when the header doesn't fit in 16 bits.
use log::trace;

use crate::array::{ElementType, NdArray};
use crate::codecs::{CodecTrait, ImageFormat};
use crate::errors::CodecErrors;

const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";
/// Data starts at a multiple of this many bytes
const NPY_ALIGNMENT: usize = 64;

/// The `.npy` codec
#[derive(Default, Copy, Clone, Debug)]
pub struct NpyCodec;

impl NpyCodec {
    pub fn new() -> NpyCodec {
        NpyCodec
    }
}

impl CodecTrait for NpyCodec {
    fn name(&self) -> &'static str {
        "npy"
    }

    fn format(&self) -> ImageFormat {
        ImageFormat::NPY
    }

    fn decode(&self, data: &[u8]) -> Result<NdArray, CodecErrors> {
        decode_npy(data)
    }

    fn encode(&self, array: &NdArray) -> Result<Vec<u8>, CodecErrors> {
        Ok(encode_npy(array))
    }

    fn supported_types(&self) -> &'static [ElementType] {
        &ElementType::ALL
    }
}

/// Parsed contents of a `.npy` header
#[derive(Clone, Debug, PartialEq, Eq)]
struct NpyHeader {
    element_type:  ElementType,
    big_endian:    bool,
    fortran_order: bool,
    shape:         Vec<usize>
}

/// Decode a `.npy` file held in memory
pub fn decode_npy(data: &[u8]) -> Result<NdArray, CodecErrors> {
    if data.len() < 10 || &data[..6] != NPY_MAGIC {
        return Err(CodecErrors::InvalidData("npy magic bytes not found".into()));
    }
    let major = data[6];
    let minor = data[7];

    let (header_length, header_start) = match major {
        1 => (usize::from(u16::from_le_bytes([data[8], data[9]])), 10_usize),
        2 | 3 => {
            if data.len() < 12 {
                return Err(CodecErrors::InvalidData("truncated npy preamble".into()));
            }
            let length = u32::from_le_bytes([data[8], data[9], data[10], data[11]]);
            (length as usize, 12)
        }
        _ => {
            return Err(CodecErrors::InvalidData(format!(
                "unsupported npy version {major}.{minor}"
            )));
        }
    };
    trace!("npy version {major}.{minor}, header length {header_length}");

    let data_start = header_start
        .checked_add(header_length)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| CodecErrors::InvalidData("truncated npy header".into()))?;

    let header = std::str::from_utf8(&data[header_start..data_start])
        .map_err(|_| CodecErrors::InvalidData("npy header is not valid text".into()))?;

    let header = parse_header(header)?;
    let body = &data[data_start..];

    let mut array = NdArray::new(
        header.shape.clone(),
        header.element_type,
        body.to_vec()
    )?;

    if header.big_endian != cfg!(target_endian = "big") && header.element_type.size_of() > 1 {
        array = swap_bytes(array)?;
    }
    if header.fortran_order && header.shape.len() > 1 {
        array = fortran_to_c_order(array)?;
    }
    Ok(array)
}

/// Encode an array as a `.npy` file
pub fn encode_npy(array: &NdArray) -> Vec<u8> {
    let element_type = array.element_type();

    let shape = match array.shape() {
        [] => "()".to_string(),
        [single] => format!("({single},)"),
        dims => {
            let dims: Vec<String> = dims.iter().map(|x| x.to_string()).collect();
            format!("({})", dims.join(", "))
        }
    };
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        descr(element_type),
        shape
    );
    // header ends in a newline, padded with spaces so data starts aligned
    let padding = |preamble: usize| {
        let unpadded = preamble + header.len() + 1;
        (NPY_ALIGNMENT - unpadded % NPY_ALIGNMENT) % NPY_ALIGNMENT
    };
    let preamble = if header.len() + 1 + padding(10) > usize::from(u16::MAX) {
        12
    } else {
        10
    };
    let padding = padding(preamble);
    header.extend(std::iter::repeat(' ').take(padding));
    header.push('\n');

    let mut output = Vec::with_capacity(preamble + header.len() + array.as_bytes().len());
    output.extend_from_slice(NPY_MAGIC);

    if preamble == 10 {
        output.extend_from_slice(&[1, 0]);
        output.extend_from_slice(&(header.len() as u16).to_le_bytes());
    } else {
        output.extend_from_slice(&[2, 0]);
        output.extend_from_slice(&(header.len() as u32).to_le_bytes());
    }
    output.extend_from_slice(header.as_bytes());

    let size = element_type.size_of();

    if cfg!(target_endian = "big") && size > 1 {
        for element in array.as_bytes().chunks_exact(size) {
            output.extend(element.iter().rev());
        }
    } else {
        output.extend_from_slice(array.as_bytes());
    }
    output
}

fn descr(element_type: ElementType) -> &'static str {
    match element_type {
        ElementType::Bool => "|b1",
        ElementType::U8 => "|u1",
        ElementType::I8 => "|i1",
        ElementType::U16 => "<u2",
        ElementType::I16 => "<i2",
        ElementType::U32 => "<u4",
        ElementType::I32 => "<i4",
        ElementType::U64 => "<u8",
        ElementType::I64 => "<i8",
        ElementType::F16 => "<f2",
        ElementType::F32 => "<f4",
        ElementType::F64 => "<f8"
    }
}

fn parse_descr(descr: &str) -> Result<(ElementType, bool), CodecErrors> {
    let invalid = || CodecErrors::InvalidData(format!("unsupported npy descr {descr:?}"));

    let mut chars = descr.chars();
    let big_endian = match chars.next() {
        Some('<') | Some('|') => false,
        Some('>') => true,
        Some('=') => cfg!(target_endian = "big"),
        _ => return Err(invalid())
    };
    let element_type = match chars.as_str() {
        "b1" => ElementType::Bool,
        "u1" => ElementType::U8,
        "i1" => ElementType::I8,
        "u2" => ElementType::U16,
        "i2" => ElementType::I16,
        "u4" => ElementType::U32,
        "i4" => ElementType::I32,
        "u8" => ElementType::U64,
        "i8" => ElementType::I64,
        "f2" => ElementType::F16,
        "f4" => ElementType::F32,
        "f8" => ElementType::F64,
        _ => return Err(invalid())
    };
    Ok((element_type, big_endian))
}

/// Return the text right after `'key':` in a python dict literal
fn dict_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let single = format!("'{key}'");
    let double = format!("\"{key}\"");

    let position = header
        .find(&single)
        .map(|x| x + single.len())
        .or_else(|| header.find(&double).map(|x| x + double.len()))?;

    let rest = header[position..].trim_start();
    Some(rest.strip_prefix(':')?.trim_start())
}

fn parse_header(header: &str) -> Result<NpyHeader, CodecErrors> {
    let missing = |key: &str| CodecErrors::InvalidData(format!("npy header has no valid {key}"));

    let descr = dict_value(header, "descr").ok_or_else(|| missing("descr"))?;
    let quote = descr.chars().next().ok_or_else(|| missing("descr"))?;
    if quote != '\'' && quote != '"' {
        return Err(missing("descr"));
    }
    let descr = descr[1..]
        .split(quote)
        .next()
        .ok_or_else(|| missing("descr"))?;
    let (element_type, big_endian) = parse_descr(descr)?;

    let order = dict_value(header, "fortran_order").ok_or_else(|| missing("fortran_order"))?;
    let fortran_order = if order.starts_with("True") {
        true
    } else if order.starts_with("False") {
        false
    } else {
        return Err(missing("fortran_order"));
    };

    let shape = dict_value(header, "shape").ok_or_else(|| missing("shape"))?;
    let shape = shape
        .strip_prefix('(')
        .and_then(|x| x.split(')').next())
        .ok_or_else(|| missing("shape"))?;

    let shape = shape
        .split(',')
        .map(str::trim)
        .filter(|x| !x.is_empty())
        // numpy may write python 2 longs, e.g `3L`
        .map(|x| x.trim_end_matches('L').parse::<usize>())
        .collect::<Result<Vec<usize>, _>>()
        .map_err(|_| missing("shape"))?;

    Ok(NpyHeader {
        element_type,
        big_endian,
        fortran_order,
        shape
    })
}

fn swap_bytes(array: NdArray) -> Result<NdArray, CodecErrors> {
    let size = array.element_type().size_of();
    let shape = array.shape().to_vec();
    let element_type = array.element_type();

    let mut data = array.into_bytes();
    for element in data.chunks_exact_mut(size) {
        element.reverse();
    }
    Ok(NdArray::new(shape, element_type, data)?)
}

/// Reorder column major data into row major order
fn fortran_to_c_order(array: NdArray) -> Result<NdArray, CodecErrors> {
    let shape = array.shape().to_vec();
    let size = array.element_type().size_of();
    let source = array.as_bytes();

    // fortran strides, in elements
    let mut strides = Vec::with_capacity(shape.len());
    let mut stride = 1_usize;
    for dim in &shape {
        strides.push(stride);
        stride = stride.saturating_mul(*dim);
    }

    let mut output = Vec::with_capacity(source.len());
    let mut index = vec![0_usize; shape.len()];

    for _ in 0..array.num_elements() {
        let offset: usize = index.iter().zip(&strides).map(|(i, s)| i * s).sum();
        output.extend_from_slice(&source[offset * size..(offset + 1) * size]);

        // advance the C order index, last axis fastest
        for axis in (0..shape.len()).rev() {
            index[axis] += 1;
            if index[axis] < shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    Ok(NdArray::new(shape, array.element_type(), output)?)
}
