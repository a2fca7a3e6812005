/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The canonical in-memory array every component works with
//!
//! An [`NdArray`] is a shape, an element type and one contiguous buffer of
//! native endian bytes laid out in row major (C) order.
//!
//! The buffer has no notion of the element type it stores, it is a bag of bytes
//! and the [`ElementType`] tag tells us how to reinterpret it, in the same spirit
//! as the image channels in zune-image.
//!
//! Anything coming from outside (a codec, a caller) is normalized into this type
//! before it reaches the loader or the writer.
use std::fmt::{Debug, Display, Formatter};

use bytemuck::Pod;
use half::f16;

use crate::errors::ArrayErrors;

/// The scalar kind stored in an array
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
#[non_exhaustive]
pub enum ElementType {
    /// A boolean, stored as one byte which is either 0 or 1
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    /// IEEE 754 half precision float
    F16,
    F32,
    F64
}

impl ElementType {
    /// Every element type the crate understands
    pub const ALL: [ElementType; 12] = [
        ElementType::Bool,
        ElementType::U8,
        ElementType::I8,
        ElementType::U16,
        ElementType::I16,
        ElementType::U32,
        ElementType::I32,
        ElementType::U64,
        ElementType::I64,
        ElementType::F16,
        ElementType::F32,
        ElementType::F64
    ];

    /// Number of bytes a single element occupies
    pub const fn size_of(self) -> usize {
        match self {
            Self::Bool | Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 | Self::F16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8
        }
    }

    /// A short lowercase name, e.g `uint8`, `float64`
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::U8 => "uint8",
            Self::I8 => "int8",
            Self::U16 => "uint16",
            Self::I16 => "int16",
            Self::U32 => "uint32",
            Self::I32 => "int32",
            Self::U64 => "uint64",
            Self::I64 => "int64",
            Self::F16 => "float16",
            Self::F32 => "float32",
            Self::F64 => "float64"
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::F16 | Self::F32 | Self::F64)
    }
}

impl Display for ElementType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Rust types which map one to one onto an [`ElementType`]
///
/// This is what allows typed construction and typed reads of
/// an [`NdArray`]
pub trait Element: Pod {
    const TYPE: ElementType;
}

macro_rules! impl_element {
    ($($ty:ty => $variant:ident),*) => {
        $(
            impl Element for $ty {
                const TYPE: ElementType = ElementType::$variant;
            }
        )*
    };
}

impl_element!(
    u8 => U8, i8 => I8, u16 => U16, i16 => I16, u32 => U32,
    i32 => I32, u64 => U64, i64 => I64, f16 => F16, f32 => F32, f64 => F64
);

/// Shape and element type of an array
///
/// The descriptor of the first source in a batch is the one every
/// other source is validated against.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize))]
pub struct ArrayDescriptor {
    shape:        Vec<usize>,
    element_type: ElementType
}

impl ArrayDescriptor {
    pub fn new(shape: Vec<usize>, element_type: ElementType) -> ArrayDescriptor {
        ArrayDescriptor {
            shape,
            element_type
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub const fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Number of elements described, `None` if it overflows a `usize`
    ///
    /// A zero dimensional shape describes a single scalar.
    pub fn num_elements(&self) -> Option<usize> {
        self.shape
            .iter()
            .try_fold(1_usize, |acc, dim| acc.checked_mul(*dim))
    }

    /// Number of bytes needed to hold the described array
    pub fn size_in_bytes(&self) -> Option<usize> {
        self.num_elements()?
            .checked_mul(self.element_type.size_of())
    }

    /// The same descriptor with every axis of length one removed
    pub fn squeezed(&self) -> ArrayDescriptor {
        ArrayDescriptor {
            shape:        squeeze_shape(&self.shape),
            element_type: self.element_type
        }
    }
}

impl Display for ArrayDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} {}", self.shape, self.element_type)
    }
}

/// Remove every axis of length one from a shape
pub fn squeeze_shape(shape: &[usize]) -> Vec<usize> {
    shape.iter().copied().filter(|dim| *dim != 1).collect()
}

/// An owned n-dimensional array
#[derive(Clone, PartialEq)]
pub struct NdArray {
    descriptor: ArrayDescriptor,
    data:       Vec<u8>
}

impl NdArray {
    /// Create an array from raw native endian bytes
    ///
    /// # Errors
    /// If the number of bytes doesn't match what the shape and element type need
    pub fn new(
        shape: Vec<usize>, element_type: ElementType, data: Vec<u8>
    ) -> Result<NdArray, ArrayErrors> {
        Self::from_descriptor(ArrayDescriptor::new(shape, element_type), data)
    }

    pub fn from_descriptor(
        descriptor: ArrayDescriptor, data: Vec<u8>
    ) -> Result<NdArray, ArrayErrors> {
        let expected = descriptor
            .size_in_bytes()
            .ok_or_else(|| ArrayErrors::TooLarge(descriptor.shape.clone()))?;

        if expected != data.len() {
            return Err(ArrayErrors::LengthMismatch(expected, data.len()));
        }
        Ok(NdArray { descriptor, data })
    }

    /// Create an array filled with zeroes
    pub fn zeros(shape: Vec<usize>, element_type: ElementType) -> Result<NdArray, ArrayErrors> {
        let descriptor = ArrayDescriptor::new(shape, element_type);
        let size = descriptor
            .size_in_bytes()
            .ok_or_else(|| ArrayErrors::TooLarge(descriptor.shape.clone()))?;

        Ok(NdArray {
            descriptor,
            data: vec![0; size]
        })
    }

    /// Create an array from typed elements
    ///
    /// # Example
    /// ```
    /// use zune_stack::array::{ElementType, NdArray};
    /// let array = NdArray::from_vec(vec![2, 2], vec![1_u16, 2, 3, 4]).unwrap();
    /// assert_eq!(array.element_type(), ElementType::U16);
    /// assert_eq!(array.as_bytes().len(), 8);
    /// ```
    pub fn from_vec<T: Element>(shape: Vec<usize>, elements: Vec<T>) -> Result<NdArray, ArrayErrors> {
        let data = bytemuck::cast_slice::<T, u8>(&elements).to_vec();
        Self::new(shape, T::TYPE, data)
    }

    /// Create a boolean array, `true` is stored as 1 and `false` as 0
    pub fn from_bools(shape: Vec<usize>, elements: &[bool]) -> Result<NdArray, ArrayErrors> {
        let data = elements.iter().map(|x| u8::from(*x)).collect();
        Self::new(shape, ElementType::Bool, data)
    }

    pub fn shape(&self) -> &[usize] {
        self.descriptor.shape()
    }

    pub const fn element_type(&self) -> ElementType {
        self.descriptor.element_type
    }

    pub const fn descriptor(&self) -> &ArrayDescriptor {
        &self.descriptor
    }

    pub fn num_elements(&self) -> usize {
        self.data.len() / self.element_type().size_of()
    }

    /// The raw native endian bytes backing this array
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Copy the elements out as `T`
    ///
    /// # Errors
    /// If `T` isn't the element type of the array
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>, ArrayErrors> {
        if T::TYPE != self.element_type() {
            return Err(ArrayErrors::DifferentType(T::TYPE, self.element_type()));
        }
        // the buffer is a Vec<u8>, so it may not be aligned to T,
        // copying avoids caring about that
        Ok(bytemuck::pod_collect_to_vec::<u8, T>(&self.data))
    }

    /// Give the array a new shape holding the same number of elements
    pub fn reshape(self, shape: Vec<usize>) -> Result<NdArray, ArrayErrors> {
        let element_type = self.element_type();
        Self::new(shape, element_type, self.data)
    }

    /// Remove every axis of length one
    pub fn squeeze(mut self) -> NdArray {
        self.descriptor = self.descriptor.squeezed();
        self
    }

    /// Convert to `uint8` the way a lossy cast would
    ///
    /// Integers keep their lowest eight bits, floats are truncated toward zero
    /// and saturate at `0` and `255` (NaN becomes `0`), booleans become 0 or 1.
    ///
    /// An array already in `uint8` is cloned as is.
    pub fn to_u8(&self) -> NdArray {
        let data: Vec<u8> = match self.element_type() {
            ElementType::U8 | ElementType::Bool | ElementType::I8 => self.data.clone(),
            ElementType::U16 => cast_chunks::<2>(&self.data, |x| u16::from_ne_bytes(x) as u8),
            ElementType::I16 => cast_chunks::<2>(&self.data, |x| i16::from_ne_bytes(x) as u8),
            ElementType::U32 => cast_chunks::<4>(&self.data, |x| u32::from_ne_bytes(x) as u8),
            ElementType::I32 => cast_chunks::<4>(&self.data, |x| i32::from_ne_bytes(x) as u8),
            ElementType::U64 => cast_chunks::<8>(&self.data, |x| u64::from_ne_bytes(x) as u8),
            ElementType::I64 => cast_chunks::<8>(&self.data, |x| i64::from_ne_bytes(x) as u8),
            ElementType::F16 => {
                cast_chunks::<2>(&self.data, |x| f16::from_ne_bytes(x).to_f32() as u8)
            }
            ElementType::F32 => cast_chunks::<4>(&self.data, |x| f32::from_ne_bytes(x) as u8),
            ElementType::F64 => cast_chunks::<8>(&self.data, |x| f64::from_ne_bytes(x) as u8)
        };
        NdArray {
            descriptor: ArrayDescriptor::new(self.shape().to_vec(), ElementType::U8),
            data
        }
    }

    /// Join arrays of identical descriptors along a new leading axis
    ///
    /// The result has shape `(arrays.len(),) + shape`.
    ///
    /// # Errors
    /// - No arrays were given
    /// - An array disagrees with the first one's shape or element type
    pub fn stack(arrays: &[&NdArray]) -> Result<NdArray, ArrayErrors> {
        let first = arrays.first().ok_or(ArrayErrors::EmptyStack)?;

        let mut data = Vec::with_capacity(first.data.len().saturating_mul(arrays.len()));

        for array in arrays {
            if array.descriptor != first.descriptor {
                return Err(ArrayErrors::DescriptorMismatch(
                    first.descriptor.clone(),
                    array.descriptor.clone()
                ));
            }
            data.extend_from_slice(&array.data);
        }
        let mut shape = Vec::with_capacity(first.shape().len() + 1);
        shape.push(arrays.len());
        shape.extend_from_slice(first.shape());

        Self::new(shape, first.element_type(), data)
    }
}

fn cast_chunks<const N: usize>(data: &[u8], func: impl Fn([u8; N]) -> u8) -> Vec<u8> {
    data.chunks_exact(N)
        .map(|chunk| {
            let mut bytes = [0; N];
            bytes.copy_from_slice(chunk);
            func(bytes)
        })
        .collect()
}

impl Debug for NdArray {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NdArray")
            .field("shape", &self.shape())
            .field("element_type", &self.element_type())
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use half::f16;

    use crate::array::{squeeze_shape, ArrayDescriptor, ElementType, NdArray};
    use crate::errors::ArrayErrors;

    #[test]
    fn test_length_is_validated() {
        let err = NdArray::new(vec![2, 3], ElementType::U16, vec![0; 6]).unwrap_err();
        assert!(matches!(err, ArrayErrors::LengthMismatch(12, 6)));
    }

    #[test]
    fn test_scalar_shape_holds_one_element() {
        let array = NdArray::from_vec(vec![], vec![7.5_f64]).unwrap();
        assert_eq!(array.num_elements(), 1);
        assert_eq!(array.to_vec::<f64>().unwrap(), vec![7.5]);
    }

    #[test]
    fn test_half_floats_are_typed_elements() {
        let values = vec![f16::from_f32(0.5), f16::from_f32(-2.0), f16::from_f32(300.0)];
        let array = NdArray::from_vec(vec![3], values.clone()).unwrap();

        assert_eq!(array.element_type(), ElementType::F16);
        assert_eq!(array.as_bytes().len(), 6);
        assert_eq!(array.to_vec::<f16>().unwrap(), values);
        assert_eq!(array.to_u8().as_bytes(), &[0, 0, 255]);
    }

    #[test]
    fn test_typed_read_rejects_other_type() {
        let array = NdArray::from_vec(vec![2], vec![1_i32, 2]).unwrap();
        assert!(array.to_vec::<u32>().is_err());
        assert_eq!(array.to_vec::<i32>().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_squeeze_removes_every_unit_axis() {
        assert_eq!(squeeze_shape(&[1, 4, 1, 3]), vec![4, 3]);
        assert_eq!(squeeze_shape(&[1, 1]), Vec::<usize>::new());

        let array = NdArray::zeros(vec![3, 1, 5], ElementType::F32)
            .unwrap()
            .squeeze();
        assert_eq!(array.shape(), &[3, 5]);
        assert_eq!(array.as_bytes().len(), 3 * 5 * 4);
    }

    #[test]
    fn test_integer_down_cast_keeps_low_bits() {
        let array = NdArray::from_vec(vec![4], vec![0_u16, 255, 256, 300]).unwrap();
        let cast = array.to_u8();
        assert_eq!(cast.element_type(), ElementType::U8);
        assert_eq!(cast.as_bytes(), &[0, 255, 0, 44]);

        let array = NdArray::from_vec(vec![2], vec![-1_i32, 513]).unwrap();
        assert_eq!(array.to_u8().as_bytes(), &[255, 1]);
    }

    #[test]
    fn test_float_down_cast_truncates_and_saturates() {
        let array =
            NdArray::from_vec(vec![5], vec![3.9_f64, -2.0, 300.5, f64::NAN, 128.0]).unwrap();
        assert_eq!(array.to_u8().as_bytes(), &[3, 0, 255, 0, 128]);
    }

    #[test]
    fn test_stack_adds_leading_axis() {
        let a = NdArray::from_vec(vec![2, 2], vec![1_u8, 2, 3, 4]).unwrap();
        let b = NdArray::from_vec(vec![2, 2], vec![5_u8, 6, 7, 8]).unwrap();

        let stacked = NdArray::stack(&[&a, &b]).unwrap();
        assert_eq!(stacked.shape(), &[2, 2, 2]);
        assert_eq!(stacked.as_bytes(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_stack_rejects_mismatched_descriptors() {
        let a = NdArray::zeros(vec![2, 2], ElementType::U8).unwrap();
        let b = NdArray::zeros(vec![2, 2], ElementType::U16).unwrap();
        let err = NdArray::stack(&[&a, &b]).unwrap_err();

        match err {
            ArrayErrors::DescriptorMismatch(expected, found) => {
                assert_eq!(expected, ArrayDescriptor::new(vec![2, 2], ElementType::U8));
                assert_eq!(found.element_type(), ElementType::U16);
            }
            _ => panic!("unexpected error {err:?}")
        }
        assert!(matches!(
            NdArray::stack(&[]).unwrap_err(),
            ArrayErrors::EmptyStack
        ));
    }
}
