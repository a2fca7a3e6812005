/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Combining sources of one shape into a single array
//!
//! The first source of a batch is decoded immediately, its descriptor is then
//! assumed for every other source, which are only decoded when asked for.
//! A source that turns out different is reported when it is decoded.
//!
//! A batch of one source is returned as the decoded array itself,
//! without a leading axis.
use std::borrow::Cow;

use log::{debug, trace};
#[cfg(feature = "threads")]
use rayon::prelude::*;

use crate::array::{squeeze_shape, ArrayDescriptor, ElementType, NdArray};
use crate::enumerate::SourceLocator;
use crate::errors::{ArrayErrors, StackErrors};
use crate::lazy::{make_lazy, DecodeFn, LazyHandle};
use crate::options::LoadOptions;

/// Array data handed out by the reader and accepted by the writer
#[derive(Debug)]
pub enum ImageData {
    /// A single decoded source
    Array(NdArray),
    /// Several sources, decoded on demand
    Stack(StackedArray)
}

impl ImageData {
    /// The shape of the data, for stacks this is the squeezed stacked shape
    pub fn shape(&self) -> Vec<usize> {
        match self {
            ImageData::Array(array) => array.shape().to_vec(),
            ImageData::Stack(stack) => stack.shape()
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            ImageData::Array(array) => array.element_type(),
            ImageData::Stack(stack) => stack.descriptor().element_type()
        }
    }

    pub const fn is_lazy(&self) -> bool {
        matches!(self, ImageData::Stack(_))
    }

    /// Get the whole array in memory
    ///
    /// Eager data is borrowed, stacks are materialized with [`StackedArray::compute`]
    pub fn compute(&self) -> Result<Cow<'_, NdArray>, StackErrors> {
        match self {
            ImageData::Array(array) => Ok(Cow::Borrowed(array)),
            ImageData::Stack(stack) => Ok(Cow::Owned(stack.compute()?))
        }
    }
}

impl From<NdArray> for ImageData {
    fn from(value: NdArray) -> Self {
        ImageData::Array(value)
    }
}

impl From<StackedArray> for ImageData {
    fn from(value: StackedArray) -> Self {
        ImageData::Stack(value)
    }
}

/// A lazy array whose leading axis indexes its sources
#[derive(Debug)]
pub struct StackedArray {
    handles:    Vec<LazyHandle>,
    descriptor: ArrayDescriptor,
    squeeze:    bool
}

impl StackedArray {
    /// Number of sources
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// The descriptor every source is expected to have
    pub fn descriptor(&self) -> &ArrayDescriptor {
        &self.descriptor
    }

    /// `(N,) + descriptor.shape`, without unit axes when squeezing is enabled
    pub fn shape(&self) -> Vec<usize> {
        let mut shape = Vec::with_capacity(self.descriptor.shape().len() + 1);
        shape.push(self.handles.len());
        shape.extend_from_slice(self.descriptor.shape());

        if self.squeeze {
            squeeze_shape(&shape)
        } else {
            shape
        }
    }

    pub fn locators(&self) -> impl Iterator<Item = &SourceLocator> {
        self.handles.iter().map(LazyHandle::locator)
    }

    /// The array of source `index`, decoding it if needed
    ///
    /// Only that source is decoded. The array has the source's own shape,
    /// unit axes are kept.
    ///
    /// # Errors
    /// - The index is out of bounds
    /// - Decoding fails or yields a different descriptor, see [`LazyHandle::materialize`]
    pub fn get(&self, index: usize) -> Result<std::sync::Arc<NdArray>, StackErrors> {
        let handle = self.handles.get(index).ok_or_else(|| {
            StackErrors::Generic(format!(
                "Index {index} out of bounds for a stack of {}",
                self.handles.len()
            ))
        })?;
        handle.materialize()
    }

    /// Decode every source and join them into one array
    ///
    /// Sources are decoded in parallel when the `threads` feature is on,
    /// the result is always in source order.
    pub fn compute(&self) -> Result<NdArray, StackErrors> {
        trace!("Computing stack of {} sources", self.handles.len());

        #[cfg(feature = "threads")]
        let arrays = self
            .handles
            .par_iter()
            .map(LazyHandle::materialize)
            .collect::<Result<Vec<_>, StackErrors>>()?;

        #[cfg(not(feature = "threads"))]
        let arrays = self
            .handles
            .iter()
            .map(LazyHandle::materialize)
            .collect::<Result<Vec<_>, StackErrors>>()?;

        let arrays: Vec<&NdArray> = arrays.iter().map(|x| x.as_ref()).collect();
        let stacked = NdArray::stack(&arrays)?;

        if self.squeeze {
            Ok(stacked.squeeze())
        } else {
            Ok(stacked)
        }
    }
}

/// Stack `locators` using `decode` for every source
///
/// # Errors
/// - No locators were given
/// - The first source fails to decode, it is decoded right away
pub fn stack(
    locators: Vec<SourceLocator>, decode: DecodeFn, options: LoadOptions
) -> Result<ImageData, StackErrors> {
    let mut locators = locators.into_iter();

    let first = locators.next().ok_or(ArrayErrors::EmptyStack)?;
    let sample = decode(&first)?;

    if locators.len() == 0 {
        trace!("Single source {}, not stacking", first);
        return Ok(ImageData::Array(sample));
    }
    let descriptor = sample.descriptor().clone();
    debug!("Batch sample {} decoded to {}", first, descriptor);

    let mut handles = Vec::with_capacity(locators.len() + 1);
    handles.push(LazyHandle::resolved(first, sample));

    for locator in locators {
        handles.push(make_lazy(locator, descriptor.clone(), decode.clone()));
    }
    Ok(ImageData::Stack(StackedArray {
        handles,
        descriptor,
        squeeze: options.squeeze()
    }))
}
