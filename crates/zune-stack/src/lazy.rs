/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Deferred decoding of a single source
//!
//! A [`LazyHandle`] holds a source, the descriptor the source is expected to
//! have and the function that decodes it. Nothing is read until
//! [`materialize`](LazyHandle::materialize) is called, and a successful decode
//! happens at most once, later calls share the cached array.
//!
//! Handles are `Send + Sync`, so materialization may happen on any thread.
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex};

use log::trace;

use crate::array::{ArrayDescriptor, NdArray};
use crate::enumerate::SourceLocator;
use crate::errors::{CodecErrors, StackErrors};
use crate::registry::CodecRegistry;

/// A function decoding one source into an array
///
/// It must give the same array for the same locator every time it succeeds,
/// failures are not cached and it may be called again.
pub type DecodeFn = Arc<dyn Fn(&SourceLocator) -> Result<NdArray, StackErrors> + Send + Sync>;

/// Build a [`DecodeFn`] that reads a file and decodes it with the codec
/// registered for its extension
pub fn registry_decoder(registry: Arc<CodecRegistry>) -> DecodeFn {
    Arc::new(move |locator: &SourceLocator| {
        let decode_error = |cause: CodecErrors| StackErrors::DecodeErrors {
            locator: locator.clone(),
            cause
        };
        let entry = registry
            .lookup_path(locator.path())
            .ok_or_else(|| StackErrors::UnsupportedFormat(locator.path().to_path_buf()))?;

        trace!("Decoding {} with {}", locator, entry.codec().name());

        let bytes = locator
            .read_bytes()
            .map_err(|err| decode_error(CodecErrors::IoErrors(err)))?;

        entry.codec().decode(&bytes).map_err(decode_error)
    })
}

enum HandleState {
    Pending,
    Ready(Arc<NdArray>),
    /// Decoded, but to something other than what was declared
    Mismatched(ArrayDescriptor)
}

/// A source whose decoding is deferred until it's needed
pub struct LazyHandle {
    locator:  SourceLocator,
    declared: ArrayDescriptor,
    decode:   Option<DecodeFn>,
    state:    Mutex<HandleState>
}

/// Wrap `decode` for `locator` into a handle that promises an array of `declared`
///
/// Nothing is decoded here, errors surface on materialization.
pub fn make_lazy(locator: SourceLocator, declared: ArrayDescriptor, decode: DecodeFn) -> LazyHandle {
    LazyHandle::new(locator, declared, decode)
}

impl LazyHandle {
    pub fn new(locator: SourceLocator, declared: ArrayDescriptor, decode: DecodeFn) -> LazyHandle {
        LazyHandle {
            locator,
            declared,
            decode: Some(decode),
            state: Mutex::new(HandleState::Pending)
        }
    }

    /// A handle whose array is already known
    ///
    /// It declares the descriptor of `array` and never decodes anything.
    pub fn resolved(locator: SourceLocator, array: NdArray) -> LazyHandle {
        LazyHandle {
            locator,
            declared: array.descriptor().clone(),
            decode: None,
            state: Mutex::new(HandleState::Ready(Arc::new(array)))
        }
    }

    pub fn locator(&self) -> &SourceLocator {
        &self.locator
    }

    /// The descriptor this handle promises, not verified until materialized
    pub fn declared(&self) -> &ArrayDescriptor {
        &self.declared
    }

    /// Whether the array has been decoded and verified
    pub fn is_materialized(&self) -> bool {
        matches!(*self.lock(), HandleState::Ready(_))
    }

    /// Decode the source if that hasn't happened yet and return the array
    ///
    /// # Errors
    /// - Whatever the decode function returns, usually [`StackErrors::DecodeErrors`].
    ///   Nothing is cached, a later call decodes again.
    /// - [`StackErrors::ShapeMismatch`] if the decoded array doesn't match the
    ///   declared descriptor. This is remembered, later calls fail the same way
    ///   without decoding.
    pub fn materialize(&self) -> Result<Arc<NdArray>, StackErrors> {
        // concurrent callers wait here, so the decode runs once
        let mut state = self.lock();

        match &*state {
            HandleState::Ready(array) => return Ok(Arc::clone(array)),
            HandleState::Mismatched(actual) => return Err(self.mismatch(actual.clone())),
            HandleState::Pending => {}
        }
        let decode = self.decode.as_ref().ok_or_else(|| {
            StackErrors::Generic(format!("No decoder for pending source {}", self.locator))
        })?;

        trace!("Materializing {}", self.locator);

        let array = decode(&self.locator)?;

        if array.descriptor() != &self.declared {
            let actual = array.descriptor().clone();
            *state = HandleState::Mismatched(actual.clone());
            return Err(self.mismatch(actual));
        }
        let array = Arc::new(array);
        *state = HandleState::Ready(Arc::clone(&array));

        Ok(array)
    }

    fn mismatch(&self, actual: ArrayDescriptor) -> StackErrors {
        StackErrors::ShapeMismatch {
            locator: self.locator.clone(),
            expected: self.declared.clone(),
            actual
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HandleState> {
        // a panicking decode never leaves a half written state behind
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Debug for LazyHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyHandle")
            .field("locator", &self.locator)
            .field("declared", &self.declared)
            .field("materialized", &self.is_materialized())
            .finish()
    }
}
