/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Options that influence loading
//!
//! # Example
//! ```
//! use zune_stack::options::LoadOptions;
//! // keep unit axes and refuse directories with more than 500 files
//! let options = LoadOptions::default().set_squeeze(false).set_max_sources(500);
//! assert_eq!(options.max_sources(), 500);
//! ```

/// Load options
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LoadOptions {
    squeeze:     bool,
    max_sources: usize
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            squeeze:     true,
            max_sources: usize::MAX
        }
    }
}

impl LoadOptions {
    /// Whether axes of length one are removed from stacked arrays
    ///
    /// Default: true
    pub const fn squeeze(&self) -> bool {
        self.squeeze
    }

    /// Set whether axes of length one are removed from stacked arrays
    ///
    /// This has no effect on single sources, which are never stacked
    pub const fn set_squeeze(mut self, yes: bool) -> Self {
        self.squeeze = yes;
        self
    }

    /// Maximum number of sources one read may stack
    ///
    /// Default: `usize::MAX`
    pub const fn max_sources(&self) -> usize {
        self.max_sources
    }

    /// Set the maximum number of sources one read may stack,
    /// reading more than this is an error
    pub const fn set_max_sources(mut self, max: usize) -> Self {
        self.max_sources = max;
        self
    }
}
