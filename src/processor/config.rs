//! # Processor Configuration Module
//!
//! Controls how raw pages become passages: how large a passage may grow, how
//! much consecutive passages overlap, which page regions count as boilerplate
//! and which stored pages are not worth processing at all.
//!
//! ## Key Components
//!
//! - `ChunkOptions`: chunk size and overlap, in characters
//! - `ProcessorConfig`: complete configuration for a processing run
//! - `ProcessorConfigBuilder`: builder pattern implementation for easier configuration
//!
//! Output is a pure function of the page content and this configuration, so two
//! runs with the same configuration over the same pages produce the same passages.

/// Configuration for chunking text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOptions {
    /// Maximum size of each chunk in characters
    pub chunk_size: usize,

    /// Characters carried over from the end of one chunk to the start of the next
    pub chunk_overlap: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 50,
        }
    }
}

/// Configuration for the processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Options for chunking
    pub chunk_options: ChunkOptions,

    /// CSS selectors for boilerplate regions removed before extraction
    pub exclude_selectors: Vec<String>,

    /// Object keys containing any of these substrings are ignored
    pub skip_patterns: Vec<String>,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            chunk_options: ChunkOptions::default(),
            exclude_selectors: [
                "nav",
                "header",
                "footer",
                "aside",
                "form",
                "[role=navigation]",
                "[role=banner]",
                "[role=contentinfo]",
                "[aria-hidden=true]",
                ".navigation",
                ".navbar",
                ".menu",
                ".sidebar",
                ".breadcrumb",
                ".ads",
                ".comments",
                ".cookie-banner",
                "#nav",
                "#header",
                "#footer",
                "#sidebar",
                "#comments",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            skip_patterns: [
                "-blog-author-",
                "-blog-authors-",
                "-blog-category-",
                "-blog-tag-",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Builder for ProcessorConfig
#[derive(Debug, Default)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
        }
    }

    /// Set the chunk options
    pub fn chunk_options(mut self, chunk_options: ChunkOptions) -> Self {
        self.config.chunk_options = chunk_options;
        self
    }

    /// Set the chunk size
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_options.chunk_size = chunk_size;
        self
    }

    /// Set the chunk overlap
    pub fn chunk_overlap(mut self, chunk_overlap: usize) -> Self {
        self.config.chunk_options.chunk_overlap = chunk_overlap;
        self
    }

    /// Set the boilerplate selectors
    pub fn exclude_selectors(mut self, exclude_selectors: Vec<String>) -> Self {
        self.config.exclude_selectors = exclude_selectors;
        self
    }

    /// Set the key patterns of pages to ignore
    pub fn skip_patterns(mut self, skip_patterns: Vec<String>) -> Self {
        self.config.skip_patterns = skip_patterns;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ProcessorConfig {
        self.config
    }
}

impl ProcessorConfig {
    /// Create a new builder
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder::new()
    }

    /// Whether the object key matches one of the skip patterns
    pub fn is_skipped(&self, key: &str) -> bool {
        self.skip_patterns.iter().any(|pattern| key.contains(pattern.as_str()))
    }
}
