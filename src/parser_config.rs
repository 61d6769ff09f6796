//! Parser configuration options.
//!
//! Controls how the reader reacts to malformed input and bounds the work it
//! will do on adversarial files.

/// Parser configuration options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParserOptions {
    /// Fail on the first malformed object instead of skipping it
    pub strict: bool,

    /// Maximum array/dictionary nesting depth accepted by the object parser
    pub max_nesting: usize,

    /// Largest `/Length` trusted for a stream body. Longer values fall back
    /// to scanning for `endstream`.
    pub max_stream_length: usize,

    /// Upper bound on decoded stream size in bytes
    pub max_decompressed_size: usize,

    /// Depth at which transitive closure defers a subgraph to a later pass
    pub max_closure_depth: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParserOptions {
    /// Skip isolated corruption, the usual setting for real-world files.
    pub fn lenient() -> Self {
        Self {
            strict: false,
            max_nesting: 256,
            max_stream_length: 512 * 1024 * 1024,
            max_decompressed_size: crate::filters::MAX_DECOMPRESSED_SIZE,
            max_closure_depth: 64,
        }
    }

    /// Treat every malformed object as a hard failure.
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::lenient()
        }
    }

    /// Set strict mode.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the maximum nesting depth.
    pub fn with_max_nesting(mut self, depth: usize) -> Self {
        self.max_nesting = depth;
        self
    }

    /// Set the largest trusted stream `/Length`.
    pub fn with_max_stream_length(mut self, len: usize) -> Self {
        self.max_stream_length = len;
        self
    }

    /// Set the decoded stream size limit.
    pub fn with_max_decompressed_size(mut self, size: usize) -> Self {
        self.max_decompressed_size = size;
        self
    }

    /// Set the transitive-closure depth guard.
    pub fn with_max_closure_depth(mut self, depth: usize) -> Self {
        self.max_closure_depth = depth.max(1);
        self
    }
}
