use crate::value::DEFAULT_OBJECT_CAPACITY;

/// Nesting limit used by [`ParserOptions::default`].
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// How the parser materializes string values and object keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StringMode {
    /// Copy every string into the [`Arena`](crate::Arena). The tree then only
    /// depends on the arena, and the input buffer may be reused.
    #[default]
    Copy,
    /// Borrow strings straight from the input buffer. No arena space is used.
    View,
}

/// Configuration options for the JSON parser.
///
/// # Examples
///
/// ```rust
/// use haversine::{ParserOptions, StringMode};
///
/// let options = ParserOptions {
///     string_mode: StringMode::View,
///     object_capacity: 8,
///     ..Default::default()
/// };
/// assert_eq!(options.max_depth, 128);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Whether strings are copied into the arena or borrowed from the input.
    ///
    /// # Default
    ///
    /// [`StringMode::Copy`]
    pub string_mode: StringMode,

    /// Number of slots in every object table.
    ///
    /// Tables never grow, so an object with more distinct keys than this
    /// fails to parse.
    ///
    /// # Default
    ///
    /// `32`
    pub object_capacity: usize,

    /// Deepest allowed nesting of arrays and objects.
    ///
    /// # Default
    ///
    /// `128`
    pub max_depth: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            string_mode: StringMode::default(),
            object_capacity: DEFAULT_OBJECT_CAPACITY,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
