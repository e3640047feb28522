//! Seeded input generation.
//!
//! Produces a JSON document of random coordinate pairs along with the pairs
//! themselves and their reference mean distance. Coordinates are rounded to
//! the printed precision before the mean is computed, so parsing the text
//! back yields exactly the same pairs.

use core::fmt;
use std::{
    fs::File,
    io::{self, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use rand::{Rng, SeedableRng, rngs::SmallRng};
use thiserror::Error;

use crate::{distance::mean_haversine, pairs::HaversinePair};

pub const DEFAULT_PAIR_COUNT: usize = 25_000;
pub const DEFAULT_SEED: u64 = 123_456_789;

/// Largest supported number of decimal places.
pub const MAX_PRECISION: u32 = 15;

/// Top-level shape of the generated document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Layout {
    /// `[ {..}, {..} ]`
    #[default]
    BareArray,
    /// `{ "pairs": [ {..}, {..} ] }`
    PairsObject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorOptions {
    /// Number of pairs to emit.
    ///
    /// # Default
    ///
    /// `25000`
    pub count: usize,

    /// Seed of the random stream. Equal seeds produce identical output.
    ///
    /// # Default
    ///
    /// `123456789`
    pub seed: u64,

    /// Coordinates are drawn uniformly from `[-bound, bound]`.
    ///
    /// # Default
    ///
    /// `80.0`
    pub bound: f64,

    /// Decimal places printed for every coordinate.
    ///
    /// # Default
    ///
    /// `2`
    pub precision: u32,

    /// # Default
    ///
    /// [`Layout::BareArray`]
    pub layout: Layout,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            count: DEFAULT_PAIR_COUNT,
            seed: DEFAULT_SEED,
            bound: 80.0,
            precision: 2,
            layout: Layout::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("coordinate bound must be finite and non-negative, got {0}")]
    InvalidBound(f64),
    #[error("precision must be at most {MAX_PRECISION} decimal places, got {0}")]
    InvalidPrecision(u32),
    #[error("failed to write {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A generated document.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub json: String,
    pub pairs: Vec<HaversinePair>,
    /// Mean haversine distance of `pairs`.
    pub expected_mean: f64,
}

/// Generates pairs and renders them as JSON text.
///
/// # Errors
///
/// Returns [`GeneratorError::InvalidBound`] or
/// [`GeneratorError::InvalidPrecision`] for unusable options.
///
/// # Examples
///
/// ```rust
/// use haversine::generator::{GeneratorOptions, generate_json};
///
/// let generated = generate_json(&GeneratorOptions { count: 3, ..Default::default() })?;
/// assert_eq!(generated.pairs.len(), 3);
/// assert!(generated.json.starts_with('['));
/// # Ok::<(), haversine::generator::GeneratorError>(())
/// ```
pub fn generate_json(options: &GeneratorOptions) -> Result<Generated, GeneratorError> {
    if !options.bound.is_finite() || options.bound < 0.0 {
        return Err(GeneratorError::InvalidBound(options.bound));
    }
    if options.precision > MAX_PRECISION {
        return Err(GeneratorError::InvalidPrecision(options.precision));
    }

    tracing::debug!(
        count = options.count,
        seed = options.seed,
        layout = ?options.layout,
        "generating haversine pairs"
    );

    let pairs = random_pairs(options);
    let json = render(&pairs, options);
    let expected_mean = mean_haversine(&pairs);

    Ok(Generated {
        json,
        pairs,
        expected_mean,
    })
}

/// Generates a document and writes it to `path`.
///
/// # Errors
///
/// Everything [`generate_json`] returns, plus [`GeneratorError::Io`] when the
/// file cannot be written.
pub fn write_json(
    path: impl AsRef<Path>,
    options: &GeneratorOptions,
) -> Result<Generated, GeneratorError> {
    let path = path.as_ref();
    let generated = generate_json(options)?;

    let io_error = |source| GeneratorError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(io_error)?);
    writer
        .write_all(generated.json.as_bytes())
        .and_then(|()| writer.flush())
        .map_err(io_error)?;

    tracing::debug!(path = %path.display(), bytes = generated.json.len(), "wrote input file");
    Ok(generated)
}

fn random_pairs(options: &GeneratorOptions) -> Vec<HaversinePair> {
    let mut rng = SmallRng::seed_from_u64(options.seed);
    #[allow(clippy::cast_possible_wrap)]
    let scale = 10f64.powi(options.precision as i32);
    let bound = options.bound;
    let mut coordinate = || (rng.random_range(-bound..=bound) * scale).round() / scale;

    (0..options.count)
        .map(|_| HaversinePair {
            x0: coordinate(),
            y0: coordinate(),
            x1: coordinate(),
            y1: coordinate(),
        })
        .collect()
}

fn render(pairs: &[HaversinePair], options: &GeneratorOptions) -> String {
    Document {
        pairs,
        precision: options.precision as usize,
        layout: options.layout,
    }
    .to_string()
}

/// Tab-indented text of a pair list, one field per line.
struct Document<'a> {
    pairs: &'a [HaversinePair],
    precision: usize,
    layout: Layout,
}

impl fmt::Display for Document<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let precision = self.precision;
        let (open, close, indent) = match self.layout {
            Layout::BareArray => ("[\n", "]\n", "\t"),
            Layout::PairsObject => ("{\n\t\"pairs\": [\n", "\t]\n}\n", "\t\t"),
        };

        f.write_str(open)?;
        for (i, pair) in self.pairs.iter().enumerate() {
            let fields = [("x0", pair.x0), ("y0", pair.y0), ("x1", pair.x1), ("y1", pair.y1)];
            writeln!(f, "{indent}{{")?;
            for (j, (name, value)) in fields.into_iter().enumerate() {
                let separator = if j + 1 == fields.len() { "" } else { "," };
                writeln!(f, "{indent}\t\"{name}\": {value:.precision$}{separator}")?;
            }
            let separator = if i + 1 == self.pairs.len() { "" } else { "," };
            writeln!(f, "{indent}}}{separator}")?;
        }
        f.write_str(close)
    }
}
