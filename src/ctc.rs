use std::{cmp::Reverse, path::Path};

use float_ord::FloatOrd;
use ndarray::ArrayView2;
use tracing::instrument;

use crate::{
    error::{Error, Result},
    result::DecodeResult,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterTable {
    symbols: Vec<String>,
}

impl CharacterTable {
    pub fn parse(contents: &str) -> Result<Self> {
        Self::from_symbols(
            contents
                .split('\n')
                .map(|line| line.strip_suffix('\r').unwrap_or(line))
                .filter(|line| !line.is_empty())
                .map(str::to_owned),
        )
    }

    pub fn from_symbols<I, S>(symbols: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let symbols = symbols.into_iter().map(Into::into).collect::<Vec<_>>();
        if symbols.is_empty() {
            return Err(Error::Dictionary("character table is empty".into()));
        }
        Ok(Self { symbols })
    }

    #[instrument(level = "debug")]
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|err| {
            Error::Dictionary(format!("failed to read {}: {err}", path.display()))
        })?;
        let table = Self::parse(&contents).map_err(|err| match err {
            Error::Dictionary(reason) => {
                Error::Dictionary(format!("{reason} ({})", path.display()))
            }
            other => other,
        })?;
        log::debug!("Loaded {} symbols from {}", table.len(), path.display());
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Class 0 is the blank.
    pub fn symbol(&self, class: usize) -> Option<&str> {
        class
            .checked_sub(1)
            .and_then(|index| self.symbols.get(index))
            .map(String::as_str)
    }
}

/// Greedy CTC decoding of a `T × C` grid; ties go to the lowest class.
#[instrument(level = "trace", skip(data, table))]
pub fn decode(data: ArrayView2<f32>, table: &CharacterTable) -> DecodeResult {
    if data.nrows() == 0 || data.ncols() == 0 || table.is_empty() {
        return DecodeResult::default();
    }

    let mut text = String::new();
    let mut character_scores = Vec::new();
    let mut previous = None;
    for timestep in data.outer_iter() {
        let Some((class, score)) = timestep
            .indexed_iter()
            .max_by_key(|(i, value)| (FloatOrd(**value), Reverse(*i)))
            .map(|(i, value)| (i, *value))
        else {
            continue;
        };

        if class != 0 && previous != Some(class) {
            match table.symbol(class) {
                Some(symbol) => {
                    text.push_str(symbol);
                    character_scores.push(score);
                }
                None => log::trace!("Class {class} has no entry in the character table"),
            }
        }
        previous = Some(class);
    }

    let confidence = if character_scores.is_empty() {
        0.0
    } else {
        character_scores.iter().sum::<f32>() / character_scores.len() as f32
    };
    DecodeResult {
        text,
        confidence,
        character_scores,
    }
}
