//! Splits translation units into batches that fit a backend's token budget.

use serde::Serialize;
use tracing::debug;

use crate::{error::Error, formats::FormatType, types::TranslationUnit};

/// Average characters per token used by [`estimate_tokens`].
pub const CHARS_PER_TOKEN: usize = 4;

pub const DEFAULT_INPUT_TOKENS: usize = 16_000;
pub const DEFAULT_OUTPUT_TOKENS: usize = 4_000;
pub const MIN_CHUNK: usize = 1;
pub const MAX_CHUNK: usize = 100;

/// A non-empty, ordered batch of units sent to a backend together.
pub type Chunk = Vec<TranslationUnit>;

/// Rough token count of `text`: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// What the instruction preamble of a request is rendered with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub source_locale: String,
    pub target_locale: String,
    pub format: FormatType,
}

impl PromptContext {
    pub fn new(
        source_locale: impl Into<String>,
        target_locale: impl Into<String>,
        format: FormatType,
    ) -> Self {
        Self {
            source_locale: source_locale.into(),
            target_locale: target_locale.into(),
            format,
        }
    }

    /// The fixed instructions that accompany every chunk.
    pub fn preamble(&self) -> String {
        format!(
            "Translate the following {} localization strings from {} to {}. \
             Reply with a JSON object mapping every key to its translation. \
             Keep placeholders, markup and leading or trailing whitespace unchanged.",
            self.format, self.source_locale, self.target_locale
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPlan {
    pub chunk_size: usize,
    pub chunks: Vec<Chunk>,
}

impl ChunkPlan {
    pub fn unit_count(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlanner {
    pub input_budget: usize,
    pub output_budget: usize,
    pub min_chunk: usize,
    pub max_chunk: usize,
}

impl Default for ChunkPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_TOKENS, DEFAULT_OUTPUT_TOKENS)
    }
}

impl ChunkPlanner {
    pub fn new(input_budget: usize, output_budget: usize) -> Self {
        Self {
            input_budget,
            output_budget,
            min_chunk: MIN_CHUNK,
            max_chunk: MAX_CHUNK,
        }
    }

    /// Checks the budgets and chunk bounds; planning runs this first.
    pub fn validate(&self) -> Result<(), Error> {
        if self.input_budget == 0 || self.output_budget == 0 {
            return Err(Error::chunk_planning("token budgets must be positive"));
        }
        if self.input_budget <= self.output_budget {
            return Err(Error::chunk_planning(format!(
                "input budget ({}) must exceed output budget ({})",
                self.input_budget, self.output_budget
            )));
        }
        if self.min_chunk == 0 || self.min_chunk > self.max_chunk {
            return Err(Error::chunk_planning(format!(
                "invalid chunk size bounds {}..={}",
                self.min_chunk, self.max_chunk
            )));
        }
        Ok(())
    }

    /// Token estimate of a request carrying every unit at once.
    pub fn estimate_prompt_tokens(&self, units: &[TranslationUnit], context: &PromptContext) -> usize {
        estimate_tokens(&context.preamble())
            + units
                .iter()
                .map(|unit| estimate_tokens(&unit.source_text))
                .sum::<usize>()
    }

    /// Units per chunk: the room left after reserving the output budget,
    /// divided by the average estimated tokens per unit, clamped to the
    /// chunk bounds.
    pub fn chunk_size(&self, units: &[TranslationUnit], context: &PromptContext) -> usize {
        if units.is_empty() {
            return self.min_chunk;
        }
        let available = (self.input_budget - self.output_budget) as u128;
        let total = self.estimate_prompt_tokens(units, context).max(1) as u128;
        let size = available * units.len() as u128 / total;
        (size.min(self.max_chunk as u128) as usize).max(self.min_chunk)
    }

    /// Partitions `units` into contiguous chunks, preserving order.
    /// Deterministic for identical input.
    pub fn plan_chunks(
        &self,
        units: &[TranslationUnit],
        context: &PromptContext,
    ) -> Result<ChunkPlan, Error> {
        self.validate()?;

        if units.is_empty() {
            return Ok(ChunkPlan {
                chunk_size: self.min_chunk,
                chunks: Vec::new(),
            });
        }

        if context.format.is_whole_document() {
            return Ok(ChunkPlan {
                chunk_size: units.len(),
                chunks: vec![units.to_vec()],
            });
        }

        let chunk_size = self.chunk_size(units, context);
        let chunks: Vec<Chunk> = units.chunks(chunk_size).map(<[_]>::to_vec).collect();
        debug!(
            "planned {} chunk(s) of up to {} unit(s) for {} -> {}",
            chunks.len(),
            chunk_size,
            context.source_locale,
            context.target_locale
        );
        Ok(ChunkPlan { chunk_size, chunks })
    }
}
