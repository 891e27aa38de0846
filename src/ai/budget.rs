//! Payload Budget Estimation and Truncation
//!
//! Measures nested JSON payloads in abstract units and shrinks them to fit
//! a cap without changing their structure.
//!
//! ## Strategy
//! - `estimate` counts the units of the compact JSON serialization
//! - `truncate` applies one reduction ratio (cap / cost) to every string leaf
//! - Strings are cut on unit boundaries and re-decoded, so a cut never leaves
//!   a partial character behind
//! - If re-encoding still overshoots (token merges, JSON escapes), the ratio
//!   shrinks and the whole payload is cut again from the original

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;
use tracing::debug;

use crate::constants::budget::{MAX_SHRINK_ROUNDS, RATIO_SHRINK};
use crate::types::{EnrichError, Result};

/// Unit encoding used to measure payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitEncoding {
    /// cl100k_base BPE tokens
    #[default]
    Cl100k,
    /// Unicode scalar values
    Chars,
}

impl std::fmt::Display for UnitEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cl100k => write!(f, "cl100k"),
            Self::Chars => write!(f, "chars"),
        }
    }
}

#[derive(Clone)]
enum Encoder {
    Bpe(Arc<CoreBPE>),
    Chars,
}

/// Pure, deterministic payload measurement for one encoding
#[derive(Clone)]
pub struct BudgetEstimator {
    encoder: Encoder,
}

impl std::fmt::Debug for BudgetEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetEstimator")
            .field("encoding", &self.encoding())
            .finish()
    }
}

impl BudgetEstimator {
    pub fn new(encoding: UnitEncoding) -> Result<Self> {
        let encoder = match encoding {
            UnitEncoding::Cl100k => {
                let bpe = tiktoken_rs::cl100k_base()
                    .map_err(|e| EnrichError::Tokenizer(format!("cl100k_base: {}", e)))?;
                Encoder::Bpe(Arc::new(bpe))
            }
            UnitEncoding::Chars => Encoder::Chars,
        };
        Ok(Self { encoder })
    }

    /// Character-unit estimator, infallible
    pub fn chars() -> Self {
        Self {
            encoder: Encoder::Chars,
        }
    }

    pub fn encoding(&self) -> UnitEncoding {
        match self.encoder {
            Encoder::Bpe(_) => UnitEncoding::Cl100k,
            Encoder::Chars => UnitEncoding::Chars,
        }
    }

    /// Units in a plain string
    pub fn count(&self, text: &str) -> usize {
        match &self.encoder {
            Encoder::Bpe(bpe) => bpe.encode_with_special_tokens(text).len(),
            Encoder::Chars => text.chars().count(),
        }
    }

    /// Units in the serialized payload
    pub fn estimate(&self, payload: &Value) -> usize {
        self.count(&payload.to_string())
    }

    pub fn fits(&self, payload: &Value, max: usize) -> bool {
        self.estimate(payload) <= max
    }

    /// Keep the first `max_units` units of `text`.
    ///
    /// The result is always a prefix of `text` and never splits a character.
    pub fn truncate_text(&self, text: &str, max_units: usize) -> String {
        match &self.encoder {
            Encoder::Chars => text.chars().take(max_units).collect(),
            Encoder::Bpe(bpe) => {
                let tokens = bpe.encode_with_special_tokens(text);
                if tokens.len() <= max_units {
                    return text.to_string();
                }
                let mut end = max_units;
                while end > 0 {
                    // A cut inside a multi-byte character fails to decode
                    if let Ok(prefix) = bpe.decode(tokens[..end].to_vec())
                        && text.starts_with(&prefix)
                        && bpe.encode_with_special_tokens(&prefix).len() <= max_units
                    {
                        return prefix;
                    }
                    end -= 1;
                }
                String::new()
            }
        }
    }

    /// Shrink `payload` until its estimate is at most `max`.
    ///
    /// Payloads already within budget are returned unchanged. If even the
    /// payload with every string emptied is over `max`, that skeleton is
    /// returned and the caller must treat the payload as oversized.
    pub fn truncate(&self, payload: &Value, max: usize) -> Value {
        let cost = self.estimate(payload);
        if cost <= max {
            return payload.clone();
        }

        let mut ratio = max as f64 / cost as f64;
        for round in 0..MAX_SHRINK_ROUNDS {
            let candidate = self.scale_strings(payload, ratio);
            let units = self.estimate(&candidate);
            if units <= max {
                debug!(cost, units, max, round, ratio, "Payload truncated");
                return candidate;
            }
            ratio *= (max as f64 / units as f64).min(RATIO_SHRINK);
        }

        debug!(cost, max, "Truncation fell back to empty strings");
        self.scale_strings(payload, 0.0)
    }

    fn scale_strings(&self, value: &Value, ratio: f64) -> Value {
        match value {
            Value::String(s) => {
                let keep = (self.count(s) as f64 * ratio).floor() as usize;
                Value::String(self.truncate_text(s, keep))
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.scale_strings(v, ratio)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.scale_strings(v, ratio)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}
