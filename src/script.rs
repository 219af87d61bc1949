//! Traditional-to-simplified script unification.

use std::borrow::Cow;
use zhconv::{zhconv, Variant};

/// Script conversion applied to each flushed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptConversion {
    /// Leave text untouched.
    #[default]
    None,
    /// Map traditional characters to their simplified forms.
    TraditionalToSimplified,
}

impl ScriptConversion {
    /// Picks the conversion for an on/off toggle.
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            ScriptConversion::TraditionalToSimplified
        } else {
            ScriptConversion::None
        }
    }

    /// Converts a whole block of text in one pass.
    ///
    /// Deterministic and idempotent: simplified input comes back unchanged.
    pub fn convert<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match self {
            ScriptConversion::None => Cow::Borrowed(text),
            ScriptConversion::TraditionalToSimplified if text.is_empty() => Cow::Borrowed(text),
            ScriptConversion::TraditionalToSimplified => Cow::Owned(zhconv(text, Variant::ZhHans)),
        }
    }
}
