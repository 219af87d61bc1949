//! Data model shared by the pipeline stages.
//!
//! Records are the intermediate representation between structured inputs and
//! the entry formatter; reports describe what a run produced.

mod record;
mod report;

pub use record::*;
pub use report::*;
