mod client;
mod languages;

pub use client::{CodeSandbox, RunOutcome, SandboxClient};
pub use languages::{language_id, FALLBACK_LANGUAGE_ID};
