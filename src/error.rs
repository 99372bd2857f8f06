use thiserror::Error;

/// Failures of the resolution phase. Any of these makes the run's output
/// incoherent, so the run stops.
#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("alias `{alias}` points at `{target}`, which is neither an article nor an alias")]
    Dangling { alias: String, target: String },

    #[error("redirect cycle: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String> },
}

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("invalid `{field}` selector `{selector}`: {reason}")]
    Selector {
        field: &'static str,
        selector: String,
        reason: String,
    },
}
