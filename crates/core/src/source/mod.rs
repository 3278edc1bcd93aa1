//! Source-control connections and the outbound ports for repository access
//! and AI spec enhancement.

mod model;
mod provider;
mod service;

pub use model::{
    AnalyzeRequest, ConnectionInput, ProviderKind, RepoSummary, SourceConnection, SourceFile,
};
pub use provider::{
    is_candidate_source, DisabledEnhancer, SourceProvider, SourceProviders, SpecEnhancer,
    MAX_SOURCE_FILES,
};
