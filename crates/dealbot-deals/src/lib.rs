//! Deal discovery: the deal store, external searchers, the AI verifier,
//! scoring, per-user sessions, and the pipeline that ties them together.

pub mod adapters;
pub mod candidate;
pub mod error;
pub mod generative;
pub mod llm;
pub mod matching;
pub mod pipeline;
pub mod scoring;
pub mod searcher;
pub mod session;
pub mod store;
pub mod verifier;
pub mod web_search;

pub use adapters::build_pipeline;
pub use candidate::Candidate;
pub use error::{DealError, LlmError};
pub use generative::{GenerativeAdapter, MAX_GENERATED_DEALS};
pub use llm::{extract_json_array, ChatClient, LlmProvider};
pub use pipeline::{DealPipeline, PipelinePolicies};
pub use scoring::{rank, score};
pub use searcher::DealSearcher;
pub use session::{
    MemorySessionStore, PgSessionStore, SessionGuard, SessionManager, SessionStore,
};
pub use store::{DealStore, MemoryDealStore, PgDealStore};
pub use verifier::{verify_or_pass_through, DealVerifier, LlmVerifier, VerifyOutcome};
pub use web_search::WebSearchAdapter;
