pub mod config;
pub mod error;
pub mod model;
pub mod schema;
pub mod llm;
pub mod fetch;
pub mod graph;
pub mod layout;
pub mod animation;
pub mod infographic;
pub mod audio;
pub mod orchestrator;
pub mod reporter;

pub use config::Config;
pub use error::AnalysisError;
pub use model::AnalysisResult;
pub use llm::{AnalysisClient, AnalysisService};
pub use fetch::{ArticleFetcher, ArticleSource};
pub use graph::KnowledgeGraph;
pub use layout::ForceSimulation;
pub use animation::LayoutAnimation;
pub use audio::AudioController;
pub use orchestrator::Orchestrator;
pub use reporter::Reporter;

pub type Result<T> = anyhow::Result<T>;
