mod common;

use async_trait::async_trait;
use common::sample_analysis;
use news_examer::graph::{EntityGroup, KnowledgeGraph};
use news_examer::model::Sentiment;
use news_examer::orchestrator::{Phase, Rejected, View, SAMPLE_ARTICLE};
use news_examer::{schema, AnalysisError, AnalysisResult, AnalysisService, ArticleSource, Orchestrator};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Answers with a canned document and counts the calls it receives.
struct CannedService {
    document: serde_json::Value,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl CannedService {
    fn new(document: serde_json::Value) -> Self {
        Self {
            document,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisService for CannedService {
    async fn analyze(&self, raw_text: &str) -> Result<AnalysisResult, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(raw_text.to_string());
        schema::validate(&self.document)
    }
}

struct FailingService;

#[async_trait]
impl AnalysisService for FailingService {
    async fn analyze(&self, _raw_text: &str) -> Result<AnalysisResult, AnalysisError> {
        Err(AnalysisError::Upstream("Gemini API returned HTTP 503: overloaded".to_string()))
    }
}

struct StaticSource(Result<String, AnalysisError>);

#[async_trait]
impl ArticleSource for StaticSource {
    async fn fetch(&self, _url: &str) -> Result<String, AnalysisError> {
        self.0.clone()
    }
}

#[tokio::test]
async fn sample_article_produces_a_report() {
    let service = CannedService::new(sample_analysis());
    let mut orchestrator = Orchestrator::new();
    orchestrator.use_sample().unwrap();

    orchestrator.analyze(&service).await.unwrap();

    assert_eq!(*service.seen.lock().unwrap(), vec![SAMPLE_ARTICLE.to_string()]);
    let View::Report(result) = orchestrator.view() else {
        panic!("expected a report, got {:?}", orchestrator.view());
    };
    assert_eq!(result.sentiment, Sentiment::Neutral);

    let graph = KnowledgeGraph::from_data(&result.knowledge_graph_data);
    let quantum_leap = graph.index_of("QuantumLeap").unwrap();
    assert_eq!(graph.entity(quantum_leap).group, EntityGroup::Organization);
}

#[tokio::test]
async fn empty_input_makes_no_call() {
    let service = CannedService::new(sample_analysis());
    let mut orchestrator = Orchestrator::new();
    orchestrator.set_text("   ").unwrap();

    let rejected = orchestrator.analyze(&service).await.unwrap_err();

    assert_eq!(
        rejected,
        Rejected::Invalid("Please enter or fetch some news text to analyze.".to_string())
    );
    assert_eq!(service.calls(), 0);
    assert_eq!(orchestrator.phase(), Phase::Idle);
}

#[tokio::test]
async fn new_request_clears_the_previous_outcome() {
    let service = CannedService::new(sample_analysis());
    let mut orchestrator = Orchestrator::new();
    orchestrator.use_sample().unwrap();
    orchestrator.analyze(&service).await.unwrap();
    assert!(orchestrator.result().is_some());

    orchestrator.begin_analysis().unwrap();
    assert!(orchestrator.result().is_none());
    assert!(orchestrator.error().is_none());
    assert_eq!(orchestrator.view(), View::Busy(Phase::Analyzing));
    orchestrator.finish_analysis(Err(AnalysisError::Upstream("boom".to_string())));

    orchestrator.begin_analysis().unwrap();
    assert!(orchestrator.error().is_none());
}

#[tokio::test]
async fn missing_narrative_shows_an_error_and_no_report() {
    let mut document = sample_analysis();
    document.as_object_mut().unwrap().remove("narrative");
    let service = CannedService::new(document);

    let mut orchestrator = Orchestrator::new();
    orchestrator.use_sample().unwrap();
    orchestrator.analyze(&service).await.unwrap();

    assert!(orchestrator.result().is_none());
    assert_eq!(
        orchestrator.view(),
        View::Error("Failed to analyze news. The AI model returned an invalid response (narrative: missing required field).")
    );
    assert!(!orchestrator.is_busy());
}

#[tokio::test]
async fn upstream_failures_keep_the_text_for_resubmission() {
    let mut orchestrator = Orchestrator::new();
    orchestrator.set_text("Breaking story").unwrap();
    orchestrator.analyze(&FailingService).await.unwrap();

    assert_eq!(
        orchestrator.error(),
        Some("Failed to analyze news: Gemini API returned HTTP 503: overloaded")
    );
    assert_eq!(orchestrator.text(), "Breaking story");

    let service = CannedService::new(sample_analysis());
    orchestrator.analyze(&service).await.unwrap();
    assert!(matches!(orchestrator.view(), View::Report(_)));
}

#[tokio::test]
async fn fetched_text_becomes_the_input() {
    let mut orchestrator = Orchestrator::new();
    let source = StaticSource(Ok("QuantumLeap unveiled Synapse.".to_string()));
    orchestrator.fetch(&source, "https://news.example.com/synapse").await.unwrap();
    assert_eq!(orchestrator.text(), "QuantumLeap unveiled Synapse.");
    assert_eq!(orchestrator.view(), View::Welcome);

    let failing = StaticSource(Err(AnalysisError::Fetch("No readable article text found".to_string())));
    orchestrator.fetch(&failing, "https://news.example.com/empty").await.unwrap();
    assert_eq!(orchestrator.text(), "");
    assert_eq!(orchestrator.view(), View::Error("No readable article text found"));
}
