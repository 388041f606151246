//! Request flow for one analysis session: the input text, the busy state,
//! and whichever of result or error the last request produced.
//!
//! Requests are split into `begin_*` and `finish_*` so a front end can keep
//! its input disabled in between; the `analyze`/`fetch` helpers run the
//! whole cycle against an injected service.

use crate::error::AnalysisError;
use crate::fetch::ArticleSource;
use crate::llm::AnalysisService;
use crate::model::AnalysisResult;
use serde::{Deserialize, Serialize};

pub const SAMPLE_ARTICLE: &str = r#"San Francisco, CA - In a landmark announcement, tech giant QuantumLeap today unveiled "Synapse," a revolutionary neural interface that promises to merge human consciousness with artificial intelligence. The device, a sleek, non-invasive headband, reportedly translates thoughts into digital commands with 99% accuracy. CEO Dr. Aris Thorne stated, "Synapse is not just a new product; it's the next step in human evolution." The technology, developed in partnership with neuroscientists from the Global Brain Institute, has raised both excitement and ethical concerns. Dr. Lena Petrova, a leading AI ethicist, warns, "We are stepping into uncharted territory. The potential for misuse is as vast as the potential for good." QuantumLeap's stock surged 40% on the news, while competitors like MindBridge Inc. saw a significant dip. The company plans to launch a developer kit by the end of the year, with a consumer version slated for 2027."#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    Fetching,
    Analyzing,
}

/// Why a submission was turned away before any request was made.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejected {
    /// Another request is still outstanding.
    Busy,
    /// The input failed validation; the message is also shown as the error.
    Invalid(String),
}

/// What the front end should currently display.
#[derive(Debug, PartialEq)]
pub enum View<'a> {
    Busy(Phase),
    Error(&'a str),
    Report(&'a AnalysisResult),
    Welcome,
}

#[derive(Debug, Default)]
pub struct Orchestrator {
    phase: Phase,
    text: String,
    result: Option<AnalysisResult>,
    error: Option<String>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase() != Phase::Idle
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Input is read-only while a request is outstanding.
    pub fn set_text(&mut self, text: impl Into<String>) -> Result<(), Rejected> {
        if self.is_busy() {
            return Err(Rejected::Busy);
        }
        self.text = text.into();
        Ok(())
    }

    pub fn use_sample(&mut self) -> Result<(), Rejected> {
        self.set_text(SAMPLE_ARTICLE)
    }

    pub fn view(&self) -> View<'_> {
        if self.is_busy() {
            View::Busy(self.phase())
        } else if let Some(error) = &self.error {
            View::Error(error)
        } else if let Some(result) = &self.result {
            View::Report(result)
        } else {
            View::Welcome
        }
    }

    /// Validate and mark an analysis as outstanding. Returns the text to
    /// submit. Previous result and error are cleared here, before the new
    /// request resolves.
    pub fn begin_analysis(&mut self) -> Result<String, Rejected> {
        if self.is_busy() {
            return Err(Rejected::Busy);
        }
        if self.text.trim().is_empty() {
            let message = AnalysisError::EmptyInput.user_message();
            self.error = Some(message.clone());
            return Err(Rejected::Invalid(message));
        }

        self.result = None;
        self.error = None;
        self.phase = Phase::Analyzing;
        Ok(self.text.clone())
    }

    pub fn finish_analysis(&mut self, outcome: Result<AnalysisResult, AnalysisError>) {
        if self.phase() != Phase::Analyzing {
            tracing::warn!("analysis outcome arrived without an outstanding request");
            return;
        }
        match outcome {
            Ok(result) => self.result = Some(result),
            Err(e) => {
                tracing::error!(error = %e, "analysis failed");
                self.error = Some(e.user_message());
            }
        }
        self.phase = Phase::Idle;
    }

    pub async fn analyze<A>(&mut self, service: &A) -> Result<(), Rejected>
    where
        A: AnalysisService + ?Sized,
    {
        let text = self.begin_analysis()?;
        let outcome = service.analyze(&text).await;
        self.finish_analysis(outcome);
        Ok(())
    }

    /// Validate and mark a fetch as outstanding. Clears the result, error
    /// and current text.
    pub fn begin_fetch(&mut self, url: &str) -> Result<String, Rejected> {
        if self.is_busy() {
            return Err(Rejected::Busy);
        }
        let url = url.trim();
        if url.is_empty() {
            let message = AnalysisError::Validation("Please enter a URL to fetch.".to_string()).user_message();
            self.error = Some(message.clone());
            return Err(Rejected::Invalid(message));
        }

        self.result = None;
        self.error = None;
        self.text.clear();
        self.phase = Phase::Fetching;
        Ok(url.to_string())
    }

    pub fn finish_fetch(&mut self, outcome: Result<String, AnalysisError>) {
        if self.phase() != Phase::Fetching {
            tracing::warn!("fetch outcome arrived without an outstanding request");
            return;
        }
        match outcome {
            Ok(text) => self.text = text,
            Err(e) => {
                tracing::error!(error = %e, "fetch failed");
                self.error = Some(e.user_message());
            }
        }
        self.phase = Phase::Idle;
    }

    pub async fn fetch<F>(&mut self, source: &F, url: &str) -> Result<(), Rejected>
    where
        F: ArticleSource + ?Sized,
    {
        let url = self.begin_fetch(url)?;
        let outcome = source.fetch(&url).await;
        self.finish_fetch(outcome);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn starts_on_the_welcome_view() {
        let orchestrator = Orchestrator::new();
        assert_eq!(orchestrator.phase(), Phase::Idle);
        assert_eq!(orchestrator.view(), View::Welcome);
    }

    #[test]
    fn empty_text_is_rejected_with_a_message() {
        let mut orchestrator = Orchestrator::new();
        orchestrator.set_text("  \n ").unwrap();
        let rejected = orchestrator.begin_analysis().unwrap_err();
        assert_eq!(
            rejected,
            Rejected::Invalid("Please enter or fetch some news text to analyze.".to_string())
        );
        assert_eq!(orchestrator.phase(), Phase::Idle);
        assert_eq!(
            orchestrator.view(),
            View::Error("Please enter or fetch some news text to analyze.")
        );
    }

    #[test]
    fn second_submission_while_busy_is_rejected() {
        let mut orchestrator = Orchestrator::new();
        orchestrator.use_sample().unwrap();
        assert_eq!(orchestrator.begin_analysis().unwrap(), SAMPLE_ARTICLE);
        assert_eq!(orchestrator.begin_analysis(), Err(Rejected::Busy));
        assert_eq!(orchestrator.begin_fetch("https://example.com"), Err(Rejected::Busy));
        assert_eq!(orchestrator.set_text("other"), Err(Rejected::Busy));
        assert_eq!(orchestrator.view(), View::Busy(Phase::Analyzing));
    }

    #[test]
    fn failures_leave_the_session_resubmittable() {
        let mut orchestrator = Orchestrator::new();
        orchestrator.set_text("story").unwrap();
        orchestrator.begin_analysis().unwrap();
        orchestrator.finish_analysis(Err(AnalysisError::schema("narrative", "missing required field")));

        assert_eq!(orchestrator.phase(), Phase::Idle);
        assert!(orchestrator.result().is_none());
        assert!(orchestrator.error().unwrap().contains("narrative"));
        assert!(orchestrator.begin_analysis().is_ok());
        assert_eq!(orchestrator.error(), None);
    }

    #[test]
    fn empty_url_is_rejected() {
        let mut orchestrator = Orchestrator::new();
        assert_eq!(
            orchestrator.begin_fetch(" "),
            Err(Rejected::Invalid("Please enter a URL to fetch.".to_string()))
        );
    }

    #[test]
    fn fetch_replaces_the_text() {
        let mut orchestrator = Orchestrator::new();
        orchestrator.set_text("old").unwrap();
        assert_eq!(orchestrator.begin_fetch(" https://example.com/a ").unwrap(), "https://example.com/a");
        assert_eq!(orchestrator.text(), "");
        assert_eq!(orchestrator.view(), View::Busy(Phase::Fetching));

        orchestrator.finish_fetch(Ok("fetched story".to_string()));
        assert_eq!(orchestrator.text(), "fetched story");
        assert_eq!(orchestrator.view(), View::Welcome);
    }

    #[test]
    fn late_outcomes_are_ignored() {
        let mut orchestrator = Orchestrator::new();
        orchestrator.finish_analysis(Err(AnalysisError::Upstream("late".to_string())));
        orchestrator.finish_fetch(Ok("late".to_string()));
        assert_eq!(orchestrator.error(), None);
        assert_eq!(orchestrator.text(), "");
    }
}
