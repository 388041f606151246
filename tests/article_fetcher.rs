use news_examer::config::FetchConfig;
use news_examer::{AnalysisError, ArticleFetcher};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Tech</title><style>body { color: red; }</style></head>
<body>
  <nav>Home | World | Tech</nav>
  <article>
    <h1>QuantumLeap unveils Synapse</h1>
    <p>The headband translates thoughts with 99% accuracy.</p>
    <script>trackPageView();</script>
    <p>Critics &amp; ethicists urge caution.</p>
  </article>
  <footer>Copyright</footer>
</body>
</html>"#;

fn fetcher() -> ArticleFetcher {
    ArticleFetcher::new(&FetchConfig::default()).unwrap()
}

#[tokio::test]
async fn html_pages_are_reduced_to_the_article() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tech/synapse"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PAGE, "text/html; charset=utf-8"))
        .mount(&server)
        .await;

    let text = fetcher()
        .fetch(&format!("{}/tech/synapse", server.uri()))
        .await
        .unwrap();

    assert_eq!(
        text,
        "QuantumLeap unveils Synapse\n\nThe headband translates thoughts with 99% accuracy.\n\nCritics & ethicists urge caution."
    );
}

#[tokio::test]
async fn plain_text_is_passed_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("  MindBridge   shares dipped.  ", "text/plain"))
        .mount(&server)
        .await;

    let text = fetcher().fetch(&server.uri()).await.unwrap();
    assert_eq!(text, "MindBridge shares dipped.");
}

#[tokio::test]
async fn error_status_is_a_fetch_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = format!("{}/missing", server.uri());
    let error = fetcher().fetch(&url).await.unwrap_err();
    assert_eq!(
        error,
        AnalysisError::Fetch(format!("Could not fetch {}: server answered HTTP 404", url))
    );
}

#[tokio::test]
async fn binary_content_is_refused() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8, 1, 2], "image/png"))
        .mount(&server)
        .await;

    let error = fetcher().fetch(&server.uri()).await.unwrap_err();
    assert!(matches!(error, AnalysisError::Fetch(ref m) if m.contains("image/png")));
}

#[tokio::test]
async fn non_http_urls_are_rejected_before_any_request() {
    let error = fetcher().fetch("ftp://example.com/story").await.unwrap_err();
    assert!(error.is_validation());

    let error = fetcher().fetch("   ").await.unwrap_err();
    assert_eq!(error, AnalysisError::Validation("Please enter a URL to fetch.".to_string()));
}
