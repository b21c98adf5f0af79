//! Job-posting fetcher: plain job-description text from a posting URL.
//!
//! Heuristic by nature. The largest element matching a known job-description
//! selector wins, falling back to `<body>`. Navigation chrome, scripts and
//! forms are skipped, and short UI fragments are dropped line by line.

use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER, USER_AGENT};
use scraper::{ElementRef, Html, Node, Selector};
use thiserror::Error;
use tracing::{info, warn};

const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
const MIN_LINE_CHARS: usize = 10;
const SHORT_RESULT_CHARS: usize = 150;

const CONTAINER_SELECTORS: &[&str] = &[
    r#"div[class*="job-description"]"#,
    r#"div[id*="job-description"]"#,
    r#"div[class*="jobdescription"]"#,
    r#"div[id*="jobdescription"]"#,
    r#"div[class*="job-details"]"#,
    r#"div[id*="job-details"]"#,
    r#"div[class*="jobDetails"]"#,
    r#"div[id*="jobDetails"]"#,
    r#"section[class*="job-description"]"#,
    r#"article[class*="job-description"]"#,
    r#"div[role="main"]"#,
    "main",
];

/// Elements whose text is never part of a job description.
const NOISE_TAGS: &[&str] = &[
    "script", "style", "noscript", "button", "input", "select", "nav", "header", "footer",
    "aside", "form", "figure", "img", "svg",
];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid job posting URL: {0}")]
    InvalidUrl(String),

    #[error("The request timed out.")]
    Timeout,

    #[error("Could not fetch URL (HTTP {0}). Check the URL or website permissions.")]
    Status(u16),

    #[error("URL points to non-HTML content ({0})")]
    NotHtml(String),

    #[error("Could not fetch URL: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Could not find body tag in HTML.")]
    NoBody,
}

fn container_selectors() -> &'static [Selector] {
    static SELECTORS: OnceLock<Vec<Selector>> = OnceLock::new();
    SELECTORS.get_or_init(|| {
        CONTAINER_SELECTORS
            .iter()
            .map(|s| Selector::parse(s).expect("container selector is valid"))
            .collect()
    })
}

fn body_selector() -> &'static Selector {
    static BODY: OnceLock<Selector> = OnceLock::new();
    BODY.get_or_init(|| Selector::parse("body").expect("body selector is valid"))
}

/// Downloads `url` and extracts its job-description text.
pub async fn fetch_job_description(
    client: &reqwest::Client,
    url: &str,
) -> Result<String, FetchError> {
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(FetchError::InvalidUrl(url.to_string()));
    }

    let response = client
        .get(url)
        .header(USER_AGENT, BROWSER_USER_AGENT)
        .header(
            ACCEPT,
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
        .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
        .header(REFERER, "https://www.google.com/")
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .map_err(request_error)?;

    let status = response.status();
    if !status.is_success() {
        warn!("Error fetching URL {url}: HTTP {status}");
        return Err(FetchError::Status(status.as_u16()));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !content_type.contains("html") {
        return Err(FetchError::NotHtml(content_type));
    }

    let html = response.text().await.map_err(request_error)?;
    let text = extract_job_text(&html)?;
    info!("Scraped job description (length: {} chars)", text.chars().count());
    Ok(text)
}

fn request_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Request(e)
    }
}

/// Extracts job-description text from an HTML page.
pub fn extract_job_text(html: &str) -> Result<String, FetchError> {
    let document = Html::parse_document(html);

    let best = container_selectors()
        .iter()
        .flat_map(|selector| document.select(selector))
        .max_by_key(|el| visible_text_len(*el));

    let lines = match best {
        Some(container) => visible_lines(container),
        None => {
            warn!("No job description container matched, falling back to body text");
            let body = document
                .select(body_selector())
                .next()
                .ok_or(FetchError::NoBody)?;
            visible_lines(body)
        }
    };

    let text = lines
        .iter()
        .filter(|l| l.chars().count() > MIN_LINE_CHARS || l.ends_with(':'))
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");

    if text.chars().count() < SHORT_RESULT_CHARS {
        warn!(
            "Extracted text seems too short ({} chars), scraping may have failed",
            text.chars().count()
        );
    }
    Ok(text)
}

fn visible_text_len(element: ElementRef<'_>) -> usize {
    element.text().map(|t| t.trim().len()).sum()
}

/// Trimmed, non-empty text nodes under `element`, skipping [`NOISE_TAGS`] subtrees.
fn visible_lines(element: ElementRef<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    collect_lines(element, &mut lines);
    lines
}

fn collect_lines(element: ElementRef<'_>, out: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    out.push(text.to_string());
                }
            }
            Node::Element(el) if NOISE_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_lines(child, out);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSTING: &str = r#"<!DOCTYPE html>
<html>
<head><title>Careers</title><style>.x { color: red; }</style></head>
<body>
  <nav><a href="/">Home</a> <a href="/jobs">All open positions at Acme</a></nav>
  <div class="sidebar">Short</div>
  <div class="job-description-wrapper">
    <h1>Senior Rust Engineer</h1>
    <h2>Requirements:</h2>
    <ul>
      <li>5+ years building backend services</li>
      <li>Experience with async Rust and tokio</li>
      <li>Go</li>
    </ul>
    <script>trackPageView("job-123-description");</script>
    <form><button>Apply for this position now</button></form>
  </div>
  <footer>Copyright Acme Corporation 2024</footer>
</body>
</html>"#;

    #[test]
    fn test_extract_job_text_picks_container_and_drops_noise() {
        let text = extract_job_text(POSTING).unwrap();
        assert_eq!(
            text,
            "Senior Rust Engineer\nRequirements:\n5+ years building backend services\nExperience with async Rust and tokio"
        );
    }

    #[test]
    fn test_extract_job_text_prefers_largest_container() {
        let html = r#"<html><body>
            <main><p>Tiny main section text</p></main>
            <div id="jobDetails"><p>We are hiring a platform engineer to own our build tooling.</p>
            <p>You will design caching layers for our CI fleet.</p></div>
        </body></html>"#;
        let text = extract_job_text(html).unwrap();
        assert!(text.contains("platform engineer"));
        assert!(!text.contains("Tiny main"));
    }

    #[test]
    fn test_extract_job_text_falls_back_to_body() {
        let html = r#"<html><body>
            <header>Acme Careers Portal Header</header>
            <p>Data engineer wanted for streaming pipelines.</p>
            <p>OK</p>
            <footer>Footer text that is long enough</footer>
        </body></html>"#;
        let text = extract_job_text(html).unwrap();
        assert_eq!(text, "Data engineer wanted for streaming pipelines.");
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_http_url() {
        let client = reqwest::Client::new();
        let err = fetch_job_description(&client, "ftp://example.com/job")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
