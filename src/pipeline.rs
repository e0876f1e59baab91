use std::collections::HashSet;
use std::fmt;

use crate::db::Repository;
use crate::error::Result;
use crate::feed::{LinkFilter, PageFetcher};
use crate::services::{ContentExtractor, Notifier};

/// What happened to a notification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Failed,
    /// The notifier is disabled; nothing was attempted.
    Suppressed,
}

/// Terminal state of one candidate URL within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// Newly fetched and stored, followed by a notification attempt.
    Stored(Delivery),
    /// Already stored but never relayed; the notification was attempted again.
    Retried(Delivery),
    AlreadyPublished,
    /// Neither a headline nor a body could be extracted. Nothing was stored.
    EmptyContent,
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total_links: usize,
    pub filtered_links: usize,
    pub new_articles: usize,
    pub skipped_articles: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    pub notifications_skipped: usize,
    pub errors: Vec<String>,
    pub outcomes: Vec<(String, CandidateOutcome)>,
}

impl RunSummary {
    fn record(&mut self, url: &str, outcome: CandidateOutcome) {
        let delivery = match &outcome {
            CandidateOutcome::Stored(delivery) => {
                self.new_articles += 1;
                Some(*delivery)
            }
            CandidateOutcome::Retried(delivery) => Some(*delivery),
            CandidateOutcome::AlreadyPublished | CandidateOutcome::EmptyContent => {
                self.skipped_articles += 1;
                None
            }
            CandidateOutcome::Failed(message) => {
                self.errors.push(message.clone());
                None
            }
        };

        match delivery {
            Some(Delivery::Sent) => self.notifications_sent += 1,
            Some(Delivery::Failed) => self.notifications_failed += 1,
            Some(Delivery::Suppressed) => self.notifications_skipped += 1,
            None => {}
        }

        self.outcomes.push((url.to_string(), outcome));
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Delivery::Sent => "sent",
            Delivery::Failed => "send failed",
            Delivery::Suppressed => "not attempted",
        };
        f.write_str(text)
    }
}

impl fmt::Display for CandidateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateOutcome::Stored(delivery) => write!(f, "stored, {}", delivery),
            CandidateOutcome::Retried(delivery) => write!(f, "retried, {}", delivery),
            CandidateOutcome::AlreadyPublished => f.write_str("already published"),
            CandidateOutcome::EmptyContent => f.write_str("no content extracted"),
            CandidateOutcome::Failed(message) => write!(f, "failed: {}", message),
        }
    }
}

/// `{:#}` appends one line per candidate.
impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total links found: {}", self.total_links)?;
        writeln!(f, "Links matching pattern: {}", self.filtered_links)?;
        writeln!(f, "New articles saved: {}", self.new_articles)?;
        writeln!(f, "Articles skipped: {}", self.skipped_articles)?;
        writeln!(f, "Notifications sent: {}", self.notifications_sent)?;
        writeln!(f, "Notifications failed: {}", self.notifications_failed)?;
        if self.notifications_skipped > 0 {
            writeln!(f, "Notifications not attempted: {}", self.notifications_skipped)?;
        }
        if !self.errors.is_empty() {
            writeln!(f, "Errors encountered: {}", self.errors.len())?;
            for error in &self.errors {
                writeln!(f, "  - {}", error)?;
            }
        }
        if f.alternate() {
            for (url, outcome) in &self.outcomes {
                writeln!(f, "{}: {}", url, outcome)?;
            }
        }
        Ok(())
    }
}

/// Category page -> candidate links -> stored articles -> notifications.
///
/// Candidates are handled one at a time. A failing candidate is recorded in
/// the summary and the run moves on; only a failure to load the category
/// page aborts the run.
pub struct IngestionPipeline<N> {
    repository: Repository,
    fetcher: PageFetcher,
    extractor: ContentExtractor,
    notifier: N,
}

impl<N: Notifier> IngestionPipeline<N> {
    pub fn new(
        repository: Repository,
        fetcher: PageFetcher,
        extractor: ContentExtractor,
        notifier: N,
    ) -> Self {
        Self {
            repository,
            fetcher,
            extractor,
            notifier,
        }
    }

    #[cfg(test)]
    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    #[cfg(test)]
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub async fn run(&self, source_url: &str, filter: &LinkFilter) -> Result<RunSummary> {
        tracing::info!(source = %source_url, "Fetching category page");
        let page = self.fetcher.fetch(source_url).await?;

        let links = page.links();
        let mut seen = HashSet::new();
        let candidates: Vec<String> = filter
            .filter(&links)
            .into_iter()
            .filter(|link| seen.insert(link.clone()))
            .collect();
        tracing::info!(
            total = links.len(),
            matching = candidates.len(),
            "Extracted candidate links"
        );

        let mut summary = RunSummary {
            total_links: links.len(),
            filtered_links: candidates.len(),
            ..Default::default()
        };

        for (i, url) in candidates.iter().enumerate() {
            tracing::debug!(%url, "[{}/{}] Processing", i + 1, candidates.len());

            let outcome = match self.process_candidate(url).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(%url, "Failed to process article: {}", e);
                    CandidateOutcome::Failed(format!("Error processing {}: {}", url, e))
                }
            };
            tracing::debug!(%url, ?outcome, "Candidate done");
            summary.record(url, outcome);
        }

        tracing::info!(
            new = summary.new_articles,
            sent = summary.notifications_sent,
            failed = summary.notifications_failed,
            errors = summary.errors.len(),
            "Run complete"
        );
        Ok(summary)
    }

    async fn process_candidate(&self, url: &str) -> Result<CandidateOutcome> {
        if self.repository.exists(url).await? {
            if !self.repository.is_unpublished(url).await? {
                return Ok(CandidateOutcome::AlreadyPublished);
            }
            let Some(article) = self.repository.get_article(url).await? else {
                return Ok(CandidateOutcome::AlreadyPublished);
            };
            tracing::debug!(
                %url,
                id = article.id,
                fetched_at = %article.fetched_at,
                state = ?article.state,
                "Retrying notification for stored article"
            );
            let delivery = self
                .notify(url, &article.headline, &article.article_date, &article.body)
                .await?;
            return Ok(CandidateOutcome::Retried(delivery));
        }

        let page = self.fetcher.fetch(url).await?;
        let content = self.extractor.extract(&page.html);
        if content.is_empty() {
            tracing::debug!(%url, "No content extracted");
            return Ok(CandidateOutcome::EmptyContent);
        }

        let new_article = content.clone().into_new_article(url);
        let id = self.repository.insert_article(new_article).await?;
        tracing::info!(%url, id, headline = %content.headline, "Stored article");

        let delivery = self
            .notify(url, &content.headline, &content.date, &content.body)
            .await?;
        Ok(CandidateOutcome::Stored(delivery))
    }

    /// A delivered notification is the only thing that publishes an article.
    async fn notify(&self, url: &str, headline: &str, date: &str, body: &str) -> Result<Delivery> {
        if !self.notifier.is_enabled() {
            return Ok(Delivery::Suppressed);
        }

        if self.notifier.send(headline, url, date, body).await {
            self.repository.mark_published(url).await?;
            Ok(Delivery::Sent)
        } else {
            Ok(Delivery::Failed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{ExtractionRules, TelegramNotifier};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::TempDir;

    const PARAGRAPH: &str =
        "The lab published a detailed report describing how the new system was trained and evaluated.";

    #[derive(Default)]
    struct RecordingNotifier {
        failing: Vec<String>,
        sent: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn failing_for(suffix: &str) -> Self {
            Self {
                failing: vec![suffix.to_string()],
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn is_enabled(&self) -> bool {
            true
        }

        async fn send(&self, _headline: &str, url: &str, _date: &str, _body: &str) -> bool {
            if self.failing.iter().any(|suffix| url.ends_with(suffix.as_str())) {
                return false;
            }
            self.sent.lock().unwrap().push(url.to_string());
            true
        }
    }

    struct Fixture {
        dir: TempDir,
        category: PathBuf,
    }

    impl Fixture {
        fn path(&self, relative: &str) -> String {
            self.dir.path().join(relative).to_string_lossy().to_string()
        }

        fn db_path(&self) -> String {
            self.path("articles.db")
        }
    }

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn article_html(headline: &str) -> String {
        format!(
            "<html><head><title>{headline} | Example</title></head><body>\
             <article><h1>{headline}</h1><time>November 6, 2025</time><p>{PARAGRAPH}</p></article>\
             </body></html>"
        )
    }

    /// Category page with three `/2025/` links (one without usable content),
    /// two non-matching links and a repeated link.
    fn fixture(extra_links: &[&str]) -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        write(&root.join("2025/a.html"), &article_html("Story A"));
        write(&root.join("2025/b.html"), &article_html("Story B"));
        write(&root.join("2025/empty.html"), "<html><body><div>menu</div></body></html>");
        write(&root.join("2024/old.html"), &article_html("Old story"));
        write(&root.join("about.html"), &article_html("About"));

        let mut hrefs: Vec<String> = ["2025/a.html", "2024/old.html", "2025/b.html", "about.html", "2025/empty.html", "2025/a.html"]
            .iter()
            .map(|p| root.join(p).to_string_lossy().to_string())
            .collect();
        hrefs.extend(extra_links.iter().map(|p| root.join(p).to_string_lossy().to_string()));

        let anchors: String = hrefs
            .iter()
            .map(|href| format!("<a href=\"{href}\">link</a>\n"))
            .collect();
        let category = root.join("category.html");
        write(&category, &format!("<html><body>{anchors}</body></html>"));

        Fixture { dir, category }
    }

    async fn pipeline<N: Notifier>(fixture: &Fixture, notifier: N) -> IngestionPipeline<N> {
        let repository = Repository::new(&fixture.db_path()).await.unwrap();
        let fetcher = PageFetcher::new(5).unwrap();
        let extractor = ContentExtractor::new(&ExtractionRules::default()).unwrap();
        IngestionPipeline::new(repository, fetcher, extractor, notifier)
    }

    fn year_filter() -> LinkFilter {
        LinkFilter::new("*/2025/*", false).unwrap()
    }

    #[tokio::test]
    async fn processes_only_matching_candidates() {
        let fixture = fixture(&[]);
        let pipeline = pipeline(&fixture, RecordingNotifier::failing_for("b.html")).await;

        let summary = pipeline
            .run(fixture.category.to_str().unwrap(), &year_filter())
            .await
            .unwrap();

        assert_eq!(summary.total_links, 6);
        assert_eq!(summary.filtered_links, 3);
        assert_eq!(
            summary.outcomes,
            vec![
                (fixture.path("2025/a.html"), CandidateOutcome::Stored(Delivery::Sent)),
                (fixture.path("2025/b.html"), CandidateOutcome::Stored(Delivery::Failed)),
                (fixture.path("2025/empty.html"), CandidateOutcome::EmptyContent),
            ]
        );
        assert_eq!(summary.new_articles, 2);
        assert_eq!(summary.skipped_articles, 1);
        assert_eq!(summary.notifications_sent, 1);
        assert_eq!(summary.notifications_failed, 1);
        assert!(summary.errors.is_empty());

        let repo = pipeline.repository();
        assert!(!repo.is_unpublished(&fixture.path("2025/a.html")).await.unwrap());
        assert!(repo.is_unpublished(&fixture.path("2025/b.html")).await.unwrap());
        assert!(!repo.exists(&fixture.path("2025/empty.html")).await.unwrap());

        let stored = repo.get_article(&fixture.path("2025/a.html")).await.unwrap().unwrap();
        assert_eq!(stored.headline, "Story A");
        assert_eq!(stored.article_date, "November 6, 2025");
        assert_eq!(stored.body, PARAGRAPH);
    }

    #[tokio::test]
    async fn failed_notifications_are_retried_on_the_next_run() {
        let fixture = fixture(&[]);
        let source = fixture.category.to_str().unwrap().to_string();

        {
            let first = pipeline(&fixture, RecordingNotifier::failing_for("b.html")).await;
            first.run(&source, &year_filter()).await.unwrap();
        }

        let second = pipeline(&fixture, RecordingNotifier::default()).await;
        let summary = second.run(&source, &year_filter()).await.unwrap();

        assert_eq!(
            summary.outcomes,
            vec![
                (fixture.path("2025/a.html"), CandidateOutcome::AlreadyPublished),
                (fixture.path("2025/b.html"), CandidateOutcome::Retried(Delivery::Sent)),
                (fixture.path("2025/empty.html"), CandidateOutcome::EmptyContent),
            ]
        );
        assert_eq!(summary.new_articles, 0);
        assert_eq!(second.notifier().sent(), vec![fixture.path("2025/b.html")]);
        assert!(!second
            .repository()
            .is_unpublished(&fixture.path("2025/b.html"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn bad_article_does_not_abort_the_batch() {
        let fixture = fixture(&["2025/missing.html"]);
        let pipeline = pipeline(&fixture, RecordingNotifier::default()).await;

        let summary = pipeline
            .run(fixture.category.to_str().unwrap(), &year_filter())
            .await
            .unwrap();

        assert_eq!(summary.filtered_links, 4);
        assert_eq!(summary.new_articles, 2);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].contains("missing.html"));
        assert!(matches!(
            summary.outcomes.last(),
            Some((_, CandidateOutcome::Failed(_)))
        ));
    }

    #[test]
    fn alternate_summary_lists_each_candidate() {
        let mut summary = RunSummary::default();
        summary.record("https://x/2025/a", CandidateOutcome::Stored(Delivery::Sent));
        summary.record("https://x/2025/b", CandidateOutcome::Retried(Delivery::Failed));
        summary.record("https://x/2025/c", CandidateOutcome::AlreadyPublished);

        let plain = summary.to_string();
        assert!(plain.contains("New articles saved: 1"));
        assert!(!plain.contains("https://x/2025/a"));

        let verbose = format!("{:#}", summary);
        assert!(verbose.contains("https://x/2025/a: stored, sent\n"));
        assert!(verbose.contains("https://x/2025/b: retried, send failed\n"));
        assert!(verbose.contains("https://x/2025/c: already published\n"));
    }

    #[tokio::test]
    async fn unreadable_category_page_is_fatal() {
        let fixture = fixture(&[]);
        let pipeline = pipeline(&fixture, RecordingNotifier::default()).await;

        let result = pipeline
            .run(&fixture.path("no-such-page.html"), &year_filter())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn disabled_notifier_leaves_articles_unpublished() {
        let fixture = fixture(&[]);
        let pipeline = pipeline(&fixture, TelegramNotifier::disabled()).await;

        let summary = pipeline
            .run(fixture.category.to_str().unwrap(), &year_filter())
            .await
            .unwrap();

        assert_eq!(summary.new_articles, 2);
        assert_eq!(summary.notifications_sent, 0);
        assert_eq!(summary.notifications_failed, 0);
        assert_eq!(summary.notifications_skipped, 2);
        assert!(pipeline
            .repository()
            .is_unpublished(&fixture.path("2025/a.html"))
            .await
            .unwrap());
    }
}
