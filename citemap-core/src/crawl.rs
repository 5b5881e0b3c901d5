use crate::graph::CitationGraph;
use citemap_scanner::{BlockPolicy, Crawler, Fetcher, ScanError};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use url::Url;

/// Search endpoint used for free-text queries.
pub const DEFAULT_SEARCH_URL: &str = "https://scholar.google.com/scholar";

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub start_url: String,
    pub depth: u32,
    pub pages: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub block_policy: BlockPolicy,
    pub show_progress_bars: bool,
}

impl CrawlOptions {
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            depth: 1,
            pages: 1,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            block_policy: BlockPolicy::default(),
            show_progress_bars: false,
        }
    }
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// A crawl stopped by a persistent anti-bot block. `partial` holds
/// everything gathered before the block.
#[derive(Error, Debug)]
#[error("crawl aborted: {error}")]
pub struct CrawlAbort {
    pub error: ScanError,
    pub partial: CitationGraph,
}

/// Turns the CLI target into a start url. Anything that parses as an
/// http(s) url is used as-is; everything else is a search query.
pub fn resolve_target(input: &str, search_url: &str) -> Result<String, ScanError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ScanError::InvalidUrl("empty search target".to_string()));
    }

    if let Ok(url) = Url::parse(input)
        && matches!(url.scheme(), "http" | "https")
    {
        return Ok(url.to_string());
    }

    let url = Url::parse_with_params(search_url, &[("q", input)])
        .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", search_url, e)))?;
    Ok(url.to_string())
}

/// Walks the citation graph from `options.start_url` and accumulates it.
pub async fn execute_crawl<F: Fetcher>(
    fetcher: F,
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CitationGraph, CrawlAbort> {
    let CrawlOptions {
        start_url,
        depth,
        pages,
        min_delay,
        max_delay,
        block_policy,
        show_progress_bars,
    } = options;

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Starting crawl...");
        Some(Arc::new(pb))
    } else {
        None
    };

    let pages_seen = Arc::new(AtomicUsize::new(0));
    let pages_seen_clone = pages_seen.clone();
    let pb_clone = progress_bar.clone();
    let page_progress: citemap_scanner::ProgressCallback = Arc::new(move |level: u32, url: String| {
        let count = pages_seen_clone.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(ref pb) = pb_clone {
            pb.set_message(format!("Page {} (citation level {}): {}", count, level, url));
        }
    });

    let pb_clone = progress_bar.clone();
    let message_callback = progress_callback.clone();
    let poll_interval = match block_policy {
        BlockPolicy::Wait { poll_interval, .. } => poll_interval,
        BlockPolicy::Abort => Duration::ZERO,
    };
    let blocked: citemap_scanner::BlockedCallback = Arc::new(move |url: String, attempt: u32| {
        let message = format!(
            "[!] Anti-bot check at {} (attempt {}). Clear it in a browser on this network; \
             retrying in {}s",
            url,
            attempt,
            poll_interval.as_secs()
        );
        match (&pb_clone, &message_callback) {
            (Some(pb), _) => pb.suspend(|| eprintln!("{}", message)),
            (None, Some(callback)) => callback(message),
            (None, None) => {}
        }
    });

    let crawler = Crawler::new(fetcher)
        .with_depth(depth)
        .with_pages(pages)
        .with_delay(min_delay, max_delay)
        .with_block_policy(block_policy)
        .with_progress_callback(page_progress)
        .with_blocked_callback(blocked);

    if let Some(ref callback) = progress_callback {
        callback(format!(
            "Crawling {} (depth {}, pages {})",
            start_url, depth, pages
        ));
    }

    let mut graph = CitationGraph::new();
    let mut walk = crawler.walk(&start_url);
    let outcome = loop {
        match walk.next().await {
            Ok(Some(pair)) => graph.add_pair(pair),
            Ok(None) => break Ok(()),
            Err(error) => break Err(error),
        }
    };

    let fetched = walk.pages_fetched();
    if let Some(ref pb) = progress_bar {
        if outcome.is_ok() {
            pb.finish_with_message(format!(
                "Crawl complete! {} pages, {} publications",
                fetched,
                graph.node_count()
            ));
        } else {
            pb.abandon_with_message("Crawl blocked");
        }
    }

    match outcome {
        Ok(()) => {
            info!(
                "Crawl finished with {} publications and {} citations",
                graph.node_count(),
                graph.edge_count()
            );
            Ok(graph)
        }
        Err(error) => Err(CrawlAbort {
            error,
            partial: graph,
        }),
    }
}

/// Generate a text summary of a finished graph
pub fn generate_graph_summary(graph: &CitationGraph) -> String {
    let mut report = String::new();
    report.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    report.push_str("# Summary:\n");
    report.push_str(&format!("  Publications: {}\n", graph.node_count()));
    report.push_str(&format!("  Citations: {}\n", graph.edge_count()));
    report.push_str(&format!("  Communities: {}\n", graph.community_count()));

    let mut cited: Vec<_> = graph
        .nodes()
        .filter_map(|node| node.attrs.cited_by.map(|count| (count, node)))
        .collect();
    cited.sort_by(|a, b| b.0.cmp(&a.0));

    if !cited.is_empty() {
        report.push_str("\n## Most cited\n");
        for (count, node) in cited.iter().take(5) {
            let year = node.attrs.year.as_deref().unwrap_or("Unknown");
            report.push_str(&format!("  {:>6}  {} ({})\n", count, node.label(), year));
        }
    }

    report.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    report
}
