use crate::error::{Result, ScanError};
use crate::fetch::{FetchedPage, Fetcher};
use crate::page::Page;
use crate::result::{CitationPair, Publication};
use crate::visited::VisitedSet;
use futures::Stream;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Called before each page visit with the citation level and url.
pub type ProgressCallback = Arc<dyn Fn(u32, String) + Send + Sync>;
/// Called each time a blocked page is about to be polled again.
pub type BlockedCallback = Arc<dyn Fn(String, u32) + Send + Sync>;

/// What to do when a page comes back as an anti-bot interstitial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockPolicy {
    /// Re-fetch every `poll_interval` until the block clears. `max_polls`
    /// bounds the number of waits; `None` waits forever.
    Wait {
        poll_interval: Duration,
        max_polls: Option<u32>,
    },
    /// Fail the walk with [`ScanError::Blocked`].
    Abort,
}

impl Default for BlockPolicy {
    fn default() -> Self {
        BlockPolicy::Wait {
            poll_interval: Duration::from_secs(10),
            max_polls: None,
        }
    }
}

pub struct Crawler<F> {
    fetcher: F,
    depth: u32,
    pages: u32,
    min_delay: Duration,
    max_delay: Duration,
    block_policy: BlockPolicy,
    progress_callback: Option<ProgressCallback>,
    blocked_callback: Option<BlockedCallback>,
}

impl<F: Fetcher> Crawler<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            depth: 1,
            pages: 1,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            block_policy: BlockPolicy::default(),
            progress_callback: None,
            blocked_callback: None,
        }
    }

    /// Citation levels to follow below the start page.
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Result pages to read per citation level. Clamped to at least one.
    pub fn with_pages(mut self, pages: u32) -> Self {
        self.pages = pages.max(1);
        self
    }

    /// Random pause taken before every page fetch.
    pub fn with_delay(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min.min(max);
        self.max_delay = max.max(min);
        self
    }

    pub fn with_block_policy(mut self, policy: BlockPolicy) -> Self {
        self.block_policy = policy;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_blocked_callback(mut self, callback: BlockedCallback) -> Self {
        self.blocked_callback = Some(callback);
        self
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// Starts a fresh walk from `start_url`. Each walk has its own visited
    /// set; nothing carries over between walks.
    pub fn walk(&self, start_url: &str) -> CitationWalk<'_, F> {
        info!(
            "Starting citation walk of {} (depth {}, pages {})",
            start_url, self.depth, self.pages
        );
        CitationWalk {
            crawler: self,
            stack: vec![Task::Visit {
                url: start_url.to_string(),
                depth: self.depth,
                pages: self.pages,
            }],
            visited: VisitedSet::new(),
            pages_fetched: 0,
            pairs_emitted: 0,
            finished: false,
        }
    }

    async fn politeness_delay(&self) {
        if self.max_delay.is_zero() {
            return;
        }
        let delay = rand::thread_rng().gen_range(self.min_delay..=self.max_delay);
        debug!("Waiting {:?} before next fetch", delay);
        tokio::time::sleep(delay).await;
    }
}

enum Task {
    Visit { url: String, depth: u32, pages: u32 },
    Page(PageFrame),
}

/// A fetched page whose entries are being handed out one at a time.
struct PageFrame {
    parent: Option<Publication>,
    entries: VecDeque<Publication>,
    next_url: Option<String>,
    depth: u32,
    pages: u32,
}

enum PageRead {
    Ready(PageFrame),
    Blocked,
}

/// Lazy depth-first walk over a citation graph.
///
/// Pairs come out in pre-order: everything reached through an entry's
/// cited-by page is produced right after that entry's own pair, and a
/// page's pagination continuation comes after all of its entries. The walk
/// is forward-only; once it returns `None` or an error it stays exhausted.
pub struct CitationWalk<'a, F> {
    crawler: &'a Crawler<F>,
    stack: Vec<Task>,
    visited: VisitedSet,
    pages_fetched: usize,
    pairs_emitted: usize,
    finished: bool,
}

impl<'a, F: Fetcher> CitationWalk<'a, F> {
    pub async fn next(&mut self) -> Result<Option<CitationPair>> {
        if self.finished {
            return Ok(None);
        }
        match self.advance().await {
            Ok(None) => {
                self.finished = true;
                if self.pages_fetched > 0 || self.pairs_emitted > 0 {
                    info!(
                        "Citation walk complete. Fetched {} pages, produced {} pairs",
                        self.pages_fetched, self.pairs_emitted
                    );
                }
                Ok(None)
            }
            Err(e) => {
                self.stack.clear();
                self.finished = true;
                Err(e)
            }
            other => other,
        }
    }

    /// Adapts the walk into a stream. An error is yielded once, after which
    /// the stream ends.
    pub fn into_stream(self) -> impl Stream<Item = Result<CitationPair>> + 'a {
        futures::stream::unfold(self, |mut walk| async move {
            match walk.next().await {
                Ok(Some(pair)) => Some((Ok(pair), walk)),
                Ok(None) => None,
                Err(e) => Some((Err(e), walk)),
            }
        })
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn pairs_emitted(&self) -> usize {
        self.pairs_emitted
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    /// True once the walk has returned `None` or an error.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    async fn advance(&mut self) -> Result<Option<CitationPair>> {
        loop {
            let Some(task) = self.stack.pop() else {
                return Ok(None);
            };

            match task {
                Task::Visit { url, depth, pages } => {
                    if !self.visited.try_visit(&url) {
                        debug!("Already visited {}, skipping", url);
                        continue;
                    }
                    match self.load(&url, depth, pages).await {
                        Ok(frame) => self.stack.push(Task::Page(frame)),
                        Err(e) if e.is_blocked() => return Err(e),
                        Err(e) => warn!("Skipping {}: {}", url, e),
                    }
                }
                Task::Page(mut frame) => {
                    if let Some(publication) = frame.entries.pop_front() {
                        let (depth, pages) = (frame.depth, frame.pages);
                        let descend = publication
                            .cited_by_url
                            .clone()
                            .filter(|_| depth > 0);
                        let pair = CitationPair {
                            from: publication,
                            to: frame.parent.clone(),
                        };

                        self.stack.push(Task::Page(frame));
                        if let Some(url) = descend {
                            self.stack.push(Task::Visit {
                                url,
                                depth: depth - 1,
                                pages,
                            });
                        }

                        self.pairs_emitted += 1;
                        return Ok(Some(pair));
                    }

                    if let Some(url) = frame.next_url {
                        self.stack.push(Task::Visit {
                            url,
                            depth: frame.depth,
                            pages: frame.pages - 1,
                        });
                    }
                }
            }
        }
    }

    async fn load(&mut self, url: &str, depth: u32, pages: u32) -> Result<PageFrame> {
        let crawler = self.crawler;
        if let Some(ref callback) = crawler.progress_callback {
            callback(crawler.depth.saturating_sub(depth), url.to_string());
        }

        crawler.politeness_delay().await;

        let mut attempt = 0;
        loop {
            let fetched = crawler.fetcher.fetch(url).await?;
            self.pages_fetched += 1;

            match read_page(url, &fetched, depth, pages)? {
                PageRead::Ready(frame) => return Ok(frame),
                PageRead::Blocked => {
                    attempt += 1;
                    warn!("Blocked by anti-bot check at {} (attempt {})", url, attempt);

                    match crawler.block_policy {
                        BlockPolicy::Abort => {
                            return Err(ScanError::Blocked {
                                url: url.to_string(),
                            });
                        }
                        BlockPolicy::Wait {
                            poll_interval,
                            max_polls,
                        } => {
                            if max_polls.is_some_and(|max| attempt > max) {
                                return Err(ScanError::Blocked {
                                    url: url.to_string(),
                                });
                            }
                            if let Some(ref callback) = crawler.blocked_callback {
                                callback(url.to_string(), attempt);
                            }
                            tokio::time::sleep(poll_interval).await;
                        }
                    }
                }
            }
        }
    }
}

fn read_page(url: &str, fetched: &FetchedPage, depth: u32, pages: u32) -> Result<PageRead> {
    if fetched.status == 429 {
        return Ok(PageRead::Blocked);
    }

    let page = Page::parse(url, &fetched.body)?;
    if page.is_blocked() {
        return Ok(PageRead::Blocked);
    }
    if !(200..300).contains(&fetched.status) {
        warn!("{} returned status {}", url, fetched.status);
    }

    let entries: VecDeque<Publication> = page.publications().into();
    let next_url = if pages > 1 { page.next_page_url() } else { None };
    debug!(
        "Read {} entries from {} (next page: {})",
        entries.len(),
        url,
        next_url.is_some()
    );

    Ok(PageRead::Ready(PageFrame {
        parent: page.parent_publication(),
        entries,
        next_url,
        depth,
        pages,
    }))
}
