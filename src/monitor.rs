use crate::ledger::Ledger;
use crate::model::Post;
use crate::weibo::WeiboSource;
use std::collections::HashSet;
use url::Url;

/// Watches the posts feeds of a set of users for ids missing from the ledger.
pub struct Monitor<'a> {
    source: &'a dyn WeiboSource,
    ledger: Ledger,
    feed_urls: Vec<Url>,
    /// Feeds whose current posts have not been snapshotted into the ledger yet
    unseeded: HashSet<Url>,
}

impl<'a> Monitor<'a> {
    pub fn new(source: &'a dyn WeiboSource, ledger: Ledger) -> Self {
        Self {
            source,
            ledger,
            feed_urls: Vec::new(),
            unseeded: HashSet::new(),
        }
    }

    /// Looks up the feed URLs of every user, in order. Users that fail to
    /// resolve are logged by the source and contribute nothing.
    pub async fn resolve(&mut self, uids: &[String]) -> usize {
        self.feed_urls.clear();
        for uid in uids {
            let urls = self.source.resolve(uid).await;
            log::debug!("UID {} has {} feed(s)", uid, urls.len());
            self.feed_urls.extend(urls);
        }
        self.unseeded = self.feed_urls.iter().cloned().collect();
        self.feed_urls.len()
    }

    /// Records everything currently in the feeds so only later posts count as new.
    ///
    /// A feed that fails to fetch here stays unseeded and is snapshotted by the
    /// first [`Monitor::detect_new`] that reaches it.
    pub async fn seed(&mut self) -> anyhow::Result<usize> {
        let mut added = 0;
        for url in &self.feed_urls {
            if !self.unseeded.contains(url) {
                continue;
            }
            let posts = match self.source.fetch(url).await {
                Ok(posts) => posts,
                Err(e) => {
                    log::error!("{:#}", e);
                    continue;
                }
            };
            self.unseeded.remove(url);
            added += self.ledger.seed(&posts).await?;
        }
        log::info!(
            "Recorded {} existing post IDs ({} known)",
            added,
            self.ledger.len()
        );
        if !self.unseeded.is_empty() {
            log::warn!(
                "{} feed(s) will be seeded on their first successful fetch",
                self.unseeded.len()
            );
        }
        Ok(added)
    }

    /// Returns the first post, across feeds in order, whose id is not yet in the
    /// ledger, and records it so it is reported only once.
    pub async fn detect_new(&mut self) -> Option<Post> {
        for url in &self.feed_urls {
            let posts = match self.source.fetch(url).await {
                Ok(posts) => posts,
                Err(e) => {
                    log::error!("{:#}", e);
                    continue;
                }
            };
            if self.unseeded.remove(url) {
                match self.ledger.seed(&posts).await {
                    Ok(added) => log::info!("Seeded {} existing post IDs from {}", added, url),
                    Err(e) => log::error!("Unable to seed posts from {}: {:#}", url, e),
                }
                continue;
            }
            if let Some(post) = posts.into_iter().find(|p| !self.ledger.contains(&p.id)) {
                if let Err(e) = self.ledger.record(&post.id).await {
                    log::error!("Unable to record post {}: {:#}", post.id, e);
                }
                log::info!("New post detected: {}", post.id);
                return Some(post);
            }
        }
        None
    }

    /// One poll cycle. Resolves the users again while no feed is known, so a
    /// monitor started without network recovers once it comes back.
    pub async fn poll(&mut self, uids: &[String]) -> Option<Post> {
        if self.feed_urls.is_empty() {
            let feeds = self.resolve(uids).await;
            if feeds > 0 {
                log::info!("Resolved {} feed(s)", feeds);
            }
        }
        self.detect_new().await
    }

    pub fn feed_urls(&self) -> &[Url] {
        &self.feed_urls
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }
}
