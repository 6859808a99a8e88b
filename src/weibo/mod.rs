pub mod container;

use crate::model::Post;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use url::Url;

/// Where the monitor gets its feeds and posts from.
#[async_trait]
pub trait WeiboSource {
    /// Feed URLs for a user's posts tab. Failures are logged and yield no URLs.
    async fn resolve(&self, uid: &str) -> Vec<Url>;

    /// The current page of posts behind a feed URL.
    async fn fetch(&self, feed_url: &Url) -> anyhow::Result<Vec<Post>>;
}

pub(crate) fn header_map(table: HashMap<HeaderName, &'static str>) -> HeaderMap {
    table
        .into_iter()
        .map(|(name, value)| (name, HeaderValue::from_static(value)))
        .collect()
}
