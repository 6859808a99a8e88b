//! Client for the m.weibo.cn `container/getIndex` endpoint, which serves both
//! the user-info document (tabs) and each tab's card feed.

use crate::model::{Post, POST_CARD_TYPE};
use crate::weibo::{header_map, WeiboSource};
use anyhow::{bail, Context};
use async_trait::async_trait;
use maplit::hashmap;
use reqwest::header::{ACCEPT_LANGUAGE, CONNECTION, CONTENT_TYPE, REFERER, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

pub const API_BASE: &str = "https://m.weibo.cn/api/container/getIndex";
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36";

const POSTS_TAB_TYPE: &str = "weibo";

#[derive(Clone)]
pub struct WeiboClient {
    client: Client,
    base: Url,
}

#[derive(Deserialize, Default)]
struct ContainerResponse {
    ok: Option<i64>,
    msg: Option<String>,
    data: Option<ContainerData>,
}

#[derive(Deserialize, Default)]
struct ContainerData {
    #[serde(rename = "tabsInfo")]
    tabs_info: Option<TabsInfo>,
    cards: Option<Vec<Card>>,
}

#[derive(Deserialize, Default)]
struct TabsInfo {
    tabs: Option<Vec<Tab>>,
}

#[derive(Deserialize)]
struct Tab {
    tab_type: Option<String>,
    containerid: Option<String>,
}

#[derive(Deserialize)]
struct Card {
    card_type: Option<i64>,
    mblog: Option<Mblog>,
}

#[derive(Deserialize)]
struct Mblog {
    id: Option<String>,
    created_at: Option<String>,
    text: Option<String>,
    source: Option<String>,
    user: Option<MblogUser>,
    pics: Option<Vec<Pic>>,
}

#[derive(Deserialize)]
struct MblogUser {
    screen_name: Option<String>,
}

#[derive(Deserialize)]
struct Pic {
    large: Option<PicVariant>,
}

#[derive(Deserialize)]
struct PicVariant {
    url: Option<String>,
}

async fn deserialize_response<T: DeserializeOwned>(response: Response) -> anyhow::Result<T> {
    let status = response.status();
    let text = response.text().await.context("Bad response text")?;
    if status != StatusCode::OK {
        let code = status.as_u16();
        bail!("Response was not successful: {code}")
    }
    serde_json::from_str::<T>(&text).context("Unable to deserialize response")
}

impl WeiboClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        Self::with_base(Url::parse(API_BASE)?, timeout)
    }

    pub fn with_base(base: Url, timeout: Duration) -> anyhow::Result<Self> {
        let headers = header_map(hashmap! {
            USER_AGENT => BROWSER_USER_AGENT,
            CONTENT_TYPE => "application/x-www-form-urlencoded",
            REFERER => "https://passport.weibo.cn/signin/login",
            CONNECTION => "close",
            ACCEPT_LANGUAGE => "zh-CN,zh;q=0.8,en-US;q=0.5,en;q=0.3",
        });
        Ok(Self {
            client: Client::builder()
                .default_headers(headers)
                .timeout(timeout)
                .build()?,
            base,
        })
    }

    fn container_url(&self, uid: &str, container_id: Option<&str>) -> Url {
        let mut url = self.base.clone();
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            query.append_pair("type", "uid").append_pair("value", uid);
            if let Some(container_id) = container_id {
                query.append_pair("containerid", container_id);
            }
        }
        url
    }

    async fn get_container(&self, url: Url) -> anyhow::Result<ContainerResponse> {
        let response = self.client.get(url).send().await?;
        let container = deserialize_response::<ContainerResponse>(response).await?;
        if container.ok == Some(0) && container.data.is_none() {
            bail!(
                "API refused the request: {}",
                container.msg.as_deref().unwrap_or("no message")
            )
        }
        Ok(container)
    }

    async fn try_resolve(&self, uid: &str) -> anyhow::Result<Vec<Url>> {
        let container = self.get_container(self.container_url(uid, None)).await?;
        Ok(self.feed_urls(uid, container))
    }

    fn feed_urls(&self, uid: &str, container: ContainerResponse) -> Vec<Url> {
        let tabs = container
            .data
            .and_then(|d| d.tabs_info)
            .and_then(|t| t.tabs)
            .unwrap_or_default();
        tabs.into_iter()
            .filter(|tab| tab.tab_type.as_deref() == Some(POSTS_TAB_TYPE))
            .filter_map(|tab| tab.containerid)
            .map(|container_id| self.container_url(uid, Some(&container_id)))
            .collect()
    }
}

#[async_trait]
impl WeiboSource for WeiboClient {
    async fn resolve(&self, uid: &str) -> Vec<Url> {
        match self.try_resolve(uid).await {
            Ok(urls) => {
                if urls.is_empty() {
                    log::warn!("No posts tab found for UID {}", uid);
                }
                urls
            }
            Err(e) => {
                log::error!("Failed to fetch user info for UID {}: {:#}", uid, e);
                Vec::new()
            }
        }
    }

    async fn fetch(&self, feed_url: &Url) -> anyhow::Result<Vec<Post>> {
        let container = self
            .get_container(feed_url.clone())
            .await
            .with_context(|| format!("Failed to fetch posts for URL {}", feed_url))?;
        Ok(convert_cards(
            container.data.and_then(|d| d.cards).unwrap_or_default(),
        ))
    }
}

fn convert_cards(cards: Vec<Card>) -> Vec<Post> {
    cards
        .into_iter()
        .filter(|card| card.card_type == Some(POST_CARD_TYPE))
        .filter_map(|card| match card.mblog.map(Mblog::convert) {
            Some(Ok(post)) => Some(post),
            Some(Err(e)) => {
                log::warn!("Skipping post card: {:#}", e);
                None
            }
            None => {
                log::warn!("Skipping post card without mblog");
                None
            }
        })
        .collect()
}

impl Mblog {
    fn convert(self) -> anyhow::Result<Post> {
        let id = self.id.context("Post is missing an id")?;
        let image_urls = self
            .pics
            .unwrap_or_default()
            .into_iter()
            .filter_map(|pic| pic.large.and_then(|large| large.url))
            .filter_map(|url| match Url::parse(&url) {
                Ok(url) => Some(url),
                Err(e) => {
                    log::warn!("Ignoring bad image URL {} on post {}: {}", url, id, e);
                    None
                }
            })
            .collect();
        Ok(Post {
            id,
            created_at: self.created_at.unwrap_or_default(),
            text: self.text.unwrap_or_default(),
            source: self.source.unwrap_or_default(),
            author_name: self
                .user
                .and_then(|u| u.screen_name)
                .unwrap_or_default(),
            image_urls,
        })
    }
}
