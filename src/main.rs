mod download;
mod ledger;
mod model;
mod monitor;
mod weibo;

#[cfg(test)]
mod test_server;

use crate::download::{ImageDownloader, DEFAULT_PIC_DIR};
use crate::ledger::{Ledger, DEFAULT_LEDGER_PATH};
use crate::model::Post;
use crate::monitor::Monitor;
use crate::weibo::container::WeiboClient;
use anyhow::{bail, Context};
use clap::Parser;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[derive(Parser, Debug)]
#[clap(version)]
struct Args {
    /// User ID(s) to monitor (comma seperated)
    #[clap(short, long, default_value = "7875358430")]
    uids: String,
    /// File containing additional user IDs to monitor (one per line)
    #[clap(short, long)]
    list: Option<PathBuf>,
    /// File recording the IDs of posts already seen
    #[clap(long, default_value = DEFAULT_LEDGER_PATH)]
    ledger: PathBuf,
    /// Where to save images attached to new posts
    #[clap(long, default_value = DEFAULT_PIC_DIR)]
    pic_dir: PathBuf,
    /// Seconds to wait between polls
    #[clap(long, default_value_t = 5)]
    interval: u64,
    /// HTTP request timeout in seconds
    #[clap(long, default_value_t = 10)]
    timeout: u64,
    /// Don't download images attached to new posts
    #[clap(long)]
    no_download: bool,
    /// Check for a new post once and exit instead of polling
    #[clap(long)]
    once: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(e) = main2().await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

async fn main2() -> anyhow::Result<()> {
    let args: Args = Args::parse();
    let uids = parse_uids(&args).await?;
    let timeout = Duration::from_secs(args.timeout);

    let downloader = if args.no_download {
        None
    } else {
        fs::create_dir_all(&args.pic_dir)
            .await
            .context("Unable to create image directory")?;
        Some(ImageDownloader::new(timeout).context("Unable to build image client")?)
    };

    let client = WeiboClient::new(timeout).context("Unable to build API client")?;
    let ledger = Ledger::open(&args.ledger).await?;
    if ledger.is_empty() {
        log::info!("Starting a new ledger at {}", ledger.path().display());
    } else {
        log::info!(
            "Loaded {} known post IDs from {}",
            ledger.len(),
            ledger.path().display()
        );
    }

    let mut monitor = Monitor::new(&client, ledger);
    let feeds = monitor.resolve(&uids).await;
    log::info!("Monitoring {} feed(s) for {} user(s)", feeds, uids.len());
    for url in monitor.feed_urls() {
        log::debug!("Feed: {}", url);
    }
    if feeds == 0 {
        log::warn!("No feeds resolved, retrying every poll");
    }
    monitor.seed().await.context("Unable to seed ledger")?;

    let interval = Duration::from_secs(args.interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        if let Some(post) = monitor.poll(&uids).await {
            report(&post, downloader.as_ref(), &args.pic_dir).await;
        }
        if args.once {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown => {
                log::info!("Interrupted, stopping");
                break;
            }
        }
    }
    log::info!("{} post IDs known", monitor.ledger().len());
    Ok(())
}

async fn report(post: &Post, downloader: Option<&ImageDownloader>, pic_dir: &Path) {
    log::info!("New post details: {}", post);
    if let Some(downloader) = downloader {
        if !post.image_urls.is_empty() {
            let saved = downloader.download(&post.image_urls, pic_dir).await;
            log::info!(
                "Saved {}/{} images for post {}",
                saved.len(),
                post.image_urls.len(),
                post.id
            );
        }
    }
}

async fn parse_uids(args: &Args) -> anyhow::Result<Vec<String>> {
    let mut candidates: Vec<String> = args
        .uids
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if let Some(list) = &args.list {
        let list = fs::read_to_string(list)
            .await
            .context("Unable to read UID list")?;
        candidates.extend(
            list.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
    }
    // Keep first-seen order, feeds are polled in this order
    let mut seen = BTreeSet::new();
    candidates.retain(|uid| seen.insert(uid.clone()));
    if candidates.is_empty() {
        bail!("No user IDs provided")
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uids_merge_in_first_seen_order() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("uids.txt");
        fs::write(&list, "300\n\n 100 \n").await.unwrap();
        let args = Args::parse_from(vec![
            "weibo-monitor".to_string(),
            "--uids".to_string(),
            "200, 100,".to_string(),
            "--list".to_string(),
            list.display().to_string(),
        ]);
        assert_eq!(parse_uids(&args).await.unwrap(), vec!["200", "100", "300"]);
    }

    #[tokio::test]
    async fn empty_uids_is_an_error() {
        let args = Args::parse_from(["weibo-monitor", "--uids", " , "]);
        assert!(parse_uids(&args).await.is_err());
    }

    #[test]
    fn defaults() {
        let args = Args::parse_from(["weibo-monitor"]);
        assert_eq!(args.uids, "7875358430");
        assert_eq!(args.ledger, PathBuf::from("log/wbIds.txt"));
        assert_eq!(args.pic_dir, PathBuf::from("pic"));
        assert_eq!(args.interval, 5);
        assert!(!args.no_download && !args.once);
    }
}
