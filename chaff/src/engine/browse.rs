// chaff/src/engine/browse.rs
//
// Web-browsing noise producer. Visits a weighted, categorised site list
// spanning news, shopping, tech, forums and reference (the spread is what
// makes the aggregate profile useless to an ad-tracking classifier), then
// follows a few same-site links the way a person skims a front page.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use reqwest::header::USER_AGENT;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Duration};

use super::{EngineCore, TrafficEngine};
use crate::controls::Controls;

const SITES: &[(&str, &[(&str, f64)])] = &[
    ("news", &[
        ("https://www.bbc.co.uk", 1.0),
        ("https://www.reuters.com", 0.9),
        ("https://www.aljazeera.com", 0.9),
        ("https://apnews.com", 0.8),
        ("https://www.dw.com", 0.7),
    ]),
    ("shopping", &[
        ("https://www.amazon.com", 1.0),
        ("https://www.walmart.com", 0.8),
        ("https://www.etsy.com", 0.7),
        ("https://www.ebay.com", 0.7),
    ]),
    ("tech", &[
        ("https://news.ycombinator.com", 0.9),
        ("https://www.theverge.com", 0.8),
        ("https://arstechnica.com", 0.8),
        ("https://www.wired.com", 0.7),
    ]),
    ("forums", &[
        ("https://www.reddit.com", 1.0),
        ("https://stackoverflow.com", 0.8),
    ]),
    ("entertainment", &[
        ("https://www.youtube.com", 1.0),
        ("https://www.imdb.com", 0.6),
    ]),
    ("education", &[
        ("https://en.wikipedia.org", 1.0),
        ("https://www.khanacademy.org", 0.5),
    ]),
];

pub struct BrowseEngine {
    core:     EngineCore,
    client:   reqwest::Client,
    limiter:  Arc<Semaphore>,
    controls: Arc<Controls>,
    rng:      Mutex<StdRng>,
}

impl BrowseEngine {
    pub fn new(
        client: reqwest::Client,
        limiter: Arc<Semaphore>,
        controls: Arc<Controls>,
        enabled: bool,
    ) -> Self {
        Self {
            core: EngineCore::new("browse", enabled),
            client,
            limiter,
            controls,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    fn pick_site(&self) -> (&'static str, &'static str) {
        let mut rng = self.rng.lock();
        let &(category, sites) = SITES.choose(&mut *rng).expect("site list is non-empty");
        let dist = WeightedIndex::new(sites.iter().map(|(_, w)| *w)).expect("positive weights");
        let (url, _) = sites[dist.sample(&mut *rng)];
        (category, url)
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let ua = self.controls.persona().user_agent;
        let resp = self.client.get(url).header(USER_AGENT, ua).send().await?;
        let body = resp.text().await?;
        self.core.record_request(body.len() as u64);
        Ok(body)
    }
}

/// Pull same-host absolute links out of an HTML body. Crude on purpose: the
/// noise only needs plausible second requests, not a DOM.
fn extract_links(body: &str, host: &str) -> Vec<String> {
    let mut links = Vec::new();
    for chunk in body.split("href=\"").skip(1) {
        let Some(end) = chunk.find('"') else { continue };
        let url = &chunk[..end];
        if url.starts_with("http") && url.contains(host) && url.len() < 300 {
            links.push(url.to_string());
        }
        if links.len() >= 50 {
            break;
        }
    }
    links
}

fn host_of(url: &str) -> &str {
    url.trim_start_matches("https://")
        .trim_start_matches("http://")
        .split('/')
        .next()
        .unwrap_or(url)
}

#[async_trait]
impl TrafficEngine for BrowseEngine {
    fn core(&self) -> &EngineCore {
        &self.core
    }

    async fn execute(&self, _action: &str, _topic: Option<&str>) -> Result<()> {
        let _permit = self.limiter.acquire().await?;

        let (category, url) = self.pick_site();
        self.core
            .log_activity("browse", format!("visiting {url} ({category})"));

        let body = self.fetch(url).await?;

        // Follow a short chain of internal links, pausing like a reader.
        let depth = { self.rng.lock().gen_range(0..=3) };
        let mut links = extract_links(&body, host_of(url));
        for _ in 0..depth {
            let next = {
                let mut rng = self.rng.lock();
                links.choose(&mut *rng).cloned()
            };
            let Some(next) = next else { break };
            let pause = { self.rng.lock().gen_range(1.0..4.0) };
            sleep(Duration::from_secs_f64(pause)).await;

            let shown: String = next.chars().take(80).collect();
            self.core
                .log_activity("browse", format!("following link: {shown}"));
            match self.fetch(&next).await {
                Ok(page) => links = extract_links(&page, host_of(url)),
                Err(_)   => break, // dead link mid-chain, not worth surfacing
            }
        }
        Ok(())
    }
}
