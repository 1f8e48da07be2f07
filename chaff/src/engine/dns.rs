// chaff/src/engine/dns.rs
//
// DNS noise producer: pollutes resolver query logs.
//
// ISPs sell DNS query data to brokers, and DNS is the cheapest channel to
// contaminate: no browser, no page weight, one lookup per event. The domain
// pool deliberately mixes the mundane with the "interesting" (privacy
// tooling, foreign portals, government records) so the log noise has teeth.
//
// Lookups go through the runtime's resolver (`tokio::net::lookup_host`),
// which performs getaddrinfo on the blocking pool, so the scheduler task is
// never stalled behind a slow resolver.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::prelude::*;
use rand::rngs::StdRng;
use tokio::net::lookup_host;
use tokio::sync::Semaphore;
use tokio::time::{sleep, Duration};

use super::{EngineCore, TrafficEngine};

const DOMAINS: &[(&str, &[&str])] = &[
    ("news", &[
        "cnn.com", "bbc.co.uk", "aljazeera.com", "reuters.com",
        "apnews.com", "dw.com", "nytimes.com", "theguardian.com",
    ]),
    ("shopping", &[
        "amazon.com", "ebay.com", "etsy.com", "walmart.com",
        "aliexpress.com", "target.com", "bestbuy.com",
    ]),
    ("privacy", &[
        "torproject.org", "signal.org", "protonmail.com", "tutanota.com",
        "privacytools.io", "tails.net", "mullvad.net", "nordvpn.com",
    ]),
    ("government", &[
        "foia.gov", "pacer.uscourts.gov", "sec.gov",
        "usaspending.gov", "regulations.gov", "congress.gov",
    ]),
    ("tech", &[
        "github.com", "stackoverflow.com", "arxiv.org",
        "medium.com", "dev.to",
    ]),
    ("social", &[
        "reddit.com", "mastodon.social", "discord.com", "linkedin.com",
    ]),
    ("foreign", &[
        "yandex.ru", "baidu.com", "naver.com", "vk.com", "qq.com",
    ]),
    ("health", &[
        "webmd.com", "mayoclinic.org", "nih.gov",
        "healthline.com", "medlineplus.gov",
    ]),
];

/// Chance of a burst of sibling resolutions after the main lookup.
const BURST_PROBABILITY: f64 = 0.15;

pub struct DnsEngine {
    core:    EngineCore,
    limiter: Arc<Semaphore>,
    rng:     Mutex<StdRng>,
}

impl DnsEngine {
    pub fn new(limiter: Arc<Semaphore>, enabled: bool) -> Self {
        Self {
            core: EngineCore::new("dns", enabled),
            limiter,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    fn pick_category(&self) -> (&'static str, &'static [&'static str]) {
        let mut rng = self.rng.lock();
        let &(category, domains) = DOMAINS.choose(&mut *rng).expect("domain pool is non-empty");
        (category, domains)
    }

    async fn resolve(&self, domain: &str) -> Result<()> {
        // The resolution itself is the noise; the addresses are discarded.
        lookup_host((domain, 443)).await?;
        Ok(())
    }
}

#[async_trait]
impl TrafficEngine for DnsEngine {
    fn core(&self) -> &EngineCore {
        &self.core
    }

    async fn execute(&self, _action: &str, _topic: Option<&str>) -> Result<()> {
        let _permit = self.limiter.acquire().await?;

        let (category, domains) = self.pick_category();
        let domain = {
            let mut rng = self.rng.lock();
            *domains.choose(&mut *rng).expect("category is non-empty")
        };

        self.core
            .log_activity("dns", format!("resolving {domain} ({category})"));
        self.resolve(domain).await?;
        self.core.record_request(0);

        // Occasionally resolve a burst of siblings from the same category,
        // the way one page load fans out to related hosts.
        let burst: Vec<&'static str> = {
            let mut rng = self.rng.lock();
            if rng.gen::<f64>() < BURST_PROBABILITY {
                let n = rng.gen_range(2..=5usize).min(domains.len());
                domains.choose_multiple(&mut *rng, n).copied().collect()
            } else {
                Vec::new()
            }
        };
        for d in burst {
            if self.resolve(d).await.is_ok() {
                self.core.record_request(0);
                self.core.log_activity("dns", format!("burst resolve: {d}"));
            }
            let pause = { self.rng.lock().gen_range(0.1..1.0) };
            sleep(Duration::from_secs_f64(pause)).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_domains() {
        for (category, domains) in DOMAINS {
            assert!(!domains.is_empty(), "category {category} is empty");
        }
    }

    #[tokio::test]
    async fn resolves_localhost() {
        let e = DnsEngine::new(Arc::new(Semaphore::new(1)), true);
        e.resolve("localhost").await.expect("localhost must resolve");
    }
}
