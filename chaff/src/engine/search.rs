// chaff/src/engine/search.rs
//
// Search-query noise producer. Issues queries against a weighted mix of
// search engines; during an obsession the queries are deep-dive variants of
// the fixated topic, which is the signal that makes the stream read as one
// person researching rather than a random-word generator.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use reqwest::header::USER_AGENT;
use tokio::sync::Semaphore;

use super::{EngineCore, TrafficEngine};
use crate::controls::Controls;
use crate::pattern::topics::TopicBook;

const SEARCH_ENGINES: &[(&str, &str, f64)] = &[
    ("Google",     "https://www.google.com/search?q={query}",   0.55),
    ("Bing",       "https://www.bing.com/search?q={query}",     0.15),
    ("DuckDuckGo", "https://duckduckgo.com/?q={query}",         0.20),
    ("Yahoo",      "https://search.yahoo.com/search?p={query}", 0.10),
];

pub struct SearchEngine {
    core:     EngineCore,
    client:   reqwest::Client,
    limiter:  Arc<Semaphore>,
    controls: Arc<Controls>,
    topics:   Mutex<TopicBook>,
    rng:      Mutex<StdRng>,
}

impl SearchEngine {
    pub fn new(
        client: reqwest::Client,
        limiter: Arc<Semaphore>,
        controls: Arc<Controls>,
        enabled: bool,
    ) -> Self {
        Self {
            core: EngineCore::new("search", enabled),
            client,
            limiter,
            controls,
            topics: Mutex::new(TopicBook::new()),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    fn pick_query(&self, topic: Option<&str>) -> String {
        let mut book = self.topics.lock();
        match topic {
            Some(t) => book.obsession_query(t),
            None    => book.random_query(),
        }
    }

    fn pick_engine(&self) -> (&'static str, &'static str) {
        let dist = WeightedIndex::new(SEARCH_ENGINES.iter().map(|(_, _, w)| *w))
            .expect("positive engine weights");
        let mut rng = self.rng.lock();
        let (name, template, _) = SEARCH_ENGINES[dist.sample(&mut *rng)];
        (name, template)
    }
}

#[async_trait]
impl TrafficEngine for SearchEngine {
    fn core(&self) -> &EngineCore {
        &self.core
    }

    async fn execute(&self, _action: &str, topic: Option<&str>) -> Result<()> {
        let _permit = self.limiter.acquire().await?;

        let query = self.pick_query(topic);
        let (engine_name, template) = self.pick_engine();
        let url = template.replace("{query}", &query.replace(' ', "+"));

        self.core
            .log_activity("search", format!("searching {engine_name} for '{query}'"));

        let ua = self.controls.persona().user_agent;
        let resp = self.client.get(&url).header(USER_AGENT, ua).send().await?;
        let body = resp.text().await?;
        self.core.record_request(body.len() as u64);

        Ok(())
    }

    fn topics(&self) -> Vec<String> {
        self.topics.lock().all_topics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SearchEngine {
        SearchEngine::new(
            reqwest::Client::new(),
            Arc::new(Semaphore::new(2)),
            Arc::new(Controls::new(crate::pattern::timing::Intensity::Medium)),
            true,
        )
    }

    #[test]
    fn obsession_topic_shapes_query() {
        let e = engine();
        for _ in 0..20 {
            let q = e.pick_query(Some("vintage cameras"));
            assert!(q.contains("vintage cameras"), "query {q:?} ignored the topic");
        }
    }

    #[test]
    fn contributes_topics_to_pool() {
        let e = engine();
        assert!(e.topics().len() > 50);
    }

    #[test]
    fn engine_weights_sum_near_one() {
        let total: f64 = SEARCH_ENGINES.iter().map(|(_, _, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
