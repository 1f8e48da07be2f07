// chaff/src/pattern/topics.rs
//
// Built-in search-topic wordlists, grouped by interest category. The core
// treats these as opaque strings; the lists just need enough spread that
// the aggregate query stream doesn't converge on a handful of subjects.

use rand::prelude::*;
use rand::rngs::StdRng;

const BUILTIN_TOPICS: &[(&str, &[&str])] = &[
    ("technology", &[
        "best laptop 2025", "python tutorial", "react vs vue",
        "kubernetes deployment", "raspberry pi projects",
        "home server setup", "linux distro comparison",
        "mechanical keyboard review", "self-hosted alternatives",
        "docker compose examples",
    ]),
    ("shopping", &[
        "best hiking boots", "wireless earbuds under 100",
        "standing desk review", "coffee grinder recommendations",
        "winter jacket sale", "running shoes for flat feet",
        "ergonomic mouse", "air purifier for allergies",
        "cast iron skillet", "backpack for travel",
    ]),
    ("news", &[
        "latest tech news", "world news today", "climate change report",
        "stock market analysis", "space exploration news",
        "cybersecurity breach", "supply chain update",
    ]),
    ("health", &[
        "intermittent fasting benefits", "best stretches for back pain",
        "sleep hygiene tips", "vitamin d deficiency symptoms",
        "meditation for beginners", "HIIT workout plan",
        "anti-inflammatory diet",
    ]),
    ("travel", &[
        "cheap flights to europe", "best time to visit japan",
        "road trip planner", "travel insurance comparison",
        "hostel vs airbnb", "train travel europe",
    ]),
    ("hobbies", &[
        "sourdough starter recipe", "beginner woodworking projects",
        "indoor plants low light", "learn guitar online",
        "film photography developing", "board game recommendations",
        "watercolor techniques", "3d printing for beginners",
    ]),
    ("finance", &[
        "how to budget", "index fund vs etf", "mortgage rates today",
        "credit score improve", "tax deductions freelancer",
        "retirement calculator", "student loan refinance",
    ]),
    ("privacy", &[
        "best vpn service", "password manager comparison",
        "encrypted email providers", "browser privacy settings",
        "data broker opt out", "two factor authentication setup",
        "privacy focused search engine", "secure messaging apps",
    ]),
];

/// Query templates for an obsession deep-dive: variations that read like
/// someone researching one subject thoroughly.
const OBSESSION_MODIFIERS: &[&str] = &[
    "{topic}",
    "{topic} review",
    "{topic} comparison",
    "{topic} reddit",
    "best {topic}",
    "{topic} pros and cons",
    "{topic} alternatives",
    "{topic} guide",
    "{topic} tutorial",
    "{topic} cost",
    "{topic} forum",
    "is {topic} worth it",
    "{topic} vs",
];

pub struct TopicBook {
    rng: StdRng,
}

impl TopicBook {
    pub fn new() -> Self {
        Self { rng: StdRng::from_entropy() }
    }

    /// Flat list of every topic string across categories.
    pub fn all_topics(&self) -> Vec<String> {
        BUILTIN_TOPICS
            .iter()
            .flat_map(|(_, terms)| terms.iter().map(|t| t.to_string()))
            .collect()
    }

    pub fn random_query(&mut self) -> String {
        let (_, terms) = BUILTIN_TOPICS
            .choose(&mut self.rng)
            .expect("builtin topics are non-empty");
        terms
            .choose(&mut self.rng)
            .expect("category is non-empty")
            .to_string()
    }

    /// A deep-dive query for the given obsession topic.
    pub fn obsession_query(&mut self, topic: &str) -> String {
        let modifier = OBSESSION_MODIFIERS
            .choose(&mut self.rng)
            .expect("modifiers are non-empty");
        modifier.replace("{topic}", topic)
    }
}

impl Default for TopicBook {
    fn default() -> Self {
        Self::new()
    }
}
