// ── EMB topic registry ──
//
// Message-bus queue names reported by live plugins. A topic is consumed
// once per process; later reports of the same name are ignored.

use dashmap::DashSet;
use tracing::info;

#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: DashSet<String>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `topic`. Returns `true` if it was not known yet.
    pub fn consume(&self, topic: &str) -> bool {
        if topic.is_empty() {
            return false;
        }
        let added = self.topics.insert(topic.to_owned());
        if added {
            info!(topic, "consuming EMB topic");
        }
        added
    }

    /// Register every topic, returning only the ones that were new.
    pub fn consume_all<'a>(&self, topics: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        topics
            .into_iter()
            .filter(|t| self.consume(t))
            .map(str::to_owned)
            .collect()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.contains(topic)
    }

    /// All known topics, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut all: Vec<String> = self.topics.iter().map(|t| t.key().clone()).collect();
        all.sort();
        all
    }
}
