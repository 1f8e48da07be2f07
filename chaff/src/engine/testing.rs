// Test-only producer: records every (action, topic) it receives, optionally
// failing each call. Used by the registry and scheduler tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use super::{EngineCore, TrafficEngine};

pub struct RecordingEngine {
    core:      EngineCore,
    pub calls: Mutex<Vec<(String, Option<String>)>>,
    fail:      bool,
}

impl RecordingEngine {
    pub fn new(name: &'static str, enabled: bool, fail: bool) -> Self {
        Self {
            core: EngineCore::new(name, enabled),
            calls: Mutex::new(Vec::new()),
            fail,
        }
    }
}

#[async_trait]
impl TrafficEngine for RecordingEngine {
    fn core(&self) -> &EngineCore {
        &self.core
    }

    async fn execute(&self, action: &str, topic: Option<&str>) -> Result<()> {
        self.calls
            .lock()
            .push((action.to_string(), topic.map(str::to_string)));
        if self.fail {
            bail!("synthetic producer failure");
        }
        self.core.record_request(100);
        Ok(())
    }

    fn topics(&self) -> Vec<String> {
        vec![format!("{}-topic", self.core.name())]
    }
}
