//! Dispatcher configuration and scenario files.
//!
//! Both types deserialize from JSON; every field has a default so a config
//! file only needs to mention what it changes.
//!
//! ```
//! use shuttle_dispatch::config::Scenario;
//!
//! let scenario = Scenario::from_json(r#"{
//!     "config": { "stops": ["A", "B", "C", "D"] },
//!     "requests": [
//!         { "origin": "A", "destination": "C" },
//!         { "origin": "B", "destination": "D" }
//!     ]
//! }"#).unwrap();
//!
//! let report = scenario.run().unwrap();
//! assert_eq!(report.completed, 2);
//! ```

use serde::{Deserialize, Serialize};

use crate::dispatching::PriorityRuleKind;
use crate::error::{DispatchError, DispatchResult};
use crate::events::EventSink;
use crate::models::{RequestSpec, Topology};
use crate::scheduler::{Dispatcher, SimulationReport};
use crate::validation::{into_config_error, validate_requests, validate_stops};

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Stop names in line order. The vehicle starts at the first one.
    pub stops: Vec<String>,
    /// Rule used to rank ordinary requests.
    pub priority_rule: PriorityRuleKind,
    /// Jump the clock over idle stretches instead of ticking one by one.
    pub time_skip: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            stops: ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect(),
            priority_rule: PriorityRuleKind::DestinationDistance,
            time_skip: true,
        }
    }
}

impl DispatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the stop sequence.
    pub fn with_stops<I, S>(mut self, stops: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stops = stops.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the priority rule.
    pub fn with_priority_rule(mut self, rule: PriorityRuleKind) -> Self {
        self.priority_rule = rule;
        self
    }

    /// Enables or disables idle time skipping.
    pub fn with_time_skip(mut self, enabled: bool) -> Self {
        self.time_skip = enabled;
        self
    }

    /// Parses and validates a JSON config.
    pub fn from_json(json: &str) -> DispatchResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| DispatchError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the stop sequence, reporting every problem found.
    pub fn validate(&self) -> DispatchResult<()> {
        validate_stops(&self.stops).map_err(into_config_error)
    }

    /// Builds the topology described by `stops`.
    pub fn topology(&self) -> DispatchResult<Topology> {
        self.validate()?;
        Topology::new(self.stops.iter().cloned())
    }
}

/// A configuration plus the requests to feed it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: DispatcherConfig,
    #[serde(default)]
    pub requests: Vec<RequestSpec>,
}

impl Scenario {
    pub fn new(config: DispatcherConfig, requests: Vec<RequestSpec>) -> Self {
        Self { config, requests }
    }

    /// Parses and validates a JSON scenario.
    pub fn from_json(json: &str) -> DispatchResult<Self> {
        let scenario: Self =
            serde_json::from_str(json).map_err(|e| DispatchError::InvalidConfig(e.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Validates the config and every request against its topology.
    pub fn validate(&self) -> DispatchResult<()> {
        let topology = self.config.topology()?;
        validate_requests(&topology, &self.requests).map_err(into_config_error)
    }

    /// Builds a dispatcher with every request submitted.
    pub fn dispatcher(&self) -> DispatchResult<Dispatcher> {
        let mut dispatcher = Dispatcher::from_config(&self.config)?;
        for spec in &self.requests {
            dispatcher.submit_spec(spec)?;
        }
        Ok(dispatcher)
    }

    /// Runs the scenario to completion.
    pub fn run(&self) -> DispatchResult<SimulationReport> {
        Ok(self.dispatcher()?.run())
    }

    /// Runs the scenario, reporting events to `sink`.
    pub fn run_with_sink<S: EventSink>(&self, sink: S) -> DispatchResult<(SimulationReport, S)> {
        Ok(self.dispatcher()?.with_sink(sink).finish())
    }
}
