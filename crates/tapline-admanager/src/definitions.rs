//! Report definition reconciliation
//!
//! Looks up definitions by display name under a network scope and creates
//! the configured ones that are missing. New definitions take a moment to
//! show up in listings, so each create is followed by a bounded re-list.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{Map, Value};
use tapline_core::{CursorPager, Event, HttpGateway, Request, TapError};

use crate::config::join_url;

/// Re-list attempts after a successful create
pub const PROPAGATION_ATTEMPTS: u32 = 5;
/// Delay before each re-list
pub const PROPAGATION_DELAY: Duration = Duration::from_secs(2);

/// A configured report definition
#[derive(Debug, Clone, PartialEq)]
pub struct ReportDefinition {
    /// Unique key, matched against remote `displayName`
    pub display_name: String,
    pub dimensions: Value,
    pub metrics: Value,
    pub filters: Value,
    /// Body fields sent on create, besides `displayName`
    pub body: Value,
    pub remote_id: Option<String>,
}

impl ReportDefinition {
    pub fn from_config(display_name: impl Into<String>, body: Value) -> Self {
        let def = body.get("reportDefinition");
        let field = |key: &str| def.and_then(|d| d.get(key)).cloned().unwrap_or(Value::Null);
        Self {
            display_name: display_name.into(),
            dimensions: field("dimensions"),
            metrics: field("metrics"),
            filters: field("filters"),
            body,
            remote_id: None,
        }
    }

    /// The `reportDefinition` block, or null
    pub fn definition(&self) -> Value {
        self.body.get("reportDefinition").cloned().unwrap_or(Value::Null)
    }

    /// `{"displayName": name, ...body}`
    pub fn create_body(&self) -> Value {
        let mut out = Map::new();
        out.insert("displayName".to_string(), Value::from(self.display_name.clone()));
        if let Value::Object(fields) = &self.body {
            for (k, v) in fields {
                if k != "displayName" {
                    out.insert(k.clone(), v.clone());
                }
            }
        }
        Value::Object(out)
    }
}

/// Remote id of a listed report: `reportId`, then `id`, then the last
/// segment of its resource `name`.
pub fn remote_id(report: &Value) -> Option<String> {
    let scalar = |key: &str| match report.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    scalar("reportId").or_else(|| scalar("id")).or_else(|| {
        report
            .get("name")
            .and_then(Value::as_str)
            .and_then(|n| n.rsplit('/').next())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

pub struct DefinitionReconciler<'a> {
    gateway: &'a HttpGateway,
    base_url: String,
    propagation_attempts: u32,
    propagation_delay: Duration,
}

impl<'a> DefinitionReconciler<'a> {
    pub fn new(gateway: &'a HttpGateway, base_url: impl Into<String>) -> Self {
        Self {
            gateway,
            base_url: base_url.into(),
            propagation_attempts: PROPAGATION_ATTEMPTS,
            propagation_delay: PROPAGATION_DELAY,
        }
    }

    pub fn propagation(mut self, attempts: u32, delay: Duration) -> Self {
        self.propagation_attempts = attempts;
        self.propagation_delay = delay;
        self
    }

    fn reports_url(&self, parent_scope: &str) -> String {
        join_url(&self.base_url, &format!("{parent_scope}/reports"))
    }

    /// Display name → remote id for every listed report, all pages.
    ///
    /// Duplicate display names keep the first listed id.
    pub fn list(&self, parent_scope: &str) -> Result<BTreeMap<String, String>, TapError> {
        let url = self.reports_url(parent_scope);
        let reports = CursorPager::new(self.gateway, "report_definitions", url, "reports").fetch_all()?;

        let mut map = BTreeMap::new();
        for report in &reports {
            let Some(name) = report.get("displayName").and_then(Value::as_str) else {
                continue;
            };
            let Some(id) = remote_id(report) else {
                log::debug!("Listed report '{name}' has no id");
                continue;
            };
            match map.get(name) {
                Some(existing) if existing != &id => log::warn!(
                    "Duplicate report display name '{name}': keeping {existing}, ignoring {id}"
                ),
                Some(_) => {}
                None => {
                    map.insert(name.to_string(), id);
                }
            }
        }
        Ok(map)
    }

    /// Make sure every definition exists remotely.
    ///
    /// Returns display name → remote id. Names that could not be created or
    /// did not propagate in time are absent from the map. Only a failure of
    /// the initial listing is an error.
    pub fn ensure(
        &self,
        parent_scope: &str,
        definitions: &[ReportDefinition],
    ) -> Result<BTreeMap<String, String>, TapError> {
        let mut known = self.list(parent_scope)?;
        log::debug!("{} existing report definitions under {parent_scope}", known.len());

        for def in definitions {
            if known.contains_key(&def.display_name) {
                continue;
            }
            if let Some(id) = self.create(parent_scope, def, &mut known) {
                log::debug!("Report '{}' resolved to {id}", def.display_name);
            }
        }

        let wanted: BTreeMap<String, String> = definitions
            .iter()
            .filter_map(|d| Some((d.display_name.clone(), known.get(&d.display_name)?.clone())))
            .collect();
        Ok(wanted)
    }

    /// Create one definition and wait for it to be listed.
    fn create(
        &self,
        parent_scope: &str,
        def: &ReportDefinition,
        known: &mut BTreeMap<String, String>,
    ) -> Option<String> {
        let name = &def.display_name;
        let request = Request::post(self.reports_url(parent_scope)).json(def.create_body());
        if let Err(e) = self.gateway.send(request) {
            log::error!("Failed to create report '{name}': {e}");
            return None;
        }
        self.gateway.observer().observe(&Event::DefinitionCreated { name: name.clone() });

        for attempt in 1..=self.propagation_attempts {
            self.gateway.clock().sleep(self.propagation_delay);
            match self.list(parent_scope) {
                Ok(listed) => {
                    *known = listed;
                    if let Some(id) = known.get(name) {
                        return Some(id.clone());
                    }
                }
                Err(e) => log::warn!("Re-listing reports for '{name}' failed: {e}"),
            }
            self.gateway.observer().observe(&Event::DefinitionPending {
                name: name.clone(),
                attempt,
            });
        }

        self.gateway.observer().observe(&Event::DefinitionMissing { name: name.clone() });
        None
    }
}
