//! Report results stream: reconcile → run → poll → fetch rows, one record per report
//!
//! A failure while processing one report is logged and that report is
//! skipped; only a failure of the initial definition listing ends the stream.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tapline_core::{Event, HttpGateway, TapError};

use crate::config::Config;
use crate::definitions::{DefinitionReconciler, ReportDefinition};
use crate::operation::OperationPoller;
use crate::results::{ResultPaginator, ResultSet};

pub const RUN_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One extracted report run. Definition and row fields hold JSON text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportResultRecord {
    pub result_name: String,
    pub report_id: String,
    pub report_name: String,
    pub report_display_name: String,
    pub report_definition: String,
    pub report_definition_dimensions: String,
    pub report_definition_metrics: String,
    pub report_results_dimension: String,
    pub report_results_metrics: String,
    pub run_time: String,
}

impl ReportResultRecord {
    pub fn build(
        definition: &ReportDefinition,
        report_id: &str,
        report_name: &str,
        results: &ResultSet,
        run_time: DateTime<Utc>,
    ) -> Self {
        let mut dimensions = Vec::new();
        let mut metrics = Vec::new();
        for (idx, row) in results.rows.iter().enumerate() {
            let Some(obj) = row.as_object() else {
                log::warn!("{}: row {idx} is not an object: {row}", results.result_name);
                continue;
            };
            if let Some(d) = obj.get("dimensionValues") {
                dimensions.push(d.clone());
            }
            if let Some(m) = obj.get("metricValueGroups") {
                metrics.push(m.clone());
            }
        }

        Self {
            result_name: results.result_name.clone(),
            report_id: report_id.to_string(),
            report_name: report_name.to_string(),
            report_display_name: definition.display_name.clone(),
            report_definition: definition.definition().to_string(),
            report_definition_dimensions: definition.dimensions.to_string(),
            report_definition_metrics: definition.metrics.to_string(),
            report_results_dimension: Value::Array(dimensions).to_string(),
            report_results_metrics: Value::Array(metrics).to_string(),
            run_time: run_time.format(RUN_TIME_FORMAT).to_string(),
        }
    }
}

/// Lazy stream of report results; nothing is requested until the first `next()`.
pub struct ReportResults<'a> {
    gateway: &'a HttpGateway,
    config: &'a Config,
    definitions: Vec<ReportDefinition>,
    /// Display name → remote id, once reconciled
    ids: Option<BTreeMap<String, String>>,
    next_index: usize,
    failed: bool,
}

impl<'a> ReportResults<'a> {
    pub fn new(gateway: &'a HttpGateway, config: &'a Config) -> Self {
        let definitions = config
            .reports
            .iter()
            .map(|(name, body)| ReportDefinition::from_config(name.clone(), body.clone()))
            .collect();
        Self {
            gateway,
            config,
            definitions,
            ids: None,
            next_index: 0,
            failed: false,
        }
    }

    fn skip_report(&self, name: &str, reason: impl Into<String>) {
        self.gateway.observer().observe(&Event::ReportSkipped {
            name: name.to_string(),
            reason: reason.into(),
        });
    }

    fn process(&self, def: &ReportDefinition) -> Result<Option<ReportResultRecord>, TapError> {
        let Some(report_id) = self.ids.as_ref().and_then(|ids| ids.get(&def.display_name)) else {
            self.skip_report(&def.display_name, "no definition id");
            return Ok(None);
        };
        let report_name = format!("{}/reports/{report_id}", self.config.network_scope());
        log::info!("Processing report {report_name} ({})", def.display_name);

        let poller = OperationPoller::new(self.gateway, &self.config.base_url)
            .poll_interval(self.config.poll_interval)
            .timeout(self.config.timeout);
        let handle = poller.run(&report_name)?;
        let response = poller.await_completion(&handle)?;

        let Some(result_name) = response.get("reportResult").and_then(Value::as_str) else {
            self.skip_report(&def.display_name, format!("no result returned for {report_name}"));
            return Ok(None);
        };

        let results = ResultPaginator::new(self.gateway, &self.config.base_url)
            .page_size(self.config.page_size)
            .fetch_all(result_name)?;
        Ok(Some(ReportResultRecord::build(
            def,
            report_id,
            &report_name,
            &results,
            Utc::now(),
        )))
    }
}

impl Iterator for ReportResults<'_> {
    type Item = Result<ReportResultRecord, TapError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.ids.is_none() {
            let reconciler = DefinitionReconciler::new(self.gateway, &self.config.base_url);
            match reconciler.ensure(&self.config.network_scope(), &self.definitions) {
                Ok(ids) => self.ids = Some(ids),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }

        while self.next_index < self.definitions.len() {
            let def = &self.definitions[self.next_index];
            self.next_index += 1;
            match self.process(def) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => {}
                Err(e) => {
                    log::error!("Failed to process report '{}': {e}", def.display_name);
                    self.skip_report(&def.display_name, e.to_string());
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn results(rows: Vec<Value>) -> ResultSet {
        ResultSet {
            result_name: "networks/1/reports/7/results/3".to_string(),
            rows,
        }
    }

    #[test]
    fn record_fields() {
        let def = ReportDefinition::from_config(
            "Daily",
            json!({"reportDefinition": {"dimensions": ["DATE"], "metrics": ["CLICKS"]}}),
        );
        let rows = vec![
            json!({"dimensionValues": [{"stringValue": "2024-01-01"}], "metricValueGroups": [{"primaryValues": [{"intValue": "4"}]}]}),
            json!("stray"),
            json!({"metricValueGroups": []}),
        ];
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();
        let record = ReportResultRecord::build(&def, "7", "networks/1/reports/7", &results(rows), at);

        assert_eq!(record.report_display_name, "Daily");
        assert_eq!(record.report_id, "7");
        assert_eq!(record.run_time, "2024-03-09T07:05:00Z");
        assert_eq!(record.report_definition_dimensions, r#"["DATE"]"#);
        assert_eq!(record.report_definition_metrics, r#"["CLICKS"]"#);
        assert_eq!(
            record.report_results_dimension,
            r#"[[{"stringValue":"2024-01-01"}]]"#
        );
        assert_eq!(
            record.report_results_metrics,
            r#"[[{"primaryValues":[{"intValue":"4"}]}],[]]"#
        );
        let definition: Value = serde_json::from_str(&record.report_definition).unwrap();
        assert_eq!(definition["metrics"], json!(["CLICKS"]));
    }

    #[test]
    fn missing_definition_block_serializes_null() {
        let def = ReportDefinition::from_config("Raw", json!({}));
        let record = ReportResultRecord::build(
            &def,
            "1",
            "networks/1/reports/1",
            &results(vec![]),
            Utc::now(),
        );
        assert_eq!(record.report_definition, "null");
        assert_eq!(record.report_results_dimension, "[]");
    }
}
