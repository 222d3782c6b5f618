//! Tapline Ad Manager - Google Ad Manager v1 REST streams
//!
//! List streams (`orders`, `placements`, `reports`) and the `report_results`
//! stream, which makes sure the configured report definitions exist, runs
//! each one, waits for the long-running operation and collects its rows.
//!
//! # Example
//!
//! ```ignore
//! use tapline_admanager::{Config, ReportResults, connect};
//!
//! let config = Config {
//!     network_id: "1234".into(),
//!     access_token: Some(token),
//!     ..Default::default()
//! };
//! let gateway = connect(&config)?;
//! for record in ReportResults::new(&gateway, &config) {
//!     println!("{}", record?.report_display_name);
//! }
//! ```

pub mod config;
pub mod definitions;
pub mod operation;
pub mod report_results;
pub mod results;
pub mod schema;
pub mod streams;

use tapline_core::{HttpGateway, ReqwestTransport, TapError, Transport};

// Re-exports
pub use config::Config;
pub use definitions::{DefinitionReconciler, ReportDefinition};
pub use operation::{Operation, OperationHandle, OperationPoller, OperationState};
pub use report_results::{ReportResultRecord, ReportResults};
pub use results::{ResultPaginator, ResultSet};
pub use schema::ReportResultAccumulator;
pub use streams::ListStream;

/// Gateway over `transport` carrying the bearer token.
pub fn gateway(config: &Config, transport: Box<dyn Transport>) -> Result<HttpGateway, TapError> {
    config.validate()?;
    let token = config.access_token.as_deref().unwrap_or_default();
    Ok(HttpGateway::new(transport).with_header("Authorization", format!("Bearer {token}")))
}

/// Validated gateway over the shared reqwest client.
pub fn connect(config: &Config) -> Result<HttpGateway, TapError> {
    gateway(config, Box::new(ReqwestTransport::new()))
}
