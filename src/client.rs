//! Blocking HTTP client for the item report endpoint

use std::time::Duration;

use crate::error::ScrapeError;
use crate::types::{DateWindow, ReportKind, ReportVariable};
use crate::STATS_URL;

/// Per-run report parameters, threaded explicitly through the runner and
/// recovery so a recovery call always reuses the original run's choices.
#[derive(Debug, Clone, Copy)]
pub struct ReportConfig {
    pub kind: ReportKind,
    pub variable: ReportVariable,
    pub window: DateWindow,
}

/// Anything that can turn a batch of item codes into raw response HTML.
/// The runner and recovery depend on this seam rather than on the HTTP
/// client so they can be exercised with canned responses.
pub trait ReportSource {
    fn fetch(&self, batch: &[String]) -> Result<String, ScrapeError>;
}

pub struct ReportClient {
    http: reqwest::blocking::Client,
    config: ReportConfig,
}

impl ReportClient {
    pub fn new(config: ReportConfig) -> Result<Self, ScrapeError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; ItemReportScraper/1.0)")
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(ReportClient { http, config })
    }

    /// Query parameters for one batch, per report kind.
    ///
    /// The PBS report wants the item list twice: once plain and once quoted
    /// ('A','B',...), plus an explicit item count.
    pub fn query(&self, batch: &[String]) -> Vec<(String, String)> {
        let kind = self.config.kind;
        let joined = batch.join(",");

        let mut params = vec![
            ("_PROGRAM".to_string(), kind.program().to_string()),
            ("DRILL".to_string(), "ag".to_string()),
        ];
        match kind {
            ReportKind::ItemByStateByMonth => {
                params.push(("group".to_string(), joined));
            }
            ReportKind::ItemBySchemeByStateByMonth => {
                let quoted: Vec<String> = batch.iter().map(|item| format!("'{item}'")).collect();
                params.push(("LIST".to_string(), joined));
                params.push(("ITEMLST".to_string(), quoted.join(",")));
                params.push(("ITEMCNT".to_string(), batch.len().to_string()));
            }
        }
        params.extend([
            ("VAR".to_string(), self.config.variable.as_str().to_string()),
            ("STAT".to_string(), "count".to_string()),
            ("RPT_FMT".to_string(), "by state".to_string()),
            ("PTYPE".to_string(), "month".to_string()),
            ("START_DT".to_string(), self.config.window.start_param()),
            ("END_DT".to_string(), self.config.window.end_param()),
        ]);
        params
    }
}

impl ReportSource for ReportClient {
    /// One blocking GET per batch. Success status yields the body text;
    /// anything else is a transport failure. No retry here: a normal run
    /// absorbs the failure, and recovery is single-shot by design.
    fn fetch(&self, batch: &[String]) -> Result<String, ScrapeError> {
        let response = self.http.get(STATS_URL).query(&self.query(batch)).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Transport { status });
        }
        Ok(response.text()?)
    }
}
