//! Wire-level report delivery.
//!
//! The injector endpoint is `{api_base}/{device_id}/00/00`, POST, JSON.
//! Two body shapes: a single report carries a stringified sequence number;
//! a batch carries the command list plus an ASCII padding field of random
//! length. Response bodies are ignored; only the status is logged.

use anyhow::Result;
use serde_json::json;
use std::fmt;

/// One relative-motion report. `op` 0 is the move / pointer-up carrier,
/// 1 the pointer-down / drag carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub op: u8,
    pub dx: i32,
    pub dy: i32,
}

impl Report {
    pub const fn new(op: u8, dx: i32, dy: i32) -> Self {
        Self { op, dx, dy }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.op, self.dx, self.dy)
    }
}

/// Delivery backend for reports. The transport drives this; swapping the
/// implementation is how tests observe traffic without a network.
pub trait ReportSink {
    fn post_single(&mut self, report: Report, seq: u64) -> Result<()>;
    fn post_batch(&mut self, reports: &[Report], pad_len: usize) -> Result<()>;
}

/// Blocking HTTP sink against the remote injector.
pub struct HttpSink {
    agent: ureq::Agent,
    url: String,
}

impl HttpSink {
    pub fn new(api_base: &str, device_id: &str) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            url: format!("{api_base}/{device_id}/00/00"),
        }
    }
}

impl ReportSink for HttpSink {
    fn post_single(&mut self, report: Report, seq: u64) -> Result<()> {
        let body = json!({
            "type": "mouse",
            "command": report.to_string(),
            "seq": seq.to_string(),
        });
        let resp = self.agent.post(self.url.as_str()).send_json(&body)?;
        tracing::trace!(target: "hid.wire", status = %resp.status(), seq, "single_posted");
        Ok(())
    }

    fn post_batch(&mut self, reports: &[Report], pad_len: usize) -> Result<()> {
        let commands: Vec<String> = reports.iter().map(ToString::to_string).collect();
        let body = json!({
            "type": "mouse",
            "commands": commands,
            "p": "x".repeat(pad_len),
        });
        let resp = self.agent.post(self.url.as_str()).send_json(&body)?;
        tracing::trace!(
            target: "hid.wire",
            status = %resp.status(),
            reports = reports.len(),
            pad_len,
            "batch_posted"
        );
        Ok(())
    }
}
