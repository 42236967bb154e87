use crate::error::CliError;
use engine_core::connectors::estimate::LagReport;
use engine_runtime::StopOutcome;
use model::Lease;
use serde::Serialize;

/// Flattened stop outcome of one partition.
#[derive(Debug, Serialize)]
pub struct OutcomeSummary {
    pub partition_id: String,
    pub reason: String,
    pub close_reason: Option<String>,
    pub released: bool,
    pub continuation: Option<String>,
    pub batches: u64,
    pub records: u64,
    pub checkpoints: u64,
    pub renewals: u64,
}

impl From<&StopOutcome> for OutcomeSummary {
    fn from(outcome: &StopOutcome) -> Self {
        Self {
            partition_id: outcome.partition_id.clone(),
            reason: outcome.reason.to_string(),
            close_reason: outcome.close_reason.map(|r| r.to_string()),
            released: outcome.released,
            continuation: outcome.lease.continuation.as_ref().map(|c| c.to_string()),
            batches: outcome.metrics.batches_delivered,
            records: outcome.metrics.records_delivered,
            checkpoints: outcome.metrics.checkpoints,
            renewals: outcome.metrics.renewals,
        }
    }
}

pub fn print_leases(leases: &[Lease], as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(leases)?);
    } else {
        print!("{}", lease_table(leases));
    }
    Ok(())
}

fn lease_table(leases: &[Lease]) -> String {
    let mut out = format!(
        "{:<12} {:<16} {:<16} {}\n",
        "Partition", "Owner", "Continuation", "Last write"
    );
    out.push_str(&"-".repeat(72));
    out.push('\n');
    for lease in leases {
        out.push_str(&format!(
            "{:<12} {:<16} {:<16} {}\n",
            lease.partition_id,
            lease.owner.as_deref().unwrap_or("-"),
            lease.continuation.as_ref().map(|c| c.as_str()).unwrap_or("-"),
            lease.timestamp.to_rfc3339()
        ));
    }
    out
}

pub fn print_lag(report: &LagReport, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", lag_table(report));
    }
    Ok(())
}

fn lag_table(report: &LagReport) -> String {
    let mut out = format!(
        "{:<12} {:<16} {:<16} {:>10}\n",
        "Partition", "Owner", "Continuation", "Lag"
    );
    for p in &report.partitions {
        out.push_str(&format!(
            "{:<12} {:<16} {:<16} {:>10}\n",
            p.partition_id,
            p.owner.as_deref().unwrap_or("-"),
            p.continuation.as_ref().map(|c| c.as_str()).unwrap_or("-"),
            p.estimated_lag
                .map(|lag| lag.to_string())
                .unwrap_or_else(|| "?".to_string()),
        ));
    }
    out.push_str(&format!(
        "Total lag: {} ({})\n",
        report.total_lag(),
        report.at.to_rfc3339()
    ));
    out
}

pub fn print_outcomes(outcomes: &[StopOutcome]) {
    let summaries: Vec<OutcomeSummary> = outcomes.iter().map(OutcomeSummary::from).collect();
    print!("{}", outcome_table(&summaries));
}

fn outcome_table(summaries: &[OutcomeSummary]) -> String {
    let mut out = format!(
        "{:<12} {:<28} {:<14} {:<9} {:>8} {:>8} {}\n",
        "Partition", "Stop reason", "Close", "Released", "Batches", "Records", "Continuation"
    );
    for s in summaries {
        out.push_str(&format!(
            "{:<12} {:<28} {:<14} {:<9} {:>8} {:>8} {}\n",
            s.partition_id,
            s.reason,
            s.close_reason.as_deref().unwrap_or("-"),
            s.released,
            s.batches,
            s.records,
            s.continuation.as_deref().unwrap_or("-"),
        ));
    }
    out
}
