//! JSON artifact of one comparison run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ResultRecord, ResultStatus};

/// A prompt together with every record it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportArtifact {
    pub prompt: String,
    pub exported_at: DateTime<Utc>,
    pub responses: Vec<ResultRecord>,
    pub summary: ExportSummary,
}

/// Aggregates over the records of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub total: usize,
    pub success: usize,
    pub warning: usize,
    pub error: usize,
    /// Sum over records with a known cost; `None` when no record was priced.
    pub total_cost_usd: Option<f64>,
    /// Records that contributed to `total_cost_usd`. Lower than `total` means the sum is partial.
    pub priced_count: usize,
    /// Mean over records that reached the upstream and got an answer; `None` without any.
    pub average_latency_ms: Option<f64>,
}

impl ExportSummary {
    pub fn from_records(records: &[ResultRecord]) -> Self {
        let count = |status| records.iter().filter(|r| r.status == status).count();
        let answered: Vec<f64> = records
            .iter()
            .filter(|r| r.status != ResultStatus::Error)
            .map(|r| r.latency_ms)
            .collect();
        let average_latency_ms =
            (!answered.is_empty()).then(|| answered.iter().sum::<f64>() / answered.len() as f64);
        let costs: Vec<f64> = records.iter().filter_map(|r| r.estimated_cost_usd).collect();

        Self {
            total: records.len(),
            success: count(ResultStatus::Success),
            warning: count(ResultStatus::Warning),
            error: count(ResultStatus::Error),
            total_cost_usd: (!costs.is_empty()).then(|| costs.iter().sum()),
            priced_count: costs.len(),
            average_latency_ms,
        }
    }
}

impl ExportArtifact {
    pub fn new(prompt: impl Into<String>, responses: Vec<ResultRecord>) -> Self {
        Self::at(prompt, responses, Utc::now())
    }

    pub fn at(prompt: impl Into<String>, responses: Vec<ResultRecord>, exported_at: DateTime<Utc>) -> Self {
        Self {
            prompt: prompt.into(),
            exported_at,
            summary: ExportSummary::from_records(&responses),
            responses,
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// File name such as `arena-2025-01-31T09-30-00.json`.
    pub fn suggested_file_name(&self) -> String {
        format!("arena-{}.json", self.exported_at.format("%Y-%m-%dT%H-%M-%S"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::Value;

    use super::*;
    use crate::types::ProviderKind;

    fn record(status: ResultStatus, latency_ms: f64, cost: Option<f64>) -> ResultRecord {
        ResultRecord {
            model: "GPT-4o mini".into(),
            model_id: "gpt-4o-mini".into(),
            provider: ProviderKind::OpenAi,
            context_window: 128_000,
            timestamp: Utc.with_ymd_and_hms(2025, 1, 31, 9, 30, 0).unwrap(),
            latency_ms,
            text: Some("4".into()),
            input_tokens: Some(10),
            output_tokens: Some(1),
            total_tokens: Some(11),
            estimated_cost_usd: cost,
            status,
            diagnostic: None,
            is_partial: false,
            usage_estimated: false,
        }
    }

    #[test]
    fn summary_skips_errors_in_latency_and_unknown_costs() {
        let summary = ExportSummary::from_records(&[
            record(ResultStatus::Success, 100.0, Some(0.25)),
            record(ResultStatus::Warning, 300.0, None),
            record(ResultStatus::Error, 5000.0, None),
        ]);
        assert_eq!(summary.total, 3);
        assert_eq!((summary.success, summary.warning, summary.error), (1, 1, 1));
        assert!((summary.total_cost_usd.unwrap() - 0.25).abs() < 1e-12);
        assert_eq!(summary.priced_count, 1);
        assert_eq!(summary.average_latency_ms, Some(200.0));
    }

    #[test]
    fn only_errors_have_no_average_latency() {
        let summary = ExportSummary::from_records(&[record(ResultStatus::Error, 10.0, None)]);
        assert_eq!(summary.average_latency_ms, None);
        assert_eq!(summary.total_cost_usd, None);
        assert_eq!(summary.priced_count, 0);
    }

    #[test]
    fn unpriced_models_leave_total_cost_unknown() {
        let summary = ExportSummary::from_records(&[
            record(ResultStatus::Success, 100.0, None),
            record(ResultStatus::Success, 200.0, None),
        ]);
        assert_eq!(summary.total_cost_usd, None);
        assert_eq!(summary.priced_count, 0);

        let artifact = ExportArtifact::new("hi", vec![record(ResultStatus::Success, 100.0, None)]);
        let value: Value = serde_json::from_str(&artifact.to_json_pretty().unwrap()).unwrap();
        assert!(value["summary"]["totalCostUsd"].is_null());
        assert_eq!(value["summary"]["pricedCount"], 0);
    }

    #[test]
    fn artifact_uses_camel_case_keys() {
        let exported_at = Utc.with_ymd_and_hms(2025, 1, 31, 9, 30, 0).unwrap();
        let artifact = ExportArtifact::at(
            "What is 2+2?",
            vec![record(ResultStatus::Success, 120.0, Some(0.001))],
            exported_at,
        );
        let value: Value = serde_json::from_str(&artifact.to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["prompt"], "What is 2+2?");
        assert!(value["exportedAt"].as_str().unwrap().starts_with("2025-01-31T09:30:00"));
        assert_eq!(value["summary"]["totalCostUsd"], 0.001);
        assert_eq!(value["summary"]["pricedCount"], 1);
        assert_eq!(value["summary"]["averageLatencyMs"], 120.0);
        assert_eq!(value["responses"][0]["modelId"], "gpt-4o-mini");
        assert_eq!(value["responses"][0]["estimatedCostUSD"], 0.001);
        assert_eq!(artifact.suggested_file_name(), "arena-2025-01-31T09-30-00.json");
    }
}
