//! Token estimation, cost computation and presentation helpers.
//!
//! Everything here is a pure function so any number of in-flight targets can call
//! into it concurrently.

use serde::{Deserialize, Serialize};

/// Price of a model in USD per 1,000 tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input: f64,
    pub output: f64,
}

impl ModelPricing {
    pub const fn new(input: f64, output: f64) -> Self {
        Self { input, output }
    }
}

/// Rough token count used when a provider does not report usage: one token per four
/// characters, rounded up.
///
/// # Examples
///
/// ```
/// use llm_arena::metrics::estimate_token_count;
///
/// assert_eq!(estimate_token_count(""), 0);
/// assert_eq!(estimate_token_count("abcde"), 2);
/// ```
pub fn estimate_token_count(text: &str) -> u64 {
    let chars = text.chars().count() as u64;
    chars.div_ceil(4)
}

/// Cost in USD of a request, or `None` when the model has no known price.
///
/// # Examples
///
/// ```
/// use llm_arena::metrics::{calculate_cost, ModelPricing};
///
/// let cost = calculate_cost(Some(ModelPricing::new(0.5, 1.5)), 2000, 1000).unwrap();
/// assert!((cost - 2.5).abs() < 1e-12);
/// assert_eq!(calculate_cost(None, 2000, 1000), None);
/// ```
pub fn calculate_cost(
    pricing: Option<ModelPricing>,
    input_tokens: u64,
    output_tokens: u64,
) -> Option<f64> {
    let pricing = pricing?;
    Some(
        (input_tokens as f64 / 1000.0) * pricing.input
            + (output_tokens as f64 / 1000.0) * pricing.output,
    )
}

/// Coarse latency classes used to color side-by-side results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LatencyBucket {
    /// Under two seconds.
    Fast,
    /// Two to five seconds.
    Moderate,
    /// Five seconds or more.
    Slow,
}

impl LatencyBucket {
    pub fn from_millis(latency_ms: f64) -> Self {
        if latency_ms < 2_000.0 {
            Self::Fast
        } else if latency_ms < 5_000.0 {
            Self::Moderate
        } else {
            Self::Slow
        }
    }
}

/// `850ms` below one second, `1.23s` below a minute, `1m 05s` beyond.
pub fn format_latency(latency_ms: f64) -> String {
    if !latency_ms.is_finite() || latency_ms < 0.0 {
        return "N/A".to_string();
    }
    if latency_ms < 1_000.0 {
        format!("{}ms", latency_ms.round() as u64)
    } else if latency_ms < 60_000.0 {
        format!("{:.2}s", latency_ms / 1_000.0)
    } else {
        let total_secs = (latency_ms / 1_000.0).round() as u64;
        format!("{}m {:02}s", total_secs / 60, total_secs % 60)
    }
}

/// Thousands-separated token count, `N/A` when unknown.
pub fn format_token_count(tokens: Option<u64>) -> String {
    let Some(tokens) = tokens else {
        return "N/A".to_string();
    };
    let digits = tokens.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Renders a cost, keeping "unknown" and "free" apart.
///
/// # Examples
///
/// ```
/// use llm_arena::metrics::format_cost;
///
/// assert_eq!(format_cost(None), "N/A");
/// assert_eq!(format_cost(Some(0.0)), "$0.00");
/// assert_eq!(format_cost(Some(0.0123)), "$0.0123");
/// ```
pub fn format_cost(cost: Option<f64>) -> String {
    match cost {
        None => "N/A".to_string(),
        Some(value) if !value.is_finite() => "N/A".to_string(),
        Some(value) if value == 0.0 => "$0.00".to_string(),
        Some(value) if value < 0.0001 => format!("${value:.6}"),
        Some(value) if value < 1.0 => format!("${value:.4}"),
        Some(value) => format!("${value:.2}"),
    }
}
