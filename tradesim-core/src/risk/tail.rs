//! Tail-risk sizing factor from recent equity returns.

use crate::metrics::daily_returns;

/// Number of most recent daily returns considered.
pub const CVAR_WINDOW: usize = 60;
/// Tail quantile.
pub const CVAR_QUANTILE: f64 = 0.05;
/// The factor never shrinks sizing below this.
pub const MIN_CVAR_FACTOR: f64 = 0.4;

/// Percentile of `values` with linear interpolation between closest ranks.
///
/// `q` is a fraction in `[0, 1]`. Returns `None` for empty input.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let weight = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * weight)
}

/// Conditional value at risk: mean of the returns strictly below the
/// `CVAR_QUANTILE` percentile, or the percentile itself when none are below.
pub fn cvar(returns: &[f64]) -> Option<f64> {
    let var = percentile(returns, CVAR_QUANTILE)?;
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r < var).collect();
    if tail.is_empty() {
        return Some(var);
    }
    Some(tail.iter().sum::<f64>() / tail.len() as f64)
}

/// Sizing multiplier in `[MIN_CVAR_FACTOR, ..]` from an equity history.
///
/// Uses the last `CVAR_WINDOW` daily returns. Fewer than two returns gives 1.0.
pub fn cvar_factor(equity_history: &[f64]) -> f64 {
    let returns = daily_returns(equity_history);
    if returns.len() < 2 {
        return 1.0;
    }
    let start = returns.len().saturating_sub(CVAR_WINDOW);
    match cvar(&returns[start..]) {
        Some(c) => (1.0 + c).max(MIN_CVAR_FACTOR),
        None => 1.0,
    }
}
