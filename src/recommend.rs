//! Memory size recommendation for AWS Lambda functions.
//!
//! Lambda allocates CPU in proportion to configured memory, one vCPU per
//! 1792 MB. Comparing the CPU time a function actually burned with the
//! vCPUs it was given tells whether its memory setting is too low (CPU
//! bound) or larger than its CPU use needs.

use crate::error::RecommendError;

/// Configured megabytes per allocated vCPU.
pub const LAMBDA_MB_PER_VCPU: f64 = 1792.0;

/// Clock ticks per second used by /proc/stat counters.
pub const USER_HZ: f64 = 100.0;

pub const MIN_MEMORY_MB: i64 = 128;
pub const MAX_MEMORY_MB: i64 = 10240;

// vCPUs = SLOPE * memory_mb + INTERCEPT, fitted on measured Lambda allocations
const VCPU_SLOPE: f64 = 0.000556;
const VCPU_INTERCEPT: f64 = 0.012346;

/// Headroom below which a function counts as CPU bound.
const SATURATION_MARGIN: f64 = 0.1;
const SATURATED_SCALE: f64 = 1.1;

/// Derived allocation figures, rounded the way they are reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recommendation {
    pub available_cpus: f64,
    pub utilized_cpus: f64,
    pub recommended_memory_mb: i64,
}

/// Recommends a memory size from the configured memory, the user plus
/// kernel ticks consumed during the invocation, and the user runtime.
///
/// A function using nearly all of its vCPUs is asked for 10% more; any
/// other function is sized to the vCPUs it used. Results are clamped to
/// the sizes Lambda accepts.
pub fn recommend(
    function_memory: Option<&str>,
    busy_ticks: i64,
    user_runtime_ms: i64,
) -> Result<Recommendation, RecommendError> {
    let memory = function_memory.ok_or(RecommendError::MissingMemory)?;
    let memory_mb: f64 = memory
        .trim()
        .parse()
        .map_err(|_| RecommendError::InvalidMemory(memory.to_string()))?;
    if user_runtime_ms <= 0 {
        return Err(RecommendError::NoUserRuntime(user_runtime_ms));
    }

    let available_cpus = memory_mb / LAMBDA_MB_PER_VCPU;
    let busy_ms = busy_ticks as f64 * 1000.0 / USER_HZ;
    let utilized_cpus = busy_ms / user_runtime_ms as f64;

    let target_cpus = if available_cpus - utilized_cpus < SATURATION_MARGIN {
        available_cpus * SATURATED_SCALE
    } else {
        utilized_cpus
    };
    let recommended = ((target_cpus - VCPU_INTERCEPT) / VCPU_SLOPE).round() as i64;

    Ok(Recommendation {
        available_cpus: round3(available_cpus),
        utilized_cpus: round3(utilized_cpus),
        recommended_memory_mb: recommended.clamp(MIN_MEMORY_MB, MAX_MEMORY_MB),
    })
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_function_gets_minimum() {
        let rec = recommend(Some("1792"), 0, 500).expect("valid inputs");
        assert_eq!(rec.available_cpus, 1.0);
        assert_eq!(rec.utilized_cpus, 0.0);
        assert_eq!(rec.recommended_memory_mb, MIN_MEMORY_MB);
    }

    #[test]
    fn test_partially_used_function_sized_to_use() {
        // 25 ticks = 250 ms of CPU over 500 ms: half a vCPU
        let rec = recommend(Some("3584"), 25, 500).expect("valid inputs");
        assert_eq!(rec.available_cpus, 2.0);
        assert_eq!(rec.utilized_cpus, 0.5);
        assert_eq!(rec.recommended_memory_mb, 877);
    }

    #[test]
    fn test_saturated_function_scaled_up() {
        // 100 ticks = 1000 ms of CPU over 1000 ms on one vCPU
        let rec = recommend(Some("1792"), 100, 1000).expect("valid inputs");
        assert_eq!(rec.utilized_cpus, 1.0);
        assert_eq!(rec.recommended_memory_mb, 1956);
    }

    #[test]
    fn test_recommendation_clamped_to_maximum() {
        let rec = recommend(Some("10240"), 1000, 1000).expect("valid inputs");
        assert_eq!(rec.recommended_memory_mb, MAX_MEMORY_MB);
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(recommend(None, 1, 1), Err(RecommendError::MissingMemory));
        assert_eq!(
            recommend(Some("lots"), 1, 1),
            Err(RecommendError::InvalidMemory("lots".into()))
        );
        assert_eq!(
            recommend(Some("512"), 1, 0),
            Err(RecommendError::NoUserRuntime(0))
        );
    }
}
