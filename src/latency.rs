//! Latency simulation.
//!
//! A [`LatencyPolicy`] decodes a route's `response_offset` payload into a
//! [`LatencyOffset`] once, at compile time. The offset is then sampled on
//! every request. Policies are looked up by `response_offset_mode` in a
//! [`LatencyRegistry`].

use crate::config::RouteEntry;
use crate::error::ConfigShapeError;
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Policy used when `response_offset_mode` is empty.
pub const DEFAULT_MODE: &str = "constant";

/// Decoded latency payload of one route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LatencyOffset {
    /// No artificial delay
    None,
    /// Fixed delay in milliseconds (may be negative; clamped when applied)
    Constant { ms: f64 },
    /// Gaussian delay
    Normal { mean: f64, std: f64 },
    /// Delay drawn uniformly from `min..=max`
    Uniform { min: f64, max: f64 },
}

impl LatencyOffset {
    /// Draw one raw delay sample in milliseconds. Can be negative.
    pub fn sample_ms(&self) -> f64 {
        match *self {
            LatencyOffset::None => 0.0,
            LatencyOffset::Constant { ms } => ms,
            LatencyOffset::Normal { mean, std } => {
                let mut rng = rand::thread_rng();
                mean + std * standard_normal(&mut rng)
            }
            LatencyOffset::Uniform { min, max } => {
                if max > min {
                    rand::thread_rng().gen_range(min..=max)
                } else {
                    min
                }
            }
        }
    }

    /// Draw a sample and turn it into the delay to apply.
    ///
    /// Negative samples become zero; fractions of a millisecond are dropped.
    pub fn delay(&self) -> Duration {
        clamp_to_duration(self.sample_ms())
    }

    pub fn is_none(&self) -> bool {
        matches!(self, LatencyOffset::None)
    }
}

fn clamp_to_duration(ms: f64) -> Duration {
    if ms <= 0.0 || ms.is_nan() {
        return Duration::ZERO;
    }
    Duration::from_millis(ms as u64)
}

/// Box-Muller transform over two uniform samples.
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // 1 - [0, 1) keeps u1 away from zero so ln() stays finite
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// A named strategy for turning a route entry into a delay.
pub trait LatencyPolicy: Send + Sync {
    /// Decode the entry's `response_offset` for this policy.
    fn decode(&self, entry: &RouteEntry) -> Result<LatencyOffset, ConfigShapeError>;
}

/// `response_offset` is a number of milliseconds; absent means no delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantPolicy;

impl LatencyPolicy for ConstantPolicy {
    fn decode(&self, entry: &RouteEntry) -> Result<LatencyOffset, ConfigShapeError> {
        match &entry.response_offset {
            None | Some(Value::Null) => Ok(LatencyOffset::None),
            Some(value) => value
                .as_f64()
                .map(|ms| LatencyOffset::Constant { ms })
                .ok_or_else(|| shape_error(entry, "expects a number of milliseconds")),
        }
    }
}

/// `response_offset` is `{"mean": ms, "std": ms}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalPolicy;

impl LatencyPolicy for NormalPolicy {
    fn decode(&self, entry: &RouteEntry) -> Result<LatencyOffset, ConfigShapeError> {
        const EXPECTED: &str = "expects an object {\"mean\": number, \"std\": number}";

        let (mean, std) = number_pair(entry, "mean", "std")
            .ok_or_else(|| shape_error(entry, EXPECTED))?;
        if std < 0.0 {
            return Err(shape_error(entry, "expects a non-negative std"));
        }
        Ok(LatencyOffset::Normal { mean, std })
    }
}

/// `response_offset` is `{"min": ms, "max": ms}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformPolicy;

impl LatencyPolicy for UniformPolicy {
    fn decode(&self, entry: &RouteEntry) -> Result<LatencyOffset, ConfigShapeError> {
        const EXPECTED: &str = "expects an object {\"min\": number, \"max\": number}";

        let (min, max) = number_pair(entry, "min", "max")
            .ok_or_else(|| shape_error(entry, EXPECTED))?;
        if max < min {
            return Err(shape_error(entry, "expects min <= max"));
        }
        Ok(LatencyOffset::Uniform { min, max })
    }
}

fn number_pair(entry: &RouteEntry, first: &str, second: &str) -> Option<(f64, f64)> {
    let object = entry.response_offset.as_ref()?.as_object()?;
    let a = object.get(first)?.as_f64()?;
    let b = object.get(second)?.as_f64()?;
    Some((a, b))
}

fn shape_error(entry: &RouteEntry, reason: &str) -> ConfigShapeError {
    ConfigShapeError {
        method: entry.method.clone(),
        path: entry.path.clone(),
        mode: entry.response_offset_mode.clone(),
        reason: reason.to_string(),
        offset: entry
            .response_offset
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "nothing".to_string()),
    }
}

/// Latency policies keyed by mode name.
///
/// Built once at startup and handed to the compiler; never mutated while
/// serving.
#[derive(Clone, Default)]
pub struct LatencyRegistry {
    policies: HashMap<String, Arc<dyn LatencyPolicy>>,
}

impl LatencyRegistry {
    /// Registry with no policies; every mode resolves to no delay.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the `constant`, `normal` and `uniform` policies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(DEFAULT_MODE, ConstantPolicy);
        registry.register("normal", NormalPolicy);
        registry.register("uniform", UniformPolicy);
        registry
    }

    /// Add or replace a policy.
    pub fn register(&mut self, name: impl Into<String>, policy: impl LatencyPolicy + 'static) {
        self.policies.insert(name.into(), Arc::new(policy));
    }

    pub fn contains(&self, mode: &str) -> bool {
        self.policies.contains_key(canonical_mode(mode))
    }

    /// Registered mode names, sorted.
    pub fn modes(&self) -> Vec<&str> {
        let mut modes: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        modes.sort_unstable();
        modes
    }

    /// Decode an entry's latency with the policy its mode names.
    ///
    /// Unknown modes are not an error: they log and resolve to no delay.
    pub fn resolve(&self, entry: &RouteEntry) -> Result<LatencyOffset, ConfigShapeError> {
        let mode = canonical_mode(&entry.response_offset_mode);
        match self.policies.get(mode) {
            Some(policy) => policy.decode(entry),
            None => {
                info!(
                    mode = %entry.response_offset_mode,
                    method = %entry.method,
                    path = %entry.path,
                    "Unknown response_offset_mode, no delay will be applied"
                );
                Ok(LatencyOffset::None)
            }
        }
    }
}

impl fmt::Debug for LatencyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatencyRegistry")
            .field("modes", &self.modes())
            .finish()
    }
}

fn canonical_mode(mode: &str) -> &str {
    if mode.is_empty() {
        DEFAULT_MODE
    } else {
        mode
    }
}
