//! Domain types for fleetfit.
//!
//! Deployments are the workloads to place, resources are the capacity
//! bounded targets they land on. Both carry optional labels used for
//! affinity grouping. All types are serde-serializable so collaborators
//! can load and render them.

use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

// ── Quantities ────────────────────────────────────────────────────

/// CPU quantity in thousandths of a core.
///
/// Callers speak in cores (`0.5`), the solver works in exact integers so
/// that fit checks and the packing model agree on every comparison.
/// Serialized as a floating-point core count.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "f64", into = "f64")]
pub struct MilliCpu(u64);

impl MilliCpu {
    /// Millicores per core.
    pub const SCALE: u64 = 1000;

    pub const ZERO: MilliCpu = MilliCpu(0);

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Convert a core count, rejecting negative and non-finite values.
    pub fn from_cores(cores: f64) -> ConfigResult<Self> {
        if !cores.is_finite() || cores < 0.0 {
            return Err(ConfigError::InvalidQuantity(format!(
                "cpu must be a non-negative number of cores, got {cores}"
            )));
        }
        Ok(Self((cores * Self::SCALE as f64).round() as u64))
    }

    pub const fn millis(self) -> u64 {
        self.0
    }

    pub fn cores(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Add for MilliCpu {
    type Output = MilliCpu;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for MilliCpu {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl TryFrom<f64> for MilliCpu {
    type Error = ConfigError;

    fn try_from(cores: f64) -> Result<Self, Self::Error> {
        Self::from_cores(cores)
    }
}

impl From<MilliCpu> for f64 {
    fn from(cpu: MilliCpu) -> Self {
        cpu.cores()
    }
}

impl fmt::Display for MilliCpu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cores())
    }
}

// ── Labels ────────────────────────────────────────────────────────

/// Label set attached to deployments and resources.
///
/// Keys are kept sorted, so two label sets with the same pairs compare
/// equal and produce the same [`group_key`](Labels::group_key) regardless
/// of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// True when every pair of `self` is present in `other`.
    pub fn is_subset_of(&self, other: &Labels) -> bool {
        self.0
            .iter()
            .all(|(k, v)| other.0.get(k).is_some_and(|ov| ov == v))
    }

    /// Canonical serialization used as a grouping key.
    ///
    /// Sorted-key JSON object, e.g. `{"node":"3","zone":"a"}`. Stable
    /// across platforms and unambiguous for any key or value content.
    pub fn group_key(&self) -> String {
        let map: serde_json::Map<String, serde_json::Value> = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::Value::Object(map).to_string()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Labels {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

/// Anything that carries an optional label set.
///
/// An empty set reads as unlabeled.
pub trait Labeled {
    fn label_set(&self) -> Option<&Labels>;
}

// ── Deployment ────────────────────────────────────────────────────

/// A workload to be placed on exactly one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentEntity {
    pub name: String,
    /// CPU request.
    pub cpu: MilliCpu,
    /// Memory request in megabytes.
    pub memory: u64,
    /// Informational only, never enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<MilliCpu>,
    /// Informational only, never enforced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Labels>,
}

impl DeploymentEntity {
    pub fn new(name: impl Into<String>, cpu: MilliCpu, memory: u64) -> Self {
        Self {
            name: name.into(),
            cpu,
            memory,
            cpu_limit: None,
            memory_limit: None,
            labels: None,
        }
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn with_limits(mut self, cpu_limit: MilliCpu, memory_limit: u64) -> Self {
        self.cpu_limit = Some(cpu_limit);
        self.memory_limit = Some(memory_limit);
        self
    }
}

impl Labeled for DeploymentEntity {
    fn label_set(&self) -> Option<&Labels> {
        self.labels.as_ref().filter(|l| !l.is_empty())
    }
}

// ── Resource ──────────────────────────────────────────────────────

/// A capacity-bounded placement target.
///
/// Capacity is fixed at construction. Assigned deployments are only ever
/// added through [`add_deployment`](ResourceEntity::add_deployment), which
/// keeps the sum of assigned requests within capacity on both dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEntity {
    pub name: String,
    cpu: MilliCpu,
    /// Memory capacity in megabytes.
    memory: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Labels>,
    #[serde(skip)]
    deployments: Vec<DeploymentEntity>,
    #[serde(skip)]
    used_cpu: MilliCpu,
    #[serde(skip)]
    used_memory: u64,
}

impl ResourceEntity {
    pub fn new(name: impl Into<String>, cpu: MilliCpu, memory: u64) -> Self {
        Self {
            name: name.into(),
            cpu,
            memory,
            labels: None,
            deployments: Vec::new(),
            used_cpu: MilliCpu::ZERO,
            used_memory: 0,
        }
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn cpu(&self) -> MilliCpu {
        self.cpu
    }

    pub fn memory(&self) -> u64 {
        self.memory
    }

    pub fn deployments(&self) -> &[DeploymentEntity] {
        &self.deployments
    }

    pub fn idle_cpu(&self) -> MilliCpu {
        self.cpu.saturating_sub(self.used_cpu)
    }

    pub fn idle_memory(&self) -> u64 {
        self.memory.saturating_sub(self.used_memory)
    }

    /// Whether the deployment fits into the remaining capacity.
    pub fn fits(&self, deployment: &DeploymentEntity) -> bool {
        deployment.cpu <= self.idle_cpu() && deployment.memory <= self.idle_memory()
    }

    /// Whether this resource may host workloads requiring `required`.
    ///
    /// Unlabeled resources only satisfy an empty requirement.
    pub fn satisfies(&self, required: &Labels) -> bool {
        match &self.labels {
            Some(labels) => required.is_subset_of(labels),
            None => required.is_empty(),
        }
    }

    /// Assign a deployment if it fits. Returns `false` and leaves the
    /// resource untouched otherwise.
    pub fn add_deployment(&mut self, deployment: &DeploymentEntity) -> bool {
        if !self.fits(deployment) {
            return false;
        }
        self.used_cpu = self.used_cpu + deployment.cpu;
        self.used_memory += deployment.memory;
        self.deployments.push(deployment.clone());
        true
    }

    pub fn clear_deployments(&mut self) {
        self.deployments.clear();
        self.used_cpu = MilliCpu::ZERO;
        self.used_memory = 0;
    }
}

impl Labeled for ResourceEntity {
    fn label_set(&self) -> Option<&Labels> {
        self.labels.as_ref().filter(|l| !l.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cores(c: f64) -> MilliCpu {
        MilliCpu::from_cores(c).unwrap()
    }

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs.iter().copied().collect()
    }

    #[test]
    fn millicpu_converts_cores() {
        assert_eq!(cores(0.5).millis(), 500);
        assert_eq!(cores(2.0).millis(), 2000);
        assert_eq!(cores(0.1).millis(), 100);
        assert_eq!(MilliCpu::from_millis(250).cores(), 0.25);
    }

    #[test]
    fn millicpu_rejects_negative_and_nan() {
        assert!(MilliCpu::from_cores(-1.0).is_err());
        assert!(MilliCpu::from_cores(f64::NAN).is_err());
        assert!(MilliCpu::from_cores(f64::INFINITY).is_err());
    }

    #[test]
    fn add_deployment_respects_capacity() {
        let mut node = ResourceEntity::new("n1", cores(1.0), 1024);
        let small = DeploymentEntity::new("small", cores(0.5), 512);
        let big = DeploymentEntity::new("big", cores(0.6), 256);

        assert!(node.add_deployment(&small));
        assert!(!node.add_deployment(&big));
        assert_eq!(node.deployments().len(), 1);
        assert_eq!(node.idle_cpu(), cores(0.5));
        assert_eq!(node.idle_memory(), 512);
    }

    #[test]
    fn add_deployment_checks_memory_dimension() {
        let mut node = ResourceEntity::new("n1", cores(4.0), 512);
        let hungry = DeploymentEntity::new("hungry", cores(0.1), 1024);

        assert!(!node.add_deployment(&hungry));
        assert!(node.deployments().is_empty());
        assert_eq!(node.idle_memory(), 512);
    }

    #[test]
    fn exact_fill_is_accepted() {
        let mut node = ResourceEntity::new("n1", cores(1.0), 1024);
        for i in 0..10 {
            let d = DeploymentEntity::new(format!("d{i}"), cores(0.1), 100);
            assert!(node.add_deployment(&d), "deployment {i} should fit");
        }
        assert_eq!(node.idle_cpu(), MilliCpu::ZERO);
        assert_eq!(node.idle_memory(), 24);
    }

    #[test]
    fn clear_deployments_restores_capacity() {
        let mut node = ResourceEntity::new("n1", cores(2.0), 2048);
        node.add_deployment(&DeploymentEntity::new("a", cores(1.5), 1024));
        node.clear_deployments();

        assert!(node.deployments().is_empty());
        assert_eq!(node.idle_cpu(), cores(2.0));
        assert_eq!(node.idle_memory(), 2048);
    }

    #[test]
    fn cloned_resources_do_not_share_deployments() {
        let mut a = ResourceEntity::new("a", cores(1.0), 1024);
        let b = a.clone();
        a.add_deployment(&DeploymentEntity::new("x", cores(0.5), 10));

        assert_eq!(a.deployments().len(), 1);
        assert!(b.deployments().is_empty());
    }

    #[test]
    fn subset_matching() {
        let required = labels(&[("zone", "a")]);
        let node = labels(&[("zone", "a"), ("gpu", "true")]);
        let other = labels(&[("zone", "b")]);

        assert!(required.is_subset_of(&node));
        assert!(!node.is_subset_of(&required));
        assert!(!required.is_subset_of(&other));
        assert!(Labels::new().is_subset_of(&other));
    }

    #[test]
    fn unlabeled_resource_satisfies_only_empty_requirement() {
        let node = ResourceEntity::new("n1", cores(1.0), 1024);
        assert!(node.satisfies(&Labels::new()));
        assert!(!node.satisfies(&labels(&[("node", "3")])));
    }

    #[test]
    fn group_key_ignores_insertion_order() {
        let mut first = Labels::new();
        first.insert("zone", "a");
        first.insert("node", "3");
        let mut second = Labels::new();
        second.insert("node", "3");
        second.insert("zone", "a");

        assert_eq!(first.group_key(), second.group_key());
        assert_eq!(first.group_key(), r#"{"node":"3","zone":"a"}"#);
    }

    #[test]
    fn group_key_is_unambiguous() {
        let joined = labels(&[("a", "b,c=d")]);
        let split = labels(&[("a", "b"), ("c", "d")]);
        assert_ne!(joined.group_key(), split.group_key());
    }

    #[test]
    fn empty_labels_read_as_unlabeled() {
        let d = DeploymentEntity::new("d", cores(1.0), 1).with_labels(Labels::new());
        assert!(d.label_set().is_none());

        let labeled = DeploymentEntity::new("d", cores(1.0), 1).with_labels(labels(&[("k", "v")]));
        assert_eq!(labeled.label_set().map(Labels::len), Some(1));
    }

    #[test]
    fn deserializes_from_toml() {
        let input = r#"
name = "node-1"
cpu = 3
memory = 1024
labels = { zone = "a" }
"#;
        let node: ResourceEntity = toml::from_str(input).unwrap();
        assert_eq!(node.name, "node-1");
        assert_eq!(node.cpu(), cores(3.0));
        assert_eq!(node.memory(), 1024);
        assert_eq!(node.labels.as_ref().and_then(|l| l.get("zone")), Some("a"));
        assert!(node.deployments().is_empty());

        let deployment: DeploymentEntity =
            toml::from_str("name = \"api\"\ncpu = 0.25\nmemory = 128\n").unwrap();
        assert_eq!(deployment.cpu.millis(), 250);
        assert!(deployment.labels.is_none());
    }

    #[test]
    fn negative_cpu_fails_to_deserialize() {
        let result: Result<DeploymentEntity, _> =
            toml::from_str("name = \"api\"\ncpu = -1.0\nmemory = 128\n");
        assert!(result.is_err());
    }
}
