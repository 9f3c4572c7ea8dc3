//! Version strategies
//!
//! Every supported release line of the orchestration cluster renders a
//! slightly different resource set. A [`StrategyRegistry`] maps semantic
//! version ranges to the [`VersionStrategy`] that knows how to build the
//! resources for that line.
//!
//! Range evaluation follows release-line semantics rather than Cargo's: a
//! pre-release version is accepted by any range whose comparators mention a
//! pre-release, so `8.8.0-alpha5` satisfies `>=8.7.0-alpha1` but not
//! `>=8.7.0`.

use crate::crd::OrchestrationCluster;
use crate::env::EnvProfile;
use crate::error::{OperatorError, Result};
use crate::resources::{Layout, ResourceBuilder, ResourceSet};
use semver::{BuildMetadata, Comparator, Op, Prerelease, Version, VersionReq};
use tracing::debug;

/// Builder variants, one per supported release line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStrategy {
    /// 8.6 line: one headless service carries every port
    Legacy,
    /// 8.7 and later: consolidated application with a separate gateway service
    Consolidated,
}

impl VersionStrategy {
    /// Resource layout rendered by this strategy
    pub fn layout(&self) -> Layout {
        match self {
            VersionStrategy::Legacy => Layout {
                env: EnvProfile {
                    active_profiles: "broker,operate",
                    security_flags: false,
                    applications: &["OPERATE"],
                },
                gateway_service: false,
            },
            VersionStrategy::Consolidated => Layout {
                env: EnvProfile {
                    active_profiles: "identity,operate,tasklist,broker,consolidated-auth",
                    security_flags: true,
                    applications: &["OPERATE", "TASKLIST"],
                },
                gateway_service: true,
            },
        }
    }

    /// Build the resource set for `cluster`
    pub fn build(&self, cluster: &OrchestrationCluster) -> Result<ResourceSet> {
        Ok(ResourceBuilder::new(cluster)?.build(&self.layout()))
    }
}

/// Registered version range
#[derive(Debug, Clone)]
struct Entry {
    source: String,
    range: VersionReq,
    strategy: VersionStrategy,
}

/// Immutable, ordered table of version ranges and their strategies
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    entries: Vec<Entry>,
}

impl StrategyRegistry {
    /// Build a registry from `(range, strategy)` pairs.
    ///
    /// Fails with `InvalidVersionConstraint` on the first unparsable range.
    pub fn new<S: AsRef<str>>(entries: Vec<(S, VersionStrategy)>) -> Result<Self> {
        let entries = entries
            .into_iter()
            .map(|(source, strategy)| {
                let source = source.as_ref().trim().to_string();
                let range = VersionReq::parse(&source).map_err(|e| {
                    OperatorError::InvalidVersionConstraint(format!("{}: {}", source, e))
                })?;
                Ok(Entry {
                    source,
                    range,
                    strategy,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { entries })
    }

    /// Registry of the release lines this operator supports
    pub fn standard() -> Result<Self> {
        Self::new(vec![
            (">=8.6.0, <8.7.0-alpha1", VersionStrategy::Legacy),
            (">=8.7.0-alpha1", VersionStrategy::Consolidated),
        ])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Select the strategy for `version`.
    ///
    /// When several ranges match, the one with the highest lower bound wins;
    /// equal lower bounds go to the entry registered first.
    pub fn select(&self, version: &str) -> Result<VersionStrategy> {
        let trimmed = version.trim();
        let parsed = Version::parse(trimmed.strip_prefix('v').unwrap_or(trimmed))
            .map_err(|_| OperatorError::InvalidVersionFormat(version.to_string()))?;

        let mut best: Option<(&Entry, Version)> = None;
        for entry in self.entries.iter().filter(|e| range_matches(&e.range, &parsed)) {
            let floor = lower_bound(&entry.range);
            if best.as_ref().map_or(true, |(_, current)| floor > *current) {
                best = Some((entry, floor));
            }
        }

        let (entry, _) = best.ok_or_else(|| OperatorError::NoStrategyFound(version.to_string()))?;
        debug!(
            version = %parsed,
            range = %entry.source,
            strategy = ?entry.strategy,
            "Selected version strategy"
        );
        Ok(entry.strategy)
    }
}

/// Whether `version` satisfies every comparator of `range`
fn range_matches(range: &VersionReq, version: &Version) -> bool {
    let version = Version {
        build: BuildMetadata::EMPTY,
        ..version.clone()
    };

    if !version.pre.is_empty() && range.comparators.iter().all(|c| c.pre.is_empty()) {
        return false;
    }

    range
        .comparators
        .iter()
        .all(|comparator| comparator_matches(comparator, &version))
}

fn comparator_matches(cmp: &Comparator, v: &Version) -> bool {
    let floor = comparator_floor(cmp);
    let partial = cmp.minor.is_none() || cmp.patch.is_none();

    match cmp.op {
        Op::Exact | Op::Wildcard if partial => *v >= floor && *v < bump_last(cmp),
        Op::Exact => *v == floor,
        Op::Wildcard => true,
        Op::Greater if partial => *v >= bump_last(cmp),
        Op::Greater => *v > floor,
        Op::GreaterEq => *v >= floor,
        Op::Less => *v < floor,
        Op::LessEq if partial => *v < bump_last(cmp),
        Op::LessEq => *v <= floor,
        Op::Tilde => {
            let ceiling = match cmp.minor {
                Some(minor) => release(cmp.major, minor + 1, 0),
                None => release(cmp.major + 1, 0, 0),
            };
            *v >= floor && *v < ceiling
        }
        Op::Caret => *v >= floor && *v < caret_ceiling(cmp),
        _ => false,
    }
}

/// Smallest version a comparator can refer to
fn comparator_floor(cmp: &Comparator) -> Version {
    Version {
        major: cmp.major,
        minor: cmp.minor.unwrap_or(0),
        patch: cmp.patch.unwrap_or(0),
        pre: cmp.pre.clone(),
        build: BuildMetadata::EMPTY,
    }
}

/// First release past the last component the comparator names
fn bump_last(cmp: &Comparator) -> Version {
    match (cmp.minor, cmp.patch) {
        (None, _) => release(cmp.major + 1, 0, 0),
        (Some(minor), None) => release(cmp.major, minor + 1, 0),
        (Some(minor), Some(patch)) => release(cmp.major, minor, patch + 1),
    }
}

fn caret_ceiling(cmp: &Comparator) -> Version {
    match (cmp.major, cmp.minor, cmp.patch) {
        (0, None, _) => release(1, 0, 0),
        (0, Some(0), Some(patch)) => release(0, 0, patch + 1),
        (0, Some(minor), _) => release(0, minor + 1, 0),
        (major, _, _) => release(major + 1, 0, 0),
    }
}

fn release(major: u64, minor: u64, patch: u64) -> Version {
    Version {
        major,
        minor,
        patch,
        pre: Prerelease::EMPTY,
        build: BuildMetadata::EMPTY,
    }
}

/// Highest floor among the comparators that bound a range from below
fn lower_bound(range: &VersionReq) -> Version {
    range
        .comparators
        .iter()
        .filter(|c| !matches!(c.op, Op::Less | Op::LessEq))
        .map(comparator_floor)
        .max()
        .unwrap_or_else(|| release(0, 0, 0))
}

/// A cluster snapshot paired with the strategy selected for its version
#[derive(Debug, Clone)]
pub struct Bundle {
    pub cluster: OrchestrationCluster,
    pub strategy: VersionStrategy,
}

impl Bundle {
    /// Select the strategy for the cluster's declared version
    pub fn new(cluster: OrchestrationCluster, registry: &StrategyRegistry) -> Result<Self> {
        let strategy = registry.select(cluster.spec.effective_version())?;
        Ok(Self { cluster, strategy })
    }

    /// Render the desired resources of the cluster
    pub fn resources(&self) -> Result<ResourceSet> {
        self.strategy.build(&self.cluster)
    }
}
