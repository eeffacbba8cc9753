//! YAML configuration for simulation runs.
//!
//! ```yaml
//! type: classic
//! members:
//!   acceptors: 3
//!   learners: 1
//! ballots:
//!   period: 10
//! proposals:
//!   period: 3
//!   once:
//!     - { weight: 3, policy: good }
//!     - { weight: 1, policy: { moody: 2 } }
//! reproposals:
//!   period: 5
//! delays:
//!   default: { constant: 0.05 }
//!   rules:
//!     - role: acceptor
//!       index: 0
//!       from: 5
//!       until: 20
//!       kind: blackout
//! lifetime: 30
//! seed: 42
//! ```
//!
//! The schedule grammar is recursive: a mapping combines the keys
//! `once | period | delay | times | repeat | limit | schedule`, and a
//! list means parallel composition of its items. Policy leaves are
//! `good`, `bad`, `{moody: n}` or a weighted list; each draw generates a
//! fresh policy name so repeated firings propose distinct policies.

use gpaxos_core::{Address, Gen, Role, Schedule, SplitRng};
use gpaxos_roles::Variant;
use gpaxos_simulation::{AddressFilter, DelayKind, DelayProfile, DelayRule, TopologySpec};
use gpaxos_types::{Members, Policy};
use serde::Deserialize;
use std::time::Duration;

/// Fatal configuration errors, raised before launch.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("proposal schedule node needs a policy leaf (`once`) or a sub-schedule")]
    MissingLeaf,

    #[error("`repeat` requires `period`")]
    RepeatWithoutPeriod,

    #[error("unknown policy descriptor `{0}` (expected `good`, `bad` or `{{moody: n}}`)")]
    UnknownPolicy(String),

    #[error("weighted policy list is empty or all weights are zero")]
    EmptyWeights,

    #[error("delay rule has `index` but no `role`")]
    IndexWithoutRole,
}

/// Top-level config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimConfig {
    #[serde(rename = "type")]
    pub variant: VariantSpec,
    pub members: Members,
    #[serde(default)]
    pub ballots: Option<ScheduleSpec>,
    #[serde(default)]
    pub proposals: Option<ScheduleSpec>,
    #[serde(default)]
    pub reproposals: Option<ScheduleSpec>,
    #[serde(default)]
    pub delays: Option<DelaysSpec>,
    /// Seconds.
    pub lifetime: f64,
    #[serde(default)]
    pub seed: Option<u64>,
    /// Seconds. Fast variant only.
    #[serde(default)]
    pub recovery_delay: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantSpec {
    Classic,
    Fast,
}

impl From<VariantSpec> for Variant {
    fn from(spec: VariantSpec) -> Self {
        match spec {
            VariantSpec::Classic => Variant::Classic,
            VariantSpec::Fast => Variant::Fast,
        }
    }
}

impl SimConfig {
    pub fn from_yaml(source: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Lower the parsed config into a runnable topology spec.
    pub fn to_topology(&self) -> Result<TopologySpec, ConfigError> {
        let ballots = match &self.ballots {
            Some(spec) => spec.build_unit()?,
            // Without ballots nothing classic ever commits; default to one
            // ballot per second.
            None => Schedule::periodic(Duration::from_secs(1), Schedule::execute()),
        };
        let proposals = match &self.proposals {
            Some(spec) => spec.build_policy()?,
            None => Schedule::never(),
        };
        let reproposals = match &self.reproposals {
            Some(spec) => spec.build_unit()?,
            None => Schedule::never(),
        };
        let delays = match &self.delays {
            Some(spec) => spec.build()?,
            None => DelayProfile::default(),
        };
        Ok(TopologySpec {
            variant: self.variant.into(),
            members: self.members,
            ballots,
            proposals,
            reproposals,
            delays,
            lifetime: Duration::from_secs_f64(self.lifetime),
            seed: self.seed.unwrap_or(42),
            recovery_delay: Duration::from_secs_f64(self.recovery_delay.unwrap_or(1.0)),
        })
    }
}

// ─── Schedule grammar ───

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScheduleSpec {
    /// List form: parallel composition.
    Par(Vec<ScheduleSpec>),
    Node(ScheduleNode),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleNode {
    #[serde(default)]
    once: Option<PolicySpec>,
    /// Seconds between repetitions.
    #[serde(default)]
    period: Option<f64>,
    /// Seconds before the schedule starts.
    #[serde(default)]
    delay: Option<f64>,
    /// Invocations at the same instant.
    #[serde(default)]
    times: Option<u32>,
    /// Bounded repetition count; requires `period`.
    #[serde(default)]
    repeat: Option<u32>,
    /// Seconds after which no new invocation starts.
    #[serde(default)]
    limit: Option<f64>,
    #[serde(default)]
    schedule: Option<Box<ScheduleSpec>>,
}

impl ScheduleSpec {
    /// Build a unit schedule (ballots, reproposals). A node without a
    /// sub-schedule fires a single unit occurrence per invocation.
    pub fn build_unit(&self) -> Result<Schedule<()>, ConfigError> {
        match self {
            ScheduleSpec::Par(branches) => branches
                .iter()
                .map(ScheduleSpec::build_unit)
                .try_fold(Schedule::never(), |acc, branch| Ok(acc.par(branch?))),
            ScheduleSpec::Node(node) => {
                let inner = match &node.schedule {
                    Some(sub) => sub.build_unit()?,
                    None => Schedule::execute(),
                };
                node.wrap(inner)
            }
        }
    }

    /// Build a policy schedule (proposals). Leaves are required.
    pub fn build_policy(&self) -> Result<Schedule<Policy>, ConfigError> {
        match self {
            ScheduleSpec::Par(branches) => branches
                .iter()
                .map(ScheduleSpec::build_policy)
                .try_fold(Schedule::never(), |acc, branch| Ok(acc.par(branch?))),
            ScheduleSpec::Node(node) => {
                let inner = match (&node.schedule, &node.once) {
                    (Some(sub), None) => sub.build_policy()?,
                    (None, Some(leaf)) => Schedule::generate(leaf.to_gen()?),
                    (Some(_), Some(_)) | (None, None) => return Err(ConfigError::MissingLeaf),
                };
                node.wrap(inner)
            }
        }
    }
}

impl ScheduleNode {
    /// Apply the wrapping keys around a built inner schedule, innermost
    /// first: times, then repeat/period, then limit, then delay.
    fn wrap<T: Clone>(&self, inner: Schedule<T>) -> Result<Schedule<T>, ConfigError> {
        let mut schedule = inner;
        if let Some(times) = self.times {
            schedule = Schedule::times(times, schedule);
        }
        match (self.repeat, self.period) {
            (Some(_), None) => return Err(ConfigError::RepeatWithoutPeriod),
            (Some(count), Some(period)) => {
                schedule = Schedule::repeating(count, Duration::from_secs_f64(period), schedule);
            }
            (None, Some(period)) => {
                schedule = Schedule::periodic(Duration::from_secs_f64(period), schedule);
            }
            (None, None) => {}
        }
        if let Some(limit) = self.limit {
            schedule = Schedule::limited(Duration::from_secs_f64(limit), schedule);
        }
        if let Some(delay) = self.delay {
            schedule = Schedule::delayed(Duration::from_secs_f64(delay), schedule);
        }
        Ok(schedule)
    }
}

// ─── Policy leaves ───

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PolicySpec {
    /// `good` or `bad`.
    Named(String),
    /// `{moody: n}`.
    Moody { moody: u32 },
    /// `[{weight: w, policy: ...}, ...]`.
    Weighted(Vec<WeightedPolicy>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeightedPolicy {
    pub weight: u32,
    pub policy: Box<PolicySpec>,
}

/// Draw a short fresh suffix so repeated firings propose distinct
/// policies.
fn fresh(prefix: &str, rng: &mut SplitRng) -> String {
    format!("{prefix}-{:06x}", rng.gen_index(1 << 24))
}

impl PolicySpec {
    pub fn to_gen(&self) -> Result<Gen<Policy>, ConfigError> {
        match self {
            PolicySpec::Named(name) => match name.as_str() {
                "good" => Ok(Gen::make(|rng| Policy::Good(fresh("good", rng)))),
                "bad" => Ok(Gen::make(|rng| Policy::Bad(fresh("bad", rng)))),
                other => Err(ConfigError::UnknownPolicy(other.to_string())),
            },
            PolicySpec::Moody { moody } => {
                let group = *moody;
                Ok(Gen::make(move |rng| Policy::Moody {
                    group,
                    name: fresh("moody", rng),
                }))
            }
            PolicySpec::Weighted(choices) => {
                let gens = choices
                    .iter()
                    .map(|choice| Ok((choice.weight, choice.policy.to_gen()?)))
                    .collect::<Result<Vec<_>, ConfigError>>()?;
                Gen::weighted_gens(gens).ok_or(ConfigError::EmptyWeights)
            }
        }
    }
}

// ─── Delay profiles ───

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelaysSpec {
    #[serde(default)]
    default: Option<DelayKindSpec>,
    #[serde(default)]
    rules: Vec<DelayRuleSpec>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayKindSpec {
    /// Seconds.
    Constant(f64),
    /// Seconds.
    Uniform { low: f64, high: f64 },
    Blackout,
}

impl From<DelayKindSpec> for DelayKind {
    fn from(spec: DelayKindSpec) -> Self {
        match spec {
            DelayKindSpec::Constant(secs) => DelayKind::Constant(Duration::from_secs_f64(secs)),
            DelayKindSpec::Uniform { low, high } => DelayKind::Uniform {
                low: Duration::from_secs_f64(low),
                high: Duration::from_secs_f64(high),
            },
            DelayKindSpec::Blackout => DelayKind::Blackout,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleSpec {
    Proposer,
    Leader,
    Acceptor,
    Learner,
}

impl From<RoleSpec> for Role {
    fn from(spec: RoleSpec) -> Self {
        match spec {
            RoleSpec::Proposer => Role::Proposer,
            RoleSpec::Leader => Role::Leader,
            RoleSpec::Acceptor => Role::Acceptor,
            RoleSpec::Learner => Role::Learner,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DelayRuleSpec {
    #[serde(default)]
    role: Option<RoleSpec>,
    #[serde(default)]
    index: Option<u32>,
    /// Window start, seconds. Defaults to the beginning of the run.
    #[serde(default)]
    from: Option<f64>,
    /// Window end, seconds. Defaults to forever.
    #[serde(default)]
    until: Option<f64>,
    kind: DelayKindSpec,
}

impl DelaysSpec {
    pub fn build(&self) -> Result<DelayProfile, ConfigError> {
        let mut profile = match self.default {
            Some(kind) => DelayProfile::new(kind.into()),
            None => DelayProfile::default(),
        };
        for rule in &self.rules {
            let applies_to = match (rule.role, rule.index) {
                (Some(role), Some(index)) => {
                    AddressFilter::Exact(Address::new(role.into(), index))
                }
                (Some(role), None) => AddressFilter::Role(role.into()),
                (None, None) => AddressFilter::Any,
                (None, Some(_)) => return Err(ConfigError::IndexWithoutRole),
            };
            let window = match (rule.from, rule.until) {
                (None, None) => None,
                (from, until) => Some((
                    Duration::from_secs_f64(from.unwrap_or(0.0)),
                    until.map(Duration::from_secs_f64).unwrap_or(Duration::MAX),
                )),
            };
            profile = profile.with_rule(DelayRule {
                applies_to,
                window,
                kind: rule.kind.into(),
            });
        }
        Ok(profile)
    }
}
