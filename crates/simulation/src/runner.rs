//! Deterministic simulation runner.
//!
//! Expands the topology's schedules into timed events, then drains one
//! totally-ordered queue, executing role actions inline. Given the same
//! spec (seed included), a run produces identical results every time.

use crate::event_queue::EventKey;
use crate::monitor::{AllStates, MonitorBreach};
use crate::network::{DelayProfile, SimulatedNetwork};
use crate::NodeIndex;
use gpaxos_core::{
    Action, Address, Event, ProtocolMessage, ProtocolViolation, Role, Schedule, SplitRng,
    StateMachine, TimerId,
};
use gpaxos_roles::{
    AcceptorState, LeaderState, LearnerState, ProposerState, ProtocolConfig, RoleStateMachine,
    Variant,
};
use gpaxos_types::{Acceptance, AcceptorId, BallotId, Configuration, Members, MembersError, Policy};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Everything needed to launch one topology.
#[derive(Debug, Clone)]
pub struct TopologySpec {
    pub variant: Variant,
    pub members: Members,
    /// When the leader opens ballots.
    pub ballots: Schedule<()>,
    /// When proposals arrive, and which policies they carry.
    pub proposals: Schedule<Policy>,
    /// When proposers re-send everything proposed so far.
    pub reproposals: Schedule<()>,
    pub delays: DelayProfile,
    pub lifetime: Duration,
    pub seed: u64,
    /// Fast variant: delay between divergence detection and recovery.
    pub recovery_delay: Duration,
}

impl TopologySpec {
    /// A plain classic topology with the default network and a ballot
    /// every second; tests adjust from here.
    pub fn classic(members: Members, lifetime: Duration, seed: u64) -> Self {
        Self {
            variant: Variant::Classic,
            members,
            ballots: Schedule::periodic(Duration::from_secs(1), Schedule::execute()),
            proposals: Schedule::never(),
            reproposals: Schedule::never(),
            delays: DelayProfile::default(),
            lifetime,
            seed,
            recovery_delay: Duration::from_secs(1),
        }
    }

    /// Like [`TopologySpec::classic`], for the fast variant.
    pub fn fast(members: Members, lifetime: Duration, seed: u64) -> Self {
        Self {
            variant: Variant::Fast,
            ..Self::classic(members, lifetime, seed)
        }
    }
}

/// Fatal configuration errors, raised before launch.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error(transparent)]
    Members(#[from] MembersError),

    #[error("lifetime must be positive")]
    ZeroLifetime,
}

/// Statistics collected during simulation.
#[derive(Debug, Default, Clone)]
pub struct SimulationStats {
    /// Total events processed.
    pub events_processed: u64,
    /// Events processed by priority.
    pub events_by_priority: [u64; 4],
    /// Total actions generated.
    pub actions_generated: u64,
    /// Messages scheduled for delivery.
    pub messages_sent: u64,
    /// Messages dropped by the delay profile.
    pub messages_dropped: u64,
    /// Timers set.
    pub timers_set: u64,
    /// Timers cancelled.
    pub timers_cancelled: u64,
    /// Acceptances learned, summed over learners.
    pub acceptances_learned: u64,
}

impl SimulationStats {
    /// Message delivery rate (sent / (sent + dropped)).
    pub fn delivery_rate(&self) -> f64 {
        let total = self.messages_sent + self.messages_dropped;
        if total == 0 {
            1.0
        } else {
            self.messages_sent as f64 / total as f64
        }
    }
}

/// Deterministic simulation runner and monitor handle.
pub struct SimulationRunner {
    spec: TopologySpec,

    /// All nodes, indexed by [`NodeIndex`]: proposers, then the leader,
    /// then acceptors, then learners.
    nodes: Vec<RoleStateMachine>,

    /// Global event queue, ordered deterministically.
    event_queue: BTreeMap<EventKey, Event>,

    /// Sequence counter for deterministic ordering.
    sequence: u64,

    /// Current simulation time.
    now: Duration,

    network: SimulatedNetwork,

    /// RNG for network conditions (seeded for determinism).
    rng: ChaCha8Rng,

    /// Timer registry for cancellation support.
    timers: HashMap<(NodeIndex, TimerId), EventKey>,

    stats: SimulationStats,

    /// Every policy handed to a proposer, in processing order.
    proposed: Vec<Policy>,

    /// Per-learner history of `EmitLearned` callbacks.
    learning_history: Vec<Vec<(Duration, Vec<Acceptance<Policy>>)>>,

    /// Acceptances already emitted per learner, for duplicate detection.
    emitted: Vec<BTreeSet<Acceptance<Policy>>>,

    /// Recoverable protocol violations reported by roles.
    violations: Vec<(Duration, Address, ProtocolViolation)>,

    /// Invariant breaches observed by the runner itself.
    breaches: Vec<(Duration, MonitorBreach)>,

    // Last observed values for incremental invariant checks.
    prev_ballots: Vec<BallotId>,
    prev_cstructs: Vec<Configuration>,
}

impl SimulationRunner {
    /// Validate the spec, build the topology, and expand its schedules.
    pub fn new(spec: TopologySpec) -> Result<Self, TopologyError> {
        spec.members.validate()?;
        if spec.lifetime.is_zero() {
            return Err(TopologyError::ZeroLifetime);
        }

        let config = ProtocolConfig::new(spec.variant, spec.members)
            .with_recovery_delay(spec.recovery_delay);

        let mut nodes = Vec::with_capacity(spec.members.total());
        for index in 0..spec.members.proposers {
            nodes.push(RoleStateMachine::Proposer(ProposerState::new(
                index as u32,
                config,
            )));
        }
        nodes.push(RoleStateMachine::Leader(LeaderState::new(config)));
        for index in 0..spec.members.acceptors {
            nodes.push(RoleStateMachine::Acceptor(AcceptorState::new(
                AcceptorId(index as u32 + 1),
                config,
            )));
        }
        for index in 0..spec.members.learners {
            nodes.push(RoleStateMachine::Learner(LearnerState::new(
                index as u32,
                config,
            )));
        }

        let node_count = nodes.len();
        let mut runner = Self {
            network: SimulatedNetwork::new(spec.delays.clone()),
            rng: ChaCha8Rng::seed_from_u64(spec.seed),
            nodes,
            event_queue: BTreeMap::new(),
            sequence: 0,
            now: Duration::ZERO,
            timers: HashMap::new(),
            stats: SimulationStats::default(),
            proposed: Vec::new(),
            learning_history: vec![Vec::new(); spec.members.learners],
            emitted: vec![BTreeSet::new(); spec.members.learners],
            violations: Vec::new(),
            breaches: Vec::new(),
            prev_ballots: vec![BallotId::NONE; node_count],
            prev_cstructs: vec![Configuration::new(); node_count],
            spec,
        };
        runner.expand_schedules();

        info!(
            variant = %runner.spec.variant,
            proposers = runner.spec.members.proposers,
            acceptors = runner.spec.members.acceptors,
            learners = runner.spec.members.learners,
            lifetime = ?runner.spec.lifetime,
            seed = runner.spec.seed,
            queued = runner.event_queue.len(),
            "created simulation runner"
        );
        Ok(runner)
    }

    /// Materialize the ballot, proposal and insistence schedules into
    /// queued events. Each schedule gets its own RNG split off the root
    /// seed, so editing one never perturbs the others.
    fn expand_schedules(&mut self) {
        let horizon = self.spec.lifetime;
        let mut root = SplitRng::from_seed(self.spec.seed);

        let mut ballot_rng = root.split();
        let leader = self.leader_index();
        for (time, ()) in self.spec.ballots.clone().occurrences(&mut ballot_rng, horizon) {
            self.schedule_event(leader, time, Event::BallotTimer);
        }

        let mut proposal_rng = root.split();
        let proposers = self.spec.members.proposers as u32;
        for (i, (time, policy)) in self
            .spec
            .proposals
            .clone()
            .occurrences(&mut proposal_rng, horizon)
            .into_iter()
            .enumerate()
        {
            // Round-robin over proposers; with the usual singleton this
            // is just proposer 0.
            let proposer = (i as u32) % proposers;
            self.schedule_event(proposer, time, Event::ProposeCommand { policy });
        }

        let mut insist_rng = root.split();
        for (time, ()) in self
            .spec
            .reproposals
            .clone()
            .occurrences(&mut insist_rng, horizon)
        {
            for proposer in 0..proposers {
                self.schedule_event(proposer, time, Event::InsistTimer);
            }
        }
    }

    // ─── Addressing ───

    fn leader_index(&self) -> NodeIndex {
        self.spec.members.proposers as NodeIndex
    }

    fn index_of(&self, address: &Address) -> Option<NodeIndex> {
        let members = &self.spec.members;
        let base = match address.role {
            Role::Proposer if (address.index as usize) < members.proposers => 0,
            Role::Leader if address.index == 0 => members.proposers,
            Role::Acceptor if (address.index as usize) < members.acceptors => {
                members.proposers + 1
            }
            Role::Learner if (address.index as usize) < members.learners => {
                members.proposers + 1 + members.acceptors
            }
            _ => return None,
        };
        Some(base as NodeIndex + address.index)
    }

    fn address_of(&self, index: NodeIndex) -> Address {
        let members = &self.spec.members;
        let index = index as usize;
        if index < members.proposers {
            Address::new(Role::Proposer, index as u32)
        } else if index == members.proposers {
            Address::new(Role::Leader, 0)
        } else if index < members.proposers + 1 + members.acceptors {
            Address::new(
                Role::Acceptor,
                (index - members.proposers - 1) as u32,
            )
        } else {
            Address::new(
                Role::Learner,
                (index - members.proposers - 1 - members.acceptors) as u32,
            )
        }
    }

    fn instances_of(&self, role: Role) -> Vec<Address> {
        let members = &self.spec.members;
        let count = match role {
            Role::Proposer => members.proposers,
            Role::Leader => 1,
            Role::Acceptor => members.acceptors,
            Role::Learner => members.learners,
        };
        (0..count as u32).map(|i| Address::new(role, i)).collect()
    }

    /// Resolve a role address to its node index, if the topology has it.
    pub fn node_index(&self, address: &Address) -> Option<NodeIndex> {
        self.index_of(address)
    }

    // ─── Monitor API ───

    /// Atomic snapshot of every role state.
    pub fn snapshot(&self) -> AllStates {
        let mut proposers = Vec::new();
        let mut leader = None;
        let mut acceptors = Vec::new();
        let mut learners = Vec::new();
        for node in &self.nodes {
            match node {
                RoleStateMachine::Proposer(state) => proposers.push(state.clone()),
                RoleStateMachine::Leader(state) => leader = Some(state.clone()),
                RoleStateMachine::Acceptor(state) => acceptors.push(state.clone()),
                RoleStateMachine::Learner(state) => learners.push(state.clone()),
            }
        }
        AllStates {
            proposers,
            // One leader is constructed for every topology.
            leader: leader.unwrap_or_else(|| {
                LeaderState::new(
                    ProtocolConfig::new(self.spec.variant, self.spec.members)
                        .with_recovery_delay(self.spec.recovery_delay),
                )
            }),
            acceptors,
            learners,
        }
    }

    /// Drain the queue up to the configured lifetime.
    pub fn await_termination(&mut self) {
        let lifetime = self.spec.lifetime;
        self.run_until(lifetime);
        info!(
            events = self.stats.events_processed,
            learned = self.stats.acceptances_learned,
            violations = self.violations.len(),
            breaches = self.breaches.len(),
            "simulation terminated"
        );
    }

    /// Replace the delay profile mid-run (fault injection).
    pub fn inject_delays(&mut self, profile: DelayProfile) {
        debug!(at = ?self.now, "injecting delay profile");
        self.network.set_profile(profile);
    }

    pub fn stats(&self) -> &SimulationStats {
        &self.stats
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn spec(&self) -> &TopologySpec {
        &self.spec
    }

    /// Every policy delivered to a proposer so far, in processing order.
    pub fn proposed(&self) -> &[Policy] {
        &self.proposed
    }

    /// Recoverable protocol violations reported by the roles.
    pub fn violations(&self) -> &[(Duration, Address, ProtocolViolation)] {
        &self.violations
    }

    /// Invariant breaches observed by the runner.
    pub fn breaches(&self) -> &[(Duration, MonitorBreach)] {
        &self.breaches
    }

    /// Per-learner history of learning callbacks.
    pub fn learning_history(&self, learner: u32) -> &[(Duration, Vec<Acceptance<Policy>>)] {
        &self.learning_history[learner as usize]
    }

    // ─── Event loop ───

    /// Schedule an event for a node at an absolute time.
    pub fn schedule_event(
        &mut self,
        node: NodeIndex,
        time: Duration,
        event: Event,
    ) -> EventKey {
        self.sequence += 1;
        let key = EventKey::new(time, &event, node, self.sequence);
        self.event_queue.insert(key, event);
        key
    }

    /// Run the simulation until no more events or the time limit.
    pub fn run_until(&mut self, end_time: Duration) {
        while let Some((&key, _)) = self.event_queue.first_key_value() {
            if key.time > end_time {
                trace!(remaining = self.event_queue.len(), "time limit reached");
                break;
            }
            let (key, event) = self
                .event_queue
                .pop_first()
                .expect("peeked entry is still first");
            self.now = key.time;
            let node_index = key.node;

            trace!(
                time = ?self.now,
                node = %self.address_of(node_index),
                event = event.type_name(),
                "processing event"
            );
            self.stats.events_processed += 1;
            self.stats.events_by_priority[event.priority() as usize] += 1;

            if let Event::ProposeCommand { policy } = &event {
                self.proposed.push(policy.clone());
            }

            let node = &mut self.nodes[node_index as usize];
            node.set_time(self.now);
            let actions = node.handle(event);
            self.stats.actions_generated += actions.len() as u64;

            self.check_invariants(node_index);

            for action in actions {
                self.process_action(node_index, action);
            }
        }
    }

    fn process_action(&mut self, from: NodeIndex, action: Action) {
        match action {
            Action::Send { to, message } => {
                self.try_deliver(to, message);
            }

            Action::Broadcast { role, message } => {
                for to in self.instances_of(role) {
                    self.try_deliver(to, message.clone());
                }
            }

            Action::SetTimer { id, duration } => {
                let fire_time = self.now + duration;
                let event = timer_to_event(id);
                // Re-arming replaces the previous pending firing.
                if let Some(stale) = self.timers.remove(&(from, id)) {
                    self.event_queue.remove(&stale);
                }
                let key = self.schedule_event(from, fire_time, event);
                self.timers.insert((from, id), key);
                self.stats.timers_set += 1;
            }

            Action::CancelTimer { id } => {
                if let Some(key) = self.timers.remove(&(from, id)) {
                    self.event_queue.remove(&key);
                    self.stats.timers_cancelled += 1;
                }
            }

            Action::EmitLearned { commands } => {
                let address = self.address_of(from);
                let learner = address.index as usize;
                self.stats.acceptances_learned += commands.len() as u64;
                for acceptance in &commands {
                    if !self.emitted[learner].insert(acceptance.clone()) {
                        self.breaches.push((
                            self.now,
                            MonitorBreach::DuplicateLearn { node: address },
                        ));
                    }
                }
                self.learning_history[learner].push((self.now, commands));
            }

            Action::ReportViolation { violation } => {
                let address = self.address_of(from);
                warn!(node = %address, %violation, "protocol violation reported");
                self.violations.push((self.now, address, violation));
            }
        }
    }

    fn try_deliver(&mut self, to: Address, message: ProtocolMessage) {
        let Some(to_index) = self.index_of(&to) else {
            warn!(%to, "message to unknown address dropped");
            return;
        };
        match self.network.should_deliver(&to, self.now, &mut self.rng) {
            None => {
                trace!(%to, message = message.type_name(), "message dropped by delay profile");
                self.stats.messages_dropped += 1;
            }
            Some(latency) => {
                self.stats.messages_sent += 1;
                let deliver_at = self.now + latency;
                self.schedule_event(to_index, deliver_at, message.into_event());
            }
        }
    }

    /// Incremental invariant checks after one atomic state transition.
    fn check_invariants(&mut self, node_index: NodeIndex) {
        let address = self.address_of(node_index);
        let i = node_index as usize;
        match &self.nodes[i] {
            RoleStateMachine::Acceptor(acceptor) => {
                let ballot = acceptor.ballot();
                let prev_ballot = self.prev_ballots[i];
                if ballot < prev_ballot {
                    self.breaches.push((
                        self.now,
                        MonitorBreach::BallotRegressed {
                            node: address,
                            from: prev_ballot,
                            to: ballot,
                        },
                    ));
                }
                // In Fast, a recovery phase2a may replace a divergent
                // fast-path cstruct at the promised ballot, so strict
                // growth is a classic-only invariant.
                let check_growth = !self.spec.variant.is_fast();
                if check_growth && !acceptor.cstruct().extends(&self.prev_cstructs[i]) {
                    self.breaches
                        .push((self.now, MonitorBreach::CStructShrank { node: address }));
                }
                self.prev_ballots[i] = ballot;
                self.prev_cstructs[i] = acceptor.cstruct().clone();
            }

            RoleStateMachine::Leader(leader) => {
                let ballot = leader.ballot();
                if ballot < self.prev_ballots[i] {
                    self.breaches.push((
                        self.now,
                        MonitorBreach::BallotRegressed {
                            node: address,
                            from: self.prev_ballots[i],
                            to: ballot,
                        },
                    ));
                }
                self.prev_ballots[i] = ballot;
            }

            RoleStateMachine::Learner(learner) => {
                if !learner.learned().extends(&self.prev_cstructs[i]) {
                    self.breaches
                        .push((self.now, MonitorBreach::LearnedShrank { node: address }));
                }
                self.prev_cstructs[i] = learner.learned().clone();
            }

            RoleStateMachine::Proposer(_) => {}
        }
    }
}

fn timer_to_event(id: TimerId) -> Event {
    match id {
        TimerId::Ballot => Event::BallotTimer,
        TimerId::Recovery => Event::RecoveryTimer,
        TimerId::Insist => Event::InsistTimer,
    }
}
