//! Timed-event schedules.
//!
//! A [`Schedule`] is a pure description of *when* to produce values of some
//! type; the runner materializes it against a time horizon and feeds the
//! resulting occurrences into the event queue. Schedules drive everything
//! the protocol does not initiate itself: proposal arrival, ballot ticks,
//! and proposer insistence.
//!
//! Every branching combinator splits the RNG, so the values drawn in one
//! branch never depend on how many draws a sibling made. Expanding the same
//! schedule from the same root seed always yields the same occurrences.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Duration;

/// A splittable seeded RNG.
///
/// `split` derives an independent child stream from the parent; the parent
/// advances by exactly one draw regardless of how much the child is used.
#[derive(Debug, Clone)]
pub struct SplitRng {
    rng: ChaCha8Rng,
}

impl SplitRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Derive an independent child RNG.
    pub fn split(&mut self) -> SplitRng {
        SplitRng::from_seed(self.rng.gen())
    }

    /// Draw a value in `0..upper`. `upper` must be positive.
    pub fn gen_index(&mut self, upper: u64) -> u64 {
        self.rng.gen_range(0..upper)
    }
}

/// A value generator: the leaf of a schedule.
#[derive(Clone)]
pub struct Gen<T>(GenKind<T>);

#[derive(Clone)]
enum GenKind<T> {
    Pure(T),
    /// Non-empty with positive total weight; enforced by the constructor.
    Choice(Vec<(u32, Gen<T>)>),
    Make(Arc<dyn Fn(&mut SplitRng) -> T + Send + Sync>),
}

impl<T: std::fmt::Debug> std::fmt::Debug for Gen<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            GenKind::Pure(value) => f.debug_tuple("Pure").field(value).finish(),
            GenKind::Choice(choices) => f.debug_tuple("Choice").field(choices).finish(),
            GenKind::Make(_) => f.debug_tuple("Make").field(&"<fn>").finish(),
        }
    }
}

impl<T: Clone> Gen<T> {
    /// Always produce the same value.
    pub fn pure(value: T) -> Self {
        Gen(GenKind::Pure(value))
    }

    /// Produce a value from the RNG.
    pub fn make<F>(f: F) -> Self
    where
        F: Fn(&mut SplitRng) -> T + Send + Sync + 'static,
    {
        Gen(GenKind::Make(Arc::new(f)))
    }

    /// Draw among weighted values. Returns `None` when the choice list is
    /// empty or all weights are zero.
    pub fn weighted(choices: Vec<(u32, T)>) -> Option<Self> {
        Self::weighted_gens(
            choices
                .into_iter()
                .map(|(weight, value)| (weight, Gen::pure(value)))
                .collect(),
        )
    }

    /// Draw among weighted sub-generators.
    pub fn weighted_gens(choices: Vec<(u32, Gen<T>)>) -> Option<Self> {
        let total: u64 = choices.iter().map(|(w, _)| u64::from(*w)).sum();
        if total == 0 {
            return None;
        }
        Some(Gen(GenKind::Choice(choices)))
    }

    /// Draw one value.
    pub fn sample(&self, rng: &mut SplitRng) -> T {
        match &self.0 {
            GenKind::Pure(value) => value.clone(),
            GenKind::Make(f) => f(rng),
            GenKind::Choice(choices) => {
                let total: u64 = choices.iter().map(|(w, _)| u64::from(*w)).sum();
                let mut x = rng.gen_index(total);
                for (weight, gen) in choices {
                    let weight = u64::from(*weight);
                    if x < weight {
                        return gen.sample(rng);
                    }
                    x -= weight;
                }
                // Weights sum to `total`, so the loop always returns.
                choices[choices.len() - 1].1.sample(rng)
            }
        }
    }
}

/// The schedule DSL.
///
/// Constructed from config or test code, interpreted once by
/// [`Schedule::occurrences`]. The `Par` list is the monoid: `never` is its
/// identity and [`Schedule::par`] its operation.
#[derive(Clone)]
pub enum Schedule<T> {
    /// Emit one value at the current instant.
    Generate(Gen<T>),
    /// Offset the inner schedule's start.
    Delayed(Duration, Box<Schedule<T>>),
    /// Run the inner schedule now and again every period, forever.
    Periodic(Duration, Box<Schedule<T>>),
    /// Like `Periodic`, bounded to a number of runs.
    Repeating {
        times: u32,
        period: Duration,
        inner: Box<Schedule<T>>,
    },
    /// Run the inner schedule a number of times at the same instant.
    Times(u32, Box<Schedule<T>>),
    /// Drop inner invocations that would start after the window.
    Limited(Duration, Box<Schedule<T>>),
    /// Run all branches concurrently with independent RNG streams.
    Par(Vec<Schedule<T>>),
    /// Feed each produced value to a continuation and run its schedule
    /// from the production instant.
    Bind(
        Box<Schedule<T>>,
        Arc<dyn Fn(&T) -> Schedule<T> + Send + Sync>,
    ),
}

impl<T: std::fmt::Debug> std::fmt::Debug for Schedule<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Schedule::Generate(gen) => f.debug_tuple("Generate").field(gen).finish(),
            Schedule::Delayed(d, s) => f.debug_tuple("Delayed").field(d).field(s).finish(),
            Schedule::Periodic(d, s) => f.debug_tuple("Periodic").field(d).field(s).finish(),
            Schedule::Repeating {
                times,
                period,
                inner,
            } => f
                .debug_struct("Repeating")
                .field("times", times)
                .field("period", period)
                .field("inner", inner)
                .finish(),
            Schedule::Times(n, s) => f.debug_tuple("Times").field(n).field(s).finish(),
            Schedule::Limited(d, s) => f.debug_tuple("Limited").field(d).field(s).finish(),
            Schedule::Par(branches) => f.debug_tuple("Par").field(branches).finish(),
            Schedule::Bind(s, _) => f.debug_tuple("Bind").field(s).field(&"<fn>").finish(),
        }
    }
}

impl<T: Clone> Schedule<T> {
    /// Emit one value drawn from the generator.
    pub fn generate(gen: Gen<T>) -> Self {
        Schedule::Generate(gen)
    }

    /// The empty schedule: emits nothing, identity of `par`.
    pub fn never() -> Self {
        Schedule::Par(Vec::new())
    }

    pub fn delayed(delay: Duration, inner: Schedule<T>) -> Self {
        Schedule::Delayed(delay, Box::new(inner))
    }

    pub fn periodic(period: Duration, inner: Schedule<T>) -> Self {
        Schedule::Periodic(period, Box::new(inner))
    }

    pub fn repeating(times: u32, period: Duration, inner: Schedule<T>) -> Self {
        Schedule::Repeating {
            times,
            period,
            inner: Box::new(inner),
        }
    }

    pub fn times(count: u32, inner: Schedule<T>) -> Self {
        Schedule::Times(count, Box::new(inner))
    }

    pub fn limited(window: Duration, inner: Schedule<T>) -> Self {
        Schedule::Limited(window, Box::new(inner))
    }

    /// Monoidal parallel composition.
    pub fn par(self, other: Schedule<T>) -> Self {
        match (self, other) {
            (Schedule::Par(mut a), Schedule::Par(b)) => {
                a.extend(b);
                Schedule::Par(a)
            }
            (Schedule::Par(mut a), s) => {
                a.push(s);
                Schedule::Par(a)
            }
            (s, Schedule::Par(mut b)) => {
                b.insert(0, s);
                Schedule::Par(b)
            }
            (a, b) => Schedule::Par(vec![a, b]),
        }
    }

    /// Monadic bind: each value the inner schedule produces selects a
    /// continuation schedule, run from the production instant.
    pub fn bind<F>(self, f: F) -> Self
    where
        F: Fn(&T) -> Schedule<T> + Send + Sync + 'static,
    {
        Schedule::Bind(Box::new(self), Arc::new(f))
    }

    /// Materialize every occurrence up to and including `horizon`,
    /// sorted by time (ties keep emission order).
    pub fn occurrences(&self, rng: &mut SplitRng, horizon: Duration) -> Vec<(Duration, T)> {
        let mut out = Vec::new();
        self.expand(Duration::ZERO, horizon, rng, &mut out);
        out.sort_by_key(|(time, _)| *time);
        out
    }

    fn expand(
        &self,
        start: Duration,
        deadline: Duration,
        rng: &mut SplitRng,
        out: &mut Vec<(Duration, T)>,
    ) {
        if start > deadline {
            return;
        }
        match self {
            Schedule::Generate(gen) => out.push((start, gen.sample(rng))),

            Schedule::Delayed(delay, inner) => {
                inner.expand(start.saturating_add(*delay), deadline, rng, out);
            }

            Schedule::Periodic(period, inner) => {
                let mut at = start;
                loop {
                    let mut child = rng.split();
                    inner.expand(at, deadline, &mut child, out);
                    if period.is_zero() {
                        break;
                    }
                    at = at.saturating_add(*period);
                    if at > deadline {
                        break;
                    }
                }
            }

            Schedule::Repeating {
                times,
                period,
                inner,
            } => {
                let mut at = start;
                for _ in 0..*times {
                    if at > deadline {
                        break;
                    }
                    let mut child = rng.split();
                    inner.expand(at, deadline, &mut child, out);
                    at = at.saturating_add(*period);
                }
            }

            Schedule::Times(count, inner) => {
                for _ in 0..*count {
                    let mut child = rng.split();
                    inner.expand(start, deadline, &mut child, out);
                }
            }

            Schedule::Limited(window, inner) => {
                inner.expand(start, deadline.min(start.saturating_add(*window)), rng, out);
            }

            Schedule::Par(branches) => {
                for branch in branches {
                    let mut child = rng.split();
                    branch.expand(start, deadline, &mut child, out);
                }
            }

            Schedule::Bind(inner, continuation) => {
                // Only the continuation's occurrences are emitted, so
                // `generate(pure(x)).bind(f)` behaves exactly like `f(x)`.
                let mut produced = Vec::new();
                let mut child = rng.split();
                inner.expand(start, deadline, &mut child, &mut produced);
                for (at, value) in produced {
                    let mut cont_rng = rng.split();
                    continuation(&value).expand(at, deadline, &mut cont_rng, out);
                }
            }
        }
    }
}

impl Schedule<()> {
    /// Emit one unit occurrence: `generate(unit)`.
    pub fn execute() -> Self {
        Schedule::Generate(Gen::pure(()))
    }
}
