//! Pick a subset of steps whose position autocorrelation decays fastest.
//!
//! Simulated annealing over subsets of fixed size. The cost of a subset is
//! the summed magnitude of its total PACF at every nonzero lag.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use traj_store::{DecorrelateConfig, StepAccess, TrajError, TrajResult, Trajectory};

use crate::analysis::Analysis;
use crate::pacf::position_acf;

#[derive(Clone, Debug)]
pub struct DecorrelatePlan {
    ntarget: usize,
    t0: f64,
    mu: f64,
    steps: usize,
    budget: Option<usize>,
    seed: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DecorrelateOutput {
    /// Selected step indices, ascending.
    pub steps: Vec<usize>,
    pub cost: f64,
    /// Cost of the evenly strided starting subset.
    pub initial_cost: f64,
    pub accepted: usize,
    pub proposals: usize,
}

impl DecorrelateOutput {
    /// Store made of the selected steps.
    pub fn select(&self, traj: &Trajectory) -> TrajResult<Trajectory> {
        traj.select_steps(&self.steps)
    }
}

impl DecorrelatePlan {
    /// `t0` is the starting temperature, `mu` the cooling factor applied
    /// every `steps` proposals.
    pub fn new(ntarget: usize, t0: f64, mu: f64, steps: usize) -> TrajResult<Self> {
        if ntarget < 2 {
            return Err(TrajError::Invalid(format!(
                "decorrelation needs at least 2 target steps, got {ntarget}"
            )));
        }
        if !(mu > 0.0 && mu < 1.0) {
            return Err(TrajError::Invalid(format!("cooling factor {mu} outside (0, 1)")));
        }
        if t0 <= 0.0 || !t0.is_finite() {
            return Err(TrajError::Invalid(format!("temperature {t0} must be positive")));
        }
        if steps == 0 {
            return Err(TrajError::Invalid("steps per temperature must be > 0".into()));
        }
        Ok(Self {
            ntarget,
            t0,
            mu,
            steps,
            budget: None,
            seed: 0,
        })
    }

    pub fn from_config(cfg: &DecorrelateConfig, ntarget: usize) -> TrajResult<Self> {
        let mut plan = Self::new(ntarget, cfg.temperature(), cfg.mu(), cfg.steps())?
            .with_seed(cfg.seed());
        if let Some(budget) = cfg.budget {
            plan = plan.with_budget(budget)?;
        }
        Ok(plan)
    }

    pub fn with_budget(mut self, budget: usize) -> TrajResult<Self> {
        if budget == 0 {
            return Err(TrajError::Invalid("proposal budget must be > 0".into()));
        }
        self.budget = Some(budget);
        Ok(self)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Total proposals: explicit budget, or enough cooling rounds to bring
    /// the temperature down by four decades.
    pub fn budget(&self) -> usize {
        self.budget.unwrap_or_else(|| {
            let rounds = (1e-4f64.ln() / self.mu.ln()).ceil().max(1.0) as usize;
            self.steps * rounds
        })
    }
}

/// `ntarget` indices spread evenly over `0..n`, both ends included.
fn strided(n: usize, ntarget: usize) -> Vec<usize> {
    (0..ntarget).map(|i| i * (n - 1) / (ntarget - 1)).collect()
}

struct Cost<'a> {
    frames: Vec<&'a [[f64; 3]]>,
    typat: &'a [usize],
    ntypes: usize,
}

impl Cost<'_> {
    fn eval(&self, subset: &[usize]) -> TrajResult<f64> {
        let mut sorted = subset.to_vec();
        sorted.sort_unstable();
        let picked: Vec<&[[f64; 3]]> = sorted.iter().map(|&i| self.frames[i]).collect();
        let pacf = position_acf(&picked, self.typat, self.ntypes)?;
        Ok(pacf.total.iter().skip(1).map(|v| v.abs()).sum())
    }
}

impl Analysis for DecorrelatePlan {
    type Output = DecorrelateOutput;

    fn name(&self) -> &'static str {
        "decorrelate"
    }

    fn run<S>(&self, traj: &S, tbegin: usize, tend: usize) -> TrajResult<DecorrelateOutput>
    where
        S: StepAccess + ?Sized,
    {
        let window = traj.check_times(tbegin, tend)?;
        let n = window.len();
        if self.ntarget > n {
            return Err(TrajError::InvalidRange(format!(
                "cannot pick {} steps from a window of {n}",
                self.ntarget
            )));
        }
        let path = traj.unwrapped_xcart(window)?;
        let cost = Cost {
            frames: path.iter().map(|f| f.as_slice()).collect(),
            typat: traj.typat(),
            ntypes: traj.species().ntypes(),
        };

        let mut current = strided(n, self.ntarget);
        let initial_cost = cost.eval(&current)?;
        let absolute = |subset: &[usize]| {
            let mut steps: Vec<usize> = subset.iter().map(|&i| window.begin + i).collect();
            steps.sort_unstable();
            steps
        };
        if self.ntarget == n {
            return Ok(DecorrelateOutput {
                steps: absolute(&current),
                cost: initial_cost,
                initial_cost,
                accepted: 0,
                proposals: 0,
            });
        }

        let mut selected = vec![false; n];
        for &i in &current {
            selected[i] = true;
        }
        let mut idle: Vec<usize> = (0..n).filter(|&i| !selected[i]).collect();

        let mut rng = StdRng::seed_from_u64(self.seed);
        let budget = self.budget();
        let mut temperature = self.t0;
        let mut current_cost = initial_cost;
        let mut best = current.clone();
        let mut best_cost = initial_cost;
        let mut accepted = 0;
        for proposal in 0..budget {
            if proposal > 0 && proposal % self.steps == 0 {
                temperature *= self.mu;
                debug!("annealing: T = {temperature:.3e}, best cost {best_cost:.6}");
            }
            let a = rng.gen_range(0..current.len());
            let b = rng.gen_range(0..idle.len());
            std::mem::swap(&mut current[a], &mut idle[b]);
            let trial = cost.eval(&current)?;
            let delta = trial - current_cost;
            if delta <= 0.0 || rng.gen::<f64>() < (-delta / temperature).exp() {
                current_cost = trial;
                accepted += 1;
                if trial < best_cost {
                    best_cost = trial;
                    best.clone_from(&current);
                }
            } else {
                std::mem::swap(&mut current[a], &mut idle[b]);
            }
        }
        info!(
            "decorrelate picked {} of {n} steps: cost {initial_cost:.6} -> {best_cost:.6} \
             ({accepted}/{budget} accepted)",
            self.ntarget
        );
        Ok(DecorrelateOutput {
            steps: absolute(&best),
            cost: best_cost,
            initial_cost,
            accepted,
            proposals: budget,
        })
    }
}
