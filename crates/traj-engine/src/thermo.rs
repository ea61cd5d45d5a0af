use std::fmt;

use log::debug;
use traj_store::{StepAccess, TimeWindow, TrajError, TrajResult};

use crate::analysis::Analysis;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Stat {
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
}

impl Stat {
    fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std: var.max(0.0).sqrt(),
        }
    }
}

/// Window averages of the thermodynamic observables, in atomic units
/// (temperature in kelvin).
#[derive(Clone, Debug, PartialEq)]
pub struct ThermoSummary {
    pub window: TimeWindow,
    pub etotal: Stat,
    pub volume: Stat,
    /// `None` when the store has neither stored velocities nor a second
    /// step to difference.
    pub temperature: Option<Stat>,
    pub pressure: Stat,
    pub stress: [Stat; 6],
}

const STRESS_LABELS: [&str; 6] = ["sigma_xx", "sigma_yy", "sigma_zz", "sigma_yz", "sigma_xz", "sigma_xy"];

impl fmt::Display for ThermoSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "thermodynamics over steps [{}, {}) ({} steps)",
            self.window.begin,
            self.window.end,
            self.window.len()
        )?;
        writeln!(f, "{:<16} {:>20} {:>20}", "quantity", "mean", "std")?;
        let rows = [
            ("etotal (Ha)", Some(self.etotal)),
            ("volume (bohr^3)", Some(self.volume)),
            ("temperature (K)", self.temperature),
            ("pressure (Ha/b3)", Some(self.pressure)),
        ];
        for (label, stat) in rows {
            match stat {
                Some(stat) => writeln!(f, "{label:<16} {:>20.10e} {:>20.10e}", stat.mean, stat.std)?,
                None => writeln!(f, "{label:<16} {:>20} {:>20}", "n/a", "n/a")?,
            }
        }
        for (label, stat) in STRESS_LABELS.iter().zip(self.stress.iter()) {
            writeln!(f, "{label:<16} {:>20.10e} {:>20.10e}", stat.mean, stat.std)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct ThermoPlan;

impl ThermoPlan {
    pub fn new() -> Self {
        Self
    }
}

impl Analysis for ThermoPlan {
    type Output = ThermoSummary;

    fn name(&self) -> &'static str {
        "thermo"
    }

    fn run<S>(&self, traj: &S, tbegin: usize, tend: usize) -> TrajResult<ThermoSummary>
    where
        S: StepAccess + ?Sized,
    {
        let window = traj.check_times(tbegin, tend)?;
        if !traj.has_thermo() {
            return Err(TrajError::Unsupported(
                "thermodynamics need energy and stress on every step".into(),
            ));
        }
        let n = window.len();
        let mut etotal = Vec::with_capacity(n);
        let mut volume = Vec::with_capacity(n);
        let mut temperature = Vec::with_capacity(n);
        let mut has_temperature = true;
        let mut pressure = Vec::with_capacity(n);
        let mut stress: [Vec<f64>; 6] = Default::default();
        for t in window.steps() {
            etotal.push(traj.etotal(t)?);
            volume.push(traj.volume(t)?);
            if has_temperature {
                match traj.temperature(t) {
                    Ok(v) => temperature.push(v),
                    Err(TrajError::Unsupported(why)) => {
                        debug!("thermo without temperature: {why}");
                        has_temperature = false;
                    }
                    Err(err) => return Err(err),
                }
            }
            pressure.push(traj.pressure(t)?);
            let s = traj.stress(t)?;
            for (acc, v) in stress.iter_mut().zip(s) {
                acc.push(v);
            }
        }
        Ok(ThermoSummary {
            window,
            etotal: Stat::from_values(&etotal),
            volume: Stat::from_values(&volume),
            temperature: has_temperature.then(|| Stat::from_values(&temperature)),
            pressure: Stat::from_values(&pressure),
            stress: stress.map(|v| Stat::from_values(&v)),
        })
    }
}
