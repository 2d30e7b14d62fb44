use crate::error::{Error, Result};
use crate::solvers::{ExplicitStepper, SolverKind};
use crate::timing;
use crate::traits::{DynamicalSystem, Scalar};
use csv::WriterBuilder;
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;
use std::time::Duration;

/// Adapts a closure `f(t, x, out)` into a [`DynamicalSystem`].
pub struct FnSystem<T, F> {
    dim: usize,
    f: F,
    _scalar: PhantomData<T>,
}

impl<T: Scalar, F: Fn(T, &[T], &mut [T])> FnSystem<T, F> {
    pub fn new(dim: usize, f: F) -> Self {
        Self {
            dim,
            f,
            _scalar: PhantomData,
        }
    }
}

impl<T: Scalar, F: Fn(T, &[T], &mut [T])> DynamicalSystem<T> for FnSystem<T, F> {
    fn dimension(&self) -> usize {
        self.dim
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) {
        (self.f)(t, x, out)
    }
}

/// A fixed-step integration of one system with one explicit scheme.
///
/// The run starts unsolved. Each successful [`OdeRun::solve`] replaces the
/// whole trajectory and forgets any previously computed error sequence.
pub struct OdeRun<S> {
    stepper: ExplicitStepper<f64, S>,
    time_steps: Vec<f64>,
    sol_steps: Vec<Vec<f64>>,
    err_steps: Option<Vec<f64>>,
}

impl<S: DynamicalSystem<f64>> OdeRun<S> {
    pub fn new(kind: SolverKind, system: S) -> Self {
        Self {
            stepper: ExplicitStepper::new(kind, system),
            time_steps: Vec::new(),
            sol_steps: Vec::new(),
            err_steps: None,
        }
    }

    /// Builds a run from a scheme name such as `"ForwardEuler"`.
    pub fn from_name(name: &str, system: S) -> Result<Self> {
        Ok(Self::new(name.parse()?, system))
    }

    pub fn kind(&self) -> SolverKind {
        self.stepper.kind()
    }

    pub fn dimension(&self) -> usize {
        self.stepper.dimension()
    }

    pub fn system(&self) -> &S {
        self.stepper.system()
    }

    pub fn time_steps(&self) -> &[f64] {
        &self.time_steps
    }

    pub fn sol_steps(&self) -> &[Vec<f64>] {
        &self.sol_steps
    }

    pub fn err_steps(&self) -> Option<&[f64]> {
        self.err_steps.as_deref()
    }

    pub fn is_solved(&self) -> bool {
        !self.time_steps.is_empty()
    }

    /// Integrates from `t0` to `tf` in `num_steps` uniform steps.
    ///
    /// On failure the previous trajectory is left as it was.
    pub fn solve(&mut self, t0: f64, tf: f64, y0: &[f64], num_steps: usize) -> Result<()> {
        if !t0.is_finite() || !tf.is_finite() || tf <= t0 {
            return Err(Error::InvalidTimeRange { t0, tf });
        }
        if num_steps == 0 {
            return Err(Error::InvalidStepCount(num_steps));
        }
        let dim = self.dimension();
        if y0.is_empty() || y0.len() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                actual: y0.len(),
            });
        }
        let h = (tf - t0) / num_steps as f64;
        if !h.is_finite() || t0 + h <= t0 {
            return Err(Error::InvalidTimeRange { t0, tf });
        }
        debug!(
            "solving {}-dimensional system with {} over [{t0}, {tf}], {num_steps} steps of {h}",
            dim,
            self.kind()
        );

        let mut time_steps = Vec::with_capacity(num_steps + 1);
        let mut sol_steps = Vec::with_capacity(num_steps + 1);
        let mut state = y0.to_vec();
        time_steps.push(t0);
        sol_steps.push(state.clone());
        for i in 1..=num_steps {
            let previous = time_steps[i - 1];
            let next = if i == num_steps { tf } else { t0 + i as f64 * h };
            // Steps below the float resolution of t collapse onto earlier times.
            if next <= previous {
                return Err(Error::InvalidTimeRange { t0, tf });
            }
            let mut t = previous;
            self.stepper.advance(&mut t, &mut state, h);
            time_steps.push(next);
            sol_steps.push(state.clone());
        }

        self.time_steps = time_steps;
        self.sol_steps = sol_steps;
        self.err_steps = None;
        Ok(())
    }

    /// Infinity-norm error of every step against `exact(t)`; returns the largest.
    pub fn compute_infinity_norm_error<F>(&mut self, exact: F) -> Result<f64>
    where
        F: Fn(f64) -> Vec<f64>,
    {
        if !self.is_solved() {
            return Err(Error::NotSolved);
        }
        let mut errors = Vec::with_capacity(self.time_steps.len());
        for (&t, state) in self.time_steps.iter().zip(&self.sol_steps) {
            let reference = exact(t);
            if reference.len() != state.len() {
                return Err(Error::DimensionMismatch {
                    expected: state.len(),
                    actual: reference.len(),
                });
            }
            let err = state
                .iter()
                .zip(&reference)
                .map(|(y, e)| (y - e).abs())
                .fold(0.0, nan_max);
            errors.push(err);
        }
        let max = errors.iter().copied().fold(0.0, nan_max);
        debug!("infinity-norm error over {} steps: {max}", errors.len());
        self.err_steps = Some(errors);
        Ok(max)
    }

    /// Observed convergence order from runs with `num_steps` and ten times as many.
    ///
    /// Leaves the finer trajectory and its error sequence in place.
    pub fn empirical_order<F>(
        &mut self,
        t0: f64,
        tf: f64,
        y0: &[f64],
        num_steps: usize,
        exact: F,
    ) -> Result<f64>
    where
        F: Fn(f64) -> Vec<f64>,
    {
        let fine_steps = num_steps
            .checked_mul(10)
            .ok_or(Error::InvalidStepCount(num_steps))?;
        self.solve(t0, tf, y0, num_steps)?;
        let coarse = self.compute_infinity_norm_error(&exact)?;
        self.solve(t0, tf, y0, fine_steps)?;
        let fine = self.compute_infinity_norm_error(&exact)?;
        Ok((coarse / fine).log10())
    }

    /// Wall-clock time of one solve.
    pub fn single_solve_time(
        &mut self,
        t0: f64,
        tf: f64,
        y0: &[f64],
        num_steps: usize,
    ) -> Result<Duration> {
        let (result, elapsed) = timing::time_once(|| self.solve(t0, tf, y0, num_steps));
        result.map(|()| elapsed)
    }

    /// Mean wall-clock time of `runs` solves.
    pub fn mean_solve_time(
        &mut self,
        t0: f64,
        tf: f64,
        y0: &[f64],
        num_steps: usize,
        runs: usize,
    ) -> Result<Duration> {
        timing::try_mean_execution_time(runs, || self.solve(t0, tf, y0, num_steps))
    }

    /// Writes the trajectory to `path`; an unsolved run leaves `path` untouched.
    pub fn write_csv(&self, path: impl AsRef<Path>, separator: u8) -> Result<()> {
        if !self.is_solved() {
            return Err(Error::NotSolved);
        }
        let file = File::create(path)?;
        self.write_csv_to(BufWriter::new(file), separator)
    }

    /// Writes `time,y0,...` followed by one record per step.
    pub fn write_csv_to<W: Write>(&self, writer: W, separator: u8) -> Result<()> {
        if !self.is_solved() {
            return Err(Error::NotSolved);
        }
        let mut writer = WriterBuilder::new()
            .delimiter(separator)
            .from_writer(writer);
        let mut header = vec!["time".to_string()];
        header.extend((0..self.dimension()).map(|j| format!("y{j}")));
        writer.write_record(&header)?;
        for (t, state) in self.time_steps.iter().zip(&self.sol_steps) {
            let record = std::iter::once(t)
                .chain(state.iter())
                .map(f64::to_string);
            writer.write_record(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_csv_to(&mut buffer, b',')?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn nan_max(acc: f64, value: f64) -> f64 {
    if acc.is_nan() || value.is_nan() {
        f64::NAN
    } else {
        acc.max(value)
    }
}
