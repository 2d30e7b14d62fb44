use crate::error::{Error, Result};
use crate::traits::{constant, DynamicalSystem, Scalar, Steppable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Forward (explicit) Euler, order 1.
pub struct ForwardEuler<T: Scalar> {
    k1: Vec<T>,
}

impl<T: Scalar> ForwardEuler<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![T::zero(); dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for ForwardEuler<T> {
    fn order(&self) -> usize {
        1
    }

    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let t0 = *t;

        // y_next = y + dt*f(t, y)
        system.apply(t0, state, &mut self.k1);
        for i in 0..state.len() {
            state[i] = state[i] + dt * self.k1[i];
        }

        *t = t0 + dt;
    }
}

/// Explicit midpoint rule, order 2.
pub struct MidPoint<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> MidPoint<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![T::zero(); dim],
            k2: vec![T::zero(); dim],
            tmp: vec![T::zero(); dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for MidPoint<T> {
    fn order(&self) -> usize {
        2
    }

    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let half = constant::<T>(0.5);
        let t0 = *t;

        // k1 = f(t, y)
        system.apply(t0, state, &mut self.k1);

        // k2 = f(t + dt/2, y + dt*k1/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k1[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2);

        // y_next = y + dt*k2
        for i in 0..state.len() {
            state[i] = state[i] + dt * self.k2[i];
        }

        *t = t0 + dt;
    }
}

/// Classic Runge-Kutta 4th Order Solver
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![T::zero(); dim],
            k2: vec![T::zero(); dim],
            k3: vec![T::zero(); dim],
            k4: vec![T::zero(); dim],
            tmp: vec![T::zero(); dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn order(&self) -> usize {
        4
    }

    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let half = constant::<T>(0.5);
        let sixth = constant::<T>(1.0 / 6.0);
        let two = constant::<T>(2.0);

        let t0 = *t;

        // k1 = f(t, y)
        system.apply(t0, state, &mut self.k1);

        // k2 = f(t + dt/2, y + dt*k1/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k1[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2);

        // k3 = f(t + dt/2, y + dt*k2/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k2[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k3);

        // k4 = f(t + dt, y + dt*k3)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        // y_next = y + dt/6 * (k1 + 2k2 + 2k3 + k4)
        for i in 0..state.len() {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }
}

/// The explicit schemes available by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverKind {
    ForwardEuler,
    MidPoint,
    RK4,
}

impl SolverKind {
    pub const ALL: [SolverKind; 3] = [SolverKind::ForwardEuler, SolverKind::MidPoint, SolverKind::RK4];

    pub fn name(self) -> &'static str {
        match self {
            SolverKind::ForwardEuler => "ForwardEuler",
            SolverKind::MidPoint => "MidPoint",
            SolverKind::RK4 => "RK4",
        }
    }

    pub fn order(self) -> usize {
        match self {
            SolverKind::ForwardEuler => 1,
            SolverKind::MidPoint => 2,
            SolverKind::RK4 => 4,
        }
    }

    fn build<T: Scalar>(self, dim: usize) -> InternalStepper<T> {
        match self {
            SolverKind::ForwardEuler => InternalStepper::ForwardEuler(ForwardEuler::new(dim)),
            SolverKind::MidPoint => InternalStepper::MidPoint(MidPoint::new(dim)),
            SolverKind::RK4 => InternalStepper::Rk4(RK4::new(dim)),
        }
    }
}

impl FromStr for SolverKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ForwardEuler" => Ok(SolverKind::ForwardEuler),
            "MidPoint" => Ok(SolverKind::MidPoint),
            "RK4" => Ok(SolverKind::RK4),
            other => Err(Error::InvalidSolverType(other.to_string())),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

enum InternalStepper<T: Scalar> {
    ForwardEuler(ForwardEuler<T>),
    MidPoint(MidPoint<T>),
    Rk4(RK4<T>),
}

impl<T: Scalar> InternalStepper<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        match self {
            InternalStepper::ForwardEuler(s) => s.step(system, t, state, dt),
            InternalStepper::MidPoint(s) => s.step(system, t, state, dt),
            InternalStepper::Rk4(s) => s.step(system, t, state, dt),
        }
    }
}

/// A right-hand side bound to one explicit scheme.
///
/// The stepper owns the system for its whole lifetime and keeps scratch
/// buffers sized to the system dimension, so stepping never allocates
/// beyond the returned state.
pub struct ExplicitStepper<T: Scalar, S> {
    system: S,
    kind: SolverKind,
    inner: InternalStepper<T>,
}

impl<T: Scalar, S: DynamicalSystem<T>> ExplicitStepper<T, S> {
    pub fn new(kind: SolverKind, system: S) -> Self {
        let inner = kind.build(system.dimension());
        Self {
            system,
            kind,
            inner,
        }
    }

    /// Builds a stepper from a scheme name such as `"RK4"`.
    pub fn from_name(name: &str, system: S) -> Result<Self> {
        Ok(Self::new(name.parse()?, system))
    }

    pub fn kind(&self) -> SolverKind {
        self.kind
    }

    pub fn system(&self) -> &S {
        &self.system
    }

    pub fn dimension(&self) -> usize {
        self.system.dimension()
    }

    /// Returns the state one step of size `h` after `(t, y)`.
    pub fn step(&mut self, t: T, y: &[T], h: T) -> Result<Vec<T>> {
        if y.len() != self.dimension() {
            return Err(Error::DimensionMismatch {
                expected: self.dimension(),
                actual: y.len(),
            });
        }
        let mut next = y.to_vec();
        let mut time = t;
        self.advance(&mut time, &mut next, h);
        Ok(next)
    }

    /// In-place step; `state` must already have the system dimension.
    pub(crate) fn advance(&mut self, t: &mut T, state: &mut [T], h: T) {
        self.inner.step(&self.system, t, state, h);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay;

    impl DynamicalSystem<f64> for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = -x[0];
        }
    }

    // dy/dt = t, exact y = t^2 / 2
    struct Ramp;

    impl DynamicalSystem<f64> for Ramp {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, t: f64, _x: &[f64], out: &mut [f64]) {
            out[0] = t;
        }
    }

    #[test]
    fn single_steps_match_closed_forms() {
        let h = 0.1;
        let mut euler = ExplicitStepper::new(SolverKind::ForwardEuler, Decay);
        let mut midpoint = ExplicitStepper::new(SolverKind::MidPoint, Decay);
        let mut rk4 = ExplicitStepper::new(SolverKind::RK4, Decay);

        let e = euler.step(0.0, &[1.0], h).unwrap();
        let m = midpoint.step(0.0, &[1.0], h).unwrap();
        let r = rk4.step(0.0, &[1.0], h).unwrap();

        assert!((e[0] - (1.0 - h)).abs() < 1e-15);
        assert!((m[0] - (1.0 - h + h * h / 2.0)).abs() < 1e-15);
        let taylor4 = 1.0 - h + h * h / 2.0 - h.powi(3) / 6.0 + h.powi(4) / 24.0;
        assert!((r[0] - taylor4).abs() < 1e-15);
    }

    #[test]
    fn time_dependent_rhs_uses_stage_times() {
        let h = 0.5;
        let euler = ExplicitStepper::new(SolverKind::ForwardEuler, Ramp)
            .step(1.0, &[0.0], h)
            .unwrap();
        let midpoint = ExplicitStepper::new(SolverKind::MidPoint, Ramp)
            .step(1.0, &[0.0], h)
            .unwrap();
        let rk4 = ExplicitStepper::new(SolverKind::RK4, Ramp)
            .step(1.0, &[0.0], h)
            .unwrap();
        // exact increment: (1.5^2 - 1^2) / 2 = 0.625
        assert!((euler[0] - 0.5).abs() < 1e-15);
        assert!((midpoint[0] - 0.625).abs() < 1e-15);
        assert!((rk4[0] - 0.625).abs() < 1e-15);
    }

    #[test]
    fn step_rejects_wrong_dimension() {
        let mut stepper = ExplicitStepper::new(SolverKind::RK4, Decay);
        assert!(matches!(
            stepper.step(0.0, &[1.0, 2.0], 0.1),
            Err(Error::DimensionMismatch {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn solver_names_round_trip() {
        for kind in SolverKind::ALL {
            assert_eq!(kind.name().parse::<SolverKind>().unwrap(), kind);
        }
        assert!(matches!(
            "Tsit5".parse::<SolverKind>(),
            Err(Error::InvalidSolverType(name)) if name == "Tsit5"
        ));
        assert!(ExplicitStepper::from_name("rk4", Decay).is_err());
        assert_eq!(
            ExplicitStepper::from_name("MidPoint", Decay).unwrap().kind(),
            SolverKind::MidPoint
        );
    }

    #[test]
    fn stepper_orders_agree_with_kind() {
        assert_eq!(ForwardEuler::<f64>::new(1).order(), SolverKind::ForwardEuler.order());
        assert_eq!(MidPoint::<f64>::new(1).order(), SolverKind::MidPoint.order());
        assert_eq!(RK4::<f64>::new(1).order(), SolverKind::RK4.order());
    }

    #[test]
    fn steppers_work_in_single_precision() {
        let mut rk4 = RK4::<f32>::new(1);
        let mut t = 0.0f32;
        let mut state = [1.0f32];
        struct DecayF32;
        impl DynamicalSystem<f32> for DecayF32 {
            fn dimension(&self) -> usize {
                1
            }
            fn apply(&self, _t: f32, x: &[f32], out: &mut [f32]) {
                out[0] = -x[0];
            }
        }
        for _ in 0..10 {
            rk4.step(&DecayF32, &mut t, &mut state, 0.1);
        }
        assert!((t - 1.0).abs() < 1e-5);
        assert!((state[0] - (-1.0f32).exp()).abs() < 1e-5);
    }
}
