use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// Numeric types the integrators can work with.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// Converts an `f64` constant into `T`; types that cannot represent it get NaN.
pub(crate) fn constant<T: Scalar>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::nan)
}

/// Right-hand side `f(t, y)` of an ODE system `dy/dt = f(t, y)`.
pub trait DynamicalSystem<T: Scalar> {
    /// Dimension of the state vector.
    fn dimension(&self) -> usize;

    /// Writes `f(t, x)` into `out`; `x` and `out` both have length `dimension()`.
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

impl<T: Scalar, S: DynamicalSystem<T> + ?Sized> DynamicalSystem<T> for &S {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) {
        (**self).apply(t, x, out)
    }
}

/// A fixed-step explicit scheme.
pub trait Steppable<T: Scalar> {
    /// Nominal order of accuracy.
    fn order(&self) -> usize;

    /// Advances `state` from `t` to `t + dt` in place and updates `t`.
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T);
}
