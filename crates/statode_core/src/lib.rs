//! The `statode_core` crate holds the numerical engines behind statode.
//!
//! Key components:
//! - **Table**: columnar storage with explicit missing cells, delimited-text import/export.
//! - **Statistics**: missing-aware descriptive statistics and covariance/correlation matrices.
//! - **Traits**: `Scalar`, `DynamicalSystem` (ODE right-hand sides), `Steppable` (schemes).
//! - **Solvers**: fixed-step explicit schemes (ForwardEuler, MidPoint, RK4).
//! - **ODE runs**: trajectory storage, infinity-norm error, CSV export, empirical order.
//! - **Expressions**: a bytecode VM for right-hand sides and reference solutions given as text.

pub mod error;
pub mod expression;
pub mod ode;
pub mod solvers;
pub mod statistics;
pub mod table;
pub mod timing;
pub mod traits;

pub use error::{Error, Result};
