use crate::js_error;
use anyhow::Context;
use statode_core::expression::{ExpressionSolution, ExpressionSystem};
use statode_core::ode::OdeRun;
use wasm_bindgen::prelude::*;

type ExpressionRun = OdeRun<ExpressionSystem<f64>>;

/// Equation `i` gives `d y_i / dt` in terms of `t` and `y0, y1, ...`.
pub(crate) fn build_run(equations: &[String], solver_name: &str) -> anyhow::Result<ExpressionRun> {
    let system = ExpressionSystem::compile(equations).context("Invalid right-hand side")?;
    Ok(OdeRun::from_name(solver_name, system)?)
}

pub(crate) fn infinity_norm_error(
    run: &mut ExpressionRun,
    exact_equations: &[String],
) -> anyhow::Result<f64> {
    let exact = ExpressionSolution::compile(exact_equations).context("Invalid exact solution")?;
    Ok(run.compute_infinity_norm_error(|t| exact.eval(t))?)
}

#[wasm_bindgen]
pub struct WasmOdeRun {
    run: ExpressionRun,
}

#[wasm_bindgen]
impl WasmOdeRun {
    #[wasm_bindgen(constructor)]
    pub fn new(equations: Vec<String>, solver_name: &str) -> Result<WasmOdeRun, JsValue> {
        console_error_panic_hook::set_once();
        let run = build_run(&equations, solver_name).map_err(js_error)?;
        Ok(WasmOdeRun { run })
    }

    pub fn solver_name(&self) -> String {
        self.run.kind().name().to_string()
    }

    pub fn dimension(&self) -> usize {
        self.run.dimension()
    }

    pub fn solve(&mut self, t0: f64, tf: f64, y0: Vec<f64>, num_steps: usize) -> Result<(), JsValue> {
        self.run.solve(t0, tf, &y0, num_steps).map_err(js_error)
    }

    pub fn is_solved(&self) -> bool {
        self.run.is_solved()
    }

    pub fn time_steps(&self) -> Vec<f64> {
        self.run.time_steps().to_vec()
    }

    /// States flattened row-major: `dimension()` values per time step.
    pub fn sol_steps(&self) -> Vec<f64> {
        self.run.sol_steps().concat()
    }

    /// `undefined` until an error has been computed for the current trajectory.
    pub fn err_steps(&self) -> Option<Vec<f64>> {
        self.run.err_steps().map(<[f64]>::to_vec)
    }

    /// `exact_equations` are expressions in `t`, one per state component.
    pub fn compute_infinity_norm_error(&mut self, exact_equations: Vec<String>) -> Result<f64, JsValue> {
        infinity_norm_error(&mut self.run, &exact_equations).map_err(js_error)
    }

    pub fn empirical_order(
        &mut self,
        t0: f64,
        tf: f64,
        y0: Vec<f64>,
        num_steps: usize,
        exact_equations: Vec<String>,
    ) -> Result<f64, JsValue> {
        let exact = ExpressionSolution::compile(&exact_equations)
            .context("Invalid exact solution")
            .map_err(js_error)?;
        self.run
            .empirical_order(t0, tf, &y0, num_steps, |t| exact.eval(t))
            .map_err(js_error)
    }

    pub fn to_csv(&self) -> Result<String, JsValue> {
        self.run.to_csv_string().map_err(js_error)
    }
}
