//! WASM bindings for statode_core.
//!
//! `WasmTable` exposes tables and their statistics, `WasmOdeRun` exposes
//! fixed-step integration of systems written as text expressions.

use nalgebra::DMatrix;
use std::fmt::Display;
use wasm_bindgen::prelude::*;

mod ode;
mod table;

pub use ode::WasmOdeRun;
pub use table::WasmTable;

/// Renders an error (with its context chain) as a JS string value.
pub(crate) fn js_error(err: impl Display) -> JsValue {
    JsValue::from_str(&format!("{err:#}"))
}

/// Row-major flattening of a square result matrix.
pub(crate) fn row_major(matrix: &DMatrix<f64>) -> Vec<f64> {
    let (rows, cols) = matrix.shape();
    (0..rows)
        .flat_map(|i| (0..cols).map(move |j| matrix[(i, j)]))
        .collect()
}
