use crate::{js_error, row_major};
use anyhow::{bail, Context};
use js_sys::Array;
use serde_wasm_bindgen::to_value;
use statode_core::statistics::ScalingMethod;
use statode_core::table::{ImportOptions, Table, Value};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmTable {
    table: Table,
}

pub(crate) fn parse_separator(separator: &str) -> anyhow::Result<u8> {
    match separator.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => bail!("Separator must be a single ASCII character, got '{separator}'."),
    }
}

pub(crate) fn load_table(text: &str, separator: &str) -> anyhow::Result<Table> {
    let options = ImportOptions::with_separator(parse_separator(separator)?);
    Table::from_csv_str(text, options).context("Failed to read delimited text")
}

#[wasm_bindgen]
impl WasmTable {
    #[wasm_bindgen(constructor)]
    pub fn from_csv(text: &str, separator: &str) -> Result<WasmTable, JsValue> {
        console_error_panic_hook::set_once();
        let table = load_table(text, separator).map_err(js_error)?;
        Ok(WasmTable { table })
    }

    /// `[rows, columns]`
    pub fn dims(&self) -> Vec<u32> {
        let (rows, cols) = self.table.dims();
        vec![rows as u32, cols as u32]
    }

    pub fn column_names(&self) -> Vec<String> {
        self.table
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Cells of `name` in row order, `null` for missing ones.
    pub fn column(&self, name: &str) -> Result<Array, JsValue> {
        let column = self.table.get_column(name).map_err(js_error)?;
        Ok(column
            .values()
            .iter()
            .map(|cell| match cell {
                Some(Value::Number(x)) => JsValue::from_f64(*x),
                Some(Value::Text(text)) => JsValue::from_str(text),
                None => JsValue::NULL,
            })
            .collect())
    }

    /// Present values of a numeric column.
    pub fn numbers(&self, name: &str) -> Result<Vec<f64>, JsValue> {
        let column = self.table.get_column(name).map_err(js_error)?;
        Ok(column.numbers().collect())
    }

    pub fn count_missing(&self, name: &str) -> Result<usize, JsValue> {
        self.table.count_missing(name).map_err(js_error)
    }

    /// Returns the number of rows removed.
    pub fn drop_nan(&mut self) -> usize {
        self.table.drop_nan()
    }

    pub fn drop_column(&mut self, name: &str) -> Result<(), JsValue> {
        self.table.drop_column(name).map(|_| ()).map_err(js_error)
    }

    pub fn sum(&self, name: &str) -> Result<f64, JsValue> {
        self.table.sum(name).map_err(js_error)
    }

    pub fn mean(&self, name: &str) -> Result<f64, JsValue> {
        self.table.mean(name).map_err(js_error)
    }

    pub fn min(&self, name: &str) -> Result<f64, JsValue> {
        self.table.min(name).map_err(js_error)
    }

    pub fn max(&self, name: &str) -> Result<f64, JsValue> {
        self.table.max(name).map_err(js_error)
    }

    pub fn median(&self, name: &str) -> Result<f64, JsValue> {
        self.table.median(name).map_err(js_error)
    }

    /// `p` is a fraction in `[0, 1]`.
    pub fn percentile(&self, name: &str, p: f64) -> Result<f64, JsValue> {
        self.table.percentile(name, p).map_err(js_error)
    }

    pub fn variance(&self, name: &str) -> Result<f64, JsValue> {
        self.table.variance(name).map_err(js_error)
    }

    pub fn population_variance(&self, name: &str) -> Result<f64, JsValue> {
        self.table.population_variance(name).map_err(js_error)
    }

    pub fn sd(&self, name: &str) -> Result<f64, JsValue> {
        self.table.sd(name).map_err(js_error)
    }

    pub fn covariance(&self, a: &str, b: &str) -> Result<f64, JsValue> {
        self.table.covariance(a, b).map_err(js_error)
    }

    pub fn correlation(&self, a: &str, b: &str) -> Result<f64, JsValue> {
        self.table.correlation(a, b).map_err(js_error)
    }

    /// Covariance matrix over `names`, flattened row-major.
    pub fn cov_matrix(&self, names: Vec<String>) -> Result<Vec<f64>, JsValue> {
        let matrix = self.table.cov_matrix(names.as_slice()).map_err(js_error)?;
        Ok(row_major(&matrix))
    }

    /// Correlation matrix over `names`, flattened row-major.
    pub fn corr_matrix(&self, names: Vec<String>) -> Result<Vec<f64>, JsValue> {
        let matrix = self.table.corr_matrix(names.as_slice()).map_err(js_error)?;
        Ok(row_major(&matrix))
    }

    pub fn summary(&self, name: &str) -> Result<JsValue, JsValue> {
        let summary = self.table.summary(name).map_err(js_error)?;
        to_value(&summary).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Rescales a numeric column in place; `method` is `"standard"` or `"min-max"`.
    pub fn scale(&mut self, name: &str, method: &str) -> Result<(), JsValue> {
        let method: ScalingMethod = method.parse().map_err(js_error)?;
        self.table.scale(name, method).map_err(js_error)
    }

    pub fn to_csv(&self, separator: &str) -> Result<String, JsValue> {
        let separator = parse_separator(separator).map_err(js_error)?;
        let mut buffer = Vec::new();
        self.table
            .write_csv_to(&mut buffer, separator)
            .map_err(js_error)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "a;b;label\n1;2;x\n2;4;y\nNA;5;x\n3;7;\n";

    fn sample() -> WasmTable {
        WasmTable::from_csv(SAMPLE, ";").expect("table")
    }

    #[test]
    fn separator_must_be_one_ascii_byte() {
        assert_eq!(parse_separator(",").unwrap(), b',');
        assert_eq!(parse_separator("\t").unwrap(), b'\t');
        assert!(parse_separator("").is_err());
        assert!(parse_separator(";;").is_err());
        assert!(parse_separator("é").is_err());
    }

    #[test]
    fn load_table_reports_context() {
        let err = load_table("a,b\n1\n", ",").unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read delimited text"));
    }

    #[test]
    fn wasm_table_exposes_shape_and_names() {
        let table = sample();
        assert_eq!(table.dims(), vec![4, 3]);
        assert_eq!(table.column_names(), vec!["a", "b", "label"]);
        assert_eq!(table.numbers("a").unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(table.count_missing("label").unwrap(), 1);
    }

    #[test]
    fn wasm_table_statistics_match_core() {
        let table = sample();
        assert_eq!(table.sum("a").unwrap(), 6.0);
        assert_eq!(table.mean("b").unwrap(), 4.5);
        assert_eq!(table.min("b").unwrap(), 2.0);
        assert_eq!(table.max("b").unwrap(), 7.0);
        assert_eq!(table.median("a").unwrap(), 2.0);
        assert_eq!(table.percentile("b", 1.0).unwrap(), 7.0);
        assert!((table.variance("a").unwrap() - 1.0).abs() < 1e-12);
        assert!((table.population_variance("a").unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((table.sd("a").unwrap() - 1.0).abs() < 1e-12);
        assert!((table.covariance("a", "b").unwrap() - table.covariance("b", "a").unwrap()).abs() < 1e-12);
        assert!((table.correlation("a", "a").unwrap() - 1.0).abs() < 1e-15);
    }

    #[test]
    fn wasm_table_matrices_are_row_major() {
        let table = sample();
        let names = vec!["a".to_string(), "b".to_string()];
        let cov = table.cov_matrix(names.clone()).unwrap();
        assert_eq!(cov.len(), 4);
        assert!((cov[0] - table.variance("a").unwrap()).abs() < 1e-12);
        assert!((cov[3] - table.variance("b").unwrap()).abs() < 1e-12);
        assert!((cov[1] - cov[2]).abs() < 1e-12);

        let corr = table.corr_matrix(names).unwrap();
        assert_eq!(corr[0], 1.0);
        assert_eq!(corr[3], 1.0);
        assert!(corr[1].abs() <= 1.0);
    }

    #[test]
    fn wasm_table_edits_in_place() {
        let mut table = sample();
        assert_eq!(table.drop_nan(), 2);
        assert_eq!(table.dims(), vec![2, 3]);

        table.drop_column("label").unwrap();
        assert_eq!(table.column_names(), vec!["a", "b"]);

        table.scale("b", "min-max").unwrap();
        assert_eq!(table.numbers("b").unwrap(), vec![0.0, 1.0]);
        assert_eq!(table.to_csv(",").unwrap(), "a,b\n1,0\n2,1\n");
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    fn sample() -> WasmTable {
        WasmTable::from_csv("a,label\n1,x\nNA,y\n3,\n", ",").expect("table")
    }

    fn message(err: JsValue) -> String {
        err.as_string().expect("string error")
    }

    #[wasm_bindgen_test]
    fn errors_reach_js_as_strings() {
        let err = WasmTable::from_csv("a,a\n1,2\n", ",").err().expect("duplicate header");
        assert!(message(err).contains("already exists"));

        let mut table = sample();
        assert!(message(table.mean("missing").unwrap_err()).contains("Unknown column"));
        assert!(message(table.mean("label").unwrap_err()).contains("not numeric"));
        assert!(message(table.percentile("a", 25.0).unwrap_err()).contains("Invalid percentile"));
        assert!(message(table.scale("a", "log").unwrap_err()).contains("Invalid scaling method"));
        assert!(message(table.to_csv("::").unwrap_err()).contains("Separator"));
    }

    #[wasm_bindgen_test]
    fn column_uses_null_for_missing_cells() {
        let table = sample();
        let numbers = table.column("a").unwrap();
        assert_eq!(numbers.length(), 3);
        assert_eq!(numbers.get(0).as_f64(), Some(1.0));
        assert!(numbers.get(1).is_null());

        let labels = table.column("label").unwrap();
        assert_eq!(labels.get(0).as_string().as_deref(), Some("x"));
        assert!(labels.get(2).is_null());
    }

    #[wasm_bindgen_test]
    fn summary_serializes_to_object() {
        let table = sample();
        let summary = table.summary("a").unwrap();
        assert!(summary.is_object());
        let median = js_sys::Reflect::get(&summary, &JsValue::from_str("median")).unwrap();
        assert_eq!(median.as_f64(), Some(2.0));
    }
}
