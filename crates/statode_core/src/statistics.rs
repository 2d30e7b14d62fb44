//! Descriptive statistics over named table columns.
//!
//! Every statistic skips missing cells. Two-column statistics pair values row
//! by row and only use rows where both cells are present. Percentiles take `p`
//! as a fraction in `[0, 1]` and interpolate linearly between adjacent order
//! statistics.

use crate::error::{Error, Result};
use crate::table::{Table, Value};
use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Five-number summary plus moments of a numeric column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub min: f64,
    pub first_quartile: f64,
    pub median: f64,
    pub third_quartile: f64,
    pub max: f64,
    pub mean: f64,
    pub variance: f64,
    pub sd: f64,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = ["Min", "1st Q", "Median", "3rd Q", "Max", "Mean", "Variance", "Std.Dev"];
        let values = [
            self.min,
            self.first_quartile,
            self.median,
            self.third_quartile,
            self.max,
            self.mean,
            self.variance,
            self.sd,
        ];
        for label in labels {
            write!(f, "{label:<15} ")?;
        }
        writeln!(f)?;
        for value in values {
            write!(f, "{:<15} ", format!("{value:.6}"))?;
        }
        writeln!(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalingMethod {
    /// `(x - mean) / sd`
    Standard,
    /// `(x - min) / (max - min)`
    MinMax,
}

impl FromStr for ScalingMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "standard" => Ok(ScalingMethod::Standard),
            "min-max" => Ok(ScalingMethod::MinMax),
            other => Err(Error::InvalidScalingMethod(other.to_string())),
        }
    }
}

impl Table {
    fn numeric_values(&self, name: &str) -> Result<Vec<f64>> {
        let column = self.get_column(name)?;
        if !column.is_numeric() {
            return Err(Error::NonNumericColumn(name.to_string()));
        }
        Ok(column.numbers().collect())
    }

    fn observed(&self, name: &str) -> Result<Vec<f64>> {
        let values = self.numeric_values(name)?;
        if values.is_empty() {
            return Err(Error::EmptyColumn(name.to_string()));
        }
        Ok(values)
    }

    /// Row-aligned values of `a` and `b`, keeping rows where both are present.
    fn paired(&self, a: &str, b: &str) -> Result<(Vec<f64>, Vec<f64>)> {
        let first = self.get_column(a)?;
        let second = self.get_column(b)?;
        for column in [first, second] {
            if !column.is_numeric() {
                return Err(Error::NonNumericColumn(column.name().to_string()));
            }
        }
        Ok((0..self.nrows())
            .filter_map(|r| Some((first.number_at(r)?, second.number_at(r)?)))
            .unzip())
    }

    pub fn sum(&self, name: &str) -> Result<f64> {
        Ok(self.observed(name)?.iter().sum())
    }

    pub fn mean(&self, name: &str) -> Result<f64> {
        Ok(mean(&self.observed(name)?))
    }

    pub fn min(&self, name: &str) -> Result<f64> {
        Ok(self.observed(name)?.into_iter().fold(f64::INFINITY, f64::min))
    }

    pub fn max(&self, name: &str) -> Result<f64> {
        Ok(self
            .observed(name)?
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max))
    }

    pub fn median(&self, name: &str) -> Result<f64> {
        self.percentile(name, 0.5)
    }

    /// Linear-interpolation percentile, `p` in `[0, 1]`.
    pub fn percentile(&self, name: &str, p: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::InvalidPercentile(p));
        }
        let mut values = self.observed(name)?;
        values.sort_by(f64::total_cmp);
        Ok(quantile_sorted(&values, p))
    }

    /// Sample variance (denominator `n - 1`).
    pub fn variance(&self, name: &str) -> Result<f64> {
        let values = self.numeric_values(name)?;
        sample_covariance(&values, &values, name)
    }

    /// Population variance (denominator `n`).
    pub fn population_variance(&self, name: &str) -> Result<f64> {
        let values = self.observed(name)?;
        Ok(co_moment(&values, &values) / values.len() as f64)
    }

    pub fn sd(&self, name: &str) -> Result<f64> {
        Ok(self.variance(name)?.sqrt())
    }

    /// Sample covariance over rows where both columns are present.
    pub fn covariance(&self, a: &str, b: &str) -> Result<f64> {
        let (xs, ys) = self.paired(a, b)?;
        sample_covariance(&xs, &ys, &format!("{a} x {b}"))
    }

    /// Pearson correlation over rows where both columns are present.
    ///
    /// Fails with `DegenerateVariance` when either column is constant on those rows.
    pub fn correlation(&self, a: &str, b: &str) -> Result<f64> {
        let (xs, ys) = self.paired(a, b)?;
        let label = format!("{a} x {b}");
        let cov = sample_covariance(&xs, &ys, &label)?;
        let var_x = sample_covariance(&xs, &xs, &label)?;
        let var_y = sample_covariance(&ys, &ys, &label)?;
        // Equal variances keep `correlation(a, a)` exactly 1; the product of
        // roots avoids overflow and underflow of `var_x * var_y`.
        let scale = if var_x == var_y {
            var_x
        } else {
            var_x.sqrt() * var_y.sqrt()
        };
        if scale == 0.0 || !scale.is_finite() {
            return Err(Error::DegenerateVariance(format!(
                "zero standard deviation in correlation of {label}"
            )));
        }
        Ok((cov / scale).clamp(-1.0, 1.0))
    }

    /// Covariance for every ordered pair of `attributes`.
    ///
    /// Both triangles are evaluated independently; exploiting symmetry would
    /// halve the work.
    pub fn cov_matrix<S: AsRef<str>>(&self, attributes: &[S]) -> Result<DMatrix<f64>> {
        self.pairwise_matrix(attributes, |a, b| self.covariance(a, b))
    }

    /// Correlation for every ordered pair of `attributes`.
    pub fn corr_matrix<S: AsRef<str>>(&self, attributes: &[S]) -> Result<DMatrix<f64>> {
        self.pairwise_matrix(attributes, |a, b| self.correlation(a, b))
    }

    fn pairwise_matrix<S, F>(&self, attributes: &[S], pair: F) -> Result<DMatrix<f64>>
    where
        S: AsRef<str>,
        F: Fn(&str, &str) -> Result<f64>,
    {
        let k = attributes.len();
        debug!("pairwise matrix over {k} attributes, {} rows", self.nrows());
        let mut matrix = DMatrix::zeros(k, k);
        for i in 0..k {
            for j in 0..k {
                matrix[(i, j)] = pair(attributes[i].as_ref(), attributes[j].as_ref())?;
            }
        }
        Ok(matrix)
    }

    pub fn summary(&self, name: &str) -> Result<Summary> {
        Ok(Summary {
            min: self.min(name)?,
            first_quartile: self.percentile(name, 0.25)?,
            median: self.median(name)?,
            third_quartile: self.percentile(name, 0.75)?,
            max: self.max(name)?,
            mean: self.mean(name)?,
            variance: self.variance(name)?,
            sd: self.sd(name)?,
        })
    }

    /// Rescales a numeric column in place; missing cells stay missing.
    pub fn scale(&mut self, name: &str, method: ScalingMethod) -> Result<()> {
        let (offset, spread) = match method {
            ScalingMethod::Standard => (self.mean(name)?, self.sd(name)?),
            ScalingMethod::MinMax => {
                let lo = self.min(name)?;
                (lo, self.max(name)? - lo)
            }
        };
        if spread == 0.0 || !spread.is_finite() {
            return Err(Error::DegenerateVariance(format!(
                "cannot scale '{name}': spread is {spread}"
            )));
        }
        debug!("scale '{name}' with {method:?}");
        let column = self.get_column_mut(name)?;
        for cell in column.values_mut().iter_mut() {
            if let Some(Value::Number(x)) = cell {
                *x = (*x - offset) / spread;
            }
        }
        Ok(())
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sum of `(x - mean_x)(y - mean_y)` over paired values.
fn co_moment(xs: &[f64], ys: &[f64]) -> f64 {
    let mx = mean(xs);
    let my = mean(ys);
    xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum()
}

fn sample_covariance(xs: &[f64], ys: &[f64], label: &str) -> Result<f64> {
    let n = xs.len();
    if n < 2 {
        return Err(Error::DegenerateVariance(format!(
            "{label} has {n} usable values, need at least 2"
        )));
    }
    Ok(co_moment(xs, ys) / (n - 1) as f64)
}

fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    if frac == 0.0 {
        return sorted[lo];
    }
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
