//! Cost minimization for the reference fitter.
//!
//! The cost is handed to `argmin` as a black box:
//!
//! - L-BFGS with a More-Thuente line search
//! - gradients and Hessians by central differences (`finitediff`)
//! - the search runs in coordinates scaled by the diagonal of the Hessian at the
//!   starting point, so unit steps are of the order of the parameter errors
//!
//! A non-finite cost aborts the search.

use argmin::core::{
    CostFunction, Error, Executor, Gradient, Hessian, State, TerminationReason, TerminationStatus,
};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use finitediff::FiniteDiff;
use nalgebra::{DMatrix, DVector};
use tracing::trace;

use crate::error::FitError;

type Param = Vec<f64>;
type Lbfgs = LBFGS<MoreThuenteLineSearch<Param, Param, f64>, Param, Param, f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct MinimizerOptions {
    pub max_iterations: usize,
    /// Gradient tolerance in scaled coordinates, relative to `1 + |cost|` at the start.
    pub tolerance: f64,
    /// Hessian finite-difference step, relative to `1 + |θ_i|`.
    pub step_scale: f64,
    /// L-BFGS history length.
    pub memory: usize,
}

impl Default for MinimizerOptions {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-7,
            step_scale: 1e-3,
            memory: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub parameters: DVector<f64>,
    pub value: f64,
    /// Hessian of the cost at the minimum.
    pub hessian: DMatrix<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// `f` seen from `origin` in coordinates `u`, with `θ = origin + scale ∘ u`.
struct ScaledCost<'a, F> {
    f: &'a F,
    origin: &'a DVector<f64>,
    scale: DVector<f64>,
    step_scale: f64,
}

impl<F> ScaledCost<'_, F>
where
    F: Fn(&DVector<f64>) -> f64,
{
    fn theta(&self, u: &[f64]) -> DVector<f64> {
        DVector::from_iterator(
            u.len(),
            self.origin.iter().zip(self.scale.iter()).zip(u).map(|((o, s), u)| o + s * u),
        )
    }

    fn value(&self, u: &[f64]) -> f64 {
        (self.f)(&self.theta(u))
    }
}

impl<F> CostFunction for ScaledCost<'_, F>
where
    F: Fn(&DVector<f64>) -> f64,
{
    type Param = Param;
    type Output = f64;

    fn cost(&self, u: &Self::Param) -> Result<Self::Output, Error> {
        let value = self.value(u);
        if !value.is_finite() {
            return Err(Error::msg(format!("cost is not finite ({value})")));
        }
        Ok(value)
    }
}

impl<F> Gradient for ScaledCost<'_, F>
where
    F: Fn(&DVector<f64>) -> f64,
{
    type Param = Param;
    type Gradient = Param;

    fn gradient(&self, u: &Self::Param) -> Result<Self::Gradient, Error> {
        let grad = u.central_diff(&|u: &Param| self.value(u));
        if grad.iter().any(|g| !g.is_finite()) {
            return Err(Error::msg("cost gradient is not finite"));
        }
        Ok(grad)
    }
}

impl<F> Hessian for ScaledCost<'_, F>
where
    F: Fn(&DVector<f64>) -> f64,
{
    type Param = Param;
    type Hessian = Vec<Vec<f64>>;

    fn hessian(&self, u: &Self::Param) -> Result<Self::Hessian, Error> {
        let theta = self.theta(u);
        // finitediff steps by sqrt(eps); stretch them to step_scale * (1 + |θ_i|)
        let stretch: Vec<f64> = theta
            .iter()
            .zip(self.scale.iter())
            .map(|(t, s)| self.step_scale * (1.0 + t.abs()) / (s * f64::EPSILON.sqrt()))
            .collect();
        let at = |v: &Param| -> Param { u.iter().zip(&stretch).zip(v).map(|((u, c), v)| u + c * v).collect() };
        let cost = |v: &Param| self.value(&at(v));
        let grad = |v: &Param| -> Param { v.central_diff(&cost) };
        let origin: Param = vec![0.0; u.len()];
        let raw = origin.central_hessian(&grad);

        let n = u.len();
        let mut hess = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                let value = 0.5 * (raw[i][j] + raw[j][i]) / (stretch[i] * stretch[j]);
                if !value.is_finite() {
                    return Err(Error::msg("cost Hessian is not finite"));
                }
                hess[i][j] = value;
            }
        }
        Ok(hess)
    }
}

/// Unit steps of about one standard deviation; `1` where the curvature is unusable.
fn preconditioner(hessian: &[Vec<f64>]) -> DVector<f64> {
    DVector::from_iterator(
        hessian.len(),
        hessian.iter().enumerate().map(|(i, row)| {
            let h = row[i];
            if h.is_finite() && h > 0.0 { h.sqrt().recip() } else { 1.0 }
        }),
    )
}

fn computation(context: &str, e: Error) -> FitError {
    FitError::Computation(format!("{context}: {e}"))
}

/// Minimize `f` starting from `start`.
pub fn minimize<F>(f: F, start: DVector<f64>, options: &MinimizerOptions) -> Result<Minimum, FitError>
where
    F: Fn(&DVector<f64>) -> f64,
{
    let value = f(&start);
    if !value.is_finite() {
        return Err(FitError::Computation(format!(
            "cost is not finite at the starting point ({value})"
        )));
    }
    let n = start.len();
    if n == 0 {
        return Ok(Minimum {
            parameters: start,
            value,
            hessian: DMatrix::zeros(0, 0),
            iterations: 0,
            converged: true,
        });
    }

    let unscaled = ScaledCost {
        f: &f,
        origin: &start,
        scale: DVector::from_element(n, 1.0),
        step_scale: options.step_scale,
    };
    let scale = match unscaled.hessian(&vec![0.0; n]) {
        Ok(h) => preconditioner(&h),
        Err(_) => DVector::from_element(n, 1.0),
    };
    let problem = || ScaledCost {
        f: &f,
        origin: &start,
        scale: scale.clone(),
        step_scale: options.step_scale,
    };

    let tol_grad = options.tolerance * (1.0 + value.abs());
    let solver: Lbfgs = LBFGS::new(MoreThuenteLineSearch::new(), options.memory)
        .with_tolerance_grad(tol_grad)
        .and_then(|s| s.with_tolerance_cost(0.1 * tol_grad))
        .map_err(|e| computation("invalid minimizer configuration", e))?;

    let result = Executor::new(problem(), solver)
        .configure(|state| state.param(vec![0.0; n]).max_iters(options.max_iterations as u64))
        .run()
        .map_err(|e| computation("minimization failed", e))?;

    let state = result.state();
    let best = state.get_best_param().cloned().unwrap_or_else(|| vec![0.0; n]);
    let iterations = state.get_iter() as usize;
    let converged = matches!(
        state.get_termination_status(),
        TerminationStatus::Terminated(TerminationReason::SolverConverged | TerminationReason::TargetCostReached)
    );
    trace!(iterations, converged, "minimization finished");

    let scaled = problem();
    let hess = scaled
        .hessian(&best)
        .map_err(|e| computation("Hessian at the minimum", e))?;
    let parameters = scaled.theta(&best);
    Ok(Minimum {
        value: f(&parameters),
        hessian: DMatrix::from_fn(n, n, |i, j| hess[i][j] / (scale[i] * scale[j])),
        parameters,
        iterations,
        converged,
    })
}
