//! Least-squares fit of the income-to-rate logistic curve.
use super::LogisticParams;
use crate::error::PipelineError;
use argmin::core::{CostFunction, Executor, Gradient, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;

/// Minimum number of observations for a fit
const MIN_OBSERVATIONS: usize = 3;

/// Maximum number of solver iterations
const MAX_ITERATIONS: u64 = 500;

/// Largest acceptable gradient norm at the solution
const GRADIENT_TOLERANCE: f64 = 1e-4;

/// Sum-of-squares objective over (log-income, rate) points for fixed asymptote
#[derive(Clone)]
struct LogisticLeastSquares {
    asymptote: f64,
    points: Vec<(f64, f64)>,
}

impl LogisticLeastSquares {
    /// Model value and the logistic term `s = 1 / (1 + exp(-k (x - x0)))` for one point
    fn evaluate(&self, params: &[f64], log_income: f64) -> (f64, f64) {
        let (scale, midpoint) = (params[0], params[1]);
        let s = 1.0 / (1.0 + (-scale * (log_income - midpoint)).exp());
        (self.asymptote * s, s)
    }
}

impl CostFunction for LogisticLeastSquares {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        Ok(self
            .points
            .iter()
            .map(|&(x, rate)| {
                let (model, _) = self.evaluate(params, x);
                0.5 * (model - rate).powi(2)
            })
            .sum())
    }
}

impl Gradient for LogisticLeastSquares {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, params: &Self::Param) -> Result<Self::Gradient, argmin::core::Error> {
        let (scale, midpoint) = (params[0], params[1]);
        let mut grad = vec![0.0; 2];
        for &(x, rate) in &self.points {
            let (model, s) = self.evaluate(params, x);
            let residual = model - rate;

            // d(model)/dz where z = k (x - x0)
            let dz = self.asymptote * s * (1.0 - s);
            grad[0] += residual * dz * (x - midpoint);
            grad[1] -= residual * dz * scale;
        }

        Ok(grad)
    }
}

/// Fit the logistic curve to (income, rate) observations.
///
/// The asymptote is fixed and the steepness and midpoint are free. The solver always starts from
/// the same point (unit steepness, midpoint at the mean log-income), so results are reproducible.
///
/// # Arguments
///
/// * `what` - Description of the fit, for error messages
/// * `observations` - Pairs of (income, rate)
/// * `asymptote` - The fixed upper limit of the curve
pub fn fit_logistic(
    what: &str,
    observations: &[(f64, f64)],
    asymptote: f64,
) -> Result<LogisticParams, PipelineError> {
    let diverged = |reason: &str| PipelineError::FitDiverged {
        what: what.to_string(),
        reason: reason.to_string(),
    };

    if observations.len() < MIN_OBSERVATIONS {
        return Err(diverged(&format!(
            "{} observation(s), at least {MIN_OBSERVATIONS} required",
            observations.len()
        )));
    }
    if observations.iter().any(|&(income, _)| income <= 0.0) {
        return Err(diverged("incomes must be positive"));
    }

    let points: Vec<_> = observations
        .iter()
        .map(|&(income, rate)| (income.ln(), rate))
        .collect();
    let mean_log_income = points.iter().map(|(x, _)| x).sum::<f64>() / points.len() as f64;
    let problem = LogisticLeastSquares { asymptote, points };
    let initial = vec![1.0, mean_log_income];

    let solver = LBFGS::new(MoreThuenteLineSearch::new(), 7)
        .with_tolerance_grad(1e-10)
        .map_err(|err| diverged(&err.to_string()))?;
    let result = Executor::new(problem.clone(), solver)
        .configure(|state| {
            state
                .param(initial)
                .max_iters(MAX_ITERATIONS)
                .target_cost(1e-14)
        })
        .run()
        .map_err(|err| diverged(&err.to_string()))?;

    let best = result
        .state()
        .get_best_param()
        .ok_or_else(|| diverged("solver returned no parameters"))?;
    if !best.iter().all(|p| p.is_finite()) {
        return Err(diverged("non-finite parameters"));
    }
    if best[0] <= 0.0 {
        return Err(diverged("rate does not increase with income"));
    }

    let grad_norm = problem
        .gradient(best)
        .map_err(|err| diverged(&err.to_string()))?
        .iter()
        .map(|g| g * g)
        .sum::<f64>()
        .sqrt();
    if grad_norm > GRADIENT_TOLERANCE {
        return Err(diverged(&format!("gradient norm {grad_norm:.3e} too large")));
    }

    Ok(LogisticParams {
        asymptote,
        scale: best[0],
        midpoint: best[1],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    fn synthetic(params: &LogisticParams, incomes: &[f64]) -> Vec<(f64, f64)> {
        incomes
            .iter()
            .map(|&income| (income, params.rate_at(income)))
            .collect()
    }

    #[test]
    fn recovers_known_parameters() {
        let truth = LogisticParams {
            asymptote: 0.99,
            scale: 1.5,
            midpoint: 2000.0_f64.ln(),
        };
        let incomes = [200.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 20_000.0, 50_000.0];
        let fitted = fit_logistic("connection", &synthetic(&truth, &incomes), 0.99).unwrap();

        assert_approx_eq!(f64, fitted.scale, truth.scale, epsilon = 1e-3);
        assert_approx_eq!(f64, fitted.midpoint, truth.midpoint, epsilon = 1e-3);
    }

    #[test]
    fn fit_is_deterministic() {
        let observations = [(300.0, 0.2), (1500.0, 0.45), (6000.0, 0.8), (30_000.0, 0.97)];
        let first = fit_logistic("treatment", &observations, 0.99).unwrap();
        let second = fit_logistic("treatment", &observations, 0.99).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn too_few_observations() {
        assert!(matches!(
            fit_logistic("connection", &[(100.0, 0.1), (1000.0, 0.5)], 0.99),
            Err(PipelineError::FitDiverged { .. })
        ));
    }

    #[test]
    fn non_positive_income() {
        assert!(matches!(
            fit_logistic("connection", &[(0.0, 0.1), (1000.0, 0.5), (2000.0, 0.6)], 0.99),
            Err(PipelineError::FitDiverged { .. })
        ));
    }

    #[test]
    fn decreasing_rates_diverge() {
        let truth = LogisticParams {
            asymptote: 0.99,
            scale: -1.0,
            midpoint: 2000.0_f64.ln(),
        };
        let incomes = [200.0, 1000.0, 2000.0, 5000.0, 20_000.0];
        assert!(matches!(
            fit_logistic("connection", &synthetic(&truth, &incomes), 0.99),
            Err(PipelineError::FitDiverged { .. })
        ));
    }
}
