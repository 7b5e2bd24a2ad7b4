//! Constant optimizer for drag-to-edit.
//!
//! Dragging a shape asks: which constants move this command's anchor onto
//! the pointer? The answer comes from an unconstrained quasi-Newton
//! minimization (BFGS) over the constant vector, with the gradient taken by
//! central differences through the sketch's `draw` and a backtracking
//! (Armijo) line search. The search starts at the current constants, so a
//! small drag only nudges them.

use crate::config::OptimizerConfig;
use kurbo::{Point, Vec2};
use sk_core::{DrawCommand, SketchError};
use sk_render::Registry;
use thiserror::Error;

/// Sufficient-decrease constant of the line search.
const ARMIJO: f64 = 0.1;
/// Smallest line-search step before giving up on a direction.
const MIN_STEP: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("the sketch has no constants to adjust")]
    NoConstants,

    #[error("draw failed: {0}")]
    Draw(#[from] SketchError),

    #[error("draw produced no command #{0}")]
    MissingCommand(usize),

    #[error("`{0}` has no anchor to drag")]
    MissingAnchor(String),

    #[error("objective is not finite")]
    NonFinite,
}

/// A drag gesture in progress: command `id` grabbed at `delta` from its
/// anchor, pointer now at `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragTarget {
    pub id: usize,
    pub delta: Vec2,
    pub target: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
}

/// Constants that bring the dragged anchor closest to the pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub constants: Vec<f64>,
    /// Remaining distance between the anchor (plus grab offset) and the
    /// pointer.
    pub distance: f64,
    pub iterations: usize,
}

/// Solve one drag step. `draw` renders the frame being dragged with trial
/// constants.
pub fn solve_drag<D>(
    draw: D,
    registry: &Registry,
    drag: &DragTarget,
    constants: &[f64],
    config: &OptimizerConfig,
) -> Result<Solution, SolverError>
where
    D: Fn(&[f64]) -> Result<Vec<DrawCommand>, SketchError>,
{
    if constants.is_empty() {
        return Err(SolverError::NoConstants);
    }
    let objective = |x: &[f64]| -> Result<f64, SolverError> {
        let commands = draw(x)?;
        let cmd = commands
            .get(drag.id)
            .ok_or(SolverError::MissingCommand(drag.id))?;
        let anchor = registry
            .anchor(cmd)
            .ok_or_else(|| SolverError::MissingAnchor(cmd.name.clone()))?;
        Ok((anchor + drag.delta - drag.target).hypot2())
    };
    // Squared distance has the same minimizer and a smooth gradient at it.
    let min = minimize(objective, constants, config)?;
    log::trace!(
        "drag #{} solved in {} iterations, {:.3} px off",
        drag.id,
        min.iterations,
        min.value.sqrt()
    );
    Ok(Solution {
        constants: min.x,
        distance: min.value.sqrt(),
        iterations: min.iterations,
    })
}

/// Minimize `f` from `x0` with BFGS.
///
/// Stops once the gradient or the step falls under `config.tolerance`.
/// Errors at the starting point or while differentiating are returned
/// as-is; during the line search a failing or non-finite trial point just
/// shortens the step.
pub fn minimize<F>(mut f: F, x0: &[f64], config: &OptimizerConfig) -> Result<Minimum, SolverError>
where
    F: FnMut(&[f64]) -> Result<f64, SolverError>,
{
    let n = x0.len();
    if n == 0 {
        return Err(SolverError::NoConstants);
    }
    let mut x = x0.to_vec();
    let mut fx = finite(f(&x)?)?;
    let mut g = gradient(&mut f, &x)?;
    let mut h = identity(n);
    let mut iterations = 0;

    while iterations < config.max_iterations {
        if norm(&g) <= config.tolerance {
            break;
        }
        iterations += 1;

        let mut p: Vec<f64> = mat_vec(&h, &g).iter().map(|v| -v).collect();
        let mut slope = dot(&g, &p);
        if slope.is_nan() || slope >= 0.0 {
            h = identity(n);
            p = g.iter().map(|v| -v).collect();
            slope = dot(&g, &p);
        }

        let Some((x_next, f_next)) = line_search(&mut f, &x, fx, &p, slope) else {
            log::trace!("line search stalled after {iterations} iterations");
            break;
        };
        let g_next = gradient(&mut f, &x_next)?;

        let s: Vec<f64> = x_next.iter().zip(&x).map(|(a, b)| a - b).collect();
        let y: Vec<f64> = g_next.iter().zip(&g).map(|(a, b)| a - b).collect();
        bfgs_update(&mut h, &s, &y);

        x = x_next;
        fx = f_next;
        g = g_next;
        if norm(&s) <= config.tolerance * (1.0 + norm(&x)) {
            break;
        }
    }

    Ok(Minimum {
        x,
        value: fx,
        iterations,
    })
}

fn finite(value: f64) -> Result<f64, SolverError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SolverError::NonFinite)
    }
}

/// Backtracking from a unit step until the Armijo condition holds.
fn line_search<F>(f: &mut F, x: &[f64], fx: f64, p: &[f64], slope: f64) -> Option<(Vec<f64>, f64)>
where
    F: FnMut(&[f64]) -> Result<f64, SolverError>,
{
    let mut alpha = 1.0;
    while alpha >= MIN_STEP {
        let trial: Vec<f64> = x.iter().zip(p).map(|(xi, pi)| xi + alpha * pi).collect();
        if let Ok(value) = f(&trial)
            && value.is_finite()
            && value <= fx + ARMIJO * alpha * slope
        {
            return Some((trial, value));
        }
        alpha *= 0.5;
    }
    None
}

/// Central differences with a step scaled to each coordinate.
fn gradient<F>(f: &mut F, x: &[f64]) -> Result<Vec<f64>, SolverError>
where
    F: FnMut(&[f64]) -> Result<f64, SolverError>,
{
    let mut probe = x.to_vec();
    let mut g = Vec::with_capacity(x.len());
    for i in 0..x.len() {
        let h = 1e-3 * x[i].abs().max(1.0);
        probe[i] = x[i] + h;
        let up = finite(f(&probe)?)?;
        probe[i] = x[i] - h;
        let down = finite(f(&probe)?)?;
        probe[i] = x[i];
        g.push((up - down) / (2.0 * h));
    }
    Ok(g)
}

/// Inverse-Hessian update. Skipped when the curvature condition fails.
fn bfgs_update(h: &mut [Vec<f64>], s: &[f64], y: &[f64]) {
    let sy = dot(s, y);
    if sy <= 1e-12 {
        return;
    }
    let hy = mat_vec(h, y);
    let yhy = dot(y, &hy);
    let scale = (sy + yhy) / (sy * sy);
    for (i, row) in h.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell += scale * s[i] * s[j] - (hy[i] * s[j] + s[i] * hy[j]) / sy;
        }
    }
}

fn identity(n: usize) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect()
}

fn mat_vec(m: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    m.iter().map(|row| dot(row, v)).collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}
