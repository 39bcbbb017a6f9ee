use ndarray::{ArrayView1, ArrayViewMut1, Zip};

/// Index of the largest value; ties go to the lowest index.
///
/// NaN entries never win. Returns `None` for an empty slice.
#[inline]
pub fn argmax(values: ArrayView1<'_, f64>) -> Option<usize> {
    let mut best = None;
    let mut best_value = f64::NEG_INFINITY;
    for (i, &x) in values.iter().enumerate() {
        if x.is_nan() {
            continue;
        }
        if best.is_none() || x > best_value {
            best = Some(i);
            best_value = x;
        }
    }
    best
}

/// `ln(Σ exp(v))` evaluated around the maximum so that large magnitudes
/// neither overflow nor underflow.
pub fn log_sum_exp(values: ArrayView1<'_, f64>) -> f64 {
    let max = values.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
    if !max.is_finite() {
        return max;
    }
    let sum = values.fold(0.0, |acc, &v| acc + (v - max).exp());
    max + sum.ln()
}

/// Writes `exp(v - logsumexp(v))` into `out`.
///
/// When every entry is `-inf` there is nothing to normalize and `out` is
/// set to the uniform distribution.
pub fn normalize_log_probabilities(values: ArrayView1<'_, f64>, mut out: ArrayViewMut1<'_, f64>) {
    let lse = log_sum_exp(values);
    if lse == f64::NEG_INFINITY {
        let uniform = if values.is_empty() {
            0.0
        } else {
            1.0 / values.len() as f64
        };
        out.fill(uniform);
        return;
    }
    Zip::from(&mut out)
        .and(&values)
        .for_each(|p, &v| *p = (v - lse).exp().clamp(0.0, 1.0));
}
