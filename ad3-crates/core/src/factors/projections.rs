//! Euclidean projections onto the simple polytopes used by the closed-form factors.
//!
//! All functions work in place on the point to project.

use std::cmp::Ordering;

use crate::ad3_assert_simple;

/// Clips every coordinate to the unit interval.
pub(crate) fn clip_to_unit_box(values: &mut [f64]) {
    for value in values.iter_mut() {
        *value = value.clamp(0.0, 1.0);
    }
}

fn sorted_descending(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
    sorted
}

/// Projects onto the probability simplex `{x >= 0, sum(x) = 1}` by sorting.
pub(crate) fn project_onto_simplex(values: &mut [f64]) {
    if values.is_empty() {
        return;
    }

    let sorted = sorted_descending(values);

    let mut cumulative = 0.0;
    let mut threshold = 0.0;
    for (index, &value) in sorted.iter().enumerate() {
        cumulative += value;
        let candidate = (cumulative - 1.0) / (index + 1) as f64;
        if value - candidate > 0.0 {
            threshold = candidate;
        } else {
            break;
        }
    }

    for value in values.iter_mut() {
        *value = (*value - threshold).max(0.0);
    }
}

/// Projects onto the capped simplex `{0 <= x <= 1, sum(x) = total}`.
///
/// The projection is `clip(v - tau, 0, 1)` where `tau` solves
/// `sum(clip(v - tau, 0, 1)) = total`; the left-hand side is piecewise linear with breakpoints
/// at `v_i - 1` (coordinate leaves the upper bound) and `v_i` (coordinate hits zero), so `tau` is
/// found by sweeping over the sorted breakpoints.
pub(crate) fn project_onto_capped_simplex(values: &mut [f64], total: f64) {
    let num_values = values.len();
    if num_values == 0 {
        return;
    }
    if total >= num_values as f64 {
        values.iter_mut().for_each(|value| *value = 1.0);
        return;
    }
    if total <= 0.0 {
        values.iter_mut().for_each(|value| *value = 0.0);
        return;
    }

    // (position, value, leaves_upper_bound)
    let mut breakpoints = Vec::with_capacity(2 * num_values);
    for &value in values.iter() {
        breakpoints.push((value - 1.0, value, true));
        breakpoints.push((value, value, false));
    }
    breakpoints.sort_unstable_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut num_saturated = num_values as f64;
    let mut num_linear = 0.0;
    let mut sum_linear = 0.0;
    let mut tau = breakpoints[breakpoints.len() - 1].0;

    for &(position, value, leaves_upper_bound) in breakpoints.iter() {
        let current = num_saturated + sum_linear - num_linear * position;
        if current <= total {
            tau = if num_linear > 0.0 {
                (num_saturated + sum_linear - total) / num_linear
            } else {
                position
            };
            break;
        }

        if leaves_upper_bound {
            num_saturated -= 1.0;
            num_linear += 1.0;
            sum_linear += value;
        } else {
            num_linear -= 1.0;
            sum_linear -= value;
        }
    }

    for value in values.iter_mut() {
        *value = (*value - tau).clamp(0.0, 1.0);
    }
}

/// Projects onto `{0 <= x <= 1, sum(x) <= budget}`.
pub(crate) fn project_onto_budget_polytope(values: &mut [f64], budget: f64) {
    ad3_assert_simple!(budget >= 0.0, "a budget cannot be negative");

    let mut clipped = values.to_vec();
    clip_to_unit_box(&mut clipped);

    if clipped.iter().sum::<f64>() <= budget {
        values.copy_from_slice(&clipped);
    } else {
        project_onto_capped_simplex(values, budget);
    }
}

/// Projects onto `{0 <= x <= 1, sum(x) >= 1}`.
pub(crate) fn project_onto_covering_polytope(values: &mut [f64]) {
    let mut clipped = values.to_vec();
    clip_to_unit_box(&mut clipped);

    if clipped.iter().sum::<f64>() >= 1.0 {
        values.copy_from_slice(&clipped);
    } else {
        project_onto_capped_simplex(values, 1.0);
    }
}

/// Projects `(x, y)` onto the convex hull of `{(x, y) in {0, 1}^(n+1) : y = OR(x)}`, which is
/// `{0 <= x_i <= y <= 1, y <= sum(x)}`.
///
/// First the constraints `x_i <= y` are enforced by pooling the largest inputs with the output
/// and clipping to the box. If `y <= sum(x)` holds afterwards the point is the projection;
/// otherwise the projection lies on the face `y = sum(x)`.
pub(crate) fn project_onto_or_output_polytope(inputs: &mut [f64], output: &mut f64) {
    let original_inputs = inputs.to_vec();
    let original_output = *output;

    let sorted = sorted_descending(inputs);
    let mut pooled_sum = original_output;
    let mut num_pooled = 0;
    let mut pooled_value = original_output;
    while num_pooled < sorted.len() && sorted[num_pooled] > pooled_value {
        pooled_sum += sorted[num_pooled];
        num_pooled += 1;
        pooled_value = pooled_sum / (num_pooled + 1) as f64;
    }

    for input in inputs.iter_mut() {
        *input = input.min(pooled_value).clamp(0.0, 1.0);
    }
    *output = pooled_value.clamp(0.0, 1.0);

    if *output <= inputs.iter().sum::<f64>() + 1e-12 {
        return;
    }

    // On the face y = sum(x) with x >= 0, the stationarity conditions read
    // x_i = max(0, a_i - t) with t = sum(x) - b.
    let mut cumulative = 0.0;
    let mut shift = -original_output;
    for (index, &value) in sorted.iter().enumerate() {
        if value <= shift {
            break;
        }
        cumulative += value;
        shift = (cumulative - original_output) / (index + 2) as f64;
    }

    if shift + original_output <= 1.0 {
        for (input, &original) in inputs.iter_mut().zip(original_inputs.iter()) {
            *input = (original - shift).max(0.0);
        }
        *output = inputs.iter().sum();
    } else {
        inputs.copy_from_slice(&original_inputs);
        project_onto_simplex(inputs);
        *output = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn simplex_projection_of_a_simplex_point_is_the_identity() {
        let mut values = vec![0.2, 0.3, 0.5];
        project_onto_simplex(&mut values);
        assert_close(&values, &[0.2, 0.3, 0.5]);
    }

    #[test]
    fn simplex_projection_shifts_and_truncates() {
        let mut values = vec![2.0, 0.5, -1.0];
        project_onto_simplex(&mut values);
        assert_close(&values, &[1.0, 0.0, 0.0]);

        let mut values = vec![0.8, 0.6, 0.0];
        project_onto_simplex(&mut values);
        assert_close(&values, &[0.6, 0.4, 0.0]);
    }

    #[test]
    fn capped_simplex_saturates_large_coordinates() {
        let mut values = vec![1000.0, 10.0, 1000.0, 10.0, 1000.0];
        project_onto_capped_simplex(&mut values, 3.0);
        assert_close(&values, &[1.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn capped_simplex_matches_the_constraint_total() {
        let mut values = vec![0.9, 0.7, 0.4, -0.3, 1.6];
        project_onto_capped_simplex(&mut values, 2.0);

        assert!((values.iter().sum::<f64>() - 2.0).abs() < 1e-9);
        assert!(values.iter().all(|value| (0.0..=1.0).contains(value)));
        // the order of the coordinates is preserved
        assert!(values[4] >= values[0] && values[0] >= values[1] && values[1] >= values[2]);
    }

    #[test]
    fn capped_simplex_with_total_one_is_the_simplex_projection() {
        let mut capped = vec![0.3, 0.9, -0.2, 0.4];
        let mut simplex = capped.clone();
        project_onto_capped_simplex(&mut capped, 1.0);
        project_onto_simplex(&mut simplex);
        assert_close(&capped, &simplex);
    }

    #[test]
    fn budget_projection_keeps_points_inside_the_budget() {
        let mut values = vec![0.5, 1.3, -0.2];
        project_onto_budget_polytope(&mut values, 2.0);
        assert_close(&values, &[0.5, 1.0, 0.0]);
    }

    #[test]
    fn covering_projection_lifts_points_below_one() {
        let mut values = vec![0.1, 0.3];
        project_onto_covering_polytope(&mut values);
        assert_close(&values, &[0.4, 0.6]);
    }

    #[test]
    fn or_output_projection_keeps_feasible_points() {
        let mut inputs = vec![0.3, 0.4];
        let mut output = 0.5;
        project_onto_or_output_polytope(&mut inputs, &mut output);
        assert_close(&inputs, &[0.3, 0.4]);
        assert!((output - 0.5).abs() < 1e-12);
    }

    #[test]
    fn or_output_projection_pools_inputs_above_the_output() {
        let mut inputs = vec![0.9, 0.1];
        let mut output = 0.3;
        project_onto_or_output_polytope(&mut inputs, &mut output);
        assert_close(&inputs, &[0.6, 0.1]);
        assert!((output - 0.6).abs() < 1e-12);
    }

    #[test]
    fn or_output_projection_moves_to_the_sum_face() {
        let mut inputs = vec![0.1, 0.0];
        let mut output = 0.9;
        project_onto_or_output_polytope(&mut inputs, &mut output);
        // minimise (x1 - 0.1)^2 + x2^2 + (x1 + x2 - 0.9)^2
        assert_close(&inputs, &[0.1 + 0.8 / 3.0, 0.8 / 3.0]);
        assert!((output - (0.1 + 1.6 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn or_output_projection_caps_the_output_at_one() {
        let mut inputs = vec![0.8, 0.1];
        let mut output = 3.0;
        project_onto_or_output_polytope(&mut inputs, &mut output);
        assert_close(&inputs, &[0.85, 0.15]);
        assert!((output - 1.0).abs() < 1e-12);
    }
}
