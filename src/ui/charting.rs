/// Chart points for response times: x is the answer number, y the seconds it took
pub fn response_points(response_times: &[f64]) -> Vec<(f64, f64)> {
    response_times
        .iter()
        .enumerate()
        .map(|(i, secs)| ((i + 1) as f64, *secs))
        .collect()
}

/// Compute X (answers) and Y (seconds) bounds for the summary chart
pub fn compute_chart_params(points: &[(f64, f64)]) -> (f64, f64) {
    let slowest = points.iter().map(|&(_, secs)| secs).fold(0.0, f64::max);
    let answers = points.last().map_or(1.0, |p| p.0).max(1.0);

    // leave a little headroom above the slowest answer
    (answers, (slowest * 1.2).max(1.0))
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.2}")
    }
}
