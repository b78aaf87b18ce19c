// ============================================================
// Layer 6 — Console Report
// ============================================================
// Formats a (validation, test) pair of metric vectors for stdout,
// one line per horizon, validation value first:
//
//   MAPE  5.123%,  6.020%; MAE  1.234, 1.400; RMSE  2.345,  2.501.
//   MAPE  7.900%,  8.112%; MAE  1.870, 1.932; RMSE  3.010,  3.221.
//   Total RMSE: val  5.355, test  5.722
//
// MAPE is printed as a percentage (ratio x 100).

use crate::domain::metrics::{HorizonMetrics, MetricVector};

fn percent(ratio: f64) -> String {
    format!("{:>7}", format!("{:.3}%", ratio * 100.0))
}

/// One horizon of a (val, test) pair.
pub fn horizon_line(val: HorizonMetrics, test: HorizonMetrics) -> String {
    format!(
        "MAPE {}, {}; MAE  {:4.3}, {:4.3}; RMSE {:6.3}, {:6.3}.",
        percent(val.mape),
        percent(test.mape),
        val.mae,
        test.mae,
        val.rmse,
        test.rmse,
    )
}

/// Summed RMSE of both vectors.
pub fn summary_line(val: &MetricVector, test: &MetricVector) -> String {
    format!("Total RMSE: val {:6.3}, test {:6.3}", val.rmse_sum(), test.rmse_sum())
}

/// All horizon lines followed by the summary line.
pub fn format_block(val: &MetricVector, test: &MetricVector) -> Vec<String> {
    val.horizons()
        .zip(test.horizons())
        .map(|(v, t)| horizon_line(v, t))
        .chain(std::iter::once(summary_line(val, test)))
        .collect()
}

/// Print `title` and the block below it.
pub fn print_block(title: &str, val: &MetricVector, test: &MetricVector) {
    println!("{title}");
    for line in format_block(val, test) {
        println!("{line}");
    }
}
