use std::fmt::Write;

use safewatch_core::ChartPoint;
use yansi::Paint;

/// Plain text table of chart points, one line per point.
pub fn table(points: &[ChartPoint]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<24} {:<10} {:>24} {:>24} {:>6}",
        "date", "time", "balance", "change", "count"
    );

    for point in points {
        let change = format!("{:+.6}", point.change);
        let change = if point.change < 0.0 {
            Paint::red(change)
        } else {
            Paint::green(change)
        };
        let _ = writeln!(
            out,
            "{:<24} {:<10} {:>24.6} {:>24} {:>6}",
            point.date, point.time, point.balance, change, point.count
        );
    }
    out
}
