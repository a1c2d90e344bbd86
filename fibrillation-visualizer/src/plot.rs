use anyhow::Result;
use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use std::path::Path;

/// Axis ranges covering the whole activity series; never empty.
pub fn activity_ranges(activity: &[u64]) -> (std::ops::Range<u64>, std::ops::Range<u64>) {
    let steps = activity.len().max(1) as u64;
    let max_active = activity.iter().copied().max().unwrap_or(0);
    (0..steps + 1, 0..max_active + max_active / 10 + 1)
}

/// Plots the number of excited interior cells against the step number.
pub fn plot_activity(path: &Path, activity: &[u64], size: (u32, u32)) -> Result<()> {
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let (x_range, y_range) = activity_ranges(activity);
    let mut chart = ChartBuilder::on(&root)
        .caption("Excited interior cells", ("sans-serif", 22))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(x_range, y_range)?;

    chart
        .configure_mesh()
        .x_desc("Step")
        .y_desc("Active cells")
        .draw()?;

    chart.draw_series(LineSeries::new(
        activity.iter().enumerate().map(|(i, &a)| (i as u64 + 1, a)),
        &BLUE,
    ))?;

    root.present()?;
    Ok(())
}
