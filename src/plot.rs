//! Static PNG rendering: forecast overlays, the closing-prices overview and
//! the close-correlation heatmap. Presentation only, nothing downstream
//! reads these files.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;

const PLOT_SIZE: (u32, u32) = (1400, 700);
const HEATMAP_SIZE: (u32, u32) = (900, 780);

/// One labelled line on a forecast chart.
pub struct Series<'a> {
    pub label: &'a str,
    pub color: RGBColor,
    pub dates: &'a [NaiveDate],
    pub values: &'a [f64],
}

pub const TRAIN_COLOR: RGBColor = BLUE;
pub const TEST_COLOR: RGBColor = BLACK;
pub const ARIMA_COLOR: RGBColor = RED;
pub const PROPHET_COLOR: RGBColor = GREEN;
pub const SARIMA_COLOR: RGBColor = MAGENTA;
pub const LSTM_COLOR: RGBColor = RGBColor(255, 165, 0);

/// Train/test/forecast overlay, one image per (ticker, horizon).
pub fn forecast_plot(path: &Path, title: &str, series_list: &[Series<'_>]) -> Result<()> {
    draw_lines(path, title, PLOT_SIZE, series_list)
        .map_err(|e| anyhow!("failed to render {}: {e}", path.display()))
}

/// All tickers' Close series on one chart.
pub fn closing_prices_plot(path: &Path, per_ticker: &[(String, Vec<(NaiveDate, f64)>)]) -> Result<()> {
    let series: Vec<(String, RGBColor, &[(NaiveDate, f64)])> = per_ticker
        .iter()
        .enumerate()
        .map(|(i, (ticker, points))| {
            let color = Palette99::pick(i).to_rgba();
            (
                ticker.clone(),
                RGBColor(color.0, color.1, color.2),
                points.as_slice(),
            )
        })
        .collect();
    draw_point_lines(path, "Closing Prices of All Stocks", PLOT_SIZE, &series)
        .map_err(|e| anyhow!("failed to render {}: {e}", path.display()))
}

/// Pairwise close-price correlation, diverging blue/white/red cells with the
/// coefficient printed in each.
pub fn correlation_heatmap(path: &Path, tickers: &[String], matrix: &[Vec<f64>]) -> Result<()> {
    draw_heatmap(path, tickers, matrix)
        .map_err(|e| anyhow!("failed to render {}: {e}", path.display()))
}

fn date_value_bounds(
    series: impl Iterator<Item = (NaiveDate, f64)>,
) -> Option<(NaiveDate, NaiveDate, f64, f64)> {
    let mut bounds: Option<(NaiveDate, NaiveDate, f64, f64)> = None;
    for (date, value) in series {
        if !value.is_finite() {
            continue;
        }
        bounds = Some(match bounds {
            None => (date, date, value, value),
            Some((d0, d1, v0, v1)) => (d0.min(date), d1.max(date), v0.min(value), v1.max(value)),
        });
    }
    bounds
}

fn pad_range(min: f64, max: f64) -> (f64, f64) {
    let span = max - min;
    if span.abs() < f64::EPSILON {
        (min - 1.0, max + 1.0)
    } else {
        (min - 0.05 * span, max + 0.05 * span)
    }
}

fn draw_lines(
    path: &Path,
    title: &str,
    size: (u32, u32),
    series_list: &[Series<'_>],
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let points = series_list
        .iter()
        .flat_map(|s| s.dates.iter().copied().zip(s.values.iter().copied()));
    let Some((d0, d1, v0, v1)) = date_value_bounds(points) else {
        return Err("nothing to plot".into());
    };
    let (lo, hi) = pad_range(v0, v1);

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(16)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(d0..d1, lo..hi)?;
    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Close Price")
        .draw()?;

    for series in series_list {
        let color = series.color;
        chart
            .draw_series(LineSeries::new(
                series
                    .dates
                    .iter()
                    .copied()
                    .zip(series.values.iter().copied())
                    .filter(|(_, v)| v.is_finite()),
                &color,
            ))?
            .label(series.label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], color));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

fn draw_point_lines(
    path: &Path,
    title: &str,
    size: (u32, u32),
    series_list: &[(String, RGBColor, &[(NaiveDate, f64)])],
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let points = series_list
        .iter()
        .flat_map(|(_, _, pts)| pts.iter().copied());
    let Some((d0, d1, v0, v1)) = date_value_bounds(points) else {
        return Err("nothing to plot".into());
    };
    let (lo, hi) = pad_range(v0, v1);

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(16)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(d0..d1, lo..hi)?;
    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Close Price")
        .draw()?;

    for (label, color, pts) in series_list {
        let color = *color;
        chart
            .draw_series(LineSeries::new(pts.iter().copied(), &color))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], color));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Diverging colormap for correlations in [-1, 1].
fn correlation_color(value: f64) -> RGBColor {
    let v = value.clamp(-1.0, 1.0);
    let lerp = |a: u8, b: u8, t: f64| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    if v < 0.0 {
        let t = v + 1.0; // -1 -> 0, 0 -> 1
        RGBColor(lerp(59, 221, t), lerp(76, 221, t), lerp(192, 221, t))
    } else {
        RGBColor(lerp(221, 180, v), lerp(221, 4, v), lerp(221, 38, v))
    }
}

fn draw_heatmap(
    path: &Path,
    tickers: &[String],
    matrix: &[Vec<f64>],
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let n = tickers.len();
    if n == 0 {
        return Err("nothing to plot".into());
    }
    let root = BitMapBackend::new(path, HEATMAP_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Correlation of Closing Prices", ("sans-serif", 28))
        .margin(16)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..n as f64, 0f64..n as f64)?;

    let label_for = |v: &f64| -> String {
        let idx = v.floor() as usize;
        // Ticks land on cell edges; name the cell to the right/above.
        if (v - v.floor()).abs() < 1e-9 && idx < n {
            tickers[idx].clone()
        } else {
            String::new()
        }
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_labels(n)
        .y_labels(n)
        .x_label_formatter(&label_for)
        .y_label_formatter(&label_for)
        .draw()?;

    let text_style = ("sans-serif", 15)
        .into_font()
        .color(&BLACK)
        .pos(Pos::new(HPos::Center, VPos::Center));
    for (j, row) in matrix.iter().enumerate() {
        for (i, &value) in row.iter().enumerate() {
            let color = if value.is_finite() {
                correlation_color(value)
            } else {
                RGBColor(240, 240, 240)
            };
            chart.draw_series(std::iter::once(Rectangle::new(
                [(i as f64, j as f64), (i as f64 + 1.0, j as f64 + 1.0)],
                color.filled(),
            )))?;
            let label = if value.is_finite() {
                format!("{value:.2}")
            } else {
                "--".to_string()
            };
            chart.draw_series(std::iter::once(Text::new(
                label,
                (i as f64 + 0.5, j as f64 + 0.5),
                text_style.clone(),
            )))?;
        }
    }
    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_colors_diverge() {
        assert_eq!(correlation_color(1.0), RGBColor(180, 4, 38));
        assert_eq!(correlation_color(-1.0), RGBColor(59, 76, 192));
        assert_eq!(correlation_color(0.0), RGBColor(221, 221, 221));
    }

    #[test]
    fn flat_ranges_get_padded() {
        let (lo, hi) = pad_range(100.0, 100.0);
        assert!(lo < 100.0 && hi > 100.0);
    }
}
