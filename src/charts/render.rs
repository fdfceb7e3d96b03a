//! Chart rendering for the three aggregation summaries.
//!
//! Each renderer draws one PNG. Callers are expected to skip rendering when a
//! summary came back empty; these functions assume at least one row.

use crate::error::{AppError, Result};
use crate::models::{CityTemperatureAverages, CityWindSummary, FeelsLikeDelta};
use plotters::prelude::*;
use std::fmt;
use std::path::Path;
use tracing::info;

const CHART_SIZE: (u32, u32) = (1280, 720);

fn render_err<E: fmt::Display>(err: E) -> AppError {
    AppError::Render(err.to_string())
}

/// Finds the value range, padded by 10% of the span (or 1.0 for flat data) so
/// points never sit on the chart border.
fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), v| {
        (min.min(v), max.max(v))
    });
    if min > max {
        // No values at all; give the axis something to show.
        return (0.0, 1.0);
    }
    let padding = if (max - min).abs() > 1e-6 {
        (max - min) * 0.1
    } else {
        1.0
    };
    (min - padding, max + padding)
}

/// Draws paired bars of average temperature and average feels-like per city.
pub fn render_temperature_chart(rows: &[CityTemperatureAverages], path: &Path) -> Result<()> {
    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let (lo, hi) = padded_range(
        rows.iter()
            .flat_map(|r| [r.avg_temperature, r.avg_feels_like]),
    );
    // Bars grow from zero, so the axis must include it.
    let lo = lo.min(0.0);

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Average temperature vs feels-like by city",
            ("sans-serif", 40).into_font(),
        )
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..rows.len() as f64, lo..hi)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_labels(rows.len() + 1)
        .x_label_formatter(&|x| {
            let i = x.floor() as usize;
            rows.get(i).map(|r| r.city.clone()).unwrap_or_default()
        })
        .y_desc("°C")
        .light_line_style(BLACK.mix(0.15))
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(rows.iter().enumerate().map(|(i, row)| {
            Rectangle::new(
                [(i as f64 + 0.15, 0.0), (i as f64 + 0.45, row.avg_temperature)],
                RED.filled(),
            )
        }))
        .map_err(render_err)?
        .label("Temperature")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], RED.filled()));

    chart
        .draw_series(rows.iter().enumerate().map(|(i, row)| {
            Rectangle::new(
                [(i as f64 + 0.55, 0.0), (i as f64 + 0.85, row.avg_feels_like)],
                BLUE.filled(),
            )
        }))
        .map_err(render_err)?
        .label("Feels like")
        .legend(|(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], BLUE.filled()));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    info!("Wrote temperature chart to {}", path.display());
    Ok(())
}

/// Draws average wind speed per city as points, annotated with the prevailing
/// wind direction.
pub fn render_wind_chart(rows: &[CityWindSummary], path: &Path) -> Result<()> {
    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let (_, hi) = padded_range(rows.iter().map(|r| r.avg_wind_speed));
    // Speeds are non-negative; anchor the axis at zero.
    let label_offset = hi * 0.04;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Average wind speed and prevailing direction by city",
            ("sans-serif", 40).into_font(),
        )
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..rows.len() as f64, 0f64..hi + label_offset)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_labels(rows.len() + 1)
        .x_label_formatter(&|x| {
            let i = x.floor() as usize;
            rows.get(i).map(|r| r.city.clone()).unwrap_or_default()
        })
        .y_desc("km/h")
        .light_line_style(BLACK.mix(0.15))
        .draw()
        .map_err(render_err)?;

    chart
        .draw_series(rows.iter().enumerate().map(|(i, row)| {
            Circle::new((i as f64 + 0.5, row.avg_wind_speed), 6, BLUE.filled())
        }))
        .map_err(render_err)?;

    chart
        .draw_series(rows.iter().enumerate().map(|(i, row)| {
            Text::new(
                row.prevailing_direction.clone(),
                (i as f64 + 0.42, row.avg_wind_speed + label_offset),
                ("sans-serif", 18).into_font(),
            )
        }))
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    info!("Wrote wind chart to {}", path.display());
    Ok(())
}

/// Groups delta rows into per-city point sets, preserving the incoming city
/// order. Rows arrive already sorted by city name.
fn delta_points(rows: &[FeelsLikeDelta]) -> Vec<(&str, Vec<(f64, f64)>)> {
    let mut by_city: Vec<(&str, Vec<(f64, f64)>)> = Vec::new();
    for row in rows {
        let point = (row.temperature_delta, row.humidity as f64);
        match by_city.last_mut() {
            Some((city, points)) if *city == row.city => points.push(point),
            _ => by_city.push((row.city.as_str(), vec![point])),
        }
    }
    by_city
}

/// Draws recent temperature-minus-feels-like deltas against humidity, one
/// color per city.
pub fn render_delta_chart(rows: &[FeelsLikeDelta], path: &Path) -> Result<()> {
    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_err)?;

    let (x_lo, x_hi) = padded_range(rows.iter().map(|r| r.temperature_delta));
    let (y_lo, y_hi) = padded_range(rows.iter().map(|r| r.humidity as f64));

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Temperature minus feels-like vs humidity (recent readings)",
            ("sans-serif", 40).into_font(),
        )
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
        .map_err(render_err)?;

    chart
        .configure_mesh()
        .x_desc("Temperature - feels like (°C)")
        .y_desc("Humidity (%)")
        .light_line_style(BLACK.mix(0.15))
        .draw()
        .map_err(render_err)?;

    for (idx, (city, points)) in delta_points(rows).into_iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        chart
            .draw_series(
                points
                    .into_iter()
                    .map(move |(x, y)| Circle::new((x, y), 4, color.filled())),
            )
            .map_err(render_err)?
            .label(city)
            .legend(move |(x, y)| Circle::new((x + 10, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(render_err)?;

    root.present().map_err(render_err)?;
    info!("Wrote feels-like delta chart to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn padded_range_pads_by_ten_percent() {
        let (lo, hi) = padded_range([10.0, 20.0].into_iter());
        assert!((lo - 9.0).abs() < 1e-9);
        assert!((hi - 21.0).abs() < 1e-9);
    }

    #[test]
    fn padded_range_handles_flat_and_empty_input() {
        let (lo, hi) = padded_range([5.0, 5.0].into_iter());
        assert!((lo - 4.0).abs() < 1e-9);
        assert!((hi - 6.0).abs() < 1e-9);

        let (lo, hi) = padded_range(std::iter::empty());
        assert!((lo - 0.0).abs() < 1e-9);
        assert!((hi - 1.0).abs() < 1e-9);
    }

    #[test]
    fn delta_points_groups_consecutive_city_rows() {
        let now = Utc::now();
        let row = |city: &str, delta: f64, humidity: i32| FeelsLikeDelta {
            city: city.to_string(),
            temperature_delta: delta,
            humidity,
            timestamp: now,
        };
        let rows = vec![
            row("London", 3.0, 85),
            row("London", 2.5, 80),
            row("Paris", -0.5, 60),
        ];

        let grouped = delta_points(&rows);
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].0, "London");
        assert_eq!(grouped[0].1.len(), 2);
        assert_eq!(grouped[1].0, "Paris");
        assert_eq!(grouped[1].1, vec![(-0.5, 60.0)]);
    }
}
