//! services/api/src/web/charts.rs
//!
//! Renders the study log as SVG: a daily bar chart and a cumulative area chart.
//! With no study data there is nothing to draw and the endpoints answer 404.

use crate::web::rest::service_error_response;
use crate::web::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use chrono::NaiveDate;
use plotters::prelude::*;
use std::sync::Arc;
use study_tracker_core::ChartSeries;
use tracing::error;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 400;
const GRID: RGBColor = RGBColor(0x33, 0x33, 0x33);
const MAX_X_LABELS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("Chart rendering failed: {0}")]
    Render(String),
}

fn render_error<E: std::fmt::Display>(e: E) -> ChartError {
    ChartError::Render(e.to_string())
}

/// Labels only whole positions on the index axis.
fn date_label(dates: &[NaiveDate], x: f64) -> String {
    let index = x.round();
    if (x - index).abs() > 1e-6 || index < 0.0 {
        return String::new();
    }
    dates
        .get(index as usize)
        .map(|d| d.format("%m-%d").to_string())
        .unwrap_or_default()
}

fn y_upper(values: &[f64]) -> f64 {
    values.iter().cloned().fold(0.0, f64::max).max(1.0) * 1.1
}

/// Pages read per entry, one bar per row of the sorted log.
pub fn render_daily_chart(series: &ChartSeries) -> Result<String, ChartError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&BLACK).map_err(render_error)?;

        let n = series.daily.len() as f64;
        let mut chart = ChartBuilder::on(&root)
            .caption("Daily Progress", ("sans-serif", 24).into_font().color(&WHITE))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(50)
            .build_cartesian_2d(-0.5f64..n - 0.5, 0f64..y_upper(&series.daily))
            .map_err(render_error)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .bold_line_style(&GRID)
            .light_line_style(&BLACK)
            .axis_style(&WHITE)
            .label_style(("sans-serif", 12).into_font().color(&WHITE))
            .x_labels(series.dates.len().min(MAX_X_LABELS))
            .x_label_formatter(&|x| date_label(&series.dates, *x))
            .draw()
            .map_err(render_error)?;

        chart
            .draw_series(series.daily.iter().enumerate().map(|(i, &pages)| {
                let x = i as f64;
                Rectangle::new([(x - 0.35, 0.0), (x + 0.35, pages)], WHITE.filled())
            }))
            .map_err(render_error)?;

        root.present().map_err(render_error)?;
    }
    Ok(svg)
}

/// Running total of pages, filled down to zero.
pub fn render_cumulative_chart(series: &ChartSeries) -> Result<String, ChartError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&BLACK).map_err(render_error)?;

        let n = series.cumulative.len() as f64;
        let mut chart = ChartBuilder::on(&root)
            .caption("Total Progress", ("sans-serif", 24).into_font().color(&WHITE))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(50)
            .build_cartesian_2d(-0.5f64..n - 0.5, 0f64..y_upper(&series.cumulative))
            .map_err(render_error)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .bold_line_style(&GRID)
            .light_line_style(&BLACK)
            .axis_style(&WHITE)
            .label_style(("sans-serif", 12).into_font().color(&WHITE))
            .x_labels(series.dates.len().min(MAX_X_LABELS))
            .x_label_formatter(&|x| date_label(&series.dates, *x))
            .draw()
            .map_err(render_error)?;

        chart
            .draw_series(
                AreaSeries::new(
                    series
                        .cumulative
                        .iter()
                        .enumerate()
                        .map(|(i, &total)| (i as f64, total)),
                    0.0,
                    WHITE.mix(0.3),
                )
                .border_style(&WHITE),
            )
            .map_err(render_error)?;

        root.present().map_err(render_error)?;
    }
    Ok(svg)
}

//=========================================================================================
// Handlers
//=========================================================================================

async fn chart_response(
    state: &AppState,
    render: fn(&ChartSeries) -> Result<String, ChartError>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut notices = Vec::new();
    let progress = state
        .dashboard
        .load_progress(&mut notices)
        .await
        .map_err(service_error_response)?;

    let series = progress
        .chart_series()
        .ok_or((StatusCode::NOT_FOUND, "No study data to chart yet".to_string()))?;

    let svg = render(&series).map_err(|e| {
        error!("{}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok(([(header::CONTENT_TYPE, "image/svg+xml")], svg))
}

/// GET /charts/daily.svg - Pages per study-log entry.
#[utoipa::path(
    get,
    path = "/charts/daily.svg",
    responses(
        (status = 200, description = "SVG bar chart", content_type = "image/svg+xml"),
        (status = 404, description = "No study data yet")
    )
)]
pub async fn daily_chart_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    chart_response(&state, render_daily_chart).await
}

/// GET /charts/cumulative.svg - Running total of pages.
#[utoipa::path(
    get,
    path = "/charts/cumulative.svg",
    responses(
        (status = 200, description = "SVG area chart", content_type = "image/svg+xml"),
        (status = 404, description = "No study data yet")
    )
)]
pub async fn cumulative_chart_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    chart_response(&state, render_cumulative_chart).await
}
