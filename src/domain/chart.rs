// Declarative chart configuration handed to the rendering surface
use super::series::MetricKind;
use super::time_range::TimeRange;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawStyle {
    Bars,
    Line,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisConfig {
    pub label: Option<String>,
    pub unit: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesStyle {
    pub draw_style: DrawStyle,
    pub color: String,
    pub fill_opacity: u8,
    pub line_width: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartConfig {
    pub metric: MetricKind,
    pub x_axis: AxisConfig,
    pub y_axis: AxisConfig,
    pub series: SeriesStyle,
    pub loading_overlay_color: String,
}

impl ChartConfig {
    pub fn for_metric(metric: MetricKind, visible: TimeRange) -> Self {
        let x_axis = AxisConfig {
            label: None,
            unit: Some("time".to_string()),
            min: Some(visible.from as f64),
            max: Some(visible.to as f64),
        };
        let y_axis = AxisConfig {
            label: Some(metric.as_str().to_string()),
            unit: Some(y_unit(metric).to_string()),
            min: Some(0.0),
            max: None,
        };

        Self {
            metric,
            x_axis,
            y_axis,
            series: series_style(metric),
            loading_overlay_color: "rgba(120, 120, 130, 0.15)".to_string(),
        }
    }
}

fn y_unit(metric: MetricKind) -> &'static str {
    match metric {
        MetricKind::Rate => "reqps",
        MetricKind::Errors => "reqps",
        MetricKind::Duration => "s",
    }
}

fn series_style(metric: MetricKind) -> SeriesStyle {
    match metric {
        MetricKind::Rate => SeriesStyle {
            draw_style: DrawStyle::Bars,
            color: "green".to_string(),
            fill_opacity: 100,
            line_width: 0,
        },
        MetricKind::Errors => SeriesStyle {
            draw_style: DrawStyle::Bars,
            color: "semi-dark-red".to_string(),
            fill_opacity: 100,
            line_width: 0,
        },
        MetricKind::Duration => SeriesStyle {
            draw_style: DrawStyle::Line,
            color: "blue".to_string(),
            fill_opacity: 10,
            line_width: 1,
        },
    }
}
