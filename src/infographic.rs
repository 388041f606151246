use crate::model::InfographicData;
use crate::reporter::{escape, format_number};
use std::fmt::Write;

pub const EMPTY_INFOGRAPHIC_MESSAGE: &str = "No infographic data available for this article.";

const MARGIN_TOP: f64 = 10.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_BOTTOM: f64 = 40.0;
const MARGIN_LEFT: f64 = 60.0;
const BAND_PADDING: f64 = 0.1;
const BAR_COLOR: &str = "#22d3ee";

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub value: f64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub title: String,
    pub width: f64,
    pub height: f64,
    pub bars: Vec<Bar>,
    /// Y coordinate of the zero line.
    pub baseline: f64,
    /// `(value, y)` gridline positions.
    pub ticks: Vec<(f64, f64)>,
}

/// Lay out one bar per data point, in the order given. `None` when there is
/// nothing to chart.
pub fn layout(data: &InfographicData, width: f64, height: f64) -> Option<BarChart> {
    if data.data.is_empty() {
        return None;
    }

    let plot_left = MARGIN_LEFT;
    let plot_right = width - MARGIN_RIGHT;
    let plot_top = MARGIN_TOP;
    let plot_bottom = height - MARGIN_BOTTOM;

    let min = data.data.iter().map(|d| d.value).fold(0.0, f64::min);
    let max = data.data.iter().map(|d| d.value).fold(0.0, f64::max);
    let (lo, hi, step) = nice_domain(min, max, 5);

    let scale = |value: f64| plot_bottom - (value - lo) / (hi - lo) * (plot_bottom - plot_top);
    let baseline = scale(0.0);

    let band = (plot_right - plot_left) / data.data.len() as f64;
    let bar_width = band * (1.0 - BAND_PADDING);

    let bars = data
        .data
        .iter()
        .enumerate()
        .map(|(i, point)| {
            let top = scale(point.value);
            Bar {
                label: point.label.clone(),
                value: point.value,
                x: plot_left + band * i as f64 + band * BAND_PADDING / 2.0,
                y: top.min(baseline),
                width: bar_width,
                height: (baseline - top).abs(),
            }
        })
        .collect();

    let count = ((hi - lo) / step).round() as usize;
    let ticks = (0..=count)
        .map(|i| {
            let value = lo + step * i as f64;
            (value, scale(value))
        })
        .collect();

    Some(BarChart {
        title: data.title.clone(),
        width,
        height,
        bars,
        baseline,
        ticks,
    })
}

/// Round `[min, max]` outward to multiples of a 1/2/5 step giving roughly
/// `target` intervals.
fn nice_domain(min: f64, max: f64, target: usize) -> (f64, f64, f64) {
    if min == max {
        return (min, min + 1.0, 1.0 / target as f64);
    }
    let raw = (max - min) / target as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = match raw / magnitude {
        r if r <= 1.0 => magnitude,
        r if r <= 2.0 => 2.0 * magnitude,
        r if r <= 5.0 => 5.0 * magnitude,
        _ => 10.0 * magnitude,
    };
    ((min / step).floor() * step, (max / step).ceil() * step, step)
}

pub fn render_svg(chart: &BarChart) -> String {
    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg class="infographic" viewBox="0 0 {w} {h}" width="100%" role="img" aria-label="{title}" xmlns="http://www.w3.org/2000/svg">"#,
        w = format_number(chart.width),
        h = format_number(chart.height),
        title = escape(&chart.title)
    );

    for (value, y) in &chart.ticks {
        let _ = write!(
            svg,
            r##"<line x1="{x1}" x2="{x2}" y1="{y}" y2="{y}" stroke="#475569" stroke-dasharray="3 3"/><text x="{tx}" y="{y}" dy="0.32em" text-anchor="end" fill="#94a3b8" font-size="12">{label}</text>"##,
            x1 = format_number(MARGIN_LEFT),
            x2 = format_number(chart.width - MARGIN_RIGHT),
            y = format_number(*y),
            tx = format_number(MARGIN_LEFT - 8.0),
            label = format_number(*value)
        );
    }

    for bar in &chart.bars {
        let _ = write!(
            svg,
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="{fill}"><title>{label}: {value}</title></rect><text x="{cx}" y="{ly}" text-anchor="middle" fill="{axis}" font-size="12">{label}</text>"#,
            x = format_number(bar.x),
            y = format_number(bar.y),
            w = format_number(bar.width),
            h = format_number(bar.height),
            fill = BAR_COLOR,
            label = escape(&bar.label),
            value = format_number(bar.value),
            cx = format_number(bar.x + bar.width / 2.0),
            ly = format_number(chart.height - MARGIN_BOTTOM + 18.0),
            axis = "#94a3b8"
        );
    }

    let _ = write!(
        svg,
        r##"<line x1="{x1}" x2="{x2}" y1="{y}" y2="{y}" stroke="#94a3b8"/></svg>"##,
        x1 = format_number(MARGIN_LEFT),
        x2 = format_number(chart.width - MARGIN_RIGHT),
        y = format_number(chart.baseline)
    );
    svg
}
