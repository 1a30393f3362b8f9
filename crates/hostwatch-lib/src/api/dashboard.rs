//! Server-rendered dashboard page
//!
//! Draws the latest sample as an inline SVG bar chart, one bar per metric
//! on a fixed 0-100% axis.

use std::fmt::Write;

use crate::models::{Metric, Sample};

const CHART_TITLE: &str = "System Resource Usage";
const AXIS_LABEL: &str = "Usage (%)";

const WIDTH: f64 = 560.0;
const HEIGHT: f64 = 360.0;
const MARGIN_LEFT: f64 = 70.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 50.0;
const BAR_WIDTH: f64 = 90.0;
const BAR_COLOR: &str = "#636efa";

/// Full HTML page for a sample
pub fn render_dashboard(sample: &Sample) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <meta http-equiv=\"refresh\" content=\"5\">\n<title>{title}</title>\n</head>\n\
         <body>\n{chart}\n<p>Captured at {at}</p>\n</body>\n</html>\n",
        title = CHART_TITLE,
        chart = render_chart(sample),
        at = sample.captured_at.to_rfc3339(),
    )
}

/// Page served before the first sample is published
pub fn render_unavailable() -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <meta http-equiv=\"refresh\" content=\"5\">\n<title>{CHART_TITLE}</title>\n</head>\n\
         <body>\n<p>No sample available yet.</p>\n</body>\n</html>\n"
    )
}

fn render_chart(sample: &Sample) -> String {
    let plot_height = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let baseline = HEIGHT - MARGIN_BOTTOM;
    let slot = (WIDTH - MARGIN_LEFT) / Metric::ALL.len() as f64;

    let mut svg = String::new();
    // Writing into a String cannot fail
    let _ = write!(
        svg,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{HEIGHT}\" \
         role=\"img\" aria-label=\"{CHART_TITLE}\">\n\
         <text x=\"{x}\" y=\"28\" text-anchor=\"middle\" font-size=\"18\">{CHART_TITLE}</text>\n\
         <text x=\"18\" y=\"{y}\" text-anchor=\"middle\" font-size=\"13\" \
         transform=\"rotate(-90 18 {y})\">{AXIS_LABEL}</text>\n",
        x = WIDTH / 2.0,
        y = MARGIN_TOP + plot_height / 2.0,
    );

    for tick in (0..=100).step_by(25) {
        let y = baseline - plot_height * f64::from(tick) / 100.0;
        let _ = writeln!(
            svg,
            "<line x1=\"{MARGIN_LEFT}\" y1=\"{y:.1}\" x2=\"{WIDTH}\" y2=\"{y:.1}\" stroke=\"#e5ecf6\"/>\
             <text x=\"{lx}\" y=\"{ty:.1}\" text-anchor=\"end\" font-size=\"11\">{tick}</text>",
            lx = MARGIN_LEFT - 6.0,
            ty = y + 4.0,
        );
    }

    for (i, metric) in Metric::ALL.iter().enumerate() {
        let value = sample.value(*metric);
        let bar_height = plot_height * value.clamp(0.0, 100.0) / 100.0;
        let center = MARGIN_LEFT + slot * (i as f64 + 0.5);
        let _ = writeln!(
            svg,
            "<rect x=\"{x:.1}\" y=\"{y:.1}\" width=\"{BAR_WIDTH}\" height=\"{bar_height:.1}\" fill=\"{BAR_COLOR}\">\
             <title>{label} Usage: {value:.1}%</title></rect>\
             <text x=\"{center:.1}\" y=\"{vy:.1}\" text-anchor=\"middle\" font-size=\"12\">{value:.1}%</text>\
             <text x=\"{center:.1}\" y=\"{ly:.1}\" text-anchor=\"middle\" font-size=\"13\">{label} Usage</text>",
            x = center - BAR_WIDTH / 2.0,
            y = baseline - bar_height,
            label = metric.label(),
            vy = baseline - bar_height - 6.0,
            ly = baseline + 20.0,
        );
    }

    svg.push_str("</svg>");
    svg
}
