//! Per-author churn bar chart.

use devpulse_core::services::ChartRenderer;
use devpulse_core::{ChurnTotals, DevpulseError, RenderedImage};

use crate::svg::{Anchor, SvgDocument};

/// Chart title.
pub const CHART_TITLE: &str = "Code Churn by Author";

/// File name of the rendered chart.
pub const CHART_FILENAME: &str = "churn_chart.svg";

const WIDTH: u32 = 1000;
const HEIGHT: u32 = 600;
const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_BOTTOM: f64 = 80.0;
const BAR_FILL: &str = "#87ceeb";

/// Renders churn totals as an SVG bar chart.
///
/// One bar per author in key order, each labelled with its value. The output
/// depends only on the totals passed in.
///
/// # Examples
///
/// ```
/// use devpulse_core::ChurnTotals;
/// use devpulse_core::services::ChartRenderer;
/// use devpulse_render::chart::SvgChartRenderer;
///
/// let totals: ChurnTotals = [("alice".to_string(), 250), ("bob".to_string(), 350)]
///     .into_iter()
///     .collect();
/// let image = SvgChartRenderer.render_churn(&totals).unwrap();
/// let svg = String::from_utf8(image.bytes).unwrap();
/// assert!(svg.contains("Code Churn by Author"));
/// assert!(svg.contains(">350<"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgChartRenderer;

impl ChartRenderer for SvgChartRenderer {
    fn render_churn(&self, churn: &ChurnTotals) -> Result<RenderedImage, DevpulseError> {
        let document = churn_chart_svg(churn);
        tracing::debug!(authors = churn.len(), bytes = document.len(), "rendered churn chart");
        Ok(RenderedImage::svg(CHART_FILENAME, document))
    }
}

/// Build the chart document.
pub fn churn_chart_svg(churn: &ChurnTotals) -> String {
    let mut doc = SvgDocument::new(WIDTH, HEIGHT);
    let plot_width = WIDTH as f64 - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_height = HEIGHT as f64 - MARGIN_TOP - MARGIN_BOTTOM;
    let baseline = MARGIN_TOP + plot_height;

    doc.text(WIDTH as f64 / 2.0, 35.0, 20, Anchor::Middle, CHART_TITLE);
    doc.line((MARGIN_LEFT, MARGIN_TOP), (MARGIN_LEFT, baseline), "black", "");
    doc.line(
        (MARGIN_LEFT, baseline),
        (MARGIN_LEFT + plot_width, baseline),
        "black",
        "",
    );
    doc.text(
        MARGIN_LEFT + plot_width / 2.0,
        HEIGHT as f64 - 20.0,
        14,
        Anchor::Middle,
        "Author",
    );
    doc.rotated_text(25.0, MARGIN_TOP + plot_height / 2.0, 14, -90, "Total Churn");

    if churn.is_empty() {
        doc.text(
            MARGIN_LEFT + plot_width / 2.0,
            MARGIN_TOP + plot_height / 2.0,
            14,
            Anchor::Middle,
            "No churn recorded",
        );
        return doc.finish();
    }

    let max = churn.iter().map(|(_, v)| v).max().unwrap_or(0).max(1) as f64;
    // leave headroom for value labels
    let scale = (plot_height - 24.0) / max;
    let slot = plot_width / churn.len() as f64;
    let bar_width = slot * 0.8;

    for tick in axis_ticks(max) {
        let y = baseline - tick * scale;
        doc.line((MARGIN_LEFT - 5.0, y), (MARGIN_LEFT, y), "black", "");
        doc.text(MARGIN_LEFT - 8.0, y + 4.0, 11, Anchor::End, &format!("{tick}"));
    }

    for (i, (author, value)) in churn.iter().enumerate() {
        let center = MARGIN_LEFT + slot * (i as f64 + 0.5);
        let height = value as f64 * scale;
        doc.rect(center - bar_width / 2.0, baseline - height, bar_width, height, BAR_FILL);
        doc.text(center, baseline - height - 6.0, 12, Anchor::Middle, &value.to_string());
        doc.text(center, baseline + 20.0, 12, Anchor::Middle, author);
    }

    doc.finish()
}

/// Round tick values covering `0..=max`, at most six of them.
fn axis_ticks(max: f64) -> Vec<f64> {
    let raw_step = max / 5.0;
    let magnitude = 10f64.powf(raw_step.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw_step)
        .unwrap_or(10.0 * magnitude)
        .max(1.0);

    let mut ticks = Vec::new();
    let mut value = 0.0;
    while value <= max {
        ticks.push(value);
        value += step;
    }
    ticks
}
