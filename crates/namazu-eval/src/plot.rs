//! SVG figures for test results and comparisons
//!
//! Figures are built as plain SVG text, one horizontal row per result:
//! the reference band as a thick line, the observed statistic as a marker.
//! Rasterization and report assembly live in [`crate::report`].

use std::fs;
use std::path::Path;

use crate::error::{EvalError, EvalResult};
use crate::results::{
    ComparisonOutcome, ComparisonResult, Quantile, ReferenceDistribution, TestResult,
};

const MARGIN_LEFT: f64 = 150.0;
const MARGIN_RIGHT: f64 = 25.0;
const MARGIN_TOP: f64 = 45.0;
const MARGIN_BOTTOM: f64 = 45.0;

const COLOR_PASS: &str = "#2a9d4e";
const COLOR_FAIL: &str = "#d33636";
const COLOR_NEUTRAL: &str = "#8a8a8a";
const COLOR_AXIS: &str = "#333333";

/// Presentation knobs shared by both figure kinds.
#[derive(Debug, Clone)]
pub struct FigureOptions {
    pub title: Option<String>,
    /// Draw only the lower side of each interval, for one-sided tests.
    pub one_sided_lower: bool,
    /// Width and height in pixels.
    pub figure_size: (u32, u32),
}

impl Default for FigureOptions {
    fn default() -> Self {
        Self {
            title: None,
            one_sided_lower: false,
            figure_size: (640, 400),
        }
    }
}

/// Horizontal interval plot of paired-comparison results.
pub struct ComparisonFigure {
    results: Vec<ComparisonResult>,
}

impl ComparisonFigure {
    pub fn new(results: Vec<ComparisonResult>) -> EvalResult<Self> {
        if results.is_empty() {
            return Err(EvalError::Report("no comparisons to draw".to_string()));
        }
        Ok(Self { results })
    }

    pub fn render(&self, options: &FigureOptions) -> String {
        let rows: Vec<FigureRow> = self
            .results
            .iter()
            .map(|r| FigureRow {
                label: r.candidate.clone(),
                band: (r.gain_lower, r.gain_upper),
                marker: r.information_gain,
                color: match r.outcome {
                    ComparisonOutcome::CandidateFavored => COLOR_PASS,
                    ComparisonOutcome::BaselineFavored => COLOR_FAIL,
                    ComparisonOutcome::Indistinguishable => COLOR_NEUTRAL,
                },
            })
            .collect();
        render_rows(
            &rows,
            options,
            "information gain per event",
            Some(0.0),
        )
    }

    pub fn write_svg(&self, path: &Path, options: &FigureOptions) -> EvalResult<()> {
        let svg = self.render(options);
        fs::write(path, svg).map_err(|e| EvalError::io(path, e))
    }
}

/// Horizontal interval plot of consistency-test results.
///
/// The band covers the central part of each reference distribution at the
/// given significance; the marker is the observed statistic.
pub struct ConsistencyFigure {
    results: Vec<TestResult>,
    alpha: f64,
}

impl ConsistencyFigure {
    pub fn new(results: Vec<TestResult>, alpha: f64) -> EvalResult<Self> {
        if results.is_empty() {
            return Err(EvalError::Report("no results to draw".to_string()));
        }
        Ok(Self { results, alpha })
    }

    pub fn render(&self, options: &FigureOptions) -> String {
        let rows: Vec<FigureRow> = self
            .results
            .iter()
            .map(|r| FigureRow {
                label: format!("{} {}", r.test_name, r.forecast),
                band: reference_band(&r.distribution, &r.quantile, self.alpha),
                marker: r.observed_statistic,
                color: if r.is_consistent(self.alpha) {
                    COLOR_PASS
                } else {
                    COLOR_FAIL
                },
            })
            .collect();
        render_rows(&rows, options, "test statistic", None)
    }

    pub fn write_svg(&self, path: &Path, options: &FigureOptions) -> EvalResult<()> {
        let svg = self.render(options);
        fs::write(path, svg).map_err(|e| EvalError::io(path, e))
    }
}

struct FigureRow {
    label: String,
    band: (f64, f64),
    marker: f64,
    color: &'static str,
}

fn reference_band(
    distribution: &ReferenceDistribution,
    quantile: &Quantile,
    alpha: f64,
) -> (f64, f64) {
    match distribution {
        // normal approximation to the central Poisson band
        ReferenceDistribution::Poisson { rate } => {
            let half = 1.96 * rate.sqrt();
            ((rate - half).max(0.0), rate + half)
        }
        ReferenceDistribution::Empirical { samples } => {
            let mut sorted = samples.clone();
            sorted.sort_by(|a, b| a.total_cmp(b));
            match quantile {
                Quantile::TwoSided { .. } => (
                    empirical_quantile(&sorted, alpha / 2.0),
                    empirical_quantile(&sorted, 1.0 - alpha / 2.0),
                ),
                Quantile::OneSided { .. } => (
                    empirical_quantile(&sorted, alpha),
                    sorted.last().copied().unwrap_or(0.0),
                ),
            }
        }
    }
}

fn empirical_quantile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
    sorted[idx]
}

fn render_rows(
    rows: &[FigureRow],
    options: &FigureOptions,
    axis_label: &str,
    zero_line: Option<f64>,
) -> String {
    let (width, height) = options.figure_size;
    let (width, height) = (width.max(200) as f64, height.max(150) as f64);

    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for row in rows {
        lo = lo.min(row.band.0).min(row.marker);
        hi = hi.max(row.band.1).max(row.marker);
    }
    if let Some(z) = zero_line {
        lo = lo.min(z);
        hi = hi.max(z);
    }
    let scale = LinearScale::new(lo, hi, MARGIN_LEFT, width - MARGIN_RIGHT);

    let mut svg = Svg::new(width, height);
    if let Some(title) = &options.title {
        svg.text(width / 2.0, 24.0, "middle", 16, title);
    }

    let plot_height = height - MARGIN_TOP - MARGIN_BOTTOM;
    let row_step = plot_height / rows.len() as f64;

    for (i, row) in rows.iter().enumerate() {
        let y = MARGIN_TOP + row_step * (i as f64 + 0.5);
        let x_lo = scale.px(row.band.0);
        let x_hi = scale.px(row.band.1);
        let x_marker = scale.px(row.marker);

        if options.one_sided_lower {
            // unbounded above: draw the lower whisker only
            svg.line(x_lo, y, x_marker, y, row.color, 3.0);
            svg.line(x_lo, y - 6.0, x_lo, y + 6.0, row.color, 2.0);
        } else {
            svg.line(x_lo, y, x_hi, y, row.color, 3.0);
            svg.line(x_lo, y - 6.0, x_lo, y + 6.0, row.color, 2.0);
            svg.line(x_hi, y - 6.0, x_hi, y + 6.0, row.color, 2.0);
        }
        svg.circle(x_marker, y, 5.0, row.color);
        svg.text(MARGIN_LEFT - 10.0, y + 4.0, "end", 12, &row.label);
    }

    let axis_y = height - MARGIN_BOTTOM;
    svg.line(MARGIN_LEFT, axis_y, width - MARGIN_RIGHT, axis_y, COLOR_AXIS, 1.0);
    for tick in scale.ticks(5) {
        let x = scale.px(tick);
        svg.line(x, axis_y, x, axis_y + 5.0, COLOR_AXIS, 1.0);
        svg.text(x, axis_y + 18.0, "middle", 11, &format_tick(tick));
    }
    svg.text(
        (MARGIN_LEFT + width - MARGIN_RIGHT) / 2.0,
        height - 8.0,
        "middle",
        12,
        axis_label,
    );

    if let Some(z) = zero_line {
        let x = scale.px(z);
        svg.dashed_line(x, MARGIN_TOP, x, axis_y, COLOR_AXIS);
    }

    svg.finish()
}

fn format_tick(value: f64) -> String {
    if value == 0.0 || (value.abs() >= 0.01 && value.abs() < 10_000.0) {
        format!("{value:.2}")
    } else {
        format!("{value:.2e}")
    }
}

struct LinearScale {
    lo: f64,
    hi: f64,
    px_lo: f64,
    px_hi: f64,
}

impl LinearScale {
    fn new(lo: f64, hi: f64, px_lo: f64, px_hi: f64) -> Self {
        let span = (hi - lo).max(1e-6);
        let pad = span * 0.05;
        Self {
            lo: lo - pad,
            hi: hi + pad,
            px_lo,
            px_hi,
        }
    }

    fn px(&self, x: f64) -> f64 {
        let t = (x - self.lo) / (self.hi - self.lo);
        self.px_lo + t * (self.px_hi - self.px_lo)
    }

    fn ticks(&self, n: usize) -> Vec<f64> {
        let step = (self.hi - self.lo) / (n.max(2) - 1) as f64;
        (0..n.max(2)).map(|i| self.lo + step * i as f64).collect()
    }
}

struct Svg {
    body: String,
}

impl Svg {
    fn new(width: f64, height: f64) -> Self {
        let mut body = String::with_capacity(4096);
        body.push_str(&format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.0}\" \
             height=\"{height:.0}\" viewBox=\"0 0 {width:.0} {height:.0}\" \
             font-family=\"sans-serif\">\n"
        ));
        body.push_str(&format!(
            "  <rect width=\"{width:.0}\" height=\"{height:.0}\" fill=\"white\"/>\n"
        ));
        Self { body }
    }

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, stroke: &str, width: f64) {
        self.body.push_str(&format!(
            "  <line x1=\"{x1:.1}\" y1=\"{y1:.1}\" x2=\"{x2:.1}\" y2=\"{y2:.1}\" \
             stroke=\"{stroke}\" stroke-width=\"{width}\"/>\n"
        ));
    }

    fn dashed_line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, stroke: &str) {
        self.body.push_str(&format!(
            "  <line x1=\"{x1:.1}\" y1=\"{y1:.1}\" x2=\"{x2:.1}\" y2=\"{y2:.1}\" \
             stroke=\"{stroke}\" stroke-width=\"1\" stroke-dasharray=\"4 3\"/>\n"
        ));
    }

    fn circle(&mut self, cx: f64, cy: f64, r: f64, fill: &str) {
        self.body.push_str(&format!(
            "  <circle cx=\"{cx:.1}\" cy=\"{cy:.1}\" r=\"{r}\" fill=\"{fill}\"/>\n"
        ));
    }

    fn text(&mut self, x: f64, y: f64, anchor: &str, size: u32, content: &str) {
        self.body.push_str(&format!(
            "  <text x=\"{x:.1}\" y=\"{y:.1}\" text-anchor=\"{anchor}\" \
             font-size=\"{size}\">{}</text>\n",
            escape(content)
        ));
    }

    fn finish(mut self) -> String {
        self.body.push_str("</svg>\n");
        self.body
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn comparison(candidate: &str, gain: f64, outcome: ComparisonOutcome) -> ComparisonResult {
        ComparisonResult {
            test_name: "paired-t-test".to_string(),
            baseline: "base".to_string(),
            candidate: candidate.to_string(),
            catalog: "obs".to_string(),
            observed_events: 13,
            information_gain: gain,
            gain_lower: gain - 0.1,
            gain_upper: gain + 0.1,
            t_statistic: 1.0,
            t_critical: 2.18,
            significance: 0.05,
            outcome,
        }
    }

    fn test_result(gamma: f64) -> TestResult {
        TestResult {
            test_name: "s-test".to_string(),
            forecast: "model-a".to_string(),
            catalog: "obs".to_string(),
            observed_statistic: -42.0,
            quantile: Quantile::OneSided { gamma },
            distribution: ReferenceDistribution::Empirical {
                samples: vec![-45.0, -44.0, -43.0, -41.0, -40.0],
            },
            n_simulations: 5,
            seed: Some(1),
        }
    }

    #[test]
    fn comparison_render_includes_title_and_labels() {
        let figure = ComparisonFigure::new(vec![
            comparison("model-a", 0.3, ComparisonOutcome::CandidateFavored),
            comparison("model-b", -0.2, ComparisonOutcome::BaselineFavored),
        ])
        .unwrap();
        let options = FigureOptions {
            title: Some("Emilia sequence".to_string()),
            ..FigureOptions::default()
        };
        let svg = figure.render(&options);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>\n"));
        assert!(svg.contains("Emilia sequence"));
        assert!(svg.contains("model-a"));
        assert!(svg.contains("model-b"));
        assert!(svg.contains(COLOR_PASS));
        assert!(svg.contains(COLOR_FAIL));
    }

    #[test]
    fn figure_size_flows_into_the_svg_header() {
        let figure =
            ComparisonFigure::new(vec![comparison("m", 0.1, ComparisonOutcome::Indistinguishable)])
                .unwrap();
        let options = FigureOptions {
            figure_size: (800, 450),
            ..FigureOptions::default()
        };
        let svg = figure.render(&options);
        assert!(svg.contains("width=\"800\""));
        assert!(svg.contains("height=\"450\""));
    }

    #[test]
    fn one_sided_rendering_drops_the_upper_whisker() {
        let figure =
            ComparisonFigure::new(vec![comparison("m", 0.1, ComparisonOutcome::Indistinguishable)])
                .unwrap();
        let two_sided = figure.render(&FigureOptions::default());
        let one_sided = figure.render(&FigureOptions {
            one_sided_lower: true,
            ..FigureOptions::default()
        });
        assert_ne!(two_sided, one_sided);
        assert!(two_sided.matches("<line").count() > one_sided.matches("<line").count());
    }

    #[test]
    fn empty_figure_is_rejected() {
        assert!(ComparisonFigure::new(vec![]).is_err());
        assert!(ConsistencyFigure::new(vec![], 0.05).is_err());
    }

    #[test]
    fn consistency_band_covers_the_empirical_quantiles() {
        let figure = ConsistencyFigure::new(vec![test_result(0.4)], 0.05).unwrap();
        let svg = figure.render(&FigureOptions::default());
        assert!(svg.contains("s-test model-a"));
        assert!(svg.contains(COLOR_PASS));
    }

    #[test]
    fn failing_result_is_drawn_in_the_failure_color() {
        let figure = ConsistencyFigure::new(vec![test_result(0.01)], 0.05).unwrap();
        let svg = figure.render(&FigureOptions::default());
        assert!(svg.contains(COLOR_FAIL));
    }

    #[test]
    fn titles_are_escaped() {
        let figure =
            ComparisonFigure::new(vec![comparison("m", 0.1, ComparisonOutcome::Indistinguishable)])
                .unwrap();
        let options = FigureOptions {
            title: Some("a < b & c".to_string()),
            ..FigureOptions::default()
        };
        let svg = figure.render(&options);
        assert!(svg.contains("a &lt; b &amp; c"));
    }
}
