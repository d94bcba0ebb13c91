//! Base graphics rendered as standalone SVG figures.

use std::fmt::Write;

use crate::error::RuntimeError;
use crate::format::{format_number, round_to};
use crate::library::{Arguments, CallContext, Package};
use crate::renderable::Figure;
use crate::result::Output;
use crate::runtime_value::RuntimeValue;

const WIDTH: f64 = 504.0;
const HEIGHT: f64 = 360.0;
const LEFT: f64 = 60.0;
const RIGHT: f64 = 20.0;
const TOP: f64 = 40.0;
const BOTTOM: f64 = 50.0;

pub fn package() -> Package {
    Package::new("graphics")
        .invisible("plot", plot)
        .invisible("barplot", barplot)
        .invisible("hist", hist)
}

fn plot(ctx: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let first = args.required("x", 0)?.numbers("plot")?;
    let (xs, ys) = match args.get("y", 1) {
        Some(y) => (first, y.numbers("plot")?),
        None => ((1..=first.len()).map(|i| i as f64).collect(), first),
    };
    if xs.len() != ys.len() {
        return Err(RuntimeError::invalid_argument("plot", "'x' and 'y' lengths differ"));
    }
    let title = named_text(args, "main");
    let lines = named_text(args, "type").as_deref() == Some("l");

    let x_scale = Scale::fit(&xs, LEFT, WIDTH - RIGHT);
    let y_scale = Scale::fit(&ys, HEIGHT - BOTTOM, TOP);
    let mut canvas = Canvas::new(title.as_deref());
    canvas.axes(&x_scale, &y_scale);
    canvas.labels(
        named_text(args, "xlab").as_deref().unwrap_or("x"),
        named_text(args, "ylab").as_deref().unwrap_or("y"),
    );

    if lines {
        let points: Vec<String> = xs
            .iter()
            .zip(&ys)
            .map(|(x, y)| format!("{:.1},{:.1}", x_scale.map(*x), y_scale.map(*y)))
            .collect();
        let _ = writeln!(
            canvas.body,
            r#"<polyline points="{}" fill="none" stroke="black"/>"#,
            points.join(" ")
        );
    } else {
        for (x, y) in xs.iter().zip(&ys) {
            let _ = writeln!(
                canvas.body,
                r#"<circle cx="{:.1}" cy="{:.1}" r="3" fill="none" stroke="black"/>"#,
                x_scale.map(*x),
                y_scale.map(*y)
            );
        }
    }

    emit(ctx, canvas, title);
    Ok(RuntimeValue::Null)
}

fn barplot(ctx: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let heights = args.required("height", 0)?.numbers("barplot")?;
    let names: Vec<String> = args
        .named("names.arg")
        .map(|n| n.elements().iter().map(RuntimeValue::scalar_text).collect())
        .unwrap_or_default();
    let title = named_text(args, "main");

    let mut range = heights.clone();
    range.push(0.0);
    let y_scale = Scale::fit(&range, HEIGHT - BOTTOM, TOP);
    let mut canvas = Canvas::new(title.as_deref());
    canvas.y_axis(&y_scale);

    let slot = (WIDTH - LEFT - RIGHT) / heights.len().max(1) as f64;
    for (i, h) in heights.iter().enumerate() {
        let x = LEFT + slot * i as f64 + slot * 0.1;
        let (top, bottom) = (y_scale.map(h.max(0.0)), y_scale.map(h.min(0.0)));
        let _ = writeln!(
            canvas.body,
            r##"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="#BEBEBE" stroke="black"/>"##,
            x,
            top,
            slot * 0.8,
            bottom - top
        );
        if let Some(name) = names.get(i) {
            canvas.text(x + slot * 0.4, HEIGHT - BOTTOM + 18.0, name, "middle");
        }
    }

    emit(ctx, canvas, title);
    Ok(RuntimeValue::Null)
}

fn hist(ctx: &mut CallContext<'_>, args: &Arguments) -> Result<RuntimeValue, RuntimeError> {
    let values = args.required("x", 0)?.numbers("hist")?;
    if values.is_empty() {
        return Err(RuntimeError::invalid_argument(
            "hist",
            "'x' must be numeric with at least one value",
        ));
    }
    let title = named_text(args, "main").unwrap_or_else(|| "Histogram".to_string());

    // Sturges' rule on pretty breakpoints.
    let classes = (values.len() as f64).log2().ceil() as usize + 1;
    let (min, max) = bounds(&values);
    let breaks = pretty(min, max, classes);
    let mut counts = vec![0usize; breaks.len().saturating_sub(1)];
    for v in &values {
        let bin = breaks
            .windows(2)
            .position(|w| *v >= w[0] && *v <= w[1])
            .unwrap_or(0);
        if let Some(count) = counts.get_mut(bin) {
            *count += 1;
        }
    }

    let first = breaks.first().copied().unwrap_or(min);
    let last = breaks.last().copied().unwrap_or(max);
    let x_scale = Scale::fit(&[first, last], LEFT, WIDTH - RIGHT);
    let peak = counts.iter().copied().max().unwrap_or(0) as f64;
    let y_scale = Scale::fit(&[0.0, peak], HEIGHT - BOTTOM, TOP);
    let mut canvas = Canvas::new(Some(&title));
    canvas.axes(&x_scale, &y_scale);
    canvas.labels("x", "Frequency");

    for (w, count) in breaks.windows(2).zip(&counts) {
        let (x0, x1) = (x_scale.map(w[0]), x_scale.map(w[1]));
        let top = y_scale.map(*count as f64);
        let _ = writeln!(
            canvas.body,
            r##"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="#BEBEBE" stroke="black"/>"##,
            x0,
            top,
            x1 - x0,
            y_scale.map(0.0) - top
        );
    }

    emit(ctx, canvas, Some(title));
    Ok(RuntimeValue::Null)
}

fn named_text(args: &Arguments, name: &str) -> Option<String> {
    match args.named(name) {
        None | Some(RuntimeValue::Null) => None,
        Some(value) => Some(value.scalar_text()),
    }
}

fn emit(ctx: &mut CallContext<'_>, canvas: Canvas, title: Option<String>) {
    ctx.capture.push(Output::Figure(Figure {
        svg: canvas.finish(),
        title,
    }));
}

// ---------------------------------------------------------------------------
// Drawing
// ---------------------------------------------------------------------------

/// Linear map from data coordinates to pixels.
struct Scale {
    ticks: Vec<f64>,
    min: f64,
    max: f64,
    from: f64,
    to: f64,
}

impl Scale {
    fn fit(values: &[f64], from: f64, to: f64) -> Scale {
        let (lo, hi) = bounds(values);
        let ticks = pretty(lo, hi, 5);
        let min = ticks.first().copied().unwrap_or(lo).min(lo);
        let max = ticks.last().copied().unwrap_or(hi).max(hi);
        Scale { ticks, min, max, from, to }
    }

    fn map(&self, v: f64) -> f64 {
        if self.max == self.min {
            return (self.from + self.to) / 2.0;
        }
        self.from + (v - self.min) / (self.max - self.min) * (self.to - self.from)
    }
}

fn bounds(values: &[f64]) -> (f64, f64) {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let lo = finite.clone().fold(f64::INFINITY, f64::min);
    let hi = finite.fold(f64::NEG_INFINITY, f64::max);
    if lo.is_finite() { (lo, hi) } else { (0.0, 1.0) }
}

/// Round tick positions covering `[lo, hi]` in about `n` steps of 1, 2 or 5 × 10^k.
fn pretty(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    if hi <= lo {
        return vec![lo - 1.0, lo, lo + 1.0];
    }
    let raw = (hi - lo) / n.max(1) as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);
    let digits = -(magnitude.log10().floor() as i32);
    let first = (lo / step).floor() as i64;
    let last = (hi / step).ceil() as i64;
    (first..=last).map(|i| round_to(i as f64 * step, digits)).collect()
}

struct Canvas {
    body: String,
}

impl Canvas {
    fn new(title: Option<&str>) -> Canvas {
        let mut canvas = Canvas { body: String::new() };
        if let Some(title) = title {
            let _ = writeln!(
                canvas.body,
                r#"<text x="{:.1}" y="24" text-anchor="middle" font-weight="bold">{}</text>"#,
                WIDTH / 2.0,
                escape(title)
            );
        }
        canvas
    }

    fn text(&mut self, x: f64, y: f64, text: &str, anchor: &str) {
        let _ = writeln!(
            self.body,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="{}">{}</text>"#,
            x,
            y,
            anchor,
            escape(text)
        );
    }

    fn axes(&mut self, x: &Scale, y: &Scale) {
        self.y_axis(y);
        let base = HEIGHT - BOTTOM;
        let _ = writeln!(
            self.body,
            r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="black"/>"#,
            LEFT,
            base,
            WIDTH - RIGHT,
            base
        );
        for tick in &x.ticks {
            let px = x.map(*tick);
            let _ = writeln!(
                self.body,
                r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="black"/>"#,
                px,
                base,
                px,
                base + 5.0
            );
            self.text(px, base + 18.0, &format_number(*tick), "middle");
        }
    }

    fn y_axis(&mut self, y: &Scale) {
        let _ = writeln!(
            self.body,
            r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="black"/>"#,
            LEFT,
            TOP,
            LEFT,
            HEIGHT - BOTTOM
        );
        for tick in &y.ticks {
            let py = y.map(*tick);
            let _ = writeln!(
                self.body,
                r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="black"/>"#,
                LEFT - 5.0,
                py,
                LEFT,
                py
            );
            self.text(LEFT - 8.0, py + 4.0, &format_number(*tick), "end");
        }
    }

    fn labels(&mut self, x_label: &str, y_label: &str) {
        self.text(WIDTH / 2.0, HEIGHT - 10.0, x_label, "middle");
        let _ = writeln!(
            self.body,
            r#"<text x="14" y="{:.1}" text-anchor="middle" transform="rotate(-90 14 {:.1})">{}</text>"#,
            HEIGHT / 2.0,
            HEIGHT / 2.0,
            escape(y_label)
        );
    }

    fn finish(self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\" font-family=\"sans-serif\" font-size=\"12\">\n<rect width=\"{w}\" height=\"{h}\" fill=\"white\"/>\n{}</svg>\n",
            self.body,
            w = WIDTH,
            h = HEIGHT
        )
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_ticks() {
        assert_eq!(pretty(0.0, 10.0, 5), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(pretty(0.3, 0.9, 5), vec![0.2, 0.4, 0.6, 0.8, 1.0]);
    }

    #[test]
    fn scale_maps_endpoints() {
        let scale = Scale::fit(&[0.0, 10.0], 100.0, 200.0);
        assert_eq!(scale.map(0.0), 100.0);
        assert_eq!(scale.map(10.0), 200.0);
    }

    #[test]
    fn titles_are_escaped() {
        let canvas = Canvas::new(Some("a < b"));
        assert!(canvas.finish().contains("a &lt; b"));
    }
}
