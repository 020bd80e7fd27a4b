//! ROC figure rendering: SVG with labels and legend, PNG raster of the same curves

use crate::config::colors::{parse_color, to_hex};
use crate::error::{HarnessError, Result};
use super::aggregate::AggregateResult;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 800;
const MARGIN_LEFT: f64 = 90.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_BOTTOM: f64 = 80.0;

const RUN_GREY: [u8; 3] = [128, 128, 128];
const NAVY: [u8; 3] = [0, 0, 128];
const BLACK: [u8; 3] = [0, 0, 0];

const TITLE: &str = "Receiver Operating Characteristic (ROC) Curve";
const X_LABEL: &str = "1 - Specificity (FPR)";
const Y_LABEL: &str = "Sensitivity (TPR)";

/// Dash pattern in pixels: (on, off)
type Dash = Option<(f64, f64)>;
const DASHED: Dash = Some((10.0, 6.0));
const DOTTED: Dash = Some((2.0, 5.0));

/// Appearance of the ROC figure
#[derive(Debug, Clone)]
pub struct RocStyle {
    pub color: [u8; 3],
    /// Draw only the mean curve, solid
    pub plot_mean_only: bool,
}

impl Default for RocStyle {
    fn default() -> Self {
        Self {
            color: [255, 0, 0],
            plot_mean_only: false,
        }
    }
}

impl RocStyle {
    /// Style from a CSS4 name or `#RRGGBB`; empty means red
    pub fn new(color: &str, plot_mean_only: bool) -> Result<Self> {
        let color = if color.trim().is_empty() {
            [255, 0, 0]
        } else {
            parse_color(color)
                .ok_or_else(|| HarnessError::invalid_param("roc_color", color, "unknown color"))?
        };
        Ok(Self { color, plot_mean_only })
    }
}

/// Both renderings of one ROC figure
#[derive(Debug, Clone)]
pub struct RocArtifacts {
    pub svg: String,
    pub png: Vec<u8>,
}

/// Render the aggregate's curves in both formats
pub fn render_roc(aggregate: &AggregateResult, style: &RocStyle) -> Result<RocArtifacts> {
    let figure = Figure::from_aggregate(aggregate, style);
    Ok(RocArtifacts {
        svg: figure.to_svg(),
        png: figure.to_png()?,
    })
}

struct Series {
    points: Vec<(f64, f64)>,
    color: [u8; 3],
    width: f64,
    dash: Dash,
    label: Option<String>,
}

/// Curves in drawing order plus legend entries
struct Figure {
    series: Vec<Series>,
}

impl Figure {
    fn from_aggregate(aggregate: &AggregateResult, style: &RocStyle) -> Self {
        let mut series = Vec::new();

        if let (Some(roc), Some(auc)) = (&aggregate.overoptimistic_roc, aggregate.overoptimistic_auc) {
            series.push(Series {
                points: roc.fpr.iter().copied().zip(roc.tpr.iter().copied()).collect(),
                color: NAVY,
                width: 2.0,
                dash: DOTTED,
                label: Some(format!("Overoptimistic AUC: {:.2}", auc)),
            });
        }

        if !style.plot_mean_only {
            for roc in &aggregate.run_curves {
                series.push(Series {
                    points: roc.fpr.iter().copied().zip(roc.tpr.iter().copied()).collect(),
                    color: RUN_GREY,
                    width: 1.0,
                    dash: None,
                    label: None,
                });
            }
        }

        series.push(Series {
            points: aggregate
                .mean_roc
                .fpr
                .iter()
                .copied()
                .zip(aggregate.mean_roc.tpr.iter().copied())
                .collect(),
            color: style.color,
            width: 2.0,
            dash: if style.plot_mean_only { None } else { DASHED },
            label: Some(format!("Averaged AUC: {:.2}", aggregate.auc)),
        });

        Self { series }
    }

    fn plot_width() -> f64 {
        WIDTH as f64 - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn plot_height() -> f64 {
        HEIGHT as f64 - MARGIN_TOP - MARGIN_BOTTOM
    }

    /// Data coordinates in [0, 1] to canvas pixels
    fn to_canvas(x: f64, y: f64) -> (f64, f64) {
        (
            MARGIN_LEFT + x * Self::plot_width(),
            MARGIN_TOP + (1.0 - y) * Self::plot_height(),
        )
    }

    fn to_svg(&self) -> String {
        let mut svg = String::new();
        let (pw, ph) = (Self::plot_width(), Self::plot_height());

        svg.push_str(&format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
            w = WIDTH,
            h = HEIGHT
        ));
        svg.push_str(r#"<rect width="100%" height="100%" fill="white"/>"#);
        svg.push_str(&format!(
            r#"<defs><clipPath id="plot-area"><rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}"/></clipPath></defs>"#,
            MARGIN_LEFT, MARGIN_TOP, pw, ph
        ));

        // axes and ticks
        svg.push_str(&format!(
            r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="none" stroke="black" stroke-width="1"/>"#,
            MARGIN_LEFT, MARGIN_TOP, pw, ph
        ));
        for i in 0..=5 {
            let v = i as f64 / 5.0;
            let (x, bottom) = Self::to_canvas(v, 0.0);
            let (left, y) = Self::to_canvas(0.0, v);
            svg.push_str(&format!(
                r#"<line x1="{x:.1}" y1="{b:.1}" x2="{x:.1}" y2="{b2:.1}" stroke="black"/><text x="{x:.1}" y="{t:.1}" font-size="13" text-anchor="middle">{v:.1}</text>"#,
                x = x,
                b = bottom,
                b2 = bottom + 5.0,
                t = bottom + 22.0,
                v = v
            ));
            svg.push_str(&format!(
                r#"<line x1="{l:.1}" y1="{y:.1}" x2="{l2:.1}" y2="{y:.1}" stroke="black"/><text x="{t:.1}" y="{ty:.1}" font-size="13" text-anchor="end">{v:.1}</text>"#,
                l = left,
                l2 = left - 5.0,
                y = y,
                t = left - 9.0,
                ty = y + 4.0,
                v = v
            ));
        }

        svg.push_str(r#"<g clip-path="url(#plot-area)" fill="none">"#);
        for s in &self.series {
            let points: Vec<String> = s
                .points
                .iter()
                .map(|&(x, y)| {
                    let (cx, cy) = Self::to_canvas(x, y);
                    format!("{:.2},{:.2}", cx, cy)
                })
                .collect();
            let dash = match s.dash {
                Some((on, off)) => format!(r#" stroke-dasharray="{},{}""#, on, off),
                None => String::new(),
            };
            svg.push_str(&format!(
                r#"<polyline points="{}" stroke="{}" stroke-width="{}"{}/>"#,
                points.join(" "),
                to_hex(s.color),
                s.width,
                dash
            ));
        }
        svg.push_str("</g>");

        svg.push_str(&format!(
            r#"<text x="{:.1}" y="{:.1}" font-size="18" text-anchor="middle">{}</text>"#,
            MARGIN_LEFT + pw / 2.0,
            MARGIN_TOP / 2.0 + 6.0,
            TITLE
        ));
        svg.push_str(&format!(
            r#"<text x="{:.1}" y="{:.1}" font-size="15" text-anchor="middle">{}</text>"#,
            MARGIN_LEFT + pw / 2.0,
            HEIGHT as f64 - 25.0,
            X_LABEL
        ));
        svg.push_str(&format!(
            r#"<text x="25" y="{y:.1}" font-size="15" text-anchor="middle" transform="rotate(-90 25 {y:.1})">{}</text>"#,
            Y_LABEL,
            y = MARGIN_TOP + ph / 2.0
        ));

        // legend, lower right
        let entries: Vec<&Series> = self.series.iter().filter(|s| s.label.is_some()).collect();
        let box_w = 230.0;
        let box_h = 12.0 + 24.0 * entries.len() as f64;
        let box_x = MARGIN_LEFT + pw - box_w - 10.0;
        let box_y = MARGIN_TOP + ph - box_h - 10.0;
        svg.push_str(&format!(
            r##"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="white" stroke="#cccccc"/>"##,
            box_x, box_y, box_w, box_h
        ));
        for (i, s) in entries.iter().enumerate() {
            let y = box_y + 18.0 + 24.0 * i as f64;
            let dash = match s.dash {
                Some((on, off)) => format!(r#" stroke-dasharray="{},{}""#, on, off),
                None => String::new(),
            };
            svg.push_str(&format!(
                r#"<line x1="{:.1}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="{}" stroke-width="{}"{}/><text x="{:.1}" y="{:.1}" font-size="13">{}</text>"#,
                box_x + 10.0,
                box_x + 45.0,
                to_hex(s.color),
                s.width,
                dash,
                box_x + 55.0,
                y + 4.0,
                s.label.as_deref().unwrap_or_default(),
                y = y
            ));
        }

        svg.push_str("</svg>\n");
        svg
    }

    fn to_png(&self) -> Result<Vec<u8>> {
        let mut canvas = Canvas::new();

        // frame and ticks
        let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.0, 0.0)];
        for w in corners.windows(2) {
            let a = Self::to_canvas(w[0].0, w[0].1);
            let b = Self::to_canvas(w[1].0, w[1].1);
            canvas.line(a, b, BLACK, 1.0, None, &mut 0.0);
        }
        for i in 0..=5 {
            let v = i as f64 / 5.0;
            let (x, bottom) = Self::to_canvas(v, 0.0);
            canvas.line((x, bottom), (x, bottom + 5.0), BLACK, 1.0, None, &mut 0.0);
            let (left, y) = Self::to_canvas(0.0, v);
            canvas.line((left - 5.0, y), (left, y), BLACK, 1.0, None, &mut 0.0);
        }

        canvas.clip = Some((
            MARGIN_LEFT,
            MARGIN_TOP,
            MARGIN_LEFT + Self::plot_width(),
            MARGIN_TOP + Self::plot_height(),
        ));
        for s in &self.series {
            let mut travelled = 0.0;
            for w in s.points.windows(2) {
                let a = Self::to_canvas(w[0].0, w[0].1);
                let b = Self::to_canvas(w[1].0, w[1].1);
                canvas.line(a, b, s.color, s.width, s.dash, &mut travelled);
            }
        }

        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(canvas.image).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }
}

/// White raster with thick, optionally dashed, line drawing
struct Canvas {
    image: RgbImage,
    /// (x0, y0, x1, y1) outside which nothing is drawn
    clip: Option<(f64, f64, f64, f64)>,
}

impl Canvas {
    fn new() -> Self {
        Self {
            image: RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([255, 255, 255])),
            clip: None,
        }
    }

    /// Stamp a square brush every half pixel along the segment
    ///
    /// `travelled` carries the dash phase across consecutive segments.
    fn line(&mut self, a: (f64, f64), b: (f64, f64), color: [u8; 3], width: f64, dash: Dash, travelled: &mut f64) {
        let (dx, dy) = (b.0 - a.0, b.1 - a.1);
        let length = (dx * dx + dy * dy).sqrt();
        if !length.is_finite() {
            return;
        }
        let steps = (length * 2.0).ceil().max(1.0) as usize;

        for i in 0..=steps {
            let t = i as f64 / steps as f64;
            let along = *travelled + t * length;
            if let Some((on, off)) = dash {
                if along % (on + off) >= on {
                    continue;
                }
            }
            self.stamp(a.0 + t * dx, a.1 + t * dy, color, width);
        }
        *travelled += length;
    }

    fn stamp(&mut self, x: f64, y: f64, color: [u8; 3], width: f64) {
        if let Some((x0, y0, x1, y1)) = self.clip {
            if x < x0 || x > x1 || y < y0 || y > y1 {
                return;
            }
        }
        let half = (width / 2.0).max(0.5);
        let (xs, xe) = ((x - half).round() as i64, (x + half).round() as i64 - 1);
        let (ys, ye) = ((y - half).round() as i64, (y + half).round() as i64 - 1);
        for py in ys..=ye.max(ys) {
            for px in xs..=xe.max(xs) {
                if px >= 0 && py >= 0 && (px as u32) < WIDTH && (py as u32) < HEIGHT {
                    self.image.put_pixel(px as u32, py as u32, Rgb(color));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::aggregate::{AggregateResult, OptimismCorrection};
    use crate::evaluation::metrics::{RocCurve, RunMetrics};

    fn run(fpr: Vec<f64>, tpr: Vec<f64>, auc: f64) -> RunMetrics {
        let thresholds = vec![0.5; fpr.len()];
        RunMetrics {
            accuracy: 0.8,
            precision: 0.8,
            recall: 0.8,
            f1_score: 0.8,
            roc: RocCurve { fpr, tpr, thresholds },
            auc,
        }
    }

    fn aggregate(with_overoptimistic: bool) -> AggregateResult {
        let runs = vec![
            run(vec![0.0, 0.2, 1.0], vec![0.0, 0.8, 1.0], 0.8),
            run(vec![0.0, 0.4, 1.0], vec![0.0, 0.9, 1.0], 0.75),
        ];
        let full = run(vec![0.0, 0.0, 1.0], vec![0.0, 1.0, 1.0], 1.0);
        let over = with_overoptimistic.then_some(&full);
        AggregateResult::from_runs(&runs, over, OptimismCorrection::Observed, 0).unwrap()
    }

    #[test]
    fn test_svg_carries_labels_and_runs() {
        let svg = render_roc(&aggregate(false), &RocStyle::default()).unwrap().svg;
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(TITLE));
        assert!(svg.contains(X_LABEL) && svg.contains(Y_LABEL));
        assert!(svg.contains("Averaged AUC: 0.78"));
        assert_eq!(svg.matches("stroke=\"#808080\"").count(), 2);
        assert!(svg.contains("stroke=\"#ff0000\" stroke-width=\"2\" stroke-dasharray"));
        assert!(!svg.contains("Overoptimistic"));
    }

    #[test]
    fn test_svg_document_is_closed_once() {
        let svg = render_roc(&aggregate(false), &RocStyle::default()).unwrap().svg;
        assert_eq!(svg.matches("<svg").count(), 1);
        assert!(svg.ends_with("</svg>\n"));
        assert_eq!(svg.matches("<g ").count(), svg.matches("</g>").count());
        // six ticks on each axis
        assert_eq!(svg.matches(r#"font-size="13" text-anchor"#).count(), 12);
    }

    #[test]
    fn test_mean_only_is_solid() {
        let style = RocStyle::new("darkgreen", true).unwrap();
        let svg = render_roc(&aggregate(false), &style).unwrap().svg;
        assert_eq!(svg.matches("stroke=\"#808080\"").count(), 0);
        assert!(svg.contains("<polyline points=") && svg.contains("stroke=\"#006400\" stroke-width=\"2\"/>"));
    }

    #[test]
    fn test_overoptimistic_curve_is_navy_and_dotted() {
        let agg = aggregate(true);
        let svg = render_roc(&agg, &RocStyle::default()).unwrap().svg;
        assert!(svg.contains("Overoptimistic AUC: 1.00"));
        assert!(svg.contains("stroke=\"#000080\" stroke-width=\"2\" stroke-dasharray=\"2,5\""));
        // the legend shows the corrected AUC, 1.0 - 0.775
        assert!((agg.auc - 0.225).abs() < 1e-12);
        assert!(svg.contains(&format!("Averaged AUC: {:.2}", agg.auc)));
    }

    #[test]
    fn test_png_is_a_valid_image() {
        let png = render_roc(&aggregate(true), &RocStyle::default()).unwrap().png;
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (WIDTH, HEIGHT));
        assert!(decoded.pixels().any(|p| p.0 == [255, 0, 0]));
    }

    #[test]
    fn test_unknown_color() {
        assert!(RocStyle::new("ultraviolet", false).is_err());
        assert_eq!(RocStyle::new("", false).unwrap().color, [255, 0, 0]);
    }
}
