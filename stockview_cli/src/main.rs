use std::fs::{self, File};
use std::io::{self, Write};
use std::panic;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum, ValueHint};
use plotters::prelude::*;
use plotters::style::{FontDesc, FontFamily, FontStyle};
use serde_json::json;
use stockview::config::CONFIG_PAYLOAD_ID;
use stockview::markup::extract_script_payload;
use stockview::trend::trend_badges;
use stockview::{ChartKind, ChartSpec, PagePayloads, TrendUnit, ViewConfig};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect saved stock analysis result pages", long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report the embedded payloads and which page features they enable
    Inspect(InspectArgs),
    /// Print the trend badges of one trend key in display order
    Badges(BadgesArgs),
    /// Build a metric or valuation chart and export it as CSV, SVG or PNG
    Chart(ChartArgs),
}

#[derive(Parser, Debug)]
struct InspectArgs {
    /// Saved result page
    #[arg(value_hint = ValueHint::FilePath)]
    page: PathBuf,

    /// Print the report as JSON on stdout
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

#[derive(Parser, Debug)]
struct BadgesArgs {
    #[arg(value_hint = ValueHint::FilePath)]
    page: PathBuf,

    /// Key into the metric trend payload
    #[arg(long)]
    trend_key: String,

    #[arg(long, value_enum, default_value_t = UnitOpt::Number)]
    unit: UnitOpt,
}

#[derive(Parser, Debug)]
struct ChartArgs {
    #[arg(value_hint = ValueHint::FilePath)]
    page: PathBuf,

    /// Metric field to chart
    #[arg(long, conflicts_with = "valuation", requires_all = ["kind", "title"])]
    metric: Option<String>,

    #[arg(long, value_enum)]
    kind: Option<KindOpt>,

    /// Chart title
    #[arg(long)]
    title: Option<String>,

    /// Chart the projected share prices instead of a metric
    #[arg(long, action = ArgAction::SetTrue)]
    valuation: bool,

    /// Output CSV path (`-` for stdout)
    #[arg(long, value_hint = ValueHint::FilePath)]
    csv: Option<PathBuf>,

    #[arg(long, value_hint = ValueHint::FilePath)]
    svg: Option<PathBuf>,

    #[arg(long, value_hint = ValueHint::FilePath)]
    png: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum UnitOpt {
    Percent,
    Number,
}

impl From<UnitOpt> for TrendUnit {
    fn from(value: UnitOpt) -> Self {
        match value {
            UnitOpt::Percent => TrendUnit::Percent,
            UnitOpt::Number => TrendUnit::Number,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum KindOpt {
    Bar,
    Line,
}

impl From<KindOpt> for ChartKind {
    fn from(value: KindOpt) -> Self {
        match value {
            KindOpt::Bar => ChartKind::Bar,
            KindOpt::Line => ChartKind::Line,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Inspect(args) => handle_inspect(args),
        Command::Badges(args) => handle_badges(args),
        Command::Chart(args) => handle_chart(args),
    }
}

/// Resolve the page config and payloads the same way the browser does.
fn payloads_from_html(html: &str) -> (ViewConfig, PagePayloads) {
    let config = ViewConfig::from_payload(extract_script_payload(html, CONFIG_PAYLOAD_ID));
    let payloads = PagePayloads::collect(&config, |id| {
        extract_script_payload(html, id).map(str::to_string)
    });
    (config, payloads)
}

fn load_page(path: &Path) -> Result<(ViewConfig, PagePayloads)> {
    let html =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    debug!("read {} bytes from {}", html.len(), path.display());
    Ok(payloads_from_html(&html))
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let (config, payloads) = load_page(&args.page)?;
    let metrics = payloads.metrics.as_ref().map_or(0, |m| m.len());
    let valuation = payloads.valuation.as_ref().map_or(0, |v| v.len());
    let transcripts = payloads.transcripts.as_ref().map_or(0, Vec::len);
    let trend_keys: Vec<&str> = payloads.trends.keys().collect();

    info!(
        "#{}: {}",
        config.historical_metrics_payload,
        if metrics > 0 {
            format!("{metrics} records; metric cards active")
        } else {
            "missing; metric cards inactive".to_string()
        }
    );
    info!("#{}: {} trend keys", config.trend_payload, trend_keys.len());
    info!(
        "#{}: {}",
        config.valuation_payload,
        if valuation > 0 {
            format!("{valuation} projected prices; initial chart drawn")
        } else {
            "empty; chart waits for a submit".to_string()
        }
    );
    info!(
        "#{}: {}",
        config.transcripts_payload,
        if transcripts > 0 {
            format!("{transcripts} transcripts; viewer active")
        } else {
            "missing; viewer inactive".to_string()
        }
    );

    if args.json {
        let report = json!({
            "metrics": metrics,
            "years": payloads.metrics.as_ref().map(|m| m.years().collect::<Vec<_>>()),
            "trend_keys": trend_keys,
            "valuation": valuation,
            "transcripts": payloads.transcripts.as_ref().map(|records| {
                records.iter().map(|r| r.period_label()).collect::<Vec<_>>()
            }),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn handle_badges(args: BadgesArgs) -> Result<()> {
    let (_, payloads) = load_page(&args.page)?;
    let Some(series) = payloads.trends.get(&args.trend_key) else {
        warn!("no trend data for {:?}", args.trend_key);
        return Ok(());
    };
    let badges = trend_badges(series, args.unit.into());
    if badges.is_empty() {
        warn!("trend {:?} has no displayable values; the panel stays hidden", args.trend_key);
        return Ok(());
    }
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for badge in badges {
        writeln!(out, "{}\t{}", badge.text(), badge.tone.class().unwrap_or("neutral"))?;
    }
    Ok(())
}

fn handle_chart(args: ChartArgs) -> Result<()> {
    let (_, payloads) = load_page(&args.page)?;
    let spec = if args.valuation {
        let results = payloads
            .valuation
            .as_ref()
            .ok_or_else(|| anyhow!("page has no valuation results"))?;
        ChartSpec::valuation(results)
    } else {
        let field = args
            .metric
            .as_deref()
            .ok_or_else(|| anyhow!("pass --metric (with --kind and --title) or --valuation"))?;
        let kind = args.kind.ok_or_else(|| anyhow!("--kind is required with --metric"))?;
        let title = args.title.as_deref().unwrap_or(field);
        let series = payloads
            .metrics
            .as_ref()
            .ok_or_else(|| anyhow!("page has no historical metrics"))?;
        ChartSpec::metric(kind.into(), title, field, series)
    };

    if spec.is_empty() {
        warn!("chart {:?} has no finite values; nothing written", spec.title);
        return Ok(());
    }

    let no_files = args.csv.is_none() && args.svg.is_none() && args.png.is_none();
    match args.csv.as_deref() {
        Some(path) if path != Path::new("-") => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_chart_rows(&spec, &mut csv::Writer::from_writer(file))?;
            info!("wrote {}", path.display());
        }
        Some(_) => write_chart_rows(&spec, &mut csv::Writer::from_writer(io::stdout().lock()))?,
        None if no_files => {
            write_chart_rows(&spec, &mut csv::Writer::from_writer(io::stdout().lock()))?
        }
        None => {}
    }

    for (path, kind) in [(args.svg, OutputKind::Svg), (args.png, OutputKind::Png)] {
        let Some(path) = path else {
            continue;
        };
        match render_chart_guard(&spec, &path, kind) {
            Ok(()) => info!("wrote {}", path.display()),
            Err(err) => warn!("failed to render {}: {err}", path.display()),
        }
    }
    Ok(())
}

fn write_chart_rows<W: Write>(spec: &ChartSpec, writer: &mut csv::Writer<W>) -> Result<()> {
    writer.write_record(["label", "value", "display_value"])?;
    for (point, display) in spec.points.iter().zip(spec.display_values()) {
        writer.write_record([
            point.label.clone(),
            point.value.to_string(),
            format!("{display:.2}"),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Copy, Clone, Debug)]
enum OutputKind {
    Png,
    Svg,
}

fn render_chart_guard(spec: &ChartSpec, path: &Path, kind: OutputKind) -> Result<(), String> {
    let render = || -> Result<(), String> {
        let drawn = match kind {
            OutputKind::Png => draw_chart(BitMapBackend::new(path, (1280, 720)).into_drawing_area(), spec),
            OutputKind::Svg => draw_chart(SVGBackend::new(path, (1280, 720)).into_drawing_area(), spec),
        };
        drawn.map_err(|e| format!("plotting error: {e}"))
    };

    panic::catch_unwind(panic::AssertUnwindSafe(render))
        .map_err(|_| "plotting backend panicked".to_string())?
}

/// Value axis range: always includes zero, with headroom above the data.
fn value_range(values: &[f64]) -> (f64, f64) {
    let max = values.iter().copied().fold(0.0_f64, f64::max);
    let min = values.iter().copied().fold(0.0_f64, f64::min);
    let top = if max > 0.0 { max * 1.1 } else { 0.0 };
    let bottom = if min < 0.0 { min * 1.1 } else { 0.0 };
    if top == bottom {
        (bottom, bottom + 1.0)
    } else {
        (bottom, top)
    }
}

fn draw_chart<DB>(root: DrawingArea<DB, plotters::coord::Shift>, spec: &ChartSpec) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let values = spec.display_values();
    let labels = spec.labels();
    let (y_min, y_max) = value_range(&values);
    let style = spec.style();
    let fill = RGBAColor(style.background.r, style.background.g, style.background.b, style.background.a);
    let border = RGBColor(style.border.r, style.border.g, style.border.b);

    let title_font = FontDesc::new(FontFamily::SansSerif, 26.0, FontStyle::Normal);
    let axis_font = FontDesc::new(FontFamily::SansSerif, 16.0, FontStyle::Normal);
    let mut chart = ChartBuilder::on(&root)
        .margin(25)
        .caption(&spec.title, title_font)
        .set_label_area_size(LabelAreaPosition::Left, 70)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d((0..values.len()).into_segmented(), y_min..y_max)?;

    chart
        .configure_mesh()
        .light_line_style(&TRANSPARENT)
        .bold_line_style(&TRANSPARENT)
        .x_labels(labels.len())
        .x_label_formatter(&|v| match v {
            SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => {
                labels.get(*i).map(|l| l.to_string()).unwrap_or_default()
            }
            SegmentValue::Last => String::new(),
        })
        .y_label_formatter(&|v| format!("{v:.2}"))
        .label_style(axis_font.color(&BLACK.mix(0.85)))
        .draw()?;

    match spec.kind {
        ChartKind::Bar => {
            chart.draw_series(
                Histogram::vertical(&chart)
                    .style(fill.filled())
                    .margin(12)
                    .data(values.iter().copied().enumerate()),
            )?;
        }
        ChartKind::Line => {
            let line = ShapeStyle {
                color: border.to_rgba(),
                filled: false,
                stroke_width: style.border_width.max(2),
            };
            chart.draw_series(LineSeries::new(
                values
                    .iter()
                    .copied()
                    .enumerate()
                    .map(|(i, v)| (SegmentValue::CenterOf(i), v)),
                line,
            ))?;
        }
    }

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <script type="application/json" id="historical-metrics-data">
          [{"year": "2022", "revenue": 10.0}, {"year": "2023", "revenue": 12.345}]
        </script>
        <script type="application/json" id="metric-trends-data">{"revenue_cagr": {"1y": 0.2}}</script>
        <script type="application/json" id="dcf-results-data">{"2030": 140, "2026": 101.5}</script>
    "#;

    #[test]
    fn reads_payloads_from_saved_page() {
        let (config, payloads) = payloads_from_html(PAGE);
        assert_eq!(config, ViewConfig::default());
        assert_eq!(payloads.metrics.map(|m| m.len()), Some(2));
        assert!(payloads.trends.get("revenue_cagr").is_some());
        assert_eq!(payloads.valuation.map(|v| v.len()), Some(2));
        assert!(payloads.transcripts.is_none());
    }

    #[test]
    fn chart_rows_follow_display_order() {
        let (_, payloads) = payloads_from_html(PAGE);
        let spec = ChartSpec::valuation(payloads.valuation.as_ref().unwrap());
        let mut writer = csv::Writer::from_writer(Vec::new());
        write_chart_rows(&spec, &mut writer).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "label,value,display_value\n2026,101.5,101.50\n2030,140,140.00\n"
        );
    }

    #[test]
    fn value_range_includes_zero() {
        let (bottom, top) = value_range(&[5.0, 10.0]);
        assert_eq!(bottom, 0.0);
        assert!((top - 11.0).abs() < 1e-9);
        let (bottom, top) = value_range(&[-2.0, 1.0]);
        assert!((bottom + 2.2).abs() < 1e-9);
        assert!((top - 1.1).abs() < 1e-9);
        assert_eq!(value_range(&[0.0]), (0.0, 1.0));
    }
}
