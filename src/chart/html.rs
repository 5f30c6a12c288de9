use std::path::{Path, PathBuf};

use error_stack::{Report, ResultExt};
use serde_json::{Value, json};
use tracing::info;

use crate::chart::{Chart, ChartRenderer, Trace};
use crate::error::ChartError;
use crate::strategy::MarkerKind;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

/// Writes each chart as a standalone Plotly page: `<output_dir>/<TICKER>_<kind>.html`.
pub struct HtmlRenderer {
    output_dir: PathBuf,
}

impl HtmlRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn path_for(&self, chart: &Chart) -> PathBuf {
        let ticker: String = chart
            .ticker
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        self.output_dir
            .join(format!("{}_{}.html", ticker.to_uppercase(), chart.kind))
    }
}

impl ChartRenderer for HtmlRenderer {
    fn render(&self, chart: &Chart) -> Result<(), Report<ChartError>> {
        let figure = serde_json::to_string(&plotly_figure(chart))
            .change_context(ChartError::Serialize)?;
        let page = render_page(&chart.title, &figure);

        std::fs::create_dir_all(&self.output_dir)
            .change_context(ChartError::Write)
            .attach_with(|| format!("output_dir: {}", self.output_dir.display()))?;

        let path = self.path_for(chart);
        write_page(&path, &page)?;

        info!(
            ticker = %chart.ticker,
            kind = %chart.kind,
            path = %path.display(),
            "chart written"
        );
        Ok(())
    }
}

fn write_page(path: &Path, page: &str) -> Result<(), Report<ChartError>> {
    std::fs::write(path, page)
        .change_context(ChartError::Write)
        .attach_with(|| format!("path: {}", path.display()))
}

fn render_page(title: &str, figure: &str) -> String {
    // Keep a stray "</script>" in a ticker or title from ending the script block.
    let figure = figure.replace("</", "<\\/");
    let title = title
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <script src=\"{PLOTLY_CDN}\"></script>\n</head>\n<body>\n\
         <div id=\"chart\" style=\"width:100%;height:90vh;\"></div>\n\
         <script>\nconst figure = {figure};\n\
         Plotly.newPlot(\"chart\", figure.data, figure.layout);\n</script>\n\
         </body>\n</html>\n"
    )
}

/// Plotly figure JSON (`{ data, layout }`) for a chart.
pub fn plotly_figure(chart: &Chart) -> Value {
    let data: Vec<Value> = chart.traces.iter().map(plotly_trace).collect();
    json!({
        "data": data,
        "layout": {
            "title": { "text": chart.title },
            "xaxis": { "title": { "text": chart.x_title }, "rangeslider": { "visible": false } },
            "yaxis": { "title": { "text": chart.y_title } },
            "legend": { "title": { "text": "Indicators" } },
        }
    })
}

fn plotly_trace(trace: &Trace) -> Value {
    match trace {
        Trace::Candlestick {
            name,
            x,
            open,
            high,
            low,
            close,
        } => json!({
            "type": "candlestick",
            "name": name,
            "x": x,
            "open": open,
            "high": high,
            "low": low,
            "close": close,
        }),
        Trace::Line { name, x, y } => json!({
            "type": "scatter",
            "mode": "lines",
            "name": name,
            "x": x,
            "y": y,
            "connectgaps": false,
        }),
        Trace::Markers { name, kind, x, y } => {
            let (symbol, color) = match kind {
                MarkerKind::Buy => ("triangle-up", "green"),
                MarkerKind::Sell => ("triangle-down", "red"),
            };
            json!({
                "type": "scatter",
                "mode": "markers",
                "name": name,
                "x": x,
                "y": y,
                "marker": { "symbol": symbol, "color": color, "size": 10 },
            })
        }
    }
}
