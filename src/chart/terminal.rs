use error_stack::Report;

use crate::chart::{Chart, ChartRenderer, Trace};
use crate::error::ChartError;

/// Logs a short textual summary of each chart.
pub struct TerminalRenderer;

impl ChartRenderer for TerminalRenderer {
    fn render(&self, chart: &Chart) -> Result<(), Report<ChartError>> {
        for trace in &chart.traces {
            match trace {
                Trace::Candlestick { x, close, .. } => {
                    tracing::info!(
                        chart = %chart.title,
                        trace = trace.name(),
                        bars = x.len(),
                        first = ?x.first(),
                        last = ?x.last(),
                        last_close = ?close.last(),
                        "price"
                    );
                }
                Trace::Line { y, .. } => {
                    let defined = y.iter().flatten().count();
                    tracing::info!(
                        chart = %chart.title,
                        line = trace.name(),
                        defined,
                        last = ?y.last().copied().flatten(),
                        "indicator"
                    );
                }
                Trace::Markers { kind, x, y, .. } => {
                    for (date, price) in x.iter().zip(y) {
                        tracing::info!(
                            chart = %chart.title,
                            signal = %kind,
                            date = %date,
                            price = *price,
                            "crossover"
                        );
                    }
                }
            }
        }
        Ok(())
    }
}
