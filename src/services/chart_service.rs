use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use plotters::prelude::*;
use uuid::Uuid;

use crate::models::OhlcBar;
use crate::utils::RenderError;

/// Turns synthesized bars into an encoded image
pub trait ChartRenderer: Send + Sync {
    fn render(&self, title: &str, bars: &[OhlcBar]) -> Result<Vec<u8>, RenderError>;
}

/// Candlestick PNG renderer backed by plotters
#[derive(Debug, Clone)]
pub struct CandlestickRenderer {
    pub width: u32,
    pub height: u32,
    pub scratch_dir: PathBuf,
}

impl CandlestickRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            scratch_dir: std::env::temp_dir(),
        }
    }

    fn draw(&self, path: &Path, title: &str, bars: &[OhlcBar]) -> Result<(), RenderError> {
        let drawing = |e: &dyn std::fmt::Display| RenderError::Drawing(e.to_string());

        let backend = BitMapBackend::new(path, (self.width, self.height));
        let root = backend.into_drawing_area();
        root.fill(&WHITE).map_err(|e| drawing(&e))?;

        let low = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let high = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let padding = (high - low).max(1e-4) * 0.1;

        let first = bars[0].date - Duration::days(1);
        let last = bars[bars.len() - 1].date + Duration::days(1);

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 32.0).into_font())
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(first..last, (low - padding)..(high + padding))
            .map_err(|e| drawing(&e))?;

        chart
            .configure_mesh()
            .x_desc("Date")
            .y_desc("Yield (%)")
            .x_label_formatter(&|d: &NaiveDate| d.format("%m-%d").to_string())
            .y_label_formatter(&|y: &f64| format!("{:.2}", y))
            .draw()
            .map_err(|e| drawing(&e))?;

        let candle_width = ((self.width as usize * 6 / 10) / bars.len()).clamp(1, 15) as u32;
        chart
            .draw_series(bars.iter().map(|bar| {
                CandleStick::new(
                    bar.date,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    GREEN.filled(),
                    RED.filled(),
                    candle_width,
                )
            }))
            .map_err(|e| drawing(&e))?;

        root.present().map_err(|e| drawing(&e))?;
        Ok(())
    }
}

impl ChartRenderer for CandlestickRenderer {
    /// Render to a scratch file, read it back and remove it
    fn render(&self, title: &str, bars: &[OhlcBar]) -> Result<Vec<u8>, RenderError> {
        if bars.len() < 2 {
            return Err(RenderError::NotEnoughData(bars.len()));
        }

        let path = self
            .scratch_dir
            .join(format!("yield_chart_{}.png", Uuid::new_v4()));

        let drawn = self.draw(&path, title, bars);
        let image = drawn.and_then(|_| fs::read(&path).map_err(RenderError::from));

        if let Err(e) = fs::remove_file(&path) {
            tracing::debug!("Could not remove chart scratch file {}: {}", path.display(), e);
        }

        let image = image?;
        tracing::debug!("Rendered {} bars into {} bytes", bars.len(), image.len());
        Ok(image)
    }
}
