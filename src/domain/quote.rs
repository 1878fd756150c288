//! Acquired value types and their recipient-facing display strings.

use serde::{Deserialize, Serialize};

use super::metric::Measured;

/// Latest close of an index with the previous close for the change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexQuote {
    /// Latest close (or last traded level).
    pub close: f64,
    /// Previous session close; `None` when only one point is known.
    pub prev_close: Option<f64>,
}

impl IndexQuote {
    /// Create a quote from the last two closes.
    pub const fn new(close: f64, prev_close: Option<f64>) -> Self {
        Self { close, prev_close }
    }

    /// Build a quote from a close series (oldest first).
    ///
    /// Non-finite points are skipped. Returns `None` when no usable
    /// point remains.
    pub fn from_closes(closes: &[f64]) -> Option<Self> {
        let usable: Vec<f64> = closes.iter().copied().filter(|c| c.is_finite()).collect();
        let close = *usable.last()?;
        let prev_close = usable.len().checked_sub(2).map(|i| usable[i]);
        Some(Self { close, prev_close })
    }

    /// Percent change vs the previous close (0 when unknown).
    pub fn change_pct(&self) -> f64 {
        match self.prev_close {
            Some(prev) if prev != 0.0 => (self.close - prev) / prev * 100.0,
            _ => 0.0,
        }
    }

    /// `"3210.55 (+0.45%)"`.
    pub fn summary(&self) -> String {
        format!("{:.2} ({:+.2}%)", self.close, self.change_pct())
    }
}

impl Measured for IndexQuote {
    fn measure(&self) -> f64 {
        self.close
    }
}

/// Current weather for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    /// City label.
    pub city: String,
    /// Low (or current) temperature in °C.
    pub temp_low: f64,
    /// Daytime high in °C, when the provider gives a range.
    pub temp_high: Option<f64>,
    /// Condition text (e.g. "多云").
    pub condition: String,
    /// Wind description (e.g. "东北风3级").
    pub wind: String,
}

impl WeatherSnapshot {
    /// `"25~28°C"` or `"26°C"`.
    pub fn temperature_text(&self) -> String {
        match self.temp_high {
            Some(high) => format!("{}~{}°C", fmt_temp(self.temp_low), fmt_temp(high)),
            None => format!("{}°C", fmt_temp(self.temp_low)),
        }
    }

    /// `"多云 25~28°C"`.
    pub fn summary(&self) -> String {
        format!("{} {}", self.condition, self.temperature_text())
    }
}

impl Measured for WeatherSnapshot {
    fn measure(&self) -> f64 {
        self.temp_high.unwrap_or(self.temp_low)
    }

    fn extremes(&self) -> (f64, f64) {
        (self.temp_low, self.temp_high.unwrap_or(self.temp_low))
    }
}

fn fmt_temp(t: f64) -> String {
    if t.fract() == 0.0 {
        format!("{t:.0}")
    } else {
        format!("{t:.1}")
    }
}

/// Bond yield percent as `"2.650%"`.
pub fn format_yield(pct: f64) -> String {
    format!("{pct:.3}%")
}

/// Exchange rate as `"7.2500"`.
pub fn format_fx(rate: f64) -> String {
    format!("{rate:.4}")
}

/// USD price rounded to whole dollars with separators: `"$67,123"`.
pub fn format_usd(price: f64) -> String {
    let rounded = price.round();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if negative {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}
