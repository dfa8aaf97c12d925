// Technical indicators over the incoming quote stream
//
// The engine keeps a rolling window of mid prices and recomputes MACD,
// Bollinger Bands and ATR on every quote. Quotes carry no OHLC bars, so the
// per-step true range is approximated by the larger of the mid move and the
// quoted spread.

use crate::config::StrategyConfig;
use crate::types::Quote;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    config: StrategyConfig,
    price_history: VecDeque<f64>,
    range_history: VecDeque<f64>,
    history_size: usize,

    macd_line: f64,
    macd_signal: f64,
    bollinger_upper: f64,
    bollinger_middle: f64,
    bollinger_lower: f64,
    atr: f64,
}

/// Point-in-time view of the computed indicators
#[derive(Debug, Clone)]
pub struct IndicatorSnapshot {
    pub macd_line: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub bollinger_upper: f64,
    pub bollinger_middle: f64,
    pub bollinger_lower: f64,
    pub atr: f64,
    /// Where the last price sits in the band channel, 0 at the lower band
    /// and 1 at the upper band
    pub bb_channel_pos: f64,
}

impl IndicatorEngine {
    pub fn new(config: StrategyConfig) -> Self {
        // Enough history for the slowest indicator plus signal smoothing
        let history_size = config
            .macd_slow
            .max(config.bb_period)
            .max(config.atr_period)
            + config.macd_signal
            + 8;

        Self {
            config,
            price_history: VecDeque::with_capacity(history_size),
            range_history: VecDeque::with_capacity(history_size),
            history_size,
            macd_line: 0.0,
            macd_signal: 0.0,
            bollinger_upper: 0.0,
            bollinger_middle: 0.0,
            bollinger_lower: 0.0,
            atr: 0.0,
        }
    }

    /// Number of quotes required before snapshots become available
    pub fn warmup_quotes(&self) -> usize {
        self.config.macd_slow.max(self.config.bb_period).max(self.config.atr_period + 1)
    }

    pub fn is_warmed_up(&self) -> bool {
        self.price_history.len() >= self.warmup_quotes()
    }

    /// Feed a quote and return the indicator snapshot once warmed up
    pub fn update(&mut self, quote: &Quote) -> Option<IndicatorSnapshot> {
        let mid = quote.mid();
        let range = match self.price_history.back() {
            Some(&prev) => (mid - prev).abs().max(quote.spread()),
            None => quote.spread(),
        };

        self.price_history.push_back(mid);
        self.range_history.push_back(range);
        while self.price_history.len() > self.history_size {
            self.price_history.pop_front();
        }
        while self.range_history.len() > self.history_size {
            self.range_history.pop_front();
        }

        if !self.is_warmed_up() {
            return None;
        }

        self.recompute();
        Some(self.snapshot(mid))
    }

    fn snapshot(&self, last_price: f64) -> IndicatorSnapshot {
        let band_width = self.bollinger_upper - self.bollinger_lower;
        let bb_channel_pos = if band_width > 0.0 {
            ((last_price - self.bollinger_lower) / band_width).clamp(0.0, 1.0)
        } else {
            0.5
        };

        IndicatorSnapshot {
            macd_line: self.macd_line,
            macd_signal: self.macd_signal,
            macd_histogram: self.macd_line - self.macd_signal,
            bollinger_upper: self.bollinger_upper,
            bollinger_middle: self.bollinger_middle,
            bollinger_lower: self.bollinger_lower,
            atr: self.atr,
            bb_channel_pos,
        }
    }

    fn recompute(&mut self) {
        let prices: Vec<f64> = self.price_history.iter().cloned().collect();
        let ranges: Vec<f64> = self.range_history.iter().cloned().collect();

        let (macd_line, macd_signal) = self.calculate_macd(&prices);
        self.macd_line = macd_line;
        self.macd_signal = macd_signal;

        let (upper, middle, lower) =
            self.calculate_bollinger_bands(&prices, self.config.bb_period, self.config.bb_std_dev);
        self.bollinger_upper = upper;
        self.bollinger_middle = middle;
        self.bollinger_lower = lower;

        self.atr = self.calculate_atr(&ranges, self.config.atr_period);
    }

    fn calculate_sma(&self, prices: &[f64], period: usize) -> f64 {
        if prices.len() < period {
            return prices.iter().sum::<f64>() / prices.len() as f64;
        }

        let start = prices.len() - period;
        prices[start..].iter().sum::<f64>() / period as f64
    }

    fn calculate_ema(&self, prices: &[f64], period: usize) -> f64 {
        if prices.is_empty() {
            return 0.0;
        }

        let alpha = 2.0 / (period as f64 + 1.0);
        let mut ema = prices[0];

        for &price in &prices[1..] {
            ema = alpha * price + (1.0 - alpha) * ema;
        }

        ema
    }

    fn calculate_macd(&self, prices: &[f64]) -> (f64, f64) {
        // Signal line is an EMA of the MACD series, so the MACD is computed
        // over a sliding suffix rather than only at the last price
        let signal_len = self.config.macd_signal.min(prices.len());
        let mut macd_series = Vec::with_capacity(signal_len);

        for i in 0..signal_len {
            let end = prices.len() - (signal_len - 1 - i);
            let window = &prices[..end];
            let fast = self.calculate_ema(window, self.config.macd_fast);
            let slow = self.calculate_ema(window, self.config.macd_slow);
            macd_series.push(fast - slow);
        }

        let macd_line = *macd_series.last().unwrap_or(&0.0);
        let macd_signal = self.calculate_ema(&macd_series, self.config.macd_signal);
        (macd_line, macd_signal)
    }

    fn calculate_bollinger_bands(
        &self,
        prices: &[f64],
        period: usize,
        std_dev: f64,
    ) -> (f64, f64, f64) {
        let sma = self.calculate_sma(prices, period);

        if prices.len() < period {
            return (sma, sma, sma);
        }

        let start = prices.len() - period;
        let variance = prices[start..]
            .iter()
            .map(|&p| (p - sma).powi(2))
            .sum::<f64>()
            / period as f64;

        let std = variance.sqrt();

        (sma + std_dev * std, sma, sma - std_dev * std)
    }

    fn calculate_atr(&self, ranges: &[f64], period: usize) -> f64 {
        if ranges.is_empty() {
            return 0.0;
        }

        // Skip the first range: it has no previous mid and only reflects
        // the opening spread
        let usable = if ranges.len() > 1 { &ranges[1..] } else { ranges };
        let period = period.min(usable.len());
        let start = usable.len() - period;
        usable[start..].iter().sum::<f64>() / period as f64
    }
}
