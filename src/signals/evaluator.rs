// =============================================================================
// Signal Evaluator - the rulebook
// =============================================================================
//
// Each rule inspects the latest bar (and the previous bar for crossovers)
// and returns:
//   - `None` when its indicators are still warming up (the rule is skipped
//     and contributes zero to the composite), or
//   - exactly one `Signal`: buy / sell when it fires, neutral otherwise.
//
// | rule       | category   | fires when                                        |
// |------------|------------|---------------------------------------------------|
// | ma_cross   | trend      | short MA crosses the long MA                      |
// | ma_trend   | trend      | close > MA5 > MA10 > MA20 (or the mirror)         |
// | macd       | momentum   | histogram zero-cross, else MACD/hist agreement    |
// | rsi        | momentum   | RSI above overbought / below oversold             |
// | kdj        | momentum   | K and D both overbought / oversold                |
// | bollinger  | volatility | close outside the bands                           |
// | supertrend | trend      | direction flipped on the latest bar               |
// | ichimoku   | trend      | close outside the cloud (tenkan/kijun fallback)   |
// | dmi        | trend      | ADX at or above the trend threshold               |
//
// Every threshold and strength constant comes from `SignalThresholds`.
// =============================================================================

use tracing::debug;

use crate::indicators::supertrend::TrendDirection;
use crate::indicators::{latest, previous, IndicatorBundle};
use crate::runtime_config::SignalThresholds;
use crate::types::{Direction, SignalCategory};

use super::signal::{Signal, SignalSet};

type Rule = fn(&IndicatorBundle, &SignalThresholds) -> Option<Signal>;

/// Rule names in evaluation order.
pub const RULEBOOK: [(&str, Rule); 9] = [
    ("ma_cross", ma_cross),
    ("ma_trend", ma_trend),
    ("macd", macd_rule),
    ("rsi", rsi_rule),
    ("kdj", kdj_rule),
    ("bollinger", bollinger_rule),
    ("supertrend", supertrend_rule),
    ("ichimoku", ichimoku_rule),
    ("dmi", dmi_rule),
];

/// Run every rule against the latest bar of `ind`.
pub fn evaluate(ind: &IndicatorBundle, th: &SignalThresholds) -> SignalSet {
    let mut set = SignalSet::new();
    for (name, rule) in RULEBOOK {
        let outcome = rule(ind, th);
        if outcome.is_none() {
            debug!(rule = name, bars = ind.len(), "rule skipped: insufficient history");
        }
        set.record(outcome);
    }
    if set.is_empty() {
        debug!(bars = ind.len(), "no rule had enough history");
    }
    set
}

/// Percentage distance of `a` above `b`.
fn spread_pct(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        0.0
    } else {
        (a - b).abs() / b.abs() * 100.0
    }
}

// =============================================================================
// Trend rules
// =============================================================================

fn ma_cross(ind: &IndicatorBundle, th: &SignalThresholds) -> Option<Signal> {
    const NAME: &str = "ma_cross";
    let (cur_s, cur_l) = (latest(&ind.ma_short)?, latest(&ind.ma_long)?);
    let (prev_s, prev_l) = (previous(&ind.ma_short)?, previous(&ind.ma_long)?);
    let strength = th.ma_cross_base_strength + spread_pct(cur_s, cur_l) * th.spread_gain;

    let signal = if prev_s <= prev_l && cur_s > cur_l {
        Signal::new(
            NAME,
            Direction::Buy,
            strength,
            SignalCategory::Trend,
            "golden cross: short MA crossed above long MA",
        )
    } else if prev_s >= prev_l && cur_s < cur_l {
        Signal::new(
            NAME,
            Direction::Sell,
            strength,
            SignalCategory::Trend,
            "death cross: short MA crossed below long MA",
        )
    } else {
        Signal::neutral(NAME, SignalCategory::Trend, "no moving-average crossover")
    };
    Some(signal)
}

fn ma_trend(ind: &IndicatorBundle, th: &SignalThresholds) -> Option<Signal> {
    const NAME: &str = "ma_trend";
    let close = *ind.closes.last()?;
    let (short, mid, long) = (
        latest(&ind.ma_short)?,
        latest(&ind.ma_mid)?,
        latest(&ind.ma_long)?,
    );
    let strength = spread_pct(short, long) * th.spread_gain;

    let signal = if close > short && short > mid && mid > long {
        Signal::new(
            NAME,
            Direction::Buy,
            strength,
            SignalCategory::Trend,
            "bullish alignment: price above rising MA stack",
        )
    } else if close < short && short < mid && mid < long {
        Signal::new(
            NAME,
            Direction::Sell,
            strength,
            SignalCategory::Trend,
            "bearish alignment: price below falling MA stack",
        )
    } else {
        Signal::neutral(NAME, SignalCategory::Trend, "moving averages not aligned")
    };
    Some(signal)
}

fn supertrend_rule(ind: &IndicatorBundle, th: &SignalThresholds) -> Option<Signal> {
    const NAME: &str = "supertrend";
    let point = ind.supertrend.latest()?;
    let close = *ind.closes.last()?;
    let atr = latest(&ind.supertrend.atr)?;
    let strength = if atr > 0.0 {
        (close - point.value).abs() / atr * th.supertrend_atr_gain
    } else {
        0.0
    };

    let signal = match (point.flipped, point.direction) {
        (true, TrendDirection::Up) => Signal::new(
            NAME,
            Direction::Buy,
            strength,
            SignalCategory::Trend,
            "SuperTrend flipped to uptrend",
        ),
        (true, TrendDirection::Down) => Signal::new(
            NAME,
            Direction::Sell,
            strength,
            SignalCategory::Trend,
            "SuperTrend flipped to downtrend",
        ),
        (false, TrendDirection::Up) => {
            Signal::neutral(NAME, SignalCategory::Trend, "uptrend continues, no flip")
        }
        (false, TrendDirection::Down) => {
            Signal::neutral(NAME, SignalCategory::Trend, "downtrend continues, no flip")
        }
    };
    Some(signal)
}

fn ichimoku_rule(ind: &IndicatorBundle, th: &SignalThresholds) -> Option<Signal> {
    const NAME: &str = "ichimoku";
    let close = *ind.closes.last()?;
    let i = ind.len().checked_sub(1)?;

    if let Some((top, bottom)) = ind.ichimoku.cloud_at(i) {
        let signal = if close > top {
            Signal::new(
                NAME,
                Direction::Buy,
                th.ichimoku_cloud_base_strength + spread_pct(close, top) * th.spread_gain,
                SignalCategory::Trend,
                "price above the cloud",
            )
        } else if close < bottom {
            Signal::new(
                NAME,
                Direction::Sell,
                th.ichimoku_cloud_base_strength + spread_pct(close, bottom) * th.spread_gain,
                SignalCategory::Trend,
                "price below the cloud",
            )
        } else {
            Signal::neutral(NAME, SignalCategory::Trend, "price inside the cloud")
        };
        return Some(signal);
    }

    // Cloud not yet projected onto the latest bar: fall back to tenkan/kijun.
    let tenkan = latest(&ind.ichimoku.tenkan)?;
    let kijun = latest(&ind.ichimoku.kijun)?;
    let signal = if close > kijun && tenkan > kijun {
        Signal::new(
            NAME,
            Direction::Buy,
            th.ichimoku_kijun_strength,
            SignalCategory::Trend,
            "price and tenkan above kijun",
        )
    } else if close < kijun && tenkan < kijun {
        Signal::new(
            NAME,
            Direction::Sell,
            th.ichimoku_kijun_strength,
            SignalCategory::Trend,
            "price and tenkan below kijun",
        )
    } else {
        Signal::neutral(NAME, SignalCategory::Trend, "tenkan/kijun undecided")
    };
    Some(signal)
}

fn dmi_rule(ind: &IndicatorBundle, th: &SignalThresholds) -> Option<Signal> {
    const NAME: &str = "dmi";
    let adx = latest(&ind.adx.adx)?;
    let plus_di = latest(&ind.adx.plus_di)?;
    let minus_di = latest(&ind.adx.minus_di)?;

    let signal = if adx >= th.adx_trend && plus_di > minus_di {
        Signal::new(
            NAME,
            Direction::Buy,
            adx,
            SignalCategory::Trend,
            format!("strong trend (ADX {adx:.1}) with +DI leading"),
        )
    } else if adx >= th.adx_trend && minus_di > plus_di {
        Signal::new(
            NAME,
            Direction::Sell,
            adx,
            SignalCategory::Trend,
            format!("strong trend (ADX {adx:.1}) with -DI leading"),
        )
    } else {
        Signal::neutral(
            NAME,
            SignalCategory::Trend,
            format!("no dominant trend (ADX {adx:.1})"),
        )
    };
    Some(signal)
}

// =============================================================================
// Momentum rules
// =============================================================================

fn macd_rule(ind: &IndicatorBundle, th: &SignalThresholds) -> Option<Signal> {
    const NAME: &str = "macd";
    let line = latest(&ind.macd.macd)?;
    let hist = latest(&ind.macd.histogram)?;
    let prev_hist = previous(&ind.macd.histogram)?;

    let signal = if prev_hist <= 0.0 && hist > 0.0 {
        Signal::new(
            NAME,
            Direction::Buy,
            th.macd_cross_strength,
            SignalCategory::Momentum,
            "MACD crossed above signal line",
        )
    } else if prev_hist >= 0.0 && hist < 0.0 {
        Signal::new(
            NAME,
            Direction::Sell,
            th.macd_cross_strength,
            SignalCategory::Momentum,
            "MACD crossed below signal line",
        )
    } else if line > 0.0 && hist > 0.0 {
        Signal::new(
            NAME,
            Direction::Buy,
            th.macd_trend_strength,
            SignalCategory::Momentum,
            "MACD positive and above signal",
        )
    } else if line < 0.0 && hist < 0.0 {
        Signal::new(
            NAME,
            Direction::Sell,
            th.macd_trend_strength,
            SignalCategory::Momentum,
            "MACD negative and below signal",
        )
    } else {
        Signal::neutral(NAME, SignalCategory::Momentum, "MACD momentum mixed")
    };
    Some(signal)
}

fn rsi_rule(ind: &IndicatorBundle, th: &SignalThresholds) -> Option<Signal> {
    const NAME: &str = "rsi";
    let value = latest(&ind.rsi)?;
    let strength = (value - 50.0).abs() * th.rsi_strength_gain;

    let signal = if value > th.rsi_overbought {
        Signal::new(
            NAME,
            Direction::Sell,
            strength,
            SignalCategory::Momentum,
            format!("overbought (RSI {value:.1})"),
        )
    } else if value < th.rsi_oversold {
        Signal::new(
            NAME,
            Direction::Buy,
            strength,
            SignalCategory::Momentum,
            format!("oversold (RSI {value:.1})"),
        )
    } else {
        Signal::neutral(
            NAME,
            SignalCategory::Momentum,
            format!("RSI {value:.1} within range"),
        )
    };
    Some(signal)
}

fn kdj_rule(ind: &IndicatorBundle, th: &SignalThresholds) -> Option<Signal> {
    const NAME: &str = "kdj";
    let k = latest(&ind.kdj.k)?;
    let d = latest(&ind.kdj.d)?;
    let strength = (k - 50.0).abs() * th.kdj_strength_gain;

    let signal = if k > th.kdj_overbought && d > th.kdj_overbought {
        Signal::new(
            NAME,
            Direction::Sell,
            strength,
            SignalCategory::Momentum,
            format!("KDJ overbought (K {k:.1}, D {d:.1})"),
        )
    } else if k < th.kdj_oversold && d < th.kdj_oversold {
        Signal::new(
            NAME,
            Direction::Buy,
            strength,
            SignalCategory::Momentum,
            format!("KDJ oversold (K {k:.1}, D {d:.1})"),
        )
    } else {
        Signal::neutral(NAME, SignalCategory::Momentum, "KDJ within range")
    };
    Some(signal)
}

// =============================================================================
// Volatility rules
// =============================================================================

fn bollinger_rule(ind: &IndicatorBundle, th: &SignalThresholds) -> Option<Signal> {
    const NAME: &str = "bollinger";
    let close = *ind.closes.last()?;
    let upper = latest(&ind.bollinger.upper)?;
    let middle = latest(&ind.bollinger.middle)?;
    let lower = latest(&ind.bollinger.lower)?;
    let half_width = upper - middle;
    let overshoot_strength = |overshoot: f64| {
        if half_width > 0.0 {
            th.bollinger_base_strength + overshoot / half_width * 50.0
        } else {
            th.bollinger_base_strength
        }
    };

    let signal = if close > upper {
        Signal::new(
            NAME,
            Direction::Sell,
            overshoot_strength(close - upper),
            SignalCategory::Volatility,
            "close above upper band",
        )
    } else if close < lower {
        Signal::new(
            NAME,
            Direction::Buy,
            overshoot_strength(lower - close),
            SignalCategory::Volatility,
            "close below lower band",
        )
    } else {
        Signal::neutral(NAME, SignalCategory::Volatility, "close within bands")
    };
    Some(signal)
}
