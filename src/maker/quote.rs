//! Quote Calculator
//!
//! Pure mapping from inventory skew to the desired buy/sell widths and
//! sizes. No I/O; calling it twice with the same inputs gives the same plan,
//! which is what change detection relies on.

use crate::config::{MakerConfig, SpreadMode};
use crate::exchange::{Quote, Side};

/// Widths never go below this, so quotes neither cross nor collapse onto the mid.
pub const MIN_SPREAD_WIDTH: f64 = 0.01;
/// Smallest fraction of base size a side can shrink to.
pub const MIN_SIZE_MULTIPLIER: f64 = 0.2;
/// Bounds applied to a model-predicted width before use.
pub const PREDICTED_WIDTH_MIN: f64 = 0.001;
pub const PREDICTED_WIDTH_MAX: f64 = 0.20;

/// Width and size for one side of the book
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideParams {
    /// Distance from midpoint
    pub width: f64,
    pub size: f64,
}

/// Desired quote set: exactly one buy and one sell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotePlan {
    pub buy: SideParams,
    pub sell: SideParams,
}

impl QuotePlan {
    pub fn side(&self, side: Side) -> SideParams {
        match side {
            Side::Buy => self.buy,
            Side::Sell => self.sell,
        }
    }

    /// Price the plan around a fresh midpoint.
    ///
    /// The sell always ends at least one tick above the buy, even when both
    /// sides were clamped against the same edge of the price range.
    pub fn quotes(&self, midpoint: f64, tick: f64) -> [Quote; 2] {
        let mut buy = clamp_price(floor_to_tick(midpoint - self.buy.width, tick), tick);
        let mut sell = clamp_price(ceil_to_tick(midpoint + self.sell.width, tick), tick);

        if sell - buy < tick - TICK_EPS {
            if sell - tick >= tick - TICK_EPS {
                buy = snap(sell - tick);
            } else {
                sell = snap(buy + tick);
            }
        }

        [
            Quote {
                side: Side::Buy,
                price: buy,
                size: self.buy.size,
            },
            Quote {
                side: Side::Sell,
                price: sell,
                size: self.sell.size,
            },
        ]
    }
}

/// `skew / max_position`
pub fn skew_ratio(config: &MakerConfig, skew: f64) -> f64 {
    skew / config.max_position
}

/// Compute the desired quote set.
///
/// `predicted_width` overrides `base_spread_width` (after clamping to the
/// predicted-width bounds) before any skew adjustment.
pub fn calculate(config: &MakerConfig, skew: f64, predicted_width: Option<f64>) -> QuotePlan {
    let r = skew_ratio(config, skew);
    let base_width = match predicted_width {
        Some(w) => w.clamp(PREDICTED_WIDTH_MIN, PREDICTED_WIDTH_MAX),
        None => config.base_spread_width,
    };

    let (buy_width, sell_width) = match (config.spread_mode, config.skew_adjustment) {
        (SpreadMode::Asymmetric, Some(adj)) => (
            (base_width + r * adj).max(MIN_SPREAD_WIDTH),
            (base_width - r * adj).max(MIN_SPREAD_WIDTH),
        ),
        _ => {
            let w = base_width.max(MIN_SPREAD_WIDTH);
            (w, w)
        }
    };

    // Long inventory shrinks the buy side and grows the sell side.
    let buy_size = side_size(config, 1.0 - r);
    let sell_size = side_size(config, 1.0 + r);

    QuotePlan {
        buy: SideParams {
            width: buy_width,
            size: buy_size,
        },
        sell: SideParams {
            width: sell_width,
            size: sell_size,
        },
    }
}

fn side_size(config: &MakerConfig, multiplier: f64) -> f64 {
    let raw = config.base_order_size * multiplier.max(MIN_SIZE_MULTIPLIER);
    raw.round_ties_even().max(config.min_order_size)
}

// ═══════════════════════════════════════════════════════════════════
// TICK HELPERS
// ═══════════════════════════════════════════════════════════════════

const TICK_EPS: f64 = 1e-9;

fn snap(price: f64) -> f64 {
    (price * 1e6).round() / 1e6
}

pub fn floor_to_tick(price: f64, tick: f64) -> f64 {
    snap((price / tick + TICK_EPS).floor() * tick)
}

pub fn ceil_to_tick(price: f64, tick: f64) -> f64 {
    snap((price / tick - TICK_EPS).ceil() * tick)
}

/// Outcome tokens trade strictly inside (0, 1).
pub fn clamp_price(price: f64, tick: f64) -> f64 {
    snap(price.clamp(tick, 1.0 - tick))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> MakerConfig {
        MakerConfig::new("0xmarket", "token", 10.0)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_zero_skew_is_symmetric_baseline() {
        let c = cfg();
        let plan = calculate(&c, 0.0, None);
        assert_eq!(plan.buy.size, c.base_order_size);
        assert_eq!(plan.sell.size, c.base_order_size);
        assert!(approx(plan.buy.width, c.base_spread_width));
        assert!(approx(plan.sell.width, c.base_spread_width));
    }

    #[test]
    fn test_sizes_respect_floor_and_multiplier_clamp() {
        let mut c = cfg();
        c.base_order_size = 20.0;
        c.min_order_size = 2.0;
        for i in -99..100 {
            let skew = i as f64; // r in (-1, 1)
            let plan = calculate(&c, skew, None);
            assert!(plan.buy.size >= c.min_order_size);
            assert!(plan.sell.size >= c.min_order_size);
            // multiplier floor 0.2 of 20 = 4
            assert!(plan.buy.size >= 4.0);
            assert!(plan.sell.size >= 4.0);
        }
        let heavy_long = calculate(&c, 95.0, None);
        assert_eq!(heavy_long.buy.size, 4.0);
        assert_eq!(heavy_long.sell.size, 39.0);
    }

    #[test]
    fn test_small_skew_shifts_multipliers() {
        let mut c = cfg();
        c.base_order_size = 100.0;
        c.min_order_size = 1.0;
        let plan = calculate(&c, 5.0, None);
        assert_eq!(plan.buy.size, 95.0);
        assert_eq!(plan.sell.size, 105.0);

        // with the defaults both sides stay at the minimum of 5
        let plan = calculate(&cfg(), 5.0, None);
        assert_eq!((plan.buy.size, plan.sell.size), (5.0, 5.0));
    }

    #[test]
    fn test_asymmetric_widths() {
        let mut c = cfg();
        c.spread_mode = SpreadMode::Asymmetric;
        c.skew_adjustment = Some(0.05);
        let plan = calculate(&c, 50.0, None);
        assert!(approx(plan.buy.width, 0.075));
        assert!(approx(plan.sell.width, 0.025));

        // sell side floors at the minimum width
        let plan = calculate(&c, 100.0, None);
        assert!(approx(plan.sell.width, MIN_SPREAD_WIDTH));
    }

    #[test]
    fn test_symmetric_mode_ignores_coefficient() {
        let mut c = cfg();
        c.skew_adjustment = Some(0.05);
        let plan = calculate(&c, 50.0, None);
        assert!(approx(plan.buy.width, plan.sell.width));
    }

    #[test]
    fn test_predicted_width_overrides_and_clamps() {
        let c = cfg();
        assert!(approx(calculate(&c, 0.0, Some(0.08)).buy.width, 0.08));
        assert!(approx(calculate(&c, 0.0, Some(0.9)).buy.width, PREDICTED_WIDTH_MAX));
        // clamped to 0.001 then floored at the minimum spread width
        assert!(approx(calculate(&c, 0.0, Some(0.0)).sell.width, MIN_SPREAD_WIDTH));
    }

    #[test]
    fn test_calculation_is_pure() {
        let mut c = cfg();
        c.spread_mode = SpreadMode::Asymmetric;
        c.skew_adjustment = Some(0.03);
        for skew in [-40.0, -3.3, 0.0, 12.5, 77.0] {
            assert_eq!(calculate(&c, skew, Some(0.04)), calculate(&c, skew, Some(0.04)));
        }
    }

    #[test]
    fn test_quotes_around_midpoint() {
        let plan = calculate(&cfg(), 0.0, None);
        let [buy, sell] = plan.quotes(0.5, 0.01);
        assert_eq!(buy.side, Side::Buy);
        assert!(approx(buy.price, 0.45));
        assert!(approx(sell.price, 0.55));
        assert_eq!((buy.size, sell.size), (5.0, 5.0));
    }

    #[test]
    fn test_quotes_stay_inside_unit_interval() {
        let plan = calculate(&cfg(), 0.0, None);
        let [buy, _] = plan.quotes(0.03, 0.01);
        assert!(approx(buy.price, 0.01));
        let [_, sell] = plan.quotes(0.97, 0.01);
        assert!(approx(sell.price, 0.99));
    }

    #[test]
    fn test_coarse_tick_near_edges_keeps_one_tick_apart() {
        let mut c = cfg();
        c.tick_size = 0.05;
        c.base_spread_width = 0.01;
        let plan = calculate(&c, 0.0, None);

        // both sides clamp to 0.95 at the top
        let [buy, sell] = plan.quotes(0.97, 0.05);
        assert!(approx(buy.price, 0.90));
        assert!(approx(sell.price, 0.95));

        // and to 0.05 at the bottom
        let [buy, sell] = plan.quotes(0.03, 0.05);
        assert!(approx(buy.price, 0.05));
        assert!(approx(sell.price, 0.10));
    }

    #[test]
    fn test_quotes_never_cross_across_midpoints() {
        for tick in [0.01, 0.05, 0.1] {
            let mut c = cfg();
            c.tick_size = tick;
            c.base_spread_width = 0.01;
            let plan = calculate(&c, 0.0, None);
            for i in 1..100 {
                let [buy, sell] = plan.quotes(i as f64 / 100.0, tick);
                assert!(sell.price - buy.price >= tick - 1e-9, "tick {tick} mid {i}");
                assert!(buy.price >= tick - 1e-9 && sell.price <= 1.0 - tick + 1e-9);
            }
        }
    }

    #[test]
    fn test_tick_rounding_direction() {
        assert!(approx(floor_to_tick(0.4567, 0.01), 0.45));
        assert!(approx(ceil_to_tick(0.5433, 0.01), 0.55));
        assert!(approx(floor_to_tick(0.45, 0.01), 0.45));
        assert!(approx(ceil_to_tick(0.55, 0.01), 0.55));
    }
}
