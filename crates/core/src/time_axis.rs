use num_bigint::BigInt;
use num_integer::Integer;

use crate::viewport::Viewport;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
/// Julian year.
const YEAR: i64 = 31_557_600;
const MONTH: i64 = YEAR / 12;

/// Hard stop for pathological spacing/scale combinations.
const MAX_TICKS: usize = 1_000;

/// A labelled major tick on the time axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub time: BigInt,
    pub x: f64,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickUnit {
    Second,
    Minute,
    Hour,
    Day,
    Month,
    Year,
    Kiloyear,
    Megayear,
    Gigayear,
}

impl TickUnit {
    fn seconds(self) -> i64 {
        match self {
            Self::Second => 1,
            Self::Minute => MINUTE,
            Self::Hour => HOUR,
            Self::Day => DAY,
            Self::Month => MONTH,
            Self::Year => YEAR,
            Self::Kiloyear => 1_000 * YEAR,
            Self::Megayear => 1_000_000 * YEAR,
            Self::Gigayear => 1_000_000_000 * YEAR,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::Second => "s",
            Self::Minute => "min",
            Self::Hour => "h",
            Self::Day => "d",
            Self::Month => "mo",
            Self::Year => "yr",
            Self::Kiloyear => "kyr",
            Self::Megayear => "Myr",
            Self::Gigayear => "Gyr",
        }
    }
}

const SUB_YEAR_STEPS: &[(i64, TickUnit)] = &[
    (1, TickUnit::Second),
    (2, TickUnit::Second),
    (5, TickUnit::Second),
    (10, TickUnit::Second),
    (15, TickUnit::Second),
    (30, TickUnit::Second),
    (MINUTE, TickUnit::Minute),
    (2 * MINUTE, TickUnit::Minute),
    (5 * MINUTE, TickUnit::Minute),
    (10 * MINUTE, TickUnit::Minute),
    (15 * MINUTE, TickUnit::Minute),
    (30 * MINUTE, TickUnit::Minute),
    (HOUR, TickUnit::Hour),
    (3 * HOUR, TickUnit::Hour),
    (6 * HOUR, TickUnit::Hour),
    (12 * HOUR, TickUnit::Hour),
    (DAY, TickUnit::Day),
    (2 * DAY, TickUnit::Day),
    (7 * DAY, TickUnit::Day),
    (MONTH, TickUnit::Month),
    (3 * MONTH, TickUnit::Month),
    (6 * MONTH, TickUnit::Month),
];

/// Every candidate major interval, ascending: the sub-year ladder followed by
/// 1, 2, 5 × 10^k years up to 50 Gyr.
fn nice_steps() -> impl Iterator<Item = (i64, TickUnit)> {
    let years = (0..=10u32).flat_map(|exp| {
        let unit = match exp {
            0..=2 => TickUnit::Year,
            3..=5 => TickUnit::Kiloyear,
            6..=8 => TickUnit::Megayear,
            _ => TickUnit::Gigayear,
        };
        [1i64, 2, 5].map(|m| (m * 10i64.pow(exp) * YEAR, unit))
    });
    SUB_YEAR_STEPS.iter().copied().chain(years)
}

/// Smallest nice interval of at least `raw_seconds`, or the largest one.
fn nice_interval(raw_seconds: f64) -> (i64, TickUnit) {
    let mut last = (1, TickUnit::Second);
    for step in nice_steps() {
        last = step;
        if step.0 as f64 >= raw_seconds {
            return step;
        }
    }
    last
}

/// Major ticks for the visible window, at least `min_spacing_px` apart,
/// aligned to multiples of the chosen interval (counted from time zero).
pub fn time_axis_ticks(viewport: &Viewport, min_spacing_px: f64) -> Vec<Tick> {
    if viewport.canvas_width == 0 || min_spacing_px.is_nan() || min_spacing_px <= 0.0 {
        return Vec::new();
    }

    let (interval, unit) = nice_interval(viewport.seconds_per_pixel() * min_spacing_px);
    let step = BigInt::from(interval);
    let end = viewport.end();

    let mut t = viewport.start.div_floor(&step) * &step;
    if t < viewport.start {
        t += &step;
    }

    let mut ticks = Vec::new();
    while t <= end && ticks.len() < MAX_TICKS {
        ticks.push(Tick {
            x: viewport.time_to_x(&t),
            label: format_time_label(&t, unit),
            time: t.clone(),
        });
        t += &step;
    }
    ticks
}

/// `t` in whole `unit`s. Tick times are multiples of their interval, which
/// is itself a multiple of its unit, so the division is exact.
fn format_time_label(t: &BigInt, unit: TickUnit) -> String {
    let value = t / BigInt::from(unit.seconds());
    format!("{value} {}", unit.suffix())
}
