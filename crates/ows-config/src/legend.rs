//! Colour ramps and legends of styles
//!
//! A legend's ticks become metadata keys (`lbl_<tick>`) and are matched
//! against `tick_labels` by their text, so tick values are exact decimals
//! that print the way they were written: `"0.50"` stays `0.50`, a float
//! `1.0` prints as `1`, and adding `0.2` to `0` gives `0.2`.
//!
//! ```json
//! "color_ramp": [
//!     {"value": -0.00001, "color": "#000000", "alpha": 0.0},
//!     {"value": 0.0, "color": "#000000"},
//!     {"value": 1.0, "color": "#00FF00"}
//! ],
//! "legend": {"ticks_every": 0.2, "decimal_places": 1, "units": "NDVI"}
//! ```
//!
//! Legend `begin`/`end` default to the first and last opaque ramp values.

use std::cmp::Ordering;
use std::fmt;

use serde_json::Value;

use crate::node::{CfgMap, kind, opt_str};
use crate::{ConfigError, Result};

/// An exact decimal: `digits * 10^-scale`.
#[derive(Debug, Clone, Copy)]
pub struct TickValue {
    digits: i128,
    scale: u32,
}

impl TickValue {
    pub const ZERO: Self = Self {
        digits: 0,
        scale: 0,
    };

    /// Parse decimal text such as `12`, `-0.50` or `2.5e-3`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (mantissa, exponent) = match text.find(['e', 'E']) {
            Some(pos) => (&text[..pos], text[pos + 1..].parse::<i64>().ok()?),
            None => (text, 0),
        };
        let (negative, unsigned) = match mantissa.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, mantissa.strip_prefix('+').unwrap_or(mantissa)),
        };
        let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }

        let mut digits: i128 = 0;
        for c in int_part.chars().chain(frac_part.chars()) {
            let d = c.to_digit(10)?;
            digits = digits.checked_mul(10)?.checked_add(i128::from(d))?;
        }
        if negative {
            digits = -digits;
        }

        let scale = i64::try_from(frac_part.len()).ok()? - exponent;
        if scale >= 0 {
            Some(Self {
                digits,
                scale: u32::try_from(scale).ok()?,
            })
        } else {
            let factor = pow10(u32::try_from(-scale).ok()?)?;
            Some(Self {
                digits: digits.checked_mul(factor)?,
                scale: 0,
            })
        }
    }

    /// The shortest decimal that round-trips `value`.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        Self::parse(&format!("{value}"))
    }

    /// A configured number or numeric string. Strings keep their exact
    /// form; floats are taken at their shortest representation.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) if n.is_f64() => n.as_f64().and_then(Self::from_f64),
            Value::Number(n) => Self::parse(&n.to_string()),
            Value::String(s) => Self::parse(s),
            _ => None,
        }
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        let scale = self.scale.max(other.scale);
        let a = self.rescaled(scale)?;
        let b = other.rescaled(scale)?;
        Some(Self {
            digits: a.checked_add(b)?,
            scale,
        })
    }

    /// Round half away from zero to exactly `places` decimal places.
    pub fn quantize(self, places: u32) -> Option<Self> {
        let digits = if places >= self.scale {
            self.rescaled(places)?
        } else {
            round_half_up(self.digits, pow10(self.scale - places)?)
        };
        Some(Self {
            digits,
            scale: places,
        })
    }

    pub fn as_f64(self) -> f64 {
        self.digits as f64 / 10f64.powi(self.scale as i32)
    }

    /// Digits at a larger scale.
    fn rescaled(self, scale: u32) -> Option<i128> {
        self.digits.checked_mul(pow10(scale - self.scale)?)
    }
}

fn pow10(exp: u32) -> Option<i128> {
    10i128.checked_pow(exp)
}

/// `num / den` rounded half away from zero; `den` is positive.
fn round_half_up(num: i128, den: i128) -> i128 {
    let q = num / den;
    let r = (num % den).abs();
    if r * 2 >= den { q + num.signum() } else { q }
}

impl PartialEq for TickValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TickValue {}

impl PartialOrd for TickValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TickValue {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        match (self.rescaled(scale), other.rescaled(scale)) {
            (Some(a), Some(b)) => a.cmp(&b),
            // Out of range at the common scale: compare in floating point.
            _ => self.as_f64().total_cmp(&other.as_f64()),
        }
    }
}

/// Plain notation, switching to scientific below `1E-6` as decimal
/// arithmetic conventionally prints.
impl fmt::Display for TickValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.digits < 0 { "-" } else { "" };
        let coefficient = self.digits.unsigned_abs().to_string();
        let scale = self.scale as usize;
        let adjusted = coefficient.len() as i64 - 1 - self.scale as i64;

        if adjusted < -6 {
            let (head, tail) = coefficient.split_at(1);
            let point = if tail.is_empty() { "" } else { "." };
            return write!(f, "{sign}{head}{point}{tail}E{adjusted}");
        }
        if scale == 0 {
            write!(f, "{sign}{coefficient}")
        } else if coefficient.len() > scale {
            let (int_part, frac_part) = coefficient.split_at(coefficient.len() - scale);
            write!(f, "{sign}{int_part}.{frac_part}")
        } else {
            let zeros = "0".repeat(scale - coefficient.len());
            write!(f, "{sign}0.{zeros}{coefficient}")
        }
    }
}

/// One stop of a colour ramp.
#[derive(Debug, Clone, PartialEq)]
pub struct RampStop {
    pub value: TickValue,
    pub color: String,
    pub alpha: f64,
}

const DEFAULT_RAMP: &[(f64, &str, f64)] = &[
    (-1e-24, "#000080", 0.0),
    (0.0, "#000080", 1.0),
    (0.1, "#0000FF", 1.0),
    (0.3, "#00FFFF", 1.0),
    (0.5, "#00FF00", 1.0),
    (0.7, "#FFFF00", 1.0),
    (0.9, "#FF0000", 1.0),
    (1.0, "#800000", 1.0),
];

/// The colour ramp of a style: `color_ramp` as given, or the default ramp
/// scaled over `range`. `None` for styles with neither.
pub fn parse_ramp(cfg: &CfgMap, context: &str) -> Result<Option<Vec<RampStop>>> {
    if let Some(ramp) = cfg.get("color_ramp") {
        let Some(stops) = ramp.as_array().filter(|s| !s.is_empty()) else {
            return Err(ConfigError::invalid(format!(
                "{context}: color_ramp must be a non-empty list"
            )));
        };
        return stops
            .iter()
            .map(|stop| ramp_stop(stop, context))
            .collect::<Result<Vec<_>>>()
            .map(Some);
    }
    let Some(range) = cfg.get("range") else {
        return Ok(None);
    };
    let bounds = range
        .as_array()
        .filter(|r| r.len() == 2)
        .and_then(|r| Some((number_f64(&r[0])?, number_f64(&r[1])?)));
    let Some((rmin, rmax)) = bounds else {
        return Err(ConfigError::invalid(format!(
            "{context}: range must be a list of two numbers"
        )));
    };

    DEFAULT_RAMP
        .iter()
        .map(|&(unscaled, color, alpha)| {
            let value = TickValue::from_f64((rmax - rmin) * unscaled + rmin).ok_or_else(|| {
                ConfigError::invalid(format!("{context}: range {rmin}..{rmax} is not representable"))
            })?;
            Ok(RampStop {
                value,
                color: color.to_string(),
                alpha,
            })
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn ramp_stop(stop: &Value, context: &str) -> Result<RampStop> {
    let Some(map) = stop.as_object() else {
        return Err(ConfigError::invalid(format!(
            "{context}: color_ramp entries must be mappings, got {}",
            kind(stop)
        )));
    };
    if map.contains_key("legend") {
        return Err(legacy_format(context));
    }
    let value = map
        .get("value")
        .ok_or_else(|| ConfigError::missing(format!("Color ramp entry of {context}"), "value"))
        .and_then(|v| decimal(v, "value", context))?;
    let color = opt_str(map, "color", context)?
        .ok_or_else(|| ConfigError::missing(format!("Color ramp entry of {context}"), "color"))?;
    let alpha = match map.get("alpha") {
        None => 1.0,
        Some(v) => number_f64(v).ok_or_else(|| {
            ConfigError::invalid(format!("{context}: alpha must be a number"))
        })?,
    };
    Ok(RampStop {
        value,
        color: color.to_string(),
        alpha,
    })
}

fn number_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn decimal(value: &Value, key: &str, context: &str) -> Result<TickValue> {
    TickValue::from_json(value).ok_or_else(|| {
        ConfigError::invalid(format!("{context}: {key} must be a decimal number, got {value}"))
    })
}

fn legacy_format(subject: &str) -> ConfigError {
    ConfigError::invalid(format!(
        "{subject} uses a no-longer supported format for legend configuration. \
         Please refer to the documentation and update your config"
    ))
}

fn is_opaque(stop: &&RampStop) -> bool {
    (stop.alpha - 1.0).abs() <= 1e-9
}

/// Legend configuration of a style.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Legend {
    pub units: Option<String>,
    pub begin: Option<TickValue>,
    pub end: Option<TickValue>,
    pub decimal_places: u32,
    /// Tick positions, as text.
    pub ticks: Vec<String>,
    /// Configured label for each tick, parallel to `ticks`.
    pub tick_labels: Vec<String>,
}

enum TickSpec {
    Every(TickValue),
    Explicit(Vec<TickValue>),
    Count(u64),
}

impl Legend {
    /// Parse a legend, taking default bounds from the style's ramp.
    pub fn parse(cfg: &CfgMap, style: &str, ramp: Option<&[RampStop]>) -> Result<Self> {
        let context = format!("Legend of style {style}");
        if ["major_ticks", "offset", "scale_by", "radix_point"]
            .iter()
            .any(|k| cfg.contains_key(*k))
        {
            return Err(legacy_format(&format!("Style {style}")));
        }

        let decimal_places = match cfg.get("decimal_places") {
            None => 1,
            Some(v) => v
                .as_u64()
                .and_then(|d| u32::try_from(d).ok())
                .ok_or_else(|| ConfigError::invalid("decimal_places cannot be negative"))?,
        };

        let spec = match (cfg.get("ticks"), cfg.get("ticks_every"), cfg.get("tick_count")) {
            (_, Some(_), Some(_)) => {
                return Err(ConfigError::conflicting(
                    "Cannot use tick count and ticks_every in the same legend",
                ));
            }
            (Some(_), Some(_), _) => {
                return Err(ConfigError::conflicting(
                    "Cannot use ticks and ticks_every in the same legend",
                ));
            }
            (Some(_), _, Some(_)) => {
                return Err(ConfigError::conflicting(
                    "Cannot use tick count and ticks in the same legend",
                ));
            }
            (None, Some(every), None) => {
                let every = decimal(every, "ticks_every", &context)?;
                if every <= TickValue::ZERO {
                    return Err(ConfigError::invalid("ticks_every must be greater than zero"));
                }
                TickSpec::Every(every)
            }
            (Some(Value::Array(ticks)), None, None) => TickSpec::Explicit(
                ticks
                    .iter()
                    .map(|t| decimal(t, "ticks", &context))
                    .collect::<Result<Vec<_>>>()?,
            ),
            (Some(other), None, None) => {
                return Err(ConfigError::invalid(format!(
                    "{context}: 'ticks' must be a list, got {}",
                    kind(other)
                )));
            }
            (None, None, count) => {
                let count = match count {
                    None => 1,
                    Some(v) => v.as_i64().ok_or_else(|| {
                        ConfigError::invalid(format!("{context}: tick_count must be an integer"))
                    })?,
                };
                let count = u64::try_from(count)
                    .map_err(|_| ConfigError::invalid("tick_count cannot be negative"))?;
                TickSpec::Count(count)
            }
        };

        let begin = match cfg.get("begin") {
            Some(v) => Some(decimal(v, "begin", &context)?),
            None => ramp.and_then(|r| r.iter().find(is_opaque).or(r.first()).map(|s| s.value)),
        };
        let end = match cfg.get("end") {
            Some(v) => Some(decimal(v, "end", &context)?),
            None => ramp.and_then(|r| r.iter().rev().find(is_opaque).or(r.last()).map(|s| s.value)),
        };

        let ticks = match spec {
            TickSpec::Explicit(ticks) => {
                if let (Some(begin), Some(end)) = (begin, end) {
                    if ticks.iter().any(|t| *t < begin || *t > end) {
                        return Err(ConfigError::invalid(
                            "Explicit ticks must all be within legend begin/end range",
                        ));
                    }
                }
                ticks
            }
            TickSpec::Every(every) => {
                let begin = begin.ok_or_else(|| ConfigError::missing(context.as_str(), "begin"))?;
                let end = end.ok_or_else(|| ConfigError::missing(context.as_str(), "end"))?;
                let overflow = || ConfigError::invalid(format!("{context}: ticks out of range"));
                let mut ticks = Vec::new();
                let mut tick = begin;
                while tick < end {
                    ticks.push(tick);
                    tick = tick.checked_add(every).ok_or_else(overflow)?;
                }
                ticks.push(end);
                ticks
            }
            TickSpec::Count(count) => match (begin, end) {
                (Some(begin), Some(end)) => count_ticks(begin, end, count, decimal_places)
                    .ok_or_else(|| ConfigError::invalid(format!("{context}: ticks out of range")))?,
                // Without bounds there is nothing to divide.
                _ => Vec::new(),
            },
        };
        let ticks: Vec<String> = ticks.iter().map(TickValue::to_string).collect();

        let labels = cfg.get("tick_labels").and_then(Value::as_object);
        let affix = |entry: Option<&Value>, key: &str, fallback: &str| -> String {
            entry
                .and_then(|e| e.get(key))
                .and_then(Value::as_str)
                .unwrap_or(fallback)
                .to_string()
        };
        let default = labels.and_then(|l| l.get("default"));
        let default_prefix = affix(default, "prefix", "");
        let default_suffix = affix(default, "suffix", "");
        let tick_labels = ticks
            .iter()
            .map(|tick| {
                let entry = labels.and_then(|l| l.get(tick));
                format!(
                    "{}{}{}",
                    affix(entry, "prefix", &default_prefix),
                    affix(entry, "label", tick.as_str()),
                    affix(entry, "suffix", &default_suffix)
                )
            })
            .collect();

        Ok(Self {
            units: opt_str(cfg, "units", &context)?.map(str::to_string),
            begin,
            end,
            decimal_places,
            ticks,
            tick_labels,
        })
    }
}

/// `count` equal divisions of `begin..=end`, rounded to `places`.
/// A count of zero is just `begin`.
fn count_ticks(begin: TickValue, end: TickValue, count: u64, places: u32) -> Option<Vec<TickValue>> {
    if count == 0 {
        return Some(vec![begin]);
    }
    let scale = begin.scale.max(end.scale);
    let b = begin.rescaled(scale)?;
    let delta = end.rescaled(scale)?.checked_sub(b)?;
    let n = i128::from(count);
    let den = n.checked_mul(pow10(scale)?)?;
    let unit = pow10(places)?;
    (0..=n)
        .map(|i| {
            // (b + i * delta / n) / 10^scale, at `places` decimals.
            let num = b.checked_mul(n)?.checked_add(i.checked_mul(delta)?)?.checked_mul(unit)?;
            Some(TickValue {
                digits: round_half_up(num, den),
                scale: places,
            })
        })
        .collect()
}
