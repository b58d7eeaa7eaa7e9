//! Computed property functions.
//!
//! Each function receives the already-resolved base value. An `empty` base
//! yields `empty`; inputs the function cannot consume are errors.

use crate::resolve::{ResolveError, Value};
use composer_schema::{Computed, ComputedFunction, Dimension, ExactValue, Unit};

pub fn apply(computed: &Computed, base: Value) -> Result<Value, ResolveError> {
    let function = computed.function;
    let factor = computed
        .input
        .factor
        .unwrap_or_else(|| function.default_factor());

    match (function, base) {
        (_, Value::Empty) => Ok(Value::Empty),
        (ComputedFunction::Match, value) => Ok(value),
        (ComputedFunction::AutoFit, Value::Exact(value)) => scale(function, value, factor, false),
        (ComputedFunction::OpticalPadding, Value::Exact(value)) => {
            scale(function, value, factor, true)
        }
        (ComputedFunction::HighContrastColor, Value::Exact(ExactValue::Text(color))) => {
            high_contrast(&color).map(|c| Value::Exact(ExactValue::Text(c.to_string())))
        }
        (function, other) => Err(unsupported(function, &other)),
    }
}

fn unsupported(function: ComputedFunction, value: &Value) -> ResolveError {
    ResolveError::UnsupportedInput {
        function: function.name(),
        value: value.to_string(),
    }
}

fn scale(
    function: ComputedFunction,
    value: ExactValue,
    factor: f64,
    round_px: bool,
) -> Result<Value, ResolveError> {
    match value {
        ExactValue::Number(n) => Ok(Value::Exact(ExactValue::Number(n * factor))),
        ExactValue::Dimension(dimension) => {
            if let Some(units) = function.accepted_units() {
                if !units.contains(&dimension.unit) {
                    return Err(ResolveError::UnsupportedUnit {
                        function: function.name(),
                        unit: dimension.unit,
                    });
                }
            }

            let mut scaled = dimension.value * factor;
            if round_px && dimension.unit == Unit::Px {
                scaled = scaled.round();
            }
            Ok(Value::Exact(ExactValue::Dimension(Dimension::new(
                scaled,
                dimension.unit,
            ))))
        }
        other => Err(unsupported(function, &Value::Exact(other))),
    }
}

/// Black or white, whichever reads better on `color` (`#rgb` / `#rrggbb`)
fn high_contrast(color: &str) -> Result<&'static str, ResolveError> {
    let invalid = || ResolveError::UnsupportedInput {
        function: ComputedFunction::HighContrastColor.name(),
        value: color.to_string(),
    };

    let hex = color.strip_prefix('#').ok_or_else(invalid)?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return Err(invalid()),
    };

    let mut channels = [0f64; 3];
    for (i, channel) in channels.iter_mut().enumerate() {
        let byte = u8::from_str_radix(&expanded[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        *channel = linearize(byte as f64 / 255.0);
    }

    let luminance = 0.2126 * channels[0] + 0.7152 * channels[1] + 0.0722 * channels[2];
    Ok(if luminance > 0.179 { "#000000" } else { "#ffffff" })
}

fn linearize(c: f64) -> f64 {
    if c <= 0.03928 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}
