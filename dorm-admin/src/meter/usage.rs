use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Utility {
    Water,
    Electric,
}

impl Utility {
    /// Prefix of the per-room form field, e.g. `water_<roomId>`.
    pub fn field_prefix(&self) -> &'static str {
        match self {
            Utility::Water => "water_",
            Utility::Electric => "electric_",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Utility::Water => "water",
            Utility::Electric => "electric",
        }
    }
}

/// Parse a reading typed by staff. Empty, non-numeric and non-finite input
/// is not a reading.
pub fn parse_reading(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Consumption between the previous period's reading and the current input.
///
/// A negative difference (misread or meter rollover) is `Unavailable`, never
/// zero: zero is a legitimate consumption and must stay distinguishable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UsageDelta {
    Unavailable,
    Units(f64),
}

impl UsageDelta {
    pub fn compute(previous: Option<f64>, current_input: &str) -> Self {
        let previous = match previous.filter(|v| v.is_finite()) {
            Some(v) => v,
            None => return UsageDelta::Unavailable,
        };
        let current = match parse_reading(current_input) {
            Some(v) => v,
            None => return UsageDelta::Unavailable,
        };

        let delta = current - previous;
        if delta < 0.0 {
            UsageDelta::Unavailable
        } else {
            UsageDelta::Units(delta)
        }
    }

    pub fn units(&self) -> Option<f64> {
        match self {
            UsageDelta::Units(v) => Some(*v),
            UsageDelta::Unavailable => None,
        }
    }
}

/// Whole values print as integers, anything else with two decimals.
pub fn format_units(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

impl fmt::Display for UsageDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageDelta::Unavailable => f.write_str("-"),
            UsageDelta::Units(v) => f.write_str(&format_units(*v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shown(previous: Option<f64>, current: &str) -> String {
        UsageDelta::compute(previous, current).to_string()
    }

    #[test]
    fn whole_delta_is_shown_as_integer() {
        assert_eq!(shown(Some(100.0), "150"), "50");
    }

    #[test]
    fn negative_delta_is_unavailable() {
        assert_eq!(shown(Some(200.0), "180"), "-");
    }

    #[test]
    fn missing_previous_is_unavailable() {
        assert_eq!(shown(None, "50"), "-");
    }

    #[test]
    fn empty_or_garbage_input_is_unavailable() {
        assert_eq!(shown(Some(10.0), ""), "-");
        assert_eq!(shown(Some(10.0), "   "), "-");
        assert_eq!(shown(Some(10.0), "12a"), "-");
        assert_eq!(shown(Some(10.0), "NaN"), "-");
        assert_eq!(shown(Some(10.0), "inf"), "-");
    }

    #[test]
    fn zero_usage_stays_zero() {
        assert_eq!(shown(Some(321.0), "321"), "0");
        assert_eq!(UsageDelta::compute(Some(321.0), "321").units(), Some(0.0));
    }

    #[test]
    fn fractional_delta_has_two_decimals() {
        assert_eq!(shown(Some(100.25), "150.5"), "50.25");
        assert_eq!(shown(Some(100.2), "150.5"), "50.30");
    }

    #[test]
    fn input_is_trimmed() {
        assert_eq!(shown(Some(1.0), " 11 "), "10");
    }

    #[test]
    fn delta_matches_difference_whenever_not_negative() {
        for previous in [0.0, 12.0, 999.0, 1234.5] {
            for step in [0.0, 1.0, 7.0, 250.0, 0.5] {
                let current = previous + step;
                let delta = UsageDelta::compute(Some(previous), &current.to_string());
                assert_eq!(delta.units(), Some(current - previous));
            }
        }
    }
}
