//! Simple TOML parser for rover configuration
//!
//! This is a minimal line-based parser for the subset of TOML the rover
//! configuration needs. It does NOT support the full TOML spec.
//!
//! Supported features:
//! - `[motor]`, `[avoid]`, `[deadman]` and `[sensor]` section headers
//! - `key = value` pairs (decimal or `0x` hex integers, floats)
//! - Comments (`# ...`), whole-line or trailing
//!
//! Unknown sections and keys are rejected. Keys that are not set keep their
//! default value, and the resulting configuration is validated before it is
//! returned.

use super::types::{ConfigError, RoverConfig};

/// What went wrong on a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseErrorKind {
    /// Malformed or unknown section header
    InvalidSection,
    /// Key not recognized in the current section
    UnknownKey,
    /// Value could not be parsed as the key's type
    InvalidValue,
    /// Line is neither a header nor a `key = value` pair
    MissingEquals,
    /// Values parsed but the configuration failed validation
    Invalid(ConfigError),
}

/// Parse error with the 1-based line it occurred on
///
/// Validation failures are reported against line 0 since they concern the
/// configuration as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParseError {
    pub line: usize,
    pub kind: ParseErrorKind,
}

impl From<ConfigError> for ParseError {
    fn from(e: ConfigError) -> Self {
        ParseError {
            line: 0,
            kind: ParseErrorKind::Invalid(e),
        }
    }
}

/// Current parsing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Motor,
    Avoid,
    Deadman,
    Sensor,
}

/// Parse TOML configuration into a validated RoverConfig
pub fn parse_config(input: &str) -> Result<RoverConfig, ParseError> {
    let mut config = RoverConfig::default();
    let mut section = Section::Root;

    for (idx, raw) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw).trim();

        if line.is_empty() {
            continue;
        }

        let fail = |kind| ParseError {
            line: line_no,
            kind,
        };

        if line.starts_with('[') {
            if !line.ends_with(']') {
                return Err(fail(ParseErrorKind::InvalidSection));
            }
            section = parse_section_header(&line[1..line.len() - 1])
                .ok_or(fail(ParseErrorKind::InvalidSection))?;
            continue;
        }

        let (key, value) = parse_key_value(line).ok_or(fail(ParseErrorKind::MissingEquals))?;
        apply_value(section, key, value, &mut config).map_err(fail)?;
    }

    let config = config.validated()?;
    debug!("configuration parsed");
    Ok(config)
}

/// Drop a trailing `# comment`
fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_section_header(header: &str) -> Option<Section> {
    match header.trim() {
        "motor" => Some(Section::Motor),
        "avoid" => Some(Section::Avoid),
        "deadman" => Some(Section::Deadman),
        "sensor" => Some(Section::Sensor),
        _ => None,
    }
}

/// Parse "key = value" line
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

/// Parse a float; integers are accepted as floats
fn parse_float(value: &str) -> Result<f32, ParseErrorKind> {
    value.parse().map_err(|_| ParseErrorKind::InvalidValue)
}

/// Parse an unsigned integer, decimal or `0x` hex, `_` separators allowed
fn parse_uint(value: &str) -> Result<u32, ParseErrorKind> {
    let mut digits: heapless::String<16> = heapless::String::new();
    let (body, radix) = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (value, 10),
    };
    for c in body.chars().filter(|c| *c != '_') {
        digits.push(c).map_err(|_| ParseErrorKind::InvalidValue)?;
    }
    u32::from_str_radix(&digits, radix).map_err(|_| ParseErrorKind::InvalidValue)
}

fn parse_u16(value: &str) -> Result<u16, ParseErrorKind> {
    u16::try_from(parse_uint(value)?).map_err(|_| ParseErrorKind::InvalidValue)
}

fn parse_u8(value: &str) -> Result<u8, ParseErrorKind> {
    u8::try_from(parse_uint(value)?).map_err(|_| ParseErrorKind::InvalidValue)
}

/// Apply a key/value pair to the section it belongs to
fn apply_value(
    section: Section,
    key: &str,
    value: &str,
    config: &mut RoverConfig,
) -> Result<(), ParseErrorKind> {
    match section {
        Section::Root => return Err(ParseErrorKind::UnknownKey),
        Section::Motor => {
            let motor = &mut config.motor;
            match key {
                "left_mult" => motor.calibration.left_mult = parse_float(value)?,
                "right_mult" => motor.calibration.right_mult = parse_float(value)?,
                "max_pwm" => motor.calibration.max_pwm = parse_float(value)?,
                "pwm_freq_hz" => motor.pwm_freq_hz = parse_uint(value)?,
                _ => return Err(ParseErrorKind::UnknownKey),
            }
        }
        Section::Avoid => {
            let avoid = &mut config.avoid;
            match key {
                "fwd_speed" => avoid.fwd_speed = parse_float(value)?,
                "back_speed" => avoid.back_speed = parse_float(value)?,
                "turn_steer" => avoid.turn_steer = parse_float(value)?,
                "clear_mm" => avoid.clear_mm = parse_u16(value)?,
                "near_mm" => avoid.near_mm = parse_u16(value)?,
                "back_s" => avoid.back_s = parse_float(value)?,
                "turn_s_min" => avoid.turn_s_min = parse_float(value)?,
                "turn_s_max" => avoid.turn_s_max = parse_float(value)?,
                "loop_hz" => avoid.loop_hz = parse_float(value)?,
                _ => return Err(ParseErrorKind::UnknownKey),
            }
        }
        Section::Deadman => {
            let deadman = &mut config.deadman;
            match key {
                "threshold_s" => deadman.threshold_s = parse_float(value)?,
                "period_ms" => deadman.period_ms = parse_uint(value)?,
                _ => return Err(ParseErrorKind::UnknownKey),
            }
        }
        Section::Sensor => {
            let sensor = &mut config.sensor;
            match key {
                "address" => sensor.address = parse_u8(value)?,
                "timeout_ms" => sensor.timeout_ms = parse_uint(value)?,
                _ => return Err(ParseErrorKind::UnknownKey),
            }
        }
    }
    Ok(())
}
