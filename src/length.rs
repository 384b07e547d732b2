// Minimal SVG length handling for text reflow.
//
// Grammar: [+-]? digits* [. digits+] ws* (em|px|pt)?   (unit is case-insensitive)
// Anything else resolves to a size derived from the reference font size; it is never an
// error.

/// CSS pixels per typographic point at 96 dpi.
pub const PX_PER_PT: f64 = 96.0 / 72.0;

/// Multiplier applied to a font size to get a line increment.
pub const LINE_HEIGHT_FACTOR: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Px,
    Pt,
    Em,
}

impl LengthUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            LengthUnit::Px => "px",
            LengthUnit::Pt => "pt",
            LengthUnit::Em => "em",
        }
    }

    fn from_suffix(raw: &str) -> Option<Option<Self>> {
        match raw.to_ascii_lowercase().as_str() {
            "" => Some(None),
            "px" => Some(Some(LengthUnit::Px)),
            "pt" => Some(Some(LengthUnit::Pt)),
            "em" => Some(Some(LengthUnit::Em)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length {
    pub value: f64,
    /// `None` for unitless user units.
    pub unit: Option<LengthUnit>,
}

impl Length {
    pub fn to_px(self, reference_size: f64) -> f64 {
        match self.unit {
            Some(LengthUnit::Em) => self.value * reference_size,
            Some(LengthUnit::Pt) => self.value * PX_PER_PT,
            Some(LengthUnit::Px) | None => self.value,
        }
    }
}

pub fn parse_length(input: &str) -> Option<Length> {
    let s = input.trim();
    let (value, consumed) = scan_number(s, false)?;
    let unit = LengthUnit::from_suffix(s[consumed..].trim_start())?;
    Some(Length { value, unit })
}

/// Resolves `input` to pixels. `em` is relative to `reference_size`.
///
/// When the input does not match the length grammar the result is `reference_size` in a
/// font context and `reference_size * 1.1` (a line-height guess) otherwise.
pub fn resolve_length(input: &str, reference_size: f64, is_font_context: bool) -> f64 {
    match parse_length(input) {
        Some(length) => length.to_px(reference_size),
        None if is_font_context => reference_size,
        None => reference_size * LINE_HEIGHT_FACTOR,
    }
}

/// Numeric prefix of a coordinate attribute, e.g. `"12.5px"` -> 12.5, `"3 4 5"` -> 3.
/// A value with no numeric prefix reads as 0.
pub fn leading_number(input: &str) -> f64 {
    scan_number(input.trim_start(), true)
        .map(|(value, _)| value)
        .unwrap_or(0.0)
}

/// Formats a resolved coordinate for an attribute value: at most six decimals, no
/// trailing zeros, never `-0`.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let mut out = format!("{:.6}", value);
    if out.contains('.') {
        while out.ends_with('0') {
            out.pop();
        }
        if out.ends_with('.') {
            out.pop();
        }
    }
    if out == "-0" {
        out = "0".to_string();
    }
    out
}

// Returns the parsed value and the byte length consumed. With `allow_bare_dot`, "5." reads
// as 5 (numeric-prefix semantics); otherwise a dot must be followed by a digit.
fn scan_number(s: &str, allow_bare_dot: bool) -> Option<(f64, usize)> {
    let bytes = s.as_bytes();
    let mut i = 0usize;
    let negative = match bytes.first() {
        Some(b'-') => {
            i = 1;
            true
        }
        Some(b'+') => {
            i = 1;
            false
        }
        _ => false,
    };

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let int_end = i;

    let mut frac: Option<(usize, usize)> = None;
    if bytes.get(i) == Some(&b'.') {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > frac_start {
            frac = Some((frac_start, j));
            i = j;
        } else if allow_bare_dot && int_end > int_start {
            i = frac_start;
        }
    }

    if int_end == int_start && frac.is_none() {
        return None;
    }

    let mut normalized = String::with_capacity(i + 2);
    if negative {
        normalized.push('-');
    }
    if int_end > int_start {
        normalized.push_str(&s[int_start..int_end]);
    } else {
        normalized.push('0');
    }
    if let Some((start, end)) = frac {
        normalized.push('.');
        normalized.push_str(&s[start..end]);
    }
    normalized.parse::<f64>().ok().map(|value| (value, i))
}
