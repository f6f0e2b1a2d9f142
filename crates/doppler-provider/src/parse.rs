//! Small helpers shared by the text-scraping providers.

use doppler_common::types::Scalar;

/// Binary size units; each step is a factor of 1024.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DataUnit {
    B,
    K,
    M,
    G,
    T,
    P,
}

impl DataUnit {
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_lowercase() {
            'b' => Some(DataUnit::B),
            'k' => Some(DataUnit::K),
            'm' => Some(DataUnit::M),
            'g' => Some(DataUnit::G),
            't' => Some(DataUnit::T),
            'p' => Some(DataUnit::P),
            _ => None,
        }
    }

    fn power(self) -> i32 {
        self as i32
    }
}

/// Convert a size such as `"16318360 kB"`, `"2.5G"`, `"512MiB"` or `"1024"`
/// to `output`, rounding down.
///
/// `input` is the unit assumed when the text carries no suffix.
///
/// # Examples
///
/// ```
/// use doppler_provider::parse::{convert_data_unit, DataUnit};
///
/// assert_eq!(convert_data_unit("2048 kB", DataUnit::B, DataUnit::M), Some(2));
/// assert_eq!(convert_data_unit("1.5G", DataUnit::B, DataUnit::M), Some(1536));
/// assert_eq!(convert_data_unit("3", DataUnit::K, DataUnit::B), Some(3072));
/// assert_eq!(convert_data_unit("lots", DataUnit::B, DataUnit::B), None);
/// ```
pub fn convert_data_unit(text: &str, input: DataUnit, output: DataUnit) -> Option<i64> {
    let text = text.trim();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, suffix) = text.split_at(split);
    let value: f64 = number.parse().ok()?;

    let suffix = suffix.trim().to_ascii_lowercase();
    let unit = if suffix.is_empty() {
        input
    } else {
        let mut chars = suffix.chars();
        let unit = DataUnit::from_letter(chars.next()?)?;
        match chars.as_str() {
            "" | "b" | "i" | "ib" => unit,
            _ => return None,
        }
    };

    let converted = value * 1024f64.powi(unit.power() - output.power());
    Some(converted.floor() as i64)
}

/// The value in `data` at the position of `key` in `legend`.
pub fn value_for_column<'a>(legend: &[&str], data: &[&'a str], key: &str) -> Option<&'a str> {
    let idx = legend.iter().position(|column| *column == key)?;
    data.get(idx).copied()
}

/// The first line of `text` for which `pred` holds.
pub fn first_matching_line(text: &str, pred: impl Fn(&str) -> bool) -> Option<&str> {
    text.lines().find(|line| pred(line))
}

/// Interpret a token as an integer, then a float, falling back to text.
pub fn parse_scalar(token: &str) -> Scalar {
    let token = token.trim();
    if let Ok(v) = token.parse::<i64>() {
        Scalar::Int(v)
    } else if let Ok(v) = token.parse::<f64>() {
        Scalar::Float(v)
    } else {
        Scalar::Text(token.to_string())
    }
}

/// Like [`parse_scalar`] but only accepts numbers.
pub fn parse_number(token: &str) -> Option<Scalar> {
    match parse_scalar(token) {
        Scalar::Text(_) => None,
        number => Some(number),
    }
}
