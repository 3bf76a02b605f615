//! Rendering of metric samples into the statsd line format.
//!
//! Every sample becomes exactly one line of the form `<label>:<value>|<unit>`, where the label is the metric name
//! optionally qualified by a namespace. Nothing here holds state or performs I/O, so all of it is safe to call from
//! any thread without synchronization.
//!
//! No escaping is performed: callers are responsible for keeping the `:` and `|` delimiters out of names, values
//! and units.

use std::borrow::Cow;

const SIGNIFICANT_DIGITS: usize = 12;

/// The semantic category of a metric sample.
///
/// The kind determines the unit suffix written after the `|` delimiter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind<'a> {
    /// A point-in-time value. Rendered with the `g` suffix.
    Gauge,

    /// A count of events, used to derive a rate. Rendered with the `m` suffix.
    Meter,

    /// A counter delta. Rendered with the `c` suffix.
    Counter,

    /// A duration in milliseconds. Rendered with the `ms` suffix.
    Timing,

    /// A sample whose unit suffix is chosen by the caller and written verbatim.
    Generic(&'a str),
}

impl<'a> MetricKind<'a> {
    /// Returns the unit suffix for this kind.
    pub const fn unit(&self) -> &'a str {
        match self {
            MetricKind::Gauge => "g",
            MetricKind::Meter => "m",
            MetricKind::Counter => "c",
            MetricKind::Timing => "ms",
            MetricKind::Generic(unit) => *unit,
        }
    }
}

/// A numeric metric value.
///
/// Integers are rendered without a fractional part (`102`), while floating-point values are rounded to twelve
/// significant digits and rendered in their shortest decimal form (`101123.4`, `2000.0`, `0.3`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    /// A signed integer.
    Integer(i64),

    /// A floating-point number.
    Float(f64),
}

impl Number {
    /// Returns the arithmetic negation of this value.
    ///
    /// `i64::MIN` has no integer negation, so it is negated as a floating-point value instead.
    #[must_use]
    pub fn negate(self) -> Self {
        match self {
            Number::Integer(v) => v.checked_neg().map_or(Number::Float(-(v as f64)), Number::Integer),
            Number::Float(v) => Number::Float(-v),
        }
    }

    /// Returns this value multiplied by `factor`, as a floating-point number rounded to twelve significant digits.
    #[must_use]
    pub fn scale(self, factor: f64) -> f64 {
        let scaled = match self {
            Number::Integer(v) => v as f64 * factor,
            Number::Float(v) => v * factor,
        };
        round_significant(scaled)
    }
}

macro_rules! number_from_lossless {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for Number {
                fn from(value: $ty) -> Self {
                    Number::Integer(i64::from(value))
                }
            }
        )+
    };
}

macro_rules! number_from_wide {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for Number {
                fn from(value: $ty) -> Self {
                    // Anything outside of the `i64` range is still a valid reading, just not an integer one.
                    i64::try_from(value).map_or(Number::Float(value as f64), Number::Integer)
                }
            }
        )+
    };
}

number_from_lossless!(i8, i16, i32, i64, u8, u16, u32);
number_from_wide!(u64, usize, isize, i128, u128);

impl From<f32> for Number {
    fn from(value: f32) -> Self {
        Number::Float(f64::from(value))
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

/// The payload of a metric sample.
///
/// Most samples are numeric, but generic reports may carry an arbitrary string which is written as-is.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricValue<'a> {
    /// A numeric payload.
    Number(Number),

    /// A string payload, written verbatim.
    Text(Cow<'a, str>),
}

impl From<Number> for MetricValue<'_> {
    fn from(value: Number) -> Self {
        MetricValue::Number(value)
    }
}

macro_rules! metric_value_from_number {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for MetricValue<'_> {
                fn from(value: $ty) -> Self {
                    MetricValue::Number(Number::from(value))
                }
            }
        )+
    };
}

metric_value_from_number!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize, i128, u128, f32, f64);

impl<'a> From<&'a str> for MetricValue<'a> {
    fn from(value: &'a str) -> Self {
        MetricValue::Text(Cow::Borrowed(value))
    }
}

impl<'a> From<&'a String> for MetricValue<'a> {
    fn from(value: &'a String) -> Self {
        MetricValue::Text(Cow::Borrowed(value.as_str()))
    }
}

impl From<String> for MetricValue<'_> {
    fn from(value: String) -> Self {
        MetricValue::Text(Cow::Owned(value))
    }
}

struct ValueFormatter {
    int_writer: itoa::Buffer,
    float_writer: ryu::Buffer,
}

impl ValueFormatter {
    fn new() -> Self {
        Self { int_writer: itoa::Buffer::new(), float_writer: ryu::Buffer::new() }
    }

    fn format<'s>(&'s mut self, value: &'s MetricValue<'_>) -> &'s str {
        match value {
            MetricValue::Number(Number::Integer(v)) => self.int_writer.format(*v),
            MetricValue::Number(Number::Float(v)) => self.float_writer.format(round_significant(*v)),
            MetricValue::Text(s) => s.as_ref(),
        }
    }
}

/// Rounds `value` to twelve significant digits.
///
/// Binary floating-point arithmetic leaves noise in the trailing digits (`101.1234 * 1000.0` is
/// `101123.40000000001`), which would otherwise leak into the rendered value.
fn round_significant(value: f64) -> f64 {
    if !value.is_finite() || value == 0.0 {
        return value;
    }

    format!("{:.*e}", SIGNIFICANT_DIGITS - 1, value).parse().unwrap_or(value)
}

/// Resolves the label for a metric.
///
/// When the namespace is absent or empty, the label is the bare metric name. Otherwise, the namespace and name are
/// joined with a `.` separator.
pub fn qualify<'a>(namespace: Option<&str>, name: &'a str) -> Cow<'a, str> {
    match namespace {
        Some(namespace) if !namespace.is_empty() => {
            let mut label = String::with_capacity(namespace.len() + 1 + name.len());
            label.push_str(namespace);
            label.push('.');
            label.push_str(name);
            Cow::Owned(label)
        }
        _ => Cow::Borrowed(name),
    }
}

/// Formats a single line, `<label>:<value>|<unit>`, for an already-resolved label.
pub fn format(label: &str, value: &MetricValue<'_>, unit: &str) -> String {
    let mut formatter = ValueFormatter::new();
    let value = formatter.format(value);

    let mut line = String::with_capacity(label.len() + value.len() + unit.len() + 2);
    line.push_str(label);
    line.push(':');
    line.push_str(value);
    line.push('|');
    line.push_str(unit);
    line
}

/// Formats a single line for a metric, qualifying its name with the given namespace first.
pub fn format_metric(
    namespace: Option<&str>,
    name: &str,
    value: &MetricValue<'_>,
    kind: &MetricKind<'_>,
) -> String {
    format(&qualify(namespace, name), value, kind.unit())
}
