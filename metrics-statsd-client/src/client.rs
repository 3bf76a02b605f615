use std::time::Duration;

use quanta::{Clock, Instant};
use tracing::trace;

use crate::{
    connection::{Connection, ConnectionError},
    encoder::{self, MetricKind, MetricValue, Number},
};

/// The duration reported by [`Metrics::timing`].
///
/// Any number converts into an explicit duration in seconds, as does a [`Duration`]. `None` selects the time elapsed
/// since the client's automatic timing reset point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimingDuration {
    /// An explicit duration, in seconds.
    Seconds(Number),

    /// The time elapsed since the automatic timing reset point.
    SinceReset,
}

impl TimingDuration {
    fn explicit_millis(seconds: Number) -> Number {
        match seconds {
            Number::Integer(v) => v.checked_mul(1000).map_or_else(|| Number::Float(seconds.scale(1000.0)), Number::Integer),
            Number::Float(_) => Number::Float(seconds.scale(1000.0)),
        }
    }
}

impl From<Number> for TimingDuration {
    fn from(seconds: Number) -> Self {
        TimingDuration::Seconds(seconds)
    }
}

impl From<Option<f64>> for TimingDuration {
    fn from(seconds: Option<f64>) -> Self {
        seconds.map_or(TimingDuration::SinceReset, |v| TimingDuration::Seconds(Number::Float(v)))
    }
}

impl From<Duration> for TimingDuration {
    fn from(duration: Duration) -> Self {
        TimingDuration::Seconds(Number::Float(duration.as_secs_f64()))
    }
}

macro_rules! timing_duration_from {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for TimingDuration {
                fn from(seconds: $ty) -> Self {
                    TimingDuration::Seconds(Number::from(seconds))
                }
            }
        )+
    };
}

timing_duration_from!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

/// A namespaced metrics client.
///
/// Each operation formats exactly one metric line and writes it to the underlying [`Connection`]. The namespace, when
/// present and non-empty, is prepended to every metric name with a `.` separator.
///
/// ## Automatic timing
///
/// The client tracks a single reset point, shared by all metric names, which starts out as the time the client was
/// created. Calling [`timing`][Metrics::timing] without an explicit duration reports the time elapsed since that
/// reset point and then moves the reset point to "now". [`reset_timing`][Metrics::reset_timing] moves it without
/// reporting anything.
///
/// Since the reset point is shared, interleaving automatic timings for different names measures the gap between
/// consecutive calls, not a per-name duration:
///
/// ```
/// # use metrics_statsd_client::{Connection, ConnectionError, Metrics};
/// # struct Discard;
/// # impl Connection for Discard {
/// #     fn connect(&mut self) -> Result<(), ConnectionError> { Ok(()) }
/// #     fn disconnect(&mut self) {}
/// #     fn write(&mut self, _line: &str) {}
/// # }
/// let mut metrics = Metrics::new(Discard, "app");
///
/// // Time since the client was created.
/// metrics.timing("startup", None);
///
/// // Time since the previous call, not since the client was created.
/// metrics.timing("first_request", None);
/// ```
///
/// ## Concurrency
///
/// All emitting operations take `&mut self`, so a single client cannot be used from several threads at once without
/// an external lock. Use one client per thread, or wrap a shared client in a mutex.
pub struct Metrics<C> {
    connection: C,
    namespace: Option<String>,
    clock: Clock,
    last_reset: Instant,
}

impl<C> Metrics<C>
where
    C: Connection,
{
    /// Creates a new `Metrics` client that prefixes every metric name with `namespace`.
    ///
    /// An empty namespace is treated the same as no namespace.
    pub fn new<N>(connection: C, namespace: N) -> Self
    where
        N: Into<String>,
    {
        Self::with_clock(connection, Some(namespace.into()), Clock::new())
    }

    /// Creates a new `Metrics` client that writes bare metric names.
    pub fn without_namespace(connection: C) -> Self {
        Self::with_clock(connection, None, Clock::new())
    }

    /// Creates a new `Metrics` client which reads the time for automatic timing from the given clock.
    ///
    /// The automatic timing reset point is initialized to the clock's current time.
    pub fn with_clock(connection: C, namespace: Option<String>, clock: Clock) -> Self {
        let last_reset = clock.now();
        Metrics { connection, namespace, clock, last_reset }
    }

    /// Returns the current namespace, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Sets the namespace used for subsequent metrics.
    pub fn set_namespace<N>(&mut self, namespace: N)
    where
        N: Into<String>,
    {
        self.namespace = Some(namespace.into());
    }

    /// Removes the namespace, so that subsequent metrics use bare names.
    pub fn clear_namespace(&mut self) {
        self.namespace = None;
    }

    /// Returns a reference to the underlying connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Returns a mutable reference to the underlying connection.
    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    /// Consumes the client, returning the underlying connection.
    pub fn into_connection(self) -> C {
        self.connection
    }

    /// Establishes the underlying connection.
    ///
    /// # Errors
    ///
    /// If the connection cannot be established, an error is returned.
    pub fn connect(&mut self) -> Result<(), ConnectionError> {
        self.connection.connect()
    }

    /// Tears down the underlying connection.
    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Reports a gauge: a point-in-time value.
    pub fn gauge<V>(&mut self, name: &str, value: V)
    where
        V: Into<Number>,
    {
        self.emit(name, &MetricValue::Number(value.into()), &MetricKind::Gauge);
    }

    /// Reports a meter: a count of events, from which the server derives a rate.
    pub fn meter<V>(&mut self, name: &str, value: V)
    where
        V: Into<Number>,
    {
        self.emit(name, &MetricValue::Number(value.into()), &MetricKind::Meter);
    }

    /// Increments a counter by `value`.
    pub fn increment<V>(&mut self, name: &str, value: V)
    where
        V: Into<Number>,
    {
        self.emit(name, &MetricValue::Number(value.into()), &MetricKind::Counter);
    }

    /// Increments a counter by one.
    pub fn increment_one(&mut self, name: &str) {
        self.increment(name, 1);
    }

    /// Decrements a counter by `value`.
    ///
    /// This is reported as a counter delta of `-value`.
    pub fn decrement<V>(&mut self, name: &str, value: V)
    where
        V: Into<Number>,
    {
        self.emit(name, &MetricValue::Number(value.into().negate()), &MetricKind::Counter);
    }

    /// Decrements a counter by one.
    pub fn decrement_one(&mut self, name: &str) {
        self.decrement(name, 1);
    }

    /// Reports a timing, in milliseconds.
    ///
    /// When an explicit `duration` (in seconds) is given, it is reported as-is and the automatic timing reset point is
    /// left untouched. Given `None`, the time elapsed since the reset point is reported, and the reset point is moved
    /// to now. See [`TimingDuration`] for the accepted durations.
    pub fn timing<D>(&mut self, name: &str, duration: D)
    where
        D: Into<TimingDuration>,
    {
        let millis = match duration.into() {
            TimingDuration::Seconds(seconds) => TimingDuration::explicit_millis(seconds),
            TimingDuration::SinceReset => Number::Float(Number::Float(self.elapsed_since_reset()).scale(1000.0)),
        };

        self.emit(name, &MetricValue::Number(millis), &MetricKind::Timing);
    }

    /// Moves the automatic timing reset point to now, without reporting anything.
    pub fn reset_timing(&mut self) {
        self.last_reset = self.clock.now();
    }

    /// Reports a sample with a caller-chosen unit.
    ///
    /// Both the value and the unit are written verbatim.
    pub fn report<'v, V>(&mut self, name: &str, value: V, unit: &str)
    where
        V: Into<MetricValue<'v>>,
    {
        self.emit(name, &value.into(), &MetricKind::Generic(unit));
    }

    /// Returns the seconds elapsed since the reset point, and moves the reset point to now.
    fn elapsed_since_reset(&mut self) -> f64 {
        let now = self.clock.now();
        let elapsed = now - self.last_reset;
        self.last_reset = now;
        elapsed.as_secs_f64()
    }

    fn emit(&mut self, name: &str, value: &MetricValue<'_>, kind: &MetricKind<'_>) {
        let line = encoder::format_metric(self.namespace(), name, value, kind);
        trace!(%line, "Emitting metric.");
        self.connection.write(&line);
    }
}
