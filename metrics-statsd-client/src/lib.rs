//! A client for emitting metrics to a [statsd][statsd]-compatible server.
//!
//! [statsd]: https://github.com/statsd/statsd/blob/master/docs/metric_types.md
//!
//! # Usage
//!
//! Using the client is straightforward:
//!
//! ```no_run
//! # use metrics_statsd_client::StatsdBuilder;
//! // First, create a builder.
//! //
//! // The builder can configure the remote address, the namespace that prefixes every metric name, the write timeout,
//! // and the maximum payload length.
//! let builder = StatsdBuilder::default()
//!     .with_remote_address("127.0.0.1:8125")
//!     .expect("failed to parse remote address")
//!     .with_namespace("app");
//!
//! // Building the client connects it to the remote address.
//! let mut metrics = builder.build().expect("failed to build client");
//!
//! // Each call sends exactly one line, such as `app.requests:1|c`.
//! metrics.increment("requests", 1);
//! metrics.gauge("queue_depth", 42);
//! metrics.timing("db_query", 0.0125);
//! ```
//!
//! # Wire format
//!
//! Every metric is rendered as a single line, `<label>:<value>|<unit>`, where the label is the metric name prefixed by
//! the namespace and a `.` (or the bare metric name, when the namespace is absent or empty), and the unit is one of
//! `g` (gauge), `m` (meter), `c` (counter), `ms` (timing), or an arbitrary caller-supplied unit for generic reports.
//!
//! Names and values are not escaped: keeping the `:` and `|` delimiters out of them is up to the caller.
//!
//! # Automatic timing
//!
//! [`Metrics::timing`] can be called without a duration, in which case the client reports the time elapsed since its
//! last reset point and then resets it. The reset point is shared by all metric names on a client, starts out as the
//! time the client was created, and can be moved explicitly with [`Metrics::reset_timing`].
//!
//! # Transports
//!
//! The client writes to anything implementing [`Connection`]. [`SocketConnection`] sends metrics over UDP, or over
//! Unix domain sockets in either `SOCK_DGRAM` or `SOCK_STREAM` mode on Linux.
//!
//! Delivery is best-effort: lines that cannot be sent are logged and dropped, and nothing is buffered or retried.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub use self::builder::{BuildError, StatsdBuilder};

mod client;
pub use self::client::{Metrics, TimingDuration};

pub mod connection;
pub use self::connection::{socket::SocketConnection, Connection, ConnectionError, RemoteAddr};

pub mod encoder;
pub use self::encoder::{MetricKind, MetricValue, Number};
