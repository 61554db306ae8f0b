//! Metrics declarations for MeshNet.
//!
//! Every metric the firmware emits is declared once here as a const [`Metric`]
//! with its name, kind, unit, description and the label keys it carries on top
//! of the device labels. The `metrics` crate is re-exported so emitting crates
//! depend on a single version of it.
//!
//! No recorder is installed by this crate; without one, the `metrics` macros
//! are no-ops.
//!
//! # Example
//!
//! ```rust
//! use meshnet_metrics::{metric_defs, MetricLabels};
//!
//! let labels = MetricLabels::node("kitchen");
//! metrics::counter!(
//!     metric_defs::ENVELOPE_REJECTED.name,
//!     &labels.with(&[("reason", "tag_mismatch".to_string())])
//! )
//! .increment(1);
//! ```

pub use metrics;

use metrics::Unit;

/// Label keys every device-scoped metric carries.
pub const DEVICE_LABELS: [&str; 2] = ["node", "node_type"];

/// How a metric is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Monotonic count.
    Counter,
    /// Current level.
    Gauge,
    /// Distribution of samples.
    Histogram,
}

/// A metric declaration.
#[derive(Debug, Clone, Copy)]
pub struct Metric {
    /// Dotted metric name, e.g. `meshnet.node.restarts`.
    pub name: &'static str,
    /// Recording kind.
    pub kind: MetricKind,
    /// Unit of the recorded values.
    pub unit: Unit,
    /// One-line description for exporters.
    pub description: &'static str,
    /// Label keys beyond [`DEVICE_LABELS`].
    pub extra_labels: &'static [&'static str],
}

impl Metric {
    /// Every label key this metric is emitted with, device labels first.
    pub fn label_keys(&self) -> impl Iterator<Item = &'static str> {
        DEVICE_LABELS.into_iter().chain(self.extra_labels.iter().copied())
    }

    /// Register this metric's unit and description with the installed recorder.
    pub fn describe(&self) {
        match self.kind {
            MetricKind::Counter => {
                metrics::describe_counter!(self.name, self.unit, self.description)
            }
            MetricKind::Gauge => metrics::describe_gauge!(self.name, self.unit, self.description),
            MetricKind::Histogram => {
                metrics::describe_histogram!(self.name, self.unit, self.description)
            }
        }
    }
}

macro_rules! declare_metrics {
    ($(
        $(#[$doc:meta])*
        $ident:ident = $kind:ident(
            $name:literal, $unit:ident $(, [$($label:literal),*])?
        ) => $desc:literal;
    )*) => {
        $(
            $(#[$doc])*
            pub const $ident: Metric = Metric {
                name: $name,
                kind: MetricKind::$kind,
                unit: Unit::$unit,
                description: $desc,
                extra_labels: &[$($($label),*)?],
            };
        )*

        /// Every declared metric.
        pub const ALL: &[&Metric] = &[$(&$ident),*];
    };
}

/// All metric definitions.
pub mod metric_defs {
    use super::{Metric, MetricKind, Unit};

    declare_metrics! {
        /// Inbound envelopes dropped before dispatch. `reason` is one of tag_mismatch,
        /// length_mismatch, too_short, too_long, wrong_session, replay, unknown_type
        /// or wrong_sender.
        ENVELOPE_REJECTED = Counter("meshnet.envelope.rejected", Count, ["reason"])
            => "Inbound envelopes dropped before dispatch";

        /// Full restarts. `reason` is one of boot_failed, configure_timeout, reset
        /// or counter_exhausted.
        NODE_RESTARTS = Counter("meshnet.node.restarts", Count, ["reason"])
            => "Full node state-machine restarts";
        NODE_SEND_FAILURES = Counter("meshnet.node.send_failures", Count, ["msg_type"])
            => "Application sends that failed after every attempt";
        /// Attempts needed per successful application send.
        NODE_SEND_ATTEMPTS = Histogram("meshnet.node.send_attempts", Count)
            => "Transport attempts needed per successful send";
        NODE_READINGS_SENT = Counter("meshnet.node.readings_sent", Count)
            => "Device readings sent to the master";
        NODE_KEEPALIVES_SENT = Counter("meshnet.node.keepalives_sent", Count)
            => "Keepalive pongs sent to the master";
        NODE_SESSIONS = Counter("meshnet.node.sessions", Count)
            => "Sessions negotiated with the master";

        /// `reason` is one of registry_full, unknown_variant or decode.
        REGISTRY_CONFIGURE_FAILURES = Counter(
            "meshnet.registry.configure_failures", Count, ["reason"]
        )
            => "Device configuration records that could not be applied";
        REGISTRY_ITEMS = Gauge("meshnet.registry.items", Count)
            => "Devices currently configured on the node";

        SERIAL_FRAMES_DECODED = Counter("meshnet.serial.frames_decoded", Count)
            => "Serial frames decoded from the host";
        SERIAL_FRAMES_DROPPED = Counter("meshnet.serial.frames_dropped", Count)
            => "Malformed serial frames dropped";
        MASTER_UPLINK_FORWARDED = Counter("meshnet.master.uplink_forwarded", Count, ["msg_type"])
            => "Mesh packets forwarded to the host";
        /// Mesh packets withheld from the host because they failed verification.
        MASTER_UPLINK_REJECTED = Counter("meshnet.master.uplink_rejected", Count, ["reason"])
            => "Mesh packets that failed verification and were not forwarded";
        MASTER_DOWNLINK_FAILED = Counter("meshnet.master.downlink_failed", Count)
            => "Host frames the mesh did not accept";
        MASTER_SERIAL_TX_BYTES = Counter("meshnet.master.serial_tx_bytes", Bytes)
            => "Bytes written to the host serial link";
    }
}

/// Device labels attached to every emitted metric.
#[derive(Debug, Clone)]
pub struct MetricLabels {
    /// Device name.
    pub node: String,
    /// Device role (`node` or `master`).
    pub node_type: String,
}

impl MetricLabels {
    fn new(node: impl Into<String>, node_type: &str) -> Self {
        MetricLabels {
            node: node.into(),
            node_type: node_type.to_string(),
        }
    }

    /// Labels for a sensor/actuator node.
    pub fn node(name: impl Into<String>) -> Self {
        Self::new(name, "node")
    }

    /// Labels for the master.
    pub fn master(name: impl Into<String>) -> Self {
        Self::new(name, "master")
    }

    /// The device labels as `metrics` key/value pairs.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        self.with(&[])
    }

    /// The device labels followed by `extra`.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let [node, node_type] = DEVICE_LABELS;
        let mut labels = Vec::with_capacity(2 + extra.len());
        labels.push((node, self.node.clone()));
        labels.push((node_type, self.node_type.clone()));
        labels.extend_from_slice(extra);
        labels
    }
}

/// Register descriptions for every metric in [`metric_defs::ALL`].
pub fn describe_metrics() {
    metric_defs::ALL.iter().for_each(|metric| metric.describe());
}
