//! Output formats
//!
//! Samples leave the process in one of two text formats:
//!
//! ```text
//! PUTVAL "<host>/<plugin>[-<plugin_instance>]/<type>[-<type_instance>]" interval=<secs> <time>:<value>
//!
//! # TYPE <metric_name> <type>
//! <metric_name>{<label1>="<value1>",...} <value>
//! ```
//!
//! The first is the collectd exec plugin protocol, the second the Prometheus
//! text exposition format (version 0.0.4).

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

use super::Sample;

static METRIC_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").expect("valid metric name pattern"));

/// Prometheus metric type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricType {
    Gauge,
    Counter,
    #[default]
    Untyped,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Gauge => "gauge",
            MetricType::Counter => "counter",
            MetricType::Untyped => "untyped",
        }
    }
}

/// One Prometheus series value
#[derive(Debug, Clone, PartialEq)]
pub struct PrometheusMetric {
    pub name: String,
    pub metric_type: MetricType,
    pub help: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub value: f64,
}

impl PrometheusMetric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            metric_type: MetricType::Untyped,
            help: None,
            labels: BTreeMap::new(),
            value,
        }
    }

    pub fn with_type(mut self, metric_type: MetricType) -> Self {
        self.metric_type = metric_type;
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

impl From<&Sample> for PrometheusMetric {
    /// `mongodb_<type>` becomes the metric name, the rest of the identifier
    /// becomes labels
    fn from(sample: &Sample) -> Self {
        let mut metric = PrometheusMetric::new(
            sanitize_metric_name(&format!("mongodb_{}", sample.type_name)),
            sample.value,
        )
        .with_type(MetricType::Gauge)
        .with_label("plugin", sample.plugin.as_str());

        if !sample.plugin_instance.is_empty() {
            metric = metric.with_label("plugin_instance", sample.plugin_instance.as_str());
        }
        if !sample.type_instance.is_empty() {
            metric = metric.with_label("type_instance", sample.type_instance.as_str());
        }

        metric
    }
}

/// Replace characters not allowed in a Prometheus metric name with `_`
pub fn sanitize_metric_name(name: &str) -> String {
    if METRIC_NAME.is_match(name) {
        return name.to_string();
    }

    name.chars()
        .enumerate()
        .map(|(i, c)| match c {
            'a'..='z' | 'A'..='Z' | '_' | ':' => c,
            '0'..='9' if i > 0 => c,
            _ => '_',
        })
        .collect()
}

/// Prometheus text exposition formatter
#[derive(Debug, Clone, Default)]
pub struct PrometheusFormatter;

impl PrometheusFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Format metrics, grouped by name in order of first appearance
    ///
    /// HELP and TYPE lines are written once per name.
    pub fn format(&self, metrics: &[PrometheusMetric]) -> String {
        if metrics.is_empty() {
            return String::new();
        }

        let mut output = String::with_capacity(metrics.len() * 80);

        for (name, group) in Self::group_by_name(metrics) {
            if let Some(help) = &group[0].help {
                output.push_str(&format!("# HELP {} {}\n", name, Self::escape_help(help)));
            }
            output.push_str(&format!("# TYPE {} {}\n", name, group[0].metric_type.as_str()));

            for metric in group {
                output.push_str(&Self::format_metric_line(metric));
                output.push('\n');
            }
        }

        output
    }

    /// Convert samples and format them
    pub fn format_samples(&self, samples: &[Sample]) -> String {
        let metrics: Vec<PrometheusMetric> = samples.iter().map(PrometheusMetric::from).collect();
        self.format(&metrics)
    }

    fn group_by_name(metrics: &[PrometheusMetric]) -> Vec<(&str, Vec<&PrometheusMetric>)> {
        let mut groups: HashMap<&str, Vec<&PrometheusMetric>> = HashMap::new();
        let mut order: Vec<&str> = Vec::new();

        for metric in metrics {
            let name = metric.name.as_str();
            if !groups.contains_key(name) {
                order.push(name);
            }
            groups.entry(name).or_default().push(metric);
        }

        order
            .into_iter()
            .filter_map(|name| groups.remove(name).map(|g| (name, g)))
            .collect()
    }

    fn format_metric_line(metric: &PrometheusMetric) -> String {
        let mut line = metric.name.clone();

        // BTreeMap keeps labels sorted
        if !metric.labels.is_empty() {
            let pairs: Vec<String> = metric
                .labels
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, Self::escape_label_value(v)))
                .collect();

            line.push('{');
            line.push_str(&pairs.join(","));
            line.push('}');
        }

        line.push(' ');
        line.push_str(&Self::format_value(metric.value));
        line
    }

    fn format_value(value: f64) -> String {
        if value.is_nan() {
            "NaN".to_string()
        } else if value.is_infinite() {
            if value.is_sign_positive() {
                "+Inf".to_string()
            } else {
                "-Inf".to_string()
            }
        } else if value.fract() == 0.0 && value.abs() < 1e15 {
            format!("{}", value as i64)
        } else if value.abs() >= 1e6 || (value.abs() < 1e-3 && value != 0.0) {
            format!("{:e}", value)
        } else {
            format!("{}", value)
        }
    }

    fn escape_help(help: &str) -> String {
        help.replace('\\', "\\\\").replace('\n', "\\n")
    }

    fn escape_label_value(value: &str) -> String {
        let mut escaped = String::with_capacity(value.len());
        for c in value.chars() {
            match c {
                '\\' => escaped.push_str("\\\\"),
                '"' => escaped.push_str("\\\""),
                '\n' => escaped.push_str("\\n"),
                _ => escaped.push(c),
            }
        }
        escaped
    }
}

/// collectd exec plugin `PUTVAL` formatter
#[derive(Debug, Clone)]
pub struct PutvalFormatter {
    hostname: String,
    interval: u64,
}

impl PutvalFormatter {
    pub fn new(hostname: impl Into<String>, interval: u64) -> Self {
        Self {
            hostname: hostname.into(),
            interval,
        }
    }

    /// One `PUTVAL` line, without the trailing newline
    pub fn format_line(&self, sample: &Sample) -> String {
        format!(
            "PUTVAL \"{}\" interval={} {}:{}",
            self.identifier(sample),
            self.interval,
            Self::format_time(sample.time),
            Self::format_value(sample.value)
        )
    }

    /// `host/plugin[-plugin_instance]/type[-type_instance]`
    pub fn identifier(&self, sample: &Sample) -> String {
        let mut id = Self::escape_part(&self.hostname);
        id.push('/');
        id.push_str(&Self::escape_part(&sample.plugin));
        if !sample.plugin_instance.is_empty() {
            id.push('-');
            id.push_str(&Self::escape_part(&sample.plugin_instance));
        }
        id.push('/');
        id.push_str(&Self::escape_part(&sample.type_name));
        if !sample.type_instance.is_empty() {
            id.push('-');
            id.push_str(&Self::escape_part(&sample.type_instance));
        }
        id
    }

    // '/' separates identifier parts and cannot be escaped
    fn escape_part(part: &str) -> String {
        let mut escaped = String::with_capacity(part.len());
        for c in part.chars() {
            match c {
                '/' => escaped.push('_'),
                '"' => escaped.push_str("\\\""),
                '\\' => escaped.push_str("\\\\"),
                _ => escaped.push(c),
            }
        }
        escaped
    }

    fn format_time(time: f64) -> String {
        if time <= 0.0 {
            "N".to_string()
        } else {
            format!("{}", time.trunc() as i64)
        }
    }

    /// Integral values are written without a decimal point so COUNTER and
    /// DERIVE data sources accept them; `U` marks an unknown value.
    fn format_value(value: f64) -> String {
        if !value.is_finite() {
            "U".to_string()
        } else if value.fract() == 0.0 && value.abs() < 9.0e15 {
            format!("{}", value as i64)
        } else {
            format!("{}", value)
        }
    }
}
