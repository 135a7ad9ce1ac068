// Raw settings as written in the config file, and their resolution into
// `naari_core::Settings`.
//
// Every entry is optional and may be a bare scalar (`retries = 3`) or the
// typed wrapper older files use (`retries = { value = 3, type = "int" }`).
// Anything absent, non-numeric or not positive resolves to the hard
// default; invalid values also produce a warning.

use std::fmt;
use std::time::Duration;

use naari_core::Settings;
use naari_core::config::{defaults, whole_secs_ceil};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn as_f64(&self) -> Option<f64> {
        match self {
            // i64 -> f64 is exact for any sane setting value
            #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
            Self::Int(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Float(_) | Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// A single setting entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Typed {
        value: Scalar,
        #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
        kind: Option<String>,
    },
    Plain(Scalar),
}

impl SettingValue {
    pub fn typed(value: Scalar, kind: &str) -> Self {
        Self::Typed {
            value,
            kind: Some(kind.to_owned()),
        }
    }

    pub fn scalar(&self) -> &Scalar {
        match self {
            Self::Typed { value, .. } | Self::Plain(value) => value,
        }
    }
}

/// `[settings]` table as written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<SettingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_rate: Option<SettingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout: Option<SettingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout: Option<SettingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<SettingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<SettingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<SettingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_backoff: Option<SettingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_min_time: Option<SettingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_max_time: Option<SettingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict_threshold: Option<SettingValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_workers: Option<SettingValue>,
}

/// A setting that was present but unusable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingWarning {
    pub field: &'static str,
    pub reason: String,
}

impl fmt::Display for SettingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "settings.{}: {}", self.field, self.reason)
    }
}

struct Resolver {
    warnings: Vec<SettingWarning>,
}

impl Resolver {
    fn reject<T: fmt::Debug>(&mut self, field: &'static str, value: &Scalar, fallback: T) -> T {
        let reason = format!("invalid value {value}, using {fallback:?}");
        warn!(field, %value, fallback = ?fallback, "invalid setting, falling back to default");
        self.warnings.push(SettingWarning { field, reason });
        fallback
    }

    fn seconds(&mut self, field: &'static str, entry: Option<&SettingValue>, fallback: Duration) -> Duration {
        let Some(value) = entry.map(SettingValue::scalar) else {
            debug!(field, "setting absent, using default");
            return fallback;
        };
        match value
            .as_f64()
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        {
            Some(duration) => duration,
            None => self.reject(field, value, fallback),
        }
    }

    /// Polling cadence is counted in whole seconds; fractions round up.
    fn polling_rate(&mut self, entry: Option<&SettingValue>) -> Duration {
        let field = "polling_rate";
        let rate = self.seconds(field, entry, defaults::POLLING_RATE);
        if rate.subsec_nanos() == 0 {
            return rate;
        }
        let rounded = Duration::from_secs(whole_secs_ceil(rate));
        let reason = format!("fractional value {rate:?} rounded up to {rounded:?}");
        warn!(field, requested = ?rate, rounded = ?rounded, "polling rate rounded up to whole seconds");
        self.warnings.push(SettingWarning { field, reason });
        rounded
    }

    fn positive<T>(&mut self, field: &'static str, entry: Option<&SettingValue>, fallback: T) -> T
    where
        T: TryFrom<i64> + fmt::Debug,
    {
        let Some(value) = entry.map(SettingValue::scalar) else {
            debug!(field, "setting absent, using default");
            return fallback;
        };
        match value
            .as_i64()
            .filter(|n| *n > 0)
            .and_then(|n| T::try_from(n).ok())
        {
            Some(n) => n,
            None => self.reject(field, value, fallback),
        }
    }

    /// Like `positive`, but zero or negative means "no cap".
    fn concurrency(&mut self, entry: Option<&SettingValue>) -> usize {
        let field = "max_concurrency";
        let Some(value) = entry.map(SettingValue::scalar) else {
            return defaults::MAX_CONCURRENCY;
        };
        match value.as_i64() {
            Some(n) if n <= 0 => 0,
            Some(n) => usize::try_from(n).unwrap_or(defaults::MAX_CONCURRENCY),
            None => self.reject(field, value, defaults::MAX_CONCURRENCY),
        }
    }

    fn text(&mut self, field: &'static str, entry: Option<&SettingValue>, fallback: &str) -> String {
        match entry.map(SettingValue::scalar) {
            Some(Scalar::Text(s)) if !s.trim().is_empty() => s.clone(),
            Some(value) => self.reject(field, value, fallback.to_owned()),
            None => fallback.to_owned(),
        }
    }
}

impl RawSettings {
    /// Resolve into typed settings, returning the warnings raised.
    pub fn resolve(&self) -> (Settings, Vec<SettingWarning>) {
        let mut r = Resolver {
            warnings: Vec::new(),
        };

        let settings = Settings {
            app_name: r.text("app_name", self.app_name.as_ref(), defaults::APP_NAME),
            polling_rate: r.polling_rate(self.polling_rate.as_ref()),
            connect_timeout: r.seconds(
                "connect_timeout",
                self.connect_timeout.as_ref(),
                defaults::CONNECT_TIMEOUT,
            ),
            read_timeout: r.seconds("read_timeout", self.read_timeout.as_ref(), defaults::READ_TIMEOUT),
            request_timeout: r.seconds(
                "request_timeout",
                self.request_timeout.as_ref(),
                defaults::REQUEST_TIMEOUT,
            ),
            max_concurrency: r.concurrency(self.max_concurrency.as_ref()),
            retries: r.positive("retries", self.retries.as_ref(), defaults::RETRIES),
            retry_backoff: r.seconds("retry_backoff", self.retry_backoff.as_ref(), defaults::RETRY_BACKOFF),
            idle_min_time: r.seconds("idle_min_time", self.idle_min_time.as_ref(), defaults::IDLE_MIN_TIME),
            idle_max_time: r.seconds("idle_max_time", self.idle_max_time.as_ref(), defaults::IDLE_MAX_TIME),
            conflict_threshold: r.positive(
                "conflict_threshold",
                self.conflict_threshold.as_ref(),
                defaults::CONFLICT_THRESHOLD,
            ),
            command_workers: r.positive(
                "command_workers",
                self.command_workers.as_ref(),
                defaults::COMMAND_WORKERS,
            ),
        };

        (settings, r.warnings)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn plain(value: Scalar) -> Option<SettingValue> {
        Some(SettingValue::Plain(value))
    }

    #[test]
    fn empty_settings_resolve_to_defaults_silently() {
        let (settings, warnings) = RawSettings::default().resolve();
        assert_eq!(settings, Settings::default());
        assert!(warnings.is_empty());
    }

    #[test]
    fn typed_and_plain_values_both_resolve() {
        let raw = RawSettings {
            retries: Some(SettingValue::typed(Scalar::Int(4), "int")),
            retry_backoff: plain(Scalar::Float(0.5)),
            read_timeout: plain(Scalar::Text("7".into())),
            ..RawSettings::default()
        };
        let (settings, warnings) = raw.resolve();
        assert_eq!(settings.retries, 4);
        assert_eq!(settings.retry_backoff, Duration::from_millis(500));
        assert_eq!(settings.read_timeout, Duration::from_secs(7));
        assert!(warnings.is_empty());
    }

    #[test]
    fn invalid_values_fall_back_with_warnings() {
        let raw = RawSettings {
            connect_timeout: plain(Scalar::Text("soon".into())),
            retries: plain(Scalar::Int(-1)),
            retry_backoff: plain(Scalar::Float(0.0)),
            command_workers: plain(Scalar::Bool(true)),
            ..RawSettings::default()
        };
        let (settings, warnings) = raw.resolve();

        assert_eq!(settings.connect_timeout, defaults::CONNECT_TIMEOUT);
        assert_eq!(settings.retries, defaults::RETRIES);
        assert_eq!(settings.retry_backoff, defaults::RETRY_BACKOFF);
        assert_eq!(settings.command_workers, defaults::COMMAND_WORKERS);
        let fields: Vec<_> = warnings.iter().map(|w| w.field).collect();
        assert_eq!(
            fields,
            vec!["connect_timeout", "retries", "retry_backoff", "command_workers"]
        );
    }

    #[test]
    fn non_positive_concurrency_means_unbounded() {
        let raw = RawSettings {
            max_concurrency: plain(Scalar::Int(0)),
            ..RawSettings::default()
        };
        let (settings, warnings) = raw.resolve();
        assert_eq!(settings.max_concurrency, 0);
        assert!(warnings.is_empty());

        let raw = RawSettings {
            max_concurrency: plain(Scalar::Text("lots".into())),
            ..RawSettings::default()
        };
        assert_eq!(raw.resolve().0.max_concurrency, defaults::MAX_CONCURRENCY);
    }

    #[test]
    fn fractional_polling_rate_rounds_up_with_warning() {
        let raw = RawSettings {
            polling_rate: plain(Scalar::Float(0.5)),
            ..RawSettings::default()
        };
        let (settings, warnings) = raw.resolve();
        assert_eq!(settings.polling_rate, Duration::from_secs(1));
        assert_eq!(settings.throttle().polling_rate_secs, 1);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].field, "polling_rate");

        let raw = RawSettings {
            polling_rate: plain(Scalar::Float(1.5)),
            ..RawSettings::default()
        };
        assert_eq!(raw.resolve().0.polling_rate, Duration::from_secs(2));
    }
}
