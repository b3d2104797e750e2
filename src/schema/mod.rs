//! Structured shapes the model is asked to produce.
//!
//! Every generation call targets one of the types in this module. Each type
//! derives [`schemars::JsonSchema`] so the provider can be handed a schema
//! descriptor, and implements [`StructuredOutput`] so the constraints serde
//! cannot express (digit counts, length limits, non-empty text) are checked
//! before the value leaves the generation client.
//!
//! Field doc comments double as schema descriptions and end up in the
//! provider request, so they are written for the model.

pub mod customer;
pub mod feedback;
pub mod record;
pub mod representative;
pub mod service_case;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub use customer::{Customer, CustomerType};
pub use feedback::Feedback;
pub use record::Record;
pub use representative::{Department, Representative};
pub use service_case::{ServiceCase, ServiceCategory, ServiceChannel, ServiceStatus, ServiceType};

/// A type the generation client can request from a model.
pub trait StructuredOutput: DeserializeOwned + schemars::JsonSchema + Send {
    /// Schema name sent to the provider and used in error messages.
    const NAME: &'static str;

    /// Checks constraints that deserialization alone does not enforce.
    fn validate(&self) -> Result<(), String>;

    /// JSON Schema descriptor for this type, as sent to the provider.
    fn schema_descriptor() -> Value {
        serde_json::to_value(schemars::schema_for!(Self)).unwrap_or_default()
    }
}

/// A string that does not name any variant of a wire enum.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares an enum whose serialized form is a human-readable label.
///
/// Generates the serde/schemars derives, `ALL`, `as_str`, `Display` and a
/// `FromStr` that accepts the label and any listed aliases.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $variant:ident => $wire:literal $(| $alias:literal)* ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash,
            serde::Serialize, serde::Deserialize, schemars::JsonSchema,
        )]
        pub enum $name {
            $(
                #[serde(rename = $wire $(, alias = $alias)*)]
                $variant,
            )+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The label written to the record log.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::schema::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire $(| $alias)* => Ok($name::$variant),)+
                    _ => Err($crate::schema::UnknownVariant {
                        kind: stringify!($name),
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

pub(crate) use wire_enum;

/// Parses an ISO-8601 timestamp as produced by the model.
///
/// Accepts RFC 3339, `YYYY-MM-DDTHH:MM[:SS[.f]]` with or without an offset
/// (`Z`, `+HH:MM`, `+HHMM` or `+HH`), the same with a space instead of `T`,
/// and a bare date. Values without an offset are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    const OFFSET_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f%#z",
        "%Y-%m-%dT%H:%M%#z",
        "%Y-%m-%d %H:%M:%S%.f%#z",
        "%Y-%m-%d %H:%M%#z",
    ];
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    // A trailing `Z` is UTC; what precedes it parses as a naive time.
    let naive_part = value
        .strip_suffix('Z')
        .or_else(|| value.strip_suffix('z'))
        .unwrap_or(value);

    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(naive_part, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Fails with `"{field} must not be empty"` when `value` is blank.
pub(crate) fn require_text(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} must not be empty"))
    } else {
        Ok(())
    }
}
