//! Domain entities built on the base model.

mod certificate;
mod certificate_type;
mod customer;
mod observation;
mod setting;
mod user;

pub use certificate::{Certificate, REFERENCE_ALPHABET};
pub use certificate_type::CertificateType;
pub use customer::Customer;
pub use observation::Observation;
pub use setting::Setting;
pub use user::User;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Lifecycle of a certificate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    Draft,
    Issued,
    Expired,
    Superseded,
}

impl CertificateStatus {
    pub const ALL: [CertificateStatus; 4] = [
        CertificateStatus::Draft,
        CertificateStatus::Issued,
        CertificateStatus::Expired,
        CertificateStatus::Superseded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::Draft => "draft",
            CertificateStatus::Issued => "issued",
            CertificateStatus::Expired => "expired",
            CertificateStatus::Superseded => "superseded",
        }
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertificateStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CertificateStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseEnumError {
                kind: "certificate status",
                value: s.to_string(),
            })
    }
}

/// BS 7671 observation classification code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(clippy::upper_case_acronyms)]
pub enum Priority {
    C1,
    C2,
    C3,
    FI,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::C1, Priority::C2, Priority::C3, Priority::FI];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::C1 => "C1",
            Priority::C2 => "C2",
            Priority::C3 => "C3",
            Priority::FI => "FI",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Priority::C1 => "Danger present, immediate action required",
            Priority::C2 => "Potentially dangerous, urgent remedial action required",
            Priority::C3 => "Improvement recommended",
            Priority::FI => "Further investigation required without delay",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseEnumError {
                kind: "priority",
                value: s.to_string(),
            })
    }
}

/// `in:` rule argument list for an enum's textual forms.
fn one_of(values: impl IntoIterator<Item = &'static str>) -> String {
    format!("in:{}", values.into_iter().collect::<Vec<_>>().join(","))
}
