use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Origin channel recorded on every stored registration.
pub const REGISTRATION_SOURCE: &str = "web-form";

/// Document collection that receives registrations.
pub const REGISTRATIONS_COLLECTION: &str = "registrations";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Interest {
    BalaBharathi,
    KishoraBharathi,
    Yuva,
    ItMilan,
    SevikaSamithi,
}

impl Interest {
    pub const ALL: [Interest; 5] = [
        Interest::BalaBharathi,
        Interest::KishoraBharathi,
        Interest::Yuva,
        Interest::ItMilan,
        Interest::SevikaSamithi,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Interest::BalaBharathi => "bala-bharathi",
            Interest::KishoraBharathi => "kishora-bharathi",
            Interest::Yuva => "yuva",
            Interest::ItMilan => "it-milan",
            Interest::SevikaSamithi => "sevika-samithi",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Interest::BalaBharathi => "Bala Bharathi (5-12 years)",
            Interest::KishoraBharathi => "Kishora Bharathi (12-16 years)",
            Interest::Yuva => "Yuva (boys and girls of 18-28 years)",
            Interest::ItMilan => "IT Milan (male working professionals)",
            Interest::SevikaSamithi => {
                "Sevika Samithi (female working professionals and homemakers)"
            }
        }
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown area of interest: {0}")]
pub struct UnknownInterest(pub String);

impl FromStr for Interest {
    type Err = UnknownInterest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interest::ALL
            .into_iter()
            .find(|interest| interest.tag() == s)
            .ok_or_else(|| UnknownInterest(s.to_string()))
    }
}

/// One visitor registration as captured by the form.
///
/// Interests travel as plain tags in selection order. The server accepts any
/// tag it is given; only the form restricts choices to [`Interest::ALL`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationRecord {
    pub name: String,
    pub mobile_number: String,
    pub email: String,
    pub apartment: String,
    pub locality: String,
    pub pincode: String,
    pub age: String,
    pub interests: Vec<String>,
    pub notes: String,
}

impl RegistrationRecord {
    pub fn joined_interests(&self) -> String {
        self.interests.join(", ")
    }
}
