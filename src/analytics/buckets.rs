use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

/// Enrollment-size band. `Null` marks a suppressed total and `All` only ever
/// appears as a filter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnrollmentBucket {
    UnderOneThousand,
    OneToTenThousand,
    TenToTwentyFiveThousand,
    TwentyFiveToHundredThousand,
    HundredToTwoFiftyThousand,
    OverTwoFiftyThousand,
    Null,
    All,
}

/// Exclusive upper bounds, ascending.
const BAND_UPPER_BOUNDS: [(i64, EnrollmentBucket); 5] = [
    (1_000, EnrollmentBucket::UnderOneThousand),
    (10_000, EnrollmentBucket::OneToTenThousand),
    (25_000, EnrollmentBucket::TenToTwentyFiveThousand),
    (100_000, EnrollmentBucket::TwentyFiveToHundredThousand),
    (250_000, EnrollmentBucket::HundredToTwoFiftyThousand),
];

impl EnrollmentBucket {
    pub const ALL_VALUES: [Self; 8] = [
        Self::UnderOneThousand,
        Self::OneToTenThousand,
        Self::TenToTwentyFiveThousand,
        Self::TwentyFiveToHundredThousand,
        Self::HundredToTwoFiftyThousand,
        Self::OverTwoFiftyThousand,
        Self::Null,
        Self::All,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::UnderOneThousand => "<1k",
            Self::OneToTenThousand => "1-10k",
            Self::TenToTwentyFiveThousand => "10-25k",
            Self::TwentyFiveToHundredThousand => "25-100k",
            Self::HundredToTwoFiftyThousand => "100-250k",
            Self::OverTwoFiftyThousand => ">250k",
            Self::Null => "null",
            Self::All => "all",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::UnderOneThousand => "<1k",
            Self::OneToTenThousand => "1k–9.9k",
            Self::TenToTwentyFiveThousand => "10k–24.9k",
            Self::TwentyFiveToHundredThousand => "25k–99.9k",
            Self::HundredToTwoFiftyThousand => "100k–249.9k",
            Self::OverTwoFiftyThousand => ">250k",
            Self::Null => "Suppressed",
            Self::All => "All",
        }
    }

    /// Filter semantics: `All` admits every total.
    pub fn admits(self, total: Option<i64>) -> bool {
        self == Self::All || classify(total) == self
    }
}

impl fmt::Display for EnrollmentBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl Serialize for EnrollmentBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

impl FromStr for EnrollmentBucket {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL_VALUES
            .into_iter()
            .find(|bucket| bucket.id() == normalized)
            .ok_or_else(|| {
                let known = Self::ALL_VALUES
                    .iter()
                    .map(|bucket| bucket.id())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("unknown enrollment level `{value}` (expected one of: {known})")
            })
    }
}

pub fn classify(total: Option<i64>) -> EnrollmentBucket {
    let Some(total) = total else {
        return EnrollmentBucket::Null;
    };

    BAND_UPPER_BOUNDS
        .iter()
        .find(|(upper, _)| total < *upper)
        .map(|(_, bucket)| *bucket)
        .unwrap_or(EnrollmentBucket::OverTwoFiftyThousand)
}

pub fn format_enrollment(total: Option<i64>) -> String {
    let Some(total) = total else {
        return "Suppressed".to_string();
    };

    if total >= 1_000_000 {
        format!("{:.1}M", total as f64 / 1_000_000.0)
    } else if total >= 1_000 {
        format!("{:.1}k", total as f64 / 1_000.0)
    } else {
        group_thousands(total)
    }
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    if value < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}
