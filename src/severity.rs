//! Severity model.
//!
//! Findings carry a [`Severity`] drawn from a small totally-ordered scale.
//! The ordering matters: the rule engine and several scanners compare ranks
//! directly (e.g. "escalate by one rank" for an exposed listener).

use std::fmt;

/// Ordered severity rank, least to most critical.
///
/// `Info < Low < Medium < High < Critical`. Derives `Ord` so callers can
/// floor/ceiling/escalate by rank instead of hand-rolling a lookup table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// All variants in ascending rank order.
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Fixed base score attached to every finding at emit time (spec §3).
    pub fn base_score(self) -> u8 {
        match self {
            Severity::Info => 0,
            Severity::Low => 10,
            Severity::Medium => 40,
            Severity::High => 70,
            Severity::Critical => 90,
        }
    }

    /// Escalates by `steps` ranks, saturating at `Critical`.
    pub fn escalate(self, steps: u8) -> Severity {
        let idx = (self as usize).saturating_add(steps as usize);
        Severity::ALL[idx.min(Severity::ALL.len() - 1)]
    }

    /// Canonical lowercase name, as emitted in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Parses a severity name, ASCII case-insensitive.
    ///
    /// Unknown names fall back to [`Severity::Info`] per spec §4.A — the
    /// codec never fails, it degrades.
    pub fn from_str_lenient(s: &str) -> Severity {
        match s.to_ascii_lowercase().as_str() {
            "low" => Severity::Low,
            "medium" | "med" => Severity::Medium,
            "high" => Severity::High,
            "critical" | "crit" => Severity::Critical,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_ascending() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn round_trips_through_string() {
        for sev in Severity::ALL {
            assert_eq!(Severity::from_str_lenient(sev.as_str()), sev);
        }
    }

    #[test]
    fn unknown_name_degrades_to_info() {
        assert_eq!(Severity::from_str_lenient("bogus"), Severity::Info);
    }

    #[test]
    fn escalate_saturates_at_critical() {
        assert_eq!(Severity::Critical.escalate(3), Severity::Critical);
        assert_eq!(Severity::Medium.escalate(1), Severity::High);
    }

    #[test]
    fn base_scores_are_monotonic() {
        let scores: Vec<u8> = Severity::ALL.iter().map(|s| s.base_score()).collect();
        for pair in scores.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
}
