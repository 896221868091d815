use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(ExtractionStatus {
    Idle => "idle",
    Extracting => "extracting",
    Saving => "saving",
    Completed => "completed",
    Failed => "failed",
});

impl ExtractionStatus {
    /// `completed` and `failed` end a pipeline run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl Default for ExtractionStatus {
    fn default() -> Self {
        Self::Idle
    }
}

str_enum!(MedicationStatus {
    Active => "active",
    Stopped => "stopped",
    Held => "held",
});

str_enum!(DiagnosisStatus {
    Active => "active",
    Resolved => "resolved",
    Chronic => "chronic",
});

str_enum!(LabFlag {
    Normal => "normal",
    Low => "low",
    High => "high",
    Critical => "critical",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            ExtractionStatus::Idle,
            ExtractionStatus::Extracting,
            ExtractionStatus::Saving,
            ExtractionStatus::Completed,
            ExtractionStatus::Failed,
        ] {
            assert_eq!(ExtractionStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_value_is_invalid_enum() {
        let err = MedicationStatus::from_str("paused").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&MedicationStatus::Held).unwrap();
        assert_eq!(json, "\"held\"");
    }

    #[test]
    fn only_completed_and_failed_are_terminal() {
        assert!(ExtractionStatus::Completed.is_terminal());
        assert!(ExtractionStatus::Failed.is_terminal());
        assert!(!ExtractionStatus::Extracting.is_terminal());
        assert!(!ExtractionStatus::Saving.is_terminal());
        assert!(!ExtractionStatus::Idle.is_terminal());
    }
}
