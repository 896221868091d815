use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Medication safety
// ---------------------------------------------------------------------------

/// Ordered most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionSeverity {
    Major,
    Moderate,
    Minor,
    Unknown,
}

impl InteractionSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Moderate => "moderate",
            Self::Minor => "minor",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient mapping of model wording ("Severe", "MODERATE", "low").
    pub fn from_model(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "major" | "severe" | "high" | "serious" | "contraindicated" => Self::Major,
            "moderate" | "medium" => Self::Moderate,
            "minor" | "mild" | "low" => Self::Minor,
            _ => Self::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for InteractionSeverity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_model(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugInteraction {
    /// The two drugs (or drug and condition), e.g. "Lisinopril + Spironolactone".
    pub pair: String,
    pub severity: InteractionSeverity,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationSafetyReport {
    pub interactions: Vec<DrugInteraction>,
    #[serde(default)]
    pub contraindications: Vec<String>,
    pub safe: bool,
}

impl MedicationSafetyReport {
    /// Nothing active to check.
    pub fn nothing_to_check() -> Self {
        Self {
            interactions: Vec::new(),
            contraindications: Vec::new(),
            safe: true,
        }
    }

    pub fn has_major_interaction(&self) -> bool {
        self.interactions
            .iter()
            .any(|i| i.severity == InteractionSeverity::Major)
    }
}

// ---------------------------------------------------------------------------
// Guideline adherence
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdherenceStatus {
    FullyAdherent,
    Partial,
    NonAdherent,
    Unknown,
}

impl AdherenceStatus {
    pub fn from_model(s: &str) -> Self {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == '_' { ' ' } else { c })
            .collect();
        match key.as_str() {
            "fully adherent" | "adherent" | "full" => Self::FullyAdherent,
            "partial" | "partially adherent" => Self::Partial,
            "non adherent" | "nonadherent" | "not adherent" => Self::NonAdherent,
            _ => Self::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for AdherenceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_model(&raw))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidelineAdherenceReport {
    /// e.g. "ACC/AHA 2022 HFrEF GDMT".
    pub guideline_name: String,
    pub adherence_status: AdherenceStatus,
    #[serde(default)]
    pub missing_therapies: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

// ---------------------------------------------------------------------------
// Vital trends
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalTrend {
    pub metric: String,
    /// Free text: "Uptrend", "Stable", "Improving".
    pub trend: String,
    pub significance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalTrendReport {
    pub trends: Vec<VitalTrend>,
    /// Overall: stable, unstable, improving or deteriorating.
    pub assessment: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

// ---------------------------------------------------------------------------
// Clinical note
// ---------------------------------------------------------------------------

/// SOAP note drafted from the stored records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalNote {
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
}
