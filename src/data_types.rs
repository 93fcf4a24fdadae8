/*!
 * Data type definitions for canonical registry records
 *
 * Enumerations carry their own raw/serialised codes. `Grade` keeps identity
 * and severity apart: the four lymphoid lineage markers are distinct values
 * that share the severity rank of `G4`.
 */

use serde::{Deserialize, Serialize};

use crate::constants::NA_CHAR;
use crate::{Result, SeerError};

/// Provenance of a normalised stage or grade value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    #[default]
    Na,
    Clinical,
    Pathological,
    Both,
}

impl Source {
    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            NA_CHAR => Ok(Source::Na),
            "C" => Ok(Source::Clinical),
            "P" => Ok(Source::Pathological),
            "B" => Ok(Source::Both),
            _ => Err(SeerError::unknown_code("source", code)),
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            Source::Na => NA_CHAR,
            Source::Clinical => "C",
            Source::Pathological => "P",
            Source::Both => "B",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Na => write!(f, "NA"),
            Source::Clinical => write!(f, "CLINICAL"),
            Source::Pathological => write!(f, "PATHOLOGICAL"),
            Source::Both => write!(f, "BOTH"),
        }
    }
}

/// Severity rank used when comparing grades.
///
/// `0` means no information; lineage markers rank `5` together with `G4`'s
/// aggressiveness tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GradeRank(pub u8);

/// Tumour grade (differentiation) in the canonical vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Grade {
    #[default]
    #[serde(rename = "NA")]
    Na,
    G1,
    G2,
    G3,
    G4,
    #[serde(rename = "T_CELL")]
    TCell,
    #[serde(rename = "B_CELL")]
    BCell,
    #[serde(rename = "NULL_CELL")]
    NullCell,
    #[serde(rename = "NK_CELL")]
    NkCell,
}

impl Grade {
    /// Severity rank, independent of declaration order
    pub fn rank(&self) -> GradeRank {
        match self {
            Grade::Na => GradeRank(0),
            Grade::G1 => GradeRank(1),
            Grade::G2 => GradeRank(2),
            Grade::G3 => GradeRank(3),
            Grade::G4 => GradeRank(5),
            Grade::TCell | Grade::BCell | Grade::NullCell | Grade::NkCell => GradeRank(5),
        }
    }

    /// Compare by severity only
    pub fn same_rank(&self, other: &Grade) -> bool {
        self.rank() == other.rank()
    }

    /// Symbolic name, as written to canonical tables
    pub fn as_name(&self) -> &'static str {
        match self {
            Grade::Na => "NA",
            Grade::G1 => "G1",
            Grade::G2 => "G2",
            Grade::G3 => "G3",
            Grade::G4 => "G4",
            Grade::TCell => "T_CELL",
            Grade::BCell => "B_CELL",
            Grade::NullCell => "NULL_CELL",
            Grade::NkCell => "NK_CELL",
        }
    }

    /// Serialised form: the NA variant becomes the NA sentinel
    pub fn as_field(&self) -> &'static str {
        match self {
            Grade::Na => NA_CHAR,
            other => other.as_name(),
        }
    }

    pub fn from_field(field: &str) -> Result<Self> {
        match field {
            NA_CHAR | "NA" => Ok(Grade::Na),
            "G1" => Ok(Grade::G1),
            "G2" => Ok(Grade::G2),
            "G3" => Ok(Grade::G3),
            "G4" => Ok(Grade::G4),
            "T_CELL" => Ok(Grade::TCell),
            "B_CELL" => Ok(Grade::BCell),
            "NULL_CELL" => Ok(Grade::NullCell),
            "NK_CELL" => Ok(Grade::NkCell),
            _ => Err(SeerError::unknown_code("grade", field)),
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_name())
    }
}

/// Tumour behaviour, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Behavior {
    #[default]
    Benign,
    Borderline,
    Malignant,
}

impl Behavior {
    /// Interpret the registry's behaviour recode
    pub fn from_raw(raw: &str) -> Result<Self> {
        match raw {
            "Malignant" => Ok(Behavior::Malignant),
            "Borderline malignancy" => Ok(Behavior::Borderline),
            "Benign" | "In situ" => Ok(Behavior::Benign),
            _ => Err(SeerError::unknown_code("behavior", raw)),
        }
    }

    pub fn as_name(&self) -> &'static str {
        match self {
            Behavior::Benign => "BENIGN",
            Behavior::Borderline => "BORDERLINE",
            Behavior::Malignant => "MALIGNANT",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "BENIGN" => Ok(Behavior::Benign),
            "BORDERLINE" => Ok(Behavior::Borderline),
            "MALIGNANT" => Ok(Behavior::Malignant),
            _ => Err(SeerError::unknown_code("behavior", name)),
        }
    }
}

impl std::fmt::Display for Behavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_name())
    }
}

/// Regional lymph node involvement derived from the positive-node count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegionalNodes {
    #[default]
    Na,
    Neg,
    PosAspiration,
    PosNodes,
}

impl RegionalNodes {
    /// Categorise the registry's "regional nodes positive" count
    ///
    /// 00 all negative, 95 positive aspiration, 98/99 not examined or unknown,
    /// anything else some positive nodes.
    pub fn from_positive_count(count: u32) -> Self {
        match count {
            0 => RegionalNodes::Neg,
            95 => RegionalNodes::PosAspiration,
            98 | 99 => RegionalNodes::Na,
            _ => RegionalNodes::PosNodes,
        }
    }

    pub fn as_name(&self) -> &'static str {
        match self {
            RegionalNodes::Na => "NA",
            RegionalNodes::Neg => "NEG",
            RegionalNodes::PosAspiration => "POS_ASPIRATION",
            RegionalNodes::PosNodes => "POS_NODES",
        }
    }

    pub fn as_field(&self) -> &'static str {
        match self {
            RegionalNodes::Na => NA_CHAR,
            other => other.as_name(),
        }
    }

    pub fn from_field(field: &str) -> Result<Self> {
        match field {
            NA_CHAR | "NA" => Ok(RegionalNodes::Na),
            "NEG" => Ok(RegionalNodes::Neg),
            "POS_ASPIRATION" => Ok(RegionalNodes::PosAspiration),
            "POS_NODES" => Ok(RegionalNodes::PosNodes),
            _ => Err(SeerError::unknown_code("regional_nodes", field)),
        }
    }
}

/// Stage category handled by the reconciliation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageCategory {
    /// Primary tumour extent
    T,
    /// Regional lymph nodes
    N,
    /// Overall stage group
    G,
}

impl StageCategory {
    pub const ALL: [StageCategory; 3] = [StageCategory::T, StageCategory::N, StageCategory::G];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageCategory::T => "t_stage",
            StageCategory::N => "n_stage",
            StageCategory::G => "g_stage",
        }
    }
}

/// A canonical stage value together with its provenance
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StagedValue {
    pub stage: Option<String>,
    pub source: Source,
}

impl StagedValue {
    pub fn new(stage: impl Into<String>, source: Source) -> Self {
        Self {
            stage: Some(stage.into()),
            source,
        }
    }

    /// No usable information from any scheme
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn is_missing(&self) -> bool {
        self.stage.is_none()
    }
}

/// A grade together with its provenance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GradedValue {
    pub grade: Grade,
    pub source: Source,
}

impl GradedValue {
    pub fn new(grade: Grade, source: Source) -> Self {
        Self { grade, source }
    }
}

/// One normalised tumour diagnosis event
///
/// Optional fields hold `None` for documented missing values; they are never
/// replaced by zero or `false`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    // Identity and time
    pub patient_id: u64,
    pub death_year: Option<i32>,
    pub diagnosis_agebin: String,
    pub diagnosis_year: i32,
    pub followup_year: i32,

    // Classification
    pub cancer_type: String,
    pub cancer_group: String,
    pub primary_type: String,
    pub primary_group: String,
    pub hist_type: u32,
    pub hist_category: String,

    // Staging and grade
    pub t_stage: StagedValue,
    pub n_stage: StagedValue,
    pub g_stage: StagedValue,
    pub grade: GradedValue,

    // Nodes and behaviour
    pub regional_nodes: RegionalNodes,
    pub regional_nodes_examined: Option<u32>,
    pub regional_nodes_positive: Option<u32>,
    pub behavior: Behavior,
    pub num_malignant_tumors: u32,
    pub num_benign_tumors: u32,

    // Metastasis at diagnosis (tri-state)
    pub brain_met: Option<bool>,
    pub bone_met: Option<bool>,
    pub liver_met: Option<bool>,
    pub lung_met: Option<bool>,
    pub other_met: Option<bool>,
    pub distant_ln_met: Option<bool>,

    // Site specific
    pub breast_subtype: Option<String>,
    pub psa: Option<f64>,
}

impl CanonicalRecord {
    /// Stage for one category
    pub fn stage(&self, category: StageCategory) -> &StagedValue {
        match category {
            StageCategory::T => &self.t_stage,
            StageCategory::N => &self.n_stage,
            StageCategory::G => &self.g_stage,
        }
    }

    /// Whether the primary type disagrees with the recorded cancer type
    pub fn has_primary_mismatch(&self) -> bool {
        self.primary_type != self.cancer_type
    }

    /// Brain metastasis reported at diagnosis; unknown counts as absent
    pub fn has_brain_met(&self) -> bool {
        self.brain_met == Some(true)
    }
}
