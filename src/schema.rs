/*!
 * Schema definitions for registry extracts and canonical tables
 *
 * The raw extract is positional: [`RawField`] names each of the 38 columns
 * by its fixed index. Canonical record tables and patient summary tables
 * carry a header row whose names are defined here.
 */

use serde::{Deserialize, Serialize};

use crate::constants::RAW_FIELD_COUNT;
use crate::SeerError;

/// Positions of the raw extract columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawField {
    PatientId = 0,
    RecordNumber = 1,
    AgeBin = 2,
    DiagnosisYear = 3,
    DeathYear = 4,
    CancerType = 5,
    Behavior = 6,
    BrainMet = 7,
    TAjcc6th = 8,
    NAjcc6th = 9,
    TAjcc7th = 10,
    NAjcc7th = 11,
    TSeerCombined = 12,
    NSeerCombined = 13,
    TEod = 14,
    NEod = 15,
    GAjcc6th = 16,
    GAjcc7th = 17,
    GSeerCombined = 18,
    GEod = 19,
    TotalMalignant = 20,
    TotalBenign = 21,
    HistologyType = 22,
    NodesExamined = 23,
    NodesPositive = 24,
    GradeRecode = 25,
    GradeClinical = 26,
    GradePathological = 27,
    PrimarySiteCode = 28,
    HistologyCategory = 29,
    Psa = 30,
    BoneMet = 31,
    LiverMet = 32,
    LungMet = 33,
    DistantLnMet = 34,
    BreastSubtype = 35,
    FollowupYear = 36,
    OtherMet = 37,
}

impl RawField {
    pub fn index(self) -> usize {
        self as usize
    }

    /// Field name used in error messages
    pub fn name(self) -> &'static str {
        RawExtractSchema::column_names()[self.index()]
    }
}

/// Raw extract layout
pub struct RawExtractSchema;

impl RawExtractSchema {
    pub fn column_names() -> &'static [&'static str; RAW_FIELD_COUNT] {
        &[
            "patient_id",
            "record_number",
            "age_bin",
            "diagnosis_year",
            "death_year",
            "cancer_type",
            "behavior",
            "brain_met",
            "t_ajcc_6th",
            "n_ajcc_6th",
            "t_ajcc_7th",
            "n_ajcc_7th",
            "t_seer_combined",
            "n_seer_combined",
            "t_eod",
            "n_eod",
            "g_ajcc_6th",
            "g_ajcc_7th",
            "g_seer_combined",
            "g_eod",
            "total_malignant",
            "total_benign",
            "histology_type",
            "nodes_examined",
            "nodes_positive",
            "grade_recode",
            "grade_clinical",
            "grade_pathological",
            "primary_site_code",
            "histology_category",
            "psa",
            "bone_met",
            "liver_met",
            "lung_met",
            "distant_ln_met",
            "breast_subtype",
            "followup_year",
            "other_met",
        ]
    }

    pub fn column_count() -> usize {
        RAW_FIELD_COUNT
    }

    /// Check the field count of one raw line
    pub fn validate_field_count(found: usize) -> Result<(), SeerError> {
        if found != RAW_FIELD_COUNT {
            return Err(SeerError::schema_mismatch_detailed(RAW_FIELD_COUNT, found, None));
        }
        Ok(())
    }
}

/// Which columns a canonical record table carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldSet {
    /// Every column, including node counts, metastasis detail and PSA
    #[default]
    Full,
    /// Identity, classification, staging and brain metastasis only
    Core,
}

impl FieldSet {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "full" => Some(FieldSet::Full),
            "core" => Some(FieldSet::Core),
            _ => None,
        }
    }
}

impl std::fmt::Display for FieldSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldSet::Full => write!(f, "full"),
            FieldSet::Core => write!(f, "core"),
        }
    }
}

/// Columns that only [`FieldSet::Full`] carries
const AUXILIARY_COLUMNS: &[&str] = &[
    "regional_nodes_examined",
    "regional_nodes_positive",
    "bone_met",
    "liver_met",
    "lung_met",
    "other_met",
    "distant_ln_met",
    "breast_subtype",
    "psa",
];

/// Canonical record table layout
pub struct CanonicalSchema;

impl CanonicalSchema {
    /// Every canonical column in output order
    pub fn all_columns() -> &'static [&'static str] {
        &[
            // Identity and time
            "patient_id",
            "death_year",
            "diagnosis_agebin",
            "diagnosis_year",
            "followup_year",
            // Classification
            "cancer_type",
            "cancer_group",
            "primary_type",
            "primary_group",
            // Staging
            "t_stage",
            "n_stage",
            "g_stage",
            "t_stage_src",
            "n_stage_src",
            "g_stage_src",
            "grade",
            "grade_src",
            // Histology
            "hist_type",
            "hist_category",
            // Nodes and behaviour
            "regional_nodes",
            "regional_nodes_examined",
            "regional_nodes_positive",
            "behavior",
            "num_malignant_tumors",
            "num_benign_tumors",
            // Metastasis
            "brain_met",
            "bone_met",
            "liver_met",
            "lung_met",
            "other_met",
            "distant_ln_met",
            // Site specific
            "breast_subtype",
            "psa",
        ]
    }

    /// Columns written for a field set
    pub fn column_names(field_set: FieldSet) -> Vec<&'static str> {
        Self::all_columns()
            .iter()
            .copied()
            .filter(|c| field_set == FieldSet::Full || !AUXILIARY_COLUMNS.contains(c))
            .collect()
    }

    pub fn column_count(field_set: FieldSet) -> usize {
        Self::column_names(field_set).len()
    }

    /// Columns that only [`FieldSet::Full`] carries
    pub fn auxiliary_columns() -> &'static [&'static str] {
        AUXILIARY_COLUMNS
    }

    /// Identify the field set from a header row
    pub fn detect_field_set(headers: &[String]) -> Result<FieldSet, SeerError> {
        for field_set in [FieldSet::Full, FieldSet::Core] {
            if headers.len() == Self::column_count(field_set) {
                Self::validate_headers(headers, field_set)?;
                return Ok(field_set);
            }
        }
        Err(SeerError::schema_mismatch_detailed(
            Self::column_count(FieldSet::Full),
            headers.len(),
            None,
        ))
    }

    /// Validate that a header row matches the expected canonical columns
    pub fn validate_headers(headers: &[String], field_set: FieldSet) -> Result<(), SeerError> {
        validate_columns(&Self::column_names(field_set), headers)
    }
}

/// Patient summary table layout
pub struct PatientSummarySchema;

impl PatientSummarySchema {
    pub fn column_names() -> &'static [&'static str] {
        &[
            "patient_id",
            "death_year",
            "num_malignant_tumors",
            "num_benign_tumors",
            "behavior",
            "max_grade",
            // Brain metastasis
            "bm_status",
            "bm_existing",
            "bm_developed",
            // Tumour history
            "num_records",
            "timepoint_first",
            "timepoint_last",
            "cancer_types",
            "diag_years",
            "diag_agebins",
            "t_stages",
            "n_stages",
            "g_stages",
            "grades",
            "hist_types",
            "regnodes",
        ]
    }

    pub fn validate_headers(headers: &[String]) -> Result<(), SeerError> {
        validate_columns(Self::column_names(), headers)
    }
}

fn validate_columns(expected_columns: &[&str], headers: &[String]) -> Result<(), SeerError> {
    if headers.len() != expected_columns.len() {
        return Err(SeerError::schema_mismatch_detailed(
            expected_columns.len(),
            headers.len(),
            None,
        ));
    }

    for (i, (expected, actual)) in expected_columns.iter().zip(headers.iter()).enumerate() {
        if expected != actual {
            return Err(SeerError::schema_mismatch_detailed(
                expected_columns.len(),
                headers.len(),
                Some((i, expected.to_string(), actual.clone())),
            ));
        }
    }

    Ok(())
}
