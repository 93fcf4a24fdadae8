/*!
 * Record builder
 *
 * Turns one positional raw line into a [`CanonicalRecord`]: stage, grade
 * and site fields go through the reconciliation functions, everything else
 * is extracted directly from its fixed position.
 */

use std::str::FromStr;

use tracing::debug;

use crate::code_tables::{
    present, CodeTables, BREAST_SUBTYPE_SENTINELS, PSA_CEILING, PSA_CEILING_CODE, PSA_FLOOR,
    PSA_FLOOR_CODE, PSA_SENTINELS,
};
use crate::constants::{MAX_NODE_COUNT, SEP_CHAR};
use crate::data_types::*;
use crate::grade::{reconcile_grade, GradeInputs};
use crate::schema::{RawExtractSchema, RawField};
use crate::site::{primary_group, primary_type};
use crate::stage::{reconcile_stage, StageInputs};
use crate::{Result, SeerError};

const OTHER_MET_PRESENT: &[&str] = &[
    "Yes; distant mets in known site(s) other than bone, brain, liver, lung, dist LN",
    "generalized metastases such as carinomatosis",
];
const OTHER_MET_ABSENT: &str = "None; no other metastases";
const DISTANT_LN_PRESENT: &str = "Yes; distant lymph node metastases";
const DISTANT_LN_ABSENT: &str = "None; no lymph node metastases";

/// Builds canonical records from raw extract lines
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    tables: CodeTables,
}

impl RecordBuilder {
    pub fn new(tables: CodeTables) -> Self {
        Self { tables }
    }

    /// Builder over the standard code tables
    pub fn standard() -> Result<Self> {
        Ok(Self::new(CodeTables::standard()?))
    }

    pub fn tables(&self) -> &CodeTables {
        &self.tables
    }

    /// Build a record from one tab-separated line
    pub fn build_line(&self, line: &str) -> Result<CanonicalRecord> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(SEP_CHAR).collect();
        self.build(&fields)
    }

    /// Build a record from the 38 raw fields of one line
    pub fn build(&self, fields: &[&str]) -> Result<CanonicalRecord> {
        RawExtractSchema::validate_field_count(fields.len())?;
        let raw = RawLine { fields };

        let patient_id: u64 = raw.parse(RawField::PatientId, "a patient id")?;
        let cancer_type = raw.get(RawField::CancerType).to_string();
        let cancer_group = self.tables.cancer_groups.group(&cancer_type)?.to_string();

        let site_code: u16 = raw.parse(RawField::PrimarySiteCode, "a topography code")?;
        let primary_type = primary_type(&self.tables, site_code, &cancer_type)?;
        let primary_group = primary_group(&self.tables, &primary_type)?;

        let t_stage = reconcile_stage(
            &self.tables.t_stage,
            &StageInputs::new(
                raw.get(RawField::TAjcc6th),
                raw.get(RawField::TAjcc7th),
                raw.get(RawField::TSeerCombined),
                raw.get(RawField::TEod),
            ),
        )?;
        let n_stage = reconcile_stage(
            &self.tables.n_stage,
            &StageInputs::new(
                raw.get(RawField::NAjcc6th),
                raw.get(RawField::NAjcc7th),
                raw.get(RawField::NSeerCombined),
                raw.get(RawField::NEod),
            ),
        )?;
        let g_stage = reconcile_stage(
            &self.tables.g_stage,
            &StageInputs::new(
                raw.get(RawField::GAjcc6th),
                raw.get(RawField::GAjcc7th),
                raw.get(RawField::GSeerCombined),
                raw.get(RawField::GEod),
            ),
        )?;
        let grade = reconcile_grade(
            &self.tables,
            &GradeInputs {
                pathological: raw.get(RawField::GradePathological),
                clinical: raw.get(RawField::GradeClinical),
                recode: raw.get(RawField::GradeRecode),
                cancer_type: &cancer_type,
            },
        )?;

        let nodes_positive: u32 = raw.parse(RawField::NodesPositive, "a node count")?;
        let nodes_examined: u32 = raw.parse(RawField::NodesExamined, "a node count")?;

        let record = CanonicalRecord {
            patient_id,
            death_year: death_year(raw.get(RawField::DeathYear)),
            diagnosis_agebin: raw.get(RawField::AgeBin).to_string(),
            diagnosis_year: raw.parse(RawField::DiagnosisYear, "a year")?,
            followup_year: raw.parse(RawField::FollowupYear, "a year")?,
            cancer_type,
            cancer_group,
            primary_type,
            primary_group,
            hist_type: raw.parse(RawField::HistologyType, "a histology code")?,
            hist_category: raw.get(RawField::HistologyCategory).to_string(),
            t_stage,
            n_stage,
            g_stage,
            grade,
            regional_nodes: RegionalNodes::from_positive_count(nodes_positive),
            regional_nodes_examined: node_count(nodes_examined),
            regional_nodes_positive: node_count(nodes_positive),
            behavior: Behavior::from_raw(raw.get(RawField::Behavior))?,
            num_malignant_tumors: tumor_count(&raw, RawField::TotalMalignant)?,
            num_benign_tumors: tumor_count(&raw, RawField::TotalBenign)?,
            brain_met: yes_no(raw.get(RawField::BrainMet)),
            bone_met: yes_no(raw.get(RawField::BoneMet)),
            liver_met: yes_no(raw.get(RawField::LiverMet)),
            lung_met: yes_no(raw.get(RawField::LungMet)),
            other_met: other_met(raw.get(RawField::OtherMet).trim()),
            distant_ln_met: distant_ln_met(raw.get(RawField::DistantLnMet)),
            breast_subtype: present(raw.get(RawField::BreastSubtype), BREAST_SUBTYPE_SENTINELS)
                .map(str::to_string),
            psa: psa(raw.get(RawField::Psa))?,
        };
        if record.has_primary_mismatch() {
            debug!(
                patient_id,
                cancer_type = %record.cancer_type,
                primary_type = %record.primary_type,
                "primary site mismatch"
            );
        }
        Ok(record)
    }
}

struct RawLine<'a> {
    fields: &'a [&'a str],
}

impl<'a> RawLine<'a> {
    fn get(&self, field: RawField) -> &'a str {
        self.fields[field.index()]
    }

    fn parse<T: FromStr>(&self, field: RawField, expected: &str) -> Result<T> {
        let value = self.get(field).trim();
        value
            .parse()
            .map_err(|_| SeerError::invalid_value(field.name(), value, expected))
    }
}

fn death_year(raw: &str) -> Option<i32> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

fn tumor_count(raw: &RawLine<'_>, field: RawField) -> Result<u32> {
    if raw.get(field) == "Unknown" {
        return Ok(0);
    }
    raw.parse(field, "a tumour count")
}

fn node_count(count: u32) -> Option<u32> {
    (count <= MAX_NODE_COUNT).then_some(count)
}

fn yes_no(raw: &str) -> Option<bool> {
    match raw {
        "Yes" => Some(true),
        "No" => Some(false),
        _ => None,
    }
}

fn other_met(raw: &str) -> Option<bool> {
    if OTHER_MET_PRESENT.contains(&raw) {
        Some(true)
    } else if raw == OTHER_MET_ABSENT {
        Some(false)
    } else {
        None
    }
}

fn distant_ln_met(raw: &str) -> Option<bool> {
    match raw {
        DISTANT_LN_PRESENT => Some(true),
        DISTANT_LN_ABSENT => Some(false),
        _ => None,
    }
}

/// PSA in ng/ml; documented floor and ceiling codes map to their bounds
fn psa(raw: &str) -> Result<Option<f64>> {
    let Some(value) = present(raw.trim(), PSA_SENTINELS) else {
        return Ok(None);
    };
    match value {
        PSA_FLOOR_CODE => Ok(Some(PSA_FLOOR)),
        PSA_CEILING_CODE => Ok(Some(PSA_CEILING)),
        _ => {
            let parsed: f64 = value
                .parse()
                .map_err(|_| SeerError::invalid_value(RawField::Psa.name(), value, "a PSA value"))?;
            if parsed.is_finite() && (0.0..=PSA_CEILING).contains(&parsed) {
                Ok(Some(parsed))
            } else {
                debug!(psa = parsed, "PSA outside the documented range");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::constants::RAW_FIELD_COUNT;

    /// A complete raw line for a breast tumour; tests override single fields
    pub(crate) fn sample_fields() -> Vec<String> {
        let mut fields = vec![String::new(); RAW_FIELD_COUNT];
        let mut set = |field: RawField, value: &str| fields[field.index()] = value.to_string();
        set(RawField::PatientId, "1030");
        set(RawField::RecordNumber, "1");
        set(RawField::AgeBin, "60-64 years");
        set(RawField::DiagnosisYear, "2015");
        set(RawField::DeathYear, "Alive at last contact");
        set(RawField::CancerType, "Breast");
        set(RawField::Behavior, "Malignant");
        set(RawField::BrainMet, "No");
        set(RawField::TAjcc6th, "T1c");
        set(RawField::NAjcc6th, "N0");
        set(RawField::TAjcc7th, "T1c");
        set(RawField::NAjcc7th, "N0");
        set(RawField::TSeerCombined, "Blank(s)");
        set(RawField::NSeerCombined, "Blank(s)");
        set(RawField::TEod, "Blank(s)");
        set(RawField::NEod, "Blank(s)");
        set(RawField::GAjcc6th, "IA");
        set(RawField::GAjcc7th, "IA");
        set(RawField::GSeerCombined, "Blank(s)");
        set(RawField::GEod, "Blank(s)");
        set(RawField::TotalMalignant, "1");
        set(RawField::TotalBenign, "Unknown");
        set(RawField::HistologyType, "8500");
        set(RawField::NodesExamined, "12");
        set(RawField::NodesPositive, "00");
        set(RawField::GradeRecode, "Moderately differentiated; Grade II");
        set(RawField::GradeClinical, "Blank(s)");
        set(RawField::GradePathological, "Blank(s)");
        set(RawField::PrimarySiteCode, "504");
        set(RawField::HistologyCategory, "8500-8549: ductal and lobular neoplasms");
        set(RawField::Psa, "Blank(s)");
        set(RawField::BoneMet, "No");
        set(RawField::LiverMet, "No");
        set(RawField::LungMet, "Unknown");
        set(RawField::DistantLnMet, "None; no lymph node metastases");
        set(RawField::BreastSubtype, "HR+/HER2-");
        set(RawField::FollowupYear, "2021");
        set(RawField::OtherMet, "None; no other metastases ");
        fields
    }

    fn build(overrides: &[(RawField, &str)]) -> Result<CanonicalRecord> {
        let mut fields = sample_fields();
        for (field, value) in overrides {
            fields[field.index()] = value.to_string();
        }
        let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
        RecordBuilder::standard()?.build(&refs)
    }

    #[test]
    fn test_build_sample_record() {
        let record = build(&[]).unwrap();
        assert_eq!(record.patient_id, 1030);
        assert_eq!(record.death_year, None);
        assert_eq!(record.cancer_group, "Breast");
        assert_eq!(record.primary_type, "Breast");
        assert_eq!(record.t_stage, StagedValue::new("T1c", Source::Na));
        assert_eq!(record.g_stage, StagedValue::new("IA", Source::Na));
        assert_eq!(record.grade, GradedValue::new(Grade::G2, Source::Na));
        assert_eq!(record.regional_nodes, RegionalNodes::Neg);
        assert_eq!(record.regional_nodes_examined, Some(12));
        assert_eq!(record.num_benign_tumors, 0);
        assert_eq!(record.lung_met, None);
        assert_eq!(record.other_met, Some(false));
        assert_eq!(record.distant_ln_met, Some(false));
        assert_eq!(record.breast_subtype.as_deref(), Some("HR+/HER2-"));
        assert_eq!(record.psa, None);
    }

    #[test]
    fn test_primary_site_mismatch_is_kept() {
        let record = build(&[(RawField::CancerType, "Lung and Bronchus")]).unwrap();
        assert_eq!(record.primary_type, "Breast");
        assert_eq!(record.cancer_group, "Lung and Bronchus");
        assert!(record.has_primary_mismatch());
        assert!(!build(&[]).unwrap().has_primary_mismatch());
    }

    #[test]
    fn test_psa_sentinels() {
        let floor = build(&[(RawField::Psa, "0.1 or less nanograms/milliliter (ng/ml)")]).unwrap();
        assert_eq!(floor.psa, Some(0.1));
        let ceiling = build(&[(RawField::Psa, "98.0 ng/ml or greater")]).unwrap();
        assert_eq!(ceiling.psa, Some(98.0));
        let measured = build(&[(RawField::Psa, "4.5")]).unwrap();
        assert_eq!(measured.psa, Some(4.5));
        let out_of_range = build(&[(RawField::Psa, "120.0")]).unwrap();
        assert_eq!(out_of_range.psa, None);
        assert!(build(&[(RawField::Psa, "lots")]).is_err());
    }

    #[derive(Clone, Default)]
    struct Capture(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn logged_at(level: tracing::Level, overrides: &[(RawField, &str)]) -> String {
        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || build(overrides).unwrap());
        let bytes = capture.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_out_of_range_psa_logged_at_debug() {
        let out_of_range = [(RawField::Psa, "120.0")];
        let debug = logged_at(tracing::Level::DEBUG, &out_of_range);
        assert!(debug.contains("DEBUG"));
        assert!(debug.contains("PSA outside the documented range"));
        assert!(!logged_at(tracing::Level::WARN, &out_of_range).contains("PSA"));
    }

    #[test]
    fn test_death_year_only_when_digits() {
        assert_eq!(build(&[(RawField::DeathYear, "2019")]).unwrap().death_year, Some(2019));
        assert_eq!(build(&[(RawField::DeathYear, "")]).unwrap().death_year, None);
    }

    #[test]
    fn test_node_counts_outside_range_are_absent() {
        let record = build(&[(RawField::NodesExamined, "98"), (RawField::NodesPositive, "95")]).unwrap();
        assert_eq!(record.regional_nodes_examined, None);
        assert_eq!(record.regional_nodes_positive, None);
        assert_eq!(record.regional_nodes, RegionalNodes::PosAspiration);
    }

    #[test]
    fn test_unknown_behavior_is_error() {
        let err = build(&[(RawField::Behavior, "Metastatic")]).unwrap_err();
        assert!(matches!(err, SeerError::UnknownCode { .. }));
    }

    #[test]
    fn test_breast_subtype_sentinels() {
        assert_eq!(build(&[(RawField::BreastSubtype, "Recode not available")]).unwrap().breast_subtype, None);
        assert_eq!(build(&[(RawField::BreastSubtype, "Blank(s)")]).unwrap().breast_subtype, None);
    }

    #[test]
    fn test_wrong_field_count_is_schema_mismatch() {
        let builder = RecordBuilder::standard().unwrap();
        let err = builder.build(&["1", "2", "3"]).unwrap_err();
        assert!(matches!(err, SeerError::SchemaMismatch { found_columns: Some(3), .. }));
    }

    #[test]
    fn test_build_line_matches_build() {
        let fields = sample_fields();
        let line = format!("{}\r\n", fields.join("\t"));
        let builder = RecordBuilder::standard().unwrap();
        let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
        assert_eq!(builder.build_line(&line).unwrap(), builder.build(&refs).unwrap());
    }
}
