/*!
 * Patient aggregation
 *
 * Canonical records arrive grouped by patient id. [`PatientAggregator`]
 * folds consecutive records of one patient into a [`Patient`] and hands it
 * back as soon as a record for another patient arrives, or at end of stream.
 * Input that is not grouped by patient id produces one patient per run of
 * equal ids; it is not detected.
 */

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::code_tables::MISCELLANEOUS;
use crate::data_types::{Behavior, CanonicalRecord, Grade, RegionalNodes};

const AGE_BIN_SUFFIX: &str = " years";

/// All records of one patient, sorted by diagnosis year
#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    patient_id: u64,
    death_year: Option<i32>,
    behavior: Behavior,
    num_malignant_tumors: u32,
    num_benign_tumors: u32,
    records: Vec<CanonicalRecord>,
}

impl Patient {
    /// Start a patient from its first record
    pub fn new(first: CanonicalRecord) -> Self {
        let mut patient = Self {
            patient_id: first.patient_id,
            death_year: None,
            behavior: Behavior::Benign,
            num_malignant_tumors: 0,
            num_benign_tumors: 0,
            records: Vec::with_capacity(1),
        };
        patient.update(first);
        patient
    }

    /// Fold one more record of this patient in
    pub fn update(&mut self, record: CanonicalRecord) {
        if self.death_year.is_none() {
            self.death_year = record.death_year;
        }
        self.behavior = self.behavior.max(record.behavior);
        self.num_malignant_tumors = self.num_malignant_tumors.max(record.num_malignant_tumors);
        self.num_benign_tumors = self.num_benign_tumors.max(record.num_benign_tumors);

        self.records.push(record);
        // stable: records from the same year keep their arrival order
        self.records.sort_by_key(|r| r.diagnosis_year);
    }

    pub fn patient_id(&self) -> u64 {
        self.patient_id
    }

    pub fn death_year(&self) -> Option<i32> {
        self.death_year
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    pub fn num_malignant_tumors(&self) -> u32 {
        self.num_malignant_tumors
    }

    pub fn num_benign_tumors(&self) -> u32 {
        self.num_benign_tumors
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn first_tumor(&self) -> &CanonicalRecord {
        &self.records[0]
    }

    pub fn last_tumor(&self) -> &CanonicalRecord {
        &self.records[self.records.len() - 1]
    }

    /// Site of the earliest tumour that is not a miscellaneous diagnosis
    pub fn first_tumor_site(&self) -> &str {
        self.records
            .iter()
            .map(|r| r.cancer_type.as_str())
            .find(|site| *site != MISCELLANEOUS)
            .unwrap_or(self.first_tumor().cancer_type.as_str())
    }

    /// Highest grade by severity; the earliest tumour wins ties
    pub fn max_grade(&self) -> Grade {
        self.records.iter().fold(Grade::Na, |best, r| {
            if r.grade.grade.rank() > best.rank() {
                r.grade.grade
            } else {
                best
            }
        })
    }

    /// Drop every record after the first one reporting brain metastasis
    pub fn truncate_at_brain_met(&mut self) {
        if let Some(pos) = self.records.iter().position(CanonicalRecord::has_brain_met) {
            if pos + 1 < self.records.len() {
                trace!(patient_id = self.patient_id, kept = pos + 1, "truncating after brain metastasis");
                self.records.truncate(pos + 1);
            }
        }
    }

    /// Patient-level summary row
    pub fn summary(&self) -> PatientSummary {
        let first = self.first_tumor();
        let last = self.last_tumor();
        let bm_existing = first.has_brain_met();
        let bm_status = last.has_brain_met();

        PatientSummary {
            patient_id: self.patient_id,
            death_year: self.death_year,
            num_malignant_tumors: self.num_malignant_tumors,
            num_benign_tumors: self.num_benign_tumors,
            behavior: self.behavior,
            max_grade: self.max_grade(),
            bm_status,
            bm_existing,
            bm_developed: bm_status && !bm_existing,
            num_records: self.records.len(),
            timepoint_first: first.diagnosis_year,
            timepoint_last: last.diagnosis_year,
            cancer_types: self.records.iter().map(|r| r.cancer_type.clone()).collect(),
            diag_years: self.records.iter().map(|r| r.diagnosis_year).collect(),
            diag_agebins: self
                .records
                .iter()
                .map(|r| r.diagnosis_agebin.replace(AGE_BIN_SUFFIX, ""))
                .collect(),
            t_stages: self.records.iter().map(|r| r.t_stage.stage.clone()).collect(),
            n_stages: self.records.iter().map(|r| r.n_stage.stage.clone()).collect(),
            g_stages: self.records.iter().map(|r| r.g_stage.stage.clone()).collect(),
            grades: self.records.iter().map(|r| r.grade.grade).collect(),
            hist_types: self.records.iter().map(|r| r.hist_type).collect(),
            regnodes: self.records.iter().map(|r| r.regional_nodes).collect(),
        }
    }
}

/// One row of the patient summary table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientSummary {
    pub patient_id: u64,
    pub death_year: Option<i32>,
    pub num_malignant_tumors: u32,
    pub num_benign_tumors: u32,
    pub behavior: Behavior,
    pub max_grade: Grade,

    /// Brain metastasis at the latest tumour
    pub bm_status: bool,
    /// Brain metastasis at the earliest tumour
    pub bm_existing: bool,
    /// Brain metastasis at the latest tumour but not the earliest
    pub bm_developed: bool,

    pub num_records: usize,
    pub timepoint_first: i32,
    pub timepoint_last: i32,

    // Per-tumour history, chronological
    pub cancer_types: Vec<String>,
    pub diag_years: Vec<i32>,
    pub diag_agebins: Vec<String>,
    pub t_stages: Vec<Option<String>>,
    pub n_stages: Vec<Option<String>>,
    pub g_stages: Vec<Option<String>>,
    pub grades: Vec<Grade>,
    pub hist_types: Vec<u32>,
    pub regnodes: Vec<RegionalNodes>,
}

/// Streaming fold of grouped canonical records into patients
#[derive(Debug, Default)]
pub struct PatientAggregator {
    active: Option<Patient>,
    truncate_after_brain_met: bool,
}

impl PatientAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cut each finished patient's history after its first brain metastasis
    pub fn with_brain_met_truncation(mut self, enabled: bool) -> Self {
        self.truncate_after_brain_met = enabled;
        self
    }

    /// Fold in one record; returns the previous patient if this record starts a new one
    pub fn push(&mut self, record: CanonicalRecord) -> Option<Patient> {
        if let Some(patient) = self.active.as_mut() {
            if patient.patient_id == record.patient_id {
                patient.update(record);
                return None;
            }
        }
        let finished = self.active.replace(Patient::new(record));
        finished.map(|p| self.finalize(p))
    }

    /// End of stream: returns the patient still being accumulated
    pub fn finish(&mut self) -> Option<Patient> {
        self.active.take().map(|p| self.finalize(p))
    }

    fn finalize(&self, mut patient: Patient) -> Patient {
        if self.truncate_after_brain_met {
            patient.truncate_at_brain_met();
        }
        patient
    }

    /// Aggregate a whole grouped record sequence
    pub fn aggregate<I>(mut self, records: I) -> Vec<Patient>
    where
        I: IntoIterator<Item = CanonicalRecord>,
    {
        let mut patients: Vec<Patient> = records.into_iter().filter_map(|r| self.push(r)).collect();
        patients.extend(self.finish());
        patients
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data_types::{GradedValue, Source, StagedValue};
    use proptest::prelude::*;

    pub(crate) fn record(patient_id: u64, year: i32) -> CanonicalRecord {
        CanonicalRecord {
            patient_id,
            death_year: None,
            diagnosis_agebin: "60-64 years".to_string(),
            diagnosis_year: year,
            followup_year: 2021,
            cancer_type: "Breast".to_string(),
            cancer_group: "Breast".to_string(),
            primary_type: "Breast".to_string(),
            primary_group: "Breast".to_string(),
            hist_type: 8500,
            hist_category: "8500-8549: ductal and lobular neoplasms".to_string(),
            t_stage: StagedValue::new("T2", Source::Na),
            n_stage: StagedValue::missing(),
            g_stage: StagedValue::new("IIA", Source::Clinical),
            grade: GradedValue::new(Grade::G2, Source::Pathological),
            regional_nodes: RegionalNodes::Neg,
            regional_nodes_examined: Some(4),
            regional_nodes_positive: Some(0),
            behavior: Behavior::Malignant,
            num_malignant_tumors: 1,
            num_benign_tumors: 0,
            brain_met: Some(false),
            bone_met: None,
            liver_met: Some(false),
            lung_met: Some(false),
            other_met: None,
            distant_ln_met: Some(false),
            breast_subtype: None,
            psa: None,
        }
    }

    #[test]
    fn test_records_sorted_by_diagnosis_year() {
        let mut patient = Patient::new(record(7, 2015));
        patient.update(record(7, 2009));
        patient.update(record(7, 2012));
        let years: Vec<i32> = patient.records().iter().map(|r| r.diagnosis_year).collect();
        assert_eq!(years, vec![2009, 2012, 2015]);
        assert_eq!(patient.first_tumor().diagnosis_year, 2009);
        assert_eq!(patient.last_tumor().diagnosis_year, 2015);
    }

    #[test]
    fn test_folding_is_deterministic() {
        let fold = || {
            let mut patient = Patient::new(record(7, 2009));
            patient.update(record(7, 2012));
            patient.summary()
        };
        assert_eq!(fold(), fold());
    }

    #[test]
    fn test_running_maxima_and_first_death_year() {
        let mut a = record(7, 2009);
        a.behavior = Behavior::Borderline;
        a.num_benign_tumors = 2;
        let mut b = record(7, 2012);
        b.death_year = Some(2014);
        b.num_malignant_tumors = 3;
        let mut c = record(7, 2013);
        c.death_year = Some(2015);

        let mut patient = Patient::new(a);
        patient.update(b);
        patient.update(c);
        assert_eq!(patient.behavior(), Behavior::Malignant);
        assert_eq!(patient.num_malignant_tumors(), 3);
        assert_eq!(patient.num_benign_tumors(), 2);
        assert_eq!(patient.death_year(), Some(2014));
    }

    #[test]
    fn test_max_grade_uses_rank() {
        let mut a = record(7, 2009);
        a.grade = GradedValue::new(Grade::NkCell, Source::Na);
        let mut b = record(7, 2012);
        b.grade = GradedValue::new(Grade::G4, Source::Na);
        let mut patient = Patient::new(a);
        patient.update(b);
        assert_eq!(patient.max_grade(), Grade::NkCell);
        assert!(patient.max_grade().same_rank(&Grade::G4));
    }

    #[test]
    fn test_brain_met_flags() {
        let first = record(7, 2009);
        let mut second = record(7, 2012);
        second.brain_met = Some(true);
        let mut patient = Patient::new(first);
        patient.update(second);
        let summary = patient.summary();
        assert!(summary.bm_status);
        assert!(!summary.bm_existing);
        assert!(summary.bm_developed);
        assert_eq!(summary.diag_agebins, vec!["60-64", "60-64"]);
    }

    #[test]
    fn test_truncate_at_brain_met() {
        let mut with_met = record(7, 2010);
        with_met.brain_met = Some(true);
        let mut patient = Patient::new(record(7, 2009));
        patient.update(with_met);
        patient.update(record(7, 2014));
        patient.truncate_at_brain_met();
        assert_eq!(patient.records().len(), 2);
        assert!(patient.last_tumor().has_brain_met());
    }

    #[test]
    fn test_first_tumor_site_skips_miscellaneous() {
        let mut misc = record(7, 2009);
        misc.cancer_type = "Miscellaneous".to_string();
        let mut lung = record(7, 2012);
        lung.cancer_type = "Lung and Bronchus".to_string();
        let mut patient = Patient::new(misc.clone());
        patient.update(lung);
        assert_eq!(patient.first_tumor_site(), "Lung and Bronchus");

        let only_misc = Patient::new(misc);
        assert_eq!(only_misc.first_tumor_site(), "Miscellaneous");
    }

    #[test]
    fn test_aggregator_emits_on_patient_change() {
        let mut aggregator = PatientAggregator::new();
        assert!(aggregator.push(record(1, 2010)).is_none());
        assert!(aggregator.push(record(1, 2008)).is_none());
        let first = aggregator.push(record(2, 2011)).unwrap();
        assert_eq!(first.patient_id(), 1);
        assert_eq!(first.records().len(), 2);
        let last = aggregator.finish().unwrap();
        assert_eq!(last.patient_id(), 2);
        assert!(aggregator.finish().is_none());
    }

    #[test]
    fn test_aggregate_with_truncation() {
        let mut met = record(3, 2010);
        met.brain_met = Some(true);
        let patients = PatientAggregator::new()
            .with_brain_met_truncation(true)
            .aggregate(vec![record(3, 2009), met, record(3, 2012), record(4, 2001)]);
        assert_eq!(patients.len(), 2);
        assert_eq!(patients[0].records().len(), 2);
        assert_eq!(patients[1].records().len(), 1);
    }

    const ALL_GRADES: [Grade; 9] = [
        Grade::Na,
        Grade::G1,
        Grade::G2,
        Grade::G3,
        Grade::G4,
        Grade::TCell,
        Grade::BCell,
        Grade::NullCell,
        Grade::NkCell,
    ];

    proptest! {
        #[test]
        fn prop_max_grade_takes_highest_rank(
            grades in proptest::collection::vec(proptest::sample::select(ALL_GRADES.to_vec()), 1..8)
        ) {
            let mut records = grades.iter().enumerate().map(|(i, grade)| {
                let mut r = record(9, 2000 + i as i32);
                r.grade = GradedValue::new(*grade, Source::Na);
                r
            });
            let mut patient = Patient::new(records.next().unwrap());
            for r in records {
                patient.update(r);
            }
            let expected = grades.iter().map(Grade::rank).max().unwrap();
            prop_assert_eq!(patient.max_grade().rank(), expected);
        }

        #[test]
        fn prop_records_sorted_by_year(years in proptest::collection::vec(1975i32..2022, 1..10)) {
            let mut patient = Patient::new(record(5, years[0]));
            for year in &years[1..] {
                patient.update(record(5, *year));
            }
            let seen: Vec<i32> = patient.records().iter().map(|r| r.diagnosis_year).collect();
            let mut sorted = years.clone();
            sorted.sort();
            prop_assert_eq!(seen, sorted);
        }
    }
}
