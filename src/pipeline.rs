/*!
 * Single-pass normalisation pipeline
 *
 * Reads a raw extract line by line, builds one canonical record per line,
 * writes it out and feeds it to the patient aggregator, which emits a
 * summary row whenever a patient's records are complete. Nothing beyond
 * the active patient's history is held in memory.
 *
 * The first failing line aborts the run.
 */

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, trace};

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

use crate::builder::RecordBuilder;
use crate::code_tables::CodeTables;
use crate::config::global_config;
use crate::data_types::{CanonicalRecord, Source};
use crate::export::{create_writer, TableWriter};
use crate::patient::{Patient, PatientAggregator, PatientSummary};
use crate::reader::{CanonicalReader, RawExtractReader};
use crate::schema::FieldSet;
use crate::{ExportFormat, Result, SeerError};

/// Count of values per provenance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceTally {
    pub na: usize,
    pub clinical: usize,
    pub pathological: usize,
    pub both: usize,
}

impl SourceTally {
    pub fn add(&mut self, source: Source) {
        match source {
            Source::Na => self.na += 1,
            Source::Clinical => self.clinical += 1,
            Source::Pathological => self.pathological += 1,
            Source::Both => self.both += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.na + self.clinical + self.pathological + self.both
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub input: PathBuf,
    pub records: usize,
    pub patients: usize,
    /// Records whose stage or grade ended up missing
    pub missing_t_stage: usize,
    pub missing_n_stage: usize,
    pub missing_g_stage: usize,
    pub t_stage_sources: SourceTally,
    pub n_stage_sources: SourceTally,
    pub g_stage_sources: SourceTally,
    pub grade_sources: SourceTally,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    fn new(input: &Path) -> Self {
        let now = Utc::now();
        Self {
            input: input.to_path_buf(),
            records: 0,
            patients: 0,
            missing_t_stage: 0,
            missing_n_stage: 0,
            missing_g_stage: 0,
            t_stage_sources: SourceTally::default(),
            n_stage_sources: SourceTally::default(),
            g_stage_sources: SourceTally::default(),
            grade_sources: SourceTally::default(),
            started_at: now,
            finished_at: now,
        }
    }

    fn tally(&mut self, record: &CanonicalRecord) {
        self.records += 1;
        self.t_stage_sources.add(record.t_stage.source);
        self.n_stage_sources.add(record.n_stage.source);
        self.g_stage_sources.add(record.g_stage.source);
        self.grade_sources.add(record.grade.source);
        self.missing_t_stage += usize::from(record.t_stage.is_missing());
        self.missing_n_stage += usize::from(record.n_stage.is_missing());
        self.missing_g_stage += usize::from(record.g_stage.is_missing());
    }

    /// Wall-clock duration of the run
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Print a human-readable summary to stdout
    pub fn print_summary(&self) {
        println!("Input:    {}", self.input.display());
        println!("Records:  {}", self.records);
        println!("Patients: {}", self.patients);
        println!(
            "Missing stages: T {}, N {}, G {}",
            self.missing_t_stage, self.missing_n_stage, self.missing_g_stage
        );
        for (label, tally) in [
            ("T stage", &self.t_stage_sources),
            ("N stage", &self.n_stage_sources),
            ("G stage", &self.g_stage_sources),
            ("Grade", &self.grade_sources),
        ] {
            println!(
                "{:<8}  clinical {:>8}  pathological {:>8}  both {:>8}  unspecified {:>8}",
                label, tally.clinical, tally.pathological, tally.both, tally.na
            );
        }
        println!("Elapsed:  {} ms", self.duration().num_milliseconds());
    }
}

/// Builder for configuring a [`Pipeline`]
pub struct PipelineBuilder {
    input: Option<PathBuf>,
    records_output: Option<PathBuf>,
    patients_output: Option<PathBuf>,
    field_set: FieldSet,
    format: ExportFormat,
    truncate_after_brain_met: bool,
    progress_interval: usize,
    tables: Option<CodeTables>,
    #[cfg(feature = "progress")]
    show_progress: bool,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    /// Create a builder seeded from the global configuration
    pub fn new() -> Self {
        let config = global_config();
        Self {
            input: None,
            records_output: None,
            patients_output: None,
            field_set: config.field_set,
            format: config.default_export_format,
            truncate_after_brain_met: config.truncate_after_brain_met,
            progress_interval: config.progress_interval.max(1),
            tables: None,
            #[cfg(feature = "progress")]
            show_progress: config.enable_progress_bar,
        }
    }

    /// Set the raw extract to read
    pub fn input<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.input = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set where canonical records are written
    pub fn records_output<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.records_output = Some(path.as_ref().to_path_buf());
        self
    }

    /// Also write one summary row per patient to this path
    pub fn patients_output<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.patients_output = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn field_set(mut self, field_set: FieldSet) -> Self {
        self.field_set = field_set;
        self
    }

    pub fn format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    /// Drop each patient's records after the first with brain metastasis
    pub fn truncate_after_brain_met(mut self, enabled: bool) -> Self {
        self.truncate_after_brain_met = enabled;
        self
    }

    pub fn progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Use these code tables instead of the standard ones
    pub fn tables(mut self, tables: CodeTables) -> Self {
        self.tables = Some(tables);
        self
    }

    #[cfg(feature = "progress")]
    /// Enable or disable the progress spinner
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Validate the settings and initialise the code tables
    pub fn build(self) -> Result<Pipeline> {
        let input = self.input.ok_or_else(|| SeerError::Custom {
            message: "Input extract path not specified".to_string(),
            suggestion: Some("Use .input() to specify the raw registry extract".to_string()),
        })?;
        let records_output = self.records_output.ok_or_else(|| SeerError::Custom {
            message: "Records output path not specified".to_string(),
            suggestion: Some("Use .records_output() to choose where canonical records go".to_string()),
        })?;
        let tables = match self.tables {
            Some(tables) => tables,
            None => CodeTables::standard()?,
        };

        Ok(Pipeline {
            input,
            records_output,
            patients_output: self.patients_output,
            field_set: self.field_set,
            format: self.format,
            truncate_after_brain_met: self.truncate_after_brain_met,
            progress_interval: self.progress_interval,
            builder: RecordBuilder::new(tables),
            #[cfg(feature = "progress")]
            show_progress: self.show_progress,
        })
    }
}

/// A configured normalisation run
pub struct Pipeline {
    input: PathBuf,
    records_output: PathBuf,
    patients_output: Option<PathBuf>,
    field_set: FieldSet,
    format: ExportFormat,
    truncate_after_brain_met: bool,
    progress_interval: usize,
    builder: RecordBuilder,
    #[cfg(feature = "progress")]
    show_progress: bool,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Normalise the whole extract, writing records and, if configured, patient summaries
    pub fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::new(&self.input);
        info!(
            input = %self.input.display(),
            records = %self.records_output.display(),
            field_set = %self.field_set,
            format = %self.format,
            "normalising registry extract"
        );

        let reader = RawExtractReader::open(&self.input)?;
        let mut records_out = create_writer::<CanonicalRecord, _>(&self.records_output, self.format, self.field_set)?;
        let mut patients_out = match &self.patients_output {
            Some(path) => Some(create_writer::<PatientSummary, _>(path, self.format, FieldSet::Full)?),
            None => None,
        };
        let mut aggregator = PatientAggregator::new().with_brain_met_truncation(self.truncate_after_brain_met);

        #[cfg(feature = "progress")]
        let progress = self.spinner();

        for line in reader {
            let line = line?;
            let record = self
                .builder
                .build(&line.fields())
                .map_err(|e| e.at_record(Some(self.input.clone()), line.line_number, line.patient_id()))?;
            trace!(line = line.line_number, patient_id = record.patient_id, "built record");

            report.tally(&record);
            records_out.write_row(&record)?;

            if let Some(writer) = patients_out.as_mut() {
                if let Some(patient) = aggregator.push(record) {
                    write_patient(writer.as_mut(), &patient)?;
                    report.patients += 1;
                }
            }

            if report.records % self.progress_interval == 0 {
                debug!(records = report.records, patients = report.patients, "progress");
                #[cfg(feature = "progress")]
                if let Some(pb) = &progress {
                    pb.set_position(report.records as u64);
                }
            }
        }

        records_out.flush()?;
        if let Some(writer) = patients_out.as_mut() {
            if let Some(patient) = aggregator.finish() {
                write_patient(writer.as_mut(), &patient)?;
                report.patients += 1;
            }
            writer.flush()?;
        }

        #[cfg(feature = "progress")]
        if let Some(pb) = progress {
            pb.finish_with_message(format!("{} records", report.records));
        }

        report.finished_at = Utc::now();
        info!(
            records = report.records,
            patients = report.patients,
            elapsed_ms = report.duration().num_milliseconds(),
            "normalisation finished"
        );
        Ok(report)
    }

    /// Build patient summaries from an existing canonical record table
    ///
    /// The table must be tab-separated and grouped by patient id; JSON Lines
    /// record tables are rejected. Returns the number of patients written.
    pub fn aggregate_file<P, Q>(
        input: P,
        output: Q,
        format: ExportFormat,
        truncate_after_brain_met: bool,
    ) -> Result<usize>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let input = input.as_ref();
        let reader = CanonicalReader::open(input)?;
        info!(input = %input.display(), field_set = %reader.field_set(), "aggregating canonical records");

        let mut writer = create_writer::<PatientSummary, _>(output, format, FieldSet::Full)?;
        let mut aggregator = PatientAggregator::new().with_brain_met_truncation(truncate_after_brain_met);
        let mut patients = 0;

        for record in reader {
            if let Some(patient) = aggregator.push(record?) {
                write_patient(writer.as_mut(), &patient)?;
                patients += 1;
            }
        }
        if let Some(patient) = aggregator.finish() {
            write_patient(writer.as_mut(), &patient)?;
            patients += 1;
        }
        writer.flush()?;

        info!(patients, "aggregation finished");
        Ok(patients)
    }

    #[cfg(feature = "progress")]
    fn spinner(&self) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} [{elapsed_precise}] {pos} records {msg}") {
            pb.set_style(style);
        }
        Some(pb)
    }
}

fn write_patient(writer: &mut dyn TableWriter<PatientSummary>, patient: &Patient) -> Result<()> {
    writer.write_row(&patient.summary())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::tests::sample_fields;
    use crate::schema::RawField;

    fn raw_line(patient_id: &str, year: &str) -> String {
        let mut fields = sample_fields();
        fields[RawField::PatientId.index()] = patient_id.to_string();
        fields[RawField::DiagnosisYear.index()] = year.to_string();
        fields.join("\t")
    }

    fn pipeline(dir: &Path, input: &str) -> Pipeline {
        let input_path = dir.join("extract.txt");
        std::fs::write(&input_path, input).unwrap();
        let builder = Pipeline::builder()
            .input(&input_path)
            .records_output(dir.join("records.tsv"))
            .patients_output(dir.join("patients.tsv"))
            .field_set(FieldSet::Full)
            .format(ExportFormat::Tsv);
        #[cfg(feature = "progress")]
        let builder = builder.show_progress(false);
        builder.build().unwrap()
    }

    #[test]
    fn test_run_counts_records_and_patients() {
        let dir = tempfile::tempdir().unwrap();
        let input = [raw_line("7", "2012"), raw_line("7", "2010"), raw_line("9", "2014")].join("\n");
        let report = pipeline(dir.path(), &input).run().unwrap();

        assert_eq!(report.records, 3);
        assert_eq!(report.patients, 2);
        assert_eq!(report.t_stage_sources.total(), 3);
        assert_eq!(report.grade_sources.na, 3);
        assert!(report.finished_at >= report.started_at);

        let records: Vec<CanonicalRecord> = CanonicalReader::open(dir.path().join("records.tsv"))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].patient_id, 9);

        let patients = std::fs::read_to_string(dir.path().join("patients.tsv")).unwrap();
        let rows: Vec<&str> = patients.lines().collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[1].starts_with("7\t"));
        assert!(rows[1].contains("2010|2012"));
    }

    #[test]
    fn test_run_aborts_on_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad = sample_fields();
        bad[RawField::Behavior.index()] = "Unheard of".to_string();
        let input = [raw_line("7", "2012"), bad.join("\t")].join("\n");

        let err = pipeline(dir.path(), &input).run().unwrap_err();
        let context = err.context().unwrap();
        assert_eq!(context.line_number, Some(2));
        assert_eq!(context.patient_id, Some(1030));
    }

    #[test]
    fn test_builder_requires_paths() {
        assert!(Pipeline::builder().records_output("out.tsv").build().is_err());
        assert!(Pipeline::builder().input("in.txt").build().is_err());
    }

    #[test]
    fn test_aggregate_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = [raw_line("3", "2011"), raw_line("4", "2013"), raw_line("4", "2016")].join("\n");
        pipeline(dir.path(), &input).run().unwrap();

        let out = dir.path().join("again.tsv");
        let patients =
            Pipeline::aggregate_file(dir.path().join("records.tsv"), &out, ExportFormat::Tsv, false).unwrap();
        assert_eq!(patients, 2);
        assert_eq!(
            std::fs::read_to_string(out).unwrap(),
            std::fs::read_to_string(dir.path().join("patients.tsv")).unwrap()
        );
    }
}
