/*!
 * Export of canonical records and patient summaries
 *
 * Two output formats: tab-separated tables with a header row, and JSON
 * Lines. In TSV output every missing value is written as the NA sentinel.
 */

use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;

use csv::{QuoteStyle, WriterBuilder};
use serde::Serialize;

use crate::constants::{ISEP_CHAR, NA_CHAR, SEP_CHAR};
use crate::data_types::*;
use crate::patient::PatientSummary;
use crate::schema::{CanonicalSchema, FieldSet, PatientSummarySchema};
use crate::{ExportFormat, Result, SeerError};

/// A type that can be written as one row of an output table
pub trait TableRow: Serialize {
    /// Header row for the field set
    fn columns(field_set: FieldSet) -> Vec<&'static str>;

    /// Serialised cell values, in column order
    fn to_row(&self, field_set: FieldSet) -> Vec<String>;

    /// JSON object for JSON Lines output
    fn to_json(&self, _field_set: FieldSet) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Trait for streaming table writers
pub trait TableWriter<T: TableRow> {
    fn write_row(&mut self, row: &T) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    /// Get the export format
    fn format(&self) -> ExportFormat;
}

fn na<T: Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| NA_CHAR.to_string())
}

fn flag(value: Option<bool>) -> String {
    match value {
        Some(true) => "True".to_string(),
        Some(false) => "False".to_string(),
        None => NA_CHAR.to_string(),
    }
}

fn yes_no(value: bool) -> String {
    if value { "YES" } else { "NO" }.to_string()
}

fn joined<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let items: Vec<S> = items.into_iter().collect();
    let parts: Vec<&str> = items.iter().map(AsRef::as_ref).collect();
    parts.join(ISEP_CHAR)
}

impl TableRow for CanonicalRecord {
    fn columns(field_set: FieldSet) -> Vec<&'static str> {
        CanonicalSchema::column_names(field_set)
    }

    fn to_row(&self, field_set: FieldSet) -> Vec<String> {
        let mut row = vec![
            self.patient_id.to_string(),
            na(&self.death_year),
            self.diagnosis_agebin.clone(),
            self.diagnosis_year.to_string(),
            self.followup_year.to_string(),
            self.cancer_type.clone(),
            self.cancer_group.clone(),
            self.primary_type.clone(),
            self.primary_group.clone(),
            na(&self.t_stage.stage),
            na(&self.n_stage.stage),
            na(&self.g_stage.stage),
            self.t_stage.source.as_code().to_string(),
            self.n_stage.source.as_code().to_string(),
            self.g_stage.source.as_code().to_string(),
            self.grade.grade.as_field().to_string(),
            self.grade.source.as_code().to_string(),
            self.hist_type.to_string(),
            self.hist_category.clone(),
            self.regional_nodes.as_field().to_string(),
        ];
        if field_set == FieldSet::Full {
            row.push(na(&self.regional_nodes_examined));
            row.push(na(&self.regional_nodes_positive));
        }
        row.extend([
            self.behavior.as_name().to_string(),
            self.num_malignant_tumors.to_string(),
            self.num_benign_tumors.to_string(),
            flag(self.brain_met),
        ]);
        if field_set == FieldSet::Full {
            row.extend([
                flag(self.bone_met),
                flag(self.liver_met),
                flag(self.lung_met),
                flag(self.other_met),
                flag(self.distant_ln_met),
                na(&self.breast_subtype),
                na(&self.psa),
            ]);
        }
        row
    }

    fn to_json(&self, field_set: FieldSet) -> Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)?;
        if field_set == FieldSet::Core {
            if let Some(object) = value.as_object_mut() {
                for column in CanonicalSchema::auxiliary_columns() {
                    object.remove(*column);
                }
            }
        }
        Ok(value)
    }
}

impl TableRow for PatientSummary {
    fn columns(_field_set: FieldSet) -> Vec<&'static str> {
        PatientSummarySchema::column_names().to_vec()
    }

    fn to_row(&self, _field_set: FieldSet) -> Vec<String> {
        vec![
            self.patient_id.to_string(),
            na(&self.death_year),
            self.num_malignant_tumors.to_string(),
            self.num_benign_tumors.to_string(),
            self.behavior.as_name().to_string(),
            self.max_grade.as_field().to_string(),
            yes_no(self.bm_status),
            yes_no(self.bm_existing),
            yes_no(self.bm_developed),
            self.num_records.to_string(),
            self.timepoint_first.to_string(),
            self.timepoint_last.to_string(),
            joined(&self.cancer_types),
            joined(self.diag_years.iter().map(|y| y.to_string())),
            joined(&self.diag_agebins),
            joined(self.t_stages.iter().map(na)),
            joined(self.n_stages.iter().map(na)),
            joined(self.g_stages.iter().map(na)),
            joined(self.grades.iter().map(Grade::as_field)),
            joined(self.hist_types.iter().map(|h| h.to_string())),
            joined(self.regnodes.iter().map(RegionalNodes::as_field)),
        ]
    }
}

/// Tab-separated writer; the header row is written on creation
pub struct TsvWriter<W: Write, T> {
    writer: csv::Writer<W>,
    field_set: FieldSet,
    _row: PhantomData<T>,
}

impl<W: Write, T: TableRow> TsvWriter<W, T> {
    pub fn new(inner: W, field_set: FieldSet) -> Result<Self> {
        let mut writer = WriterBuilder::new()
            .delimiter(SEP_CHAR as u8)
            .quote_style(QuoteStyle::Never)
            .from_writer(inner);
        writer.write_record(T::columns(field_set))?;
        Ok(Self {
            writer,
            field_set,
            _row: PhantomData,
        })
    }

    /// Flush and return the underlying writer
    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner().map_err(|e| SeerError::Export {
            message: format!("Failed to flush TSV output: {}", e.error()),
            format: ExportFormat::Tsv,
            suggestion: None,
        })
    }
}

impl<W: Write, T: TableRow> TableWriter<T> for TsvWriter<W, T> {
    fn write_row(&mut self, row: &T) -> Result<()> {
        self.writer.write_record(row.to_row(self.field_set))?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::Tsv
    }
}

/// JSON Lines writer, one object per row
pub struct JsonLinesWriter<W: Write, T> {
    writer: BufWriter<W>,
    field_set: FieldSet,
    _row: PhantomData<T>,
}

impl<W: Write, T: TableRow> JsonLinesWriter<W, T> {
    pub fn new(inner: W, field_set: FieldSet) -> Self {
        Self {
            writer: BufWriter::new(inner),
            field_set,
            _row: PhantomData,
        }
    }
}

impl<W: Write, T: TableRow> TableWriter<T> for JsonLinesWriter<W, T> {
    fn write_row(&mut self, row: &T) -> Result<()> {
        let json = serde_json::to_string(&row.to_json(self.field_set)?)?;
        writeln!(self.writer, "{}", json)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn format(&self) -> ExportFormat {
        ExportFormat::JsonLines
    }
}

/// Create a file writer for the given format
pub fn create_writer<T, P>(path: P, format: ExportFormat, field_set: FieldSet) -> Result<Box<dyn TableWriter<T>>>
where
    T: TableRow + 'static,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| SeerError::Export {
        message: format!("Cannot create '{}': {}", path.display(), e),
        format,
        suggestion: Some("Check that the output directory exists and is writable".to_string()),
    })?;
    Ok(match format {
        ExportFormat::Tsv => Box::new(TsvWriter::<_, T>::new(BufWriter::new(file), field_set)?),
        ExportFormat::JsonLines => Box::new(JsonLinesWriter::<_, T>::new(file, field_set)),
    })
}

/// Write a complete table to a file
pub fn export_rows<'a, T, I, P>(path: P, rows: I, format: ExportFormat, field_set: FieldSet) -> Result<usize>
where
    T: TableRow + 'static,
    I: IntoIterator<Item = &'a T>,
    P: AsRef<Path>,
{
    let mut writer = create_writer::<T, _>(path, format, field_set)?;
    let mut count = 0;
    for row in rows {
        writer.write_row(row)?;
        count += 1;
    }
    writer.flush()?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::tests::record;
    use crate::patient::Patient;
    use crate::reader::parse_canonical_row;

    fn round_trip(record: &CanonicalRecord, field_set: FieldSet) -> CanonicalRecord {
        let row = record.to_row(field_set);
        let fields: Vec<&str> = row.iter().map(String::as_str).collect();
        parse_canonical_row(&fields, field_set).unwrap()
    }

    #[test]
    fn test_full_row_round_trip() {
        let mut original = record(42, 2016);
        original.death_year = Some(2019);
        original.psa = Some(0.1);
        original.breast_subtype = Some("HR+/HER2-".to_string());
        original.grade = GradedValue::new(Grade::Na, Source::Na);
        original.regional_nodes = RegionalNodes::Na;
        assert_eq!(round_trip(&original, FieldSet::Full), original);
    }

    #[test]
    fn test_core_row_drops_auxiliary_values() {
        let original = record(42, 2016);
        let row = original.to_row(FieldSet::Core);
        assert_eq!(row.len(), CanonicalSchema::column_count(FieldSet::Core));
        let parsed = round_trip(&original, FieldSet::Core);
        assert_eq!(parsed.regional_nodes_examined, None);
        assert_eq!(parsed.liver_met, None);
        assert_eq!(parsed.brain_met, original.brain_met);
        assert_eq!(parsed.t_stage, original.t_stage);
    }

    #[test]
    fn test_na_variants_written_as_sentinel() {
        let mut original = record(42, 2016);
        original.grade = GradedValue::default();
        original.regional_nodes = RegionalNodes::Na;
        let row = original.to_row(FieldSet::Full);
        let columns = CanonicalSchema::column_names(FieldSet::Full);
        let cell = |name: &str| row[columns.iter().position(|c| *c == name).unwrap()].clone();
        assert_eq!(cell("grade"), ".");
        assert_eq!(cell("grade_src"), ".");
        assert_eq!(cell("regional_nodes"), ".");
        assert_eq!(cell("n_stage"), ".");
        assert_eq!(cell("g_stage_src"), "C");
        assert_eq!(cell("bone_met"), ".");
        assert_eq!(cell("lung_met"), "False");
    }

    #[test]
    fn test_summary_row() {
        let mut second = record(9, 2012);
        second.brain_met = Some(true);
        second.t_stage = StagedValue::missing();
        second.grade = GradedValue::default();
        let mut patient = Patient::new(record(9, 2008));
        patient.update(second);
        let row = patient.summary().to_row(FieldSet::Full);
        assert_eq!(row.len(), PatientSummarySchema::column_names().len());
        assert_eq!(row[6..9], ["YES", "NO", "YES"]);
        assert_eq!(row[13], "2008|2012");
        assert_eq!(row[14], "60-64|60-64");
        assert_eq!(row[15], "T2|.");
        assert_eq!(row[18], "G2|.");
        assert_eq!(row[20], "NEG|NEG");
    }

    #[test]
    fn test_tsv_writer_header_and_rows() {
        let mut writer = TsvWriter::<_, CanonicalRecord>::new(Vec::new(), FieldSet::Core).unwrap();
        writer.write_row(&record(1, 2010)).unwrap();
        let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("patient_id\tdeath_year\tdiagnosis_agebin"));
        assert!(lines[1].starts_with("1\t.\t60-64 years\t2010"));
    }

    #[test]
    fn test_json_lines_core_omits_auxiliary_keys() {
        let mut writer = JsonLinesWriter::<_, CanonicalRecord>::new(Vec::new(), FieldSet::Core);
        writer.write_row(&record(1, 2010)).unwrap();
        writer.flush().unwrap();
        let bytes = writer.writer.into_inner().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value.get("psa").is_none());
        assert_eq!(value["patient_id"], 1);
    }
}
