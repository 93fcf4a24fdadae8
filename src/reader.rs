/*!
 * Streaming readers for registry extracts and canonical tables
 *
 * Raw extracts are tab-separated, headerless and positional. Canonical
 * tables carry a header row naming the columns of their [`FieldSet`].
 * Both readers stream one line at a time and never interpret quotes.
 */

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};

use crate::constants::{NA_CHAR, SEP_CHAR};
use crate::data_types::*;
use crate::schema::{CanonicalSchema, FieldSet, RawExtractSchema};
use crate::{ErrorContext, Result, SeerError};

fn tsv_reader<R: Read>(inner: R, has_headers: bool) -> csv::Reader<R> {
    ReaderBuilder::new()
        .delimiter(SEP_CHAR as u8)
        .quoting(false)
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(inner)
}

fn open(path: &Path) -> Result<File> {
    if !path.exists() {
        return Err(SeerError::file_not_found_with_suggestion(path.to_path_buf()));
    }
    Ok(File::open(path)?)
}

/// Physical line of a record, falling back to the line after the last one seen
fn record_line(position: Option<&csv::Position>, last_line: usize) -> usize {
    position.map_or(last_line + 1, |p| p.line() as usize)
}

fn csv_error(err: csv::Error, path: Option<&Path>, last_line: usize) -> SeerError {
    let line = record_line(err.position(), last_line);
    SeerError::CsvParse {
        message: format!("TSV error: {}", err),
        line: Some(line),
        column: None,
        context: ErrorContext {
            file_path: path.map(Path::to_path_buf),
            line_number: Some(line),
            ..Default::default()
        },
    }
}

/// One line of a raw extract
#[derive(Debug, Clone)]
pub struct RawLine {
    /// 1-based line number in the source
    pub line_number: usize,
    pub record: StringRecord,
}

impl RawLine {
    /// Field values; the last one with trailing whitespace removed
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.record.iter().collect();
        if let Some(last) = fields.last_mut() {
            *last = last.trim_end();
        }
        fields
    }

    /// Patient id, when the first field holds one
    pub fn patient_id(&self) -> Option<u64> {
        self.record.get(0).and_then(|s| s.trim().parse().ok())
    }
}

/// Streaming reader over a headerless raw extract
pub struct RawExtractReader<R: Read> {
    records: StringRecordsIntoIter<R>,
    path: Option<PathBuf>,
    line_number: usize,
}

impl RawExtractReader<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = Self::from_reader(open(path)?);
        reader.path = Some(path.to_path_buf());
        Ok(reader)
    }
}

impl<R: Read> RawExtractReader<R> {
    pub fn from_reader(inner: R) -> Self {
        Self {
            records: tsv_reader(inner, false).into_records(),
            path: None,
            line_number: 0,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl<R: Read> Iterator for RawExtractReader<R> {
    type Item = Result<RawLine>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.records.next()?;
        let last_line = self.line_number;
        let path = self.path.clone();

        Some(
            result
                .map_err(|e| csv_error(e, path.as_deref(), last_line))
                .and_then(|record| {
                    let line_number = record_line(record.position(), last_line);
                    self.line_number = line_number;
                    RawExtractSchema::validate_field_count(record.len())
                        .map_err(|e| e.at_record(path.clone(), line_number, None))?;
                    Ok(RawLine { line_number, record })
                }),
        )
    }
}

/// Streaming reader over a canonical record table
pub struct CanonicalReader<R: Read> {
    records: StringRecordsIntoIter<R>,
    field_set: FieldSet,
    path: Option<PathBuf>,
    line_number: usize,
}

impl CanonicalReader<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = Self::from_reader(open(path)?)
            .map_err(|e| e.at_record(Some(path.to_path_buf()), 1, None))?;
        reader.path = Some(path.to_path_buf());
        Ok(reader)
    }
}

impl<R: Read> CanonicalReader<R> {
    /// Read the header row and detect the field set from it
    pub fn from_reader(inner: R) -> Result<Self> {
        let mut reader = tsv_reader(inner, true);
        let headers: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
        if headers.first().is_some_and(|h| h.trim_start().starts_with('{')) {
            return Err(SeerError::Custom {
                message: "Canonical table is JSON Lines; only tab-separated tables can be read back".to_string(),
                suggestion: Some("Write the record table with --format tsv before aggregating".to_string()),
            });
        }
        let field_set = CanonicalSchema::detect_field_set(&headers)?;
        Ok(Self {
            records: reader.into_records(),
            field_set,
            path: None,
            line_number: 1,
        })
    }

    pub fn field_set(&self) -> FieldSet {
        self.field_set
    }
}

impl<R: Read> Iterator for CanonicalReader<R> {
    type Item = Result<CanonicalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.records.next()?;
        let last_line = self.line_number;
        let path = self.path.clone();

        Some(
            result
                .map_err(|e| csv_error(e, path.as_deref(), last_line))
                .and_then(|record| {
                    let line_number = record_line(record.position(), last_line);
                    self.line_number = line_number;
                    let fields: Vec<&str> = record.iter().collect();
                    parse_canonical_row(&fields, self.field_set)
                        .map_err(|e| e.at_record(path, line_number, record.get(0).and_then(|s| s.parse().ok())))
                }),
        )
    }
}

/// Values of one canonical row looked up by column name
struct CanonicalRow<'a> {
    columns: Vec<&'static str>,
    fields: &'a [&'a str],
}

impl<'a> CanonicalRow<'a> {
    fn get(&self, column: &str) -> Option<&'a str> {
        self.columns
            .iter()
            .position(|c| *c == column)
            .map(|i| self.fields[i])
    }

    fn required(&self, column: &str) -> Result<&'a str> {
        self.get(column).ok_or_else(|| SeerError::Custom {
            message: format!("Column '{}' missing from canonical row", column),
            suggestion: None,
        })
    }

    fn text(&self, column: &str) -> Result<String> {
        self.required(column).map(str::to_string)
    }

    fn optional_text(&self, column: &str) -> Option<String> {
        self.get(column).filter(|v| *v != NA_CHAR).map(str::to_string)
    }

    fn number<T: std::str::FromStr>(&self, column: &str) -> Result<T> {
        let value = self.required(column)?;
        value
            .parse()
            .map_err(|_| SeerError::invalid_value(column, value, "a number"))
    }

    fn optional_number<T: std::str::FromStr>(&self, column: &str) -> Result<Option<T>> {
        match self.get(column) {
            None | Some(NA_CHAR) => Ok(None),
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| SeerError::invalid_value(column, value, "a number")),
        }
    }

    fn flag(&self, column: &str) -> Result<Option<bool>> {
        match self.get(column) {
            None | Some(NA_CHAR) => Ok(None),
            Some("True") => Ok(Some(true)),
            Some("False") => Ok(Some(false)),
            Some(value) => Err(SeerError::invalid_value(column, value, "True, False or .")),
        }
    }

    fn staged(&self, stage: &str, source: &str) -> Result<StagedValue> {
        Ok(StagedValue {
            stage: self.optional_text(stage),
            source: Source::from_code(self.required(source)?)?,
        })
    }
}

/// Parse one canonical row written for the given field set
pub fn parse_canonical_row(fields: &[&str], field_set: FieldSet) -> Result<CanonicalRecord> {
    let columns = CanonicalSchema::column_names(field_set);
    if fields.len() != columns.len() {
        return Err(SeerError::schema_mismatch_detailed(columns.len(), fields.len(), None));
    }
    let row = CanonicalRow { columns, fields };

    Ok(CanonicalRecord {
        patient_id: row.number("patient_id")?,
        death_year: row.optional_number("death_year")?,
        diagnosis_agebin: row.text("diagnosis_agebin")?,
        diagnosis_year: row.number("diagnosis_year")?,
        followup_year: row.number("followup_year")?,
        cancer_type: row.text("cancer_type")?,
        cancer_group: row.text("cancer_group")?,
        primary_type: row.text("primary_type")?,
        primary_group: row.text("primary_group")?,
        hist_type: row.number("hist_type")?,
        hist_category: row.text("hist_category")?,
        t_stage: row.staged("t_stage", "t_stage_src")?,
        n_stage: row.staged("n_stage", "n_stage_src")?,
        g_stage: row.staged("g_stage", "g_stage_src")?,
        grade: GradedValue {
            grade: Grade::from_field(row.required("grade")?)?,
            source: Source::from_code(row.required("grade_src")?)?,
        },
        regional_nodes: RegionalNodes::from_field(row.required("regional_nodes")?)?,
        regional_nodes_examined: row.optional_number("regional_nodes_examined")?,
        regional_nodes_positive: row.optional_number("regional_nodes_positive")?,
        behavior: Behavior::from_name(row.required("behavior")?)?,
        num_malignant_tumors: row.number("num_malignant_tumors")?,
        num_benign_tumors: row.number("num_benign_tumors")?,
        brain_met: row.flag("brain_met")?,
        bone_met: row.flag("bone_met")?,
        liver_met: row.flag("liver_met")?,
        lung_met: row.flag("lung_met")?,
        other_met: row.flag("other_met")?,
        distant_ln_met: row.flag("distant_ln_met")?,
        breast_subtype: row.optional_text("breast_subtype"),
        psa: row.optional_number("psa")?,
    })
}
