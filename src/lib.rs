/*!
 * # seerprep
 *
 * Normalisation of cancer-registry extracts into canonical analytic tables.
 *
 * Registry extracts code the same clinical facts in several overlapping
 * vocabularies: two AJCC editions, the unified SEER scheme, extent-of-disease
 * codes, and two grading systems that changed across diagnosis years. This
 * crate reconciles them into one canonical value per field and records which
 * assessment (clinical or pathological) each value came from.
 *
 * ## Quick Start
 *
 * ```no_run
 * use seerprep::prelude::*;
 *
 * # fn main() -> Result<()> {
 * let report = Pipeline::builder()
 *     .input("data/extract.txt")
 *     .records_output("out/records.tsv")
 *     .patients_output("out/patients.tsv")
 *     .field_set(FieldSet::Core)
 *     .build()?
 *     .run()?;
 *
 * println!("{} records, {} patients", report.records, report.patients);
 * # Ok(())
 * # }
 * ```
 *
 * ## Normalising single records
 *
 * ```
 * use seerprep::prelude::*;
 * use seerprep::stage::{reconcile_stage, StageInputs};
 *
 * # fn main() -> Result<()> {
 * let tables = CodeTables::standard()?;
 * let inputs = StageInputs::new("T0", "T2", "Blank(s)", "Blank(s)");
 * let staged = reconcile_stage(&tables.t_stage, &inputs)?;
 * assert_eq!(staged.stage.as_deref(), Some("T2"));
 * assert_eq!(staged.source, Source::Na);
 * # Ok(())
 * # }
 * ```
 *
 * ## Aggregating patients
 *
 * Canonical tables sorted by patient id can be folded into one summary row
 * per patient:
 *
 * ```no_run
 * # use seerprep::prelude::*;
 * # fn main() -> Result<()> {
 * let patients = Pipeline::aggregate_file(
 *     "out/records.tsv",
 *     "out/patients.jsonl",
 *     ExportFormat::JsonLines,
 *     false,
 * )?;
 * # Ok(())
 * # }
 * ```
 *
 * ## Configuration
 *
 * ```no_run
 * # use seerprep::prelude::*;
 * let config = ConfigBuilder::new()
 *     .progress_bar(false)
 *     .field_set(FieldSet::Core)
 *     .truncate_after_brain_met(true)
 *     .build();
 * seerprep::config::set_global_config(config);
 * ```
 */

// Re-export error types from root
pub use error::{ErrorContext, ExportFormat, Result, SeerError};

// Public modules
pub mod builder;
pub mod code_tables;
pub mod config;
pub mod data_types;
pub mod error;
pub mod export;
pub mod grade;
pub mod logging;
pub mod patient;
pub mod pipeline;
pub mod reader;
pub mod schema;
pub mod site;
pub mod stage;

/// Prelude module for convenient imports
///
/// ```
/// use seerprep::prelude::*;
/// ```
pub mod prelude {
    pub use crate::builder::RecordBuilder;
    pub use crate::code_tables::CodeTables;
    pub use crate::config::{ConfigBuilder, SeerConfig};
    pub use crate::data_types::*;
    pub use crate::error::{Result, SeerError};
    pub use crate::export::{TableRow, TableWriter};
    pub use crate::patient::{Patient, PatientAggregator, PatientSummary};
    pub use crate::pipeline::{Pipeline, PipelineBuilder, RunReport};
    pub use crate::reader::{CanonicalReader, RawExtractReader};
    pub use crate::schema::{FieldSet, RawField};
    pub use crate::ExportFormat;
}

/// Separators and sentinels shared by readers and writers
pub mod constants {
    /// Column separator in every table
    pub const SEP_CHAR: char = '\t';

    /// Separator between elements of list-valued summary columns
    pub const ISEP_CHAR: &str = "|";

    /// Written in place of a missing value
    pub const NA_CHAR: &str = ".";

    /// Joins the names of an ambiguous site resolution
    pub const MULTI_SEP: &str = " | ";

    /// Fields per raw extract line
    pub const RAW_FIELD_COUNT: usize = 38;

    /// Largest meaningful regional node count; higher codes are sentinels
    pub const MAX_NODE_COUNT: u32 = 90;
}
