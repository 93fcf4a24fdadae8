/*!
 * Grade reconciliation
 *
 * NAACCR site-specific grade codes (pathological, then clinical) take
 * precedence over the legacy grade recode. Several single-letter NAACCR
 * codes mean different things for different sites, so translation needs the
 * tumour's cancer type.
 */

use crate::code_tables::{present, CodeTables, GRADE_RECODE_SENTINELS, NAACCR_GRADE_SENTINELS};
use crate::data_types::{Grade, GradedValue, Source};
use crate::{Result, SeerError};

/// Raw grade fields of one record
#[derive(Debug, Clone, Copy)]
pub struct GradeInputs<'a> {
    pub pathological: &'a str,
    pub clinical: &'a str,
    pub recode: &'a str,
    pub cancer_type: &'a str,
}

/// Choose one grade, in order: pathological, clinical, legacy recode
pub fn reconcile_grade(tables: &CodeTables, inputs: &GradeInputs<'_>) -> Result<GradedValue> {
    if let Some(code) = present(inputs.pathological, NAACCR_GRADE_SENTINELS) {
        let grade = translate_naaccr(tables, code, inputs.cancer_type)
            .map_err(|e| relabel(e, "grade_pathological"))?;
        return Ok(GradedValue::new(grade, Source::Pathological));
    }
    if let Some(code) = present(inputs.clinical, NAACCR_GRADE_SENTINELS) {
        let grade = translate_naaccr(tables, code, inputs.cancer_type)
            .map_err(|e| relabel(e, "grade_clinical"))?;
        return Ok(GradedValue::new(grade, Source::Clinical));
    }
    if let Some(description) = present(inputs.recode, GRADE_RECODE_SENTINELS) {
        let grade = tables
            .recode_grade(description)
            .ok_or_else(|| SeerError::unknown_code("grade_recode", description))?;
        return Ok(GradedValue::new(grade, Source::Na));
    }
    Ok(GradedValue::default())
}

fn relabel(err: SeerError, raw_field: &str) -> SeerError {
    match err {
        SeerError::UnknownCode { code, site, context, .. } => SeerError::UnknownCode {
            field: raw_field.to_string(),
            code,
            site,
            context,
        },
        other => other,
    }
}

/// Translate one NAACCR grade code for the given cancer type
pub fn translate_naaccr(tables: &CodeTables, code: &str, cancer_type: &str) -> Result<Grade> {
    match code {
        // sarcomatous overgrowth
        "S" => Ok(Grade::G4),
        // not applicable, haematologic
        "8" => Ok(Grade::Na),
        // TP53/CTNNB mutation (adrenal) or intermediate (breast)
        "M" => match cancer_type {
            "Adrenal Gland" => Ok(Grade::G4),
            "Breast" => Ok(Grade::G3),
            _ => Err(SeerError::unknown_code_for_site("grade", code, cancer_type)),
        },
        // borderline tumour
        "B" => Ok(Grade::G2),
        // Gleason score 7
        "E" if cancer_type == "Prostate" => Ok(Grade::G2),
        "E" => Err(SeerError::unknown_code_for_site("grade", code, cancer_type)),
        _ => tables
            .naaccr_grade(code)
            .ok_or_else(|| SeerError::unknown_code("grade", code)),
    }
}
