/*!
 * T/N/G stage reconciliation
 *
 * Three coding schemes report stage for different diagnosis years: the
 * two-edition AJCC fields (2004-2015), the unified SEER combined field
 * (2016-2017) and the EOD field (2018+). Exactly one canonical value is
 * chosen, in that order of precedence, and tagged with its provenance.
 */

use tracing::trace;

use crate::code_tables::{
    present, StageTable, AJCC_SENTINELS, EOD_SENTINELS, SEER_COMBINED_SENTINELS,
};
use crate::data_types::{Source, StageCategory, StagedValue};
use crate::{Result, SeerError};

/// Raw values of one stage category, as they appear in the extract
#[derive(Debug, Clone, Copy, Default)]
pub struct StageInputs<'a> {
    pub ajcc_6th: &'a str,
    pub ajcc_7th: &'a str,
    pub seer_combined: &'a str,
    pub eod: &'a str,
}

impl<'a> StageInputs<'a> {
    pub fn new(ajcc_6th: &'a str, ajcc_7th: &'a str, seer_combined: &'a str, eod: &'a str) -> Self {
        Self {
            ajcc_6th,
            ajcc_7th,
            seer_combined,
            eod,
        }
    }
}

/// Reconcile the raw fields of one category into a canonical stage
pub fn reconcile_stage(table: &StageTable, inputs: &StageInputs<'_>) -> Result<StagedValue> {
    let category = table.category();

    // AJCC: the 6th edition is canonical unless it is uninformative and the
    // 7th edition knows better
    let ajcc_6th = present(inputs.ajcc_6th, AJCC_SENTINELS);
    let ajcc_7th = present(inputs.ajcc_7th, AJCC_SENTINELS);
    if let (Some(sixth), Some(seventh)) = (ajcc_6th, ajcc_7th) {
        if table.is_uninformative(sixth) && !table.is_uninformative(seventh) {
            let stage = translate_seventh_edition(table, seventh)?;
            trace!(category = category.as_str(), sixth, seventh, stage, "7th edition preferred");
            return Ok(StagedValue::new(stage, Source::Na));
        }
    }
    if let Some(sixth) = ajcc_6th {
        return Ok(StagedValue::new(sixth, Source::Na));
    }

    // SEER combined
    if let Some(raw) = present(inputs.seer_combined, SEER_COMBINED_SENTINELS) {
        let (source, stripped) = split_assessment(raw);
        let stage = translate_seer_combined(table, stripped)
            .ok_or_else(|| SeerError::unknown_code(&field_name(category, "seer_combined"), raw))?;
        return Ok(StagedValue::new(stage, source));
    }

    // EOD
    if let Some(raw) = present(inputs.eod, EOD_SENTINELS) {
        let stage = translate_eod(table, raw)
            .ok_or_else(|| SeerError::unknown_code(&field_name(category, "eod"), raw))?;
        return Ok(StagedValue::new(stage, Source::Na));
    }

    Ok(StagedValue::missing())
}

fn field_name(category: StageCategory, scheme: &str) -> String {
    let prefix = match category {
        StageCategory::T => "t",
        StageCategory::N => "n",
        StageCategory::G => "g",
    };
    format!("{}_{}", prefix, scheme)
}

fn translate_seventh_edition(table: &StageTable, raw: &str) -> Result<&'static str> {
    table
        .canonical(raw)
        .or_else(|| table.seventh_edition(raw))
        .ok_or_else(|| SeerError::unknown_code(&field_name(table.category(), "ajcc_7th"), raw))
}

/// Detect a clinical/pathological marker and strip one leading `c`/`p`
pub fn split_assessment(raw: &str) -> (Source, &str) {
    if let Some(rest) = raw.strip_prefix('c') {
        (Source::Clinical, rest)
    } else if let Some(rest) = raw.strip_prefix('p') {
        (Source::Pathological, rest)
    } else {
        (Source::Na, raw)
    }
}

/// Rewrite a leading Arabic stage digit as a Roman numeral
pub fn romanize_group(raw: &str) -> String {
    let mut chars = raw.chars();
    let roman = match chars.next() {
        Some('1') => "I",
        Some('2') => "II",
        Some('3') => "III",
        Some('4') => "IV",
        _ => return raw.to_string(),
    };
    format!("{}{}", roman, chars.as_str())
}

fn translate_seer_combined(table: &StageTable, stripped: &str) -> Option<&'static str> {
    match table.category() {
        StageCategory::T => translate_seer_tn(table, "T", stripped),
        StageCategory::N => translate_seer_tn(table, "N", stripped),
        StageCategory::G => {
            let roman = romanize_group(stripped);
            table.canonical(&roman).or_else(|| table.seer_combined(&roman))
        }
    }
}

fn translate_seer_tn(table: &StageTable, letter: &str, stripped: &str) -> Option<&'static str> {
    if stripped == "X" {
        return table.canonical(&format!("{}X", letter));
    }
    let candidate = format!("{}{}", letter, stripped.to_lowercase());
    table
        .canonical(&candidate)
        .or_else(|| table.seer_combined(stripped))
}

fn translate_eod(table: &StageTable, raw: &str) -> Option<&'static str> {
    match table.category() {
        StageCategory::G => {
            let roman = romanize_group(raw);
            table.canonical(&roman).or_else(|| table.eod(&roman))
        }
        _ => table.canonical(raw).or_else(|| table.eod(raw)),
    }
}
