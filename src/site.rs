/*!
 * Anatomical site resolution
 *
 * A numeric topography code resolves to one or more candidate site names,
 * which are then reconciled against the cancer type already recorded for the
 * tumour. A primary type that differs from the cancer type is kept, so that
 * downstream consumers can flag the mismatch.
 */

use tracing::debug;

use crate::code_tables::{
    CodeTables, HODGKIN_EXTRANODAL, LYMPHATICS, MISCELLANEOUS, NHL_EXTRANODAL,
};
use crate::{Result, SeerError};

/// Candidate site names for a topography code
///
/// A code no table knows is extranodal lymphoma: Hodgkin only for the
/// disallowed nodal codes, otherwise ambiguous between Hodgkin and NHL.
pub fn resolve_site_code(tables: &CodeTables, code: u16) -> Vec<&'static str> {
    if let Some(names) = tables.sites.exact(code) {
        return names.to_vec();
    }
    if let Some(range) = tables.sites.find_range(code) {
        return range.names.clone();
    }
    if tables.is_nhl_disallowed(code) {
        vec![HODGKIN_EXTRANODAL]
    } else {
        vec![HODGKIN_EXTRANODAL, NHL_EXTRANODAL]
    }
}

fn sites_match(tables: &CodeTables, cancer_type: &str, candidate: &str) -> bool {
    cancer_type == candidate || (candidate == LYMPHATICS && tables.is_lymphatic_type(cancer_type))
}

/// Reconcile a topography code against the recorded cancer type
///
/// Returns the cancer type itself when any candidate matches it, otherwise
/// the candidate name(s) joined with ` | `.
pub fn primary_type(tables: &CodeTables, code: u16, cancer_type: &str) -> Result<String> {
    let candidates = resolve_site_code(tables, code);

    if candidates.contains(&LYMPHATICS) {
        debug!(code, cancer_type, "topography code resolves to lymphatic branch");
    }

    if candidates.iter().any(|c| sites_match(tables, cancer_type, c)) {
        return Ok(cancer_type.to_string());
    }

    if cancer_type == MISCELLANEOUS {
        return Ok(cancer_type.to_string());
    }

    for candidate in &candidates {
        if !tables.cancer_groups.contains(candidate) {
            return Err(SeerError::unknown_code_for_site("primary site", candidate, cancer_type));
        }
    }
    Ok(CodeTables::join_names(&candidates))
}

/// Cancer group(s) of a primary type, de-duplicated in first-seen order
pub fn primary_group(tables: &CodeTables, primary_type: &str) -> Result<String> {
    if tables.cancer_groups.contains(primary_type) {
        return tables.cancer_groups.group(primary_type).map(str::to_string);
    }

    let mut groups: Vec<&'static str> = Vec::new();
    for branch in primary_type.split('|').map(str::trim) {
        let group = tables.cancer_groups.group(branch)?;
        if !groups.contains(&group) {
            groups.push(group);
        }
    }
    Ok(CodeTables::join_names(&groups))
}
