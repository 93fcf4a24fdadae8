/*!
 * Static code tables for registry normalisation
 *
 * Vocabularies for T/N/G stage, grade, anatomical site and cancer group.
 * The tables are assembled and validated once by [`CodeTables::standard`]
 * and are read-only afterwards; a malformed table is reported as
 * [`SeerError::CodeTable`] before any record is processed.
 */

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::constants::MULTI_SEP;
use crate::data_types::{Grade, StageCategory};
use crate::{Result, SeerError};

// ---------------------------------------------------------------------------
// Missing-value sentinels
// ---------------------------------------------------------------------------

/// "No information" values of the two-edition AJCC scheme (2004-2015)
pub const AJCC_SENTINELS: &[&str] = &["Blank(s)", "NA", "UNK Stage"];

/// "No information" values of the unified SEER combined scheme (2016-2017)
pub const SEER_COMBINED_SENTINELS: &[&str] = &["Blank(s)", "Not applicable", "99"];

/// "No information" values of the EOD scheme (2018+)
pub const EOD_SENTINELS: &[&str] = &["Blank(s)", "88", "99", "DMS code 90 (invalid inputs)"];

pub const NAACCR_GRADE_SENTINELS: &[&str] = &["Blank(s)"];

pub const GRADE_RECODE_SENTINELS: &[&str] = &["Unknown", "Blank(s)"];

pub const BREAST_SUBTYPE_SENTINELS: &[&str] = &["Recode not available", "Unknown", "Blank(s)"];

pub const PSA_SENTINELS: &[&str] = &[
    "Blank(s)",
    "Not documented; not assessed; unknown",
    "Test ordered, results not in chart",
];

pub const PSA_FLOOR_CODE: &str = "0.1 or less nanograms/milliliter (ng/ml)";
pub const PSA_CEILING_CODE: &str = "98.0 ng/ml or greater";
pub const PSA_FLOOR: f64 = 0.1;
pub const PSA_CEILING: f64 = 98.0;

/// Returns the value unless it is empty or one of the sentinels
pub fn present<'a>(value: &'a str, sentinels: &[&str]) -> Option<&'a str> {
    if value.trim().is_empty() || sentinels.contains(&value) {
        None
    } else {
        Some(value)
    }
}

// ---------------------------------------------------------------------------
// T stage
// ---------------------------------------------------------------------------

const T_CANONICAL: &[&str] = &[
    "T0", "T1", "T1NOS", "T1a", "T1a1", "T1a2", "T1aNOS", "T1b", "T1b1", "T1b2",
    "T1bNOS", "T1c", "T1mic", "T2", "T2NOS", "T2a", "T2b", "T2c", "T3", "T3NOS",
    "T3a", "T3b", "T3c", "T4", "T4NOS", "T4a", "T4b", "T4c", "T4d", "TX", "Ta",
    "Tis", "Tispd", "Tispu",
];

const T_UNINFORMATIVE: &[&str] = &["T0", "TX"];

const T_SEVENTH_EDITION: &[(&str, &str)] = &[
    ("T1 NOS(m)", "T1NOS"),
    ("T1 NOS(s)", "T1NOS"),
    ("T1a(m)", "T1a"),
    ("T1a(s)", "T1a"),
    ("T1b(m)", "T1b"),
    ("T1b(s)", "T1b"),
    ("T1d", "T1b"),
    ("T2(m)", "T2"),
    ("T2(s)", "T2"),
    ("T2a1", "T2a"),
    ("T2a2", "T2a"),
    ("T2aNOS", "T2a"),
    ("T2d", "T2b"),
    ("T3(m)", "T3"),
    ("T3(s)", "T3"),
    ("T3d", "T4"),
    ("T4 NOS(m)", "T4"),
    ("T4 NOS(s)", "T4"),
    ("T4a(m)", "T4a"),
    ("T4a(s)", "T4a"),
    ("T4b(m)", "T4b"),
    ("T4b(s)", "T4b"),
    ("T4e", "T4"),
];

const T_SEER_COMBINED: &[(&str, &str)] = &[
    ("ISU", "Tispu"),
    ("ISD", "Tispd"),
    ("1MI", "T1mic"),
    ("1D", "T1b"),
    ("2A1", "T2a"),
    ("2A2", "T2a"),
    ("2D", "T2b"),
    ("3D", "T4"),
    ("4E", "T4"),
];

const T_EOD: &[(&str, &str)] = &[
    ("T1b3", "T1b2"),
    ("T1c1", "T1c"),
    ("T1c2", "T1c"),
    ("T1c3", "T1c"),
    ("T1d", "T1b"),
    ("T1mi", "T1mic"),
    ("T2a1", "T2a"),
    ("T2a2", "T2a"),
    ("T2d", "T2b"),
    ("T3d", "T4"),
    ("T3e", "T4"),
    ("T4e", "T4"),
    ("Tis(DCIS)", "Tis"),
    ("Tis(LAMN)", "Tis"),
    ("Tis(Paget)", "Tis"),
];

// ---------------------------------------------------------------------------
// N stage
// ---------------------------------------------------------------------------

const N_CANONICAL: &[&str] = &[
    "N0", "N0(i+)", "N0(i-)", "N0(mol+)", "N0(mol-)", "N1", "N1NOS", "N1a",
    "N1b", "N1c", "N1mi", "N2", "N2NOS", "N2a", "N2b", "N2c", "N3", "N3NOS",
    "N3a", "N3b", "N3c", "NX",
];

const N_SEER_COMBINED: &[(&str, &str)] = &[
    ("X", "NX"),
    ("0", "N0"),
    ("0A", "N0"),
    ("0B", "N0"),
    ("0I-", "N0"),
    ("0I+", "N0"),
    ("0M-", "N0"),
    ("0M+", "N0"),
    ("1", "N1"),
    ("1MI", "N1"),
    ("1A", "N1a"),
    ("1B", "N1b"),
    ("1C", "N1c"),
    ("2", "N2"),
    ("2A", "N2a"),
    ("2B", "N2b"),
    ("2C", "N2c"),
    ("3", "N3"),
    ("3A", "N3a"),
    ("3B", "N3b"),
    ("3C", "N3c"),
    ("4", "N3c"),
];

const N_EOD: &[(&str, &str)] = &[
    ("N0a", "N0"),
    ("N0b", "N0"),
    ("N1a(sn)", "N1a"),
    ("N2mi", "N2"),
];

// ---------------------------------------------------------------------------
// Stage group
// ---------------------------------------------------------------------------

const G_CANONICAL: &[&str] = &[
    "0", "0a", "0is", "I", "IA", "IA1", "IA2", "IB", "IB1", "IB2", "IC", "IE", "IEA",
    "IEB", "II", "IIA", "IIB", "IIC", "IIE", "IIEA", "IIEB", "IIES", "IIESA", "IIESB",
    "III", "IIIA", "IIIB", "IIIC", "IIIE", "IIIEA", "IIIEB", "IIIES", "IIIESA", "IIIESB",
    "IIINOS", "IIIS", "IIISA", "IIISB", "IINOS", "IIS", "IISA", "IISB", "INOS", "IS",
    "ISA", "ISB", "IV", "IVA", "IVB", "IVC", "IVNOS", "OCCULT", "IIID",
];

const G_SEER_COMBINED: &[(&str, &str)] = &[
    ("0A", "0a"),
    ("0IS", "0is"),
    ("IIA1", "IIA"),
    ("IIA2", "IIA"),
    ("IIIC1", "IIIC"),
    ("IIIC2", "IIIC"),
    ("IVA1", "IVA"),
    ("IVA2", "IVA"),
    ("OC", "OCCULT"),
];

const G_EOD: &[(&str, &str)] = &[
    ("I:0", "I"),
    ("I:2", "I"),
    ("I:4", "I"),
    ("I:6", "I"),
    ("I:5", "I"),
    ("I:7", "I"),
    ("I:10", "I"),
    ("IA3", "IA2"),
    ("IB3", "IB2"),
    ("II bulky", "II"),
    ("IIA1", "IIA"),
    ("IIA2", "IIA"),
    ("III:0", "III"),
    ("III:2", "III"),
    ("III:3", "III"),
    ("III:4", "III"),
    ("III:5", "III"),
    ("III:6", "III"),
    ("III:8", "III"),
    ("III:9", "III"),
    ("III:10", "III"),
    ("III:11", "III"),
    ("III:13", "III"),
    ("III:16", "III"),
    ("IIIA1", "IIIA"),
    ("IIIA2", "IIIA"),
    ("IIIC1", "IIIC"),
    ("IIIC2", "IIIC"),
    ("IV:5", "IC"),
    ("IV:10", "IC"),
    ("IV:13", "IC"),
    ("IVA1", "IVA"),
    ("IVA2", "IVA"),
    ("OC", "OCCULT"),
];

// ---------------------------------------------------------------------------
// Grade
// ---------------------------------------------------------------------------

/// Legacy grade recode descriptions
const GRADE_RECODE: &[(&str, Grade)] = &[
    ("Well differentiated; Grade I", Grade::G1),
    ("Moderately differentiated; Grade II", Grade::G2),
    ("Poorly differentiated; Grade III", Grade::G3),
    ("Undifferentiated; anaplastic; Grade IV", Grade::G4),
    ("T-cell", Grade::TCell),
    ("B-cell; pre-B; B-precursor", Grade::BCell),
    ("Null cell; non T-non B", Grade::NullCell),
    ("NK cell; natural killer cell (1995+)", Grade::NkCell),
];

/// Site-independent NAACCR grade codes; `S`, `8`, `M`, `B` and `E` are
/// resolved before this table is consulted
const GRADE_NAACCR: &[(&str, Grade)] = &[
    ("1", Grade::G1),
    ("2", Grade::G2),
    ("3", Grade::G3),
    ("4", Grade::G4),
    ("5", Grade::TCell),
    ("6", Grade::BCell),
    ("7", Grade::NullCell),
    ("9", Grade::Na),
    ("A", Grade::G1),
    ("C", Grade::G3),
    ("D", Grade::G4),
    ("L", Grade::G2),
    ("H", Grade::G4),
];

// ---------------------------------------------------------------------------
// Sites
// ---------------------------------------------------------------------------

/// Site name that stands for any lymphatic or leukaemia cancer type
pub const LYMPHATICS: &str = "Lymphatics";

/// Catch-all cancer type spanning many primary sites
pub const MISCELLANEOUS: &str = "Miscellaneous";

pub const HODGKIN_EXTRANODAL: &str = "Hodgkin - Extranodal";
pub const NHL_EXTRANODAL: &str = "NHL - Extranodal";

const CANCER_GROUPS: &[(&str, &str)] = &[
    // Mouth
    ("Lip", "Oral"),
    ("Tongue", "Oral"),
    ("Tonsil", "Oral"),
    ("Salivary Gland", "Oral"),
    ("Floor of Mouth", "Oral"),
    ("Gum and Other Mouth", "Oral"),
    // Throat
    ("Nasopharynx", "Throat"),
    ("Oropharynx", "Throat"),
    ("Hypopharynx", "Throat"),
    // Colorectal
    ("Ascending Colon", "Colorectal"),
    ("Cecum", "Colorectal"),
    ("Hepatic Flexure", "Colorectal"),
    ("Transverse Colon", "Colorectal"),
    ("Splenic Flexure", "Colorectal"),
    ("Descending Colon", "Colorectal"),
    ("Sigmoid Colon", "Colorectal"),
    ("Large Intestine, NOS", "Colorectal"),
    ("Rectosigmoid Junction", "Colorectal"),
    ("Rectum", "Colorectal"),
    // Skin
    ("Melanoma of the Skin", "Skin"),
    ("Other Non-Epithelial Skin", "Skin"),
    // Leukaemia
    ("Myeloma", "Leukemia"),
    ("Acute Lymphocytic Leukemia", "Leukemia"),
    ("Acute Monocytic Leukemia", "Leukemia"),
    ("Acute Myeloid Leukemia", "Leukemia"),
    ("Aleukemic, Subleukemic and NOS", "Leukemia"),
    ("Chronic Lymphocytic Leukemia", "Leukemia"),
    ("Chronic Myeloid Leukemia", "Leukemia"),
    ("Other Acute Leukemia", "Leukemia"),
    ("Other Myeloid/Monocytic Leukemia", "Leukemia"),
    ("Other Lymphocytic Leukemia", "Leukemia"),
    // Female genital
    ("Cervix Uteri", "Cervix"),
    ("Corpus Uteri", "Uterus"),
    ("Uterus, NOS", "Uterus"),
    // Lymphomas
    ("Hodgkin - Extranodal", "Hodgkin Lymphoma"),
    ("Hodgkin - Nodal", "Hodgkin Lymphoma"),
    ("NHL - Extranodal", "Non-Hodgkin Lymphoma"),
    ("NHL - Nodal", "Non-Hodgkin Lymphoma"),
    // CNS
    ("Brain", "CNS"),
    ("Cranial Nerves Other Nervous System", "CNS"),
    // Groups named after their only type
    ("Trachea, Mediastinum and Other Respiratory Organs", "Trachea, Mediastinum and Other Respiratory Organs"),
    ("Anus, Anal Canal and Anorectum", "Anus, Anal Canal and Anorectum"),
    ("Appendix", "Appendix"),
    ("Bones and Joints", "Bones and Joints"),
    ("Breast", "Breast"),
    ("Esophagus", "Esophagus"),
    ("Eye and Orbit", "Eye and Orbit"),
    ("Gallbladder", "Gallbladder"),
    ("Intrahepatic Bile Duct", "Intrahepatic Bile Duct"),
    ("Kaposi Sarcoma", "Kaposi Sarcoma"),
    ("Kidney and Renal Pelvis", "Kidney and Renal Pelvis"),
    ("Larynx", "Larynx"),
    ("Liver", "Liver"),
    ("Lung and Bronchus", "Lung and Bronchus"),
    ("Mesothelioma", "Mesothelioma"),
    ("Nose, Nasal Cavity and Middle Ear", "Nose, Nasal Cavity and Middle Ear"),
    ("Ovary", "Ovary"),
    ("Pancreas", "Pancreas"),
    ("Penis", "Penis"),
    ("Peritoneum, Omentum and Mesentery", "Peritoneum, Omentum and Mesentery"),
    ("Pleura", "Pleura"),
    ("Prostate", "Prostate"),
    ("Retroperitoneum", "Retroperitoneum"),
    ("Small Intestine", "Small Intestine"),
    ("Soft Tissue including Heart", "Soft Tissue including Heart"),
    ("Stomach", "Stomach"),
    ("Testis", "Testis"),
    ("Thyroid", "Thyroid"),
    ("Ureter", "Ureter"),
    ("Urinary Bladder", "Urinary Bladder"),
    ("Vagina", "Vagina"),
    ("Vulva", "Vulva"),
    ("Other Oral Cavity and Pharynx", "Other Oral Cavity and Pharynx"),
    ("Other Biliary", "Other Biliary"),
    ("Other Digestive Organs", "Other Digestive Organs"),
    ("Other Endocrine including Thymus", "Other Endocrine including Thymus"),
    ("Other Female Genital Organs", "Other Female Genital Organs"),
    ("Other Male Genital Organs", "Other Male Genital Organs"),
    ("Other Urinary Organs", "Other Urinary Organs"),
    ("Miscellaneous", "Miscellaneous"),
];

/// Topography codes with their own site name(s), consulted before the ranges
const SITE_CODES: &[(u16, &str)] = &[
    (24, "Tongue | Lymphatics"),
    (98, "Tonsil | Lymphatics"),
    (99, "Tonsil | Lymphatics"),
    (111, "Nasopharynx | Lymphatics"),
    (129, "Hypopharynx"),
    (140, "Other Oral Cavity and Pharynx"),
    (142, "Other Oral Cavity and Pharynx | Lymphatics"),
    (148, "Other Oral Cavity and Pharynx"),
    (180, "Cecum"),
    (181, "Appendix"),
    (182, "Ascending Colon"),
    (183, "Hepatic Flexure"),
    (184, "Transverse Colon"),
    (185, "Splenic Flexure"),
    (186, "Descending Colon"),
    (187, "Sigmoid Colon"),
    (188, "Large Intestine, NOS"),
    (189, "Large Intestine, NOS"),
    (199, "Rectosigmoid Junction"),
    (209, "Rectum"),
    (210, "Anus, Anal Canal and Anorectum"),
    (211, "Anus, Anal Canal and Anorectum"),
    (212, "Anus, Anal Canal and Anorectum"),
    (218, "Anus, Anal Canal and Anorectum"),
    (220, "Liver"),
    (221, "Intrahepatic Bile Duct"),
    (239, "Gallbladder"),
    (260, "Large Intestine, NOS"),
    (268, "Other Digestive Organs"),
    (269, "Other Digestive Organs"),
    (300, "Nose, Nasal Cavity and Middle Ear"),
    (301, "Nose, Nasal Cavity and Middle Ear"),
    (339, "Trachea, Mediastinum and Other Respiratory Organs"),
    (379, "Other Endocrine including Thymus | Lymphatics"),
    (380, "Soft Tissue including Heart"),
    (381, "Trachea, Mediastinum and Other Respiratory Organs"),
    (382, "Trachea, Mediastinum and Other Respiratory Organs"),
    (383, "Trachea, Mediastinum and Other Respiratory Organs"),
    (384, "Pleura"),
    (388, "Trachea, Mediastinum and Other Respiratory Organs"),
    (390, "Trachea, Mediastinum and Other Respiratory Organs"),
    (398, "Trachea, Mediastinum and Other Respiratory Organs"),
    (399, "Trachea, Mediastinum and Other Respiratory Organs"),
    (420, "Lymphatics | Miscellaneous"),
    (421, "Lymphatics | Miscellaneous"),
    (422, "Lymphatics | Miscellaneous"),
    (423, "Miscellaneous"),
    (424, "Lymphatics | Miscellaneous"),
    (480, "Retroperitoneum"),
    (481, "Peritoneum, Omentum and Mesentery"),
    (482, "Peritoneum, Omentum and Mesentery"),
    (488, "Other Digestive Organs"),
    (529, "Vagina"),
    (559, "Uterus, NOS"),
    (569, "Ovary"),
    (589, "Other Female Genital Organs"),
    (619, "Prostate"),
    (649, "Kidney and Renal Pelvis"),
    (659, "Kidney and Renal Pelvis"),
    (669, "Ureter"),
    (739, "Thyroid"),
    (809, "Miscellaneous"),
];

/// Inclusive topography code ranges; authored unsorted, sorted on load
const SITE_RANGES: &[(u16, u16, &str)] = &[
    (0, 9, "Lip"),
    (19, 29, "Tongue"),
    (40, 49, "Floor of Mouth"),
    (30, 39, "Gum and Other Mouth"),
    (50, 59, "Gum and Other Mouth"),
    (60, 69, "Gum and Other Mouth"),
    (79, 89, "Salivary Gland"),
    (90, 99, "Tonsil"),
    (100, 109, "Oropharynx"),
    (110, 119, "Nasopharynx"),
    (130, 139, "Hypopharynx"),
    (150, 159, "Esophagus"),
    (160, 169, "Stomach"),
    (170, 179, "Small Intestine"),
    (240, 249, "Other Biliary"),
    (250, 259, "Pancreas"),
    (310, 319, "Nose, Nasal Cavity and Middle Ear"),
    (320, 329, "Larynx"),
    (340, 349, "Lung and Bronchus"),
    (400, 419, "Bones and Joints"),
    (440, 449, "Melanoma of the Skin | Other Non-Epithelial Skin"),
    (470, 479, "Soft Tissue including Heart"),
    (490, 499, "Soft Tissue including Heart"),
    (500, 509, "Breast"),
    (510, 519, "Vulva"),
    (530, 539, "Cervix Uteri"),
    (540, 549, "Corpus Uteri"),
    (570, 579, "Other Female Genital Organs"),
    (600, 609, "Penis"),
    (620, 629, "Testis"),
    (630, 639, "Other Male Genital Organs"),
    (670, 679, "Urinary Bladder"),
    (680, 689, "Other Urinary Organs"),
    (690, 699, "Eye and Orbit"),
    (700, 709, "Cranial Nerves Other Nervous System"),
    (710, 719, "Brain | Cranial Nerves Other Nervous System"),
    (720, 729, "Cranial Nerves Other Nervous System"),
    (740, 749, "Other Endocrine including Thymus"),
    (750, 759, "Other Endocrine including Thymus"),
    (760, 768, "Miscellaneous"),
    (770, 779, "Lymphatics | Miscellaneous"),
];

/// Nodal/extranodal codes that resolve to Hodgkin only when no table matches
const NHL_DISALLOWED_CODES: &[u16] = &[
    24, 98, 99, 111, 142, 379, 420, 421, 422, 424,
    770, 771, 772, 773, 774, 775, 776, 777, 778, 779,
];

/// Cancer types matched by a `Lymphatics` site name
const LYMPHATIC_TYPES: &[&str] = &[
    "Myeloma",
    "Kaposi Sarcoma",
    "Mesothelioma",
    "Acute Lymphocytic Leukemia",
    "Acute Monocytic Leukemia",
    "Acute Myeloid Leukemia",
    "Aleukemic, Subleukemic and NOS",
    "Chronic Lymphocytic Leukemia",
    "Chronic Myeloid Leukemia",
    "Other Acute Leukemia",
    "Other Myeloid/Monocytic Leukemia",
    "Other Lymphocytic Leukemia",
    "Hodgkin - Extranodal",
    "Hodgkin - Nodal",
    "NHL - Extranodal",
    "NHL - Nodal",
];

fn split_names(names: &'static str) -> Vec<&'static str> {
    names.split('|').map(str::trim).collect()
}

// ---------------------------------------------------------------------------
// Table types
// ---------------------------------------------------------------------------

/// Vocabularies for one stage category
#[derive(Debug, Clone)]
pub struct StageTable {
    category: StageCategory,
    canonical: HashSet<&'static str>,
    uninformative: HashSet<&'static str>,
    seventh_edition: HashMap<&'static str, &'static str>,
    seer_combined: HashMap<&'static str, &'static str>,
    eod: HashMap<&'static str, &'static str>,
}

impl StageTable {
    pub fn new(
        category: StageCategory,
        canonical: &[&'static str],
        uninformative: &[&'static str],
        seventh_edition: &[(&'static str, &'static str)],
        seer_combined: &[(&'static str, &'static str)],
        eod: &[(&'static str, &'static str)],
    ) -> Result<Self> {
        let table = Self {
            category,
            canonical: canonical.iter().copied().collect(),
            uninformative: uninformative.iter().copied().collect(),
            seventh_edition: seventh_edition.iter().copied().collect(),
            seer_combined: seer_combined.iter().copied().collect(),
            eod: eod.iter().copied().collect(),
        };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<()> {
        let name = self.category.as_str();
        for code in &self.uninformative {
            if !self.canonical.contains(code) {
                return Err(SeerError::code_table(
                    name,
                    format!("uninformative code '{}' is not canonical", code),
                ));
            }
        }
        let targets = self
            .seventh_edition
            .iter()
            .chain(self.seer_combined.iter())
            .chain(self.eod.iter());
        for (from, to) in targets {
            if !self.canonical.contains(to) {
                return Err(SeerError::code_table(
                    name,
                    format!("'{}' translates to non-canonical '{}'", from, to),
                ));
            }
        }
        Ok(())
    }

    pub fn category(&self) -> StageCategory {
        self.category
    }

    pub fn is_canonical(&self, code: &str) -> bool {
        self.canonical.contains(code)
    }

    pub fn is_uninformative(&self, code: &str) -> bool {
        self.uninformative.contains(code)
    }

    pub fn canonical(&self, code: &str) -> Option<&'static str> {
        self.canonical.get(code).copied()
    }

    pub fn seventh_edition(&self, code: &str) -> Option<&'static str> {
        self.seventh_edition.get(code).copied()
    }

    pub fn seer_combined(&self, code: &str) -> Option<&'static str> {
        self.seer_combined.get(code).copied()
    }

    pub fn eod(&self, code: &str) -> Option<&'static str> {
        self.eod.get(code).copied()
    }
}

/// One inclusive topography code range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteRange {
    pub low: u16,
    pub high: u16,
    pub names: Vec<&'static str>,
}

/// Topography code to site name(s)
#[derive(Debug, Clone)]
pub struct SiteTable {
    exact: HashMap<u16, Vec<&'static str>>,
    ranges: Vec<SiteRange>,
}

impl SiteTable {
    /// Build the table, sorting the ranges and rejecting overlaps
    pub fn new(exact: &[(u16, &'static str)], ranges: &[(u16, u16, &'static str)]) -> Result<Self> {
        let exact = exact
            .iter()
            .map(|&(code, names)| (code, split_names(names)))
            .collect();

        let mut sorted: Vec<SiteRange> = ranges
            .iter()
            .map(|&(low, high, names)| SiteRange {
                low,
                high,
                names: split_names(names),
            })
            .collect();
        sorted.sort_by_key(|r| (r.low, r.high));

        for range in &sorted {
            if range.low > range.high {
                return Err(SeerError::code_table(
                    "site ranges",
                    format!("range {}-{} is inverted", range.low, range.high),
                ));
            }
        }
        for pair in sorted.windows(2) {
            if pair[1].low <= pair[0].high {
                return Err(SeerError::code_table(
                    "site ranges",
                    format!(
                        "range {}-{} overlaps range {}-{}",
                        pair[0].low, pair[0].high, pair[1].low, pair[1].high
                    ),
                ));
            }
        }

        Ok(Self { exact, ranges: sorted })
    }

    pub fn exact(&self, code: u16) -> Option<&[&'static str]> {
        self.exact.get(&code).map(Vec::as_slice)
    }

    /// Binary search over the sorted, disjoint ranges
    pub fn find_range(&self, code: u16) -> Option<&SiteRange> {
        let idx = self.ranges.partition_point(|r| r.low <= code);
        if idx == 0 {
            return None;
        }
        let candidate = &self.ranges[idx - 1];
        (code <= candidate.high).then_some(candidate)
    }

    pub fn ranges(&self) -> &[SiteRange] {
        &self.ranges
    }

    /// Every site name referenced by the table
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.exact
            .values()
            .flatten()
            .chain(self.ranges.iter().flat_map(|r| r.names.iter()))
            .copied()
    }
}

/// Cancer type to cancer group mapping
#[derive(Debug, Clone)]
pub struct CancerGroups {
    groups: HashMap<&'static str, &'static str>,
}

impl CancerGroups {
    pub fn new(pairs: &[(&'static str, &'static str)]) -> Self {
        Self {
            groups: pairs.iter().copied().collect(),
        }
    }

    pub fn contains(&self, cancer_type: &str) -> bool {
        self.groups.contains_key(cancer_type)
    }

    /// Group of a cancer type; a type without a group is an error
    pub fn group(&self, cancer_type: &str) -> Result<&'static str> {
        self.groups
            .get(cancer_type)
            .copied()
            .ok_or_else(|| SeerError::unknown_code("cancer_type", cancer_type))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Every static vocabulary used by the normaliser
#[derive(Debug, Clone)]
pub struct CodeTables {
    pub t_stage: StageTable,
    pub n_stage: StageTable,
    pub g_stage: StageTable,
    pub sites: SiteTable,
    pub cancer_groups: CancerGroups,
    naaccr_grades: HashMap<&'static str, Grade>,
    recode_grades: HashMap<&'static str, Grade>,
    lymphatic_types: HashSet<&'static str>,
    nhl_disallowed: HashSet<u16>,
}

impl CodeTables {
    /// Build and validate the registry's standard tables
    pub fn standard() -> Result<Self> {
        let sites = SiteTable::new(SITE_CODES, SITE_RANGES)?;
        let tables = Self::with_sites(sites, CancerGroups::new(CANCER_GROUPS))?;
        debug!(
            ranges = tables.sites.ranges().len(),
            cancer_types = tables.cancer_groups.len(),
            "code tables loaded"
        );
        Ok(tables)
    }

    /// Standard stage and grade vocabularies combined with the given site tables
    pub fn with_sites(sites: SiteTable, cancer_groups: CancerGroups) -> Result<Self> {
        let tables = Self {
            t_stage: StageTable::new(
                StageCategory::T,
                T_CANONICAL,
                T_UNINFORMATIVE,
                T_SEVENTH_EDITION,
                T_SEER_COMBINED,
                T_EOD,
            )?,
            n_stage: StageTable::new(StageCategory::N, N_CANONICAL, &[], &[], N_SEER_COMBINED, N_EOD)?,
            g_stage: StageTable::new(StageCategory::G, G_CANONICAL, &[], &[], G_SEER_COMBINED, G_EOD)?,
            sites,
            cancer_groups,
            naaccr_grades: GRADE_NAACCR.iter().copied().collect(),
            recode_grades: GRADE_RECODE.iter().copied().collect(),
            lymphatic_types: LYMPHATIC_TYPES.iter().copied().collect(),
            nhl_disallowed: NHL_DISALLOWED_CODES.iter().copied().collect(),
        };
        tables.validate()?;
        Ok(tables)
    }

    fn validate(&self) -> Result<()> {
        for name in self.sites.names() {
            if name != LYMPHATICS && !self.cancer_groups.contains(name) {
                return Err(SeerError::code_table(
                    "cancer groups",
                    format!("site name '{}' has no cancer group", name),
                ));
            }
        }
        for name in [HODGKIN_EXTRANODAL, NHL_EXTRANODAL, MISCELLANEOUS] {
            if !self.cancer_groups.contains(name) {
                return Err(SeerError::code_table(
                    "cancer groups",
                    format!("'{}' has no cancer group", name),
                ));
            }
        }
        for name in &self.lymphatic_types {
            if !self.cancer_groups.contains(name) {
                return Err(SeerError::code_table(
                    "lymphatic types",
                    format!("lymphatic type '{}' has no cancer group", name),
                ));
            }
        }
        Ok(())
    }

    pub fn stage_table(&self, category: StageCategory) -> &StageTable {
        match category {
            StageCategory::T => &self.t_stage,
            StageCategory::N => &self.n_stage,
            StageCategory::G => &self.g_stage,
        }
    }

    pub fn naaccr_grade(&self, code: &str) -> Option<Grade> {
        self.naaccr_grades.get(code).copied()
    }

    pub fn recode_grade(&self, description: &str) -> Option<Grade> {
        self.recode_grades.get(description).copied()
    }

    pub fn is_lymphatic_type(&self, cancer_type: &str) -> bool {
        self.lymphatic_types.contains(cancer_type)
    }

    pub fn is_nhl_disallowed(&self, code: u16) -> bool {
        self.nhl_disallowed.contains(&code)
    }

    /// Join multiple site names the way they are written to output tables
    pub fn join_names(names: &[&str]) -> String {
        names.join(MULTI_SEP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_standard_tables_validate() {
        let tables = CodeTables::standard().unwrap();
        assert!(tables.t_stage.is_canonical("T2"));
        assert!(tables.t_stage.is_uninformative("TX"));
        assert!(!tables.n_stage.is_uninformative("NX"));
        assert_eq!(tables.cancer_groups.group("Cecum").unwrap(), "Colorectal");
    }

    #[test]
    fn test_ranges_are_sorted_on_load() {
        let tables = CodeTables::standard().unwrap();
        let ranges = tables.sites.ranges();
        assert!(ranges.windows(2).all(|w| w[0].high < w[1].low));
        assert_eq!(ranges[2].names, vec!["Gum and Other Mouth"]);
        assert_eq!(ranges[3].names, vec!["Floor of Mouth"]);
    }

    #[test]
    fn test_overlapping_ranges_rejected() {
        let err = SiteTable::new(&[], &[(0, 9, "Lip"), (5, 12, "Tongue")]).unwrap_err();
        assert!(matches!(err, SeerError::CodeTable { .. }));
    }

    #[test]
    fn test_site_without_group_rejected() {
        let sites = SiteTable::new(&[(1, "Atlantis")], &[]).unwrap();
        let err = CodeTables::with_sites(sites, CancerGroups::new(CANCER_GROUPS)).unwrap_err();
        assert!(err.to_string().contains("Atlantis"));
    }

    #[test]
    fn test_missing_group_is_error() {
        let groups = CancerGroups::new(CANCER_GROUPS);
        assert!(groups.group("Not A Site").is_err());
    }

    #[test]
    fn test_find_range_edges() {
        let sites = SiteTable::new(&[], SITE_RANGES).unwrap();
        assert_eq!(sites.find_range(0).unwrap().names, vec!["Lip"]);
        assert_eq!(sites.find_range(9).unwrap().names, vec!["Lip"]);
        assert!(sites.find_range(10).is_none());
        assert_eq!(sites.find_range(779).unwrap().names, vec!["Lymphatics", "Miscellaneous"]);
        assert!(sites.find_range(780).is_none());
        assert!(sites.find_range(u16::MAX).is_none());
    }

    #[test]
    fn test_present_treats_blank_as_missing() {
        assert_eq!(present("  ", AJCC_SENTINELS), None);
        assert_eq!(present("UNK Stage", AJCC_SENTINELS), None);
        assert_eq!(present("T2", AJCC_SENTINELS), Some("T2"));
    }

    proptest! {
        #[test]
        fn prop_find_range_matches_linear_scan(code in 0u16..1000) {
            let sites = SiteTable::new(&[], SITE_RANGES).unwrap();
            let linear = sites.ranges().iter().find(|r| r.low <= code && code <= r.high);
            prop_assert_eq!(sites.find_range(code), linear);
        }
    }
}
