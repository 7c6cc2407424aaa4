//! Folder classification: map a submission onto one of the fifteen folders.
//!
//! A submission names its folder either symbolically (`reportType`, a key of
//! [`FOLDER_TAXONOMY`]) or directly by number. The symbolic key wins when both
//! are present and valid. Folder 15 has no key and is reachable only by
//! number.

use crate::artifact::Folder;
use crate::error::ReportError;
use serde::{Deserialize, Serialize};

/// Report-type key, folder number, display label.
///
/// Keys are unique and folder numbers are unique: the mapping is injective.
pub const FOLDER_TAXONOMY: &[(&str, u8, &str)] = &[
    ("liquid_ir", 1, "Liquid Penetrant Inspection"),
    ("magnetic_ir", 2, "Magnetic Particle Inspection"),
    ("ultrasonic_ir", 3, "Ultrasonic Inspection"),
    ("radiographic_ir", 4, "Radiographic Inspection"),
    ("visual_ir", 5, "Visual Inspection"),
    ("eddy_current_ir", 6, "Eddy Current Inspection"),
    ("hardness_ir", 7, "Hardness Test"),
    ("thickness_ir", 8, "Ultrasonic Thickness Survey"),
    ("pressure_test_ir", 9, "Pressure Test"),
    ("coating_ir", 10, "Coating Inspection"),
    ("weld_ir", 11, "Weld Inspection"),
    ("dimensional_ir", 12, "Dimensional Inspection"),
    ("calibration_ir", 13, "Equipment Calibration"),
    ("ferrite_ir", 14, "Ferrite Measurement"),
];

/// Label shown for folders without a report-type key.
pub const EXTRA_FOLDER_LABEL: &str = "Extra";

/// Raw folder value as clients send it: a JSON number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFolder {
    Number(f64),
    Text(String),
}

impl RawFolder {
    /// Integer value, if this is an integral number or a string holding one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RawFolder::Number(n) if n.is_finite() && n.fract() == 0.0 => Some(*n as i64),
            RawFolder::Number(_) => None,
            RawFolder::Text(s) => s.trim().parse::<i64>().ok(),
        }
    }
}

impl From<i64> for RawFolder {
    fn from(n: i64) -> Self {
        RawFolder::Number(n as f64)
    }
}

impl From<&str> for RawFolder {
    fn from(s: &str) -> Self {
        RawFolder::Text(s.to_string())
    }
}

/// Look up a report-type key.
pub fn folder_for_key(report_type: &str) -> Option<Folder> {
    FOLDER_TAXONOMY
        .iter()
        .find(|(key, _, _)| *key == report_type)
        .and_then(|(_, n, _)| Folder::new(*n as i64))
}

/// Reverse lookup: the key mapped to a folder, if any.
pub fn key_for_folder(folder: Folder) -> Option<&'static str> {
    FOLDER_TAXONOMY
        .iter()
        .find(|(_, n, _)| *n == folder.get())
        .map(|(key, _, _)| *key)
}

/// Display label for a folder.
pub fn label_for_folder(folder: Folder) -> &'static str {
    FOLDER_TAXONOMY
        .iter()
        .find(|(_, n, _)| *n == folder.get())
        .map(|(_, _, label)| *label)
        .unwrap_or(EXTRA_FOLDER_LABEL)
}

/// One row of the folder catalog served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderEntry {
    pub folder: Folder,
    pub key: Option<&'static str>,
    pub label: &'static str,
}

/// All fifteen folders with their key (if any) and label.
pub fn catalog() -> Vec<FolderEntry> {
    Folder::all()
        .map(|folder| FolderEntry {
            folder,
            key: key_for_folder(folder),
            label: label_for_folder(folder),
        })
        .collect()
}

/// Resolve a submission's folder.
///
/// 1. A known `report_type` → its mapped folder (ignores `folder`).
/// 2. Otherwise a `folder` that parses as an integer in 1..=15.
/// 3. Otherwise [`ReportError::InvalidClassification`].
pub fn classify(
    report_type: Option<&str>,
    folder: Option<&RawFolder>,
) -> Result<Folder, ReportError> {
    if let Some(f) = report_type.and_then(folder_for_key) {
        return Ok(f);
    }
    folder
        .and_then(RawFolder::as_integer)
        .and_then(Folder::new)
        .ok_or(ReportError::InvalidClassification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn taxonomy_is_injective_and_in_range() {
        let keys: HashSet<_> = FOLDER_TAXONOMY.iter().map(|(k, _, _)| *k).collect();
        let nums: HashSet<_> = FOLDER_TAXONOMY.iter().map(|(_, n, _)| *n).collect();
        assert_eq!(keys.len(), FOLDER_TAXONOMY.len());
        assert_eq!(nums.len(), FOLDER_TAXONOMY.len());
        assert!(nums.iter().all(|n| (1..=15).contains(n)));
    }

    #[test]
    fn every_key_maps_to_its_folder() {
        for (key, n, _) in FOLDER_TAXONOMY {
            let f = classify(Some(key), None).unwrap();
            assert_eq!(f.get(), *n, "key {key}");
        }
    }

    #[test]
    fn key_takes_precedence_over_folder() {
        let raw = RawFolder::from(9);
        let f = classify(Some("liquid_ir"), Some(&raw)).unwrap();
        assert_eq!(f.get(), 1);
    }

    #[test]
    fn unknown_key_falls_back_to_folder() {
        let raw = RawFolder::from("7");
        let f = classify(Some("not_a_type"), Some(&raw)).unwrap();
        assert_eq!(f.get(), 7);
    }

    #[test]
    fn extra_folder_only_by_number() {
        assert!(key_for_folder(Folder::new(15).unwrap()).is_none());
        let f = classify(None, Some(&RawFolder::from(15))).unwrap();
        assert_eq!(f.get(), 15);
        assert_eq!(label_for_folder(f), EXTRA_FOLDER_LABEL);
    }

    #[test]
    fn out_of_range_folders_fail() {
        for n in [-1, 0, 16, 100, i64::MAX] {
            let raw = RawFolder::from(n);
            assert!(
                matches!(
                    classify(None, Some(&raw)),
                    Err(ReportError::InvalidClassification)
                ),
                "folder {n}"
            );
            assert!(classify(Some("unknown"), Some(&raw)).is_err());
        }
    }

    #[test]
    fn non_integer_folders_fail() {
        for raw in [
            RawFolder::Number(2.5),
            RawFolder::Number(f64::NAN),
            RawFolder::from("abc"),
            RawFolder::from(""),
        ] {
            assert!(classify(None, Some(&raw)).is_err(), "{raw:?}");
        }
    }

    #[test]
    fn nothing_given_fails() {
        assert!(matches!(
            classify(None, None),
            Err(ReportError::InvalidClassification)
        ));
    }

    #[test]
    fn classification_is_repeatable() {
        let raw = RawFolder::from(" 4 ");
        let a = classify(None, Some(&raw)).unwrap();
        let b = classify(None, Some(&raw)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn raw_folder_deserialises_from_number_or_string() {
        let n: RawFolder = serde_json::from_str("3").unwrap();
        let s: RawFolder = serde_json::from_str("\"3\"").unwrap();
        assert_eq!(n.as_integer(), Some(3));
        assert_eq!(s.as_integer(), Some(3));
    }

    #[test]
    fn catalog_covers_all_folders() {
        let entries = catalog();
        assert_eq!(entries.len(), 15);
        assert_eq!(entries[0].key, Some("liquid_ir"));
        let extra = &entries[14];
        assert_eq!(extra.folder.get(), 15);
        assert_eq!(extra.key, None);
        assert_eq!(extra.label, EXTRA_FOLDER_LABEL);
    }
}
