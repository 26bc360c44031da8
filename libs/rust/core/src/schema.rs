//! Column names shared by training and serving.
//!
//! Raw records arrive with identifier-form names (`fixed_acidity`); the data
//! file and the fitted scaler/model use display form (`fixed acidity`).

pub const TYPE_COLUMN: &str = "type";
pub const TARGET_COLUMN: &str = "quality";
pub const RED: &str = "red";

/// Canonical feature order. Scaler and model are fit against this order.
pub const FEATURE_COLUMNS: [&str; 12] = [
    "type",
    "fixed acidity",
    "volatile acidity",
    "citric acid",
    "residual sugar",
    "chlorides",
    "free sulfur dioxide",
    "total sulfur dioxide",
    "density",
    "pH",
    "sulphates",
    "alcohol",
];

/// Identifier-form field names of a raw record, in the same order as
/// [`FEATURE_COLUMNS`].
pub const RECORD_FIELDS: [&str; 12] = [
    "type",
    "fixed_acidity",
    "volatile_acidity",
    "citric_acid",
    "residual_sugar",
    "chlorides",
    "free_sulfur_dioxide",
    "total_sulfur_dioxide",
    "density",
    "pH",
    "sulphates",
    "alcohol",
];

/// Identifier form → display form for the multi-word fields.
pub const RENAME_MAP: [(&str, &str); 6] = [
    ("fixed_acidity", "fixed acidity"),
    ("volatile_acidity", "volatile acidity"),
    ("citric_acid", "citric acid"),
    ("residual_sugar", "residual sugar"),
    ("free_sulfur_dioxide", "free sulfur dioxide"),
    ("total_sulfur_dioxide", "total sulfur dioxide"),
];

pub fn feature_names() -> Vec<String> {
    FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn rename_map_is_bijective() {
        let from: HashSet<_> = RENAME_MAP.iter().map(|(f, _)| *f).collect();
        let to: HashSet<_> = RENAME_MAP.iter().map(|(_, t)| *t).collect();
        assert_eq!(from.len(), 6);
        assert_eq!(to.len(), 6);
        assert!(from.is_disjoint(&to));
    }

    #[test]
    fn renamed_fields_line_up_with_feature_order() {
        let renamed: Vec<&str> = RECORD_FIELDS
            .iter()
            .map(|f| RENAME_MAP.iter().find(|(from, _)| from == f).map(|(_, to)| *to).unwrap_or(*f))
            .collect();
        assert_eq!(renamed, FEATURE_COLUMNS.to_vec());
        let untouched = RECORD_FIELDS.iter().zip(FEATURE_COLUMNS.iter()).filter(|(a, b)| a == b).count();
        assert_eq!(untouched, 6);
    }
}
