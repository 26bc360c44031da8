use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frame::{Column, Frame};
use crate::schema::RECORD_FIELDS;

/// One raw observation as received by the prediction endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WineRecord {
    /// "red" or "white"
    #[serde(rename = "type")]
    pub wine_type: String,
    pub fixed_acidity: f64,
    pub volatile_acidity: f64,
    pub citric_acid: f64,
    pub residual_sugar: f64,
    pub chlorides: f64,
    pub free_sulfur_dioxide: f64,
    pub total_sulfur_dioxide: f64,
    pub density: f64,
    #[serde(rename = "pH")]
    pub ph: f64,
    pub sulphates: f64,
    pub alcohol: f64,
}

impl WineRecord {
    /// Measurements in [`RECORD_FIELDS`] order, `type` excluded.
    pub fn measurements(&self) -> [f64; 11] {
        [
            self.fixed_acidity,
            self.volatile_acidity,
            self.citric_acid,
            self.residual_sugar,
            self.chlorides,
            self.free_sulfur_dioxide,
            self.total_sulfur_dioxide,
            self.density,
            self.ph,
            self.sulphates,
            self.alcohol,
        ]
    }

    pub fn example() -> Self {
        Self {
            wine_type: "white".into(),
            fixed_acidity: 7.0,
            volatile_acidity: 0.27,
            citric_acid: 0.36,
            residual_sugar: 20.7,
            chlorides: 0.045,
            free_sulfur_dioxide: 45.0,
            total_sulfur_dioxide: 170.0,
            density: 1.001,
            ph: 3.0,
            sulphates: 0.45,
            alcohol: 8.8,
        }
    }
}

/// Builds a raw frame with identifier-form column names, one row per record.
pub fn records_to_frame(records: &[WineRecord]) -> Result<Frame> {
    let mut columns = vec![(
        RECORD_FIELDS[0],
        Column::Text(records.iter().map(|r| Some(r.wine_type.clone())).collect()),
    )];
    for (idx, name) in RECORD_FIELDS[1..].iter().enumerate() {
        columns.push((*name, Column::Numeric(records.iter().map(|r| Some(r.measurements()[idx])).collect())));
    }
    Frame::from_columns(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_field_names() {
        let json = serde_json::to_value(WineRecord::example()).unwrap();
        assert_eq!(json["type"], "white");
        assert_eq!(json["pH"], 3.0);
        assert!(json.get("ph").is_none());
    }

    #[test]
    fn missing_field_rejected() {
        let mut json = serde_json::to_value(WineRecord::example()).unwrap();
        json.as_object_mut().unwrap().remove("alcohol");
        assert!(serde_json::from_value::<WineRecord>(json).is_err());
    }

    #[test]
    fn frame_has_identifier_columns() {
        let frame = records_to_frame(&[WineRecord::example(), WineRecord::example()]).unwrap();
        assert_eq!(frame.n_rows(), 2);
        let names: Vec<&str> = frame.names().iter().map(String::as_str).collect();
        assert_eq!(names, RECORD_FIELDS.to_vec());
        assert_eq!(frame.numeric("pH").unwrap()[1], Some(3.0));
    }
}
