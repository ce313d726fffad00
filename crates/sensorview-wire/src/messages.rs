//! Outbound JSON documents understood by the viewer page.
//!
//! Every document carries a `"type"` discriminator; list payloads use the
//! viewer's `Object_result` key.

use serde::{Deserialize, Serialize};

/// A point in the 2D color image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

/// A point in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Whether every axis is within `radius` of `other`.
    pub fn near(&self, other: &Point3, radius: f32) -> bool {
        (self.x - other.x).abs() < radius
            && (self.y - other.y).abs() < radius
            && (self.z - other.z).abs() < radius
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

/// Pixel rectangle in the color image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl BoundingBox {
    /// `[x, y, width, height]` as used by object entries.
    pub fn to_array(self) -> [i32; 4] {
        [self.x, self.y, self.w, self.h]
    }
}

/// One recognised, localised or tracked object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    /// World position in metres.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<[f32; 3]>,
    /// Camera-space center in millimetres.
    #[serde(
        rename = "centerCoord",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub center_coord: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rectangle: Option<[i32; 4]>,
}

/// One tracked person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonEntry {
    pub pid: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cumulative_total: Option<i32>,
    /// Recognition id, when the person is registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rid: Option<i32>,
    /// World position in metres; omitted when already reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<[f32; 3]>,
    pub person_bounding_box: BoundingBox,
    pub center_mass_image: Point2,
    pub center_mass_world: Point3,
}

/// Per-sensor frame rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FpsReport {
    #[serde(rename = "type")]
    pub source: String,
    pub fisheye: f32,
    pub depth: f32,
    pub accelerometer: f32,
    pub gyroscope: f32,
}

/// Text messages sent to the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewerMessage {
    /// High-confidence objects not reported before.
    ObjectRecognition {
        #[serde(rename = "Object_result")]
        objects: Vec<ObjectEntry>,
    },
    /// Every high-confidence object of the last update.
    UnfilterObjectRecognition {
        #[serde(rename = "Object_result")]
        objects: Vec<ObjectEntry>,
    },
    ObjectLocalization {
        #[serde(rename = "Object_result")]
        objects: Vec<ObjectEntry>,
    },
    ObjectLocalizationNone,
    ObjectTracking {
        #[serde(rename = "Object_result")]
        objects: Vec<ObjectEntry>,
    },
    ObjectRecognitionLabelList {
        list: Vec<String>,
    },
    PersonTracking {
        #[serde(rename = "Object_result")]
        people: Vec<PersonEntry>,
    },
    PersonTrackingData {
        #[serde(rename = "Object_result")]
        people: Vec<PersonEntry>,
    },
    /// Camera pose as a row-major 3x4 matrix.
    Tracking {
        tracking: i32,
        pose: [f32; 12],
    },
    Fps {
        fps: FpsReport,
    },
    Event {
        event: String,
    },
}

impl ViewerMessage {
    /// The `"type"` discriminator of this message.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ObjectRecognition { .. } => "object_recognition",
            Self::UnfilterObjectRecognition { .. } => "unfilter_object_recognition",
            Self::ObjectLocalization { .. } => "object_localization",
            Self::ObjectLocalizationNone => "object_localization_none",
            Self::ObjectTracking { .. } => "object_tracking",
            Self::ObjectRecognitionLabelList { .. } => "object_recognition_label_list",
            Self::PersonTracking { .. } => "person_tracking",
            Self::PersonTrackingData { .. } => "person_tracking_data",
            Self::Tracking { .. } => "tracking",
            Self::Fps { .. } => "fps",
            Self::Event { .. } => "event",
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn tracking_shape() {
        let msg = ViewerMessage::Tracking {
            tracking: 2,
            pose: [1.0, 0.0, 0.0, 0.5, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "tracking");
        assert_eq!(value["tracking"], 2);
        assert_eq!(value["pose"].as_array().unwrap().len(), 12);
    }

    #[test]
    fn object_lists_use_viewer_key() {
        let msg = ViewerMessage::ObjectRecognition {
            objects: vec![ObjectEntry {
                label: "cup".into(),
                confidence: Some(0.9),
                pose: Some([1.0, 2.0, 3.0]),
                center_coord: None,
                rectangle: Some([10, 20, 30, 40]),
            }],
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "object_recognition");
        let entry = &value["Object_result"][0];
        assert_eq!(entry["label"], "cup");
        assert_eq!(entry["rectangle"], json!([10, 20, 30, 40]));
        assert!(entry.get("centerCoord").is_none());
    }

    #[test]
    fn localization_uses_center_coord() {
        let msg = ViewerMessage::ObjectLocalization {
            objects: vec![ObjectEntry {
                label: "chair".into(),
                confidence: Some(0.5),
                pose: None,
                center_coord: Some([100.0, 0.0, 900.0]),
                rectangle: Some([0, 0, 5, 5]),
            }],
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["Object_result"][0]["centerCoord"], json!([100.0, 0.0, 900.0]));
    }

    #[test]
    fn unit_variant_is_type_only() {
        let value = serde_json::to_value(ViewerMessage::ObjectLocalizationNone).unwrap();
        assert_eq!(value, json!({"type": "object_localization_none"}));
    }

    #[test]
    fn fps_shape() {
        let msg = ViewerMessage::Fps {
            fps: FpsReport {
                source: "input".into(),
                fisheye: 30.0,
                depth: 30.0,
                accelerometer: 250.0,
                gyroscope: 200.0,
            },
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "fps");
        assert_eq!(value["fps"]["type"], "input");
        assert_eq!(value["fps"]["gyroscope"], 200.0);
    }

    #[test]
    fn type_name_matches_serialized_tag() {
        let messages = [
            ViewerMessage::Event {
                event: "on_reset_completed".into(),
            },
            ViewerMessage::ObjectRecognitionLabelList {
                list: vec!["a".into()],
            },
            ViewerMessage::PersonTrackingData { people: vec![] },
            ViewerMessage::ObjectLocalizationNone,
        ];
        for msg in messages {
            let value = serde_json::to_value(&msg).unwrap();
            assert_eq!(value["type"], msg.type_name());
        }
    }

    #[test]
    fn parses_back_from_text() {
        let text = r#"{"type":"event","event":"on_reset_completed"}"#;
        let msg: ViewerMessage = serde_json::from_str(text).unwrap();
        assert_eq!(
            msg,
            ViewerMessage::Event {
                event: "on_reset_completed".into()
            }
        );
    }

    #[test]
    fn near_is_per_axis() {
        let a = Point3::new(0.0, 0.0, 0.0);
        assert!(a.near(&Point3::new(0.4, -0.4, 0.49), 0.5));
        assert!(!a.near(&Point3::new(0.4, 0.0, 0.5), 0.5));
    }
}
