use std::sync::{Arc, Mutex, PoisonError};

use sensorview_wire::{BoundingBox, ObjectEntry, Point3, ViewerMessage};
use tracing::debug;

use super::{camera_to_world, Pose, SeenPositions};
use crate::control::ControlCallbacks;
use crate::error::Result;
use crate::proxy::StreamingProxy;

/// Objects below this recognition confidence are not shown.
pub const MIN_CONFIDENCE: f32 = 0.8;

/// A localized object.
#[derive(Debug, Clone, PartialEq)]
pub struct Localization {
    pub label: String,
    pub confidence: f32,
    /// Region in the color image.
    pub roi: BoundingBox,
    /// Object center in camera space, millimetres.
    pub center_mm: Point3,
}

/// A whole-frame recognition result.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub label: String,
    pub confidence: f32,
}

/// Sends object recognition, localization and tracking results.
pub struct ObjectDisplay {
    proxy: Arc<StreamingProxy>,
    seen: Mutex<SeenPositions>,
    tracked_labels: Mutex<Vec<String>>,
}

impl ObjectDisplay {
    pub fn new(proxy: Arc<StreamingProxy>) -> Self {
        Self {
            proxy,
            seen: Mutex::new(SeenPositions::default()),
            tracked_labels: Mutex::new(Vec::new()),
        }
    }

    pub fn proxy(&self) -> &Arc<StreamingProxy> {
        &self.proxy
    }

    /// Report localized objects in world coordinates.
    ///
    /// Sends `object_recognition` with objects not reported before, then
    /// `unfilter_object_recognition` with every confident object.
    pub fn on_or_update(&self, pose: &Pose, objects: &[Localization]) -> Result<()> {
        if objects.is_empty() {
            return Ok(());
        }
        let confident: Vec<(&Localization, Point3)> = objects
            .iter()
            .filter(|o| o.confidence >= MIN_CONFIDENCE)
            .map(|o| (o, camera_to_world(pose, o.center_mm)))
            .collect();

        let fresh = {
            let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
            confident
                .iter()
                .filter(|(_, world)| seen.first_sighting(*world))
                .map(|(o, world)| world_entry(o, *world))
                .collect::<Vec<_>>()
        };
        debug!(
            total = objects.len(),
            confident = confident.len(),
            fresh = fresh.len(),
            "object update"
        );

        self.proxy
            .send_message(&ViewerMessage::ObjectRecognition { objects: fresh })?;
        self.proxy.send_message(&ViewerMessage::UnfilterObjectRecognition {
            objects: confident
                .iter()
                .map(|(o, world)| world_entry(o, *world))
                .collect(),
        })
    }

    /// Send the labels the recognizer knows about.
    pub fn on_object_list<I, S>(&self, labels: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.proxy.send_message(&ViewerMessage::ObjectRecognitionLabelList {
            list: labels.into_iter().map(Into::into).collect(),
        })
    }

    /// Send localized objects in camera coordinates.
    pub fn on_localization(&self, objects: &[Localization]) -> Result<()> {
        self.proxy.send_message(&localization_message(objects))
    }

    /// Send the top recognition result.
    pub fn on_recognition(&self, results: &[Recognition]) -> Result<()> {
        let Some(top) = results.first() else {
            return Ok(());
        };
        self.proxy.send_message(&ViewerMessage::ObjectRecognition {
            objects: vec![ObjectEntry {
                label: top.label.clone(),
                confidence: Some(top.confidence),
                pose: None,
                center_coord: None,
                rectangle: None,
            }],
        })
    }

    /// Send tracking results.
    ///
    /// While `localizing`, the localized objects are sent and their labels
    /// remembered. Otherwise `tracked` regions are sent with the remembered
    /// labels, matched by position.
    pub fn on_tracking(
        &self,
        localizations: &[Localization],
        tracked: &[BoundingBox],
        localizing: bool,
    ) -> Result<()> {
        let mut labels = self
            .tracked_labels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if localizing {
            if localizations.is_empty() {
                return Ok(());
            }
            *labels = localizations.iter().map(|o| o.label.clone()).collect();
            drop(labels);
            return self.proxy.send_message(&localization_message(localizations));
        }

        if tracked.is_empty() {
            return Ok(());
        }
        let objects = tracked
            .iter()
            .enumerate()
            .map(|(i, roi)| ObjectEntry {
                label: labels.get(i).cloned().unwrap_or_default(),
                confidence: None,
                pose: None,
                center_coord: None,
                rectangle: Some(roi.to_array()),
            })
            .collect();
        drop(labels);
        self.proxy
            .send_message(&ViewerMessage::ObjectTracking { objects })
    }

    pub fn on_rgb_frame(&self, timestamp: u64, width: u16, height: u16, rgb: &[u8]) -> Result<()> {
        self.proxy.on_rgb_frame(timestamp, width, height, rgb)
    }

    pub fn set_control_callbacks(&self, callbacks: ControlCallbacks) {
        self.proxy.set_control_callbacks(callbacks);
    }
}

fn world_entry(object: &Localization, world: Point3) -> ObjectEntry {
    ObjectEntry {
        label: object.label.clone(),
        confidence: Some(object.confidence),
        pose: Some(world.to_array()),
        center_coord: None,
        rectangle: Some(object.roi.to_array()),
    }
}

fn localization_message(objects: &[Localization]) -> ViewerMessage {
    if objects.is_empty() {
        return ViewerMessage::ObjectLocalizationNone;
    }
    ViewerMessage::ObjectLocalization {
        objects: objects
            .iter()
            .map(|o| ObjectEntry {
                label: o.label.clone(),
                confidence: Some(o.confidence),
                pose: None,
                center_coord: Some(o.center_mm.to_array()),
                rectangle: Some(o.roi.to_array()),
            })
            .collect(),
    }
}
