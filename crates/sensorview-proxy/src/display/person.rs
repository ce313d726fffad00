use std::sync::{Arc, Mutex, PoisonError};

use sensorview_wire::{BoundingBox, PersonEntry, Point2, Point3, ViewerMessage};

use super::{camera_to_world, Pose, SeenPositions};
use crate::control::ControlCallbacks;
use crate::error::Result;
use crate::proxy::StreamingProxy;

/// One tracked person in a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonObservation {
    pub pid: i32,
    pub bbox: BoundingBox,
    /// Center of mass in the color image.
    pub center_image: Point2,
    /// Center of mass in camera space, millimetres.
    pub center_world: Point3,
    /// Recognition id, when the person is registered.
    pub rid: Option<i32>,
}

/// Sends person tracking results.
pub struct PersonDisplay {
    proxy: Arc<StreamingProxy>,
    seen: Mutex<SeenPositions>,
}

impl PersonDisplay {
    pub fn new(proxy: Arc<StreamingProxy>) -> Self {
        Self {
            proxy,
            seen: Mutex::new(SeenPositions::default()),
        }
    }

    pub fn proxy(&self) -> &Arc<StreamingProxy> {
        &self.proxy
    }

    /// Send `person_tracking_data`. A person's world position is included
    /// only the first time it is seen near that spot.
    ///
    /// Returns `false` without sending when `people` is empty.
    pub fn on_pt_update(&self, pose: &Pose, people: &[PersonObservation]) -> Result<bool> {
        if people.is_empty() {
            return Ok(false);
        }
        let entries = {
            let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
            people
                .iter()
                .map(|person| {
                    let world = camera_to_world(pose, person.center_world);
                    let fresh = seen.first_sighting(world);
                    PersonEntry {
                        pose: fresh.then(|| world.to_array()),
                        ..entry(person, None, None)
                    }
                })
                .collect()
        };
        self.proxy
            .send_message(&ViewerMessage::PersonTrackingData { people: entries })?;
        Ok(true)
    }

    /// Send `person_tracking` with the running count of people seen.
    pub fn on_tracking_update(&self, people: &[PersonObservation], cumulative_total: i32) -> Result<()> {
        if people.is_empty() {
            return Ok(());
        }
        self.proxy.send_message(&ViewerMessage::PersonTracking {
            people: people
                .iter()
                .map(|p| entry(p, Some(cumulative_total), p.rid))
                .collect(),
        })
    }

    pub fn on_rgb_frame(&self, timestamp: u64, width: u16, height: u16, rgb: &[u8]) -> Result<()> {
        self.proxy.on_rgb_frame(timestamp, width, height, rgb)
    }

    pub fn set_control_callbacks(&self, callbacks: ControlCallbacks) {
        self.proxy.set_control_callbacks(callbacks);
    }
}

fn entry(person: &PersonObservation, cumulative_total: Option<i32>, rid: Option<i32>) -> PersonEntry {
    PersonEntry {
        pid: person.pid,
        cumulative_total,
        rid,
        pose: None,
        person_bounding_box: person.bbox,
        center_mass_image: person.center_image,
        center_mass_world: person.center_world,
    }
}
