//! Marker presence lifecycle across frames.
//!
//! Each id is either absent or present. A frame that contains the id makes it
//! present (reported as added); a frame that lacks it makes it absent
//! (reported as removed). There is no grace period: one missed frame removes
//! the marker.

use log::info;
use memory_game_markers::DetectedMarker;
use serde::Serialize;
use std::collections::btree_map::{self, BTreeMap};

/// Detections of a single frame, keyed by marker id.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DetectionSet {
    markers: BTreeMap<u32, DetectedMarker>,
}

impl DetectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the id was already seen this frame. Returns whether the
    /// marker was inserted.
    pub fn insert(&mut self, marker: DetectedMarker) -> bool {
        match self.markers.entry(marker.id) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(marker);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn get(&self, id: u32) -> Option<&DetectedMarker> {
        self.markers.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.markers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }

    /// Markers in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &DetectedMarker> {
        self.markers.values()
    }
}

impl FromIterator<DetectedMarker> for DetectionSet {
    fn from_iter<I: IntoIterator<Item = DetectedMarker>>(iter: I) -> Self {
        let mut set = Self::new();
        for marker in iter {
            set.insert(marker);
        }
        set
    }
}

/// A single lifecycle transition.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", content = "marker", rename_all = "snake_case")]
pub enum PresenceEvent {
    Added(DetectedMarker),
    Removed(DetectedMarker),
}

impl PresenceEvent {
    pub fn marker(&self) -> &DetectedMarker {
        match self {
            PresenceEvent::Added(m) | PresenceEvent::Removed(m) => m,
        }
    }
}

/// Outcome of one [`PresenceTracker::update`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PresenceUpdate {
    /// Newly present markers, ascending by id.
    pub added: Vec<DetectedMarker>,
    /// Markers no longer present, with the payload they were added with.
    pub removed: Vec<DetectedMarker>,
}

impl PresenceUpdate {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Additions first, then removals.
    pub fn events(&self) -> Vec<PresenceEvent> {
        self.added
            .iter()
            .cloned()
            .map(PresenceEvent::Added)
            .chain(self.removed.iter().cloned().map(PresenceEvent::Removed))
            .collect()
    }
}

/// Owns the set of markers currently on the table.
#[derive(Clone, Debug, Default)]
pub struct PresenceTracker {
    present: BTreeMap<u32, DetectedMarker>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff the frame's detections against the present set and apply it.
    pub fn update(&mut self, detections: &DetectionSet) -> PresenceUpdate {
        let to_add: Vec<u32> = detections
            .markers
            .keys()
            .filter(|id| !self.present.contains_key(id))
            .copied()
            .collect();
        let to_remove: Vec<u32> = self
            .present
            .keys()
            .filter(|id| !detections.contains(**id))
            .copied()
            .collect();

        let mut update = PresenceUpdate::default();
        for id in to_add {
            let Some(marker) = detections.get(id) else {
                continue;
            };
            if let btree_map::Entry::Vacant(slot) = self.present.entry(id) {
                info!("marker {id} added ({:?})", marker.marker_type);
                slot.insert(marker.clone());
                update.added.push(marker.clone());
            }
        }
        for id in to_remove {
            if detections.contains(id) {
                continue;
            }
            if let Some(marker) = self.present.remove(&id) {
                info!("marker {id} removed");
                update.removed.push(marker);
            }
        }
        update
    }

    /// Present markers in ascending id order.
    pub fn present(&self) -> impl Iterator<Item = &DetectedMarker> {
        self.present.values()
    }

    pub fn get(&self, id: u32) -> Option<&DetectedMarker> {
        self.present.get(&id)
    }

    pub fn is_present(&self, id: u32) -> bool {
        self.present.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.present.len()
    }

    pub fn is_empty(&self) -> bool {
        self.present.is_empty()
    }

    /// Forget every marker without emitting removals.
    pub fn clear(&mut self) {
        self.present.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_game_markers::{match_marker, MarkerCatalog};

    fn detected(catalog: &MarkerCatalog, id: u32, rotation: usize) -> DetectedMarker {
        let grid = &catalog.get(id).unwrap().rotations()[rotation];
        match_marker(catalog, grid).unwrap().unwrap()
    }

    #[test]
    fn marker_is_added_then_removed() {
        let catalog = MarkerCatalog::builtin();
        let d3 = detected(&catalog, 3, 0);
        let mut tracker = PresenceTracker::new();

        let frame: DetectionSet = [d3.clone()].into_iter().collect();
        let update = tracker.update(&frame);
        assert_eq!(update.added, vec![d3.clone()]);
        assert!(update.removed.is_empty());
        assert!(tracker.is_present(3));

        let update = tracker.update(&DetectionSet::new());
        assert!(update.added.is_empty());
        assert_eq!(update.removed, vec![d3]);
        assert!(tracker.is_empty());
    }

    #[test]
    fn unchanged_frame_is_idempotent() {
        let catalog = MarkerCatalog::builtin();
        let frame: DetectionSet = [detected(&catalog, 0, 1), detected(&catalog, 2, 3)]
            .into_iter()
            .collect();
        let mut tracker = PresenceTracker::new();

        assert_eq!(tracker.update(&frame).added.len(), 2);
        let again = tracker.update(&frame);
        assert!(again.is_empty());
        assert!(again.events().is_empty());
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn removal_reports_payload_from_when_it_was_added() {
        let catalog = MarkerCatalog::builtin();
        let mut tracker = PresenceTracker::new();
        tracker.update(&[detected(&catalog, 1, 0)].into_iter().collect());
        // a new orientation of a present marker is not a new addition
        let turned = tracker.update(&[detected(&catalog, 1, 2)].into_iter().collect());
        assert!(turned.is_empty());
        assert_eq!(tracker.get(1).unwrap().rotation_index, 0);

        let gone = tracker.update(&DetectionSet::new());
        assert_eq!(gone.removed[0].rotation_index, 0);
    }

    #[test]
    fn first_detection_of_an_id_wins() {
        let catalog = MarkerCatalog::builtin();
        let mut set = DetectionSet::new();
        assert!(set.insert(detected(&catalog, 0, 0)));
        assert!(!set.insert(detected(&catalog, 0, 3)));
        assert_eq!(set.get(0).unwrap().rotation_index, 0);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn events_list_additions_before_removals() {
        let catalog = MarkerCatalog::builtin();
        let mut tracker = PresenceTracker::new();
        tracker.update(&[detected(&catalog, 0, 0)].into_iter().collect());
        let update = tracker.update(&[detected(&catalog, 2, 0)].into_iter().collect());
        let events = update.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], PresenceEvent::Added(m) if m.id == 2));
        assert!(matches!(&events[1], PresenceEvent::Removed(m) if m.id == 0));
        assert_eq!(events[1].marker().id, 0);
    }
}
