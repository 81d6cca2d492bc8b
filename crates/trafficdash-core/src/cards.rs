//! Intersection card reconciliation.
//!
//! Cards are keyed by intersection id: the first snapshot that mentions an id
//! creates its card (appended after existing cards), later snapshots overwrite
//! the card content in place, and ids absent from the current snapshot drop
//! their cards. Creation order is preserved across updates so the layout
//! stays stable while the simulation runs.

use indexmap::IndexMap;

use crate::snapshot::{Direction, Phase, SimulationSnapshot};

/// Renderable content of one intersection card.
#[derive(Debug, Clone, PartialEq)]
pub struct CardContent {
    pub id: String,
    pub phase: Phase,
    pub phase_timer: u32,
    /// Queue lengths in `Direction::ALL` order; absent approaches read 0.
    pub queues: [u32; 4],
    pub avg_waiting_time: f64,
}

impl CardContent {
    pub fn timer_line(&self) -> String {
        format!("{}s", self.phase_timer)
    }

    pub fn queue_line(&self) -> String {
        let parts: Vec<String> = Direction::ALL
            .iter()
            .zip(self.queues.iter())
            .map(|(direction, count)| format!("{}: {}", direction.as_str(), count))
            .collect();
        parts.join(" ")
    }

    pub fn wait_line(&self) -> String {
        format!("Avg Wait: {:.1}s", round_one_decimal(self.avg_waiting_time))
    }
}

/// Round to one decimal, half away from zero, so 4.25 displays as 4.3.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
}

/// The set of live cards, reconciled against each snapshot.
#[derive(Debug, Clone, Default)]
pub struct CardSet {
    cards: IndexMap<String, CardContent>,
}

impl CardSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile against a snapshot: create first-seen cards, overwrite
    /// existing ones, drop cards whose id the snapshot no longer mentions.
    pub fn apply(&mut self, snapshot: &SimulationSnapshot) -> ApplyStats {
        let mut stats = ApplyStats::default();

        for (key, view) in &snapshot.intersections {
            // Older servers omitted the embedded id; the map key is the same
            // identity in that case.
            let id = if view.id.is_empty() { key } else { &view.id };
            let content = CardContent {
                id: id.clone(),
                phase: view.phase.clone(),
                phase_timer: view.phase_timer,
                queues: [
                    view.queue(Direction::N),
                    view.queue(Direction::S),
                    view.queue(Direction::E),
                    view.queue(Direction::W),
                ],
                avg_waiting_time: view.avg_waiting_time,
            };
            match self.cards.get_mut(id) {
                Some(existing) => {
                    *existing = content;
                    stats.updated += 1;
                }
                None => {
                    self.cards.insert(id.clone(), content);
                    stats.created += 1;
                }
            }
        }

        let stale: Vec<String> = self
            .cards
            .keys()
            .filter(|id| {
                !snapshot.intersections.contains_key(*id)
                    && !snapshot
                        .intersections
                        .values()
                        .any(|view| view.id == **id)
            })
            .cloned()
            .collect();
        for id in stale {
            self.cards.shift_remove(&id);
            stats.removed += 1;
        }

        stats
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CardContent> {
        self.cards.get(id)
    }

    /// Cards in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &CardContent> {
        self.cards.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::IntersectionView;

    fn view(id: &str, phase: &str, timer: u32, queues: &[(Direction, u32)], wait: f64) -> IntersectionView {
        IntersectionView {
            id: id.to_owned(),
            phase: Phase::from(phase),
            phase_timer: timer,
            queues: queues.iter().copied().collect(),
            avg_waiting_time: wait,
        }
    }

    fn snapshot_with(views: Vec<IntersectionView>) -> SimulationSnapshot {
        let mut snapshot = SimulationSnapshot::default();
        for v in views {
            snapshot.intersections.insert(v.id.clone(), v);
        }
        snapshot
    }

    #[test]
    fn first_sight_creates_card_exactly_once() {
        let mut cards = CardSet::new();
        let snapshot = snapshot_with(vec![view("I1", "NS_GREEN", 3, &[(Direction::N, 2)], 1.0)]);

        let first = cards.apply(&snapshot);
        assert_eq!(first, ApplyStats { created: 1, updated: 0, removed: 0 });

        let second = cards.apply(&snapshot);
        assert_eq!(second, ApplyStats { created: 0, updated: 1, removed: 0 });
        assert_eq!(cards.len(), 1);
    }

    #[test]
    fn reuse_updates_in_place_without_duplicates() {
        let mut cards = CardSet::new();
        cards.apply(&snapshot_with(vec![view("I1", "NS_GREEN", 3, &[], 1.0)]));
        cards.apply(&snapshot_with(vec![view("I1", "EW_GREEN", 0, &[(Direction::E, 9)], 2.75)]));

        assert_eq!(cards.len(), 1);
        let card = cards.get("I1").expect("card");
        assert_eq!(card.phase.as_str(), "EW_GREEN");
        assert_eq!(card.queues, [0, 0, 9, 0]);
    }

    #[test]
    fn vanished_intersection_drops_its_card() {
        let mut cards = CardSet::new();
        cards.apply(&snapshot_with(vec![
            view("I1", "NS_GREEN", 1, &[], 0.0),
            view("I2", "NS_GREEN", 1, &[], 0.0),
        ]));
        let stats = cards.apply(&snapshot_with(vec![view("I2", "EW_GREEN", 2, &[], 0.0)]));

        assert_eq!(stats.removed, 1);
        assert!(cards.get("I1").is_none());
        assert_eq!(cards.len(), 1);
    }

    #[test]
    fn creation_order_is_stable_across_updates() {
        let mut cards = CardSet::new();
        cards.apply(&snapshot_with(vec![
            view("I3", "NS_GREEN", 1, &[], 0.0),
            view("I1", "NS_GREEN", 1, &[], 0.0),
        ]));
        // A later snapshot listing I1 first must not reorder the cards.
        let mut reordered = SimulationSnapshot::default();
        reordered
            .intersections
            .insert("I1".into(), view("I1", "NS_GREEN", 2, &[], 0.0));
        reordered
            .intersections
            .insert("I3".into(), view("I3", "NS_GREEN", 2, &[], 0.0));
        cards.apply(&reordered);

        let order: Vec<&str> = cards.iter().map(|card| card.id.as_str()).collect();
        assert_eq!(order, ["I3", "I1"]);
    }

    #[test]
    fn absent_directions_render_as_zero() {
        let mut cards = CardSet::new();
        cards.apply(&snapshot_with(vec![view(
            "I1",
            "NS_GREEN",
            5,
            &[(Direction::N, 3), (Direction::E, 1)],
            0.0,
        )]));
        let card = cards.get("I1").expect("card");
        assert_eq!(card.queue_line(), "N: 3 S: 0 E: 1 W: 0");
        assert_eq!(card.queues, [3, 0, 1, 0]);
    }

    #[test]
    fn wait_rounds_half_away_from_zero() {
        let card = CardContent {
            id: "I1".into(),
            phase: Phase::from("NS_GREEN"),
            phase_timer: 5,
            queues: [3, 0, 1, 2],
            avg_waiting_time: 4.25,
        };
        assert_eq!(card.wait_line(), "Avg Wait: 4.3s");
        assert_eq!(card.timer_line(), "5s");
        assert_eq!(card.queue_line(), "N: 3 S: 0 E: 1 W: 2");
    }

    #[test]
    fn map_key_stands_in_for_missing_embedded_id() {
        let mut snapshot = SimulationSnapshot::default();
        snapshot.intersections.insert(
            "I7".into(),
            IntersectionView { phase: Phase::from("NS_GREEN"), ..IntersectionView::default() },
        );
        let mut cards = CardSet::new();
        let stats = cards.apply(&snapshot);
        assert_eq!(stats.created, 1);
        assert!(cards.get("I7").is_some());

        // A second pass updates rather than duplicating.
        let stats = cards.apply(&snapshot);
        assert_eq!(stats, ApplyStats { created: 0, updated: 1, removed: 0 });
    }
}
