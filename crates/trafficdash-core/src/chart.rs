//! Chart sink for the queue/wait history.
//!
//! The sink owns the step labels and two data series: total queue length
//! (count-like) and average wait in seconds (time-like). Each poll replaces
//! all three wholesale from the server history; there is no client-side
//! append or windowing, the server already bounds the series. An empty
//! history leaves the previous series in place rather than clearing it.

use crate::snapshot::HistoryPoint;

#[derive(Debug, Clone, Default)]
pub struct ChartSink {
    steps: Vec<u64>,
    total_queue: Vec<u64>,
    avg_wait: Vec<f64>,
}

impl ChartSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rendered series from a snapshot's history. Empty input is
    /// a no-op so a momentarily-blank server response does not blank the
    /// chart.
    pub fn update(&mut self, history: &[HistoryPoint]) {
        if history.is_empty() {
            return;
        }
        self.steps = history.iter().map(|point| point.step).collect();
        self.total_queue = history.iter().map(|point| point.total_queue).collect();
        self.avg_wait = history.iter().map(|point| point.avg_wait).collect();
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[u64] {
        &self.steps
    }

    pub fn queue_series(&self) -> &[u64] {
        &self.total_queue
    }

    pub fn wait_series(&self) -> &[f64] {
        &self.avg_wait
    }

    /// Wait series scaled to centiseconds for integer-valued sparklines.
    pub fn wait_centiseconds(&self) -> Vec<u64> {
        self.avg_wait
            .iter()
            .map(|&seconds| (seconds.max(0.0) * 100.0) as u64)
            .collect()
    }

    /// First and last step of the rendered window.
    pub fn window(&self) -> Option<(u64, u64)> {
        Some((*self.steps.first()?, *self.steps.last()?))
    }

    /// Most recent point of the rendered window.
    pub fn latest(&self) -> Option<HistoryPoint> {
        let idx = self.steps.len().checked_sub(1)?;
        Some(HistoryPoint {
            step: self.steps[idx],
            avg_wait: self.avg_wait[idx],
            total_queue: self.total_queue[idx],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history() -> Vec<HistoryPoint> {
        vec![
            HistoryPoint { step: 40, avg_wait: 4.1, total_queue: 5 },
            HistoryPoint { step: 41, avg_wait: 4.2, total_queue: 6 },
        ]
    }

    #[test]
    fn update_replaces_series_wholesale() {
        let mut sink = ChartSink::new();
        sink.update(&history());
        assert_eq!(sink.steps(), &[40, 41]);
        assert_eq!(sink.queue_series(), &[5, 6]);

        sink.update(&[HistoryPoint { step: 50, avg_wait: 1.0, total_queue: 2 }]);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.window(), Some((50, 50)));
    }

    #[test]
    fn repeated_update_is_idempotent() {
        let mut sink = ChartSink::new();
        sink.update(&history());
        let before = sink.clone();
        sink.update(&history());
        assert_eq!(sink.steps(), before.steps());
        assert_eq!(sink.queue_series(), before.queue_series());
        assert_eq!(sink.wait_series(), before.wait_series());
    }

    #[test]
    fn empty_history_leaves_series_untouched() {
        let mut sink = ChartSink::new();
        sink.update(&history());
        sink.update(&[]);
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.window(), Some((40, 41)));
    }

    #[test]
    fn wait_scaling_clamps_negatives() {
        let mut sink = ChartSink::new();
        sink.update(&[HistoryPoint { step: 1, avg_wait: -0.5, total_queue: 0 }]);
        assert_eq!(sink.wait_centiseconds(), vec![0]);
    }

    #[test]
    fn latest_reports_last_point() {
        let mut sink = ChartSink::new();
        assert!(sink.latest().is_none());
        sink.update(&history());
        let latest = sink.latest().expect("latest");
        assert_eq!(latest.step, 41);
        assert_eq!(latest.total_queue, 6);
    }
}
