//! Claim processing pipeline.
//!
//! Drives a batch of documents through `pending → analyzing → completed |
//! error`, one document at a time, writing every transition through to the
//! [`ClaimStore`] before notifying observers and moving on.
//!
//! The analyzer is injected as a trait object so the pipeline is testable
//! with a scripted model. The pipeline does no I/O of its own beyond the
//! store; presenting records is the observers' job.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use super::analysis::ClaimAnalyzer;
use super::ids::RecordIdGenerator;
use super::stats::ClaimStats;
use super::store::ClaimStore;
use crate::models::{ClaimPatch, ClaimRecord, ClaimStatus, Document};

/// View hook, called after every store write with the post-transition
/// record.
pub trait TransitionObserver: Send {
    fn on_transition(&mut self, record: &ClaimRecord);

    /// History was cleared.
    fn on_reset(&mut self) {}
}

/// Observer that logs each transition.
#[derive(Debug, Default)]
pub struct LogObserver;

impl TransitionObserver for LogObserver {
    fn on_transition(&mut self, record: &ClaimRecord) {
        tracing::info!(
            id = %record.id(),
            filename = %record.filename(),
            status = %record.status(),
            flags = record.result().map_or(0, |r| r.flags.len()),
            "Claim status changed"
        );
    }

    fn on_reset(&mut self) {
        tracing::info!("Claim history cleared");
    }
}

/// Outcome counts for one call to [`ClaimPipeline::process`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub submitted: usize,
    pub completed: usize,
    pub failed: usize,
    /// Unknown ids and records already in a terminal state.
    pub skipped: usize,
    /// Batch order.
    pub record_ids: Vec<String>,
}

/// Session-scoped owner of the record set and the analyzer.
pub struct ClaimPipeline {
    analyzer: Box<dyn ClaimAnalyzer>,
    store: ClaimStore,
    ids: RecordIdGenerator,
    observers: Vec<Box<dyn TransitionObserver>>,
}

impl ClaimPipeline {
    pub fn new(analyzer: Box<dyn ClaimAnalyzer>, store: ClaimStore) -> Self {
        Self {
            analyzer,
            store,
            ids: RecordIdGenerator::new(),
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Box<dyn TransitionObserver>) {
        self.observers.push(observer);
    }

    /// Create one pending record per document, in order, with a single
    /// store append. Returns the new ids in batch order.
    pub fn submit(&mut self, documents: Vec<Document>) -> Vec<String> {
        let mut records: Vec<ClaimRecord> = Vec::with_capacity(documents.len());
        for document in documents {
            let id = self.ids.next_unique(|candidate| {
                self.store.contains(candidate) || records.iter().any(|r| r.id() == candidate)
            });
            records.push(ClaimRecord::new(&id, Arc::new(document)));
        }

        let ids: Vec<String> = records.iter().map(|r| r.id().to_string()).collect();
        self.store.append(records);

        for id in &ids {
            self.notify(id);
        }
        tracing::info!(count = ids.len(), "Claims submitted");
        ids
    }

    /// Analyze the given records strictly in order. A failing document
    /// marks its own record as error and never stops the batch.
    pub fn process(&mut self, ids: &[String]) -> BatchReport {
        let _span = tracing::info_span!("process_claims", count = ids.len()).entered();
        let start = Instant::now();
        let mut report = BatchReport {
            submitted: ids.len(),
            record_ids: ids.to_vec(),
            ..BatchReport::default()
        };

        for id in ids {
            match self.process_one(id) {
                Some(ClaimStatus::Completed) => report.completed += 1,
                Some(ClaimStatus::Error) => report.failed += 1,
                _ => report.skipped += 1,
            }
        }

        tracing::info!(
            completed = report.completed,
            failed = report.failed,
            skipped = report.skipped,
            elapsed_ms = %start.elapsed().as_millis(),
            "Claim batch finished"
        );
        report
    }

    /// [`submit`](Self::submit) then [`process`](Self::process).
    pub fn process_batch(&mut self, documents: Vec<Document>) -> BatchReport {
        let ids = self.submit(documents);
        self.process(&ids)
    }

    /// Run one record to a terminal state. Returns the final status, or
    /// `None` when the record was skipped.
    fn process_one(&mut self, id: &str) -> Option<ClaimStatus> {
        let Some(record) = self.store.get(id) else {
            tracing::warn!(%id, "Unknown claim id, skipping");
            return None;
        };
        let status = record.status();
        let document = record.document().cloned();

        if status.is_terminal() {
            tracing::debug!(%id, %status, "Claim already processed, skipping");
            return None;
        }

        let Some(document) = document else {
            // Reloaded from a snapshot: the bytes are gone
            tracing::warn!(%id, "Claim has no document to analyze, marking as error");
            if status == ClaimStatus::Pending {
                self.transition(id, ClaimPatch::analyzing());
            }
            self.transition(id, ClaimPatch::failed());
            return Some(ClaimStatus::Error);
        };

        if status == ClaimStatus::Pending {
            self.transition(id, ClaimPatch::analyzing());
        }

        match self.analyzer.analyze_claim(&document) {
            Ok(result) => {
                self.transition(id, ClaimPatch::completed(result));
                Some(ClaimStatus::Completed)
            }
            Err(e) => {
                tracing::warn!(%id, filename = %document.filename(), error = %e, "Claim analysis failed");
                self.transition(id, ClaimPatch::failed());
                Some(ClaimStatus::Error)
            }
        }
    }

    fn transition(&mut self, id: &str, patch: ClaimPatch) {
        if let (Some(current), Some(next)) = (self.store.get(id).map(|r| r.status()), patch.status()) {
            debug_assert!(
                current.can_transition_to(next),
                "illegal claim transition {current} -> {next}"
            );
        }
        if self.store.update(id, patch) {
            self.notify(id);
        }
    }

    fn notify(&mut self, id: &str) {
        if let Some(record) = self.store.get(id) {
            for observer in self.observers.iter_mut() {
                observer.on_transition(record);
            }
        }
    }

    /// Drop every record, in memory and in storage.
    pub fn clear_history(&mut self) {
        self.store.clear();
        for observer in self.observers.iter_mut() {
            observer.on_reset();
        }
    }

    pub fn records(&self) -> &[ClaimRecord] {
        self.store.records()
    }

    pub fn get(&self, id: &str) -> Option<&ClaimRecord> {
        self.store.get(id)
    }

    pub fn by_status(&self, status: ClaimStatus) -> Vec<&ClaimRecord> {
        self.store.by_status(status)
    }

    pub fn flagged(&self) -> Vec<&ClaimRecord> {
        self.store.flagged()
    }

    pub fn approved(&self) -> Vec<&ClaimRecord> {
        self.store.approved()
    }

    pub fn stats(&self) -> ClaimStats {
        ClaimStats::from_records(self.store.records())
    }

    pub fn store(&self) -> &ClaimStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::config::STORAGE_KEY;
    use crate::db::{KeyValueStorage, MemoryKvStorage};
    use crate::models::RiskLevel;
    use crate::pipeline::analysis::{AnalysisClient, AnalysisError, MockModel};

    const FLAGGED: &str = r#"{"isConsistent": false, "riskLevel": "high", "confidence": 90,
        "summary": "Dates contradict.",
        "flags": [{"type": "inconsistency", "severity": "high", "description": "Report before incident"}]}"#;
    const CLEAN: &str = r#"{"isConsistent": true, "riskLevel": "low", "confidence": 95,
        "summary": "All consistent.", "flags": []}"#;

    type Events = Arc<Mutex<Vec<(String, ClaimStatus)>>>;

    struct Recorder {
        events: Events,
        resets: Arc<Mutex<usize>>,
    }

    impl TransitionObserver for Recorder {
        fn on_transition(&mut self, record: &ClaimRecord) {
            assert!(record.is_consistent_state());
            self.events
                .lock()
                .unwrap()
                .push((record.filename().to_string(), record.status()));
        }

        fn on_reset(&mut self) {
            *self.resets.lock().unwrap() += 1;
        }
    }

    fn doc(name: &str) -> Document {
        Document::new(name, Some("application/pdf"), b"%PDF".to_vec())
    }

    fn pipeline(model: MockModel) -> (ClaimPipeline, MemoryKvStorage, Events, Arc<Mutex<usize>>) {
        let kv = MemoryKvStorage::new();
        let store = ClaimStore::open(Box::new(kv.clone()));
        let analyzer = AnalysisClient::new(Arc::new(model));
        let mut pipeline = ClaimPipeline::new(Box::new(analyzer), store);

        let events: Events = Arc::default();
        let resets = Arc::new(Mutex::new(0));
        pipeline.add_observer(Box::new(Recorder {
            events: events.clone(),
            resets: resets.clone(),
        }));
        (pipeline, kv, events, resets)
    }

    fn events_of(events: &Events) -> Vec<(String, ClaimStatus)> {
        events.lock().unwrap().clone()
    }

    #[test]
    fn flagged_then_transport_failure() {
        let model = MockModel::new()
            .then_text(FLAGGED)
            .then_error(AnalysisError::Transport("connection refused".into()));
        let (mut pipeline, _, _, _) = pipeline(model);

        let report = pipeline.process_batch(vec![doc("one.pdf"), doc("two.pdf")]);
        assert_eq!(report.submitted, 2);
        assert_eq!(report.completed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 0);

        let records = pipeline.records();
        assert_eq!(records[0].status(), ClaimStatus::Completed);
        assert_eq!(records[0].result().unwrap().flags.len(), 1);
        assert_eq!(records[1].status(), ClaimStatus::Error);
        assert!(records[1].result().is_none());

        let stats = pipeline.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.flagged, 1);
        assert_eq!(stats.approved, 0);
        assert_eq!(stats.avg_risk, RiskLevel::High);
    }

    #[test]
    fn transitions_follow_batch_order_even_when_first_is_slow() {
        let model = MockModel::new()
            .then_delayed(Duration::from_millis(80), Ok(CLEAN.into()))
            .then_text(FLAGGED)
            .then_text("not json at all");
        let (mut pipeline, _, events, _) = pipeline(model);

        pipeline.process_batch(vec![doc("a.pdf"), doc("b.pdf"), doc("c.pdf")]);

        use ClaimStatus::*;
        let expected: Vec<(String, ClaimStatus)> = [
            ("a.pdf", Pending),
            ("b.pdf", Pending),
            ("c.pdf", Pending),
            ("a.pdf", Analyzing),
            ("a.pdf", Completed),
            ("b.pdf", Analyzing),
            ("b.pdf", Completed),
            ("c.pdf", Analyzing),
            ("c.pdf", Error),
        ]
        .into_iter()
        .map(|(f, s)| (f.to_string(), s))
        .collect();
        assert_eq!(events_of(&events), expected);
    }

    #[test]
    fn every_transition_is_written_through() {
        let (mut pipeline, kv, _, _) = pipeline(MockModel::new().then_text(CLEAN));
        let ids = pipeline.submit(vec![doc("a.pdf")]);

        let snapshot = kv.get(STORAGE_KEY).unwrap().unwrap();
        assert!(snapshot.contains("\"status\":\"pending\""));

        pipeline.process(&ids);
        let snapshot = kv.get(STORAGE_KEY).unwrap().unwrap();
        assert!(snapshot.contains("\"status\":\"completed\""));
        assert!(snapshot.contains("\"analysisResult\""));
    }

    #[test]
    fn ids_are_unique_and_in_batch_order() {
        let (mut pipeline, _, _, _) = pipeline(MockModel::constant(CLEAN));
        let docs = (0..20).map(|i| doc(&format!("{i}.pdf"))).collect();
        let report = pipeline.process_batch(docs);

        let mut unique = report.record_ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 20);

        let filenames: Vec<&str> = pipeline.records().iter().map(|r| r.filename()).collect();
        let expected: Vec<String> = (0..20).map(|i| format!("{i}.pdf")).collect();
        assert_eq!(filenames, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn terminal_records_are_not_reprocessed() {
        let (mut pipeline, _, _, _) = pipeline(MockModel::new().then_text(CLEAN));
        let ids = pipeline.submit(vec![doc("a.pdf")]);
        pipeline.process(&ids);

        let again = pipeline.process(&ids);
        assert_eq!(again.skipped, 1);
        assert_eq!(again.completed, 0);
        assert_eq!(pipeline.records()[0].status(), ClaimStatus::Completed);
    }

    #[test]
    fn unknown_ids_are_skipped() {
        let (mut pipeline, _, _, _) = pipeline(MockModel::new());
        let report = pipeline.process(&["claim-0-0-deadbeef".to_string()]);
        assert_eq!(report.skipped, 1);
        assert!(pipeline.records().is_empty());
    }

    #[test]
    fn reloaded_pending_record_without_document_fails() {
        let kv = MemoryKvStorage::new();
        kv.insert_raw(
            STORAGE_KEY,
            r#"[{"id":"old","filename":"old.pdf","status":"pending"}]"#,
        );
        let model = Arc::new(MockModel::new());
        let analyzer = AnalysisClient::new(model.clone());
        let mut pipeline = ClaimPipeline::new(Box::new(analyzer), ClaimStore::open(Box::new(kv)));

        let report = pipeline.process(&["old".to_string()]);
        assert_eq!(report.failed, 1);
        assert_eq!(pipeline.get("old").unwrap().status(), ClaimStatus::Error);
        assert!(model.requests().is_empty());
    }

    #[test]
    fn new_ids_never_collide_with_loaded_records() {
        let (mut pipeline, kv, _, _) = pipeline(MockModel::constant(CLEAN));
        pipeline.process_batch(vec![doc("a.pdf")]);

        let store = ClaimStore::open(Box::new(kv));
        let analyzer = AnalysisClient::new(Arc::new(MockModel::constant(CLEAN)));
        let mut reopened = ClaimPipeline::new(Box::new(analyzer), store);
        reopened.process_batch(vec![doc("b.pdf")]);

        assert_eq!(reopened.records().len(), 2);
        assert_ne!(reopened.records()[0].id(), reopened.records()[1].id());
    }

    #[test]
    fn status_result_invariant_holds() {
        let model = MockModel::new()
            .then_text(FLAGGED)
            .then_text("garbage")
            .then_error(AnalysisError::EmptyResult)
            .then_text(CLEAN);
        let (mut pipeline, _, _, _) = pipeline(model);
        pipeline.process_batch((0..4).map(|i| doc(&format!("{i}.pdf"))).collect());

        for record in pipeline.records() {
            assert!(record.is_consistent_state(), "{record:?}");
            if record.status() == ClaimStatus::Error {
                assert!(record.result().is_none());
            }
        }
        assert_eq!(pipeline.by_status(ClaimStatus::Completed).len(), 2);
        assert_eq!(pipeline.approved().len(), 1);
        assert_eq!(pipeline.flagged().len(), 1);
    }

    #[test]
    fn clear_history_resets_store_and_view() {
        let (mut pipeline, kv, _, resets) = pipeline(MockModel::constant(CLEAN));
        pipeline.process_batch(vec![doc("a.pdf")]);

        pipeline.clear_history();
        assert!(pipeline.records().is_empty());
        assert_eq!(kv.get(STORAGE_KEY).unwrap(), None);
        assert_eq!(*resets.lock().unwrap(), 1);
        assert_eq!(pipeline.stats().total, 0);
    }

    #[test]
    fn storage_failure_does_not_stop_the_batch() {
        let (mut pipeline, kv, _, _) = pipeline(MockModel::constant(CLEAN));
        kv.set_fail_writes(true);
        let report = pipeline.process_batch(vec![doc("a.pdf"), doc("b.pdf")]);
        assert_eq!(report.completed, 2);
        assert!(!pipeline.store().is_synced());
        assert_eq!(kv.get(STORAGE_KEY).unwrap(), None);
    }
}
