//! Per-key history tracking across versions read back through blobs.

mod common;

use common::*;
use fastblob::{
    BlobError, DiffInstruction, HistoryTracker, StateEngine, TransitionKind, TransitionRecord,
    TypeDiffInstruction,
};
use std::sync::Arc;

struct Fixture {
    engine: Arc<StateEngine>,
    tracker: HistoryTracker,
    version: u32,
}

impl Fixture {
    fn new(max_depth: usize) -> Self {
        init_tracing();
        let engine = Arc::new(engine());
        let instruction =
            DiffInstruction::new().with(TypeDiffInstruction::new("TypeA", |a: &TypeA| a.val1));
        let tracker = HistoryTracker::new(max_depth, Arc::clone(&engine), instruction).unwrap();
        Self {
            engine,
            tracker,
            version: 0,
        }
    }

    /// Add the given `val2` for keys 1..=4, round trip a snapshot, then observe it.
    fn advance(&mut self, values: [Option<i32>; 4]) {
        for (key, value) in (1..).zip(values) {
            if let Some(value) = value {
                self.engine.add("TypeA", &TypeA::new(key, value)).unwrap();
            }
        }
        self.version += 1;
        seal(&self.engine, &self.version.to_string());
        let blob = snapshot(&self.engine);
        read_snapshot(&self.engine, &blob);
        self.engine.prepare_for_next_cycle();
        self.tracker.add_state().unwrap();
    }

    fn history(&self, key: i32) -> Vec<TransitionRecord<TypeA>> {
        self.tracker.object_history::<TypeA, i32>("TypeA", &key).unwrap()
    }

    fn pairs(&self, key: i32) -> Vec<(Option<i32>, Option<i32>)> {
        self.history(key)
            .iter()
            .map(|t| (t.before.as_ref().map(|a| a.val2), t.after.as_ref().map(|a| a.val2)))
            .collect()
    }
}

#[test]
fn test_seven_version_scenario() {
    let mut f = Fixture::new(10);
    f.advance([Some(1), None, None, Some(1)]);
    f.advance([Some(2), None, Some(1), Some(1)]);
    f.advance([None, Some(1), Some(1), Some(1)]);
    f.advance([None, Some(1), Some(2), Some(1)]);
    f.advance([Some(3), Some(1), Some(2), Some(1)]);
    f.advance([Some(3), None, Some(2), Some(1)]);
    f.advance([None, None, Some(2), Some(1)]);

    assert_eq!(
        f.pairs(1),
        vec![
            (Some(1), Some(2)),
            (Some(2), None),
            (None, Some(3)),
            (Some(3), Some(3)),
            (Some(3), None),
        ]
    );
    assert_eq!(
        f.pairs(2),
        vec![
            (None, Some(1)),
            (Some(1), Some(1)),
            (Some(1), Some(1)),
            (Some(1), None),
        ]
    );
    assert_eq!(
        f.pairs(3),
        vec![
            (None, Some(1)),
            (Some(1), Some(1)),
            (Some(1), Some(2)),
            (Some(2), Some(2)),
            (Some(2), Some(2)),
            (Some(2), Some(2)),
        ]
    );
    assert_eq!(f.pairs(4), vec![(Some(1), Some(1)); 6]);
}

#[test]
fn test_transitions_carry_version_and_kind() {
    let mut f = Fixture::new(10);
    f.advance([Some(1), None, None, None]);
    f.advance([Some(2), Some(1), None, None]);
    f.advance([None, Some(1), None, None]);

    let history = f.history(1);
    assert_eq!(history[0].version.as_deref(), Some("2"));
    assert_eq!(history[0].kind, TransitionKind::Modified);
    assert_eq!(history[1].version.as_deref(), Some("3"));
    assert_eq!(history[1].kind, TransitionKind::Removed);

    let kinds: Vec<TransitionKind> = f.history(2).iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![TransitionKind::Added, TransitionKind::Unchanged]);
}

#[test]
fn test_depth_bound_over_many_versions() {
    let depth = 3;
    let mut f = Fixture::new(depth);
    for v in 0..10 {
        f.advance([Some(v), Some(0), None, None]);
    }

    let pairs = f.pairs(1);
    assert_eq!(pairs.len(), depth);
    assert_eq!(
        pairs,
        vec![(Some(6), Some(7)), (Some(7), Some(8)), (Some(8), Some(9))]
    );
    assert_eq!(f.history(2).len(), depth);

    let versions: Vec<Option<String>> = f
        .tracker
        .historical_states()
        .map(|s| s.version.clone())
        .collect();
    assert_eq!(
        versions,
        vec![Some("8".into()), Some("9".into()), Some("10".into())]
    );
}

#[test]
fn test_key_in_one_version_only() {
    let mut f = Fixture::new(5);
    f.advance([Some(1), None, None, None]);
    f.advance([Some(1), Some(5), None, None]);
    f.advance([Some(1), None, None, None]);

    assert_eq!(f.pairs(2), vec![(None, Some(5)), (Some(5), None)]);
}

#[test]
fn test_summaries_count_changes() {
    let mut f = Fixture::new(5);
    f.advance([Some(1), Some(1), Some(1), None]);
    f.advance([Some(1), Some(2), None, Some(1)]);

    let state = f.tracker.historical_states().last().unwrap().clone();
    let summary = state.type_summary("TypeA").unwrap();
    assert_eq!(summary.added, 1);
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.modified, 1);
    assert_eq!(summary.unchanged, 1);
}

#[test]
fn test_unknown_key_and_untracked_type() {
    let mut f = Fixture::new(5);
    f.advance([Some(1), None, None, None]);
    f.advance([Some(1), None, None, None]);

    assert!(f.history(99).is_empty());
    assert!(matches!(
        f.tracker.object_history::<Movie, i64>("Movie", &1),
        Err(BlobError::UnknownType(_))
    ));
    assert!(matches!(
        f.tracker.object_history::<TypeA, i64>("TypeA", &1),
        Err(BlobError::ObjectTypeMismatch { .. })
    ));
}

#[test]
fn test_wrong_object_type_fails_without_recording() {
    let engine = Arc::new(engine());
    let instruction =
        DiffInstruction::new().with(TypeDiffInstruction::new("TypeA", |m: &Movie| m.id));
    let mut tracker = HistoryTracker::new(3, Arc::clone(&engine), instruction).unwrap();

    engine.add("TypeA", &TypeA::new(1, 1)).unwrap();
    engine.load_from_current();
    assert!(matches!(
        tracker.add_state(),
        Err(BlobError::ObjectTypeMismatch { .. })
    ));
    assert!(!tracker.is_tracking());
}

#[test]
fn test_duplicate_instruction_rejected() {
    let engine = Arc::new(engine());
    let instruction = DiffInstruction::new()
        .with(TypeDiffInstruction::new("TypeA", |a: &TypeA| a.val1))
        .with(TypeDiffInstruction::new("TypeA", |a: &TypeA| a.val2));
    assert!(matches!(
        HistoryTracker::new(3, engine, instruction),
        Err(BlobError::DuplicateType(_))
    ));
}
