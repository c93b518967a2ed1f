use std::time::SystemTime;

use brief_core::{
    row_control, update, BriefPayload, GenerationRequest, Msg, QueueState, QueueStats, RowControl,
};

fn submit(state: QueueState, id: u64) -> QueueState {
    let (next, _) = update(
        state,
        Msg::Submit {
            request: GenerationRequest::new(id, BriefPayload::default()),
            at: SystemTime::now(),
        },
    );
    next
}

#[test]
fn indicator_hidden_when_nothing_in_flight() {
    let stats = QueueStats::new(0, 0, 3, 1, 2);
    assert_eq!(stats.total, 4);
    assert!(stats.indicator_lines().is_empty());
}

#[test]
fn indicator_lists_non_zero_counters() {
    let stats = QueueStats::new(2, 3, 0, 1, 2);
    assert_eq!(
        stats.indicator_lines(),
        vec![
            "Brief generation".to_string(),
            "running 2/2".to_string(),
            "queued 3".to_string(),
            "failed 1".to_string(),
        ]
    );
}

#[test]
fn row_controls_follow_queue_state() {
    let state = [1, 2, 3].into_iter().fold(QueueState::default(), submit);

    assert_eq!(row_control(&state, 1u64, false), RowControl::Progress);
    assert_eq!(row_control(&state, 1u64, true), RowControl::Progress);
    assert_eq!(
        row_control(&state, "3", false),
        RowControl::Queued { position: 1 }
    );
    assert_eq!(row_control(&state, 9u64, true), RowControl::Generated);
    assert_eq!(row_control(&state, 9u64, false), RowControl::Generate);
}
