use std::iter;
use std::time::SystemTime;

use crate::{Effect, JobOutcome, Msg, QueueState, SubmitOutcome};

/// Pure update function: applies a message to state and returns any effects.
///
/// A rejected submission and a stale settle both return no effects.
pub fn update(mut state: QueueState, msg: Msg) -> (QueueState, Vec<Effect>) {
    let effects = match msg {
        Msg::Submit { request, at } => {
            let item_id = request.item_id.clone();
            let position = match state.submit(request) {
                SubmitOutcome::Accepted { position } => position,
                SubmitOutcome::Rejected => return (state, Vec::new()),
            };
            let mut effects = vec![Effect::RenderQueued { item_id, position }];
            admit_ready(&mut state, at, &mut effects);
            effects.push(Effect::StatsChanged(state.stats()));
            effects
        }
        Msg::Settled {
            ticket,
            item_id,
            outcome,
            at,
        } => {
            let Some(settlement) = state.settle(ticket, &item_id, outcome) else {
                return (state, Vec::new());
            };
            // Progress goes first so no stale bar outlives the row update.
            let mut effects = vec![Effect::StopProgress {
                item_id: item_id.clone(),
            }];
            match settlement.outcome {
                JobOutcome::Generated(brief) => {
                    effects.push(Effect::PersistGenerated {
                        item_id: item_id.clone(),
                        brief: brief.clone(),
                    });
                    effects.push(Effect::RenderGenerated { item_id, brief });
                }
                JobOutcome::Failed { message } => {
                    effects.push(Effect::NotifyError {
                        item_id: item_id.clone(),
                        message,
                    });
                    effects.push(Effect::RenderFailed {
                        item_id,
                        retry: settlement.entry.request,
                    });
                }
            }
            admit_ready(&mut state, at, &mut effects);
            effects.push(Effect::StatsChanged(state.stats()));
            effects
        }
        Msg::Cleanup => {
            state.cleanup();
            vec![Effect::StatsChanged(state.stats())]
        }
        Msg::Reset => {
            let dropped = state.reset();
            dropped
                .into_iter()
                .map(|item_id| Effect::StopProgress { item_id })
                .chain(iter::once(Effect::StatsChanged(state.stats())))
                .collect()
        }
    };

    (state, effects)
}

fn admit_ready(state: &mut QueueState, at: SystemTime, effects: &mut Vec<Effect>) {
    while let Some(admission) = state.dispatch_next(at) {
        let item_id = admission.request.item_id.clone();
        effects.push(Effect::RenderGenerating {
            item_id: item_id.clone(),
        });
        effects.push(Effect::StartProgress {
            item_id,
            label: admission.request.label().to_string(),
        });
        effects.push(Effect::CallRemote {
            ticket: admission.ticket,
            request: admission.request,
        });
    }
}
