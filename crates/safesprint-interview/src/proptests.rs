use proptest::prelude::*;

use safesprint_llm::CompletionError;
use safesprint_storage::ParticipantRepository;
use std::sync::Arc;

use crate::engine::tests::fixture;
use crate::engine::FinalizeOutcome;
use crate::MIN_USER_TURNS;

#[derive(Debug, Clone)]
enum Op {
    Turn,
    FailingTurn,
    Finalize,
    FailingFinalize,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Turn),
        1 => Just(Op::FailingTurn),
        2 => Just(Op::Finalize),
        1 => Just(Op::FailingFinalize),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_completion_flag_is_monotonic(ops in prop::collection::vec(op(), 1..16)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let f = fixture();
            let repo = ParticipantRepository::new(Arc::clone(&f.db));
            let mut user_turns = 0usize;
            let mut expected_summary: Option<String> = None;

            for (i, op) in ops.iter().enumerate() {
                match op {
                    Op::Turn | Op::FailingTurn => {
                        if matches!(op, Op::FailingTurn) && expected_summary.is_none() {
                            f.mock.push_error(CompletionError::Transport("down".into()));
                        }
                        let result = f.engine.send_turn(f.participant.id, "an answer").await;
                        if expected_summary.is_some() {
                            prop_assert!(result.is_err());
                        } else {
                            prop_assert!(result.is_ok());
                            user_turns += 1;
                        }
                    }
                    Op::Finalize | Op::FailingFinalize => {
                        let summary = format!("- friction {}", i);
                        // Only script a reply when the call will reach the service.
                        if expected_summary.is_none() && user_turns >= MIN_USER_TURNS {
                            if matches!(op, Op::FailingFinalize) {
                                f.mock.push_error(CompletionError::EmptyResponse);
                            } else {
                                f.mock.push_reply(summary.clone());
                            }
                        }
                        let result = f.engine.finalize(f.participant.id).await;
                        match (&expected_summary, op) {
                            (Some(_), _) => {
                                prop_assert_eq!(result.unwrap(), FinalizeOutcome::AlreadyCompleted);
                            }
                            (None, Op::Finalize) if user_turns >= MIN_USER_TURNS => {
                                prop_assert!(result.is_ok());
                                expected_summary = Some(summary);
                            }
                            (None, _) => prop_assert!(result.is_err()),
                        }
                    }
                }

                let stored = repo.find_by_id(f.participant.id).unwrap().unwrap();
                prop_assert_eq!(stored.has_completed, expected_summary.is_some());
                prop_assert_eq!(&stored.individual_summary, &expected_summary);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
