use rand::rngs::StdRng;
use rand::SeedableRng;
use srtt::engine::SessionInfo;
use srtt::prelude::*;
use std::sync::Arc;

fn small_config() -> SrttConfig {
    let mut config = SrttConfig::default();
    config.task.blocks = 3;
    config.task.trials_per_block = 10;
    config.task.soa_ms = 0;
    config.session.seed = Some(5);
    config
}

#[tokio::test]
async fn session_logs_every_trial_and_pauses_between_blocks() {
    let clock = Arc::new(ManualClock::new());
    let engine = SrttEngine::with_clock(small_config(), clock.clone()).unwrap();
    let mut events = engine.subscribe_session_events();

    let mut rng = StdRng::seed_from_u64(1);
    let pair = engine.prepare(&mut rng).unwrap();
    let mut log = EmissionLog::new(Vec::new(), &pair).unwrap();
    let mut participant = SimulatedParticipant::new(clock.clone(), 9);

    let summary = engine
        .run_with_log(&mut participant, &mut log, pair, rng, SessionInfo::default())
        .await
        .unwrap();

    assert!(summary.finished);
    assert_eq!(summary.trials, 30);
    assert_eq!(log.records(), 30);

    let text = String::from_utf8(log.into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 31);
    assert!(lines[0].ends_with(&format!("{};{}", summary.regular, summary.irregular)));
    for line in &lines[1..] {
        let fields: Vec<&str> = line.split(';').collect();
        assert_eq!(fields.len(), 9, "line={line}");
        let rt: u64 = fields[2].parse().unwrap();
        assert!(rt >= 360_000, "rt={rt}");
    }

    let mut paused = 0;
    let mut completed = 0;
    let mut finished = false;
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::BlockPaused { .. } => paused += 1,
            SessionEvent::TrialCompleted(_) => completed += 1,
            SessionEvent::SessionFinished { trials } => {
                finished = true;
                assert_eq!(trials, 30);
            }
            _ => {}
        }
    }
    assert_eq!(paused, 2);
    assert_eq!(completed, 30);
    assert!(finished);
}

#[tokio::test]
async fn participant_quitting_keeps_answered_trials() {
    let clock = Arc::new(ManualClock::new());
    let engine = SrttEngine::with_clock(small_config(), clock.clone()).unwrap();
    let mut events = engine.subscribe_session_events();

    let mut rng = StdRng::seed_from_u64(2);
    let pair = engine.prepare(&mut rng).unwrap();
    let mut log = EmissionLog::new(Vec::new(), &pair).unwrap();
    let mut participant = SimulatedParticipant::new(clock, 4).quit_after(13);

    let summary = engine
        .run_with_log(&mut participant, &mut log, pair, rng, SessionInfo::default())
        .await
        .unwrap();

    assert!(!summary.finished);
    assert_eq!(summary.trials, 13);
    assert_eq!(log.records(), 13);

    let mut aborted = false;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::SessionAborted { trials } = event {
            aborted = true;
            assert_eq!(trials, 13);
        }
    }
    assert!(aborted);
}

#[tokio::test]
async fn run_writes_a_result_file() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new());
    let engine = SrttEngine::with_clock(small_config(), clock.clone()).unwrap();
    let mut participant = SimulatedParticipant::new(clock, 6);

    let summary = engine.run(&mut participant, dir.path()).await.unwrap();

    let path = summary.log_path.expect("result file path");
    let text = std::fs::read_to_string(path).unwrap();
    assert_eq!(text.lines().count(), 31);
}

#[tokio::test]
async fn halted_session_still_logs_the_answered_trial() {
    let pair = SequencePair::new(
        CyclicSequence::from_digits(&[0, 1, 2, 3], 4, 2).unwrap(),
        CyclicSequence::from_digits(&[0, 2, 1, 3], 4, 2).unwrap(),
    )
    .unwrap();
    let clock = Arc::new(ManualClock::new());
    let engine = SrttEngine::with_clock(small_config(), clock.clone()).unwrap();

    let mut logged_before_halt = 0;
    for seed in 0..64 {
        let mut log = EmissionLog::new(Vec::new(), &pair).unwrap();
        let mut participant = SimulatedParticipant::new(clock.clone(), seed);
        let err = engine
            .run_with_log(
                &mut participant,
                &mut log,
                pair.clone(),
                StdRng::seed_from_u64(seed),
                SessionInfo::default(),
            )
            .await
            .unwrap_err();
        assert!(
            matches!(
                err.downcast_ref::<SrttError>(),
                Some(SrttError::UnmappedContext { .. })
            ),
            "err={err:#}"
        );
        assert!(log.records() <= 1);
        if log.records() == 1 {
            let text = String::from_utf8(log.into_inner()).unwrap();
            assert_eq!(text.lines().count(), 2);
            logged_before_halt += 1;
        }
    }
    assert!(logged_before_halt > 0);
}

#[test]
fn configured_pair_is_used_when_generation_is_off() {
    let mut config = small_config();
    config.sequences.auto_generate = false;
    config.sequences.randomize_roles = false;
    let engine = SrttEngine::with_clock(config, ManualClock::new()).unwrap();
    let pair = engine.prepare(&mut StdRng::seed_from_u64(0)).unwrap();
    assert_eq!(pair.regular().digits(), "010321302312");
    assert_eq!(pair.irregular().digits(), "203102123013");
}

#[test]
fn invalid_config_is_rejected_at_construction() {
    let mut config = small_config();
    config.task.p_regular = -0.1;
    assert!(SrttEngine::with_clock(config, ManualClock::new()).is_err());
}
