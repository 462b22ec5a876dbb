use proptest::prelude::*;
use tickwork::blinker::{BlinkerConfig, BlinkerHost, FaultPolicy, FrameReport, HostEvent, ScriptStep};
use tickwork::runtime::{LeverPos, ProcessorConfig, ProcessorStatus, SchedulerError};

fn host() -> BlinkerHost {
    BlinkerHost::new(BlinkerConfig::default()).unwrap()
}

fn frame(host: &mut BlinkerHost, events: &[HostEvent]) -> FrameReport {
    for event in events {
        host.apply(*event);
    }
    host.update().unwrap()
}

fn idle(host: &mut BlinkerHost, frames: u32) -> Vec<FrameReport> {
    host.run_step(&ScriptStep {
        events: Vec::new(),
        frames,
    })
    .unwrap()
}

#[test]
fn starts_centered_and_dark() {
    let mut host = host();
    let report = frame(&mut host, &[]);
    assert_eq!(report.tick, 1);
    assert_eq!(report.lever_pos, LeverPos::Center);
    assert!(!report.left_lit && !report.right_lit);
    assert_eq!(report.lever_angle, 0.0);
    assert_eq!(report.wheel_offset, 0.0);
}

#[test]
fn right_indicator_flashes_with_turning_ratio() {
    let mut host = host();
    let first = frame(&mut host, &[HostEvent::LeverUp]);
    assert_eq!(first.lever_pos, LeverPos::Up);
    assert_eq!(first.lever_angle, -0.1);
    assert!(!first.right_lit);

    // Ticks 2..=60
    let reports = idle(&mut host, 59);
    let lit: Vec<bool> = reports.iter().map(|r| r.right_lit).collect();
    assert!(lit[..24].iter().all(|&on| on), "on for 24 ticks");
    assert!(lit[24..54].iter().all(|&on| !on), "off for 30 ticks");
    assert!(lit[54]);
    assert!(reports.iter().all(|r| !r.left_lit));
}

#[test]
fn lever_down_flashes_left() {
    let mut host = host();
    let first = frame(&mut host, &[HostEvent::LeverDown]);
    assert_eq!(first.lever_pos, LeverPos::Down);
    assert_eq!(first.lever_angle, 0.1);

    let second = frame(&mut host, &[]);
    assert!(second.left_lit);
    assert!(!second.right_lit);
}

#[test]
fn lever_steps_one_position_per_move() {
    let mut host = host();
    frame(&mut host, &[HostEvent::LeverUp]);
    assert_eq!(frame(&mut host, &[HostEvent::LeverUp]).lever_pos, LeverPos::Up);
    assert_eq!(frame(&mut host, &[HostEvent::LeverDown]).lever_pos, LeverPos::Center);
    assert_eq!(frame(&mut host, &[HostEvent::LeverDown]).lever_pos, LeverPos::Down);
    assert_eq!(frame(&mut host, &[HostEvent::LeverDown]).lever_pos, LeverPos::Down);
}

#[test]
fn opposite_rotation_returns_lever_to_center() {
    let mut host = host();
    frame(&mut host, &[HostEvent::LeverUp]);

    let ccw = [HostEvent::RotateCounterClockwise];
    assert_eq!(frame(&mut host, &ccw).lever_pos, LeverPos::Up);
    let third = frame(&mut host, &ccw);
    assert_eq!(third.lever_pos, LeverPos::Up);
    assert!(third.right_lit);

    let fourth = frame(&mut host, &ccw);
    assert_eq!(fourth.lever_pos, LeverPos::Center);
    assert_eq!(fourth.lever_angle, 0.0);
    assert!(!fourth.right_lit);
    assert_eq!(fourth.wheel_offset, -15.0);

    // Stays centered without further input.
    let later = idle(&mut host, 40);
    assert!(later.iter().all(|r| r.lever_pos == LeverPos::Center));
    assert!(later.iter().all(|r| !r.right_lit && !r.left_lit));
}

#[test]
fn recentering_clears_the_rotation_sum() {
    let mut host = host();
    let ccw = [HostEvent::RotateCounterClockwise];
    frame(&mut host, &[HostEvent::LeverUp]);
    for _ in 0..2 {
        frame(&mut host, &ccw);
    }
    assert_eq!(frame(&mut host, &ccw).lever_pos, LeverPos::Center);

    // A fresh deflection needs the full threshold again.
    assert_eq!(frame(&mut host, &[HostEvent::LeverUp]).lever_pos, LeverPos::Up);
    assert_eq!(frame(&mut host, &ccw).lever_pos, LeverPos::Up);
    assert_eq!(frame(&mut host, &ccw).lever_pos, LeverPos::Up);
    assert_eq!(frame(&mut host, &ccw).lever_pos, LeverPos::Center);
}

#[test]
fn direction_change_restarts_rotation_sum() {
    let mut host = host();
    frame(&mut host, &[HostEvent::LeverUp]);

    let cw = [HostEvent::RotateClockwise];
    let ccw = [HostEvent::RotateCounterClockwise];
    frame(&mut host, &cw);
    frame(&mut host, &cw);
    assert_eq!(frame(&mut host, &ccw).lever_pos, LeverPos::Up);
    assert_eq!(frame(&mut host, &ccw).lever_pos, LeverPos::Up);
    assert_eq!(frame(&mut host, &ccw).lever_pos, LeverPos::Center);
}

#[test]
fn lever_down_centers_after_clockwise_rotation() {
    let mut host = host();
    frame(&mut host, &[HostEvent::LeverDown]);

    let cw = [HostEvent::RotateClockwise];
    frame(&mut host, &cw);
    frame(&mut host, &cw);
    let report = frame(&mut host, &cw);
    assert_eq!(report.lever_pos, LeverPos::Center);
    assert_eq!(report.wheel_offset, 15.0);
    assert!(!report.left_lit);
}

#[test]
fn hazard_button_toggles_both_indicators() {
    let mut host = host();
    frame(&mut host, &[]);

    let on = frame(&mut host, &[HostEvent::Warning]);
    assert!(on.left_lit && on.right_lit);

    // Tick 3..=38: lit through tick 37, dark from tick 38.
    let reports = idle(&mut host, 36);
    assert!(reports[..35].iter().all(|r| r.left_lit && r.right_lit));
    assert!(!reports[35].left_lit && !reports[35].right_lit);

    let off = frame(&mut host, &[HostEvent::Warning]);
    assert!(!off.left_lit && !off.right_lit);
    let after = idle(&mut host, 50);
    assert!(after.iter().all(|r| !r.left_lit && !r.right_lit));
}

#[test]
fn hazard_interrupts_turn_indication() {
    let mut host = host();
    frame(&mut host, &[HostEvent::LeverUp]);
    let turning = frame(&mut host, &[]);
    assert!(turning.right_lit && !turning.left_lit);

    let hazard = frame(&mut host, &[HostEvent::Warning]);
    assert!(hazard.right_lit && hazard.left_lit);

    let back = frame(&mut host, &[HostEvent::Warning]);
    assert!(!back.right_lit && !back.left_lit);
    // The lever is still up, so turn indication resumes on the next tick.
    let resumed = frame(&mut host, &[]);
    assert!(resumed.right_lit && !resumed.left_lit);
}

#[test]
fn wheel_visual_follows_rotation() {
    let mut host = host();
    frame(&mut host, &[HostEvent::RotateCounterClockwise]);
    let report = frame(&mut host, &[HostEvent::RotateCounterClockwise]);
    assert_eq!(report.wheel_offset, -10.0);
    let report = frame(&mut host, &[HostEvent::RotateClockwise]);
    assert_eq!(report.wheel_offset, -5.0);
    assert_eq!(report.lever_pos, LeverPos::Center);
}

#[test]
fn edge_inputs_reset_after_each_frame() {
    let mut host = host();
    host.apply(HostEvent::Warning);
    host.apply(HostEvent::LeverUp);
    assert!(host.sensors().warning_pushed);
    host.update().unwrap();
    assert_eq!(host.sensors().lever_move, LeverPos::Center);
    assert!(!host.sensors().warning_pushed);
    assert_eq!(host.sensors().rotation, 0);
}

#[test]
fn script_steps_parse_from_json() {
    let script: Vec<ScriptStep> =
        serde_json::from_str(r#"[{"events": ["lever_up", "rotate_clockwise"], "frames": 3}, {}]"#)
            .unwrap();
    assert_eq!(
        script[0].events,
        vec![HostEvent::LeverUp, HostEvent::RotateClockwise]
    );
    assert_eq!(script[1].frames, 1);

    let mut host = host();
    let reports: Vec<FrameReport> = script
        .iter()
        .flat_map(|step| host.run_step(step).unwrap())
        .collect();
    assert_eq!(reports.len(), 4);
    assert_eq!(reports[3].tick, 4);
}

#[test]
fn halt_policy_leaves_program_faulted() {
    let tiny = ProcessorConfig {
        max_steps_per_tick: 5,
        ..ProcessorConfig::default()
    };
    let mut host = BlinkerHost::with_processor_config(BlinkerConfig::default(), tiny).unwrap();

    let err = host.update().unwrap_err();
    assert!(matches!(err, SchedulerError::StepBudgetExceeded { budget: 5, .. }));
    assert_eq!(host.processor().status(), ProcessorStatus::Faulted);
    assert!(matches!(host.update().unwrap_err(), SchedulerError::Faulted));
}

#[test]
fn restart_policy_resets_after_fault() {
    let tiny = ProcessorConfig {
        max_steps_per_tick: 5,
        ..ProcessorConfig::default()
    };
    let mut host = BlinkerHost::with_processor_config(BlinkerConfig::default(), tiny)
        .unwrap()
        .with_fault_policy(FaultPolicy::Restart);

    let err = host.update().unwrap_err();
    assert!(matches!(err, SchedulerError::StepBudgetExceeded { .. }));
    assert_eq!(host.processor().status(), ProcessorStatus::Running);
    assert_eq!(host.processor().ticks(), 0);
    assert_eq!(host.lever_pos().unwrap(), LeverPos::Center);
}

fn event_for(code: u8) -> Option<HostEvent> {
    match code {
        0 => Some(HostEvent::LeverUp),
        1 => Some(HostEvent::LeverDown),
        2 => Some(HostEvent::Warning),
        3 => Some(HostEvent::RotateCounterClockwise),
        4 => Some(HostEvent::RotateClockwise),
        _ => None,
    }
}

proptest! {
    #[test]
    fn identical_inputs_give_identical_runs(codes in proptest::collection::vec(0u8..10, 1..150)) {
        let mut first = host();
        let mut second = host();

        for code in codes {
            if let Some(event) = event_for(code) {
                first.apply(event);
                second.apply(event);
            }
            let a = first.update().unwrap();
            let b = second.update().unwrap();
            prop_assert_eq!(&a, &b);

            let expected_angle = match a.lever_pos {
                LeverPos::Up => -0.1,
                LeverPos::Center => 0.0,
                LeverPos::Down => 0.1,
            };
            prop_assert_eq!(a.lever_angle, expected_angle);
        }
        prop_assert_eq!(first.processor().snapshot(), second.processor().snapshot());
    }
}
