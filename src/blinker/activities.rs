//! Activity definitions of the turn-signal program.
//!
//! Sensors and actuators reach the activities only through the parameters of
//! [`MAIN`]; constants from [`BlinkerConfig`] are captured by the bodies.

use crate::runtime::builder::{NO_OUTPUTS, activity};
use crate::runtime::{ActivityDefinition, ActivityRegistry, Arg, LeverPos, Result, Scope, Value};

use super::BlinkerConfig;
use super::actuators::{Indicator, LeverVisual, WheelVisual};

/// Waits a number of ticks
pub const DELAY_TICKS: &str = "DelayTicks";
/// Waits a number of seconds
pub const DELAY: &str = "Delay";
/// Flashes one indicator forever
pub const BLINKER: &str = "Blinker";
/// Flashes an indicator while the lever is in a given position
pub const CONDITIONAL_BLINKER: &str = "ConditionalBlinker";
/// Publishes the wheel rotation and moves the wheel visual
pub const WHEEL_POS_MONITOR: &str = "WheelPosMonitor";
/// Applies lever move requests
pub const LEVER_MOVER: &str = "BlinkerLeverMover";
/// Returns the lever to center after enough opposite rotation
pub const LEVER_ROTATION_UPDATER: &str = "BlinkerLeverRotationUpdater";
/// Combines the mover and the rotation updater
pub const LEVER_MONITOR: &str = "BlinkerLeverMonitor";
/// Switches between turn indication and hazard warning
pub const CONTROLLER: &str = "BlinkerController";
/// Entry activity
pub const MAIN: &str = "Main";

/// Entry parameters, in input order.
pub const MAIN_PARAMS: [&str; 7] = [
    "lever_move",
    "warning_pushed",
    "rotation_delta",
    "left_indicator",
    "right_indicator",
    "lever",
    "wheel",
];

/// Entry outputs, in output order.
pub const MAIN_OUTPUTS: [&str; 1] = ["lever_pos"];

/// New rotation accumulator after a tick with `rotation`: same-signed rotation
/// adds up, a change of direction restarts from the new delta.
pub fn update_rotation_sum(rotation: i64, sum: i64) -> i64 {
    if (rotation > 0 && sum < 0) || (rotation < 0 && sum > 0) {
        rotation
    } else {
        rotation + sum
    }
}

/// Build and validate the registry for the turn-signal program.
pub fn registry(config: &BlinkerConfig) -> Result<ActivityRegistry> {
    let mut registry = ActivityRegistry::new();
    registry.register_all(definitions(config))?;
    registry.validate(MAIN)?;
    Ok(registry)
}

/// All activity definitions of the program.
pub fn definitions(config: &BlinkerConfig) -> Vec<ActivityDefinition> {
    vec![
        delay_ticks(),
        delay(config),
        blinker(),
        conditional_blinker(config),
        wheel_pos_monitor(config),
        lever_mover(),
        lever_rotation_updater(config),
        lever_monitor(),
        controller(config),
        main(config),
    ]
}

/// Terminates on the `ticks`-th tick after entry; `ticks <= 0` terminates at once.
fn delay_ticks() -> ActivityDefinition {
    activity(DELAY_TICKS).params(["ticks"]).body(|b| {
        b.exec(|s| {
            let ticks = s.int("ticks")?;
            s.set("counter", ticks);
            Ok(())
        });
        b.if_then(
            |s| Ok(s.int("counter")? > 0),
            |b| {
                b.repeat_until(
                    |b| {
                        b.exec(|s| {
                            let counter = s.int("counter")?;
                            s.set("counter", counter - 1);
                            Ok(())
                        });
                        b.await_tick();
                    },
                    |s| Ok(s.int("counter")? <= 0),
                );
            },
        );
    })
}

fn delay(config: &BlinkerConfig) -> ActivityDefinition {
    let config = config.clone();
    activity(DELAY).params(["secs"]).body(move |b| {
        b.run(
            DELAY_TICKS,
            vec![Arg::expr(move |s| {
                Ok(Value::Integer(config.ticks_for(s.real("secs")?)))
            })],
            NO_OUTPUTS,
        );
    })
}

fn switch(
    indicator: &'static str,
    on: bool,
) -> impl Fn(&mut Scope<'_>) -> Result<()> + Send + Sync + 'static {
    move |s| {
        s.handle::<Indicator>(indicator)?.set_illuminated(on);
        Ok(())
    }
}

fn blinker() -> ActivityDefinition {
    activity(BLINKER)
        .params(["ratio", "indicator"])
        .body(|b| {
            b.repeat(|b| {
                b.exec(switch("indicator", true));
                b.run(
                    DELAY,
                    vec![Arg::expr(|s| Ok(Value::Real(s.ratio("ratio")?.on)))],
                    NO_OUTPUTS,
                );
                b.exec(switch("indicator", false));
                b.run(
                    DELAY,
                    vec![Arg::expr(|s| Ok(Value::Real(s.ratio("ratio")?.off)))],
                    NO_OUTPUTS,
                );
            });
        })
}

fn conditional_blinker(config: &BlinkerConfig) -> ActivityDefinition {
    let ratio = config.turning_ratio;
    activity(CONDITIONAL_BLINKER)
        .params(["pos", "target_pos", "indicator"])
        .body(move |b| {
            b.repeat(move |b| {
                b.await_until(|s| Ok(s.lever("pos")? == s.lever("target_pos")?));
                b.abort_when(
                    |s| Ok(s.lever("pos")? != s.lever("target_pos")?),
                    move |b| {
                        b.run(
                            BLINKER,
                            vec![Arg::constant(ratio), Arg::var("indicator")],
                            NO_OUTPUTS,
                        );
                    },
                );
                b.exec(switch("indicator", false));
            });
        })
}

fn wheel_pos_monitor(config: &BlinkerConfig) -> ActivityDefinition {
    let offset_per_unit = config.wheel_offset_per_unit;
    activity(WHEEL_POS_MONITOR)
        .params(["rotation_delta", "wheel"])
        .outputs(["rotation"])
        .body(move |b| {
            b.always(move |s| {
                let delta = s.int("rotation_delta")?;
                s.set("rotation", delta);
                s.handle::<WheelVisual>("wheel")?
                    .shift(-(delta as f64) * offset_per_unit);
                Ok(())
            });
        })
}

fn lever_mover() -> ActivityDefinition {
    activity(LEVER_MOVER)
        .params(["lever_move", "prev_pos"])
        .outputs(["moved_pos"])
        .body(|b| {
            b.repeat(|b| {
                b.select(|sel| {
                    sel.when(
                        |s| Ok(s.lever("lever_move")? == LeverPos::Up),
                        |b| {
                            b.exec(|s| {
                                let pos = s.lever("prev_pos")?.moved_up();
                                s.set("moved_pos", pos);
                                Ok(())
                            });
                        },
                    )
                    .when(
                        |s| Ok(s.lever("lever_move")? == LeverPos::Down),
                        |b| {
                            b.exec(|s| {
                                let pos = s.lever("prev_pos")?.moved_down();
                                s.set("moved_pos", pos);
                                Ok(())
                            });
                        },
                    )
                    .otherwise(|b| {
                        b.exec(|s| {
                            let pos = s.lever("prev_pos")?;
                            s.set("moved_pos", pos);
                            Ok(())
                        });
                    });
                });
                b.await_tick();
            });
        })
}

fn lever_rotation_updater(config: &BlinkerConfig) -> ActivityDefinition {
    let threshold = config.rotation_threshold;
    activity(LEVER_ROTATION_UPDATER)
        .params(["rotation", "moved_pos"])
        .outputs(["lever_pos"])
        .body(move |b| {
            b.exec(|s| {
                s.set("rotation_sum", 0i64);
                Ok(())
            });
            b.repeat(move |b| {
                b.if_then_else(
                    |s| Ok(s.lever("moved_pos")? != LeverPos::Center),
                    move |b| {
                        b.exec(|s| {
                            let sum = update_rotation_sum(s.int("rotation")?, s.int("rotation_sum")?);
                            s.set("rotation_sum", sum);
                            Ok(())
                        });
                        b.select(move |sel| {
                            sel.when(
                                move |s| {
                                    Ok(s.int("rotation_sum")? >= threshold
                                        && s.lever("moved_pos")? == LeverPos::Up)
                                },
                                |b| {
                                    b.exec(recenter);
                                },
                            )
                            .when(
                                move |s| {
                                    Ok(s.int("rotation_sum")? <= -threshold
                                        && s.lever("moved_pos")? == LeverPos::Down)
                                },
                                |b| {
                                    b.exec(recenter);
                                },
                            )
                            .otherwise(|b| {
                                b.exec(follow_moved);
                            });
                        });
                    },
                    |b| {
                        b.exec(follow_moved);
                    },
                );
                b.await_tick();
            });
        })
}

fn recenter(s: &mut Scope<'_>) -> Result<()> {
    s.set("lever_pos", LeverPos::Center);
    s.set("rotation_sum", 0i64);
    Ok(())
}

fn follow_moved(s: &mut Scope<'_>) -> Result<()> {
    let pos = s.lever("moved_pos")?;
    s.set("lever_pos", pos);
    Ok(())
}

fn lever_monitor() -> ActivityDefinition {
    activity(LEVER_MONITOR)
        .params(["lever_move", "rotation"])
        .outputs(["lever_pos"])
        .body(|b| {
            b.exec(|s| {
                s.set("moved_pos", LeverPos::Center);
                Ok(())
            });
            b.cobegin(|c| {
                c.strong(|b| {
                    b.run(
                        LEVER_MOVER,
                        vec![Arg::var("lever_move"), Arg::var("lever_pos")],
                        ["moved_pos"],
                    );
                })
                .strong(|b| {
                    b.run(
                        LEVER_ROTATION_UPDATER,
                        vec![Arg::var("rotation"), Arg::var("moved_pos")],
                        ["lever_pos"],
                    );
                });
            });
        })
}

fn controller(config: &BlinkerConfig) -> ActivityDefinition {
    let ratio = config.warning_ratio;
    activity(CONTROLLER)
        .params([
            "warning_pushed",
            "lever_pos",
            "left_indicator",
            "right_indicator",
        ])
        .body(move |b| {
            b.repeat(move |b| {
                b.abort_when(
                    |s| s.bool("warning_pushed"),
                    |b| {
                        b.cobegin(|c| {
                            c.strong(|b| {
                                b.run(
                                    CONDITIONAL_BLINKER,
                                    vec![
                                        Arg::var("lever_pos"),
                                        Arg::constant(LeverPos::Up),
                                        Arg::var("right_indicator"),
                                    ],
                                    NO_OUTPUTS,
                                );
                            })
                            .strong(|b| {
                                b.run(
                                    CONDITIONAL_BLINKER,
                                    vec![
                                        Arg::var("lever_pos"),
                                        Arg::constant(LeverPos::Down),
                                        Arg::var("left_indicator"),
                                    ],
                                    NO_OUTPUTS,
                                );
                            });
                        });
                    },
                );
                b.abort_when(
                    |s| s.bool("warning_pushed"),
                    move |b| {
                        b.cobegin(move |c| {
                            c.strong(move |b| {
                                b.run(
                                    BLINKER,
                                    vec![Arg::constant(ratio), Arg::var("left_indicator")],
                                    NO_OUTPUTS,
                                );
                            })
                            .strong(move |b| {
                                b.run(
                                    BLINKER,
                                    vec![Arg::constant(ratio), Arg::var("right_indicator")],
                                    NO_OUTPUTS,
                                );
                            });
                        });
                    },
                );
                b.exec(|s| {
                    s.handle::<Indicator>("left_indicator")?
                        .set_illuminated(false);
                    s.handle::<Indicator>("right_indicator")?
                        .set_illuminated(false);
                    Ok(())
                });
            });
        })
}

fn main(config: &BlinkerConfig) -> ActivityDefinition {
    let deflection = config.lever_deflection;
    activity(MAIN)
        .params(MAIN_PARAMS)
        .outputs(MAIN_OUTPUTS)
        .body(move |b| {
            b.exec(|s| {
                s.set("rotation", 0i64);
                s.set("lever_pos", LeverPos::Center);
                Ok(())
            });
            b.cobegin(move |c| {
                c.strong(|b| {
                    b.run(
                        WHEEL_POS_MONITOR,
                        vec![Arg::var("rotation_delta"), Arg::var("wheel")],
                        ["rotation"],
                    );
                })
                .strong(|b| {
                    b.run(
                        LEVER_MONITOR,
                        vec![Arg::var("lever_move"), Arg::var("rotation")],
                        ["lever_pos"],
                    );
                })
                .strong(|b| {
                    b.run(
                        CONTROLLER,
                        vec![
                            Arg::var("warning_pushed"),
                            Arg::var("lever_pos"),
                            Arg::var("left_indicator"),
                            Arg::var("right_indicator"),
                        ],
                        NO_OUTPUTS,
                    );
                })
                .weak(move |b| {
                    b.always(move |s| {
                        let angle = match s.lever("lever_pos")? {
                            LeverPos::Up => -deflection,
                            LeverPos::Center => 0.0,
                            LeverPos::Down => deflection,
                        };
                        s.handle::<LeverVisual>("lever")?.set_deflection(angle);
                        Ok(())
                    });
                });
            });
        })
}
