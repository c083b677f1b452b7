//! Engraving session: the step-by-step instruction flow plus the streaming
//! worker that drives the engraver head.
//!
//! The session owns the device handle for its whole lifetime. Connecting is
//! idempotent, a connection failure is a non-fatal warning that leaves the
//! user on the connect step, and a streaming failure is fatal. Teardown
//! cancels the worker by dropping the cancel sender, waits a bounded grace
//! period for it to stop at a frame boundary and then closes the port
//! regardless; the port's close-once guard makes the forced close safe.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

use crate::context::Context;
use crate::plan::{self, Plate};
use crate::platform::EngraverPort;
use crate::protocol::{self, Program, ProtocolError};
use crate::render::Asset;
use crate::validate::ValidationError;
use crate::wallet::mnemonic::Mnemonic;
use crate::wallet::Descriptor;

/// How long teardown waits for the worker before force-closing the port.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Manual preparation; advances on click.
    Prepare,
    /// Connect the device and start engraving; advances on confirm hold.
    Connect,
    /// Streaming in progress; advances itself on completion.
    Engrave,
    /// Terminal step; confirming ends the session.
    Done,
}

/// One step of the instruction flow, with placeholders resolved.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub kind: StepKind,
    pub side: usize,
    pub body: String,
    pub image: Option<Asset>,
}

struct Template {
    kind: StepKind,
    side: usize,
    body: &'static str,
    plate_image: bool,
}

const FIRST_SIDE_ONE: &[Template] = &[
    Template {
        kind: StepKind::Prepare,
        side: 0,
        body: "Unbox a {plate} plate and peel off the protective film.",
        plate_image: true,
    },
    Template {
        kind: StepKind::Prepare,
        side: 0,
        body: "Loosen the four holder screws and insert the plate, side one up.",
        plate_image: false,
    },
    Template {
        kind: StepKind::Prepare,
        side: 0,
        body: "Tighten the screws evenly until the plate cannot shift.",
        plate_image: false,
    },
    Template {
        kind: StepKind::Connect,
        side: 0,
        body: "Connect the engraver, then hold to engrave side one.",
        plate_image: false,
    },
    Template {
        kind: StepKind::Engrave,
        side: 0,
        body: "Engraving side one.",
        plate_image: false,
    },
];

const SIDE_ONE: &[Template] = &[
    Template {
        kind: StepKind::Prepare,
        side: 0,
        body: "Insert a {plate} plate into the holder, side one up, and tighten the screws.",
        plate_image: true,
    },
    Template {
        kind: StepKind::Connect,
        side: 0,
        body: "Connect the engraver, then hold to engrave side one.",
        plate_image: false,
    },
    Template {
        kind: StepKind::Engrave,
        side: 0,
        body: "Engraving side one.",
        plate_image: false,
    },
];

const SIDE_TWO: &[Template] = &[
    Template {
        kind: StepKind::Prepare,
        side: 1,
        body: "Loosen the screws and flip the plate, side two up.",
        plate_image: false,
    },
    Template {
        kind: StepKind::Prepare,
        side: 1,
        body: "Tighten the screws evenly again.",
        plate_image: false,
    },
    Template {
        kind: StepKind::Connect,
        side: 1,
        body: "Hold to engrave side two.",
        plate_image: false,
    },
    Template {
        kind: StepKind::Engrave,
        side: 1,
        body: "Engraving side two.",
        plate_image: false,
    },
];

const DONE: &[Template] = &[Template {
    kind: StepKind::Done,
    side: 0,
    body: "Done. Check the plate, then store it somewhere safe.",
    plate_image: false,
}];

/// A problem surfaced by the session for the screen to display.
#[derive(Debug, Clone)]
pub struct Warning {
    pub title: &'static str,
    pub body: String,
    /// Fatal warnings end the session once dismissed.
    pub fatal: bool,
}

struct Worker {
    /// Dropping this cancels the stream at the next frame boundary.
    cancel: Sender<()>,
    progress: Receiver<f32>,
    result: Receiver<Result<(), ProtocolError>>,
}

pub struct EngraveSession {
    pub plate: Plate,
    /// Key index the seed holds within the descriptor.
    pub share: usize,
    pub shares: usize,
    instructions: Vec<Instruction>,
    step: usize,
    dry_run: bool,
    device: Option<Arc<dyn EngraverPort>>,
    worker: Option<Worker>,
    progress: f32,
    warning: Option<Warning>,
}

impl EngraveSession {
    /// Plan the plate and build the instruction flow. Fails when the seed
    /// does not belong to the descriptor or the backup fits no plate.
    pub fn new(ctx: &Context, desc: &Descriptor, m: &Mnemonic) -> Result<Self, ValidationError> {
        let share = desc
            .key_index(m)
            .ok_or(ValidationError::KeyNotInDescriptor)?;
        let plate = plan::plan(desc, share, m)?;

        let mut templates: Vec<&Template> = Vec::new();
        let first = if ctx.calibrated { SIDE_ONE } else { FIRST_SIDE_ONE };
        templates.extend(first);
        if plate.sides.len() > 1 {
            templates.extend(SIDE_TWO);
        }
        templates.extend(DONE);

        let plate_name = plate.size.name();
        let instructions = templates
            .into_iter()
            .map(|t| Instruction {
                kind: t.kind,
                side: t.side,
                body: t.body.replace("{plate}", plate_name),
                image: t.plate_image.then(|| plate.size.image()),
            })
            .collect();

        Ok(EngraveSession {
            plate,
            share,
            shares: desc.keys.len(),
            instructions,
            step: 0,
            dry_run: false,
            device: None,
            worker: None,
            progress: 0.0,
            warning: None,
        })
    }

    pub fn instruction(&self) -> &Instruction {
        &self.instructions[self.step]
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn steps(&self) -> usize {
        self.instructions.len()
    }

    /// Fraction of the step flow completed, for the top progress bar.
    pub fn step_fraction(&self) -> f32 {
        (self.step + 1) as f32 / self.instructions.len() as f32
    }

    /// Engraving progress of the active worker, 0..=1.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn engraving(&self) -> bool {
        self.worker.is_some()
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Toggle dry-run mode; ignored while the head is running.
    pub fn toggle_dry_run(&mut self) {
        if self.worker.is_none() {
            self.dry_run = !self.dry_run;
            tracing::info!(dry_run = self.dry_run, "engrave: dry-run toggled");
        }
    }

    /// Surface and clear the pending warning.
    pub fn take_warning(&mut self) -> Option<Warning> {
        self.warning.take()
    }

    /// Back is only offered across manual preparation steps.
    pub fn can_back(&self) -> bool {
        self.worker.is_none()
            && self.step > 0
            && self.instructions[self.step - 1].kind == StepKind::Prepare
    }

    pub fn back(&mut self) {
        if self.can_back() {
            self.step -= 1;
        }
    }

    /// Advance past the current step. Returns true when the session is
    /// complete and must be closed by the caller.
    pub fn advance(&mut self, ctx: &Context) -> bool {
        match self.instruction().kind {
            StepKind::Prepare => {
                self.step += 1;
                false
            }
            StepKind::Connect => {
                if self.device.is_none() {
                    match ctx.platform.engraver() {
                        Ok(dev) => self.device = Some(dev),
                        Err(err) => {
                            tracing::warn!("engrave: connection failed: {err}");
                            self.warning = Some(Warning {
                                title: "Connection Error",
                                body: "The engraver is not responding.\n\nCheck the cable and try again.".to_string(),
                                fatal: false,
                            });
                            return false;
                        }
                    }
                }
                self.step += 1;
                if self.instruction().kind == StepKind::Engrave {
                    self.start_worker(ctx);
                }
                false
            }
            StepKind::Engrave => false,
            StepKind::Done => true,
        }
    }

    fn start_worker(&mut self, ctx: &Context) {
        let Some(dev) = self.device.clone() else {
            return;
        };
        let side = self.instruction().side;
        let prog = Program::from_side(&self.plate.sides[side], self.dry_run);
        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let (progress_tx, progress_rx) = bounded::<f32>(1);
        let (result_tx, result_rx) = bounded(1);
        let wakeup = ctx.wakeup();
        tracing::info!(side, dry_run = prog.dry_run, cmds = prog.len(), "engrave: starting");
        std::thread::spawn(move || {
            let result = protocol::engrave(
                &dev,
                &prog,
                |p| {
                    // Latest value wins; a full channel means the consumer
                    // has not caught up with the previous one yet.
                    let _ = progress_tx.try_send(p);
                    wakeup.poke();
                },
                &cancel_rx,
            );
            let _ = result_tx.send(result);
            wakeup.poke();
        });
        self.worker = Some(Worker {
            cancel: cancel_tx,
            progress: progress_rx,
            result: result_rx,
        });
        self.progress = 0.0;
    }

    /// Consume pending worker messages; at most one progress update and one
    /// result per call.
    pub fn poll(&mut self, ctx: &mut Context) {
        let Some(worker) = &self.worker else {
            return;
        };
        if let Ok(p) = worker.progress.try_recv() {
            self.progress = p;
        }
        match worker.result.try_recv() {
            Err(TryRecvError::Empty) => {}
            Ok(Ok(())) => {
                tracing::info!("engrave: side complete");
                self.worker = None;
                self.progress = 1.0;
                ctx.calibrated = true;
                self.step += 1;
            }
            Ok(Err(err)) => {
                tracing::error!("engrave: failed: {err}");
                self.worker = None;
                self.warning = Some(Warning {
                    title: "Engraving Failed",
                    body: format!("The plate is incomplete and must be discarded.\n\n{err}"),
                    fatal: true,
                });
            }
            Err(TryRecvError::Disconnected) => {
                tracing::error!("engrave: worker vanished");
                self.worker = None;
                self.warning = Some(Warning {
                    title: "Engraving Failed",
                    body: "The engraver stopped unexpectedly.".to_string(),
                    fatal: true,
                });
            }
        }
    }

    /// Tear the session down: cancel any active worker, then close the
    /// port. The wait happens off-thread so the frame loop never blocks.
    pub fn close(mut self) {
        let worker = self.worker.take();
        let device = self.device.take();
        if worker.is_none() {
            if let Some(dev) = device {
                dev.close();
            }
            return;
        }
        std::thread::spawn(move || {
            if let Some(w) = worker {
                drop(w.cancel);
                if w.result.recv_timeout(CLOSE_GRACE).is_err() {
                    tracing::warn!("engrave: worker unresponsive, forcing port close");
                }
            }
            if let Some(dev) = device {
                dev.close();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::{Context, Wakeup};
    use crate::testing::TestPlatform;
    use crate::wallet::testdata;
    use std::time::Instant;

    fn ctx() -> (Context, Arc<TestPlatform>, Receiver<()>) {
        let platform = Arc::new(TestPlatform::new());
        let (wakeup, wakeup_rx) = Wakeup::channel();
        let ctx = Context::new(platform.clone(), &Config::default(), wakeup);
        let _ = wakeup_rx.try_recv();
        (ctx, platform, wakeup_rx)
    }

    fn advance_to_connect(session: &mut EngraveSession, ctx: &Context) {
        while session.instruction().kind == StepKind::Prepare {
            assert!(!session.advance(ctx));
        }
        assert_eq!(session.instruction().kind, StepKind::Connect);
    }

    fn wait_side_done(
        session: &mut EngraveSession,
        ctx: &mut Context,
        wakeup_rx: &Receiver<()>,
    ) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while session.engraving() && Instant::now() < deadline {
            let _ = wakeup_rx.recv_timeout(Duration::from_millis(50));
            session.poll(ctx);
        }
        assert!(!session.engraving());
    }

    #[test]
    fn unknown_seed_is_rejected() {
        let (ctx, _, _) = ctx();
        let desc = testdata::multisig(2, 3);
        let m = testdata::mnemonic();
        assert!(matches!(
            EngraveSession::new(&ctx, &desc, &m),
            Err(ValidationError::KeyNotInDescriptor)
        ));
    }

    #[test]
    fn first_run_uses_the_long_instruction_flow() {
        let (mut ctx, _, _) = ctx();
        let m = testdata::mnemonic();
        let desc = Descriptor::singlesig(&m);
        let long = EngraveSession::new(&ctx, &desc, &m).unwrap();
        ctx.calibrated = true;
        let short = EngraveSession::new(&ctx, &desc, &m).unwrap();
        assert!(long.steps() > short.steps());
        assert!(long.instruction().body.contains(long.plate.size.name()));
    }

    #[test]
    fn full_singlesig_run_completes_and_calibrates() {
        let (mut ctx, platform, wakeup_rx) = ctx();
        let m = testdata::mnemonic();
        let desc = Descriptor::singlesig(&m);
        let mut session = EngraveSession::new(&ctx, &desc, &m).unwrap();

        advance_to_connect(&mut session, &ctx);
        assert!(!session.advance(&ctx));
        assert!(session.engraving());
        wait_side_done(&mut session, &mut ctx, &wakeup_rx);

        assert!(ctx.calibrated);
        assert_eq!(session.progress(), 1.0);
        assert_eq!(session.instruction().kind, StepKind::Done);
        assert!(session.take_warning().is_none());
        let sim = platform.engraver_sim();
        assert!(!sim.commands().is_empty());

        assert!(session.advance(&ctx));
        session.close();
        let deadline = Instant::now() + Duration::from_secs(1);
        while !sim.is_closed() && Instant::now() < deadline {
            std::thread::yield_now();
        }
        assert!(sim.is_closed());
    }

    #[test]
    fn connection_failure_is_a_nonfatal_warning() {
        let (ctx, platform, _) = ctx();
        platform.set_engraver_error("no usb device");
        let m = testdata::mnemonic();
        let desc = Descriptor::singlesig(&m);
        let mut session = EngraveSession::new(&ctx, &desc, &m).unwrap();

        advance_to_connect(&mut session, &ctx);
        let step = session.step();
        assert!(!session.advance(&ctx));
        assert_eq!(session.step(), step);
        let warning = session.take_warning().unwrap();
        assert!(!warning.fatal);

        // Retrying after the cable is fixed succeeds.
        platform.clear_engraver_error();
        assert!(!session.advance(&ctx));
        assert!(session.engraving());
        session.close();
    }

    #[test]
    fn rejected_frame_is_fatal() {
        let (mut ctx, platform, wakeup_rx) = ctx();
        platform.engraver_sim().fail_at(1, 0x15);
        let m = testdata::mnemonic();
        let desc = Descriptor::singlesig(&m);
        let mut session = EngraveSession::new(&ctx, &desc, &m).unwrap();

        advance_to_connect(&mut session, &ctx);
        session.advance(&ctx);
        wait_side_done(&mut session, &mut ctx, &wakeup_rx);

        let warning = session.take_warning().unwrap();
        assert!(warning.fatal);
        assert!(!ctx.calibrated);
        session.close();
    }

    #[test]
    fn close_during_engraving_closes_the_port_once() {
        let (ctx, platform, _) = ctx();
        let m = testdata::mnemonic();
        let desc = Descriptor::singlesig(&m);
        let mut session = EngraveSession::new(&ctx, &desc, &m).unwrap();

        advance_to_connect(&mut session, &ctx);
        session.advance(&ctx);
        assert!(session.engraving());
        session.close();

        let sim = platform.engraver_sim();
        let deadline = Instant::now() + Duration::from_secs(6);
        while !sim.is_closed() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(sim.is_closed());
    }

    #[test]
    fn dry_run_reaches_the_device() {
        let (mut ctx, platform, wakeup_rx) = ctx();
        let m = testdata::mnemonic();
        let desc = Descriptor::singlesig(&m);
        let mut session = EngraveSession::new(&ctx, &desc, &m).unwrap();
        session.toggle_dry_run();
        assert!(session.dry_run());

        advance_to_connect(&mut session, &ctx);
        session.advance(&ctx);
        wait_side_done(&mut session, &mut ctx, &wakeup_rx);
        assert!(platform
            .engraver_sim()
            .commands()
            .iter()
            .all(|(_, dry)| *dry));
        session.close();
    }

    #[test]
    fn back_is_limited_to_preparation_steps() {
        let (ctx, _, _) = ctx();
        let m = testdata::mnemonic();
        let desc = Descriptor::singlesig(&m);
        let mut session = EngraveSession::new(&ctx, &desc, &m).unwrap();
        assert!(!session.can_back());
        session.advance(&ctx);
        assert!(session.can_back());
        session.back();
        assert_eq!(session.step(), 0);
    }

    #[test]
    fn multisig_share_flows_both_sides() {
        let (mut ctx, _, wakeup_rx) = ctx();
        ctx.calibrated = true;
        let (desc, m) = testdata::multisig_with_share(2, 3);
        let mut session = EngraveSession::new(&ctx, &desc, &m).unwrap();
        assert_eq!(session.share, 0);
        assert_eq!(session.shares, 3);
        assert_eq!(session.plate.sides.len(), 2);

        advance_to_connect(&mut session, &ctx);
        session.advance(&ctx);
        wait_side_done(&mut session, &mut ctx, &wakeup_rx);

        // Side two: device handle persists, connect is idempotent.
        advance_to_connect(&mut session, &ctx);
        session.advance(&ctx);
        assert!(session.engraving());
        wait_side_done(&mut session, &mut ctx, &wakeup_rx);
        assert_eq!(session.instruction().kind, StepKind::Done);
        assert!(session.advance(&ctx));
        session.close();
    }
}
