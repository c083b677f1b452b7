//! Engraver wire protocol.
//!
//! The head speaks a fixed eight-byte command frame and answers every frame
//! with a single status byte. [`engrave`] streams a [`Program`] over an
//! [`EngraverPort`], reporting progress through a callback and stopping at
//! the next frame boundary once the cancel channel disconnects.

use std::io;
use std::sync::Arc;

use crossbeam_channel::{Receiver, TryRecvError};
use thiserror::Error;

use crate::plan::SidePlan;
use crate::platform::EngraverPort;

/// Command frame length on the wire.
pub const FRAME_LEN: usize = 8;

/// Status byte acknowledging a frame.
pub const ACK: u8 = 0x06;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmd {
    /// Raise the head and move.
    Move { x: u16, y: u16 },
    /// Lower the head and cut to the given point.
    Cut { x: u16, y: u16 },
}

impl Cmd {
    fn encode(self, dry_run: bool) -> [u8; FRAME_LEN] {
        let (op, x, y) = match self {
            Cmd::Move { x, y } => (0x01, x, y),
            Cmd::Cut { x, y } => (0x02, x, y),
        };
        let flags = if dry_run { 0x01 } else { 0x00 };
        let [xh, xl] = x.to_be_bytes();
        let [yh, yl] = y.to_be_bytes();
        let mut frame = [0u8; FRAME_LEN];
        frame[0] = 0xA5;
        frame[1] = op;
        frame[2] = flags;
        frame[3] = xh;
        frame[4] = xl;
        frame[5] = yh;
        frame[6] = yl;
        frame[7] = checksum(&frame[..7]);
        frame
    }

    /// Inverse of `encode`, used by the simulator.
    pub fn decode(frame: &[u8]) -> Option<(Cmd, bool)> {
        if frame.len() != FRAME_LEN || frame[0] != 0xA5 {
            return None;
        }
        if checksum(&frame[..7]) != frame[7] {
            return None;
        }
        let x = u16::from_be_bytes([frame[3], frame[4]]);
        let y = u16::from_be_bytes([frame[5], frame[6]]);
        let dry_run = frame[2] & 0x01 != 0;
        let cmd = match frame[1] {
            0x01 => Cmd::Move { x, y },
            0x02 => Cmd::Cut { x, y },
            _ => return None,
        };
        Some((cmd, dry_run))
    }
}

fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// A complete command stream for one plate side.
#[derive(Debug, Clone)]
pub struct Program {
    pub dry_run: bool,
    cmds: Vec<Cmd>,
}

impl Program {
    /// Move to the start of each stroke, then cut along it.
    pub fn from_side(side: &SidePlan, dry_run: bool) -> Program {
        let mut cmds = Vec::new();
        for stroke in &side.strokes {
            let mut points = stroke.points.iter();
            if let Some((x, y)) = points.next() {
                cmds.push(Cmd::Move { x: *x, y: *y });
            }
            for (x, y) in points {
                cmds.push(Cmd::Cut { x: *x, y: *y });
            }
        }
        Program { dry_run, cmds }
    }

    pub fn len(&self) -> usize {
        self.cmds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("engraver I/O: {0}")]
    Io(#[from] io::Error),
    #[error("engraver rejected command {index} with status {status:#04x}")]
    Rejected { index: usize, status: u8 },
    #[error("engraver closed the connection")]
    Disconnected,
}

/// Stream `prog` to the engraver.
///
/// `on_progress` is called with the completed fraction after every
/// acknowledged frame. The caller signals cancellation by dropping the
/// sender side of `cancel`; the stream then stops at the next frame
/// boundary and returns `Ok`, leaving the head raised wherever it was.
pub fn engrave(
    dev: &Arc<dyn EngraverPort>,
    prog: &Program,
    mut on_progress: impl FnMut(f32),
    cancel: &Receiver<()>,
) -> Result<(), ProtocolError> {
    let total = prog.cmds.len();
    for (index, cmd) in prog.cmds.iter().enumerate() {
        match cancel.try_recv() {
            Err(TryRecvError::Disconnected) => return Ok(()),
            Ok(()) | Err(TryRecvError::Empty) => {}
        }
        dev.send(&cmd.encode(prog.dry_run))?;
        let mut status = [0u8; 1];
        let n = dev.recv(&mut status)?;
        if n == 0 {
            return Err(ProtocolError::Disconnected);
        }
        if status[0] != ACK {
            return Err(ProtocolError::Rejected {
                index,
                status: status[0],
            });
        }
        on_progress((index + 1) as f32 / total as f32);
    }
    Ok(())
}

/// In-memory engraver used by the simulator platform and by tests. Records
/// every decoded command and acknowledges each frame, with an optional
/// scripted failure.
pub struct Simulator {
    state: std::sync::Mutex<SimState>,
    closed: crate::platform::CloseFlag,
}

struct SimState {
    cmds: Vec<(Cmd, bool)>,
    pending_acks: usize,
    /// Fail frame number `n` (0-based) with this status byte.
    fail_at: Option<(usize, u8)>,
    sent: usize,
}

impl Simulator {
    pub fn new() -> Self {
        Simulator {
            state: std::sync::Mutex::new(SimState {
                cmds: Vec::new(),
                pending_acks: 0,
                fail_at: None,
                sent: 0,
            }),
            closed: crate::platform::CloseFlag::default(),
        }
    }

    /// Reject the `n`th frame with `status`.
    pub fn fail_at(&self, n: usize, status: u8) {
        self.state.lock().unwrap().fail_at = Some((n, status));
    }

    /// Commands received so far, with their dry-run flags.
    pub fn commands(&self) -> Vec<(Cmd, bool)> {
        self.state.lock().unwrap().cmds.clone()
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Simulator::new()
    }
}

impl EngraverPort for Simulator {
    fn send(&self, buf: &[u8]) -> io::Result<()> {
        if self.closed.is_closed() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "port closed"));
        }
        let mut state = self.state.lock().unwrap();
        let (cmd, dry_run) = Cmd::decode(buf)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "bad frame"))?;
        state.cmds.push((cmd, dry_run));
        state.sent += 1;
        state.pending_acks += 1;
        Ok(())
    }

    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed.is_closed() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "port closed"));
        }
        let mut state = self.state.lock().unwrap();
        if state.pending_acks == 0 || buf.is_empty() {
            return Ok(0);
        }
        state.pending_acks -= 1;
        let frame_no = state.sent - state.pending_acks - 1;
        buf[0] = match state.fail_at {
            Some((n, status)) if n == frame_no => status,
            _ => ACK,
        };
        Ok(1)
    }

    fn close(&self) {
        self.closed.close();
    }

    fn is_closed(&self) -> bool {
        self.closed.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Stroke;
    use crossbeam_channel::bounded;

    fn side() -> SidePlan {
        SidePlan {
            strokes: vec![
                Stroke {
                    points: vec![(0, 0), (3, 4), (7, 11)],
                },
                Stroke {
                    points: vec![(8, 0), (12, 9)],
                },
            ],
        }
    }

    #[test]
    fn frames_round_trip() {
        for cmd in [Cmd::Move { x: 513, y: 7 }, Cmd::Cut { x: 0, y: 65535 }] {
            for dry_run in [false, true] {
                let frame = cmd.encode(dry_run);
                assert_eq!(Cmd::decode(&frame), Some((cmd, dry_run)));
            }
        }
        assert_eq!(Cmd::decode(&[0u8; FRAME_LEN]), None);
    }

    #[test]
    fn program_moves_then_cuts_each_stroke() {
        let prog = Program::from_side(&side(), false);
        assert_eq!(prog.len(), 5);
        assert!(matches!(prog.cmds[0], Cmd::Move { .. }));
        assert!(matches!(prog.cmds[1], Cmd::Cut { .. }));
        assert!(matches!(prog.cmds[3], Cmd::Move { .. }));
    }

    #[test]
    fn engrave_streams_and_reports_progress() {
        let sim: Arc<dyn EngraverPort> = Arc::new(Simulator::new());
        let prog = Program::from_side(&side(), true);
        let (_keep, cancel) = bounded::<()>(1);
        let mut seen = Vec::new();
        engrave(&sim, &prog, |p| seen.push(p), &cancel).unwrap();
        assert_eq!(seen.len(), 5);
        assert_eq!(*seen.last().unwrap(), 1.0);
        // Progress strictly increases.
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn dry_run_flag_reaches_the_device() {
        let sim = Arc::new(Simulator::new());
        let port: Arc<dyn EngraverPort> = sim.clone();
        let prog = Program::from_side(&side(), true);
        let (_keep, cancel) = bounded::<()>(1);
        engrave(&port, &prog, |_| {}, &cancel).unwrap();
        assert!(sim.commands().iter().all(|(_, dry)| *dry));
    }

    #[test]
    fn rejected_frame_surfaces_as_error() {
        let sim = Arc::new(Simulator::new());
        sim.fail_at(2, 0x15);
        let port: Arc<dyn EngraverPort> = sim.clone();
        let prog = Program::from_side(&side(), false);
        let (_keep, cancel) = bounded::<()>(1);
        let err = engrave(&port, &prog, |_| {}, &cancel).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Rejected {
                index: 2,
                status: 0x15
            }
        ));
    }

    #[test]
    fn dropped_cancel_sender_stops_the_stream() {
        let sim = Arc::new(Simulator::new());
        let port: Arc<dyn EngraverPort> = sim.clone();
        let prog = Program::from_side(&side(), false);
        let (keep, cancel) = bounded::<()>(1);
        drop(keep);
        engrave(&port, &prog, |_| {}, &cancel).unwrap();
        assert!(sim.commands().is_empty());
    }

    #[test]
    fn closed_port_turns_into_io_error() {
        let sim = Arc::new(Simulator::new());
        let port: Arc<dyn EngraverPort> = sim.clone();
        port.close();
        let prog = Program::from_side(&side(), false);
        let (_keep, cancel) = bounded::<()>(1);
        assert!(matches!(
            engrave(&port, &prog, |_| {}, &cancel),
            Err(ProtocolError::Io(_))
        ));
    }
}
