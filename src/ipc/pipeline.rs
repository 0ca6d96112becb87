use anyhow::{Result, anyhow};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::{
    io::{BufRead, BufReader, ErrorKind},
    os::unix::net::{UnixListener, UnixStream},
    path::Path,
    sync::{
        Arc, Mutex,
        mpsc::{Receiver, Sender, TryRecvError},
    },
    thread,
    time::Duration,
};

use super::server::DaemonEvent;
use crate::actions::UinputSink;
use handctl::config::{CursorSettings, Profile};
use handctl::engine::{EngineSnapshot, GestureEngine};
use handctl::frame::{HandFrame, INDEX_TIP};
use handctl::gestures::{GestureEvent, GestureLabel};
use handctl::input::{self, HandObservation};

/// Requests from the control side.
pub enum PipelineCtl {
    Reset,
    Shutdown,
}

/// What `status` reports about the gesture side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStatus {
    pub pose_source_connected: bool,
    pub sessions: u64,
    pub cursor_following: bool,
    pub last_gesture: Option<GestureLabel>,
    pub last_gesture_at_ms: Option<u64>,
    pub engine: Option<EngineSnapshot>,
}

/// Moves the pointer with the index fingertip between `follow_cursor` and `close_cursor`.
#[derive(Debug, Default)]
pub struct CursorFollow {
    active: bool,
    last_tip: Option<(f32, f32)>,
    // sub-pixel remainder carried to the next frame
    residual: (f32, f32),
}

impl CursorFollow {
    pub fn start(&mut self) {
        if !self.active {
            info!("cursor follow on");
        }
        self.active = true;
        self.last_tip = None;
        self.residual = (0.0, 0.0);
    }

    pub fn stop(&mut self) {
        if self.active {
            info!("cursor follow off");
        }
        self.active = false;
        self.last_tip = None;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Pointer delta for this frame. A missing hand breaks the stroke without moving.
    pub fn step(&mut self, frame: Option<&HandFrame>, settings: &CursorSettings) -> (i32, i32) {
        if !self.active {
            return (0, 0);
        }
        let Some(f) = frame.filter(|f| f.is_well_formed()) else {
            self.last_tip = None;
            return (0, 0);
        };
        let tip = (f.at(INDEX_TIP).x, f.at(INDEX_TIP).y);
        let Some(last) = self.last_tip.replace(tip) else {
            return (0, 0);
        };

        let sign_x = if settings.invert_x { -1.0 } else { 1.0 };
        let fx = (tip.0 - last.0) * settings.gain * sign_x + self.residual.0;
        let fy = (tip.1 - last.1) * settings.gain + self.residual.1;
        let (dx, dy) = (fx.trunc(), fy.trunc());
        self.residual = (fx - dx, fy - dy);
        (dx as i32, dy as i32)
    }
}

pub fn run_pipeline(
    profile: Arc<Mutex<Profile>>,
    status: Arc<Mutex<PipelineStatus>>,
    rx_ctl: Receiver<PipelineCtl>,
    tx_evt: Sender<DaemonEvent>,
    pose_sock: &Path,
) -> Result<()> {
    if pose_sock.exists() {
        let _ = std::fs::remove_file(pose_sock);
    }
    let listener = UnixListener::bind(pose_sock)?;
    listener.set_nonblocking(true)?;
    info!("pipeline: waiting for pose source on {}", pose_sock.display());

    let th = lock(&profile)?.thresholds.clone();
    let mut session = Session {
        engine: GestureEngine::new(th),
        sink: UinputSink::new().unwrap_or_else(|e| {
            warn!("uinput unavailable ({e}); gestures will not be emitted");
            UinputSink::noop()
        }),
        cursor: CursorFollow::default(),
        profile,
        status,
        tx_evt,
    };

    loop {
        if session.drain_ctl(&rx_ctl) {
            return Ok(());
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if session.serve(stream, &rx_ctl)? {
                    return Ok(());
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(20));
            }
            Err(e) => {
                error!("pose socket accept failed: {e}");
                thread::sleep(Duration::from_millis(200));
            }
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>> {
    m.lock().map_err(|_| anyhow!("pipeline lock poisoned"))
}

struct Session {
    engine: GestureEngine,
    sink: UinputSink,
    cursor: CursorFollow,
    profile: Arc<Mutex<Profile>>,
    status: Arc<Mutex<PipelineStatus>>,
    tx_evt: Sender<DaemonEvent>,
}

impl Session {
    /// Returns true when asked to shut down.
    fn drain_ctl(&mut self, rx: &Receiver<PipelineCtl>) -> bool {
        loop {
            match rx.try_recv() {
                Ok(PipelineCtl::Reset) => {
                    self.engine.reset();
                    self.cursor.stop();
                    info!("pipeline: engine state reset");
                }
                Ok(PipelineCtl::Shutdown) | Err(TryRecvError::Disconnected) => return true,
                Err(TryRecvError::Empty) => return false,
            }
        }
    }

    /// One pose-source connection is one tracking session.
    fn serve(&mut self, stream: UnixStream, rx: &Receiver<PipelineCtl>) -> Result<bool> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(Duration::from_millis(100)))?;
        self.begin_session();

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        let stop = loop {
            if self.drain_ctl(rx) {
                break true;
            }
            match reader.read_line(&mut line) {
                Ok(0) => break false,
                Ok(_) => {
                    if line.ends_with('\n') {
                        self.handle_line(line.trim());
                        line.clear();
                    }
                }
                // partial data stays in `line` until the newline arrives
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
                Err(e) => {
                    warn!("pose source read failed: {e}");
                    break false;
                }
            }
        };

        self.end_session();
        Ok(stop)
    }

    fn begin_session(&mut self) {
        self.engine.reset();
        if let Ok(mut st) = self.status.lock() {
            st.pose_source_connected = true;
            st.sessions += 1;
        }
        info!("pose source connected");
    }

    fn end_session(&mut self) {
        self.engine.reset();
        self.cursor.stop();
        if let Ok(mut st) = self.status.lock() {
            st.pose_source_connected = false;
            st.cursor_following = false;
            st.engine = Some(self.engine.snapshot());
        }
        info!("pose source disconnected");
    }

    fn handle_line(&mut self, line: &str) {
        if line.is_empty() {
            return;
        }
        let msg = match input::decode_line(line) {
            Ok(m) => m,
            Err(e) => {
                warn!("skipping pose message: {e}");
                return;
            }
        };
        if let HandObservation::Malformed(e) = &msg.hand {
            debug!("malformed hand treated as absent: {e}");
        }

        let (th, cursor_settings) = match self.profile.lock() {
            Ok(p) => (p.thresholds.clone(), p.cursor.clone()),
            Err(_) => {
                error!("profile lock poisoned; dropping frame");
                return;
            }
        };
        self.engine.set_thresholds(th);

        let frame = msg.hand.frame();
        let event = self.engine.classify(frame, msg.timestamp_ms);
        if !event.is_none() {
            self.on_gesture(event, msg.timestamp_ms);
        }

        let (dx, dy) = self.cursor.step(frame, &cursor_settings);
        if let Err(e) = self.sink.move_pointer(dx, dy) {
            error!("pointer move failed: {e}");
        }

        if let Ok(mut st) = self.status.lock() {
            st.cursor_following = self.cursor.is_active();
            st.engine = Some(self.engine.snapshot());
        }
    }

    fn on_gesture(&mut self, event: GestureEvent, at_ms: u64) {
        let _ = self.tx_evt.send(DaemonEvent::Gesture(event));
        if let Err(e) =
            super::dispatch::dispatch_gesture(event.label, &self.profile, &mut self.sink, &mut self.cursor)
        {
            error!("dispatch failed: {e}");
        }
        if let Ok(mut st) = self.status.lock() {
            st.last_gesture = Some(event.label);
            st.last_gesture_at_ms = Some(at_ms);
        }
    }
}
