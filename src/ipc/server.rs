use anyhow::{Result, anyhow};
use log::{error, info, warn};
use notify::{EventKind, RecursiveMode, Watcher};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::{
    io::{BufRead, BufReader, ErrorKind, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::PathBuf,
    sync::{
        Arc, Mutex,
        mpsc::{self, Sender},
    },
    thread,
    time::Duration,
};

use super::pipeline::{PipelineCtl, PipelineStatus, run_pipeline};
use super::runtime::{pose_socket_path, socket_path};
use handctl::config::{DaemonConfigState, Profile};
use handctl::gestures::GestureEvent;

pub fn run_daemon() -> Result<()> {
    // control socket
    let sock = socket_path()?;
    if sock.exists() {
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());
    let pose_sock = pose_socket_path()?;

    // state
    let mut state = DaemonState::new()?;
    info!("daemon: active profile '{}'", state.cfg.active_name);

    // channels
    let (tx_req, rx_req) = mpsc::channel::<IpcMsg>();
    let (tx_evt, rx_evt) = mpsc::channel::<DaemonEvent>();

    // gesture thread
    let gesture_thread =
        GestureThread::start(state.cfg.profile.clone(), pose_sock.clone(), tx_evt.clone())?;

    // profile edits on disk trigger a reload
    let tx_watch = tx_req.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(ev) if is_profile_edit(&ev) => {
                let _ = tx_watch.send(IpcMsg::Reload);
            }
            Ok(_) => {}
            Err(e) => warn!("profile watcher error: {e}"),
        }
    })?;
    watcher.watch(&state.cfg.profiles_dir, RecursiveMode::NonRecursive)?;

    // SIGINT/SIGTERM -> orderly shutdown
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let tx_sig = tx_req.clone();
    thread::spawn(move || {
        if let Some(sig) = signals.forever().next() {
            info!("daemon: received signal {sig}");
            let _ = tx_sig.send(IpcMsg::Shutdown);
        }
    });

    // accept loop
    listener.set_nonblocking(true)?;
    loop {
        match listener.accept() {
            Ok((stream, _)) => {
                let tx = tx_req.clone();
                let st_snapshot = state.clone_shallow();
                let status = gesture_thread.status.clone();
                thread::spawn(move || {
                    if let Err(e) = handle_client(stream, st_snapshot, status, tx) {
                        error!("ipc client error: {e}");
                    }
                });
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => error!("ipc accept failed: {e}"),
        }

        while let Ok(evt) = rx_evt.try_recv() {
            match evt {
                DaemonEvent::Gesture(g) => {
                    info!("[gesture] {} ({:.2})", g.label.as_str(), g.confidence)
                }
                DaemonEvent::Failed(s) => {
                    error!("gesture pipeline stopped: {s}");
                    let _ = tx_req.send(IpcMsg::Shutdown);
                }
            }
        }

        while let Ok(msg) = rx_req.try_recv() {
            match msg {
                IpcMsg::Reload => {
                    if let Err(e) = state.cfg.reload() {
                        error!("reload failed, keeping last good profile: {e}");
                    } else {
                        gesture_thread.update_profile(state.cfg.profile.clone());
                        info!("profile reloaded");
                    }
                }
                IpcMsg::UseProfile(name) => {
                    if let Err(e) = state.cfg.set_active(&name) {
                        error!("use profile failed: {e}");
                    } else {
                        gesture_thread.update_profile(state.cfg.profile.clone());
                        info!("switched active profile to {}", state.cfg.active_name);
                    }
                }
                IpcMsg::Reset => gesture_thread.send(PipelineCtl::Reset),
                IpcMsg::Shutdown => {
                    info!("daemon: shutting down");
                    drop(watcher);
                    gesture_thread.stop();
                    let _ = std::fs::remove_file(&sock);
                    let _ = std::fs::remove_file(&pose_sock);
                    return Ok(());
                }
            }
        }

        thread::sleep(Duration::from_millis(5));
    }
}

fn is_profile_edit(ev: &notify::Event) -> bool {
    matches!(
        ev.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) && ev
        .paths
        .iter()
        .any(|p| p.extension().is_some_and(|ext| ext == "toml"))
}

fn handle_client(
    mut stream: UnixStream,
    st: DaemonState,
    status: Arc<Mutex<PipelineStatus>>,
    tx_req: Sender<IpcMsg>,
) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");

    let resp = match op {
        "status" => {
            let pipeline = status
                .lock()
                .map(|s| s.clone())
                .map_err(|_| anyhow!("status lock poisoned"))?;
            serde_json::json!({"ok": true, "data": {
                "pid": std::process::id(),
                "active_profile": st.cfg.active_name,
                "socket": socket_path()?,
                "pose_socket": pose_socket_path()?,
                "pipeline": pipeline,
            }})
        }
        "reload" => {
            let _ = tx_req.send(IpcMsg::Reload);
            serde_json::json!({"ok": true, "data": {"active_profile": st.cfg.active_name}})
        }
        "use" => {
            let name = req.get("profile").and_then(|v| v.as_str()).unwrap_or("");
            if st.cfg.list_profiles().iter().any(|p| p == name) {
                let _ = tx_req.send(IpcMsg::UseProfile(name.to_string()));
                serde_json::json!({"ok": true, "data": {"active_profile": name}})
            } else {
                serde_json::json!({"ok": false, "error": format!("no such profile: {name}")})
            }
        }
        "list" => {
            let list = st.cfg.list_profiles();
            serde_json::json!({"ok": true, "data": {"profiles": list, "active": st.cfg.active_name}})
        }
        "doctor" => {
            let mut report = st.cfg.doctor_report();
            report["socket"] = serde_json::json!(socket_path()?);
            report["pose_socket"] = serde_json::json!(pose_socket_path()?);
            serde_json::json!({"ok": true, "data": report})
        }
        "reset" => {
            let _ = tx_req.send(IpcMsg::Reset);
            serde_json::json!({"ok": true, "data": "engine state cleared"})
        }
        "shutdown" => {
            let _ = tx_req.send(IpcMsg::Shutdown);
            serde_json::json!({"ok": true, "data": "shutting down"})
        }
        _ => serde_json::json!({"ok": false, "error": format!("unknown op: {op}")}),
    };

    writeln!(stream, "{resp}")?;
    Ok(())
}

struct DaemonState {
    cfg: DaemonConfigState,
}

impl DaemonState {
    fn new() -> Result<Self> {
        let cfg = DaemonConfigState::load_or_install_default()?;
        Ok(Self { cfg })
    }
    fn clone_shallow(&self) -> Self {
        Self {
            cfg: self.cfg.clone(),
        }
    }
}

enum IpcMsg {
    Reload,
    UseProfile(String),
    Reset,
    Shutdown,
}

pub enum DaemonEvent {
    Gesture(GestureEvent),
    Failed(String),
}

struct GestureThread {
    profile: Arc<Mutex<Profile>>,
    status: Arc<Mutex<PipelineStatus>>,
    tx_ctl: Sender<PipelineCtl>,
    thread: thread::JoinHandle<()>,
}

impl GestureThread {
    fn start(profile: Profile, pose_sock: PathBuf, tx_evt: Sender<DaemonEvent>) -> Result<Self> {
        let profile_arc = Arc::new(Mutex::new(profile));
        let status = Arc::new(Mutex::new(PipelineStatus::default()));
        let (tx_ctl, rx_ctl) = mpsc::channel();

        let prof_clone = profile_arc.clone();
        let status_clone = status.clone();
        let handle = thread::Builder::new()
            .name("handctl-pipeline".into())
            .spawn(move || {
                if let Err(e) =
                    run_pipeline(prof_clone, status_clone, rx_ctl, tx_evt.clone(), &pose_sock)
                {
                    error!("gesture pipeline failed: {e}");
                    let _ = tx_evt.send(DaemonEvent::Failed(e.to_string()));
                }
            })?;
        Ok(Self {
            profile: profile_arc,
            status,
            tx_ctl,
            thread: handle,
        })
    }

    fn update_profile(&self, new_profile: Profile) {
        if let Ok(mut p) = self.profile.lock() {
            *p = new_profile;
        }
    }

    fn send(&self, ctl: PipelineCtl) {
        let _ = self.tx_ctl.send(ctl);
    }

    fn stop(self) {
        self.send(PipelineCtl::Shutdown);
        if self.thread.join().is_err() {
            error!("gesture pipeline panicked");
        }
    }
}

// client helper
pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = socket_path()?;
    if !sock.exists() {
        return Err(anyhow!(
            "handctl daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}
