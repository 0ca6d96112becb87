use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{
    env, fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    process::Command,
};

use crate::ipc;
use handctl::config::{self, Profile};
use handctl::engine::GestureEngine;
use handctl::fingers;
use handctl::input::{self, HandObservation};

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }

    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("start") => {
            let exe = env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("handctl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some(op @ ("stop" | "status" | "reload" | "list" | "doctor" | "reset")) => {
            let op = if op == "stop" { "shutdown" } else { op };
            let r = ipc::client_request(serde_json::json!({ "op": op }))?;
            print_response(&r);
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl use <profile_name>"))?;
            let r = ipc::client_request(serde_json::json!({"op":"use","profile":name}))?;
            print_response(&r);
            Ok(())
        }

        Some("emit") => emit(&mut pargs),

        Some("replay") => {
            let profile: Option<String> = pargs.opt_value_from_str("--profile")?;
            let verbose = pargs.contains("--verbose") || pargs.contains("-v");
            let file: PathBuf = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl replay <file> [--profile <name>] [--verbose]"))?;
            replay(&file, profile.as_deref(), verbose)
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn emit(pargs: &mut Arguments) -> Result<()> {
    // handctl emit click right
    // handctl emit scroll 3 [--horizontal]
    // handctl emit key VOLUMEUP
    let horizontal = pargs.contains("--horizontal");
    let what: String = pargs
        .free_from_str()
        .map_err(|_| anyhow!("usage: handctl emit <click|scroll|key> ..."))?;
    let mut sink = crate::actions::UinputSink::new()?;
    match what.as_str() {
        "click" => {
            let btn: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl emit click <left|right|middle>"))?;
            sink.click_mouse(&btn)?;
            println!("ok: clicked {btn}");
        }
        "scroll" => {
            let steps: i32 = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl emit scroll <steps> [--horizontal]"))?;
            sink.scroll(horizontal, steps)?;
            let axis = if horizontal { "horizontal" } else { "vertical" };
            println!("ok: scrolled {axis} {steps}");
        }
        "key" => {
            let chord: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: handctl emit key ALT+LEFT"))?;
            sink.key_chord(&chord)?;
            println!("ok: sent key chord {chord}");
        }
        other => return Err(anyhow!("unknown emit kind: {other}")),
    }
    Ok(())
}

/// Run a recorded session through a fresh engine. Nothing is sent to uinput.
fn replay(file: &Path, profile_name: Option<&str>, verbose: bool) -> Result<()> {
    let profile = match profile_name {
        Some(name) => config::load_profile(&config::config_dir()?.join("profiles"), name)?,
        None => Profile::parse(config::default_profile_text())?,
    };
    let mut engine = GestureEngine::new(profile.thresholds.clone());

    let f = fs::File::open(file).map_err(|e| anyhow!("cannot open {}: {e}", file.display()))?;
    let mut frames = 0usize;
    let mut skipped = 0usize;
    let mut emitted = 0usize;

    for (lineno, line) in BufReader::new(f).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let msg = match input::decode_line(&line) {
            Ok(m) => m,
            Err(e) => {
                eprintln!("line {}: {e}", lineno + 1);
                skipped += 1;
                continue;
            }
        };
        frames += 1;

        if verbose {
            match &msg.hand {
                HandObservation::Present(fr) => {
                    let p = fingers::poses(fr, engine.thresholds());
                    println!(
                        "{:>8}ms score={:.2} fingers={}",
                        msg.timestamp_ms,
                        fr.hand_score,
                        serde_json::to_string(&p)?
                    );
                }
                HandObservation::Absent => println!("{:>8}ms no hand", msg.timestamp_ms),
                HandObservation::Malformed(e) => {
                    println!("{:>8}ms malformed hand: {e}", msg.timestamp_ms)
                }
            }
        }

        let ev = engine.classify(msg.hand.frame(), msg.timestamp_ms);
        if !ev.is_none() {
            emitted += 1;
            let bound = profile
                .action_for(ev.label)
                .map(|a| format!("{a:?}"))
                .unwrap_or_else(|| "unbound".into());
            println!(
                "{:>8}ms {:<13} conf={:.2} -> {bound}",
                msg.timestamp_ms,
                ev.label.as_str(),
                ev.confidence
            );
        }
    }

    println!("{frames} frames, {emitted} gestures, {skipped} unreadable lines");
    if verbose {
        println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"handctl - hand gesture control daemon

USAGE:
  handctl help [command]                  Show general or command-specific help
  handctl start                           Start the daemon
  handctl stop                            Stop the daemon
  handctl status                          Show daemon and pipeline state
  handctl reload                          Reload active profile
  handctl use <name>                      Switch active profile
  handctl list                            List profiles
  handctl doctor                          Diagnose permissions and sockets
  handctl reset                           Clear gesture engine state
  handctl emit click <left|right|middle>  Emit a mouse click
  handctl emit scroll <steps>             Emit scroll (+/- steps, --horizontal)
  handctl emit key ALT+LEFT               Emit a key or chord
  handctl replay <file>                   Classify a recorded pose session offline

TIPS:
  - Pose source writes JSON lines to ~/.local/run/handctl-pose.sock
  - Profiles: ~/.config/handctl/profiles
  - Active profile pointer: ~/.config/handctl/active
  - Log level: RUST_LOG=debug handctl start
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: handctl start\nStarts the background daemon."),
        "stop" => println!("usage: handctl stop\nStops the running daemon and removes its sockets."),
        "status" => println!(
            "usage: handctl status\nShows active profile, sockets, pose source connection and engine state."
        ),
        "reload" => println!(
            "usage: handctl reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: handctl use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => println!("usage: handctl list\nLists available profiles and the active one."),
        "doctor" => println!(
            "usage: handctl doctor\nChecks uinput permissions and shows socket and profile paths."
        ),
        "reset" => println!(
            "usage: handctl reset\nDrops motion history, pending detections and the cooldown."
        ),
        "emit" => println!(
            "usage:\n  handctl emit click <left|right|middle>\n  handctl emit scroll <steps> [--horizontal]\n  handctl emit key ALT+LEFT"
        ),
        "replay" => println!(
            "usage: handctl replay <file> [--profile <name>] [--verbose]\nRuns a JSON-lines pose recording through a fresh engine and prints confirmed gestures."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
