use anyhow::{Result, anyhow};
use log::{debug, info, warn};
use std::{
    process::{Command, Stdio},
    sync::{Arc, Mutex},
};

use super::pipeline::CursorFollow;
use crate::actions::UinputSink;
use handctl::config::{Action, Profile};
use handctl::gestures::GestureLabel;

/// Run whatever the active profile binds to `g`. Unbound gestures are ignored.
pub fn dispatch_gesture(
    g: GestureLabel,
    profile_arc: &Arc<Mutex<Profile>>,
    sink: &mut UinputSink,
    cursor: &mut CursorFollow,
) -> Result<()> {
    let (action, allow_commands) = {
        let p = profile_arc
            .lock()
            .map_err(|_| anyhow!("profile lock poisoned"))?;
        (p.action_for(g), p.meta.allow_commands)
    };

    let Some(action) = action else {
        debug!("no binding for {}", g.as_str());
        return Ok(());
    };
    let ran = apply_action(&action, allow_commands, sink, cursor)
        .map_err(|e| anyhow!("{} -> {:?}: {e}", g.as_str(), action))?;
    if !ran {
        debug!("{} -> {:?} dropped", g.as_str(), action);
    }
    Ok(())
}

/// Returns false when the action was swallowed: output disabled, or a command binding
/// without `allow_commands`.
pub fn apply_action(
    action: &Action,
    allow_commands: bool,
    sink: &mut UinputSink,
    cursor: &mut CursorFollow,
) -> Result<bool> {
    match action {
        Action::Toggle => {
            let en = !sink.is_enabled();
            sink.set_enabled(en);
            if !en {
                cursor.stop();
            }
            info!("output {}", if en { "enabled" } else { "disabled" });
        }
        // everything below is output; a disabled sink swallows it
        _ if !sink.is_enabled() => return Ok(false),
        Action::Mouse(btn) => sink.click_mouse(btn)?,
        Action::Scroll { horizontal, steps } => sink.scroll(*horizontal, *steps)?,
        Action::Key(chord) => sink.key_chord(chord)?,
        Action::CursorFollow => cursor.start(),
        Action::CursorStop => cursor.stop(),
        Action::Command(cmd) => {
            if !allow_commands {
                warn!("cmd binding ignored: allow_commands=false");
                return Ok(false);
            }
            Command::new("sh")
                .arg("-c")
                .arg(cmd)
                .stdin(Stdio::null())
                .spawn()?;
        }
    }
    Ok(true)
}
