use anyhow::{Result, anyhow};
use directories::UserDirs;
use log::{info, warn};
use serde::{Deserialize, Deserializer};
use std::{
    collections::{HashMap, HashSet},
    fs,
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::gestures::GestureLabel;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    pub name: Option<String>,
    #[serde(default)]
    pub allow_commands: bool,
}

/// Engine tuning. One instance is handed to the engine at construction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Below this PIP angle a finger counts as curved.
    pub finger_curved_deg: f32,
    /// Above this PIP angle a finger counts as extended.
    pub finger_extended_deg: f32,
    /// Thumb extension uses the MCP angle and a lower bar.
    pub thumb_extended_deg: f32,
    /// Minimum hand score for a frame to be classified at all.
    pub confidence_threshold: f32,
    /// Horizontal palm travel from the swipe anchor needed to call a swipe.
    pub swipe_displacement_threshold: f32,
    /// Minimum instantaneous palm speed (units per second) while swiping.
    pub swipe_velocity_min: f32,
    /// Per-frame palm movement that arms the swipe anchor.
    pub swipe_noise_floor: f32,
    /// Horizontal travel must exceed vertical travel by this factor.
    pub swipe_axis_ratio: f32,
    pub gesture_cooldown_ms: u64,
    pub consecutive_detections_required: u32,
    /// Palm samples retained by the motion tracker.
    pub motion_window: usize,
    /// Palm samples older than this are dropped.
    pub motion_stale_ms: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            finger_curved_deg: 60.0,
            finger_extended_deg: 140.0,
            thumb_extended_deg: 120.0,
            confidence_threshold: 0.8,
            swipe_displacement_threshold: 0.15,
            swipe_velocity_min: 0.5,
            swipe_noise_floor: 0.02,
            swipe_axis_ratio: 1.5,
            gesture_cooldown_ms: 300,
            consecutive_detections_required: 3,
            motion_window: 5,
            motion_stale_ms: 500,
        }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<()> {
        let angles = [
            ("finger_curved_deg", self.finger_curved_deg),
            ("finger_extended_deg", self.finger_extended_deg),
            ("thumb_extended_deg", self.thumb_extended_deg),
        ];
        for (name, v) in angles {
            if !(0.0..=180.0).contains(&v) {
                return Err(anyhow!("thresholds.{name} must be within [0, 180] degrees"));
            }
        }
        if self.finger_curved_deg > self.finger_extended_deg {
            return Err(anyhow!(
                "thresholds.finger_curved_deg must not exceed finger_extended_deg"
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!("thresholds.confidence_threshold must be in [0, 1]"));
        }
        if self.swipe_displacement_threshold <= 0.0 || self.swipe_noise_floor < 0.0 {
            return Err(anyhow!("swipe thresholds must be positive"));
        }
        if self.swipe_velocity_min < 0.0 || self.swipe_axis_ratio < 0.0 {
            return Err(anyhow!("swipe velocity and axis ratio must not be negative"));
        }
        if self.consecutive_detections_required == 0 {
            return Err(anyhow!(
                "thresholds.consecutive_detections_required must be at least 1"
            ));
        }
        if self.motion_window < 2 {
            return Err(anyhow!("thresholds.motion_window must hold at least 2 samples"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CursorSettings {
    /// Pointer pixels per unit of normalized index-tip travel.
    pub gain: f32,
    /// Mirror horizontal motion (front cameras usually show a mirrored image).
    pub invert_x: bool,
}

impl Default for CursorSettings {
    fn default() -> Self {
        Self {
            gain: 1200.0,
            invert_x: true,
        }
    }
}

/// What a binding does once its gesture is confirmed.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Mouse(String),
    Scroll { horizontal: bool, steps: i32 },
    Key(String),
    CursorFollow,
    CursorStop,
    Toggle,
    Command(String),
}

impl FromStr for Action {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "toggle" {
            return Ok(Action::Toggle);
        }
        if let Some(rest) = s.strip_prefix("mouse:") {
            let btn = rest.trim().to_ascii_lowercase();
            return match btn.as_str() {
                "left" | "right" | "middle" => Ok(Action::Mouse(btn)),
                other => Err(anyhow!("unknown mouse button: {other}")),
            };
        }
        if let Some(rest) = s.strip_prefix("scroll:") {
            // scroll:vertical@-3
            let mut parts = rest.split('@');
            let axis = parts.next().map(str::trim).unwrap_or("vertical");
            let steps_str = parts.next().map(str::trim).unwrap_or("+1");
            let steps: i32 = steps_str
                .parse()
                .map_err(|_| anyhow!("invalid scroll steps '{steps_str}'"))?;
            let horizontal = match axis.to_ascii_lowercase().as_str() {
                "vertical" => false,
                "horizontal" => true,
                other => return Err(anyhow!("unknown scroll axis: {other}")),
            };
            return Ok(Action::Scroll { horizontal, steps });
        }
        if let Some(rest) = s.strip_prefix("key:") {
            let chord = rest.trim();
            if chord.is_empty() {
                return Err(anyhow!("empty key chord"));
            }
            return Ok(Action::Key(chord.to_ascii_uppercase()));
        }
        if let Some(rest) = s.strip_prefix("cursor:") {
            return match rest.trim() {
                "follow" => Ok(Action::CursorFollow),
                "stop" => Ok(Action::CursorStop),
                other => Err(anyhow!("unknown cursor action: {other}")),
            };
        }
        if let Some(rest) = s.strip_prefix("cmd:") {
            return Ok(Action::Command(rest.trim().to_string()));
        }
        Err(anyhow!("invalid action '{s}'"))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub cursor: CursorSettings,

    // Accept nested/dotted tables and flatten them into "a.b" -> "value"
    #[serde(default, deserialize_with = "deserialize_bindings_flat")]
    pub bindings: HashMap<String, String>,
}

impl Profile {
    pub fn parse(txt: &str) -> Result<Self> {
        let mut profile: Profile = toml::from_str(txt)?;
        validate_profile(&profile)?;
        // "swipe.left" and "swipe_left" address the same gesture
        profile.bindings = profile
            .bindings
            .into_iter()
            .map(|(k, v)| match GestureLabel::from_name(&k) {
                Some(label) => (label.as_str().to_string(), v),
                None => (k, v),
            })
            .collect();
        Ok(profile)
    }

    /// Parsed action bound to a gesture, if any.
    pub fn action_for(&self, label: GestureLabel) -> Option<Action> {
        let raw = self.bindings.get(label.as_str())?;
        raw.parse().ok()
    }
}

// --------- custom bindings deserializer (tolerant) ----------
fn deserialize_bindings_flat<'de, D>(
    de: D,
) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = toml::Value::deserialize(de)?;
    let table = match val {
        toml::Value::Table(t) => t,
        other => {
            return Err(serde::de::Error::custom(format!(
                "bindings must be a table, got {:?}",
                other.type_str()
            )));
        }
    };

    let mut out = HashMap::new();
    flatten_table("", &table, &mut out).map_err(serde::de::Error::custom)?;
    Ok(out)
}

fn flatten_table(
    prefix: &str,
    table: &toml::value::Table,
    out: &mut HashMap<String, String>,
) -> std::result::Result<(), String> {
    for (k, v) in table {
        let key = if prefix.is_empty() {
            k.clone()
        } else {
            format!("{prefix}.{k}")
        };
        match v {
            toml::Value::String(s) => {
                out.insert(key, s.clone());
            }
            toml::Value::Table(sub) => {
                flatten_table(&key, sub, out)?;
            }
            other => {
                return Err(format!(
                    "binding '{}' value must be a string, got {}",
                    key,
                    other.type_str()
                ));
            }
        }
    }
    Ok(())
}
// ------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DaemonConfigState {
    pub active_name: String,
    pub profile: Profile,
    pub config_dir: PathBuf,
    pub profiles_dir: PathBuf,
    pub active_ptr: PathBuf,
}

pub fn config_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().ok_or_else(|| anyhow!("cannot determine home directory"))?;
    Ok(dirs.home_dir().join(".config").join("handctl"))
}

/// Built-in profile shipped with the binary.
pub fn default_profile_text() -> &'static str {
    include_str!("../profiles/default.toml")
}

impl DaemonConfigState {
    pub fn load_or_install_default() -> Result<Self> {
        Self::load_or_install_default_in(config_dir()?)
    }

    /// Same as [`load_or_install_default`](Self::load_or_install_default) rooted at `cfgdir`.
    pub fn load_or_install_default_in(cfgdir: PathBuf) -> Result<Self> {
        let profdir = cfgdir.join("profiles");
        fs::create_dir_all(&profdir)?;

        let def_path = profdir.join("default.toml");
        if !def_path.exists() {
            fs::write(&def_path, default_profile_text())?;
            info!("installed default profile at {}", def_path.display());
        }

        let active_ptr = cfgdir.join("active");
        if !active_ptr.exists() {
            let mut f = fs::File::create(&active_ptr)?;
            f.write_all(b"default")?;
        }

        let mut active_name = fs::read_to_string(&active_ptr)?.trim().to_string();
        let profile = match load_profile(&profdir, &active_name) {
            Ok(p) => p,
            Err(e) if active_name != "default" => {
                warn!("active profile '{active_name}' unusable ({e}); falling back to default");
                active_name = "default".to_string();
                load_profile(&profdir, &active_name)?
            }
            Err(e) => return Err(e),
        };

        Ok(Self {
            active_name,
            profile,
            config_dir: cfgdir,
            profiles_dir: profdir,
            active_ptr,
        })
    }

    /// Re-read the active profile. On error the last good profile stays in place.
    pub fn reload(&mut self) -> Result<()> {
        self.profile = load_profile(&self.profiles_dir, &self.active_name)?;
        Ok(())
    }

    pub fn set_active(&mut self, name: &str) -> Result<()> {
        let p = self.profiles_dir.join(format!("{name}.toml"));
        if !p.exists() {
            return Err(anyhow!("profile not found: {}", p.display()));
        }
        let profile = load_profile(&self.profiles_dir, name)?;
        fs::write(&self.active_ptr, name.as_bytes())?;
        self.active_name = name.to_string();
        self.profile = profile;
        Ok(())
    }

    pub fn list_profiles(&self) -> Vec<String> {
        let mut v = Vec::new();
        if let Ok(rd) = fs::read_dir(&self.profiles_dir) {
            for e in rd.flatten() {
                let path = e.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                        v.push(stem.to_string());
                    }
                }
            }
        }
        v.sort();
        v
    }

    pub fn doctor_report(&self) -> serde_json::Value {
        let uinput_ok = Path::new("/dev/uinput").exists();
        let in_input_group = check_in_input_group();
        serde_json::json!({
            "uinput_present": uinput_ok,
            "input_group_member": in_input_group,
            "profiles_dir": self.profiles_dir,
            "active_profile": self.active_name,
            "thresholds": {
                "confidence_threshold": self.profile.thresholds.confidence_threshold,
                "gesture_cooldown_ms": self.profile.thresholds.gesture_cooldown_ms,
                "consecutive_detections_required":
                    self.profile.thresholds.consecutive_detections_required,
            },
            "hints": {
                "udev_rule": "/etc/udev/rules.d/80-uinput.rules",
                "add_user_to_input_group": "sudo usermod -aG input $USER && newgrp input"
            }
        })
    }
}

pub fn load_profile(profiles_dir: &Path, name: &str) -> Result<Profile> {
    let path = profiles_dir.join(format!("{name}.toml"));
    let txt = fs::read_to_string(&path)
        .map_err(|e| anyhow!("failed to read {}: {e}", path.display()))?;
    Profile::parse(&txt).map_err(|e| anyhow!("failed to load {}: {e}", path.display()))
}

fn validate_profile(p: &Profile) -> Result<()> {
    p.thresholds.validate()?;
    if !(p.cursor.gain.is_finite() && p.cursor.gain > 0.0) {
        return Err(anyhow!("cursor.gain must be a positive number"));
    }

    let mut seen = HashSet::new();
    for (k, v) in &p.bindings {
        if k.trim().is_empty() {
            return Err(anyhow!("empty binding key"));
        }
        match GestureLabel::from_name(k) {
            Some(GestureLabel::None) | None => {
                return Err(anyhow!("binding '{}' does not name a gesture", k));
            }
            Some(label) => {
                if !seen.insert(label) {
                    return Err(anyhow!("gesture '{}' is bound more than once", label.as_str()));
                }
            }
        }
        if v.trim().is_empty() {
            return Err(anyhow!("binding '{}' has empty action", k));
        }

        let action: Action = v
            .parse()
            .map_err(|e| anyhow!("binding '{}' has invalid action '{}': {e}", k, v))?;
        if matches!(action, Action::Command(_)) && !p.meta.allow_commands {
            return Err(anyhow!(
                "binding '{}' uses cmd: but allow_commands=false",
                k
            ));
        }
    }
    Ok(())
}

fn check_in_input_group() -> bool {
    if let Ok(s) = fs::read_to_string("/etc/group") {
        let user = whoami::username();
        for line in s.lines() {
            if line.starts_with("input:") {
                if line
                    .split(':')
                    .nth(3)
                    .unwrap_or("")
                    .split(',')
                    .any(|u| u == user)
                {
                    return true;
                }
            }
        }
    }
    false
}
