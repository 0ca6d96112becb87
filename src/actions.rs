use anyhow::{Result, anyhow};
use log::{info, warn};

/// Virtual input device. Without uinput access it still accepts every call and does nothing.
pub struct UinputSink {
    enabled: bool,
    #[allow(dead_code)]
    dev: Option<Box<VirtualDevice>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Left,
    Right,
    Middle,
}

impl std::str::FromStr for Button {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Button::Left),
            "right" => Ok(Button::Right),
            "middle" => Ok(Button::Middle),
            other => Err(anyhow!("unknown mouse button: {other}")),
        }
    }
}

impl UinputSink {
    pub fn new() -> Result<Self> {
        #[cfg(target_os = "linux")]
        {
            let dev = VirtualDevice::create()?;
            return Ok(Self {
                enabled: true,
                dev: Some(Box::new(dev)),
            });
        }
        #[allow(unreachable_code)]
        {
            warn!("uinput not available; running in NO-OP mode");
            Ok(Self::noop())
        }
    }

    pub fn noop() -> Self {
        Self {
            enabled: true,
            dev: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, en: bool) {
        self.enabled = en;
    }

    fn device(&mut self) -> Option<&mut VirtualDevice> {
        if !self.enabled {
            return None;
        }
        self.dev.as_deref_mut()
    }

    pub fn click_mouse(&mut self, which: &str) -> Result<()> {
        let btn: Button = which.parse()?;
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.device() {
            dev.click(btn)?;
        }
        #[cfg(not(target_os = "linux"))]
        let _ = btn;
        Ok(())
    }

    pub fn scroll(&mut self, horizontal: bool, steps: i32) -> Result<()> {
        if steps == 0 {
            return Ok(());
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.device() {
            dev.scroll(horizontal, steps)?;
        }
        #[cfg(not(target_os = "linux"))]
        let _ = horizontal;
        Ok(())
    }

    /// Relative pointer motion in device units.
    pub fn move_pointer(&mut self, dx: i32, dy: i32) -> Result<()> {
        if dx == 0 && dy == 0 {
            return Ok(());
        }
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.device() {
            dev.move_rel(dx, dy)?;
        }
        Ok(())
    }

    /// "ALT+LEFT", "SUPER+PAGEUP" or a single "VOLUMEUP". Pressed in order, released in reverse.
    pub fn key_chord(&mut self, chord: &str) -> Result<()> {
        let keys = parse_chord(chord)?;
        #[cfg(target_os = "linux")]
        if let Some(dev) = self.device() {
            dev.chord(&keys)?;
        }
        #[cfg(not(target_os = "linux"))]
        let _ = keys;
        Ok(())
    }
}

/// Key names accepted in chords. The device registers exactly these.
const KEY_NAMES: &[(&str, &[&str])] = &[
    ("CTRL", &["CTRL", "CONTROL"]),
    ("ALT", &["ALT"]),
    ("SHIFT", &["SHIFT"]),
    ("SUPER", &["SUPER", "META", "WIN"]),
    ("TAB", &["TAB"]),
    ("MINUS", &["MINUS", "-"]),
    ("EQUAL", &["EQUAL", "="]),
    ("ESC", &["ESC", "ESCAPE"]),
    ("ENTER", &["ENTER"]),
    ("SPACE", &["SPACE"]),
    ("LEFT", &["LEFT"]),
    ("RIGHT", &["RIGHT"]),
    ("UP", &["UP"]),
    ("DOWN", &["DOWN"]),
    ("HOME", &["HOME"]),
    ("END", &["END"]),
    ("PAGEUP", &["PAGEUP"]),
    ("PAGEDOWN", &["PAGEDOWN"]),
    ("VOLUMEUP", &["VOLUMEUP"]),
    ("VOLUMEDOWN", &["VOLUMEDOWN"]),
    ("MUTE", &["MUTE"]),
    ("BACK", &["BACK"]),
];

/// Canonical key names of a chord, in press order.
pub fn parse_chord(chord: &str) -> Result<Vec<&'static str>> {
    let mut keys = Vec::new();
    for tok in chord.split('+').map(|s| s.trim().to_ascii_uppercase()) {
        let canon = KEY_NAMES
            .iter()
            .find(|(_, aliases)| aliases.contains(&tok.as_str()))
            .map(|(name, _)| *name)
            .ok_or_else(|| anyhow!("unsupported key token: {tok}"))?;
        keys.push(canon);
    }
    if keys.is_empty() {
        return Err(anyhow!("empty key chord"));
    }
    Ok(keys)
}

#[cfg(target_os = "linux")]
mod linux {
    use super::*;
    use uinput::event::controller::Mouse;
    use uinput::event::keyboard::{Key, Misc};
    use uinput::event::relative::{Position, Wheel};

    #[derive(Debug, Clone, Copy)]
    enum Code {
        Key(Key),
        Misc(Misc),
    }

    fn code(name: &str) -> Option<Code> {
        let c = match name {
            "CTRL" => Code::Key(Key::LeftControl),
            "ALT" => Code::Key(Key::LeftAlt),
            "SHIFT" => Code::Key(Key::LeftShift),
            "SUPER" => Code::Key(Key::LeftMeta),
            "TAB" => Code::Key(Key::Tab),
            "MINUS" => Code::Key(Key::Minus),
            "EQUAL" => Code::Key(Key::Equal),
            "ESC" => Code::Key(Key::Esc),
            "ENTER" => Code::Key(Key::Enter),
            "SPACE" => Code::Key(Key::Space),
            "LEFT" => Code::Key(Key::Left),
            "RIGHT" => Code::Key(Key::Right),
            "UP" => Code::Key(Key::Up),
            "DOWN" => Code::Key(Key::Down),
            "HOME" => Code::Key(Key::Home),
            "END" => Code::Key(Key::End),
            "PAGEUP" => Code::Key(Key::PageUp),
            "PAGEDOWN" => Code::Key(Key::PageDown),
            "VOLUMEUP" => Code::Misc(Misc::VolumeUp),
            "VOLUMEDOWN" => Code::Misc(Misc::VolumeDown),
            "MUTE" => Code::Misc(Misc::Mute),
            "BACK" => Code::Misc(Misc::Back),
            _ => return None,
        };
        Some(c)
    }

    pub struct VirtualDevice {
        dev: uinput::device::Device,
    }

    impl VirtualDevice {
        pub fn create() -> Result<Self> {
            let mut b = uinput::default()?
                .name("Handctl Virtual Input")?
                .event(Position::X)?
                .event(Position::Y)?
                .event(Wheel::Vertical)?
                .event(Wheel::Horizontal)?
                .event(Mouse::Left)?
                .event(Mouse::Right)?
                .event(Mouse::Middle)?;
            for (name, _) in KEY_NAMES {
                b = match code(name) {
                    Some(Code::Key(k)) => b.event(k)?,
                    Some(Code::Misc(m)) => b.event(m)?,
                    None => b,
                };
            }
            let dev = b.create()?;
            info!("uinput: created virtual device");
            Ok(Self { dev })
        }

        fn send_code(&mut self, c: Code, val: i32) -> Result<()> {
            match c {
                Code::Key(k) => self.dev.send(k, val)?,
                Code::Misc(m) => self.dev.send(m, val)?,
            }
            Ok(())
        }

        pub fn chord(&mut self, names: &[&str]) -> Result<()> {
            let codes: Vec<Code> = names
                .iter()
                .map(|n| code(n).ok_or_else(|| anyhow!("no key code for {n}")))
                .collect::<Result<_>>()?;
            for c in &codes {
                self.send_code(*c, 1)?;
            }
            self.dev.synchronize()?;
            for c in codes.iter().rev() {
                self.send_code(*c, 0)?;
            }
            self.dev.synchronize()?;
            Ok(())
        }

        pub fn click(&mut self, btn: Button) -> Result<()> {
            let m = match btn {
                Button::Left => Mouse::Left,
                Button::Right => Mouse::Right,
                Button::Middle => Mouse::Middle,
            };
            self.dev.send(m, 1)?;
            self.dev.synchronize()?;
            self.dev.send(m, 0)?;
            self.dev.synchronize()?;
            Ok(())
        }

        pub fn scroll(&mut self, horizontal: bool, steps: i32) -> Result<()> {
            let wheel = if horizontal {
                Wheel::Horizontal
            } else {
                Wheel::Vertical
            };
            self.dev.send(wheel, steps)?;
            self.dev.synchronize()?;
            Ok(())
        }

        pub fn move_rel(&mut self, dx: i32, dy: i32) -> Result<()> {
            if dx != 0 {
                self.dev.send(Position::X, dx)?;
            }
            if dy != 0 {
                self.dev.send(Position::Y, dy)?;
            }
            self.dev.synchronize()?;
            Ok(())
        }
    }
}

#[cfg(target_os = "linux")]
use linux::VirtualDevice;

#[cfg(not(target_os = "linux"))]
struct VirtualDevice;
