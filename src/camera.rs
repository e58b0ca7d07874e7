//! Camera mode model and control command tables.
//!
//! Paths follow the HERO5 WiFi command set. They must stay byte-for-byte
//! identical, the camera firmware matches them literally.

use log::{debug, info};

/// Operating modes, in wheel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMode {
    Photo,
    Burst,
    Video,
}

impl CameraMode {
    pub const ALL: [CameraMode; 3] = [CameraMode::Photo, CameraMode::Burst, CameraMode::Video];

    pub const fn index(self) -> usize {
        match self {
            CameraMode::Photo => 0,
            CameraMode::Burst => 1,
            CameraMode::Video => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            CameraMode::Photo => "PHOTO",
            CameraMode::Burst => "BURST",
            CameraMode::Video => "VIDEO",
        }
    }
}

/// Mode-wheel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Prev,
}

/// Camera command variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraModel {
    /// HERO5 Session: photo and burst selected through sub-modes
    Hero5Session,
    /// HERO5 Black: plain primary mode switch
    Hero5,
}

/// One camera control request (always `GET <path>` on port 80).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub path: &'static str,
}

impl Command {
    pub const fn new(path: &'static str) -> Self {
        Self { path }
    }
}

pub const PAIR_COMPLETE: Command =
    Command::new("/gp/gpControl/command/wireless/pair/complete?success=1&deviceName=DESKTOP");
pub const SHUTTER_ON: Command = Command::new("/gp/gpControl/command/shutter?p=1");
pub const SHUTTER_OFF: Command = Command::new("/gp/gpControl/command/shutter?p=0");
pub const FORCE_4K_RESOLUTION: Command = Command::new("/gp/gpControl/setting/2/1");

pub const VIDEO_MODE: Command = Command::new("/gp/gpControl/command/mode?p=0");
pub const PHOTO_MODE: Command = Command::new("/gp/gpControl/command/mode?p=1");
pub const BURST_MODE: Command = Command::new("/gp/gpControl/command/mode?p=2");
pub const SINGLE_PHOTO_SUB_MODE: Command =
    Command::new("/gp/gpControl/command/sub_mode?mode=1&sub_mode=1");
pub const BURST_SUB_MODE: Command = Command::new("/gp/gpControl/command/sub_mode?mode=2&sub_mode=0");

/// Requests that put the camera in one mode, sent in order.
///
/// Every mode change also forces 4K resolution first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeCommand {
    pub mode: CameraMode,
    pub commands: &'static [Command],
}

const SESSION_MODE_COMMANDS: [ModeCommand; 3] = [
    ModeCommand {
        mode: CameraMode::Photo,
        commands: &[FORCE_4K_RESOLUTION, SINGLE_PHOTO_SUB_MODE],
    },
    ModeCommand {
        mode: CameraMode::Burst,
        commands: &[FORCE_4K_RESOLUTION, BURST_SUB_MODE],
    },
    ModeCommand {
        mode: CameraMode::Video,
        commands: &[FORCE_4K_RESOLUTION, VIDEO_MODE],
    },
];

const HERO5_MODE_COMMANDS: [ModeCommand; 3] = [
    ModeCommand {
        mode: CameraMode::Photo,
        commands: &[FORCE_4K_RESOLUTION, PHOTO_MODE],
    },
    ModeCommand {
        mode: CameraMode::Burst,
        commands: &[FORCE_4K_RESOLUTION, BURST_MODE],
    },
    ModeCommand {
        mode: CameraMode::Video,
        commands: &[FORCE_4K_RESOLUTION, VIDEO_MODE],
    },
];

impl CameraModel {
    pub const fn mode_command(self, mode: CameraMode) -> ModeCommand {
        match self {
            CameraModel::Hero5Session => SESSION_MODE_COMMANDS[mode.index()],
            CameraModel::Hero5 => HERO5_MODE_COMMANDS[mode.index()],
        }
    }
}

/// Current mode on the wheel plus the video recording toggle.
pub struct CameraModeModel {
    model: CameraModel,
    index: usize,
    shutter_on: bool,
}

impl CameraModeModel {
    /// Starts in [`CameraMode::Photo`], not recording.
    pub fn new(model: CameraModel) -> Self {
        Self {
            model,
            index: 0,
            shutter_on: false,
        }
    }

    pub fn current(&self) -> CameraMode {
        CameraMode::ALL[self.index]
    }

    pub fn is_video_mode(&self) -> bool {
        self.current() == CameraMode::Video
    }

    /// Whether the last toggle started a recording
    pub fn is_recording(&self) -> bool {
        self.shutter_on
    }

    /// Move the wheel one step.
    ///
    /// `Prev` increments the index and `Next` decrements it (wrapping), which is
    /// the mapping the physical remote has always had: from Photo, `Prev`
    /// selects Burst and `Next` selects Video.
    pub fn advance(&mut self, direction: Direction) -> CameraMode {
        let len = CameraMode::ALL.len();
        self.index = match direction {
            Direction::Prev => (self.index + 1) % len,
            Direction::Next => (self.index + len - 1) % len,
        };
        let mode = self.current();
        info!("[CAMERA] Mode wheel {:?} -> {}", direction, mode.name());
        mode
    }

    pub fn command_for_current(&self) -> ModeCommand {
        self.model.mode_command(self.current())
    }

    /// Start/stop recording toggle for video mode.
    ///
    /// Returns `None` outside video mode; photo and burst captures are a plain
    /// [`SHUTTER_ON`]. The recording flag survives mode changes.
    pub fn toggle_shutter_command(&mut self) -> Option<Command> {
        if !self.is_video_mode() {
            return None;
        }
        let command = if self.shutter_on { SHUTTER_OFF } else { SHUTTER_ON };
        self.shutter_on = !self.shutter_on;
        debug!(
            "[CAMERA] Recording {}",
            if self.shutter_on { "started" } else { "stopped" }
        );
        Some(command)
    }

    /// What the shutter button sends in the current mode.
    pub fn shutter_command(&mut self) -> Command {
        self.toggle_shutter_command().unwrap_or(SHUTTER_ON)
    }
}
