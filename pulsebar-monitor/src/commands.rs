//! Control lines accepted on stdin
//!
//! `+N` / `-N` step the output volume, `set N` sets it, `mute` / `unmute` /
//! `toggle` drive the output mute, the `mic-` variants drive the input mute
//! and `quit` exits.

use anyhow::{bail, Context};
use pulsebar_core::{MuteAction, VolumeChange};
use pulsebar_platform::AudioControl;

/// Upper bound used for every volume command issued from the monitor
pub const VOLUME_LIMIT: u16 = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum ControlLine {
    Step { change: VolumeChange, step: f64 },
    Set(u16),
    SinkMute(MuteAction),
    SourceMute(MuteAction),
    Quit,
}

/// Parse one line; blank lines yield `None`
pub fn parse(line: &str) -> anyhow::Result<Option<ControlLine>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let command = match line {
        "mute" => ControlLine::SinkMute(MuteAction::Set(true)),
        "unmute" => ControlLine::SinkMute(MuteAction::Set(false)),
        "toggle" => ControlLine::SinkMute(MuteAction::Toggle),
        "mic-mute" => ControlLine::SourceMute(MuteAction::Set(true)),
        "mic-unmute" => ControlLine::SourceMute(MuteAction::Set(false)),
        "mic-toggle" => ControlLine::SourceMute(MuteAction::Toggle),
        "quit" | "q" => ControlLine::Quit,
        _ => {
            if let Some(rest) = line.strip_prefix('+') {
                ControlLine::Step {
                    change: VolumeChange::Increase,
                    step: parse_step(rest)?,
                }
            } else if let Some(rest) = line.strip_prefix('-') {
                ControlLine::Step {
                    change: VolumeChange::Decrease,
                    step: parse_step(rest)?,
                }
            } else if let Some(rest) = line.strip_prefix("set ") {
                let target = rest
                    .trim()
                    .parse::<u16>()
                    .with_context(|| format!("invalid volume '{}'", rest.trim()))?;
                ControlLine::Set(target)
            } else {
                bail!("unknown command '{}'", line);
            }
        }
    };

    Ok(Some(command))
}

fn parse_step(text: &str) -> anyhow::Result<f64> {
    let step = text
        .trim()
        .parse::<f64>()
        .with_context(|| format!("invalid step '{}'", text.trim()))?;
    if !step.is_finite() || step <= 0.0 {
        bail!("step must be a positive number, got {}", step);
    }
    Ok(step)
}

/// Forward a parsed line to the backend
pub fn apply(command: &ControlLine, backend: &dyn AudioControl) {
    match *command {
        ControlLine::Step { change, step } => backend.step_volume(change, step, VOLUME_LIMIT),
        ControlLine::Set(target) => backend.set_volume(target, 0, VOLUME_LIMIT),
        ControlLine::SinkMute(action) => backend.set_sink_mute(action),
        ControlLine::SourceMute(action) => backend.set_source_mute(action),
        ControlLine::Quit => {}
    }
}
