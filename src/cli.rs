//! Command-line argument parsing.

use clap::Parser;

use crate::params::TuningParams;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "Voiceform")]
#[command(about = "Voice-reactive deformable surface", long_about = None)]
pub struct Args {
    /// List available input devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Input device name (default input device if omitted)
    #[arg(long, value_name = "NAME")]
    pub device: Option<String>,

    /// Analysis sensitivity, 0.2 to 5
    #[arg(long, value_name = "FACTOR", default_value_t = 1.0)]
    pub sensitivity: f32,

    /// Noise gate threshold, 0 to 0.3
    #[arg(long, value_name = "LEVEL", default_value_t = 0.05)]
    pub noise_gate: f32,

    /// Animation speed multiplier, 0.1 to 5
    #[arg(long, value_name = "FACTOR", default_value_t = 1.0)]
    pub animation_speed: f32,

    /// Start muted
    #[arg(long)]
    pub muted: bool,

    /// Sphere subdivision around the equator (rings are half of this)
    #[arg(long, value_name = "SEGMENTS", default_value_t = 128)]
    pub resolution: usize,
}

impl Args {
    /// Initial tunable parameters from the command line
    pub fn tuning_params(&self) -> TuningParams {
        TuningParams {
            sensitivity: self.sensitivity,
            noise_gate: self.noise_gate,
            animation_speed: self.animation_speed,
            muted: self.muted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_tuning_defaults() {
        let args = Args::try_parse_from(["voiceform"]).unwrap();
        let params = args.tuning_params();
        let defaults = TuningParams::default();

        assert_eq!(params.sensitivity, defaults.sensitivity);
        assert_eq!(params.noise_gate, defaults.noise_gate);
        assert_eq!(params.animation_speed, defaults.animation_speed);
        assert_eq!(params.muted, defaults.muted);
    }

    #[test]
    fn test_flags_parse() {
        let args = Args::try_parse_from([
            "voiceform",
            "--muted",
            "--sensitivity",
            "2.5",
            "--device",
            "USB Microphone",
        ])
        .unwrap();

        assert!(args.muted);
        assert_eq!(args.sensitivity, 2.5);
        assert_eq!(args.device.as_deref(), Some("USB Microphone"));
    }
}
