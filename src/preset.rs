//! Instrument presets.
//!
//! A preset is a full snapshot of the instrument's controls: every sample
//! bank, the oscillator bank and both effects. The JSON form uses the same
//! camelCase layout as saved user settings.

use serde::{Deserialize, Serialize};

use crate::bank::{BankId, VolumeLevel};
use crate::dsp::oscillator::Waveform;
use crate::error::EngineError;

/// Settings of one sample bank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoundBankSettings {
    pub volume: VolumeLevel,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub pitch: f64,
}

impl Default for SoundBankSettings {
    fn default() -> Self {
        SoundBankSettings {
            volume: VolumeLevel::Off,
            looping: false,
            pitch: 1.0,
        }
    }
}

impl SoundBankSettings {
    pub const fn new(volume: VolumeLevel, looping: bool, pitch: f64) -> Self {
        SoundBankSettings {
            volume,
            looping,
            pitch,
        }
    }
}

/// Settings of all four sample banks.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SoundBanks {
    pub p1: SoundBankSettings,
    pub p2: SoundBankSettings,
    pub w1: SoundBankSettings,
    pub w2: SoundBankSettings,
}

impl SoundBanks {
    pub fn get(&self, bank: BankId) -> &SoundBankSettings {
        match bank {
            BankId::P1 => &self.p1,
            BankId::P2 => &self.p2,
            BankId::W1 => &self.w1,
            BankId::W2 => &self.w2,
        }
    }

    pub fn get_mut(&mut self, bank: BankId) -> &mut SoundBankSettings {
        match bank {
            BankId::P1 => &mut self.p1,
            BankId::P2 => &mut self.p2,
            BankId::W1 => &mut self.w1,
            BankId::W2 => &mut self.w2,
        }
    }
}

fn default_filter_q() -> f64 {
    1.0
}

/// Settings of the oscillator bank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthSettings {
    pub volume: VolumeLevel,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub waveform: Waveform,
    pub filter_cutoff: f64,
    #[serde(default = "default_filter_q")]
    pub filter_q: f64,
    pub attack: f64,
    pub release: f64,
    pub length: f64,
}

impl Default for SynthSettings {
    fn default() -> Self {
        SynthSettings {
            volume: VolumeLevel::Off,
            looping: true,
            waveform: Waveform::Sawtooth,
            filter_cutoff: 2000.0,
            filter_q: 1.0,
            attack: 0.05,
            release: 0.5,
            length: 1.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EchoSettings {
    pub enabled: bool,
    /// Milliseconds.
    pub delay: f64,
    pub feedback: f64,
}

impl Default for EchoSettings {
    fn default() -> Self {
        EchoSettings {
            enabled: false,
            delay: 150.0,
            feedback: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverbSettings {
    pub enabled: bool,
    pub decay_time: f64,
    pub density: f64,
    pub gain: f64,
}

impl Default for ReverbSettings {
    fn default() -> Self {
        ReverbSettings {
            enabled: false,
            decay_time: 1.0,
            density: 1.0,
            gain: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EffectsSettings {
    pub echo: EchoSettings,
    pub reverb: ReverbSettings,
}

/// A named snapshot of every instrument control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub name: String,
    pub sound_banks: SoundBanks,
    pub synth_bank: SynthSettings,
    pub effects: EffectsSettings,
}

impl Preset {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Look up a factory preset by name, ignoring case.
pub fn find_builtin(name: &str) -> Option<Preset> {
    builtin_presets()
        .into_iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
}

/// The factory presets, in menu order.
pub fn builtin_presets() -> Vec<Preset> {
    use VolumeLevel::{High, Low, Off};

    let off = SoundBankSettings::default();
    let bank = SoundBankSettings::new;
    let synth = |volume, looping, waveform, filter_cutoff, attack, release, length| SynthSettings {
        volume,
        looping,
        waveform,
        filter_cutoff,
        filter_q: 1.0,
        attack,
        release,
        length,
    };
    let echo = |delay, feedback| EchoSettings {
        enabled: true,
        delay,
        feedback,
    };
    let reverb = |decay_time, density, gain| ReverbSettings {
        enabled: true,
        decay_time,
        density,
        gain,
    };
    let preset = |name: &str, sound_banks, synth_bank, echo, reverb| Preset {
        name: name.to_string(),
        sound_banks,
        synth_bank,
        effects: EffectsSettings { echo, reverb },
    };
    let synth_off = SynthSettings::default();
    let no_echo = EchoSettings::default();
    let no_reverb = ReverbSettings::default();

    vec![
        preset(
            "Game Cowboy",
            SoundBanks { p1: bank(High, false, 1.0), p2: off, w1: off, w2: off },
            synth(Low, false, Waveform::Square, 3000.0, 0.02, 0.3, 0.8),
            no_echo,
            no_reverb,
        ),
        preset(
            "All You Need Is Kill",
            SoundBanks { p1: bank(Low, false, 2.0), p2: off, w1: off, w2: bank(High, false, 1.0) },
            synth(Low, false, Waveform::Sine, 2035.0, 0.07, 0.66, 1.2),
            // A zero delay clamps to the shortest echo.
            echo(0.0, 0.8),
            no_reverb,
        ),
        preset(
            "Twix Peaks",
            SoundBanks { p1: off, p2: bank(High, false, 1.0), w1: off, w2: off },
            synth(High, true, Waveform::Square, 2494.0, 0.46, 2.0, 1.2),
            echo(250.0, 0.4),
            no_reverb,
        ),
        preset(
            "Saw Ten Thousand",
            SoundBanks::default(),
            synth(High, true, Waveform::Sawtooth, 1200.0, 0.3, 1.5, 1.2),
            echo(350.0, 0.5),
            reverb(30.0, 15.0, 8.0),
        ),
        preset(
            "I Want To Believe",
            SoundBanks { p1: off, p2: off, w1: bank(High, true, 1.0), w2: bank(Low, true, 0.5) },
            synth_off,
            echo(400.0, 0.6),
            reverb(30.0, 15.0, 10.0),
        ),
        preset(
            "Square Pluck",
            SoundBanks::default(),
            synth(High, false, Waveform::Square, 4000.0, 0.01, 0.4, 0.6),
            echo(200.0, 0.3),
            no_reverb,
        ),
        preset(
            "Happy Accident",
            SoundBanks { p1: off, p2: bank(High, false, 1.5), w1: bank(Low, true, 0.5), w2: off },
            synth_off,
            no_echo,
            reverb(25.0, 12.0, 8.0),
        ),
        preset(
            "Supercommuter",
            SoundBanks { p1: bank(High, false, 2.0), p2: bank(Low, false, 1.0), w1: off, w2: off },
            synth_off,
            echo(200.0, 0.3),
            no_reverb,
        ),
        preset(
            "Sine Drone",
            SoundBanks::default(),
            synth(High, true, Waveform::Sine, 6000.0, 0.4, 2.0, 1.2),
            no_echo,
            reverb(40.0, 20.0, 12.0),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nine_presets_in_menu_order() {
        let names: Vec<String> = builtin_presets().into_iter().map(|p| p.name).collect();
        assert_eq!(
            names,
            [
                "Game Cowboy",
                "All You Need Is Kill",
                "Twix Peaks",
                "Saw Ten Thousand",
                "I Want To Believe",
                "Square Pluck",
                "Happy Accident",
                "Supercommuter",
                "Sine Drone",
            ]
        );
    }

    #[test]
    fn find_is_case_insensitive() {
        let p = find_builtin("sine drone").unwrap();
        assert_eq!(p.synth_bank.waveform, Waveform::Sine);
        assert!(p.effects.reverb.enabled);
        assert_eq!(p.effects.reverb.decay_time, 40.0);
        assert!(find_builtin("Nope").is_none());
    }

    #[test]
    fn happy_accident_layers() {
        let p = find_builtin("Happy Accident").unwrap();
        assert_eq!(p.sound_banks.get(BankId::P2).pitch, 1.5);
        let w1 = p.sound_banks.get(BankId::W1);
        assert_eq!(w1.volume, VolumeLevel::Low);
        assert!(w1.looping);
        assert_eq!(p.synth_bank.volume, VolumeLevel::Off);
    }

    #[test]
    fn parses_saved_settings_json() {
        let json = r#"{
            "name": "Mine",
            "soundBanks": {
                "p1": { "volume": "low", "loop": true, "pitch": 1.5 },
                "p2": { "volume": "off", "loop": false, "pitch": 1.0 },
                "w1": { "volume": "off", "loop": false, "pitch": 1.0 },
                "w2": { "volume": "high", "loop": false, "pitch": 0.5 }
            },
            "synthBank": {
                "volume": "high", "loop": false, "waveform": "triangle",
                "filterCutoff": 900, "attack": 0.1, "release": 0.2, "length": 0.7
            },
            "effects": {
                "echo": { "enabled": true, "delay": 300, "feedback": 0.2 },
                "reverb": { "enabled": false, "decayTime": 5, "density": 2, "gain": 3 }
            }
        }"#;
        let p = Preset::from_json(json).unwrap();
        assert_eq!(p.sound_banks.p1, SoundBankSettings::new(VolumeLevel::Low, true, 1.5));
        assert_eq!(p.synth_bank.waveform, Waveform::Triangle);
        // Older documents carry no resonance field.
        assert_eq!(p.synth_bank.filter_q, 1.0);
        assert_eq!(p.effects.reverb.decay_time, 5.0);

        let again = Preset::from_json(&p.to_json().unwrap()).unwrap();
        assert_eq!(again, p);
    }

    #[test]
    fn bad_json_is_config_error() {
        assert!(matches!(
            Preset::from_json(r#"{ "name": 3 }"#),
            Err(EngineError::Config(_))
        ));
    }
}
