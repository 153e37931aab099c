//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across
//! threads.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::audio::EncodeTarget;
use crate::diarize::SpeakerHints;

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for audio capture and the canonical encode target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate of the canonical PCM container sent to the diarization
    /// service (Hz).
    pub target_sample_rate: u32,
    /// Maximum recording length in seconds; samples beyond this are
    /// dropped.
    pub max_recording_secs: f32,
    /// Audio input device name — `None` means the system default.
    pub input_device: Option<String>,
}

impl AudioConfig {
    /// The encode target derived from these settings (always mono/16-bit).
    pub fn encode_target(&self) -> EncodeTarget {
        EncodeTarget {
            sample_rate: self.target_sample_rate,
            ..EncodeTarget::default()
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16_000,
            max_recording_secs: 600.0,
            input_device: None,
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureConfig
// ---------------------------------------------------------------------------

/// Settings for the continuous recognition stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Recognition language as a BCP-47 tag passed to the platform
    /// recognizer.
    pub language: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            language: "en-US".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// DiarizationConfig
// ---------------------------------------------------------------------------

/// Settings for the diarization relay service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiarizationConfig {
    /// Base URL of the local relay.
    pub base_url: String,
    /// Bound on one diarization call, in seconds.
    pub timeout_secs: u64,
    /// Minimum expected speaker count, forwarded as a model hint.
    pub min_speakers: u32,
    /// Maximum expected speaker count, forwarded as a model hint.
    pub max_speakers: u32,
}

impl DiarizationConfig {
    /// The speaker hints derived from these settings.
    pub fn hints(&self) -> SpeakerHints {
        SpeakerHints {
            min_speakers: self.min_speakers,
            max_speakers: self.max_speakers,
        }
    }
}

impl Default for DiarizationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".into(),
            timeout_secs: 20,
            min_speakers: 1,
            max_speakers: 5,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use meeting_scribe::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Audio capture / encoder settings.
    pub audio: AudioConfig,
    /// Continuous recognition settings.
    pub capture: CaptureConfig,
    /// Diarization relay settings.
    pub diarization: DiarizationConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// A missing file is the first-run scenario and yields the defaults,
    /// so callers never special-case it.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file())
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => {
                toml::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file())
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let rendered = toml::to_string_pretty(self)?;
        std::fs::write(path, rendered).with_context(|| format!("writing {}", path.display()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(name);
        (dir, path)
    }

    #[test]
    fn defaults_round_trip_through_toml() {
        let (_dir, path) = scratch_file("settings.toml");

        AppConfig::default().save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        let default = AppConfig::default();
        assert_eq!(loaded.audio.target_sample_rate, default.audio.target_sample_rate);
        assert_eq!(loaded.audio.max_recording_secs, default.audio.max_recording_secs);
        assert_eq!(loaded.capture.language, default.capture.language);
        assert_eq!(loaded.diarization.base_url, default.diarization.base_url);
        assert_eq!(loaded.diarization.timeout_secs, default.diarization.timeout_secs);
        assert_eq!(loaded.diarization.min_speakers, default.diarization.min_speakers);
        assert_eq!(loaded.diarization.max_speakers, default.diarization.max_speakers);
    }

    #[test]
    fn missing_file_is_first_run_defaults() {
        let (_dir, path) = scratch_file("never-written.toml");
        let loaded = AppConfig::load_from(&path).expect("missing file is not an error");
        assert_eq!(loaded.diarization.base_url, AppConfig::default().diarization.base_url);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let (_dir, path) = scratch_file("broken.toml");
        std::fs::write(&path, "diarization = \"not a table\"").expect("write");
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn expected_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.audio.target_sample_rate, 16_000);
        assert_eq!(cfg.capture.language, "en-US");
        assert_eq!(cfg.diarization.base_url, "http://localhost:3001");
        assert_eq!(cfg.diarization.timeout_secs, 20);
        assert_eq!(cfg.diarization.min_speakers, 1);
        assert_eq!(cfg.diarization.max_speakers, 5);
    }

    #[test]
    fn modified_values_survive_round_trip() {
        let (_dir, path) = scratch_file("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.audio.target_sample_rate = 8_000;
        cfg.capture.language = "nl-NL".into();
        cfg.diarization.base_url = "http://127.0.0.1:8080".into();
        cfg.diarization.timeout_secs = 45;
        cfg.diarization.max_speakers = 8;
        cfg.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(loaded.audio.target_sample_rate, 8_000);
        assert_eq!(loaded.capture.language, "nl-NL");
        assert_eq!(loaded.diarization.base_url, "http://127.0.0.1:8080");
        assert_eq!(loaded.diarization.timeout_secs, 45);
        assert_eq!(loaded.diarization.max_speakers, 8);
    }

    #[test]
    fn derived_target_and_hints_reflect_settings() {
        let mut cfg = AppConfig::default();
        cfg.audio.target_sample_rate = 8_000;
        cfg.diarization.max_speakers = 3;

        let target = cfg.audio.encode_target();
        assert_eq!((target.sample_rate, target.channels, target.bit_depth), (8_000, 1, 16));

        let hints = cfg.diarization.hints();
        assert_eq!((hints.min_speakers, hints.max_speakers), (1, 3));
    }
}
