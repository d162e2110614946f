use serde::{Deserialize, Serialize};

/// Frequency-range notch filter, in MHz, both bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NotchRange {
    pub low_mhz: f64,
    pub high_mhz: f64,
}

impl NotchRange {
    pub fn new(low_mhz: f64, high_mhz: f64) -> Self {
        Self { low_mhz, high_mhz }
    }

    /// Whether `freq` falls fully inside `[low, high]`, accounting for either bound
    /// being the smaller one (negative `foff` flips which endpoint is lower).
    fn contains(&self, freq: f64) -> bool {
        let (lo, hi) = if self.low_mhz <= self.high_mhz {
            (self.low_mhz, self.high_mhz)
        } else {
            (self.high_mhz, self.low_mhz)
        };
        lo <= freq && freq <= hi
    }

    /// Whether both `freq_a` and `freq_b` are fully inside this range. An
    /// event straddling the boundary is not excluded, only one that lands
    /// entirely within it.
    pub fn fully_contains(&self, freq_a: f64, freq_b: f64) -> bool {
        self.contains(freq_a) && self.contains(freq_b)
    }
}

/// Tunable thresholds for the detection pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Width of the sliding noise-statistics window, in columns.
    pub noise_window_size: usize,
    /// Single-pixel SNR threshold (θ₁).
    pub pixel_snr_threshold: f64,
    /// Two-pixel (consecutive pair) SNR threshold (θ₂).
    pub pair_snr_threshold: f64,
    /// Gap (in columns) below which adjacent hit windows/hits are merged.
    pub margin: usize,
    /// Sigma-clip threshold multiplier (α).
    pub sigma_clip_alpha: f64,
    /// Maximum number of hits retained per coarse channel before the noise cap kicks in.
    pub max_groups: usize,
    /// Widest padded region the fitter will attempt to fit; wider hits are left unfitted.
    pub max_fit_columns: usize,
    /// Maximum number of events kept per coarse channel, highest score first.
    pub max_events_per_channel: usize,
    /// Frequency ranges excluded from scoring.
    pub notch_ranges: Vec<NotchRange>,
    /// Column span below which an event is considered too narrow to be real.
    pub min_event_columns: usize,
    /// Column span above which an event is considered too wide to be a single signal.
    pub max_event_columns: usize,
    /// Minimum combined on/off SNR for an event to score above zero.
    pub min_combined_snr: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            noise_window_size: 30,
            pixel_snr_threshold: 6.0,
            pair_snr_threshold: 4.0,
            margin: 10,
            sigma_clip_alpha: 3.5,
            max_groups: 1000,
            max_fit_columns: 1000,
            max_events_per_channel: 50,
            notch_ranges: Vec::new(),
            min_event_columns: 3,
            max_event_columns: 300,
            min_combined_snr: 2.0,
        }
    }
}

impl Settings {
    /// Layers defaults under an optional settings file and environment
    /// variables prefixed `DRIFTSCAN_`.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder = builder.add_source(config::Environment::with_prefix("DRIFTSCAN").separator("__"));

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.pixel_snr_threshold, 6.0);
        assert_eq!(settings.pair_snr_threshold, 4.0);
        assert_eq!(settings.margin, 10);
        assert_eq!(settings.sigma_clip_alpha, 3.5);
        assert_eq!(settings.max_groups, 1000);
        assert_eq!(settings.max_fit_columns, 1000);
        assert_eq!(settings.max_events_per_channel, 50);
        assert_eq!(settings.min_event_columns, 3);
        assert_eq!(settings.max_event_columns, 300);
        assert_eq!(settings.min_combined_snr, 2.0);
    }

    #[test]
    fn notch_fully_contains_handles_negative_foff_ordering() {
        // foff negative means freq1 > freq2; the range itself can be given in
        // either order and should still match consistently.
        let notch = NotchRange::new(1420.0, 1419.0);
        assert!(notch.fully_contains(1419.5, 1419.8));
        assert!(!notch.fully_contains(1419.5, 1421.0));
    }
}
