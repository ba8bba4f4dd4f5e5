use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

/// Longest fingerprint accepted from a client.
pub const FINGERPRINT_MAX_LEN: usize = 128;

/// Length cap applied to each rendering probe value.
pub const PROBE_MAX_LEN: usize = 50;

pub const CANVAS_NOT_SUPPORTED: &str = "canvas_not_supported";
pub const WEBGL_NOT_SUPPORTED: &str = "webgl_not_supported";
pub const WEBGL_NO_DEBUG_INFO: &str = "webgl_no_debug_info";
pub const WEBGL_ERROR: &str = "webgl_error";

/// Outcome of a rendering probe (canvas or WebGL) on the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignalProbe {
    Value(String),
    /// Context creation returned nothing.
    #[default]
    Unsupported,
    /// WebGL context exists but hides the unmasked renderer.
    NoDebugInfo,
    /// Probe threw.
    Failed,
}

impl SignalProbe {
    fn canvas_digest(&self) -> &str {
        match self {
            SignalProbe::Value(v) => truncate(v, PROBE_MAX_LEN),
            _ => CANVAS_NOT_SUPPORTED,
        }
    }

    fn webgl_digest(&self) -> &str {
        match self {
            SignalProbe::Value(v) => truncate(v, PROBE_MAX_LEN),
            SignalProbe::Unsupported => WEBGL_NOT_SUPPORTED,
            SignalProbe::NoDebugInfo => WEBGL_NO_DEBUG_INFO,
            SignalProbe::Failed => WEBGL_ERROR,
        }
    }
}

/// Browser and OS characteristics reported by the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct BrowserSignals {
    pub user_agent: String,
    pub platform: String,
    pub language: String,
    /// Comma-joined preferred languages.
    pub languages: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub color_depth: u32,
    pub timezone: String,
    pub timezone_offset_minutes: i32,
    pub hardware_concurrency: u32,
    pub device_memory_gb: f64,
    pub max_touch_points: u32,
    pub cookie_enabled: bool,
    pub do_not_track: Option<String>,
    pub canvas: SignalProbe,
    pub webgl: SignalProbe,
}

/// Fixed field order so equal signal sets serialize identically.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalSignals<'a> {
    webgl: &'a str,
    canvas: &'a str,
    user_agent: &'a str,
    platform: &'a str,
    language: &'a str,
    languages: &'a str,
    screen_width: u32,
    screen_height: u32,
    screen_color_depth: u32,
    timezone: &'a str,
    timezone_offset: i32,
    hardware_concurrency: u32,
    device_memory: f64,
    max_touch_points: u32,
    cookie_enabled: bool,
    do_not_track: &'a str,
}

fn truncate(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

fn canonical_string(signals: &BrowserSignals) -> String {
    let canonical = CanonicalSignals {
        webgl: signals.webgl.webgl_digest(),
        canvas: signals.canvas.canvas_digest(),
        user_agent: &signals.user_agent,
        platform: &signals.platform,
        language: &signals.language,
        languages: &signals.languages,
        screen_width: signals.screen_width,
        screen_height: signals.screen_height,
        screen_color_depth: signals.color_depth,
        timezone: &signals.timezone,
        timezone_offset: signals.timezone_offset_minutes,
        hardware_concurrency: signals.hardware_concurrency,
        device_memory: signals.device_memory_gb,
        max_touch_points: signals.max_touch_points,
        cookie_enabled: signals.cookie_enabled,
        do_not_track: signals.do_not_track.as_deref().unwrap_or("unknown"),
    };

    // a struct of strings and numbers always serializes; NaN memory collapses to null
    serde_json::to_string(&canonical).unwrap_or_default()
}

/// Derive the fingerprint token: SHA-256 of the canonical JSON, base64 without padding.
///
/// Every signal reaches the token. It identifies a browser heuristically and
/// is not a credential: signals drift with browser or driver updates.
pub fn fingerprint(signals: &BrowserSignals) -> String {
    let digest = Sha256::digest(canonical_string(signals).as_bytes());
    STANDARD_NO_PAD.encode(digest)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintMatch {
    /// Nothing registered to compare against.
    NoReference,
    Match,
    Mismatch,
}

impl FingerprintMatch {
    pub fn is_flagged(self) -> bool {
        self == FingerprintMatch::Mismatch
    }
}

pub fn compare(stored: Option<&str>, current: &str) -> FingerprintMatch {
    match stored {
        None => FingerprintMatch::NoReference,
        Some(s) if s == current => FingerprintMatch::Match,
        Some(_) => FingerprintMatch::Mismatch,
    }
}

#[cfg(test)]
pub(crate) fn sample_signals() -> BrowserSignals {
    BrowserSignals {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36".into(),
        platform: "Linux x86_64".into(),
        language: "en-US".into(),
        languages: "en-US,en".into(),
        screen_width: 1920,
        screen_height: 1080,
        color_depth: 24,
        timezone: "Asia/Kolkata".into(),
        timezone_offset_minutes: -330,
        hardware_concurrency: 8,
        device_memory_gb: 8.0,
        max_touch_points: 0,
        cookie_enabled: true,
        do_not_track: None,
        canvas: SignalProbe::Value("c9a1f0e2b7d4".into()),
        webgl: SignalProbe::Value("ANGLE (Intel, Mesa Intel(R) UHD Graphics 620)".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let signals = sample_signals();
        assert_eq!(fingerprint(&signals), fingerprint(&signals.clone()));
    }

    #[test]
    fn test_fingerprint_has_fixed_length() {
        let token = fingerprint(&sample_signals());
        assert_eq!(token.len(), 43);
        assert!(token.len() <= FINGERPRINT_MAX_LEN);
        assert_eq!(fingerprint(&BrowserSignals::default()).len(), 43);
    }

    #[test]
    fn test_last_probe_characters_change_the_token() {
        let mut a = sample_signals();
        a.webgl = SignalProbe::Value("W".repeat(PROBE_MAX_LEN));
        a.canvas = SignalProbe::Value(format!("data:image/png;base64,{}A", "c".repeat(27)));
        let mut b = a.clone();
        b.canvas = SignalProbe::Value(format!("data:image/png;base64,{}B", "c".repeat(27)));
        assert_ne!(fingerprint(&a), fingerprint(&b));

        let mut c = a.clone();
        c.webgl = SignalProbe::Value(format!("{}X", "W".repeat(PROBE_MAX_LEN - 1)));
        assert_ne!(fingerprint(&a), fingerprint(&c));
    }

    #[test]
    fn test_trailing_signals_change_the_token() {
        let mut a = sample_signals();
        a.canvas = SignalProbe::Unsupported;
        a.webgl = SignalProbe::Unsupported;

        let mut b = a.clone();
        b.user_agent.push_str(" Edg/126.0");
        assert_ne!(fingerprint(&a), fingerprint(&b));

        let mut c = a.clone();
        c.screen_width = 1366;
        assert_ne!(fingerprint(&a), fingerprint(&c));

        let mut d = a.clone();
        d.do_not_track = Some("1".into());
        assert_ne!(fingerprint(&a), fingerprint(&d));
    }

    #[test]
    fn test_fingerprint_differs_on_canvas() {
        let a = sample_signals();
        let mut b = sample_signals();
        b.canvas = SignalProbe::Value("4e77d01a93bc".into());
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_differs_on_webgl() {
        let a = sample_signals();
        let mut b = sample_signals();
        b.webgl = SignalProbe::Value("NVIDIA GeForce RTX 3060/PCIe/SSE2".into());
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_failed_probes_use_sentinels() {
        let mut signals = sample_signals();
        signals.canvas = SignalProbe::Failed;
        signals.webgl = SignalProbe::NoDebugInfo;

        let canonical = canonical_string(&signals);
        assert!(canonical.contains(CANVAS_NOT_SUPPORTED));
        assert!(canonical.contains(WEBGL_NO_DEBUG_INFO));
        assert!(!fingerprint(&signals).is_empty());

        signals.webgl = SignalProbe::Failed;
        assert!(canonical_string(&signals).contains(WEBGL_ERROR));
    }

    #[test]
    fn test_probe_values_are_truncated() {
        let mut signals = sample_signals();
        signals.canvas = SignalProbe::Value("x".repeat(300));
        let canonical = canonical_string(&signals);
        assert!(canonical.contains(&"x".repeat(PROBE_MAX_LEN)));
        assert!(!canonical.contains(&"x".repeat(PROBE_MAX_LEN + 1)));
    }

    #[test]
    fn test_compare() {
        assert_eq!(compare(None, "abc"), FingerprintMatch::NoReference);
        assert_eq!(compare(Some("abc"), "abc"), FingerprintMatch::Match);
        assert_eq!(compare(Some("abc"), "abd"), FingerprintMatch::Mismatch);
        assert!(compare(Some("abc"), "abd").is_flagged());
        assert!(!compare(None, "abd").is_flagged());
    }
}
