//! PulseAudio/PipeWire source enumeration and default-monitor selection.
//!
//! We shell out to `pactl` rather than speak the native protocol: enumeration happens
//! once per run, and `pactl` is present wherever PulseAudio (or PipeWire's Pulse shim)
//! is. Monitor sources mirror what an output device is playing, which is exactly what
//! "record system audio" means here.

use anyhow::{Context, Result};
use tracing::debug;

use crate::cmd::{require_program, run_capture};

/// Suffix PulseAudio gives every sink's loopback capture source.
pub const MONITOR_SUFFIX: &str = ".monitor";

/// Fallback source name understood by every Pulse client.
pub const DEFAULT_SOURCE: &str = "default";

/// One capture endpoint as reported by `pactl list short sources`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub name: String,
}

impl Source {
    /// Whether this source mirrors a playback device.
    pub fn is_monitor(&self) -> bool {
        self.name.ends_with(MONITOR_SUFFIX)
    }
}

/// List available PulseAudio sources.
///
/// Fails if `pactl` is missing or exits non-zero; `--list-sources` is an explicit user
/// request, so a broken audio stack should be reported rather than papered over.
pub fn list_sources() -> crate::Result<Vec<Source>> {
    let pactl = require_program("pactl")?;
    let (ok, stdout) =
        run_capture(&pactl, &["list", "short", "sources"]).context("pactl invocation failed")?;
    if !ok {
        return Err(crate::Error::msg(
            "pactl exited with an error. Is PulseAudio/PipeWire running?",
        ));
    }
    Ok(parse_short_sources(&stdout))
}

/// Pick the source to record from when the user didn't name one.
///
/// Preference order:
/// 1. the default sink's `.monitor`, when it exists
/// 2. the first `*.monitor` source
/// 3. the literal `"default"` sentinel
///
/// This never fails: if `pactl` is missing or unhappy we fall through to the sentinel
/// and let the recorder surface whatever error results.
pub fn default_monitor_source() -> String {
    let sources = list_sources().unwrap_or_default();
    let default_sink = query_default_sink();
    let chosen = choose_monitor_source(default_sink.as_deref(), &sources);
    debug!(source = %chosen, "selected default capture source");
    chosen
}

fn query_default_sink() -> Option<String> {
    let pactl = require_program("pactl").ok()?;
    let (ok, stdout) = run_capture(&pactl, &["get-default-sink"]).ok()?;
    if !ok {
        return None;
    }
    let sink = stdout.trim();
    if sink.is_empty() {
        None
    } else {
        Some(sink.to_string())
    }
}

/// Parse `pactl list short sources` output.
///
/// Each line is `index\tname\tmodule\tsampleSpec\tstate`; we only need the name.
pub(crate) fn parse_short_sources(output: &str) -> Vec<Source> {
    output
        .lines()
        .filter_map(|line| {
            let name = line.split('\t').nth(1)?;
            if name.is_empty() {
                return None;
            }
            Some(Source {
                name: name.to_string(),
            })
        })
        .collect()
}

/// Selection heuristic behind [`default_monitor_source`], kept pure for testing.
pub(crate) fn choose_monitor_source(default_sink: Option<&str>, sources: &[Source]) -> String {
    if let Some(sink) = default_sink {
        let candidate = format!("{sink}{MONITOR_SUFFIX}");
        if sources.iter().any(|s| s.name == candidate) {
            return candidate;
        }
    }

    if let Some(monitor) = sources.iter().find(|s| s.is_monitor()) {
        return monitor.name.clone();
    }

    DEFAULT_SOURCE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(name: &str) -> Source {
        Source {
            name: name.to_string(),
        }
    }

    #[test]
    fn parses_pactl_short_output() {
        let out = "0\talsa_output.pci-0000_00_1f.3.analog-stereo.monitor\tmodule-alsa-card.c\ts16le 2ch 44100Hz\tIDLE\n\
                   1\talsa_input.pci-0000_00_1f.3.analog-stereo\tmodule-alsa-card.c\ts16le 2ch 44100Hz\tSUSPENDED\n";
        let sources = parse_short_sources(out);
        assert_eq!(
            sources,
            vec![
                src("alsa_output.pci-0000_00_1f.3.analog-stereo.monitor"),
                src("alsa_input.pci-0000_00_1f.3.analog-stereo"),
            ]
        );
    }

    #[test]
    fn parse_ignores_malformed_lines() {
        let out = "garbage-without-tabs\n2\t\tmodule\tspec\tRUNNING\n";
        assert!(parse_short_sources(out).is_empty());
    }

    #[test]
    fn prefers_default_sinks_monitor() {
        let sources = vec![src("other.monitor"), src("speakers.monitor")];
        let chosen = choose_monitor_source(Some("speakers"), &sources);
        assert_eq!(chosen, "speakers.monitor");
    }

    #[test]
    fn falls_back_to_first_monitor_source() {
        let sources = vec![src("mic"), src("hdmi.monitor"), src("usb.monitor")];
        // Default sink has no matching monitor.
        let chosen = choose_monitor_source(Some("speakers"), &sources);
        assert_eq!(chosen, "hdmi.monitor");
    }

    #[test]
    fn falls_back_to_default_sentinel() {
        assert_eq!(choose_monitor_source(None, &[src("mic")]), DEFAULT_SOURCE);
        assert_eq!(choose_monitor_source(None, &[]), DEFAULT_SOURCE);
    }

    #[test]
    fn monitor_detection_uses_suffix() {
        assert!(src("speakers.monitor").is_monitor());
        assert!(!src("monitor.speakers").is_monitor());
    }
}
