//! GRBL response classification
//!
//! Pattern-matches one trimmed response line against the acknowledgement
//! and status-report shapes. Stateless: each call owns its matching, no
//! matcher state is retained between lines.
//!
//! Classification priority:
//! 1. `ok` prefix - acknowledgement
//! 2. `error` prefix - rejection
//! 3. `<STATE|MODE:pos[,pos...][|...]>` - status report
//!
//! Anything else is unrecognized; controllers emit informational banners,
//! so the caller drops such lines silently rather than treating them as
//! errors.

use serde::{Deserialize, Serialize};

/// Classification tag for one decoded line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseKind {
    /// `ok` acknowledgement
    Ok,
    /// `error...` rejection
    Error,
    /// Status report
    Status,
}

/// Captured fields of a status report.
///
/// `state`, `mode`, and `positions` are raw wire tokens; decoding them
/// into typed values (and rejecting unknown tokens) is the engine's job.
/// `feed_rate`, `spindle_speed`, and `offset` come from the optional
/// trailing `FS:`/`WCO:` segments.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusFields<'a> {
    /// Machine state token (e.g. `Idle`, `Hold:0`)
    pub state: &'a str,
    /// Coordinate mode token (`MPos`, `WPos`, or `WCO`)
    pub mode: &'a str,
    /// Raw comma-separated position list
    pub positions: &'a str,
    /// Feed rate from a trailing `FS:` segment
    pub feed_rate: Option<f64>,
    /// Spindle speed from a trailing `FS:` segment
    pub spindle_speed: Option<u32>,
    /// Raw position list from a trailing `WCO:` segment
    pub offset: Option<&'a str>,
}

/// One classified response line.
#[derive(Debug, Clone, PartialEq)]
pub enum Response<'a> {
    Ok,
    Error,
    Status(StatusFields<'a>),
}

impl Response<'_> {
    /// The classification tag without the captured payload.
    pub fn kind(&self) -> ResponseKind {
        match self {
            Response::Ok => ResponseKind::Ok,
            Response::Error => ResponseKind::Error,
            Response::Status(_) => ResponseKind::Status,
        }
    }
}

/// Classify one trimmed line. Returns `None` for unrecognized lines.
pub fn classify(line: &str) -> Option<Response<'_>> {
    if line.starts_with("ok") {
        return Some(Response::Ok);
    }

    if line.starts_with("error") {
        return Some(Response::Error);
    }

    parse_status_report(line).map(Response::Status)
}

/// Match the `<STATE|MODE:positions[|...]>` status-report shape.
fn parse_status_report(line: &str) -> Option<StatusFields<'_>> {
    let inner = line.strip_prefix('<')?.strip_suffix('>')?;
    let mut segments = inner.split('|');

    let state = segments.next()?;
    if state.is_empty() {
        return None;
    }

    let (mode, positions) = segments.next()?.split_once(':')?;
    if mode.is_empty() {
        return None;
    }

    let mut fields = StatusFields {
        state,
        mode,
        positions,
        feed_rate: None,
        spindle_speed: None,
        offset: None,
    };

    for segment in segments {
        if let Some(fs) = segment.strip_prefix("FS:") {
            if let Some((feed, speed)) = fs.split_once(',') {
                fields.feed_rate = feed.trim().parse::<f64>().ok();
                fields.spindle_speed = speed.trim().parse::<u32>().ok();
            }
        } else if let Some(wco) = segment.strip_prefix("WCO:") {
            fields.offset = Some(wco);
        }
    }

    Some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_ok() {
        assert_eq!(classify("ok"), Some(Response::Ok));
        assert_eq!(classify("ok extra"), Some(Response::Ok));
    }

    #[test]
    fn test_classify_error() {
        assert_eq!(classify("error"), Some(Response::Error));
        assert_eq!(classify("error:23"), Some(Response::Error));
    }

    #[test]
    fn test_classify_status_report() {
        let response = classify("<Idle|MPos:10.000,20.000,30.000>").unwrap();
        assert_eq!(response.kind(), ResponseKind::Status);

        if let Response::Status(fields) = response {
            assert_eq!(fields.state, "Idle");
            assert_eq!(fields.mode, "MPos");
            assert_eq!(fields.positions, "10.000,20.000,30.000");
            assert_eq!(fields.feed_rate, None);
            assert_eq!(fields.offset, None);
        }
    }

    #[test]
    fn test_classify_status_with_extensions() {
        let line = "<Run|WPos:1.0,2.0,3.0|FS:1500.0,8000|WCO:5.0,0.0,-2.5>";
        if let Some(Response::Status(fields)) = classify(line) {
            assert_eq!(fields.mode, "WPos");
            assert_eq!(fields.feed_rate, Some(1500.0));
            assert_eq!(fields.spindle_speed, Some(8000));
            assert_eq!(fields.offset, Some("5.0,0.0,-2.5"));
        } else {
            panic!("expected status");
        }
    }

    #[test]
    fn test_classify_status_with_substate() {
        if let Some(Response::Status(fields)) = classify("<Hold:0|MPos:0,0,0>") {
            assert_eq!(fields.state, "Hold:0");
        } else {
            panic!("expected status");
        }
    }

    #[test]
    fn test_classify_ignores_unknown_segments() {
        if let Some(Response::Status(fields)) = classify("<Idle|MPos:0,0,0|Bf:15,128|Ov:100,100,100>") {
            assert_eq!(fields.feed_rate, None);
            assert_eq!(fields.offset, None);
        } else {
            panic!("expected status");
        }
    }

    #[test]
    fn test_unrecognized_lines() {
        assert_eq!(classify("Grbl 1.1h ['$' for help]"), None);
        assert_eq!(classify("[MSG:Caution: Unlocked]"), None);
        assert_eq!(classify("<Idle>"), None);
        assert_eq!(classify("<|MPos:0,0,0>"), None);
        assert_eq!(classify("<Idle|NoColonHere>"), None);
        assert_eq!(classify(""), None);
    }
}
