//! MPD rendering.

use std::fmt::{self, Write};
use std::time::Duration;

use sf_core::{round_to_millis, Error, Result, StreamType};

use super::types::{
    timeline_entries, AdaptationSet, Mpd, Representation, SegmentAddressing, TimelinePosition,
};

const INITIALIZATION_TEMPLATE: &str = "$RepresentationID$/init.mp4";
const MEDIA_TEMPLATE: &str = "$RepresentationID$/$Number$.m4s";

/// Render a duration as `PT{h}H{m}M{s}.{ms}S`.
///
/// The duration is rounded to the millisecond first. The millisecond part is
/// printed as a plain integer without zero padding, so 3.045 s renders as
/// `3.45`; players that consumed earlier versions of this server depend on
/// exactly this form.
pub fn format_duration(d: Duration) -> String {
    let total_ms = round_to_millis(d).as_millis();
    let hours = total_ms / 3_600_000;
    let minutes = total_ms % 3_600_000 / 60_000;
    let seconds = total_ms % 60_000 / 1000;
    let millis = total_ms % 1000;
    format!("PT{hours}H{minutes}M{seconds}.{millis}S")
}

/// Check that every representation carries usable timing data.
///
/// Fails with [`Error::Manifest`] on an empty period, a zero duration, an
/// empty or zero-width timeline, a timeline that does not add up to the
/// presentation duration, or a video rendition without dimensions.
pub fn validate(mpd: &Mpd) -> Result<()> {
    if mpd.adaptation_sets.is_empty() {
        return Err(Error::Manifest("period has no adaptation sets".into()));
    }
    if mpd.duration.is_zero() {
        return Err(Error::Manifest("presentation duration is zero".into()));
    }

    for set in &mpd.adaptation_sets {
        if set.representations.is_empty() {
            return Err(Error::Manifest(format!(
                "stream {} has no representations",
                set.stream_index
            )));
        }
        for repr in &set.representations {
            validate_representation(mpd.duration, set, repr)?;
        }
    }
    Ok(())
}

fn validate_representation(total: Duration, set: &AdaptationSet, repr: &Representation) -> Result<()> {
    let context = |msg: &str| {
        Error::Manifest(format!(
            "stream {} representation {}: {msg}",
            set.stream_index, repr.id
        ))
    };

    match &repr.addressing {
        SegmentAddressing::Timeline(durations) => {
            if durations.is_empty() {
                return Err(context("empty segment timeline"));
            }
            if let Some(i) = durations.iter().position(|d| d.as_millis() == 0) {
                return Err(context(&format!("segment {i} has zero duration")));
            }
            let sum: Duration = durations.iter().sum();
            if round_to_millis(sum) != round_to_millis(total) {
                return Err(context(&format!(
                    "timeline sums to {}ms, presentation is {}ms",
                    sum.as_millis(),
                    total.as_millis()
                )));
            }
        }
        SegmentAddressing::Fixed(d) => {
            if d.as_millis() == 0 {
                return Err(context("fixed segment duration is zero"));
            }
        }
        SegmentAddressing::SingleFile(url) => {
            if url.is_empty() {
                return Err(context("empty track URL"));
            }
        }
    }

    if set.stream_type == StreamType::Video {
        let has_dims = matches!((repr.width, repr.height), (Some(w), Some(h)) if w > 0 && h > 0);
        if !has_dims {
            return Err(context("video rendition without width/height"));
        }
    }
    Ok(())
}

/// Validate and render an MPD document.
pub fn render_mpd(mpd: &Mpd) -> Result<String> {
    validate(mpd)?;
    let mut out = String::new();
    write_mpd(&mut out, mpd).map_err(|e| Error::Internal(format!("MPD write failed: {e}")))?;
    Ok(out)
}

fn write_mpd(out: &mut String, mpd: &Mpd) -> fmt::Result {
    let duration = format_duration(mpd.duration);

    writeln!(out, r#"<?xml version="1.0" encoding="utf-8"?>"#)?;
    writeln!(out, r#"<MPD xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#)?;
    writeln!(out, r#"     xmlns="urn:mpeg:dash:schema:mpd:2011""#)?;
    writeln!(out, r#"     xmlns:xlink="http://www.w3.org/1999/xlink""#)?;
    writeln!(
        out,
        r#"     xsi:schemaLocation="urn:mpeg:dash:schema:mpd:2011 http://standards.iso.org/ittf/PubliclyAvailableStandards/MPEG-DASH_schema_files/DASH-MPD.xsd""#
    )?;
    writeln!(out, r#"     profiles="urn:mpeg:dash:profile:isoff-live:2011""#)?;
    writeln!(out, r#"     type="static""#)?;
    writeln!(out, r#"     mediaPresentationDuration="{duration}""#)?;
    writeln!(out, r#"     maxSegmentDuration="PT10S""#)?;
    writeln!(out, r#"     minBufferTime="PT30S">"#)?;
    writeln!(out, r#"  <Period start="PT0S" id="0" duration="{duration}">"#)?;

    for set in &mpd.adaptation_sets {
        write_adaptation_set(out, set)?;
    }

    writeln!(out, "  </Period>")?;
    writeln!(out, "</MPD>")
}

fn write_adaptation_set(out: &mut String, set: &AdaptationSet) -> fmt::Result {
    write!(
        out,
        r#"    <AdaptationSet contentType="{}""#,
        set.stream_type.content_type()
    )?;
    if let Some(lang) = &set.language {
        write!(out, r#" lang="{}""#, escape_attr(lang))?;
    }
    writeln!(out, ">")?;
    writeln!(out, "      <BaseURL>{}/</BaseURL>", set.stream_index)?;

    for repr in &set.representations {
        write_representation(out, repr)?;
    }

    writeln!(out, "    </AdaptationSet>")
}

fn write_representation(out: &mut String, repr: &Representation) -> fmt::Result {
    write!(
        out,
        r#"      <Representation id="{}" mimeType="{}" codecs="{}""#,
        escape_attr(&repr.id),
        repr.mime_type,
        escape_attr(&repr.codecs)
    )?;
    if let Some(bandwidth) = repr.bandwidth {
        write!(out, r#" bandwidth="{bandwidth}""#)?;
    }
    if let Some(width) = repr.width {
        write!(out, r#" width="{width}""#)?;
    }
    if let Some(height) = repr.height {
        write!(out, r#" height="{height}""#)?;
    }
    if let Some(rate) = repr.audio_sampling_rate {
        write!(out, r#" audioSamplingRate="{rate}""#)?;
    }
    writeln!(out, ">")?;

    match &repr.addressing {
        SegmentAddressing::Timeline(durations) => {
            writeln!(
                out,
                r#"        <SegmentTemplate timescale="1000" initialization="{INITIALIZATION_TEMPLATE}" media="{MEDIA_TEMPLATE}" startNumber="0">"#
            )?;
            writeln!(out, "          <SegmentTimeline>")?;
            for (position, d) in timeline_entries(durations) {
                write_timeline_entry(out, position, d)?;
            }
            writeln!(out, "          </SegmentTimeline>")?;
            writeln!(out, "        </SegmentTemplate>")?;
        }
        SegmentAddressing::Fixed(d) => {
            writeln!(
                out,
                r#"        <SegmentTemplate timescale="1000" duration="{}" initialization="{INITIALIZATION_TEMPLATE}" media="{MEDIA_TEMPLATE}" startNumber="0"/>"#,
                d.as_millis()
            )?;
        }
        SegmentAddressing::SingleFile(url) => {
            writeln!(out, "        <BaseURL>{}</BaseURL>", escape_text(url))?;
        }
    }

    writeln!(out, "      </Representation>")
}

fn write_timeline_entry(out: &mut String, position: TimelinePosition, d: Duration) -> fmt::Result {
    match position {
        TimelinePosition::First => {
            writeln!(out, r#"            <S t="0" d="{}"/>"#, d.as_millis())
        }
        TimelinePosition::Rest => writeln!(out, r#"            <S d="{}"/>"#, d.as_millis()),
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}
