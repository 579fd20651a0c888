//! RFC 6381 codec strings from ffprobe stream fields.
//!
//! DASH clients compare these strings against what they can decode, so a
//! stream that reports `h264` / `High` / level 31 must surface as
//! `avc1.64001f`, exactly as a transcoded 720p rendition would.

/// Map an ffprobe codec name plus profile/level to a DASH codec string.
///
/// Unknown codecs fall through unchanged so they can still be compared
/// against a client's list.
pub fn codec_string(codec_name: &str, profile: Option<&str>, level: Option<i64>) -> String {
    match codec_name {
        "h264" => avc1(profile, level),
        "hevc" => hvc1(profile, level),
        "aac" => match profile {
            Some("HE-AAC") => "mp4a.40.5".into(),
            Some("HE-AACv2") => "mp4a.40.29".into(),
            _ => "mp4a.40.2".into(),
        },
        "mp3" => "mp4a.6b".into(),
        "ac3" => "ac-3".into(),
        "eac3" => "ec-3".into(),
        "opus" => "opus".into(),
        "flac" => "fLaC".into(),
        "vp9" => "vp09".into(),
        "av1" => "av01".into(),
        "subrip" | "ass" | "ssa" | "webvtt" | "mov_text" => "wvtt".into(),
        other => other.to_string(),
    }
}

fn avc1(profile: Option<&str>, level: Option<i64>) -> String {
    let (profile_idc, constraints) = match profile.unwrap_or("High") {
        "Constrained Baseline" => (0x42, 0xe0),
        "Baseline" => (0x42, 0x00),
        "Main" => (0x4d, 0x40),
        "Extended" => (0x58, 0x00),
        "High 10" | "High 10 Intra" => (0x6e, 0x00),
        "High 4:2:2" | "High 4:2:2 Intra" => (0x7a, 0x00),
        "High 4:4:4 Predictive" | "High 4:4:4 Intra" => (0xf4, 0x00),
        _ => (0x64, 0x00),
    };
    // ffprobe reports e.g. 31 for level 3.1; the codec string wants 0x1f.
    let level = level.filter(|l| (1..=255).contains(l)).unwrap_or(40) as u8;
    format!("avc1.{profile_idc:02x}{constraints:02x}{level:02x}")
}

fn hvc1(profile: Option<&str>, level: Option<i64>) -> String {
    let (profile_idc, compat) = match profile.unwrap_or("Main") {
        "Main 10" => (2, 4),
        "Rext" => (4, 16),
        _ => (1, 6),
    };
    // ffprobe already reports general_level_idc (level * 30).
    let level = level.filter(|l| *l > 0).unwrap_or(120);
    format!("hvc1.{profile_idc}.{compat}.L{level}.B0")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn h264_profiles_and_levels() {
        assert_eq!(codec_string("h264", Some("High"), Some(31)), "avc1.64001f");
        assert_eq!(codec_string("h264", Some("High"), Some(40)), "avc1.640028");
        assert_eq!(codec_string("h264", Some("Main"), Some(30)), "avc1.4d401e");
        assert_eq!(
            codec_string("h264", Some("Constrained Baseline"), Some(30)),
            "avc1.42e01e"
        );
    }

    #[test]
    fn h264_missing_level_defaults_to_4_0() {
        assert_eq!(codec_string("h264", None, None), "avc1.640028");
        assert_eq!(codec_string("h264", Some("High"), Some(-99)), "avc1.640028");
    }

    #[test]
    fn hevc_strings() {
        assert_eq!(codec_string("hevc", Some("Main"), Some(93)), "hvc1.1.6.L93.B0");
        assert_eq!(codec_string("hevc", Some("Main 10"), Some(150)), "hvc1.2.4.L150.B0");
    }

    #[test]
    fn audio_strings() {
        assert_eq!(codec_string("aac", Some("LC"), None), "mp4a.40.2");
        assert_eq!(codec_string("aac", Some("HE-AAC"), None), "mp4a.40.5");
        assert_eq!(codec_string("ac3", None, None), "ac-3");
        assert_eq!(codec_string("eac3", None, None), "ec-3");
        assert_eq!(codec_string("flac", None, None), "fLaC");
    }

    #[test]
    fn subtitles_become_wvtt_and_unknown_passes_through() {
        assert_eq!(codec_string("subrip", None, None), "wvtt");
        assert_eq!(codec_string("truehd", None, None), "truehd");
    }
}
