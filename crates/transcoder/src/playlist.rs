/// HLS playlist parsing and content-type helpers.
///
/// The VOD playlists consumed here are the extended-M3U subset ffmpeg
/// writes: directive/comment lines start with `#`, every other non-blank
/// line is a segment filename in playback order.

/// Content-Type for HLS playlists.
pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Content-Type for MPEG-TS segments.
pub const SEGMENT_CONTENT_TYPE_TS: &str = "video/MP2T";

/// Extract segment filenames from playlist text.
///
/// Returns exactly the non-blank lines not starting with `#`, trimmed, in
/// file order, duplicates included. Pure: the same text always yields the
/// same list.
pub fn parse_segments(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vod_playlist() {
        let text = "#EXTM3U\n#EXT-X-VERSION:3\n1.ts\n2.ts\n#EXT-X-ENDLIST\n";
        assert_eq!(parse_segments(text), vec!["1.ts", "2.ts"]);
    }

    #[test]
    fn skips_blank_lines_and_directives() {
        let text = "#EXTM3U\n\n  \n#EXTINF:9.0,\nseg.ts\n\n#EXT-X-ENDLIST";
        assert_eq!(parse_segments(text), vec!["seg.ts"]);
    }

    #[test]
    fn keeps_duplicates_in_order() {
        let text = "b.ts\na.ts\nb.ts\n";
        assert_eq!(parse_segments(text), vec!["b.ts", "a.ts", "b.ts"]);
    }

    #[test]
    fn parsing_is_pure() {
        let text = "#EXTM3U\n1.ts\n2.ts\n3.ts\n";
        assert_eq!(parse_segments(text), parse_segments(text));
    }

    #[test]
    fn empty_input_yields_empty_list() {
        assert_eq!(parse_segments(""), Vec::<String>::new());
        assert_eq!(parse_segments("#EXTM3U\n"), Vec::<String>::new());
    }
}
