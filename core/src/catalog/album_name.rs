use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Date-shaped folder names the export generator creates on its own:
    /// bare year, year-month, year-month-day
    static ref AUTO_DATE_SEGMENT: Regex =
        Regex::new(r"^\d{4}([-_. ]\d{2}([-_. ]\d{2})?)?$").expect("regex is valid");
    static ref PHOTOS_FROM_YEAR: Regex =
        Regex::new(r"^Photos from \d{4}$").expect("regex is valid");
}

/// Folder names the export generator uses for sweep-up content. Never albums.
const AUTO_FOLDER_NAMES: &[&str] = &["Trash", "Bin", "Archive", "Screenshots", "Downloads"];

/// Destination folder name when sanitizing leaves nothing usable
pub const PLACEHOLDER_NAME: &str = "Album";

const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Decide whether the first path segment under the archive root names a real
/// user-created album. Auto-generated date folders and fixed sweep-up folder
/// names do not.
pub fn infer_album_name(first_segment: &str) -> Option<String> {
    let trimmed = first_segment.trim();
    if trimmed.is_empty()
        || AUTO_DATE_SEGMENT.is_match(trimmed)
        || PHOTOS_FROM_YEAR.is_match(trimmed)
        || AUTO_FOLDER_NAMES
            .iter()
            .any(|auto| auto.eq_ignore_ascii_case(trimmed))
    {
        return None;
    }
    Some(trimmed.to_string())
}

/// Make an album name safe to use as a single destination folder component.
/// Traversal segments and separators are dropped, reserved filesystem
/// characters and control characters become underscores, surrounding dots and
/// spaces are trimmed. An input with nothing salvageable maps to
/// [`PLACEHOLDER_NAME`].
pub fn sanitize(album_name: &str) -> String {
    let joined = album_name
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect::<Vec<_>>()
        .join("_");
    let replaced: String = joined
        .chars()
        .map(|c| {
            if RESERVED_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| c == '.' || c == ' ');
    if trimmed.chars().any(|c| c.is_alphanumeric()) {
        trimmed.to_string()
    } else {
        PLACEHOLDER_NAME.to_string()
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn traversal_sequences_are_stripped() {
        assert_eq!(sanitize("../../etc"), "etc");
        assert_eq!(sanitize("/leading/slash"), "leading_slash");
        assert_eq!(sanitize(r"..\..\windows"), "windows");
    }

    #[test]
    fn reserved_characters_are_replaced() {
        assert_eq!(sanitize("Con:Tag*s"), "Con_Tag_s");
        assert_eq!(sanitize("what?<really>"), "what__really_");
    }

    #[test]
    fn unusable_input_maps_to_placeholder() {
        assert_eq!(sanitize("***"), PLACEHOLDER_NAME);
        assert_eq!(sanitize("../.."), PLACEHOLDER_NAME);
        assert_eq!(sanitize(""), PLACEHOLDER_NAME);
        assert_eq!(sanitize(". .."), PLACEHOLDER_NAME);
    }

    #[test]
    fn ordinary_names_pass_through() {
        assert_eq!(sanitize("Sommerurlaub 2019"), "Sommerurlaub 2019");
        assert_eq!(sanitize("trip"), "trip");
    }

    #[test]
    fn date_shaped_segments_are_not_albums() {
        assert_eq!(infer_album_name("2019"), None);
        assert_eq!(infer_album_name("2019-06"), None);
        assert_eq!(infer_album_name("2019-06-14"), None);
        assert_eq!(infer_album_name("2019_06_14"), None);
        assert_eq!(infer_album_name("Photos from 2017"), None);
    }

    #[test]
    fn sweep_up_folders_are_not_albums() {
        assert_eq!(infer_album_name("Trash"), None);
        assert_eq!(infer_album_name("screenshots"), None);
    }

    #[test]
    fn real_folder_names_are_albums() {
        assert_eq!(infer_album_name("Sommer 2019"), Some("Sommer 2019".to_string()));
        assert_eq!(infer_album_name("trip"), Some("trip".to_string()));
        // year-like but not a bare date
        assert_eq!(infer_album_name("2019 Best Of"), Some("2019 Best Of".to_string()));
    }

    proptest! {
        #[test]
        fn sanitized_never_contains_reserved_chars_or_traversal(input in ".{0,64}") {
            let sanitized = sanitize(&input);
            prop_assert!(!sanitized.contains(['/', '\\', ':', '*', '?', '"', '<', '>', '|']));
            // without separators a leading or bare ".." is the only way to
            // traverse, and both are trimmed away
            prop_assert!(!sanitized.starts_with('.'));
            prop_assert!(!sanitized.is_empty());
        }
    }
}
