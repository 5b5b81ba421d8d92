use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

/// Subset of the sidecar JSON written next to each media file by the export
/// generator. Only the capture timestamp is of interest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SidecarMetadata {
    #[serde(rename = "photoTakenTime")]
    pub photo_taken_time: Option<SidecarTimestamp>,
    #[serde(rename = "creationTime")]
    pub creation_time: Option<SidecarTimestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SidecarTimestamp {
    /// unix seconds as a decimal string
    pub timestamp: String,
}

/// Long media file names get their sidecar name truncated by the export
/// generator, keeping this many characters before the json extension
const TRUNCATED_SIDECAR_STEM_LEN: usize = 46;

/// Sidecar naming conventions in the order they appeared across export
/// vintages. All of them are tried, first readable hit wins.
pub fn sidecar_candidates(media_path: &Path) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::default();
    let file_name = match media_path.file_name() {
        Some(name) => name,
        None => return candidates,
    };
    let parent = media_path.parent().unwrap_or(Path::new(""));
    candidates.push(parent.join(format!("{}.json", file_name)));
    candidates.push(parent.join(format!("{}.supplemental-metadata.json", file_name)));
    if let Some(stem) = media_path.file_stem() {
        candidates.push(parent.join(format!("{}.json", stem)));
    }
    if file_name.chars().count() > TRUNCATED_SIDECAR_STEM_LEN {
        let truncated: String = file_name.chars().take(TRUNCATED_SIDECAR_STEM_LEN).collect();
        candidates.push(parent.join(format!("{}.json", truncated)));
    }
    candidates
}

pub fn parse_sidecar_timestamp(json: &str) -> Option<DateTime<Utc>> {
    let metadata: SidecarMetadata = serde_json::from_str(json).ok()?;
    let sidecar_ts = metadata.photo_taken_time.or(metadata.creation_time)?;
    let seconds: i64 = sidecar_ts.timestamp.parse().ok()?;
    Utc.timestamp_opt(seconds, 0).single()
}

/// Recover the original capture timestamp from whichever sidecar convention
/// this export vintage used. None if no sidecar exists or none parses.
pub async fn read_sidecar_timestamp(media_path: &Path) -> Option<DateTime<Utc>> {
    for candidate in sidecar_candidates(media_path) {
        let contents = match tokio::fs::read_to_string(&candidate).await {
            Ok(contents) => contents,
            Err(_) => continue,
        };
        match parse_sidecar_timestamp(&contents) {
            Some(ts) => return Some(ts),
            None => {
                tracing::trace!(%candidate, "sidecar file without usable timestamp");
            }
        }
    }
    None
}

#[cfg(test)]
mod test {
    use camino::Utf8Path as Path;
    use claims::assert_some_eq;
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn candidates_cover_all_vintages() {
        let candidates = sidecar_candidates(Path::new("takeout/trip/IMG_0042.jpg"));
        assert!(candidates.contains(&"takeout/trip/IMG_0042.jpg.json".into()));
        assert!(candidates
            .contains(&"takeout/trip/IMG_0042.jpg.supplemental-metadata.json".into()));
        assert!(candidates.contains(&"takeout/trip/IMG_0042.json".into()));
    }

    #[test]
    fn long_names_get_a_truncated_candidate() {
        let name = format!("{}.jpg", "x".repeat(60));
        let path_string = format!("trip/{}", name);
        let candidates = sidecar_candidates(Path::new(&path_string));
        let truncated: String = name.chars().take(46).collect();
        assert!(candidates.contains(&format!("trip/{}.json", truncated).into()));
    }

    #[test]
    fn parses_photo_taken_time() {
        let json = r#"
        {
            "title": "IMG_0042.jpg",
            "photoTakenTime": { "timestamp": "1560526800", "formatted": "14.06.2019" },
            "creationTime": { "timestamp": "1600000000" }
        }
        "#;
        let expected = chrono::Utc.timestamp_opt(1560526800, 0).unwrap();
        assert_some_eq!(parse_sidecar_timestamp(json), expected);
    }

    #[test]
    fn falls_back_to_creation_time() {
        let json = r#"{ "creationTime": { "timestamp": "1600000000" } }"#;
        let expected = chrono::Utc.timestamp_opt(1600000000, 0).unwrap();
        assert_some_eq!(parse_sidecar_timestamp(json), expected);
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_sidecar_timestamp("not json"), None);
        assert_eq!(
            parse_sidecar_timestamp(r#"{ "photoTakenTime": { "timestamp": "soon" } }"#),
            None
        );
    }
}
