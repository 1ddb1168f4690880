//! Extracts session metadata, chair, attendees, and merged utterances from
//! parliamentary VLOS XML (C3).
//!
//! The original Python implementation this was distilled from uses a much
//! simpler element-name sniff with no chair resolution or party
//! normalization; this parser follows the richer, specified grammar instead.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::{Document, Node};

use crate::models::VideoMetadata;

use super::{ParseWarning, ParsedSegment, ParsedVideo, SessionMetadata};

const NAMESPACE: &str = "http://www.tweedekamer.nl/ggm/vergaderverslag/v1.0";

static AANVANG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Aanvang\s+(\d{1,2}[.:]\d{2})\s*uur").unwrap());
static SLUITING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Sluiting\s+(\d{1,2}[.:]\d{2})\s*uur").unwrap());
static AANWEZIG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Aanwezig\s+zijn\s+(.+?)\.").unwrap());
static VERSLAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(Verslag\s+van.*)").unwrap());

static SPEAKER_LADDER: Lazy<[(Regex, &'static str); 5]> = Lazy::new(|| {
    [
        (
            Regex::new(r"(?i)^De\s+heer\s+([^(:]+?)\s*(?:\(([^)]+)\))?\s*:").unwrap(),
            "member",
        ),
        (
            Regex::new(r"(?i)^Mevrouw\s+([^(:]+?)\s*(?:\(([^)]+)\))?\s*:").unwrap(),
            "member",
        ),
        (Regex::new(r"(?i)^Minister\s+([^:]+):").unwrap(), "minister"),
        (
            Regex::new(r"(?i)^Staatssecretaris\s+([^:]+):").unwrap(),
            "staatssecretaris",
        ),
        (Regex::new(r"(?i)^De\s+voorzitter\s*:").unwrap(), "chair"),
    ]
});

static PARTY_TABLE: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("pvda", "PVDA"),
        ("christenunie", "CHRISTENUNIE"),
        ("groenlinks", "GROENLINKS"),
    ]
});

fn normalize_party(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| *c != '.').collect();
    let key = cleaned.to_lowercase();
    for (needle, mapped) in PARTY_TABLE.iter() {
        if key == *needle {
            return mapped.to_string();
        }
    }
    cleaned.to_uppercase()
}

/// Resolved speaker identity for one utterance, prior to chair rewriting.
struct SpeakerIdentity {
    name: String,
    party: Option<String>,
    is_chair_placeholder: bool,
    prefix_len: usize,
}

fn resolve_speaker(text: &str) -> SpeakerIdentity {
    for (pattern, kind) in SPEAKER_LADDER.iter() {
        if let Some(caps) = pattern.captures(text) {
            let prefix_len = caps.get(0).unwrap().end();
            return match *kind {
                "chair" => SpeakerIdentity {
                    name: "De voorzitter".to_string(),
                    party: None,
                    is_chair_placeholder: true,
                    prefix_len,
                },
                "minister" => SpeakerIdentity {
                    name: caps[1].trim().to_string(),
                    party: None,
                    is_chair_placeholder: false,
                    prefix_len,
                },
                "staatssecretaris" => SpeakerIdentity {
                    name: caps[1].trim().to_string(),
                    party: None,
                    is_chair_placeholder: false,
                    prefix_len,
                },
                _ => SpeakerIdentity {
                    name: caps[1].trim().to_string(),
                    party: caps.get(2).map(|m| normalize_party(m.as_str().trim())),
                    is_chair_placeholder: false,
                    prefix_len,
                },
            };
        }
    }
    SpeakerIdentity {
        name: "Onbekend".to_string(),
        party: None,
        is_chair_placeholder: false,
        prefix_len: 0,
    }
}

/// Strip only the leading speaker-label prefix; a trailing `Voorzitter.` is
/// addressing, not labeling, and must survive.
fn strip_leading_label(text: &str, prefix_len: usize) -> String {
    text[prefix_len..].trim().to_string()
}

/// Tag name, scoped to the VLOS namespace so elements from an embedded
/// foreign namespace never alias one of ours by name alone.
fn local_name<'a>(node: Node<'a, 'a>) -> &'a str {
    if node.tag_name().namespace() == Some(NAMESPACE) {
        node.tag_name().name()
    } else {
        ""
    }
}

fn find_descendant_text(doc: &Document, local: &str) -> Option<String> {
    doc.descendants()
        .find(|n| n.is_element() && local_name(*n) == local)
        .and_then(|n| n.text().map(|t| t.trim().to_string()))
        .filter(|t| !t.is_empty())
}

fn all_text(node: Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Walk up the ancestor chain for a `markeertijdbegin`/`markeertijdeind` pair.
fn resolve_timing_from_ancestors(node: Node) -> (Option<i32>, Option<i32>) {
    for ancestor in node.ancestors() {
        let begin = ancestor
            .children()
            .find(|c| c.is_element() && local_name(*c) == "markeertijdbegin")
            .and_then(|c| c.text())
            .and_then(iso_to_seconds_of_day);
        let end = ancestor
            .children()
            .find(|c| c.is_element() && local_name(*c) == "markeertijdeind")
            .and_then(|c| c.text())
            .and_then(iso_to_seconds_of_day);
        if begin.is_some() || end.is_some() {
            return (begin, end);
        }
    }
    (None, None)
}

fn iso_to_seconds_of_day(value: &str) -> Option<i32> {
    let dt = chrono::DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|d| d.naive_utc())
        .or_else(|| chrono::NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%dT%H:%M:%S").ok())?;
    use chrono::Timelike;
    Some((dt.hour() * 3600 + dt.minute() * 60 + dt.second()) as i32)
}

struct RawUtterance {
    text: String,
    video_seconds: Option<i32>,
    end_seconds: Option<i32>,
}

fn collect_utterances(doc: &Document) -> Vec<RawUtterance> {
    let mut nodes: Vec<Node> = doc
        .descendants()
        .filter(|n| n.is_element() && local_name(*n) == "woordvoerder")
        .collect();

    if nodes.is_empty() {
        nodes = doc
            .descendants()
            .filter(|n| {
                n.is_element()
                    && n.children()
                        .any(|c| c.is_element() && local_name(c) == "spreker")
                    && !all_text(*n).trim().is_empty()
            })
            .collect();
    }

    nodes
        .into_iter()
        .map(|n| {
            let text = all_text(n).trim().to_string();
            let own_begin = n
                .attribute("markeertijdbegin")
                .and_then(iso_to_seconds_of_day);
            let own_end = n
                .attribute("markeertijdeind")
                .and_then(iso_to_seconds_of_day);
            let (video_seconds, end_seconds) = if own_begin.is_some() || own_end.is_some() {
                (own_begin, own_end)
            } else {
                resolve_timing_from_ancestors(n)
            };
            RawUtterance {
                text,
                video_seconds,
                end_seconds,
            }
        })
        .collect()
}

/// Parse one VLOS XML file. Pure, I/O-free: the caller reads the file.
pub fn parse(filename: &str, content: &str) -> ParsedVideo {
    let mut warnings = Vec::new();

    let doc = match Document::parse(content) {
        Ok(doc) => doc,
        Err(err) => {
            warnings.push(ParseWarning {
                context: "document".to_string(),
                message: err.to_string(),
            });
            return ParsedVideo {
                metadata: VideoMetadata {
                    filename: filename.to_string(),
                    format: Some("Parliamentary Session".to_string()),
                    record_type: Some("Parliamentary Proceedings".to_string()),
                    place: Some("Den Haag, NL".to_string()),
                    ..Default::default()
                },
                segments: Vec::new(),
                warnings,
                session: SessionMetadata::default(),
            };
        }
    };

    let full_text = all_text(doc.root_element());
    let chair_name = find_descendant_text(&doc, "voorzitter");

    let start_time = AANVANG_RE
        .captures(&full_text)
        .map(|c| c[1].replace(':', "."));
    let end_time = SLUITING_RE
        .captures(&full_text)
        .map(|c| c[1].replace(':', "."));
    let summary_intro = full_text
        .split('\n')
        .find_map(|line| VERSLAG_RE.captures(line).map(|c| c[1].trim().to_string()));

    let (members, ministers) = parse_attendees(&full_text);

    let metadata = VideoMetadata {
        filename: filename.to_string(),
        title: summary_intro.clone().unwrap_or_else(|| filename.to_string()),
        date: None,
        source: Some("Tweede Kamer".to_string()),
        channel: Some("VLOS XML".to_string()),
        description: None,
        url: None,
        format: Some("Parliamentary Session".to_string()),
        candidate: None,
        place: Some("Den Haag, NL".to_string()),
        record_type: Some("Parliamentary Proceedings".to_string()),
        video_thumbnail_url: None,
        video_url: None,
        vimeo_video_id: None,
        vimeo_embed_url: None,
    };
    let session = SessionMetadata {
        chair: chair_name.clone(),
        start_time,
        end_time,
        summary_intro,
        members,
        ministers,
    };

    let raw = collect_utterances(&doc);
    let mut segments = build_segments(raw, chair_name.as_deref());

    segments.retain(|s| s.transcript_text.trim().chars().count() >= 2);

    ParsedVideo {
        metadata,
        segments,
        warnings,
        session,
    }
}

fn parse_attendees(full_text: &str) -> (Vec<String>, Vec<(String, Option<String>)>) {
    let mut members = Vec::new();
    let mut ministers = Vec::new();
    let Some(caps) = AANWEZIG_RE.captures(full_text) else {
        return (members, ministers);
    };
    for entry in caps[1].split(|c| c == ',' || c == ';') {
        let entry = entry.trim().trim_start_matches("en ").trim();
        if entry.is_empty() {
            continue;
        }
        let lower = entry.to_lowercase();
        if lower.starts_with("de heer") || lower.starts_with("mevrouw") {
            let name = entry
                .splitn(2, ' ')
                .nth(1)
                .unwrap_or(entry)
                .trim()
                .to_string();
            members.push(name);
        } else if lower.starts_with("minister") || lower.starts_with("staatssecretaris") {
            if let Some(rest) = entry.splitn(2, ' ').nth(1) {
                if let Some((portfolio, name)) = rest.split_once(' ').map(|(a, b)| (a, b)) {
                    let _ = portfolio;
                    ministers.push((name.trim().to_string(), Some(rest.trim().to_string())));
                } else {
                    ministers.push((rest.trim().to_string(), None));
                }
            }
        }
    }
    (members, ministers)
}

fn build_segments(raw: Vec<RawUtterance>, chair_name: Option<&str>) -> Vec<ParsedSegment> {
    let mut segments: Vec<ParsedSegment> = Vec::new();
    let mut seen: HashSet<(String, Option<i32>, Option<i32>, String)> = HashSet::new();
    let mut last_speaker_key: Option<String> = None;

    for utt in raw {
        let identity = resolve_speaker(&utt.text);
        let stripped = strip_leading_label(&utt.text, identity.prefix_len);
        if stripped.trim().is_empty() {
            continue;
        }

        let resolved_name = if identity.is_chair_placeholder {
            chair_name.unwrap_or("De voorzitter").to_string()
        } else {
            identity.name.clone()
        };

        let dedup_key = (
            resolved_name.clone(),
            utt.video_seconds,
            utt.end_seconds,
            stripped.clone(),
        );
        if !seen.insert(dedup_key) {
            continue;
        }

        let speaker_key = format!("{resolved_name}|{:?}", identity.party);
        let contiguous = segments.last().is_some_and(|last: &ParsedSegment| {
            Some(&speaker_key) == last_speaker_key.as_ref()
                && last.video_seconds.is_some()
                && utt.video_seconds.is_some()
                && last
                    .timestamp_end
                    .as_deref()
                    .and_then(|e| e.parse::<i32>().ok())
                    == utt.video_seconds
        });

        if contiguous {
            let last = segments.last_mut().unwrap();
            last.transcript_text.push(' ');
            last.transcript_text.push_str(&stripped);
            last.timestamp_end = utt.end_seconds.map(|s| s.to_string());
            last.word_count = crate::models::TranscriptSegment::word_count_of(&last.transcript_text);
            last.char_count = crate::models::TranscriptSegment::char_count_of(&last.transcript_text);
            continue;
        }

        segments.push(ParsedSegment {
            segment_id: format!("{}", segments.len() + 1),
            speaker_name: Some(resolved_name),
            speaker_party: identity.party,
            segment_type: crate::models::SegmentType::Spoken,
            transcript_text: stripped.clone(),
            video_seconds: utt.video_seconds,
            timestamp_start: utt.video_seconds.map(|s| s.to_string()),
            timestamp_end: utt.end_seconds.map(|s| s.to_string()),
            duration_seconds: match (utt.video_seconds, utt.end_seconds) {
                (Some(s), Some(e)) if e >= s => Some(e - s),
                _ => None,
            },
            word_count: crate::models::TranscriptSegment::word_count_of(&stripped),
            char_count: crate::models::TranscriptSegment::char_count_of(&stripped),
            ..Default::default()
        });
        last_speaker_key = Some(speaker_key);
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_party_abbreviations() {
        assert_eq!(normalize_party("P.v.d.A."), "PVDA");
        assert_eq!(normalize_party("ChristenUnie"), "CHRISTENUNIE");
        assert_eq!(normalize_party("GroenLinks"), "GROENLINKS");
        assert_eq!(normalize_party("VVD-CDA"), "VVD-CDA");
    }

    #[test]
    fn party_normalization_case_insensitive() {
        let id = resolve_speaker("De heer Van der Lee (GroenLinks): Dit is een test speech.");
        assert_eq!(id.name, "Van der Lee");
        assert_eq!(id.party.as_deref(), Some("GROENLINKS"));
    }

    #[test]
    fn strips_speaker_label_from_text() {
        let text = "De heer Van der Lee (GroenLinks): Dit is een test speech.";
        let id = resolve_speaker(text);
        let stripped = strip_leading_label(text, id.prefix_len);
        assert_eq!(stripped, "Dit is een test speech.");
    }

    #[test]
    fn chair_placeholder_resolves_to_chair_name() {
        let text = "De voorzitter: Goedemiddag allemaal.";
        let id = resolve_speaker(text);
        assert!(id.is_chair_placeholder);
        let stripped = strip_leading_label(text, id.prefix_len);
        assert_eq!(stripped, "Goedemiddag allemaal.");
    }

    #[test]
    fn fallback_speaker_is_onbekend() {
        let id = resolve_speaker("Geen idee wie dit zegt.");
        assert_eq!(id.name, "Onbekend");
    }

    #[test]
    fn drops_segments_shorter_than_two_chars() {
        let raw = vec![ParsedSegment {
            transcript_text: "a".to_string(),
            ..Default::default()
        }];
        let filtered: Vec<_> = raw
            .into_iter()
            .filter(|s| s.transcript_text.trim().chars().count() >= 2)
            .collect();
        assert!(filtered.is_empty());
    }

    #[test]
    fn parses_minimal_vlos_document() {
        let xml = r#"<?xml version="1.0"?>
        <vergadering xmlns="http://www.tweedekamer.nl/ggm/vergaderverslag/v1.0">
          <voorzitter>Aukje de Vries</voorzitter>
          <alinea>Aanvang 14.00 uur.</alinea>
          <woordvoerder markeertijdbegin="2024-01-01T14:00:16" markeertijdeind="2024-01-01T14:00:20">
            De voorzitter: Goedemiddag allemaal.
          </woordvoerder>
        </vergadering>"#;
        let parsed = parse("session.xml", xml);
        assert_eq!(parsed.segments.len(), 1);
        let seg = &parsed.segments[0];
        assert_eq!(seg.speaker_name.as_deref(), Some("Aukje de Vries"));
        assert_eq!(seg.transcript_text.trim(), "Goedemiddag allemaal.");
    }
}
