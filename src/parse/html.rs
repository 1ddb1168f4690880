//! Extracts video metadata and per-segment analytics from annotated HTML (C2).

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::models::VideoMetadata;

use super::{ParseWarning, ParsedSegment, ParsedVideo};

static DATE_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"([a-z]+-\d{1,2}-\d{4})").unwrap(),
        Regex::new(r"(\d{1,2}-\d{1,2}-\d{4})").unwrap(),
        Regex::new(r"(\d{4}-\d{1,2}-\d{1,2})").unwrap(),
    ]
});
static DATE_IN_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Z][a-z]+\s+\d{1,2},\s+\d{4})").unwrap());
static VIDEO_ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"/video/(\d+)/\d+-\d+\.jpg").unwrap());
static VIMEO_ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"player\.vimeo\.com/video/(\d+)").unwrap());
static TIMESTAMP_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2}:\d{2}:\d{2})-(\d{2}:\d{2}:\d{2})\s*\((\d+)\s*sec\)").unwrap());

static MODERATION_PATTERNS: Lazy<[(&'static str, Regex); 5]> = Lazy::new(|| {
    [
        ("harassment", Regex::new(r"Harassment\s+([\d.]+)").unwrap()),
        ("hate", Regex::new(r"Hate\s+([\d.]+)").unwrap()),
        ("self_harm", Regex::new(r"Self-?harm\s+([\d.]+)").unwrap()),
        ("sexual", Regex::new(r"Sexual\s+([\d.]+)").unwrap()),
        ("violence", Regex::new(r"Violence\s+([\d.]+)").unwrap()),
    ]
});

static READABILITY_PATTERNS: Lazy<[(&'static str, Regex); 6]> = Lazy::new(|| {
    [
        ("flesch_kincaid_grade", Regex::new(r"Flesch-Kincaid Grade\s+([\d.]+)").unwrap()),
        ("gunning_fog_index", Regex::new(r"Gunning Fog\s+([\d.]+)").unwrap()),
        ("coleman_liau_index", Regex::new(r"Coleman-Liau\s+([\d.]+)").unwrap()),
        ("automated_readability_index", Regex::new(r"Automated Readability\s+([\d.]+)").unwrap()),
        ("smog_index", Regex::new(r"SMOG\s+([\d.]+)").unwrap()),
        ("flesch_reading_ease", Regex::new(r"Flesch Reading Ease\s+([\d.]+)").unwrap()),
    ]
});

/// `(pattern, rank level)`; the rank value itself is computed from the score.
static STRESS_PATTERNS: Lazy<[(Regex, &'static str); 6]> = Lazy::new(|| {
    [
        (Regex::new(r"(?i)High Stress\s+([\d.]+)").unwrap(), "high"),
        (Regex::new(r"(?i)Medium Stress\s+([\d.]+)").unwrap(), "medium"),
        (Regex::new(r"(?i)Low Stress\s+([\d.]+)").unwrap(), "low"),
        (Regex::new(r"(?i)Stress Score\s+([\d.]+)").unwrap(), "neutral"),
        (Regex::new(r"(?i)StressLens\s+([\d.]+)").unwrap(), "neutral"),
        (Regex::new(r"(?i)Stress\s+([\d.]+)").unwrap(), "neutral"),
    ]
});

static PLACE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    let raw: &[(&str, &str)] = &[
        ("white-house", "White House"),
        ("mar-a-lago", "Mar-a-Lago"),
        ("trump-tower", "Trump Tower"),
        ("oval-office", "Oval Office"),
        ("rose-garden", "Rose Garden"),
        ("camp-david", "Camp David"),
        ("florida", "Florida"),
        ("texas", "Texas"),
        ("california", "California"),
        ("new-york", "New York"),
        ("nevada", "Nevada"),
        ("pennsylvania", "Pennsylvania"),
        ("georgia", "Georgia"),
        ("arizona", "Arizona"),
        ("michigan", "Michigan"),
        ("wisconsin", "Wisconsin"),
        ("north-carolina", "North Carolina"),
        ("ohio", "Ohio"),
        ("virginia", "Virginia"),
        ("iowa", "Iowa"),
        ("new-hampshire", "New Hampshire"),
        ("miami", "Miami"),
        ("tampa", "Tampa"),
        ("orlando", "Orlando"),
        ("phoenix", "Phoenix"),
        ("las-vegas", "Las Vegas"),
        ("atlanta", "Atlanta"),
        ("dallas", "Dallas"),
        ("houston", "Houston"),
        ("philadelphia", "Philadelphia"),
        ("detroit", "Detroit"),
        ("milwaukee", "Milwaukee"),
        ("charlotte", "Charlotte"),
        ("columbus", "Columbus"),
        ("richmond", "Richmond"),
        ("minden", "Minden"),
        ("waco", "Waco"),
        ("greenville", "Greenville"),
        ("youngstown", "Youngstown"),
        ("bedminster", "Bedminster"),
        ("washington", "Washington"),
    ];
    raw.iter()
        .map(|(pat, name)| (Regex::new(pat).unwrap(), *name))
        .collect()
});

fn selector(s: &str) -> Selector {
    Selector::parse(s).expect("static selector is valid")
}

fn extract_date_from_filename(filename: &str) -> Option<NaiveDate> {
    for pattern in DATE_PATTERNS.iter() {
        let Some(caps) = pattern.captures(filename) else { continue };
        let raw = &caps[1];
        if Regex::new(r"^[a-z]+-\d{1,2}-\d{4}$").unwrap().is_match(raw) {
            let spaced = raw.replace('-', " ");
            if let Ok(d) = NaiveDate::parse_from_str(&spaced, "%B %d %Y") {
                return Some(d);
            }
        } else if Regex::new(r"^\d{1,2}-\d{1,2}-\d{4}$").unwrap().is_match(raw) {
            if let Ok(d) = NaiveDate::parse_from_str(raw, "%m-%d-%Y") {
                return Some(d);
            }
        } else if Regex::new(r"^\d{4}-\d{1,2}-\d{1,2}$").unwrap().is_match(raw) {
            if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                return Some(d);
            }
        }
    }
    None
}

fn match_source(filename: &str) -> Option<&'static str> {
    let f = filename;
    if f.contains("fox-news") {
        Some("Fox News")
    } else if f.contains("cnn") {
        Some("CNN")
    } else if f.contains("nbc") {
        Some("NBC")
    } else if f.contains("abc") {
        Some("ABC")
    } else if f.contains("cbs") {
        Some("CBS")
    } else if f.contains("newsmax") {
        Some("Newsmax")
    } else if f.contains("white-house") || f.contains("press-briefing") {
        Some("White House")
    } else {
        None
    }
}

fn match_format(filename: &str) -> Option<&'static str> {
    let f = filename;
    if f.contains("political-rally") || f.contains("rally") {
        Some("Political Rally")
    } else if f.contains("press-briefing") || f.contains("briefing") {
        Some("Press Briefing")
    } else if f.contains("interview") {
        Some("Interview")
    } else if f.contains("speech") {
        Some("Speech")
    } else if f.contains("remarks") {
        Some("Remarks")
    } else if f.contains("debate") {
        Some("Debate")
    } else if f.contains("town-hall") {
        Some("Town Hall")
    } else if f.contains("meeting") {
        Some("Meeting")
    } else if f.contains("conference") {
        Some("Conference")
    } else {
        None
    }
}

fn match_candidate(filename: &str) -> Option<&'static str> {
    let f = filename;
    if f.contains("donald-trump") || f.contains("trump") {
        Some("Donald Trump")
    } else if f.contains("joe-biden") || f.contains("biden") {
        Some("Joe Biden")
    } else if f.contains("kamala-harris") || f.contains("harris") {
        Some("Kamala Harris")
    } else if f.contains("mike-pence") || f.contains("pence") {
        Some("Mike Pence")
    } else if f.contains("ron-desantis") || f.contains("desantis") {
        Some("Ron DeSantis")
    } else if f.contains("nikki-haley") || f.contains("haley") {
        Some("Nikki Haley")
    } else {
        None
    }
}

fn match_place(filename: &str) -> Option<&'static str> {
    PLACE_PATTERNS
        .iter()
        .find(|(pat, _)| pat.is_match(filename))
        .map(|(_, name)| *name)
}

fn derive_record_type(format: Option<&str>) -> Option<&'static str> {
    match format {
        Some("Press Briefing") | Some("Remarks") => Some("Official Statement"),
        Some("Political Rally") | Some("Speech") => Some("Campaign Event"),
        Some("Interview") => Some("Media Interview"),
        Some("Debate") => Some("Political Debate"),
        Some("Meeting") | Some("Conference") => Some("Official Meeting"),
        Some("Town Hall") => Some("Public Forum"),
        _ => None,
    }
}

fn stresslens_rank(level: &str, score: f64) -> i16 {
    if level == "high" || score >= 0.7 {
        1
    } else if level == "medium" || score >= 0.4 {
        2
    } else if level == "low" || score >= 0.2 {
        3
    } else {
        4
    }
}

/// Parse one HTML transcript file. Pure, I/O-free: the caller reads the file.
pub fn parse(filename: &str, content: &str) -> ParsedVideo {
    let document = Html::parse_document(content);
    let mut warnings = Vec::new();

    let metadata = extract_metadata(&document, filename);
    let segments = extract_segments(&document, &mut warnings);

    ParsedVideo {
        metadata,
        segments,
        warnings,
        ..Default::default()
    }
}

fn meta_content<'a>(document: &'a Html, selector_str: &str) -> Option<String> {
    let sel = selector(selector_str);
    document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.to_string())
}

fn extract_metadata(document: &Html, filename: &str) -> VideoMetadata {
    let mut title = meta_content(document, r#"meta[property="og:title"]"#).unwrap_or_default();
    if title.is_empty() {
        let sel = selector("title");
        if let Some(el) = document.select(&sel).next() {
            title = el.text().collect::<String>();
        }
    }
    title = title.replace("Roll Call Factba.se - ", "");

    let mut date = extract_date_from_filename(filename);
    if date.is_none() {
        if let Some(caps) = DATE_IN_TITLE.captures(&title) {
            date = NaiveDate::parse_from_str(&caps[1], "%B %d, %Y").ok();
        }
    }
    if date.is_none() {
        if let Some(modified) = meta_content(document, r#"meta[property="article:modified_time"]"#) {
            let normalized = modified.replace('Z', "+00:00");
            date = chrono::DateTime::parse_from_rfc3339(&normalized)
                .ok()
                .map(|dt| dt.date_naive());
        }
    }

    let source = match_source(filename).map(str::to_string);
    let format = match_format(filename).map(str::to_string);
    let candidate = match_candidate(filename).map(str::to_string);
    let place = match_place(filename).map(str::to_string);
    let record_type = derive_record_type(format.as_deref()).map(str::to_string);

    let description = meta_content(document, r#"meta[name="description"]"#);
    let url = meta_content(document, r#"meta[property="og:url"]"#);

    let mut video_thumbnail_url = None;
    let mut video_url = None;
    if let Some(thumb) = meta_content(document, r#"meta[name="twitter:image"]"#) {
        if thumb.contains("media-cdn.factba.se") {
            if let Some(caps) = VIDEO_ID_PATTERN.captures(&thumb) {
                video_url = Some(format!("https://factba.se/video/{}", &caps[1]));
            }
            video_thumbnail_url = Some(thumb);
        }
    }

    let mut vimeo_video_id = None;
    let mut vimeo_embed_url = None;
    let iframe_sel = selector(r#"iframe#vimeoPlayer"#);
    if let Some(iframe) = document.select(&iframe_sel).next() {
        if let Some(src) = iframe.value().attr("src") {
            if let Some(caps) = VIMEO_ID_PATTERN.captures(src) {
                vimeo_video_id = Some(caps[1].to_string());
                vimeo_embed_url = Some(src.to_string());
            }
        }
    }

    VideoMetadata {
        filename: filename.to_string(),
        title,
        date,
        source,
        channel: None,
        description,
        url,
        format,
        candidate,
        place,
        record_type,
        video_thumbnail_url,
        video_url,
        vimeo_video_id,
        vimeo_embed_url,
    }
}

fn extract_segments(document: &Html, warnings: &mut Vec<ParseWarning>) -> Vec<ParsedSegment> {
    let segment_sel = selector("div.mb-4.border-b.mx-6.my-4");
    let mut segments = Vec::new();

    for (idx, div) in document.select(&segment_sel).enumerate() {
        match parse_segment(div) {
            Some(segment) => segments.push(segment),
            None => warnings.push(ParseWarning {
                context: format!("segment[{idx}]"),
                message: "no transcript text found".to_string(),
            }),
        }
    }
    segments
}

fn parse_segment(div: scraper::ElementRef) -> Option<ParsedSegment> {
    let mut segment = ParsedSegment::default();

    if let Some(id_attr) = div.value().attr("id") {
        segment.segment_id = id_attr.rsplit('-').next().unwrap_or(id_attr).to_string();
    }

    let play_sel = selector("a.transcript-play-video");
    if let Some(anchor) = div.select(&play_sel).next() {
        if let Some(secs) = anchor.value().attr("data-seconds") {
            segment.video_seconds = secs.parse().ok();
        }
    }

    let h2_sel = selector("h2.text-md.inline");
    if let Some(h2) = div.select(&h2_sel).next() {
        segment.speaker_name = Some(h2.text().collect::<String>().trim().to_string());
    }

    let span_sel = selector("span.text-xs.text-gray-600.inline.ml-2");
    if let Some(span) = div.select(&span_sel).next() {
        let text = span.text().collect::<String>();
        if let Some(caps) = TIMESTAMP_PATTERN.captures(text.trim()) {
            segment.timestamp_start = Some(caps[1].to_string());
            segment.timestamp_end = Some(caps[2].to_string());
            segment.duration_seconds = caps[3].parse().ok();
        }
    }

    let text_sel = selector("div.flex-auto.text-md.text-gray-600.leading-loose");
    if let Some(text_div) = div.select(&text_sel).next() {
        segment.transcript_text = text_div.text().collect::<String>().trim().to_string();
    }

    extract_analytics(div, &mut segment);

    if segment.transcript_text.is_empty() {
        return None;
    }
    segment.word_count = crate::models::TranscriptSegment::word_count_of(&segment.transcript_text);
    segment.char_count = crate::models::TranscriptSegment::char_count_of(&segment.transcript_text);
    Some(segment)
}

fn extract_analytics(div: scraper::ElementRef, segment: &mut ParsedSegment) {
    let details_sel = selector(r#"div[x-show="openDetails"]"#);
    let Some(details) = div.select(&details_sel).next() else {
        extract_stresslens(div, segment);
        return;
    };

    extract_sentiment(details, segment);
    extract_moderation(details, segment);
    extract_topic(details, segment);
    extract_readability(details, segment);
    extract_stresslens(div, segment);
}

fn extract_sentiment(details: scraper::ElementRef, segment: &mut ParsedSegment) {
    let sel = selector("div.mb-4.flex.gap-2");
    for div in details.select(&sel) {
        let text = div.text().collect::<String>();
        let trimmed = text.trim();
        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }
        let score = parts[parts.len() - 2].parse::<f64>().ok();
        let label = parts[parts.len() - 1].to_string();
        if trimmed.contains("Loughran McDonald") {
            segment.sentiment_loughran_score = score;
            if score.is_some() {
                segment.sentiment_loughran_label = Some(label);
            }
        } else if trimmed.contains("Harvard") {
            segment.sentiment_harvard_score = score;
            if score.is_some() {
                segment.sentiment_harvard_label = Some(label);
            }
        } else if trimmed.contains("VADER") {
            segment.sentiment_vader_score = score;
            if score.is_some() {
                segment.sentiment_vader_label = Some(label);
            }
        }
    }
}

fn extract_moderation(details: scraper::ElementRef, segment: &mut ParsedSegment) {
    let sel = selector("div.mb-4");
    for div in details.select(&sel) {
        let text = div.text().collect::<String>();
        for (field, pattern) in MODERATION_PATTERNS.iter() {
            let Some(caps) = pattern.captures(&text) else { continue };
            let Ok(value) = caps[1].parse::<f64>() else { continue };
            match *field {
                "harassment" => segment.moderation_harassment = Some(value),
                "hate" => segment.moderation_hate = Some(value),
                "self_harm" => segment.moderation_self_harm = Some(value),
                "sexual" => segment.moderation_sexual = Some(value),
                "violence" => segment.moderation_violence = Some(value),
                _ => {}
            }
        }
    }

    let scores = [
        segment.moderation_harassment,
        segment.moderation_hate,
        segment.moderation_self_harm,
        segment.moderation_sexual,
        segment.moderation_violence,
    ];
    let max_score = scores.into_iter().flatten().fold(None, |acc: Option<f64>, v| {
        Some(acc.map_or(v, |a| a.max(v)))
    });
    segment.moderation_overall_score = max_score;
}

fn extract_topic(details: scraper::ElementRef, segment: &mut ParsedSegment) {
    let sel = selector("div.flex.gap-2.py-2.border-b");
    for div in details.select(&sel) {
        let text = div.text().collect::<String>();
        if let Some(idx) = text.find("Topic:") {
            segment.primary_topic = Some(text[idx + "Topic:".len()..].trim().to_string());
            break;
        }
    }
}

fn extract_readability(details: scraper::ElementRef, segment: &mut ParsedSegment) {
    let sel = selector("div.mb-4");
    for div in details.select(&sel) {
        let text = div.text().collect::<String>();
        for (field, pattern) in READABILITY_PATTERNS.iter() {
            let Some(caps) = pattern.captures(&text) else { continue };
            let Ok(value) = caps[1].parse::<f64>() else { continue };
            match *field {
                "flesch_kincaid_grade" => segment.flesch_kincaid_grade = Some(value),
                "gunning_fog_index" => segment.gunning_fog_index = Some(value),
                "coleman_liau_index" => segment.coleman_liau_index = Some(value),
                "automated_readability_index" => segment.automated_readability_index = Some(value),
                "smog_index" => segment.smog_index = Some(value),
                "flesch_reading_ease" => segment.flesch_reading_ease = Some(value),
                _ => {}
            }
        }
    }
}

fn extract_stresslens(div: scraper::ElementRef, segment: &mut ParsedSegment) {
    let sel = selector("div.hidden.sm\\:block");
    for stress_div in div.select(&sel) {
        let text = stress_div.text().collect::<String>();
        for (pattern, level) in STRESS_PATTERNS.iter() {
            let Some(caps) = pattern.captures(&text) else { continue };
            let Ok(score) = caps[1].parse::<f64>() else { continue };
            let score = score.clamp(0.0, 1.0);
            segment.stresslens_score = Some(score);
            segment.stresslens_rank = Some(stresslens_rank(level, score));
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_facets_from_filename() {
        let filename = "donald-trump-political-rally-miami-8-13-2025.html";
        assert_eq!(match_candidate(filename), Some("Donald Trump"));
        assert_eq!(match_format(filename), Some("Political Rally"));
        assert_eq!(match_place(filename), Some("Miami"));
        assert_eq!(
            derive_record_type(match_format(filename)),
            Some("Campaign Event")
        );
    }

    #[test]
    fn parses_month_day_year_date() {
        let d = extract_date_from_filename("donald-trump-political-rally-miami-8-13-2025.html");
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 8, 13)); // "8-13-2025" matches mm-dd-yyyy
        let d2 = extract_date_from_filename("speech-august-13-2025.html");
        assert_eq!(d2, NaiveDate::from_ymd_opt(2025, 8, 13));
    }

    #[test]
    fn parses_mm_dd_yyyy_date() {
        let d = extract_date_from_filename("remarks-08-13-2025.html");
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 8, 13));
    }

    #[test]
    fn happy_path_html_segment() {
        let html = r#"
        <html><head>
        <meta property="og:title" content="Roll Call Factba.se - Trump Rally" />
        </head><body>
        <div class="mb-4 border-b mx-6 my-4" id="segment-1">
          <a class="transcript-play-video" data-seconds="10"></a>
          <h2 class="text-md inline">Speaker A</h2>
          <span class="text-xs text-gray-600 inline ml-2">00:00:10-00:00:12 (2 sec)</span>
          <div class="flex-auto text-md text-gray-600 leading-loose">This is a test.</div>
        </div>
        </body></html>
        "#;
        let parsed = parse("donald-trump-political-rally-miami-8-13-2025.html", html);
        assert_eq!(parsed.metadata.candidate.as_deref(), Some("Donald Trump"));
        assert_eq!(parsed.metadata.format.as_deref(), Some("Political Rally"));
        assert_eq!(parsed.metadata.place.as_deref(), Some("Miami"));
        assert_eq!(parsed.segments.len(), 1);
        let seg = &parsed.segments[0];
        assert_eq!(seg.video_seconds, Some(10));
        assert_eq!(seg.word_count, 4);
        assert_eq!(seg.char_count, 15);
        assert_eq!(seg.speaker_name.as_deref(), Some("Speaker A"));
    }

    #[test]
    fn skips_segment_with_no_text() {
        let html = r#"<div class="mb-4 border-b mx-6 my-4" id="segment-1"></div>"#;
        let parsed = parse("x.html", html);
        assert_eq!(parsed.segments.len(), 0);
        assert_eq!(parsed.warnings.len(), 1);
    }
}
