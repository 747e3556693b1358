use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Layouts tried against the normalized text when it carries a numeric offset.
const OFFSET_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M %z",
    "%d %b %y %H:%M:%S %z",
    "%b %d %Y %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%z",
];

/// Layouts without an offset. Values are taken as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
    "%b %d %Y %H:%M:%S",
    "%b %d %Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d %b %Y", "%b %d %Y", "%Y/%m/%d"];

const WEEKDAYS: &[&str] = &[
    "mon", "monday", "tue", "tues", "tuesday", "wed", "wednesday", "thu", "thur", "thurs",
    "thursday", "fri", "friday", "sat", "saturday", "sun", "sunday",
];

const MONTHS: &[(&str, &str)] = &[
    ("january", "Jan"),
    ("february", "Feb"),
    ("march", "Mar"),
    ("april", "Apr"),
    ("may", "May"),
    ("june", "Jun"),
    ("july", "Jul"),
    ("august", "Aug"),
    ("september", "Sep"),
    ("sept", "Sep"),
    ("october", "Oct"),
    ("november", "Nov"),
    ("december", "Dec"),
];

/// Named zones seen in feeds, mapped to numeric offsets.
const ZONES: &[(&str, &str)] = &[
    ("Z", "+0000"),
    ("UT", "+0000"),
    ("UTC", "+0000"),
    ("GMT", "+0000"),
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
    ("BST", "+0100"),
    ("CET", "+0100"),
    ("CEST", "+0200"),
    ("EET", "+0200"),
    ("EEST", "+0300"),
    ("JST", "+0900"),
    ("KST", "+0900"),
    ("AEST", "+1000"),
    ("AEDT", "+1100"),
];

/// Parses a publication date the way feeds actually write them.
///
/// Strict RFC 2822 and RFC 3339 are tried first. After that the text is
/// normalized (weekday dropped even if it contradicts the date, full month
/// names abbreviated, named zones turned into offsets) and a list of common
/// layouts is tried. Values without an offset are read as UTC; a bare date is
/// midnight UTC.
///
/// Returns `None` if nothing matched.
///
/// # Examples
///
/// ```
/// use rss_combiner::util::parse_rfc822;
///
/// let dt = parse_rfc822("Tue, 03 Jun 2025 10:00:00 GMT").unwrap();
/// assert_eq!(dt.to_rfc3339(), "2025-06-03T10:00:00+00:00");
///
/// // Wrong weekday and a named US zone are tolerated
/// let dt = parse_rfc822("Sunday, 3 June 2025 10:00 EDT").unwrap();
/// assert_eq!(dt.to_rfc3339(), "2025-06-03T14:00:00+00:00");
///
/// assert!(parse_rfc822("sometime last week").is_none());
/// ```
pub fn parse_rfc822(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    let normalized = normalize(trimmed);

    if let Ok(dt) = DateTime::parse_from_rfc2822(&normalized) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Some(naive.and_utc());
        }
    }

    DATE_FORMATS.iter().find_map(|format| {
        NaiveDate::parse_from_str(&normalized, format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}

/// Formats a timestamp the way RSS 2.0 `<pubDate>` expects it.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use rss_combiner::util::format_rfc822;
///
/// let dt = Utc.with_ymd_and_hms(2025, 6, 3, 10, 0, 0).unwrap();
/// assert_eq!(format_rfc822(&dt), "Tue, 03 Jun 2025 10:00:00 GMT");
/// ```
pub fn format_rfc822(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn normalize(text: &str) -> String {
    let without_commas = text.replace(',', " ");
    let mut tokens: Vec<String> = Vec::new();

    for token in without_commas.split_whitespace() {
        let lower = token.trim_end_matches('.').to_ascii_lowercase();

        if WEEKDAYS.contains(&lower.as_str()) {
            continue;
        }
        if let Some((_, abbr)) = MONTHS.iter().find(|(name, _)| *name == lower) {
            tokens.push((*abbr).to_string());
            continue;
        }
        if let Some((_, offset)) = ZONES.iter().find(|(zone, _)| zone.eq_ignore_ascii_case(token)) {
            tokens.push((*offset).to_string());
            continue;
        }
        tokens.push(compact_offset(token).unwrap_or_else(|| token.to_string()));
    }

    tokens.join(" ")
}

/// `+05:30` -> `+0530`
fn compact_offset(token: &str) -> Option<String> {
    let bytes = token.as_bytes();
    if bytes.len() != 6 || !matches!(bytes[0], b'+' | b'-') || bytes[3] != b':' {
        return None;
    }
    let digits = [bytes[1], bytes[2], bytes[4], bytes[5]];
    if !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(format!("{}{}", &token[..3], &token[4..]))
}
