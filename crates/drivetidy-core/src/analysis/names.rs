/// File-name normalisation used by duplicate matching.
///
/// Remote drives accumulate copies with decorated names ("report (1).docx",
/// "Copy of notes.txt", "photo - Copy.jpg"). These helpers strip those
/// decorations, compare what remains, and decide whether a name carries
/// any information at all ("IMG_0042.jpg" does not).
use regex::Regex;
use std::sync::LazyLock;

/// Trailing copy markers, stripped repeatedly: " - Copy", " - Copy (2)",
/// "_copy", " copy 3", " (1)", " duplicate".
static COPY_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\s*-\s*copy(?:\s*\(\d+\))?|[\s_-]copy(?:\s*\d+)?|\s*\(\d+\)|\s+duplicate)$")
        .expect("copy suffix pattern is a valid regex")
});

/// A bare "_2" or "-12" counter, stripped at most once.
///
/// Needs an underscore or hyphen and at most two digits, so "budget_2023"
/// and "IMG_0042" keep their suffix.
static NUMBERED_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[_-]\d{1,2}$").expect("numbered suffix pattern is a valid regex")
});

/// Any trailing "_<digits>" run. When the stem left after removing a
/// counter still ends in one, the numbers are a date or version.
static NUMERIC_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[_-]\d+$").expect("numeric run pattern is a valid regex")
});

static COPY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^copy of\s+").expect("copy prefix pattern is a valid regex")
});

/// Words that camera apps, scanners and download folders put in names.
/// A stem made only of these (plus digits and punctuation) says nothing
/// about its content.
const GENERIC_WORDS: &[&str] = &[
    "am", "at", "audio", "capture", "clip", "dcim", "document", "download", "dsc", "dscf", "dscn",
    "export", "file", "image", "img", "mov", "mvimg", "new", "photo", "pic", "pm", "pxl",
    "recording", "scan", "screen", "screenshot", "shot", "untitled", "vid", "video", "wa",
];

/// Split a name into `(stem, extension)`.
///
/// The extension excludes the dot. Leading-dot names such as ".bashrc"
/// have no extension.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos + 1..]),
        _ => (name, ""),
    }
}

/// Remove copy markers from a stem, keeping its case.
///
/// Never returns an empty stem: "(1)" stays "(1)".
pub fn canonical_stem(stem: &str) -> &str {
    let mut current = stem.trim();
    if let Some(m) = COPY_PREFIX.find(current) {
        current = current[m.end()..].trim_start();
    }
    while let Some(m) = COPY_SUFFIX.find(current) {
        if m.start() == 0 {
            break;
        }
        current = current[..m.start()].trim_end();
    }
    if let Some(m) = NUMBERED_SUFFIX.find(current) {
        let rest = current[..m.start()].trim_end();
        if !rest.is_empty() && !NUMERIC_RUN.is_match(rest) {
            current = rest;
        }
    }
    if current.is_empty() {
        stem.trim()
    } else {
        current
    }
}

/// Full name with copy markers removed from the stem.
pub fn canonical_name(name: &str) -> String {
    let (stem, ext) = split_name(name);
    let stem = canonical_stem(stem);
    if ext.is_empty() {
        stem.to_string()
    } else {
        format!("{stem}.{ext}")
    }
}

/// Canonical stem lowercased with runs of whitespace collapsed.
pub fn loose_stem(stem: &str) -> String {
    canonical_stem(stem)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// `false` when the stem is only digits, punctuation and generic
/// camera/scanner words.
pub fn has_name_signal(stem: &str) -> bool {
    stem.split(|c: char| !c.is_alphabetic())
        .filter(|word| !word.is_empty())
        .any(|word| {
            let lower = word.to_lowercase();
            !GENERIC_WORDS.contains(&lower.as_str())
        })
}

/// Character-level Levenshtein distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// `1 - distance / longer_length`, in `[0, 1]`. Two empty strings are
/// identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}
