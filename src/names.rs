//! Canonical display form for counterparty names.
//!
//! Sole proprietors and legal entities get their form marker in front and the
//! name uppercased, people get "Surname I.O." and everything else gets a casing
//! rule by word count. Applying [`normalize_name`] to its own output changes nothing.

use crate::utils::collapse_whitespace;
use once_cell::sync::Lazy;
use regex::Regex;

const SOLE_PROPRIETOR: &str = "ИП";

const QUOTES: [char; 7] = ['"', '\'', '«', '»', '„', '“', '”'];

static SOLE_PROPRIETOR_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:индивидуальный\s+предприниматель|ип)\b").unwrap());

static LEGAL_FORM_PHRASES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"общество\s+с\s+ограниченной\s+ответственностью", "ООО"),
        (r"публичное\s+акционерное\s+общество", "ПАО"),
        (r"закрытое\s+акционерное\s+общество", "ЗАО"),
        (r"открытое\s+акционерное\s+общество", "ОАО"),
        (r"непубличное\s+акционерное\s+общество", "НАО"),
        (r"акционерное\s+общество", "АО"),
    ]
    .into_iter()
    .map(|(phrase, form)| (Regex::new(&format!(r"(?i)\b{}\b", phrase)).unwrap(), form))
    .collect()
});

// longest first, so a shorter form never matches inside a longer one at the same position
static LEGAL_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(ФГУП|ООО|ПАО|ЗАО|ОАО|НАО|АНО|ГУП|МУП|ТСЖ|НКО|АО)\b").unwrap()
});

static SURNAME_INITIALS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\p{L}[\p{L}-]+)\s+(\p{L})\s*\.\s*(\p{L})\s*\.?$").unwrap());

static INITIALS_SURNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\p{L})\s*\.\s*(\p{L})\s*\.\s*(\p{L}[\p{L}-]+)$").unwrap());

static SURNAME_INITIAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\p{L}[\p{L}-]+)\s+(\p{L})\s*\.?$").unwrap());

static INITIAL_SURNAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\p{L})\s*\.\s*(\p{L}[\p{L}-]+)$").unwrap());

/// Shape a raw name was recognized as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    SoleProprietor,
    LegalEntity,
    PersonWithInitials,
    PersonWithInitial,
    Phrase,
    Other,
}

pub fn normalize_name(raw: &str) -> String {
    classify_name(raw).1
}

/// Normalized form together with the branch that produced it.
pub fn classify_name(raw: &str) -> (NameKind, String) {
    let text = collapse_whitespace(raw);

    if let Some(name) = sole_proprietor(&text) {
        return (NameKind::SoleProprietor, name);
    }
    if let Some(name) = legal_entity(&text) {
        return (NameKind::LegalEntity, name);
    }
    if let Some(name) = person_with_initials(&text) {
        return (NameKind::PersonWithInitials, name);
    }
    if let Some(name) = person_with_initial(&text) {
        return (NameKind::PersonWithInitial, name);
    }
    if text.split(' ').count() >= 2 {
        return (NameKind::Phrase, title_case(&text));
    }
    (NameKind::Other, text.to_uppercase())
}

fn sole_proprietor(text: &str) -> Option<String> {
    let marker = SOLE_PROPRIETOR_MARKER.find(text)?;
    let remainder = if marker.start() > 0 {
        &text[..marker.start()]
    } else {
        &text[marker.end()..]
    };
    let remainder = remainder
        .replace('.', "")
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ':' | ';' | '-'))
        .to_uppercase();
    Some(join_form(SOLE_PROPRIETOR, &remainder))
}

fn legal_entity(text: &str) -> Option<String> {
    let mut text = text.to_string();
    for (phrase, form) in LEGAL_FORM_PHRASES.iter() {
        text = phrase.replace_all(&text, *form).into_owned();
    }

    let found = LEGAL_FORM.find(&text)?;
    let form = found.as_str().to_uppercase();
    let remainder = format!("{} {}", &text[..found.start()], &text[found.end()..]);
    let remainder: String = remainder.chars().filter(|c| !QUOTES.contains(c)).collect();
    Some(join_form(&form, &remainder.to_uppercase()))
}

fn join_form(form: &str, remainder: &str) -> String {
    collapse_whitespace(&format!("{} {}", form, remainder))
}

fn person_with_initials(text: &str) -> Option<String> {
    if let Some(caps) = SURNAME_INITIALS.captures(text) {
        return Some(format!(
            "{} {}.{}.",
            title_case(&caps[1]),
            caps[2].to_uppercase(),
            caps[3].to_uppercase()
        ));
    }
    let caps = INITIALS_SURNAME.captures(text)?;
    Some(format!(
        "{} {}.{}.",
        title_case(&caps[3]),
        caps[1].to_uppercase(),
        caps[2].to_uppercase()
    ))
}

fn person_with_initial(text: &str) -> Option<String> {
    if let Some(caps) = SURNAME_INITIAL.captures(text) {
        return Some(format!("{} {}.", title_case(&caps[1]), caps[2].to_uppercase()));
    }
    let caps = INITIAL_SURNAME.captures(text)?;
    Some(format!("{} {}.", title_case(&caps[2]), caps[1].to_uppercase()))
}

/// Uppercases a letter that follows a non-letter and lowercases every other letter.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut after_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if after_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            after_letter = true;
        } else {
            out.push(c);
            after_letter = false;
        }
    }
    out
}
