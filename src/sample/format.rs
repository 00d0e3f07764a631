//! String formats with a generator and a checker, plus pattern-derived strings.
use chrono::{DateTime, NaiveDate, SecondsFormat};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use regex_syntax::hir::{Class, Hir, HirKind};

/// Format candidates tried against a pattern before falling back to the
/// pattern-derived string.
const RECONCILE_ATTEMPTS: usize = 16;

/// Generated timestamps fall in [2020-01-01, 2025-01-01).
const EPOCH_2020: i64 = 1_577_836_800;
const FIVE_YEARS_SECS: i64 = 5 * 365 * 24 * 3600;

const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_";

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$").unwrap()
});
static JWT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_=-]+\.[A-Za-z0-9_=-]+\.[A-Za-z0-9_=-]+$").unwrap());
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());
static URI_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:[^\s]*$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownFormat {
    Uuid,
    Jwt,
    DateTime,
    Date,
    Email,
    Uri,
}

impl KnownFormat {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "uuid" => KnownFormat::Uuid,
            "jwt" => KnownFormat::Jwt,
            "date-time" => KnownFormat::DateTime,
            "date" => KnownFormat::Date,
            "email" => KnownFormat::Email,
            "uri" => KnownFormat::Uri,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KnownFormat::Uuid => "uuid",
            KnownFormat::Jwt => "jwt",
            KnownFormat::DateTime => "date-time",
            KnownFormat::Date => "date",
            KnownFormat::Email => "email",
            KnownFormat::Uri => "uri",
        }
    }

    pub fn generate<R: Rng + ?Sized>(self, rng: &mut R) -> String {
        match self {
            KnownFormat::Uuid => uuid::Builder::from_random_bytes(rng.random::<[u8; 16]>())
                .into_uuid()
                .to_string(),
            // header.payload.signature, sized like an HS256 token
            KnownFormat::Jwt => [20, 56, 40].map(|len| token(rng, len)).join("."),
            KnownFormat::DateTime => timestamp(rng).to_rfc3339_opts(SecondsFormat::Secs, true),
            KnownFormat::Date => timestamp(rng).date_naive().format("%Y-%m-%d").to_string(),
            KnownFormat::Email => format!("user{}@example.com", rng.random_range(1..10_000)),
            KnownFormat::Uri => format!("https://example.com/resource/{}", rng.random_range(1..10_000)),
        }
    }

    pub fn check(self, s: &str) -> bool {
        match self {
            KnownFormat::Uuid => UUID_RE.is_match(s),
            KnownFormat::Jwt => JWT_RE.is_match(s),
            KnownFormat::DateTime => DateTime::parse_from_rfc3339(s).is_ok(),
            KnownFormat::Date => NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
            KnownFormat::Email => EMAIL_RE.is_match(s),
            KnownFormat::Uri => URI_RE.is_match(s),
        }
    }
}

fn token<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

fn timestamp<R: Rng + ?Sized>(rng: &mut R) -> DateTime<chrono::Utc> {
    DateTime::from_timestamp(EPOCH_2020 + rng.random_range(0..FIVE_YEARS_SECS), 0).unwrap_or_default()
}

/// A value valid for `format` that also matches `pattern`, if one can be found.
pub fn reconcile<R: Rng + ?Sized>(format: KnownFormat, pattern: &str, rng: &mut R) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    for _ in 0..RECONCILE_ATTEMPTS {
        let candidate = format.generate(rng);
        if re.is_match(&candidate) {
            return Some(candidate);
        }
    }
    minimal_match(pattern).filter(|s| format.check(s))
}

/// Shortest-effort string matching `pattern`: first alternative, minimum
/// repetition count, and an alphanumeric member of each class when there is one.
/// The result is verified against the compiled pattern.
pub fn minimal_match(pattern: &str) -> Option<String> {
    let hir = regex_syntax::Parser::new().parse(pattern).ok()?;
    let mut out = String::new();
    write_minimal(&hir, &mut out)?;
    let re = Regex::new(pattern).ok()?;
    re.is_match(&out).then_some(out)
}

fn write_minimal(hir: &Hir, out: &mut String) -> Option<()> {
    match hir.kind() {
        HirKind::Empty | HirKind::Look(_) => {}
        HirKind::Literal(lit) => out.push_str(std::str::from_utf8(&lit.0).ok()?),
        HirKind::Class(class) => out.push(pick_class_member(class)?),
        HirKind::Repetition(rep) => {
            for _ in 0..rep.min {
                write_minimal(&rep.sub, out)?;
            }
        }
        HirKind::Capture(cap) => write_minimal(&cap.sub, out)?,
        HirKind::Concat(parts) => {
            for part in parts {
                write_minimal(part, out)?;
            }
        }
        HirKind::Alternation(alts) => write_minimal(alts.first()?, out)?,
    }
    Some(())
}

fn pick_class_member(class: &Class) -> Option<char> {
    let ranges: Vec<(char, char)> = match class {
        Class::Unicode(c) => c.ranges().iter().map(|r| (r.start(), r.end())).collect(),
        Class::Bytes(c) => c
            .ranges()
            .iter()
            .filter(|r| r.start().is_ascii())
            .map(|r| (r.start() as char, r.end().min(0x7f) as char))
            .collect(),
    };
    for (lo, hi) in [('a', 'z'), ('A', 'Z'), ('0', '9')] {
        for &(start, end) in &ranges {
            let first = start.max(lo);
            if first <= end.min(hi) {
                return Some(first);
            }
        }
    }
    ranges.iter().map(|&(start, _)| start).find(|c| !c.is_control()).or(ranges.first().map(|r| r.0))
}
