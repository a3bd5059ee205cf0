//! Email format checks, password strength scoring and input sanitization.

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum value returned by [`password_strength_score`].
pub const MAX_STRENGTH_SCORE: u8 = 4;

/// Substrings that mark a password as following a keyboard/alphabet run.
const WEAK_SEQUENCES: [&str; 3] = ["123", "abc", "qwe"];

/// Characters removed by [`sanitize_input`].
const STRIPPED_CHARS: [char; 5] = ['<', '>', '"', '\'', '&'];

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email regex")
});

static WHITESPACE_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Which of the four password character classes a string contains.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct CharClasses {
    /// At least one ASCII lowercase letter.
    pub lowercase: bool,
    /// At least one ASCII uppercase letter.
    pub uppercase: bool,
    /// At least one ASCII digit.
    pub digit: bool,
    /// At least one character that is neither alphanumeric nor whitespace.
    pub special: bool,
}

impl CharClasses {
    /// Classify every character of `s`.
    #[must_use]
    pub fn of(s: &str) -> Self {
        s.chars().fold(Self::default(), |mut acc, c| {
            if c.is_ascii_lowercase() {
                acc.lowercase = true;
            } else if c.is_ascii_uppercase() {
                acc.uppercase = true;
            } else if c.is_ascii_digit() {
                acc.digit = true;
            } else if !c.is_alphanumeric() && !c.is_whitespace() {
                acc.special = true;
            }
            acc
        })
    }

    /// Number of classes present (0..=4).
    #[must_use]
    pub fn count(self) -> u8 {
        [self.lowercase, self.uppercase, self.digit, self.special]
            .into_iter()
            .map(u8::from)
            .sum()
    }
}

/// Light RFC 5322 check: `local@domain.tld` with an alphabetic TLD of two or
/// more letters.
#[must_use]
pub fn is_valid_email(s: &str) -> bool {
    EMAIL_RE.is_match(s)
}

/// Score a password from 0 (weak) to 4 (strong).
///
/// +1 for length ≥ 8, +1 for length ≥ 12, +1 for each character class,
/// −1 for a repeated two-character pattern, −1 for a common run such as
/// `123`, `abc` or `qwe`. The result is clamped to `0..=4`.
#[must_use]
pub fn password_strength_score(password: &str) -> u8 {
    let length = password.chars().count();
    let mut score: i32 = 0;

    if length >= 8 {
        score = score.saturating_add(1);
    }
    if length >= 12 {
        score = score.saturating_add(1);
    }
    score = score.saturating_add(i32::from(CharClasses::of(password).count()));

    if has_repeated_bigram(password) {
        score = score.saturating_sub(1);
    }
    if has_weak_sequence(password) {
        score = score.saturating_sub(1);
    }

    let clamped = score.clamp(0, i32::from(MAX_STRENGTH_SCORE));
    u8::try_from(clamped).unwrap_or(0)
}

/// Remove `<>"'&`, collapse whitespace runs to one space, and trim.
#[must_use]
pub fn sanitize_input(s: &str) -> String {
    let stripped: String = s.chars().filter(|c| !STRIPPED_CHARS.contains(c)).collect();
    WHITESPACE_RUN_RE
        .replace_all(&stripped, " ")
        .trim()
        .to_owned()
}

/// True when some two-character window reappears later in the string without
/// overlapping its first occurrence (the `(..).*\1` pattern).
fn has_repeated_bigram(s: &str) -> bool {
    let chars: Vec<char> = s.chars().collect();
    let windows: Vec<&[char]> = chars.windows(2).collect();
    windows.iter().enumerate().any(|(i, first)| {
        windows
            .iter()
            .skip(i.saturating_add(2))
            .any(|later| later == first)
    })
}

fn has_weak_sequence(s: &str) -> bool {
    let lowered = s.to_lowercase();
    WEAK_SEQUENCES.iter().any(|seq| lowered.contains(seq))
}
