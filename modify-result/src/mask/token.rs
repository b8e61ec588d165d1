//! The fixed token vocabulary of mask patterns.

/// A pattern character with a special meaning.
///
/// Any pattern character without a token is a literal and is copied to the output as-is.
#[derive(Debug)]
pub(crate) struct Token {
    matches: fn(char) -> bool,
    /// Filler used when the input runs out and defaults are enabled.
    pub(crate) default: Option<char>,
    /// May be skipped when the input has no surplus digits.
    pub(crate) optional: bool,
    /// May repeat to absorb surplus digits.
    pub(crate) recursive: bool,
    transform: Option<fn(char) -> char>,
    /// The next pattern character is a literal.
    pub(crate) escape: bool,
}

impl Token {
    pub(crate) fn matches(&self, character: Option<char>) -> bool {
        character.is_some_and(self.matches)
    }

    pub(crate) fn transform(&self, character: char) -> char {
        self.transform.map_or(character, |transform| transform(character))
    }
}

static DIGIT: Token = Token {
    matches: |c| c.is_ascii_digit(),
    default: Some('0'),
    optional: false,
    recursive: false,
    transform: None,
    escape: false,
};

static OPTIONAL_DIGIT: Token = Token {
    matches: |c| c.is_ascii_digit(),
    default: None,
    optional: true,
    recursive: true,
    transform: None,
    escape: false,
};

static ALPHANUMERIC: Token = Token {
    matches: |c| c.is_ascii_alphanumeric(),
    default: None,
    optional: false,
    recursive: false,
    transform: None,
    escape: false,
};

static ANY: Token = Token {
    matches: |_| true,
    default: None,
    optional: false,
    recursive: false,
    transform: None,
    escape: false,
};

static UPPERCASE: Token = Token {
    matches: |c| c.is_ascii_alphabetic(),
    default: None,
    optional: false,
    recursive: false,
    transform: Some(|c| c.to_ascii_uppercase()),
    escape: false,
};

static LOWERCASE: Token = Token {
    matches: |c| c.is_ascii_alphabetic(),
    default: None,
    optional: false,
    recursive: false,
    transform: Some(|c| c.to_ascii_lowercase()),
    escape: false,
};

static REDACTED: Token = Token {
    matches: |_| true,
    default: Some('*'),
    optional: false,
    recursive: false,
    transform: Some(|_| '*'),
    escape: false,
};

static ESCAPE: Token = Token {
    matches: |_| false,
    default: None,
    optional: false,
    recursive: false,
    transform: None,
    escape: true,
};

pub(crate) const REQUIRED_DIGIT: char = '0';

/// Looks up the token for a pattern character.
pub(crate) fn token(character: char) -> Option<&'static Token> {
    match character {
        REQUIRED_DIGIT => Some(&DIGIT),
        '#' => Some(&OPTIONAL_DIGIT),
        'A' => Some(&ALPHANUMERIC),
        'S' => Some(&ANY),
        'U' => Some(&UPPERCASE),
        'L' => Some(&LOWERCASE),
        '*' => Some(&REDACTED),
        '$' => Some(&ESCAPE),
        _ => None,
    }
}
