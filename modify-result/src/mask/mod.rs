//! Positional mask patterns.
//!
//! A pattern is a template of [tokens](token) and literals. Processing walks the pattern and the
//! input side by side, either from the start (`reverse: false`) or from the end of both strings
//! (`reverse: true`, for values anchored to the right such as amounts). Optional recursive digit
//! groups (`#`) absorb the digits the input carries beyond what the required `0` tokens need, and
//! `$` escapes the next pattern character.
//!
//! ```text
//! apply("1234567", "000-000")                   => "123-456"
//! apply("123456", "#,##0.00") (reverse)         => "1,234.56"
//! apply("4111111111111111", "****-****-****-0000") (reverse) => "****-****-****-1111"
//! ```

mod token;

use token::REQUIRED_DIGIT;
use token::Token;
use token::token;

/// Options for [`process`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaskOptions {
    /// Scan the pattern and the value from their ends.
    ///
    /// Reverse scanning always fills missing required tokens with their defaults.
    pub reverse: bool,
    /// Fill required tokens with their default character once the input runs out.
    pub use_defaults: bool,
}

/// Outcome of [`process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Masked {
    /// The formatted value, or the partial result up to the first failure.
    pub result: String,
    /// Whether the whole pattern was satisfied.
    pub valid: bool,
}

/// Formats `value` with `pattern`.
///
/// A missing or empty value is never valid and produces an empty result.
pub fn process(value: Option<&str>, pattern: &str, options: MaskOptions) -> Masked {
    let Some(value) = value.filter(|value| !value.is_empty()) else {
        return Masked {
            result: String::new(),
            valid: false,
        };
    };
    Pattern::parse(pattern).process(value, options)
}

/// Formats `value` with `pattern`, returning only the (possibly partial) result.
pub fn apply(value: Option<&str>, pattern: &str, options: MaskOptions) -> String {
    process(value, pattern, options).result
}

/// Checks whether `value` satisfies `pattern`.
pub fn validate(value: Option<&str>, pattern: &str, options: MaskOptions) -> bool {
    process(value, pattern, options).valid
}

#[derive(Debug, Clone, Copy)]
enum Element {
    Literal(char),
    Token(&'static Token),
}

/// A pattern split into elements, with escape markers resolved.
#[derive(Debug, Clone)]
pub(crate) struct Pattern {
    elements: Vec<Element>,
    required_digits: usize,
}

impl Pattern {
    pub(crate) fn parse(pattern: &str) -> Self {
        let mut elements = Vec::with_capacity(pattern.len());
        let mut required_digits = 0;
        let mut escape_next = false;
        for character in pattern.chars() {
            if escape_next {
                escape_next = false;
                elements.push(Element::Literal(character));
                continue;
            }
            match token(character) {
                Some(token) if token.escape => escape_next = true,
                Some(token) => {
                    if character == REQUIRED_DIGIT {
                        required_digits += 1;
                    }
                    elements.push(Element::Token(token));
                }
                None => elements.push(Element::Literal(character)),
            }
        }
        // A trailing escape marker has nothing to escape and is kept as a literal.
        if escape_next {
            elements.push(Element::Literal('$'));
        }
        Pattern {
            elements,
            required_digits,
        }
    }

    pub(crate) fn process(&self, value: &str, options: MaskOptions) -> Masked {
        let mut elements = self.elements.clone();
        let mut input: Vec<char> = value.chars().collect();
        if options.reverse {
            elements.reverse();
            input.reverse();
        }
        let digits = input.iter().filter(|c| c.is_ascii_digit()).count();

        let mut scanner = Scanner {
            lookahead: Lookahead::compute(&elements),
            elements: &elements,
            input: &input,
            position: 0,
            surplus: digits.saturating_sub(self.required_digits),
            use_defaults: options.use_defaults || options.reverse,
            output: Vec::with_capacity(elements.len()),
        };
        let valid = scanner.run();

        if options.reverse {
            scanner.output.reverse();
        }
        Masked {
            result: scanner.output.into_iter().collect(),
            valid,
        }
    }
}

/// Per element facts about the elements that follow it in scan order.
struct Lookahead {
    required_token: Vec<bool>,
    any_token: Vec<bool>,
}

impl Lookahead {
    fn compute(elements: &[Element]) -> Self {
        let mut required_token = vec![false; elements.len()];
        let mut any_token = vec![false; elements.len()];
        let mut required_seen = false;
        let mut token_seen = false;
        for (index, element) in elements.iter().enumerate().rev() {
            required_token[index] = required_seen;
            any_token[index] = token_seen;
            if let Element::Token(token) = element {
                token_seen = true;
                required_seen |= !token.optional;
            }
        }
        Lookahead {
            required_token,
            any_token,
        }
    }
}

struct Scanner<'a> {
    elements: &'a [Element],
    lookahead: Lookahead,
    input: &'a [char],
    position: usize,
    surplus: usize,
    use_defaults: bool,
    output: Vec<char>,
}

impl Scanner<'_> {
    /// Walks the whole pattern, then replays the recursive group while surplus digits remain.
    fn run(&mut self) -> bool {
        for index in 0..self.elements.len() {
            if !self.step(index) {
                return false;
            }
        }

        let Some(group) = self.recursive_group() else {
            return true;
        };
        // Input left over once the pattern is done must be absorbed by the recursive group.
        while self.peek().is_some() {
            if self.surplus == 0 {
                return false;
            }
            let before = self.position;
            for index in group.clone() {
                if self.peek().is_none() {
                    return true;
                }
                if !self.step(index) {
                    return false;
                }
            }
            if self.position == before {
                break;
            }
        }
        true
    }

    /// The span between the first and the last recursive token, in scan order.
    fn recursive_group(&self) -> Option<std::ops::RangeInclusive<usize>> {
        let is_recursive =
            |element: &Element| matches!(element, Element::Token(token) if token.recursive);
        let first = self.elements.iter().position(is_recursive)?;
        let last = self.elements.iter().rposition(is_recursive)?;
        Some(first..=last)
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    /// Processes one pattern element. Returns `false` when a token rejects the current character,
    /// or when a required token is left without input and without a default.
    fn step(&mut self, index: usize) -> bool {
        let next = self.peek();
        match self.elements[index] {
            Element::Literal(literal) => match next {
                Some(next) => {
                    self.output.push(literal);
                    if next == literal {
                        self.position += 1;
                    }
                }
                // Once the input is exhausted, literals are only kept when they separate default
                // filled tokens or close the pattern.
                None => {
                    if self.lookahead.required_token[index] || !self.lookahead.any_token[index] {
                        self.output.push(literal);
                    }
                }
            },
            Element::Token(token) => match next {
                Some(next) if token.matches(Some(next)) => {
                    if !token.optional {
                        self.output.push(token.transform(next));
                        self.position += 1;
                    } else if self.surplus > 0 {
                        self.output.push(token.transform(next));
                        self.position += 1;
                        self.surplus -= 1;
                    }
                }
                Some(_) => return false,
                // Defaults only stand in for input that ran out.
                None if !token.optional => match token.default.filter(|_| self.use_defaults) {
                    Some(default) => self.output.push(default),
                    None => return false,
                },
                None => {}
            },
        }
        true
    }
}
