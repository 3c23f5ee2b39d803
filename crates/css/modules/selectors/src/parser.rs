//! CSS selector parsing.

use crate::{
    Combinator, ComplexSelector, CompoundSelector, PseudoClass, SelectorError, SelectorList,
    SimpleSelector,
};
use core::mem::take;

#[derive(Clone, Debug, PartialEq, Eq)]
/// Internal tokenizer token kinds.
enum Tok {
    /// A combinator token like child/adjacent/general sibling.
    Combinator(Combinator),
    /// Whitespace that implies a descendant combinator.
    DescendantWS,
    /// A simple selector token.
    Simple(SimpleSelector),
}

/// Tokenizer over a single complex selector.
struct SelectorTokenizer<'src> {
    input_bytes: &'src [u8],
    index: usize,
}

impl<'src> SelectorTokenizer<'src> {
    fn new(input: &'src str) -> Self {
        Self {
            input_bytes: input.as_bytes(),
            index: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input_bytes.get(self.index).copied()
    }

    fn bump(&mut self) {
        self.index = self.index.saturating_add(1);
    }

    /// Return the next selector token, `Ok(None)` at end of input.
    fn next_token(&mut self) -> Result<Option<Tok>, String> {
        if self.skip_spaces() {
            return Ok(self.peek().map(|_| Tok::DescendantWS));
        }
        let Some(current) = self.peek() else {
            return Ok(None);
        };
        let token = match current {
            b'*' => {
                self.bump();
                Tok::Simple(SimpleSelector::Universal)
            }
            b'.' => {
                self.bump();
                Tok::Simple(SimpleSelector::Class(self.consume_ident("class")?))
            }
            b'#' => {
                self.bump();
                Tok::Simple(SimpleSelector::IdSelector(self.consume_ident("id")?))
            }
            b'[' => self.consume_attr()?,
            b':' => self.consume_pseudo()?,
            b'>' => {
                self.bump();
                Tok::Combinator(Combinator::Child)
            }
            b'+' => {
                self.bump();
                Tok::Combinator(Combinator::AdjacentSibling)
            }
            b'~' => {
                self.bump();
                Tok::Combinator(Combinator::GeneralSibling)
            }
            byte if is_ident_byte(byte) => Tok::Simple(SimpleSelector::Type(
                self.consume_ident("type")?.to_ascii_lowercase(),
            )),
            other => return Err(format!("unexpected character '{}'", char::from(other))),
        };
        Ok(Some(token))
    }

    /// Consume a non-empty identifier of ASCII alphanumerics, '-' and '_'.
    fn consume_ident(&mut self, what: &str) -> Result<String, String> {
        let start = self.index;
        while self.peek().is_some_and(is_ident_byte) {
            self.bump();
        }
        let slice = self.input_bytes.get(start..self.index).unwrap_or(&[]);
        if slice.is_empty() {
            return Err(format!("expected {what} name"));
        }
        Ok(String::from_utf8_lossy(slice).into_owned())
    }

    /// Parse `:root`, `:first-child` or `:last-child`.
    fn consume_pseudo(&mut self) -> Result<Tok, String> {
        self.bump();
        let name = self.consume_ident("pseudo-class")?.to_ascii_lowercase();
        let pseudo = match name.as_str() {
            "root" => PseudoClass::Root,
            "first-child" => PseudoClass::FirstChild,
            "last-child" => PseudoClass::LastChild,
            _ => return Err(format!("unsupported pseudo-class ':{name}'")),
        };
        Ok(Tok::Simple(SimpleSelector::Pseudo(pseudo)))
    }

    /// Parse `[name]` and `[name=value]` (quoted or unquoted).
    fn consume_attr(&mut self) -> Result<Tok, String> {
        self.bump();
        self.skip_spaces();
        let name = self.consume_ident("attribute")?.to_ascii_lowercase();
        self.skip_spaces();
        let value = if self.peek() == Some(b'=') {
            self.bump();
            self.skip_spaces();
            match self.peek() {
                Some(quote @ (b'"' | b'\'')) => {
                    self.bump();
                    Some(self.consume_quoted_attr_value(quote)?)
                }
                _ => Some(self.consume_ident("attribute value")?),
            }
        } else {
            None
        };
        self.skip_spaces();
        if self.peek() != Some(b']') {
            return Err("unterminated attribute selector".to_owned());
        }
        self.bump();
        Ok(Tok::Simple(SimpleSelector::Attribute { name, value }))
    }

    /// Consume a quoted attribute value until the matching quote byte.
    fn consume_quoted_attr_value(&mut self, quote: u8) -> Result<String, String> {
        let start = self.index;
        while self.peek().is_some_and(|byte| byte != quote) {
            self.bump();
        }
        if self.peek().is_none() {
            return Err("unterminated string".to_owned());
        }
        let slice = self.input_bytes.get(start..self.index).unwrap_or(&[]);
        self.bump();
        Ok(String::from_utf8_lossy(slice).into_owned())
    }

    /// Skip ASCII whitespace, returning whether any was skipped.
    fn skip_spaces(&mut self) -> bool {
        let start = self.index;
        while self.peek().is_some_and(|byte| byte.is_ascii_whitespace()) {
            self.bump();
        }
        self.index != start
    }
}

const fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_'
}

/// Parse a comma-separated selector list.
///
/// # Errors
/// Returns a [`SelectorError`] when the list is empty, a member is empty, or any
/// member fails [`parse_complex_selector`].
pub fn parse_selector_list(input: &str) -> Result<SelectorList, SelectorError> {
    let fail = |reason: String| SelectorError {
        input: input.to_owned(),
        reason,
    };
    let mut list = SelectorList::default();
    for part in input.split(',') {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            return Err(fail("empty selector".to_owned()));
        }
        list.selectors
            .push(parse_complex_selector(trimmed).map_err(|err| fail(err.reason))?);
    }
    Ok(list)
}

/// Parse one complex selector.
///
/// # Errors
/// Returns a [`SelectorError`] on unknown syntax, dangling combinators, or
/// empty compounds.
pub fn parse_complex_selector(input: &str) -> Result<ComplexSelector, SelectorError> {
    let fail = |reason: &str| SelectorError {
        input: input.to_owned(),
        reason: reason.to_owned(),
    };
    let mut tokens = SelectorTokenizer::new(input.trim());
    let mut current = CompoundSelector::default();
    let mut first: Option<CompoundSelector> = None;
    let mut rest: Vec<(Combinator, CompoundSelector)> = Vec::new();
    let mut pending_combinator: Option<Combinator> = None;

    while let Some(token) = tokens.next_token().map_err(|reason| fail(&reason))? {
        match token {
            Tok::Combinator(comb) => {
                if !current.simples.is_empty() {
                    close_compound(&mut first, &mut rest, pending_combinator, &mut current);
                } else if first.is_none() || pending_combinator != Some(Combinator::Descendant) {
                    // Only the whitespace before an explicit combinator may precede it.
                    return Err(fail("combinator without a left-hand selector"));
                }
                pending_combinator = Some(comb);
            }
            Tok::DescendantWS => {
                if !current.simples.is_empty() {
                    close_compound(&mut first, &mut rest, pending_combinator, &mut current);
                    pending_combinator = Some(Combinator::Descendant);
                }
            }
            Tok::Simple(simple) => current.simples.push(simple),
        }
    }

    if current.simples.is_empty() {
        return Err(fail(if first.is_some() {
            "dangling combinator"
        } else {
            "empty selector"
        }));
    }
    match first {
        None => Ok(ComplexSelector {
            first: current,
            rest,
        }),
        Some(head) => {
            rest.push((pending_combinator.unwrap_or(Combinator::Descendant), current));
            Ok(ComplexSelector { first: head, rest })
        }
    }
}

/// Move the compound under construction into `first` or onto `rest`.
fn close_compound(
    first: &mut Option<CompoundSelector>,
    rest: &mut Vec<(Combinator, CompoundSelector)>,
    pending: Option<Combinator>,
    current: &mut CompoundSelector,
) {
    let done = take(current);
    if first.is_none() {
        *first = Some(done);
    } else {
        rest.push((pending.unwrap_or(Combinator::Descendant), done));
    }
}
