//! CSS Syntax Module Level 3: parsing stylesheets and declaration lists.
//! See <https://www.w3.org/TR/css-syntax-3/>
//!
//! Only the top level of a stylesheet is interpreted: qualified rules become
//! [`StyleRule`]s with their raw prelude and parsed declarations, at-rules are
//! kept opaque as [`AtRule`] with their name, prelude and raw block text so a
//! CSSOM layer can classify them (`@import`, `@media`, ...).
use cssparser::AtRuleParser;
use cssparser::CowRcStr;
use cssparser::DeclarationParser;
use cssparser::ParseError;
use cssparser::Parser;
use cssparser::ParserInput;
use cssparser::ParserState;
use cssparser::QualifiedRuleParser;
use cssparser::RuleBodyItemParser;
use cssparser::RuleBodyParser;
use cssparser::StyleSheetParser;

/// `name: value` with an optional `!important` flag.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Declaration {
    /// Property name. Lowercased unless it is a custom property, whose names are case-sensitive.
    pub name: String,
    /// Value text with the priority stripped.
    pub value: String,
    pub important: bool,
}

/// `prelude { declarations }`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StyleRule {
    /// Raw prelude text (typically the selector list), trimmed.
    pub prelude: String,
    /// Declarations within the rule block, in source order.
    pub declarations: Vec<Declaration>,
}

/// An at-rule kept as raw text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtRule {
    /// At-keyword without the `@`, ASCII lowercased.
    pub name: String,
    /// Raw prelude text, trimmed.
    pub prelude: String,
    /// Raw block contents, `None` for statement at-rules such as `@import`.
    pub block: Option<String>,
}

/// A top-level rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rule {
    /// A qualified rule (`selector { ... }`).
    Style(StyleRule),
    /// Any at-rule.
    At(AtRule),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stylesheet {
    /// Top-level rules in source order.
    pub rules: Vec<Rule>,
}

/// Split a trailing `!important` off `value`.
fn split_important_tail(value: &str) -> (String, bool) {
    let trimmed = value.trim();
    if let Some(pos) = trimmed.rfind("!important")
        && trimmed.get(pos..).is_some_and(|tail| tail.trim_end() == "!important")
        && let Some(prefix) = trimmed.get(..pos)
    {
        return (prefix.trim_end().to_owned(), true);
    }
    (trimmed.to_owned(), false)
}

/// Lowercase a property name, leaving custom property names untouched.
fn normalize_property_name(name: &str) -> String {
    if name.starts_with("--") {
        name.to_owned()
    } else {
        name.to_ascii_lowercase()
    }
}

/// Consume everything left in `input` and return the raw text.
fn consume_rest<'i>(input: &mut Parser<'i, '_>) -> &'i str {
    let start = input.position();
    while input.next_including_whitespace_and_comments().is_ok() {}
    input.slice_from(start)
}

/// Records each declaration's name and raw value text.
struct BodyDeclParser;

impl<'i> DeclarationParser<'i> for BodyDeclParser {
    type Declaration = Declaration;
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
        _declaration_start: &ParserState,
    ) -> Result<Self::Declaration, ParseError<'i, Self::Error>> {
        let (value, important) = split_important_tail(consume_rest(input));
        Ok(Declaration {
            name: normalize_property_name(&name),
            value,
            important,
        })
    }
}

// Nested rules inside a declaration block are dropped; the default
// implementations reject them.
impl<'i> AtRuleParser<'i> for BodyDeclParser {
    type Prelude = ();
    type AtRule = Declaration;
    type Error = ();
}

impl<'i> QualifiedRuleParser<'i> for BodyDeclParser {
    type Prelude = ();
    type QualifiedRule = Declaration;
    type Error = ();
}

impl<'i> RuleBodyItemParser<'i, Declaration, ()> for BodyDeclParser {
    fn parse_declarations(&self) -> bool {
        true
    }
    fn parse_qualified(&self) -> bool {
        false
    }
}

/// Top-level parser that builds [`Rule`] items.
struct TopLevelParser;

impl<'i> AtRuleParser<'i> for TopLevelParser {
    type Prelude = (String, String);
    type AtRule = Rule;
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        let prelude = consume_rest(input).trim().to_owned();
        Ok((name.to_ascii_lowercase(), prelude))
    }

    fn rule_without_block(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
    ) -> Result<Self::AtRule, ()> {
        let (name, prelude) = prelude;
        Ok(Rule::At(AtRule {
            name,
            prelude,
            block: None,
        }))
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::AtRule, ParseError<'i, Self::Error>> {
        let (name, prelude) = prelude;
        let block = consume_rest(input).trim().to_owned();
        Ok(Rule::At(AtRule {
            name,
            prelude,
            block: Some(block),
        }))
    }
}

impl<'i> QualifiedRuleParser<'i> for TopLevelParser {
    type Prelude = String;
    type QualifiedRule = Rule;
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::Prelude, ParseError<'i, Self::Error>> {
        Ok(consume_rest(input).trim().to_owned())
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Self::Prelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<Self::QualifiedRule, ParseError<'i, Self::Error>> {
        Ok(Rule::Style(StyleRule {
            prelude,
            declarations: parse_declarations_from_block(input),
        }))
    }
}

fn parse_declarations_from_block(block: &mut Parser<'_, '_>) -> Vec<Declaration> {
    let mut body = BodyDeclParser;
    RuleBodyParser::new(block, &mut body).flatten().collect()
}

/// Parse a full stylesheet. Invalid rules are skipped, as CSS error recovery requires.
pub fn parse_stylesheet(css: &str) -> Stylesheet {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut top = TopLevelParser;
    let rules = StyleSheetParser::new(&mut parser, &mut top)
        .flatten()
        .collect();
    Stylesheet { rules }
}

/// Parse exactly one rule, as `CSSStyleSheet.insertRule` requires.
///
/// Returns `None` when the text holds zero rules, more than one rule, or only garbage.
pub fn parse_one_rule(css: &str) -> Option<Rule> {
    let mut sheet = parse_stylesheet(css);
    if sheet.rules.len() == 1 {
        sheet.rules.pop()
    } else {
        None
    }
}

/// Parse a bare declaration list such as the body of a `style` attribute.
pub fn parse_declaration_list(text: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(text);
    let mut parser = Parser::new(&mut input);
    parse_declarations_from_block(&mut parser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_block_keeps_custom_property_case() {
        let sheet = parse_stylesheet(":root { --Primary-Color: #fff; COLOR: red }");
        let Some(Rule::Style(rule)) = sheet.rules.first() else {
            panic!("expected a style rule, got {:?}", sheet.rules);
        };
        assert_eq!(rule.prelude, ":root");
        assert_eq!(rule.declarations[0].name, "--Primary-Color");
        assert_eq!(rule.declarations[0].value, "#fff");
        assert_eq!(rule.declarations[1].name, "color");
    }

    #[test]
    fn important_is_split_off() {
        let decls = parse_declaration_list("--gap: 4px !important; margin: 0");
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].value, "4px");
        assert!(decls[0].important);
        assert!(!decls[1].important);
    }

    #[test]
    fn at_rules_are_kept_opaque() {
        let sheet = parse_stylesheet(
            "@import url(a.css); @media print { :root { --x: 1 } } p { color: blue }",
        );
        assert_eq!(sheet.rules.len(), 3);
        let Rule::At(import) = &sheet.rules[0] else {
            panic!("expected @import");
        };
        assert_eq!(import.name, "import");
        assert_eq!(import.block, None);
        let Rule::At(media) = &sheet.rules[1] else {
            panic!("expected @media");
        };
        assert_eq!(media.prelude, "print");
        assert!(media.block.as_deref().is_some_and(|block| block.contains("--x")));
    }

    #[test]
    fn parse_one_rule_rejects_lists() {
        assert!(parse_one_rule(":root { --a: 1 }").is_some());
        assert!(parse_one_rule("a {} b {}").is_none());
        assert!(parse_one_rule("   ").is_none());
    }
}
