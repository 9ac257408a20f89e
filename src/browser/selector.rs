use std::fmt;

use crate::{Error, Result};

/// An element locator in one of the two supported selector languages.
///
/// CSS selectors are translated to XPath so that both forms resolve to the
/// same element set through a single driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl Selector {
    pub fn css(selector: impl Into<String>) -> Self {
        Selector::Css(selector.into())
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Selector::XPath(selector.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Selector::Css(s) | Selector::XPath(s) => s,
        }
    }

    pub fn to_xpath(&self) -> Result<String> {
        match self {
            Selector::XPath(xpath) => Ok(xpath.clone()),
            Selector::Css(css) => css_to_xpath(css),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translate a CSS selector into an equivalent XPath 1.0 expression.
///
/// Supports type and universal selectors, `#id`, `.class`, attribute
/// selectors (`=`, `~=`, `^=`, `$=`, `*=`, `|=`), the descendant and child
/// combinators and selector lists. Pseudo-classes are rejected.
pub fn css_to_xpath(css: &str) -> Result<String> {
    let mut parser = CssParser::new(css);
    let mut alternatives = Vec::new();
    loop {
        alternatives.push(parser.selector()?);
        parser.skip_whitespace();
        match parser.peek() {
            None => break,
            Some(',') => {
                parser.bump();
            }
            Some(c) => return Err(parser.error(format!("unexpected '{c}'"))),
        }
    }
    Ok(alternatives.join(" | "))
}

/// Quote a string as an XPath literal, falling back to `concat()` when it
/// contains both quote characters.
fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{value}'");
    }
    if !value.contains('"') {
        return format!("\"{value}\"");
    }
    let parts: Vec<String> = value
        .split('\'')
        .map(|part| format!("'{part}'"))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

struct CssParser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> CssParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::InvalidSelector {
            selector: self.source.to_string(),
            reason: reason.into(),
        }
    }

    fn selector(&mut self) -> Result<String> {
        self.skip_whitespace();
        let mut xpath = format!("descendant-or-self::{}", self.compound()?);
        loop {
            let had_whitespace = self.skip_whitespace();
            match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.bump();
                    self.skip_whitespace();
                    xpath.push('/');
                    xpath.push_str(&self.compound()?);
                }
                Some(_) if had_whitespace => {
                    xpath.push_str("/descendant-or-self::*/");
                    xpath.push_str(&self.compound()?);
                }
                Some(c) => return Err(self.error(format!("unexpected '{c}'"))),
            }
        }
        Ok(xpath)
    }

    fn compound(&mut self) -> Result<String> {
        let start = self.pos;
        let element = match self.peek() {
            Some('*') => {
                self.bump();
                "*".to_string()
            }
            Some(c) if is_ident_char(c) => self.ident()?,
            _ => "*".to_string(),
        };

        let mut conditions = Vec::new();
        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    let id = self.ident()?;
                    conditions.push(format!("@id = {}", xpath_literal(&id)));
                }
                Some('.') => {
                    self.bump();
                    let class = self.ident()?;
                    conditions.push(format!(
                        "@class and contains(concat(' ', normalize-space(@class), ' '), {})",
                        xpath_literal(&format!(" {class} "))
                    ));
                }
                Some('[') => {
                    self.bump();
                    conditions.push(self.attribute()?);
                }
                Some(':') => return Err(self.error("pseudo-classes are not supported")),
                _ => break,
            }
        }

        if self.pos == start {
            return Err(match self.peek() {
                Some(c) => self.error(format!("expected a selector at '{c}'")),
                None => self.error("expected a selector"),
            });
        }

        if conditions.is_empty() {
            Ok(element)
        } else {
            Ok(format!("{element}[{}]", conditions.join(" and ")))
        }
    }

    fn ident(&mut self) -> Result<String> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected an identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn quoted(&mut self, quote: char) -> Result<String> {
        let mut value = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(value),
                Some('\\') => match self.bump() {
                    Some(c) => value.push(c),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) => value.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn attribute(&mut self) -> Result<String> {
        self.skip_whitespace();
        let name = self.ident()?;
        let attr = format!("@{name}");
        self.skip_whitespace();

        let operator = match self.bump() {
            Some(']') => return Ok(attr),
            Some('=') => "=".to_string(),
            Some(c @ ('~' | '^' | '$' | '*' | '|')) => {
                if self.bump() != Some('=') {
                    return Err(self.error(format!("expected '=' after '{c}'")));
                }
                format!("{c}=")
            }
            Some(c) => return Err(self.error(format!("unexpected '{c}' in attribute selector"))),
            None => return Err(self.error("unterminated attribute selector")),
        };

        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                self.quoted(quote)?
            }
            _ => self.ident()?,
        };
        self.skip_whitespace();
        if self.bump() != Some(']') {
            return Err(self.error("expected ']'"));
        }

        let literal = xpath_literal(&value);
        Ok(match operator.as_str() {
            "=" => format!("{attr} = {literal}"),
            "~=" => format!(
                "{attr} and contains(concat(' ', normalize-space({attr}), ' '), {})",
                xpath_literal(&format!(" {value} "))
            ),
            "^=" => format!("{attr} and starts-with({attr}, {literal})"),
            "$=" => format!(
                "{attr} and substring({attr}, string-length({attr})-{}) = {literal}",
                value.chars().count().saturating_sub(1)
            ),
            "*=" => format!("{attr} and contains({attr}, {literal})"),
            _ => format!(
                "{attr} and ({attr} = {literal} or starts-with({attr}, {}))",
                xpath_literal(&format!("{value}-"))
            ),
        })
    }
}
