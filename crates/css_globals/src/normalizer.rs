//! Property key normalization.

use crate::Error;
use core::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// The custom property marker.
pub const PREFIX: &str = "--";

/// Upper bound on memoized keys; the memo is cleared when it fills up.
const MEMO_CAPACITY: usize = 512;

/// A user transform applied to a key before prefix handling.
pub type NormalizeFn = Rc<dyn Fn(&str) -> String>;

/// A key as a caller can spell it: a plain name, or a symbol-like key that
/// only carries an optional description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKey<'key> {
    Name(&'key str),
    Symbol(Option<&'key str>),
}

impl<'key> From<&'key str> for PropertyKey<'key> {
    fn from(name: &'key str) -> Self {
        Self::Name(name)
    }
}

impl<'key> From<&'key String> for PropertyKey<'key> {
    fn from(name: &'key String) -> Self {
        Self::Name(name)
    }
}

impl PropertyKey<'_> {
    /// The text the key stands for; a symbol without description is `""`.
    pub fn text(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Symbol(description) => description.unwrap_or(""),
        }
    }

    fn memo_key(&self) -> MemoKey {
        match self {
            Self::Name(name) => MemoKey::Name((*name).to_owned()),
            Self::Symbol(description) => MemoKey::Symbol(description.map(str::to_owned)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum MemoKey {
    Name(String),
    Symbol(Option<String>),
}

/// Maps requested keys to canonical `--name`s, memoized per original key.
pub struct NameNormalizer {
    transform: Option<NormalizeFn>,
    autoprefix: bool,
    memo: RefCell<HashMap<MemoKey, String>>,
}

impl NameNormalizer {
    pub fn new(transform: Option<NormalizeFn>, autoprefix: bool) -> Self {
        Self {
            transform,
            autoprefix,
            memo: RefCell::new(HashMap::new()),
        }
    }

    /// Canonical name for `key`.
    ///
    /// # Errors
    /// [`Error::InvalidName`] when the (transformed) key lacks the prefix and
    /// autoprefixing is off. Failures are not memoized.
    pub fn normalize<'key>(&self, key: impl Into<PropertyKey<'key>>) -> Result<String, Error> {
        let key = key.into();
        let memo_key = key.memo_key();
        if let Some(hit) = self.memo.borrow().get(&memo_key) {
            return Ok(hit.clone());
        }

        let mut name = key.text().to_owned();
        if let Some(transform) = &self.transform {
            name = transform(&name);
        }
        if !name.starts_with(PREFIX) {
            if !self.autoprefix {
                return Err(Error::InvalidName { name });
            }
            name.insert_str(0, PREFIX);
        }

        let mut memo = self.memo.borrow_mut();
        if memo.len() >= MEMO_CAPACITY {
            memo.clear();
        }
        memo.insert(memo_key, name.clone());
        Ok(name)
    }

    /// Number of memoized keys.
    pub fn memoized(&self) -> usize {
        self.memo.borrow().len()
    }
}
