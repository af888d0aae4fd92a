//! Delimiter catalog.
//!
//! The fixed set of opening/closing pairs brace completion can track:
//!
//! ```text
//! { }   [ ]   ( )   < >   ' '   " "
//! ```
//!
//! Quote pairs are *symmetric*: the same character opens and closes them. A
//! tracking session tells the two roles apart purely by where the caret sits
//! relative to the closer it inserted, never by looking at syntax.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
  #[error("opening delimiter {opening:?} is registered more than once")]
  DuplicateOpening { opening: char },
}

/// An opening/closing delimiter pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DelimiterPair {
  pub opening: char,
  pub closing: char,
}

impl DelimiterPair {
  pub const fn new(opening: char, closing: char) -> Self {
    Self { opening, closing }
  }

  /// true if opening == closing
  pub const fn is_symmetric(&self) -> bool {
    self.opening == self.closing
  }
}

impl From<(char, char)> for DelimiterPair {
  fn from((opening, closing): (char, char)) -> Self {
    Self::new(opening, closing)
  }
}

impl fmt::Display for DelimiterPair {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}{}", self.opening, self.closing)
  }
}

pub const CURLY: DelimiterPair = DelimiterPair::new('{', '}');
pub const SQUARE: DelimiterPair = DelimiterPair::new('[', ']');
pub const SINGLE_QUOTE: DelimiterPair = DelimiterPair::new('\'', '\'');
pub const DOUBLE_QUOTE: DelimiterPair = DelimiterPair::new('"', '"');
pub const PAREN: DelimiterPair = DelimiterPair::new('(', ')');
pub const ANGLE: DelimiterPair = DelimiterPair::new('<', '>');

/// Every pair the catalog knows, in registration order.
pub const CATALOG: &[DelimiterPair] = &[CURLY, SQUARE, SINGLE_QUOTE, DOUBLE_QUOTE, PAREN, ANGLE];

pub fn lookup_by_opening(opening: char) -> Option<DelimiterPair> {
  match opening {
    '{' => Some(CURLY),
    '[' => Some(SQUARE),
    '\'' => Some(SINGLE_QUOTE),
    '"' => Some(DOUBLE_QUOTE),
    '(' => Some(PAREN),
    '<' => Some(ANGLE),
    _ => None,
  }
}

/// Reject pair sets where two entries share an opening character.
pub fn validate_catalog(pairs: &[DelimiterPair]) -> Result<(), CatalogError> {
  for (idx, pair) in pairs.iter().enumerate() {
    if pairs[..idx].iter().any(|seen| seen.opening == pair.opening) {
      return Err(CatalogError::DuplicateOpening {
        opening: pair.opening,
      });
    }
  }
  Ok(())
}
