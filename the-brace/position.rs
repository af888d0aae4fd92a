use std::num::NonZeroUsize;

use the_text::{
  buffer::Buffer,
  transaction::Assoc,
};

use crate::{
  BraceError,
  Result,
  pairs::DelimiterPair,
};

/// Host-assigned identity of one caret. Every caret owns its own session
/// stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaretId(NonZeroUsize);

impl CaretId {
  pub const fn new(id: NonZeroUsize) -> Self {
    Self(id)
  }

  pub const fn get(self) -> NonZeroUsize {
    self.0
  }
}

impl From<NonZeroUsize> for CaretId {
  fn from(value: NonZeroUsize) -> Self {
    Self::new(value)
  }
}

/// A caret offset valid for one buffer version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaretPosition {
  pub offset:  usize,
  pub version: u64,
}

impl CaretPosition {
  pub const fn new(offset: usize, version: u64) -> Self {
    Self { offset, version }
  }

  /// Position at `offset` in the buffer's current version.
  pub fn at(buffer: &Buffer, offset: usize) -> Self {
    Self::new(offset, buffer.version())
  }

  /// Offset of this position, provided it still belongs to the buffer's
  /// current version.
  pub fn revalidate(&self, buffer: &Buffer) -> Result<usize> {
    if self.version != buffer.version() || self.offset > buffer.len_chars() {
      return Err(BraceError::StalePosition {
        offset:  self.offset,
        version: self.version,
        current: buffer.version(),
      });
    }
    Ok(self.offset)
  }
}

/// Region from just after an opening delimiter to just after its closer.
///
/// ```text
/// f o o ( b a r )
///        ^       ^
///      start    end
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingSpan {
  start:   usize,
  end:     usize,
  version: u64,
}

impl TrackingSpan {
  pub const fn new(start: usize, end: usize, version: u64) -> Self {
    Self {
      start,
      end,
      version,
    }
  }

  pub fn start(&self) -> usize {
    self.start
  }

  pub fn end(&self) -> usize {
    self.end
  }

  pub fn version(&self) -> u64 {
    self.version
  }

  /// Offset of the opening delimiter.
  pub fn opener(&self) -> usize {
    self.start - 1
  }

  /// Offset of the closing delimiter.
  pub fn closer(&self) -> usize {
    self.end - 1
  }

  /// Nothing between the delimiters.
  pub fn is_empty(&self) -> bool {
    self.start == self.closer()
  }

  /// Whether `caret` sits between the delimiters (inclusive of both inner
  /// edges).
  pub fn contains(&self, caret: usize) -> bool {
    self.start <= caret && caret < self.end
  }

  /// Whether `inner`'s delimiters both lie strictly inside this span.
  pub fn encloses(&self, inner: &TrackingSpan) -> bool {
    self.start <= inner.opener() && inner.end <= self.closer()
  }

  /// Carry the span forward to the buffer's current version.
  ///
  /// Text inserted at `start` (typing inside an empty pair) lands inside the
  /// span, text inserted at `end` (after the closer) stays outside. Returns
  /// `None` when the span collapsed: the journal no longer reaches its
  /// version, or either delimiter was removed or replaced.
  pub fn translate(&self, buffer: &Buffer, pair: DelimiterPair) -> Option<Self> {
    let span = if self.version == buffer.version() {
      *self
    } else {
      let changes = buffer.changes_since(self.version).ok().flatten()?;
      Self {
        start:   changes.map_pos(self.start, Assoc::Before).ok()?,
        end:     changes.map_pos(self.end, Assoc::Before).ok()?,
        version: buffer.version(),
      }
    };

    span.is_intact(buffer, pair).then_some(span)
  }

  fn is_intact(&self, buffer: &Buffer, pair: DelimiterPair) -> bool {
    if self.start == 0 || self.start >= self.end || self.end > buffer.len_chars() {
      return false;
    }
    let text = buffer.text();
    text.get_char(self.opener()) == Some(pair.opening)
      && text.get_char(self.closer()) == Some(pair.closing)
  }
}

#[cfg(test)]
mod test {
  use ropey::Rope;
  use the_text::{
    buffer::{
      BufferId,
      DocumentKind,
    },
    transaction::Transaction,
  };

  use super::*;
  use crate::pairs::{
    DOUBLE_QUOTE,
    PAREN,
  };

  fn buffer(text: &str) -> Buffer {
    let id = BufferId::new(NonZeroUsize::new(1).unwrap());
    Buffer::new(id, DocumentKind::from("text"), Rope::from(text))
  }

  fn edit(buffer: &mut Buffer, from: usize, to: usize, text: Option<&str>) {
    let tx = Transaction::change(buffer.text(), [(from, to, text.map(Into::into))]).unwrap();
    buffer.apply_transaction(&tx).unwrap();
    buffer.commit(from, from).unwrap();
  }

  #[test]
  fn stale_positions_are_rejected() {
    let mut buffer = buffer("ab");
    let position = CaretPosition::at(&buffer, 1);
    assert_eq!(position.revalidate(&buffer).unwrap(), 1);

    edit(&mut buffer, 0, 0, Some("x"));
    assert!(matches!(
      position.revalidate(&buffer),
      Err(BraceError::StalePosition {
        offset:  1,
        version: 0,
        current: 1,
      })
    ));

    let past_end = CaretPosition::at(&buffer, 9);
    assert!(past_end.revalidate(&buffer).is_err());
  }

  #[test]
  fn typing_inside_grows_the_span() {
    let mut buffer = buffer("()");
    let span = TrackingSpan::new(1, 2, buffer.version());
    assert!(span.is_empty());

    edit(&mut buffer, 1, 1, Some("xy"));
    let span = span.translate(&buffer, PAREN).unwrap();
    assert_eq!((span.start(), span.end()), (1, 4));
    assert!(!span.is_empty());
    assert!(span.contains(3));
    assert!(!span.contains(4));
  }

  #[test]
  fn edits_outside_shift_the_span() {
    let mut buffer = buffer("a()b");
    let span = TrackingSpan::new(2, 3, buffer.version());

    edit(&mut buffer, 3, 3, Some("!"));
    edit(&mut buffer, 0, 1, Some("xyz"));
    let span = span.translate(&buffer, PAREN).unwrap();
    assert_eq!(buffer.text().to_string(), "xyz()!b");
    assert_eq!((span.start(), span.end()), (4, 5));
  }

  #[test]
  fn deleting_a_delimiter_collapses_the_span() {
    let mut buffer = buffer("(x)");
    let span = TrackingSpan::new(1, 3, buffer.version());
    edit(&mut buffer, 0, 1, None);
    assert_eq!(span.translate(&buffer, PAREN), None);

    let mut buffer = self::buffer("\"\"");
    let span = TrackingSpan::new(1, 2, buffer.version());
    edit(&mut buffer, 0, 2, None);
    assert_eq!(span.translate(&buffer, DOUBLE_QUOTE), None);
  }

  #[test]
  fn nesting() {
    let outer = TrackingSpan::new(1, 5, 0); // ([x])
    let inner = TrackingSpan::new(2, 4, 0);
    assert!(outer.encloses(&inner));
    assert!(!inner.encloses(&outer));
    assert!(!outer.encloses(&TrackingSpan::new(5, 6, 0)));
  }

  quickcheck::quickcheck! {
    fn unrelated_edits_keep_the_pair(prefix: String, suffix: String, inside: String) -> bool {
      let text = format!("{prefix}({suffix}");
      let open = prefix.chars().count();
      let mut buffer = buffer(&format!("{text})"));
      let close = buffer.len_chars() - 1;
      let span = TrackingSpan::new(open + 1, close + 1, buffer.version());

      // inside the pair, then in front of it
      edit(&mut buffer, open + 1, open + 1, Some(inside.as_str()));
      edit(&mut buffer, 0, 0, Some("x"));

      match span.translate(&buffer, PAREN) {
        Some(span) => {
          buffer.text().char(span.opener()) == '(' && buffer.text().char(span.closer()) == ')'
        },
        None => false,
      }
    }
  }
}
