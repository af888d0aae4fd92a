//! Operational transformation primitives for buffer edits.
//!
//! A [`ChangeSet`] is a sequence of [`Operation`]s applied from the start of
//! the text:
//!
//! - **Retain(n)** - Keep `n` characters unchanged
//! - **Delete(n)** - Remove `n` characters
//! - **Insert(s)** - Insert string `s`
//!
//! A [`Transaction`] wraps a change set together with the caret position the
//! edit leaves behind.
//!
//! # Basic Usage
//!
//! ```
//! use ropey::Rope;
//! use the_text::transaction::Transaction;
//!
//! let mut text = Rope::from("fn main");
//! let tx = Transaction::insert(&text, 7, "()".into())
//!   .unwrap()
//!   .with_caret(8);
//!
//! tx.apply(&mut text).unwrap();
//! assert_eq!(text.to_string(), "fn main()");
//! ```
//!
//! # Position Mapping
//!
//! Offsets recorded against an older text are carried forward with
//! [`ChangeSet::map_pos`]. The [`Assoc`] decides which side of an insertion
//! at exactly that offset the position ends up on.
//!
//! # Composition and Inversion
//!
//! [`ChangeSet::compose`] merges two consecutive change sets into one, which
//! is how several edits made during a single keystroke collapse into one undo
//! step. [`ChangeSet::invert`] produces the change set that reverts an edit
//! given the text it was applied to.

use std::borrow::Cow;

use ropey::{
  Rope,
  RopeSlice,
};
use thiserror::Error;

use crate::Tendril;

pub type Result<T> = std::result::Result<T, TransactionError>;

/// (from, to) replacement.
pub type Change = (usize, usize, Option<Tendril>);

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransactionError {
  #[error("changeset length mismatch: expected {expected}, got {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error(
    "changeset compose length mismatch: left output {left_len_after}, right input {right_len}"
  )]
  ComposeLengthMismatch {
    left_len_after: usize,
    right_len:      usize,
  },
  #[error("invalid change range: start {from} is after end {to}")]
  InvalidRange { from: usize, to: usize },
  #[error("change range {from}..{to} is out of bounds for text length {len}")]
  RangeOutOfBounds {
    from: usize,
    to:   usize,
    len:  usize,
  },
  #[error("change range {from}..{to} overlaps previous end {prev_end}")]
  OverlappingRange {
    prev_end: usize,
    from:     usize,
    to:       usize,
  },
  #[error("position {pos} is out of bounds for changeset length {len}")]
  PositionOutOfBounds { pos: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
  /// Move cursor by n characters.
  Retain(usize),

  /// Delete n characters.
  Delete(usize),

  /// Insert text at position.
  Insert(Tendril),
}

impl Operation {
  pub fn len_chars(&self) -> usize {
    match self {
      Operation::Retain(n) | Operation::Delete(n) => *n,
      Operation::Insert(s) => s.chars().count(),
    }
  }
}

/// Side a mapped position sticks to when text is inserted exactly at it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Assoc {
  /// Stay in front of the inserted text.
  Before,
  /// Move past the inserted text.
  After,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
  changes:   Vec<Operation>,
  /// The required text length. Will refuse to apply changes unless it
  /// matches.
  len:       usize,
  len_after: usize,
}

impl ChangeSet {
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      changes:   Vec::with_capacity(capacity),
      len:       0,
      len_after: 0,
    }
  }

  #[must_use]
  pub fn new(text: RopeSlice) -> Self {
    let len = text.len_chars();
    Self {
      changes: Vec::new(),
      len,
      len_after: len,
    }
  }

  pub fn operations(&self) -> &[Operation] {
    &self.changes
  }

  /// Text length this changeset expects.
  pub fn len(&self) -> usize {
    self.len
  }

  /// Text length after applying this changeset.
  pub fn len_after(&self) -> usize {
    self.len_after
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.changes.is_empty() || self.changes == [Operation::Retain(self.len)]
  }

  pub fn delete(&mut self, n: usize) {
    use Operation::*;

    if n == 0 {
      return;
    }

    self.len += n;

    if let Some(Delete(count)) = self.changes.last_mut() {
      *count += n;
    } else {
      self.changes.push(Delete(n));
    }
  }

  pub fn insert(&mut self, fragment: Tendril) {
    use Operation::*;

    if fragment.is_empty() {
      return;
    }

    self.len_after += fragment.chars().count();

    // Keep inserts in front of deletes so a replacement reads Insert, Delete.
    let tail = match self.changes.as_mut_slice() {
      [.., Insert(prev)] | [.., Insert(prev), Delete(_)] => {
        prev.push_str(&fragment);
        return;
      },
      [.., last @ Delete(_)] => std::mem::replace(last, Insert(fragment)),
      _ => Insert(fragment),
    };

    self.changes.push(tail);
  }

  pub fn retain(&mut self, n: usize) {
    use Operation::*;

    if n == 0 {
      return;
    }

    self.len += n;
    self.len_after += n;

    if let Some(Retain(count)) = self.changes.last_mut() {
      *count += n;
    } else {
      self.changes.push(Retain(n));
    }
  }

  /// Combine two consecutive changesets: applying the result equals applying
  /// `self` then `other`.
  pub fn compose(self, other: Self) -> Result<Self> {
    use Operation::*;

    if self.len_after != other.len {
      return Err(TransactionError::ComposeLengthMismatch {
        left_len_after: self.len_after,
        right_len:      other.len,
      });
    }

    if self.changes.is_empty() {
      return Ok(other);
    }
    if other.changes.is_empty() {
      return Ok(self);
    }

    let mut composed = Self::with_capacity(self.changes.len() + other.changes.len());
    let mut left_ops = self.changes.into_iter();
    let mut right_ops = other.changes.into_iter();
    let mut left = left_ops.next();
    let mut right = right_ops.next();

    loop {
      match (left.take(), right.take()) {
        (None, None) => break,
        (Some(Delete(n)), pending) => {
          composed.delete(n);
          left = left_ops.next();
          right = pending;
        },
        (pending, Some(Insert(text))) => {
          composed.insert(text);
          left = pending;
          right = right_ops.next();
        },
        (Some(Retain(a)), Some(Retain(b))) => {
          let n = a.min(b);
          composed.retain(n);
          left = consume(Retain(a), n, &mut left_ops);
          right = consume(Retain(b), n, &mut right_ops);
        },
        (Some(Retain(a)), Some(Delete(b))) => {
          let n = a.min(b);
          composed.delete(n);
          left = consume(Retain(a), n, &mut left_ops);
          right = consume(Delete(b), n, &mut right_ops);
        },
        (Some(Insert(text)), Some(Retain(b))) => {
          let n = b.min(text.chars().count());
          composed.insert(Tendril::from(&text[..char_to_byte(&text, n)]));
          left = consume(Insert(text), n, &mut left_ops);
          right = consume(Retain(b), n, &mut right_ops);
        },
        (Some(Insert(text)), Some(Delete(b))) => {
          // Text inserted on the left and deleted on the right never existed.
          let n = b.min(text.chars().count());
          left = consume(Insert(text), n, &mut left_ops);
          right = consume(Delete(b), n, &mut right_ops);
        },
        (left_rest, right_rest) => {
          unreachable!("compose ran out of operations: {left_rest:?} / {right_rest:?}")
        },
      }
    }

    debug_assert_eq!(composed.len, self.len);
    Ok(composed)
  }

  /// Returns the changeset that reverts this one. `original` is the text
  /// before this changeset was applied.
  pub fn invert(&self, original: &Rope) -> Result<Self> {
    use Operation::*;

    if self.changes.is_empty() {
      return Ok(ChangeSet {
        changes:   Vec::new(),
        len:       self.len_after,
        len_after: self.len,
      });
    }

    self.ensure_len(original.len_chars())?;

    let mut inverted = Self::with_capacity(self.changes.len());
    let mut pos = 0;

    for change in &self.changes {
      match change {
        Retain(n) => {
          inverted.retain(*n);
          pos += n;
        },
        Delete(n) => {
          let removed = Cow::from(original.slice(pos..pos + *n));
          inverted.insert(Tendril::from(removed.as_ref()));
          pos += n;
        },
        Insert(s) => inverted.delete(s.chars().count()),
      }
    }

    Ok(inverted)
  }

  fn ensure_len(&self, text_len: usize) -> Result<()> {
    if text_len != self.len {
      return Err(TransactionError::LengthMismatch {
        expected: self.len,
        actual:   text_len,
      });
    }
    Ok(())
  }

  /// Apply this changeset in-place.
  pub fn apply(&self, text: &mut Rope) -> Result<()> {
    use Operation::*;

    self.ensure_len(text.len_chars())?;
    let mut pos = 0;

    for change in &self.changes {
      match change {
        Retain(n) => pos += n,
        Delete(n) => text.remove(pos..pos + *n),
        Insert(s) => {
          text.insert(pos, s);
          pos += s.chars().count();
        },
      }
    }

    Ok(())
  }

  /// Map a position through the changes.
  ///
  /// A position inside deleted text collapses to the start of the deletion.
  /// A position at an insertion point, or at the start of a replaced range,
  /// lands in front of the new text for [`Assoc::Before`] and behind it for
  /// [`Assoc::After`].
  pub fn map_pos(&self, pos: usize, assoc: Assoc) -> Result<usize> {
    use Operation::*;

    if pos > self.len {
      return Err(TransactionError::PositionOutOfBounds {
        pos,
        len: self.len,
      });
    }

    let mut old_pos = 0;
    let mut new_pos = 0;
    let mut ops = self.changes.iter().peekable();

    while let Some(op) = ops.next() {
      match op {
        Retain(n) => {
          if pos < old_pos + n {
            return Ok(new_pos + (pos - old_pos));
          }
          old_pos += n;
          new_pos += n;
        },
        Delete(n) => {
          if pos < old_pos + n {
            return Ok(new_pos);
          }
          old_pos += n;
        },
        Insert(s) => {
          let inserted = s.chars().count();
          let replaced = match ops.peek() {
            Some(Delete(n)) => {
              let n = *n;
              ops.next();
              n
            },
            _ => 0,
          };

          let hit = if replaced == 0 {
            pos == old_pos
          } else {
            pos >= old_pos && pos < old_pos + replaced
          };
          if hit {
            return Ok(match assoc {
              Assoc::Before => new_pos,
              Assoc::After => new_pos + inserted,
            });
          }

          old_pos += replaced;
          new_pos += inserted;
        },
      }
    }

    // Trailing position at the very end of the text.
    Ok(new_pos + (pos - old_pos))
  }
}

/// Drop the first `n` characters of `op`, pulling the next operation once it
/// is exhausted.
fn consume(
  op: Operation,
  n: usize,
  rest: &mut impl Iterator<Item = Operation>,
) -> Option<Operation> {
  use Operation::*;

  match op {
    Retain(len) if len > n => Some(Retain(len - n)),
    Delete(len) if len > n => Some(Delete(len - n)),
    Insert(text) if text.chars().count() > n => {
      Some(Insert(Tendril::from(&text[char_to_byte(&text, n)..])))
    },
    _ => rest.next(),
  }
}

fn char_to_byte(text: &str, chars: usize) -> usize {
  text
    .char_indices()
    .nth(chars)
    .map_or(text.len(), |(idx, _)| idx)
}

fn validate_change_bounds(from: usize, to: usize, len: usize) -> Result<()> {
  if from > to {
    return Err(TransactionError::InvalidRange { from, to });
  }
  if to > len {
    return Err(TransactionError::RangeOutOfBounds { from, to, len });
  }
  Ok(())
}

/// A changeset plus the caret position it leaves behind.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Transaction {
  changes: ChangeSet,
  caret:   Option<usize>,
}

impl From<ChangeSet> for Transaction {
  fn from(changes: ChangeSet) -> Self {
    Self {
      changes,
      caret: None,
    }
  }
}

impl Transaction {
  pub fn new(text: &Rope) -> Self {
    Self::from(ChangeSet::new(text.slice(..)))
  }

  /// Changes made to the buffer.
  pub fn changes(&self) -> &ChangeSet {
    &self.changes
  }

  /// When set, the caret position after the edit.
  pub fn caret(&self) -> Option<usize> {
    self.caret
  }

  pub fn with_caret(mut self, caret: usize) -> Self {
    self.caret = Some(caret);
    self
  }

  /// Apply this transaction in-place.
  pub fn apply(&self, text: &mut Rope) -> Result<()> {
    self.changes.apply(text)
  }

  /// Generate a transaction that reverts this one.
  pub fn invert(&self, original: &Rope) -> Result<Self> {
    Ok(Self::from(self.changes.invert(original)?))
  }

  pub fn compose(mut self, other: Self) -> Result<Self> {
    self.changes = self.changes.compose(other.changes)?;
    // Later caret wins.
    self.caret = other.caret.or(self.caret);
    Ok(self)
  }

  /// Generate a transaction from sorted, non-overlapping changes.
  pub fn change<I>(text: &Rope, changes: I) -> Result<Self>
  where
    I: IntoIterator<Item = Change>,
  {
    let len = text.len_chars();
    let changes = changes.into_iter();
    let (lower, upper) = changes.size_hint();
    let mut changeset = ChangeSet::with_capacity(2 * upper.unwrap_or(lower) + 1);

    let mut last = 0;
    for (from, to, fragment) in changes {
      validate_change_bounds(from, to, len)?;
      if from < last {
        return Err(TransactionError::OverlappingRange {
          prev_end: last,
          from,
          to,
        });
      }

      changeset.retain(from - last);
      if let Some(text) = fragment {
        changeset.insert(text);
      }
      changeset.delete(to - from);
      last = to;
    }

    changeset.retain(len - last);

    Ok(Self::from(changeset))
  }

  /// Insert `fragment` at `at`.
  pub fn insert(text: &Rope, at: usize, fragment: Tendril) -> Result<Self> {
    Self::change(text, [(at, at, Some(fragment))])
  }

  /// Delete the characters in `from..to`.
  pub fn delete(text: &Rope, from: usize, to: usize) -> Result<Self> {
    Self::change(text, [(from, to, None)])
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn insert_at(len: usize, at: usize, text: &str) -> ChangeSet {
    let mut cs = ChangeSet::with_capacity(3);
    cs.retain(at);
    cs.insert(text.into());
    cs.retain(len - at);
    cs
  }

  #[test]
  fn composition() {
    let mut text = Rope::from("hello xz");

    let a = Transaction::change(&text, [(6, 6, Some("world".into()))]).unwrap();
    let after_a = {
      let mut t = text.clone();
      a.apply(&mut t).unwrap();
      t
    };
    let b = Transaction::change(&after_a, [(0, 5, Some("howdy".into())), (11, 13, None)]).unwrap();

    let composed = a.changes().clone().compose(b.changes().clone()).unwrap();
    composed.apply(&mut text).unwrap();

    assert_eq!(text.to_string(), "howdy world");
    assert_eq!(composed.len(), 8);
    assert_eq!(composed.len_after(), 11);
  }

  #[test]
  fn compose_insert_then_delete_cancels() {
    let text = Rope::from("ab");
    let a = insert_at(2, 1, "()");
    let mut b = ChangeSet::with_capacity(3);
    b.retain(1);
    b.delete(2);
    b.retain(1);

    let composed = a.compose(b).unwrap();
    assert!(composed.is_empty());

    let mut applied = text.clone();
    composed.apply(&mut applied).unwrap();
    assert_eq!(applied, text);
  }

  #[test]
  fn compose_rejects_length_mismatch() {
    let a = insert_at(2, 0, "x");
    let b = insert_at(2, 0, "y");
    assert_eq!(
      a.compose(b),
      Err(TransactionError::ComposeLengthMismatch {
        left_len_after: 3,
        right_len:      2,
      })
    );
  }

  #[test]
  fn invert() {
    let original = Rope::from("a(b)c");
    let tx = Transaction::change(&original, [(1, 4, Some("[]".into()))]).unwrap();

    let mut text = original.clone();
    tx.apply(&mut text).unwrap();
    assert_eq!(text.to_string(), "a[]c");

    tx.invert(&original).unwrap().apply(&mut text).unwrap();
    assert_eq!(text, original);
  }

  #[test]
  fn map_pos_around_insertion() {
    // "(|)" typing x inside the pair
    let cs = insert_at(2, 1, "x");
    assert_eq!(cs.map_pos(0, Assoc::Before).unwrap(), 0);
    assert_eq!(cs.map_pos(1, Assoc::Before).unwrap(), 1);
    assert_eq!(cs.map_pos(1, Assoc::After).unwrap(), 2);
    assert_eq!(cs.map_pos(2, Assoc::Before).unwrap(), 3);
    assert_eq!(cs.map_pos(2, Assoc::After).unwrap(), 3);
  }

  #[test]
  fn map_pos_through_deletion_and_replacement() {
    let text = Rope::from("0123456789");

    let del = Transaction::delete(&text, 2, 5).unwrap();
    assert_eq!(del.changes().map_pos(1, Assoc::After).unwrap(), 1);
    assert_eq!(del.changes().map_pos(3, Assoc::After).unwrap(), 2);
    assert_eq!(del.changes().map_pos(5, Assoc::Before).unwrap(), 2);
    assert_eq!(del.changes().map_pos(10, Assoc::Before).unwrap(), 7);

    let replace = Transaction::change(&text, [(2, 4, Some("abc".into()))]).unwrap();
    assert_eq!(replace.changes().map_pos(2, Assoc::Before).unwrap(), 2);
    assert_eq!(replace.changes().map_pos(3, Assoc::After).unwrap(), 5);
    assert_eq!(replace.changes().map_pos(4, Assoc::Before).unwrap(), 5);
  }

  #[test]
  fn map_pos_out_of_bounds() {
    let cs = insert_at(2, 0, "x");
    assert_eq!(
      cs.map_pos(3, Assoc::Before),
      Err(TransactionError::PositionOutOfBounds { pos: 3, len: 2 })
    );
  }

  #[test]
  fn change_validates_ranges() {
    let text = Rope::from("abc");
    assert_eq!(
      Transaction::change(&text, [(2, 1, None)]),
      Err(TransactionError::InvalidRange { from: 2, to: 1 })
    );
    assert_eq!(
      Transaction::change(&text, [(1, 4, None)]),
      Err(TransactionError::RangeOutOfBounds {
        from: 1,
        to:   4,
        len:  3,
      })
    );
    assert_eq!(
      Transaction::change(&text, [(1, 2, None), (0, 1, None)]),
      Err(TransactionError::OverlappingRange {
        prev_end: 2,
        from:     0,
        to:       1,
      })
    );
  }

  #[test]
  fn combine_with_utf8() {
    let mut text = Rope::from("«»");
    let a = Transaction::insert(&text, 1, "é".into()).unwrap();
    let mut mid = text.clone();
    a.apply(&mut mid).unwrap();
    let b = Transaction::delete(&mid, 0, 1).unwrap();

    let composed = a.compose(b).unwrap();
    composed.apply(&mut text).unwrap();
    assert_eq!(text.to_string(), "é»");
  }

  #[test]
  fn apply_errors_on_length_mismatch() {
    let cs = insert_at(5, 0, "x");
    let mut text = Rope::from("abc");
    assert_eq!(
      cs.apply(&mut text),
      Err(TransactionError::LengthMismatch {
        expected: 5,
        actual:   3,
      })
    );
  }

  quickcheck::quickcheck! {
    fn compose_matches_sequential_apply(base: String, at: usize, ins: String, del: usize) -> bool {
      let text = Rope::from(base.as_str());
      let len = text.len_chars();
      let at = if len == 0 { 0 } else { at % (len + 1) };
      let first = Transaction::insert(&text, at, ins.as_str().into()).unwrap();

      let mut mid = text.clone();
      first.apply(&mut mid).unwrap();
      let mid_len = mid.len_chars();
      let to = (at + del % 4).min(mid_len);
      let second = Transaction::delete(&mid, at, to).unwrap();

      let mut expected = mid.clone();
      second.apply(&mut expected).unwrap();

      let mut actual = text.clone();
      first.compose(second).unwrap().apply(&mut actual).unwrap();
      actual == expected
    }

    fn invert_restores_original(base: String, from: usize, len: usize, ins: String) -> bool {
      let original = Rope::from(base.as_str());
      let total = original.len_chars();
      let from = if total == 0 { 0 } else { from % (total + 1) };
      let to = (from + len % 8).min(total);
      let tx = Transaction::change(&original, [(from, to, Some(ins.as_str().into()))]).unwrap();

      let mut text = original.clone();
      tx.apply(&mut text).unwrap();
      tx.invert(&original).unwrap().apply(&mut text).unwrap();
      text == original
    }
  }
}
