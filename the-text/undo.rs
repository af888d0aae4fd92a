//! Scoped undo transactions.
//!
//! An [`UndoScope`] borrows a [`Buffer`] for the duration of one logical
//! edit. Every transaction applied through it lands in a single history
//! revision once [`UndoScope::complete`] succeeds. A scope dropped without
//! completing (early return, `?`, panic) rolls the buffer back to the text it
//! had when the scope was acquired.
//!
//! ```
//! use std::num::NonZeroUsize;
//!
//! use ropey::Rope;
//! use the_text::{
//!   buffer::{
//!     Buffer,
//!     BufferId,
//!     DocumentKind,
//!   },
//!   transaction::Transaction,
//!   undo::UndoScope,
//! };
//!
//! let id = BufferId::new(NonZeroUsize::new(1).unwrap());
//! let mut buffer = Buffer::new(id, DocumentKind::from("text"), Rope::new());
//!
//! let mut scope = UndoScope::acquire(&mut buffer, 0).unwrap();
//! let open = Transaction::insert(scope.text(), 0, "(".into()).unwrap();
//! scope.apply(&open).unwrap();
//! let close = Transaction::insert(scope.text(), 1, ")".into()).unwrap().with_caret(1);
//! scope.apply(&close).unwrap();
//! scope.complete().unwrap();
//!
//! assert_eq!(buffer.history().len(), 2);
//! ```

use ropey::Rope;

use crate::{
  buffer::{
    Buffer,
    Result,
  },
  transaction::Transaction,
};

#[must_use = "dropping an undo scope without completing it rolls back its edits"]
pub struct UndoScope<'a> {
  buffer:       &'a mut Buffer,
  caret_before: usize,
  caret_after:  usize,
  done:         bool,
}

impl<'a> UndoScope<'a> {
  /// Open a scope with the caret at `caret`. Edits applied to the buffer
  /// outside any scope are committed first so they stay a separate step.
  pub fn acquire(buffer: &'a mut Buffer, caret: usize) -> Result<Self> {
    if buffer.has_pending() {
      buffer.commit(caret, caret)?;
    }

    Ok(Self {
      buffer,
      caret_before: caret,
      caret_after: caret,
      done: false,
    })
  }

  pub fn text(&self) -> &Rope {
    self.buffer.text()
  }

  pub fn buffer(&self) -> &Buffer {
    &*self.buffer
  }

  pub fn caret(&self) -> usize {
    self.caret_after
  }

  pub fn set_caret(&mut self, caret: usize) {
    self.caret_after = caret;
  }

  /// Apply `transaction`, adopting its caret when it carries one.
  pub fn apply(&mut self, transaction: &Transaction) -> Result<()> {
    self.buffer.apply_transaction(transaction)?;
    if let Some(caret) = transaction.caret() {
      self.caret_after = caret;
    }
    Ok(())
  }

  /// Commit the scope as one undo step and return the final caret.
  pub fn complete(mut self) -> Result<usize> {
    self
      .buffer
      .commit(self.caret_before, self.caret_after)?;
    self.done = true;
    Ok(self.caret_after)
  }
}

impl Drop for UndoScope<'_> {
  fn drop(&mut self) {
    if self.done {
      return;
    }
    if let Err(err) = self.buffer.rollback() {
      tracing::warn!("failed to roll back undo scope: {err}");
    }
  }
}
