use std::num::NonZeroUsize;

use ropey::Rope;
use thiserror::Error;

use crate::transaction::{
  ChangeSet,
  Transaction,
  TransactionError,
};

/// Result type for history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;

/// Errors that can occur during history operations.
#[derive(Debug, Error)]
pub enum HistoryError {
  #[error("transaction error: {0}")]
  Transaction(#[from] TransactionError),
  #[error("revision index {index} is out of bounds (max: {max})")]
  RevisionOutOfBounds { index: usize, max: usize },
}

/// A pending jump in history that has not yet been applied.
///
/// The caller applies every transaction first and only then calls
/// [`History::apply_jump`], so history never runs ahead of the text.
#[derive(Debug, Clone)]
pub struct HistoryJump {
  /// The transactions to apply, in order.
  pub transactions: Vec<Transaction>,
  /// The target revision index after the jump.
  pub target:       usize,
}

impl HistoryJump {
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.transactions.is_empty()
  }

  /// Caret recorded by the last transaction of the jump.
  pub fn caret(&self) -> Option<usize> {
    self.transactions.last().and_then(Transaction::caret)
  }
}

/// Undo history of a buffer.
///
/// Revisions form a tree stored in a vector whose first element is the empty
/// root. Each revision keeps the transaction that leads from its parent to
/// itself and the inversion leading back. Undo applies the inversion of the
/// current revision; redo replays the transaction of the most recently
/// committed child.
///
/// Every revision corresponds to one undo step, so callers that want several
/// edits to undo together compose them before committing (see
/// [`crate::undo::UndoScope`]).
#[derive(Debug)]
pub struct History {
  revisions: Vec<Revision>,
  current:   usize,
}

#[derive(Debug, Clone)]
struct Revision {
  parent:      usize,
  last_child:  Option<NonZeroUsize>,
  transaction: Transaction,
  // Deletions don't carry the removed text, so the inversion is stored too.
  inversion:   Transaction,
}

impl Default for History {
  fn default() -> Self {
    Self {
      revisions: vec![Revision {
        parent:      0,
        last_child:  None,
        transaction: Transaction::from(ChangeSet::new("".into())),
        inversion:   Transaction::from(ChangeSet::new("".into())),
      }],
      current:   0,
    }
  }
}

impl History {
  /// Record `transaction`, applied to `original`, as a new revision.
  ///
  /// `caret_before` is restored when the revision is undone; the
  /// transaction's own caret is restored on redo.
  pub fn commit_revision(
    &mut self,
    transaction: &Transaction,
    original: &Rope,
    caret_before: usize,
  ) -> Result<()> {
    let inversion = transaction.invert(original)?.with_caret(caret_before);

    let new_current = self.revisions.len();
    self.revisions[self.current].last_child = NonZeroUsize::new(new_current);
    self.revisions.push(Revision {
      parent: self.current,
      last_child: None,
      transaction: transaction.clone(),
      inversion,
    });
    self.current = new_current;
    Ok(())
  }

  #[inline]
  pub fn current_revision(&self) -> usize {
    self.current
  }

  #[inline]
  pub const fn at_root(&self) -> bool {
    self.current == 0
  }

  /// Number of revisions, including the root.
  #[inline]
  pub fn len(&self) -> usize {
    self.revisions.len()
  }

  /// Whether only the root revision exists.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.revisions.len() <= 1
  }

  fn validate_revision(&self, revision: usize) -> Result<()> {
    if revision >= self.revisions.len() {
      return Err(HistoryError::RevisionOutOfBounds {
        index: revision,
        max:   self.revisions.len().saturating_sub(1),
      });
    }
    Ok(())
  }

  /// Prepare an undo without mutating history state.
  pub fn undo(&self) -> Option<HistoryJump> {
    if self.at_root() {
      return None;
    }

    let current = &self.revisions[self.current];
    Some(HistoryJump {
      transactions: vec![current.inversion.clone()],
      target:       current.parent,
    })
  }

  /// Prepare a redo without mutating history state.
  pub fn redo(&self) -> Option<HistoryJump> {
    let last_child = self.revisions[self.current].last_child?;

    Some(HistoryJump {
      transactions: vec![self.revisions[last_child.get()].transaction.clone()],
      target:       last_child.get(),
    })
  }

  /// Move to the jump target. Only call after every transaction of the jump
  /// was applied successfully.
  pub fn apply_jump(&mut self, jump: &HistoryJump) -> Result<()> {
    self.validate_revision(jump.target)?;
    self.current = jump.target;
    Ok(())
  }
}
