use std::sync::Arc;

use the_text::{
  buffer::Buffer,
  transaction::Transaction,
  undo::UndoScope,
};

use crate::{
  BraceError,
  Result,
  Tendril,
  config::Registration,
  position::TrackingSpan,
  resolver::{
    ResolveRequest,
    ResolverRegistry,
  },
  session::TrackingSession,
  stack::SessionStack,
};

/// Decides, for one typed character, whether a tracking session starts.
#[derive(Debug, Clone)]
pub struct SessionFactory {
  registration: Arc<Registration>,
  resolvers:    Arc<ResolverRegistry>,
}

impl SessionFactory {
  pub fn new(registration: Arc<Registration>, resolvers: Arc<ResolverRegistry>) -> Self {
    Self {
      registration,
      resolvers,
    }
  }

  pub fn registration(&self) -> &Registration {
    &self.registration
  }

  pub fn resolvers(&self) -> &ResolverRegistry {
    &self.resolvers
  }

  /// Complete `opening` typed at `caret`.
  ///
  /// On success the opener and its closer are inserted as one undo step with
  /// the caret between them, and the new session is pushed on `stack`.
  /// `Ok(None)` means nothing happened and the keystroke should be inserted
  /// as usual. `stack` must already be pruned for `caret`.
  pub fn try_create_session<'s>(
    &self,
    buffer: &mut Buffer,
    stack: &'s mut SessionStack,
    caret: usize,
    opening: char,
  ) -> Result<Option<&'s TrackingSession>> {
    if buffer.is_readonly() || !self.registration.applies_to(buffer.kind()) {
      return Ok(None);
    }
    let Some(pair) = self.registration.lookup(opening) else {
      return Ok(None);
    };
    if !stack.accepts(caret) {
      tracing::trace!(%pair, caret, "caret outside the active session, not completing");
      return Ok(None);
    }

    let request = ResolveRequest {
      document_kind: buffer.kind().clone(),
      snapshot: buffer.snapshot(),
      caret,
      opening,
    };
    let Some(strategy) = self.resolvers.resolve(&request) else {
      return Ok(None);
    };

    let mut scope = UndoScope::acquire(buffer, caret)?;
    let mut fragment = Tendril::new();
    fragment.push(pair.opening);
    fragment.push(pair.closing);
    let tx = Transaction::insert(scope.text(), caret, fragment)?.with_caret(caret + 1);
    scope.apply(&tx)?;

    let span = TrackingSpan::new(caret + 1, caret + 2, scope.buffer().version());
    let session = TrackingSession::new(pair, span, strategy);
    stack.push(scope.buffer(), session)?;

    if let Err(err) = scope.complete() {
      stack.pop();
      return Err(BraceError::Buffer(err));
    }

    Ok(stack.top())
  }
}
