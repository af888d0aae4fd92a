//! Host-facing entry point.
//!
//! The host forwards every keystroke of a caret to [`BraceCompletion`]
//! instead of editing the buffer itself. Events the active session does not
//! claim fall through to the plain edit (insert the character, delete one
//! character, insert a newline), each applied as its own undo step.

use std::{
  collections::HashMap,
  sync::Arc,
};

use the_text::{
  buffer::Buffer,
  transaction::Transaction,
  undo::UndoScope,
};

use crate::{
  Result,
  Tendril,
  config::Registration,
  factory::SessionFactory,
  position::{
    CaretId,
    CaretPosition,
  },
  resolver::ResolverRegistry,
  session::{
    Reaction,
    TrackingSession,
  },
  stack::SessionStack,
};

#[derive(Debug)]
pub struct BraceCompletion {
  factory: SessionFactory,
  stacks:  HashMap<CaretId, SessionStack>,
}

impl BraceCompletion {
  pub fn new(registration: Arc<Registration>, resolvers: Arc<ResolverRegistry>) -> Self {
    Self::with_factory(SessionFactory::new(registration, resolvers))
  }

  pub fn with_factory(factory: SessionFactory) -> Self {
    Self {
      factory,
      stacks: HashMap::new(),
    }
  }

  pub fn factory(&self) -> &SessionFactory {
    &self.factory
  }

  pub fn character_typed(
    &mut self,
    buffer: &mut Buffer,
    caret_id: CaretId,
    position: CaretPosition,
    ch: char,
  ) -> Result<CaretPosition> {
    let offset = position.revalidate(buffer)?;
    let stack = self.stacks.entry(caret_id).or_default();
    stack.prune(buffer, offset);

    if let Some(top) = stack.top_mut()
      && let Reaction::Consumed { caret } = top.typed(buffer, offset, ch)
    {
      tracing::trace!(?caret_id, %ch, caret, "typed over closing delimiter");
      stack.pop_exited();
      return Ok(CaretPosition::at(buffer, caret));
    }

    if let Some(session) = self
      .factory
      .try_create_session(buffer, stack, offset, ch)?
    {
      let caret = session.span().start();
      stack.settle();
      return Ok(CaretPosition::at(buffer, caret));
    }

    let mut fragment = Tendril::new();
    fragment.push(ch);
    insert(buffer, offset, fragment)
  }

  pub fn backspace(
    &mut self,
    buffer: &mut Buffer,
    caret_id: CaretId,
    position: CaretPosition,
  ) -> Result<CaretPosition> {
    let offset = position.revalidate(buffer)?;
    let stack = self.stacks.entry(caret_id).or_default();
    stack.prune(buffer, offset);

    if let Some(top) = stack.top_mut()
      && let Reaction::Consumed { caret } = top.backspace(buffer, offset)?
    {
      stack.pop_exited();
      return Ok(CaretPosition::at(buffer, caret));
    }

    if offset == 0 {
      return Ok(position);
    }
    let mut scope = UndoScope::acquire(buffer, offset)?;
    let tx = Transaction::delete(scope.text(), offset - 1, offset)?.with_caret(offset - 1);
    scope.apply(&tx)?;
    let caret = scope.complete()?;
    Ok(CaretPosition::at(buffer, caret))
  }

  /// Caret moved without editing. Every span is brought up to date, but only
  /// the innermost session is told; outer sessions are checked the next time
  /// an edit reaches them.
  pub fn caret_moved(
    &mut self,
    buffer: &Buffer,
    caret_id: CaretId,
    position: CaretPosition,
  ) -> Result<CaretPosition> {
    let offset = position.revalidate(buffer)?;
    let Some(stack) = self.stacks.get_mut(&caret_id) else {
      return Ok(position);
    };

    stack.sync(buffer);
    if let Some(top) = stack.top_mut() {
      top.caret_moved(buffer, offset);
    }
    stack.pop_exited();
    Ok(position)
  }

  pub fn return_pressed(
    &mut self,
    buffer: &mut Buffer,
    caret_id: CaretId,
    position: CaretPosition,
  ) -> Result<CaretPosition> {
    let offset = position.revalidate(buffer)?;
    let stack = self.stacks.entry(caret_id).or_default();
    stack.prune(buffer, offset);

    if let Some(top) = stack.top_mut()
      && let Reaction::Consumed { caret } = top.return_pressed(buffer, offset)?
    {
      stack.pop_exited();
      return Ok(CaretPosition::at(buffer, caret));
    }

    insert(buffer, offset, Tendril::from("\n"))
  }

  /// Forget the sessions of a caret the host removed.
  pub fn release_caret(&mut self, caret_id: CaretId) {
    if let Some(stack) = self.stacks.remove(&caret_id) {
      tracing::trace!(?caret_id, sessions = stack.len(), "released caret");
    }
  }

  pub fn active_sessions(&self, caret_id: CaretId) -> usize {
    self.stacks.get(&caret_id).map_or(0, SessionStack::len)
  }

  pub fn top_session(&self, caret_id: CaretId) -> Option<&TrackingSession> {
    self.stacks.get(&caret_id).and_then(SessionStack::top)
  }

  pub fn stack(&self, caret_id: CaretId) -> Option<&SessionStack> {
    self.stacks.get(&caret_id)
  }
}

fn insert(buffer: &mut Buffer, offset: usize, fragment: Tendril) -> Result<CaretPosition> {
  let caret = offset + fragment.chars().count();
  let mut scope = UndoScope::acquire(buffer, offset)?;
  let tx = Transaction::insert(scope.text(), offset, fragment)?.with_caret(caret);
  scope.apply(&tx)?;
  let caret = scope.complete()?;
  Ok(CaretPosition::at(buffer, caret))
}
