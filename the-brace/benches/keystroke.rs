//! Benchmarks for the brace completion keystroke path.
//!
//! Run with: `cargo bench -p the-brace --bench keystroke`

use std::{
  num::NonZeroUsize,
  sync::Arc,
};

use divan::{
  Bencher,
  black_box,
};
use ropey::Rope;
use the_brace::{
  config::Registration,
  handler::BraceCompletion,
  position::{
    CaretId,
    CaretPosition,
  },
  resolver::{
    ContextResolver,
    ResolverRegistry,
  },
};
use the_text::buffer::{
  Buffer,
  BufferId,
  DocumentKind,
};

fn main() {
  divan::main();
}

fn make_text(size: usize) -> String {
  let line = "fn main() { let value = compute(1, 2); }\n";
  let mut s = String::with_capacity(size);
  while s.len() < size {
    s.push_str(line);
  }
  s.truncate(size);
  s
}

fn setup(size: usize) -> (BraceCompletion, Buffer) {
  let registration = Registration::default();
  let resolvers =
    ResolverRegistry::new().with("rust", ContextResolver::from_registration(&registration));
  let completion = BraceCompletion::new(Arc::new(registration), Arc::new(resolvers));
  let id = BufferId::new(NonZeroUsize::new(1).unwrap());
  let buffer = Buffer::new(id, DocumentKind::from("rust"), Rope::from(make_text(size)));
  (completion, buffer)
}

fn caret() -> CaretId {
  CaretId::new(NonZeroUsize::new(1).unwrap())
}

/// Type a nested call and close it again, starting at the end of the text.
#[divan::bench(args = [1_000, 100_000])]
fn type_nested_call(bencher: Bencher, size: usize) {
  bencher
    .with_inputs(|| setup(size))
    .bench_local_values(|(mut completion, mut buffer)| {
      let caret = caret();
      let mut pos = CaretPosition::at(&buffer, buffer.len_chars());
      for ch in " f(g([x]))".chars() {
        pos = completion
          .character_typed(&mut buffer, caret, pos, ch)
          .unwrap();
      }
      black_box(pos)
    });
}

/// Open and immediately delete a pair, the shortest full session.
#[divan::bench(args = [1_000, 100_000])]
fn open_and_backspace(bencher: Bencher, size: usize) {
  bencher
    .with_inputs(|| setup(size))
    .bench_local_values(|(mut completion, mut buffer)| {
      let caret = caret();
      let pos = CaretPosition::at(&buffer, buffer.len_chars());
      let pos = completion
        .character_typed(&mut buffer, caret, pos, '{')
        .unwrap();
      let pos = completion.backspace(&mut buffer, caret, pos).unwrap();
      black_box(pos)
    });
}

/// Keystrokes with no pair involved still go through the handler.
#[divan::bench(args = [1_000, 100_000])]
fn plain_typing(bencher: Bencher, size: usize) {
  bencher
    .with_inputs(|| setup(size))
    .bench_local_values(|(mut completion, mut buffer)| {
      let caret = caret();
      let mut pos = CaretPosition::at(&buffer, 0);
      for ch in "let x = 1;".chars() {
        pos = completion
          .character_typed(&mut buffer, caret, pos, ch)
          .unwrap();
      }
      black_box(pos)
    });
}
