#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use rox::error::LoxError;
use rox::interpreter::Interpreter;

/// A `Write` sink the test keeps a handle to after the interpreter owns it.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn capturing_interpreter() -> (Interpreter, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let interpreter = Interpreter::with_output(Box::new(buffer.clone()));
    (interpreter, buffer)
}

/// Runs `source` on a fresh interpreter; returns what it printed and the
/// outcome.
pub fn run(source: &str) -> (String, Result<(), Vec<LoxError>>) {
    let (mut interpreter, buffer) = capturing_interpreter();
    let result = rox::run(source, &mut interpreter);
    (buffer.contents(), result)
}

/// Runs `source`, which must succeed, and returns its output.
pub fn output_of(source: &str) -> String {
    let (output, result) = run(source);
    if let Err(errors) = result {
        panic!("program failed: {:?}\noutput so far:\n{}", errors, output);
    }
    output
}

/// Runs `source`, which must fail, and returns (output, rendered errors).
pub fn errors_of(source: &str) -> (String, Vec<String>) {
    let (output, result) = run(source);
    match result {
        Ok(()) => panic!("program unexpectedly succeeded:\n{}", output),
        Err(errors) => (output, errors.iter().map(|e| e.to_string()).collect()),
    }
}
