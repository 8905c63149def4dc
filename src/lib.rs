//! Rox: a tree-walking interpreter for a small dynamically typed language
//! with closures, classes and single inheritance.
//!
//! Pipeline: [`scanner`] → [`parser`] → [`resolver`] → [`interpreter`].

pub mod ast;
pub mod ast_printer;
pub mod callable;
pub mod class;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

use std::fs::File;
use std::path::Path;

use log::info;
use memmap2::Mmap;

use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Maps `path` and returns its text without a leading UTF-8 BOM.  Open and
/// map failures come back as [`LoxError::Io`], bad encoding as
/// [`LoxError::Utf8`].
pub fn read_source(path: &Path) -> error::Result<String> {
    info!("Reading file: {:?}", path);

    let file = File::open(path)?;
    let len = file.metadata()?.len();

    if len == 0 {
        return Ok(String::new());
    }

    // SAFETY: the mapping is read-only and copied out before returning.
    let mmap = unsafe { Mmap::map(&file) }?;

    let bytes: &[u8] = mmap.strip_prefix(UTF8_BOM).unwrap_or(&mmap[..]);
    let source = String::from_utf8(bytes.to_vec())?;

    info!("Read {} bytes from {:?}", len, path);

    Ok(source)
}

/// Scans, parses, resolves and runs `source` on `interpreter`.
///
/// Static errors from a stage are all returned and nothing executes.  A
/// runtime error stops the run and comes back as the only element.
/// Globals defined by an earlier call stay visible to later ones.
pub fn run(source: &str, interpreter: &mut Interpreter) -> Result<(), Vec<LoxError>> {
    let tokens = scanner::scan_tokens(source.as_bytes())?;

    let statements = Parser::new(&tokens).parse()?;
    info!("Parsed {} statement(s)", statements.len());

    let locals = Resolver::new().resolve(&statements)?;
    interpreter.resolve(locals);

    interpreter.interpret(&statements).map_err(|e| vec![e])
}
