//! Language server that reports `perl6 -c` errors as editor diagnostics.
//!
//! Every open or changed document is written to a temp file and checked by
//! the compiler; its stderr is turned into diagnostics by
//! [`perl6_ls_extract::extract`].

pub mod codec;
pub mod protocol;
pub mod runner;
pub mod validation;

pub(crate) mod documents;
mod server;

pub use runner::{CheckFuture, CheckOutcome, CompilerRunner, ProcessRunner, RunError};
pub use server::{LanguageServer, SessionEnd};
pub use validation::{ValidationEvent, Validator};
