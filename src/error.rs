//! Error classification
//!
//! Each module has its own error enum. The ones that can end the process
//! implement [`Classify`] so the binary can pick an exit code without
//! knowing every variant.

/// How a fatal error ends the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad command line, printed with a usage hint
    Parse,
    /// Script file trouble or no GUI
    Environment,
    /// Quickfix or crash-recovery load failure, with its own exit code
    FatalLoad(i32),
    /// Nothing could be allocated yet
    Unrecoverable,
}

impl ErrorClass {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorClass::Parse => 1,
            ErrorClass::Environment => 2,
            ErrorClass::FatalLoad(code) => code,
            ErrorClass::Unrecoverable => 0,
        }
    }
}

/// Errors that map onto a process exit
pub trait Classify {
    fn class(&self) -> ErrorClass;

    fn exit_code(&self) -> i32 {
        self.class().exit_code()
    }
}
