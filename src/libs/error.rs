use std::fmt;

/// Errors produced by the pan-genome engine.
#[derive(Debug)]
pub enum PangeneError {
    /// Unknown, missing-required, type-mismatched or rule-violating option
    Option(String),
    /// A data-model invariant was broken
    Invariant(String),
    /// External cancellation (Ctrl-C or an embedding host)
    Interrupted,
    /// Errors captured inside parallel workers, one message per worker
    Worker(Vec<String>),
    /// Malformed input file
    Parse {
        file: String,
        line: usize,
        message: String,
    },
    /// Read/write failure
    Io(std::io::Error),
}

impl fmt::Display for PangeneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PangeneError::Option(msg) => write!(f, "option error: {}", msg),
            PangeneError::Invariant(msg) => write!(f, "invariant violated: {}", msg),
            PangeneError::Interrupted => write!(f, "interrupted"),
            PangeneError::Worker(msgs) => {
                write!(f, "{} worker error(s): {}", msgs.len(), msgs.join("; "))
            }
            PangeneError::Parse {
                file,
                line,
                message,
            } => {
                write!(f, "parse error at {}:{}: {}", file, line, message)
            }
            PangeneError::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for PangeneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PangeneError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PangeneError {
    fn from(e: std::io::Error) -> Self {
        PangeneError::Io(e)
    }
}

impl PangeneError {
    /// Process exit code for the CLI wrapper.
    /// 0 is success, 15 is reserved for script errors,
    /// 255 covers option and runtime errors.
    pub fn exit_code(&self) -> i32 {
        match self {
            PangeneError::Interrupted => 130,
            _ => 255,
        }
    }
}

pub type Result<T> = std::result::Result<T, PangeneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_codes() {
        let e = PangeneError::Option("unknown option --foo".to_string());
        assert!(e.to_string().contains("--foo"));
        assert_eq!(e.exit_code(), 255);
        assert_eq!(PangeneError::Interrupted.exit_code(), 130);

        let e = PangeneError::Parse {
            file: "x.fa".to_string(),
            line: 3,
            message: "bad header".to_string(),
        };
        assert_eq!(e.to_string(), "parse error at x.fa:3: bad header");
    }
}
