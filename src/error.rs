use std::env;
use std::fmt::{self, Debug, Display};

#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Database,
    Network,
    Parse,
    EmptyResult,
    Location,
    InvalidInvocation,
    InvalidInput,
    Unexpected,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self.code {
            1 => ErrorKind::Config,
            2 => ErrorKind::Database,
            3 => ErrorKind::Network,
            4 => ErrorKind::Parse,
            6 => ErrorKind::Location,
            100 => ErrorKind::InvalidInvocation,
            101 => ErrorKind::InvalidInput,
            102 => ErrorKind::EmptyResult,
            _ => ErrorKind::Unexpected,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for Error {}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        env_var_error(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        database_error(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return parse_error(err);
        }

        network_error(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        io_error(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        parse_error(err)
    }
}

pub fn invalid_invocation_error() -> Error {
    Error {
        code: 100,
        message: "invalid invocation".into(),
    }
}

pub fn invalid_input_error() -> Error {
    Error {
        code: 101,
        message: "invalid input".into(),
    }
}

pub fn empty_result_error() -> Error {
    Error {
        code: 102,
        message: "no route found".into(),
    }
}

pub fn env_var_error(err: env::VarError) -> Error {
    Error {
        code: 1,
        message: format!("environment variable error: {}", err),
    }
}

pub fn config_error(message: impl Into<String>) -> Error {
    Error {
        code: 1,
        message: message.into(),
    }
}

pub fn database_error<T: Debug>(err: T) -> Error {
    Error {
        code: 2,
        message: format!("database error: {:?}", err),
    }
}

pub fn network_error<T: Display>(err: T) -> Error {
    Error {
        code: 3,
        message: format!("network error: {}", err),
    }
}

pub fn upstream_error(status: u16) -> Error {
    Error {
        code: 3,
        message: format!("upstream responded with status {}", status),
    }
}

pub fn parse_error<T: Display>(err: T) -> Error {
    Error {
        code: 4,
        message: format!("parse error: {}", err),
    }
}

pub fn unexpected_error() -> Error {
    Error {
        code: 5,
        message: "unexpected error".into(),
    }
}

pub fn location_error(message: impl Into<String>) -> Error {
    Error {
        code: 6,
        message: message.into(),
    }
}

pub fn io_error(err: std::io::Error) -> Error {
    Error {
        code: 7,
        message: format!("io error: {}", err),
    }
}

#[test]
fn error_kinds_follow_codes() {
    assert_eq!(invalid_invocation_error().kind(), ErrorKind::InvalidInvocation);
    assert_eq!(empty_result_error().kind(), ErrorKind::EmptyResult);
    assert_eq!(upstream_error(503).kind(), ErrorKind::Network);
    assert_eq!(parse_error("eof").kind(), ErrorKind::Parse);
    assert_eq!(unexpected_error().kind(), ErrorKind::Unexpected);
}

#[test]
fn serde_errors_are_parse_errors() {
    let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
    assert_eq!(err.kind(), ErrorKind::Parse);
}
