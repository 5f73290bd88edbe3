use std::fmt;
use std::convert;

use hyper;
use serde_json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    HttpError,
    DecodeError,
    UrlError,
    MissingElement,
    ConfigError,
    IOError,
    Unknown
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match *self {
            ErrorKind::HttpError => "HTTP Error",
            ErrorKind::DecodeError => "Decode Error",
            ErrorKind::UrlError => "URL Error",
            ErrorKind::MissingElement => "Missing Element",
            ErrorKind::ConfigError => "Config Error",
            ErrorKind::IOError => "IO Error",
            ErrorKind::Unknown => "Unknown Error"
        };
        write!(f, "{}", s)?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub msg: String
}

impl Error {
    pub fn new<T:AsRef<str>>(kind:ErrorKind, msg:T) -> Error {
        Error {
            kind,
            msg: msg.as_ref().into()
        }
    }

    pub fn simple(kind:ErrorKind) -> Error {
        Error {
            kind,
            msg:String::new()
        }
    }

    pub fn missing_element(id: &str) -> Error {
        Error::new(ErrorKind::MissingElement, format!("no element with id '{}'", id))
    }

    pub fn config<T:AsRef<str>>(msg:T) -> Error {
        Error::new(ErrorKind::ConfigError, msg)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.msg.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.msg)
        }
    }
}

impl std::error::Error for Error {}

impl convert::From<hyper::Error> for Error {
    fn from(_err: hyper::Error) -> Self {
        let msg:String;

        if _err.is_body_write_aborted() {
            msg = "body write aborted".into();
        } else if _err.is_canceled() {
            msg = "canceled".into();
        } else if _err.is_closed() {
            msg = "closed".into();
        } else if _err.is_connect() {
            msg = format!("connect failure ({})", _err);
        } else if _err.is_incomplete_message() {
            msg = "incomplete message".into();
        } else if _err.is_parse() {
            msg = "parse failure".into();
        } else if _err.is_timeout() {
            msg = "timed out".into();
        } else if _err.is_user() {
            msg = "user error".into();
        } else {
            msg = _err.to_string()
        }

        Error::new(ErrorKind::HttpError, msg)
    }
}

impl convert::From<hyper::http::Error> for Error {
    fn from(err: hyper::http::Error) -> Self {
        Error::new(ErrorKind::HttpError, err.to_string())
    }
}

impl convert::From<hyper::http::uri::InvalidUri> for Error {
    fn from(err: hyper::http::uri::InvalidUri) -> Self {
        Error::new(ErrorKind::UrlError, err.to_string())
    }
}

impl convert::From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorKind::DecodeError, err.to_string())
    }
}

impl convert::From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::IOError, err.to_string())
    }
}
