//! HTTP methods as typed enums.
//!
//! Two closed sets are modelled:
//!
//! - [`Method`]: every method the dispatcher understands on an inbound
//!   request. Anything else is answered `501 Not Implemented` before any
//!   routing work happens.
//! - [`RouteMethod`]: the methods an operation can be registered for.
//!   `HEAD` and `OPTIONS` are never registered; they are synthesized from the
//!   routing table.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A request method the dispatcher models.
///
/// Variants are declared in alphabetical order, so sorting a list of methods
/// yields the order used in `Allow` headers.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Method {
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
}

/// The method string is outside the modelled set.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("unsupported method `{0}`")]
pub struct UnsupportedMethod(pub String);

impl Method {
    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Delete  => "DELETE",
            Self::Get     => "GET",
            Self::Head    => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch   => "PATCH",
            Self::Post    => "POST",
            Self::Put     => "PUT",
        }
    }

    /// `GET`, `HEAD` and `POST` never need to be listed in
    /// `Access-Control-Allow-Methods`.
    pub fn is_cors_simple(self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Post)
    }
}

/// Parses an uppercase method string (e.g. `"GET"`). Case-sensitive per RFC 9110 §9.1.
impl FromStr for Method {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DELETE"  => Ok(Self::Delete),
            "GET"     => Ok(Self::Get),
            "HEAD"    => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "PATCH"   => Ok(Self::Patch),
            "POST"    => Ok(Self::Post),
            "PUT"     => Ok(Self::Put),
            _         => Err(UnsupportedMethod(s.to_owned())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A method an [`Operation`](crate::Operation) can be registered for.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RouteMethod {
    Delete,
    Get,
    Patch,
    Post,
    Put,
}

impl RouteMethod {
    pub(crate) const COUNT: usize = 5;

    pub fn as_method(self) -> Method {
        match self {
            Self::Delete => Method::Delete,
            Self::Get    => Method::Get,
            Self::Patch  => Method::Patch,
            Self::Post   => Method::Post,
            Self::Put    => Method::Put,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.as_method().as_str()
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<Method> for RouteMethod {
    type Error = UnsupportedMethod;

    fn try_from(method: Method) -> Result<Self, Self::Error> {
        match method {
            Method::Delete => Ok(Self::Delete),
            Method::Get    => Ok(Self::Get),
            Method::Patch  => Ok(Self::Patch),
            Method::Post   => Ok(Self::Post),
            Method::Put    => Ok(Self::Put),
            Method::Head | Method::Options => Err(UnsupportedMethod(method.as_str().to_owned())),
        }
    }
}

impl FromStr for RouteMethod {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Method>()?.try_into()
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
