//! The request context carried through the pipeline.
//!
//! A [`Request`] is immutable from the caller's point of view: pipeline
//! stages receive it by value and hand back a (possibly modified) request.
//! The [`Extensions`] map is the private scratch area stages use to thread
//! per-request state (most importantly the post-adapter hooks) without
//! widening the request struct for every component.

use crate::error::Error;
use bytes::Bytes;
use http::{HeaderMap, Method};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use url::Url;

const ALLOWED_METHODS: &[Method] = &[
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::HEAD,
    Method::OPTIONS,
];

/// A typed, heterogeneous map keyed by type.
///
/// Values must be `Send` so requests can hop between tasks. Unlike the
/// `http` crate's extensions this map does not require values to be `Clone`,
/// which lets stages stash one-shot hooks in it.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl Extensions {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, replacing and returning any previous value of the
    /// same type.
    pub fn insert<T: Send + 'static>(&mut self, value: T) -> Option<T> {
        self.map
            .insert(TypeId::of::<T>(), Box::new(value))
            .and_then(|boxed| boxed.downcast().ok().map(|b| *b))
    }

    /// Returns a reference to the value of type `T`, if present.
    pub fn get<T: Send + 'static>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref())
    }

    /// Returns a mutable reference to the value of type `T`, if present.
    pub fn get_mut<T: Send + 'static>(&mut self) -> Option<&mut T> {
        self.map
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut())
    }

    /// Removes and returns the value of type `T`, if present.
    pub fn remove<T: Send + 'static>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast().ok().map(|b| *b))
    }

    /// Returns true if no values are stored.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extensions")
            .field("len", &self.map.len())
            .finish()
    }
}

/// An outbound request flowing through the pipeline.
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Url,
    body: Option<Bytes>,
    headers: HeaderMap,
    extensions: Extensions,
}

impl Request {
    /// Starts building a request.
    ///
    /// The URL is validated at [`RequestBuilder::build`]: the scheme must be
    /// `http` or `https` and the host must be non-empty, otherwise
    /// construction fails with [`Error::InvalidUrl`]. The method must be one
    /// of GET, POST, PUT, DELETE, PATCH, HEAD, OPTIONS.
    pub fn builder(method: Method, url: &str) -> RequestBuilder {
        RequestBuilder {
            method,
            url: url.to_string(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The parsed request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The request body, if any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// The request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the headers, for stages that decorate requests.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The per-request scratch area.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Mutable access to the per-request scratch area.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

/// Builder for [`Request`].
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    url: String,
    body: Option<Bytes>,
    headers: HeaderMap,
}

impl RequestBuilder {
    /// Sets the request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Replaces the header map.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Appends a single header.
    pub fn header(mut self, name: http::header::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Validates and builds the request.
    pub fn build(self) -> Result<Request, Error> {
        if !ALLOWED_METHODS.contains(&self.method) {
            return Err(Error::InvalidMethod(self.method.to_string()));
        }

        let url = Url::parse(&self.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::InvalidUrl(format!(
                    "unsupported scheme '{other}'"
                )))
            }
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(Error::InvalidUrl("missing host".to_string()));
        }

        Ok(Request {
            method: self.method,
            url,
            body: self.body,
            headers: self.headers,
            extensions: Extensions::new(),
        })
    }
}
