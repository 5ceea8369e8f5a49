//! Blocking HTTP access for version indexes and artifact downloads.
//!
//! Requests are made exactly once. A failed request fails the build, retries are left to the
//! platform.

use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::Path;

#[derive(thiserror::Error, Debug)]
pub enum HttpError {
    #[error("Request to {url} failed with HTTP status {status}")]
    Status { url: String, status: u16 },

    // Boxed to prevent `large_enum_variant` errors since `ureq::Error` is massive.
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("Couldn't read response from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: io::Error,
    },

    #[error("Couldn't write download from {url} to disk: {source}")]
    Write {
        url: String,
        #[source]
        source: io::Error,
    },

    #[error("Response from {url} is not valid JSON: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Fetches remote resources.
pub trait Fetcher {
    /// Fetches the body of the given URL as a string.
    fn get_string(&self, url: &str) -> Result<String, HttpError>;

    /// Downloads the given URL to a local file, replacing the file if it exists.
    fn download(&self, url: &str, destination: &Path) -> Result<(), HttpError>;
}

/// [`Fetcher`] backed by a blocking `ureq` client.
#[derive(Debug, Default, Clone, Copy)]
pub struct UreqFetcher;

impl UreqFetcher {
    fn call(url: &str) -> Result<ureq::Response, HttpError> {
        ureq::get(url).call().map_err(|error| match error {
            ureq::Error::Status(status, _) => HttpError::Status {
                url: url.to_string(),
                status,
            },
            error @ ureq::Error::Transport(_) => HttpError::Transport {
                url: url.to_string(),
                source: Box::new(error),
            },
        })
    }
}

impl Fetcher for UreqFetcher {
    fn get_string(&self, url: &str) -> Result<String, HttpError> {
        Self::call(url)?
            .into_string()
            .map_err(|source| HttpError::Body {
                url: url.to_string(),
                source,
            })
    }

    fn download(&self, url: &str, destination: &Path) -> Result<(), HttpError> {
        let mut reader = Self::call(url)?.into_reader();
        let mut file = fs::File::create(destination).map_err(|source| HttpError::Write {
            url: url.to_string(),
            source,
        })?;

        io::copy(&mut reader, &mut file)
            .map(|_| ())
            .map_err(|source| HttpError::Write {
                url: url.to_string(),
                source,
            })
    }
}

/// Fetches the given URL and deserializes the body as JSON.
pub fn fetch_json<T: DeserializeOwned>(fetcher: &dyn Fetcher, url: &str) -> Result<T, HttpError> {
    let body = fetcher.get_string(url)?;
    serde_json::from_str(&body).map_err(|source| HttpError::Json {
        url: url.to_string(),
        source,
    })
}

/// Replaces `{key}` placeholders in a URL template.
///
/// ```
/// use commons::http::render_url;
///
/// assert_eq!(
///     render_url(
///         "https://nodejs.org/dist/v{version}/node-v{version}-linux-{arch}.tar.gz",
///         &[("version", "20.11.1"), ("arch", "x64")]
///     ),
///     "https://nodejs.org/dist/v20.11.1/node-v20.11.1-linux-x64.tar.gz"
/// );
/// ```
pub fn render_url(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |url, (key, value)| {
            url.replace(&format!("{{{key}}}"), value)
        })
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::{Fetcher, HttpError};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;
    use std::path::Path;

    /// [`Fetcher`] that serves fixed bodies for known URLs and a 404 for everything else.
    #[derive(Debug, Default)]
    pub struct StaticFetcher {
        responses: HashMap<String, Vec<u8>>,
        requests: RefCell<Vec<String>>,
    }

    impl StaticFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub fn with(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
            self.responses.insert(url.into(), body.into());
            self
        }

        /// All URLs requested so far, in request order.
        pub fn requests(&self) -> Vec<String> {
            self.requests.borrow().clone()
        }

        fn respond(&self, url: &str) -> Result<&[u8], HttpError> {
            self.requests.borrow_mut().push(url.to_string());
            self.responses
                .get(url)
                .map(Vec::as_slice)
                .ok_or_else(|| HttpError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    impl Fetcher for StaticFetcher {
        fn get_string(&self, url: &str) -> Result<String, HttpError> {
            self.respond(url)
                .map(|body| String::from_utf8_lossy(body).into_owned())
        }

        fn download(&self, url: &str, destination: &Path) -> Result<(), HttpError> {
            let body = self.respond(url)?;
            fs::write(destination, body).map_err(|source| HttpError::Write {
                url: url.to_string(),
                source,
            })
        }
    }
}
