//! A cached, interceptor-driven HTTP client built on `hyper`.
//!
//! Start with [`EasyHttp::builder`] to configure a client, then
//! [`EasyHttp::new_call`] to build a one-shot [`Call`] from a [`Request`].
//! Calls run through an application-supplied [`Interceptor`] chain before
//! reaching the engine, which serves from an on-disk [`CacheControl`]-aware
//! cache where possible and otherwise performs the network fetch itself,
//! following redirects up to a bounded retry count.
//!
//! ```no_run
//! # async fn run() -> Result<(), easyhttp::Error> {
//! use easyhttp::{EasyHttp, Request};
//!
//! let client = EasyHttp::builder().cache("./http-cache").build()?;
//! let request = Request::builder("https://example.com".parse().unwrap()).build();
//! let response = client.new_call(request).execute().await?;
//! println!("{}", response.status_code());
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod macros;

mod async_exec;
mod body;
mod cache;
mod call;
mod client;
mod constants;
mod engine;
mod error;
mod executor;
mod interceptor;
mod pool;
mod proxy;
mod request;
mod response;

#[cfg(feature = "blocking")]
pub mod blocking;

pub use async_exec::{AsyncExecutorPool, ResponseCallback};
pub use body::ResponseBody;
pub use cache::CacheControl;
pub use call::Call;
pub use client::{Builder, EasyHttp};
pub use error::{Error, Result};
pub use interceptor::{Chain, Interceptor};
pub use pool::{Connection, EndpointKey};
pub use proxy::Proxy;
pub use request::Request;
pub use response::Response;
