//! The network leg of a single engine attempt: connect, send, stream the
//! response body back to the caller while optionally mirroring it to a
//! temp cache file.

use std::sync::Arc;

use bytes::Bytes;
use http::uri::Scheme;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::{self, pki_types::ServerName};

use super::HttpEngine;
use crate::body::ResponseBody;
use crate::cache::{CacheRecord, fingerprint};
use crate::error::{Error, Result};
use crate::pool::EndpointKey;
use crate::request::Request;
use crate::response::Response;

pub(super) async fn fetch(
    engine: &HttpEngine,
    request: &Arc<Request>,
    sent_at: u64,
    cache_response: Option<Arc<Response>>,
    prior_response: Option<Arc<Response>>,
) -> Result<Arc<Response>> {
    let url = request.url();
    let scheme = if url.scheme() == "https" {
        Scheme::HTTPS
    } else {
        Scheme::HTTP
    };
    let host = url
        .host_str()
        .ok_or_else(|| Error::illegal_argument("request url has no host"))?
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| Error::illegal_argument("request url has no resolvable port"))?;

    let key = EndpointKey::new(scheme.clone(), host.clone(), port, engine.context().proxy().cloned());
    let connection = engine.context().pool().acquire(key).await;
    engine.remember_connection(connection.clone());

    let uri: http::Uri = url.as_str().parse().map_err(|e| Error::illegal_argument("invalid request url").with_source(e))?;
    let mut builder = http::Request::builder().method(request.method().clone()).uri(uri);
    for (name, value) in request.headers().iter() {
        builder = builder.header(name, value);
    }

    let body_bytes = request.body().cloned().unwrap_or_default();
    let outgoing = if body_bytes.is_empty() {
        builder
            .body(Full::new(Bytes::new()).map_err(|never: std::convert::Infallible| match never {}).boxed())
            .map_err(|e| Error::illegal_argument("failed to build request").with_source(e))?
    } else {
        builder
            .body(Full::new(body_bytes).map_err(|never: std::convert::Infallible| match never {}).boxed())
            .map_err(|e| Error::illegal_argument("failed to build request").with_source(e))?
    };

    let connect_timeout = engine.context().connect_timeout();
    let tcp = tokio::time::timeout(connect_timeout, TcpStream::connect((host.as_str(), port)))
        .await
        .map_err(|_| Error::timeout("connect timed out"))?
        .map_err(crate::error::map_transport_error)?;

    let incoming = if scheme == Scheme::HTTPS {
        let connector = TlsConnector::from(Arc::new(tls_config(engine.context())));
        let server_name = ServerName::try_from(host.clone())
            .map_err(|e| Error::ssl("invalid tls server name").with_source(e))?;
        let tls_stream = tokio::time::timeout(connect_timeout, connector.connect(server_name, tcp))
            .await
            .map_err(|_| Error::timeout("tls handshake timed out"))?
            .map_err(crate::error::map_transport_error)?;
        send_and_receive(TokioIo::new(tls_stream), outgoing, connect_timeout, engine.context().write_timeout()).await?
    } else {
        send_and_receive(TokioIo::new(tcp), outgoing, connect_timeout, engine.context().write_timeout()).await?
    };

    let (parts, incoming_body) = incoming.into_parts();
    let status_code = parts.status.as_u16();
    let status_message = parts.status.canonical_reason().unwrap_or("").to_string();
    let headers = parts.headers.clone();
    let content_length = http_body::Body::size_hint(&incoming_body).exact();

    let is_cacheable = request.method() == http::Method::GET
        && status_code == 200
        && request.cache_control().is_storable()
        && engine.context().cache().is_some();

    let (response_body, sender) = ResponseBody::streaming();
    let key = fingerprint(request);
    let context = engine.context().clone();
    let connection_for_pump = connection.clone();
    let request_for_pump = request.clone();
    let headers_for_pump = headers.clone();
    let status_message_for_pump = status_message.clone();

    tokio::spawn(async move {
        pump(
            incoming_body,
            sender,
            context,
            connection_for_pump,
            is_cacheable,
            key,
            request_for_pump,
            status_code,
            status_message_for_pump,
            headers_for_pump,
            sent_at,
        )
        .await;
    });

    let mut builder = Response::builder(request.clone())
        .status(status_code, status_message)
        .headers(headers)
        .body(response_body)
        .sent_request_epoch_sec(sent_at)
        .received_response_epoch_sec(sent_at);
    if let Some(len) = content_length {
        builder = builder.content_length(len);
    }
    if let Some(cache_response) = cache_response {
        builder = builder.cache_response(cache_response);
    }
    if let Some(prior_response) = prior_response {
        builder = builder.prior_response(prior_response);
    }
    Ok(Arc::new(builder.build()))
}

async fn send_and_receive<S>(
    io: TokioIo<S>,
    outgoing: http::Request<http_body_util::combinators::BoxBody<Bytes, std::convert::Infallible>>,
    handshake_timeout: std::time::Duration,
    write_timeout: std::time::Duration,
) -> Result<http::Response<Incoming>>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, connection) = tokio::time::timeout(handshake_timeout, hyper::client::conn::http1::handshake(io))
        .await
        .map_err(|_| Error::timeout("http handshake timed out"))?
        .map_err(crate::error::map_transport_error)?;
    tokio::spawn(async move {
        let _ = connection.await;
    });
    tokio::time::timeout(write_timeout, sender.send_request(outgoing))
        .await
        .map_err(|_| Error::timeout("sending request timed out"))?
        .map_err(crate::error::map_transport_error)
}

#[allow(clippy::too_many_arguments)]
async fn pump(
    mut incoming: Incoming,
    mut sender: crate::body::BodySender,
    context: Arc<crate::client::ClientContext>,
    connection: Arc<crate::pool::Connection>,
    is_cacheable: bool,
    cache_key: String,
    request: Arc<Request>,
    status_code: u16,
    status_message: String,
    headers: http::HeaderMap,
    sent_at: u64,
) {
    let storage = context.cache().filter(|_| is_cacheable);
    let mut temp_file = None;
    let mut total_len: u64 = 0;
    let read_timeout = context.read_timeout();

    if let Some(storage) = storage {
        match tokio::fs::File::create(storage.temp_path(&cache_key)).await {
            Ok(file) => temp_file = Some(file),
            Err(e) => warn!(%e, cache_key = %cache_key, "failed to open temp cache file"),
        }
    }

    // `closed()` and `incoming.frame()` race on equal footing: a caller who
    // calls `ResponseBody::close()` mid-stream must abort this loop even if
    // the next frame was already fully buffered and ready to read.
    loop {
        tokio::select! {
            _ = sender.closed() => {
                if let Some(storage) = context.cache() {
                    storage.abort_temp(&cache_key);
                }
                context.pool().remove(&connection).await;
                return;
            }
            frame = tokio::time::timeout(read_timeout, incoming.frame()) => {
                match frame {
                    Err(_) => {
                        sender.fail(Error::timeout("reading response body timed out")).await;
                        if let Some(storage) = context.cache() {
                            storage.abort_temp(&cache_key);
                        }
                        context.pool().remove(&connection).await;
                        return;
                    }
                    Ok(Some(Ok(frame))) => {
                        let Some(data) = frame.data_ref().cloned() else {
                            continue;
                        };
                        total_len += data.len() as u64;
                        if let Some(file) = temp_file.as_mut() {
                            if let Err(e) = file.write_all(&data).await {
                                warn!(%e, cache_key = %cache_key, "failed writing cache temp file");
                                temp_file = None;
                            }
                        }
                        if !sender.send(data).await {
                            if let Some(storage) = context.cache() {
                                storage.abort_temp(&cache_key);
                            }
                            context.pool().remove(&connection).await;
                            return;
                        }
                    }
                    Ok(Some(Err(e))) => {
                        sender.fail(crate::error::map_transport_error(e)).await;
                        if let Some(storage) = context.cache() {
                            storage.abort_temp(&cache_key);
                        }
                        context.pool().remove(&connection).await;
                        return;
                    }
                    Ok(None) => break,
                }
            }
        }
    }

    context.pool().release(&connection).await;

    if let (Some(mut file), Some(storage)) = (temp_file, context.cache()) {
        if file.flush().await.is_ok() {
            let record = CacheRecord {
                cache_key: cache_key.clone(),
                url: request.url().as_str().to_string(),
                method: request.method().as_str().to_string(),
                status_code,
                status_message,
                response_header_json: CacheRecord::encode_headers(&headers),
                response_body_size: total_len,
                sent_request_at_epoch: sent_at,
                received_response_at_epoch: sent_at,
                created_at_epoch: sent_at,
                last_accessed_at_epoch: sent_at,
            };
            if let Err(e) = storage.commit(record) {
                warn!(%e, cache_key = %cache_key, "failed to commit cache payload");
            }
        }
    }
}

/// Builds the TLS client config for a connection, honoring a caller-supplied
/// CA trust override (`EasyHttp::Builder::ca_trust`) in place of the default
/// webpki root set.
fn tls_config(context: &crate::client::ClientContext) -> rustls::ClientConfig {
    let mut roots = rustls::RootCertStore::empty();
    match context.ca_trust_roots() {
        Some(custom) => {
            roots.add_parsable_certificates(custom.iter().cloned());
        }
        None => roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
    }
    rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth()
}
