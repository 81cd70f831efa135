//! A minimal HTTP/1.1 server standing in for an engine in tests.
//!
//! Each accepted connection consumes the next canned response, records the
//! request, and closes. Response bodies are written with chunked encoding,
//! one HTTP chunk per configured piece, so decoders see split objects.
//! [`FakeEngine::serve_tls`] terminates TLS first and insists on a client
//! certificate signed by the fixture CA, as a machine engine does.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::pki_types::pem::PemObject;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::server::WebPkiClientVerifier;
use tokio_rustls::rustls::{RootCertStore, ServerConfig, crypto};

/// A canned response.
#[derive(Debug, Clone)]
pub(crate) struct FakeResponse {
    pub(crate) status: u16,
    pub(crate) pieces: Vec<String>,
}

impl FakeResponse {
    pub(crate) fn ok(pieces: &[&str]) -> Self {
        Self {
            status: 200,
            pieces: pieces.iter().map(|piece| String::from(*piece)).collect(),
        }
    }

    pub(crate) fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            pieces: vec![String::from(body)],
        }
    }

    pub(crate) const fn empty(status: u16) -> Self {
        Self {
            status,
            pieces: Vec::new(),
        }
    }
}

/// The directory holding the CA, client and engine PEM fixtures.
pub(crate) fn tls_fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/tls")
}

/// A request as received by the fake engine.
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordedRequest {
    pub(crate) request_line: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
}

impl RecordedRequest {
    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

pub(crate) struct FakeEngine {
    url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    task: JoinHandle<()>,
}

impl FakeEngine {
    /// Bind to an ephemeral local port and serve `responses` in order.
    pub(crate) async fn serve(responses: Vec<FakeResponse>) -> Self {
        Self::start(responses, None).await
    }

    /// Serve `responses` over TLS with the fixture engine certificate,
    /// requiring clients to present a certificate signed by the fixture CA.
    pub(crate) async fn serve_tls(responses: Vec<FakeResponse>) -> Self {
        Self::start(responses, Some(tls_acceptor(&tls_fixtures()))).await
    }

    async fn start(responses: Vec<FakeResponse>, tls: Option<TlsAcceptor>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("fake engine should bind");
        let addr = listener
            .local_addr()
            .expect("fake engine should have an address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&requests);
        let scheme = if tls.is_some() { "https" } else { "http" };

        let task = tokio::spawn(async move {
            for response in responses {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                match &tls {
                    Some(acceptor) => {
                        if let Ok(secured) = acceptor.accept(stream).await {
                            handle(secured, &response, &recorded).await;
                        }
                    }
                    None => {
                        handle(stream, &response, &recorded).await;
                    }
                }
            }
        });

        Self {
            url: format!("{scheme}://{addr}"),
            requests,
            task,
        }
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .expect("request log should not be poisoned")
            .clone()
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn tls_acceptor(fixtures: &Path) -> TlsAcceptor {
    let read = |name: &str| std::fs::read(fixtures.join(name)).expect("TLS fixture should be readable");
    let provider = Arc::new(crypto::ring::default_provider());

    let mut roots = RootCertStore::empty();
    roots
        .add(CertificateDer::from_pem_slice(&read("ca.pem")).expect("CA fixture should parse"))
        .expect("CA fixture should be a trust anchor");
    let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), Arc::clone(&provider))
        .build()
        .expect("client verifier should build");

    let chain = vec![
        CertificateDer::from_pem_slice(&read("server-cert.pem"))
            .expect("engine certificate fixture should parse"),
    ];
    let key = PrivateKeyDer::from_pem_slice(&read("server-key.pem"))
        .expect("engine key fixture should parse");
    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .expect("protocol versions should be supported")
        .with_client_cert_verifier(verifier)
        .with_single_cert(chain, key)
        .expect("engine certificate and key should match");
    TlsAcceptor::from(Arc::new(config))
}

async fn handle<S>(
    mut stream: S,
    response: &FakeResponse,
    recorded: &Mutex<Vec<RecordedRequest>>,
) -> Option<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = read_request(&mut stream).await?;
    recorded
        .lock()
        .expect("request log should not be poisoned")
        .push(request);

    let reason = if response.status < 300 { "OK" } else { "Error" };
    let head = format!(
        "HTTP/1.1 {} {reason}\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
        response.status
    );
    stream.write_all(head.as_bytes()).await.ok()?;
    for piece in &response.pieces {
        let chunk = format!("{:x}\r\n{piece}\r\n", piece.len());
        stream.write_all(chunk.as_bytes()).await.ok()?;
        stream.flush().await.ok()?;
        tokio::task::yield_now().await;
    }
    stream.write_all(b"0\r\n\r\n").await.ok()?;
    stream.shutdown().await.ok()?;
    Some(())
}

async fn read_request<S: AsyncRead + Unpin>(stream: &mut S) -> Option<RecordedRequest> {
    let mut buffer = Vec::new();
    let mut chunk = [0_u8; 4096];
    let head_end = loop {
        if let Some(pos) = find(&buffer, b"\r\n\r\n") {
            break pos;
        }
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            return None;
        }
        buffer.extend_from_slice(chunk.get(..read)?);
    };

    let head = String::from_utf8_lossy(buffer.get(..head_end)?).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = String::from(lines.next()?);
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (String::from(k.trim()), String::from(v.trim())))
        .collect();
    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buffer.get(head_end + 4..)?.to_vec();
    while body.len() < content_length {
        let read = stream.read(&mut chunk).await.ok()?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(chunk.get(..read)?);
    }

    Some(RecordedRequest {
        request_line,
        headers,
        body,
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
