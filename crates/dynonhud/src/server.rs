use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use dynonhud_decoder::EfisEmsDecoder;
use dynonhud_feed::snapshot;
use tracing::{debug, info, warn};

const HEAD_READ_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_HEAD_BYTES: usize = 8192;

/// Serves the combined telemetry snapshot over plain HTTP.
///
/// Every request gets the same answer: a pretty-printed JSON dump of
/// whatever the caches currently hold. Requests are handled one at a time;
/// this is a cockpit-side status view, not a public endpoint.
pub struct StatusServer {
    listener: TcpListener,
    decoder: Arc<EfisEmsDecoder>,
}

impl StatusServer {
    /// Bind on all interfaces at `port`. Port 0 picks an ephemeral port.
    pub fn bind(port: u16, decoder: Arc<EfisEmsDecoder>) -> io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        info!(addr = %listener.local_addr()?, "status server listening");
        Ok(Self { listener, decoder })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and answer requests until the process exits.
    pub fn serve(&self) -> ! {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!(%peer, "status request");
                    if let Err(err) = self.respond(stream) {
                        warn!(%peer, error = %err, "status response failed");
                    }
                }
                Err(err) => {
                    warn!(error = %err, "accept failed");
                }
            }
        }
    }

    fn respond(&self, mut stream: TcpStream) -> io::Result<()> {
        stream.set_read_timeout(Some(HEAD_READ_TIMEOUT))?;
        drain_request_head(&mut stream);

        let view = snapshot(&self.decoder);
        let body = serde_json::to_string_pretty(&view)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

        let response = format!(
            "HTTP/1.1 200 OK\r\n\
             Content-Type: text/html\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n\
             {}",
            body.len(),
            body
        );
        stream.write_all(response.as_bytes())?;
        stream.flush()
    }
}

/// Consume the request head so the client sees a clean close. The method and
/// path are ignored; any request yields the snapshot.
fn drain_request_head(stream: &mut TcpStream) {
    let mut head = Vec::new();
    let mut chunk = [0u8; 512];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => return,
            Ok(n) => {
                head.extend_from_slice(&chunk[..n]);
                if head.windows(4).any(|w| w == b"\r\n\r\n") || head.len() > MAX_HEAD_BYTES {
                    return;
                }
            }
            Err(_) => return,
        }
    }
}
