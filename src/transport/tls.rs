/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::io::ErrorKind;
use std::io::Read;
use std::io::Write;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rustls::ClientConfig;
use rustls::ClientConnection;
use rustls::DigitallySignedStruct;
use rustls::RootCertStore;
use rustls::SignatureScheme;
use rustls::client::danger::HandshakeSignatureValid;
use rustls::client::danger::ServerCertVerified;
use rustls::client::danger::ServerCertVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::CertificateDer;
use rustls::pki_types::ServerName;
use rustls::pki_types::UnixTime;
use tracing::info;
use tracing::warn;

use super::CertificateCheck;
use super::Split;
use crate::ClientError;

const TLS_READ_SIZE: usize = 16 * 1024;

/// Accepts any server certificate but still checks the handshake signatures,
/// so the peer must hold the key of the certificate it presented.
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

pub(super) fn client_config(check: CertificateCheck) -> Result<ClientConfig, ClientError> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?;
    let config = match check {
        CertificateCheck::Skip => {
            warn!("Server certificate validation is disabled");
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
                .with_no_client_auth()
        }
        CertificateCheck::WebPki => {
            let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            builder.with_root_certificates(roots).with_no_client_auth()
        }
    };
    Ok(config)
}

fn lock(conn: &Mutex<ClientConnection>) -> std::io::Result<MutexGuard<'_, ClientConnection>> {
    conn.lock()
        .map_err(|_| std::io::Error::other("TLS connection state is poisoned"))
}

fn flush_tls(conn: &mut ClientConnection, sock: &mut TcpStream) -> std::io::Result<()> {
    while conn.wants_write() {
        conn.write_tls(sock)?;
    }
    Ok(())
}

/// A TLS client stream over a socket which was plaintext before.
pub struct TlsStream {
    conn: ClientConnection,
    sock: TcpStream,
}

impl TlsStream {
    pub fn handshake(
        mut sock: TcpStream,
        domain: &str,
        check: CertificateCheck,
    ) -> Result<TlsStream, ClientError> {
        let config = client_config(check)?;
        let server_name = ServerName::try_from(domain.to_string()).map_err(|err| {
            ClientError::Connection(std::io::Error::new(ErrorKind::InvalidInput, err))
        })?;
        let mut conn = ClientConnection::new(Arc::new(config), server_name)?;
        while conn.is_handshaking() {
            conn.complete_io(&mut sock)?;
        }
        info!(
            domain,
            version = ?conn.protocol_version(),
            cipher = ?conn.negotiated_cipher_suite().map(|suite| suite.suite()),
            "TLS handshake complete"
        );
        Ok(TlsStream { conn, sock })
    }
}

impl Read for TlsStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        rustls::Stream::new(&mut self.conn, &mut self.sock).read(buf)
    }
}

impl Write for TlsStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        rustls::Stream::new(&mut self.conn, &mut self.sock).write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        rustls::Stream::new(&mut self.conn, &mut self.sock).flush()
    }
}

impl Split for TlsStream {
    type Reader = TlsReader;
    type Writer = TlsWriter;

    fn split(self) -> std::io::Result<(TlsReader, TlsWriter)> {
        let read_sock = self.sock.try_clone()?;
        let conn = Arc::new(Mutex::new(self.conn));
        let reader = TlsReader {
            conn: conn.clone(),
            sock: read_sock,
            incoming: vec![0; TLS_READ_SIZE],
        };
        let writer = TlsWriter {
            conn,
            sock: self.sock,
        };
        Ok((reader, writer))
    }
}

/// Read half of a split [TlsStream].
///
/// Blocks on its own clone of the socket without holding the shared TLS
/// state, and only locks it to decrypt what arrived.
pub struct TlsReader {
    conn: Arc<Mutex<ClientConnection>>,
    sock: TcpStream,
    incoming: Vec<u8>,
}

impl Read for TlsReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            {
                let mut conn = lock(&self.conn)?;
                match conn.reader().read(buf) {
                    Ok(nr_read) => return Ok(nr_read),
                    Err(err) if err.kind() == ErrorKind::WouldBlock => {}
                    Err(err) => return Err(err),
                }
            }
            let nr_read = self.sock.read(&mut self.incoming)?;
            if nr_read == 0 {
                return Ok(0);
            }
            let mut conn = lock(&self.conn)?;
            let mut records = &self.incoming[..nr_read];
            while !records.is_empty() {
                conn.read_tls(&mut records)?;
                conn.process_new_packets()
                    .map_err(|err| std::io::Error::new(ErrorKind::InvalidData, err))?;
            }
            // Alerts and key updates produced while decrypting.
            flush_tls(&mut conn, &mut self.sock)?;
        }
    }
}

/// Write half of a split [TlsStream].
pub struct TlsWriter {
    conn: Arc<Mutex<ClientConnection>>,
    sock: TcpStream,
}

impl Write for TlsWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut conn = lock(&self.conn)?;
        let nr_written = conn.writer().write(buf)?;
        flush_tls(&mut conn, &mut self.sock)?;
        Ok(nr_written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut conn = lock(&self.conn)?;
        conn.writer().flush()?;
        flush_tls(&mut conn, &mut self.sock)?;
        self.sock.flush()
    }
}
