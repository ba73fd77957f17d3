// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport session
//!
//! A [`Session`] owns exactly one byte stream and performs framed
//! request/response exchanges on it. At most one exchange is in flight:
//! the stream lives behind an async mutex that every exchange holds from
//! the first written byte until the last byte of the response is read.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::{
    io::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _},
    net::TcpStream,
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;

use crate::{
    codec::tcp::{client::correlate, decode_header},
    endpoint::Endpoint,
    error::{Error, Result},
    frame::{MBAP_HEADER_LEN, TransactionId},
};

#[derive(Debug)]
struct Link<T> {
    stream: T,
    desynchronized: bool,
}

/// A Modbus TCP transport session.
#[derive(Debug)]
pub struct Session<T = TcpStream> {
    endpoint: Option<Endpoint>,
    link: Mutex<Option<Link<T>>>,
    connected: AtomicBool,
}

impl Session<TcpStream> {
    /// Create a disconnected session for `endpoint`.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint: Some(endpoint),
            link: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Establish the TCP connection.
    ///
    /// Does nothing if a connection exists, even if that connection is
    /// desynchronized. Call [`Session::disconnect`] first to replace it.
    pub async fn connect(&self) -> Result<()> {
        let mut link = self.link.lock().await;
        if link.is_some() {
            return Ok(());
        }
        let Some(endpoint) = &self.endpoint else {
            // Attached sessions have nowhere to reconnect to.
            return Err(Error::NotConnected);
        };
        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .and_then(|stream| stream.set_nodelay(true).map(|()| stream))
            .map_err(|source| {
                log::error!("Failed to connect to {endpoint}: {source}");
                Error::Connect {
                    endpoint: endpoint.to_string(),
                    source,
                }
            })?;
        log::info!("Connected to {endpoint}");
        *link = Some(Link {
            stream,
            desynchronized: false,
        });
        self.connected.store(true, Ordering::Release);
        Ok(())
    }
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Run the session over an already established stream.
    pub fn attach(stream: T) -> Self {
        Self {
            endpoint: None,
            link: Mutex::new(Some(Link {
                stream,
                desynchronized: false,
            })),
            connected: AtomicBool::new(true),
        }
    }

    /// The endpoint this session connects to, `None` for attached streams.
    #[must_use]
    pub const fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Returns `true` while a connection exists.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Close the connection.
    ///
    /// Safe to call when not connected. Shutdown failures are ignored.
    pub async fn disconnect(&self) {
        let mut link = self.link.lock().await;
        self.connected.store(false, Ordering::Release);
        let Some(mut link) = link.take() else {
            return;
        };
        if let Err(err) = link.stream.shutdown().await {
            log::debug!("Ignoring shutdown failure: {err}");
        }
        match &self.endpoint {
            Some(endpoint) => log::info!("Disconnected from {endpoint}"),
            None => log::info!("Disconnected"),
        }
    }

    /// Send a complete request frame and receive the matching response frame.
    ///
    /// The returned buffer holds exactly one frame: the 7 byte MBAP header
    /// followed by as many bytes as its length field declares. Its
    /// transaction id equals `transaction_id`.
    ///
    /// After a framing error, a transaction mismatch, an I/O failure or a
    /// cancellation during I/O the session answers every further exchange
    /// with [`Error::Desynchronized`] until it is reconnected.
    pub async fn exchange(
        &self,
        transaction_id: TransactionId,
        request: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let mut guard = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            guard = self.link.lock() => guard,
        };
        let link = guard.as_mut().ok_or(Error::NotConnected)?;
        if link.desynchronized {
            return Err(Error::Desynchronized);
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let res = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            res = link.transact(transaction_id, request) => res,
        };
        if let Err(err) = &res {
            if err.is_desynchronizing() {
                log::warn!("Session desynchronized: {err}");
                link.desynchronized = true;
            }
        }
        res
    }
}

impl<T> Link<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    async fn transact(
        &mut self,
        transaction_id: TransactionId,
        request: &[u8],
    ) -> Result<Vec<u8>> {
        log::debug!("TX: {request:02X?}");
        self.stream.write_all(request).await?;
        self.stream.flush().await?;

        let mut buf = vec![0; MBAP_HEADER_LEN];
        match read_full(&mut self.stream, &mut buf).await? {
            0 => return Err(Error::ConnectionClosed),
            MBAP_HEADER_LEN => {}
            received => return Err(Error::ShortHeader { received }),
        }
        // A stale frame is reported as such, whatever else is wrong with it.
        correlate(transaction_id, &buf)?;
        let hdr = decode_header(&buf)?;
        let expected = hdr.body_len();
        buf.resize(MBAP_HEADER_LEN + expected, 0);
        let received = read_full(&mut self.stream, &mut buf[MBAP_HEADER_LEN..]).await?;
        if received < expected {
            return Err(Error::ShortBody { expected, received });
        }
        log::debug!("RX: {buf:02X?}");
        Ok(buf)
    }
}

/// Read until `buf` is full or the peer closed the stream.
///
/// Returns the number of bytes read.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
