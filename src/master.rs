// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP master
//!
//! The [`Master`] is the entry point of this crate: it validates the
//! parameters of a call, builds the request frame, runs the exchange on its
//! [`Session`] and turns the verified response into plain values.

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tokio_util::sync::CancellationToken;

use crate::{
    codec::tcp::client::{decode_response, encode_request},
    endpoint::Endpoint,
    error::{Error, Result},
    frame::{
        Address, Coil, FunctionCode, Header, Quantity, Request, RequestAdu, RequestPdu, Response,
        ResponseAdu, TransactionId, UnitId, Word,
    },
    session::Session,
};

/// A Modbus TCP master talking to one unit of one server.
///
/// All operations take the transaction id to put on the wire and a
/// [`CancellationToken`] that aborts the call. Concurrent calls on the
/// same master are serialized, there is never more than one request in
/// flight.
#[derive(Debug)]
pub struct Master<T = TcpStream> {
    session: Session<T>,
    unit_id: UnitId,
}

impl Master<TcpStream> {
    /// Create a disconnected master for `endpoint`.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        let unit_id = endpoint.unit_id;
        Self {
            session: Session::new(endpoint),
            unit_id,
        }
    }

    /// Connect to the endpoint. See [`Session::connect`].
    pub async fn connect(&self) -> Result<()> {
        self.session.connect().await
    }
}

impl<T> Master<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Talk to `unit_id` over an already established stream.
    pub fn attach(stream: T, unit_id: UnitId) -> Self {
        Self {
            session: Session::attach(stream),
            unit_id,
        }
    }

    #[must_use]
    pub const fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    #[must_use]
    pub const fn session(&self) -> &Session<T> {
        &self.session
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    pub async fn disconnect(&self) {
        self.session.disconnect().await;
    }

    /// Read `quantity` coils starting at `address`.
    pub async fn read_coils(
        &self,
        transaction_id: TransactionId,
        address: Address,
        quantity: Quantity,
        cancel: &CancellationToken,
    ) -> Result<Vec<Coil>> {
        self.call(
            transaction_id,
            Request::ReadCoils(address, quantity),
            cancel,
            |rsp| match rsp {
                Response::ReadCoils(coils) => Some(coils.into_iter().collect()),
                _ => None,
            },
        )
        .await
    }

    /// Read `quantity` discrete inputs starting at `address`.
    pub async fn read_discrete_inputs(
        &self,
        transaction_id: TransactionId,
        address: Address,
        quantity: Quantity,
        cancel: &CancellationToken,
    ) -> Result<Vec<Coil>> {
        self.call(
            transaction_id,
            Request::ReadDiscreteInputs(address, quantity),
            cancel,
            |rsp| match rsp {
                Response::ReadDiscreteInputs(coils) => Some(coils.into_iter().collect()),
                _ => None,
            },
        )
        .await
    }

    /// Read `quantity` holding registers starting at `address`.
    pub async fn read_holding_registers(
        &self,
        transaction_id: TransactionId,
        address: Address,
        quantity: Quantity,
        cancel: &CancellationToken,
    ) -> Result<Vec<Word>> {
        self.call(
            transaction_id,
            Request::ReadHoldingRegisters(address, quantity),
            cancel,
            |rsp| match rsp {
                Response::ReadHoldingRegisters(words) => Some(words.into_iter().collect()),
                _ => None,
            },
        )
        .await
    }

    /// Read `quantity` input registers starting at `address`.
    pub async fn read_input_registers(
        &self,
        transaction_id: TransactionId,
        address: Address,
        quantity: Quantity,
        cancel: &CancellationToken,
    ) -> Result<Vec<Word>> {
        self.call(
            transaction_id,
            Request::ReadInputRegisters(address, quantity),
            cancel,
            |rsp| match rsp {
                Response::ReadInputRegisters(words) => Some(words.into_iter().collect()),
                _ => None,
            },
        )
        .await
    }

    /// Switch a single coil.
    ///
    /// Returns `true` once the server acknowledged the write with an exact
    /// echo of address and value.
    pub async fn write_single_coil(
        &self,
        transaction_id: TransactionId,
        address: Address,
        coil: Coil,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.call(
            transaction_id,
            Request::WriteSingleCoil(address, coil),
            cancel,
            |rsp| matches!(rsp, Response::WriteSingleCoil(_, _)).then_some(true),
        )
        .await
    }

    /// Write a single holding register.
    pub async fn write_single_register(
        &self,
        transaction_id: TransactionId,
        address: Address,
        word: Word,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.call(
            transaction_id,
            Request::WriteSingleRegister(address, word),
            cancel,
            |rsp| matches!(rsp, Response::WriteSingleRegister(_, _)).then_some(true),
        )
        .await
    }

    /// Write consecutive coils starting at `address`.
    pub async fn write_multiple_coils(
        &self,
        transaction_id: TransactionId,
        address: Address,
        coils: &[Coil],
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.call(
            transaction_id,
            Request::WriteMultipleCoils(address, coils),
            cancel,
            |rsp| matches!(rsp, Response::WriteMultipleCoils(_, _)).then_some(true),
        )
        .await
    }

    /// Write consecutive holding registers starting at `address`.
    pub async fn write_multiple_registers(
        &self,
        transaction_id: TransactionId,
        address: Address,
        words: &[Word],
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.call(
            transaction_id,
            Request::WriteMultipleRegisters(address, words),
            cancel,
            |rsp| matches!(rsp, Response::WriteMultipleRegisters(_, _)).then_some(true),
        )
        .await
    }

    async fn call<R>(
        &self,
        transaction_id: TransactionId,
        request: Request<'_>,
        cancel: &CancellationToken,
        extract: impl FnOnce(Response<'_>) -> Option<R>,
    ) -> Result<R> {
        let adu = RequestAdu {
            hdr: Header {
                transaction_id,
                unit_id: self.unit_id,
            },
            pdu: RequestPdu(request),
        };
        let frame = encode_request(adu)?;
        let buf = self.session.exchange(transaction_id, &frame, cancel).await?;
        let ResponseAdu { pdu, .. } = decode_response(&adu, &buf)?;
        let rsp = pdu.0.map_err(|ex| {
            log::debug!("Exception response: {ex}");
            Error::Exception(ex)
        })?;
        let actual = FunctionCode::from(rsp).value();
        extract(rsp).ok_or(Error::FnCode {
            expected: FunctionCode::from(request).value(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    #[tokio::test]
    async fn read_holding_registers() {
        let (client, mut server) = duplex(256);
        let master = Master::attach(client, 0x11);
        let server = tokio::spawn(async move {
            let mut req = [0; 12];
            server.read_exact(&mut req).await.unwrap();
            assert_eq!(
                req,
                [0x00, 0x2A, 0x00, 0x00, 0x00, 0x06, 0x11, 0x03, 0x00, 0x6B, 0x00, 0x02]
            );
            server
                .write_all(&[
                    0x00, 0x2A, 0x00, 0x00, 0x00, 0x07, 0x11, 0x03, 0x04, 0x02, 0x2B, 0x00, 0x64,
                ])
                .await
                .unwrap();
            server
        });
        let words = master
            .read_holding_registers(42, 0x006B, 2, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(words, [0x022B, 0x0064]);
        let _server = server.await.unwrap();
    }

    #[tokio::test]
    async fn write_single_register_ack_mismatch() {
        let (client, mut server) = duplex(256);
        let master = Master::attach(client, 1);
        let server = tokio::spawn(async move {
            let mut req = [0; 12];
            server.read_exact(&mut req).await.unwrap();
            server
                .write_all(&[
                    0x00, 0x03, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x00, 0x01, 0x00, 0x04,
                ])
                .await
                .unwrap();
            server
        });
        let err = master
            .write_single_register(3, 0x0001, 0x0003, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AckMismatch);
        // The frame was read completely, the session stays usable.
        assert!(master.is_connected());
        let _server = server.await.unwrap();
    }
}
