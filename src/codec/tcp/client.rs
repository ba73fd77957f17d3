// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP client (master) specific functions.
use super::*;

/// Encode a TCP request.
///
/// The request is validated first, no frame is built for requests that
/// violate the protocol limits.
pub fn encode_request(adu: RequestAdu<'_>) -> Result<Vec<u8>> {
    let RequestAdu { hdr, pdu } = adu;
    pdu.0.validate()?;
    let len = pdu.0.pdu_len();
    let mut buf = vec![0; MBAP_HEADER_LEN + len];
    BigEndian::write_u16(&mut buf[0..2], hdr.transaction_id);
    BigEndian::write_u16(&mut buf[2..4], PROTOCOL_ID);
    BigEndian::write_u16(&mut buf[4..6], (len + 1) as u16);
    buf[6] = hdr.unit_id;
    pdu.0.encode(&mut buf[MBAP_HEADER_LEN..])?;
    Ok(buf)
}

/// Check that `response` carries the transaction id of the pending request.
///
/// Exactly one request is in flight per connection, so correlation is a
/// single comparison. It must be done for every response.
pub fn correlate(expected: TransactionId, response: &[u8]) -> Result<()> {
    if response.len() < 2 {
        return Err(Error::ShortHeader {
            received: response.len(),
        });
    }
    let actual = BigEndian::read_u16(&response[0..2]);
    if actual != expected {
        return Err(Error::TransactionMismatch { expected, actual });
    }
    Ok(())
}

/// Decode a TCP response to `request`.
pub fn decode_response<'r>(request: &RequestAdu<'_>, buf: &'r [u8]) -> Result<ResponseAdu<'r>> {
    correlate(request.hdr.transaction_id, buf)?;
    let DecodedFrame {
        transaction_id,
        unit_id,
        pdu,
    } = extract_frame(buf)?;
    if unit_id != request.hdr.unit_id {
        log::warn!(
            "Response unit id {unit_id} differs from request unit id {}",
            request.hdr.unit_id
        );
    }
    let hdr = Header {
        transaction_id,
        unit_id,
    };
    ResponsePdu::decode(&request.pdu.0, pdu)
        .map(|pdu| ResponseAdu { hdr, pdu })
        .inspect_err(|err| {
            log::error!("Failed to decode response PDU: {err}");
        })
}
