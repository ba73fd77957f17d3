// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use assert_matches::assert_matches;
use modbus_tcp_master::{
    CancellationToken, Endpoint, Error, ErrorKind, Exception, FunctionCode, Master,
};
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _, DuplexStream, duplex},
    net::TcpListener,
    time::{sleep, timeout},
};

fn stub() -> (Master<DuplexStream>, DuplexStream) {
    let (client, server) = duplex(1024);
    (Master::attach(client, 1), server)
}

async fn read_request(server: &mut DuplexStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0; len];
    server.read_exact(&mut buf).await.unwrap();
    buf
}

#[tokio::test]
async fn read_coils_from_stub_server() {
    let (master, mut server) = stub();
    let server = tokio::spawn(async move {
        let req = read_request(&mut server, 12).await;
        assert_eq!(
            req,
            [
                0x00, 0x01, // transaction id
                0x00, 0x00, // protocol id
                0x00, 0x06, // length
                0x01, // unit id
                0x01, // function code
                0x00, 0x00, // start address
                0x00, 0x08, // quantity
            ]
        );
        server
            .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x04, 0x01])
            .await
            .unwrap();
        server.write_all(&[0x01, 0x05, 0xFF]).await.unwrap();
        server
    });
    let coils = master
        .read_coils(1, 0, 8, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(coils, [true; 8]);
    let _server = server.await.unwrap();
}

#[tokio::test]
async fn read_discrete_inputs_and_input_registers() {
    let (master, mut server) = stub();
    let server = tokio::spawn(async move {
        read_request(&mut server, 12).await;
        server
            .write_all(&[
                0x00, 0x0A, 0x00, 0x00, 0x00, 0x05, 0x01, 0x02, 0x02, 0b_1010_1100, 0b_01,
            ])
            .await
            .unwrap();
        let req = read_request(&mut server, 12).await;
        assert_eq!(&req[7..], &[0x04, 0x00, 0x08, 0x00, 0x01]);
        server
            .write_all(&[
                0x00, 0x0B, 0x00, 0x00, 0x00, 0x05, 0x01, 0x04, 0x02, 0x00, 0x0A,
            ])
            .await
            .unwrap();
        server
    });
    let cancel = CancellationToken::new();
    let inputs = master.read_discrete_inputs(10, 0x00C4, 10, &cancel).await.unwrap();
    assert_eq!(
        inputs,
        [false, false, true, true, false, true, false, true, true, false]
    );
    let words = master.read_input_registers(11, 0x0008, 1, &cancel).await.unwrap();
    assert_eq!(words, [0x000A]);
    let _server = server.await.unwrap();
}

#[tokio::test]
async fn write_multiple_coils_request_frame() {
    let (master, mut server) = stub();
    let server = tokio::spawn(async move {
        let req = read_request(&mut server, 14).await;
        assert_eq!(
            req,
            [
                0x00, 0x02, 0x00, 0x00, 0x00, 0x08, 0x01, 0x0F, 0x00, 0x01, 0x00, 0x03, 0x01,
                0x05,
            ]
        );
        server
            .write_all(&[
                0x00, 0x02, 0x00, 0x00, 0x00, 0x06, 0x01, 0x0F, 0x00, 0x01, 0x00, 0x03,
            ])
            .await
            .unwrap();
        server
    });
    let acked = master
        .write_multiple_coils(2, 1, &[true, false, true], &CancellationToken::new())
        .await
        .unwrap();
    assert!(acked);
    let _server = server.await.unwrap();
}

#[tokio::test]
async fn write_single_coil_and_multiple_registers() {
    let (master, mut server) = stub();
    let server = tokio::spawn(async move {
        let req = read_request(&mut server, 12).await;
        assert_eq!(&req[7..], &[0x05, 0x00, 0xAC, 0x00, 0x00]);
        server.write_all(&req).await.unwrap();
        let req = read_request(&mut server, 17).await;
        assert_eq!(
            &req[7..],
            &[0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02]
        );
        server
            .write_all(&[
                0x00, 0x05, 0x00, 0x00, 0x00, 0x06, 0x01, 0x10, 0x00, 0x01, 0x00, 0x02,
            ])
            .await
            .unwrap();
        server
    });
    let cancel = CancellationToken::new();
    assert!(master.write_single_coil(4, 0x00AC, false, &cancel).await.unwrap());
    assert!(
        master
            .write_multiple_registers(5, 0x0001, &[0x000A, 0x0102], &cancel)
            .await
            .unwrap()
    );
    let _server = server.await.unwrap();
}

#[tokio::test]
async fn invalid_parameters_are_rejected_without_io() {
    let (master, mut server) = stub();
    let cancel = CancellationToken::new();

    let errors = [
        master.read_coils(1, 0, 0, &cancel).await.unwrap_err(),
        master.read_coils(1, 0, 2001, &cancel).await.unwrap_err(),
        master.read_discrete_inputs(1, 0, 0, &cancel).await.unwrap_err(),
        master.read_holding_registers(1, 0, 126, &cancel).await.unwrap_err(),
        master.read_input_registers(1, 0, 0, &cancel).await.unwrap_err(),
        master.read_holding_registers(1, 0xFFFF, 2, &cancel).await.unwrap_err(),
        master.write_multiple_coils(1, 0, &[], &cancel).await.unwrap_err(),
        master
            .write_multiple_coils(1, 0, &[true; 2001], &cancel)
            .await
            .unwrap_err(),
        master.write_multiple_registers(1, 0, &[], &cancel).await.unwrap_err(),
        master
            .write_multiple_registers(1, 0, &[0; 126], &cancel)
            .await
            .unwrap_err(),
    ];
    for err in errors {
        assert_eq!(err.kind(), ErrorKind::Validation, "{err}");
    }
    assert_matches!(
        master.read_coils(1, 0, 2001, &cancel).await,
        Err(Error::Quantity {
            quantity: 2001,
            max: 2000
        })
    );
    assert_matches!(
        master.read_holding_registers(1, 0xFFFF, 2, &cancel).await,
        Err(Error::AddressOverflow {
            address: 0xFFFF,
            quantity: 2
        })
    );

    drop(master);
    let mut sent = Vec::new();
    server.read_to_end(&mut sent).await.unwrap();
    assert!(sent.is_empty());
}

#[tokio::test]
async fn upper_bounds_are_accepted() {
    let (master, mut server) = stub();
    let server = tokio::spawn(async move {
        let req = read_request(&mut server, 12).await;
        assert_eq!(&req[7..], &[0x03, 0x00, 0x00, 0x00, 0x7D]);
        let mut rsp = vec![0x00, 0x01, 0x00, 0x00, 0x00, 0xFD, 0x01, 0x03, 0xFA];
        rsp.extend((0..125_u16).flat_map(u16::to_be_bytes));
        server.write_all(&rsp).await.unwrap();
        server
    });
    let words = master
        .read_holding_registers(1, 0, 125, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(words, (0..125).collect::<Vec<u16>>());
    let _server = server.await.unwrap();
}

#[tokio::test]
async fn transaction_mismatch_desynchronizes_the_session() {
    let (master, mut server) = stub();
    let server = tokio::spawn(async move {
        read_request(&mut server, 12).await;
        server
            .write_all(&[0x00, 0x02, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x12, 0x34])
            .await
            .unwrap();
        server
    });
    let cancel = CancellationToken::new();
    let err = master
        .read_holding_registers(1, 0, 1, &cancel)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransactionMismatch);
    assert_matches!(
        err,
        Error::TransactionMismatch {
            expected: 1,
            actual: 2
        }
    );
    assert_matches!(
        master.read_holding_registers(2, 0, 1, &cancel).await,
        Err(Error::Desynchronized)
    );
    let _server = server.await.unwrap();
}

#[tokio::test]
async fn exception_responses() {
    for code in 0x01..=0x0B_u8 {
        let (master, mut server) = stub();
        let server = tokio::spawn(async move {
            read_request(&mut server, 12).await;
            server
                .write_all(&[0x00, 0x07, 0x00, 0x00, 0x00, 0x03, 0x01, 0x83, code])
                .await
                .unwrap();
            server
        });
        let err = master
            .read_holding_registers(7, 0, 1, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Exception);
        let ex = err.exception().unwrap();
        assert_eq!(ex.function, FunctionCode::ReadHoldingRegisters);
        assert_eq!(ex.exception.code(), code);
        assert_eq!(ex.exception, Exception::new(code));
        let _server = server.await.unwrap();
    }
}

#[tokio::test]
async fn exception_keeps_the_session_usable() {
    let (master, mut server) = stub();
    let server = tokio::spawn(async move {
        read_request(&mut server, 12).await;
        server
            .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x03, 0x01, 0x81, 0x02])
            .await
            .unwrap();
        read_request(&mut server, 12).await;
        server
            .write_all(&[0x00, 0x02, 0x00, 0x00, 0x00, 0x04, 0x01, 0x01, 0x01, 0x01])
            .await
            .unwrap();
        server
    });
    let cancel = CancellationToken::new();
    assert_matches!(
        master.read_coils(1, 0x1000, 1, &cancel).await,
        Err(Error::Exception(ex)) if ex.exception == Exception::IllegalDataAddress
    );
    assert_eq!(master.read_coils(2, 0, 1, &cancel).await.unwrap(), [true]);
    let _server = server.await.unwrap();
}

#[tokio::test]
async fn short_header() {
    let (master, mut server) = stub();
    let server = tokio::spawn(async move {
        read_request(&mut server, 12).await;
        server.write_all(&[0x00, 0x01, 0x00]).await.unwrap();
    });
    let err = master
        .read_coils(1, 0, 1, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_matches!(err, Error::ShortHeader { received: 3 });
    assert_eq!(err.kind(), ErrorKind::Framing);
    server.await.unwrap();
}

#[tokio::test]
async fn short_body() {
    let (master, mut server) = stub();
    let server = tokio::spawn(async move {
        read_request(&mut server, 12).await;
        server
            .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x04])
            .await
            .unwrap();
    });
    let cancel = CancellationToken::new();
    let err = master
        .read_holding_registers(1, 0, 2, &cancel)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        Error::ShortBody {
            expected: 5,
            received: 2
        }
    );
    assert_eq!(err.kind(), ErrorKind::Framing);
    assert_matches!(
        master.read_holding_registers(2, 0, 2, &cancel).await,
        Err(Error::Desynchronized)
    );
    server.await.unwrap();
}

#[tokio::test]
async fn invalid_protocol_id() {
    let (master, mut server) = stub();
    let server = tokio::spawn(async move {
        read_request(&mut server, 12).await;
        server
            .write_all(&[0x00, 0x01, 0x00, 0x01, 0x00, 0x04, 0x01, 0x01, 0x01, 0x01])
            .await
            .unwrap();
        server
    });
    assert_matches!(
        master.read_coils(1, 0, 1, &CancellationToken::new()).await,
        Err(Error::ProtocolNotModbus(1))
    );
    let _server = server.await.unwrap();
}

#[tokio::test]
async fn concurrent_calls_do_not_interleave() {
    let (master, mut server) = stub();
    let server = tokio::spawn(async move {
        let first = read_request(&mut server, 12).await;
        assert_eq!(&first[0..2], &[0x00, 0x01]);

        // Nothing else may be sent before the first response.
        let mut byte = [0; 1];
        assert!(
            timeout(Duration::from_millis(100), server.read(&mut byte))
                .await
                .is_err()
        );
        server
            .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x00, 0x01])
            .await
            .unwrap();

        let second = read_request(&mut server, 12).await;
        assert_eq!(&second[0..2], &[0x00, 0x02]);
        server
            .write_all(&[0x00, 0x02, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x00, 0x02])
            .await
            .unwrap();
        server
    });
    let cancel = CancellationToken::new();
    let (first, second) = tokio::join!(
        master.read_holding_registers(1, 0, 1, &cancel),
        master.read_holding_registers(2, 0, 1, &cancel),
    );
    assert_eq!(first.unwrap(), [1]);
    assert_eq!(second.unwrap(), [2]);
    let _server = server.await.unwrap();
}

#[tokio::test]
async fn cancel_while_waiting_for_the_session() {
    let (master, mut server) = stub();
    let server = tokio::spawn(async move {
        read_request(&mut server, 12).await;
        sleep(Duration::from_millis(100)).await;
        server
            .write_all(&[0x00, 0x01, 0x00, 0x00, 0x00, 0x04, 0x01, 0x01, 0x01, 0x01])
            .await
            .unwrap();
        let req = read_request(&mut server, 12).await;
        assert_eq!(&req[0..2], &[0x00, 0x03]);
        server
            .write_all(&[0x00, 0x03, 0x00, 0x00, 0x00, 0x04, 0x01, 0x01, 0x01, 0x00])
            .await
            .unwrap();
        server
    });
    let waiting = CancellationToken::new();
    let first_token = CancellationToken::new();
    let (first, second, ()) = tokio::join!(
        master.read_coils(1, 0, 1, &first_token),
        master.read_coils(2, 0, 1, &waiting),
        async {
            sleep(Duration::from_millis(20)).await;
            waiting.cancel();
        },
    );
    assert_eq!(first.unwrap(), [true]);
    assert_matches!(second, Err(Error::Cancelled));

    // The session is untouched.
    assert_eq!(
        master
            .read_coils(3, 0, 1, &CancellationToken::new())
            .await
            .unwrap(),
        [false]
    );
    let _server = server.await.unwrap();
}

#[tokio::test]
async fn cancel_during_io_desynchronizes_the_session() {
    let (master, mut server) = stub();
    let cancel = CancellationToken::new();
    let (res, ()) = tokio::join!(master.read_coils(1, 0, 1, &cancel), async {
        read_request(&mut server, 12).await;
        cancel.cancel();
    });
    let err = res.unwrap_err();
    assert_matches!(err, Error::Cancelled);
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_matches!(
        master.read_coils(2, 0, 1, &CancellationToken::new()).await,
        Err(Error::Desynchronized)
    );
    assert!(master.is_connected());
    master.disconnect().await;
    assert!(!master.is_connected());
}

#[tokio::test]
async fn already_cancelled_token() {
    let (master, mut server) = stub();
    let cancel = CancellationToken::new();
    cancel.cancel();
    assert_matches!(
        master.write_single_register(1, 0, 0, &cancel).await,
        Err(Error::Cancelled)
    );
    drop(master);
    let mut sent = Vec::new();
    server.read_to_end(&mut sent).await.unwrap();
    assert!(sent.is_empty());
}

#[tokio::test]
async fn not_connected() {
    let master = Master::new(Endpoint::default());
    assert!(!master.is_connected());
    let err = master
        .read_coils(1, 0, 1, &CancellationToken::new())
        .await
        .unwrap_err();
    assert_matches!(err, Error::NotConnected);
    assert_eq!(err.kind(), ErrorKind::Connection);
    // Safe without a connection.
    master.disconnect().await;
}

#[tokio::test]
async fn tcp_connect_exchange_and_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut req = [0; 12];
        stream.read_exact(&mut req).await.unwrap();
        assert_eq!(
            req,
            [0x00, 0x07, 0x00, 0x00, 0x00, 0x06, 0x05, 0x05, 0x00, 0xAC, 0xFF, 0x00]
        );
        stream.write_all(&req).await.unwrap();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        rest
    });

    let endpoint = Endpoint::new("127.0.0.1").with_port(port).with_unit_id(5);
    let master = Master::new(endpoint);
    master.connect().await.unwrap();
    assert!(master.is_connected());
    // Idempotent.
    master.connect().await.unwrap();

    let cancel = CancellationToken::new();
    assert!(master.write_single_coil(7, 0x00AC, true, &cancel).await.unwrap());

    master.disconnect().await;
    assert!(!master.is_connected());
    assert_matches!(
        master.read_coils(8, 0, 1, &cancel).await,
        Err(Error::NotConnected)
    );
    assert!(server.await.unwrap().is_empty());
}

#[tokio::test]
async fn tcp_connect_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let master = Master::new(Endpoint::new("127.0.0.1").with_port(port));
    let err = master.connect().await.unwrap_err();
    assert_matches!(err, Error::Connect { .. });
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(!master.is_connected());
}
