// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::missing_panics_doc)]

//! The mio listener loop over real sockets.

mod common;

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use common::{hello, server};
use opcua_stack::codec::{decode_from_slice, DecodingOptions};
use opcua_stack::transport::header::{AcknowledgeMessage, ErrorMessage};
use opcua_stack::{StatusCode, TcpListenerLoop};

fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream
}

/// Read one framed message: type tag and body.
fn read_message(stream: &mut TcpStream) -> ([u8; 3], Vec<u8>) {
    let mut header = [0u8; 8];
    stream.read_exact(&mut header).unwrap();
    let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let mut body = vec![0u8; size - 8];
    stream.read_exact(&mut body).unwrap();
    ([header[0], header[1], header[2]], body)
}

#[test]
fn test_hello_acknowledged_over_tcp() {
    let listener = TcpListenerLoop::bind_addr(server(), "127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, handle) = listener.spawn().unwrap();
    assert!(stop.is_running());

    let mut stream = connect(addr);
    // Split the HEL across two writes.
    let frame = hello(8192, 8192);
    stream.write_all(&frame[..5]).unwrap();
    stream.flush().unwrap();
    std::thread::sleep(Duration::from_millis(20));
    stream.write_all(&frame[5..]).unwrap();

    let (tag, body) = read_message(&mut stream);
    assert_eq!(&tag, b"ACK");
    let ack: AcknowledgeMessage = decode_from_slice(&body, &DecodingOptions::default()).unwrap();
    assert_eq!(ack.protocol_version, 0);
    assert_eq!(ack.receive_buffer_size, 8192);
    assert_eq!(ack.send_buffer_size, 8192);

    stop.stop();
    let server = handle.join().unwrap().unwrap();
    assert!(!stop.is_running());
    assert_eq!(server.connection_count(), 0);
}

#[test]
fn test_garbage_gets_error_and_close() {
    let listener = TcpListenerLoop::bind_addr(server(), "127.0.0.1:0".parse().unwrap()).unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, handle) = listener.spawn().unwrap();

    let mut stream = connect(addr);
    stream.write_all(b"XYZF\x10\x00\x00\x00garbage!").unwrap();

    let (tag, body) = read_message(&mut stream);
    assert_eq!(&tag, b"ERR");
    let error: ErrorMessage = decode_from_slice(&body, &DecodingOptions::default()).unwrap();
    assert_eq!(error.error, StatusCode::BAD_TCP_MESSAGE_TYPE_INVALID);

    // The server closes its side after the ERR.
    let mut rest = Vec::new();
    assert_eq!(stream.read_to_end(&mut rest).unwrap(), 0);

    stop.stop();
    handle.join().unwrap().unwrap();
}
