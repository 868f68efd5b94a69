use std::net::{IpAddr, Ipv4Addr};
use anyhow::Result;
use pnet::packet::ethernet::{EtherTypes, MutableEthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::MutableIpv4Packet;
use pnet::packet::tcp::MutableTcpPacket;
use pnet::packet::udp::MutableUdpPacket;
use pnet::util::MacAddr;
use crate::error::Error;
use super::flow::{Addr, Key, Record, Transport, ACK, SYN, SYNACK};
use super::reconstruct::Reconstructor;
use super::report::{analyze_batch, analyze_one, csv};

const A: [u8; 4] = [10, 0, 0, 1];
const B: [u8; 4] = [10, 0, 0, 2];

#[test]
fn handshake_detected_once() {
    let mut recon = Reconstructor::new();

    recon.process(&tcp(A, 1234, B, 80, SYN,    0.0));
    recon.process(&tcp(B, 80, A, 1234, SYNACK, 0.1));
    recon.process(&tcp(A, 1234, B, 80, ACK,    0.2));

    let summary = recon.summary();
    assert_eq!(summary.completed_tcp_handshakes, 1);
    assert_eq!(summary.tcp_handshake_packets, 3);
    assert_eq!(recon.tracked(), 0);
}

#[test]
fn handshake_needs_preconditions() {
    let mut recon = Reconstructor::new();

    // SYN+ACK with no prior SYN, ACK with no prior SYN+ACK
    recon.process(&tcp(B, 80, A, 1234, SYNACK, 0.0));
    recon.process(&tcp(A, 1234, B, 80, ACK,    0.1));

    let summary = recon.summary();
    assert_eq!(summary.completed_tcp_handshakes, 0);
    assert_eq!(summary.tcp_handshake_packets, 0);
    assert_eq!(summary.tcp_count, 2);
}

#[test]
fn handshake_state_never_regresses() {
    let mut recon = Reconstructor::new();

    recon.process(&tcp(A, 1234, B, 80, SYN,    0.0));
    recon.process(&tcp(B, 80, A, 1234, SYNACK, 0.1));
    recon.process(&tcp(A, 1234, B, 80, SYN,    0.2));
    recon.process(&tcp(A, 1234, B, 80, ACK,    0.3));

    assert_eq!(recon.summary().completed_tcp_handshakes, 1);
}

#[test]
fn bidirectional_pair_counted_once() {
    let mut recon = Reconstructor::new();

    recon.process(&tcp(A, 1, B, 80, ACK, 0.0));
    recon.process(&tcp(B, 80, A, 1, ACK, 0.1));

    let summary = recon.summary();
    assert_eq!(summary.total_flows, 2);
    assert_eq!(summary.total_bidirectional_flows, 1);
}

#[test]
fn udp_flows_registered() {
    let mut recon = Reconstructor::new();

    recon.process(&udp(A, 5353, B, 53, 0.0));
    recon.process(&udp(B, 53, A, 5353, 0.1));
    recon.process(&udp(A, 5353, B, 53, 0.2));

    let summary = recon.summary();
    assert_eq!(summary.udp_count, 3);
    assert_eq!(summary.total_flows, 2);
    assert_eq!(summary.total_bidirectional_flows, 1);
    assert_eq!(summary.tcp_handshake_packets, 0);
}

#[test]
fn duplicate_timestamps_collapse() {
    let mut recon = Reconstructor::new();

    recon.process(&tcp(A, 1, B, 80, ACK, 1.5));
    recon.process(&tcp(A, 1, B, 80, ACK, 1.5));
    recon.process(&tcp(A, 1, B, 80, ACK, 2.5));

    let key = Key { src: addr(A, 1), dst: addr(B, 80) };
    assert_eq!(recon.timestamps(&key), 2);
    assert_eq!(recon.summary().total_packets, 3);
}

#[test]
fn ratios_bounded() {
    let mut recon = Reconstructor::new();

    recon.process(&tcp(A, 1, B, 80, ACK, 0.0));
    recon.process(&tcp(A, 1, B, 80, ACK, 0.1));
    recon.process(&udp(A, 2, B, 53, 0.2));
    recon.process(&Record { timestamp: 0.3, length: 60, transport: Transport::Other });

    let summary = recon.summary();
    assert_eq!(summary.tcp_ratio, 0.5);
    assert_eq!(summary.udp_ratio, 0.25);
    assert!(summary.tcp_ratio + summary.udp_ratio < 1.0);
}

#[test]
fn ratios_sum_to_one_without_other() {
    let mut recon = Reconstructor::new();

    recon.process(&tcp(A, 1, B, 80, ACK, 0.0));
    recon.process(&udp(A, 2, B, 53, 0.1));

    let summary = recon.summary();
    assert_eq!(summary.tcp_ratio + summary.udp_ratio, 1.0);
}

#[test]
fn empty_summary_divides_nothing() {
    let summary = Reconstructor::new().summary();
    assert_eq!(summary.total_packets, 0);
    assert_eq!(summary.avg_packet_length, 0.0);
    assert_eq!(summary.tcp_ratio, 0.0);
    assert_eq!(summary.udp_ratio, 0.0);
}

#[test]
fn analyze_pcap_bytes() -> Result<()> {
    let bytes = wrap(&[
        tcp_frame(A, 1234, B, 80, SYN),
        tcp_frame(B, 80, A, 1234, SYNACK),
        tcp_frame(A, 1234, B, 80, ACK),
        udp_frame(A, 5353, B, 53),
    ]);

    let summary = analyze_one(&bytes)?;
    assert_eq!(summary.total_packets, 4);
    assert_eq!(summary.tcp_count, 3);
    assert_eq!(summary.udp_count, 1);
    assert_eq!(summary.completed_tcp_handshakes, 1);
    assert_eq!(summary.tcp_handshake_packets, 3);
    assert_eq!(summary.total_bidirectional_flows, 1);
    assert_eq!(summary.skipped_records, 0);
    assert!(summary.avg_packet_length > 0.0);

    Ok(())
}

#[test]
fn analyze_rejects_garbage() {
    match analyze_one(b"definitely not a pcap") {
        Err(Error::Decode(_)) => (),
        other                 => panic!("expected decode error, got {:?}", other),
    }
}

#[test]
fn batch_survives_malformed_artifact() {
    let good = wrap(&[tcp_frame(A, 1, B, 80, ACK)]);

    let rows = analyze_batch(vec![
        ("one.pcap".to_string(),   good.clone()),
        ("two.pcap".to_string(),   b"garbage".to_vec()),
        ("three.pcap".to_string(), good),
    ]);

    assert_eq!(rows.len(), 3);
    assert!(rows[0].summary.is_some() && rows[0].error.is_none());
    assert!(rows[1].summary.is_none() && rows[1].error.is_some());
    assert!(rows[2].summary.is_some() && rows[2].error.is_none());
}

#[test]
fn csv_has_fixed_columns() -> Result<()> {
    let rows = analyze_batch(vec![
        ("ok.pcap".to_string(),  wrap(&[udp_frame(A, 1, B, 53)])),
        ("bad.pcap".to_string(), b"garbage".to_vec()),
    ]);

    let mut out = Vec::new();
    csv(&rows, &mut out)?;

    let text: String = String::from_utf8(out)?;
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("file_name,total_packets,"));
    assert!(lines[1].starts_with("ok.pcap,1,"));
    assert!(lines[2].starts_with("bad.pcap,"));

    for line in &lines {
        assert_eq!(line.matches(',').count(), 12);
    }

    Ok(())
}

fn addr(ip: [u8; 4], port: u16) -> Addr {
    Addr { addr: IpAddr::from(ip), port: port }
}

fn tcp(src: [u8; 4], sport: u16, dst: [u8; 4], dport: u16, flags: u16, ts: f64) -> Record {
    Record {
        timestamp: ts,
        length:    60,
        transport: Transport::Tcp {
            key:   Key { src: addr(src, sport), dst: addr(dst, dport) },
            flags: flags,
        },
    }
}

fn udp(src: [u8; 4], sport: u16, dst: [u8; 4], dport: u16, ts: f64) -> Record {
    Record {
        timestamp: ts,
        length:    60,
        transport: Transport::Udp {
            key: Key { src: addr(src, sport), dst: addr(dst, dport) },
        },
    }
}

fn tcp_frame(src: [u8; 4], sport: u16, dst: [u8; 4], dport: u16, flags: u16) -> Vec<u8> {
    let mut buf = vec![0u8; 14 + 20 + 20];
    ethernet(&mut buf);
    ipv4(&mut buf[14..], src, dst, IpNextHeaderProtocols::Tcp, 40);

    let mut tcp = MutableTcpPacket::new(&mut buf[34..]).expect("tcp");
    tcp.set_source(sport);
    tcp.set_destination(dport);
    tcp.set_data_offset(5);
    tcp.set_flags(flags as u8);

    buf
}

fn udp_frame(src: [u8; 4], sport: u16, dst: [u8; 4], dport: u16) -> Vec<u8> {
    let mut buf = vec![0u8; 14 + 20 + 8];
    ethernet(&mut buf);
    ipv4(&mut buf[14..], src, dst, IpNextHeaderProtocols::Udp, 28);

    let mut udp = MutableUdpPacket::new(&mut buf[34..]).expect("udp");
    udp.set_source(sport);
    udp.set_destination(dport);
    udp.set_length(8);

    buf
}

fn ethernet(buf: &mut [u8]) {
    let mut eth = MutableEthernetPacket::new(buf).expect("ethernet");
    eth.set_source(MacAddr::new(2, 0, 0, 0, 0, 1));
    eth.set_destination(MacAddr::new(2, 0, 0, 0, 0, 2));
    eth.set_ethertype(EtherTypes::Ipv4);
}

fn ipv4(buf: &mut [u8], src: [u8; 4], dst: [u8; 4], proto: pnet::packet::ip::IpNextHeaderProtocol, len: u16) {
    let mut ip = MutableIpv4Packet::new(buf).expect("ipv4");
    ip.set_version(4);
    ip.set_header_length(5);
    ip.set_total_length(len);
    ip.set_ttl(64);
    ip.set_next_level_protocol(proto);
    ip.set_source(Ipv4Addr::from(src));
    ip.set_destination(Ipv4Addr::from(dst));
}

fn wrap(frames: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();

    // classic pcap global header, LINKTYPE_ETHERNET
    out.extend_from_slice(&0xa1b2c3d4u32.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&65535u32.to_le_bytes());
    out.extend_from_slice(&1u32.to_le_bytes());

    for (i, frame) in frames.iter().enumerate() {
        out.extend_from_slice(&(i as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        out.extend_from_slice(&(frame.len() as u32).to_le_bytes());
        out.extend_from_slice(frame);
    }

    out
}
