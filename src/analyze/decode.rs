use pnet::packet::{Packet as PacketExt, PacketSize};
use pnet::packet::ethernet::{EthernetPacket, EtherTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::vlan::VlanPacket;
use super::flow::{Addr, Key, Record, Transport};

/// Decode one captured frame into a record. `None` means the frame
/// could not be parsed at the link layer and should be counted as
/// skipped.
pub fn decode(cap: pcap::Packet<'_>) -> Option<Record> {
    let ts  = cap.header.ts;
    let eth = EthernetPacket::new(cap.data)?;

    Some(Record {
        timestamp: ts.tv_sec as f64 + ts.tv_usec as f64 / 1_000_000.0,
        length:    cap.header.len as u64,
        transport: transport(&eth),
    })
}

fn transport(eth: &EthernetPacket<'_>) -> Transport {
    let mut ethertype = eth.get_ethertype();
    let mut payload   = eth.payload();

    while ethertype == EtherTypes::Vlan {
        match VlanPacket::new(payload) {
            Some(pkt) => {
                ethertype = pkt.get_ethertype();
                payload   = &payload[pkt.packet_size()..];
            },
            None => return Transport::Other,
        }
    }

    if ethertype != EtherTypes::Ipv4 {
        return Transport::Other;
    }

    let ip = match Ipv4Packet::new(payload) {
        Some(ip) => ip,
        None     => return Transport::Other,
    };

    let src = ip.get_source();
    let dst = ip.get_destination();

    match ip.get_next_level_protocol() {
        IpNextHeaderProtocols::Tcp => match TcpPacket::new(ip.payload()) {
            Some(tcp) => Transport::Tcp {
                key: Key {
                    src: Addr { addr: src.into(), port: tcp.get_source()      },
                    dst: Addr { addr: dst.into(), port: tcp.get_destination() },
                },
                flags: tcp.get_flags() as u16,
            },
            None => Transport::Other,
        },
        IpNextHeaderProtocols::Udp => match UdpPacket::new(ip.payload()) {
            Some(udp) => Transport::Udp {
                key: Key {
                    src: Addr { addr: src.into(), port: udp.get_source()      },
                    dst: Addr { addr: dst.into(), port: udp.get_destination() },
                },
            },
            None => Transport::Other,
        },
        _ => Transport::Other,
    }
}
