use std::net::Ipv4Addr;

use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::Packet;
use pnet::util::MacAddr;

pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_LLDP: u16 = 0x88cc;
pub const IP_PROTO_TCP: u8 = 6;

/// Read-only decoded view of an incoming frame.
#[derive(Debug, Clone)]
pub struct PacketView {
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub eth_type: u16,
    pub ipv4: Option<Ipv4View>,
}

#[derive(Debug, Clone, Copy)]
pub struct Ipv4View {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
}

impl PacketView {
    pub fn is_lldp(&self) -> bool {
        self.eth_type == ETHERTYPE_LLDP
    }

    /// Layer-3/4 fields when the frame carries an IPv4 TCP segment.
    pub fn tcp(&self) -> Option<(Ipv4View, u16)> {
        let ip = self.ipv4?;
        if ip.protocol != IP_PROTO_TCP {
            return None;
        }
        Some((ip, ip.dst_port?))
    }
}

/// Decode a raw frame into a packet view. Returns `None` for frames too
/// short to carry an Ethernet header; unknown payloads simply leave the
/// layer-3 view empty.
pub fn decode(frame: &[u8]) -> Option<PacketView> {
    let eth = EthernetPacket::new(frame)?;
    let eth_type = eth.get_ethertype().0;

    let mut ipv4 = None;
    if eth.get_ethertype() == EtherTypes::Ipv4 {
        if let Some(ip) = Ipv4Packet::new(eth.payload()) {
            let mut src_port = None;
            let mut dst_port = None;

            match ip.get_next_level_protocol() {
                IpNextHeaderProtocols::Tcp => {
                    if let Some(tcp) = TcpPacket::new(ip.payload()) {
                        src_port = Some(tcp.get_source());
                        dst_port = Some(tcp.get_destination());
                    }
                }
                IpNextHeaderProtocols::Udp => {
                    if let Some(udp) = UdpPacket::new(ip.payload()) {
                        src_port = Some(udp.get_source());
                        dst_port = Some(udp.get_destination());
                    }
                }
                _ => {}
            }

            ipv4 = Some(Ipv4View {
                src: ip.get_source(),
                dst: ip.get_destination(),
                protocol: ip.get_next_level_protocol().0,
                src_port,
                dst_port,
            });
        }
    }

    Some(PacketView {
        src_mac: eth.get_source(),
        dst_mac: eth.get_destination(),
        eth_type,
        ipv4,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_too_short() {
        assert!(decode(&[0u8; 4]).is_none());
    }

    #[test]
    fn test_decode_plain_ethernet() {
        let mut frame = vec![0u8; 14];
        frame[..6].copy_from_slice(&[0x02, 0, 0, 0, 0, 0xbb]); // dst
        frame[6..12].copy_from_slice(&[0x02, 0, 0, 0, 0, 0xaa]); // src
        frame[12..14].copy_from_slice(&0x0806u16.to_be_bytes()); // ARP

        let view = decode(&frame).unwrap();
        assert_eq!(view.src_mac, MacAddr::new(0x02, 0, 0, 0, 0, 0xaa));
        assert_eq!(view.dst_mac, MacAddr::new(0x02, 0, 0, 0, 0, 0xbb));
        assert_eq!(view.eth_type, 0x0806);
        assert!(view.ipv4.is_none());
        assert!(!view.is_lldp());
    }

    #[test]
    fn test_decode_lldp() {
        let mut frame = vec![0u8; 14];
        frame[12..14].copy_from_slice(&ETHERTYPE_LLDP.to_be_bytes());
        assert!(decode(&frame).unwrap().is_lldp());
    }
}
