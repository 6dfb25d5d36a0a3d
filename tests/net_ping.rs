//! End-to-end: PCI discovery, e1000 rings and the stack against a simulated
//! device with a responding peer on the wire.

use delix::net::{probe_e1000, NetSubsystem};
use delix::{NetConfig, NetError};
use delix_driver_e1000::sim::SimNic;
use delix_driver_e1000::{DmaArena, E1000Driver, DEVICE_82540EM, VENDOR_INTEL};
use delix_driver_pci::sim::SimConfigSpace;
use delix_driver_pci::PciDriver;
use delix_driver_traits::{Driver, DriverError, PciAddress};
use delix_network::arp::{emit_arp, reply_repr, ARP_FRAME_LEN};
use delix_network::icmp::{echo_frame_len, emit_echo, EchoKind, EchoRoute};
use delix_network::{EthernetAddress, Ipv4Address, Spin};

const NIC_MAC: [u8; 6] = [0x52, 0x54, 0x00, 0x12, 0x34, 0x56];
const GATEWAY_MAC: [u8; 6] = [0x52, 0x55, 0x0a, 0x00, 0x02, 0x02];
const GATEWAY_IP: [u8; 4] = [10, 0, 2, 2];

type Net = NetSubsystem<E1000Driver<SimNic>, Spin>;

fn arena() -> &'static mut DmaArena {
    Box::leak(Box::new(DmaArena::new()))
}

fn config() -> NetConfig {
    NetConfig {
        arp_wait_polls: 50,
        ping_wait_polls: 50,
        ..NetConfig::default()
    }
}

/// Gateway that answers ARP for its address and echo requests sent to it
fn gateway(frame: &[u8]) -> Vec<Vec<u8>> {
    let mut replies = Vec::new();
    if frame.len() < 42 {
        return replies;
    }
    let sender_mac = EthernetAddress::from_bytes(&frame[6..12]);
    match (frame[12], frame[13]) {
        (0x08, 0x06) if frame[20..22] == [0, 1] && frame[38..42] == GATEWAY_IP => {
            let mut buf = vec![0u8; ARP_FRAME_LEN];
            let repr = reply_repr(
                EthernetAddress(GATEWAY_MAC),
                Ipv4Address(GATEWAY_IP),
                EthernetAddress::from_bytes(&frame[22..28]),
                Ipv4Address::from_bytes(&frame[28..32]),
            );
            emit_arp(&mut buf, EthernetAddress(GATEWAY_MAC), sender_mac, &repr);
            replies.push(buf);
        }
        (0x08, 0x00) if frame[30..34] == GATEWAY_IP && frame[34] == 8 => {
            let route = EchoRoute {
                src_mac: EthernetAddress(GATEWAY_MAC),
                dst_mac: sender_mac,
                src_ip: Ipv4Address(GATEWAY_IP),
                dst_ip: Ipv4Address::from_bytes(&frame[26..30]),
            };
            let ident = u16::from_be_bytes([frame[38], frame[39]]);
            let seq = u16::from_be_bytes([frame[40], frame[41]]);
            let data = &frame[42..];
            let mut buf = vec![0u8; echo_frame_len(data.len())];
            emit_echo(&mut buf, &route, EchoKind::Reply, ident, seq, data);
            replies.push(buf);
        }
        _ => {}
    }
    replies
}

/// Subsystem brought up over a simulated bus holding one e1000
fn bring_up(device: &SimNic) -> Net {
    let config_space = SimConfigSpace::new();
    config_space.add_device(PciAddress::new(0, 3, 0), VENDOR_INTEL, DEVICE_82540EM, 0xFEBC_0000);
    let mut pci = PciDriver::new(config_space);
    pci.init().unwrap();

    let handle = device.clone();
    let nic = probe_e1000(&pci, arena(), move |_| handle);

    let mut net = Net::new();
    net.attach(nic, config(), Spin).unwrap();
    net
}

fn run_ping_command(net: &mut Net, args: &str) -> String {
    let mut out = String::new();
    let _ = net.ping_command(args, |s| out.push_str(s));
    out
}

#[test]
fn test_ping_gateway() {
    let device = SimNic::new(NIC_MAC);
    device.set_peer(gateway);
    let mut net = bring_up(&device);
    assert!(net.is_up());

    let reply = net.ping("10.0.2.2").unwrap();
    assert_eq!(reply.from, Ipv4Address(GATEWAY_IP));
    assert_eq!(reply.seq, 0);
    assert_eq!(reply.ttl, 64);

    // one ARP request, then one echo request
    let sent = device.take_transmitted();
    assert_eq!(sent.len(), 2);
    assert_eq!(&sent[0][12..14], &[0x08, 0x06]);
    assert_eq!(&sent[1][12..14], &[0x08, 0x00]);
    assert_eq!(&sent[1][6..12], &NIC_MAC);

    let stack = net.stack().unwrap();
    assert_eq!(stack.sequence(), 1);
    assert_eq!(stack.arp_cache().peek(Ipv4Address(GATEWAY_IP)), Some(EthernetAddress(GATEWAY_MAC)));
}

#[test]
fn test_ping_command_output() {
    let device = SimNic::new(NIC_MAC);
    device.set_peer(gateway);
    let mut net = bring_up(&device);

    let out = run_ping_command(&mut net, " 10.0.2.2 ");
    assert_eq!(
        out,
        "Pinging 10.0.2.2...\nReply from 10.0.2.2: seq=0 ttl=64\nPing successful\n"
    );

    assert_eq!(run_ping_command(&mut net, ""), "Usage: ping <host>\n");
    assert_eq!(
        run_ping_command(&mut net, "10.0.2"),
        "Pinging 10.0.2...\nPing failed: invalid IP address\n"
    );
}

#[test]
fn test_unreachable_host() {
    let device = SimNic::new(NIC_MAC);
    device.set_peer(gateway);
    let mut net = bring_up(&device);

    assert_eq!(net.ping("10.0.2.77"), Err(NetError::ResolutionFailed));
    let sent = device.take_transmitted();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|f| f[12..14] == [0x08, 0x06] && f[0..6] == [0xff; 6]));
}

#[test]
fn test_many_pings_cycle_both_rings() {
    let device = SimNic::new(NIC_MAC);
    device.set_peer(gateway);
    let mut net = bring_up(&device);

    for seq in 0..70u16 {
        let reply = net.ping("10.0.2.2").unwrap();
        assert_eq!(reply.seq, seq);
    }
    let stats = *net.stack().unwrap().stats();
    assert_eq!(stats.echo_replies_matched, 70);
    assert_eq!(stats.arp_requests_sent, 1);
    assert_eq!(stats.malformed, 0);
}

#[test]
fn test_answers_peer_ping() {
    let device = SimNic::new(NIC_MAC);
    let mut net = bring_up(&device);

    let route = EchoRoute {
        src_mac: EthernetAddress(GATEWAY_MAC),
        dst_mac: EthernetAddress(NIC_MAC),
        src_ip: Ipv4Address(GATEWAY_IP),
        dst_ip: Ipv4Address::new(10, 0, 2, 15),
    };
    let mut request = vec![0u8; echo_frame_len(4)];
    emit_echo(&mut request, &route, EchoKind::Request, 7, 9, b"ping");
    assert!(device.inject(&request));

    assert_eq!(net.poll(), 1);
    let sent = device.take_transmitted();
    assert_eq!(sent.len(), 1);
    assert_eq!(&sent[0][0..6], &GATEWAY_MAC);
    assert_eq!(sent[0][34], 0);
    assert_eq!(&sent[0][38..42], &[0, 7, 0, 9]);
}

#[test]
fn test_missing_nic_leaves_subsystem_unavailable() {
    let pci = PciDriver::new(SimConfigSpace::new());
    let nic = probe_e1000(&pci, arena(), |_| SimNic::new(NIC_MAC));
    assert_eq!(nic.as_ref().err(), Some(&DriverError::DeviceNotFound));

    let mut net = Net::new();
    assert_eq!(net.attach(nic, config(), Spin), Err(NetError::DeviceNotFound));
    assert!(!net.is_up());
    assert_eq!(net.poll(), 0);
    assert_eq!(net.ping("10.0.2.2"), Err(NetError::DeviceNotFound));
    assert_eq!(
        run_ping_command(&mut net, "10.0.2.2"),
        "Pinging 10.0.2.2...\nPing failed: no network device\n"
    );
    net.log_info();
}

#[test]
fn test_failed_bring_up_keeps_live_interface() {
    let device = SimNic::new(NIC_MAC);
    device.set_peer(gateway);
    let mut net = bring_up(&device);
    assert_eq!(net.ping("10.0.2.2").unwrap().seq, 0);

    // a second bring-up finds the arena already bound
    assert_eq!(
        net.attach(Err(DriverError::InvalidState), config(), Spin),
        Err(NetError::Driver(DriverError::InvalidState))
    );
    assert!(net.is_up());

    device.take_transmitted();
    assert_eq!(net.ping("10.0.2.2").unwrap().seq, 1);
    // gateway still cached: only the echo request goes out
    assert_eq!(device.take_transmitted().len(), 1);
}

#[test]
fn test_reinit_keeps_cache_and_sequence() {
    let device = SimNic::new(NIC_MAC);
    device.set_peer(gateway);
    let mut net = bring_up(&device);
    net.ping("10.0.2.2").unwrap();
    device.take_transmitted();

    net.reinit().unwrap();
    assert!(net.is_up());
    assert!(device.take_transmitted().is_empty());

    let reply = net.ping("10.0.2.2").unwrap();
    assert_eq!(reply.seq, 1);
    let sent = device.take_transmitted();
    assert_eq!(sent.len(), 1);
    assert_eq!(&sent[0][12..14], &[0x08, 0x00]);
}

#[test]
fn test_reinit_without_interface() {
    let mut net = Net::new();
    assert_eq!(net.reinit(), Err(NetError::DeviceNotFound));
    assert!(!net.is_up());
}
