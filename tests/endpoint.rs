#[allow(dead_code)]
mod common;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use common::{generate_packet_data, Capture, Inbox, Pair};
use reliable::{Config, Endpoint};

const DELTA_TIME: f64 = 0.01;

#[test]
fn acks() {
    const ITERATIONS: u16 = 256;

    let mut time = 100.0;
    let mut pair = Pair::new(Config::default(), time);

    for _ in 0..ITERATIONS {
        pair.client_send(&[0; 8], false);
        pair.server_send(&[0; 8], false);

        time += DELTA_TIME;
        pair.update(time);
    }

    let mut client_acked = vec![false; usize::from(ITERATIONS)];
    for &sequence in pair.client.acks() {
        client_acked[usize::from(sequence)] = true;
    }

    let mut server_acked = vec![false; usize::from(ITERATIONS)];
    for &sequence in pair.server.acks() {
        server_acked[usize::from(sequence)] = true;
    }

    for i in 0..usize::from(ITERATIONS) / 2 {
        assert!(client_acked[i], "client packet {i} not acked");
        assert!(server_acked[i], "server packet {i} not acked");
    }
}

#[test]
fn acks_with_packet_loss() {
    const ITERATIONS: usize = 256;

    let mut time = 100.0;
    let mut pair = Pair::new(Config::default(), time);

    for i in 0..ITERATIONS {
        let drop = i % 2 == 1;

        pair.client_send(&[0; 8], drop);
        pair.server_send(&[0; 8], drop);

        time += DELTA_TIME;
        pair.update(time);
    }

    let mut client_acked = vec![false; ITERATIONS];
    for &sequence in pair.client.acks() {
        client_acked[usize::from(sequence)] = true;
    }

    let mut server_acked = vec![false; ITERATIONS];
    for &sequence in pair.server.acks() {
        server_acked[usize::from(sequence)] = true;
    }

    for i in 0..ITERATIONS / 2 {
        assert_eq!(client_acked[i], i % 2 == 0, "client packet {i}");
        assert_eq!(server_acked[i], i % 2 == 0, "server packet {i}");
    }
}

#[test]
fn packets_round_trip() {
    const ITERATIONS: usize = 16;

    let config = Config {
        fragment_above: 500,
        ..Default::default()
    };

    let mut time = 100.0;
    let mut pair = Pair::new(config, time);

    let mut client_sent = Vec::new();
    let mut server_sent = Vec::new();

    for _ in 0..ITERATIONS {
        let packet_data = generate_packet_data(pair.client.next_packet_sequence());
        client_sent.push(md5::compute(&packet_data));
        pair.client_send(&packet_data, false);

        let packet_data = generate_packet_data(pair.server.next_packet_sequence());
        server_sent.push(md5::compute(&packet_data));
        pair.server_send(&packet_data, false);

        time += DELTA_TIME;
        pair.update(time);
    }

    let server_received: Vec<_> = pair
        .server_inbox
        .processed
        .iter()
        .map(|(_, data)| md5::compute(data))
        .collect();

    let client_received: Vec<_> = pair
        .client_inbox
        .processed
        .iter()
        .map(|(_, data)| md5::compute(data))
        .collect();

    assert_eq!(server_received, client_sent);
    assert_eq!(client_received, server_sent);

    for (i, (sequence, _)) in pair.server_inbox.processed.iter().enumerate() {
        assert_eq!(usize::from(*sequence), i);
    }

    // Every payload validates against the generator keyed by its embedded sequence
    let processed = pair
        .server_inbox
        .processed
        .iter()
        .chain(pair.client_inbox.processed.iter());

    for (_, data) in processed {
        let tag = u16::from_le_bytes([data[0], data[1]]);
        assert_eq!(&data[..], &generate_packet_data(tag)[..]);
    }

    // Everything above 500 bytes went out as fragments
    let fragmented = (0..ITERATIONS as u16)
        .filter(|&sequence| generate_packet_data(sequence).len() > 500)
        .count();
    assert!(fragmented > 0);
    assert!(pair.client.counters().fragments_sent > fragmented as u64);
    assert_eq!(
        pair.server.counters().fragments_received,
        pair.client.counters().fragments_sent
    );
}

#[test]
fn fragments_in_any_order() {
    let mut sender = Endpoint::new(Config::default(), 0.0).unwrap();
    let mut receiver = Endpoint::new(Config::default(), 0.0).unwrap();

    let payload: Vec<u8> = (0..5000).map(|i| (i * 7 % 256) as u8).collect();

    let mut capture = Capture::default();
    sender.send_packet(&payload, &mut capture);
    assert_eq!(capture.packets.len(), 5);

    let mut rng = StdRng::seed_from_u64(0x5EED);

    let mut datagrams = capture.packets.clone();
    datagrams.shuffle(&mut rng);

    // Duplicates arriving before completion are dropped silently
    let duplicates = [datagrams[0].clone(), datagrams[1].clone()];
    for (offset, duplicate) in duplicates.into_iter().enumerate() {
        datagrams.insert(3 + offset, duplicate);
    }

    let mut inbox = Inbox::default();
    for datagram in &datagrams {
        receiver.receive_packet(datagram, &mut inbox);
    }

    assert_eq!(inbox.processed.len(), 1);
    assert_eq!(inbox.processed[0].0, 0);
    assert_eq!(&inbox.processed[0].1[..], &payload[..]);

    let counters = receiver.counters();
    assert_eq!(counters.fragments_received, 5);
    assert_eq!(counters.fragments_invalid, 0);
    assert_eq!(counters.packets_received, 1);
}

#[test]
fn reassembled_packet_too_large() {
    let sender_config = Config {
        max_packet_size: 4096,
        fragment_above: 256,
        fragment_size: 256,
        ..Default::default()
    };

    let receiver_config = Config {
        max_packet_size: 1024,
        ..sender_config.clone()
    };

    let mut sender = Endpoint::new(sender_config, 0.0).unwrap();
    let mut receiver = Endpoint::new(receiver_config, 0.0).unwrap();

    let mut capture = Capture::default();
    sender.send_packet(&[0xAB; 2048], &mut capture);
    assert_eq!(capture.packets.len(), 8);

    let mut inbox = Inbox::default();
    for datagram in &capture.packets {
        receiver.receive_packet(datagram, &mut inbox);
    }

    assert!(inbox.processed.is_empty());
    assert_eq!(receiver.counters().fragments_received, 8);
    assert_eq!(receiver.counters().packets_too_large_to_receive, 1);
    assert_eq!(receiver.counters().packets_received, 0);
}

#[test]
fn rejected_packets_are_not_acked() {
    let mut pair = Pair::new(Config::default(), 0.0);

    pair.server_inbox.reject = true;
    pair.client_send(&[1], false);
    pair.server_send(&[2], false);

    assert_eq!(pair.server_inbox.processed.len(), 1);
    assert!(pair.client.acks().is_empty());

    pair.server_inbox.reject = false;
    pair.client_send(&[3], false);
    pair.server_send(&[4], false);

    assert_eq!(pair.client.acks(), &[1]);
    assert_eq!(pair.client.counters().packets_acked, 1);
}

#[test]
fn rtt_converges() {
    let mut time = 1.0;
    let mut pair = Pair::new(Config::default(), time);

    for _ in 0..32 {
        pair.client_send(&[0; 16], false);

        time += 0.05;
        pair.update(time);

        pair.server_send(&[0; 16], false);

        time += 0.05;
        pair.update(time);

        pair.client.clear_acks();
        pair.server.clear_acks();
    }

    assert!((pair.client.rtt() - 50.0).abs() < 1e-3, "{}", pair.client.rtt());
    assert!((pair.server.rtt() - 50.0).abs() < 1e-3, "{}", pair.server.rtt());
}

#[test]
fn packet_loss_converges() {
    let mut time = 100.0;
    let mut pair = Pair::new(Config::default(), time);

    for i in 0..1024 {
        let drop = i % 2 == 1;

        pair.client_send(&[0; 16], drop);
        pair.server_send(&[0; 16], drop);

        time += DELTA_TIME;
        pair.update(time);

        pair.client.clear_acks();
        pair.server.clear_acks();
    }

    let client_loss = pair.client.packet_loss();
    let server_loss = pair.server.packet_loss();

    assert!((client_loss - 50.0).abs() < 5.0, "{client_loss}");
    assert!((server_loss - 50.0).abs() < 5.0, "{server_loss}");
}

#[test]
fn bandwidth_converges() {
    let mut time = 100.0;
    let mut pair = Pair::new(Config::default(), time);

    for _ in 0..512 {
        pair.client_send(&[0; 100], false);
        pair.server_send(&[0; 100], false);

        time += DELTA_TIME;
        pair.update(time);

        pair.client.clear_acks();
        pair.server.clear_acks();
    }

    let (sent_kbps, received_kbps, acked_kbps) = pair.client.bandwidth();

    // 128 packets of 28 + 100 bytes over 127 intervals of 10ms
    let expected_kbps = 128.0 * 128.0 * 8.0 / 1000.0 / 1.27;

    assert!((sent_kbps - expected_kbps).abs() < 5.0, "{sent_kbps}");
    assert!((acked_kbps - expected_kbps).abs() < 5.0, "{acked_kbps}");
    assert!(received_kbps > expected_kbps, "{received_kbps}");
    assert!(pair.client.packet_loss() < 1.0);
}

#[test]
fn sequence_wraps() {
    const ITERATIONS: u64 = 70_000;

    let mut pair = Pair::new(Config::default(), 0.0);

    for _ in 0..ITERATIONS {
        pair.client_send(&[0; 4], false);
        pair.server_send(&[0; 4], false);

        pair.client.clear_acks();
        pair.server.clear_acks();
    }

    assert_eq!(
        pair.client.next_packet_sequence(),
        (ITERATIONS % 65536) as u16
    );

    let client = pair.client.counters();
    let server = pair.server.counters();

    assert_eq!(client.packets_acked, ITERATIONS);
    assert_eq!(server.packets_acked, ITERATIONS - 1);
    assert_eq!(server.packets_stale, 0);
    assert_eq!(pair.server_inbox.processed.len() as u64, ITERATIONS);
}

#[test]
fn reset_keeps_counters() {
    let mut pair = Pair::new(Config::default(), 0.0);

    for _ in 0..10 {
        pair.client_send(&[0; 4], false);
        pair.server_send(&[0; 4], false);
    }

    assert!(!pair.client.acks().is_empty());

    pair.client.reset();

    assert_eq!(pair.client.next_packet_sequence(), 0);
    assert!(pair.client.acks().is_empty());
    assert_eq!(pair.client.counters().packets_sent, 10);

    // The remote endpoint still accepts sequence 0 again
    pair.client_send(&[0; 4], false);
    assert_eq!(pair.server_inbox.processed.len(), 11);
    assert_eq!(pair.server_inbox.processed[10].0, 0);
}

#[test]
fn too_large_to_send() {
    let config = Config {
        max_packet_size: 1024,
        fragment_above: 256,
        fragment_size: 256,
        ..Default::default()
    };

    let mut pair = Pair::new(config, 0.0);

    pair.client_send(&[0; 1025], false);
    pair.client_send(&[0; 1024], false);

    assert_eq!(pair.client.counters().packets_too_large_to_send, 1);
    assert_eq!(pair.client.counters().packets_sent, 1);
    assert_eq!(pair.client.counters().fragments_sent, 4);
    assert_eq!(pair.server_inbox.processed.len(), 1);
    assert_eq!(pair.server_inbox.processed[0].0, 0);
}
