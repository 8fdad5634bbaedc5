use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use reliable::{Config, Endpoint, HostContext};

const MAX_PACKET_BYTES: usize = 16 * 1024;
const DROP_PERCENT: u32 = 5;
const DELTA_TIME: f64 = 0.1;
const REPORT_INTERVAL: u64 = 1000;

fn generate_packet_data(sequence: u16, packet_data: &mut [u8]) -> usize {
    let packet_bytes = (usize::from(sequence) * 1023) % (MAX_PACKET_BYTES - 2) + 2;

    packet_data[..2].copy_from_slice(&sequence.to_le_bytes());

    for (i, byte) in packet_data.iter_mut().enumerate().take(packet_bytes).skip(2) {
        *byte = ((i + usize::from(sequence)) % 256) as u8;
    }

    packet_bytes
}

fn check_packet_data(packet_data: &[u8]) -> bool {
    if packet_data.len() < 2 || packet_data.len() > MAX_PACKET_BYTES {
        return false;
    }

    let sequence = u16::from_le_bytes([packet_data[0], packet_data[1]]);

    if packet_data.len() != (usize::from(sequence) * 1023) % (MAX_PACKET_BYTES - 2) + 2 {
        return false;
    }

    packet_data
        .iter()
        .enumerate()
        .skip(2)
        .all(|(i, &byte)| byte == ((i + usize::from(sequence)) % 256) as u8)
}

struct Checker;

impl HostContext for Checker {
    fn transmit_packet(&mut self, _index: usize, _sequence: u16, _packet_bytes: &[u8]) {}

    fn process_packet(&mut self, index: usize, sequence: u16, packet_bytes: &[u8]) -> bool {
        assert!(
            check_packet_data(packet_bytes),
            "endpoint {index} received corrupt packet {sequence}"
        );
        true
    }
}

// Delivers transmitted packets straight to the remote endpoint, dropping a few along the way
struct LossyLink<'a> {
    remote: &'a mut Endpoint,
    rng: &'a mut StdRng,
}

impl HostContext for LossyLink<'_> {
    fn transmit_packet(&mut self, _index: usize, _sequence: u16, packet_bytes: &[u8]) {
        if self.rng.gen_range(0..100) < DROP_PERCENT {
            return;
        }

        self.remote.receive_packet(packet_bytes, &mut Checker);
    }

    fn process_packet(&mut self, _index: usize, _sequence: u16, _packet_bytes: &[u8]) -> bool {
        true
    }
}

fn report(name: &str, endpoint: &Endpoint) {
    let (sent_kbps, received_kbps, acked_kbps) = endpoint.bandwidth();
    let counters = endpoint.counters();

    info!(
        endpoint = name,
        rtt_ms = endpoint.rtt(),
        packet_loss = endpoint.packet_loss(),
        sent_kbps,
        received_kbps,
        acked_kbps,
        sent = counters.packets_sent,
        received = counters.packets_received,
        acked = counters.packets_acked,
        fragments_sent = counters.fragments_sent,
        fragments_received = counters.fragments_received,
        "soak status"
    );
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .compact()
        .init();

    let mut num_iterations = None;
    let mut seed = None;

    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--seed" => {
                let value = args.next().expect("Missing --seed value");
                seed = Some(value.parse::<u64>().expect("Invalid --seed value"));
            }
            other => {
                num_iterations = Some(other.parse::<u64>().expect("Invalid iteration count"));
            }
        }
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut time = 100.0;

    let client_config = Config {
        name: "client".into(),
        index: 0,
        ..Default::default()
    };

    let server_config = Config {
        name: "server".into(),
        index: 1,
        ..Default::default()
    };

    let mut client = Endpoint::new(client_config, time).expect("invalid client config");
    let mut server = Endpoint::new(server_config, time).expect("invalid server config");

    info!(iterations = ?num_iterations, "starting soak");

    let mut packet_data = vec![0_u8; MAX_PACKET_BYTES];
    let mut iteration = 0_u64;

    while num_iterations.map_or(true, |n| iteration < n) {
        let packet_bytes = generate_packet_data(client.next_packet_sequence(), &mut packet_data);
        client.send_packet(
            &packet_data[..packet_bytes],
            &mut LossyLink {
                remote: &mut server,
                rng: &mut rng,
            },
        );

        let packet_bytes = generate_packet_data(server.next_packet_sequence(), &mut packet_data);
        server.send_packet(
            &packet_data[..packet_bytes],
            &mut LossyLink {
                remote: &mut client,
                rng: &mut rng,
            },
        );

        client.update(time);
        server.update(time);

        client.clear_acks();
        server.clear_acks();

        time += DELTA_TIME;
        iteration += 1;

        if iteration % REPORT_INTERVAL == 0 {
            report("client", &client);
            report("server", &server);
        }
    }

    report("client", &client);
    report("server", &server);

    info!(iterations = iteration, "soak finished");
}
