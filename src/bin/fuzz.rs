use rand::Rng;
use tracing::info;

use reliable::{Config, Endpoint, HostContext};

const MAX_PACKET_BYTES: usize = 16 * 1024;
const DELTA_TIME: f64 = 0.1;
const REPORT_INTERVAL: u64 = 10_000;

// Accepts everything, transmits nowhere
struct Sink;

impl HostContext for Sink {
    fn transmit_packet(&mut self, _index: usize, _sequence: u16, _packet_bytes: &[u8]) {}

    fn process_packet(&mut self, _index: usize, _sequence: u16, _packet_bytes: &[u8]) -> bool {
        true
    }
}

#[derive(Default)]
struct Capture {
    datagrams: Vec<Box<[u8]>>,
}

impl HostContext for Capture {
    fn transmit_packet(&mut self, _index: usize, _sequence: u16, packet_bytes: &[u8]) {
        self.datagrams.push(packet_bytes.into());
    }

    fn process_packet(&mut self, _index: usize, _sequence: u16, _packet_bytes: &[u8]) -> bool {
        true
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("error")),
        )
        .with_target(true)
        .compact()
        .init();

    let num_iterations = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<u64>().expect("Invalid iteration count"));

    let mut rng = rand::thread_rng();
    let mut time = 100.0;

    let mut endpoint = Endpoint::new(Config::default(), time).expect("invalid config");
    // Source of well-formed packets to mutate
    let mut sender = Endpoint::new(Config::default(), time).expect("invalid config");

    let mut packet_data = vec![0_u8; MAX_PACKET_BYTES];
    let mut capture = Capture::default();
    let mut iteration = 0_u64;

    info!(iterations = ?num_iterations, "starting fuzz");

    while num_iterations.map_or(true, |n| iteration < n) {
        let packet_bytes = rng.gen_range(1..=MAX_PACKET_BYTES);
        rng.fill(&mut packet_data[..packet_bytes]);

        if iteration % 2 == 0 {
            endpoint.receive_packet(&packet_data[..packet_bytes], &mut Sink);
        } else {
            capture.datagrams.clear();
            sender.send_packet(&packet_data[..packet_bytes], &mut capture);

            for datagram in capture.datagrams.iter_mut() {
                let flips = rng.gen_range(0..4);
                for _ in 0..flips {
                    let index = rng.gen_range(0..datagram.len());
                    datagram[index] ^= 1_u8 << rng.gen_range(0..8_u32);
                }

                endpoint.receive_packet(datagram, &mut Sink);
            }
        }

        endpoint.update(time);
        sender.update(time);

        // The fuzzed endpoint never sends, so nothing it receives may ack anything
        assert_eq!(endpoint.counters().packets_acked, 0);
        assert!(endpoint.acks().is_empty());

        time += DELTA_TIME;
        iteration += 1;

        if iteration % REPORT_INTERVAL == 0 {
            let counters = endpoint.counters();
            info!(
                iteration,
                received = counters.packets_received,
                invalid = counters.packets_invalid,
                stale = counters.packets_stale,
                fragments_received = counters.fragments_received,
                fragments_invalid = counters.fragments_invalid,
                "fuzz status"
            );
        }
    }

    info!(iterations = iteration, counters = ?endpoint.counters(), "fuzz finished");
}
