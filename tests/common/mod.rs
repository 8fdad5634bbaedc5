use reliable::{Config, Endpoint, HostContext};

/// Records every packet an endpoint hands to its host.
#[derive(Default)]
pub struct Inbox {
    pub processed: Vec<(u16, Box<[u8]>)>,
    pub reject: bool,
}

impl HostContext for Inbox {
    fn transmit_packet(&mut self, _index: usize, _sequence: u16, _packet_bytes: &[u8]) {}

    fn process_packet(&mut self, _index: usize, sequence: u16, packet_bytes: &[u8]) -> bool {
        self.processed.push((sequence, packet_bytes.into()));
        !self.reject
    }
}

/// Collects transmitted datagrams instead of delivering them.
#[derive(Default)]
pub struct Capture {
    pub packets: Vec<Box<[u8]>>,
}

impl HostContext for Capture {
    fn transmit_packet(&mut self, _index: usize, _sequence: u16, packet_bytes: &[u8]) {
        self.packets.push(packet_bytes.into());
    }

    fn process_packet(&mut self, _index: usize, _sequence: u16, _packet_bytes: &[u8]) -> bool {
        true
    }
}

/// Delivers transmitted datagrams directly to the remote endpoint, or drops them all.
pub struct Link<'a> {
    pub remote: &'a mut Endpoint,
    pub inbox: &'a mut Inbox,
    pub drop: bool,
}

impl HostContext for Link<'_> {
    fn transmit_packet(&mut self, _index: usize, _sequence: u16, packet_bytes: &[u8]) {
        if !self.drop {
            self.remote.receive_packet(packet_bytes, &mut *self.inbox);
        }
    }

    fn process_packet(&mut self, _index: usize, _sequence: u16, _packet_bytes: &[u8]) -> bool {
        true
    }
}

/// Two endpoints joined by a pair of links.
pub struct Pair {
    pub client: Endpoint,
    pub server: Endpoint,
    pub client_inbox: Inbox,
    pub server_inbox: Inbox,
}

impl Pair {
    pub fn new(config: Config, time: f64) -> Self {
        let client_config = Config {
            name: "client".into(),
            index: 0,
            ..config.clone()
        };

        let server_config = Config {
            name: "server".into(),
            index: 1,
            ..config
        };

        Self {
            client: Endpoint::new(client_config, time).unwrap(),
            server: Endpoint::new(server_config, time).unwrap(),
            client_inbox: Inbox::default(),
            server_inbox: Inbox::default(),
        }
    }

    pub fn client_send(&mut self, packet_bytes: &[u8], drop: bool) {
        self.client.send_packet(
            packet_bytes,
            &mut Link {
                remote: &mut self.server,
                inbox: &mut self.server_inbox,
                drop,
            },
        );
    }

    pub fn server_send(&mut self, packet_bytes: &[u8], drop: bool) {
        self.server.send_packet(
            packet_bytes,
            &mut Link {
                remote: &mut self.client,
                inbox: &mut self.client_inbox,
                drop,
            },
        );
    }

    pub fn update(&mut self, time: f64) {
        self.client.update(time);
        self.server.update(time);
    }
}

pub const MAX_PACKET_BYTES: usize = 16 * 1024;

/// Deterministic payload tagged with `sequence` in its first two bytes.
pub fn generate_packet_data(sequence: u16) -> Vec<u8> {
    let packet_bytes = (usize::from(sequence) * 1023) % (MAX_PACKET_BYTES - 2) + 2;

    let mut packet_data = vec![0; packet_bytes];
    packet_data[..2].copy_from_slice(&sequence.to_le_bytes());

    for (i, byte) in packet_data.iter_mut().enumerate().skip(2) {
        *byte = ((i + usize::from(sequence)) % 256) as u8;
    }

    packet_data
}
