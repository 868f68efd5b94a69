use std::collections::{HashMap, HashSet};
use serde::Serialize;
use super::flow::{Key, Record, Transport, ACK, SYN, SYNACK};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Handshake {
    SynSeen,
    SynAckSeen,
}

/// Replays a capture-ordered packet sequence into per-flow aggregates
/// and a three-way handshake state machine. Handshake state only moves
/// forward; a completed flow's tracking entry is removed, so detection
/// is one-shot per directional flow. Stalled flows are never evicted,
/// matching the offline analyzer this replaces.
#[derive(Default)]
pub struct Reconstructor {
    packets:   u64,
    bytes:     u64,
    tcp:       u64,
    udp:       u64,
    skipped:   u64,
    handshake: u64,
    completed: u64,
    states:    HashMap<Key, Handshake>,
    flows:     HashMap<Key, HashSet<u64>>,
    pairs:     HashSet<(Key, Key)>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub total_packets:             u64,
    pub total_flows:               u64,
    pub total_bidirectional_flows: u64,
    pub avg_packet_length:         f64,
    pub tcp_count:                 u64,
    pub tcp_ratio:                 f64,
    pub udp_count:                 u64,
    pub udp_ratio:                 f64,
    pub tcp_handshake_packets:     u64,
    pub completed_tcp_handshakes:  u64,
    pub skipped_records:           u64,
}

impl Reconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, rec: &Record) {
        self.packets += 1;
        self.bytes   += rec.length;

        match rec.transport {
            Transport::Tcp { key, flags } => {
                self.tcp += 1;
                self.shake(key, flags);
                self.track(key, rec.timestamp);
            },
            Transport::Udp { key } => {
                self.udp += 1;
                self.track(key, rec.timestamp);
            },
            Transport::Other => (),
        }
    }

    /// Record a frame that failed link-layer decode.
    pub fn skip(&mut self) {
        self.skipped += 1;
    }

    /// Flows currently awaiting a handshake step.
    pub fn tracked(&self) -> usize {
        self.states.len()
    }

    #[cfg(test)]
    pub(crate) fn timestamps(&self, key: &Key) -> usize {
        self.flows.get(key).map(HashSet::len).unwrap_or(0)
    }

    pub fn summary(&self) -> Summary {
        let total = self.packets;

        Summary {
            total_packets:             total,
            total_flows:               self.flows.len() as u64,
            total_bidirectional_flows: self.pairs.len() as u64,
            avg_packet_length:         mean(self.bytes, total),
            tcp_count:                 self.tcp,
            tcp_ratio:                 ratio(self.tcp, total),
            udp_count:                 self.udp,
            udp_ratio:                 ratio(self.udp, total),
            tcp_handshake_packets:     self.handshake,
            completed_tcp_handshakes:  self.completed,
            skipped_records:           self.skipped,
        }
    }

    fn shake(&mut self, key: Key, flags: u16) {
        let rev = key.reverse();

        if flags == SYN {
            // a retransmitted SYN must not regress SynAckSeen
            self.states.entry(key).or_insert(Handshake::SynSeen);
            self.handshake += 1;
        } else if flags == SYNACK && self.states.get(&rev) == Some(&Handshake::SynSeen) {
            // the initiator's flow advances, keyed responder → initiator
            // is the packet we just saw
            self.states.insert(rev, Handshake::SynAckSeen);
            self.handshake += 1;
        } else if flags == ACK && self.states.get(&key) == Some(&Handshake::SynAckSeen) {
            self.states.remove(&key);
            self.completed += 1;
            self.handshake += 1;
        }
    }

    // timestamps are a set of microsecond ticks, so replaying the same
    // instant twice does not grow the flow index
    fn track(&mut self, key: Key, ts: f64) {
        self.flows.entry(key).or_insert_with(HashSet::new).insert(micros(ts));

        let rev = key.reverse();
        if rev != key && self.flows.contains_key(&rev) {
            self.pairs.insert(key.pair());
        }
    }
}

fn micros(ts: f64) -> u64 {
    (ts * 1_000_000.0).round() as u64
}

fn ratio(part: u64, total: u64) -> f64 {
    match total {
        0 => 0.0,
        n => part as f64 / n as f64,
    }
}

fn mean(sum: u64, total: u64) -> f64 {
    match total {
        0 => 0.0,
        n => sum as f64 / n as f64,
    }
}
