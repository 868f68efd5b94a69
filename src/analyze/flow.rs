use std::fmt;
use std::net::IpAddr;

pub const FIN: u16 = 0b00001;
pub const SYN: u16 = 0b00010;
pub const RST: u16 = 0b00100;
pub const PSH: u16 = 0b01000;
pub const ACK: u16 = 0b10000;

pub const SYNACK: u16 = SYN | ACK;

#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct Addr {
    pub addr: IpAddr,
    pub port: u16,
}

/// Directional flow key. A flow and its reverse form one bidirectional
/// pair, counted once.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct Key {
    pub src: Addr,
    pub dst: Addr,
}

#[derive(Clone, Debug)]
pub struct Record {
    pub timestamp: f64,
    pub length:    u64,
    pub transport: Transport,
}

#[derive(Copy, Clone, Debug)]
pub enum Transport {
    Tcp { key: Key, flags: u16 },
    Udp { key: Key },
    Other,
}

impl Key {
    pub fn reverse(&self) -> Key {
        Key { src: self.dst, dst: self.src }
    }

    /// Orientation-free form of the pair, so {A→B, B→A} registers
    /// identically regardless of discovery order.
    pub fn pair(&self) -> (Key, Key) {
        let rev = self.reverse();
        match *self <= rev {
            true  => (*self, rev),
            false => (rev, *self),
        }
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.port)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {}", self.src, self.dst)
    }
}
