//! Datagram encoding. All multi-byte fields are big-endian, including the
//! selective-ACK bitmap (the reference implementation serializes it with
//! `htobe64`, not little-endian as a stray reading of the distilled spec
//! prose might suggest).

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::err::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Syn,
    SynAck,
    Fin,
    FinAck,
    Data,
    Ack,
    AckWithFlags,
}

impl PacketType {
    fn tag(self) -> u8 {
        match self {
            PacketType::Syn => 1,
            PacketType::SynAck => 2,
            PacketType::Fin => 3,
            PacketType::FinAck => 4,
            PacketType::Data => 5,
            PacketType::Ack => 6,
            PacketType::AckWithFlags => 7,
        }
    }

    fn from_tag(tag: u8) -> Option<PacketType> {
        Some(match tag {
            1 => PacketType::Syn,
            2 => PacketType::SynAck,
            3 => PacketType::Fin,
            4 => PacketType::FinAck,
            5 => PacketType::Data,
            6 => PacketType::Ack,
            7 => PacketType::AckWithFlags,
            _ => return None,
        })
    }
}

/// A control datagram: SYN, SYN-ACK, FIN, or FIN-ACK. Carries a single
/// sequence number which, for SYN/SYN-ACK, is the handshake attempt index
/// rather than a data sequence number (the two spaces are disjoint).
#[derive(Debug, Clone, Copy)]
pub struct Control {
    pub kind: PacketType,
    pub seq: u32,
}

impl Control {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.kind.tag());
        buf.write_u32::<BigEndian>(self.seq).expect("vec write");
    }

    pub fn decode(bytes: &[u8]) -> Result<Control, Error> {
        if bytes.len() < 5 {
            return Err(Error::Malformed("control datagram too short"));
        }
        let kind = PacketType::from_tag(bytes[0]).ok_or(Error::Malformed("unknown type tag"))?;
        let mut cur = Cursor::new(&bytes[1..5]);
        let seq = cur.read_u32::<BigEndian>().map_err(|_| Error::Malformed("bad seq"))?;
        Ok(Control { kind, seq })
    }
}

/// A data datagram: header plus up to `Config::payload` raw bytes.
#[derive(Debug, Clone)]
pub struct DataPacket {
    pub seq: u32,
    pub payload: Vec<u8>,
}

impl DataPacket {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(PacketType::Data.tag());
        buf.write_u32::<BigEndian>(self.seq).expect("vec write");
        buf.extend_from_slice(&self.payload);
    }

    pub fn decode(bytes: &[u8]) -> Result<DataPacket, Error> {
        if bytes.len() < 5 {
            return Err(Error::Malformed("data datagram too short"));
        }
        if bytes[0] != PacketType::Data.tag() {
            return Err(Error::Malformed("not a data datagram"));
        }
        let mut cur = Cursor::new(&bytes[1..5]);
        let seq = cur.read_u32::<BigEndian>().map_err(|_| Error::Malformed("bad seq"))?;
        Ok(DataPacket { seq, payload: bytes[5..].to_vec() })
    }
}

/// An acknowledgement: cumulative, or cumulative plus a selective-ACK bitmap.
#[derive(Debug, Clone, Copy)]
pub enum Ack {
    Cumulative { seq: u32 },
    WithFlags { seq: u32, flags: u64 },
}

impl Ack {
    pub fn seq(&self) -> u32 {
        match self {
            Ack::Cumulative { seq } => *seq,
            Ack::WithFlags { seq, .. } => *seq,
        }
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Ack::Cumulative { seq } => {
                buf.push(PacketType::Ack.tag());
                buf.write_u32::<BigEndian>(*seq).expect("vec write");
            }
            Ack::WithFlags { seq, flags } => {
                buf.push(PacketType::AckWithFlags.tag());
                buf.write_u32::<BigEndian>(*seq).expect("vec write");
                buf.write_u64::<BigEndian>(*flags).expect("vec write");
            }
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Ack, Error> {
        if bytes.len() < 5 {
            return Err(Error::Malformed("ack too short"));
        }
        let tag = bytes[0];
        let mut cur = Cursor::new(&bytes[1..5]);
        let seq = cur.read_u32::<BigEndian>().map_err(|_| Error::Malformed("bad seq"))?;
        if tag == PacketType::Ack.tag() {
            Ok(Ack::Cumulative { seq })
        } else if tag == PacketType::AckWithFlags.tag() {
            if bytes.len() < 13 {
                return Err(Error::Malformed("ack-with-flags too short"));
            }
            let mut cur = Cursor::new(&bytes[5..13]);
            let flags = cur.read_u64::<BigEndian>().map_err(|_| Error::Malformed("bad flags"))?;
            Ok(Ack::WithFlags { seq, flags })
        } else {
            Err(Error::Malformed("not an ack datagram"))
        }
    }
}

/// Peek at the leading type tag without fully decoding the datagram.
pub fn peek_type(bytes: &[u8]) -> Option<PacketType> {
    bytes.first().copied().and_then(PacketType::from_tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_round_trips() {
        let c = Control { kind: PacketType::Syn, seq: 7 };
        let mut buf = Vec::new();
        c.encode(&mut buf);
        assert_eq!(buf, vec![1, 0, 0, 0, 7]);
        let d = Control::decode(&buf).unwrap();
        assert_eq!(d.kind, PacketType::Syn);
        assert_eq!(d.seq, 7);
    }

    #[test]
    fn data_round_trips() {
        let p = DataPacket { seq: 42, payload: vec![1, 2, 3, 4] };
        let mut buf = Vec::new();
        p.encode(&mut buf);
        let d = DataPacket::decode(&buf).unwrap();
        assert_eq!(d.seq, 42);
        assert_eq!(d.payload, vec![1, 2, 3, 4]);
    }

    #[test]
    fn ack_cumulative_round_trips() {
        let a = Ack::Cumulative { seq: 99 };
        let mut buf = Vec::new();
        a.encode(&mut buf);
        assert_eq!(buf.len(), 5);
        let d = Ack::decode(&buf).unwrap();
        assert_eq!(d.seq(), 99);
    }

    #[test]
    fn ack_with_flags_is_big_endian() {
        let a = Ack::WithFlags { seq: 1, flags: 0x0102030405060708 };
        let mut buf = Vec::new();
        a.encode(&mut buf);
        assert_eq!(&buf[5..13], &[1, 2, 3, 4, 5, 6, 7, 8]);
        let d = Ack::decode(&buf).unwrap();
        match d {
            Ack::WithFlags { seq, flags } => {
                assert_eq!(seq, 1);
                assert_eq!(flags, 0x0102030405060708);
            }
            _ => panic!("expected WithFlags"),
        }
    }

    #[test]
    fn peek_type_reads_leading_tag() {
        let mut buf = Vec::new();
        Control { kind: PacketType::Fin, seq: 0 }.encode(&mut buf);
        assert_eq!(peek_type(&buf), Some(PacketType::Fin));
    }

    #[test]
    fn rejects_truncated_datagrams() {
        assert!(Control::decode(&[1, 0, 0]).is_err());
        assert!(DataPacket::decode(&[5, 0, 0]).is_err());
        assert!(Ack::decode(&[]).is_err());
    }
}
