//! Packet checksum
//!
//! CRC-16/CCITT-FALSE: polynomial 0x1021, initial value 0xFFFF, no bit
//! reflection, no final XOR. Both ends of the stream must agree on this
//! variant; wire compatibility with other polynomials is not a goal.

const POLY: u16 = 0x1021;
const INIT: u16 = 0xFFFF;

/// Compute the packet checksum over `data`
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc = INIT;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLY;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}
