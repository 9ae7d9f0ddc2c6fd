//! CRC-16-CCITT frame check sequence
//!
//! Polynomial 0x1021, MSB first, initial value 0xFFFF, no final XOR
//! (the "CCITT-FALSE" parameter set).

/// Initial accumulator value
pub const CRC16_CCITT_INIT: u16 = 0xFFFF;

const POLYNOMIAL: u16 = 0x1021;

/// 256-entry lookup table, built at compile time
pub static CRC16_TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Fold one byte into a running CRC
#[inline]
pub fn crc16_update(crc: u16, byte: u8) -> u16 {
    (crc << 8) ^ CRC16_TABLE[((crc >> 8) as u8 ^ byte) as usize]
}

/// CRC over a whole buffer
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    data.iter().fold(CRC16_CCITT_INIT, |crc, &b| crc16_update(crc, b))
}
