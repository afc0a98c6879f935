/// AArch64 stub (AAPCS64: arguments in `x0` to `x7`, result in `x0`).
///
/// ```text
///   movz/movk x0,  handle
///   movz/movk x1,  info_class
///   movz/movk x2,  buffer
///   movz/movk x3,  buffer_len
///   movz/movk x4,  0               ; ReturnLength = NULL
///   movz/movk x16, query_routine
///   blr  x16                       ; returns status in x0
///   movz/movk x16, exit_routine
///   br   x16                       ; x0 is already the exit code
///   brk  #0
/// ```
///
/// Each 64-bit load is a fixed four-instruction `movz` + 3×`movk` sequence so
/// the stub length does not depend on the values.
use super::StubArgs;

/// Intra-procedure-call scratch register.
const X16: u32 = 16;

pub fn encode(args: &StubArgs) -> Vec<u8> {
    let mut words = Vec::with_capacity(31);

    load64(&mut words, 0, args.handle);
    load64(&mut words, 1, u64::from(args.info_class));
    load64(&mut words, 2, args.buffer);
    load64(&mut words, 3, u64::from(args.buffer_len));
    load64(&mut words, 4, 0);

    load64(&mut words, X16, args.query_routine);
    words.push(blr(X16));

    load64(&mut words, X16, args.exit_routine);
    words.push(br(X16));
    words.push(BRK_0);

    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

const BRK_0: u32 = 0xD420_0000;

/// Materialise a 64-bit immediate in `rd`.
fn load64(words: &mut Vec<u32>, rd: u32, value: u64) {
    words.push(movz(rd, (value & 0xFFFF) as u32, 0));
    for hw in 1..4 {
        words.push(movk(rd, ((value >> (16 * hw)) & 0xFFFF) as u32, hw));
    }
}

/// `MOVZ Xd, #imm16, LSL #(16*hw)`
fn movz(rd: u32, imm16: u32, hw: u32) -> u32 {
    0xD280_0000 | (hw << 21) | (imm16 << 5) | rd
}

/// `MOVK Xd, #imm16, LSL #(16*hw)`
fn movk(rd: u32, imm16: u32, hw: u32) -> u32 {
    0xF280_0000 | (hw << 21) | (imm16 << 5) | rd
}

/// `BLR Xn`
fn blr(rn: u32) -> u32 {
    0xD63F_0000 | (rn << 5)
}

/// `BR Xn`
fn br(rn: u32) -> u32 {
    0xD61F_0000 | (rn << 5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::tests::ARGS;

    fn words(code: &[u8]) -> Vec<u32> {
        code.chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    #[test]
    fn test_known_encodings() {
        // movz x0, #0x1234
        assert_eq!(movz(0, 0x1234, 0), 0xD282_4680);
        // movk x1, #0xffff, lsl #48
        assert_eq!(movk(1, 0xFFFF, 3), 0xF2FF_FFE1);
        assert_eq!(blr(16), 0xD63F_0200);
        assert_eq!(br(16), 0xD61F_0200);
    }

    #[test]
    fn test_length_and_alignment() {
        let code = encode(&ARGS);
        assert_eq!(code.len(), 31 * 4);
    }

    #[test]
    fn test_handle_load_round_trips() {
        let w = words(&encode(&ARGS));
        let mut value = 0u64;
        for (hw, word) in w[0..4].iter().enumerate() {
            assert_eq!(word & 0x1F, 0, "destination must be x0");
            value |= u64::from((word >> 5) & 0xFFFF) << (16 * hw);
        }
        assert_eq!(value, ARGS.handle);
    }

    #[test]
    fn test_query_is_called_and_exit_is_branched() {
        let w = words(&encode(&ARGS));
        // 6 loads × 4 words, then blr.
        assert_eq!(w[24], blr(X16));
        assert_eq!(w[29], br(X16));
        assert_eq!(w[30], BRK_0);
    }
}
