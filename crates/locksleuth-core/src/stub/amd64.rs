/// x86-64 stub (Microsoft x64 calling convention).
///
/// ```text
///   mov  rcx, handle
///   mov  rdx, info_class
///   mov  r8,  buffer
///   mov  r9,  buffer_len
///   sub  rsp, 0x28                 ; shadow space + 5th argument slot
///   mov  qword [rsp+0x20], 0       ; ReturnLength = NULL
///   mov  rax, query_routine
///   call rax
///   mov  ecx, eax                  ; status → exit code
///   mov  rax, exit_routine
///   call rax
///   int3
/// ```
///
/// The thread entry sees `rsp ≡ 8 (mod 16)`; subtracting `0x28` leaves the
/// stack 16-byte aligned for both calls.
use super::StubArgs;

pub fn encode(args: &StubArgs) -> Vec<u8> {
    let mut code = Vec::with_capacity(80);

    mov_imm64(&mut code, [0x48, 0xB9], args.handle); // rcx
    mov_imm64(&mut code, [0x48, 0xBA], u64::from(args.info_class)); // rdx
    mov_imm64(&mut code, [0x49, 0xB8], args.buffer); // r8
    mov_imm64(&mut code, [0x49, 0xB9], u64::from(args.buffer_len)); // r9

    code.extend_from_slice(&[0x48, 0x83, 0xEC, 0x28]);
    code.extend_from_slice(&[0x48, 0xC7, 0x44, 0x24, 0x20, 0x00, 0x00, 0x00, 0x00]);

    mov_imm64(&mut code, [0x48, 0xB8], args.query_routine); // rax
    code.extend_from_slice(&[0xFF, 0xD0]);
    code.extend_from_slice(&[0x89, 0xC1]);

    mov_imm64(&mut code, [0x48, 0xB8], args.exit_routine); // rax
    code.extend_from_slice(&[0xFF, 0xD0]);
    code.push(0xCC);

    code
}

/// `REX.W B8+r imm64`
fn mov_imm64(code: &mut Vec<u8>, opcode: [u8; 2], value: u64) {
    code.extend_from_slice(&opcode);
    code.extend_from_slice(&value.to_le_bytes());
}
