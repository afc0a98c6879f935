/// x86 stub (`stdcall`: arguments pushed right to left, callee cleans up).
///
/// ```text
///   push 0                ; ReturnLength = NULL
///   push buffer_len
///   push buffer
///   push info_class
///   push handle
///   mov  eax, query_routine
///   call eax
///   push eax              ; status → exit code
///   mov  eax, exit_routine
///   call eax
///   int3
/// ```
use super::StubArgs;

pub fn encode(args: &StubArgs) -> Vec<u8> {
    let mut code = Vec::with_capacity(38);

    code.extend_from_slice(&[0x6A, 0x00]);
    push_imm32(&mut code, args.buffer_len);
    push_imm32(&mut code, args.buffer as u32);
    push_imm32(&mut code, args.info_class);
    push_imm32(&mut code, args.handle as u32);

    code.push(0xB8);
    code.extend_from_slice(&(args.query_routine as u32).to_le_bytes());
    code.extend_from_slice(&[0xFF, 0xD0]);

    code.push(0x50);
    code.push(0xB8);
    code.extend_from_slice(&(args.exit_routine as u32).to_le_bytes());
    code.extend_from_slice(&[0xFF, 0xD0]);
    code.push(0xCC);

    code
}

/// `68 imm32`
fn push_imm32(code: &mut Vec<u8>, value: u32) {
    code.push(0x68);
    code.extend_from_slice(&value.to_le_bytes());
}
